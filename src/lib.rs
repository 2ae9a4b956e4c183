//! Процедурный генератор мира на ячейках
//!
//! Конвейер: точки → разбиение → рельеф → гидрология → осадки → королевства →
//! поселения → дороги. Точка входа — [`world::generate`].
//!
//! ```no_run
//! use realmgen::{GenerationRequest, generate};
//!
//! let request = GenerationRequest {
//!     seed: 42,
//!     cell_count: 2000,
//!     ..GenerationRequest::default()
//! };
//! let world = generate(&request)?;
//! println!("королевств: {}", world.political.territories().len());
//! # Ok::<(), realmgen::GenerationError>(())
//! ```

pub mod chain;
pub mod climate;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod geometry;
pub mod heightmap;
pub mod hydrology;
pub mod outline;
pub mod partition;
pub mod points;
pub mod political;
pub mod preview;
pub mod protocol;
pub mod roads;
pub mod settlement;
pub mod world;

pub use config::{GenerationRequest, WorldType};
pub use error::{ConfigError, GenerationError, GeometryError, HydrologyError};
pub use partition::{AdjacencyProvider, Partition};
pub use world::{Stage, World, generate, generate_batch, generate_with_progress};
