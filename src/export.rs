//! Выгрузка ячеек мира в JSON
//!
//! Плоский список записей без ссылок на внутренние структуры: удобно для
//! внешних инструментов и для отладки.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::geometry::Point;
use crate::heightmap::ElevationSource;
use crate::partition::AdjacencyProvider;
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    pub index: usize,
    pub center: Point,
    pub polygon: Vec<Point>,
    pub neighbors: Vec<usize>,
    pub elevation: f32,
    pub is_land: bool,
    pub precipitation: f32,
    pub territory: Option<usize>,
    pub river: Option<usize>,
    pub lake: Option<usize>,
}

#[must_use]
pub fn export_cells(world: &World) -> Vec<CellRecord> {
    let partition = &world.partition;
    (0..partition.len())
        .map(|cell| CellRecord {
            index: cell,
            center: partition.center(cell),
            polygon: partition.polygon(cell).to_vec(),
            neighbors: partition.neighbors(cell).to_vec(),
            elevation: world.terrain.elevation(cell),
            is_land: world.terrain.is_land(cell),
            precipitation: world.precipitation.get(cell).copied().unwrap_or(0.0),
            territory: world.political.territory_of(cell),
            river: world.hydrology.river_of(cell),
            lake: world.hydrology.lake_of(cell),
        })
        .collect()
}

/// Записывает [`export_cells`] в файл.
pub fn save_cells_json(world: &World, path: impl AsRef<Path>) -> Result<(), GenerationError> {
    let records = export_cells(world);
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(writer, &records)?;
    tracing::info!(path = %path.as_ref().display(), cells = records.len(), "ячейки выгружены");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationRequest;
    use crate::world::generate;

    #[test]
    fn records_mirror_the_world() {
        let request = GenerationRequest {
            seed: 9,
            cell_count: 300,
            width: 200.0,
            height: 150.0,
            ..GenerationRequest::default()
        };
        let world = generate(&request).unwrap();
        let records = export_cells(&world);

        assert_eq!(records.len(), 300);
        for record in &records {
            assert_eq!(record.is_land, record.elevation >= 0.0);
            assert_eq!(record.territory.is_some(), record.is_land);
            for &n in &record.neighbors {
                assert!(records[n].neighbors.contains(&record.index));
            }
        }

        let json = serde_json::to_string(&records).unwrap();
        let parsed: Vec<CellRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), records.len());
    }
}
