use clap::{Parser, ValueEnum};
use realmgen::export::save_cells_json;
use realmgen::preview::save_preview;
use realmgen::{GenerationRequest, World, WorldType, generate_batch};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Генератор миров: рельеф, реки, королевства, поселения и дороги
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML
    #[arg(short, long)]
    config: PathBuf,

    /// Пресет карты высот (заменяет секцию [heightmap] конфигурации)
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Сид (заменяет значение из конфигурации)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Путь для PNG-превью
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Ширина превью в пикселях
    #[arg(long, default_value_t = 1600)]
    preview_width: u32,

    /// Путь для выгрузки ячеек в JSON
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Сколько миров сгенерировать подряд (сиды seed, seed+1, ...)
    #[arg(long, default_value_t = 1)]
    seeds: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    EarthLike,
    Supercontinent,
    Archipelago,
    Mediterranean,
}

impl From<Preset> for WorldType {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::EarthLike => WorldType::EarthLike,
            Preset::Supercontinent => WorldType::Supercontinent,
            Preset::Archipelago => WorldType::Archipelago,
            Preset::Mediterranean => WorldType::Mediterranean,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("realmgen=info")),
        )
        .init();

    let cli = Cli::parse();

    println!("🔍 Загрузка конфигурации...");
    let mut base = GenerationRequest::from_toml_file(&cli.config)?;
    if let Some(preset) = cli.preset {
        base.heightmap = WorldType::from(preset).default_heightmap();
    }
    if let Some(seed) = cli.seed {
        base.seed = seed;
    }
    base.validate()?;

    let requests: Vec<GenerationRequest> = (0..cli.seeds.max(1))
        .map(|offset| GenerationRequest {
            seed: base.seed.wrapping_add(offset),
            ..base.clone()
        })
        .collect();

    println!(
        "🌍 Генерация {} мир(ов): {} ячеек, область {}×{}...",
        requests.len(),
        base.cell_count,
        base.width,
        base.height
    );
    let batch = requests.len() > 1;
    for result in generate_batch(&requests) {
        let world = result?;
        report(&world);

        if let Some(path) = &cli.preview {
            let path = output_path(path, world.request.seed, batch);
            println!("🖼  Сохранение превью в {}", path.display());
            save_preview(&world, cli.preview_width, &path)?;
        }
        if let Some(path) = &cli.export {
            let path = output_path(path, world.request.seed, batch);
            println!("💾 Выгрузка ячеек в {}", path.display());
            save_cells_json(&world, &path)?;
        }
    }

    println!("\n✅ Готово!");
    Ok(())
}

fn report(world: &World) {
    println!(
        "  сид {}: суша {}/{} ячеек, рек {}, озёр {}, королевств {}, поселений {}, дорог {}",
        world.request.seed,
        world.terrain.land_count(),
        world.partition.len(),
        world.hydrology.rivers().len(),
        world.hydrology.lakes().len(),
        world.political.territories().len(),
        world.settlements.len(),
        world.roads.len()
    );
}

/// В пакетном режиме к имени файла добавляется сид: `map.png` → `map-42.png`.
fn output_path(path: &Path, seed: u64, batch: bool) -> PathBuf {
    if !batch {
        return path.to_path_buf();
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("world");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{seed}.{ext}"),
        None => format!("{stem}-{seed}"),
    };
    path.with_file_name(name)
}
