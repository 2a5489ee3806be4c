use clap::Parser;
use mapgen::{GenerationParams, generate_world};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Генератор рельефа и речной сети
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (без него используются встроенные настройки)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Переопределяет сид из конфигурации
    #[arg(short, long)]
    seed: Option<u64>,

    /// Каталог для height.png и world.json
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Уровень логирования, если не задан RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> mapgen::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .init();

    let mut params = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            GenerationParams::from_toml_file(path)?
        }
        None => GenerationParams::default(),
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }

    info!(seed = params.seed, size = params.terrain.size, "generating world");
    let world = generate_world(&params)?;

    fs::create_dir_all(&cli.output)?;
    let height_path = cli.output.join("height.png");
    world.heightfield.save_as_png(&height_path)?;

    let json_path = cli.output.join("world.json");
    let json = serde_json::to_string_pretty(&world.summary(params.seed)).map_err(std::io::Error::other)?;
    fs::write(&json_path, json)?;

    info!(
        height = %height_path.display(),
        summary = %json_path.display(),
        rivers = world.rivers().len(),
        lakes = world.drainage.lakes.len(),
        "done"
    );
    Ok(())
}
