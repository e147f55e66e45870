use clap::Parser;
use log::info;
use std::path::PathBuf;
use worldgen::{WorldGenerationParams, generate_world, save_world};

/// Генератор рельефа и климата фэнтезийных карт
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (по умолчанию: параметры по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Каталог для summary.json и растров
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Сид, заменяющий указанный в конфигурации
    #[arg(short, long)]
    seed: Option<String>,

    /// Ширина растров в пикселях (по умолчанию: ширина карты)
    #[arg(long)]
    image_width: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(path) => {
            info!("loading config from {}", path.display());
            WorldGenerationParams::from_toml_file(path)?
        }
        None => WorldGenerationParams::default(),
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }

    let world = generate_world(&params)?;

    let width = cli.image_width.unwrap_or(params.width).max(1);
    let height = ((f64::from(width) * f64::from(params.height) / f64::from(params.width)).round() as u32).max(1);
    save_world(&world, &cli.output_dir, width, height)?;

    println!("{}", serde_json::to_string_pretty(&world.summary)?);
    Ok(())
}
