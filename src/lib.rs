pub mod biome;
pub mod climate;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod export;
pub mod features;
pub mod grid;
pub mod heightmap;
pub mod lakes;
pub mod mesh;
pub mod pack;
pub mod pipeline;
pub mod rivers;
pub mod rng;
pub mod suitability;
pub mod voronoi;

pub use config::{BiomeTable, ClimateSettings, MapPlacement, Template, WorldGenerationParams};
pub use error::{CalculationError, ConfigError, ExportError, GenerationError, Stage};
pub use export::save_world;
pub use heightmap::{ElevationSource, FixedHeights, NoiseHeightmap};
pub use pipeline::{World, WorldSummary, generate, generate_world};
