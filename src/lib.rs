pub mod config;
pub mod depression;
pub mod drainage;
pub mod error;
pub mod grid;
pub mod heightmap;
pub mod noise;
pub mod random;
pub mod region;
pub mod tiles;
pub mod world;

pub use config::{GenerationParams, HydrologySettings, RegionSettings, TerrainSettings};
pub use drainage::{DrainageNetwork, Lake, RiverSegment};
pub use error::{MapgenError, Result};
pub use heightmap::{HeightField, HeightmapGenerator, generate_heightmap};
pub use region::RegionGraph;
pub use world::{World, generate_world};
