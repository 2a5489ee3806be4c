//! Полный конвейер: рельеф → заливка впадин → регионы → гидрология

use crate::config::{GenerationParams, RegionMode, SeaLevel};
use crate::depression::fill_depressions;
use crate::drainage::{self, Downstream, DrainageNetwork, RiverSummary};
use crate::error::Result;
use crate::heightmap::{HeightField, HeightStats, generate_heightmap};
use crate::random::seeded_rng;
use crate::region::{Cell, RegionGraph, scatter_sites, site_elevations, voronoi_partition};
use serde::Serialize;
use tracing::info;

pub struct World {
    /// Поле после заливки впадин. Плато на `high` заливка поднимает на
    /// несколько ulp, так что максимум может чуть превысить `high`.
    pub heightfield: HeightField,
    /// Статистика сырого поля, до заливки впадин
    pub stats: HeightStats,
    pub sea_level: f32,
    pub regions: RegionGraph,
    pub drainage: DrainageNetwork,
    /// Клеток, поднятых заливкой
    pub raised: usize,
}

/// То, что попадает в `world.json`
#[derive(Debug, Serialize)]
pub struct WorldSummary<'a> {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub stats: HeightStats,
    pub raised: usize,
    pub sea_level: f32,
    pub land: usize,
    pub coastal: usize,
    pub rivers: Vec<RiverSummary>,
    pub cells: &'a [Cell],
    pub drainage: &'a DrainageNetwork,
}

impl World {
    /// Реки, впадающие в океан или уходящие за край, от крупных к мелким.
    pub fn rivers(&self) -> Vec<RiverSummary> {
        let mut rivers: Vec<RiverSummary> = self
            .drainage
            .roots()
            .filter(|&root| {
                matches!(
                    self.drainage.segments[root].downstream,
                    Downstream::Ocean(_) | Downstream::Edge
                )
            })
            .map(|root| self.drainage.summarize(root))
            .collect();
        rivers.sort_by(|a, b| b.cells.cmp(&a.cells).then(a.root.cmp(&b.root)));
        rivers
    }

    pub fn summary(&self, seed: u64) -> WorldSummary<'_> {
        WorldSummary {
            seed,
            width: self.heightfield.width,
            height: self.heightfield.height,
            stats: self.stats,
            raised: self.raised,
            sea_level: self.sea_level,
            land: self.regions.land_count(),
            coastal: self.regions.coastal_cells().count(),
            rivers: self.rivers(),
            cells: &self.regions.cells,
            drainage: &self.drainage,
        }
    }
}

/// Генерирует мир целиком из одного сида.
pub fn generate_world(params: &GenerationParams) -> Result<World> {
    let mut rng = seeded_rng(params.seed);
    let topology = params.regions.topology;

    let (mut heightfield, stats) = generate_heightmap(&params.terrain, &mut rng)?;

    let mut raised = 0;
    if params.terrain.fill_depressions {
        let outcome = fill_depressions(&heightfield, topology)?;
        heightfield = outcome.field;
        raised = outcome.raised;
    }

    let sea_level = match params.regions.sea_level {
        SeaLevel::Mean => heightfield.stats().mean,
        SeaLevel::Fixed(level) => level,
    };

    let mut regions = match params.regions.mode {
        RegionMode::Raster => RegionGraph::from_heightfield(&heightfield, sea_level, topology)?,
        RegionMode::Voronoi => {
            let sites = scatter_sites(
                params.regions.site_count,
                heightfield.width,
                heightfield.height,
                &mut rng,
            );
            let labels = voronoi_partition(heightfield.width, heightfield.height, &sites, topology.wrap);
            let elevations = site_elevations(&heightfield, &sites);
            RegionGraph::from_partition(
                &labels,
                heightfield.width,
                heightfield.height,
                &elevations,
                sea_level,
                topology.wrap,
            )?
        }
    };

    if let Some(reprofile) = &params.regions.reprofile {
        regions.reprofile(reprofile, &mut rng);
    }

    let drainage = drainage::route(&mut regions, &params.hydrology)?;

    info!(
        seed = params.seed,
        size = params.terrain.size,
        sea_level,
        land = regions.land_count(),
        segments = drainage.segments.len(),
        lakes = drainage.lakes.len(),
        "world generated"
    );

    Ok(World {
        heightfield,
        stats,
        sea_level,
        regions,
        drainage,
        raised,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ReprofileSettings, TerrainSettings};

    fn small(seed: u64) -> GenerationParams {
        GenerationParams {
            seed,
            terrain: TerrainSettings {
                size: 33,
                ..TerrainSettings::default()
            },
            ..GenerationParams::default()
        }
    }

    #[test]
    fn same_seed_same_world() {
        let a = generate_world(&small(7)).unwrap();
        let b = generate_world(&small(7)).unwrap();
        assert_eq!(a.heightfield, b.heightfield);
        assert_eq!(a.sea_level, b.sea_level);
        assert_eq!(a.drainage.segments.len(), b.drainage.segments.len());
        assert_eq!(a.rivers(), b.rivers());
    }

    #[test]
    fn raster_world_has_a_cell_per_pixel() {
        let world = generate_world(&small(3)).unwrap();
        assert_eq!(world.regions.len(), 33 * 33);
        let land = world
            .regions
            .cells
            .iter()
            .filter(|c| c.elevation >= world.sea_level)
            .count();
        assert_eq!(land, world.regions.land_count());
    }

    #[test]
    fn voronoi_world_uses_requested_sites() {
        let mut params = small(5);
        params.regions.mode = RegionMode::Voronoi;
        params.regions.site_count = 40;
        params.regions.reprofile = Some(ReprofileSettings::default());
        let world = generate_world(&params).unwrap();
        assert!(world.regions.len() <= 40);
        for cell in world.regions.cells.iter().filter(|c| c.is_land()) {
            assert!(cell.elevation >= world.sea_level);
        }
    }

    #[test]
    fn filled_field_exceeds_the_range_by_ulps_at_most() {
        let mut params = small(13);
        params.terrain.roughness = 40.0;
        let (low, high) = (params.terrain.low, params.terrain.high);
        let world = generate_world(&params).unwrap();

        assert!(world.stats.max <= high);
        assert!(world.stats.min >= low);
        // Не больше одного ulp на клетку цепочки: 33 * 33 ulp около 255 меньше 0.05
        for &v in &world.heightfield.data {
            assert!(v >= low);
            assert!(v - high < 0.05, "filled height {v} too far above {high}");
        }
    }

    #[test]
    fn summary_serializes() {
        let world = generate_world(&small(11)).unwrap();
        let json = serde_json::to_string(&world.summary(11)).unwrap();
        assert!(json.contains("\"sea_level\""));
        assert!(json.contains("\"segments\""));
    }
}
