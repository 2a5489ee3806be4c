//! Атлас тайлов для бесшовной генерации по частям
//!
//! Тайлы хранятся по координатам `(tx, ty)`, `ty` растёт к югу. Соседние тайлы
//! делят крайнюю строку/столбец, поэтому новый тайл берёт свои края у уже
//! существующих соседей и получает непрерывность на стыках.

use crate::error::{MapgenError, Result};
use crate::heightmap::{HeightField, HeightStats, HeightmapGenerator, TileNeighbors, TileSide};
use crate::random::RandomSource;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct TileAtlas {
    tiles: BTreeMap<(i32, i32), HeightField>,
}

/// Вид на соседей конкретной позиции атласа
pub struct AtlasNeighbors<'a> {
    atlas: &'a TileAtlas,
    tx: i32,
    ty: i32,
}

impl TileAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tx: i32, ty: i32) -> Option<&HeightField> {
        self.tiles.get(&(tx, ty))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn neighbors_of(&self, tx: i32, ty: i32) -> AtlasNeighbors<'_> {
        AtlasNeighbors { atlas: self, tx, ty }
    }

    /// Генерирует тайл на позиции `(tx, ty)`, сшивая его с имеющимися соседями.
    /// Уже существующий тайл перегенерируется.
    pub fn generate_tile(
        &mut self,
        tx: i32,
        ty: i32,
        generator: &HeightmapGenerator,
        rng: &mut dyn RandomSource,
    ) -> Result<(&HeightField, HeightStats)> {
        let (field, stats) = generator.generate_stitched(rng, &self.neighbors_of(tx, ty))?;
        debug!(tx, ty, "tile generated");
        self.insert(tx, ty, field)?;
        let tile = &self.tiles[&(tx, ty)];
        Ok((tile, stats))
    }

    /// Кладёт готовый тайл. Все тайлы атласа обязаны быть одного размера.
    pub fn insert(&mut self, tx: i32, ty: i32, field: HeightField) -> Result<()> {
        if let Some(existing) = self.tiles.values().next() {
            if existing.len() != field.len() {
                return Err(MapgenError::SizeMismatch {
                    expected: existing.len(),
                    actual: field.len(),
                });
            }
        }
        self.tiles.insert((tx, ty), field);
        Ok(())
    }
}

impl TileNeighbors for AtlasNeighbors<'_> {
    fn shared_edge(&self, side: TileSide) -> Option<Vec<f32>> {
        let (dx, dy) = match side {
            TileSide::North => (0, -1),
            TileSide::South => (0, 1),
            TileSide::West => (-1, 0),
            TileSide::East => (1, 0),
        };
        self.atlas
            .get(self.tx + dx, self.ty + dy)
            .map(|tile| tile.edge(side.opposite()))
    }
}
