use crate::config::{BoundaryMode, NoiseKind, TerrainSettings};
use crate::error::{MapgenError, Result};
use crate::grid::Connectivity;
use crate::noise::{BoundaryConditions, CoherentNoise, MidpointDisplacement, NoiseField, validate_size};
use crate::random::RandomSource;
use image::{ImageBuffer, Luma};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Двумерное поле высот, хранится построчно: индекс `y * width + x`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

/// Сводка по полю: нужна для выбора уровня моря
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Сколько значений мутатора пришлось зажать в диапазон
    pub clamped: usize,
}

impl HeightField {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width * height) as usize],
        }
    }

    /// Оборачивает готовые данные, отвергая несогласованный размер и NaN.
    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (width * height) as usize;
        if data.len() != expected {
            return Err(MapgenError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        if let Some(i) = data.iter().position(|v| !v.is_finite()) {
            return Err(MapgenError::NonFiniteHeight {
                x: i as u32 % width,
                y: i as u32 / width,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(MapgenError::NonFiniteHeight { x, y });
        }
        self.data[(y * self.width + x) as usize] = value;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Значения вдоль одной стороны: слева направо для севера/юга, сверху вниз для запада/востока.
    pub fn edge(&self, side: TileSide) -> Vec<f32> {
        let last_x = self.width - 1;
        let last_y = self.height - 1;
        match side {
            TileSide::North => (0..self.width).map(|x| self.get(x, 0)).collect(),
            TileSide::South => (0..self.width).map(|x| self.get(x, last_y)).collect(),
            TileSide::West => (0..self.height).map(|y| self.get(0, y)).collect(),
            TileSide::East => (0..self.height).map(|y| self.get(last_x, y)).collect(),
        }
    }

    pub fn stats(&self) -> HeightStats {
        let (min, max, sum) = self.data.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + f64::from(v)),
        );
        let mean = if self.data.is_empty() {
            0.0
        } else {
            (sum / self.data.len() as f64) as f32
        };
        HeightStats {
            min,
            max,
            mean,
            clamped: 0,
        }
    }

    /// Оттенки серого, нормированные по фактическому min..max
    pub fn to_grayscale_image(&self) -> Vec<u8> {
        let stats = self.stats();
        let span = (stats.max - stats.min).max(f32::EPSILON);
        self.data
            .iter()
            .map(|&v| (((v - stats.min) / span).clamp(0.0, 1.0) * 255.0) as u8)
            .collect()
    }

    pub fn save_as_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, self.to_grayscale_image()).ok_or(
                MapgenError::SizeMismatch {
                    expected: (self.width * self.height) as usize,
                    actual: self.data.len(),
                },
            )?;
        img.save(path)?;
        Ok(())
    }
}

/// Сторона тайла
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileSide {
    North,
    South,
    West,
    East,
}

impl TileSide {
    pub const ALL: [TileSide; 4] = [TileSide::North, TileSide::South, TileSide::West, TileSide::East];

    pub fn opposite(self) -> Self {
        match self {
            TileSide::North => TileSide::South,
            TileSide::South => TileSide::North,
            TileSide::West => TileSide::East,
            TileSide::East => TileSide::West,
        }
    }
}

/// Доступ к краям уже сгенерированных соседних тайлов.
pub trait TileNeighbors {
    /// Значения общего края со стороны `side` этого тайла
    /// или `None`, если соседа ещё нет.
    fn shared_edge(&self, side: TileSide) -> Option<Vec<f32>>;
}

/// Мутатор высот: `(x, y, значение) -> новое значение`
pub type HeightMutator = Box<dyn Fn(u32, u32, f32) -> f32 + Send + Sync>;

/// Генератор карты высот: граничные условия, подразбиение, сглаживание, зажим.
pub struct HeightmapGenerator {
    size: u32,
    low: f32,
    high: f32,
    noise: Box<dyn NoiseField + Send + Sync>,
    boundary: BoundaryMode,
    smoothing: bool,
    strict_range: bool,
    mutator: Option<HeightMutator>,
}

impl HeightmapGenerator {
    /// Diamond-square в диапазоне `[0, 255]` со сглаживанием и открытыми краями.
    pub fn new(size: u32, roughness: f32) -> Self {
        Self {
            size,
            low: 0.0,
            high: 255.0,
            noise: Box::new(MidpointDisplacement { roughness }),
            boundary: BoundaryMode::Open,
            smoothing: true,
            strict_range: false,
            mutator: None,
        }
    }

    pub fn from_settings(settings: &TerrainSettings) -> Self {
        let noise: Box<dyn NoiseField + Send + Sync> = match settings.noise {
            NoiseKind::MidpointDisplacement => Box::new(MidpointDisplacement {
                roughness: settings.roughness,
            }),
            NoiseKind::Coherent { octaves, frequency } => {
                Box::new(CoherentNoise { octaves, frequency })
            }
        };
        Self {
            size: settings.size,
            low: settings.low,
            high: settings.high,
            noise,
            boundary: settings.boundary,
            smoothing: settings.smoothing,
            strict_range: settings.strict_range,
            mutator: None,
        }
    }

    #[must_use]
    pub fn with_range(mut self, low: f32, high: f32) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    #[must_use]
    pub fn with_noise(mut self, noise: Box<dyn NoiseField + Send + Sync>) -> Self {
        self.noise = noise;
        self
    }

    #[must_use]
    pub fn with_boundary(mut self, boundary: BoundaryMode) -> Self {
        self.boundary = boundary;
        self
    }

    #[must_use]
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    #[must_use]
    pub fn with_strict_range(mut self, strict: bool) -> Self {
        self.strict_range = strict;
        self
    }

    /// Мутатор применяется после сглаживания к каждой незакреплённой клетке.
    #[must_use]
    pub fn with_mutator(mut self, mutator: HeightMutator) -> Self {
        self.mutator = Some(mutator);
        self
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn generate(&self, rng: &mut dyn RandomSource) -> Result<(HeightField, HeightStats)> {
        self.generate_with(rng, None)
    }

    /// Генерация со сшивкой: края, известные соседям, берутся у них.
    pub fn generate_stitched(
        &self,
        rng: &mut dyn RandomSource,
        neighbors: &dyn TileNeighbors,
    ) -> Result<(HeightField, HeightStats)> {
        self.generate_with(rng, Some(neighbors))
    }

    fn generate_with(
        &self,
        rng: &mut dyn RandomSource,
        neighbors: Option<&dyn TileNeighbors>,
    ) -> Result<(HeightField, HeightStats)> {
        validate_size(self.size)?;
        if !(self.low.is_finite() && self.high.is_finite() && self.low < self.high) {
            return Err(MapgenError::InvalidRange {
                low: self.low,
                high: self.high,
            });
        }

        let size = self.size;
        let wrap = self.boundary == BoundaryMode::Wrap;
        let mut boundary = if wrap {
            BoundaryConditions::wrapped(size)
        } else {
            BoundaryConditions::open(size)
        };

        // === 1. Края соседей ===
        if let Some(neighbors) = neighbors {
            let stitched = self.pin_neighbor_edges(&mut boundary, neighbors)?;
            if stitched == 0 {
                debug!("no neighbor tiles yet, seeding edges from the random source");
            }
        }

        // === 2. Сырые высоты ===
        let data = self
            .noise
            .generate(size, self.low, self.high, &boundary, rng)?;
        let mut field = HeightField::from_data(size, size, data)?;

        // === 3. Сглаживание ===
        if self.smoothing {
            smooth_heightfield(&mut field, wrap, Some(&boundary));
        }

        // === 4. Мутатор ===
        let mut clamped = 0;
        if let Some(mutator) = &self.mutator {
            for y in 0..size {
                for x in 0..size {
                    if boundary.pinned(x, y).is_some() {
                        continue;
                    }
                    let value = mutator(x, y, field.get(x, y));
                    if !value.is_finite() {
                        return Err(MapgenError::NonFiniteHeight { x, y });
                    }
                    if value < self.low || value > self.high {
                        clamped += 1;
                    }
                    field.set(x, y, value.clamp(self.low, self.high))?;
                }
            }
        }
        if clamped > 0 {
            warn!(clamped, low = self.low, high = self.high, "mutator values clamped into range");
            if self.strict_range {
                return Err(MapgenError::RangeViolation {
                    count: clamped,
                    low: self.low,
                    high: self.high,
                });
            }
        }

        let stats = HeightStats {
            clamped,
            ..field.stats()
        };
        info!(
            size,
            min = stats.min,
            max = stats.max,
            mean = stats.mean,
            "heightmap generated"
        );
        Ok((field, stats))
    }

    /// Закрепляет общие края соседей. Возвращает число сшитых сторон.
    fn pin_neighbor_edges(
        &self,
        boundary: &mut BoundaryConditions,
        neighbors: &dyn TileNeighbors,
    ) -> Result<usize> {
        let size = self.size;
        let last = size - 1;
        let mut stitched = 0;
        for side in TileSide::ALL {
            let Some(edge) = neighbors.shared_edge(side) else {
                continue;
            };
            if edge.len() != size as usize {
                return Err(MapgenError::SizeMismatch {
                    expected: size as usize,
                    actual: edge.len(),
                });
            }
            for (i, &value) in edge.iter().enumerate() {
                let i = i as u32;
                let (x, y) = match side {
                    TileSide::North => (i, 0),
                    TileSide::South => (i, last),
                    TileSide::West => (0, i),
                    TileSide::East => (last, i),
                };
                if !value.is_finite() {
                    return Err(MapgenError::NonFiniteHeight { x, y });
                }
                // Угол, уже закреплённый другой стороной, не переписываем
                if boundary.pinned(x, y).is_none() {
                    boundary.pin(x, y, value.clamp(self.low, self.high));
                }
            }
            stitched += 1;
        }
        Ok(stitched)
    }
}

/// Один проход сглаживания: каждая клетка заменяется средним своих 8 соседей.
///
/// Без `wrap` на границе учитываются только соседи внутри области. С `wrap`
/// период сетки — `size - 1`, так что склеенные края остаются равными.
/// Закреплённые точки `fixed` не меняются.
pub fn smooth_heightfield(field: &mut HeightField, wrap: bool, fixed: Option<&BoundaryConditions>) {
    let width = i64::from(field.width);
    let height = i64::from(field.height);
    let wrap = wrap && width > 1 && height > 1;
    let (period_x, period_y) = if wrap {
        (width - 1, height - 1)
    } else {
        (width, height)
    };
    let src = &field.data;

    let smooth_cell = |idx: usize| -> f32 {
        let x = idx as i64 % width;
        let y = idx as i64 / width;
        if let Some(pinned) = fixed.and_then(|b| b.pinned(x as u32, y as u32)) {
            return pinned;
        }
        let (x, y) = if wrap {
            (x % period_x, y % period_y)
        } else {
            (x, y)
        };

        let mut sum = 0.0;
        let mut count = 0;
        for &(dx, dy) in Connectivity::Eight.offsets() {
            let mut nx = x + i64::from(dx);
            let mut ny = y + i64::from(dy);
            if wrap {
                nx = nx.rem_euclid(period_x);
                ny = ny.rem_euclid(period_y);
            } else if nx < 0 || ny < 0 || nx >= width || ny >= height {
                continue;
            }
            sum += src[(ny * width + nx) as usize];
            count += 1;
        }
        if count == 0 {
            src[idx]
        } else {
            sum / count as f32
        }
    };

    #[cfg(feature = "parallel")]
    let smoothed: Vec<f32> = (0..src.len()).into_par_iter().map(smooth_cell).collect();
    #[cfg(not(feature = "parallel"))]
    let smoothed: Vec<f32> = (0..src.len()).map(smooth_cell).collect();

    field.data = smoothed;
}

/// Генерирует карту высот по настройкам рельефа
pub fn generate_heightmap(
    settings: &TerrainSettings,
    rng: &mut dyn RandomSource,
) -> Result<(HeightField, HeightStats)> {
    HeightmapGenerator::from_settings(settings).generate(rng)
}
