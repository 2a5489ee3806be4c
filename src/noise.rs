//! Источники сырых высот
//!
//! [`NoiseField`] заполняет квадратную сетку стороной `2^k+1`. Реализации:
//! - [`MidpointDisplacement`] — фрактальное смещение средней точки
//!   (diamond-square), итеративно по уровням подразбиения, без рекурсии;
//! - [`CoherentNoise`] — когерентный шум `FastNoiseLite` с фрактальными октавами.
//!
//! Граничные условия ([`BoundaryConditions`]) задают зацикливание краёв и
//! закреплённые значения на границе для сшивки тайлов.

use crate::error::{MapgenError, Result};
use crate::random::RandomSource;
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Проверяет, что `size = 2^k + 1`, `k >= 1`.
pub fn validate_size(size: u32) -> Result<()> {
    if size >= 3 && (size - 1).is_power_of_two() {
        Ok(())
    } else {
        Err(MapgenError::InvalidSize { size })
    }
}

/// Граничные условия генерации
#[derive(Debug, Clone)]
pub struct BoundaryConditions {
    size: u32,
    /// Края склеены: столбец `size-1` повторяет столбец 0, строка `size-1` — строку 0
    pub wrap: bool,
    pinned: Vec<Option<f32>>,
}

impl BoundaryConditions {
    #[must_use]
    pub fn open(size: u32) -> Self {
        Self {
            size,
            wrap: false,
            pinned: vec![None; (size * size) as usize],
        }
    }

    #[must_use]
    pub fn wrapped(size: u32) -> Self {
        Self {
            wrap: true,
            ..Self::open(size)
        }
    }

    /// Закрепляет значение в точке: генератор его не перезапишет.
    pub fn pin(&mut self, x: u32, y: u32, value: f32) {
        self.pinned[(y * self.size + x) as usize] = Some(value);
    }

    #[must_use]
    pub fn pinned(&self, x: u32, y: u32) -> Option<f32> {
        self.pinned[(y * self.size + x) as usize]
    }

    #[must_use]
    pub fn has_pins(&self) -> bool {
        self.pinned.iter().any(Option::is_some)
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }
}

/// Генератор сырого поля высот в диапазоне `[low, high]`.
pub trait NoiseField {
    /// Возвращает `size * size` значений построчно.
    fn generate(
        &self,
        size: u32,
        low: f32,
        high: f32,
        boundary: &BoundaryConditions,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<f32>>;
}

/// Смещение средней точки (diamond-square).
#[derive(Debug, Clone, Copy)]
pub struct MidpointDisplacement {
    pub roughness: f32,
}

/// Сетка в процессе подразбиения: запись с зажимом, проверкой NaN,
/// уважением закреплённых точек и зеркалированием краёв.
struct Subdivision<'a> {
    size: u32,
    low: f32,
    high: f32,
    boundary: &'a BoundaryConditions,
    data: Vec<f32>,
}

impl Subdivision<'_> {
    fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.size + x) as usize]
    }

    fn set(&mut self, x: u32, y: u32, value: f32) -> Result<()> {
        let value = match self.boundary.pinned(x, y) {
            Some(pinned) => pinned,
            None => value,
        };
        if !value.is_finite() {
            return Err(MapgenError::NonFiniteHeight { x, y });
        }
        let value = value.clamp(self.low, self.high);
        let last = self.size - 1;
        self.data[(y * self.size + x) as usize] = value;

        if self.boundary.wrap {
            // Зеркалим край на противоположную сторону
            if x == 0 {
                self.mirror(last, y, value);
            }
            if y == 0 {
                self.mirror(x, last, value);
            }
            if x == 0 && y == 0 {
                self.mirror(last, last, value);
            }
        }
        Ok(())
    }

    /// Копия значения с противоположного края. Закреплённая точка остаётся за собой.
    fn mirror(&mut self, x: u32, y: u32, value: f32) {
        let value = self
            .boundary
            .pinned(x, y)
            .map_or(value, |pinned| pinned.clamp(self.low, self.high));
        self.data[(y * self.size + x) as usize] = value;
    }

    /// Среднее доступных соседей ромба: за краем — либо зацикливание, либо пропуск.
    fn edge_average(&self, x: u32, y: u32, half: u32) -> f32 {
        let last = self.size - 1;
        let mut sum = 0.0;
        let mut count = 0;
        for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let nx = i64::from(x) + dx * i64::from(half);
            let ny = i64::from(y) + dy * i64::from(half);
            let inside = (0..=i64::from(last)).contains(&nx) && (0..=i64::from(last)).contains(&ny);
            let (nx, ny) = if inside {
                (nx as u32, ny as u32)
            } else if self.boundary.wrap {
                // Период сетки — `last`, столбец `last` совпадает со столбцом 0
                (
                    nx.rem_euclid(i64::from(last)) as u32,
                    ny.rem_euclid(i64::from(last)) as u32,
                )
            } else {
                continue;
            };
            sum += self.get(nx, ny);
            count += 1;
        }
        sum / count as f32
    }
}

impl NoiseField for MidpointDisplacement {
    fn generate(
        &self,
        size: u32,
        low: f32,
        high: f32,
        boundary: &BoundaryConditions,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<f32>> {
        validate_size(size)?;
        if boundary.size() != size {
            return Err(MapgenError::SizeMismatch {
                expected: (size * size) as usize,
                actual: (boundary.size() * boundary.size()) as usize,
            });
        }

        let last = size - 1;
        let mut grid = Subdivision {
            size,
            low,
            high,
            boundary,
            data: vec![low; (size * size) as usize],
        };

        // === 1. Углы ===
        if boundary.wrap {
            let corner = rng.uniform_real(low, high);
            grid.set(0, 0, corner)?;
        } else {
            for (x, y) in [(0, 0), (last, 0), (0, last), (last, last)] {
                let corner = rng.uniform_real(low, high);
                grid.set(x, y, corner)?;
            }
        }

        // === 2. Подразбиение: уровень за уровнем вместо рекурсии ===
        let mut step = last;
        while step > 1 {
            let half = step / 2;
            let amplitude = self.roughness * step as f32;

            // Центры квадратов: среднее четырёх углов
            for y in (half..last).step_by(step as usize) {
                for x in (half..last).step_by(step as usize) {
                    let avg = (grid.get(x - half, y - half)
                        + grid.get(x + half, y - half)
                        + grid.get(x - half, y + half)
                        + grid.get(x + half, y + half))
                        / 4.0;
                    let offset = rng.uniform_real(-0.5, 0.5) * amplitude;
                    grid.set(x, y, avg + offset)?;
                }
            }

            // Середины рёбер: среднее вершин ромба
            for y in (0..=last).step_by(half as usize) {
                let x_start = if (y / half) % 2 == 0 { half } else { 0 };
                for x in (x_start..=last).step_by(step as usize) {
                    if boundary.wrap && (x == last || y == last) {
                        continue; // уже отзеркалено с противоположного края
                    }
                    let avg = grid.edge_average(x, y, half);
                    let offset = rng.uniform_real(-0.5, 0.5) * amplitude;
                    grid.set(x, y, avg + offset)?;
                }
            }

            step = half;
        }

        Ok(grid.data)
    }
}

/// Когерентный шум `OpenSimplex2` с фрактальными октавами `FBm`.
#[derive(Debug, Clone, Copy)]
pub struct CoherentNoise {
    pub octaves: i32,
    pub frequency: f32,
}

impl NoiseField for CoherentNoise {
    fn generate(
        &self,
        size: u32,
        low: f32,
        high: f32,
        boundary: &BoundaryConditions,
        rng: &mut dyn RandomSource,
    ) -> Result<Vec<f32>> {
        validate_size(size)?;

        let mut noise = FastNoiseLite::new();
        noise.set_seed(Some(
            rng.uniform_int(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        ));
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(self.octaves));
        noise.set_frequency(Some(self.frequency));

        let last = size - 1;
        let period = last as f32;
        // Цилиндрическая проекция: столбцы 0 и `last` попадают в одну точку
        let radius = period / (2.0 * std::f32::consts::PI);
        let wrap = boundary.wrap;

        let sample = |i: u32| -> f32 {
            let x = (i % size) as f32;
            let y = (i / size) as f32;
            let raw = if wrap {
                let angle = (x / period) * 2.0 * std::f32::consts::PI;
                noise.get_noise_3d(radius * angle.cos(), y, radius * angle.sin())
            } else {
                noise.get_noise_2d(x, y)
            };
            let unit = (raw + 1.0) * 0.5;
            low + unit * (high - low)
        };

        #[cfg(feature = "parallel")]
        let mut data: Vec<f32> = (0..size * size).into_par_iter().map(sample).collect();
        #[cfg(not(feature = "parallel"))]
        let mut data: Vec<f32> = (0..size * size).map(sample).collect();

        for y in 0..size {
            for x in 0..size {
                let idx = (y * size + x) as usize;
                if wrap && y == last {
                    // По вертикали шум не периодичен: склеиваем строки напрямую
                    data[idx] = data[x as usize];
                }
                if let Some(pinned) = boundary.pinned(x, y) {
                    data[idx] = pinned;
                }
                if !data[idx].is_finite() {
                    return Err(MapgenError::NonFiniteHeight { x, y });
                }
                data[idx] = data[idx].clamp(low, high);
            }
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::seeded_rng;

    #[test]
    fn sizes_must_be_power_of_two_plus_one() {
        for ok in [3, 5, 9, 17, 257, 1025] {
            assert!(validate_size(ok).is_ok(), "{ok}");
        }
        for bad in [0, 1, 2, 4, 6, 10, 256, 1024] {
            assert!(
                matches!(validate_size(bad), Err(MapgenError::InvalidSize { size }) if size == bad),
                "{bad}"
            );
        }
    }

    #[test]
    fn midpoint_fills_every_cell_in_range() {
        let field = MidpointDisplacement { roughness: 2.0 };
        let mut rng = seeded_rng(11);
        let data = field
            .generate(33, 0.0, 255.0, &BoundaryConditions::open(33), &mut rng)
            .unwrap();
        assert_eq!(data.len(), 33 * 33);
        assert!(data.iter().all(|v| (0.0..=255.0).contains(v)));
    }

    #[test]
    fn wrapped_midpoint_edges_match() {
        let field = MidpointDisplacement { roughness: 1.0 };
        let mut rng = seeded_rng(5);
        let size = 17;
        let data = field
            .generate(size, 0.0, 100.0, &BoundaryConditions::wrapped(size), &mut rng)
            .unwrap();
        let at = |x: u32, y: u32| data[(y * size + x) as usize];
        for i in 0..size {
            assert_eq!(at(0, i), at(size - 1, i));
            assert_eq!(at(i, 0), at(i, size - 1));
        }
    }

    #[test]
    fn pinned_values_survive_subdivision() {
        let size = 9;
        let mut boundary = BoundaryConditions::open(size);
        for x in 0..size {
            boundary.pin(x, 0, 42.0);
        }
        let field = MidpointDisplacement { roughness: 3.0 };
        let data = field
            .generate(size, 0.0, 255.0, &boundary, &mut seeded_rng(2))
            .unwrap();
        assert!(data[..size as usize].iter().all(|&v| v == 42.0));
    }

    #[test]
    fn wrapping_does_not_overwrite_pinned_far_edge() {
        let size = 9;
        let last = size - 1;
        let mut boundary = BoundaryConditions::wrapped(size);
        for i in 0..size {
            boundary.pin(last, i, 42.0);
            boundary.pin(i, last, 17.0);
        }
        let field = MidpointDisplacement { roughness: 3.0 };
        let data = field
            .generate(size, 0.0, 255.0, &boundary, &mut seeded_rng(8))
            .unwrap();
        let at = |x: u32, y: u32| data[(y * size + x) as usize];
        for i in 0..last {
            assert_eq!(at(last, i), 42.0);
            assert_eq!(at(i, last), 17.0);
        }
        // Угол закреплён дважды, побеждает последний pin
        assert_eq!(at(last, last), 17.0);
    }

    #[test]
    fn nan_roughness_is_rejected() {
        let field = MidpointDisplacement { roughness: f32::NAN };
        let result = field.generate(5, 0.0, 1.0, &BoundaryConditions::open(5), &mut seeded_rng(0));
        assert!(matches!(result, Err(MapgenError::NonFiniteHeight { .. })));
    }

    #[test]
    fn coherent_noise_is_deterministic_and_bounded() {
        let field = CoherentNoise {
            octaves: 4,
            frequency: 0.05,
        };
        let boundary = BoundaryConditions::wrapped(17);
        let a = field.generate(17, -1.0, 1.0, &boundary, &mut seeded_rng(9)).unwrap();
        let b = field.generate(17, -1.0, 1.0, &boundary, &mut seeded_rng(9)).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
        for y in 0..17 {
            let row = y * 17;
            assert!((a[row] - a[row + 16]).abs() < 1e-3);
        }
    }
}
