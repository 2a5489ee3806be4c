// src/config.rs
//! Конфигурация генерации мира
//!
//! Этот модуль определяет все параметры, управляющие генерацией:
//! - Рельеф: размер сетки, шероховатость, диапазон высот, тип шума, режим краёв
//! - Регионы: растр или разбиение Вороного, связность, уровень моря
//! - Гидрология: начальная вода, порог реки, ограничения итераций
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для удобной настройки через конфигурационные файлы.

use crate::error::Result;
use crate::grid::GridTopology;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Источник сырых высот
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum NoiseKind {
    /// Фрактальное смещение средней точки (diamond-square)
    #[default]
    MidpointDisplacement,
    /// Когерентный шум (`OpenSimplex2` + `FBm`)
    Coherent {
        #[serde(default = "default_octaves")]
        octaves: i32,
        #[serde(default = "default_frequency")]
        frequency: f32,
    },
}

fn default_octaves() -> i32 {
    5
}
fn default_frequency() -> f32 {
    0.01
}

/// Поведение на краях тайла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BoundaryMode {
    /// Края генерируются независимо, сглаживание учитывает только соседей внутри области
    #[default]
    Open,
    /// Края зеркалятся на противоположную сторону: тайл бесшовно повторяется
    Wrap,
    /// Края берутся у уже сгенерированных соседних тайлов
    Stitched,
}

/// Настройки рельефа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainSettings {
    /// Сторона квадратной сетки, обязана быть 2^k+1
    #[serde(default = "default_size")]
    pub size: u32,

    /// Амплитуда случайного смещения на единицу длины подразбиения
    #[serde(default = "default_roughness")]
    pub roughness: f32,

    /// Нижняя граница высот
    #[serde(default = "default_low")]
    pub low: f32,

    /// Верхняя граница высот
    #[serde(default = "default_high")]
    pub high: f32,

    #[serde(default)]
    pub noise: NoiseKind,

    #[serde(default)]
    pub boundary: BoundaryMode,

    /// Один проход сглаживания средним по 8 соседям
    #[serde(default = "default_true")]
    pub smoothing: bool,

    /// Заливка впадин перед построением регионов
    #[serde(default = "default_true")]
    pub fill_depressions: bool,

    /// Превращать зажатые значения мутатора в ошибку `RangeViolation`
    #[serde(default)]
    pub strict_range: bool,
}

fn default_size() -> u32 {
    257
}
fn default_roughness() -> f32 {
    2.0
}
fn default_low() -> f32 {
    0.0
}
fn default_high() -> f32 {
    255.0
}
fn default_true() -> bool {
    true
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            size: 257,
            roughness: 2.0,
            low: 0.0,
            high: 255.0,
            noise: NoiseKind::default(),
            boundary: BoundaryMode::default(),
            smoothing: true,
            fill_depressions: true,
            strict_range: false,
        }
    }
}

/// Как строятся клетки графа регионов
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RegionMode {
    /// Одна клетка на пиксель карты высот
    #[default]
    Raster,
    /// Клетки Вороного вокруг случайных центров
    Voronoi,
}

/// Уровень моря
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum SeaLevel {
    /// Средняя высота карты
    #[default]
    Mean,
    /// Фиксированное значение
    Fixed(f32),
}

/// Перепрофилирование суши: высота = уровень моря + расстояние до берега × градиент + шум
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReprofileSettings {
    #[serde(default = "default_gradient")]
    pub gradient: f32,
    #[serde(default = "default_jitter_min")]
    pub jitter_min: f32,
    #[serde(default = "default_jitter_max")]
    pub jitter_max: f32,
}

fn default_gradient() -> f32 {
    7.0
}
fn default_jitter_min() -> f32 {
    1.0
}
fn default_jitter_max() -> f32 {
    3.9
}

impl Default for ReprofileSettings {
    fn default() -> Self {
        Self {
            gradient: 7.0,
            jitter_min: 1.0,
            jitter_max: 3.9,
        }
    }
}

/// Настройки графа регионов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSettings {
    #[serde(default)]
    pub mode: RegionMode,

    /// Связность и зацикливание для растрового режима и заливки впадин
    #[serde(default)]
    pub topology: GridTopology,

    #[serde(default)]
    pub sea_level: SeaLevel,

    /// Число центров Вороного (только для `RegionMode::Voronoi`)
    #[serde(default = "default_site_count")]
    pub site_count: usize,

    /// Если задано, высота суши переопределяется от береговой линии
    #[serde(default)]
    pub reprofile: Option<ReprofileSettings>,
}

fn default_site_count() -> usize {
    1000
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            mode: RegionMode::default(),
            topology: GridTopology::default(),
            sea_level: SeaLevel::default(),
            site_count: 1000,
            reprofile: None,
        }
    }
}

/// Настройки гидрологии
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HydrologySettings {
    /// Вода, изначально выпадающая на каждую клетку суши
    #[serde(default = "default_initial_water")]
    pub initial_water: f32,

    /// Минимальный сток, при котором клетка становится рекой
    #[serde(default = "default_river_threshold")]
    pub river_threshold: f32,

    /// Предел проходов накопления стока
    #[serde(default = "default_max_flow_passes")]
    pub max_flow_passes: u32,

    /// Шаг подъёма уровня воды при заполнении озера
    #[serde(default = "default_lake_level_step")]
    pub lake_level_step: f32,

    /// Предел подъёмов уровня, после которого бассейн считается бессточным
    #[serde(default = "default_max_lake_levels")]
    pub max_lake_levels: u32,

    /// Прокладывать реки из бессточных клеток через озёра
    #[serde(default = "default_true")]
    pub route_sinks: bool,
}

fn default_initial_water() -> f32 {
    5.0
}
fn default_river_threshold() -> f32 {
    50.0
}
fn default_max_flow_passes() -> u32 {
    10_000
}
fn default_lake_level_step() -> f32 {
    1.0
}
fn default_max_lake_levels() -> u32 {
    256
}

impl Default for HydrologySettings {
    fn default() -> Self {
        Self {
            initial_water: 5.0,
            river_threshold: 50.0,
            max_flow_passes: 10_000,
            lake_level_step: 1.0,
            max_lake_levels: 256,
            route_sinks: true,
        }
    }
}

/// Основные параметры генерации мира
///
/// Полная конфигурация одного запуска. Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationParams {
    /// Сид генератора случайных чисел (детерминированная генерация)
    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub terrain: TerrainSettings,

    #[serde(default)]
    pub regions: RegionSettings,

    #[serde(default)]
    pub hydrology: HydrologySettings,
}

impl GenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # world.toml
    /// seed = 42
    ///
    /// [terrain]
    /// size = 129
    /// roughness = 1.5
    ///
    /// [hydrology]
    /// river_threshold = 80.0
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let params: Self = toml::from_str(contents)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Connectivity;

    #[test]
    fn empty_toml_gives_defaults() {
        let params = GenerationParams::from_toml_str("").unwrap();
        assert_eq!(params.seed, 0);
        assert_eq!(params.terrain, TerrainSettings::default());
        assert_eq!(params.regions, RegionSettings::default());
        assert_eq!(params.hydrology, HydrologySettings::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let params = GenerationParams::from_toml_str(
            r#"
            seed = 42

            [terrain]
            size = 129
            boundary = "Wrap"
            noise = { Coherent = { octaves = 3 } }

            [regions]
            mode = "Voronoi"
            sea_level = { Fixed = 120.0 }
            topology = { connectivity = "Eight" }
            reprofile = { gradient = 4.0 }

            [hydrology]
            river_threshold = 80.0
            "#,
        )
        .unwrap();

        assert_eq!(params.seed, 42);
        assert_eq!(params.terrain.size, 129);
        assert_eq!(params.terrain.roughness, 2.0);
        assert_eq!(params.terrain.boundary, BoundaryMode::Wrap);
        assert_eq!(
            params.terrain.noise,
            NoiseKind::Coherent {
                octaves: 3,
                frequency: 0.01
            }
        );
        assert_eq!(params.regions.mode, RegionMode::Voronoi);
        assert_eq!(params.regions.sea_level, SeaLevel::Fixed(120.0));
        assert_eq!(params.regions.topology.connectivity, Connectivity::Eight);
        assert!(!params.regions.topology.wrap);
        let reprofile = params.regions.reprofile.unwrap();
        assert_eq!(reprofile.gradient, 4.0);
        assert_eq!(reprofile.jitter_max, 3.9);
        assert_eq!(params.hydrology.river_threshold, 80.0);
        assert_eq!(params.hydrology.initial_water, 5.0);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = GenerationParams::from_toml_str("seed = \"abc\"").unwrap_err();
        assert!(matches!(err, crate::error::MapgenError::Config(_)));
    }
}
