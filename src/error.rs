//! Ошибки генерации мира
//!
//! Все стадии конвейера возвращают [`MapgenError`]. Числовые проблемы
//! (NaN, выход за диапазон) отлавливаются в момент присваивания значения,
//! а не всплывают позже в гидрологии.

use thiserror::Error;

/// Ошибки, возникающие при генерации рельефа и гидрологии.
#[derive(Error, Debug)]
pub enum MapgenError {
    /// Размер сетки не равен 2^k+1 или не положителен.
    #[error("invalid heightmap size {size}: expected 2^k+1 with k >= 1")]
    InvalidSize { size: u32 },

    /// Диапазон высот пуст или содержит не конечные границы.
    #[error("invalid height range [{low}, {high}]")]
    InvalidRange { low: f32, high: f32 },

    /// Пользовательский мутатор вернул значения вне [low, high].
    /// Значения зажимаются; ошибка возвращается только в строгом режиме.
    #[error("{count} value(s) outside [{low}, {high}] were clamped")]
    RangeViolation { count: usize, low: f32, high: f32 },

    /// В сетку пытались записать NaN или бесконечность.
    #[error("non-finite height at ({x}, {y})")]
    NonFiniteHeight { x: u32, y: u32 },

    /// Размеры входных данных не согласованы между собой.
    #[error("size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Клетка попала в две реки: это ошибка логики построения, а не данных.
    #[error("cell {cell} is already assigned to river segment {segment}")]
    DuplicateRiverAssignment { cell: usize, segment: usize },

    /// Озеро так и не нашло точку перелива за отведённое число подъёмов уровня.
    #[error("no spill point found for basin at cell {cell} after {levels} level increments")]
    NoSpillFound { cell: usize, levels: u32 },

    /// Накопление стока не сошлось за ограниченное число проходов.
    #[error("flow accumulation did not converge after {passes} passes")]
    FlowDidNotConverge { passes: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, MapgenError>;
