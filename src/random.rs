//! Детерминированный источник случайности
//!
//! Ядро никогда не использует глобальный генератор: каждая стадия получает
//! явный `&mut dyn RandomSource`. Любой [`rand::Rng`] подходит автоматически.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Источник равномерных случайных чисел.
pub trait RandomSource {
    /// Целое число из отрезка `[low, high]`. При `high < low` возвращает `low`.
    fn uniform_int(&mut self, low: i64, high: i64) -> i64;

    /// Вещественное число из полуинтервала `[low, high)`. При пустом интервале возвращает `low`.
    fn uniform_real(&mut self, low: f32, high: f32) -> f32;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn uniform_int(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.gen_range(low..=high)
    }

    fn uniform_real(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        self.gen_range(low..high)
    }
}

/// Генератор с фиксированным сидом: одинаковый сид даёт одинаковый мир.
#[must_use]
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
