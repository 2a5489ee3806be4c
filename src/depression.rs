//! Заливка впадин (Priority-Flood + ε, Barnes et al.)
//!
//! Фронт растёт от границы области: всегда раскрывается самая низкая клетка
//! фронта. Сосед не выше раскрытой клетки поднимается до следующего
//! представимого значения над ней и уходит в FIFO-очередь «ямы», которая
//! обрабатывается раньше приоритетной очереди. После заливки у каждой
//! внутренней клетки есть строго убывающий путь к границе.
//!
//! Поэтому заливка может выйти за верх исходного диапазона: плато на `high`
//! поднимается на несколько ulp выше. Зажимать результат нельзя, иначе
//! пропадёт строгий спуск.

use crate::error::{MapgenError, Result};
use crate::grid::{GridTopology, is_border};
use crate::heightmap::HeightField;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use tracing::debug;

#[derive(Clone, Copy, Debug)]
struct HeapItem {
    height: f32,
    idx: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Min-heap по высоте, при равенстве по индексу: порядок детерминирован.
impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .height
            .total_cmp(&self.height)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Результат заливки
#[derive(Debug, Clone)]
pub struct FillOutcome {
    pub field: HeightField,
    /// Сколько клеток было поднято
    pub raised: usize,
}

/// Следующее представимое `f32` строго больше `v`.
pub fn next_up(v: f32) -> f32 {
    if v.is_nan() || v == f32::INFINITY {
        return v;
    }
    if v == 0.0 {
        // и +0.0, и -0.0
        return f32::from_bits(1);
    }
    let bits = v.to_bits();
    if v > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

/// Заливает впадины. Выход никогда не ниже входа.
pub fn fill_depressions(field: &HeightField, topology: GridTopology) -> Result<FillOutcome> {
    let width = field.width;
    let height = field.height;
    let total = (width * height) as usize;
    if field.data.len() != total {
        return Err(MapgenError::SizeMismatch {
            expected: total,
            actual: field.data.len(),
        });
    }

    let mut filled = field.data.clone();
    let mut closed = vec![false; total];
    let mut open = BinaryHeap::new();
    let mut pit = VecDeque::new();
    let mut raised = 0;

    // Все клетки границы служат стоками
    for y in 0..height {
        for x in 0..width {
            if is_border(x, y, width, height) {
                let idx = (y * width + x) as usize;
                closed[idx] = true;
                open.push(HeapItem {
                    height: filled[idx],
                    idx,
                });
            }
        }
    }

    loop {
        let idx = if let Some(idx) = pit.pop_front() {
            idx
        } else if let Some(HeapItem { idx, .. }) = open.pop() {
            idx
        } else {
            break;
        };
        let current = filled[idx];

        for n in topology.neighbor_indices(idx, width, height) {
            if closed[n] {
                continue;
            }
            closed[n] = true;
            if filled[n] <= current {
                filled[n] = next_up(current);
                raised += 1;
                pit.push_back(n);
            } else {
                open.push(HeapItem {
                    height: filled[n],
                    idx: n,
                });
            }
        }
    }

    debug!(raised, cells = total, "depressions filled");
    Ok(FillOutcome {
        field: HeightField {
            width,
            height,
            data: filled,
        },
        raised,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Connectivity;

    fn pit_grid() -> HeightField {
        let mut data = vec![10.0; 25];
        data[12] = 0.0;
        HeightField::from_data(5, 5, data).unwrap()
    }

    #[test]
    fn next_up_is_the_immediate_successor() {
        for v in [-3.5f32, -0.0, 0.0, 1.0, 10.0, 1e30] {
            assert!(next_up(v) > v);
        }
        assert_eq!(next_up(-1.0), -1.0 + f32::EPSILON / 2.0);
        assert_eq!(next_up(1.0), 1.0 + f32::EPSILON);
    }

    #[test]
    fn single_pit_is_raised_just_above_the_rim() {
        let topo = GridTopology::new(Connectivity::Four, false);
        let out = fill_depressions(&pit_grid(), topo).unwrap();
        // Плато растекается из первой раскрытой клетки (1, 1) по одному ulp за шаг
        let r1 = next_up(10.0);
        let r2 = next_up(r1);
        let r3 = next_up(r2);
        assert_eq!(out.field.get(1, 1), r1);
        assert_eq!(out.field.get(1, 2), r2);
        assert_eq!(out.field.get(2, 2), r3);
        assert_eq!(out.field.get(0, 0), 10.0);
        assert_eq!(out.raised, 9);
    }

    #[test]
    fn plateau_at_the_top_rises_by_a_few_ulps() {
        let high = 255.0;
        let field = HeightField::from_data(4, 4, vec![high; 16]).unwrap();
        let out = fill_depressions(&field, GridTopology::new(Connectivity::Four, false)).unwrap();
        assert_eq!(out.raised, 4);
        for &v in &out.field.data {
            assert!(v >= high);
            assert!(v - high < 1e-3);
        }
        assert!(out.field.data.iter().any(|&v| v > high));
    }

    #[test]
    fn filling_never_lowers_terrain() {
        let data: Vec<f32> = (0..64).map(|i| ((i * 37) % 17) as f32).collect();
        let field = HeightField::from_data(8, 8, data).unwrap();
        let out = fill_depressions(&field, GridTopology::new(Connectivity::Eight, false)).unwrap();
        assert!(out.field.data.iter().zip(&field.data).all(|(after, before)| after >= before));
    }

    #[test]
    fn second_pass_raises_nothing() {
        let data: Vec<f32> = (0..100).map(|i| ((i * 53) % 23) as f32).collect();
        let field = HeightField::from_data(10, 10, data).unwrap();
        for topo in [
            GridTopology::new(Connectivity::Four, false),
            GridTopology::new(Connectivity::Eight, false),
            GridTopology::new(Connectivity::Four, true),
        ] {
            let first = fill_depressions(&field, topo).unwrap();
            let second = fill_depressions(&first.field, topo).unwrap();
            assert_eq!(second.raised, 0);
            assert_eq!(second.field, first.field);
        }
    }

    #[test]
    fn mismatched_data_is_rejected() {
        let field = HeightField {
            width: 4,
            height: 4,
            data: vec![0.0; 3],
        };
        assert!(matches!(
            fill_depressions(&field, GridTopology::default()),
            Err(MapgenError::SizeMismatch { expected: 16, actual: 3 })
        ));
    }
}
