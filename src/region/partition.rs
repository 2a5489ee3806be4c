use crate::heightmap::HeightField;
use crate::random::RandomSource;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashSet;

/// Случайные центры регионов, не более одного на пиксель.
pub fn scatter_sites(count: usize, width: u32, height: u32, rng: &mut dyn RandomSource) -> Vec<(f32, f32)> {
    let capacity = (width * height) as usize;
    let target = count.min(capacity);
    let mut used = HashSet::with_capacity(target);
    let mut sites = Vec::with_capacity(target);

    // Попыток с запасом: при плотной выборке часть попадает в занятые пиксели
    let mut attempts = target * 8;
    while sites.len() < target && attempts > 0 {
        attempts -= 1;
        let x = rng.uniform_real(0.0, width as f32);
        let y = rng.uniform_real(0.0, height as f32);
        let pixel = (x as u32).min(width - 1) + (y as u32).min(height - 1) * width;
        if used.insert(pixel) {
            sites.push((x, y));
        }
    }
    sites
}

/// Разбиение Вороного: каждый пиксель получает индекс ближайшего центра.
/// С `wrap` расстояние считается на торе.
pub fn voronoi_partition(width: u32, height: u32, sites: &[(f32, f32)], wrap: bool) -> Vec<u32> {
    let w = width as f32;
    let h = height as f32;
    let axis = |d: f32, period: f32| -> f32 {
        let d = d.abs();
        if wrap { d.min(period - d) } else { d }
    };

    let nearest = |i: u32| -> u32 {
        let px = (i % width) as f32 + 0.5;
        let py = (i / width) as f32 + 0.5;
        let mut min_d2 = f32::MAX;
        let mut best = 0;
        for (sid, &(cx, cy)) in sites.iter().enumerate() {
            let d2 = axis(px - cx, w).powi(2) + axis(py - cy, h).powi(2);
            if d2 < min_d2 {
                min_d2 = d2;
                best = sid as u32;
            }
        }
        best
    };

    #[cfg(feature = "parallel")]
    let labels = (0..width * height).into_par_iter().map(nearest).collect();
    #[cfg(not(feature = "parallel"))]
    let labels = (0..width * height).map(nearest).collect();
    labels
}

/// Высота каждого центра, взятая из пикселя под ним.
pub fn site_elevations(field: &HeightField, sites: &[(f32, f32)]) -> Vec<f32> {
    sites
        .iter()
        .map(|&(x, y)| {
            let px = (x as u32).min(field.width - 1);
            let py = (y as u32).min(field.height - 1);
            field.get(px, py)
        })
        .collect()
}
