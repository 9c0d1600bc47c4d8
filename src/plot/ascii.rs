//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of a calibration in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each species density at a fixed momentum is drawn as a line with its own
//! marker (`1`, `2`, ...). Where curves overlap, the earlier species wins.

use crate::domain::AxisRange;
use crate::fit::density::CalibrationDensityFunction;

/// Marker characters per species, in species order.
const MARKERS: [char; 9] = ['1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// One curve to draw: legend name + density function.
pub struct DensityCurve<'a> {
    pub name: &'a str,
    pub density: &'a CalibrationDensityFunction,
}

/// Render every species density at momentum `p` over the m² axis.
pub fn render_density_plot(
    curves: &[DensityCurve<'_>],
    axis: &AxisRange,
    p: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let sampled: Vec<Vec<(f64, f64)>> = curves
        .iter()
        .map(|c| sample_density(c.density, p, axis.min, axis.max, width))
        .collect();

    let y_max = sampled
        .iter()
        .flatten()
        .map(|&(_, y)| y)
        .fold(0.0_f64, f64::max);
    let (y_min, y_max) = if y_max > 0.0 { pad_range(0.0, y_max, 0.05) } else { (0.0, 1.0) };

    let mut grid = vec![vec![' '; width]; height];
    for (i, points) in sampled.iter().enumerate() {
        let marker = MARKERS.get(i).copied().unwrap_or('*');
        draw_curve(&mut grid, points, axis.min, axis.max, y_min, y_max, marker);
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Density at p={p:.3} GeV/c | m2=[{:.3}, {:.3}] | y=[{y_min:.2}, {y_max:.2}]\n",
        axis.min, axis.max
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    for (i, c) in curves.iter().enumerate() {
        let marker = MARKERS.get(i).copied().unwrap_or('*');
        out.push_str(&format!("  {marker} {}\n", c.name));
    }

    out
}

fn sample_density(
    density: &CalibrationDensityFunction,
    p: f64,
    x_min: f64,
    x_max: f64,
    n: usize,
) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, density.eval(p, x))
        })
        .collect()
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y_max is row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    points: &[(f64, f64)],
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
    marker: char,
) {
    let height = grid.len();
    let width = grid.first().map_or(0, Vec::len);
    if width == 0 {
        return;
    }

    let mut prev = None;
    for &(x, y) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, marker),
            None => put(grid, col, row, marker),
        }
        prev = Some((col, row));
    }
}

fn put(grid: &mut [Vec<char>], x: usize, y: usize, ch: char) {
    if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
        if *cell == ' ' {
            *cell = ch;
        }
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let (mut x, mut y) = (x0 as isize, y0 as isize);
    let (x1, y1) = (x1 as isize, y1 as isize);

    let dx = (x1 - x).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let dy = -(y1 - y).abs();
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0 && y >= 0 {
            put(grid, x as usize, y as usize, ch);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GaussianParams;
    use crate::fit::density::DensitySlice;
    use crate::fit::partition::MomentumInterval;

    fn density(mean: f64) -> CalibrationDensityFunction {
        CalibrationDensityFunction::new(vec![DensitySlice {
            interval: MomentumInterval::new(0.0, 2.0).unwrap(),
            params: Some(GaussianParams {
                amplitude: 100.0,
                mean,
                sigma: 0.05,
            }),
        }])
        .unwrap()
    }

    #[test]
    fn peaks_land_in_the_right_columns() {
        let axis = AxisRange { min: 0.0, max: 1.0, bins: 100 };
        let a = density(0.0);
        let b = density(1.0);
        let curves = [
            DensityCurve { name: "light", density: &a },
            DensityCurve { name: "heavy", density: &b },
        ];
        let txt = render_density_plot(&curves, &axis, 1.0, 11, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 1 + 5 + 2);
        assert!(lines[0].starts_with("Density at p=1.000"));
        // top row holds both peaks: left edge for species 1, right edge for species 2
        assert!(lines[1].starts_with('1'));
        assert!(lines[1].ends_with('2'));
        assert_eq!(lines[6], "  1 light");
    }

    #[test]
    fn outside_coverage_is_flat() {
        let axis = AxisRange { min: 0.0, max: 1.0, bins: 100 };
        let a = density(0.5);
        let curves = [DensityCurve { name: "only", density: &a }];
        let txt = render_density_plot(&curves, &axis, 5.0, 10, 5);
        let lines: Vec<&str> = txt.lines().collect();
        assert!(lines[0].contains("y=[0.00, 1.00]"));
        assert_eq!(lines[5], "1111111111");
    }
}
