//! ASCII plotting for terminal output.
//!
//! Fixed-size grid, optimized for:
//! - quick visual sanity checks of basis functions
//! - deterministic output (helpful for golden tests)
//!
//! Each selected `u_l(x)` is drawn with its own glyph on `[-1, 1]`.

use crate::basis::IrBasis;
use crate::error::AppError;

const GLYPHS: [char; 8] = ['*', 'o', '+', 'x', '#', '@', '%', '&'];

/// Glyph used for the `i`-th plotted function.
pub fn glyph(i: usize) -> char {
    GLYPHS[i % GLYPHS.len()]
}

/// Plot `u_l(x)` for every `l` in `functions`.
pub fn render_ascii_plot(
    basis: &IrBasis,
    functions: &[usize],
    width: usize,
    height: usize,
) -> Result<String, AppError> {
    let width = width.max(10);
    let height = height.max(5);

    let mut curves = Vec::with_capacity(functions.len());
    for &l in functions {
        let mut points = Vec::with_capacity(width);
        for i in 0..width {
            let x = -1.0 + 2.0 * i as f64 / (width as f64 - 1.0);
            points.push((x, basis.value(x, l)?));
        }
        curves.push((l, points));
    }

    let (y_min, y_max) = y_range(&curves).unwrap_or((-1.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Zero line first so the curves overlay it.
    if y_min < 0.0 && y_max > 0.0 {
        let row = map_y(0.0, y_min, y_max, height);
        for cell in grid[row].iter_mut() {
            *cell = '.';
        }
    }

    for (i, (_, points)) in curves.iter().enumerate() {
        draw_curve(&mut grid, points, y_min, y_max, glyph(i));
    }

    let mut out = String::new();
    out.push_str(&format!("Plot: x=[-1, 1] | y=[{y_min:.3}, {y_max:.3}]\n"));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    let legend: Vec<String> = curves
        .iter()
        .enumerate()
        .map(|(i, (l, _))| format!("{} u_{l}", glyph(i)))
        .collect();
    out.push_str(&format!("Legend: {}\n", legend.join("  ")));

    Ok(out)
}

fn y_range(curves: &[(usize, Vec<(f64, f64)>)]) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (_, points) in curves {
        for &(_, y) in points {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x + 1.0) / 2.0).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], points: &[(f64, f64)], y_min: f64, y_max: f64, ch: char) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in points {
        let col = map_x(x, width);
        let row = map_y(y, y_min, y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, ch),
            None => grid[row][col] = ch,
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
