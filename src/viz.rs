//! Confusion-matrix heat-maps for the console and as PNG images.

use crate::error::{AapsoError, Result};
use crate::primitives::Matrix;
use image::{Rgb, RgbImage};
use std::fmt::Write as _;
use std::path::Path;

/// ANSI escape codes for terminal output
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
}

/// Shade glyphs from empty to full.
const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Pixel side of one cell in the PNG heat-map.
pub const CELL_PX: u32 = 24;

fn shade(value: usize, max: usize) -> char {
    if max == 0 || value == 0 {
        return SHADES[0];
    }
    let level = (value * (SHADES.len() - 1)).div_ceil(max);
    SHADES[level.min(SHADES.len() - 1)]
}

fn check_square(confusion: &Matrix<usize>, labels: &[String]) -> Result<()> {
    let (rows, cols) = confusion.shape();
    if rows != cols {
        return Err(AapsoError::dimension_mismatch("confusion columns", rows, cols));
    }
    if labels.len() != rows {
        return Err(AapsoError::dimension_mismatch("confusion labels", rows, labels.len()));
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Text heat-map: rows are true labels, columns predictions.
///
/// Each cell shows a shade proportional to its count and the count itself;
/// the diagonal is highlighted when `use_colors` is set.
///
/// # Errors
///
/// Returns an error if the matrix is not square or `labels` has the wrong
/// length.
pub fn render_confusion(
    confusion: &Matrix<usize>,
    labels: &[String],
    use_colors: bool,
) -> Result<String> {
    check_square(confusion, labels)?;
    let n = labels.len();
    let max = confusion.max_value();
    let label_w = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0).clamp(9, 12);
    let count_w = max.to_string().len().max(3);
    let cell_w = count_w + 2;

    let mut out = String::new();
    let _ = write!(out, "{:>label_w$} ", "true\\pred");
    for j in 0..n {
        let _ = write!(out, " {:>cell_w$}", truncate(&labels[j], cell_w));
    }
    out.push('\n');

    for i in 0..n {
        let _ = write!(out, "{:>label_w$} ", truncate(&labels[i], label_w));
        for j in 0..n {
            let v = confusion.get(i, j);
            let cell = format!("{}{:>count_w$}", shade(v, max), v);
            let cell = format!("{cell:>cell_w$}");
            if use_colors && i == j {
                let _ = write!(out, " {}{}{cell}{}", colors::BOLD, colors::BLUE, colors::RESET);
            } else if use_colors && v > 0 {
                let _ = write!(out, " {}{cell}{}", colors::CYAN, colors::RESET);
            } else if use_colors {
                let _ = write!(out, " {}{cell}{}", colors::DIM, colors::RESET);
            } else {
                let _ = write!(out, " {cell}");
            }
        }
        out.push('\n');
    }
    Ok(out)
}

/// Linear white-to-navy ramp for `t` in `[0, 1]`.
fn blues(t: f32) -> Rgb<u8> {
    const LOW: [f32; 3] = [247.0, 251.0, 255.0];
    const HIGH: [f32; 3] = [8.0, 48.0, 107.0];
    let t = t.clamp(0.0, 1.0);
    let c = |k: usize| (LOW[k] + (HIGH[k] - LOW[k]) * t).round() as u8;
    Rgb([c(0), c(1), c(2)])
}

/// Renders the matrix as an image: one `CELL_PX` square per cell, shaded by
/// row-normalized count, separated by one-pixel grid lines.
///
/// # Errors
///
/// Returns an error if the matrix is empty or not square.
pub fn confusion_image(confusion: &Matrix<usize>) -> Result<RgbImage> {
    let (rows, cols) = confusion.shape();
    if rows == 0 {
        return Err(AapsoError::empty_input("confusion matrix"));
    }
    if rows != cols {
        return Err(AapsoError::dimension_mismatch("confusion columns", rows, cols));
    }
    let totals = confusion.row_sums();
    let n = rows as u32;
    let side = n * (CELL_PX + 1) + 1;
    let grid = Rgb([200, 200, 200]);

    Ok(RgbImage::from_fn(side, side, |x, y| {
        if x % (CELL_PX + 1) == 0 || y % (CELL_PX + 1) == 0 {
            return grid;
        }
        let (i, j) = ((y / (CELL_PX + 1)) as usize, (x / (CELL_PX + 1)) as usize);
        let total = totals[i];
        let t = if total == 0 {
            0.0
        } else {
            confusion.get(i, j) as f32 / total as f32
        };
        blues(t)
    }))
}

/// Writes [`confusion_image`] as a PNG at `path`, creating parent
/// directories.
///
/// # Errors
///
/// Returns an error if the image cannot be built or written.
pub fn save_confusion_png<P: AsRef<Path>>(confusion: &Matrix<usize>, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    confusion_image(confusion)?
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| AapsoError::Image {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}
