//! Heightmap export
//!
//! Raw buffers are row-major with no header; the reader must already know
//! the resolution. Float buffers are little-endian `f32`.

use std::fs;
use std::path::Path;

use image::{ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::{Result, TerrainError};
use crate::grid::Grid;

/// Write normalized heights as little-endian `f32`.
pub fn write_raw_f32(grid: &Grid<f32>, path: impl AsRef<Path>) -> Result<()> {
    let le: Vec<f32> = grid
        .as_slice()
        .iter()
        .map(|v| f32::from_bits(v.to_bits().to_le()))
        .collect();
    fs::write(path, bytemuck::cast_slice::<f32, u8>(&le))?;
    Ok(())
}

/// Read a `width x width` little-endian `f32` buffer.
pub fn read_raw_f32(path: impl AsRef<Path>, width: usize) -> Result<Grid<f32>> {
    let bytes = fs::read(path)?;
    decode_raw_f32(&bytes, width)
}

pub fn decode_raw_f32(bytes: &[u8], width: usize) -> Result<Grid<f32>> {
    let expected = width * width * std::mem::size_of::<f32>();
    if bytes.len() != expected {
        return Err(TerrainError::RawSizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    let values: Vec<f32> = bytemuck::pod_collect_to_vec::<u8, f32>(bytes)
        .into_iter()
        .map(|v| f32::from_bits(u32::from_le(v.to_bits())))
        .collect();
    Grid::from_vec(width, width, values).ok_or(TerrainError::RawSizeMismatch {
        expected,
        actual: bytes.len(),
    })
}

/// Write heights clamped to `[0, 1]` as one byte per cell.
pub fn write_raw_u8(grid: &Grid<f32>, path: impl AsRef<Path>) -> Result<()> {
    let bytes: Vec<u8> = grid.as_slice().iter().map(|v| to_u8(*v)).collect();
    fs::write(path, bytes)?;
    Ok(())
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// 16-bit grayscale PNG of heights clamped to `[0, 1]`.
pub fn export_png(grid: &Grid<f32>, path: impl AsRef<Path>) -> Result<()> {
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(grid.width as u32, grid.height as u32, |x, y| {
            let v = grid.get(x as usize, y as usize).clamp(0.0, 1.0);
            Luma([(v * u16::MAX as f32).round() as u16])
        });
    img.save(path)?;
    Ok(())
}

/// Colour preview, stretched over the grid's own min/max.
pub fn render_preview(grid: &Grid<f32>) -> RgbImage {
    let (min, max) = grid.min_max();
    let range = max - min;
    ImageBuffer::from_fn(grid.width as u32, grid.height as u32, |x, y| {
        if range < 1e-6 {
            return Rgb([128, 128, 128]);
        }
        let t = (grid.get(x as usize, y as usize) - min) / range;
        Rgb(spectral(t))
    })
}

pub fn export_preview(grid: &Grid<f32>, path: impl AsRef<Path>) -> Result<()> {
    render_preview(grid).save(path)?;
    Ok(())
}

/// Low to high: blue, cyan, green, yellow, red.
fn spectral(t: f32) -> [u8; 3] {
    const STOPS: [[f32; 3]; 6] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.90, 0.96, 0.60],
        [0.99, 0.68, 0.38],
        [0.62, 0.00, 0.26],
    ];
    let scaled = t.clamp(0.0, 1.0) * (STOPS.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(STOPS.len() - 2);
    let f = scaled - i as f32;
    let (a, b) = (STOPS[i], STOPS[i + 1]);
    [0, 1, 2].map(|c| ((a[c] + (b[c] - a[c]) * f) * 255.0).round() as u8)
}
