//! World ground-plane coordinates to grid cells

use glam::Vec2;

/// Maps world x/z onto one grid level.
///
/// The world square `[-terrain_size/2, terrain_size/2]` is stretched over
/// `width` cells: `pixel = round((terrain_size/2 + coord) / (terrain_size/width))`, with
/// halves rounding to the even cell.
/// Every stage converts through this type so constraints line up exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelMapper {
    terrain_size: f32,
    width: usize,
}

impl PixelMapper {
    pub fn new(terrain_size: f32, width: usize) -> Self {
        Self { terrain_size, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// World units covered by one cell.
    pub fn cell_size(&self) -> f32 {
        self.terrain_size / self.width as f32
    }

    /// Unrounded raster coordinate. Cell `i` is centred on `i`.
    #[inline]
    pub fn to_raster(&self, coord: f32) -> f32 {
        (self.terrain_size * 0.5 + coord) * self.width as f32 / self.terrain_size
    }

    #[inline]
    pub fn to_pixel(&self, coord: f32) -> i64 {
        self.to_raster(coord).round_ties_even() as i64
    }

    pub fn ground_to_raster(&self, ground: Vec2) -> Vec2 {
        Vec2::new(self.to_raster(ground.x), self.to_raster(ground.y))
    }

    pub fn ground_to_pixel(&self, ground: Vec2) -> (i64, i64) {
        (self.to_pixel(ground.x), self.to_pixel(ground.y))
    }

    /// Cell index when inside the grid.
    pub fn in_bounds(&self, x: i64, y: i64) -> Option<(usize, usize)> {
        let w = self.width as i64;
        if x >= 0 && y >= 0 && x < w && y < w {
            Some((x as usize, y as usize))
        } else {
            None
        }
    }
}

/// Cell containing a world ground position on a grid of `width` cells.
pub fn world_to_pixel(terrain_size: f32, width: usize, x: f32, z: f32) -> (i64, i64) {
    PixelMapper::new(terrain_size, width).ground_to_pixel(Vec2::new(x, z))
}
