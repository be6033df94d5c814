/// Cell values a grid stencil can add and scale.
///
/// Heights are stored as `f32`; normals, noise, warp, erosion and restriction
/// data use four channels.
pub trait Texel: Copy + Default + Send + Sync + 'static {
    fn add(self, other: Self) -> Self;
    fn scale(self, factor: f32) -> Self;

    fn lerp(self, other: Self, t: f32) -> Self {
        self.scale(1.0 - t).add(other.scale(t))
    }
}

impl Texel for f32 {
    #[inline]
    fn add(self, other: Self) -> Self {
        self + other
    }

    #[inline]
    fn scale(self, factor: f32) -> Self {
        self * factor
    }
}

macro_rules! impl_texel_array {
    ($($n:literal),*) => {
        $(
            impl Texel for [f32; $n] {
                #[inline]
                fn add(self, other: Self) -> Self {
                    let mut out = self;
                    for (o, v) in out.iter_mut().zip(other) {
                        *o += v;
                    }
                    out
                }

                #[inline]
                fn scale(self, factor: f32) -> Self {
                    self.map(|v| v * factor)
                }
            }
        )*
    };
}

impl_texel_array!(2, 4);

/// Four-channel cell used by every auxiliary grid.
pub type Cell = [f32; 4];

/// A square-or-rectangular 2D grid stored row-major. Edges clamp, nothing wraps.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }

    /// Allocate a `size x size` grid, the shape every multigrid level uses.
    pub fn square(size: usize) -> Self {
        Self::new(size, size)
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` when the length is wrong.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self { width, height, data })
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Bounds-checked access with signed coordinates.
    #[inline]
    pub fn try_get(&self, x: i64, y: i64) -> Option<&T> {
        if self.contains(x, y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Read with clamp-to-edge addressing, the boundary rule of every stencil.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> &T {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.get(cx, cy)
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Build a new grid of the same shape by mapping every cell.
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl Grid<f32> {
    /// Sample at fractional coordinates with bilinear interpolation, clamped at edges.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;

        let v00 = *self.get(x0, y0);
        let v10 = *self.get(x1, y0);
        let v01 = *self.get(x0, y1);
        let v11 = *self.get(x1, y1);

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        v0 * (1.0 - fy) + v1 * fy
    }

    pub fn min_max(&self) -> (f32, f32) {
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;
        for &v in &self.data {
            if v < min_v {
                min_v = v;
            }
            if v > max_v {
                max_v = v;
            }
        }
        (min_v, max_v)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_reads_stay_on_edge() {
        let mut grid = Grid::new_with(3, 3, 0.0f32);
        grid.set(0, 0, 5.0);
        grid.set(2, 2, 7.0);

        assert_eq!(*grid.get_clamped(-4, -1), 5.0);
        assert_eq!(*grid.get_clamped(10, 9), 7.0);
        assert!(grid.try_get(3, 0).is_none());
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut grid = Grid::new_with(2, 2, 0.0f32);
        grid.set(1, 0, 1.0);
        grid.set(0, 1, 1.0);
        grid.set(1, 1, 2.0);

        assert!((grid.sample_bilinear(0.5, 0.5) - 1.0).abs() < 1e-6);
        assert!((grid.sample_bilinear(-3.0, 0.0)).abs() < 1e-6);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(Grid::from_vec(2, 2, vec![0.0f32; 3]).is_none());
        assert!(Grid::from_vec(2, 2, vec![0.0f32; 4]).is_some());
    }

    #[test]
    fn test_texel_array_ops() {
        let a: Cell = [1.0, 2.0, 3.0, 4.0];
        let b: Cell = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(a.add(b), [2.0, 3.0, 4.0, 5.0]);
        assert_eq!(a.lerp(b, 1.0), b);
    }
}
