//! 3-D dimension and coordinate types shared by grids and blocks

use std::fmt;

/// A 3-D extent or coordinate
///
/// Used both for grid/block dimensions and for block/thread coordinates
/// within those dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dim3 {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dim3 {
    /// Create a new 3-D extent
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Create a 1-D extent
    pub const fn linear(size: u32) -> Self {
        Self { x: size, y: 1, z: 1 }
    }

    /// Total number of elements in this extent
    pub const fn total(&self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }

    /// Linearize a coordinate within this extent (x fastest, z slowest)
    ///
    /// This is the deterministic CTA-id derivation: two launches of the
    /// same grid assign identical ids to identical block coordinates.
    pub const fn linear_index_of(&self, coord: Dim3) -> u64 {
        (coord.z as u64 * self.y as u64 + coord.y as u64) * self.x as u64 + coord.x as u64
    }

    /// Recover the coordinate for a linear index within this extent
    ///
    /// The extent must be non-degenerate (every component non-zero);
    /// degenerate extents are rejected at launch validation.
    pub const fn coord_of(&self, index: u64) -> Dim3 {
        debug_assert!(self.x > 0 && self.y > 0 && self.z > 0);
        let plane = self.x as u64 * self.y as u64;
        Dim3 {
            x: (index % self.x as u64) as u32,
            y: ((index % plane) / self.x as u64) as u32,
            z: (index / plane) as u32,
        }
    }

    /// Whether a coordinate lies inside this extent
    pub const fn contains(&self, coord: Dim3) -> bool {
        coord.x < self.x && coord.y < self.y && coord.z < self.z
    }
}

impl Default for Dim3 {
    fn default() -> Self {
        Self { x: 1, y: 1, z: 1 }
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        assert_eq!(Dim3::new(2, 3, 4).total(), 24);
        assert_eq!(Dim3::linear(32).total(), 32);
        assert_eq!(Dim3::default().total(), 1);
    }

    #[test]
    fn test_linear_index_roundtrip() {
        let grid = Dim3::new(4, 3, 2);
        for index in 0..grid.total() {
            let coord = grid.coord_of(index);
            assert!(grid.contains(coord));
            assert_eq!(grid.linear_index_of(coord), index);
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn test_coord_of_rejects_degenerate_extent() {
        Dim3::new(0, 1, 1).coord_of(0);
    }

    #[test]
    fn test_contains() {
        let grid = Dim3::new(2, 2, 1);
        assert!(grid.contains(Dim3::new(1, 1, 0)));
        assert!(!grid.contains(Dim3::new(2, 0, 0)));
        assert!(!grid.contains(Dim3::new(0, 0, 1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Dim3::new(8, 4, 1).to_string(), "(8, 4, 1)");
    }
}
