//! Integer coordinate types shared between the kernel and its hosts.
//!
//! World space is measured in world units (`UNITS_PER_CELL` per cell edge),
//! the map grid in cells, and the screen in pixels.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use crate::constants::UNITS_PER_CELL;

/// Position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WPos {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
    /// Height above ground
    pub z: i32,
}

impl WPos {
    /// Creates a new world position
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World origin
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Returns the cell containing this position (height ignored).
    #[inline]
    #[must_use]
    pub const fn to_cell(self) -> CPos {
        CPos::new(
            self.x.div_euclid(UNITS_PER_CELL),
            self.y.div_euclid(UNITS_PER_CELL),
        )
    }
}

impl Add<WVec> for WPos {
    type Output = Self;
    fn add(self, rhs: WVec) -> Self {
        Self::new(
            self.x.wrapping_add(rhs.x),
            self.y.wrapping_add(rhs.y),
            self.z.wrapping_add(rhs.z),
        )
    }
}

impl Sub for WPos {
    type Output = WVec;
    fn sub(self, rhs: Self) -> WVec {
        WVec::new(
            self.x.wrapping_sub(rhs.x),
            self.y.wrapping_sub(rhs.y),
            self.z.wrapping_sub(rhs.z),
        )
    }
}

/// Offset in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WVec {
    /// X offset
    pub x: i32,
    /// Y offset
    pub y: i32,
    /// Z offset
    pub z: i32,
}

impl WVec {
    /// Creates a new world offset
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Zero offset
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Horizontal length squared (avoids sqrt, never overflows)
    #[must_use]
    pub const fn horizontal_length_squared(self) -> i64 {
        let x = self.x as i64;
        let y = self.y as i64;
        x * x + y * y
    }
}

/// Cell on the map grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CPos {
    /// Column
    pub x: i32,
    /// Row
    pub y: i32,
}

impl CPos {
    /// Creates a new cell position
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// World position at the centre of this cell (ground level).
    #[inline]
    #[must_use]
    pub const fn center(self) -> WPos {
        WPos::new(
            self.x * UNITS_PER_CELL + UNITS_PER_CELL / 2,
            self.y * UNITS_PER_CELL + UNITS_PER_CELL / 2,
            0,
        )
    }

    /// Returns the cell offset by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Point in screen space (pixels).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Int2 {
    /// X pixel
    pub x: i32,
    /// Y pixel
    pub y: i32,
}

impl Int2 {
    /// Creates a new screen point
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Screen origin
    pub const ZERO: Self = Self::new(0, 0);

    /// Squared distance to another point
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }
}

/// Size of a screen rectangle (pixels).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Size {
    /// Creates a new size
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Empty size
    pub const EMPTY: Self = Self::new(0, 0);

    /// True when either dimension is zero or negative.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Axis-aligned screen rectangle. Right and bottom edges are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle of `size` centred on `center`.
    #[must_use]
    pub const fn centered(center: Int2, size: Size) -> Self {
        Self::new(
            center.x - size.width / 2,
            center.y - size.height / 2,
            size.width,
            size.height,
        )
    }

    /// Right edge (exclusive)
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    /// Centre point
    #[must_use]
    pub const fn center(self) -> Int2 {
        Int2::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// True when the rectangle covers no pixels.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when `point` lies inside the rectangle.
    #[inline]
    #[must_use]
    pub const fn contains(self, point: Int2) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// True when the rectangles overlap.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_of_negative_position() {
        assert_eq!(WPos::new(-1, -1, 0).to_cell(), CPos::new(-1, -1));
        assert_eq!(WPos::new(1023, 1024, 0).to_cell(), CPos::new(0, 1));
    }

    #[test]
    fn test_cell_center_roundtrip() {
        let cell = CPos::new(7, -3);
        assert_eq!(cell.center().to_cell(), cell);
    }

    #[test]
    fn test_rect_contains_is_half_open() {
        let rect = Rect::centered(Int2::new(10, 10), Size::new(4, 4));
        assert!(rect.contains(Int2::new(8, 8)));
        assert!(!rect.contains(Int2::new(12, 12)));
        assert!(Rect::new(0, 0, 0, 5).is_empty());
    }
}
