//! Planar geometry in image pixel coordinates.
//!
//! - `Point`: integer pixel position (x to the right, y down).
//! - `Rect`: axis-aligned box `(x, y, w, h)`; containment is inclusive on all edges.
//! - `ParkingArea`: the ordered 4-corner polygon detections are restricted to.

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[i32; 2]> for Point {
    fn from(value: [i32; 2]) -> Self {
        Point::new(value[0], value[1])
    }
}

/// Axis-aligned rectangle. `x + w` / `y + h` are the far edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Center with integer halving, the same rounding the detector uses for centroids.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Inclusive containment: a point on any edge is inside.
    pub fn contains(&self, p: Point) -> bool {
        self.x <= p.x && p.x <= self.right() && self.y <= p.y && p.y <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }
}

impl From<[i32; 4]> for Rect {
    fn from(value: [i32; 4]) -> Self {
        Rect::new(value[0], value[1], value[2], value[3])
    }
}

/// Ray-casting containment test.
///
/// An edge toggles the result when the test point's `y` lies in the half-open
/// span `(min_y, max_y]` of the edge and the point is left of (or on) the
/// edge's x-intercept at that `y`. Horizontal edges can never satisfy the span
/// test, so they never contribute; the intercept is computed per edge.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let (x, y) = (p.x as f64, p.y as f64);
    let mut inside = false;

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        let (ax, ay, bx, by) = (a.x as f64, a.y as f64, b.x as f64, b.y as f64);

        if y <= ay.min(by) || y > ay.max(by) || x > ax.max(bx) {
            continue;
        }
        if ay == by {
            continue;
        }
        if ax == bx {
            inside = !inside;
            continue;
        }
        let x_intercept = (y - ay) * (bx - ax) / (by - ay) + ax;
        if x <= x_intercept {
            inside = !inside;
        }
    }
    inside
}

/// The monitored lot outline: four corners, clockwise from top-left.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingArea {
    corners: [Point; 4],
}

impl ParkingArea {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    pub fn from_points(points: &[Point]) -> Result<Self> {
        let corners: [Point; 4] = points.try_into().map_err(|_| {
            anyhow!(
                "parking area needs exactly 4 corners, got {}",
                points.len()
            )
        })?;
        Ok(Self { corners })
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn contains(&self, p: Point) -> bool {
        point_in_polygon(p, &self.corners)
    }

    /// Shortest distance from `p` to any of the four edge lines.
    ///
    /// Distances are measured to the infinite line through each edge. Degenerate
    /// edges (both corners equal) are ignored.
    pub fn distance_to_boundary(&self, p: Point) -> f64 {
        let (x, y) = (p.x as f64, p.y as f64);
        let mut best = f64::INFINITY;
        for i in 0..4 {
            let p1 = self.corners[i];
            let p2 = self.corners[(i + 1) % 4];
            let a = (p2.y - p1.y) as f64;
            let b = (p1.x - p2.x) as f64;
            let c = (p2.x as f64) * (p1.y as f64) - (p1.x as f64) * (p2.y as f64);
            let norm = (a * a + b * b).sqrt();
            if norm == 0.0 {
                continue;
            }
            best = best.min((a * x + b * y + c).abs() / norm);
        }
        best
    }

    /// Rasterise the polygon into a 0/255 mask of the given size.
    ///
    /// The outline itself is filled, so pixels on an edge count as inside.
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        let mut outline: Vec<PixelPoint<i32>> = Vec::with_capacity(4);
        for c in &self.corners {
            let p = PixelPoint::new(c.x, c.y);
            if outline.last() != Some(&p) {
                outline.push(p);
            }
        }
        while outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        match outline.as_slice() {
            [] => {}
            [p] => {
                if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
                    mask.put_pixel(p.x as u32, p.y as u32, Luma([255]));
                }
            }
            poly => draw_polygon_mut(&mut mask, poly, Luma([255])),
        }
        mask
    }
}
