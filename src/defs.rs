//
// fmg_r - face morph generation
// Copyright (c) 2017 Filip Szczerek <ga.software@yahoo.com>
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//
//
// File description:
//   Common definitions.
//

use crate::error::MorphError;
use crate::image::Image;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};
use thiserror::Error;


/// Point with floating-point coordinates in raster pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointFlt {
    pub x: f32,
    pub y: f32
}


impl PointFlt {
    pub const fn new(x: f32, y: f32) -> PointFlt {
        PointFlt{ x, y }
    }


    /// Returns the point with both coordinates rounded down.
    pub fn floor(&self) -> Point {
        Point{ x: self.x.floor() as i32, y: self.y.floor() as i32 }
    }
}


impl From<Point> for PointFlt {
    fn from(p: Point) -> PointFlt {
        PointFlt{ x: p.x as f32, y: p.y as f32 }
    }
}


impl Add for PointFlt {
    type Output = PointFlt;

    fn add(self, other: PointFlt) -> PointFlt {
        PointFlt{ x: self.x + other.x, y: self.y + other.y }
    }
}


impl Sub for PointFlt {
    type Output = PointFlt;

    fn sub(self, other: PointFlt) -> PointFlt {
        PointFlt{ x: self.x - other.x, y: self.y - other.y }
    }
}


impl Mul<f32> for PointFlt {
    type Output = PointFlt;

    fn mul(self, s: f32) -> PointFlt {
        PointFlt{ x: self.x * s, y: self.y * s }
    }
}


impl std::fmt::Display for PointFlt {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "({:0.1}, {:0.1})", self.x, self.y)
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Point {
    pub x: i32,
    pub y: i32
}


impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}


impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}


impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "({}, {})", self.x, self.y)
    }
}


#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32
}


impl Rect {
    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x && p.x < self.x + self.width as i32 && p.y >= self.y && p.y < self.y + self.height as i32
    }


    pub fn get_pos(&self) -> Point { Point{ x: self.x, y: self.y } }


    /// Returns the smallest rectangle containing every pixel touched by `points`.
    ///
    /// The left/top edge is the floor of the minimum coordinate, the right/bottom edge
    /// (inclusive) is the floor of the maximum coordinate.
    ///
    pub fn bounding(points: &[PointFlt]) -> Rect {
        if points.is_empty() {
            return Rect::default();
        }

        let mut xmin = f32::MAX;
        let mut xmax = f32::MIN;
        let mut ymin = f32::MAX;
        let mut ymax = f32::MIN;
        for p in points {
            xmin = xmin.min(p.x);
            xmax = xmax.max(p.x);
            ymin = ymin.min(p.y);
            ymax = ymax.max(p.y);
        }

        let x = xmin.floor() as i32;
        let y = ymin.floor() as i32;

        Rect{ x, y,
              width: (xmax.floor() as i32 - x + 1) as u32,
              height: (ymax.floor() as i32 - y + 1) as u32 }
    }


    /// Returns the common part of `self` and `other` (if any).
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width as i32).min(other.x + other.width as i32);
        let y1 = (self.y + self.height as i32).min(other.y + other.height as i32);

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Rect{ x: x0, y: y0, width: (x1 - x0) as u32, height: (y1 - y0) as u32 })
        }
    }
}


/// Dimensions of the canvas shared by the images being morphed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    pub width: u32,
    pub height: u32
}


impl CanvasBounds {
    pub const fn new(width: u32, height: u32) -> CanvasBounds {
        CanvasBounds{ width, height }
    }


    pub fn as_rect(&self) -> Rect {
        Rect{ x: 0, y: 0, width: self.width, height: self.height }
    }


    /// Returns true if `p` lies within `[0, width) x [0, height)`.
    pub fn contains(&self, p: &PointFlt) -> bool {
        p.x >= 0.0 && p.x < self.width as f32 && p.y >= 0.0 && p.y < self.height as f32
    }


    pub fn contains_point(&self, p: &Point) -> bool {
        self.as_rect().contains_point(p)
    }
}


impl std::fmt::Display for CanvasBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}x{}", self.width, self.height)
    }
}


#[derive(Debug, Error)]
pub enum ProcessingError {
    /// There are no more steps in the current processing phase.
    #[error("no more steps")]
    NoMoreSteps,

    #[error(transparent)]
    MorphError(#[from] MorphError)
}


/// Represents a single processing phase.
pub trait ProcessingPhase {
    /// Executes one processing step.
    fn step(&mut self) -> Result<(), ProcessingError>;


    /// Returns the most recently produced image (if any). A step which produces
    /// no image leaves it unchanged.
    ///
    /// Can be used to show processing visualization.
    ///
    fn get_curr_img(&self) -> Option<&Image>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_rect_of_fractional_points() {
        let r = Rect::bounding(&[PointFlt::new(1.5, 2.2), PointFlt::new(4.9, 3.0), PointFlt::new(2.0, 7.99)]);
        assert_eq!(r, Rect{ x: 1, y: 2, width: 4, height: 6 });
    }

    #[test]
    fn rect_intersection() {
        let a = Rect{ x: -2, y: -2, width: 5, height: 5 };
        let b = Rect{ x: 0, y: 0, width: 10, height: 10 };
        assert_eq!(a.intersection(&b), Some(Rect{ x: 0, y: 0, width: 3, height: 3 }));
        let c = Rect{ x: 20, y: 0, width: 1, height: 1 };
        assert_eq!(b.intersection(&c), None);
    }

    #[test]
    fn canvas_bounds_are_half_open() {
        let b = CanvasBounds::new(10, 5);
        assert!(b.contains(&PointFlt::new(0.0, 0.0)));
        assert!(b.contains(&PointFlt::new(9.9, 4.9)));
        assert!(!b.contains(&PointFlt::new(10.0, 1.0)));
        assert!(!b.contains(&PointFlt::new(-0.1, 1.0)));
        assert!(b.contains_point(&Point{ x: 9, y: 4 }));
        assert!(!b.contains_point(&Point{ x: 9, y: 5 }));
    }
}
