//! Path geometry: segments, bounds, hit distances and rectangle handling.

use super::item::Corner;
use kurbo::{BezPath, Ellipse, PathEl, Point, Rect, Shape, Vec2};
use serde::{Deserialize, Serialize};

/// Flattening tolerance used for hit-testing curved outlines.
const FLATTEN_TOLERANCE: f64 = 0.25;

/// How segment points are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathCurve {
    /// Straight lines between consecutive segments.
    #[default]
    Polyline,
    /// Ellipse through four cardinal segments (top, right, bottom, left).
    Ellipse,
}

/// A path made of segment points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathData {
    pub segments: Vec<Point>,
    pub closed: bool,
    #[serde(default)]
    pub curve: PathCurve,
}

impl PathData {
    pub fn polyline(segments: Vec<Point>) -> Self {
        Self {
            segments,
            closed: false,
            curve: PathCurve::Polyline,
        }
    }

    /// Closed rectangle starting at the top-left corner, clockwise.
    pub fn rectangle(rect: Rect) -> Self {
        Self {
            segments: vec![
                Point::new(rect.x0, rect.y0),
                Point::new(rect.x1, rect.y0),
                Point::new(rect.x1, rect.y1),
                Point::new(rect.x0, rect.y1),
            ],
            closed: true,
            curve: PathCurve::Polyline,
        }
    }

    /// Ellipse inscribed in `rect`.
    pub fn ellipse(rect: Rect) -> Self {
        let c = rect.center();
        Self {
            segments: vec![
                Point::new(c.x, rect.y0),
                Point::new(rect.x1, c.y),
                Point::new(c.x, rect.y1),
                Point::new(rect.x0, c.y),
            ],
            closed: true,
            curve: PathCurve::Ellipse,
        }
    }

    pub fn bounds(&self) -> Rect {
        let mut iter = self.segments.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    /// Outline for rendering and hit-testing.
    pub fn to_bez_path(&self) -> BezPath {
        match self.curve {
            PathCurve::Ellipse => Ellipse::from_rect(self.bounds()).to_path(0.1),
            PathCurve::Polyline => {
                let mut path = BezPath::new();
                if let Some((first, rest)) = self.segments.split_first() {
                    path.move_to(*first);
                    for p in rest {
                        path.line_to(*p);
                    }
                    if self.closed {
                        path.close_path();
                    }
                }
                path
            }
        }
    }

    /// Distance from `point` to the stroked outline.
    pub fn stroke_distance(&self, point: Point) -> f64 {
        if self.segments.len() == 1 {
            return self.segments[0].distance(point);
        }
        let mut best = f64::INFINITY;
        let mut polyline: Vec<Point> = Vec::new();
        let mut start = None;
        kurbo::flatten(self.to_bez_path(), FLATTEN_TOLERANCE, |el| match el {
            PathEl::MoveTo(p) => {
                best = best.min(point_to_polyline_dist(point, &polyline));
                polyline.clear();
                polyline.push(p);
                start = Some(p);
            }
            PathEl::LineTo(p) => polyline.push(p),
            PathEl::ClosePath => {
                if let Some(s) = start {
                    polyline.push(s);
                }
            }
            _ => {}
        });
        best.min(point_to_polyline_dist(point, &polyline))
    }

    /// Whether `point` lies inside the filled area. Open paths have no interior.
    pub fn fill_contains(&self, point: Point) -> bool {
        self.closed && self.segments.len() > 2 && self.to_bez_path().contains(point)
    }

    pub fn translate(&mut self, delta: Vec2) {
        for p in &mut self.segments {
            *p += delta;
        }
    }

    /// Straight-line length of the outline.
    pub fn length(&self) -> f64 {
        let mut len: f64 = self.segments.windows(2).map(|w| w[0].distance(w[1])).sum();
        if self.closed && self.segments.len() > 2 {
            if let (Some(first), Some(last)) = (self.segments.first(), self.segments.last()) {
                len += last.distance(*first);
            }
        }
        len
    }

    /// True for a closed four-segment polyline whose edges are axis aligned.
    pub fn is_rectangle(&self) -> bool {
        if !self.closed || self.segments.len() != 4 || self.curve != PathCurve::Polyline {
            return false;
        }
        let aligned = |a: Point, b: Point| {
            (a.x - b.x).abs() < 1e-9 || (a.y - b.y).abs() < 1e-9
        };
        let s = &self.segments;
        let edges_aligned = (0..4).all(|i| aligned(s[i], s[(i + 1) % 4]));
        let bounds = self.bounds();
        let corners_on_bounds = s.iter().all(|p| {
            ((p.x - bounds.x0).abs() < 1e-9 || (p.x - bounds.x1).abs() < 1e-9)
                && ((p.y - bounds.y0).abs() < 1e-9 || (p.y - bounds.y1).abs() < 1e-9)
        });
        edges_aligned && corners_on_bounds
    }

    /// Rewrite the four corners of a rectangle path from `rect`, keeping each
    /// segment on the corner it occupied before.
    pub fn set_rect(&mut self, rect: Rect) {
        let old = self.bounds();
        for p in &mut self.segments {
            *p = Corner::classify(old, *p).of(rect);
        }
    }
}

/// Distance from a point to a line segment.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    point.distance(proj)
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}
