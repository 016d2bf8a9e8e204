use glam::Vec2;

/// Circle shape in stage coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

/// Segment swept with a thickness (a capsule). `width` is the full thickness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthLine {
    pub start: Vec2,
    pub end: Vec2,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Line(WidthLine),
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self { center: Vec2::new(x, y), radius }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        self.center.distance_squared(p) <= self.radius * self.radius
    }
}

impl WidthLine {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, width: f32) -> Self {
        Self { start: Vec2::new(x1, y1), end: Vec2::new(x2, y2), width }
    }

    fn half_width(&self) -> f32 {
        self.width * 0.5
    }
}

impl Shape {
    /// Zero or negative radius/width shapes never take part in detection.
    pub fn is_degenerate(&self) -> bool {
        match self {
            Shape::Circle(c) => !(c.radius > 0.0) || !c.center.is_finite(),
            Shape::Line(l) => !(l.width > 0.0) || !l.start.is_finite() || !l.end.is_finite(),
        }
    }

    pub fn translated(&self, offset: Vec2) -> Shape {
        match *self {
            Shape::Circle(c) => Shape::Circle(Circle { center: c.center + offset, ..c }),
            Shape::Line(l) => Shape::Line(WidthLine { start: l.start + offset, end: l.end + offset, ..l }),
        }
    }

    /// Reference point used for spatial queries (circle centre, segment midpoint).
    pub fn anchor(&self) -> Vec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Line(l) => (l.start + l.end) * 0.5,
        }
    }

    /// Axis-aligned bounds as (min, max).
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match self {
            Shape::Circle(c) => (c.center - Vec2::splat(c.radius), c.center + Vec2::splat(c.radius)),
            Shape::Line(l) => {
                let pad = Vec2::splat(l.half_width());
                (l.start.min(l.end) - pad, l.start.max(l.end) + pad)
            }
        }
    }
}

pub fn circle_circle(a: &Circle, b: &Circle) -> bool {
    let reach = a.radius + b.radius;
    a.center.distance_squared(b.center) <= reach * reach
}

pub fn circle_line(c: &Circle, l: &WidthLine) -> bool {
    let reach = c.radius + l.half_width();
    point_segment_distance_squared(c.center, l.start, l.end) <= reach * reach
}

pub fn line_line(a: &WidthLine, b: &WidthLine) -> bool {
    let reach = a.half_width() + b.half_width();
    segment_segment_distance_squared(a.start, a.end, b.start, b.end) <= reach * reach
}

pub fn shapes_intersect(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Circle(a), Shape::Circle(b)) => circle_circle(a, b),
        (Shape::Circle(c), Shape::Line(l)) | (Shape::Line(l), Shape::Circle(c)) => circle_line(c, l),
        (Shape::Line(a), Shape::Line(b)) => line_line(a, b),
    }
}

/// Tests a shape against a query circle (used by bulk region queries).
pub fn shape_in_circle(shape: &Shape, region: &Circle) -> bool {
    match shape {
        Shape::Circle(c) => circle_circle(c, region),
        Shape::Line(l) => circle_line(region, l),
    }
}

pub fn point_segment_distance_squared(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

pub fn segment_segment_distance_squared(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> f32 {
    if segments_cross(p1, q1, p2, q2) {
        return 0.0;
    }
    point_segment_distance_squared(p1, p2, q2)
        .min(point_segment_distance_squared(q1, p2, q2))
        .min(point_segment_distance_squared(p2, p1, q1))
        .min(point_segment_distance_squared(q2, p1, q1))
}

fn segments_cross(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> bool {
    let d1 = (q1 - p1).perp_dot(p2 - p1);
    let d2 = (q1 - p1).perp_dot(q2 - p1);
    let d3 = (q2 - p2).perp_dot(p1 - p2);
    let d4 = (q2 - p2).perp_dot(q1 - p2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_circles_count_as_intersecting() {
        let a = Circle::new(0.0, 0.0, 5.0);
        let b = Circle::new(10.0, 0.0, 5.0);
        assert!(circle_circle(&a, &b));
        let c = Circle::new(10.001, 0.0, 5.0);
        assert!(!circle_circle(&a, &c));
    }

    #[test]
    fn zero_radius_points_only_hit_when_coincident() {
        let a = Circle::new(3.0, 4.0, 0.0);
        assert!(circle_circle(&a, &Circle::new(3.0, 4.0, 0.0)));
        assert!(!circle_circle(&a, &Circle::new(3.0, 4.5, 0.0)));
    }

    #[test]
    fn circle_against_line_uses_half_width() {
        let line = WidthLine::new(0.0, 0.0, 100.0, 0.0, 10.0);
        assert!(circle_line(&Circle::new(50.0, 8.0, 3.0), &line));
        assert!(!circle_line(&Circle::new(50.0, 8.5, 3.0), &line));
        // beyond the end cap
        assert!(!circle_line(&Circle::new(110.0, 0.0, 4.0), &line));
    }

    #[test]
    fn crossing_lines_intersect_regardless_of_width() {
        let a = WidthLine::new(-10.0, -10.0, 10.0, 10.0, 0.5);
        let b = WidthLine::new(-10.0, 10.0, 10.0, -10.0, 0.5);
        assert!(line_line(&a, &b));
        let c = WidthLine::new(-10.0, 20.0, 10.0, 20.0, 2.0);
        assert!(!line_line(&a, &c));
    }

    #[test]
    fn degenerate_shapes_are_flagged() {
        assert!(Shape::Circle(Circle::new(0.0, 0.0, 0.0)).is_degenerate());
        assert!(Shape::Line(WidthLine::new(0.0, 0.0, 1.0, 1.0, -1.0)).is_degenerate());
        assert!(!Shape::Circle(Circle::new(0.0, 0.0, 1.0)).is_degenerate());
    }
}
