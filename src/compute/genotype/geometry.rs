//! Body polygon geometry.
//!
//! Polygons are star-shaped around the origin: vertex `i` of `n` lies in the
//! angular sector `[i, i + 1) * 360° / n`, walked clockwise, so any choice of
//! radii keeps the polygon simple.

use std::f32::consts::TAU;

use crate::schema::Point;

use super::GenomeRng;

/// Radius range for polygon vertices on the unit circle.
pub const VERTEX_RADIUS: (f32, f32) = (0.4, 1.0);

/// Fraction of a slice kept clear of its edges when placing hips.
const SLICE_MARGIN: f32 = 0.1;

/// Random vertex inside the sector owned by `index`.
pub fn sector_point(index: usize, count: usize, rng: &mut GenomeRng) -> Point {
    let sector = TAU / count.max(1) as f32;
    let angle = -(index as f32 + rng.uniform((0.0, 1.0))) * sector;
    let radius = rng.uniform(VERTEX_RADIUS);
    Point::new(radius * angle.cos(), radius * angle.sin())
}

/// Random clockwise polygon with `count` vertices.
pub fn random_polygon(count: usize, rng: &mut GenomeRng) -> Vec<Point> {
    (0..count).map(|i| sector_point(i, count, rng)).collect()
}

/// Ray-casting point-in-polygon test.
pub fn contains(polygon: &[Point], p: Point) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Horizontal extent of the polygon.
pub fn x_bounds(polygon: &[Point]) -> (f32, f32) {
    polygon
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.x), hi.max(p.x))
        })
}

/// First interior span of the vertical line at `x`.
pub fn vertical_span(polygon: &[Point], x: f32) -> Option<(f32, f32)> {
    let n = polygon.len();
    let mut crossings = Vec::new();
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        if (a.x > x) != (b.x > x) {
            crossings.push(a.y + (x - a.x) / (b.x - a.x) * (b.y - a.y));
        }
    }
    crossings.sort_by(f32::total_cmp);
    match crossings.as_slice() {
        [low, high, ..] => Some((*low, *high)),
        _ => None,
    }
}

/// Random hip position inside the x-slice `slot` of `slots`.
///
/// Slot 0 is the front (largest x).
pub fn hip_position(polygon: &[Point], slot: usize, slots: usize, rng: &mut GenomeRng) -> Point {
    let (lo, hi) = x_bounds(polygon);
    if !lo.is_finite() || !hi.is_finite() {
        return Point::default();
    }
    let width = (hi - lo) / slots.max(1) as f32;
    let slice_hi = hi - slot as f32 * width;
    let slice_lo = slice_hi - width;
    let margin = width * SLICE_MARGIN;
    let x = rng.uniform((slice_lo + margin, slice_hi - margin));

    match vertical_span(polygon, x) {
        Some((bottom, top)) => {
            let margin = (top - bottom) * SLICE_MARGIN;
            Point::new(x, rng.uniform((bottom + margin, top - margin)))
        }
        None => Point::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(-1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, -1.0),
            Point::new(-1.0, -1.0),
        ]
    }

    #[test]
    fn test_contains() {
        let square = square();
        assert!(contains(&square, Point::new(0.0, 0.0)));
        assert!(contains(&square, Point::new(0.9, -0.9)));
        assert!(!contains(&square, Point::new(1.5, 0.0)));
        assert!(!contains(&square[..2], Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_vertical_span() {
        let (low, high) = vertical_span(&square(), 0.3).unwrap();
        assert!((low + 1.0).abs() < 1e-6);
        assert!((high - 1.0).abs() < 1e-6);
        assert!(vertical_span(&square(), 2.0).is_none());
    }

    #[test]
    fn test_sector_points_are_ordered_clockwise() {
        let mut rng = GenomeRng::new(11);
        for count in 4..=8 {
            let polygon = random_polygon(count, &mut rng);
            let sector = TAU / count as f32;
            for (i, p) in polygon.iter().enumerate() {
                let angle = (-p.y.atan2(p.x)).rem_euclid(TAU);
                assert!(angle >= i as f32 * sector - 1e-4);
                assert!(angle <= (i + 1) as f32 * sector + 1e-4);
                let r = (p.x * p.x + p.y * p.y).sqrt();
                assert!(r >= VERTEX_RADIUS.0 - 1e-5 && r <= VERTEX_RADIUS.1 + 1e-5);
            }
        }
    }

    #[test]
    fn test_hip_positions_inside_polygon() {
        let mut rng = GenomeRng::new(5);
        for _ in 0..50 {
            let count = rng.uniform_usize((4, 8));
            let polygon = random_polygon(count, &mut rng);
            for slot in 0..3 {
                let hip = hip_position(&polygon, slot, 3, &mut rng);
                assert!(contains(&polygon, hip), "{hip:?} outside {polygon:?}");
            }
        }
    }
}
