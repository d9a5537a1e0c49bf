use std::f64::consts::PI;

use crate::domain::geometry::feature::{Crs, Geometry, Position};

/// Semi-major axis of the WGS84 ellipsoid, used by the spherical Web Mercator projection.
const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Simplifies a geometry with the Douglas-Peucker algorithm.
///
/// `tolerance` is expressed in the units of the geometry's reference system.
/// Polygon rings stay closed and never drop below four positions; a ring that
/// would collapse is kept as is.
pub fn simplify(geometry: &Geometry, tolerance: f64) -> Geometry {
    match geometry {
        Geometry::Point(p) => Geometry::Point(*p),
        Geometry::LineString(line) => Geometry::LineString(douglas_peucker(line, tolerance)),
        Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(|ring| simplify_ring(ring, tolerance)).collect()),
        Geometry::MultiPolygon(polygons) => {
            Geometry::MultiPolygon(polygons.iter().map(|rings| rings.iter().map(|ring| simplify_ring(ring, tolerance)).collect()).collect())
        }
    }
}

fn simplify_ring(ring: &[Position], tolerance: f64) -> Vec<Position> {
    let simplified = douglas_peucker(ring, tolerance);

    if simplified.len() < 4 { ring.to_vec() } else { simplified }
}

fn douglas_peucker(points: &[Position], tolerance: f64) -> Vec<Position> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut max_distance = 0.0;
        let mut max_index = start;

        for i in (start + 1)..end {
            let distance = segment_distance(&points[i], &points[start], &points[end]);
            if distance > max_distance {
                max_distance = distance;
                max_index = i;
            }
        }

        if max_distance > tolerance {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points.iter().zip(keep).filter(|(_, kept)| *kept).map(|(p, _)| *p).collect()
}

/// Distance from `p` to the segment `a`-`b`.
fn segment_distance(p: &Position, a: &Position, b: &Position) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length_sq = dx * dx + dy * dy;

    if length_sq == 0.0 {
        return ((p[0] - a[0]).powi(2) + (p[1] - a[1]).powi(2)).sqrt();
    }

    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / length_sq).clamp(0.0, 1.0);
    let (px, py) = (a[0] + t * dx, a[1] + t * dy);

    ((p[0] - px).powi(2) + (p[1] - py).powi(2)).sqrt()
}

/// Reprojects a geometry into EPSG:4326.
pub fn to_wgs84(geometry: &Geometry, source: Crs) -> Geometry {
    match source {
        Crs::Wgs84 => geometry.clone(),
        Crs::WebMercator => geometry.map_positions(web_mercator_to_lon_lat),
    }
}

fn web_mercator_to_lon_lat(p: &Position) -> Position {
    let lon = p[0] / EARTH_RADIUS_M * 180.0 / PI;
    let lat = (2.0 * (p[1] / EARTH_RADIUS_M).exp().atan() - PI / 2.0) * 180.0 / PI;
    [lon, lat]
}

/// Length of one degree of latitude, close enough for simplification tolerances.
const METRES_PER_DEGREE: f64 = 2.0 * PI * EARTH_RADIUS_M / 360.0;

/// Simplify then reproject, the normalisation applied to every zone before upload.
///
/// `tolerance_m` is in metres whatever the source reference system.
pub fn normalize(geometry: &Geometry, tolerance_m: f64, source: Crs) -> Geometry {
    let tolerance = match source {
        Crs::Wgs84 => tolerance_m / METRES_PER_DEGREE,
        Crs::WebMercator => tolerance_m,
    };
    to_wgs84(&simplify(geometry, tolerance), source)
}

/// Closed rectangular polygon covering every geometry, or `None` when there is no position at all.
pub fn bounding_extent<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Option<Geometry> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;

    for geometry in geometries {
        geometry.for_each_position(|p| {
            bounds = Some(match bounds {
                None => (p[0], p[1], p[0], p[1]),
                Some((min_x, min_y, max_x, max_y)) => (min_x.min(p[0]), min_y.min(p[1]), max_x.max(p[0]), max_y.max(p[1])),
            });
        });
    }

    let (min_x, min_y, max_x, max_y) = bounds?;
    Some(Geometry::Polygon(vec![vec![[min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]]]))
}

/// Centroid of a geometry: area-weighted for polygons, length-weighted for lines.
///
/// Degenerate shapes (zero area or length) fall back to the mean of their positions.
pub fn centroid(geometry: &Geometry) -> Option<Position> {
    let weighted = match geometry {
        Geometry::Point(p) => return Some(*p),
        Geometry::LineString(line) => line_moments(line),
        Geometry::Polygon(rings) => polygon_moments(rings),
        Geometry::MultiPolygon(polygons) => polygons.iter().map(|rings| polygon_moments(rings)).fold((0.0, 0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2)),
    };

    let (weight, mx, my) = weighted;
    if weight.abs() > f64::EPSILON {
        return Some([mx / weight, my / weight]);
    }

    let mut count = 0.0;
    let mut sum = [0.0, 0.0];
    geometry.for_each_position(|p| {
        count += 1.0;
        sum[0] += p[0];
        sum[1] += p[1];
    });
    (count > 0.0).then(|| [sum[0] / count, sum[1] / count])
}

/// (length, length-weighted x, length-weighted y) of a line.
fn line_moments(line: &[Position]) -> (f64, f64, f64) {
    line.windows(2).fold((0.0, 0.0, 0.0), |(length, mx, my), pair| {
        let (a, b) = (pair[0], pair[1]);
        let segment = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
        (length + segment, mx + segment * (a[0] + b[0]) / 2.0, my + segment * (a[1] + b[1]) / 2.0)
    })
}

/// (area, area-weighted x, area-weighted y) of a polygon. Holes are subtracted.
fn polygon_moments(rings: &[Vec<Position>]) -> (f64, f64, f64) {
    rings.iter().enumerate().fold((0.0, 0.0, 0.0), |(area, mx, my), (i, ring)| {
        let (signed, cx, cy) = ring_moments(ring);
        let ring_area = if i == 0 { signed.abs() } else { -signed.abs() };

        if signed == 0.0 {
            return (area, mx, my);
        }
        (area + ring_area, mx + ring_area * cx / signed, my + ring_area * cy / signed)
    })
}

/// Shoelace terms of a ring: (signed area, signed area times centroid x, same for y).
fn ring_moments(ring: &[Position]) -> (f64, f64, f64) {
    let (mut area, mut cx, mut cy) = (0.0, 0.0, 0.0);
    for pair in ring.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let cross = a[0] * b[1] - b[0] * a[1];
        area += cross;
        cx += (a[0] + b[0]) * cross;
        cy += (a[1] + b[1]) * cross;
    }
    (area / 2.0, cx / 6.0, cy / 6.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn douglas_peucker_drops_collinear_points() {
        let line = Geometry::LineString(vec![[0.0, 0.0], [1.0, 0.01], [2.0, 0.0], [3.0, 5.0]]);

        let simplified = simplify(&line, 1.0);

        assert_eq!(simplified, Geometry::LineString(vec![[0.0, 0.0], [2.0, 0.0], [3.0, 5.0]]));
    }

    #[test]
    fn small_rings_are_not_collapsed() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let polygon = Geometry::Polygon(vec![ring.clone()]);

        assert_eq!(simplify(&polygon, 100.0), Geometry::Polygon(vec![ring]));
    }

    #[test]
    fn web_mercator_origin_and_corner() {
        let origin = to_wgs84(&Geometry::Point([0.0, 0.0]), Crs::WebMercator);
        assert_eq!(origin, Geometry::Point([0.0, 0.0]));

        let Geometry::Point([lon, lat]) = to_wgs84(&Geometry::Point([20_037_508.342789244, 20_037_508.342789244]), Crs::WebMercator) else {
            panic!("expected a point");
        };
        assert!((lon - 180.0).abs() < 1e-6);
        assert!((lat - 85.051_128_78).abs() < 1e-6);
    }

    #[test]
    fn extent_covers_all_geometries() {
        let a = Geometry::Point([1.0, 5.0]);
        let b = Geometry::LineString(vec![[-2.0, 0.0], [3.0, 1.0]]);

        let extent = bounding_extent([&a, &b]).unwrap();

        assert_eq!(extent, Geometry::Polygon(vec![vec![[-2.0, 0.0], [3.0, 0.0], [3.0, 5.0], [-2.0, 5.0], [-2.0, 0.0]]]));
        assert_eq!(bounding_extent(std::iter::empty::<&Geometry>()), None);
    }

    #[test]
    fn normalize_tolerance_is_metric_for_geographic_sources() {
        // Middle point is about 1 cm off the straight line.
        let line = Geometry::LineString(vec![[0.0, 0.0], [0.5, 0.0000001], [1.0, 0.0]]);

        assert_eq!(normalize(&line, 1.0, Crs::Wgs84), Geometry::LineString(vec![[0.0, 0.0], [1.0, 0.0]]));

        let metric = Geometry::LineString(vec![[0.0, 0.0], [500.0, 5.0], [1000.0, 0.0]]);
        assert_eq!(normalize(&metric, 1.0, Crs::WebMercator), to_wgs84(&metric, Crs::WebMercator));
    }

    #[test]
    fn centroids_follow_shape_weight() {
        let square = Geometry::Polygon(vec![vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]]]);
        assert_eq!(centroid(&square), Some([2.0, 2.0]));

        // Clockwise hole in the right half pulls the centroid left.
        let holed = Geometry::Polygon(vec![
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
            vec![[2.0, 0.0], [2.0, 4.0], [4.0, 4.0], [4.0, 0.0], [2.0, 0.0]],
        ]);
        assert_eq!(centroid(&holed), Some([1.0, 2.0]));

        let line = Geometry::LineString(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 6.0]]);
        assert_eq!(centroid(&line), Some([1.75, 2.25]));

        assert_eq!(centroid(&Geometry::Point([3.0, -1.0])), Some([3.0, -1.0]));
        assert_eq!(centroid(&Geometry::LineString(vec![])), None);
    }
}
