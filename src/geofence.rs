//! Park boundary containment.
//!
//! A park is a set of simple polygons (exterior ring plus optional holes, in
//! `[longitude, latitude]` order as in GeoJSON). A photo is inside the park
//! if a polygon contains it or if it lies within a tolerance band of the
//! boundary. The band is `min(bbox height, bbox width) / 500` of the whole
//! park, so points sitting on an edge are kept.

use geo::{BoundingRect, Contains, Coord, EuclideanDistance, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::{Bounds, GpsPoint};

/// Divisor applied to the smaller bbox side to get the edge tolerance.
const TOLERANCE_DIVISOR: f64 = 500.0;

/// Serializable polygon rings of a park.
///
/// `polygons[i][0]` is the exterior ring of polygon `i`, the remaining rings
/// are holes. Each coordinate is `[longitude, latitude]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRings {
    pub polygons: Vec<Vec<Vec<[f64; 2]>>>,
}

/// Geofence for one park.
#[derive(Debug, Clone)]
pub struct ParkBoundary {
    rings: BoundaryRings,
    shape: MultiPolygon<f64>,
    bounds: Bounds,
    tolerance: f64,
}

fn ring_to_linestring(ring: &[[f64; 2]]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|&[x, y]| Coord { x, y })
            .collect::<Vec<_>>(),
    )
}

impl ParkBoundary {
    /// Build a boundary from rings. Returns `None` when there is no polygon
    /// with at least three exterior coordinates.
    pub fn from_rings(rings: BoundaryRings) -> Option<Self> {
        let polygons: Vec<Polygon<f64>> = rings
            .polygons
            .iter()
            .filter_map(|polygon| {
                let (exterior, holes) = polygon.split_first()?;
                if exterior.len() < 3 {
                    return None;
                }
                Some(Polygon::new(
                    ring_to_linestring(exterior),
                    holes.iter().map(|h| ring_to_linestring(h)).collect(),
                ))
            })
            .collect();

        if polygons.is_empty() {
            return None;
        }

        let shape = MultiPolygon::new(polygons);
        let rect = shape.bounding_rect()?;
        let bounds = Bounds {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        };
        let tolerance = bounds.height().min(bounds.width()) / TOLERANCE_DIVISOR;

        Some(Self {
            rings,
            shape,
            bounds,
            tolerance,
        })
    }

    /// Convenience constructor for a single polygon without holes.
    pub fn from_exterior(exterior: Vec<[f64; 2]>) -> Option<Self> {
        Self::from_rings(BoundaryRings {
            polygons: vec![vec![exterior]],
        })
    }

    pub fn rings(&self) -> &BoundaryRings {
        &self.rings
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Distance (degrees) within which points outside the polygons are kept.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Whether the point is inside the park or within the edge tolerance.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        let p = Point::new(point.longitude, point.latitude);
        if self.shape.contains(&p) {
            return true;
        }
        self.shape
            .0
            .iter()
            .any(|polygon| p.euclidean_distance(polygon) <= self.tolerance)
    }
}
