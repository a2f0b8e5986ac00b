//! Distance preprocessing for radius candidate generation.
//!
//! Points are sorted by longitude then latitude and each point is paired with
//! its predecessor in that scan order. The predecessor distances are not true
//! nearest-neighbour distances, but their distribution is a cheap proxy for
//! the spacing of the photos, and its quantiles make good DBSCAN radius
//! candidates.

use std::cmp::Ordering;

use crate::geo_utils::degree_distance;
use crate::{ClusterConfig, GpsPoint};

/// Indices of `points` sorted by (longitude, latitude).
///
/// The sort is stable, so coincident points keep their input order.
pub fn sort_by_coordinate(points: &[GpsPoint]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (&points[a], &points[b]);
        pa.longitude
            .total_cmp(&pb.longitude)
            .then_with(|| pa.latitude.total_cmp(&pb.latitude))
    });
    order
}

/// Distance of each point in `order` to its predecessor in that order.
///
/// The first entry is always `None`.
pub fn predecessor_distances(points: &[GpsPoint], order: &[usize]) -> Vec<Option<f64>> {
    let mut distances = Vec::with_capacity(order.len());
    if let Some(&first) = order.first() {
        distances.push(None);
        let mut prev = &points[first];
        for &idx in &order[1..] {
            let current = &points[idx];
            distances.push(Some(degree_distance(prev, current)));
            prev = current;
        }
    }
    distances
}

/// Quantile of an ascending-sorted slice using linear interpolation between
/// the closest ranks (position `q * (n - 1)`).
///
/// Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Candidate DBSCAN radii for one park.
///
/// Candidates are quantiles of the non-zero predecessor distances, in the
/// order of the configured quantile ladder, without duplicates, and never
/// above `max_radius_fraction` of the largest distance. Empty when there are
/// fewer than two points or every distance is zero.
pub fn candidate_radii(points: &[GpsPoint], config: &ClusterConfig) -> Vec<f64> {
    if points.len() < 2 {
        return Vec::new();
    }

    let order = sort_by_coordinate(points);
    let mut distances: Vec<f64> = predecessor_distances(points, &order)
        .into_iter()
        .flatten()
        .filter(|d| d.is_finite() && *d > 0.0)
        .collect();

    if distances.is_empty() {
        return Vec::new();
    }

    distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let max_distance = distances[distances.len() - 1];
    let cutoff = config.max_radius_fraction * max_distance;

    let mut candidates: Vec<f64> = Vec::new();
    for q in config.quantiles_for(points.len()) {
        let Some(radius) = quantile(&distances, q) else {
            continue;
        };
        if radius <= 0.0 || radius > cutoff {
            continue;
        }
        if candidates.contains(&radius) {
            continue;
        }
        candidates.push(radius);
    }
    candidates
}
