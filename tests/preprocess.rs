//! Tests for coordinate sorting and radius candidate generation

use parkscenes::preprocess::{candidate_radii, predecessor_distances, quantile, sort_by_coordinate};
use parkscenes::{ClusterConfig, GpsPoint};

/// Ten points one degree apart along the equator plus one far away.
fn line_with_outlier() -> Vec<GpsPoint> {
    let mut points: Vec<GpsPoint> = (0..11).map(|i| GpsPoint::new(0.0, i as f64)).collect();
    points.push(GpsPoint::new(0.0, 100.0));
    points
}

#[test]
fn test_sort_by_longitude_then_latitude() {
    let points = vec![
        GpsPoint::new(2.0, 1.0),
        GpsPoint::new(1.0, 1.0),
        GpsPoint::new(5.0, 0.0),
    ];
    assert_eq!(sort_by_coordinate(&points), vec![2, 1, 0]);
}

#[test]
fn test_sort_keeps_input_order_for_coincident_points() {
    let points = vec![GpsPoint::new(1.0, 1.0); 4];
    assert_eq!(sort_by_coordinate(&points), vec![0, 1, 2, 3]);
}

#[test]
fn test_predecessor_distances() {
    let points = vec![
        GpsPoint::new(0.0, 3.0),
        GpsPoint::new(0.0, 0.0),
        GpsPoint::new(4.0, 0.0),
    ];
    let order = sort_by_coordinate(&points);
    let distances = predecessor_distances(&points, &order);

    assert_eq!(distances.len(), 3);
    assert_eq!(distances[0], None);
    assert_eq!(distances[1], Some(4.0));
    assert_eq!(distances[2], Some(5.0));
}

#[test]
fn test_predecessor_distances_empty() {
    assert!(predecessor_distances(&[], &[]).is_empty());
}

#[test]
fn test_quantile_interpolates_linearly() {
    let sorted = [1.0, 2.0, 3.0, 4.0];
    assert_eq!(quantile(&sorted, 0.0), Some(1.0));
    assert_eq!(quantile(&sorted, 1.0), Some(4.0));
    assert_eq!(quantile(&sorted, 0.5), Some(2.5));
    assert!((quantile(&sorted, 0.25).unwrap() - 1.75).abs() < 1e-12);
    assert_eq!(quantile(&[], 0.5), None);
    assert_eq!(quantile(&[7.0], 0.3), Some(7.0));
}

#[test]
fn test_candidates_exclude_large_quantiles() {
    // Distances are ten 1.0 and one 90.0. Everything up to the 0.9 quantile
    // is 1.0; the higher quantiles interpolate towards 90 and exceed 40% of it.
    let candidates = candidate_radii(&line_with_outlier(), &ClusterConfig::default());
    assert_eq!(candidates, vec![1.0]);
}

#[test]
fn test_candidates_bounded_and_unique() {
    let points: Vec<GpsPoint> = (0..200)
        .map(|i| {
            let i = i as f64;
            GpsPoint::new(44.0 + (i * 0.37).sin() * 0.01, -110.0 + i * i * 1e-6)
        })
        .collect();
    let config = ClusterConfig::default();
    let candidates = candidate_radii(&points, &config);

    assert!(!candidates.is_empty());
    let order = sort_by_coordinate(&points);
    let max = predecessor_distances(&points, &order)
        .into_iter()
        .flatten()
        .fold(0.0, f64::max);
    for (i, c) in candidates.iter().enumerate() {
        assert!(*c > 0.0);
        assert!(*c <= config.max_radius_fraction * max);
        assert!(!candidates[..i].contains(c), "duplicate candidate {c}");
    }
}

#[test]
fn test_extended_quantiles_only_for_small_parks() {
    let config = ClusterConfig::default();
    assert_eq!(config.quantiles_for(1_000).len(), 20);
    assert_eq!(config.quantiles_for(1_001).len(), 13);
}

#[test]
fn test_no_candidates_for_degenerate_inputs() {
    let config = ClusterConfig::default();
    assert!(candidate_radii(&[], &config).is_empty());
    assert!(candidate_radii(&[GpsPoint::new(1.0, 1.0)], &config).is_empty());
    assert!(candidate_radii(&vec![GpsPoint::new(1.0, 1.0); 10], &config).is_empty());
}
