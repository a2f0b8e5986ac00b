//! Mean silhouette coefficient with the Euclidean metric.
//!
//! Every distinct label, noise included, is treated as its own group. A
//! sample alone in its group scores 0. The coefficient is undefined, and
//! `None` is returned, unless there are between 2 and `n - 1` distinct
//! labels.

use std::collections::HashMap;

use crate::geo_utils::feature_distance;

/// Mean silhouette coefficient of `labels` over `points`.
pub fn silhouette_score(points: &[[f64; 2]], labels: &[i32]) -> Option<f64> {
    let n = points.len();
    if n == 0 || labels.len() != n {
        return None;
    }

    // Dense group indices in order of first appearance
    let mut group_of: HashMap<i32, usize> = HashMap::new();
    let groups: Vec<usize> = labels
        .iter()
        .map(|label| {
            let next = group_of.len();
            *group_of.entry(*label).or_insert(next)
        })
        .collect();
    let group_count = group_of.len();

    if group_count < 2 || group_count > n - 1 {
        return None;
    }

    let mut group_sizes = vec![0usize; group_count];
    for &g in &groups {
        group_sizes[g] += 1;
    }

    let scores = sample_scores(points, &groups, &group_sizes);
    Some(scores.iter().sum::<f64>() / n as f64)
}

/// Silhouette value of a single sample.
fn sample_score(i: usize, points: &[[f64; 2]], groups: &[usize], group_sizes: &[usize]) -> f64 {
    let own = groups[i];
    if group_sizes[own] <= 1 {
        return 0.0;
    }

    let mut sums = vec![0.0f64; group_sizes.len()];
    for (j, p) in points.iter().enumerate() {
        if j != i {
            sums[groups[j]] += feature_distance(&points[i], p);
        }
    }

    let intra = sums[own] / (group_sizes[own] - 1) as f64;
    let nearest = sums
        .iter()
        .zip(group_sizes)
        .enumerate()
        .filter(|(g, _)| *g != own)
        .map(|(_, (sum, &size))| sum / size as f64)
        .fold(f64::INFINITY, f64::min);

    let denom = intra.max(nearest);
    if denom > 0.0 {
        (nearest - intra) / denom
    } else {
        0.0
    }
}

// Scores are collected before summing so the mean is identical with and
// without the parallel feature.
#[cfg(feature = "parallel")]
fn sample_scores(points: &[[f64; 2]], groups: &[usize], group_sizes: &[usize]) -> Vec<f64> {
    use rayon::prelude::*;

    (0..points.len())
        .into_par_iter()
        .map(|i| sample_score(i, points, groups, group_sizes))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn sample_scores(points: &[[f64; 2]], groups: &[usize], group_sizes: &[usize]) -> Vec<f64> {
    (0..points.len())
        .map(|i| sample_score(i, points, groups, group_sizes))
        .collect()
}
