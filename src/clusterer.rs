//! Adaptive density clustering.
//!
//! DBSCAN has no notion of a target cluster count, so the parameters are
//! searched per park in two greedy stages:
//!
//! 1. **Radius**: every candidate radius from [`candidate_radii`] is tried with
//!    a fixed minimum-neighbour count. Radii whose cluster count falls outside
//!    the band for the dataset size are rejected; the best mean silhouette
//!    coefficient among the rest wins.
//! 2. **Minimum neighbours**: with the radius fixed, a ladder of
//!    minimum-neighbour values is swept. Values producing fewer clusters than
//!    the band's lower bound are rejected; best silhouette wins.
//!
//! A final pass with the chosen pair labels every point. Within a stage,
//! candidates are evaluated independently (in parallel with the `parallel`
//! feature); the winner is then picked by a sequential scan in candidate order,
//! where only a strictly higher score replaces the current best.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dbscan::Dbscan;
use crate::preprocess::{candidate_radii, sort_by_coordinate};
use crate::silhouette::silhouette_score;
use crate::{ClusterConfig, CountBand, Degeneracy, GpsPoint, NOISE_LABEL};

/// Score given to a single-cluster result accepted without a silhouette
/// computation (only possible when the band's lower bound is 1).
const SINGLE_CLUSTER_SCORE: f64 = 0.0;

/// Outcome of clustering one park.
///
/// `labels` and `core_samples` are aligned with the input points.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringOutcome {
    pub labels: Vec<i32>,
    pub core_samples: Vec<bool>,
    pub radius_eps: Option<f64>,
    pub min_samples: Option<usize>,
    pub cluster_count: usize,
    /// Set when no scenes could be produced.
    pub degeneracy: Option<Degeneracy>,
}

impl ClusteringOutcome {
    /// Every point is noise.
    fn degenerate(point_count: usize, reason: Degeneracy) -> Self {
        Self {
            labels: vec![NOISE_LABEL; point_count],
            core_samples: vec![false; point_count],
            radius_eps: None,
            min_samples: None,
            cluster_count: 0,
            degeneracy: Some(reason),
        }
    }
}

/// Result of trying one parameter value during the search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvaluation<T> {
    pub value: T,
    pub cluster_count: usize,
    /// `None` when the candidate was rejected or the score is undefined.
    pub score: Option<f64>,
}

/// Cluster the photo locations of one park.
pub fn cluster_points(points: &[GpsPoint], config: &ClusterConfig) -> ClusteringOutcome {
    if points.is_empty() {
        return ClusteringOutcome::degenerate(0, Degeneracy::NoPhotos);
    }

    let candidates = candidate_radii(points, config);
    if candidates.is_empty() {
        debug!("[Cluster] No radius candidates for {} points", points.len());
        return ClusteringOutcome::degenerate(points.len(), Degeneracy::NoCandidates);
    }

    // Work in coordinate-sorted order so labels do not depend on input order
    let order = sort_by_coordinate(points);
    let features: Vec<[f64; 2]> = order.iter().map(|&i| points[i].lng_lat()).collect();
    let band = config.band_for(points.len());

    info!(
        "[Cluster] {} points, {} radius candidates, band [{}, {}]",
        points.len(),
        candidates.len(),
        band.min_clusters,
        band.max_clusters
    );

    let Some(eps) = search_radius(&features, &candidates, band, config.search_min_samples)
    else {
        info!("[Cluster] No radius inside the cluster count band");
        return ClusteringOutcome::degenerate(points.len(), Degeneracy::NoRadiusInBand);
    };

    let min_samples = search_min_samples(&features, eps, band, &config.min_samples_candidates)
        .unwrap_or(config.search_min_samples);

    let result = Dbscan::new(eps, min_samples).fit(&features);
    let cluster_count = result.cluster_count();

    info!(
        "[Cluster] eps={:.6}, min_samples={}, clusters={}, noise={}",
        eps,
        min_samples,
        cluster_count,
        result.noise_count()
    );

    // Map back from sorted order to input order
    let mut labels = vec![NOISE_LABEL; points.len()];
    let mut core_samples = vec![false; points.len()];
    for (sorted_idx, &input_idx) in order.iter().enumerate() {
        labels[input_idx] = result.labels[sorted_idx];
        core_samples[input_idx] = result.core_samples[sorted_idx];
    }

    ClusteringOutcome {
        labels,
        core_samples,
        radius_eps: Some(eps),
        min_samples: Some(min_samples),
        cluster_count,
        degeneracy: None,
    }
}

/// Stage one: pick the radius. `None` if no candidate lands in the band.
pub fn search_radius(
    features: &[[f64; 2]],
    candidates: &[f64],
    band: CountBand,
    min_samples: usize,
) -> Option<f64> {
    let evaluations = evaluate_all(candidates, |&eps| {
        evaluate(features, eps, min_samples, band, |count| band.contains(count))
    });
    for e in &evaluations {
        debug!(
            "[Cluster]   eps={:.6}, clusters={}, silhouette={:?}",
            e.value, e.cluster_count, e.score
        );
    }
    select_best(&evaluations)
}

/// Stage two: pick the minimum-neighbour count for a fixed radius.
pub fn search_min_samples(
    features: &[[f64; 2]],
    eps: f64,
    band: CountBand,
    candidates: &[usize],
) -> Option<usize> {
    let evaluations = evaluate_all(candidates, |&min_samples| {
        evaluate(features, eps, min_samples, band, |count| {
            count >= band.min_clusters
        })
    });
    for e in &evaluations {
        debug!(
            "[Cluster]   eps={:.6}, min_samples={}, clusters={}, silhouette={:?}",
            eps, e.value, e.cluster_count, e.score
        );
    }
    select_best(&evaluations)
}

/// Run DBSCAN with one parameter pair and score it.
fn evaluate(
    features: &[[f64; 2]],
    eps: f64,
    min_samples: usize,
    band: CountBand,
    accept: impl Fn(usize) -> bool,
) -> (usize, Option<f64>) {
    let result = Dbscan::new(eps, min_samples).fit(features);
    let cluster_count = result.cluster_count();

    if !accept(cluster_count) {
        return (cluster_count, None);
    }
    if cluster_count == 1 && band.min_clusters == 1 {
        return (cluster_count, Some(SINGLE_CLUSTER_SCORE));
    }
    (cluster_count, silhouette_score(features, &result.labels))
}

#[cfg(feature = "parallel")]
fn evaluate_all<T, F>(candidates: &[T], eval: F) -> Vec<CandidateEvaluation<T>>
where
    T: Copy + Send + Sync,
    F: Fn(&T) -> (usize, Option<f64>) + Send + Sync,
{
    use rayon::prelude::*;

    candidates
        .par_iter()
        .map(|value| {
            let (cluster_count, score) = eval(value);
            CandidateEvaluation {
                value: *value,
                cluster_count,
                score,
            }
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_all<T, F>(candidates: &[T], eval: F) -> Vec<CandidateEvaluation<T>>
where
    T: Copy,
    F: Fn(&T) -> (usize, Option<f64>),
{
    candidates
        .iter()
        .map(|value| {
            let (cluster_count, score) = eval(value);
            CandidateEvaluation {
                value: *value,
                cluster_count,
                score,
            }
        })
        .collect()
}

/// First candidate with the strictly highest score.
pub fn select_best<T: Copy>(evaluations: &[CandidateEvaluation<T>]) -> Option<T> {
    let mut best: Option<(T, f64)> = None;
    for e in evaluations {
        let Some(score) = e.score else {
            continue;
        };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((e.value, score)),
        }
    }
    best.map(|(value, _)| value)
}
