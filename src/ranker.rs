//! Scene ranking by popularity.
//!
//! Clustered photos are grouped by label (noise excluded), each group gets a
//! centroid and a photo count, and the `top_n` largest groups are ranked
//! 1..K. Groups are visited in ascending label order and sorted with a stable
//! sort, so equal photo counts keep ascending label order and the ranking is
//! reproducible for identical input.
//!
//! Photos of clusters outside the ranking stay in the photo table but are
//! relabelled as noise once tags are scored.

use std::collections::{BTreeMap, HashSet};

use crate::geo_utils::compute_centroid;
use crate::{AnnotatedPhoto, ClusterSummary, GpsPoint, NOISE_LABEL};

/// Photo count and centroid of one cluster, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStats {
    pub cluster_label: i32,
    pub centroid: GpsPoint,
    pub photo_count: usize,
}

/// Per-cluster statistics in ascending label order.
pub fn cluster_stats(photos: &[AnnotatedPhoto]) -> Vec<ClusterStats> {
    let mut groups: BTreeMap<i32, Vec<GpsPoint>> = BTreeMap::new();
    for p in photos.iter().filter(|p| p.cluster_label != NOISE_LABEL) {
        groups
            .entry(p.cluster_label)
            .or_default()
            .push(p.photo.point());
    }

    groups
        .into_iter()
        .map(|(cluster_label, points)| ClusterStats {
            cluster_label,
            centroid: compute_centroid(&points),
            photo_count: points.len(),
        })
        .collect()
}

/// Rank the clusters of one park and keep the `top_n` most popular.
///
/// The returned scenes are ordered by rank (1 = most photos) and have empty
/// `top_tags`; the tag engine fills them in.
pub fn rank_clusters(park_unit: &str, photos: &[AnnotatedPhoto], top_n: usize) -> Vec<ClusterSummary> {
    let mut stats = cluster_stats(photos);
    stats.sort_by(|a, b| b.photo_count.cmp(&a.photo_count));

    stats
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, s)| ClusterSummary {
            park_unit: park_unit.to_string(),
            cluster_label: s.cluster_label,
            centroid_latitude: s.centroid.latitude,
            centroid_longitude: s.centroid.longitude,
            photo_count: s.photo_count,
            popularity_rank: Some(i as u32 + 1),
            top_tags: Vec::new(),
        })
        .collect()
}

/// Fold the photos of clusters that did not make the ranking into noise.
///
/// Returns the number of photos relabelled. Afterwards every label is
/// either [`NOISE_LABEL`] or the label of one of `scenes`.
pub fn demote_unranked(photos: &mut [AnnotatedPhoto], scenes: &[ClusterSummary]) -> usize {
    let ranked: HashSet<i32> = scenes.iter().map(|s| s.cluster_label).collect();
    let mut demoted = 0;
    for p in photos
        .iter_mut()
        .filter(|p| p.cluster_label != NOISE_LABEL && !ranked.contains(&p.cluster_label))
    {
        p.cluster_label = NOISE_LABEL;
        p.is_core_sample = false;
        demoted += 1;
    }
    demoted
}
