//! DBSCAN over two-dimensional points.
//!
//! Neighbourhood queries go through an R-tree. Neighbourhoods are never
//! materialised for every point at once: a first pass only counts neighbours
//! to find core samples, and the expansion pass re-queries core points as it
//! reaches them. This keeps memory linear in the number of points even for
//! large radii.
//!
//! Labels follow the usual convention: clusters are numbered from 0 in the
//! order their first core point appears in the input, border points join the
//! first cluster that reaches them, and noise is [`NOISE_LABEL`].

use rstar::{AABB, PointDistance, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::NOISE_LABEL;

/// A point with its input index for R-tree queries
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub idx: usize,
    pub x: f64,
    pub y: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Build R-tree from feature vectors
pub fn build_rtree(points: &[[f64; 2]]) -> RTree<IndexedPoint> {
    let indexed: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(idx, p)| IndexedPoint {
            idx,
            x: p[0],
            y: p[1],
        })
        .collect();
    RTree::bulk_load(indexed)
}

/// DBSCAN hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dbscan {
    /// Neighbourhood radius (inclusive).
    pub eps: f64,
    /// Neighbours within `eps`, the point itself included, needed for a
    /// core sample.
    pub min_samples: usize,
}

/// Result of one DBSCAN pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbscanResult {
    /// Cluster label per input point, [`NOISE_LABEL`] for noise.
    pub labels: Vec<i32>,
    /// Core sample flag per input point.
    pub core_samples: Vec<bool>,
}

impl DbscanResult {
    /// Number of distinct non-noise labels.
    pub fn cluster_count(&self) -> usize {
        self.labels
            .iter()
            .copied()
            .max()
            .map(|max| (max + 1).max(0) as usize)
            .unwrap_or(0)
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE_LABEL).count()
    }
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Cluster the given `[x, y]` feature vectors.
    pub fn fit(&self, points: &[[f64; 2]]) -> DbscanResult {
        if points.is_empty() {
            return DbscanResult {
                labels: Vec::new(),
                core_samples: Vec::new(),
            };
        }

        let tree = build_rtree(points);
        let eps_2 = self.eps * self.eps;
        let core_samples = self.find_core_samples(&tree, points, eps_2);

        let mut labels = vec![NOISE_LABEL; points.len()];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_label: i32 = 0;

        for start in 0..points.len() {
            if labels[start] != NOISE_LABEL || !core_samples[start] {
                continue;
            }

            let mut current = start;
            loop {
                if labels[current] == NOISE_LABEL {
                    labels[current] = next_label;
                    if core_samples[current] {
                        for neighbour in neighbours(&tree, &points[current], eps_2) {
                            if labels[neighbour] == NOISE_LABEL {
                                stack.push(neighbour);
                            }
                        }
                    }
                }
                match stack.pop() {
                    Some(next) => current = next,
                    None => break,
                }
            }
            next_label += 1;
        }

        DbscanResult {
            labels,
            core_samples,
        }
    }

    #[cfg(feature = "parallel")]
    fn find_core_samples(
        &self,
        tree: &RTree<IndexedPoint>,
        points: &[[f64; 2]],
        eps_2: f64,
    ) -> Vec<bool> {
        use rayon::prelude::*;

        points
            .par_iter()
            .map(|p| tree.locate_within_distance(*p, eps_2).count() >= self.min_samples)
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn find_core_samples(
        &self,
        tree: &RTree<IndexedPoint>,
        points: &[[f64; 2]],
        eps_2: f64,
    ) -> Vec<bool> {
        points
            .iter()
            .map(|p| tree.locate_within_distance(*p, eps_2).count() >= self.min_samples)
            .collect()
    }
}

/// Indices of all points within `sqrt(eps_2)` of `point`, ascending.
fn neighbours(tree: &RTree<IndexedPoint>, point: &[f64; 2], eps_2: f64) -> Vec<usize> {
    let mut found: Vec<usize> = tree
        .locate_within_distance(*point, eps_2)
        .map(|p| p.idx)
        .collect();
    found.sort_unstable();
    found
}
