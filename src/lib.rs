//! # Park Scenes
//!
//! Scene detection for geotagged national park photographs.
//!
//! This library provides:
//! - Adaptive density clustering (DBSCAN) of photo locations per park, with a
//!   two-stage hyper-parameter search driven by the silhouette coefficient
//! - Scene ranking by popularity (photo count), keeping the top scenes
//! - TF-IDF tag relevance ranking per scene
//! - Optional park geofencing with an edge tolerance band
//! - Storage seams with in-memory and SQLite adapters
//! - A batch runner with per-park failure isolation
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel processing with rayon (default)
//! - **`persistence`** - Enable the SQLite store
//! - **`synthetic`** - Enable the synthetic park generator
//! - **`cli`** - Build the `parkscenes-cli` binary
//!
//! ## Quick Start
//!
//! ```rust
//! use parkscenes::{ClusterConfig, PhotoPoint, pipeline::process_park};
//!
//! let photos: Vec<PhotoPoint> = (0..12)
//!     .map(|i| {
//!         let (lat, lng) = if i % 2 == 0 { (44.46, -110.83) } else { (44.52, -110.70) };
//!         PhotoPoint::new(format!("p{i}"), "yell", lat, lng, vec!["geyser".into()], 0)
//!     })
//!     .collect();
//!
//! let run = process_park("yell", photos, None, &ClusterConfig::default()).unwrap();
//! assert_eq!(run.photos.len(), 12);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, SceneError};

// Degree-space geometry helpers
pub mod geo_utils;

// Sorting and candidate radius generation
pub mod preprocess;
pub use preprocess::candidate_radii;

// Density-based clustering routine
pub mod dbscan;
pub use dbscan::{Dbscan, DbscanResult};

// Clustering quality metric
pub mod silhouette;
pub use silhouette::silhouette_score;

// Two-stage hyper-parameter search
pub mod clusterer;
pub use clusterer::{ClusteringOutcome, cluster_points};

// Popularity ranking of scenes
pub mod ranker;
pub use ranker::{demote_unranked, rank_clusters};

// TF-IDF tag relevance
pub mod tags;
pub use tags::{IdfTable, tag_scenes};

// Park boundary containment
pub mod geofence;
pub use geofence::{BoundaryRings, ParkBoundary};

// Storage seams and adapters
pub mod store;
pub use store::{MemoryStore, PhotoSource, SceneSink};
#[cfg(feature = "persistence")]
pub use store::sqlite::SqliteStore;

// Batch progress reporting
pub mod progress;
pub use progress::{AtomicProgressTracker, BatchProgressCallback, NoopProgress};

// Per-park pipeline and batch runner
pub mod pipeline;
pub use pipeline::{BatchReport, process_park, refresh_park, retag_park, run_batch};

// Synthetic park generator for tests and benchmarks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// Label reserved for photos that do not belong to any scene.
pub const NOISE_LABEL: i32 = -1;

/// A coordinate in degree space.
///
/// # Example
/// ```
/// use parkscenes::GpsPoint;
/// let point = GpsPoint::new(44.4280, -110.5885); // Old Faithful
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Feature vector in longitude/latitude order, as used for clustering.
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// A geotagged photograph as produced by the ingestion scripts.
///
/// Immutable once ingested; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoPoint {
    pub id: String,
    pub park_unit: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Tags in ingestion order. Empty when the source had none.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Unix timestamp (seconds since epoch)
    #[serde(default)]
    pub upload_timestamp: i64,
}

impl PhotoPoint {
    pub fn new(
        id: impl Into<String>,
        park_unit: impl Into<String>,
        latitude: f64,
        longitude: f64,
        tags: Vec<String>,
        upload_timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            park_unit: park_unit.into(),
            latitude,
            longitude,
            tags,
            upload_timestamp,
        }
    }

    /// Build a photo from a space-delimited tag field. `None` means the
    /// source had no tags at all.
    pub fn from_raw_tags(
        id: impl Into<String>,
        park_unit: impl Into<String>,
        latitude: f64,
        longitude: f64,
        raw_tags: Option<&str>,
        upload_timestamp: i64,
    ) -> Self {
        let tags = raw_tags
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        Self::new(id, park_unit, latitude, longitude, tags, upload_timestamp)
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    pub fn has_tags(&self) -> bool {
        self.tags.iter().any(|t| !t.trim().is_empty())
    }
}

/// Scene membership of one photo for one clustering run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub photo_id: String,
    pub park_unit: String,
    /// -1 for noise, otherwise >= 0
    pub cluster_label: i32,
    pub is_core_sample: bool,
}

impl ClusterAssignment {
    pub fn is_noise(&self) -> bool {
        self.cluster_label == NOISE_LABEL
    }
}

/// A photo annotated with its assignment (a row of the photos table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedPhoto {
    #[serde(flatten)]
    pub photo: PhotoPoint,
    pub cluster_label: i32,
    pub is_core_sample: bool,
}

impl AnnotatedPhoto {
    pub fn assignment(&self) -> ClusterAssignment {
        ClusterAssignment {
            photo_id: self.photo.id.clone(),
            park_unit: self.photo.park_unit.clone(),
            cluster_label: self.cluster_label,
            is_core_sample: self.is_core_sample,
        }
    }
}

/// A scene: one ranked cluster of a park.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub park_unit: String,
    pub cluster_label: i32,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
    pub photo_count: usize,
    /// 1 = most photos. Only the top scenes carry a rank.
    pub popularity_rank: Option<u32>,
    pub top_tags: Vec<String>,
}

impl ClusterSummary {
    /// Tags in the semicolon-joined form consumed by the front end.
    pub fn top_tags_joined(&self) -> String {
        self.top_tags.join(";")
    }
}

/// Hyper-parameters chosen for one park.
///
/// `radius_eps` and `min_samples` are `None` when the search produced no
/// usable parameters; `cluster_count` is then 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringParameters {
    pub park_unit: String,
    pub radius_eps: Option<f64>,
    pub min_samples: Option<usize>,
    pub cluster_count: usize,
}

/// Relevance of one tag for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagScore {
    pub park_unit: String,
    pub cluster_label: i32,
    pub tag: String,
    pub term_frequency: f64,
    pub inverse_document_frequency: f64,
    pub tfidf: f64,
}

/// Complete result set of one park refresh. Persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkRun {
    pub park_unit: String,
    pub parameters: ClusteringParameters,
    pub photos: Vec<AnnotatedPhoto>,
    /// Ranked scenes, rank 1 first.
    pub scenes: Vec<ClusterSummary>,
    pub tag_scores: Vec<TagScore>,
}

impl ParkRun {
    pub fn assignments(&self) -> Vec<ClusterAssignment> {
        self.photos.iter().map(AnnotatedPhoto::assignment).collect()
    }

    pub fn noise_count(&self) -> usize {
        self.photos
            .iter()
            .filter(|p| p.cluster_label == NOISE_LABEL)
            .count()
    }
}

/// Why a clustering run produced no scenes. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// The park has no photos.
    NoPhotos,
    /// Fewer than two points or all predecessor distances are zero.
    NoCandidates,
    /// No candidate radius produced a cluster count inside the band.
    NoRadiusInBand,
}

impl std::fmt::Display for Degeneracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Degeneracy::NoPhotos => "no photos",
            Degeneracy::NoCandidates => "no candidate radii",
            Degeneracy::NoRadiusInBand => "no radius inside the cluster count band",
        })
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Order in which scored tags are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrder {
    /// Lowest tf-idf first. Matches the historical output of the site.
    #[default]
    Ascending,
    /// Highest tf-idf first.
    Descending,
}

/// Accepted number of clusters for datasets up to `max_points` photos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountBand {
    /// Upper dataset size this band applies to. `None` = unbounded.
    pub max_points: Option<usize>,
    pub min_clusters: usize,
    pub max_clusters: usize,
}

impl CountBand {
    pub fn contains(&self, cluster_count: usize) -> bool {
        cluster_count >= self.min_clusters && cluster_count <= self.max_clusters
    }
}

/// Configuration for scene detection and tag ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster count bands by dataset size, checked in order.
    /// Default: <=100 -> [2,5], <=1000 -> [5,50], <=10000 -> [10,500], else [10,500]
    pub count_bands: Vec<CountBand>,

    /// Minimum neighbours used while searching the radius.
    /// Default: 5
    pub search_min_samples: usize,

    /// Minimum-neighbour values swept once the radius is fixed.
    /// Default: 2,3,5,6,7,8,9,10,12,14,16,18,20
    pub min_samples_candidates: Vec<usize>,

    /// Quantiles of the predecessor distance series used as radius candidates.
    pub base_quantiles: Vec<f64>,

    /// Extra quantiles appended for small datasets.
    pub extended_quantiles: Vec<f64>,

    /// Datasets up to this size use the extended quantiles.
    /// Default: 1000
    pub extended_quantile_max_points: usize,

    /// Candidates above this fraction of the largest distance are dropped.
    /// Default: 0.4
    pub max_radius_fraction: f64,

    /// Number of scenes that receive a popularity rank.
    /// Default: 20
    pub top_scenes: usize,

    /// Tags whose share of a scene's tokens reaches this value are dropped
    /// as too generic. Default: 0.007
    pub generic_tag_share: f64,

    /// Number of tags kept per scene. Default: 20
    pub top_tag_count: usize,

    /// Default: ascending (lowest tf-idf first)
    pub tag_order: TagOrder,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            count_bands: vec![
                CountBand {
                    max_points: Some(100),
                    min_clusters: 2,
                    max_clusters: 5,
                },
                CountBand {
                    max_points: Some(1_000),
                    min_clusters: 5,
                    max_clusters: 50,
                },
                CountBand {
                    max_points: Some(10_000),
                    min_clusters: 10,
                    max_clusters: 500,
                },
                CountBand {
                    max_points: None,
                    min_clusters: 10,
                    max_clusters: 500,
                },
            ],
            search_min_samples: 5,
            min_samples_candidates: vec![2, 3, 5, 6, 7, 8, 9, 10, 12, 14, 16, 18, 20],
            base_quantiles: vec![
                0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50, 0.55, 0.60, 0.65, 0.675, 0.70, 0.75,
            ],
            extended_quantiles: vec![0.80, 0.85, 0.90, 0.95, 0.975, 0.99, 0.995],
            extended_quantile_max_points: 1_000,
            max_radius_fraction: 0.4,
            top_scenes: 20,
            generic_tag_share: 0.007,
            top_tag_count: 20,
            tag_order: TagOrder::Ascending,
        }
    }
}

impl ClusterConfig {
    /// Cluster count band for a dataset of `point_count` photos.
    pub fn band_for(&self, point_count: usize) -> CountBand {
        self.count_bands
            .iter()
            .find(|b| b.max_points.is_none_or(|max| point_count <= max))
            .or(self.count_bands.last())
            .copied()
            .unwrap_or(CountBand {
                max_points: None,
                min_clusters: 1,
                max_clusters: usize::MAX,
            })
    }

    /// Quantile ladder for a dataset of `point_count` photos.
    pub fn quantiles_for(&self, point_count: usize) -> Vec<f64> {
        let mut quantiles = self.base_quantiles.clone();
        if point_count <= self.extended_quantile_max_points {
            quantiles.extend_from_slice(&self.extended_quantiles);
        }
        quantiles
    }
}
