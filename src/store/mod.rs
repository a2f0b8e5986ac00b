//! Storage seams for the scene pipeline.
//!
//! - [`PhotoSource`] - read side: photos per park, the last persisted
//!   annotation and optional park boundaries
//! - [`SceneSink`] - write side: replaces everything stored for a park with a
//!   new [`ParkRun`]
//!
//! Handles are constructed by the caller and passed down; nothing here is
//! global. Writers for different parks may run concurrently; writes for the
//! same park must be serialized by the caller.

#[cfg(feature = "persistence")]
pub mod sqlite;

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{Result, SceneError};
use crate::geofence::ParkBoundary;
use crate::{AnnotatedPhoto, ClusterSummary, ClusteringParameters, ParkRun, PhotoPoint, TagScore};

/// Read access to ingested photos.
pub trait PhotoSource: Send + Sync {
    /// All park units that have photos, sorted.
    fn park_units(&self) -> Result<Vec<String>>;

    /// Every photo of a park, in ingestion order.
    fn photos_for_park(&self, park_unit: &str) -> Result<Vec<PhotoPoint>>;

    /// Photos of a park with the labels of the last persisted run.
    /// Empty if the park was never clustered.
    fn annotated_photos(&self, park_unit: &str) -> Result<Vec<AnnotatedPhoto>>;

    /// Photos of one scene of the last persisted run.
    fn photos_in_cluster(&self, park_unit: &str, cluster_label: i32) -> Result<Vec<PhotoPoint>> {
        Ok(self
            .annotated_photos(park_unit)?
            .into_iter()
            .filter(|p| p.cluster_label == cluster_label)
            .map(|p| p.photo)
            .collect())
    }

    /// Park boundary used for geofencing, if known.
    fn boundary(&self, _park_unit: &str) -> Result<Option<ParkBoundary>> {
        Ok(None)
    }
}

/// Durable output of the pipeline.
pub trait SceneSink: Send + Sync {
    /// Replace all clusters, parameters, photo annotations and tag scores of
    /// `run.park_unit`. Either everything is replaced or nothing is.
    fn replace_park(&self, run: &ParkRun) -> Result<()>;

    /// Ranked scenes of a park, rank 1 first.
    fn clusters_for_park(&self, park_unit: &str) -> Result<Vec<ClusterSummary>>;

    fn parameters_for_park(&self, park_unit: &str) -> Result<Option<ClusteringParameters>>;

    fn tag_scores_for_park(&self, park_unit: &str) -> Result<Vec<TagScore>>;
}

fn lock_poisoned() -> SceneError {
    SceneError::Storage("store lock poisoned".to_string())
}

/// In-memory store implementing both sides.
#[derive(Debug, Default)]
pub struct MemoryStore {
    photos: RwLock<BTreeMap<String, Vec<PhotoPoint>>>,
    boundaries: RwLock<HashMap<String, ParkBoundary>>,
    runs: RwLock<HashMap<String, ParkRun>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a flat photo list, grouping by park unit.
    pub fn from_photos(photos: impl IntoIterator<Item = PhotoPoint>) -> Result<Self> {
        let store = Self::new();
        store.insert_photos(photos)?;
        Ok(store)
    }

    /// Append photos, grouped by their park unit.
    pub fn insert_photos(&self, photos: impl IntoIterator<Item = PhotoPoint>) -> Result<usize> {
        let mut guard = self.photos.write().map_err(|_| lock_poisoned())?;
        let mut inserted = 0;
        for photo in photos {
            guard.entry(photo.park_unit.clone()).or_default().push(photo);
            inserted += 1;
        }
        Ok(inserted)
    }

    pub fn set_boundary(&self, park_unit: &str, boundary: ParkBoundary) -> Result<()> {
        self.boundaries
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(park_unit.to_string(), boundary);
        Ok(())
    }

    /// Last persisted run of a park.
    pub fn run_for_park(&self, park_unit: &str) -> Result<Option<ParkRun>> {
        Ok(self
            .runs
            .read()
            .map_err(|_| lock_poisoned())?
            .get(park_unit)
            .cloned())
    }
}

impl PhotoSource for MemoryStore {
    fn park_units(&self) -> Result<Vec<String>> {
        Ok(self
            .photos
            .read()
            .map_err(|_| lock_poisoned())?
            .keys()
            .cloned()
            .collect())
    }

    fn photos_for_park(&self, park_unit: &str) -> Result<Vec<PhotoPoint>> {
        Ok(self
            .photos
            .read()
            .map_err(|_| lock_poisoned())?
            .get(park_unit)
            .cloned()
            .unwrap_or_default())
    }

    fn annotated_photos(&self, park_unit: &str) -> Result<Vec<AnnotatedPhoto>> {
        Ok(self
            .run_for_park(park_unit)?
            .map(|run| run.photos)
            .unwrap_or_default())
    }

    fn boundary(&self, park_unit: &str) -> Result<Option<ParkBoundary>> {
        Ok(self
            .boundaries
            .read()
            .map_err(|_| lock_poisoned())?
            .get(park_unit)
            .cloned())
    }
}

impl SceneSink for MemoryStore {
    fn replace_park(&self, run: &ParkRun) -> Result<()> {
        self.runs
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(run.park_unit.clone(), run.clone());
        Ok(())
    }

    fn clusters_for_park(&self, park_unit: &str) -> Result<Vec<ClusterSummary>> {
        Ok(self
            .run_for_park(park_unit)?
            .map(|run| run.scenes)
            .unwrap_or_default())
    }

    fn parameters_for_park(&self, park_unit: &str) -> Result<Option<ClusteringParameters>> {
        Ok(self.run_for_park(park_unit)?.map(|run| run.parameters))
    }

    fn tag_scores_for_park(&self, park_unit: &str) -> Result<Vec<TagScore>> {
        Ok(self
            .run_for_park(park_unit)?
            .map(|run| run.tag_scores)
            .unwrap_or_default())
    }
}
