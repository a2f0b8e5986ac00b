//! Per-park scene pipeline and batch runner.
//!
//! One park goes through: validation, optional geofencing, adaptive
//! clustering, popularity ranking and tag scoring. The result is a complete
//! [`ParkRun`] that is written with a single [`SceneSink::replace_park`]
//! call, so a park is either fully refreshed or left untouched.
//!
//! Parks share no state. [`run_batch`] processes them independently (in
//! parallel with the `parallel` feature) and collects failures instead of
//! stopping at the first one.

use std::collections::HashSet;

use log::{info, warn};

use crate::clusterer::cluster_points;
use crate::error::{Result, SceneError};
use crate::geofence::ParkBoundary;
use crate::progress::BatchProgressCallback;
use crate::ranker::{demote_unranked, rank_clusters};
use crate::store::{PhotoSource, SceneSink};
use crate::tags::{inverse_document_frequency, tag_scenes, top_tags};
use crate::{AnnotatedPhoto, ClusterConfig, ClusteringParameters, GpsPoint, ParkRun, PhotoPoint};

/// Check that every photo is usable for clustering.
pub fn validate_photos(park_unit: &str, photos: &[PhotoPoint]) -> Result<()> {
    if park_unit.trim().is_empty() {
        return Err(SceneError::input(park_unit, "empty park unit"));
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(photos.len());
    for photo in photos {
        if photo.id.trim().is_empty() {
            return Err(SceneError::input(park_unit, "photo without id"));
        }
        if photo.park_unit != park_unit {
            return Err(SceneError::input(
                park_unit,
                format!("photo {} belongs to park {}", photo.id, photo.park_unit),
            ));
        }
        if !photo.point().is_valid() {
            return Err(SceneError::input(
                park_unit,
                format!(
                    "photo {} has invalid coordinates ({}, {})",
                    photo.id, photo.latitude, photo.longitude
                ),
            ));
        }
        if !seen.insert(photo.id.as_str()) {
            return Err(SceneError::input(
                park_unit,
                format!("duplicate photo id {}", photo.id),
            ));
        }
    }
    Ok(())
}

/// Run the full pipeline for one park without touching any store.
pub fn process_park(
    park_unit: &str,
    photos: Vec<PhotoPoint>,
    boundary: Option<&ParkBoundary>,
    config: &ClusterConfig,
) -> Result<ParkRun> {
    validate_photos(park_unit, &photos)?;

    let photos: Vec<PhotoPoint> = match boundary {
        Some(b) => {
            let before = photos.len();
            let kept: Vec<PhotoPoint> = photos
                .into_iter()
                .filter(|p| b.contains(&p.point()))
                .collect();
            if kept.len() < before {
                info!(
                    "[Pipeline] {}: {} of {} photos outside the park boundary",
                    park_unit,
                    before - kept.len(),
                    before
                );
            }
            kept
        }
        None => photos,
    };

    let points: Vec<GpsPoint> = photos.iter().map(PhotoPoint::point).collect();
    let outcome = cluster_points(&points, config);
    if let Some(reason) = outcome.degeneracy {
        info!("[Pipeline] {}: no scenes ({})", park_unit, reason);
    }

    let mut annotated: Vec<AnnotatedPhoto> = photos
        .into_iter()
        .zip(outcome.labels.iter().zip(&outcome.core_samples))
        .map(|(photo, (&cluster_label, &is_core_sample))| AnnotatedPhoto {
            photo,
            cluster_label,
            is_core_sample,
        })
        .collect();

    let mut scenes = rank_clusters(park_unit, &annotated, config.top_scenes);
    let tag_scores = tag_scenes(park_unit, &annotated, &mut scenes, config)?;

    // idf covers every cluster, so unranked ones are folded into noise only now
    let demoted = demote_unranked(&mut annotated, &scenes);
    if demoted > 0 {
        info!(
            "[Pipeline] {}: {} photos in clusters outside the top {} relabelled as noise",
            park_unit, demoted, config.top_scenes
        );
    }

    Ok(ParkRun {
        park_unit: park_unit.to_string(),
        parameters: ClusteringParameters {
            park_unit: park_unit.to_string(),
            radius_eps: outcome.radius_eps,
            min_samples: outcome.min_samples,
            cluster_count: outcome.cluster_count,
        },
        photos: annotated,
        scenes,
        tag_scores,
    })
}

/// Recluster one park from `source` and persist the result to `sink`.
///
/// On error nothing is written.
pub fn refresh_park(
    source: &dyn PhotoSource,
    sink: &dyn SceneSink,
    park_unit: &str,
    config: &ClusterConfig,
) -> Result<ParkRun> {
    let photos = source.photos_for_park(park_unit)?;
    let boundary = source.boundary(park_unit)?;
    let run = process_park(park_unit, photos, boundary.as_ref(), config)?;
    sink.replace_park(&run)?;

    info!(
        "[Pipeline] {}: {} photos, {} clusters, {} scenes persisted",
        park_unit,
        run.photos.len(),
        run.parameters.cluster_count,
        run.scenes.len()
    );
    Ok(run)
}

/// Recompute tag rankings for the last persisted clustering of a park
/// without reclustering.
///
/// Scene photos are read cluster by cluster through
/// [`PhotoSource::photos_in_cluster`]; the idf table is built from all
/// annotated photos of the park. Unranked clusters were persisted as noise,
/// so for parks with more than `top_scenes` clusters the documents are the
/// ranked scenes only.
pub fn retag_park(
    source: &dyn PhotoSource,
    sink: &dyn SceneSink,
    park_unit: &str,
    config: &ClusterConfig,
) -> Result<ParkRun> {
    let photos = source.annotated_photos(park_unit)?;
    let parameters = sink.parameters_for_park(park_unit)?.ok_or_else(|| {
        SceneError::input(park_unit, "park has no persisted clustering to retag")
    })?;
    let mut scenes = sink.clusters_for_park(park_unit)?;

    let idf = inverse_document_frequency(&photos);
    let mut tag_scores = Vec::new();
    for scene in scenes.iter_mut() {
        let scene_photos = source.photos_in_cluster(park_unit, scene.cluster_label)?;
        let ranked = top_tags(park_unit, scene.cluster_label, &scene_photos, &idf, config)?;
        scene.top_tags = ranked.iter().map(|s| s.tag.clone()).collect();
        tag_scores.extend(ranked);
    }

    let run = ParkRun {
        park_unit: park_unit.to_string(),
        parameters,
        photos,
        scenes,
        tag_scores,
    };
    sink.replace_park(&run)?;
    info!(
        "[Pipeline] {}: retagged {} scenes",
        park_unit,
        run.scenes.len()
    );
    Ok(run)
}

/// Outcome of a batch refresh.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Parks refreshed successfully, with their scene counts.
    pub succeeded: Vec<(String, usize)>,
    /// Parks that failed; their stored data was left as it was.
    pub failed: Vec<(String, SceneError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Refresh every park in `park_units`, isolating failures per park.
pub fn run_batch(
    source: &dyn PhotoSource,
    sink: &dyn SceneSink,
    park_units: &[String],
    config: &ClusterConfig,
    progress: &dyn BatchProgressCallback,
) -> BatchReport {
    info!("[Batch] Refreshing {} parks", park_units.len());
    progress.on_start(park_units.len() as u32);

    let refresh_one = |park_unit: &String| {
        let result = refresh_park(source, sink, park_unit, config);
        progress.on_park_done(park_unit, result.is_ok());
        if let Err(e) = &result {
            warn!("[Batch] {} failed: {}", park_unit, e);
        }
        (park_unit.clone(), result)
    };

    #[cfg(feature = "parallel")]
    let results: Vec<(String, Result<ParkRun>)> = {
        use rayon::prelude::*;
        park_units.par_iter().map(refresh_one).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(String, Result<ParkRun>)> = park_units.iter().map(refresh_one).collect();

    let mut report = BatchReport::default();
    for (park_unit, result) in results {
        match result {
            Ok(run) => report.succeeded.push((park_unit, run.scenes.len())),
            Err(e) => report.failed.push((park_unit, e)),
        }
    }

    info!(
        "[Batch] Done: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}
