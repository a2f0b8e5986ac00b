//! Integration tests for the per-park pipeline and the batch runner

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use parkscenes::pipeline::validate_photos;
use parkscenes::{
    AtomicProgressTracker, ClusterConfig, MemoryStore, NOISE_LABEL, NoopProgress, ParkBoundary,
    ParkRun, PhotoPoint, PhotoSource, SceneError, SceneSink, TagOrder, process_park, refresh_park,
    retag_park, run_batch,
};

/// Unique letters-only word for `n`.
fn word(n: usize) -> String {
    let mut s = String::from("w");
    let mut n = n;
    for _ in 0..4 {
        s.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    s
}

/// A photo spot laid out as a grid, five columns wide, 0.0001 deg spacing.
fn spot(park: &str, prefix: &str, lat: f64, lng: f64, count: usize) -> Vec<PhotoPoint> {
    (0..count)
        .map(|i| {
            PhotoPoint::new(
                format!("{prefix}-{i}"),
                park,
                lat + (i / 5) as f64 * 1e-4,
                lng + (i % 5) as f64 * 1e-4,
                Vec::new(),
                1_600_000_000 + i as i64,
            )
        })
        .collect()
}

/// Spots of 30, 20 and 10 photos. The two larger spots carry enough
/// distinct tags to survive the generic-tag cutoff and share "boardwalk".
fn three_spots(park: &str) -> Vec<PhotoPoint> {
    let mut a = spot(park, "a", 44.40, -110.60, 30);
    for (i, p) in a.iter_mut().enumerate() {
        p.tags.push("geyser".to_string());
        p.tags.extend((0..9).map(|k| word(i * 9 + k)));
    }
    a[0].tags.push("boardwalk".to_string());

    let mut b = spot(park, "b", 44.45, -110.55, 20);
    for (i, p) in b.iter_mut().enumerate() {
        p.tags.extend((0..8).map(|k| word(5_000 + i * 8 + k)));
    }
    b[0].tags.push("boardwalk".to_string());

    let c = spot(park, "c", 44.35, -110.50, 10);

    a.into_iter().chain(b).chain(c).collect()
}

fn assert_labels_match_scenes(run: &ParkRun) {
    let scene_labels: HashSet<i32> = run.scenes.iter().map(|s| s.cluster_label).collect();
    assert_eq!(scene_labels.len(), run.scenes.len());
    for p in &run.photos {
        assert!(
            p.cluster_label == NOISE_LABEL || scene_labels.contains(&p.cluster_label),
            "photo {} has label {} without a scene",
            p.photo.id,
            p.cluster_label
        );
    }
}

#[test]
fn test_process_park_ranks_and_tags_scenes() {
    let run = process_park("yell", three_spots("yell"), None, &ClusterConfig::default()).unwrap();

    assert_eq!(run.park_unit, "yell");
    assert_eq!(run.photos.len(), 60);
    assert_eq!(run.parameters.cluster_count, 3);
    assert!(run.parameters.radius_eps.is_some());
    assert_eq!(run.noise_count(), 0);
    assert_labels_match_scenes(&run);

    let counts: Vec<usize> = run.scenes.iter().map(|s| s.photo_count).collect();
    assert_eq!(counts, vec![30, 20, 10]);
    let ranks: Vec<Option<u32>> = run.scenes.iter().map(|s| s.popularity_rank).collect();
    assert_eq!(ranks, vec![Some(1), Some(2), Some(3)]);

    let largest = &run.scenes[0];
    assert!((largest.centroid_latitude - 44.40025).abs() < 1e-9);
    assert!((largest.centroid_longitude + 110.5998).abs() < 1e-9);

    // Shared tag has idf 1, so it ranks first in ascending order
    assert_eq!(run.scenes[0].top_tags.len(), 20);
    assert_eq!(run.scenes[0].top_tags[0], "boardwalk");
    assert_eq!(run.scenes[1].top_tags[0], "boardwalk");
    assert!(!run.scenes[0].top_tags.contains(&"geyser".to_string()));
    assert!(run.scenes[2].top_tags.is_empty());
    assert_eq!(run.tag_scores.len(), 40);
}

#[test]
fn test_clusters_beyond_top_scenes_become_noise() {
    // 25 spots of 20 photos along a diagonal, equal sizes so ranks follow labels
    let photos: Vec<PhotoPoint> = (0..25)
        .flat_map(|k| {
            let offset = k as f64 * 0.01;
            spot("grte", &format!("s{k}"), 43.70 + offset, -110.80 + offset, 20)
        })
        .collect();

    let run = process_park("grte", photos, None, &ClusterConfig::default()).unwrap();

    assert_eq!(run.photos.len(), 500);
    assert_eq!(run.parameters.cluster_count, 25);
    assert_eq!(run.scenes.len(), 20);
    assert_labels_match_scenes(&run);

    let noise: Vec<_> = run
        .photos
        .iter()
        .filter(|p| p.cluster_label == NOISE_LABEL)
        .collect();
    assert_eq!(noise.len(), 100);
    assert!(noise.iter().all(|p| !p.is_core_sample));
    for k in 20..25 {
        let prefix = format!("s{k}-");
        assert!(noise.iter().any(|p| p.photo.id.starts_with(&prefix)));
    }

    // The persisted photo table keeps every photo
    let store = MemoryStore::new();
    store.replace_park(&run).unwrap();
    assert_eq!(store.annotated_photos("grte").unwrap().len(), 500);
}

#[test]
fn test_descending_tag_order() {
    let config = ClusterConfig {
        tag_order: TagOrder::Descending,
        ..ClusterConfig::default()
    };
    let run = process_park("yell", three_spots("yell"), None, &config).unwrap();
    assert!(!run.scenes[0].top_tags.contains(&"boardwalk".to_string()));
}

#[test]
fn test_assignments_mirror_photos() {
    let run = process_park("yell", three_spots("yell"), None, &ClusterConfig::default()).unwrap();
    let assignments = run.assignments();

    assert_eq!(assignments.len(), run.photos.len());
    for (a, p) in assignments.iter().zip(&run.photos) {
        assert_eq!(a.photo_id, p.photo.id);
        assert_eq!(a.cluster_label, p.cluster_label);
        assert!(!a.is_noise());
    }
}

#[test]
fn test_empty_park_has_no_scenes() {
    let run = process_park("yell", Vec::new(), None, &ClusterConfig::default()).unwrap();
    assert!(run.photos.is_empty());
    assert!(run.scenes.is_empty());
    assert_eq!(run.parameters.cluster_count, 0);
    assert_eq!(run.parameters.radius_eps, None);
    assert_eq!(run.parameters.min_samples, None);
}

#[test]
fn test_validation_errors() {
    let mut photos = three_spots("yell");
    photos[3].latitude = 95.0;
    let err = process_park("yell", photos, None, &ClusterConfig::default()).unwrap_err();
    assert!(matches!(err, SceneError::InputData { .. }));

    let mut photos = three_spots("yell");
    photos[1].id = String::new();
    assert!(validate_photos("yell", &photos).is_err());

    let mut photos = three_spots("yell");
    photos[2].park_unit = "grte".to_string();
    assert!(validate_photos("yell", &photos).is_err());

    let mut photos = three_spots("yell");
    photos[2].id = photos[1].id.clone();
    assert!(validate_photos("yell", &photos).is_err());

    let mut photos = three_spots("yell");
    photos[0].longitude = f64::NAN;
    assert!(validate_photos("yell", &photos).is_err());

    assert!(validate_photos("yell", &three_spots("yell")).is_ok());
}

#[test]
fn test_boundary_filters_photos() {
    let store = MemoryStore::from_photos(three_spots("yell")).unwrap();
    // Encloses the two northern spots only
    let rect = vec![
        [-110.61, 44.39],
        [-110.53, 44.39],
        [-110.53, 44.46],
        [-110.61, 44.46],
        [-110.61, 44.39],
    ];
    store
        .set_boundary("yell", ParkBoundary::from_exterior(rect).unwrap())
        .unwrap();

    let run = refresh_park(&store, &store, "yell", &ClusterConfig::default()).unwrap();
    assert_eq!(run.photos.len(), 50);
    assert!(run.photos.iter().all(|p| !p.photo.id.starts_with("c-")));
    assert_eq!(run.parameters.cluster_count, 2);
}

#[test]
fn test_refresh_replaces_previous_run() {
    let store = MemoryStore::from_photos(three_spots("yell")).unwrap();
    let config = ClusterConfig::default();

    let first = refresh_park(&store, &store, "yell", &config).unwrap();
    assert_eq!(store.run_for_park("yell").unwrap(), Some(first.clone()));

    // A fourth spot changes the result; the stored run follows it
    store.insert_photos(spot("yell", "d", 44.30, -110.45, 15)).unwrap();
    let second = refresh_park(&store, &store, "yell", &config).unwrap();

    assert_eq!(second.photos.len(), 75);
    assert_eq!(second.parameters.cluster_count, 4);
    assert_eq!(store.clusters_for_park("yell").unwrap(), second.scenes);
    assert_eq!(store.run_for_park("yell").unwrap(), Some(second));
}

#[test]
fn test_batch_isolates_failures() {
    let store = MemoryStore::new();
    store.insert_photos(three_spots("yell")).unwrap();
    store.insert_photos(three_spots("grte")).unwrap();
    let config = ClusterConfig::default();

    let before = refresh_park(&store, &store, "grte", &config).unwrap();

    // Break grte after its first successful run
    let mut bad = spot("grte", "bad", 44.0, -110.0, 1);
    bad[0].latitude = f64::INFINITY;
    store.insert_photos(bad).unwrap();

    let parks = vec!["grte".to_string(), "yell".to_string(), "none".to_string()];
    let progress = AtomicProgressTracker::new();
    let report = run_batch(&store, &store, &parks, &config, &progress);

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "grte");
    assert!(matches!(report.failed[0].1, SceneError::InputData { .. }));

    let mut succeeded: Vec<(String, usize)> = report.succeeded.clone();
    succeeded.sort();
    assert_eq!(succeeded, vec![("none".to_string(), 0), ("yell".to_string(), 3)]);

    // The failed park keeps its previous result
    assert_eq!(store.run_for_park("grte").unwrap(), Some(before));
    assert_eq!(store.clusters_for_park("yell").unwrap().len(), 3);

    assert_eq!(progress.total.load(Ordering::SeqCst), 3);
    assert_eq!(progress.completed.load(Ordering::SeqCst), 2);
    assert_eq!(progress.failed.load(Ordering::SeqCst), 1);
    assert_eq!(progress.finished(), 3);
}

#[test]
fn test_batch_with_noop_progress() {
    let store = MemoryStore::from_photos(three_spots("yell")).unwrap();
    let report = run_batch(
        &store,
        &store,
        &["yell".to_string()],
        &ClusterConfig::default(),
        &NoopProgress,
    );
    assert!(report.is_success());
}

#[test]
fn test_retag_matches_fresh_tagging() {
    let store = MemoryStore::from_photos(three_spots("yell")).unwrap();
    let config = ClusterConfig::default();
    let fresh = refresh_park(&store, &store, "yell", &config).unwrap();

    let retagged = retag_park(&store, &store, "yell", &config).unwrap();
    assert_eq!(retagged.scenes, fresh.scenes);
    assert_eq!(retagged.tag_scores, fresh.tag_scores);
    assert_eq!(retagged.parameters, fresh.parameters);

    let descending = ClusterConfig {
        tag_order: TagOrder::Descending,
        ..config
    };
    let reordered = retag_park(&store, &store, "yell", &descending).unwrap();
    assert_ne!(reordered.scenes[0].top_tags, fresh.scenes[0].top_tags);
    assert_eq!(
        store.clusters_for_park("yell").unwrap()[0].top_tags,
        reordered.scenes[0].top_tags
    );
}

#[test]
fn test_retag_without_clustering_fails() {
    let store = MemoryStore::from_photos(three_spots("yell")).unwrap();
    let err = retag_park(&store, &store, "yell", &ClusterConfig::default()).unwrap_err();
    assert!(matches!(err, SceneError::InputData { .. }));
}
