//! Tests for TF-IDF tag ranking

use std::collections::HashMap;

use parkscenes::tags::{
    inverse_document_frequency, is_tag_token, rank_tags, score_cluster, term_frequency,
};
use parkscenes::{
    AnnotatedPhoto, ClusterConfig, ClusterSummary, IdfTable, NOISE_LABEL, PhotoPoint, SceneError,
    TagOrder, tag_scenes,
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

fn photo(id: &str, tags: Vec<String>) -> PhotoPoint {
    PhotoPoint::new(id, "olym", 47.8, -123.6, tags, 0)
}

fn in_cluster(label: i32, photo: PhotoPoint) -> AnnotatedPhoto {
    AnnotatedPhoto {
        photo,
        cluster_label: label,
        is_core_sample: true,
    }
}

fn scene(label: i32) -> ClusterSummary {
    ClusterSummary {
        park_unit: "olym".to_string(),
        cluster_label: label,
        centroid_latitude: 47.8,
        centroid_longitude: -123.6,
        photo_count: 1,
        popularity_rank: Some(label as u32 + 1),
        top_tags: Vec::new(),
    }
}

/// Two clusters of 200 tokens each sharing only "river".
fn river_park() -> Vec<AnnotatedPhoto> {
    let mut first = vec!["river".to_string()];
    first.extend((0..199).map(word));
    let mut second = vec!["river".to_string()];
    second.extend((1_000..1_199).map(word));
    vec![
        in_cluster(0, photo("a", first)),
        in_cluster(1, photo("b", second)),
        in_cluster(NOISE_LABEL, photo("n", vec!["river".to_string()])),
    ]
}

#[test]
fn test_tag_tokens_are_letters_only() {
    assert!(is_tag_token("Geyser"));
    assert!(!is_tag_token("2019"));
    assert!(!is_tag_token("old_faithful"));
    assert!(!is_tag_token("café"));
    assert!(!is_tag_token(""));
}

#[test]
fn test_digits_only_tags_give_empty_tables() {
    let photos = vec![in_cluster(
        0,
        photo("a", vec!["123".to_string(), "456".to_string()]),
    )];
    let tf = term_frequency(photos.iter().map(|p| &p.photo), 0.007);
    let idf = inverse_document_frequency(&photos);

    assert!(tf.is_empty());
    assert!(idf.is_empty());

    let mut scenes = vec![scene(0)];
    let scores = tag_scenes("olym", &photos, &mut scenes, &ClusterConfig::default()).unwrap();
    assert!(scores.is_empty());
    assert!(scenes[0].top_tags.is_empty());
}

#[test]
fn test_generic_tag_is_discarded() {
    let forest = photo("a", vec!["forest".to_string(); 200]);
    assert!(term_frequency([&forest], 0.007).is_empty());
}

#[test]
fn test_shared_tag_has_zero_tfidf() {
    let photos = river_park();
    let idf = inverse_document_frequency(&photos);

    assert_eq!(idf.document_count, 2);
    assert_eq!(idf.get("river"), Some(1.0));
    assert_eq!(idf.get(&word(0)), Some(2.0));

    let tf = term_frequency(photos.iter().filter(|p| p.cluster_label == 0).map(|p| &p.photo), 0.007);
    let scores = score_cluster("olym", 0, &tf, &idf).unwrap();
    let river = scores.iter().find(|s| s.tag == "river").unwrap();
    assert_eq!(river.term_frequency, 1.0);
    assert_eq!(river.tfidf, 0.0);
}

#[test]
fn test_idf_at_least_one_and_tf_in_range() {
    // 300 tokens; one tag appears twice, the rest once
    let mut tags: Vec<String> = (0..298).map(word).collect();
    tags.push(word(5));
    tags.push("moss".to_string());
    let photos = vec![
        in_cluster(0, photo("a", tags)),
        in_cluster(1, photo("b", (400..450).map(word).collect())),
    ];

    let idf = inverse_document_frequency(&photos);
    assert!(idf.values.values().all(|&v| v >= 1.0));

    let tf = term_frequency(photos.iter().filter(|p| p.cluster_label == 0).map(|p| &p.photo), 0.007);
    assert!(!tf.is_empty());
    assert!(tf.values().all(|&v| (0.5..=1.0).contains(&v)));
    assert_eq!(tf.get(&word(5)), Some(&1.0));
    assert_eq!(tf.get("moss"), Some(&0.75));
}

#[test]
fn test_missing_idf_is_consistency_error() {
    let tf: HashMap<String, f64> = [("glacier".to_string(), 1.0)].into_iter().collect();
    let err = score_cluster("olym", 4, &tf, &IdfTable::default()).unwrap_err();

    match err {
        SceneError::Consistency {
            park_unit,
            cluster_label,
            tag,
        } => {
            assert_eq!(park_unit, "olym");
            assert_eq!(cluster_label, 4);
            assert_eq!(tag, "glacier");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_ascending_order_puts_shared_tag_first() {
    let photos = river_park();
    let mut scenes = vec![scene(0), scene(1)];
    let scores = tag_scenes("olym", &photos, &mut scenes, &ClusterConfig::default()).unwrap();

    assert_eq!(scores.len(), 40);
    for s in &scenes {
        assert_eq!(s.top_tags.len(), 20);
        assert_eq!(s.top_tags[0], "river");
    }
    // Equal scores are ordered by tag name
    let rest = &scenes[0].top_tags[1..];
    assert!(rest.windows(2).all(|w| w[0] < w[1]));

    let first_scene: Vec<&str> = scores
        .iter()
        .filter(|s| s.cluster_label == 0)
        .map(|s| s.tag.as_str())
        .collect();
    assert_eq!(first_scene.join(";"), scenes[0].top_tags_joined());
}

#[test]
fn test_descending_order() {
    let photos = river_park();
    let mut scenes = vec![scene(0)];
    let config = ClusterConfig {
        tag_order: TagOrder::Descending,
        ..ClusterConfig::default()
    };
    tag_scenes("olym", &photos, &mut scenes, &config).unwrap();

    assert_eq!(scenes[0].top_tags.len(), 20);
    assert!(!scenes[0].top_tags.contains(&"river".to_string()));
}

#[test]
fn test_rank_tags_orders() {
    let photos = river_park();
    let idf = inverse_document_frequency(&photos);
    let tf = term_frequency([&photos[0].photo], 0.007);
    let scores = score_cluster("olym", 0, &tf, &idf).unwrap();

    let ascending = rank_tags(scores.clone(), TagOrder::Ascending);
    let descending = rank_tags(scores, TagOrder::Descending);
    assert_eq!(ascending.first().map(|s| s.tag.as_str()), Some("river"));
    assert_eq!(descending.last().map(|s| s.tag.as_str()), Some("river"));
    assert!(ascending.windows(2).all(|w| w[0].tfidf <= w[1].tfidf));
}

#[test]
fn test_noise_photos_are_not_documents() {
    let photos = vec![
        in_cluster(NOISE_LABEL, photo("n", vec!["bear".to_string()])),
        in_cluster(0, photo("a", vec!["elk".to_string()])),
        in_cluster(1, photo("b", Vec::new())),
    ];
    let idf = inverse_document_frequency(&photos);
    assert_eq!(idf.document_count, 1);
    assert_eq!(idf.get("bear"), None);
    assert_eq!(idf.get("elk"), Some(1.0));
}
