//! TF-IDF tag relevance per scene.
//!
//! Each cluster of a park is a document and each letters-only tag token a
//! term:
//!
//! - `idf(tag) = clusters / clusters containing tag`, computed over every
//!   non-noise cluster whose photos carry tags (not only the ranked scenes)
//! - `tf(tag) = 0.5 + 0.5 * count(tag) / max count`, computed per scene after
//!   dropping tags whose share of the scene's tokens reaches the generic-tag
//!   threshold
//! - `tfidf(tag) = tf(tag) * ln(idf(tag))`
//!
//! All counting is a fold over the photos into fresh maps.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info};

use crate::error::{OptionExt, Result};
use crate::{
    AnnotatedPhoto, ClusterConfig, ClusterSummary, NOISE_LABEL, PhotoPoint, TagOrder, TagScore,
};

/// Whether a token is a usable tag: one or more ASCII letters, nothing else.
pub fn is_tag_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Usable tag tokens of a photo, in order.
pub fn tag_tokens(photo: &PhotoPoint) -> impl Iterator<Item = &str> {
    photo
        .tags
        .iter()
        .flat_map(|t| t.split_whitespace())
        .filter(|t| is_tag_token(t))
}

/// Park-wide inverse document frequencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdfTable {
    /// Clusters with at least one tagged photo.
    pub document_count: usize,
    pub values: HashMap<String, f64>,
}

impl IdfTable {
    pub fn get(&self, tag: &str) -> Option<f64> {
        self.values.get(tag).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build the idf table over all clusters of a park.
pub fn inverse_document_frequency(photos: &[AnnotatedPhoto]) -> IdfTable {
    let documents: BTreeMap<i32, HashSet<&str>> = photos
        .iter()
        .filter(|p| p.cluster_label != NOISE_LABEL && p.photo.has_tags())
        .fold(BTreeMap::new(), |mut docs, p| {
            docs.entry(p.cluster_label)
                .or_insert_with(HashSet::new)
                .extend(tag_tokens(&p.photo));
            docs
        });

    let document_frequency: HashMap<&str, usize> =
        documents.values().flatten().fold(HashMap::new(), |mut df, tag| {
            *df.entry(*tag).or_insert(0) += 1;
            df
        });

    let document_count = documents.len();
    let values = document_frequency
        .into_iter()
        .map(|(tag, df)| (tag.to_string(), document_count as f64 / df as f64))
        .collect();

    IdfTable {
        document_count,
        values,
    }
}

/// Raw token counts over a set of photos.
pub fn raw_counts<'a>(photos: impl IntoIterator<Item = &'a PhotoPoint>) -> HashMap<String, usize> {
    photos
        .into_iter()
        .flat_map(tag_tokens)
        .fold(HashMap::new(), |mut counts, tag| {
            *counts.entry(tag.to_string()).or_insert(0) += 1;
            counts
        })
}

/// Double-normalized term frequency of one scene.
///
/// Tags whose share of all tokens is at least `generic_share` are dropped
/// before normalization. Empty when nothing qualifies.
pub fn term_frequency<'a>(
    photos: impl IntoIterator<Item = &'a PhotoPoint>,
    generic_share: f64,
) -> HashMap<String, f64> {
    let counts = raw_counts(photos);
    let total: usize = counts.values().sum();
    if total == 0 {
        return HashMap::new();
    }

    let kept: HashMap<String, usize> = counts
        .into_iter()
        .filter(|(_, count)| (*count as f64 / total as f64) < generic_share)
        .collect();

    let Some(max_count) = kept.values().copied().max() else {
        return HashMap::new();
    };

    kept.into_iter()
        .map(|(tag, count)| (tag, 0.5 + 0.5 * count as f64 / max_count as f64))
        .collect()
}

/// Combine a scene's term frequencies with the park's idf table.
///
/// A term missing from the idf table means the two were built from different
/// corpora and is reported as a consistency error.
pub fn score_cluster(
    park_unit: &str,
    cluster_label: i32,
    tf: &HashMap<String, f64>,
    idf: &IdfTable,
) -> Result<Vec<TagScore>> {
    tf.iter()
        .map(|(tag, &term_frequency)| {
            let inverse_document_frequency = idf
                .get(tag)
                .ok_or_inconsistent(park_unit, cluster_label, tag)?;
            Ok(TagScore {
                park_unit: park_unit.to_string(),
                cluster_label,
                tag: tag.clone(),
                term_frequency,
                inverse_document_frequency,
                tfidf: term_frequency * inverse_document_frequency.ln(),
            })
        })
        .collect()
}

/// Sort scores in the requested order. Equal scores fall back to tag name.
pub fn rank_tags(mut scores: Vec<TagScore>, order: TagOrder) -> Vec<TagScore> {
    scores.sort_by(|a, b| {
        let by_score = match order {
            TagOrder::Ascending => a.tfidf.total_cmp(&b.tfidf),
            TagOrder::Descending => b.tfidf.total_cmp(&a.tfidf),
        };
        match by_score {
            Ordering::Equal => a.tag.cmp(&b.tag),
            other => other,
        }
    });
    scores
}

/// Ranked tags for one scene, truncated to `config.top_tag_count`.
pub fn top_tags<'a>(
    park_unit: &str,
    cluster_label: i32,
    scene_photos: impl IntoIterator<Item = &'a PhotoPoint>,
    idf: &IdfTable,
    config: &ClusterConfig,
) -> Result<Vec<TagScore>> {
    let tf = term_frequency(scene_photos, config.generic_tag_share);
    let scores = score_cluster(park_unit, cluster_label, &tf, idf)?;
    let mut ranked = rank_tags(scores, config.tag_order);
    ranked.truncate(config.top_tag_count);
    Ok(ranked)
}

/// Fill `top_tags` of every scene and return the tag scores behind them.
pub fn tag_scenes(
    park_unit: &str,
    photos: &[AnnotatedPhoto],
    scenes: &mut [ClusterSummary],
    config: &ClusterConfig,
) -> Result<Vec<TagScore>> {
    let idf = inverse_document_frequency(photos);
    debug!(
        "[Tags] {}: {} documents, {} distinct tags",
        park_unit,
        idf.document_count,
        idf.len()
    );

    let mut all_scores = Vec::new();
    for scene in scenes.iter_mut() {
        let label = scene.cluster_label;
        let scene_photos = photos
            .iter()
            .filter(|p| p.cluster_label == label)
            .map(|p| &p.photo);
        let ranked = top_tags(park_unit, label, scene_photos, &idf, config)?;
        scene.top_tags = ranked.iter().map(|s| s.tag.clone()).collect();
        all_scores.extend(ranked);
    }

    info!(
        "[Tags] {}: scored {} tags across {} scenes",
        park_unit,
        all_scores.len(),
        scenes.len()
    );
    Ok(all_scores)
}
