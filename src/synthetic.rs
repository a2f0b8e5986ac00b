//! Synthetic park generator for stress testing and benchmarking.
//!
//! Generates photo sets with known scene centres, giving ground truth for
//! validating the clustering search.
//!
//! Feature-gated behind `synthetic`, not included in production builds.
//!
//! # Example
//!
//! ```rust
//! use parkscenes::synthetic::SyntheticPark;
//!
//! let dataset = SyntheticPark::with_scene_count(4, 30).generate();
//! assert_eq!(dataset.photos.len(), 4 * 30 + dataset.noise_photo_ids.len());
//! ```

use crate::geo_utils::{meters_to_deg_lat, meters_to_deg_lng};
use crate::geofence::BoundaryRings;
use crate::{GpsPoint, PhotoPoint};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

// ============================================================================
// Types
// ============================================================================

/// One dense photo spot.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub name: String,
    /// Offset of the scene centre from the park origin, meters north.
    pub north_meters: f64,
    /// Offset of the scene centre from the park origin, meters east.
    pub east_meters: f64,
    pub photo_count: usize,
    /// Standard deviation of photo positions around the centre.
    pub spread_meters: f64,
    /// Tags characteristic of the scene. Each photo draws from these.
    pub tags: Vec<String>,
}

/// An expected scene for ground truth validation.
#[derive(Debug, Clone)]
pub struct ExpectedScene {
    pub name: String,
    pub center: GpsPoint,
    pub photo_ids: Vec<String>,
}

/// A complete synthetic park with ground truth.
pub struct SyntheticDataset {
    pub park_unit: String,
    /// Scene photos first (scene by scene), then noise photos.
    pub photos: Vec<PhotoPoint>,
    pub expected_scenes: Vec<ExpectedScene>,
    pub noise_photo_ids: Vec<String>,
    /// Square boundary enclosing every generated photo.
    pub boundary: BoundaryRings,
}

/// Scenario configuration for generating a park.
#[derive(Debug, Clone)]
pub struct SyntheticPark {
    pub park_unit: String,
    pub origin: GpsPoint,
    pub scenes: Vec<SceneConfig>,
    /// Photos scattered uniformly over the park.
    pub noise_photos: usize,
    /// Half-width of the square the noise photos are drawn from.
    pub park_radius_meters: f64,
    /// Tags attached to every photo on top of the scene tags.
    pub tags_per_photo: usize,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

// ============================================================================
// Generation
// ============================================================================

/// Gaussian offset in meters (Box-Muller).
fn gaussian_pair(rng: &mut StdRng, sigma_meters: f64) -> (f64, f64) {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let r = (-2.0 * u1.ln()).sqrt() * sigma_meters;
    (r * (2.0 * PI * u2).cos(), r * (2.0 * PI * u2).sin())
}

fn offset(origin: &GpsPoint, north_meters: f64, east_meters: f64) -> GpsPoint {
    GpsPoint::new(
        origin.latitude + meters_to_deg_lat(north_meters),
        origin.longitude + meters_to_deg_lng(east_meters, origin.latitude),
    )
}

/// Random lowercase word of 4..9 letters.
fn random_word(rng: &mut StdRng) -> String {
    let len = rng.gen_range(4..9);
    (0..len)
        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
        .collect()
}

impl SyntheticPark {
    /// Generate the photo set. Deterministic for a given seed.
    pub fn generate(&self) -> SyntheticDataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut photos = Vec::new();
        let mut expected_scenes = Vec::with_capacity(self.scenes.len());
        let mut timestamp: i64 = 1_500_000_000;

        for scene in &self.scenes {
            let center = offset(&self.origin, scene.north_meters, scene.east_meters);
            let mut photo_ids = Vec::with_capacity(scene.photo_count);

            for i in 0..scene.photo_count {
                let (dn, de) = gaussian_pair(&mut rng, scene.spread_meters);
                let position = offset(&center, dn, de);
                let id = format!("{}-{}-{}", self.park_unit, scene.name, i);

                let mut tags: Vec<String> = Vec::with_capacity(self.tags_per_photo + 1);
                if !scene.tags.is_empty() {
                    tags.push(scene.tags[rng.gen_range(0..scene.tags.len())].clone());
                }
                tags.extend((0..self.tags_per_photo).map(|_| random_word(&mut rng)));

                timestamp += rng.gen_range(60..86_400);
                photos.push(PhotoPoint::new(
                    id.clone(),
                    self.park_unit.clone(),
                    position.latitude,
                    position.longitude,
                    tags,
                    timestamp,
                ));
                photo_ids.push(id);
            }

            expected_scenes.push(ExpectedScene {
                name: scene.name.clone(),
                center,
                photo_ids,
            });
        }

        let half = self.park_radius_meters;
        let mut noise_photo_ids = Vec::with_capacity(self.noise_photos);
        for i in 0..self.noise_photos {
            let position = offset(
                &self.origin,
                rng.gen_range(-half..half),
                rng.gen_range(-half..half),
            );
            let id = format!("{}-noise-{}", self.park_unit, i);
            timestamp += rng.gen_range(60..86_400);
            photos.push(PhotoPoint::new(
                id.clone(),
                self.park_unit.clone(),
                position.latitude,
                position.longitude,
                vec![random_word(&mut rng)],
                timestamp,
            ));
            noise_photo_ids.push(id);
        }

        // Boundary with a margin so every photo is strictly inside.
        let margin = half * 1.5 + self
            .scenes
            .iter()
            .map(|s| s.north_meters.abs().max(s.east_meters.abs()) + 10.0 * s.spread_meters)
            .fold(0.0, f64::max);
        let corner = |n: f64, e: f64| {
            let p = offset(&self.origin, n, e);
            [p.longitude, p.latitude]
        };
        let exterior = vec![
            corner(-margin, -margin),
            corner(-margin, margin),
            corner(margin, margin),
            corner(margin, -margin),
            corner(-margin, -margin),
        ];

        SyntheticDataset {
            park_unit: self.park_unit.clone(),
            photos,
            expected_scenes,
            noise_photo_ids,
            boundary: BoundaryRings {
                polygons: vec![vec![exterior]],
            },
        }
    }
}

// ============================================================================
// Presets
// ============================================================================

impl SyntheticPark {
    /// Three well separated scenes of different popularity.
    pub fn three_scenes() -> Self {
        let scene = |name: &str, north: f64, east: f64, count: usize, tag: &str| SceneConfig {
            name: name.to_string(),
            north_meters: north,
            east_meters: east,
            photo_count: count,
            spread_meters: 25.0,
            tags: vec![tag.to_string()],
        };
        Self {
            park_unit: "syn".to_string(),
            origin: GpsPoint::new(44.46, -110.83),
            scenes: vec![
                scene("geyser", 0.0, 0.0, 60, "geyser"),
                scene("falls", 3_000.0, 2_000.0, 40, "waterfall"),
                scene("lake", -2_500.0, 3_500.0, 20, "lake"),
            ],
            noise_photos: 8,
            park_radius_meters: 5_000.0,
            tags_per_photo: 2,
            seed: 42,
        }
    }

    /// `scene_count` equally sized scenes laid out on a grid 2 km apart.
    pub fn with_scene_count(scene_count: usize, photos_per_scene: usize) -> Self {
        let side = (scene_count as f64).sqrt().ceil().max(1.0) as usize;
        let scenes = (0..scene_count)
            .map(|i| SceneConfig {
                name: format!("scene{i}"),
                north_meters: (i / side) as f64 * 2_000.0,
                east_meters: (i % side) as f64 * 2_000.0,
                photo_count: photos_per_scene,
                spread_meters: 20.0,
                tags: vec![format!("spot{}", char::from(b'a' + (i % 26) as u8))],
            })
            .collect();
        Self {
            park_unit: "grid".to_string(),
            origin: GpsPoint::new(37.74, -119.57),
            scenes,
            noise_photos: scene_count,
            park_radius_meters: side as f64 * 2_000.0,
            tags_per_photo: 1,
            seed: 7,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_generation() {
        let a = SyntheticPark::three_scenes().generate();
        let b = SyntheticPark::three_scenes().generate();
        assert_eq!(a.photos, b.photos);

        let c = SyntheticPark::three_scenes().with_seed(43).generate();
        assert_ne!(a.photos, c.photos);
    }

    #[test]
    fn test_counts_match_configuration() {
        let park = SyntheticPark::three_scenes();
        let dataset = park.generate();
        let scene_photos: usize = park.scenes.iter().map(|s| s.photo_count).sum();
        assert_eq!(dataset.photos.len(), scene_photos + park.noise_photos);
        assert_eq!(dataset.expected_scenes.len(), 3);
        assert_eq!(dataset.noise_photo_ids.len(), park.noise_photos);
    }

    #[test]
    fn test_scene_photos_near_center() {
        let dataset = SyntheticPark::three_scenes().generate();
        for scene in &dataset.expected_scenes {
            for photo in dataset
                .photos
                .iter()
                .filter(|p| scene.photo_ids.contains(&p.id))
            {
                let dlat = (photo.latitude - scene.center.latitude).abs();
                // 25 m sigma, 10 sigma is ~0.0023 degrees
                assert!(dlat < 0.003, "{} too far from {}", photo.id, scene.name);
            }
        }
    }

    #[test]
    fn test_tags_are_letters_only() {
        let dataset = SyntheticPark::with_scene_count(5, 10).generate();
        for photo in &dataset.photos {
            assert!(photo.has_tags());
            for tag in &photo.tags {
                assert!(tag.bytes().all(|b| b.is_ascii_lowercase()), "bad tag {tag}");
            }
        }
    }
}
