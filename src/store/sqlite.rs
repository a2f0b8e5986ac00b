//! SQLite store.
//!
//! Ingested photos live in `photos` and are never rewritten by a refresh.
//! Each refresh replaces, inside one transaction and scoped to the park unit,
//! the rows of `photo_clusters`, `clusters`, `clustering_parameters` and
//! `tag_scores`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{OptionExt, Result, SceneError};
use crate::geofence::{BoundaryRings, ParkBoundary};
use crate::store::{PhotoSource, SceneSink};
use crate::{AnnotatedPhoto, ClusterSummary, ClusteringParameters, ParkRun, PhotoPoint, TagScore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    park_unit TEXT NOT NULL,
    id TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    tags TEXT,
    upload_timestamp INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (park_unit, id)
);

CREATE TABLE IF NOT EXISTS boundaries (
    park_unit TEXT PRIMARY KEY,
    rings TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS photo_clusters (
    park_unit TEXT NOT NULL,
    photo_id TEXT NOT NULL,
    cluster_label INTEGER NOT NULL,
    is_core_sample INTEGER NOT NULL,
    PRIMARY KEY (park_unit, photo_id)
);

CREATE TABLE IF NOT EXISTS clusters (
    park_unit TEXT NOT NULL,
    cluster_label INTEGER NOT NULL,
    centroid_latitude REAL NOT NULL,
    centroid_longitude REAL NOT NULL,
    photo_count INTEGER NOT NULL,
    popularity_rank INTEGER,
    top_tags TEXT NOT NULL,
    PRIMARY KEY (park_unit, cluster_label)
);

CREATE TABLE IF NOT EXISTS clustering_parameters (
    park_unit TEXT PRIMARY KEY,
    radius_eps REAL,
    min_samples INTEGER,
    cluster_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tag_scores (
    park_unit TEXT NOT NULL,
    cluster_label INTEGER NOT NULL,
    position INTEGER NOT NULL,
    tag TEXT NOT NULL,
    term_frequency REAL NOT NULL,
    inverse_document_frequency REAL NOT NULL,
    tfidf REAL NOT NULL,
    PRIMARY KEY (park_unit, cluster_label, position)
);

CREATE INDEX IF NOT EXISTS idx_photo_clusters_label ON photo_clusters(park_unit, cluster_label);
"#;

/// SQLite-backed photo source and scene sink.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoPoint> {
    let tags: Option<String> = row.get("tags")?;
    Ok(PhotoPoint::from_raw_tags(
        row.get::<_, String>("id")?,
        row.get::<_, String>("park_unit")?,
        row.get("latitude")?,
        row.get("longitude")?,
        tags.as_deref(),
        row.get("upload_timestamp")?,
    ))
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::initialize(Connection::open(path)?)
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SceneError::Storage("sqlite connection lock poisoned".to_string()))
    }

    /// Insert or replace ingested photos.
    pub fn insert_photos(&self, photos: &[PhotoPoint]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO photos (park_unit, id, latitude, longitude, tags, upload_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in photos {
                let tags = if p.tags.is_empty() {
                    None
                } else {
                    Some(p.tags.join(" "))
                };
                stmt.execute(params![
                    p.park_unit,
                    p.id,
                    p.latitude,
                    p.longitude,
                    tags,
                    p.upload_timestamp
                ])?;
            }
        }
        tx.commit()?;
        Ok(photos.len())
    }

    /// Store or replace the boundary of a park.
    pub fn set_boundary(&self, park_unit: &str, boundary: &ParkBoundary) -> Result<()> {
        let rings = serde_json::to_string(boundary.rings())?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO boundaries (park_unit, rings) VALUES (?1, ?2)",
            params![park_unit, rings],
        )?;
        Ok(())
    }
}

impl PhotoSource for SqliteStore {
    fn park_units(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT park_unit FROM photos ORDER BY park_unit")?;
        let units = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(units)
    }

    fn photos_for_park(&self, park_unit: &str) -> Result<Vec<PhotoPoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT park_unit, id, latitude, longitude, tags, upload_timestamp
             FROM photos WHERE park_unit = ?1 ORDER BY rowid",
        )?;
        let photos = stmt
            .query_map(params![park_unit], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn annotated_photos(&self, park_unit: &str) -> Result<Vec<AnnotatedPhoto>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.park_unit, p.id, p.latitude, p.longitude, p.tags, p.upload_timestamp,
                    c.cluster_label, c.is_core_sample
             FROM photos p
             JOIN photo_clusters c ON c.park_unit = p.park_unit AND c.photo_id = p.id
             WHERE p.park_unit = ?1
             ORDER BY p.rowid",
        )?;
        let photos = stmt
            .query_map(params![park_unit], |row| {
                Ok(AnnotatedPhoto {
                    photo: photo_from_row(row)?,
                    cluster_label: row.get("cluster_label")?,
                    is_core_sample: row.get("is_core_sample")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn photos_in_cluster(&self, park_unit: &str, cluster_label: i32) -> Result<Vec<PhotoPoint>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.park_unit, p.id, p.latitude, p.longitude, p.tags, p.upload_timestamp
             FROM photos p
             JOIN photo_clusters c ON c.park_unit = p.park_unit AND c.photo_id = p.id
             WHERE p.park_unit = ?1 AND c.cluster_label = ?2
             ORDER BY p.rowid",
        )?;
        let photos = stmt
            .query_map(params![park_unit, cluster_label], photo_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    fn boundary(&self, park_unit: &str) -> Result<Option<ParkBoundary>> {
        let rings: Option<String> = self
            .conn()?
            .query_row(
                "SELECT rings FROM boundaries WHERE park_unit = ?1",
                params![park_unit],
                |row| row.get(0),
            )
            .optional()?;
        match rings {
            Some(json) => {
                let rings: BoundaryRings = serde_json::from_str(&json)?;
                ParkBoundary::from_rings(rings)
                    .ok_or_input(park_unit, "stored boundary has no valid polygon")
                    .map(Some)
            }
            None => Ok(None),
        }
    }
}

impl SceneSink for SqliteStore {
    fn replace_park(&self, run: &ParkRun) -> Result<()> {
        let park = run.park_unit.as_str();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for table in [
            "photo_clusters",
            "clusters",
            "clustering_parameters",
            "tag_scores",
        ] {
            tx.execute(
                &format!("DELETE FROM {table} WHERE park_unit = ?1"),
                params![park],
            )?;
        }

        tx.execute(
            "INSERT INTO clustering_parameters (park_unit, radius_eps, min_samples, cluster_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                park,
                run.parameters.radius_eps,
                run.parameters.min_samples.map(|m| m as i64),
                run.parameters.cluster_count as i64
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO photo_clusters (park_unit, photo_id, cluster_label, is_core_sample)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in &run.photos {
                stmt.execute(params![park, p.photo.id, p.cluster_label, p.is_core_sample])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO clusters (park_unit, cluster_label, centroid_latitude, centroid_longitude,
                                       photo_count, popularity_rank, top_tags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for s in &run.scenes {
                stmt.execute(params![
                    park,
                    s.cluster_label,
                    s.centroid_latitude,
                    s.centroid_longitude,
                    s.photo_count as i64,
                    s.popularity_rank,
                    s.top_tags_joined()
                ])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO tag_scores (park_unit, cluster_label, position, tag, term_frequency,
                                         inverse_document_frequency, tfidf)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut position: i64 = 0;
            let mut previous_label = None;
            for t in &run.tag_scores {
                if previous_label != Some(t.cluster_label) {
                    position = 0;
                    previous_label = Some(t.cluster_label);
                }
                stmt.execute(params![
                    park,
                    t.cluster_label,
                    position,
                    t.tag,
                    t.term_frequency,
                    t.inverse_document_frequency,
                    t.tfidf
                ])?;
                position += 1;
            }
        }

        tx.commit()?;
        debug!(
            "[Store] Replaced {}: {} photos, {} scenes, {} tag scores",
            park,
            run.photos.len(),
            run.scenes.len(),
            run.tag_scores.len()
        );
        Ok(())
    }

    fn clusters_for_park(&self, park_unit: &str) -> Result<Vec<ClusterSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT park_unit, cluster_label, centroid_latitude, centroid_longitude, photo_count,
                    popularity_rank, top_tags
             FROM clusters WHERE park_unit = ?1
             ORDER BY popularity_rank IS NULL, popularity_rank, cluster_label",
        )?;
        let clusters = stmt
            .query_map(params![park_unit], |row| {
                let top_tags: String = row.get("top_tags")?;
                Ok(ClusterSummary {
                    park_unit: row.get("park_unit")?,
                    cluster_label: row.get("cluster_label")?,
                    centroid_latitude: row.get("centroid_latitude")?,
                    centroid_longitude: row.get("centroid_longitude")?,
                    photo_count: row.get::<_, i64>("photo_count")? as usize,
                    popularity_rank: row.get("popularity_rank")?,
                    top_tags: top_tags
                        .split(';')
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(clusters)
    }

    fn parameters_for_park(&self, park_unit: &str) -> Result<Option<ClusteringParameters>> {
        let parameters = self
            .conn()?
            .query_row(
                "SELECT park_unit, radius_eps, min_samples, cluster_count
                 FROM clustering_parameters WHERE park_unit = ?1",
                params![park_unit],
                |row| {
                    Ok(ClusteringParameters {
                        park_unit: row.get("park_unit")?,
                        radius_eps: row.get("radius_eps")?,
                        min_samples: row
                            .get::<_, Option<i64>>("min_samples")?
                            .map(|m| m as usize),
                        cluster_count: row.get::<_, i64>("cluster_count")? as usize,
                    })
                },
            )
            .optional()?;
        Ok(parameters)
    }

    fn tag_scores_for_park(&self, park_unit: &str) -> Result<Vec<TagScore>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.park_unit, t.cluster_label, t.tag, t.term_frequency,
                    t.inverse_document_frequency, t.tfidf
             FROM tag_scores t
             LEFT JOIN clusters c ON c.park_unit = t.park_unit AND c.cluster_label = t.cluster_label
             WHERE t.park_unit = ?1
             ORDER BY c.popularity_rank, t.cluster_label, t.position",
        )?;
        let scores = stmt
            .query_map(params![park_unit], |row| {
                Ok(TagScore {
                    park_unit: row.get("park_unit")?,
                    cluster_label: row.get("cluster_label")?,
                    tag: row.get("tag")?,
                    term_frequency: row.get("term_frequency")?,
                    inverse_document_frequency: row.get("inverse_document_frequency")?,
                    tfidf: row.get("tfidf")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scores)
    }
}
