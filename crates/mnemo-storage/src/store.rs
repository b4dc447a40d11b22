// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed memory store holding both the document index and the
//! vector index.
//!
//! Embeddings are stored as little-endian f32 BLOBs in the same row as the
//! document, so every public write is a single SQLite transaction and the
//! document/vector coupling invariant holds without a write-ahead protocol.
//! Deletion tombstones the row (`status = 'deleted'`, embedding NULL) until
//! [`MemoryStore::compact`] purges it.

use std::path::Path;
use std::pin::Pin;

use futures::Stream;
use mnemo_core::{
    blob_to_vec, cosine_similarity, normalize_similarity, vec_to_blob, EventType, MemoryDraft,
    MemoryRecord, MemoryStatus, MnemoError, Result, StatusCounts,
};
use rusqlite::{params, params_from_iter, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::filter::{ScanFilter, SqlParam};
use crate::migrations;

/// Schema version this build reads and writes.
const SCHEMA_VERSION: &str = "1";

const COLUMNS: &str = "doc_id, content, event_type, importance, create_time, last_access_time, \
     access_count, session_id, persona_id, status, fingerprint, supersedes, embedding";

/// Fields of a memory that may be patched in place.
///
/// `content` and `embedding` are deliberately absent: a content edit is
/// modeled as [`MemoryStore::replace`] (delete + insert with a
/// back-reference).
#[derive(Debug, Clone, Default)]
pub struct MemoryPatch {
    pub importance: Option<f64>,
    pub last_access_time: Option<i64>,
    pub access_count: Option<i64>,
    pub status: Option<MemoryStatus>,
}

impl MemoryPatch {
    fn is_empty(&self) -> bool {
        self.importance.is_none()
            && self.last_access_time.is_none()
            && self.access_count.is_none()
            && self.status.is_none()
    }
}

/// Convert tokio_rusqlite errors into domain errors.
///
/// Busy/locked failures surface as `Conflict` so callers can retry; domain
/// errors smuggled through `Error::Other` are unwrapped back.
fn storage_err(e: tokio_rusqlite::Error) -> MnemoError {
    match e {
        tokio_rusqlite::Error::Rusqlite(inner) => match &inner {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                MnemoError::Conflict(inner.to_string())
            }
            _ => MnemoError::Storage {
                source: Box::new(inner),
            },
        },
        tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<MnemoError>() {
            Ok(domain) => *domain,
            Err(other) => MnemoError::Storage { source: other },
        },
        other => MnemoError::Storage {
            source: Box::new(other),
        },
    }
}

/// Smuggle a domain error out of a connection closure.
fn domain(e: MnemoError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(e))
}

/// Persistent store for memories in SQLite.
///
/// Cheap to clone; all clones share the underlying connection, whose worker
/// serializes writes.
#[derive(Clone)]
pub struct MemoryStore {
    conn: Connection,
    dimension: usize,
}

impl MemoryStore {
    /// Open (or create) a store at `path` with the given vector dimension.
    ///
    /// Runs migrations, verifies the schema version stamp, and checks the
    /// document/vector coupling invariant. A store whose stamp or rows
    /// violate expectations refuses to open with [`MnemoError::Corrupted`].
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).await.map_err(storage_err)?;
        conn.call(|conn| {
            let _mode: String =
                conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;
        let store = Self::init(conn, dimension).await?;
        info!(path = %path.as_ref().display(), dimension, "memory store opened");
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and harnesses.
    pub async fn open_in_memory(dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        Self::init(conn, dimension).await
    }

    async fn init(conn: Connection, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MnemoError::Config(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        conn.call(|conn| {
            migrations::run_migrations(conn).map_err(domain)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;

        let store = Self { conn, dimension };
        store.check_schema_version().await?;
        store.verify_integrity().await?;
        Ok(store)
    }

    async fn check_schema_version(&self) -> Result<()> {
        let version: Option<String> = self
            .conn
            .call(|conn| {
                let v = conn
                    .query_row(
                        "SELECT value FROM meta WHERE key = 'schema_version'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(v)
            })
            .await
            .map_err(storage_err)?;

        match version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(MnemoError::Corrupted(format!(
                "schema version mismatch: store has {other}, engine expects {SCHEMA_VERSION}"
            ))),
            None => Err(MnemoError::Corrupted(
                "schema version stamp missing".to_string(),
            )),
        }
    }

    /// Assert the document/vector coupling invariant over the whole store:
    /// live rows carry exactly one embedding, tombstones carry none, and
    /// every embedding has the configured dimension.
    pub async fn verify_integrity(&self) -> Result<()> {
        let expected_blob_len = (self.dimension * 4) as i64;
        let (decoupled, misdimensioned): (i64, i64) = self
            .conn
            .call(move |conn| {
                let decoupled: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM memories \
                     WHERE (status != 'deleted' AND embedding IS NULL) \
                        OR (status = 'deleted' AND embedding IS NOT NULL)",
                    [],
                    |row| row.get(0),
                )?;
                let misdimensioned: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM memories \
                     WHERE embedding IS NOT NULL AND length(embedding) != ?1",
                    params![expected_blob_len],
                    |row| row.get(0),
                )?;
                Ok((decoupled, misdimensioned))
            })
            .await
            .map_err(storage_err)?;

        if decoupled > 0 {
            return Err(MnemoError::Corrupted(format!(
                "{decoupled} rows violate the document/vector coupling invariant"
            )));
        }
        if misdimensioned > 0 {
            return Err(MnemoError::Corrupted(format!(
                "{misdimensioned} rows have embeddings of the wrong dimension"
            )));
        }
        Ok(())
    }

    /// Vector dimension this store was opened with.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert a new memory with its embedding in one transaction.
    ///
    /// Returns the storage-assigned `doc_id`. Importance is clamped to
    /// [0, 1]; `last_access_time` starts equal to `create_time`.
    pub async fn insert(&self, draft: MemoryDraft, embedding: &[f32]) -> Result<i64> {
        if embedding.len() != self.dimension {
            return Err(MnemoError::Internal(format!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dimension
            )));
        }
        let blob = vec_to_blob(embedding);
        let importance = draft.importance.clamp(0.0, 1.0);

        let doc_id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO memories (content, event_type, importance, create_time, \
                     last_access_time, access_count, session_id, persona_id, status, \
                     fingerprint, supersedes, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?4, 0, ?5, ?6, 'active', ?7, ?8, ?9)",
                    params![
                        draft.content,
                        draft.event_type.as_str(),
                        importance,
                        draft.create_time,
                        draft.session_id,
                        draft.persona_id,
                        draft.fingerprint,
                        draft.supersedes,
                        blob,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .map_err(storage_err)?;

        debug!(doc_id, "inserted memory");
        Ok(doc_id)
    }

    /// Get a memory by id, tombstones included.
    pub async fn get(&self, doc_id: i64) -> Result<Option<MemoryRecord>> {
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {COLUMNS} FROM memories WHERE doc_id = ?1");
                let record = conn
                    .query_row(&sql, params![doc_id], row_to_record)
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(storage_err)
    }

    /// Batch fetch by id. Missing ids are silently absent from the result.
    pub async fn get_many(&self, doc_ids: &[i64]) -> Result<Vec<MemoryRecord>> {
        if doc_ids.is_empty() {
            return Ok(vec![]);
        }
        let ids = doc_ids.to_vec();
        self.conn
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT {COLUMNS} FROM memories WHERE doc_id IN ({placeholders}) \
                     ORDER BY doc_id ASC"
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params_from_iter(ids.iter()), row_to_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    /// Patch mutable fields of one memory atomically.
    ///
    /// Returns [`MnemoError::NotFound`] when the row does not exist;
    /// callers treat that as a soft skip.
    pub async fn update(&self, doc_id: i64, patch: MemoryPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        // Tombstoning must also drop the vector; that path is delete_many.
        if patch.status == Some(MemoryStatus::Deleted) {
            return Err(MnemoError::Internal(
                "cannot patch status to deleted, use delete_many".to_string(),
            ));
        }
        self.conn
            .call(move |conn| {
                let mut sets: Vec<String> = Vec::new();
                let mut values: Vec<SqlParam> = Vec::new();
                if let Some(importance) = patch.importance {
                    sets.push("importance = ?".to_string());
                    values.push(SqlParam::Real(importance.clamp(0.0, 1.0)));
                }
                if let Some(ts) = patch.last_access_time {
                    sets.push("last_access_time = ?".to_string());
                    values.push(SqlParam::Int(ts));
                }
                if let Some(count) = patch.access_count {
                    sets.push("access_count = ?".to_string());
                    values.push(SqlParam::Int(count.max(0)));
                }
                if let Some(status) = patch.status {
                    sets.push("status = ?".to_string());
                    values.push(SqlParam::Text(status.as_str().to_string()));
                }
                values.push(SqlParam::Int(doc_id));
                let sql = format!(
                    "UPDATE memories SET {} WHERE doc_id = ? AND status != 'deleted'",
                    sets.join(", ")
                );
                let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
                if changed == 0 {
                    return Err(domain(MnemoError::NotFound { doc_id }));
                }
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Replace the content of a memory: tombstone the old row and insert a
    /// new one carrying a back-reference, in one transaction.
    pub async fn replace(
        &self,
        doc_id: i64,
        draft: MemoryDraft,
        embedding: &[f32],
    ) -> Result<i64> {
        if embedding.len() != self.dimension {
            return Err(MnemoError::Internal(format!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dimension
            )));
        }
        let blob = vec_to_blob(embedding);
        let importance = draft.importance.clamp(0.0, 1.0);

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute(
                    "UPDATE memories SET status = 'deleted', embedding = NULL \
                     WHERE doc_id = ?1 AND status != 'deleted'",
                    params![doc_id],
                )?;
                if changed == 0 {
                    return Err(domain(MnemoError::NotFound { doc_id }));
                }
                tx.execute(
                    "INSERT INTO memories (content, event_type, importance, create_time, \
                     last_access_time, access_count, session_id, persona_id, status, \
                     fingerprint, supersedes, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?4, 0, ?5, ?6, 'active', ?7, ?8, ?9)",
                    params![
                        draft.content,
                        draft.event_type.as_str(),
                        importance,
                        draft.create_time,
                        draft.session_id,
                        draft.persona_id,
                        draft.fingerprint,
                        doc_id,
                        blob,
                    ],
                )?;
                let new_id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(new_id)
            })
            .await
            .map_err(storage_err)
    }

    /// Tombstone a batch of memories in one transaction.
    ///
    /// Rows already deleted (or absent) are skipped. Returns the number of
    /// rows actually tombstoned.
    pub async fn delete_many(&self, doc_ids: &[i64]) -> Result<u64> {
        if doc_ids.is_empty() {
            return Ok(0);
        }
        let ids = doc_ids.to_vec();
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "UPDATE memories SET status = 'deleted', embedding = NULL \
                     WHERE doc_id IN ({placeholders}) AND status != 'deleted'"
                );
                let changed = tx.execute(&sql, params_from_iter(ids.iter()))?;
                tx.commit()?;
                Ok(changed as u64)
            })
            .await
            .map_err(storage_err)?;

        debug!(requested = doc_ids.len(), deleted, "tombstoned memories");
        Ok(deleted)
    }

    /// Remove every row, tombstones included, in one transaction.
    ///
    /// The `doc_id` sequence is preserved, so ids are never reused.
    pub async fn delete_all(&self) -> Result<u64> {
        let removed = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let changed = tx.execute("DELETE FROM memories", [])?;
                tx.commit()?;
                Ok(changed as u64)
            })
            .await
            .map_err(storage_err)?;
        info!(removed, "deleted all memories");
        Ok(removed)
    }

    /// Purge tombstoned rows. Returns the number of rows removed.
    pub async fn compact(&self) -> Result<u64> {
        self.conn
            .call(|conn| {
                let changed =
                    conn.execute("DELETE FROM memories WHERE status = 'deleted'", [])?;
                Ok(changed as u64)
            })
            .await
            .map_err(storage_err)
    }

    /// Fetch one page of memories with `doc_id > after_doc_id`, ascending.
    ///
    /// Each page is a point-in-time snapshot: rows deleted mid-scan are
    /// simply absent from later pages.
    pub async fn scan_page(
        &self,
        after_doc_id: i64,
        page_size: usize,
        filter: &ScanFilter,
    ) -> Result<Vec<MemoryRecord>> {
        let (conds, mut sql_params) = filter.to_sql();
        sql_params.push(SqlParam::Int(after_doc_id));
        sql_params.push(SqlParam::Int(page_size as i64));
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {COLUMNS} FROM memories WHERE {conds} AND doc_id > ? \
                     ORDER BY doc_id ASC LIMIT ?"
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params_from_iter(sql_params.iter()), row_to_record)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    /// Stream the store as pages of at most `page_size` records matching
    /// `filter`, in `doc_id` ascending order.
    pub fn scan_paginated(
        &self,
        page_size: usize,
        filter: ScanFilter,
    ) -> Pin<Box<dyn Stream<Item = Result<Vec<MemoryRecord>>> + Send>> {
        let store = self.clone();
        let stream = futures::stream::try_unfold(
            (store, 0_i64, false),
            move |(store, cursor, done)| {
                let filter = filter.clone();
                async move {
                    if done {
                        return Ok(None);
                    }
                    let page = store.scan_page(cursor, page_size, &filter).await?;
                    let Some(last) = page.last() else {
                        return Ok(None);
                    };
                    let next_cursor = last.doc_id;
                    let exhausted = page.len() < page_size;
                    Ok(Some((page, (store, next_cursor, exhausted))))
                }
            },
        );
        Box::pin(stream)
    }

    /// k-NN over embeddings of rows matching `filter`.
    ///
    /// Returns up to `k` `(doc_id, similarity)` pairs, similarity being
    /// cosine mapped from [-1, 1] to [0, 1], best first. Ties break toward
    /// the lower `doc_id`.
    pub async fn dense_search(
        &self,
        query_embedding: &[f32],
        k: usize,
        filter: &ScanFilter,
    ) -> Result<Vec<(i64, f64)>> {
        if query_embedding.len() != self.dimension {
            return Err(MnemoError::Internal(format!(
                "query embedding dimension {} does not match store dimension {}",
                query_embedding.len(),
                self.dimension
            )));
        }
        let (conds, sql_params) = filter.to_sql();
        let candidates: Vec<(i64, Vec<u8>)> = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT doc_id, embedding FROM memories \
                     WHERE {conds} AND embedding IS NOT NULL"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(sql_params.iter()), |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(storage_err)?;

        let mut scored: Vec<(i64, f64)> = candidates
            .into_iter()
            .map(|(doc_id, blob)| {
                let embedding = blob_to_vec(&blob);
                let similarity = normalize_similarity(cosine_similarity(query_embedding, &embedding));
                (doc_id, similarity)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Record recall hits: set `last_access_time = now` and bump
    /// `access_count` for each active id present. Missing ids are skipped.
    pub async fn touch(&self, doc_ids: &[i64], now: i64) -> Result<()> {
        if doc_ids.is_empty() {
            return Ok(());
        }
        let mut sql_params = vec![SqlParam::Int(now)];
        sql_params.extend(doc_ids.iter().map(|id| SqlParam::Int(*id)));
        let placeholders = vec!["?"; doc_ids.len()].join(", ");
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "UPDATE memories \
                     SET last_access_time = ?, access_count = access_count + 1 \
                     WHERE doc_id IN ({placeholders}) AND status = 'active'"
                );
                conn.execute(&sql, params_from_iter(sql_params.iter()))?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    /// Memory counts per lifecycle status.
    pub async fn count_by_status(&self) -> Result<StatusCounts> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT status, COUNT(*) FROM memories GROUP BY status")?;
                let mut counts = StatusCounts::default();
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                for row in rows {
                    let (status, count) = row?;
                    match MemoryStatus::from_str_value(&status) {
                        MemoryStatus::Active => counts.active = count as u64,
                        MemoryStatus::Archived => counts.archived = count as u64,
                        MemoryStatus::Deleted => counts.deleted = count as u64,
                    }
                }
                Ok(counts)
            })
            .await
            .map_err(storage_err)
    }

    /// Look up an active memory by fingerprint within a session scope.
    ///
    /// `session_id = None` matches global memories only.
    pub async fn find_by_fingerprint(
        &self,
        session_id: Option<&str>,
        fingerprint: &str,
    ) -> Result<Option<i64>> {
        let session = session_id.map(str::to_string);
        let fingerprint = fingerprint.to_string();
        self.conn
            .call(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT doc_id FROM memories \
                         WHERE fingerprint = ?1 AND session_id IS ?2 AND status = 'active' \
                         ORDER BY doc_id ASC LIMIT 1",
                        params![fingerprint, session],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found)
            })
            .await
            .map_err(storage_err)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let event_tag: String = row.get(2)?;
    let status_str: String = row.get(9)?;
    let blob: Option<Vec<u8>> = row.get(12)?;
    Ok(MemoryRecord {
        doc_id: row.get(0)?,
        content: row.get(1)?,
        event_type: EventType::from_tag(&event_tag).unwrap_or(EventType::Other),
        importance: row.get(3)?,
        create_time: row.get(4)?,
        last_access_time: row.get(5)?,
        access_count: row.get(6)?,
        session_id: row.get(7)?,
        persona_id: row.get(8)?,
        status: MemoryStatus::from_str_value(&status_str),
        fingerprint: row.get(10)?,
        supersedes: row.get(11)?,
        embedding: blob.map(|b| blob_to_vec(&b)).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    const DIM: usize = 4;

    async fn store() -> MemoryStore {
        MemoryStore::open_in_memory(DIM).await.unwrap()
    }

    fn draft(content: &str, session: Option<&str>) -> MemoryDraft {
        MemoryDraft {
            content: content.to_string(),
            event_type: EventType::Fact,
            importance: 0.8,
            create_time: 1_000,
            session_id: session.map(str::to_string),
            persona_id: None,
            fingerprint: format!("fp-{content}"),
            supersedes: None,
        }
    }

    fn unit(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[axis] = 1.0;
        v
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = store().await;
        let id = store.insert(draft("tea", Some("s1")), &unit(0)).await.unwrap();

        let rec = store.get(id).await.unwrap().unwrap();
        assert_eq!(rec.content, "tea");
        assert_eq!(rec.status, MemoryStatus::Active);
        assert_eq!(rec.session_id.as_deref(), Some("s1"));
        assert_eq!(rec.create_time, rec.last_access_time);
        assert_eq!(rec.access_count, 0);
        assert_eq!(rec.embedding.len(), DIM);
    }

    #[tokio::test]
    async fn doc_ids_strictly_increase() {
        let store = store().await;
        let mut last = 0;
        for i in 0..5 {
            let id = store
                .insert(draft(&format!("m{i}"), None), &unit(i % DIM))
                .await
                .unwrap();
            assert!(id > last, "ids must strictly increase: {id} after {last}");
            last = id;
        }
    }

    #[tokio::test]
    async fn importance_is_clamped() {
        let store = store().await;
        let mut d = draft("hot", None);
        d.importance = 3.5;
        let id = store.insert(d, &unit(0)).await.unwrap();
        let rec = store.get(id).await.unwrap().unwrap();
        assert!((rec.importance - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let store = store().await;
        let err = store.insert(draft("bad", None), &[1.0, 2.0]).await.unwrap_err();
        assert!(matches!(err, MnemoError::Internal(_)));
    }

    #[tokio::test]
    async fn delete_many_tombstones_and_drops_vectors() {
        let store = store().await;
        let a = store.insert(draft("a", None), &unit(0)).await.unwrap();
        let b = store.insert(draft("b", None), &unit(1)).await.unwrap();

        let deleted = store.delete_many(&[a, b, 9999]).await.unwrap();
        assert_eq!(deleted, 2);

        let rec = store.get(a).await.unwrap().unwrap();
        assert_eq!(rec.status, MemoryStatus::Deleted);
        assert!(rec.embedding.is_empty());

        // Tombstones keep the coupling invariant intact.
        store.verify_integrity().await.unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.active, 0);
        assert_eq!(counts.deleted, 2);
    }

    #[tokio::test]
    async fn insert_then_delete_all_leaves_empty_store() {
        let store = store().await;
        for i in 0..4 {
            store
                .insert(draft(&format!("m{i}"), None), &unit(i % DIM))
                .await
                .unwrap();
        }
        let removed = store.delete_all().await.unwrap();
        assert_eq!(removed, 4);
        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts, StatusCounts::default());

        // Ids continue after a wipe; they are never reused.
        let id = store.insert(draft("after", None), &unit(0)).await.unwrap();
        assert!(id >= 5);
    }

    #[tokio::test]
    async fn compact_purges_tombstones_only() {
        let store = store().await;
        let a = store.insert(draft("keep", None), &unit(0)).await.unwrap();
        let b = store.insert(draft("drop", None), &unit(1)).await.unwrap();
        store.delete_many(&[b]).await.unwrap();

        let purged = store.compact().await.unwrap();
        assert_eq!(purged, 1);
        assert!(store.get(b).await.unwrap().is_none());
        assert!(store.get(a).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn touch_updates_access_metadata_for_active_only() {
        let store = store().await;
        let a = store.insert(draft("a", None), &unit(0)).await.unwrap();
        let b = store.insert(draft("b", None), &unit(1)).await.unwrap();
        store.delete_many(&[b]).await.unwrap();

        store.touch(&[a, b, 777], 2_000).await.unwrap();

        let rec = store.get(a).await.unwrap().unwrap();
        assert_eq!(rec.last_access_time, 2_000);
        assert_eq!(rec.access_count, 1);

        let dead = store.get(b).await.unwrap().unwrap();
        assert_eq!(dead.access_count, 0);
    }

    #[tokio::test]
    async fn update_patches_fields() {
        let store = store().await;
        let id = store.insert(draft("a", None), &unit(0)).await.unwrap();
        store
            .update(
                id,
                MemoryPatch {
                    importance: Some(0.3),
                    status: Some(MemoryStatus::Archived),
                    ..MemoryPatch::default()
                },
            )
            .await
            .unwrap();

        let rec = store.get(id).await.unwrap().unwrap();
        assert!((rec.importance - 0.3).abs() < f64::EPSILON);
        assert_eq!(rec.status, MemoryStatus::Archived);

        // Archived rows still carry their vector.
        assert_eq!(rec.embedding.len(), DIM);
        store.verify_integrity().await.unwrap();
    }

    #[tokio::test]
    async fn update_cannot_tombstone() {
        let store = store().await;
        let id = store.insert(draft("a", None), &unit(0)).await.unwrap();
        let err = store
            .update(
                id,
                MemoryPatch {
                    status: Some(MemoryStatus::Deleted),
                    ..MemoryPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MnemoError::Internal(_)));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = store().await;
        let err = store
            .update(
                42,
                MemoryPatch {
                    importance: Some(0.1),
                    ..MemoryPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MnemoError::NotFound { doc_id: 42 }));
    }

    #[tokio::test]
    async fn replace_links_back_to_old_row() {
        let store = store().await;
        let old = store.insert(draft("dog is Max", None), &unit(0)).await.unwrap();
        let new = store
            .replace(old, draft("dog is Luna", None), &unit(1))
            .await
            .unwrap();

        let old_rec = store.get(old).await.unwrap().unwrap();
        assert_eq!(old_rec.status, MemoryStatus::Deleted);
        assert!(old_rec.embedding.is_empty());

        let new_rec = store.get(new).await.unwrap().unwrap();
        assert_eq!(new_rec.supersedes, Some(old));
        assert_eq!(new_rec.content, "dog is Luna");
        store.verify_integrity().await.unwrap();
    }

    #[tokio::test]
    async fn scan_paginated_pages_in_order() {
        let store = store().await;
        for i in 0..7 {
            store
                .insert(draft(&format!("m{i}"), None), &unit(i % DIM))
                .await
                .unwrap();
        }

        let mut stream = store.scan_paginated(3, ScanFilter::active());
        let mut pages = Vec::new();
        while let Some(page) = stream.next().await {
            pages.push(page.unwrap());
        }
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 3);
        assert_eq!(pages[1].len(), 3);
        assert_eq!(pages[2].len(), 1);

        let ids: Vec<i64> = pages.iter().flatten().map(|r| r.doc_id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted, "pages must come back in doc_id order");
    }

    #[tokio::test]
    async fn scan_respects_filter() {
        let store = store().await;
        store.insert(draft("a", Some("s1")), &unit(0)).await.unwrap();
        store.insert(draft("b", Some("s2")), &unit(1)).await.unwrap();
        store.insert(draft("c", Some("s1")), &unit(2)).await.unwrap();

        let mut stream = store.scan_paginated(10, ScanFilter::active().with_session("s1"));
        let page = stream.next().await.unwrap().unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|r| r.session_id.as_deref() == Some("s1")));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dense_search_ranks_by_similarity() {
        let store = store().await;
        let a = store.insert(draft("aligned", None), &unit(0)).await.unwrap();
        let b = store.insert(draft("orthogonal", None), &unit(1)).await.unwrap();
        let c = store
            .insert(draft("opposed", None), &[-1.0, 0.0, 0.0, 0.0])
            .await
            .unwrap();

        let hits = store
            .dense_search(&unit(0), 3, &ScanFilter::active())
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].0, a);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].0, b);
        assert!((hits[1].1 - 0.5).abs() < 1e-6);
        assert_eq!(hits[2].0, c);
        assert!(hits[2].1.abs() < 1e-6);
    }

    #[tokio::test]
    async fn dense_search_excludes_tombstones() {
        let store = store().await;
        let a = store.insert(draft("live", None), &unit(0)).await.unwrap();
        let b = store.insert(draft("dead", None), &unit(0)).await.unwrap();
        store.delete_many(&[b]).await.unwrap();

        let hits = store
            .dense_search(&unit(0), 10, &ScanFilter::active())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, a);
    }

    #[tokio::test]
    async fn fingerprint_lookup_is_session_scoped() {
        let store = store().await;
        let mut d = draft("jazz", Some("s1"));
        d.fingerprint = "abc".to_string();
        let id = store.insert(d, &unit(0)).await.unwrap();

        assert_eq!(
            store.find_by_fingerprint(Some("s1"), "abc").await.unwrap(),
            Some(id)
        );
        assert_eq!(store.find_by_fingerprint(Some("s2"), "abc").await.unwrap(), None);
        assert_eq!(store.find_by_fingerprint(None, "abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fingerprint_lookup_ignores_tombstones() {
        let store = store().await;
        let mut d = draft("jazz", None);
        d.fingerprint = "abc".to_string();
        let id = store.insert(d, &unit(0)).await.unwrap();
        store.delete_many(&[id]).await.unwrap();

        assert_eq!(store.find_by_fingerprint(None, "abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reopen_preserves_data_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemo.db");

        let store = MemoryStore::open(&path, DIM).await.unwrap();
        let id = store.insert(draft("persist me", None), &unit(0)).await.unwrap();
        drop(store);

        let store = MemoryStore::open(&path, DIM).await.unwrap();
        let rec = store.get(id).await.unwrap().unwrap();
        assert_eq!(rec.content, "persist me");
    }
}
