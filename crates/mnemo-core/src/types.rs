// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types.

use serde::{Deserialize, Serialize};

/// A single persisted memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Storage-assigned integer primary key. Strictly increasing, never reused.
    pub doc_id: i64,
    /// The memory itself, natural language.
    pub content: String,
    /// Kind of event this memory records.
    pub event_type: EventType,
    /// Model-assigned salience in [0, 1]. Decays over time.
    pub importance: f64,
    /// Unix seconds at insert. Immutable.
    pub create_time: i64,
    /// Unix seconds of the last recall hit.
    pub last_access_time: i64,
    /// Number of recall hits.
    pub access_count: i64,
    /// Owning session, `None` = global.
    pub session_id: Option<String>,
    /// Owning persona, `None` = shared across personas.
    pub persona_id: Option<String>,
    /// Lifecycle status. Only `Active` is retrievable.
    pub status: MemoryStatus,
    /// Normalized-content hash used for reflection idempotence.
    pub fingerprint: String,
    /// If this memory replaced an earlier one, the old `doc_id`.
    pub supersedes: Option<i64>,
    /// Embedding vector, fixed dimension. Empty for tombstoned rows.
    #[serde(skip)]
    pub embedding: Vec<f32>,
}

/// Fields of a memory known before storage assigns a `doc_id`.
#[derive(Debug, Clone)]
pub struct MemoryDraft {
    pub content: String,
    pub event_type: EventType,
    pub importance: f64,
    pub create_time: i64,
    pub session_id: Option<String>,
    pub persona_id: Option<String>,
    pub fingerprint: String,
    pub supersedes: Option<i64>,
}

/// Kind of event a memory records.
///
/// Stored as lowercase tags; unknown tags from a language model are
/// rejected during reflection validation rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Fact,
    Preference,
    Goal,
    Opinion,
    Relationship,
    Other,
}

impl EventType {
    /// Convert to the tag stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Fact => "fact",
            EventType::Preference => "preference",
            EventType::Goal => "goal",
            EventType::Opinion => "opinion",
            EventType::Relationship => "relationship",
            EventType::Other => "other",
        }
    }

    /// Parse a tag, returning `None` for unrecognized input.
    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(EventType::Fact),
            "preference" => Some(EventType::Preference),
            "goal" => Some(EventType::Goal),
            "opinion" => Some(EventType::Opinion),
            "relationship" => Some(EventType::Relationship),
            "other" => Some(EventType::Other),
            _ => None,
        }
    }
}

/// Lifecycle status of a memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    /// Available for retrieval.
    Active,
    /// Kept but excluded from retrieval.
    Archived,
    /// Tombstoned until compaction.
    Deleted,
}

impl MemoryStatus {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Archived => "archived",
            MemoryStatus::Deleted => "deleted",
        }
    }

    /// Parse from SQLite string. Unknown values read back as `Active`.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "archived" => MemoryStatus::Archived,
            "deleted" => MemoryStatus::Deleted,
            _ => MemoryStatus::Active,
        }
    }
}

/// Counts of memories per lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub active: u64,
    pub archived: u64,
    pub deleted: u64,
}

/// Role of a dialogue participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One message in a rolling dialogue window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueMessage {
    pub role: Role,
    pub content: String,
    /// Unix seconds when the message was received.
    pub timestamp: i64,
}

/// Per-component scores contributing to a recall hit.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ComponentScores {
    /// Cosine similarity normalized to [0, 1], if dense search saw this doc.
    pub dense: Option<f64>,
    /// Min-max normalized BM25 score, if sparse search saw this doc.
    pub sparse: Option<f64>,
    /// Exponential recency score, present under the weighted strategy.
    pub recency: Option<f64>,
}

/// One result returned by recall.
#[derive(Debug, Clone, Serialize)]
pub struct RecallHit {
    pub doc_id: i64,
    pub content: String,
    pub event_type: EventType,
    pub importance: f64,
    pub last_access_time: i64,
    /// Score the hit was ranked by (fused, or fused+weighted).
    pub final_score: f64,
    pub component_scores: ComponentScores,
}

/// Convert an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a BLOB back to an f32 vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunks_exact yields 4 bytes")))
        .collect()
}

/// Cosine similarity between two vectors of equal length, in [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Map a cosine similarity from [-1, 1] to [0, 1].
pub fn normalize_similarity(cosine: f32) -> f64 {
    (f64::from(cosine) + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trip() {
        for tag in ["fact", "preference", "goal", "opinion", "relationship", "other"] {
            let parsed = EventType::from_tag(tag).unwrap();
            assert_eq!(parsed.as_str(), tag);
        }
        assert!(EventType::from_tag("gossip").is_none());
        assert!(EventType::from_tag("FACT").is_none());
    }

    #[test]
    fn memory_status_round_trip() {
        assert_eq!(MemoryStatus::from_str_value("active"), MemoryStatus::Active);
        assert_eq!(MemoryStatus::from_str_value("archived"), MemoryStatus::Archived);
        assert_eq!(MemoryStatus::from_str_value("deleted"), MemoryStatus::Deleted);
        assert_eq!(MemoryStatus::from_str_value(""), MemoryStatus::Active);
    }

    #[test]
    fn blob_round_trip() {
        let original = vec![0.1_f32, 0.2, -0.5, 1.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 16);
        let recovered = blob_to_vec(&blob);
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn cosine_identical_and_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn similarity_normalization_bounds() {
        assert!((normalize_similarity(-1.0) - 0.0).abs() < 1e-9);
        assert!((normalize_similarity(0.0) - 0.5).abs() < 1e-9);
        assert!((normalize_similarity(1.0) - 1.0).abs() < 1e-9);
    }
}
