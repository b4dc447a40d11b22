// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan filter: an AND of optional predicates over memory metadata.

use mnemo_core::{MemoryRecord, MemoryStatus};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

/// Conjunction of optional predicates applied to scans and searches.
///
/// `session_id` / `persona_id` predicates are strict equality: a filter on
/// a concrete session does not match global (`NULL`) rows.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    pub status: Option<MemoryStatus>,
    pub session_id: Option<String>,
    pub persona_id: Option<String>,
    /// Inclusive `(min, max)` bounds on `create_time`.
    pub create_time_range: Option<(i64, i64)>,
    /// Inclusive `(min, max)` bounds on `importance`.
    pub importance_range: Option<(f64, f64)>,
}

impl ScanFilter {
    /// Filter matching only active memories.
    pub fn active() -> Self {
        Self {
            status: Some(MemoryStatus::Active),
            ..Self::default()
        }
    }

    /// Restrict to a session.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Restrict to a persona.
    pub fn with_persona(mut self, persona_id: impl Into<String>) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    /// Evaluate the filter against an in-memory record.
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(ref session) = self.session_id
            && record.session_id.as_deref() != Some(session.as_str())
        {
            return false;
        }
        if let Some(ref persona) = self.persona_id
            && record.persona_id.as_deref() != Some(persona.as_str())
        {
            return false;
        }
        if let Some((min, max)) = self.create_time_range
            && !(min..=max).contains(&record.create_time)
        {
            return false;
        }
        if let Some((min, max)) = self.importance_range
            && !(record.importance >= min && record.importance <= max)
        {
            return false;
        }
        true
    }

    /// Render the filter as SQL conditions plus bound parameters.
    ///
    /// Returns conditions joined with AND, without a leading `WHERE`.
    /// An empty filter renders as `1=1` so callers can always append.
    pub(crate) fn to_sql(&self) -> (String, Vec<SqlParam>) {
        let mut conds: Vec<String> = Vec::new();
        let mut params: Vec<SqlParam> = Vec::new();

        if let Some(status) = self.status {
            conds.push("status = ?".to_string());
            params.push(SqlParam::Text(status.as_str().to_string()));
        }
        if let Some(ref session) = self.session_id {
            conds.push("session_id = ?".to_string());
            params.push(SqlParam::Text(session.clone()));
        }
        if let Some(ref persona) = self.persona_id {
            conds.push("persona_id = ?".to_string());
            params.push(SqlParam::Text(persona.clone()));
        }
        if let Some((min, max)) = self.create_time_range {
            conds.push("create_time >= ? AND create_time <= ?".to_string());
            params.push(SqlParam::Int(min));
            params.push(SqlParam::Int(max));
        }
        if let Some((min, max)) = self.importance_range {
            conds.push("importance >= ? AND importance <= ?".to_string());
            params.push(SqlParam::Real(min));
            params.push(SqlParam::Real(max));
        }

        if conds.is_empty() {
            ("1=1".to_string(), params)
        } else {
            (conds.join(" AND "), params)
        }
    }
}

/// Owned SQL parameter value for dynamically built queries.
#[derive(Debug, Clone)]
pub(crate) enum SqlParam {
    Text(String),
    Int(i64),
    Real(f64),
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlParam::Text(s) => s.to_sql(),
            SqlParam::Int(i) => i.to_sql(),
            SqlParam::Real(f) => f.to_sql(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::EventType;

    fn record(session: Option<&str>, persona: Option<&str>) -> MemoryRecord {
        MemoryRecord {
            doc_id: 1,
            content: "test".to_string(),
            event_type: EventType::Fact,
            importance: 0.5,
            create_time: 100,
            last_access_time: 100,
            access_count: 0,
            session_id: session.map(str::to_string),
            persona_id: persona.map(str::to_string),
            status: MemoryStatus::Active,
            fingerprint: "fp".to_string(),
            supersedes: None,
            embedding: vec![],
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ScanFilter::default();
        assert!(filter.matches(&record(None, None)));
        assert!(filter.matches(&record(Some("s1"), Some("p1"))));
    }

    #[test]
    fn session_filter_excludes_global_rows() {
        let filter = ScanFilter::active().with_session("s1");
        assert!(filter.matches(&record(Some("s1"), None)));
        assert!(!filter.matches(&record(Some("s2"), None)));
        assert!(!filter.matches(&record(None, None)));
    }

    #[test]
    fn status_filter() {
        let filter = ScanFilter::active();
        let mut rec = record(None, None);
        assert!(filter.matches(&rec));
        rec.status = MemoryStatus::Archived;
        assert!(!filter.matches(&rec));
    }

    #[test]
    fn range_filters() {
        let mut filter = ScanFilter::default();
        filter.create_time_range = Some((50, 150));
        filter.importance_range = Some((0.4, 0.6));
        let rec = record(None, None);
        assert!(filter.matches(&rec));

        filter.create_time_range = Some((200, 300));
        assert!(!filter.matches(&rec));
    }

    #[test]
    fn empty_filter_renders_trivial_condition() {
        let (sql, params) = ScanFilter::default().to_sql();
        assert_eq!(sql, "1=1");
        assert!(params.is_empty());
    }

    #[test]
    fn full_filter_renders_all_conditions() {
        let mut filter = ScanFilter::active().with_session("s1").with_persona("p1");
        filter.create_time_range = Some((0, 10));
        filter.importance_range = Some((0.0, 1.0));
        let (sql, params) = filter.to_sql();
        assert!(sql.contains("status = ?"));
        assert!(sql.contains("session_id = ?"));
        assert!(sql.contains("persona_id = ?"));
        assert!(sql.contains("create_time >= ?"));
        assert!(sql.contains("importance >= ?"));
        assert_eq!(params.len(), 7);
    }
}
