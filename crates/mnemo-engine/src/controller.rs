// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory engine façade.
//!
//! Owns every subsystem and exposes the host-facing entry points:
//! message ingestion, context building, nuke control, and explicit
//! `start` / `stop` lifecycle. Background work (reflection tasks, the
//! forgetting loop, the session sweeper) runs in a supervised task set
//! cancelled and drained on `stop`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use futures::StreamExt;
use mnemo_config::{validate_config, MnemoConfig};
use mnemo_core::{
    EmbeddingProvider, EventType, LanguageModelProvider, MemoryDraft, MemoryStatus, MnemoError,
    RecallHit, Result, Role, StatusCounts,
};
use mnemo_retrieval::SparseRetriever;
use mnemo_storage::{MemoryPatch, MemoryStore, ScanFilter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::forgetting::{ForgettingAgent, NukeOperation, PassSummary};
use crate::recall::{RecallEngine, RecallOutcome};
use crate::reflection::{content_fingerprint, ReflectionEngine};
use crate::session::SessionManager;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Top-level coordinator owning all memory subsystems.
pub struct MemoryEngine {
    config: MnemoConfig,
    storage: MemoryStore,
    embedder: Arc<dyn EmbeddingProvider>,
    sparse: Arc<SparseRetriever>,
    recall_engine: RecallEngine,
    reflection: Arc<ReflectionEngine>,
    forgetting: Arc<ForgettingAgent>,
    sessions: Arc<SessionManager>,
    shutdown: CancellationToken,
    tasks: std::sync::Mutex<JoinSet<()>>,
    /// Per-session reflection serialization.
    reflection_locks: Arc<tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MemoryEngine {
    /// Assemble an engine from a validated config and its providers.
    ///
    /// Fails fast on invalid configuration or an embedding dimension that
    /// does not match the store.
    pub fn new(
        config: MnemoConfig,
        storage: MemoryStore,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModelProvider>,
    ) -> Result<Self> {
        if let Err(errors) = validate_config(&config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MnemoError::Config(joined));
        }
        if embedder.dimension() != storage.dimension() {
            return Err(MnemoError::Config(format!(
                "embedding provider dimension {} does not match store dimension {}",
                embedder.dimension(),
                storage.dimension()
            )));
        }

        let sparse = Arc::new(SparseRetriever::new(
            config.sparse_retriever.bm25_k1,
            config.sparse_retriever.bm25_b,
            config.sparse_retriever.use_word_segmentation,
            config.sparse_retriever.enabled,
        ));
        let recall_engine = RecallEngine::new(
            config.recall_engine.clone(),
            &config.fusion,
            storage.clone(),
            embedder.clone(),
            sparse.clone(),
        )?;
        let reflection = Arc::new(ReflectionEngine::new(
            config.reflection_engine.clone(),
            llm,
            embedder.clone(),
            storage.clone(),
            sparse.clone(),
        ));
        let forgetting = Arc::new(ForgettingAgent::new(
            config.forgetting_agent.clone(),
            storage.clone(),
            sparse.clone(),
        ));
        let sessions = Arc::new(SessionManager::new(
            &config.session_manager,
            config.reflection_engine.summary_trigger_rounds,
        ));

        Ok(Self {
            config,
            storage,
            embedder,
            sparse,
            recall_engine,
            reflection,
            forgetting,
            sessions,
            shutdown: CancellationToken::new(),
            tasks: std::sync::Mutex::new(JoinSet::new()),
            reflection_locks: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        })
    }

    /// Rebuild the sparse index from storage and launch background tasks.
    pub async fn start(&self) -> Result<()> {
        self.rebuild_sparse_index().await?;

        let mut tasks = self.tasks.lock().expect("task set lock poisoned");
        if self.config.forgetting_agent.enabled {
            let handle = self
                .forgetting
                .clone()
                .spawn_periodic(self.shutdown.child_token());
            tasks.spawn(async move {
                let _ = handle.await;
            });
        }

        let sessions = self.sessions.clone();
        let token = self.shutdown.child_token();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(SWEEP_INTERVAL) => {
                        sessions.sweep();
                    }
                }
            }
        });

        info!("memory engine started");
        Ok(())
    }

    /// Cancel background work and await every outstanding task.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let mut tasks = {
            let mut guard = self.tasks.lock().expect("task set lock poisoned");
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result
                && !e.is_cancelled()
            {
                error!(error = %e, "background task panicked during shutdown");
            }
        }
        info!("memory engine stopped");
    }

    /// Record an inbound user message. No further work happens here.
    pub fn on_user_message(&self, session_id: &str, _persona_id: Option<&str>, text: &str, timestamp: i64) {
        self.sessions.append(session_id, Role::User, text, timestamp);
    }

    /// Record an assistant message; spawn a detached reflection task when
    /// the session's round counter reaches the trigger.
    pub fn on_assistant_message(
        &self,
        session_id: &str,
        persona_id: Option<&str>,
        text: &str,
        timestamp: i64,
    ) {
        let Some(window) = self
            .sessions
            .append(session_id, Role::Assistant, text, timestamp)
        else {
            return;
        };
        info!(session_id, messages = window.len(), "reflection triggered");

        let reflection = self.reflection.clone();
        let locks = self.reflection_locks.clone();
        let session = session_id.to_string();
        let persona = self.effective_persona(persona_id).map(str::to_string);
        let token = self.shutdown.child_token();

        let mut tasks = self.tasks.lock().expect("task set lock poisoned");
        tasks.spawn(async move {
            // Serialize reflections per session; the window itself was
            // snapshotted at trigger time.
            let session_lock = {
                let mut map = locks.lock().await;
                map.entry(session.clone()).or_default().clone()
            };
            let _guard = session_lock.lock().await;

            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_id = %session, "reflection cancelled by shutdown");
                }
                result = reflection.reflect_and_store(
                    &window,
                    &session,
                    persona.as_deref(),
                    None,
                ) => {
                    match result {
                        Ok(outcome) => info!(
                            session_id = %session,
                            stored = outcome.stored_ids.len(),
                            skipped = outcome.skipped,
                            "background reflection finished"
                        ),
                        Err(e) => error!(
                            session_id = %session,
                            error = %e,
                            "background reflection failed"
                        ),
                    }
                }
            }
        });
    }

    /// Recall memories for a query under the configured isolation policy.
    pub async fn recall(
        &self,
        session_id: Option<&str>,
        persona_id: Option<&str>,
        query: &str,
        k: Option<usize>,
    ) -> Result<RecallOutcome> {
        let filter = self.recall_filter(session_id, persona_id);
        let now = chrono::Utc::now().timestamp();
        self.recall_engine.recall(query, k, &filter, now).await
    }

    /// Build the formatted memory block for prompt injection.
    ///
    /// Never fails: recall errors degrade to an empty block.
    pub async fn build_context(
        &self,
        session_id: Option<&str>,
        persona_id: Option<&str>,
        query: &str,
        k: Option<usize>,
    ) -> String {
        let outcome = match self.recall(session_id, persona_id, query, k).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "recall failed, injecting no memories");
                return String::new();
            }
        };
        if outcome.hits.is_empty() {
            return String::new();
        }
        self.format_memory_block(&outcome.hits)
    }

    /// Persist one memory directly (host-initiated, outside reflection).
    pub async fn store_memory(
        &self,
        content: &str,
        event_type: EventType,
        importance: f64,
        session_id: Option<&str>,
        persona_id: Option<&str>,
    ) -> Result<i64> {
        let vectors = self.embedder.embed(&[content.to_string()]).await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| MnemoError::provider("embedding returned no vectors"))?;
        let draft = MemoryDraft {
            content: content.to_string(),
            event_type,
            importance,
            create_time: chrono::Utc::now().timestamp(),
            session_id: session_id.map(str::to_string),
            persona_id: persona_id.map(str::to_string),
            fingerprint: content_fingerprint(content),
            supersedes: None,
        };
        let doc_id = self.storage.insert(draft, &embedding).await?;
        self.sparse.add(doc_id, content);
        Ok(doc_id)
    }

    /// Archive a memory: kept in storage, excluded from retrieval.
    pub async fn archive_memory(&self, doc_id: i64) -> Result<()> {
        self.storage
            .update(
                doc_id,
                MemoryPatch {
                    status: Some(MemoryStatus::Archived),
                    ..MemoryPatch::default()
                },
            )
            .await?;
        self.sparse.remove(doc_id);
        Ok(())
    }

    /// Delete one memory immediately (host-initiated).
    pub async fn forget_memory(&self, doc_id: i64) -> Result<()> {
        let deleted = self.storage.delete_many(&[doc_id]).await?;
        if deleted == 0 {
            return Err(MnemoError::NotFound { doc_id });
        }
        self.sparse.remove(doc_id);
        Ok(())
    }

    /// Schedule a wipe of all memories after the configured countdown.
    pub async fn request_nuke(&self) -> Result<NukeOperation> {
        let now = chrono::Utc::now().timestamp();
        self.forgetting.clone().request_nuke(now).await
    }

    /// Cancel a pending nuke.
    pub async fn cancel_nuke(&self, operation_id: Uuid) -> Result<()> {
        self.forgetting.cancel_nuke(operation_id).await
    }

    /// State of the most recent nuke operation.
    pub async fn nuke_status(&self) -> Option<NukeOperation> {
        self.forgetting.nuke_status().await
    }

    /// Trigger one forgetting pass immediately.
    pub async fn run_forgetting_pass(&self) -> Result<PassSummary> {
        let now = chrono::Utc::now().timestamp();
        self.forgetting.run_pass(now, None).await
    }

    /// Memory counts per lifecycle status.
    pub async fn status(&self) -> Result<StatusCounts> {
        self.storage.count_by_status().await
    }

    /// The underlying store, for hosts that need direct access.
    pub fn storage(&self) -> &MemoryStore {
        &self.storage
    }

    /// The shared sparse retriever.
    pub fn sparse(&self) -> &Arc<SparseRetriever> {
        &self.sparse
    }

    async fn rebuild_sparse_index(&self) -> Result<()> {
        if !self.sparse.enabled() {
            return Ok(());
        }
        let mut docs: Vec<(i64, String)> = Vec::new();
        let mut pages = self.storage.scan_paginated(500, ScanFilter::active());
        while let Some(page) = pages.next().await {
            docs.extend(page?.into_iter().map(|r| (r.doc_id, r.content)));
        }
        self.sparse.rebuild_from(docs);
        Ok(())
    }

    fn recall_filter(&self, session_id: Option<&str>, persona_id: Option<&str>) -> ScanFilter {
        let mut filter = ScanFilter::active();
        if self.config.filtering_settings.use_session_filtering
            && let Some(session) = session_id
        {
            filter = filter.with_session(session);
        }
        if let Some(persona) = self.effective_persona(persona_id) {
            filter = filter.with_persona(persona);
        }
        filter
    }

    fn effective_persona<'a>(&self, persona_id: Option<&'a str>) -> Option<&'a str> {
        if self.config.filtering_settings.use_persona_filtering {
            persona_id
        } else {
            None
        }
    }

    fn format_memory_block(&self, hits: &[RecallHit]) -> String {
        let mut block = String::from("Relevant long-term memories (most relevant first):\n");
        for (i, hit) in hits.iter().enumerate() {
            block.push_str(&format!(
                "{}. [{}] {} (importance {:.2}, last recalled {})\n",
                i + 1,
                hit.event_type.as_str(),
                hit.content,
                hit.importance,
                self.format_timestamp(hit.last_access_time),
            ));
        }
        block
    }

    fn format_timestamp(&self, unix_seconds: i64) -> String {
        if self.config.timezone.eq_ignore_ascii_case("local") {
            match chrono::Local.timestamp_opt(unix_seconds, 0).single() {
                Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
                None => unix_seconds.to_string(),
            }
        } else {
            match chrono::Utc.timestamp_opt(unix_seconds, 0).single() {
                Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
                None => unix_seconds.to_string(),
            }
        }
    }
}
