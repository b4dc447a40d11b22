// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forgetting agent: periodic decay-based pruning plus the nuke.
//!
//! Decayed importance follows a forgetting curve,
//! `importance * (1 - decay_rate)^age_days`, computed at scan time; stored
//! importance is never rewritten by a pass. A memory is deleted only when
//! it is both past retention and below the decayed-importance floor.
//!
//! Passes hold a single-instance lock, so two passes never overlap and a
//! pass never overlaps a nuke fire. Passes are cancellable at page
//! boundaries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mnemo_config::ForgettingAgentConfig;
use mnemo_core::{MnemoError, Result};
use mnemo_retrieval::SparseRetriever;
use mnemo_storage::{MemoryStore, ScanFilter};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Importance after applying the forgetting curve for `age_days`.
pub fn decayed_importance(importance: f64, age_days: f64, decay_rate: f64) -> f64 {
    importance * (1.0 - decay_rate).powf(age_days)
}

/// Summary of one completed forgetting pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSummary {
    pub scanned: u64,
    pub deleted: u64,
    pub elapsed: Duration,
}

/// Lifecycle of a nuke operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NukeState {
    Pending,
    Cancelled,
    Fired,
}

/// A scheduled wipe of the whole store.
#[derive(Debug, Clone)]
pub struct NukeOperation {
    pub operation_id: Uuid,
    /// Unix seconds when the nuke was requested.
    pub scheduled_at: i64,
    /// Unix seconds when it fires unless cancelled.
    pub fire_at: i64,
    pub state: NukeState,
}

struct NukeSlot {
    current: Option<NukeOperation>,
    token: CancellationToken,
}

/// Background pruner modeled on a forgetting curve.
pub struct ForgettingAgent {
    config: ForgettingAgentConfig,
    storage: MemoryStore,
    sparse: Arc<SparseRetriever>,
    /// Single-instance guard shared by passes and nuke fires.
    pass_lock: Mutex<()>,
    nuke: Mutex<NukeSlot>,
}

impl ForgettingAgent {
    pub fn new(
        config: ForgettingAgentConfig,
        storage: MemoryStore,
        sparse: Arc<SparseRetriever>,
    ) -> Self {
        Self {
            config,
            storage,
            sparse,
            pass_lock: Mutex::new(()),
            nuke: Mutex::new(NukeSlot {
                current: None,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Run one decay-and-prune pass over all active memories.
    ///
    /// Scans in pages of `forgetting_batch_size`, deleting at page
    /// boundaries; a page snapshot is never held across batches. When
    /// `cancel` fires, the pass stops cleanly after the current page.
    pub async fn run_pass(&self, now: i64, cancel: Option<&CancellationToken>) -> Result<PassSummary> {
        let _guard = self.pass_lock.lock().await;
        let started = Instant::now();
        let mut summary = PassSummary::default();
        let filter = ScanFilter::active();
        let mut cursor = 0_i64;

        loop {
            let page = self
                .storage
                .scan_page(cursor, self.config.forgetting_batch_size, &filter)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.doc_id;
            summary.scanned += page.len() as u64;

            let mut to_delete: Vec<i64> = Vec::new();
            for record in &page {
                let age_days = (now - record.create_time).max(0) as f64 / SECONDS_PER_DAY;
                if age_days <= self.config.retention_days {
                    continue;
                }
                let decayed = decayed_importance(
                    record.importance,
                    age_days,
                    self.config.importance_decay_rate,
                );
                if decayed < self.config.importance_threshold {
                    debug!(
                        doc_id = record.doc_id,
                        age_days, decayed, "memory eligible for forgetting"
                    );
                    to_delete.push(record.doc_id);
                }
            }

            if !to_delete.is_empty() {
                let deleted = self.storage.delete_many(&to_delete).await?;
                summary.deleted += deleted;
                for doc_id in &to_delete {
                    self.sparse.remove(*doc_id);
                }
            }

            let page_exhausted = page.len() < self.config.forgetting_batch_size;
            if let Some(token) = cancel
                && token.is_cancelled()
            {
                summary.elapsed = started.elapsed();
                info!(
                    scanned = summary.scanned,
                    deleted = summary.deleted,
                    "forgetting pass cancelled at page boundary"
                );
                return Err(MnemoError::Cancelled);
            }
            if page_exhausted {
                break;
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            scanned = summary.scanned,
            deleted = summary.deleted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "forgetting pass complete"
        );
        Ok(summary)
    }

    /// Spawn the periodic background loop.
    ///
    /// The loop sleeps `check_interval_hours` between passes and exits
    /// when `shutdown` fires.
    pub fn spawn_periodic(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let agent = self;
        let interval = Duration::from_secs(agent.config.check_interval_hours * 3600);
        tokio::spawn(async move {
            info!(
                interval_hours = agent.config.check_interval_hours,
                "forgetting agent started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("forgetting agent stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let now = chrono::Utc::now().timestamp();
                        match agent.run_pass(now, Some(&shutdown)).await {
                            Ok(_) => {}
                            Err(MnemoError::Cancelled) => break,
                            Err(e) => error!(error = %e, "forgetting pass failed"),
                        }
                    }
                }
            }
        })
    }

    /// Schedule a wipe of all memories after the configured delay.
    ///
    /// Only one nuke may be pending; a second request conflicts.
    pub async fn request_nuke(self: Arc<Self>, now: i64) -> Result<NukeOperation> {
        let mut slot = self.nuke.lock().await;
        if let Some(ref op) = slot.current
            && op.state == NukeState::Pending
        {
            return Err(MnemoError::Conflict(format!(
                "nuke {} is already pending",
                op.operation_id
            )));
        }

        let delay = Duration::from_secs(self.config.nuke_delay_secs);
        let operation = NukeOperation {
            operation_id: Uuid::new_v4(),
            scheduled_at: now,
            fire_at: now + delay.as_secs() as i64,
            state: NukeState::Pending,
        };
        let token = CancellationToken::new();
        slot.current = Some(operation.clone());
        slot.token = token.clone();
        drop(slot);

        warn!(
            operation_id = %operation.operation_id,
            delay_secs = delay.as_secs(),
            "nuke scheduled"
        );

        let agent = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("nuke countdown cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    agent.fire_nuke(&token).await;
                }
            }
        });

        Ok(operation)
    }

    async fn fire_nuke(&self, token: &CancellationToken) {
        // Exclude concurrent forgetting passes while firing.
        let _guard = self.pass_lock.lock().await;
        let mut slot = self.nuke.lock().await;
        if token.is_cancelled() {
            return;
        }
        match self.storage.delete_all().await {
            Ok(removed) => {
                self.sparse.clear();
                if let Some(ref mut op) = slot.current {
                    op.state = NukeState::Fired;
                }
                warn!(removed, "nuke fired, all memories deleted");
            }
            Err(e) => {
                error!(error = %e, "nuke fire failed");
            }
        }
    }

    /// Cancel a pending nuke. Fails once it has fired or was cancelled.
    pub async fn cancel_nuke(&self, operation_id: Uuid) -> Result<()> {
        let mut slot = self.nuke.lock().await;
        match slot.current {
            Some(ref mut op) if op.operation_id == operation_id => {
                if op.state != NukeState::Pending {
                    return Err(MnemoError::Conflict(format!(
                        "nuke {operation_id} is no longer pending"
                    )));
                }
                op.state = NukeState::Cancelled;
                slot.token.cancel();
                info!(%operation_id, "nuke cancelled");
                Ok(())
            }
            _ => Err(MnemoError::Conflict(format!(
                "no nuke with operation id {operation_id}"
            ))),
        }
    }

    /// State of the most recent nuke operation, if any.
    pub async fn nuke_status(&self) -> Option<NukeOperation> {
        self.nuke.lock().await.current.clone()
    }
}
