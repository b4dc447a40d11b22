// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reflection engine: turn a dialogue window into persisted memories.
//!
//! Two language model phases: batch event extraction (JSON array), then
//! batch importance scoring (JSON object keyed by temporary id). Each
//! phase retries with exponential backoff on provider failure or
//! malformed output. A full extraction failure fails the call with no
//! partial commit; a full scoring failure discards the batch.
//!
//! Idempotence: a normalized-content fingerprint is checked against the
//! session's active memories, so reflecting the same window twice stores
//! nothing new.

use std::sync::Arc;
use std::time::Duration;

use mnemo_config::ReflectionEngineConfig;
use mnemo_core::{
    CompletionRequest, DialogueMessage, EmbeddingProvider, EventType, LanguageModelProvider,
    MemoryDraft, MnemoError, Result, Role,
};
use mnemo_retrieval::SparseRetriever;
use mnemo_storage::MemoryStore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Default system prompt for the event extraction phase.
const DEFAULT_EXTRACTION_PROMPT: &str = r#"You analyze a dialogue between a user and an assistant and extract discrete memory events worth keeping long-term.

For each event return:
- "temp_id": a short unique id you invent (e.g. "event_1")
- "content": the event as one standalone, self-contained statement naming who did or said what
- "event_type": one of: fact, preference, goal, opinion, relationship, other

Only include events that are grounded in the dialogue. Do not invent or embellish. Merge consecutive messages describing one thing into a single event. Do not include scores, explanations, or commentary."#;

/// Default system prompt for the importance scoring phase.
const DEFAULT_EVALUATION_PROMPT: &str = r#"You rate how valuable each memory is for future conversations with this user.

Scale:
- 0.8-1.0: core identity, stable preferences, goals, important relationships
- 0.4-0.7: concrete opinions, requests, one-off but referencable facts
- 0.1-0.3: passing remarks, greetings, transient context
- 0.0: nothing reusable about the user

Input is a JSON object {"memories": [{"id", "content"}, ...]}.
Return only a JSON object: {"scores": {"<id>": <score>, ...}}."#;

const EXTRACTION_FORMAT_INSTRUCTION: &str = r#"

Return only a JSON array, no prose:
[{"temp_id": "...", "content": "...", "event_type": "..."}]"#;

/// One candidate event parsed from the extraction response.
#[derive(Debug, Clone, Deserialize)]
struct ExtractedEvent {
    temp_id: String,
    content: String,
    #[serde(default)]
    event_type: String,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: std::collections::HashMap<String, f64>,
}

/// Result of one reflection call.
#[derive(Debug, Default)]
pub struct ReflectionOutcome {
    /// Doc ids of the newly persisted memories.
    pub stored_ids: Vec<i64>,
    /// Candidates dropped by validation, dedup, scoring, or the threshold.
    pub skipped: usize,
}

/// Extracts, scores, and persists memories from dialogue windows.
pub struct ReflectionEngine {
    config: ReflectionEngineConfig,
    llm: Arc<dyn LanguageModelProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    storage: MemoryStore,
    sparse: Arc<SparseRetriever>,
}

impl ReflectionEngine {
    pub fn new(
        config: ReflectionEngineConfig,
        llm: Arc<dyn LanguageModelProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        storage: MemoryStore,
        sparse: Arc<SparseRetriever>,
    ) -> Self {
        Self {
            config,
            llm,
            embedder,
            storage,
            sparse,
        }
    }

    /// Run the full extract / validate / score / persist flow on a window.
    pub async fn reflect_and_store(
        &self,
        window: &[DialogueMessage],
        session_id: &str,
        persona_id: Option<&str>,
        persona_prompt: Option<&str>,
    ) -> Result<ReflectionOutcome> {
        let history_text = format_window(window);
        if history_text.is_empty() {
            debug!(session_id, "empty dialogue window, skipping reflection");
            return Ok(ReflectionOutcome::default());
        }

        // Phase 1: extraction. A total failure here fails the call.
        let events = self.extract_events(&history_text, persona_prompt).await?;
        if events.is_empty() {
            info!(session_id, "no memory events extracted");
            return Ok(ReflectionOutcome::default());
        }
        info!(session_id, extracted = events.len(), "memory events extracted");

        let mut outcome = ReflectionOutcome::default();
        let candidates = self.validate_events(events, session_id, &mut outcome).await?;
        if candidates.is_empty() {
            return Ok(outcome);
        }

        // Phase 2: scoring. A total failure discards the batch.
        let scores = match self.evaluate_scores(&candidates, persona_prompt).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(session_id, error = %e, "scoring failed, discarding batch");
                outcome.skipped += candidates.len();
                return Ok(outcome);
            }
        };

        let mut survivors: Vec<(ValidatedEvent, f64)> = Vec::new();
        for event in candidates {
            let Some(&score) = scores.get(&event.temp_id) else {
                debug!(session_id, temp_id = %event.temp_id, "no score returned, skipping");
                outcome.skipped += 1;
                continue;
            };
            let score = score.clamp(0.0, 1.0);
            if score < self.config.importance_threshold {
                debug!(
                    session_id,
                    temp_id = %event.temp_id,
                    score,
                    "below importance threshold"
                );
                outcome.skipped += 1;
                continue;
            }
            survivors.push((event, score));
        }
        if survivors.is_empty() {
            info!(session_id, "no events above the importance threshold");
            return Ok(outcome);
        }

        // Commit: embed the batch, insert, index.
        let contents: Vec<String> = survivors.iter().map(|(e, _)| e.content.clone()).collect();
        let embeddings = self.embedder.embed(&contents).await?;
        if embeddings.len() != survivors.len() {
            return Err(MnemoError::provider(format!(
                "embedding batch returned {} vectors for {} texts",
                embeddings.len(),
                survivors.len()
            )));
        }

        let now = chrono::Utc::now().timestamp();
        for ((event, score), embedding) in survivors.into_iter().zip(embeddings) {
            let draft = MemoryDraft {
                content: event.content.clone(),
                event_type: event.event_type,
                importance: score,
                create_time: now,
                session_id: Some(session_id.to_string()),
                persona_id: persona_id.map(str::to_string),
                fingerprint: event.fingerprint,
                supersedes: None,
            };
            let doc_id = self.storage.insert(draft, &embedding).await?;
            self.sparse.add(doc_id, &event.content);
            outcome.stored_ids.push(doc_id);
            debug!(session_id, doc_id, score, "memory event stored");
        }

        info!(
            session_id,
            stored = outcome.stored_ids.len(),
            skipped = outcome.skipped,
            "reflection complete"
        );
        Ok(outcome)
    }

    async fn extract_events(
        &self,
        history_text: &str,
        persona_prompt: Option<&str>,
    ) -> Result<Vec<ExtractedEvent>> {
        let system = format!(
            "{}{EXTRACTION_FORMAT_INSTRUCTION}",
            self.config
                .event_extraction_prompt
                .as_deref()
                .unwrap_or(DEFAULT_EXTRACTION_PROMPT)
        );
        let persona_section = persona_prompt
            .map(|p| format!("Adopt this persona while analyzing:\n<persona>{p}</persona>\n\n"))
            .unwrap_or_default();
        let prompt = format!("{persona_section}Dialogue history:\n{history_text}");

        self.with_retries("event extraction", || {
            let request = CompletionRequest::new(prompt.clone()).with_system_prompt(system.clone());
            async move {
                let response = self.complete_with_deadline(request).await?;
                parse_extraction_response(&response)
            }
        })
        .await
    }

    /// Drop empty, unknown-typed, and duplicate events. Keeps first
    /// occurrences; deduplicates both within the batch and against the
    /// session's active memories.
    async fn validate_events(
        &self,
        events: Vec<ExtractedEvent>,
        session_id: &str,
        outcome: &mut ReflectionOutcome,
    ) -> Result<Vec<ValidatedEvent>> {
        let mut seen = std::collections::HashSet::new();
        let mut validated = Vec::new();
        for event in events {
            let content = event.content.trim();
            if content.is_empty() {
                outcome.skipped += 1;
                continue;
            }
            let Some(event_type) = EventType::from_tag(&event.event_type.to_lowercase()) else {
                debug!(kind = %event.event_type, "unknown event type, skipping");
                outcome.skipped += 1;
                continue;
            };
            let fingerprint = content_fingerprint(content);
            if !seen.insert(fingerprint.clone()) {
                outcome.skipped += 1;
                continue;
            }
            if self
                .storage
                .find_by_fingerprint(Some(session_id), &fingerprint)
                .await?
                .is_some()
            {
                debug!(session_id, "duplicate of an existing memory, skipping");
                outcome.skipped += 1;
                continue;
            }
            validated.push(ValidatedEvent {
                temp_id: event.temp_id,
                content: content.to_string(),
                event_type,
                fingerprint,
            });
        }
        Ok(validated)
    }

    async fn evaluate_scores(
        &self,
        events: &[ValidatedEvent],
        persona_prompt: Option<&str>,
    ) -> Result<std::collections::HashMap<String, f64>> {
        let system = self
            .config
            .evaluation_prompt
            .as_deref()
            .unwrap_or(DEFAULT_EVALUATION_PROMPT)
            .to_string();
        let memories: Vec<serde_json::Value> = events
            .iter()
            .map(|e| serde_json::json!({ "id": e.temp_id, "content": e.content }))
            .collect();
        let persona_section = persona_prompt
            .map(|p| format!("Adopt this persona while rating:\n<persona>{p}</persona>\n\n"))
            .unwrap_or_default();
        let prompt = format!(
            "{persona_section}{}",
            serde_json::to_string_pretty(&serde_json::json!({ "memories": memories }))
                .map_err(|e| MnemoError::Internal(e.to_string()))?
        );

        self.with_retries("importance scoring", || {
            let request = CompletionRequest::new(prompt.clone()).with_system_prompt(system.clone());
            async move {
                let response = self.complete_with_deadline(request).await?;
                parse_score_response(&response)
            }
        })
        .await
    }

    async fn complete_with_deadline(&self, request: CompletionRequest) -> Result<String> {
        let deadline = Duration::from_secs(self.config.request_timeout_secs);
        let request = request.with_timeout(deadline);
        match tokio::time::timeout(deadline, self.llm.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(MnemoError::Timeout { duration: deadline }),
        }
    }

    /// Run `op` up to `1 + max_retries` times with exponential backoff on
    /// retryable errors.
    async fn with_retries<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_millis(500);
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                warn!(attempt, what, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| MnemoError::Internal(format!("{what} failed without running"))))
    }
}

/// An extracted event that survived validation.
#[derive(Debug, Clone)]
struct ValidatedEvent {
    temp_id: String,
    content: String,
    event_type: EventType,
    fingerprint: String,
}

/// Format a dialogue window as `role: content` lines, dropping non-dialogue
/// roles.
fn format_window(window: &[DialogueMessage]) -> String {
    window
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fingerprint of normalized content: lowercase, whitespace collapsed,
/// SHA-256 hex.
pub fn content_fingerprint(content: &str) -> String {
    let normalized = content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse the extraction response into events.
///
/// Tolerates markdown code fences and surrounding prose by slicing from
/// the first `[` to the last `]`.
fn parse_extraction_response(response: &str) -> Result<Vec<ExtractedEvent>> {
    let trimmed = response.trim();
    let start = trimmed
        .find('[')
        .ok_or_else(|| MnemoError::MalformedOutput("no JSON array in response".to_string()))?;
    let end = trimmed
        .rfind(']')
        .ok_or_else(|| MnemoError::MalformedOutput("unterminated JSON array".to_string()))?;
    if end < start {
        return Err(MnemoError::MalformedOutput(
            "malformed JSON array bounds".to_string(),
        ));
    }
    serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| MnemoError::MalformedOutput(format!("event array did not parse: {e}")))
}

/// Parse the scoring response `{"scores": {id: score}}`.
fn parse_score_response(response: &str) -> Result<std::collections::HashMap<String, f64>> {
    let trimmed = response.trim();
    let start = trimmed
        .find('{')
        .ok_or_else(|| MnemoError::MalformedOutput("no JSON object in response".to_string()))?;
    let end = trimmed
        .rfind('}')
        .ok_or_else(|| MnemoError::MalformedOutput("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(MnemoError::MalformedOutput(
            "malformed JSON object bounds".to_string(),
        ));
    }
    let parsed: ScoreResponse = serde_json::from_str(&trimmed[start..=end])
        .map_err(|e| MnemoError::MalformedOutput(format!("score object did not parse: {e}")))?;
    Ok(parsed.scores)
}
