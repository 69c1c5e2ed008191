use crate::config::schema::MemoryConfig;
use crate::error::Result;
use crate::llm::prompt::{
    build_summary_prompt, estimate_tokens, summary_system_prompt, truncate_to_tokens,
};
use crate::llm::LlmManager;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Condenses older memory lines into a short text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, previous: Option<&str>, lines: &[String]) -> Result<String>;
}

#[async_trait]
impl Summarizer for LlmManager {
    async fn summarize(&self, previous: Option<&str>, lines: &[String]) -> Result<String> {
        let prompt = build_summary_prompt(previous, lines);
        self.ask_with_system(summary_system_prompt(), &prompt).await
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// An agent's own record of a task
    Interaction,
    /// A result shared with every agent
    Broadcast,
    /// Condensed text standing in for older entries
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: u64,
    pub actor: String,
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub important: bool,
}

impl MemoryEntry {
    fn line(&self) -> String {
        format!("[{}] {}", self.actor, self.content)
    }
}

#[derive(Default)]
struct MemoryState {
    entries: Vec<MemoryEntry>,
    next_id: u64,
    summary: Option<String>,
}

impl MemoryState {
    fn tokens(&self) -> usize {
        self.entries.iter().map(|e| estimate_tokens(&e.content)).sum()
    }

    fn drop_oldest(&mut self, max_items: usize, max_tokens: usize) {
        let mut dropped = 0;
        while self.entries.len() > max_items
            || (self.entries.len() > 1 && self.tokens() > max_tokens)
        {
            self.entries.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!("Memory dropped {} oldest entries", dropped);
        }
    }
}

/// Work captured under the lock and summarized outside it.
struct CompactionPlan {
    older_ids: HashSet<u64>,
    lines: Vec<String>,
    previous: Option<String>,
}

/// Bounded interaction history shared by the agents of a crew.
///
/// Appends are ordered. When the stored entries exceed `max_items` or the
/// token budget, the next read replaces everything but the `keep_recent`
/// newest entries with one summary entry (at most one summarization per read).
pub struct ContextualMemory {
    state: Mutex<MemoryState>,
    summarizer: Option<Arc<dyn Summarizer>>,
    max_items: usize,
    keep_recent: usize,
    max_tokens: usize,
}

impl ContextualMemory {
    pub fn new(config: &MemoryConfig, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        let max_items = config.max_items.max(2);
        Self {
            state: Mutex::new(MemoryState::default()),
            summarizer,
            max_items,
            keep_recent: config.keep_recent.min(max_items - 1),
            max_tokens: config.max_tokens.max(1),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn record(&self, actor: &str, content: impl Into<String>) -> u64 {
        self.push(actor, EntryKind::Interaction, content.into(), false)
    }

    /// Record an entry that compaction keeps verbatim while room allows.
    pub fn record_important(&self, actor: &str, content: impl Into<String>) -> u64 {
        self.push(actor, EntryKind::Interaction, content.into(), true)
    }

    /// Record a result visible to every agent.
    pub fn broadcast(&self, actor: &str, content: impl Into<String>) -> u64 {
        self.push(actor, EntryKind::Broadcast, content.into(), false)
    }

    fn push(&self, actor: &str, kind: EntryKind, content: String, important: bool) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(MemoryEntry {
            id,
            actor: actor.to_string(),
            kind,
            content,
            timestamp: Utc::now(),
            important,
        });

        if self.summarizer.is_none() {
            state.drop_oldest(self.max_items, self.max_tokens);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Latest summary text, if compaction has run.
    pub fn summary(&self) -> Option<String> {
        self.state.lock().summary.clone()
    }

    /// Empty the memory; the latest summary survives.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Most recent `limit` entries across all actors.
    pub async fn history(&self, limit: usize) -> Vec<MemoryEntry> {
        self.compact().await;
        let state = self.state.lock();
        tail(&state.entries, limit)
    }

    /// Most recent `limit` entries an actor recorded for itself.
    pub async fn history_for(&self, actor: &str, limit: usize) -> Vec<MemoryEntry> {
        self.compact().await;
        let state = self.state.lock();
        let own: Vec<MemoryEntry> = state
            .entries
            .iter()
            .filter(|e| e.actor == actor && e.kind == EntryKind::Interaction)
            .cloned()
            .collect();
        tail(&own, limit)
    }

    /// Summary plus recent entries rendered as prompt lines.
    pub async fn formatted_context(&self, limit: usize) -> String {
        self.formatted_context_within(limit, usize::MAX).await
    }

    /// Like [`formatted_context`](Self::formatted_context), bounded by an
    /// estimated token budget. The summary gets at most half of it when
    /// entries follow; the newest entries fill the rest.
    pub async fn formatted_context_within(&self, limit: usize, max_tokens: usize) -> String {
        self.compact().await;
        let state = self.state.lock();

        let recent: Vec<&MemoryEntry> = state
            .entries
            .iter()
            .filter(|e| e.kind != EntryKind::Summary)
            .collect();
        let skip = recent.len().saturating_sub(limit);
        let recent = &recent[skip..];

        let mut out = String::new();
        if let Some(summary) = &state.summary {
            let share = if recent.is_empty() {
                max_tokens
            } else {
                max_tokens / 2
            };
            let line = format!("Summary: {}", summary);
            out.push_str(&truncate_to_tokens(&line, share.saturating_sub(1)));
            out.push('\n');
        }

        let mut used = estimate_tokens(&out);
        let mut lines: Vec<String> = Vec::new();
        for entry in recent.iter().rev() {
            let line = entry.line();
            let cost = estimate_tokens(&line) + 1;
            if used.saturating_add(cost) > max_tokens {
                break;
            }
            used += cost;
            lines.push(line);
        }
        if lines.len() < recent.len() {
            tracing::debug!(
                "Context budget {} kept {} of {} entries",
                max_tokens,
                lines.len(),
                recent.len()
            );
        }
        for line in lines.iter().rev() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn over_budget(&self, state: &MemoryState) -> bool {
        state.entries.len() > self.max_items || state.tokens() > self.max_tokens
    }

    fn plan(&self) -> Option<CompactionPlan> {
        let state = self.state.lock();
        if !self.over_budget(&state) {
            return None;
        }

        let split = state.entries.len().saturating_sub(self.keep_recent);
        let older = &state.entries[..split];
        let lines: Vec<String> = older
            .iter()
            .filter(|e| e.kind != EntryKind::Summary)
            .map(MemoryEntry::line)
            .collect();
        if lines.is_empty() {
            return None;
        }

        Some(CompactionPlan {
            older_ids: older.iter().map(|e| e.id).collect(),
            lines,
            previous: state.summary.clone(),
        })
    }

    async fn compact(&self) {
        let Some(summarizer) = self.summarizer.clone() else {
            let mut state = self.state.lock();
            state.drop_oldest(self.max_items, self.max_tokens);
            return;
        };
        let Some(plan) = self.plan() else {
            return;
        };

        tracing::info!("Summarizing {} memory entries", plan.lines.len());
        let outcome = summarizer
            .summarize(plan.previous.as_deref(), &plan.lines)
            .await;

        let mut state = self.state.lock();
        match outcome {
            Ok(summary) => self.apply_summary(&mut state, plan.older_ids, summary),
            Err(e) => {
                tracing::warn!("Memory summarization failed, dropping oldest: {}", e);
                state.drop_oldest(self.max_items, self.max_tokens);
            }
        }
    }

    fn apply_summary(&self, state: &mut MemoryState, older_ids: HashSet<u64>, summary: String) {
        let (older, remaining): (Vec<MemoryEntry>, Vec<MemoryEntry>) = state
            .entries
            .drain(..)
            .partition(|e| older_ids.contains(&e.id));

        let room = self.max_items.saturating_sub(remaining.len() + 1);
        let important: Vec<MemoryEntry> = older
            .into_iter()
            .filter(|e| e.important && e.kind != EntryKind::Summary)
            .collect();
        let skip = important.len().saturating_sub(room);
        let mut important: Vec<MemoryEntry> = important.into_iter().skip(skip).collect();

        // Important entries are already folded into the summary; keep them
        // verbatim only while the token budget allows
        let base_tokens = estimate_tokens(&summary)
            + remaining
                .iter()
                .map(|e| estimate_tokens(&e.content))
                .sum::<usize>();
        let mut important_tokens: usize =
            important.iter().map(|e| estimate_tokens(&e.content)).sum();
        while !important.is_empty() && base_tokens + important_tokens > self.max_tokens {
            let dropped = important.remove(0);
            important_tokens -= estimate_tokens(&dropped.content);
        }

        let id = state.next_id;
        state.next_id += 1;
        let mut entries = vec![MemoryEntry {
            id,
            actor: "memory".to_string(),
            kind: EntryKind::Summary,
            content: summary.clone(),
            timestamp: Utc::now(),
            important: false,
        }];
        entries.extend(important);
        entries.extend(remaining);

        state.entries = entries;
        state.summary = Some(summary);
        // Entries recorded during the summarization call can still overflow
        state.drop_oldest(self.max_items, usize::MAX);
    }
}

fn tail(entries: &[MemoryEntry], limit: usize) -> Vec<MemoryEntry> {
    let skip = entries.len().saturating_sub(limit);
    entries[skip..].to_vec()
}
