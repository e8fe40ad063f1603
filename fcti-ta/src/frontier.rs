//! Per-property search frontier
//!
//! A priority-ordered, de-duplicated queue of discovery tasks. Every task
//! moves through an explicit state machine:
//!
//! ```text
//! Pending ──► InProgress ──► Completed
//!    ▲            │
//!    │            ├──► Pending (failed, attempts < max) ──► … ──► Failed
//!    │            │
//!    └────────────┴──► RateLimited (retry_at) ──► picked again once due
//!
//! Pending ──► Exhausted (cancelled as redundant)
//! ```
//!
//! Rate limits never count against `max_attempts`. The frontier is pure
//! in-memory state; the discovery engine persists changed tasks through the
//! store after every step, which is what makes discovery resumable.

use crate::config::DiscoveryConfig;
use crate::models::{SearchTask, TaskKey, TaskStatus, TaskType};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry and backoff policy for frontier tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_secs(config.base_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }

    /// Exponential backoff for the n-th rate limit (0-based), capped
    pub fn backoff_for(&self, hits: u32) -> Duration {
        let factor = 1u32.checked_shl(hits.min(16)).unwrap_or(u32::MAX);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

/// Task counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub rate_limited: usize,
    pub exhausted: usize,
}

impl FrontierCounts {
    pub fn total(&self) -> usize {
        self.pending
            + self.in_progress
            + self.completed
            + self.failed
            + self.rate_limited
            + self.exhausted
    }
}

#[derive(Debug, Clone)]
pub struct Frontier {
    property_id: String,
    policy: RetryPolicy,
    /// Insertion order doubles as the priority tie-break
    tasks: Vec<SearchTask>,
    index: HashMap<TaskKey, usize>,
    dirty: BTreeSet<usize>,
}

impl Frontier {
    pub fn new(property_id: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            property_id: property_id.into(),
            policy,
            tasks: Vec::new(),
            index: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Rebuild a frontier from persisted tasks
    ///
    /// Tasks left `InProgress` by an interrupted run go back to `Pending`.
    pub fn from_tasks(
        property_id: impl Into<String>,
        policy: RetryPolicy,
        tasks: Vec<SearchTask>,
    ) -> Self {
        let mut frontier = Self::new(property_id, policy);
        for mut task in tasks {
            let reset = task.status == TaskStatus::InProgress;
            if reset {
                task.status = TaskStatus::Pending;
            }
            let key = task.key();
            if frontier.index.contains_key(&key) {
                continue;
            }
            let idx = frontier.tasks.len();
            if reset {
                frontier.dirty.insert(idx);
            }
            frontier.index.insert(key, idx);
            frontier.tasks.push(task);
        }
        frontier
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Add a task unless its uniqueness key already exists
    ///
    /// # Returns
    /// `true` when the task was added.
    pub fn enqueue(&mut self, task: SearchTask) -> bool {
        if task.term.is_empty() {
            return false;
        }
        let key = task.key();
        if self.index.contains_key(&key) {
            return false;
        }
        debug!(
            property_id = %self.property_id,
            task = %task.describe(),
            priority = task.priority,
            "Enqueued search task"
        );
        let idx = self.tasks.len();
        self.index.insert(key, idx);
        self.tasks.push(task);
        self.dirty.insert(idx);
        true
    }

    fn is_due(task: &SearchTask, now: DateTime<Utc>) -> bool {
        match task.status {
            TaskStatus::Pending => true,
            TaskStatus::RateLimited => task.retry_at.map_or(true, |at| at <= now),
            _ => false,
        }
    }

    /// Claim the most urgent runnable task, marking it `InProgress`
    ///
    /// Lowest priority number wins; ties go to the earliest enqueued.
    /// Rate-limited tasks are skipped until their `retry_at` has passed.
    pub fn next_pending(&mut self, now: DateTime<Utc>) -> Option<SearchTask> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| Self::is_due(t, now))
            .min_by_key(|(i, t)| (t.priority, *i))
            .map(|(i, _)| i)?;
        let task = &mut self.tasks[idx];
        task.status = TaskStatus::InProgress;
        self.dirty.insert(idx);
        Some(task.clone())
    }

    /// Claim up to `limit` runnable tasks in priority order
    pub fn next_batch(&mut self, now: DateTime<Utc>, limit: usize) -> Vec<SearchTask> {
        let mut batch = Vec::new();
        while batch.len() < limit {
            match self.next_pending(now) {
                Some(task) => batch.push(task),
                None => break,
            }
        }
        batch
    }

    fn slot(&mut self, key: &TaskKey) -> Option<&mut SearchTask> {
        let idx = *self.index.get(key)?;
        self.dirty.insert(idx);
        self.tasks.get_mut(idx)
    }

    pub fn mark_completed(&mut self, key: &TaskKey, new_documents: u32) {
        if let Some(task) = self.slot(key) {
            task.status = TaskStatus::Completed;
            task.new_documents = new_documents;
            task.retry_at = None;
            task.last_error = None;
        }
    }

    /// Record a non-rate-limit failure
    ///
    /// # Returns
    /// The task's new status: `Pending` while attempts remain, else `Failed`.
    pub fn mark_failed(&mut self, key: &TaskKey, error: &str) -> Option<TaskStatus> {
        let max_attempts = self.policy.max_attempts;
        let property_id = self.property_id.clone();
        let task = self.slot(key)?;
        task.attempts += 1;
        task.last_error = Some(error.to_string());
        task.status = if task.attempts >= max_attempts {
            warn!(
                property_id = %property_id,
                task = %task.describe(),
                attempts = task.attempts,
                error,
                "Search task permanently failed"
            );
            TaskStatus::Failed
        } else {
            TaskStatus::Pending
        };
        Some(task.status)
    }

    /// Schedule a rate-limited task for retry; attempts are not consumed
    ///
    /// # Arguments
    /// * `min_backoff` - Channel-imposed wait (e.g. `Retry-After`), if any
    ///
    /// # Returns
    /// The backoff applied: the larger of the task's exponential backoff and
    /// `min_backoff`.
    pub fn mark_rate_limited(
        &mut self,
        key: &TaskKey,
        min_backoff: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let policy = self.policy;
        let task = self.slot(key)?;
        let backoff = policy
            .backoff_for(task.rate_limit_hits)
            .max(min_backoff.unwrap_or_default());
        task.rate_limit_hits += 1;
        task.status = TaskStatus::RateLimited;
        task.retry_at = Some(
            now + ChronoDuration::from_std(backoff).unwrap_or_else(|_| ChronoDuration::seconds(0)),
        );
        Some(backoff)
    }

    /// Cancel pending legal-text searches the predicate marks redundant
    ///
    /// # Returns
    /// Number of tasks moved to `Exhausted`.
    pub fn exhaust_legal_where<F>(&mut self, mut redundant: F) -> usize
    where
        F: FnMut(&SearchTask) -> bool,
    {
        let mut cancelled = 0;
        for (idx, task) in self.tasks.iter_mut().enumerate() {
            if task.task_type == TaskType::LegalText
                && task.status == TaskStatus::Pending
                && redundant(task)
            {
                task.status = TaskStatus::Exhausted;
                self.dirty.insert(idx);
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Any task that could still run, now or after backoff
    pub fn has_retryable(&self) -> bool {
        self.tasks.iter().any(|t| {
            matches!(
                t.status,
                TaskStatus::Pending | TaskStatus::RateLimited | TaskStatus::InProgress
            )
        })
    }

    /// Earliest instant a rate-limited task becomes runnable
    pub fn next_retry_at(&self) -> Option<DateTime<Utc>> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::RateLimited)
            .filter_map(|t| t.retry_at)
            .min()
    }

    pub fn get(&self, key: &TaskKey) -> Option<&SearchTask> {
        self.index.get(key).and_then(|&i| self.tasks.get(i))
    }

    pub fn tasks(&self) -> &[SearchTask] {
        &self.tasks
    }

    pub fn counts(&self) -> FrontierCounts {
        let mut counts = FrontierCounts::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::RateLimited => counts.rate_limited += 1,
                TaskStatus::Exhausted => counts.exhausted += 1,
            }
        }
        counts
    }

    /// Tasks changed since the last call, for persistence
    pub fn take_dirty(&mut self) -> Vec<SearchTask> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|i| self.tasks.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{priority, SearchOperator};
    use chrono::NaiveDate;

    fn frontier() -> Frontier {
        Frontier::new(
            "p1",
            RetryPolicy {
                max_attempts: 2,
                base_backoff: Duration::from_secs(30),
                max_backoff: Duration::from_secs(100),
            },
        )
    }

    #[test]
    fn test_enqueue_is_idempotent_by_key() {
        let mut f = frontier();
        assert!(f.enqueue(SearchTask::reference("p1", "2019-123")));
        assert!(!f.enqueue(SearchTask::reference("p1", "2019-123")));
        assert_eq!(f.tasks().len(), 1);
    }

    #[test]
    fn test_date_bounds_are_part_of_identity() {
        let mut f = frontier();
        assert!(f.enqueue(SearchTask::party_name("p1", "DOE JANE", None, None)));
        let bounded = SearchTask::party_name("p1", "DOE JANE", NaiveDate::from_ymd_opt(2010, 1, 1), None);
        assert!(f.enqueue(bounded));
        assert_eq!(f.tasks().len(), 2);
    }

    #[test]
    fn test_priority_then_insertion_order() {
        let mut f = frontier();
        let now = Utc::now();
        f.enqueue(SearchTask::party_name("p1", "DOE JANE", None, None));
        f.enqueue(SearchTask::case_number("p1", "2022-CA-001"));
        f.enqueue(SearchTask::new("p1", TaskType::LegalText, "PALM ESTATES", SearchOperator::Prefix, priority::LEGAL_TEXT));
        f.enqueue(SearchTask::new("p1", TaskType::LegalText, "OAK HILLS", SearchOperator::Prefix, priority::LEGAL_TEXT));
        f.enqueue(SearchTask::reference("p1", "2019-123"));

        let order: Vec<String> = std::iter::from_fn(|| f.next_pending(now)).map(|t| t.term).collect();
        assert_eq!(order, vec!["2019-123", "PALM ESTATES", "OAK HILLS", "2022-CA-001", "DOE JANE"]);
    }

    #[test]
    fn test_failure_retries_until_max_attempts() {
        let mut f = frontier();
        let now = Utc::now();
        f.enqueue(SearchTask::reference("p1", "X1"));
        let task = f.next_pending(now).unwrap();
        assert_eq!(f.mark_failed(&task.key(), "500"), Some(TaskStatus::Pending));
        let task = f.next_pending(now).unwrap();
        assert_eq!(f.mark_failed(&task.key(), "500"), Some(TaskStatus::Failed));
        assert!(f.next_pending(now).is_none());
        assert!(!f.has_retryable());
    }

    #[test]
    fn test_rate_limit_backoff_skips_and_does_not_consume_attempts() {
        let mut f = frontier();
        let now = Utc::now();
        f.enqueue(SearchTask::reference("p1", "X1"));
        f.enqueue(SearchTask::case_number("p1", "2022-CA-001"));

        let first = f.next_pending(now).unwrap();
        let backoff = f.mark_rate_limited(&first.key(), None, now).unwrap();
        assert_eq!(backoff, Duration::from_secs(30));

        // Backed-off task is skipped while its window is open
        let second = f.next_pending(now).unwrap();
        assert_eq!(second.term, "2022-CA-001");
        f.mark_completed(&second.key(), 0);
        assert!(f.next_pending(now).is_none());
        assert!(f.has_retryable());
        assert_eq!(f.next_retry_at(), Some(now + ChronoDuration::seconds(30)));

        let later = now + ChronoDuration::seconds(31);
        let retried = f.next_pending(later).unwrap();
        assert_eq!(retried.term, "X1");
        assert_eq!(retried.attempts, 0);

        // Second hit doubles, third is capped
        assert_eq!(f.mark_rate_limited(&retried.key(), None, later), Some(Duration::from_secs(60)));
        let again = f.next_pending(later + ChronoDuration::seconds(61)).unwrap();
        assert_eq!(
            f.mark_rate_limited(&again.key(), None, later),
            Some(Duration::from_secs(100))
        );
    }

    #[test]
    fn test_retry_after_overrides_short_backoff() {
        let mut f = frontier();
        let now = Utc::now();
        f.enqueue(SearchTask::reference("p1", "X1"));
        let task = f.next_pending(now).unwrap();
        let applied = f.mark_rate_limited(&task.key(), Some(Duration::from_secs(90)), now);
        assert_eq!(applied, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_exhaust_broad_legal_tasks() {
        let mut f = frontier();
        f.enqueue(SearchTask::new("p1", TaskType::LegalText, "PALM ESTATES", SearchOperator::Prefix, 22));
        f.enqueue(SearchTask::new("p1", TaskType::LegalText, "PALM ESTATES", SearchOperator::Contains, 23));
        f.enqueue(SearchTask::reference("p1", "X1"));
        let cancelled = f.exhaust_legal_where(|t| t.term == "PALM ESTATES");
        assert_eq!(cancelled, 2);
        assert_eq!(f.counts().exhausted, 2);
        assert_eq!(f.counts().pending, 1);
    }

    #[test]
    fn test_resume_resets_in_progress() {
        let mut task = SearchTask::reference("p1", "X1");
        task.status = TaskStatus::InProgress;
        let mut done = SearchTask::reference("p1", "X2");
        done.status = TaskStatus::Completed;
        let mut f = Frontier::from_tasks("p1", RetryPolicy::default(), vec![task, done]);
        assert_eq!(f.counts().pending, 1);
        assert_eq!(f.counts().completed, 1);
        assert_eq!(f.next_pending(Utc::now()).unwrap().term, "X1");
    }

    #[test]
    fn test_dirty_tracking() {
        let mut f = frontier();
        f.enqueue(SearchTask::reference("p1", "X1"));
        assert_eq!(f.take_dirty().len(), 1);
        assert!(f.take_dirty().is_empty());
        let t = f.next_pending(Utc::now()).unwrap();
        f.mark_completed(&t.key(), 3);
        let dirty = f.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].status, TaskStatus::Completed);
        assert_eq!(dirty[0].new_documents, 3);
    }
}
