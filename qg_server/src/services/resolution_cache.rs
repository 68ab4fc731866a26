//! Per-build resolution cache.
//!
//! Builds are rendered many times per page view, often with auto-refresh.
//! Entries for finished CE tasks never expire; entries for pending tasks are
//! trusted during a grace window after the build completed. On top of that a
//! batch guard limits how often the whole set of handles of one build is
//! walked.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::analysis::AnalysisHandle;
use crate::models::ce_task::{CeStatus, TaskCompleted};
use crate::models::project_information::ProjectInformation;
use crate::services::project_resolver::ResolveProject;

/// Aggregated result of one batch, shared with every reader.
pub type ProjectList = Arc<Vec<Arc<ProjectInformation>>>;

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Minimum time between two walks over all handles of a build.
    pub batch_guard: Duration,
    /// How long after build completion a non-terminal entry stays valid.
    pub pending_grace: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            batch_guard: Duration::seconds(30),
            pending_grace: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub info: Arc<ProjectInformation>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Default)]
struct BatchState {
    last_request: Option<DateTime<Utc>>,
    last_projects: ProjectList,
}

/// Cache owned by one build record.
pub struct ResolutionCache {
    policy: CachePolicy,
    entries: DashMap<String, CacheEntry>,
    batch: Mutex<BatchState>,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ResolutionCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: DashMap::new(),
            batch: Mutex::new(BatchState::default()),
        }
    }

    pub async fn get_all(
        &self,
        resolver: &dyn ResolveProject,
        build_completed: DateTime<Utc>,
        handles: &[AnalysisHandle],
    ) -> ProjectList {
        self.get_all_at(resolver, build_completed, handles, Utc::now())
            .await
    }

    /// Resolve every handle of the build, skipping the walk entirely when the
    /// previous one is younger than the batch guard.
    ///
    /// The batch lock is held for the whole walk so that concurrent renders
    /// of the same build issue a single batch of requests.
    pub async fn get_all_at(
        &self,
        resolver: &dyn ResolveProject,
        build_completed: DateTime<Utc>,
        handles: &[AnalysisHandle],
        now: DateTime<Utc>,
    ) -> ProjectList {
        let mut batch = self.batch.lock().await;

        if let Some(last) = batch.last_request {
            if now - last < self.policy.batch_guard {
                crate::metrics::batch("guarded");
                return batch.last_projects.clone();
            }
        }

        crate::metrics::batch("walked");
        let mut projects = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Some(info) = self.get_at(resolver, build_completed, handle, now).await {
                projects.push(info);
            }
        }

        let projects: ProjectList = Arc::new(projects);
        batch.last_projects = projects.clone();
        batch.last_request = Some(now);
        projects
    }

    pub async fn get(
        &self,
        resolver: &dyn ResolveProject,
        build_completed: DateTime<Utc>,
        handle: &AnalysisHandle,
    ) -> Option<Arc<ProjectInformation>> {
        self.get_at(resolver, build_completed, handle, Utc::now())
            .await
    }

    /// Cached entry when still valid, otherwise a fresh resolution. Failed
    /// resolutions are not cached.
    pub async fn get_at(
        &self,
        resolver: &dyn ResolveProject,
        build_completed: DateTime<Utc>,
        handle: &AnalysisHandle,
        now: DateTime<Utc>,
    ) -> Option<Arc<ProjectInformation>> {
        let Some(key) = handle.cache_key() else {
            return resolver.resolve(handle).await.map(Arc::new);
        };

        // Cloned out so no map guard is held across the network call.
        let cached = self.entries.get(key).map(|e| e.value().clone());
        if self.is_entry_valid(cached.as_ref(), build_completed, now) {
            crate::metrics::cache_lookup("hit");
            return cached.map(|e| e.info);
        }

        crate::metrics::cache_lookup("miss");
        let fresh = Arc::new(resolver.resolve(handle).await?);

        // A terminal state recorded while the request was in flight wins
        // over a non-terminal answer.
        let info = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if is_terminal(&slot.get().info) && !is_terminal(&fresh) {
                    slot.get().info.clone()
                } else {
                    slot.insert(CacheEntry {
                        info: fresh.clone(),
                        resolved_at: now,
                    });
                    fresh
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    info: fresh.clone(),
                    resolved_at: now,
                });
                fresh
            }
        };
        Some(info)
    }

    /// Terminal CE states are valid forever; anything else only while the
    /// build completed less than the grace window ago.
    pub fn is_entry_valid(
        &self,
        entry: Option<&CacheEntry>,
        build_completed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = entry else {
            return false;
        };

        if is_terminal(&entry.info) {
            return true;
        }

        now - build_completed <= self.policy.pending_grace
    }

    /// Fold a webhook completion notice into an existing entry so the next
    /// read sees the terminal state without another round-trip. Returns
    /// whether an entry was updated; unknown tasks are left for the next
    /// resolution, which fetches the full project information.
    pub fn apply_task_completion(&self, event: &TaskCompleted, now: DateTime<Utc>) -> bool {
        let Some(mut entry) = self.entries.get_mut(&event.task_id) else {
            return false;
        };

        let mut info = (*entry.info)
            .clone()
            .with_ce_status(event.task_status.as_str());
        if let Some(status) = event.quality_gate_status.as_deref() {
            info = info.with_status(status);
        }
        *entry = CacheEntry {
            info: Arc::new(info),
            resolved_at: now,
        };
        true
    }

    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_terminal(info: &ProjectInformation) -> bool {
    info.ce_status()
        .is_some_and(|status| CeStatus::parse(status).is_terminal())
}
