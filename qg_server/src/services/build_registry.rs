//! In-memory registry of builds and the analyses they produced.
//!
//! Each build owns its own resolution cache, so dropping a build record
//! drops everything cached for it. The registry keeps at most a fixed number
//! of builds and evicts the oldest registrations first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::models::analysis::AnalysisHandle;
use crate::models::ce_task::TaskCompleted;
use crate::services::project_resolver::ResolveProject;
use crate::services::resolution_cache::{CachePolicy, ProjectList, ResolutionCache};

/// Builds kept when no limit is configured.
pub const DEFAULT_MAX_BUILDS: usize = 1000;

pub struct BuildRecord {
    pub id: String,
    /// Registration order, used for eviction.
    seq: u64,
    completed_at: RwLock<DateTime<Utc>>,
    analyses: RwLock<Vec<AnalysisHandle>>,
    cache: ResolutionCache,
}

impl BuildRecord {
    fn new(id: &str, seq: u64, completed_at: DateTime<Utc>, policy: CachePolicy) -> Self {
        Self {
            id: id.to_string(),
            seq,
            completed_at: RwLock::new(completed_at),
            analyses: RwLock::new(Vec::new()),
            cache: ResolutionCache::new(policy),
        }
    }

    pub async fn completed_at(&self) -> DateTime<Utc> {
        *self.completed_at.read().await
    }

    pub async fn analyses(&self) -> Vec<AnalysisHandle> {
        self.analyses.read().await.clone()
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Project information for every analysis of the build.
    pub async fn project_information(&self, resolver: &dyn ResolveProject) -> ProjectList {
        self.project_information_at(resolver, Utc::now()).await
    }

    pub async fn project_information_at(
        &self,
        resolver: &dyn ResolveProject,
        now: DateTime<Utc>,
    ) -> ProjectList {
        let completed_at = self.completed_at().await;
        let handles = self.analyses().await;
        self.cache
            .get_all_at(resolver, completed_at, &handles, now)
            .await
    }
}

pub struct BuildRegistry {
    policy: CachePolicy,
    max_builds: usize,
    next_seq: AtomicU64,
    builds: DashMap<String, Arc<BuildRecord>>,
}

impl Default for BuildRegistry {
    fn default() -> Self {
        Self::new(CachePolicy::default(), DEFAULT_MAX_BUILDS)
    }
}

impl BuildRegistry {
    pub fn new(policy: CachePolicy, max_builds: usize) -> Self {
        Self {
            policy,
            max_builds: max_builds.max(1),
            next_seq: AtomicU64::new(0),
            builds: DashMap::new(),
        }
    }

    /// Create or replace the analyses of a build. The cache of an existing
    /// build is kept.
    pub async fn upsert(
        &self,
        build_id: &str,
        completed_at: DateTime<Utc>,
        analyses: Vec<AnalysisHandle>,
    ) -> Arc<BuildRecord> {
        let record = self.record(build_id, completed_at);
        *record.completed_at.write().await = completed_at;
        *record.analyses.write().await = analyses;
        tracing::debug!(build_id, "Registered build");
        record
    }

    /// Append one analysis, creating the build when it is not known yet.
    pub async fn add_analysis(
        &self,
        build_id: &str,
        handle: AnalysisHandle,
        now: DateTime<Utc>,
    ) -> Arc<BuildRecord> {
        let record = self.record(build_id, now);
        record.analyses.write().await.push(handle);
        record
    }

    pub fn get(&self, build_id: &str) -> Option<Arc<BuildRecord>> {
        self.builds.get(build_id).map(|b| b.value().clone())
    }

    pub fn remove(&self, build_id: &str) -> bool {
        let removed = self.builds.remove(build_id).is_some();
        if removed {
            tracing::debug!(build_id, "Removed build");
        }
        removed
    }

    /// Push a webhook notification into every build cache holding the task.
    /// Returns the number of builds updated.
    pub fn apply_task_completion(&self, event: &TaskCompleted, now: DateTime<Utc>) -> usize {
        // Collected first so no shard lock is held while touching the caches.
        let builds: Vec<Arc<BuildRecord>> =
            self.builds.iter().map(|b| b.value().clone()).collect();
        builds
            .iter()
            .filter(|b| b.cache.apply_task_completion(event, now))
            .count()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    fn record(&self, build_id: &str, completed_at: DateTime<Utc>) -> Arc<BuildRecord> {
        let mut created = false;
        let record = self
            .builds
            .entry(build_id.to_string())
            .or_insert_with(|| {
                created = true;
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                Arc::new(BuildRecord::new(build_id, seq, completed_at, self.policy))
            })
            .value()
            .clone();

        if created {
            self.evict_oldest();
        }
        record
    }

    fn evict_oldest(&self) {
        while self.builds.len() > self.max_builds {
            let oldest = self
                .builds
                .iter()
                .min_by_key(|b| b.value().seq)
                .map(|b| b.key().clone());
            let Some(build_id) = oldest else {
                break;
            };
            self.builds.remove(&build_id);
            tracing::debug!(build_id = %build_id, "Evicted oldest build");
        }
    }
}
