//! # Job Tracking
//!
//! Records what ran, for whom, and how it ended.
//!
//! Jobs are kept in a named cache obtained from a [`CacheService`]. The
//! service is constructed explicitly and handed to whoever needs it:
//! - [`CacheService::initialise`] starts it
//! - [`CacheService::cache`] hands out a [`CacheHandle`] to a named cache
//! - [`CacheService::shutdown`] drops every cache; handles then fail
//!
//! Cache values are stored as JSON so one service can hold any serde type.

use crate::{FederationError, User};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// CACHE SERVICE
// =============================================================================

type Entries = Arc<RwLock<BTreeMap<String, serde_json::Value>>>;

/// Owner of every named cache.
#[derive(Debug)]
pub struct CacheService {
    running: Arc<AtomicBool>,
    caches: Mutex<BTreeMap<String, Entries>>,
}

impl CacheService {
    /// Start a new, empty service.
    #[must_use]
    pub fn initialise() -> Arc<Self> {
        tracing::debug!("cache service initialised");
        Arc::new(Self {
            running: Arc::new(AtomicBool::new(true)),
            caches: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Handle to the named cache, creating it if needed.
    pub fn cache(&self, name: &str) -> Result<CacheHandle, FederationError> {
        if !self.is_running() {
            return Err(not_running());
        }
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        let entries = caches.entry(name.to_string()).or_default().clone();
        Ok(CacheHandle {
            name: name.to_string(),
            running: Arc::clone(&self.running),
            entries,
        })
    }

    /// Stop the service and drop all cached values.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        for entries in caches.values() {
            if let Ok(mut map) = entries.write() {
                map.clear();
            }
        }
        caches.clear();
        tracing::debug!("cache service shut down");
    }
}

fn not_running() -> FederationError {
    FederationError::Cache("cache service is not running".to_string())
}

/// A handle to one named cache.
#[derive(Debug, Clone)]
pub struct CacheHandle {
    name: String,
    running: Arc<AtomicBool>,
    entries: Entries,
}

impl CacheHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_running(&self) -> Result<(), FederationError> {
        if self.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(not_running())
        }
    }

    fn poisoned(&self) -> FederationError {
        FederationError::Cache(format!("cache {} lock poisoned", self.name))
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), FederationError> {
        self.check_running()?;
        let json = serde_json::to_value(value).map_err(|e| {
            FederationError::Cache(format!("failed to add {} to cache {}: {}", key, self.name, e))
        })?;
        self.entries
            .write()
            .map_err(|_| self.poisoned())?
            .insert(key.to_string(), json);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, FederationError> {
        self.check_running()?;
        let entries = self.entries.read().map_err(|_| self.poisoned())?;
        entries
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|e| FederationError::Serialization(e.to_string()))
            })
            .transpose()
    }

    pub fn keys(&self) -> Result<Vec<String>, FederationError> {
        self.check_running()?;
        Ok(self
            .entries
            .read()
            .map_err(|_| self.poisoned())?
            .keys()
            .cloned()
            .collect())
    }

    pub fn clear(&self) -> Result<(), FederationError> {
        self.check_running()?;
        self.entries.write().map_err(|_| self.poisoned())?.clear();
        Ok(())
    }
}

// =============================================================================
// JOB DETAILS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
    ScheduledParent,
}

/// One tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_id: String,
    pub user_id: String,
    pub operation: String,
    pub status: JobStatus,
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

impl JobDetail {
    /// A job that has just started.
    #[must_use]
    pub fn running(job_id: impl Into<String>, user: &User, operation: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            user_id: user.user_id.clone(),
            operation: operation.into(),
            status: JobStatus::Running,
            start_time: now_millis(),
            end_time: None,
            description: None,
        }
    }

    /// The same job, ended with `status`.
    #[must_use]
    pub fn ended(mut self, status: JobStatus, description: Option<String>) -> Self {
        self.status = status;
        self.end_time = Some(now_millis());
        self.description = description;
        self
    }
}

// =============================================================================
// JOB TRACKER
// =============================================================================

/// Job details kept in the `JobTracker` cache.
#[derive(Debug, Clone)]
pub struct JobTracker {
    cache: CacheHandle,
}

impl JobTracker {
    pub const CACHE_NAME: &'static str = "JobTracker";

    pub fn new(service: &CacheService) -> Result<Self, FederationError> {
        Ok(Self {
            cache: service.cache(Self::CACHE_NAME)?,
        })
    }

    pub fn add_or_update_job(&self, job: &JobDetail, _user: &User) -> Result<(), FederationError> {
        if job.job_id.is_empty() {
            return Err(FederationError::Configuration("jobId is required".to_string()));
        }
        self.cache.put(&job.job_id, job)
    }

    pub fn get_job(&self, job_id: &str, _user: &User) -> Result<Option<JobDetail>, FederationError> {
        self.cache.get(job_id)
    }

    pub fn all_jobs(&self, user: &User) -> Result<Vec<JobDetail>, FederationError> {
        self.jobs_matching(user, |_| true)
    }

    pub fn all_scheduled_jobs(&self) -> Result<Vec<JobDetail>, FederationError> {
        self.jobs_matching(&User::default(), |job| job.status == JobStatus::ScheduledParent)
    }

    fn jobs_matching(
        &self,
        user: &User,
        predicate: impl Fn(&JobDetail) -> bool,
    ) -> Result<Vec<JobDetail>, FederationError> {
        let mut jobs = Vec::new();
        for job_id in self.cache.keys()? {
            if let Some(job) = self.get_job(&job_id, user)?
                && predicate(&job)
            {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    pub fn clear(&self) -> Result<(), FederationError> {
        self.cache.clear()
    }
}

// =============================================================================
// TESTS
// =============================================================================
