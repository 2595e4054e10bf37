/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Recurring job scheduler
//!
//! Drives the retention sweeps, privacy request reviews and audit
//! reports on coarse cadences (hourly, daily, weekly, monthly buckets
//! rather than full cron semantics). Executions of the same job id are
//! strictly serialized through a per-job single-flight lock; a second
//! concurrent trigger is rejected, never interleaved. `stop` prevents
//! new invocations from starting but lets in-flight executions run to
//! completion and be recorded normally.

use crate::error::{GovernanceError, Result};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

/// The recurring job kinds the engine schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    DailyCleanup,
    WeeklyCompliance,
    MonthlyAudit,
    RetentionEnforcement,
    PrivacyReview,
}

/// Coarse cadence buckets, deliberately not full cron semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSchedule {
    Hourly(u32),
    Daily,
    Weekly,
    Monthly,
}

impl JobSchedule {
    pub fn period(&self) -> std::time::Duration {
        match self {
            JobSchedule::Hourly(hours) => {
                std::time::Duration::from_secs(u64::from((*hours).max(1)) * 3600)
            }
            JobSchedule::Daily => std::time::Duration::from_secs(24 * 3600),
            JobSchedule::Weekly => std::time::Duration::from_secs(7 * 24 * 3600),
            JobSchedule::Monthly => std::time::Duration::from_secs(30 * 24 * 3600),
        }
    }

    pub fn next_run_after(&self, reference: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            JobSchedule::Hourly(hours) => {
                reference + Duration::hours(i64::from((*hours).max(1)))
            }
            JobSchedule::Daily => reference + Duration::days(1),
            JobSchedule::Weekly => reference + Duration::weeks(1),
            JobSchedule::Monthly => reference + Duration::days(30),
        }
    }
}

/// A registered recurring job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: uuid::Uuid,
    pub name: String,
    pub job_type: JobType,
    pub schedule: JobSchedule,
    pub enabled: bool,
    pub tenant_id: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub last_result: Option<JobExecutionResult>,
}

/// Input for registering a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub job_type: JobType,
    pub schedule: JobSchedule,
    pub enabled: bool,
    pub tenant_id: Option<String>,
}

/// Immutable record of one job execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionResult {
    pub job_id: uuid::Uuid,
    pub job_type: JobType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub success: bool,
    pub records_processed: u64,
    pub records_deleted: u64,
    pub errors: Vec<String>,
    pub metrics: HashMap<String, serde_json::Value>,
}

/// What a job body produced
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub records_processed: u64,
    pub records_deleted: u64,
    pub errors: Vec<String>,
    pub metrics: HashMap<String, serde_json::Value>,
}

/// Job body seam
///
/// The engine wires the bodies to the registry, deletion manager,
/// rights workflow and report generator; tests inject fakes. Body
/// failures are reported through `JobOutcome.errors`, not panics or
/// returned errors, so the run is always recorded.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &ScheduledJob) -> JobOutcome;
}

/// Point-in-time scheduler status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub total_jobs: usize,
    pub enabled_jobs: usize,
    pub next_run: Option<DateTime<Utc>>,
}

/// Scheduler owning jobs and their bounded execution history
pub struct JobScheduler {
    handler: Arc<dyn JobHandler>,
    jobs: Arc<RwLock<HashMap<uuid::Uuid, ScheduledJob>>>,
    history: Arc<RwLock<HashMap<uuid::Uuid, VecDeque<JobExecutionResult>>>>,
    /// Per-job single-flight locks
    locks: Arc<DashMap<uuid::Uuid, Arc<Mutex<()>>>>,
    /// Present while the scheduler runs. Every timer loop spawned by a
    /// `start` holds a receiver for that start's channel; dropping the
    /// sender on `stop` wakes the loops so they exit instead of lingering
    /// into the next start.
    control: Arc<RwLock<Option<watch::Sender<()>>>>,
    history_limit: usize,
}

impl Clone for JobScheduler {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            jobs: self.jobs.clone(),
            history: self.history.clone(),
            locks: self.locks.clone(),
            control: self.control.clone(),
            history_limit: self.history_limit,
        }
    }
}

impl JobScheduler {
    pub fn new(handler: Arc<dyn JobHandler>, history_limit: usize) -> Self {
        Self {
            handler,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(DashMap::new()),
            control: Arc::new(RwLock::new(None)),
            history_limit: history_limit.max(1),
        }
    }

    /// Register a recurring job and compute its initial next run time
    pub async fn register_job(&self, definition: JobDefinition) -> Result<ScheduledJob> {
        let job = ScheduledJob {
            id: uuid::Uuid::new_v4(),
            name: definition.name,
            job_type: definition.job_type,
            schedule: definition.schedule,
            enabled: definition.enabled,
            tenant_id: definition.tenant_id,
            last_run: None,
            next_run: Some(definition.schedule.next_run_after(Utc::now())),
            last_result: None,
        };

        info!(
            job_id = %job.id,
            name = %job.name,
            job_type = ?job.job_type,
            schedule = ?job.schedule,
            "Registered scheduled job"
        );

        self.jobs.write().await.insert(job.id, job.clone());
        if let Some(control) = self.control.read().await.as_ref() {
            self.spawn_job_loop(job.id, job.schedule, control.subscribe());
        }
        Ok(job)
    }

    /// Start the scheduler; a no-op when already running
    ///
    /// Each start spawns exactly one timer loop per job, bound to this
    /// start's control channel. Loops from an earlier start cannot
    /// survive into a new one.
    pub async fn start(&self) {
        let mut control = self.control.write().await;
        if control.is_some() {
            warn!("Job scheduler is already running");
            return;
        }
        let (stop_tx, _) = watch::channel(());

        let jobs: Vec<(uuid::Uuid, JobSchedule)> = self
            .jobs
            .read()
            .await
            .values()
            .map(|job| (job.id, job.schedule))
            .collect();
        info!(jobs = jobs.len(), "Starting job scheduler");
        for (id, schedule) in jobs {
            self.spawn_job_loop(id, schedule, stop_tx.subscribe());
        }
        *control = Some(stop_tx);
    }

    /// Stop the scheduler
    ///
    /// Dropping the control sender wakes every timer loop so it exits
    /// promptly; in-flight executions run to completion and are
    /// recorded.
    pub async fn stop(&self) {
        let mut control = self.control.write().await;
        if control.take().is_none() {
            warn!("Job scheduler is not running");
            return;
        }
        info!("Stopping job scheduler");
    }

    fn spawn_job_loop(&self, id: uuid::Uuid, schedule: JobSchedule, mut stop_rx: watch::Receiver<()>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(schedule.period());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; jobs wait a full period
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    // Sender dropped by stop; exit instead of waiting out
                    // the period
                    _ = stop_rx.changed() => break,
                }
                let enabled = scheduler
                    .jobs
                    .read()
                    .await
                    .get(&id)
                    .map(|job| job.enabled)
                    .unwrap_or(false);
                if !enabled {
                    continue;
                }
                match scheduler.execute_job(id).await {
                    Ok(result) => {
                        debug!(job_id = %id, success = result.success, "Scheduled run finished")
                    }
                    Err(GovernanceError::JobBusy(_)) => {
                        warn!(job_id = %id, "Previous run still in flight; skipping tick")
                    }
                    Err(err) => warn!(job_id = %id, error = %err, "Scheduled run failed"),
                }
            }
            debug!(job_id = %id, "Job timer loop exited");
        });
    }

    /// Execute a job once, serialized per job id
    ///
    /// A concurrent call for the same id is rejected with `JobBusy`. On
    /// completion the job's `last_run`, `last_result` and `next_run` are
    /// updated (next run is recomputed after execution, not before) and
    /// the result is appended to the bounded history.
    pub async fn execute_job(&self, id: uuid::Uuid) -> Result<JobExecutionResult> {
        let job = self
            .jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::NotFound(format!("scheduled job {id}")))?;

        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.try_lock().map_err(|_| GovernanceError::JobBusy(id))?;

        let start_time = Utc::now();
        let timer = Instant::now();
        debug!(job_id = %id, job_type = ?job.job_type, "Executing job");

        let outcome = self.handler.run(&job).await;

        let end_time = Utc::now();
        let result = JobExecutionResult {
            job_id: id,
            job_type: job.job_type,
            start_time,
            end_time,
            execution_time_ms: timer.elapsed().as_millis() as u64,
            success: outcome.errors.is_empty(),
            records_processed: outcome.records_processed,
            records_deleted: outcome.records_deleted,
            errors: outcome.errors,
            metrics: outcome.metrics,
        };

        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&id) {
                job.last_run = Some(end_time);
                job.last_result = Some(result.clone());
                job.next_run = Some(job.schedule.next_run_after(end_time));
            }
        }
        {
            let mut history = self.history.write().await;
            let entries = history.entry(id).or_default();
            if entries.len() == self.history_limit {
                entries.pop_front();
            }
            entries.push_back(result.clone());
        }

        if result.success {
            info!(
                job_id = %id,
                execution_time_ms = result.execution_time_ms,
                records_processed = result.records_processed,
                "Job execution completed"
            );
        } else {
            warn!(
                job_id = %id,
                errors = result.errors.len(),
                "Job execution completed with errors"
            );
        }

        Ok(result)
    }

    /// Manually trigger one job, bypassing its timer
    pub async fn run_job_now(&self, id: uuid::Uuid) -> Result<JobExecutionResult> {
        info!(job_id = %id, "Manual job trigger");
        self.execute_job(id).await
    }

    /// Manually trigger every enabled job, optionally filtered by type
    ///
    /// Disabled jobs are skipped, same as on the timer path; busy jobs
    /// are skipped, not queued. A single disabled job can still be run
    /// through `run_job_now`.
    pub async fn run_all_jobs_now(
        &self,
        job_type: Option<JobType>,
    ) -> Vec<(uuid::Uuid, Result<JobExecutionResult>)> {
        let ids: Vec<uuid::Uuid> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.enabled)
            .filter(|job| match job_type {
                Some(kind) => job.job_type == kind,
                None => true,
            })
            .map(|job| job.id)
            .collect();

        futures::future::join_all(
            ids.into_iter()
                .map(|id| async move { (id, self.execute_job(id).await) }),
        )
        .await
    }

    pub async fn enable_job(&self, id: uuid::Uuid) -> Result<()> {
        self.set_enabled(id, true).await
    }

    pub async fn disable_job(&self, id: uuid::Uuid) -> Result<()> {
        self.set_enabled(id, false).await
    }

    async fn set_enabled(&self, id: uuid::Uuid, enabled: bool) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("scheduled job {id}")))?;
        if job.enabled != enabled {
            job.enabled = enabled;
            info!(job_id = %id, enabled, "Job toggled");
        }
        Ok(())
    }

    pub async fn get_job(&self, id: uuid::Uuid) -> Result<ScheduledJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::NotFound(format!("scheduled job {id}")))
    }

    pub async fn list_jobs(&self) -> Vec<ScheduledJob> {
        self.jobs.read().await.values().cloned().collect()
    }

    /// Execution history for a job, most recent first
    pub async fn get_job_history(
        &self,
        id: uuid::Uuid,
        limit: Option<usize>,
    ) -> Vec<JobExecutionResult> {
        let history = self.history.read().await;
        let entries = match history.get(&id) {
            Some(entries) => entries,
            None => return Vec::new(),
        };
        entries
            .iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Total executions recorded across all jobs, and how many of those
    /// finished with errors
    pub async fn history_totals(&self) -> (usize, usize) {
        let history = self.history.read().await;
        let mut total = 0;
        let mut failed = 0;
        for entries in history.values() {
            total += entries.len();
            failed += entries.iter().filter(|result| !result.success).count();
        }
        (total, failed)
    }

    pub async fn get_status(&self) -> SchedulerStatus {
        let running = self.control.read().await.is_some();
        let jobs = self.jobs.read().await;
        SchedulerStatus {
            running,
            total_jobs: jobs.len(),
            enabled_jobs: jobs.values().filter(|job| job.enabled).count(),
            next_run: jobs
                .values()
                .filter(|job| job.enabled)
                .filter_map(|job| job.next_run)
                .min(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        runs: AtomicUsize,
        delay: std::time::Duration,
        fail: bool,
    }

    impl CountingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                delay: std::time::Duration::ZERO,
                fail: false,
            })
        }

        fn slow(delay: std::time::Duration) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                delay,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                delay: std::time::Duration::ZERO,
                fail: true,
            })
        }
    }

    #[async_trait::async_trait]
    impl JobHandler for CountingHandler {
        async fn run(&self, _job: &ScheduledJob) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            JobOutcome {
                records_processed: 5,
                records_deleted: 2,
                errors: if self.fail {
                    vec!["collaborator offline".into()]
                } else {
                    Vec::new()
                },
                metrics: HashMap::new(),
            }
        }
    }

    fn definition(job_type: JobType, schedule: JobSchedule) -> JobDefinition {
        JobDefinition {
            name: format!("{job_type:?}"),
            job_type,
            schedule,
            enabled: true,
            tenant_id: None,
        }
    }

    #[tokio::test]
    async fn registration_computes_initial_next_run() {
        let scheduler = JobScheduler::new(CountingHandler::new(), 100);
        let before = Utc::now();
        let job = scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();

        let next_run = job.next_run.unwrap();
        assert!(next_run >= before + Duration::days(1));
        assert!(job.last_run.is_none());
    }

    #[tokio::test]
    async fn execution_updates_job_and_recomputes_next_run() {
        let handler = CountingHandler::new();
        let scheduler = JobScheduler::new(handler.clone(), 100);
        let job = scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();
        let initial_next_run = job.next_run.unwrap();

        let result = scheduler.execute_job(job.id).await.unwrap();
        assert!(result.success);
        assert_eq!(result.records_processed, 5);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        let job = scheduler.get_job(job.id).await.unwrap();
        assert!(job.last_run.is_some());
        assert!(job.last_result.is_some());
        // Recomputed from the completion time, not left at registration time
        assert!(job.next_run.unwrap() >= initial_next_run);
    }

    #[tokio::test]
    async fn concurrent_executions_of_one_job_are_rejected() {
        let handler = CountingHandler::slow(std::time::Duration::from_millis(200));
        let scheduler = JobScheduler::new(handler.clone(), 100);
        let job = scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();

        let first = {
            let scheduler = scheduler.clone();
            let id = job.id;
            tokio::spawn(async move { scheduler.run_job_now(id).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = scheduler.run_job_now(job.id).await;
        assert!(matches!(second, Err(GovernanceError::JobBusy(_))));

        let first = first.await.unwrap().unwrap();
        assert!(first.success);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        // After the first run returns, the job can be triggered again
        scheduler.run_job_now(job.id).await.unwrap();
        assert_eq!(handler.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_jobs_execute_independently() {
        let handler = CountingHandler::slow(std::time::Duration::from_millis(100));
        let scheduler = JobScheduler::new(handler.clone(), 100);
        let a = scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();
        let b = scheduler
            .register_job(definition(JobType::PrivacyReview, JobSchedule::Hourly(6)))
            .await
            .unwrap();

        let (ra, rb) = tokio::join!(scheduler.execute_job(a.id), scheduler.execute_job(b.id));
        assert!(ra.unwrap().success);
        assert!(rb.unwrap().success);
    }

    #[tokio::test]
    async fn run_all_jobs_now_filters_by_type() {
        let handler = CountingHandler::new();
        let scheduler = JobScheduler::new(handler.clone(), 100);
        scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();
        scheduler
            .register_job(definition(JobType::MonthlyAudit, JobSchedule::Monthly))
            .await
            .unwrap();

        let results = scheduler.run_all_jobs_now(Some(JobType::DailyCleanup)).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        let results = scheduler.run_all_jobs_now(None).await;
        assert_eq!(results.len(), 2);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_all_jobs_now_skips_disabled_jobs() {
        let handler = CountingHandler::new();
        let scheduler = JobScheduler::new(handler.clone(), 100);
        let enabled = scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();
        let disabled = scheduler
            .register_job(JobDefinition {
                enabled: false,
                ..definition(JobType::MonthlyAudit, JobSchedule::Monthly)
            })
            .await
            .unwrap();

        let results = scheduler.run_all_jobs_now(None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, enabled.id);
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        // A targeted manual trigger still works on a disabled job
        scheduler.run_job_now(disabled.id).await.unwrap();
        assert_eq!(handler.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_does_not_duplicate_timer_loops() {
        let handler = CountingHandler::new();
        let scheduler = JobScheduler::new(handler.clone(), 100);
        scheduler
            .register_job(definition(JobType::PrivacyReview, JobSchedule::Hourly(1)))
            .await
            .unwrap();

        // A loop leaked by the first start would tick alongside the
        // second start's loop and double every count below
        scheduler.start().await;
        scheduler.stop().await;
        scheduler.start().await;
        // Let both spawned loops reach their first park: the stale one
        // exits, the live one arms its hourly tick
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        tokio::time::advance(std::time::Duration::from_secs(3601)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);

        tokio::time::advance(std::time::Duration::from_secs(3600)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 2);

        // After a final stop the loop exits without waiting out its
        // period and no further ticks arrive
        scheduler.stop().await;
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_secs(2 * 3600)).await;
        tokio::task::yield_now().await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn history_is_bounded_with_fifo_eviction() {
        let scheduler = JobScheduler::new(CountingHandler::new(), 3);
        let job = scheduler
            .register_job(definition(JobType::MonthlyAudit, JobSchedule::Monthly))
            .await
            .unwrap();

        let mut starts = Vec::new();
        for _ in 0..5 {
            starts.push(scheduler.execute_job(job.id).await.unwrap().start_time);
        }

        let history = scheduler.get_job_history(job.id, None).await;
        assert_eq!(history.len(), 3);
        // Most recent first; the two oldest runs were evicted
        assert_eq!(history[0].start_time, starts[4]);
        assert_eq!(history[2].start_time, starts[2]);

        let limited = scheduler.get_job_history(job.id, Some(1)).await;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].start_time, starts[4]);
    }

    #[tokio::test]
    async fn handler_errors_mark_the_run_failed() {
        let scheduler = JobScheduler::new(CountingHandler::failing(), 100);
        let job = scheduler
            .register_job(definition(JobType::WeeklyCompliance, JobSchedule::Weekly))
            .await
            .unwrap();

        let result = scheduler.execute_job(job.id).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors, vec!["collaborator offline".to_string()]);

        // The failed run is recorded; no automatic retry happened
        let history = scheduler.get_job_history(job.id, None).await;
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_status_reflects_state() {
        let scheduler = JobScheduler::new(CountingHandler::new(), 100);
        scheduler
            .register_job(definition(JobType::DailyCleanup, JobSchedule::Daily))
            .await
            .unwrap();
        let disabled = scheduler
            .register_job(JobDefinition {
                enabled: false,
                ..definition(JobType::MonthlyAudit, JobSchedule::Monthly)
            })
            .await
            .unwrap();

        scheduler.start().await;
        scheduler.start().await; // logged no-op

        let status = scheduler.get_status().await;
        assert!(status.running);
        assert_eq!(status.total_jobs, 2);
        assert_eq!(status.enabled_jobs, 1);
        assert!(status.next_run.is_some());

        scheduler.enable_job(disabled.id).await.unwrap();
        assert_eq!(scheduler.get_status().await.enabled_jobs, 2);

        scheduler.stop().await;
        scheduler.stop().await; // logged no-op
        assert!(!scheduler.get_status().await.running);
    }
}
