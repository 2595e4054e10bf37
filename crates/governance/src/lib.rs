/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! # A3Mailer Data Governance
//!
//! Data lifecycle and subject-rights compliance engine for A3Mailer.
//! Combines a retention rule registry, a deletion request state machine
//! with legal hold enforcement, a GDPR/CCPA data subject rights
//! workflow bound to a statutory deadline, and a recurring job
//! scheduler that drives all of them without manual intervention.
//!
//! ## Features
//!
//! - **Retention Rules**: Catalog of what data is kept, for how long and
//!   under which legal basis, with tenant overrides
//! - **Deletion Requests**: Verified, legal-hold-gated purge requests
//!   with audit confirmations
//! - **Subject Rights**: Access, deletion, portability, rectification,
//!   objection and restriction requests with a 30-day SLA clock
//! - **Job Scheduling**: Recurring cleanup, review and audit jobs with
//!   per-job single-flight execution and bounded history
//! - **Compliance Reports**: Point-in-time snapshots with SLA breach
//!   surfacing
//!
//! ## Architecture
//!
//! The engine consists of:
//! - Retention Rule Registry: retention policy and data inventory
//! - Deletion Request Manager: deletion execution and gating
//! - Data Subject Request Workflow: rights lifecycle and consent records
//! - Job Scheduler: cadence-driven automation
//! - Compliance Report Generator: read-only aggregation
//!
//! Physical deletion, identity verification, notification delivery and
//! data export are external collaborators injected as trait objects;
//! the engine never touches a datastore or transport directly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use data_governance::{Collaborators, GovernanceConfig, GovernanceEngine};
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = GovernanceEngine::new(GovernanceConfig::default(), collaborators()).await?;
//!     engine.start().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tracing::info;

pub mod collaborators;
pub mod config;
pub mod deletion;
pub mod error;
pub mod metrics;
pub mod privacy;
pub mod report;
pub mod retention;
pub mod scheduler;

pub use collaborators::{
    Collaborators, DataExporter, DeletionBackend, DeletionOutcome, ExportFormat, IdentityVerifier,
    NotificationKind, NotificationSender, VerificationEvidence, VerificationMethod,
};
pub use config::GovernanceConfig;
pub use deletion::{
    DeletionConfirmation, DeletionRequest, DeletionRequestDraft, DeletionRequestManager,
    DeletionRequestType, DeletionStatus,
};
pub use error::{GovernanceError, Result};
pub use metrics::GovernanceMetrics;
pub use privacy::{
    CommunicationEntry, CompletionOutcome, ConsentKind, ConsentRecord, ConsentStatus,
    DataSubjectRequest, DataSubjectRequestWorkflow, RequestDetails, SubjectRequestKind,
    SubjectRequestStatus, SubjectRequestSubmission, VerificationStatus,
};
pub use report::{ComplianceReport, ComplianceReportGenerator, ReportKind};
pub use retention::{
    DataInventoryDraft, DataInventoryItem, RetentionRule, RetentionRuleDraft, RetentionRulePatch,
    RetentionRuleRegistry,
};
pub use scheduler::{
    JobDefinition, JobExecutionResult, JobHandler, JobOutcome, JobSchedule, JobScheduler, JobType,
    ScheduledJob, SchedulerStatus,
};

/// Data category kinds covered by retention rules
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataCategoryKind {
    Personal,
    Financial,
    Operational,
    Compliance,
    System,
}

/// Retention rule priority
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RulePriority {
    Critical,
    High,
    Medium,
    Low,
}

/// Sensitivity classification of a data location
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

/// Job bodies wired to the engine's components
///
/// Thin adapters: each job type delegates to the registry, deletion
/// manager, rights workflow or report generator. Collaborator failures
/// are recorded in the outcome and retried on the next natural
/// schedule, never busy-retried.
struct EngineJobHandler {
    registry: Arc<RetentionRuleRegistry>,
    deletions: Arc<DeletionRequestManager>,
    workflow: Arc<DataSubjectRequestWorkflow>,
    reports: Arc<ComplianceReportGenerator>,
}

impl EngineJobHandler {
    /// Sweep expired retention rules and submit the resulting drafts
    async fn run_retention_sweep(&self, tenant_id: Option<&str>) -> JobOutcome {
        let mut outcome = JobOutcome::default();
        let drafts = self.registry.sweep_expired(chrono::Utc::now()).await;

        for draft in drafts {
            if tenant_id.is_some() && draft.tenant_id.as_deref() != tenant_id {
                continue;
            }
            match self.deletions.submit(draft).await {
                Ok(request) => {
                    outcome.records_processed += 1;
                    if let Some(confirmation) = &request.deletion_confirmation {
                        outcome.records_deleted += confirmation.deleted_record_count;
                    }
                    if let Some(error) = &request.error {
                        outcome.errors.push(error.clone());
                    }
                }
                Err(err) => outcome.errors.push(err.to_string()),
            }
        }
        outcome
    }

    /// Advance verified subject requests awaiting processing
    async fn run_privacy_review(&self) -> JobOutcome {
        JobOutcome {
            records_processed: self.workflow.advance_pending().await as u64,
            ..Default::default()
        }
    }

    /// Weekly pass: advance rights requests, process due ungated
    /// deletions, snapshot compliance
    async fn run_weekly_compliance(&self, tenant_id: Option<&str>) -> JobOutcome {
        let mut outcome = self.run_privacy_review().await;

        let now = chrono::Utc::now();
        let due = self
            .deletions
            .list(tenant_id, Some(DeletionStatus::Pending))
            .await;
        for request in due {
            if request.target_deletion_date > now
                || request.verification_required
                || (request.legal_hold_check && !request.hold_cleared)
            {
                continue;
            }
            match self.deletions.process(request.id).await {
                Ok(true) => {
                    outcome.records_processed += 1;
                    if let Ok(request) = self.deletions.get(request.id).await {
                        if let Some(confirmation) = request.deletion_confirmation {
                            outcome.records_deleted += confirmation.deleted_record_count;
                        }
                    }
                }
                Ok(false) => outcome
                    .errors
                    .push(format!("deletion request {} failed", request.id)),
                Err(err) => outcome.errors.push(err.to_string()),
            }
        }

        let report = self
            .reports
            .generate(ReportKind::RetentionCompliance, tenant_id)
            .await;
        outcome.metrics.insert(
            "compliance_score".into(),
            serde_json::json!(report.metrics.compliance_score),
        );
        outcome
    }

    async fn run_monthly_audit(&self, tenant_id: Option<&str>) -> JobOutcome {
        let report = self.reports.generate(ReportKind::AuditTrail, tenant_id).await;
        let mut outcome = JobOutcome {
            records_processed: 1,
            ..Default::default()
        };
        outcome.metrics.insert(
            "compliance_score".into(),
            serde_json::json!(report.metrics.compliance_score),
        );
        outcome.metrics.insert(
            "sla_breaches".into(),
            serde_json::json!(report.sla_breached_requests.len()),
        );
        outcome
    }
}

#[async_trait::async_trait]
impl JobHandler for EngineJobHandler {
    async fn run(&self, job: &ScheduledJob) -> JobOutcome {
        let tenant_id = job.tenant_id.as_deref();
        match job.job_type {
            JobType::DailyCleanup | JobType::RetentionEnforcement => {
                self.run_retention_sweep(tenant_id).await
            }
            JobType::PrivacyReview => self.run_privacy_review().await,
            JobType::WeeklyCompliance => self.run_weekly_compliance(tenant_id).await,
            JobType::MonthlyAudit => self.run_monthly_audit(tenant_id).await,
        }
    }
}

/// The data governance engine
///
/// Constructed once at process start with its collaborators; every
/// component is an explicit dependency, no global state.
pub struct GovernanceEngine {
    config: GovernanceConfig,
    registry: Arc<RetentionRuleRegistry>,
    deletions: Arc<DeletionRequestManager>,
    workflow: Arc<DataSubjectRequestWorkflow>,
    reports: Arc<ComplianceReportGenerator>,
    scheduler: Arc<JobScheduler>,
}

impl GovernanceEngine {
    /// Build the engine, optionally seeding the default rule catalog and
    /// the standard recurring jobs
    pub async fn new(config: GovernanceConfig, collaborators: Collaborators) -> Result<Self> {
        info!("Initializing data governance engine");

        let registry = Arc::new(RetentionRuleRegistry::new());
        let deletions = Arc::new(DeletionRequestManager::new(
            collaborators.deletion,
            registry.clone(),
        ));
        let workflow = Arc::new(DataSubjectRequestWorkflow::new(
            config.clone(),
            registry.clone(),
            deletions.clone(),
            collaborators.verifier,
            collaborators.notifier,
            collaborators.exporter,
        ));
        let reports = Arc::new(ComplianceReportGenerator::new(
            registry.clone(),
            deletions.clone(),
            workflow.clone(),
            config.report_review_interval_days,
            config.report_window_days,
        ));
        let handler = Arc::new(EngineJobHandler {
            registry: registry.clone(),
            deletions: deletions.clone(),
            workflow: workflow.clone(),
            reports: reports.clone(),
        });
        let scheduler = Arc::new(JobScheduler::new(handler, config.job_history_limit));

        let engine = Self {
            config,
            registry,
            deletions,
            workflow,
            reports,
            scheduler,
        };

        if engine.config.seed_default_rules {
            engine.registry.seed_default_rules().await?;
        }
        if engine.config.register_default_jobs {
            engine.register_default_jobs().await?;
        }

        info!("Data governance engine initialized");
        Ok(engine)
    }

    async fn register_default_jobs(&self) -> Result<()> {
        let defaults = [
            ("daily-cleanup", JobType::DailyCleanup, JobSchedule::Daily),
            (
                "weekly-compliance-review",
                JobType::WeeklyCompliance,
                JobSchedule::Weekly,
            ),
            ("monthly-audit", JobType::MonthlyAudit, JobSchedule::Monthly),
            (
                "retention-enforcement",
                JobType::RetentionEnforcement,
                JobSchedule::Daily,
            ),
            (
                "privacy-request-review",
                JobType::PrivacyReview,
                JobSchedule::Hourly(6),
            ),
        ];
        for (name, job_type, schedule) in defaults {
            self.scheduler
                .register_job(JobDefinition {
                    name: name.to_string(),
                    job_type,
                    schedule,
                    enabled: true,
                    tenant_id: None,
                })
                .await?;
        }
        Ok(())
    }

    /// Start the recurring job timers; idempotent
    pub async fn start(&self) {
        self.scheduler.start().await;
    }

    /// Stop the recurring job timers; in-flight executions complete
    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    // Retention rule surface

    pub async fn register_rule(&self, draft: RetentionRuleDraft) -> Result<RetentionRule> {
        self.registry.register_rule(draft).await
    }

    pub async fn update_rule(
        &self,
        id: uuid::Uuid,
        patch: RetentionRulePatch,
    ) -> Result<RetentionRule> {
        self.registry.update_rule(id, patch).await
    }

    pub async fn list_rules(&self, tenant_id: Option<&str>) -> Vec<RetentionRule> {
        self.registry.list_rules(tenant_id).await
    }

    pub async fn add_inventory_item(&self, draft: DataInventoryDraft) -> Result<DataInventoryItem> {
        self.registry.add_inventory_item(draft).await
    }

    pub async fn list_inventory(&self, tenant_id: Option<&str>) -> Vec<DataInventoryItem> {
        self.registry.list_inventory(tenant_id).await
    }

    pub async fn sweep_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Vec<DeletionRequestDraft> {
        self.registry.sweep_expired(now).await
    }

    // Deletion request surface

    pub async fn submit_deletion_request(
        &self,
        draft: DeletionRequestDraft,
    ) -> Result<DeletionRequest> {
        self.deletions.submit(draft).await
    }

    pub async fn process_deletion_request(&self, id: uuid::Uuid) -> Result<bool> {
        self.deletions.process(id).await
    }

    pub async fn clear_legal_hold(&self, id: uuid::Uuid) -> Result<()> {
        self.deletions.clear_legal_hold(id).await
    }

    pub async fn list_deletion_requests(
        &self,
        tenant_id: Option<&str>,
        status: Option<DeletionStatus>,
    ) -> Vec<DeletionRequest> {
        self.deletions.list(tenant_id, status).await
    }

    // Subject rights surface

    pub async fn submit_data_subject_request(
        &self,
        submission: SubjectRequestSubmission,
    ) -> Result<DataSubjectRequest> {
        self.workflow.submit(submission).await
    }

    pub async fn verify_identity(
        &self,
        id: uuid::Uuid,
        evidence: &VerificationEvidence,
    ) -> Result<bool> {
        self.workflow.verify_identity(id, evidence).await
    }

    pub async fn process_data_request(&self, id: uuid::Uuid) -> Result<bool> {
        self.workflow.process(id).await
    }

    pub async fn list_data_subject_requests(
        &self,
        tenant_id: Option<&str>,
        status: Option<SubjectRequestStatus>,
    ) -> Vec<DataSubjectRequest> {
        self.workflow.list(tenant_id, status).await
    }

    // Scheduler surface

    pub async fn register_job(&self, definition: JobDefinition) -> Result<ScheduledJob> {
        self.scheduler.register_job(definition).await
    }

    pub async fn enable_job(&self, id: uuid::Uuid) -> Result<()> {
        self.scheduler.enable_job(id).await
    }

    pub async fn disable_job(&self, id: uuid::Uuid) -> Result<()> {
        self.scheduler.disable_job(id).await
    }

    pub async fn run_job_now(&self, id: uuid::Uuid) -> Result<JobExecutionResult> {
        self.scheduler.run_job_now(id).await
    }

    pub async fn run_all_jobs_now(
        &self,
        job_type: Option<JobType>,
    ) -> Vec<(uuid::Uuid, Result<JobExecutionResult>)> {
        self.scheduler.run_all_jobs_now(job_type).await
    }

    pub async fn get_job_history(
        &self,
        id: uuid::Uuid,
        limit: Option<usize>,
    ) -> Vec<JobExecutionResult> {
        self.scheduler.get_job_history(id, limit).await
    }

    pub async fn get_scheduler_status(&self) -> SchedulerStatus {
        self.scheduler.get_status().await
    }

    // Reporting surface

    pub async fn generate_compliance_report(
        &self,
        kind: ReportKind,
        tenant_id: Option<&str>,
    ) -> ComplianceReport {
        self.reports.generate(kind, tenant_id).await
    }

    /// Snapshot engine-wide metrics
    pub async fn collect_metrics(&self) -> GovernanceMetrics {
        let rules = self.registry.list_rules(None).await;
        let inventory = self.registry.list_inventory(None).await;
        let deletions = self.deletions.list(None, None).await;
        let subject_requests = self.workflow.list(None, None).await;
        let scheduler_status = self.scheduler.get_status().await;
        let (executions_recorded, failed_executions) = self.scheduler.history_totals().await;

        let mut requests_by_status = std::collections::HashMap::new();
        for request in &deletions {
            *requests_by_status
                .entry(request.status.as_str().to_string())
                .or_insert(0) += 1;
        }
        let mut privacy_by_type = std::collections::HashMap::new();
        let mut privacy_by_status = std::collections::HashMap::new();
        for request in &subject_requests {
            *privacy_by_type
                .entry(request.kind().as_str().to_string())
                .or_insert(0) += 1;
            *privacy_by_status
                .entry(request.status.as_str().to_string())
                .or_insert(0) += 1;
        }

        GovernanceMetrics {
            retention: metrics::RetentionMetrics {
                total_rules: rules.len(),
                auto_delete_rules: rules.iter().filter(|rule| rule.auto_delete).count(),
                inventory_items: inventory.len(),
            },
            deletion: metrics::DeletionMetrics {
                requests_by_status,
                records_deleted_total: deletions
                    .iter()
                    .filter_map(|request| request.deletion_confirmation.as_ref())
                    .map(|confirmation| confirmation.deleted_record_count)
                    .sum(),
            },
            privacy: metrics::PrivacyMetrics {
                requests_by_type: privacy_by_type,
                requests_by_status: privacy_by_status,
                outstanding_requests: subject_requests
                    .iter()
                    .filter(|request| !request.status.is_terminal())
                    .count(),
                consent_withdrawals: self.workflow.consent_withdrawal_count().await,
            },
            scheduler: metrics::SchedulerMetrics {
                total_jobs: scheduler_status.total_jobs,
                enabled_jobs: scheduler_status.enabled_jobs,
                executions_recorded,
                failed_executions,
            },
            last_updated: chrono::Utc::now(),
        }
    }

    // Component access for advanced callers and tests

    pub fn registry(&self) -> &Arc<RetentionRuleRegistry> {
        &self.registry
    }

    pub fn deletions(&self) -> &Arc<DeletionRequestManager> {
        &self.deletions
    }

    pub fn workflow(&self) -> &Arc<DataSubjectRequestWorkflow> {
        &self.workflow
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }
}
