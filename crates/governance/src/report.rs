/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Compliance report generation
//!
//! Pure aggregation over registry and request state into point-in-time
//! snapshots. No side effects; safe to run concurrently with every
//! other component, since each source is read through its own
//! copy-on-read listing.

use crate::deletion::{DeletionRequestManager, DeletionStatus};
use crate::privacy::{DataSubjectRequestWorkflow, SubjectRequestStatus};
use crate::retention::RetentionRuleRegistry;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Report flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    RetentionCompliance,
    DeletionSummary,
    SubjectRights,
    AuditTrail,
}

/// Aggregated counters in a compliance report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub total_rules: usize,
    pub auto_delete_rules: usize,
    pub inventory_items: usize,
    pub deletion_requests_total: usize,
    pub deletion_requests_completed: usize,
    pub deletion_requests_failed: usize,
    pub deletion_requests_pending: usize,
    pub records_deleted: u64,
    pub subject_requests_total: usize,
    pub subject_requests_by_type: HashMap<String, usize>,
    pub outstanding_requests: usize,
    pub consent_withdrawals: usize,
    /// Share of subject requests completed within the statutory deadline,
    /// 0.0 to 100.0
    pub compliance_score: f64,
}

/// Findings derived from the metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFindings {
    pub compliant: usize,
    pub non_compliant: usize,
    pub requires_attention: usize,
}

/// A point-in-time compliance snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub id: uuid::Uuid,
    pub kind: ReportKind,
    pub generated_date: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub tenant_id: Option<String>,
    pub metrics: ReportMetrics,
    pub findings: ReportFindings,
    /// Open requests past their statutory deadline
    pub sla_breached_requests: Vec<uuid::Uuid>,
    pub recommendations: Vec<String>,
    pub next_review_date: DateTime<Utc>,
}

/// Generator reading from the registry, deletion queue and rights
/// workflow
pub struct ComplianceReportGenerator {
    registry: Arc<RetentionRuleRegistry>,
    deletions: Arc<DeletionRequestManager>,
    workflow: Arc<DataSubjectRequestWorkflow>,
    review_interval_days: i64,
    window_days: i64,
}

impl ComplianceReportGenerator {
    pub fn new(
        registry: Arc<RetentionRuleRegistry>,
        deletions: Arc<DeletionRequestManager>,
        workflow: Arc<DataSubjectRequestWorkflow>,
        review_interval_days: i64,
        window_days: i64,
    ) -> Self {
        Self {
            registry,
            deletions,
            workflow,
            review_interval_days,
            window_days,
        }
    }

    /// Generate a compliance snapshot
    pub async fn generate(&self, kind: ReportKind, tenant_id: Option<&str>) -> ComplianceReport {
        let now = Utc::now();
        debug!(kind = ?kind, tenant = ?tenant_id, "Generating compliance report");

        let rules = self.registry.list_rules(tenant_id).await;
        let inventory = self.registry.list_inventory(tenant_id).await;
        let deletions = self.deletions.list(tenant_id, None).await;
        let subject_requests = self.workflow.list(tenant_id, None).await;

        let deletion_requests_completed = deletions
            .iter()
            .filter(|request| request.status == DeletionStatus::Completed)
            .count();
        let records_deleted = deletions
            .iter()
            .filter_map(|request| request.deletion_confirmation.as_ref())
            .map(|confirmation| confirmation.deleted_record_count)
            .sum();

        let mut subject_requests_by_type = HashMap::new();
        for request in &subject_requests {
            *subject_requests_by_type
                .entry(request.kind().as_str().to_string())
                .or_insert(0) += 1;
        }

        let completed_within_sla = subject_requests
            .iter()
            .filter(|request| request.status == SubjectRequestStatus::Completed)
            .filter(|request| {
                request
                    .completion_data
                    .as_ref()
                    .map(|data| data.completed_date <= request.target_completion_date)
                    .unwrap_or(false)
            })
            .count();
        let compliance_score = if subject_requests.is_empty() {
            100.0
        } else {
            completed_within_sla as f64 / subject_requests.len() as f64 * 100.0
        };

        let outstanding_requests = subject_requests
            .iter()
            .filter(|request| !request.status.is_terminal())
            .count();
        let sla_breached_requests: Vec<uuid::Uuid> = subject_requests
            .iter()
            .filter(|request| request.is_sla_breached(now))
            .map(|request| request.id)
            .collect();

        let metrics = ReportMetrics {
            total_rules: rules.len(),
            auto_delete_rules: rules.iter().filter(|rule| rule.auto_delete).count(),
            inventory_items: inventory.len(),
            deletion_requests_total: deletions.len(),
            deletion_requests_completed,
            deletion_requests_failed: deletions
                .iter()
                .filter(|request| request.status == DeletionStatus::Failed)
                .count(),
            deletion_requests_pending: deletions
                .iter()
                .filter(|request| request.status == DeletionStatus::Pending)
                .count(),
            records_deleted,
            subject_requests_total: subject_requests.len(),
            subject_requests_by_type,
            outstanding_requests,
            consent_withdrawals: self.workflow.consent_withdrawal_count().await,
            compliance_score,
        };

        let findings = ReportFindings {
            compliant: completed_within_sla,
            non_compliant: sla_breached_requests.len(),
            requires_attention: outstanding_requests,
        };

        let mut recommendations =
            vec!["Continue monitoring retention policy compliance".to_string()];
        if metrics.deletion_requests_failed > 0 {
            recommendations.push("Review failed deletion requests for re-submission".to_string());
        }
        if !sla_breached_requests.is_empty() {
            recommendations
                .push("Escalate subject requests past their statutory deadline".to_string());
        }
        if metrics.total_rules > metrics.auto_delete_rules {
            recommendations
                .push("Evaluate enabling auto-deletion for manually managed rules".to_string());
        }

        ComplianceReport {
            id: uuid::Uuid::new_v4(),
            kind,
            generated_date: now,
            period_start: now - Duration::days(self.window_days),
            period_end: now,
            tenant_id: tenant_id.map(str::to_string),
            metrics,
            findings,
            sla_breached_requests,
            recommendations,
            next_review_date: now + Duration::days(self.review_interval_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        DataExporter, DeletionBackend, DeletionOutcome, ExportFormat, IdentityVerifier,
        NotificationKind, NotificationSender, VerificationEvidence, VerificationMethod,
    };
    use crate::config::GovernanceConfig;
    use crate::error::Result;
    use crate::privacy::{RequestDetails, SubjectRequestSubmission};
    use crate::DataCategoryKind;
    use async_trait::async_trait;

    struct OkBackend;

    #[async_trait]
    impl DeletionBackend for OkBackend {
        async fn delete_data(
            &self,
            _categories: &[DataCategoryKind],
            _data_subject_id: Option<&str>,
            _tenant_id: Option<&str>,
        ) -> Result<DeletionOutcome> {
            Ok(DeletionOutcome {
                deleted_record_count: 10,
            })
        }
    }

    struct OkVerifier;

    #[async_trait]
    impl IdentityVerifier for OkVerifier {
        async fn verify(&self, _evidence: &VerificationEvidence) -> Result<bool> {
            Ok(true)
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl NotificationSender for NullNotifier {
        async fn notify(
            &self,
            _subject_email: &str,
            _template: NotificationKind,
            _payload: &serde_json::Value,
        ) -> Result<()> {
            Ok(())
        }
    }

    struct JsonExporter;

    #[async_trait]
    impl DataExporter for JsonExporter {
        async fn serialize(
            &self,
            records: &serde_json::Value,
            _format: ExportFormat,
        ) -> Result<Vec<u8>> {
            Ok(serde_json::to_vec(records)?)
        }
    }

    fn generator() -> (
        ComplianceReportGenerator,
        Arc<DataSubjectRequestWorkflow>,
        Arc<RetentionRuleRegistry>,
    ) {
        let registry = Arc::new(RetentionRuleRegistry::new());
        let deletions = Arc::new(DeletionRequestManager::new(
            Arc::new(OkBackend),
            registry.clone(),
        ));
        let workflow = Arc::new(DataSubjectRequestWorkflow::new(
            GovernanceConfig::default(),
            registry.clone(),
            deletions.clone(),
            Arc::new(OkVerifier),
            Arc::new(NullNotifier),
            Arc::new(JsonExporter),
        ));
        (
            ComplianceReportGenerator::new(registry.clone(), deletions, workflow.clone(), 90, 30),
            workflow,
            registry,
        )
    }

    #[tokio::test]
    async fn empty_state_scores_fully_compliant() {
        let (generator, _, _) = generator();
        let report = generator.generate(ReportKind::RetentionCompliance, None).await;

        assert_eq!(report.metrics.subject_requests_total, 0);
        assert_eq!(report.metrics.compliance_score, 100.0);
        assert!(report.sla_breached_requests.is_empty());
        assert_eq!(
            report.next_review_date - report.generated_date,
            Duration::days(90)
        );
    }

    #[tokio::test]
    async fn completed_access_requests_count_toward_the_score() {
        let (generator, workflow, _) = generator();
        let request = workflow
            .submit(SubjectRequestSubmission {
                details: RequestDetails::Access {
                    specific_categories: None,
                },
                data_subject_id: "u1".into(),
                data_subject_email: "u1@example.com".into(),
                tenant_id: None,
            })
            .await
            .unwrap();
        workflow
            .verify_identity(
                request.id,
                &VerificationEvidence {
                    method: VerificationMethod::Email,
                    fields: Default::default(),
                },
            )
            .await
            .unwrap();

        let report = generator.generate(ReportKind::SubjectRights, None).await;
        assert_eq!(report.metrics.subject_requests_total, 1);
        assert_eq!(report.metrics.compliance_score, 100.0);
        assert_eq!(report.metrics.outstanding_requests, 0);
        assert_eq!(report.metrics.subject_requests_by_type["access"], 1);
        assert_eq!(report.findings.compliant, 1);
    }

    #[tokio::test]
    async fn open_requests_are_outstanding_not_breached_before_deadline() {
        let (generator, workflow, _) = generator();
        workflow
            .submit(SubjectRequestSubmission {
                details: RequestDetails::Deletion {
                    specific_categories: None,
                },
                data_subject_id: "u2".into(),
                data_subject_email: "u2@example.com".into(),
                tenant_id: None,
            })
            .await
            .unwrap();

        let report = generator.generate(ReportKind::SubjectRights, None).await;
        assert_eq!(report.metrics.outstanding_requests, 1);
        assert!(report.sla_breached_requests.is_empty());
        assert_eq!(report.metrics.compliance_score, 0.0);
        assert_eq!(report.findings.requires_attention, 1);
    }
}
