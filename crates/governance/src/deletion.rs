/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Deletion request manager
//!
//! Advances deletion requests through `Pending -> InProgress ->
//! {Completed | Failed}` while enforcing the verification and legal hold
//! gates. A request flagged for a legal hold check is never processed
//! without an explicit hold clearance, regardless of its verification
//! flag. Failed requests are never retried automatically; re-submission
//! is the caller's decision, since retrying a physical deletion risks
//! double counting.

use crate::collaborators::DeletionBackend;
use crate::error::{GovernanceError, Result};
use crate::retention::RetentionRuleRegistry;
use crate::DataCategoryKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Origin of a deletion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionRequestType {
    SubjectRequest,
    RetentionExpiry,
    TenantRequest,
    LegalHoldRelease,
}

/// Lifecycle status of a deletion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl DeletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionStatus::Pending => "pending",
            DeletionStatus::InProgress => "in_progress",
            DeletionStatus::Completed => "completed",
            DeletionStatus::Failed => "failed",
            DeletionStatus::Cancelled => "cancelled",
        }
    }
}

/// Confirmation attached to a completed deletion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionConfirmation {
    pub deleted_record_count: u64,
    pub deletion_date: DateTime<Utc>,
    pub confirmation_id: String,
}

/// Input for submitting a deletion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequestDraft {
    pub request_type: DeletionRequestType,
    pub data_subject_id: Option<String>,
    pub tenant_id: Option<String>,
    pub data_categories: Vec<DataCategoryKind>,
    pub target_deletion_date: DateTime<Utc>,
    pub verification_required: bool,
    pub legal_hold_check: bool,
    /// Retention rule that produced this draft, when retention initiated
    pub source_rule_id: Option<uuid::Uuid>,
    pub notes: Option<String>,
}

/// A deletion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub id: uuid::Uuid,
    pub request_type: DeletionRequestType,
    pub data_subject_id: Option<String>,
    pub tenant_id: Option<String>,
    pub data_categories: Vec<DataCategoryKind>,
    pub request_date: DateTime<Utc>,
    pub target_deletion_date: DateTime<Utc>,
    pub status: DeletionStatus,
    pub verification_required: bool,
    pub legal_hold_check: bool,
    /// Set by an explicit administrative clearance; required before a
    /// hold-checked request may be processed.
    pub hold_cleared: bool,
    pub source_rule_id: Option<uuid::Uuid>,
    pub deletion_confirmation: Option<DeletionConfirmation>,
    pub error: Option<String>,
    pub audit_notes: Vec<String>,
}

/// Manager owning the deletion request queue
pub struct DeletionRequestManager {
    backend: Arc<dyn DeletionBackend>,
    registry: Arc<RetentionRuleRegistry>,
    requests: Arc<RwLock<HashMap<uuid::Uuid, DeletionRequest>>>,
}

impl DeletionRequestManager {
    pub fn new(backend: Arc<dyn DeletionBackend>, registry: Arc<RetentionRuleRegistry>) -> Self {
        Self {
            backend,
            registry,
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submit a deletion request
    ///
    /// Requests with neither a verification requirement nor a legal hold
    /// check are processed immediately; gated requests stay pending until
    /// an explicit trigger.
    pub async fn submit(&self, draft: DeletionRequestDraft) -> Result<DeletionRequest> {
        let request = DeletionRequest {
            id: uuid::Uuid::new_v4(),
            request_type: draft.request_type,
            data_subject_id: draft.data_subject_id,
            tenant_id: draft.tenant_id,
            data_categories: draft.data_categories,
            request_date: Utc::now(),
            target_deletion_date: draft.target_deletion_date,
            status: DeletionStatus::Pending,
            verification_required: draft.verification_required,
            legal_hold_check: draft.legal_hold_check,
            hold_cleared: false,
            source_rule_id: draft.source_rule_id,
            deletion_confirmation: None,
            error: None,
            audit_notes: draft.notes.into_iter().collect(),
        };
        let id = request.id;

        info!(
            request_id = %id,
            request_type = ?request.request_type,
            verification_required = request.verification_required,
            legal_hold_check = request.legal_hold_check,
            "Submitted deletion request"
        );

        let auto_process = !request.verification_required && !request.legal_hold_check;
        self.requests.write().await.insert(id, request);

        if auto_process {
            // Failures are captured on the request itself
            if let Err(err) = self.process(id).await {
                warn!(request_id = %id, error = %err, "Immediate processing refused");
            }
        }

        self.get(id).await
    }

    /// Process a pending deletion request
    ///
    /// Returns `Ok(true)` when the physical deletion succeeded and the
    /// request completed, `Ok(false)` when the backend failed and the
    /// request was marked failed. A hold-checked request without an
    /// explicit clearance is refused with `LegalHoldBlocked` and remains
    /// pending.
    pub async fn process(&self, id: uuid::Uuid) -> Result<bool> {
        let (categories, subject, tenant) = {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(&id)
                .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))?;

            if request.status != DeletionStatus::Pending {
                return Err(GovernanceError::InvalidTransition(format!(
                    "deletion request {id} is {:?}, expected pending",
                    request.status
                )));
            }
            if request.legal_hold_check && !request.hold_cleared {
                warn!(request_id = %id, "Refusing to process deletion under legal hold check");
                return Err(GovernanceError::LegalHoldBlocked(id));
            }

            request.status = DeletionStatus::InProgress;
            (
                request.data_categories.clone(),
                request.data_subject_id.clone(),
                request.tenant_id.clone(),
            )
        };

        let outcome = self
            .backend
            .delete_data(&categories, subject.as_deref(), tenant.as_deref())
            .await;

        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))?;

        match outcome {
            Ok(outcome) => {
                request.status = DeletionStatus::Completed;
                request.deletion_confirmation = Some(DeletionConfirmation {
                    deleted_record_count: outcome.deleted_record_count,
                    deletion_date: Utc::now(),
                    confirmation_id: format!("DEL-{}", id.simple()),
                });
                let source_rule_id = request.source_rule_id;
                drop(requests);

                if let Some(rule_id) = source_rule_id {
                    self.registry.mark_rule_referenced(rule_id).await;
                }

                info!(
                    request_id = %id,
                    deleted_records = outcome.deleted_record_count,
                    "Deletion request completed"
                );
                Ok(true)
            }
            Err(err) => {
                request.status = DeletionStatus::Failed;
                request.error = Some(err.to_string());
                error!(request_id = %id, error = %err, "Deletion request failed");
                Ok(false)
            }
        }
    }

    /// Record an explicit legal hold clearance for a request
    pub async fn clear_legal_hold(&self, id: uuid::Uuid) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))?;

        request.hold_cleared = true;
        request
            .audit_notes
            .push(format!("Legal hold cleared at {}", Utc::now().to_rfc3339()));
        info!(request_id = %id, "Legal hold cleared");
        Ok(())
    }

    /// Cancel a request that has not started processing
    pub async fn cancel(&self, id: uuid::Uuid) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))?;

        if request.status != DeletionStatus::Pending {
            return Err(GovernanceError::InvalidTransition(format!(
                "deletion request {id} is {:?} and can no longer be cancelled",
                request.status
            )));
        }
        request.status = DeletionStatus::Cancelled;
        info!(request_id = %id, "Deletion request cancelled");
        Ok(())
    }

    /// Append an audit annotation; permitted in any status
    pub async fn annotate(&self, id: uuid::Uuid, note: String) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))?;
        request.audit_notes.push(note);
        Ok(())
    }

    pub async fn get(&self, id: uuid::Uuid) -> Result<DeletionRequest> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::NotFound(format!("deletion request {id}")))
    }

    /// List deletion requests, newest first
    pub async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<DeletionStatus>,
    ) -> Vec<DeletionRequest> {
        let mut requests: Vec<DeletionRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| match tenant_id {
                Some(tenant) => request.tenant_id.as_deref() == Some(tenant),
                None => true,
            })
            .filter(|request| match status {
                Some(status) => request.status == status,
                None => true,
            })
            .cloned()
            .collect();

        requests.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::DeletionOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingBackend {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl DeletionBackend for CountingBackend {
        async fn delete_data(
            &self,
            _categories: &[DataCategoryKind],
            _data_subject_id: Option<&str>,
            _tenant_id: Option<&str>,
        ) -> Result<DeletionOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GovernanceError::Collaborator("datastore offline".into()))
            } else {
                Ok(DeletionOutcome {
                    deleted_record_count: 42,
                })
            }
        }
    }

    fn manager(backend: Arc<CountingBackend>) -> DeletionRequestManager {
        DeletionRequestManager::new(backend, Arc::new(RetentionRuleRegistry::new()))
    }

    fn draft(legal_hold_check: bool, verification_required: bool) -> DeletionRequestDraft {
        DeletionRequestDraft {
            request_type: DeletionRequestType::SubjectRequest,
            data_subject_id: Some("u1".into()),
            tenant_id: None,
            data_categories: vec![DataCategoryKind::Personal],
            target_deletion_date: Utc::now(),
            verification_required,
            legal_hold_check,
            source_rule_id: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn ungated_requests_process_immediately() {
        let backend = CountingBackend::new(false);
        let manager = manager(backend.clone());

        let request = manager.submit(draft(false, false)).await.unwrap();
        assert_eq!(request.status, DeletionStatus::Completed);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let confirmation = request.deletion_confirmation.unwrap();
        assert_eq!(confirmation.deleted_record_count, 42);
        assert_eq!(
            confirmation.confirmation_id,
            format!("DEL-{}", request.id.simple())
        );
    }

    #[tokio::test]
    async fn legal_hold_blocks_processing_until_cleared() {
        let backend = CountingBackend::new(false);
        let manager = manager(backend.clone());

        let request = manager.submit(draft(true, false)).await.unwrap();
        assert_eq!(request.status, DeletionStatus::Pending);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let result = manager.process(request.id).await;
        assert!(matches!(result, Err(GovernanceError::LegalHoldBlocked(_))));
        assert_eq!(
            manager.get(request.id).await.unwrap().status,
            DeletionStatus::Pending
        );

        manager.clear_legal_hold(request.id).await.unwrap();
        assert!(manager.process(request.id).await.unwrap());
        assert_eq!(
            manager.get(request.id).await.unwrap().status,
            DeletionStatus::Completed
        );
    }

    #[tokio::test]
    async fn backend_failure_marks_failed_without_retry() {
        let backend = CountingBackend::new(true);
        let manager = manager(backend.clone());

        let request = manager.submit(draft(false, false)).await.unwrap();
        assert_eq!(request.status, DeletionStatus::Failed);
        assert!(request.error.unwrap().contains("datastore offline"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        // A failed request cannot be re-processed in place
        let result = manager.process(request.id).await;
        assert!(matches!(result, Err(GovernanceError::InvalidTransition(_))));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_is_only_valid_while_pending() {
        let backend = CountingBackend::new(false);
        let manager = manager(backend.clone());

        let pending = manager.submit(draft(true, true)).await.unwrap();
        manager.cancel(pending.id).await.unwrap();
        assert_eq!(
            manager.get(pending.id).await.unwrap().status,
            DeletionStatus::Cancelled
        );

        let completed = manager.submit(draft(false, false)).await.unwrap();
        let result = manager.cancel(completed.id).await;
        assert!(matches!(result, Err(GovernanceError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn verification_gate_defers_processing() {
        let backend = CountingBackend::new(false);
        let manager = manager(backend.clone());

        let request = manager.submit(draft(false, true)).await.unwrap();
        assert_eq!(request.status, DeletionStatus::Pending);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        // Explicit trigger runs it, no hold clearance needed
        assert!(manager.process(request.id).await.unwrap());
    }

    #[tokio::test]
    async fn listing_filters_by_status_and_sorts_newest_first() {
        let backend = CountingBackend::new(false);
        let manager = manager(backend.clone());

        manager.submit(draft(false, false)).await.unwrap();
        let held = manager.submit(draft(true, false)).await.unwrap();

        let pending = manager.list(None, Some(DeletionStatus::Pending)).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, held.id);

        let all = manager.list(None, None).await;
        assert_eq!(all.len(), 2);
        assert!(all[0].request_date >= all[1].request_date);
    }
}
