/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Data subject rights workflow
//!
//! Implements the full GDPR/CCPA rights lifecycle: access, deletion,
//! portability, rectification, objection and restriction of processing.
//! Every request is bound to a statutory completion deadline fixed at
//! submission, passes an identity verification gate before any sensitive
//! processing, and ends in a terminal state; a processing error can
//! never leave a request stuck in `Processing`. Erasure requests are
//! delegated to the deletion request manager with a mandatory legal hold
//! check.

use crate::collaborators::{
    DataExporter, ExportFormat, IdentityVerifier, NotificationKind, NotificationSender,
    VerificationEvidence,
};
use crate::config::GovernanceConfig;
use crate::deletion::{DeletionRequestDraft, DeletionRequestManager, DeletionRequestType};
use crate::error::{GovernanceError, Result};
use crate::retention::RetentionRuleRegistry;
use crate::DataCategoryKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Lifecycle status of a data subject request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectRequestStatus {
    Pending,
    IdentityVerification,
    Processing,
    Completed,
    Rejected,
    Cancelled,
}

impl SubjectRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectRequestStatus::Pending => "pending",
            SubjectRequestStatus::IdentityVerification => "identity_verification",
            SubjectRequestStatus::Processing => "processing",
            SubjectRequestStatus::Completed => "completed",
            SubjectRequestStatus::Rejected => "rejected",
            SubjectRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubjectRequestStatus::Completed
                | SubjectRequestStatus::Rejected
                | SubjectRequestStatus::Cancelled
        )
    }
}

/// Identity verification outcome for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Failed,
}

/// The kind of right being exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectRequestKind {
    Access,
    Deletion,
    Portability,
    Rectification,
    Objection,
    RestrictProcessing,
}

impl SubjectRequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectRequestKind::Access => "access",
            SubjectRequestKind::Deletion => "deletion",
            SubjectRequestKind::Portability => "portability",
            SubjectRequestKind::Rectification => "rectification",
            SubjectRequestKind::Objection => "objection",
            SubjectRequestKind::RestrictProcessing => "restrict_processing",
        }
    }
}

/// Request payload, keyed by the right being exercised
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum RequestDetails {
    Access {
        specific_categories: Option<Vec<DataCategoryKind>>,
    },
    Deletion {
        specific_categories: Option<Vec<DataCategoryKind>>,
    },
    Portability {
        format: ExportFormat,
        include_metadata: bool,
    },
    Rectification {
        fields: HashMap<String, serde_json::Value>,
    },
    Objection {
        reason: String,
    },
    RestrictProcessing {
        reason: String,
    },
}

impl RequestDetails {
    pub fn kind(&self) -> SubjectRequestKind {
        match self {
            RequestDetails::Access { .. } => SubjectRequestKind::Access,
            RequestDetails::Deletion { .. } => SubjectRequestKind::Deletion,
            RequestDetails::Portability { .. } => SubjectRequestKind::Portability,
            RequestDetails::Rectification { .. } => SubjectRequestKind::Rectification,
            RequestDetails::Objection { .. } => SubjectRequestKind::Objection,
            RequestDetails::RestrictProcessing { .. } => SubjectRequestKind::RestrictProcessing,
        }
    }
}

/// Channel used for a communication log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationChannel {
    Email,
    Portal,
}

/// Direction of a communication log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationDirection {
    Inbound,
    Outbound,
}

/// Entry in a request's communication log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationEntry {
    pub date: DateTime<Utc>,
    pub channel: CommunicationChannel,
    pub direction: CommunicationDirection,
    pub content: String,
}

/// What a completed request produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Exported {
        file_name: String,
        format: ExportFormat,
        record_count: usize,
        download_ref: String,
    },
    Deleted {
        records_deleted: u64,
        confirmation_id: String,
    },
    Rectified {
        fields_updated: Vec<String>,
        old_values: HashMap<String, serde_json::Value>,
        new_values: HashMap<String, serde_json::Value>,
    },
    ObjectionUpheld {
        marketing_consents_withdrawn: usize,
        continued_processing: String,
    },
    Restricted,
}

/// Completion details attached to a finished request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionData {
    pub completed_date: DateTime<Utc>,
    pub outcome: CompletionOutcome,
}

/// A data subject rights request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSubjectRequest {
    pub id: uuid::Uuid,
    pub details: RequestDetails,
    pub data_subject_id: String,
    pub data_subject_email: String,
    pub tenant_id: Option<String>,
    pub request_date: DateTime<Utc>,
    /// Fixed at submission; never extended by automatic logic
    pub target_completion_date: DateTime<Utc>,
    pub status: SubjectRequestStatus,
    pub verification_status: VerificationStatus,
    pub completion_data: Option<CompletionData>,
    pub communication_log: Vec<CommunicationEntry>,
    pub processing_notes: Vec<String>,
}

impl DataSubjectRequest {
    pub fn kind(&self) -> SubjectRequestKind {
        self.details.kind()
    }

    /// Whether the statutory deadline has passed while the request is
    /// still open
    pub fn is_sla_breached(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now > self.target_completion_date
    }
}

/// Input for submitting a data subject request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectRequestSubmission {
    pub details: RequestDetails,
    pub data_subject_id: String,
    pub data_subject_email: String,
    pub tenant_id: Option<String>,
}

/// Consent categories tracked per data subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    Marketing,
    Analytics,
    Functional,
    Performance,
    ThirdPartySharing,
}

/// Status of a consent record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    Granted,
    Withdrawn,
    Expired,
    Pending,
}

/// A recorded consent decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub id: uuid::Uuid,
    pub data_subject_id: String,
    pub tenant_id: Option<String>,
    pub consent_kind: ConsentKind,
    pub status: ConsentStatus,
    pub consent_date: DateTime<Utc>,
    pub withdrawal_date: Option<DateTime<Utc>>,
}

/// Workflow owning data subject requests, consent records and the
/// restricted-processing set
pub struct DataSubjectRequestWorkflow {
    config: GovernanceConfig,
    registry: Arc<RetentionRuleRegistry>,
    deletions: Arc<DeletionRequestManager>,
    verifier: Arc<dyn IdentityVerifier>,
    notifier: Arc<dyn NotificationSender>,
    exporter: Arc<dyn DataExporter>,
    requests: Arc<RwLock<HashMap<uuid::Uuid, DataSubjectRequest>>>,
    consents: Arc<RwLock<HashMap<uuid::Uuid, ConsentRecord>>>,
    restricted: Arc<RwLock<HashSet<String>>>,
    /// Known attribute values per subject; the in-core stand-in for the
    /// records the rectification and portability routines operate on
    profiles: Arc<RwLock<HashMap<String, serde_json::Map<String, serde_json::Value>>>>,
}

impl DataSubjectRequestWorkflow {
    pub fn new(
        config: GovernanceConfig,
        registry: Arc<RetentionRuleRegistry>,
        deletions: Arc<DeletionRequestManager>,
        verifier: Arc<dyn IdentityVerifier>,
        notifier: Arc<dyn NotificationSender>,
        exporter: Arc<dyn DataExporter>,
    ) -> Self {
        Self {
            config,
            registry,
            deletions,
            verifier,
            notifier,
            exporter,
            requests: Arc::new(RwLock::new(HashMap::new())),
            consents: Arc::new(RwLock::new(HashMap::new())),
            restricted: Arc::new(RwLock::new(HashSet::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Submit a data subject request
    ///
    /// The statutory completion deadline is fixed here and the
    /// acknowledgment is logged within the same call.
    pub async fn submit(&self, submission: SubjectRequestSubmission) -> Result<DataSubjectRequest> {
        let now = Utc::now();
        let mut request = DataSubjectRequest {
            id: uuid::Uuid::new_v4(),
            details: submission.details,
            data_subject_id: submission.data_subject_id,
            data_subject_email: submission.data_subject_email,
            tenant_id: submission.tenant_id,
            request_date: now,
            target_completion_date: now + Duration::days(self.config.sla_days),
            status: SubjectRequestStatus::IdentityVerification,
            verification_status: VerificationStatus::Pending,
            completion_data: None,
            communication_log: vec![CommunicationEntry {
                date: now,
                channel: CommunicationChannel::Portal,
                direction: CommunicationDirection::Inbound,
                content: "Data subject request submitted".into(),
            }],
            processing_notes: vec![format!("Request submitted at {}", now.to_rfc3339())],
        };
        request.communication_log.push(CommunicationEntry {
            date: now,
            channel: CommunicationChannel::Email,
            direction: CommunicationDirection::Outbound,
            content: format!(
                "Acknowledgment sent to {}",
                request.data_subject_email
            ),
        });

        info!(
            request_id = %request.id,
            kind = request.kind().as_str(),
            subject = %request.data_subject_id,
            "Data subject request submitted"
        );

        self.notify(&request, NotificationKind::Acknowledgment).await;
        self.requests.write().await.insert(request.id, request.clone());
        Ok(request)
    }

    /// Verify the requester's identity
    ///
    /// A failed verification always rejects the request; a successful one
    /// moves it to `Processing` and, for the read-only access and
    /// portability rights, continues straight into processing.
    pub async fn verify_identity(
        &self,
        id: uuid::Uuid,
        evidence: &VerificationEvidence,
    ) -> Result<bool> {
        let kind = {
            let requests = self.requests.read().await;
            let request = requests
                .get(&id)
                .ok_or_else(|| GovernanceError::NotFound(format!("subject request {id}")))?;
            if request.status.is_terminal() {
                return Err(GovernanceError::InvalidTransition(format!(
                    "subject request {id} is {:?}",
                    request.status
                )));
            }
            request.kind()
        };

        let verified = match self.verifier.verify(evidence).await {
            Ok(verified) => verified,
            Err(err) => {
                warn!(request_id = %id, error = %err, "Identity verification backend failed");
                false
            }
        };

        {
            let mut requests = self.requests.write().await;
            let request = requests
                .get_mut(&id)
                .ok_or_else(|| GovernanceError::NotFound(format!("subject request {id}")))?;
            if verified {
                request.verification_status = VerificationStatus::Verified;
                request.status = SubjectRequestStatus::Processing;
                request
                    .processing_notes
                    .push(format!("Identity verified at {}", Utc::now().to_rfc3339()));
            } else {
                request.verification_status = VerificationStatus::Failed;
                request.status = SubjectRequestStatus::Rejected;
                request.processing_notes.push(format!(
                    "Identity verification failed at {}",
                    Utc::now().to_rfc3339()
                ));
            }
        }

        let request = self.get(id).await?;
        self.notify(&request, NotificationKind::StatusUpdate).await;

        if verified
            && matches!(
                kind,
                SubjectRequestKind::Access | SubjectRequestKind::Portability
            )
        {
            // Low-risk, read-only rights continue without a separate trigger
            self.process(id).await?;
        }

        Ok(verified)
    }

    /// Process a verified request, dispatching on the right being
    /// exercised
    ///
    /// Returns `Ok(true)` when the request completed and `Ok(false)` when
    /// it was rejected. Unexpected errors reject the request rather than
    /// leaving it in `Processing`.
    pub async fn process(&self, id: uuid::Uuid) -> Result<bool> {
        let request = {
            let requests = self.requests.read().await;
            let request = requests
                .get(&id)
                .ok_or_else(|| GovernanceError::NotFound(format!("subject request {id}")))?;
            if request.verification_status != VerificationStatus::Verified {
                return Err(GovernanceError::VerificationFailed(format!(
                    "subject request {id} has not passed identity verification"
                )));
            }
            if request.status.is_terminal() {
                return Err(GovernanceError::InvalidTransition(format!(
                    "subject request {id} is {:?}",
                    request.status
                )));
            }
            request.clone()
        };

        let outcome = match &request.details {
            RequestDetails::Access { specific_categories } => {
                self.process_access(&request, specific_categories.as_deref()).await
            }
            RequestDetails::Deletion { specific_categories } => {
                self.process_deletion(&request, specific_categories.as_deref()).await
            }
            RequestDetails::Portability {
                format,
                include_metadata,
            } => self.process_portability(&request, *format, *include_metadata).await,
            RequestDetails::Rectification { fields } => {
                self.process_rectification(&request, fields).await
            }
            RequestDetails::Objection { reason } => {
                self.process_objection(&request, reason).await
            }
            RequestDetails::RestrictProcessing { reason } => {
                self.process_restriction(&request, reason).await
            }
        };

        match outcome {
            Ok(outcome) => {
                let now = Utc::now();
                {
                    let mut requests = self.requests.write().await;
                    if let Some(request) = requests.get_mut(&id) {
                        request.status = SubjectRequestStatus::Completed;
                        request.completion_data = Some(CompletionData {
                            completed_date: now,
                            outcome,
                        });
                        request.communication_log.push(CommunicationEntry {
                            date: now,
                            channel: CommunicationChannel::Email,
                            direction: CommunicationDirection::Outbound,
                            content: "Request completion notification sent".into(),
                        });
                    }
                }
                let request = self.get(id).await?;
                info!(request_id = %id, kind = request.kind().as_str(), "Subject request completed");
                self.notify(&request, NotificationKind::Completion).await;
                Ok(true)
            }
            Err(err) => {
                let note = match &err {
                    GovernanceError::LegalHoldBlocked(_) => {
                        "Deletion request refused: possibly subject to a legal hold".to_string()
                    }
                    other => format!("Request processing failed: {other}"),
                };
                {
                    let mut requests = self.requests.write().await;
                    if let Some(request) = requests.get_mut(&id) {
                        request.status = SubjectRequestStatus::Rejected;
                        request.processing_notes.push(note.clone());
                        request.communication_log.push(CommunicationEntry {
                            date: Utc::now(),
                            channel: CommunicationChannel::Email,
                            direction: CommunicationDirection::Outbound,
                            content: note,
                        });
                    }
                }
                let request = self.get(id).await?;
                warn!(request_id = %id, error = %err, "Subject request rejected");
                self.notify(&request, NotificationKind::Rejection).await;
                Ok(false)
            }
        }
    }

    /// Cancel a request from any non-terminal state
    pub async fn cancel(&self, id: uuid::Uuid) -> Result<()> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("subject request {id}")))?;
        if request.status.is_terminal() {
            return Err(GovernanceError::InvalidTransition(format!(
                "subject request {id} is {:?}",
                request.status
            )));
        }
        request.status = SubjectRequestStatus::Cancelled;
        info!(request_id = %id, "Subject request cancelled");
        Ok(())
    }

    pub async fn get(&self, id: uuid::Uuid) -> Result<DataSubjectRequest> {
        self.requests
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::NotFound(format!("subject request {id}")))
    }

    /// List subject requests, newest first
    pub async fn list(
        &self,
        tenant_id: Option<&str>,
        status: Option<SubjectRequestStatus>,
    ) -> Vec<DataSubjectRequest> {
        let mut requests: Vec<DataSubjectRequest> = self
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

    /// Advance every verified request still awaiting processing
    ///
    /// Invoked by the privacy review and weekly compliance jobs. Returns
    /// how many requests were advanced.
    pub async fn advance_pending(&self) -> usize {
        let ids: Vec<uuid::Uuid> = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| {
                request.status == SubjectRequestStatus::Processing
                    && request.verification_status == VerificationStatus::Verified
            })
            .map(|request| request.id)
            .collect();

        let mut advanced = 0;
        for id in ids {
            match self.process(id).await {
                Ok(_) => advanced += 1,
                Err(err) => warn!(request_id = %id, error = %err, "Bulk advance skipped request"),
            }
        }
        advanced
    }

    /// Record a granted consent
    pub async fn record_consent(
        &self,
        data_subject_id: &str,
        tenant_id: Option<&str>,
        consent_kind: ConsentKind,
    ) -> ConsentRecord {
        let record = ConsentRecord {
            id: uuid::Uuid::new_v4(),
            data_subject_id: data_subject_id.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            consent_kind,
            status: ConsentStatus::Granted,
            consent_date: Utc::now(),
            withdrawal_date: None,
        };
        self.consents.write().await.insert(record.id, record.clone());
        record
    }

    /// Withdraw every granted consent of a kind for a subject, returning
    /// how many records were withdrawn
    pub async fn withdraw_consent(&self, data_subject_id: &str, kind: ConsentKind) -> usize {
        let mut consents = self.consents.write().await;
        let mut withdrawn = 0;
        for record in consents.values_mut() {
            if record.data_subject_id == data_subject_id
                && record.consent_kind == kind
                && record.status == ConsentStatus::Granted
            {
                record.status = ConsentStatus::Withdrawn;
                record.withdrawal_date = Some(Utc::now());
                withdrawn += 1;
            }
        }
        if withdrawn > 0 {
            info!(subject = %data_subject_id, kind = ?kind, withdrawn, "Consent withdrawn");
        }
        withdrawn
    }

    pub async fn consent_status(&self, data_subject_id: &str) -> Vec<ConsentRecord> {
        self.consents
            .read()
            .await
            .values()
            .filter(|record| record.data_subject_id == data_subject_id)
            .cloned()
            .collect()
    }

    pub async fn consent_withdrawal_count(&self) -> usize {
        self.consents
            .read()
            .await
            .values()
            .filter(|record| record.status == ConsentStatus::Withdrawn)
            .count()
    }

    /// Whether a subject is flagged for restricted processing
    pub async fn is_restricted(&self, data_subject_id: &str) -> bool {
        self.restricted.read().await.contains(data_subject_id)
    }

    /// Record known attribute values for a subject
    ///
    /// Feeds the access, portability and rectification routines.
    pub async fn upsert_profile(
        &self,
        data_subject_id: &str,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) {
        self.profiles
            .write()
            .await
            .entry(data_subject_id.to_string())
            .or_default()
            .extend(attributes);
    }

    async fn process_access(
        &self,
        request: &DataSubjectRequest,
        categories: Option<&[DataCategoryKind]>,
    ) -> Result<CompletionOutcome> {
        let rules = self.registry.list_rules(request.tenant_id.as_deref()).await;
        let rules: Vec<_> = rules
            .into_iter()
            .filter(|rule| match categories {
                Some(categories) => categories.contains(&rule.data_category),
                None => true,
            })
            .collect();
        let profile = self
            .profiles
            .read()
            .await
            .get(&request.data_subject_id)
            .cloned()
            .unwrap_or_default();
        let record_count = profile.len();

        let report = json!({
            "data_subject": {
                "id": request.data_subject_id,
                "email": request.data_subject_email,
            },
            "data_categories": rules.iter().map(|r| &r.category).collect::<Vec<_>>(),
            "legal_bases": rules.iter().map(|r| &r.legal_basis).collect::<Vec<_>>(),
            "retention_periods_days": rules
                .iter()
                .map(|r| r.retention_period_days)
                .collect::<Vec<_>>(),
            "records": profile,
        });

        self.exporter
            .serialize(&report, ExportFormat::Json)
            .await?;

        Ok(CompletionOutcome::Exported {
            file_name: format!("data_access_report_{}.json", request.id.simple()),
            format: ExportFormat::Json,
            record_count,
            download_ref: format!("/privacy/download/{}", request.id),
        })
    }

    async fn process_deletion(
        &self,
        request: &DataSubjectRequest,
        categories: Option<&[DataCategoryKind]>,
    ) -> Result<CompletionOutcome> {
        // Erasure always runs with the legal hold gate armed; the manager
        // refuses to proceed without an explicit clearance.
        let deletion = self
            .deletions
            .submit(DeletionRequestDraft {
                request_type: DeletionRequestType::SubjectRequest,
                data_subject_id: Some(request.data_subject_id.clone()),
                tenant_id: request.tenant_id.clone(),
                data_categories: categories.map(<[_]>::to_vec).unwrap_or_else(|| {
                    vec![DataCategoryKind::Personal, DataCategoryKind::Operational]
                }),
                target_deletion_date: Utc::now(),
                verification_required: false,
                legal_hold_check: true,
                source_rule_id: None,
                notes: Some(format!("Erasure for subject request {}", request.id)),
            })
            .await?;

        if self.deletions.process(deletion.id).await? {
            let confirmation = self
                .deletions
                .get(deletion.id)
                .await?
                .deletion_confirmation
                .ok_or_else(|| {
                    GovernanceError::Collaborator(
                        "completed deletion is missing its confirmation".into(),
                    )
                })?;
            Ok(CompletionOutcome::Deleted {
                records_deleted: confirmation.deleted_record_count,
                confirmation_id: confirmation.confirmation_id,
            })
        } else {
            Err(GovernanceError::Collaborator(
                "physical deletion backend reported failure".into(),
            ))
        }
    }

    async fn process_portability(
        &self,
        request: &DataSubjectRequest,
        format: ExportFormat,
        include_metadata: bool,
    ) -> Result<CompletionOutcome> {
        let profile = self
            .profiles
            .read()
            .await
            .get(&request.data_subject_id)
            .cloned()
            .unwrap_or_default();
        let consents = self.consent_status(&request.data_subject_id).await;
        let record_count = profile.len() + consents.len();

        let mut export = json!({
            "records": profile,
            "consents": consents,
        });
        if include_metadata {
            export["metadata"] = json!({
                "export_date": Utc::now(),
                "data_subject": request.data_subject_id,
                "tenant": request.tenant_id,
            });
        }

        self.exporter.serialize(&export, format).await?;

        Ok(CompletionOutcome::Exported {
            file_name: format!("data_export_{}.{}", request.id.simple(), format.extension()),
            format,
            record_count,
            download_ref: format!("/privacy/download/{}", request.id),
        })
    }

    async fn process_rectification(
        &self,
        request: &DataSubjectRequest,
        fields: &HashMap<String, serde_json::Value>,
    ) -> Result<CompletionOutcome> {
        if fields.is_empty() {
            return Err(GovernanceError::Validation(
                "rectification request contains no fields to update".into(),
            ));
        }

        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(request.data_subject_id.clone())
            .or_default();

        let mut old_values = HashMap::new();
        for (field, value) in fields {
            if let Some(old) = profile.insert(field.clone(), value.clone()) {
                old_values.insert(field.clone(), old);
            }
        }

        Ok(CompletionOutcome::Rectified {
            fields_updated: fields.keys().cloned().collect(),
            old_values,
            new_values: fields.clone(),
        })
    }

    async fn process_objection(
        &self,
        request: &DataSubjectRequest,
        reason: &str,
    ) -> Result<CompletionOutcome> {
        // Direct marketing stops immediately and unconditionally; the
        // legitimate interest evaluation only decides what else continues.
        let withdrawn = self
            .withdraw_consent(&request.data_subject_id, ConsentKind::Marketing)
            .await;

        let rules = self.registry.list_rules(request.tenant_id.as_deref()).await;
        let legal_obligation = rules.iter().any(|rule| {
            matches!(
                rule.data_category,
                DataCategoryKind::Compliance | DataCategoryKind::Financial
            )
        });
        let continued_processing = if legal_obligation {
            "Retention mandated by legal obligation continues; direct marketing ceased"
        } else {
            "No overriding legitimate interest; processing ceased"
        };

        info!(
            request_id = %request.id,
            reason,
            withdrawn,
            "Objection processed"
        );

        Ok(CompletionOutcome::ObjectionUpheld {
            marketing_consents_withdrawn: withdrawn,
            continued_processing: continued_processing.to_string(),
        })
    }

    async fn process_restriction(
        &self,
        request: &DataSubjectRequest,
        reason: &str,
    ) -> Result<CompletionOutcome> {
        self.restricted
            .write()
            .await
            .insert(request.data_subject_id.clone());
        info!(request_id = %request.id, reason, "Processing restricted for subject");
        Ok(CompletionOutcome::Restricted)
    }

    /// Fire-and-forget notification; failures are logged, never
    /// propagated into request state
    async fn notify(&self, request: &DataSubjectRequest, template: NotificationKind) {
        let payload = json!({
            "request_id": request.id,
            "request_type": request.kind().as_str(),
            "status": request.status,
        });
        if let Err(err) = self
            .notifier
            .notify(&request.data_subject_email, template, &payload)
            .await
        {
            warn!(
                request_id = %request.id,
                error = %err,
                "Notification delivery failed"
            );
        }
    }
}
