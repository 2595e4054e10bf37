/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! External collaborator contracts
//!
//! The engine never touches a datastore, verification provider, mail
//! transport or export pipeline directly. Each of those concerns is an
//! injected trait object; production implementations live outside this
//! crate and tests supply fakes.

use crate::DataCategoryKind;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome reported by the physical deletion backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub deleted_record_count: u64,
}

/// Evidence supplied by a data subject to prove their identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationEvidence {
    pub method: VerificationMethod,
    pub fields: HashMap<String, String>,
}

/// Supported identity verification methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Email,
    Phone,
    Document,
    MultiFactor,
}

/// Notification templates the engine can request delivery of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Acknowledgment,
    StatusUpdate,
    Completion,
    Rejection,
}

/// Export formats accepted for portability and access reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Xml,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xml => "xml",
        }
    }
}

/// Physical deletion backend
///
/// Deletes all records in the given categories scoped to an optional data
/// subject and tenant, and reports how many records were removed.
#[async_trait]
pub trait DeletionBackend: Send + Sync {
    async fn delete_data(
        &self,
        categories: &[DataCategoryKind],
        data_subject_id: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Result<DeletionOutcome>;
}

/// Identity verification backend
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, evidence: &VerificationEvidence) -> Result<bool>;
}

/// Notification delivery backend
///
/// Fire and forget: the workflow logs failures and never lets them block a
/// request's state transitions.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify(
        &self,
        subject_email: &str,
        template: NotificationKind,
        payload: &serde_json::Value,
    ) -> Result<()>;
}

/// Structured data export backend
#[async_trait]
pub trait DataExporter: Send + Sync {
    async fn serialize(
        &self,
        records: &serde_json::Value,
        format: ExportFormat,
    ) -> Result<Vec<u8>>;
}

/// The full set of collaborators required to construct the engine
#[derive(Clone)]
pub struct Collaborators {
    pub deletion: Arc<dyn DeletionBackend>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub notifier: Arc<dyn NotificationSender>,
    pub exporter: Arc<dyn DataExporter>,
}
