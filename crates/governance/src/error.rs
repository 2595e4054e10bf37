/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Error types for data governance

use thiserror::Error;
use uuid::Uuid;

/// Result type for data governance operations
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Errors that can occur during data governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Malformed input, e.g. a non-positive retention period
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown entity id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Deletion attempted without an explicit legal hold clearance
    #[error("Deletion request {0} is blocked by a legal hold check")]
    LegalHoldBlocked(Uuid),

    /// Identity verification rejected the supplied evidence
    #[error("Identity verification failed: {0}")]
    VerificationFailed(String),

    /// A deletion, verification, export or notification backend failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Operation is not valid for the entity's current status
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// A second execution of the same job was requested while one is running
    #[error("Job {0} is already executing")]
    JobBusy(Uuid),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GovernanceError {
    /// Whether the error represents a transient collaborator failure that a
    /// scheduled job may retry on its next natural run.
    pub fn is_transient(&self) -> bool {
        matches!(self, GovernanceError::Collaborator(_))
    }
}
