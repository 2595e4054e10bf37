/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Metrics snapshots for the governance engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time metrics across all engine components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceMetrics {
    pub retention: RetentionMetrics,
    pub deletion: DeletionMetrics,
    pub privacy: PrivacyMetrics,
    pub scheduler: SchedulerMetrics,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// Retention registry metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionMetrics {
    pub total_rules: usize,
    pub auto_delete_rules: usize,
    pub inventory_items: usize,
}

/// Deletion queue metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionMetrics {
    pub requests_by_status: HashMap<String, usize>,
    pub records_deleted_total: u64,
}

/// Data subject rights metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivacyMetrics {
    pub requests_by_type: HashMap<String, usize>,
    pub requests_by_status: HashMap<String, usize>,
    pub outstanding_requests: usize,
    pub consent_withdrawals: usize,
}

/// Scheduler metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub total_jobs: usize,
    pub enabled_jobs: usize,
    pub executions_recorded: usize,
    pub failed_executions: usize,
}
