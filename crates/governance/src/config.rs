/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Configuration for the data governance engine

use serde::{Deserialize, Serialize};

/// Configuration for the data governance engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Statutory deadline in days for completing a data subject request
    pub sla_days: i64,

    /// Maximum execution results retained per scheduled job
    pub job_history_limit: usize,

    /// Seed the registry with the default retention rule catalog
    pub seed_default_rules: bool,

    /// Register the standard recurring jobs at engine construction
    pub register_default_jobs: bool,

    /// Days until the next scheduled review noted on compliance reports
    pub report_review_interval_days: i64,

    /// Reporting window in days for compliance reports
    pub report_window_days: i64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            sla_days: 30,
            job_history_limit: 100,
            seed_default_rules: true,
            register_default_jobs: true,
            report_review_interval_days: 90,
            report_window_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_statutory_deadlines() {
        let config = GovernanceConfig::default();
        assert_eq!(config.sla_days, 30);
        assert_eq!(config.job_history_limit, 100);
    }
}
