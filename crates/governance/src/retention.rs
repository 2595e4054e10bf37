/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs Ltd <hello@stalw.art>
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Retention rule registry and data inventory
//!
//! Owns the catalog of retention rules (what data, how long, under what
//! legal basis) and the data inventory mapping physical data locations to
//! rules. The registry never deletes anything itself: `sweep_expired`
//! proposes deletion request drafts which the caller submits to the
//! deletion request manager, keeping retention policy separate from
//! deletion execution.

use crate::deletion::{DeletionRequestDraft, DeletionRequestType};
use crate::error::{GovernanceError, Result};
use crate::{DataCategoryKind, RulePriority, SensitivityLevel};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A data retention rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRule {
    pub id: uuid::Uuid,
    pub data_category: DataCategoryKind,
    /// Human readable category label, e.g. "GPS Tracking Data"
    pub category: String,
    pub retention_period_days: i64,
    pub legal_basis: String,
    pub auto_delete: bool,
    pub priority: RulePriority,
    pub tenant_id: Option<String>,
    pub regulatory_reference: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new retention rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionRuleDraft {
    pub data_category: DataCategoryKind,
    pub category: String,
    pub retention_period_days: i64,
    pub legal_basis: String,
    pub auto_delete: bool,
    pub priority: RulePriority,
    pub tenant_id: Option<String>,
    pub regulatory_reference: Option<String>,
    pub description: String,
}

/// Partial update applied to an existing retention rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionRulePatch {
    pub retention_period_days: Option<i64>,
    pub legal_basis: Option<String>,
    pub auto_delete: Option<bool>,
    pub priority: Option<RulePriority>,
    pub regulatory_reference: Option<String>,
    pub description: Option<String>,
}

/// A physical data location mapped to a retention rule
///
/// Inventory items are never removed; a replaced item is marked superseded
/// so the audit trail of where personal data lived stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInventoryItem {
    pub id: uuid::Uuid,
    pub data_category: DataCategoryKind,
    pub category: String,
    pub table_name: String,
    pub column_name: Option<String>,
    pub description: String,
    pub sensitivity: SensitivityLevel,
    pub personal_data_elements: Vec<String>,
    pub retention_rule_id: uuid::Uuid,
    pub encryption_required: bool,
    pub tenant_id: Option<String>,
    pub superseded_by: Option<uuid::Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for onboarding a new data location into the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInventoryDraft {
    pub data_category: DataCategoryKind,
    pub category: String,
    pub table_name: String,
    pub column_name: Option<String>,
    pub description: String,
    pub sensitivity: SensitivityLevel,
    pub personal_data_elements: Vec<String>,
    pub retention_rule_id: uuid::Uuid,
    pub encryption_required: bool,
    pub tenant_id: Option<String>,
}

/// Registry of retention rules and the data inventory
#[derive(Debug)]
pub struct RetentionRuleRegistry {
    rules: Arc<RwLock<HashMap<uuid::Uuid, RetentionRule>>>,
    inventory: Arc<RwLock<HashMap<uuid::Uuid, DataInventoryItem>>>,
    /// Rules referenced by a completed deletion confirmation; frozen for
    /// audit integrity.
    referenced_rules: Arc<RwLock<HashSet<uuid::Uuid>>>,
}

impl RetentionRuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(HashMap::new())),
            inventory: Arc::new(RwLock::new(HashMap::new())),
            referenced_rules: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Register a new retention rule, assigning its id and timestamps
    pub async fn register_rule(&self, draft: RetentionRuleDraft) -> Result<RetentionRule> {
        if draft.retention_period_days <= 0 {
            return Err(GovernanceError::Validation(format!(
                "retention period must be positive, got {} days for '{}'",
                draft.retention_period_days, draft.category
            )));
        }

        let now = Utc::now();
        let rule = RetentionRule {
            id: uuid::Uuid::new_v4(),
            data_category: draft.data_category,
            category: draft.category,
            retention_period_days: draft.retention_period_days,
            legal_basis: draft.legal_basis,
            auto_delete: draft.auto_delete,
            priority: draft.priority,
            tenant_id: draft.tenant_id,
            regulatory_reference: draft.regulatory_reference,
            description: draft.description,
            created_at: now,
            updated_at: now,
        };

        info!(
            rule_id = %rule.id,
            category = %rule.category,
            retention_days = rule.retention_period_days,
            "Registered retention rule"
        );

        self.rules.write().await.insert(rule.id, rule.clone());
        Ok(rule)
    }

    /// Update an existing retention rule
    ///
    /// Rules already referenced by a completed deletion confirmation are
    /// immutable and reject updates.
    pub async fn update_rule(
        &self,
        id: uuid::Uuid,
        patch: RetentionRulePatch,
    ) -> Result<RetentionRule> {
        if self.referenced_rules.read().await.contains(&id) {
            return Err(GovernanceError::Validation(format!(
                "retention rule {id} is referenced by a completed deletion and cannot change"
            )));
        }

        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("retention rule {id}")))?;

        if let Some(days) = patch.retention_period_days {
            if days <= 0 {
                return Err(GovernanceError::Validation(format!(
                    "retention period must be positive, got {days} days"
                )));
            }
            rule.retention_period_days = days;
        }
        if let Some(legal_basis) = patch.legal_basis {
            rule.legal_basis = legal_basis;
        }
        if let Some(auto_delete) = patch.auto_delete {
            rule.auto_delete = auto_delete;
        }
        if let Some(priority) = patch.priority {
            rule.priority = priority;
        }
        if let Some(reference) = patch.regulatory_reference {
            rule.regulatory_reference = Some(reference);
        }
        if let Some(description) = patch.description {
            rule.description = description;
        }
        rule.updated_at = Utc::now();

        Ok(rule.clone())
    }

    pub async fn get_rule(&self, id: uuid::Uuid) -> Result<RetentionRule> {
        self.rules
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::NotFound(format!("retention rule {id}")))
    }

    /// List retention rules
    ///
    /// With a tenant id, returns the global catalog plus that tenant's
    /// overrides; a tenant rule shadows the global rule sharing its
    /// category. Without a tenant id the full catalog is returned.
    pub async fn list_rules(&self, tenant_id: Option<&str>) -> Vec<RetentionRule> {
        let rules = self.rules.read().await;
        match tenant_id {
            None => rules.values().cloned().collect(),
            Some(tenant) => {
                let tenant_rules: Vec<&RetentionRule> = rules
                    .values()
                    .filter(|rule| rule.tenant_id.as_deref() == Some(tenant))
                    .collect();
                let shadowed: HashSet<&str> = tenant_rules
                    .iter()
                    .map(|rule| rule.category.as_str())
                    .collect();

                rules
                    .values()
                    .filter(|rule| {
                        rule.tenant_id.is_none() && !shadowed.contains(rule.category.as_str())
                    })
                    .chain(tenant_rules.into_iter())
                    .cloned()
                    .collect()
            }
        }
    }

    /// Mark a rule as referenced by a completed deletion confirmation
    pub async fn mark_rule_referenced(&self, id: uuid::Uuid) {
        if self.referenced_rules.write().await.insert(id) {
            debug!(rule_id = %id, "Retention rule frozen by completed deletion");
        }
    }

    /// Onboard a new data location into the inventory
    pub async fn add_inventory_item(&self, draft: DataInventoryDraft) -> Result<DataInventoryItem> {
        if !self.rules.read().await.contains_key(&draft.retention_rule_id) {
            return Err(GovernanceError::NotFound(format!(
                "retention rule {}",
                draft.retention_rule_id
            )));
        }

        let item = DataInventoryItem {
            id: uuid::Uuid::new_v4(),
            data_category: draft.data_category,
            category: draft.category,
            table_name: draft.table_name,
            column_name: draft.column_name,
            description: draft.description,
            sensitivity: draft.sensitivity,
            personal_data_elements: draft.personal_data_elements,
            retention_rule_id: draft.retention_rule_id,
            encryption_required: draft.encryption_required,
            tenant_id: draft.tenant_id,
            superseded_by: None,
            created_at: Utc::now(),
        };

        info!(
            item_id = %item.id,
            table = %item.table_name,
            "Added data inventory item"
        );

        self.inventory.write().await.insert(item.id, item.clone());
        Ok(item)
    }

    /// Replace an inventory item, keeping the old one marked as superseded
    pub async fn supersede_inventory_item(
        &self,
        old_id: uuid::Uuid,
        draft: DataInventoryDraft,
    ) -> Result<DataInventoryItem> {
        let replacement = self.add_inventory_item(draft).await?;

        let mut inventory = self.inventory.write().await;
        let old = inventory
            .get_mut(&old_id)
            .ok_or_else(|| GovernanceError::NotFound(format!("inventory item {old_id}")))?;
        old.superseded_by = Some(replacement.id);

        Ok(replacement)
    }

    /// List inventory items, excluding superseded entries
    pub async fn list_inventory(&self, tenant_id: Option<&str>) -> Vec<DataInventoryItem> {
        self.inventory
            .read()
            .await
            .values()
            .filter(|item| item.superseded_by.is_none())
            .filter(|item| match tenant_id {
                Some(tenant) => {
                    item.tenant_id.is_none() || item.tenant_id.as_deref() == Some(tenant)
                }
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Propose deletion request drafts for every auto-delete rule whose
    /// retention window has passed
    ///
    /// Drafts for critical rules require verification; drafts touching
    /// financial or compliance data always carry a legal hold check. No
    /// data is deleted here.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<DeletionRequestDraft> {
        let rules = self.rules.read().await;
        let mut drafts = Vec::new();

        for rule in rules.values() {
            if !rule.auto_delete {
                continue;
            }
            let expiration_cutoff = now - Duration::days(rule.retention_period_days);
            if rule.created_at > expiration_cutoff {
                continue;
            }

            drafts.push(DeletionRequestDraft {
                request_type: DeletionRequestType::RetentionExpiry,
                data_subject_id: None,
                tenant_id: rule.tenant_id.clone(),
                data_categories: vec![rule.data_category],
                target_deletion_date: now,
                verification_required: rule.priority == RulePriority::Critical,
                legal_hold_check: matches!(
                    rule.data_category,
                    DataCategoryKind::Financial | DataCategoryKind::Compliance
                ),
                source_rule_id: Some(rule.id),
                notes: Some(format!(
                    "Automated deletion based on retention rule '{}' ({})",
                    rule.category, rule.id
                )),
            });
        }

        if !drafts.is_empty() {
            info!(count = drafts.len(), "Retention sweep proposed deletion drafts");
        } else {
            debug!("Retention sweep found no expired data");
        }

        drafts
    }

    /// Seed the registry with the default retention rule catalog
    pub async fn seed_default_rules(&self) -> Result<()> {
        for draft in default_rule_catalog() {
            if let Err(err) = self.register_rule(draft).await {
                warn!(error = %err, "Skipping invalid default retention rule");
            }
        }
        Ok(())
    }
}

impl Default for RetentionRuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Default retention catalog covering each data category kind
fn default_rule_catalog() -> Vec<RetentionRuleDraft> {
    vec![
        RetentionRuleDraft {
            data_category: DataCategoryKind::Personal,
            category: "User Account Data".into(),
            retention_period_days: 1095,
            legal_basis: "Legitimate interest".into(),
            auto_delete: true,
            priority: RulePriority::High,
            tenant_id: None,
            regulatory_reference: Some("GDPR Article 17, CCPA 1798.105".into()),
            description: "Account profiles, preferences and settings".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::Personal,
            category: "Customer Contact Information".into(),
            retention_period_days: 2555,
            legal_basis: "Business relationship".into(),
            auto_delete: true,
            priority: RulePriority::High,
            tenant_id: None,
            regulatory_reference: Some("Business records retention".into()),
            description: "Customer contact details and communication history".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::Financial,
            category: "Banking/ACH Records".into(),
            retention_period_days: 2555,
            legal_basis: "SOX compliance".into(),
            auto_delete: true,
            priority: RulePriority::Critical,
            tenant_id: None,
            regulatory_reference: Some("Sarbanes-Oxley Act".into()),
            description: "Banking transactions and ACH records".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::Financial,
            category: "Payment Card Data".into(),
            retention_period_days: 1095,
            legal_basis: "PCI compliance".into(),
            auto_delete: true,
            priority: RulePriority::Critical,
            tenant_id: None,
            regulatory_reference: Some("PCI DSS".into()),
            description: "Payment card and processing information".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::Operational,
            category: "GPS Tracking Data".into(),
            retention_period_days: 365,
            legal_basis: "Privacy minimization".into(),
            auto_delete: true,
            priority: RulePriority::Medium,
            tenant_id: None,
            regulatory_reference: Some("GDPR data minimization".into()),
            description: "Real-time location and tracking information".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::Compliance,
            category: "Hours of Service Records".into(),
            retention_period_days: 180,
            legal_basis: "DOT regulatory requirement".into(),
            auto_delete: true,
            priority: RulePriority::Critical,
            tenant_id: None,
            regulatory_reference: Some("49 CFR Part 395".into()),
            description: "Driver hours of service logs".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::System,
            category: "Application Logs".into(),
            retention_period_days: 90,
            legal_basis: "System maintenance".into(),
            auto_delete: true,
            priority: RulePriority::Low,
            tenant_id: None,
            regulatory_reference: None,
            description: "Application logs and performance data".into(),
        },
        RetentionRuleDraft {
            data_category: DataCategoryKind::System,
            category: "Security Audit Logs".into(),
            retention_period_days: 730,
            legal_basis: "Security compliance".into(),
            auto_delete: true,
            priority: RulePriority::High,
            tenant_id: None,
            regulatory_reference: Some("Security audit requirements".into()),
            description: "Security events, access logs and audit trails".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(category: &str, days: i64) -> RetentionRuleDraft {
        RetentionRuleDraft {
            data_category: DataCategoryKind::Operational,
            category: category.into(),
            retention_period_days: days,
            legal_basis: "Business operations".into(),
            auto_delete: true,
            priority: RulePriority::Medium,
            tenant_id: None,
            regulatory_reference: None,
            description: "test rule".into(),
        }
    }

    #[tokio::test]
    async fn rejects_non_positive_retention_period() {
        let registry = RetentionRuleRegistry::new();
        let result = registry.register_rule(draft("Bad Rule", 0)).await;
        assert!(matches!(result, Err(GovernanceError::Validation(_))));

        let result = registry.register_rule(draft("Worse Rule", -5)).await;
        assert!(matches!(result, Err(GovernanceError::Validation(_))));
    }

    #[tokio::test]
    async fn registered_rule_round_trips_through_listing() {
        let registry = RetentionRuleRegistry::new();
        let rule = registry.register_rule(draft("GPS Tracking", 365)).await.unwrap();

        let listed = registry.list_rules(None).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, rule.id);
        assert_eq!(listed[0].retention_period_days, 365);
    }

    #[tokio::test]
    async fn tenant_rules_shadow_global_rules_of_same_category() {
        let registry = RetentionRuleRegistry::new();
        registry.register_rule(draft("GPS Tracking", 365)).await.unwrap();

        let mut tenant_draft = draft("GPS Tracking", 90);
        tenant_draft.tenant_id = Some("acme".into());
        let tenant_rule = registry.register_rule(tenant_draft).await.unwrap();

        let rules = registry.list_rules(Some("acme")).await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, tenant_rule.id);
        assert_eq!(rules[0].retention_period_days, 90);

        // Other tenants still see the global rule
        let rules = registry.list_rules(Some("globex")).await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].retention_period_days, 365);
    }

    #[tokio::test]
    async fn sweep_only_proposes_drafts_for_expired_auto_delete_rules() {
        let registry = RetentionRuleRegistry::new();
        let expired = registry.register_rule(draft("GPS Tracking", 365)).await.unwrap();
        registry.register_rule(draft("Fresh Data", 3650)).await.unwrap();
        let mut manual = draft("Manual Only", 1);
        manual.auto_delete = false;
        registry.register_rule(manual).await.unwrap();

        let drafts = registry.sweep_expired(Utc::now() + Duration::days(366)).await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].source_rule_id, Some(expired.id));
        assert_eq!(drafts[0].request_type, DeletionRequestType::RetentionExpiry);
    }

    #[tokio::test]
    async fn sweep_gates_financial_and_critical_rules() {
        let registry = RetentionRuleRegistry::new();
        let mut financial = draft("Banking Records", 30);
        financial.data_category = DataCategoryKind::Financial;
        financial.priority = RulePriority::Critical;
        registry.register_rule(financial).await.unwrap();

        let drafts = registry.sweep_expired(Utc::now() + Duration::days(31)).await;
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].legal_hold_check);
        assert!(drafts[0].verification_required);
    }

    #[tokio::test]
    async fn referenced_rules_are_frozen() {
        let registry = RetentionRuleRegistry::new();
        let rule = registry.register_rule(draft("GPS Tracking", 365)).await.unwrap();
        registry.mark_rule_referenced(rule.id).await;

        let patch = RetentionRulePatch {
            retention_period_days: Some(30),
            ..Default::default()
        };
        let result = registry.update_rule(rule.id, patch).await;
        assert!(matches!(result, Err(GovernanceError::Validation(_))));
    }

    #[tokio::test]
    async fn superseded_inventory_items_are_kept_but_hidden() {
        let registry = RetentionRuleRegistry::new();
        let rule = registry.register_rule(draft("GPS Tracking", 365)).await.unwrap();

        let item_draft = DataInventoryDraft {
            data_category: DataCategoryKind::Operational,
            category: "GPS Tracking".into(),
            table_name: "gps_events".into(),
            column_name: None,
            description: "Raw GPS readings".into(),
            sensitivity: SensitivityLevel::Internal,
            personal_data_elements: vec!["location".into()],
            retention_rule_id: rule.id,
            encryption_required: false,
            tenant_id: None,
        };
        let old = registry.add_inventory_item(item_draft.clone()).await.unwrap();

        let mut replacement = item_draft;
        replacement.sensitivity = SensitivityLevel::Confidential;
        replacement.encryption_required = true;
        let new = registry
            .supersede_inventory_item(old.id, replacement)
            .await
            .unwrap();

        let listed = registry.list_inventory(None).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, new.id);
    }
}
