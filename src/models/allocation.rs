//! Request and response bodies for the allocation endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::experiment::AdminOverride;
use super::items::{ItemKind, ItemLine};

/// Why the server says allocation is or is not possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    Allowed,
    DateExpired,
    AdminOverride,
    AllAllocated,
    ItemsDisabled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindBreakdown {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub allocated: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub disabled: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemBreakdown {
    #[serde(default)]
    pub chemicals: KindBreakdown,
    #[serde(default)]
    pub glassware: KindBreakdown,
    #[serde(default)]
    pub equipment: KindBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentStatus {
    pub experiment_id: String,
    #[serde(default)]
    pub experiment_name: String,
    #[serde(default)]
    pub date: Option<String>,
    pub can_allocate: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reason_type: Option<ReasonType>,
    #[serde(default)]
    pub has_admin_override: bool,
    #[serde(default)]
    pub pending_items: u32,
}

/// Server-computed allocation state of a whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationStatus {
    pub can_allocate: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reason_type: Option<ReasonType>,
    #[serde(default)]
    pub pending_items: u32,
    #[serde(default)]
    pub reenabled_items: u32,
    #[serde(default)]
    pub item_breakdown: ItemBreakdown,
    #[serde(default)]
    pub experiment_statuses: Vec<ExperimentStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentPermission {
    pub experiment_id: String,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_allocate: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What the current user may change on a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPermissions {
    #[serde(default)]
    pub can_edit_quantities: bool,
    #[serde(default)]
    pub can_disable_items: bool,
    #[serde(default)]
    pub can_override_dates: bool,
    #[serde(default)]
    pub can_approve: bool,
    #[serde(default)]
    pub experiments: Vec<ExperimentPermission>,
}

impl EditPermissions {
    pub fn for_experiment(&self, experiment_id: &str) -> Option<&ExperimentPermission> {
        self.experiments
            .iter()
            .find(|perm| perm.experiment_id == experiment_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    pub enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OverrideRequest {
    pub fn enable(reason: impl Into<String>) -> Self {
        Self {
            enable: true,
            reason: Some(reason.into()),
        }
    }

    pub fn disable(reason: Option<String>) -> Self {
        Self {
            enable: false,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub admin_override: Option<AdminOverride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisableStatusBody<'a> {
    pub updates: &'a [super::items::DisableUpdate],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub updated_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub allocated_items: Vec<ItemLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub returned_items: Vec<ItemLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub action: ApprovalAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Admin change to a single item's requested quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityEdit {
    pub experiment_id: String,
    pub item_id: String,
    pub item_type: ItemKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminEditRequest {
    pub edits: Vec<QuantityEdit>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEditResult {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub edited_count: u32,
}
