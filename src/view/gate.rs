use serde::Serialize;

use crate::models::AdminOverride;
use crate::services::{present, present_override, DateWindow, Presentation, WindowStatus};

/// Per-experiment state used to enable or disable allocation controls.
///
/// ```text
/// Valid --(time passes)--> AdminGrace | AdminRequired --(more time)--> Blocked
///   any of the above --(admin enables override)--> OverrideActive
///   OverrideActive --(admin disables override)--> date-computed state
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExperimentGate {
    Valid { days_remaining: i64 },
    AdminGrace { days_overdue: i64 },
    AdminRequired { days_overdue: i64 },
    Blocked { days_overdue: i64 },
    OverrideActive { reason: String, underlying: WindowStatus },
}

impl ExperimentGate {
    pub fn from_window(window: &DateWindow, admin_override: Option<&AdminOverride>) -> Self {
        if let Some(ov) = admin_override.filter(|ov| ov.enabled) {
            return ExperimentGate::OverrideActive {
                reason: ov.reason.clone(),
                underlying: window.status,
            };
        }
        let overdue = window.days_overdue.unwrap_or(0);
        match window.status {
            WindowStatus::Valid => ExperimentGate::Valid {
                days_remaining: window.days_remaining.unwrap_or(0),
            },
            WindowStatus::AdminGrace => ExperimentGate::AdminGrace {
                days_overdue: overdue,
            },
            WindowStatus::ExpiredAdminOnly => ExperimentGate::AdminRequired {
                days_overdue: overdue,
            },
            WindowStatus::ExpiredCompletely => ExperimentGate::Blocked {
                days_overdue: overdue,
            },
        }
    }

    pub fn allows_actions(&self) -> bool {
        matches!(
            self,
            ExperimentGate::Valid { .. }
                | ExperimentGate::AdminGrace { .. }
                | ExperimentGate::OverrideActive { .. }
        )
    }

    pub fn is_override(&self) -> bool {
        matches!(self, ExperimentGate::OverrideActive { .. })
    }
}

/// Everything a badge needs for one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateView {
    pub experiment_id: String,
    pub experiment_name: String,
    pub window: DateWindow,
    pub gate: ExperimentGate,
    pub presentation: Presentation,
}

impl GateView {
    pub fn new(
        experiment_id: impl Into<String>,
        experiment_name: impl Into<String>,
        window: DateWindow,
        admin_override: Option<&AdminOverride>,
    ) -> Self {
        let gate = ExperimentGate::from_window(&window, admin_override);
        let presentation = match &gate {
            ExperimentGate::OverrideActive { reason, .. } => present_override(reason),
            _ => present(&window),
        };
        Self {
            experiment_id: experiment_id.into(),
            experiment_name: experiment_name.into(),
            window,
            gate,
            presentation,
        }
    }
}
