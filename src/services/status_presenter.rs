use serde::Serialize;
use strum::{AsRefStr, Display};

use super::date_window::{DateWindow, WindowStatus};

/// Display urgency, most urgent first. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UrgencyTier {
    DueToday,
    Soon,
    Upcoming,
    AdminGrace,
    AdminRequired,
    Blocked,
    OverrideActive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub tier: UrgencyTier,
    pub label: String,
}

/// Valid windows this close to the experiment are shown as `Soon`.
const SOON_THRESHOLD_DAYS: i64 = 3;

pub fn present(window: &DateWindow) -> Presentation {
    match window.status {
        WindowStatus::Valid => {
            let days = window.days_remaining.unwrap_or(0);
            let tier = if days <= 0 {
                UrgencyTier::DueToday
            } else if days <= SOON_THRESHOLD_DAYS {
                UrgencyTier::Soon
            } else {
                UrgencyTier::Upcoming
            };
            let label = match days {
                d if d <= 0 => "Due today".to_string(),
                1 => "1 day left".to_string(),
                d => format!("{} days left", d),
            };
            Presentation { tier, label }
        }
        WindowStatus::AdminGrace => {
            let days = window.days_overdue.unwrap_or(0);
            Presentation {
                tier: UrgencyTier::AdminGrace,
                label: format!(
                    "{} day{} overdue (admin grace)",
                    days,
                    if days == 1 { "" } else { "s" }
                ),
            }
        }
        WindowStatus::ExpiredAdminOnly => Presentation {
            tier: UrgencyTier::AdminRequired,
            label: "Admin access required".to_string(),
        },
        WindowStatus::ExpiredCompletely => Presentation {
            tier: UrgencyTier::Blocked,
            label: "Allocation window closed".to_string(),
        },
    }
}

/// Badge for an experiment whose window is lifted by an admin override.
pub fn present_override(reason: &str) -> Presentation {
    let label = if reason.trim().is_empty() {
        "Admin override active".to_string()
    } else {
        format!("Admin override active: {}", reason.trim())
    };
    Presentation {
        tier: UrgencyTier::OverrideActive,
        label,
    }
}
