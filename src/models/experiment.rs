use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::items::{ItemKind, RequestItem};
use crate::errors::ClientResult;
use crate::services::date_window::parse_experiment_date;

/// Admin-granted exemption from the experiment's allocation window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverride {
    pub enabled: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    #[serde(rename = "_id", alias = "id", alias = "experimentId")]
    pub id: String,
    #[serde(alias = "experimentName")]
    pub name: String,
    /// Raw date as sent by the server; see [`Experiment::date`].
    #[serde(alias = "experimentDate")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub chemicals: Vec<RequestItem>,
    #[serde(default)]
    pub glassware: Vec<RequestItem>,
    #[serde(default)]
    pub equipment: Vec<RequestItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_override: Option<AdminOverride>,
}

impl Experiment {
    /// Parsed experiment date. Fails rather than guessing on malformed input.
    pub fn date(&self) -> ClientResult<NaiveDate> {
        parse_experiment_date(&self.date)
    }

    pub fn items(&self, kind: ItemKind) -> &[RequestItem] {
        match kind {
            ItemKind::Chemical => &self.chemicals,
            ItemKind::Glassware => &self.glassware,
            ItemKind::Equipment => &self.equipment,
        }
    }

    pub fn items_mut(&mut self, kind: ItemKind) -> &mut Vec<RequestItem> {
        match kind {
            ItemKind::Chemical => &mut self.chemicals,
            ItemKind::Glassware => &mut self.glassware,
            ItemKind::Equipment => &mut self.equipment,
        }
    }

    pub fn all_items(&self) -> impl Iterator<Item = (ItemKind, &RequestItem)> {
        self.chemicals
            .iter()
            .map(|item| (ItemKind::Chemical, item))
            .chain(self.glassware.iter().map(|item| (ItemKind::Glassware, item)))
            .chain(self.equipment.iter().map(|item| (ItemKind::Equipment, item)))
    }

    pub fn find_item(&self, kind: ItemKind, item_id: &str) -> Option<&RequestItem> {
        self.items(kind).iter().find(|item| item.id == item_id)
    }

    pub fn override_active(&self) -> bool {
        self.admin_override
            .as_ref()
            .map(|ov| ov.enabled)
            .unwrap_or(false)
    }
}

/// A faculty request: one or more experiments with their item lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRequest {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<String>,
    #[serde(default)]
    pub experiments: Vec<Experiment>,
}

impl LabRequest {
    pub fn experiment(&self, experiment_id: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|exp| exp.id == experiment_id)
    }

    pub fn experiment_mut(&mut self, experiment_id: &str) -> Option<&mut Experiment> {
        self.experiments.iter_mut().find(|exp| exp.id == experiment_id)
    }
}
