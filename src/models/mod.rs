// Wire models for the lab request API
pub mod allocation;
pub mod experiment;
pub mod items;

pub use allocation::*;
pub use experiment::{AdminOverride, Experiment, LabRequest};
pub use items::{DisableUpdate, ItemKind, ItemLine, RequestItem, UnifiedItems};
