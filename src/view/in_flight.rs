use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use strum::{AsRefStr, Display};
use tracing::debug;

use crate::errors::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    Override,
    AllocateRemaining,
    ReturnItems,
    DisableStatus,
    AdminApprove,
    AdminEdit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub request_id: String,
    pub action: ActionKind,
    pub experiment_id: Option<String>,
}

impl ActionKey {
    pub fn new(request_id: impl Into<String>, action: ActionKind) -> Self {
        Self {
            request_id: request_id.into(),
            action,
            experiment_id: None,
        }
    }

    pub fn for_experiment(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }
}

/// Actions currently awaiting a server response. A second submission of the
/// same action fails until the first one settles.
#[derive(Debug, Clone, Default)]
pub struct InFlightActions {
    active: Arc<DashMap<ActionKey, Instant>>,
}

impl InFlightActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_begin(&self, key: ActionKey) -> ClientResult<InFlightGuard> {
        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => Err(ClientError::InFlight(format!(
                "{} on request {} is already in progress",
                key.action, key.request_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                debug!(action = %key.action, request_id = %key.request_id, "action started");
                Ok(InFlightGuard {
                    active: Arc::clone(&self.active),
                    key,
                })
            }
        }
    }

    pub fn is_active(&self, key: &ActionKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Releases its action slot when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<DashMap<ActionKey, Instant>>,
    key: ActionKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((key, started)) = self.active.remove(&self.key) {
            debug!(
                action = %key.action,
                request_id = %key.request_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "action settled"
            );
        }
    }
}
