use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use super::gate::{ExperimentGate, GateView};
use super::in_flight::{ActionKey, ActionKind, InFlightActions};
use crate::auth::Role;
use crate::client::AllocationApi;
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    AdminEditRequest, AdminEditResult, AdminOverride, AllocationResult, AllocationStatus,
    ApprovalAction, ApprovalRequest, ApprovalResult, DisableUpdate, EditPermissions, Experiment,
    LabRequest, OverrideRequest, QuantityEdit, ReturnResult, UnifiedItems, UpdateResult,
};
use crate::services::remaining::{remaining_items, validate_quantity_edits, validate_return};
use crate::services::{DateWindow, DateWindowEvaluator};

/// Allocation screen for a single request.
///
/// Holds a snapshot of the request, derives per-experiment gates from the
/// date evaluator, and forwards actions to the API once they pass the same
/// checks the server applies. Local state is updated only after the server
/// accepts an action.
pub struct RequestAllocationView {
    api: Arc<dyn AllocationApi>,
    evaluator: DateWindowEvaluator,
    role: Role,
    request: RwLock<LabRequest>,
    in_flight: InFlightActions,
}

impl RequestAllocationView {
    pub fn new(
        api: Arc<dyn AllocationApi>,
        evaluator: DateWindowEvaluator,
        role: Role,
        request: LabRequest,
    ) -> Self {
        Self {
            api,
            evaluator,
            role,
            request: RwLock::new(request),
            in_flight: InFlightActions::new(),
        }
    }

    /// Fetches the request and builds a view over it.
    pub async fn load(
        api: Arc<dyn AllocationApi>,
        evaluator: DateWindowEvaluator,
        role: Role,
        request_id: &str,
    ) -> ClientResult<Self> {
        let request = api.get_request(request_id).await?;
        Ok(Self::new(api, evaluator, role, request))
    }

    /// Shares the in-flight registry with other views of the same request.
    pub fn with_in_flight(mut self, in_flight: InFlightActions) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn in_flight(&self) -> &InFlightActions {
        &self.in_flight
    }

    pub fn request(&self) -> LabRequest {
        match self.request.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn request_id(&self) -> String {
        self.read(|request| request.id.clone())
    }

    fn read<R>(&self, f: impl FnOnce(&LabRequest) -> R) -> R {
        match self.request.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut LabRequest) -> R) -> R {
        match self.request.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn window_for(&self, experiment: &Experiment) -> ClientResult<DateWindow> {
        let date = experiment.date().map_err(|e| match e {
            ClientError::InvalidDate(msg) => {
                ClientError::InvalidDate(format!("{}: {}", experiment.name, msg))
            }
            other => other,
        })?;
        Ok(self.evaluator.evaluate(date, self.role.is_admin()))
    }

    fn gate_view_for(&self, experiment: &Experiment) -> ClientResult<GateView> {
        let window = self.window_for(experiment)?;
        Ok(GateView::new(
            experiment.id.clone(),
            experiment.name.clone(),
            window,
            experiment.admin_override.as_ref(),
        ))
    }

    fn with_experiment<R>(
        &self,
        experiment_id: &str,
        f: impl FnOnce(&Experiment) -> ClientResult<R>,
    ) -> ClientResult<R> {
        self.read(|request| match request.experiment(experiment_id) {
            Some(experiment) => f(experiment),
            None => Err(ClientError::Validation(format!(
                "experiment {} is not part of request {}",
                experiment_id, request.id
            ))),
        })
    }

    pub fn window(&self, experiment_id: &str) -> ClientResult<DateWindow> {
        self.with_experiment(experiment_id, |exp| self.window_for(exp))
    }

    pub fn gate(&self, experiment_id: &str) -> ClientResult<ExperimentGate> {
        self.with_experiment(experiment_id, |exp| {
            self.gate_view_for(exp).map(|view| view.gate)
        })
    }

    /// One entry per experiment; an unparseable date only fails its own entry.
    pub fn gate_views(&self) -> Vec<ClientResult<GateView>> {
        self.read(|request| {
            request
                .experiments
                .iter()
                .map(|exp| self.gate_view_for(exp))
                .collect()
        })
    }

    fn require_admin(&self, action: &str) -> ClientResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ClientError::Validation(format!("Only admins can {}", action)))
        }
    }

    fn require_allocator(&self, action: &str) -> ClientResult<()> {
        if self.role.can_allocate() {
            Ok(())
        } else {
            Err(ClientError::Validation(format!(
                "Only lab assistants and admins can {}",
                action
            )))
        }
    }

    #[instrument(skip(self, reason))]
    pub async fn enable_override(
        &self,
        experiment_id: &str,
        reason: &str,
    ) -> ClientResult<ExperimentGate> {
        self.require_admin("enable an admin override")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ClientError::Validation(
                "A reason is required to enable an admin override".into(),
            ));
        }
        self.with_experiment(experiment_id, |_| Ok(()))?;

        let request_id = self.request_id();
        let _guard = self.in_flight.try_begin(
            ActionKey::new(&request_id, ActionKind::Override).for_experiment(experiment_id),
        )?;
        let result = self
            .api
            .set_admin_override(&request_id, experiment_id, OverrideRequest::enable(reason))
            .await?;

        let applied = result
            .admin_override
            .filter(|ov| ov.enabled)
            .unwrap_or_else(|| AdminOverride {
                enabled: true,
                reason: reason.to_string(),
                created_by: None,
                created_at: Some(Utc::now()),
            });
        self.write(|request| {
            if let Some(exp) = request.experiment_mut(experiment_id) {
                exp.admin_override = Some(applied);
            }
        });
        info!(%request_id, experiment_id, "admin override enabled");
        self.gate(experiment_id)
    }

    #[instrument(skip(self, reason))]
    pub async fn disable_override(
        &self,
        experiment_id: &str,
        reason: Option<&str>,
    ) -> ClientResult<ExperimentGate> {
        self.require_admin("disable an admin override")?;
        self.with_experiment(experiment_id, |_| Ok(()))?;

        let request_id = self.request_id();
        let _guard = self.in_flight.try_begin(
            ActionKey::new(&request_id, ActionKind::Override).for_experiment(experiment_id),
        )?;
        self.api
            .set_admin_override(
                &request_id,
                experiment_id,
                OverrideRequest::disable(reason.map(str::to_string)),
            )
            .await?;

        self.write(|request| {
            if let Some(exp) = request.experiment_mut(experiment_id) {
                exp.admin_override = None;
            }
        });
        info!(%request_id, experiment_id, "admin override disabled");
        self.gate(experiment_id)
    }

    /// Remaining quantities of every experiment whose gate currently allows
    /// allocation. Disabled items never appear, override or not. Experiments
    /// with an unreadable date are left out.
    pub fn remaining_payload(&self) -> ClientResult<UnifiedItems> {
        self.read(|request| {
            let mut open = Vec::new();
            for exp in &request.experiments {
                match self.gate_view_for(exp) {
                    Ok(view) if view.gate.allows_actions() => open.push(exp),
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            request_id = %request.id,
                            experiment_id = %exp.id,
                            error = %err,
                            "skipping experiment with unreadable date"
                        );
                    }
                }
            }
            remaining_items(open)
        })
    }

    #[instrument(skip(self))]
    pub async fn allocate_remaining(&self) -> ClientResult<AllocationResult> {
        self.require_allocator("allocate items")?;
        let payload = self.remaining_payload()?;
        if payload.is_empty() {
            return Err(ClientError::Validation(
                "Nothing left to allocate in the open allocation windows".into(),
            ));
        }

        let request_id = self.request_id();
        let _guard = self
            .in_flight
            .try_begin(ActionKey::new(&request_id, ActionKind::AllocateRemaining))?;
        let result = match self.api.allocate_remaining(&request_id, payload.clone()).await {
            Ok(result) => result,
            Err(ClientError::Conflict(partial)) => {
                warn!(
                    %request_id,
                    available = partial.available_items.len(),
                    unavailable = partial.unavailable_items.len(),
                    "allocation partially fulfilled; reconciliation required"
                );
                return Err(ClientError::Conflict(partial));
            }
            Err(err) => return Err(err),
        };

        self.apply_allocation(&payload);
        info!(%request_id, lines = payload.len(), "remaining items allocated");
        Ok(result)
    }

    fn apply_allocation(&self, payload: &UnifiedItems) {
        self.write(|request| {
            for (kind, line) in payload.iter() {
                let Some(exp) = request.experiment_mut(&line.experiment_id) else {
                    continue;
                };
                if let Some(item) = exp
                    .items_mut(kind)
                    .iter_mut()
                    .find(|item| item.id == line.item_id)
                {
                    item.allocated_quantity =
                        (item.allocated_quantity + line.quantity).min(item.quantity);
                    item.is_allocated = item.allocated_quantity >= item.quantity;
                }
            }
        });
    }

    #[instrument(skip(self, items), fields(line_count = items.len()))]
    pub async fn return_items(&self, items: UnifiedItems) -> ClientResult<ReturnResult> {
        self.require_allocator("return items")?;
        self.read(|request| validate_return(request, &items))?;

        let request_id = self.request_id();
        let _guard = self
            .in_flight
            .try_begin(ActionKey::new(&request_id, ActionKind::ReturnItems))?;
        let result = self.api.return_items(&request_id, items.clone()).await?;

        self.write(|request| {
            for (kind, line) in items.iter() {
                let Some(exp) = request.experiment_mut(&line.experiment_id) else {
                    continue;
                };
                if let Some(item) = exp
                    .items_mut(kind)
                    .iter_mut()
                    .find(|item| item.id == line.item_id)
                {
                    item.allocated_quantity =
                        (item.allocated_quantity - line.quantity).max(Decimal::ZERO);
                    item.is_allocated = false;
                }
            }
        });
        info!(%request_id, "items returned");
        Ok(result)
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()))]
    pub async fn update_disabled_status(
        &self,
        updates: Vec<DisableUpdate>,
    ) -> ClientResult<UpdateResult> {
        self.require_allocator("disable items")?;
        if updates.is_empty() {
            return Err(ClientError::Validation("no item updates supplied".into()));
        }
        self.read(|request| {
            for update in &updates {
                let exp = request.experiment(&update.experiment_id).ok_or_else(|| {
                    ClientError::Validation(format!("unknown experiment {}", update.experiment_id))
                })?;
                if exp.find_item(update.item_type, &update.item_id).is_none() {
                    return Err(ClientError::Validation(format!(
                        "unknown {} {}",
                        update.item_type, update.item_id
                    )));
                }
                let has_reason = update
                    .reason
                    .as_deref()
                    .map(|r| !r.trim().is_empty())
                    .unwrap_or(false);
                if update.is_disabled && !has_reason {
                    return Err(ClientError::Validation(
                        "A reason is required to disable an item".into(),
                    ));
                }
            }
            Ok(())
        })?;

        let request_id = self.request_id();
        let _guard = self
            .in_flight
            .try_begin(ActionKey::new(&request_id, ActionKind::DisableStatus))?;
        let result = self
            .api
            .update_disabled_status(&request_id, updates.clone())
            .await?;

        self.write(|request| {
            for update in &updates {
                let Some(exp) = request.experiment_mut(&update.experiment_id) else {
                    continue;
                };
                if let Some(item) = exp
                    .items_mut(update.item_type)
                    .iter_mut()
                    .find(|item| item.id == update.item_id)
                {
                    item.is_disabled = update.is_disabled;
                    item.disabled_reason = if update.is_disabled {
                        update.reason.clone()
                    } else {
                        None
                    };
                }
            }
        });
        Ok(result)
    }

    #[instrument(skip(self, reason))]
    pub async fn admin_approve(
        &self,
        action: ApprovalAction,
        reason: Option<&str>,
    ) -> ClientResult<ApprovalResult> {
        self.require_admin("approve or reject requests")?;
        let request_id = self.request_id();
        let _guard = self
            .in_flight
            .try_begin(ActionKey::new(&request_id, ActionKind::AdminApprove))?;
        let result = self
            .api
            .admin_approve(
                &request_id,
                ApprovalRequest {
                    action,
                    reason: reason.map(str::to_string),
                },
            )
            .await?;

        if let Some(status) = result.status.clone() {
            self.write(|request| request.status = Some(status));
        }
        info!(%request_id, ?action, "admin decision recorded");
        Ok(result)
    }

    #[instrument(skip(self, edits, reason), fields(edit_count = edits.len()))]
    pub async fn admin_edit(
        &self,
        edits: Vec<QuantityEdit>,
        reason: &str,
    ) -> ClientResult<AdminEditResult> {
        self.require_admin("edit requested quantities")?;
        if reason.trim().is_empty() {
            return Err(ClientError::Validation(
                "A reason is required for admin quantity edits".into(),
            ));
        }
        self.read(|request| validate_quantity_edits(request, &edits))?;

        let request_id = self.request_id();
        let _guard = self
            .in_flight
            .try_begin(ActionKey::new(&request_id, ActionKind::AdminEdit))?;
        let result = self
            .api
            .admin_edit(
                &request_id,
                AdminEditRequest {
                    edits: edits.clone(),
                    reason: reason.trim().to_string(),
                },
            )
            .await?;

        self.write(|request| {
            for edit in &edits {
                let Some(exp) = request.experiment_mut(&edit.experiment_id) else {
                    continue;
                };
                if let Some(item) = exp
                    .items_mut(edit.item_type)
                    .iter_mut()
                    .find(|item| item.id == edit.item_id)
                {
                    item.original_quantity.get_or_insert(item.quantity);
                    item.quantity = edit.new_quantity;
                    item.is_allocated = item.allocated_quantity >= item.quantity;
                }
            }
        });
        Ok(result)
    }

    pub async fn allocation_status(&self) -> ClientResult<AllocationStatus> {
        self.api.get_allocation_status(&self.request_id()).await
    }

    pub async fn edit_permissions(&self) -> ClientResult<EditPermissions> {
        self.api.get_edit_permissions(&self.request_id()).await
    }

    /// Replaces the local snapshot with the server's current copy.
    pub async fn reload(&self) -> ClientResult<()> {
        let fresh = self.api.get_request(&self.request_id()).await?;
        self.write(|request| *request = fresh);
        Ok(())
    }
}
