//! Client-side quantity bookkeeping.
//!
//! The remaining quantity of an item is `quantity - allocated_quantity`, and
//! disabled items contribute nothing. The server applies the same rule when it
//! processes `allocate-unified`, so the payload built here is exactly what the
//! server would allocate on its own.

use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::{ClientError, ClientResult};
use crate::models::{Experiment, ItemLine, LabRequest, QuantityEdit, UnifiedItems};

/// Builds the allocate-remaining payload for the given experiments.
pub fn remaining_items<'a, I>(experiments: I) -> ClientResult<UnifiedItems>
where
    I: IntoIterator<Item = &'a Experiment>,
{
    let mut payload = UnifiedItems::default();
    for experiment in experiments {
        for (kind, item) in experiment.all_items() {
            if item.is_disabled {
                continue;
            }
            let remaining = item.remaining()?;
            if remaining <= Decimal::ZERO {
                continue;
            }
            payload.push(
                kind,
                ItemLine {
                    experiment_id: experiment.id.clone(),
                    item_id: item.id.clone(),
                    name: item.name.clone(),
                    quantity: remaining,
                },
            );
        }
    }
    debug!(lines = payload.len(), "computed remaining allocation payload");
    Ok(payload)
}

fn locate<'a>(request: &'a LabRequest, experiment_id: &str) -> ClientResult<&'a Experiment> {
    request.experiment(experiment_id).ok_or_else(|| {
        ClientError::Validation(format!(
            "experiment {} is not part of request {}",
            experiment_id, request.id
        ))
    })
}

/// Returns can only give back what was actually handed out.
pub fn validate_return(request: &LabRequest, items: &UnifiedItems) -> ClientResult<()> {
    if items.is_empty() {
        return Err(ClientError::Validation("no items selected for return".into()));
    }
    for (kind, line) in items.iter() {
        let experiment = locate(request, &line.experiment_id)?;
        let item = experiment.find_item(kind, &line.item_id).ok_or_else(|| {
            ClientError::Validation(format!("unknown {} {}", kind, line.item_id))
        })?;
        if line.quantity <= Decimal::ZERO {
            return Err(ClientError::Validation(format!(
                "{}: return quantity must be positive",
                item.name
            )));
        }
        if line.quantity > item.allocated_quantity {
            return Err(ClientError::Validation(format!(
                "{}: cannot return {} when only {} was allocated",
                item.name, line.quantity, item.allocated_quantity
            )));
        }
    }
    Ok(())
}

/// Admin quantity edits may not drop below what has already been allocated.
pub fn validate_quantity_edits(request: &LabRequest, edits: &[QuantityEdit]) -> ClientResult<()> {
    if edits.is_empty() {
        return Err(ClientError::Validation("no quantity edits supplied".into()));
    }
    for edit in edits {
        let experiment = locate(request, &edit.experiment_id)?;
        let item = experiment
            .find_item(edit.item_type, &edit.item_id)
            .ok_or_else(|| {
                ClientError::Validation(format!("unknown {} {}", edit.item_type, edit.item_id))
            })?;
        if edit.new_quantity <= Decimal::ZERO {
            return Err(ClientError::Validation(format!(
                "{}: quantity must be positive",
                item.name
            )));
        }
        if edit.new_quantity < item.allocated_quantity {
            return Err(ClientError::Validation(format!(
                "{}: quantity {} is below the {} already allocated",
                item.name, edit.new_quantity, item.allocated_quantity
            )));
        }
    }
    Ok(())
}
