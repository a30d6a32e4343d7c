//! Request allocation screen: per-experiment gating, duplicate-submission
//! protection and dialog lifetimes.

mod allocation_view;
mod dialog;
mod gate;
mod in_flight;

pub use allocation_view::RequestAllocationView;
pub use dialog::DialogScope;
pub use gate::{ExperimentGate, GateView};
pub use in_flight::{ActionKey, ActionKind, InFlightActions, InFlightGuard};
