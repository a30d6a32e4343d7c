// Allocation window rules
pub mod date_window;
pub mod status_presenter;

// Quantity bookkeeping shared by allocate / return / edit flows
pub mod remaining;

pub use date_window::{
    parse_experiment_date, Clock, DateWindow, DateWindowEvaluator, FixedClock, SystemClock,
    WindowStatus, DEFAULT_GRACE_PERIOD_DAYS, MAX_GRACE_PERIOD_DAYS,
};
pub use status_presenter::{present, present_override, Presentation, UrgencyTier};
