//! Gesture-to-action dispatch.
//!
//! The [`Dispatcher`] turns a stream of per-frame labels into rate-limited
//! backend calls: each configured label fires at most once per cooldown
//! window, however long it is held.

mod cooldown;
pub mod dispatcher;
pub mod executor;
pub mod table;

pub use dispatcher::{
    ActionEvent, Decision, Delivery, DispatchOutcome, Dispatched, Dispatcher, GestureState,
};
pub use executor::{ActionExecutor, ExecutionReport, QUEUE_CAPACITY};
pub use table::{GestureAction, GestureTable, InvalidCooldown, DEFAULT_COOLDOWN_SECS};
