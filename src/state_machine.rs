//! Turn control flow as an explicit state machine
//!
//! Stages do the I/O; `transition` is the pure function deciding which stage
//! runs next and which bookkeeping the controller must apply to the
//! conversation record.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{Outcome, Phase, TurnContext, UnverifiedReason};
pub use transition::{transition, TransitionError};
