//! Error types shared by observables, subjects and subscriptions, plus the sink
//! for errors that have no handler.

mod observable_errors;
mod unhandled;

pub use observable_errors::*;
pub use unhandled::*;
pub(crate) use unhandled::Turn;
