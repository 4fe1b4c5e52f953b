//! Provides structures and traits related to subscription management.
//!
//! This module includes `Subscriber` for handling observed values, errors and
//! completions, and `Subscription`, the tree of cleanup actions released when a
//! consumer unsubscribes or a stream terminates.
pub mod subscribe;
mod teardown;
