//! Gym booking consistency backend.
//!
//! Reconciles class participant counts and package session balances with
//! the booking rows, both incrementally from booking events and in batch
//! through the consistency auditor.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod wiring;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
