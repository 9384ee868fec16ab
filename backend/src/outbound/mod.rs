//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL repositories using Diesel ORM.
//! - **notifications**: the default `SessionNotifier`, which hands signals
//!   to the log stream for a downstream dispatcher to pick up.
//!
//! Adapters translate between domain types and infrastructure
//! representations and contain no business logic.

pub mod notifications;
pub mod persistence;
