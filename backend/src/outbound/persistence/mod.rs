//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each adapter implements one domain port on top of a shared [`DbPool`].
//! Row structs and table definitions stay private to this module; adapters
//! only translate between rows and domain types.
//!
//! # Example
//!
//! ```no_run
//! use gym_backend::outbound::persistence::{DbPool, DieselGymClassRepository, PoolConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/gym")).await?;
//! let classes = DieselGymClassRepository::new(pool);
//! # let _ = classes;
//! # Ok(())
//! # }
//! ```

mod diesel_audit_log_repository;
mod diesel_basic_error_mapping;
mod diesel_booking_repository;
mod diesel_gym_class_repository;
mod diesel_member_repository;
mod diesel_user_package_repository;
mod models;
mod pool;
mod schema;

pub use diesel_audit_log_repository::DieselAuditLogRepository;
pub use diesel_booking_repository::DieselBookingRepository;
pub use diesel_gym_class_repository::DieselGymClassRepository;
pub use diesel_member_repository::DieselMemberRepository;
pub use diesel_user_package_repository::DieselUserPackageRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
