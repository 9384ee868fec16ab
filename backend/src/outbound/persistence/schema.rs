//! Diesel table definitions for the gym schema.
//!
//! Migrations live with the application that owns the schema; these
//! definitions must match them column for column. Counters are stored as
//! `INTEGER` and converted to `u32` at the adapter boundary.

diesel::table! {
    /// Member accounts. Only existence matters to the reconcilers.
    users (id) {
        /// Primary key.
        id -> Int8,
        /// Login e-mail address.
        email -> Varchar,
        /// Account creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Scheduled classes with their cached participant count.
    gym_classes (id) {
        /// Primary key.
        id -> Int8,
        /// Display name.
        name -> Varchar,
        /// Capacity.
        max_participants -> Int4,
        /// Cached count of slot-occupying bookings.
        current_participants -> Int4,
        /// `scheduled`, `cancelled`, or `completed`.
        status -> Varchar,
        /// Class start.
        starts_at -> Timestamptz,
    }
}

diesel::table! {
    /// Authoritative booking rows.
    ///
    /// `user_id` and `class_id` carry no foreign keys: rows may outlive the
    /// member or class they reference.
    bookings (id) {
        /// Primary key.
        id -> Int8,
        /// Booking member.
        user_id -> Int8,
        /// Booked class.
        class_id -> Int8,
        /// `confirmed`, `cancelled`, `waitlist`, `completed`, or `no_show`.
        status -> Varchar,
        /// Check-in outcome, unset until the class runs.
        attended -> Nullable<Bool>,
        /// Booking timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Packages assigned to members.
    user_packages (id) {
        /// Primary key.
        id -> Int8,
        /// Owning member.
        user_id -> Int8,
        /// `membership` or `session_pack`.
        kind -> Varchar,
        /// Sessions granted.
        total_sessions -> Int4,
        /// Session balance; a `CHECK (remaining_sessions >= 0)` guards it.
        remaining_sessions -> Int4,
        /// `active`, `paused`, `expired`, or `frozen`.
        status -> Varchar,
        /// Last usable day.
        expiry_date -> Date,
        /// Assignment timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Journal of applied session debits and credits.
    ///
    /// `UNIQUE (event_id, kind)` makes a redelivered event's insert fail,
    /// which the adapter reports as already applied.
    session_ledger_entries (id) {
        /// Primary key.
        id -> Int8,
        /// Booking event that caused the adjustment.
        event_id -> Uuid,
        /// `debit` or `credit`.
        kind -> Varchar,
        /// Booking settled.
        booking_id -> Int8,
        /// Package adjusted.
        package_id -> Int8,
        /// Balance after the adjustment.
        remaining_after -> Int4,
        /// Journal timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Structured administrative audit log.
    audit_logs (id) {
        /// Primary key.
        id -> Int8,
        /// Action name, e.g. `consistency_check`.
        action -> Varchar,
        /// Findings across all categories.
        issues_found -> Int4,
        /// Whether the run applied fixes.
        fixed -> Bool,
        /// Per-category counts.
        details -> Jsonb,
        /// Entry timestamp.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    gym_classes,
    bookings,
    user_packages,
    session_ledger_entries,
    audit_logs,
);
