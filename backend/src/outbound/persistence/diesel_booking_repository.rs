//! PostgreSQL-backed `BookingRepository` implementation using Diesel ORM.
//!
//! Counts run as `SELECT COUNT(*)` in the database. Orphans are found with
//! left joins against `users` and `gym_classes`, since booking rows carry no
//! foreign keys.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{
    BookingRepository, BookingRepositoryError, MissingReference, OrphanedBooking,
};
use crate::domain::{BookingId, BookingStatus, GymClassId, UserId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::count_from_db;
use super::pool::{DbPool, PoolError};
use super::schema::{bookings, gym_classes, users};

/// Diesel-backed implementation of the booking repository port.
#[derive(Clone)]
pub struct DieselBookingRepository {
    pool: DbPool,
}

impl DieselBookingRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> BookingRepositoryError {
    map_basic_pool_error(error, BookingRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> BookingRepositoryError {
    map_basic_diesel_error(
        error,
        BookingRepositoryError::query,
        BookingRepositoryError::connection,
    )
}

type OrphanRow = (
    i64,
    i64,
    i64,
    String,
    DateTime<Utc>,
    Option<i64>,
    Option<i64>,
);

fn orphan_from_row(row: OrphanRow) -> Result<Option<OrphanedBooking>, BookingRepositoryError> {
    let (booking_id, user_id, class_id, status, created_at, user_ref, class_ref) = row;
    let Some(missing) = MissingReference::from_presence(user_ref.is_some(), class_ref.is_some())
    else {
        return Ok(None);
    };
    let status = BookingStatus::from_str(&status)
        .map_err(|err| BookingRepositoryError::query(err.to_string()))?;
    Ok(Some(OrphanedBooking {
        booking_id: BookingId::new(booking_id),
        user_id: UserId::new(user_id),
        class_id: GymClassId::new(class_id),
        status,
        created_at,
        missing,
    }))
}

#[async_trait]
impl BookingRepository for DieselBookingRepository {
    async fn count_occupying(&self, class_id: GymClassId) -> Result<u32, BookingRepositoryError> {
        let non_occupying = BookingStatus::NON_OCCUPYING.map(BookingStatus::as_str);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = bookings::table
            .filter(bookings::class_id.eq(class_id.get()))
            .filter(bookings::status.ne_all(non_occupying))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        count_from_db(count).map_err(BookingRepositoryError::query)
    }

    async fn count_confirmed_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, BookingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = bookings::table
            .filter(bookings::user_id.eq(user_id.get()))
            .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
            .filter(bookings::created_at.ge(since))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        count_from_db(count).map_err(BookingRepositoryError::query)
    }

    async fn list_orphaned(&self) -> Result<Vec<OrphanedBooking>, BookingRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<OrphanRow> = bookings::table
            .left_join(users::table.on(users::id.eq(bookings::user_id)))
            .left_join(gym_classes::table.on(gym_classes::id.eq(bookings::class_id)))
            .filter(bookings::status.ne(BookingStatus::Cancelled.as_str()))
            .filter(
                users::id
                    .nullable()
                    .is_null()
                    .or(gym_classes::id.nullable().is_null()),
            )
            .order(bookings::id.asc())
            .select((
                bookings::id,
                bookings::user_id,
                bookings::class_id,
                bookings::status,
                bookings::created_at,
                users::id.nullable(),
                gym_classes::id.nullable(),
            ))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        let mut orphans = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(orphan) = orphan_from_row(row)? {
                orphans.push(orphan);
            }
        }
        Ok(orphans)
    }

    async fn cancel_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<usize, BookingRepositoryError> {
        if booking_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = booking_ids.iter().map(|id| id.get()).collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(
            bookings::table
                .filter(bookings::id.eq_any(ids))
                .filter(bookings::status.ne(BookingStatus::Cancelled.as_str())),
        )
        .set(bookings::status.eq(BookingStatus::Cancelled.as_str()))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for orphan row decoding.
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn booked_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 18, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    #[case(Some(1), None, Some(MissingReference::Class))]
    #[case(None, Some(2), Some(MissingReference::User))]
    #[case(None, None, Some(MissingReference::UserAndClass))]
    #[case(Some(1), Some(2), None)]
    fn orphan_rows_classify_missing_side(
        #[case] user_ref: Option<i64>,
        #[case] class_ref: Option<i64>,
        #[case] expected: Option<MissingReference>,
    ) {
        let row = (7, 1, 2, "waitlist".to_owned(), booked_at(), user_ref, class_ref);
        let orphan = orphan_from_row(row).expect("row decodes");
        assert_eq!(orphan.map(|o| o.missing), expected);
    }

    #[rstest]
    fn unknown_status_is_a_query_error() {
        let row = (7, 1, 2, "pending".to_owned(), booked_at(), None, None);
        assert!(matches!(
            orphan_from_row(row),
            Err(BookingRepositoryError::Query { .. })
        ));
    }
}
