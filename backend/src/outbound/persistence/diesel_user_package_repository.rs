//! PostgreSQL-backed `UserPackageRepository` implementation using Diesel ORM.
//!
//! Debits and credits run in one transaction that checks the journal,
//! moves the balance with a single guarded `UPDATE ... RETURNING`, and
//! journals the event. A concurrent duplicate trips the journal's unique key,
//! rolls the transaction back, and is reported as already applied.
//!
//! Bulk extensions lock the package row, then add to the stored values, so a
//! ledger adjustment committed after the package was listed is kept.

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{
    LedgerAdjustment, LedgerEntryKind, LedgerReceipt, UserPackageRepository,
    UserPackageRepositoryError,
};
use crate::domain::{
    NewUserPackage, PackageExtension, PackageId, PackageStatus, UserId, UserPackage,
};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{
    NewLedgerEntryRow, NewUserPackageRow, UserPackageRow, counter_from_db, counter_to_db,
};
use super::pool::{DbPool, PoolError};
use super::schema::{session_ledger_entries, user_packages};

/// Diesel-backed implementation of the user package repository port.
#[derive(Clone)]
pub struct DieselUserPackageRepository {
    pool: DbPool,
}

impl DieselUserPackageRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(
        &self,
        filter: PackageScope,
    ) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = user_packages::table
            .order(user_packages::id.asc())
            .select(UserPackageRow::as_select())
            .into_boxed();
        query = match filter {
            PackageScope::All => query,
            PackageScope::Active => {
                query.filter(user_packages::status.eq(PackageStatus::Active.as_str()))
            }
            PackageScope::Owner(user_id) => {
                query.filter(user_packages::user_id.eq(user_id.get()))
            }
        };
        let rows: Vec<UserPackageRow> = query.load(&mut conn).await.map_err(map_diesel_error)?;
        rows.into_iter()
            .map(|row| UserPackage::try_from(row).map_err(UserPackageRepositoryError::query))
            .collect()
    }

    async fn adjust(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let result = conn
            .transaction(|conn| {
                async move { adjust_in_tx(conn, package_id, receipt).await }.scope_boxed()
            })
            .await;

        match result {
            Ok(adjustment) => Ok(adjustment),
            Err(LedgerTxError::Duplicate) => {
                debug!(event_id = %receipt.event_id, "concurrent ledger duplicate rolled back");
                Ok(LedgerAdjustment::AlreadyApplied)
            }
            Err(LedgerTxError::PackageNotFound) => {
                Err(UserPackageRepositoryError::package_not_found(package_id))
            }
            Err(LedgerTxError::Counter(message)) => Err(UserPackageRepositoryError::query(message)),
            Err(LedgerTxError::Diesel(err)) => Err(map_diesel_error(err)),
        }
    }

    async fn extend(
        &self,
        package_id: PackageId,
        extension: PackageExtension,
    ) -> Result<UserPackage, UserPackageRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let result = conn
            .transaction(|conn| {
                async move { extend_in_tx(conn, package_id, extension).await }.scope_boxed()
            })
            .await;

        match result {
            Ok(package) => Ok(package),
            Err(LedgerTxError::PackageNotFound) => {
                Err(UserPackageRepositoryError::package_not_found(package_id))
            }
            Err(LedgerTxError::Counter(message)) => Err(UserPackageRepositoryError::query(message)),
            Err(LedgerTxError::Duplicate) => Err(UserPackageRepositoryError::query(
                "unexpected unique violation while extending a package",
            )),
            Err(LedgerTxError::Diesel(err)) => Err(map_diesel_error(err)),
        }
    }
}

enum PackageScope {
    All,
    Active,
    Owner(UserId),
}

enum LedgerTxError {
    Duplicate,
    PackageNotFound,
    Counter(String),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for LedgerTxError {
    fn from(error: diesel::result::Error) -> Self {
        if is_unique_violation(&error) {
            Self::Duplicate
        } else {
            Self::Diesel(error)
        }
    }
}

async fn adjust_in_tx(
    conn: &mut AsyncPgConnection,
    package_id: PackageId,
    receipt: &LedgerReceipt,
) -> Result<LedgerAdjustment, LedgerTxError> {
    let journalled: bool = diesel::select(exists(
        session_ledger_entries::table
            .filter(session_ledger_entries::event_id.eq(receipt.event_id))
            .filter(session_ledger_entries::kind.eq(receipt.kind.as_str())),
    ))
    .get_result(conn)
    .await?;
    if journalled {
        return Ok(LedgerAdjustment::AlreadyApplied);
    }

    let target = user_packages::table.filter(user_packages::id.eq(package_id.get()));
    let remaining: Option<i32> = match receipt.kind {
        LedgerEntryKind::Debit => {
            diesel::update(target.filter(user_packages::remaining_sessions.gt(0)))
                .set(user_packages::remaining_sessions.eq(user_packages::remaining_sessions - 1))
                .returning(user_packages::remaining_sessions)
                .get_result(conn)
                .await
                .optional()?
        }
        LedgerEntryKind::Credit => diesel::update(target)
            .set(user_packages::remaining_sessions.eq(user_packages::remaining_sessions + 1))
            .returning(user_packages::remaining_sessions)
            .get_result(conn)
            .await
            .optional()?,
    };

    let Some(remaining) = remaining else {
        let present: bool = diesel::select(exists(
            user_packages::table.filter(user_packages::id.eq(package_id.get())),
        ))
        .get_result(conn)
        .await?;
        return if present {
            Ok(LedgerAdjustment::Exhausted)
        } else {
            Err(LedgerTxError::PackageNotFound)
        };
    };

    diesel::insert_into(session_ledger_entries::table)
        .values(&NewLedgerEntryRow {
            event_id: receipt.event_id,
            kind: receipt.kind.as_str(),
            booking_id: receipt.booking_id.get(),
            package_id: package_id.get(),
            remaining_after: remaining,
            created_at: receipt.recorded_at,
        })
        .execute(conn)
        .await?;

    let remaining_sessions =
        counter_from_db("remaining_sessions", remaining).map_err(LedgerTxError::Counter)?;
    Ok(LedgerAdjustment::Applied { remaining_sessions })
}

async fn extend_in_tx(
    conn: &mut AsyncPgConnection,
    package_id: PackageId,
    extension: PackageExtension,
) -> Result<UserPackage, LedgerTxError> {
    let locked: Option<UserPackageRow> = user_packages::table
        .filter(user_packages::id.eq(package_id.get()))
        .select(UserPackageRow::as_select())
        .for_update()
        .get_result(conn)
        .await
        .optional()?;
    let Some(locked) = locked else {
        return Err(LedgerTxError::PackageNotFound);
    };
    let current = UserPackage::try_from(locked).map_err(LedgerTxError::Counter)?;
    let extended = extension.extend(&current).ok_or_else(|| {
        LedgerTxError::Counter(format!("extension overflows package {package_id}"))
    })?;
    let extra = counter_to_db("extra_sessions", extension.extra_sessions())
        .map_err(LedgerTxError::Counter)?;

    let written: UserPackageRow =
        diesel::update(user_packages::table.filter(user_packages::id.eq(package_id.get())))
            .set((
                user_packages::expiry_date.eq(extended.expiry_date),
                user_packages::total_sessions.eq(user_packages::total_sessions + extra),
                user_packages::remaining_sessions.eq(user_packages::remaining_sessions + extra),
            ))
            .returning(UserPackageRow::as_returning())
            .get_result(conn)
            .await?;
    UserPackage::try_from(written).map_err(LedgerTxError::Counter)
}

fn map_pool_error(error: PoolError) -> UserPackageRepositoryError {
    map_basic_pool_error(error, UserPackageRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserPackageRepositoryError {
    map_basic_diesel_error(
        error,
        UserPackageRepositoryError::query,
        UserPackageRepositoryError::connection,
    )
}

fn to_db(column: &'static str, value: u32) -> Result<i32, UserPackageRepositoryError> {
    counter_to_db(column, value).map_err(UserPackageRepositoryError::query)
}

#[async_trait]
impl UserPackageRepository for DieselUserPackageRepository {
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        self.load(PackageScope::Owner(user_id)).await
    }

    async fn list_active(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        self.load(PackageScope::Active).await
    }

    async fn list_all(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        self.load(PackageScope::All).await
    }

    async fn insert(
        &self,
        package: &NewUserPackage,
    ) -> Result<UserPackage, UserPackageRepositoryError> {
        let sessions = to_db("total_sessions", package.total_sessions)?;
        let row = NewUserPackageRow {
            user_id: package.user_id.get(),
            kind: package.kind.as_str(),
            total_sessions: sessions,
            remaining_sessions: sessions,
            status: PackageStatus::Active.as_str(),
            expiry_date: package.expiry_date,
            created_at: package.created_at,
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted: UserPackageRow = diesel::insert_into(user_packages::table)
            .values(&row)
            .returning(UserPackageRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        UserPackage::try_from(inserted).map_err(UserPackageRepositoryError::query)
    }

    async fn debit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        self.adjust(package_id, receipt).await
    }

    async fn credit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        self.adjust(package_id, receipt).await
    }

    async fn set_remaining_sessions(
        &self,
        package_id: PackageId,
        remaining: u32,
    ) -> Result<(), UserPackageRepositoryError> {
        let remaining = to_db("remaining_sessions", remaining)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated =
            diesel::update(user_packages::table.filter(user_packages::id.eq(package_id.get())))
                .set(user_packages::remaining_sessions.eq(remaining))
                .execute(&mut conn)
                .await
                .map_err(map_diesel_error)?;
        if updated == 0 {
            return Err(UserPackageRepositoryError::package_not_found(package_id));
        }
        Ok(())
    }

    async fn apply_extension(
        &self,
        package_id: PackageId,
        extension: PackageExtension,
    ) -> Result<UserPackage, UserPackageRepositoryError> {
        self.extend(package_id, extension).await
    }
}
