//! In-memory gym store implementing every persistence port.
//!
//! Mirrors the PostgreSQL adapters closely enough for behaviour tests:
//! booking rows carry no foreign keys, ledger adjustments are journalled by
//! `(event_id, kind)`, and faults can be injected per operation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::ports::{
    AuditLogEntry, AuditLogRepository, AuditLogRepositoryError, BookingRepository,
    BookingRepositoryError, GymClassRepository, GymClassRepositoryError, LedgerAdjustment,
    LedgerEntryKind, LedgerReceipt, MemberRepository, MemberRepositoryError, MissingReference,
    OrphanedBooking, UserPackageRepository, UserPackageRepositoryError,
};
use crate::domain::{
    Booking, BookingEvent, BookingId, BookingStatus, GymClass, GymClassId, GymClassStatus,
    NewUserPackage, PackageExtension, PackageId, PackageKind, PackageStatus, UserId, UserPackage,
};

use super::lock;

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    /// `GymClassRepository::set_current_participants`.
    ParticipantWrite,
    /// `UserPackageRepository::debit_session` and `credit_session`.
    LedgerWrite,
    /// `AuditLogRepository::record`.
    AuditWrite,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeSet<UserId>,
    classes: BTreeMap<GymClassId, GymClass>,
    bookings: BTreeMap<BookingId, Booking>,
    packages: BTreeMap<PackageId, UserPackage>,
    journal: BTreeMap<(Uuid, LedgerEntryKind), DateTime<Utc>>,
    audit_log: Vec<AuditLogEntry>,
    faults: HashMap<StoreFault, u32>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn trip(&mut self, fault: StoreFault) -> bool {
        match self.faults.get_mut(&fault) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn booking_mut(&mut self, booking_id: BookingId) -> &mut Booking {
        match self.bookings.get_mut(&booking_id) {
            Some(booking) => booking,
            None => panic!("booking {booking_id} not seeded"),
        }
    }
}

/// Shared in-memory state behind all gym ports.
#[derive(Default)]
pub struct InMemoryGymStore {
    state: Mutex<State>,
}

impl InMemoryGymStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member and return its id.
    pub fn add_user(&self) -> UserId {
        let mut state = lock(&self.state, "store");
        let id = UserId::new(state.allocate_id());
        state.users.insert(id);
        id
    }

    /// Delete a member row; its bookings and packages stay behind.
    pub fn delete_user(&self, user_id: UserId) {
        lock(&self.state, "store").users.remove(&user_id);
    }

    /// Schedule a class with the given capacity and an empty cache.
    pub fn add_class(
        &self,
        name: &str,
        max_participants: u32,
        starts_at: DateTime<Utc>,
    ) -> GymClassId {
        let mut state = lock(&self.state, "store");
        let id = GymClassId::new(state.allocate_id());
        state.classes.insert(
            id,
            GymClass {
                id,
                name: name.to_owned(),
                max_participants,
                current_participants: 0,
                status: GymClassStatus::Scheduled,
                starts_at,
            },
        );
        id
    }

    /// Delete a class row; its bookings stay behind.
    pub fn delete_class(&self, class_id: GymClassId) {
        lock(&self.state, "store").classes.remove(&class_id);
    }

    /// Current snapshot of a class.
    pub fn class(&self, class_id: GymClassId) -> Option<GymClass> {
        lock(&self.state, "store").classes.get(&class_id).cloned()
    }

    /// Overwrite a cached participant count without going through a port.
    pub fn corrupt_participants(&self, class_id: GymClassId, count: u32) {
        if let Some(class) = lock(&self.state, "store").classes.get_mut(&class_id) {
            class.current_participants = count;
        }
    }

    /// Assign a package directly, bypassing assignment validation.
    pub fn add_package(
        &self,
        user_id: UserId,
        kind: PackageKind,
        sessions: u32,
        expiry_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> PackageId {
        let mut state = lock(&self.state, "store");
        let id = PackageId::new(state.allocate_id());
        state.packages.insert(
            id,
            UserPackage {
                id,
                user_id,
                kind,
                total_sessions: sessions,
                remaining_sessions: sessions,
                status: PackageStatus::Active,
                expiry_date,
                created_at,
            },
        );
        id
    }

    /// Current snapshot of a package.
    pub fn package(&self, package_id: PackageId) -> Option<UserPackage> {
        lock(&self.state, "store").packages.get(&package_id).cloned()
    }

    /// Change a package status.
    pub fn set_package_status(&self, package_id: PackageId, status: PackageStatus) {
        if let Some(package) = lock(&self.state, "store").packages.get_mut(&package_id) {
            package.status = status;
        }
    }

    /// Overwrite a balance without going through a port.
    pub fn corrupt_remaining(&self, package_id: PackageId, remaining: u32) {
        if let Some(package) = lock(&self.state, "store").packages.get_mut(&package_id) {
            package.remaining_sessions = remaining;
        }
    }

    /// Write a booking row and return the matching creation event.
    pub fn create_booking(
        &self,
        user_id: UserId,
        class_id: GymClassId,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> BookingEvent {
        let mut state = lock(&self.state, "store");
        let id = BookingId::new(state.allocate_id());
        let booking = Booking {
            id,
            user_id,
            class_id,
            status,
            attended: None,
            created_at: at,
        };
        state.bookings.insert(id, booking.clone());
        BookingEvent::created(booking, at)
    }

    /// Cancel a booking row and return the matching cancellation event.
    pub fn cancel_booking(&self, booking_id: BookingId, at: DateTime<Utc>) -> BookingEvent {
        let mut state = lock(&self.state, "store");
        let booking = state.booking_mut(booking_id);
        let previous = booking.status;
        booking.status = BookingStatus::Cancelled;
        BookingEvent::cancelled(booking.clone(), previous, at)
    }

    /// Move a booking to another status and return the matching event.
    pub fn change_booking_status(
        &self,
        booking_id: BookingId,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> BookingEvent {
        let mut state = lock(&self.state, "store");
        let booking = state.booking_mut(booking_id);
        let previous = booking.status;
        booking.status = status;
        BookingEvent::status_changed(booking.clone(), previous, at)
    }

    /// Current snapshot of a booking.
    pub fn booking(&self, booking_id: BookingId) -> Option<Booking> {
        lock(&self.state, "store").bookings.get(&booking_id).cloned()
    }

    /// Audit log entries in insertion order.
    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        lock(&self.state, "store").audit_log.clone()
    }

    /// Number of journalled ledger adjustments.
    pub fn journal_len(&self) -> usize {
        lock(&self.state, "store").journal.len()
    }

    /// Make the next `times` calls of an operation fail with a connection
    /// error.
    pub fn inject_fault(&self, fault: StoreFault, times: u32) {
        lock(&self.state, "store").faults.insert(fault, times);
    }
}

#[async_trait]
impl GymClassRepository for InMemoryGymStore {
    async fn find_by_id(
        &self,
        class_id: GymClassId,
    ) -> Result<Option<GymClass>, GymClassRepositoryError> {
        Ok(self.class(class_id))
    }

    async fn list_all(&self) -> Result<Vec<GymClass>, GymClassRepositoryError> {
        Ok(lock(&self.state, "store").classes.values().cloned().collect())
    }

    async fn set_current_participants(
        &self,
        class_id: GymClassId,
        count: u32,
    ) -> Result<(), GymClassRepositoryError> {
        let mut state = lock(&self.state, "store");
        if state.trip(StoreFault::ParticipantWrite) {
            return Err(GymClassRepositoryError::connection("injected fault"));
        }
        if let Some(class) = state.classes.get_mut(&class_id) {
            class.current_participants = count;
        }
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for InMemoryGymStore {
    async fn count_occupying(&self, class_id: GymClassId) -> Result<u32, BookingRepositoryError> {
        let state = lock(&self.state, "store");
        let count = state
            .bookings
            .values()
            .filter(|booking| booking.class_id == class_id && booking.occupies_slot())
            .count();
        u32::try_from(count).map_err(|err| BookingRepositoryError::query(err.to_string()))
    }

    async fn count_confirmed_since(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, BookingRepositoryError> {
        let state = lock(&self.state, "store");
        let count = state
            .bookings
            .values()
            .filter(|booking| {
                booking.user_id == user_id
                    && booking.status == BookingStatus::Confirmed
                    && booking.created_at >= since
            })
            .count();
        u32::try_from(count).map_err(|err| BookingRepositoryError::query(err.to_string()))
    }

    async fn list_orphaned(&self) -> Result<Vec<OrphanedBooking>, BookingRepositoryError> {
        let state = lock(&self.state, "store");
        Ok(state
            .bookings
            .values()
            .filter(|booking| booking.status != BookingStatus::Cancelled)
            .filter_map(|booking| {
                let missing = MissingReference::from_presence(
                    state.users.contains(&booking.user_id),
                    state.classes.contains_key(&booking.class_id),
                )?;
                Some(OrphanedBooking {
                    booking_id: booking.id,
                    user_id: booking.user_id,
                    class_id: booking.class_id,
                    status: booking.status,
                    created_at: booking.created_at,
                    missing,
                })
            })
            .collect())
    }

    async fn cancel_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<usize, BookingRepositoryError> {
        let mut state = lock(&self.state, "store");
        let mut changed = 0;
        for id in booking_ids {
            if let Some(booking) = state.bookings.get_mut(id)
                && booking.status != BookingStatus::Cancelled
            {
                booking.status = BookingStatus::Cancelled;
                changed += 1;
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl UserPackageRepository for InMemoryGymStore {
    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        let state = lock(&self.state, "store");
        Ok(state
            .packages
            .values()
            .filter(|package| package.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        let state = lock(&self.state, "store");
        Ok(state
            .packages
            .values()
            .filter(|package| package.is_active())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<UserPackage>, UserPackageRepositoryError> {
        Ok(lock(&self.state, "store").packages.values().cloned().collect())
    }

    async fn insert(
        &self,
        package: &NewUserPackage,
    ) -> Result<UserPackage, UserPackageRepositoryError> {
        let id = self.add_package(
            package.user_id,
            package.kind,
            package.total_sessions,
            package.expiry_date,
            package.created_at,
        );
        self.package(id)
            .ok_or_else(|| UserPackageRepositoryError::package_not_found(id))
    }

    async fn debit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        self.adjust(package_id, receipt)
    }

    async fn credit_session(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        self.adjust(package_id, receipt)
    }

    async fn set_remaining_sessions(
        &self,
        package_id: PackageId,
        remaining: u32,
    ) -> Result<(), UserPackageRepositoryError> {
        let mut state = lock(&self.state, "store");
        let package = state
            .packages
            .get_mut(&package_id)
            .ok_or_else(|| UserPackageRepositoryError::package_not_found(package_id))?;
        package.remaining_sessions = remaining;
        Ok(())
    }

    async fn apply_extension(
        &self,
        package_id: PackageId,
        extension: PackageExtension,
    ) -> Result<UserPackage, UserPackageRepositoryError> {
        let mut state = lock(&self.state, "store");
        let package = state
            .packages
            .get_mut(&package_id)
            .ok_or_else(|| UserPackageRepositoryError::package_not_found(package_id))?;
        *package = extension.extend(package).ok_or_else(|| {
            UserPackageRepositoryError::query(format!("extension overflows package {package_id}"))
        })?;
        Ok(package.clone())
    }
}

impl InMemoryGymStore {
    fn adjust(
        &self,
        package_id: PackageId,
        receipt: &LedgerReceipt,
    ) -> Result<LedgerAdjustment, UserPackageRepositoryError> {
        let mut state = lock(&self.state, "store");
        if state.trip(StoreFault::LedgerWrite) {
            return Err(UserPackageRepositoryError::connection("injected fault"));
        }
        let key = (receipt.event_id, receipt.kind);
        if state.journal.contains_key(&key) {
            return Ok(LedgerAdjustment::AlreadyApplied);
        }
        let package = state
            .packages
            .get_mut(&package_id)
            .ok_or_else(|| UserPackageRepositoryError::package_not_found(package_id))?;
        let remaining = match receipt.kind {
            LedgerEntryKind::Debit => match package.remaining_sessions.checked_sub(1) {
                Some(remaining) => remaining,
                None => return Ok(LedgerAdjustment::Exhausted),
            },
            LedgerEntryKind::Credit => package.remaining_sessions.saturating_add(1),
        };
        package.remaining_sessions = remaining;
        state.journal.insert(key, receipt.recorded_at);
        Ok(LedgerAdjustment::Applied {
            remaining_sessions: remaining,
        })
    }
}

#[async_trait]
impl MemberRepository for InMemoryGymStore {
    async fn exists(&self, user_id: UserId) -> Result<bool, MemberRepositoryError> {
        Ok(lock(&self.state, "store").users.contains(&user_id))
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryGymStore {
    async fn record(&self, entry: &AuditLogEntry) -> Result<(), AuditLogRepositoryError> {
        let mut state = lock(&self.state, "store");
        if state.trip(StoreFault::AuditWrite) {
            return Err(AuditLogRepositoryError::connection("injected fault"));
        }
        state.audit_log.push(entry.clone());
        Ok(())
    }
}
