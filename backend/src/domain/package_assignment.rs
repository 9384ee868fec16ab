//! Assigning packages to members.

use std::sync::Arc;

use chrono::NaiveDate;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use super::port_errors::{map_member_error, map_package_error};
use super::ports::{MemberRepository, UserPackageRepository};
use super::{Error, NewUserPackage, PackageKind, UserId, UserPackage};

/// Request to give a member a new package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignPackageRequest {
    /// Receiving member.
    pub user_id: UserId,
    /// Product kind.
    pub kind: PackageKind,
    /// Sessions granted.
    pub total_sessions: u32,
    /// Last usable day.
    pub expiry_date: NaiveDate,
}

/// Service assigning packages while holding the one-active-membership rule.
pub struct PackageAssignmentService<P, M> {
    packages: Arc<P>,
    members: Arc<M>,
    clock: Arc<dyn Clock>,
}

impl<P, M> PackageAssignmentService<P, M>
where
    P: UserPackageRepository,
    M: MemberRepository,
{
    /// Create the service.
    pub fn new(packages: Arc<P>, members: Arc<M>, clock: Arc<dyn Clock>) -> Self {
        Self {
            packages,
            members,
            clock,
        }
    }

    /// Assign a package, starting `active` with a full balance.
    ///
    /// # Errors
    ///
    /// - `invalid_request` when `total_sessions` is zero or the expiry date is
    ///   already past;
    /// - `not_found` when the member does not exist;
    /// - `conflict` when assigning a membership to a member who already holds
    ///   an active one.
    pub async fn assign(&self, request: AssignPackageRequest) -> Result<UserPackage, Error> {
        let now = self.clock.utc();
        if request.total_sessions == 0 {
            return Err(Error::invalid_request("total_sessions must be positive"));
        }
        if request.expiry_date < now.date_naive() {
            return Err(Error::invalid_request("expiry_date must not be in the past")
                .with_details(json!({ "expiryDate": request.expiry_date })));
        }

        let exists = self
            .members
            .exists(request.user_id)
            .await
            .map_err(map_member_error)?;
        if !exists {
            return Err(Error::not_found(format!(
                "user {} not found",
                request.user_id
            )));
        }

        if request.kind == PackageKind::Membership {
            let held = self
                .packages
                .list_for_user(request.user_id)
                .await
                .map_err(map_package_error)?;
            if let Some(active) = held.iter().find(|package| package.is_active_membership()) {
                return Err(
                    Error::conflict("member already holds an active membership")
                        .with_details(json!({ "packageId": active.id })),
                );
            }
        }

        let package = self
            .packages
            .insert(&NewUserPackage {
                user_id: request.user_id,
                kind: request.kind,
                total_sessions: request.total_sessions,
                expiry_date: request.expiry_date,
                created_at: now,
            })
            .await
            .map_err(map_package_error)?;
        info!(
            package_id = %package.id,
            user_id = %package.user_id,
            kind = %package.kind,
            total_sessions = package.total_sessions,
            "package assigned"
        );
        Ok(package)
    }
}
