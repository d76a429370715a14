//! Registration repository.

use std::sync::Arc;

use super::escape_like;
use crate::entities::{
    Registration, User, registration,
    registration::RegistrationStatus,
    user,
};
use chrono::{DateTime, Utc};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Func},
};

/// Outcome of a guarded status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition<T> {
    /// The registration was still pending and has been moved on.
    Applied(T),
    /// The registration was no longer pending. Carries the status read back after
    /// the guard failed, or `None` if the row disappeared in between.
    Stale(Option<RegistrationStatus>),
}

/// Filter for listing registrations.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    /// Only registrations in this status.
    pub status: Option<RegistrationStatus>,
    /// Case-insensitive substring over name, email and phone.
    pub search: Option<String>,
}

impl RegistrationFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(status) = self.status {
            condition = condition.add(registration::Column::Status.eq(status));
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            condition = condition.add(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(registration::Column::FullName)))
                            .like(pattern.clone()),
                    )
                    .add(registration::Column::Email.like(pattern.clone()))
                    .add(registration::Column::Phone.like(pattern)),
            );
        }

        condition
    }
}

/// Result of deleting a registration.
#[derive(Debug, Clone)]
pub struct DeletedRegistration {
    /// The row as it was before deletion.
    pub registration: registration::Model,
    /// Account that was deactivated along with it, if any.
    pub deactivated_user_id: Option<String>,
}

/// Registration repository for database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    db: Arc<DatabaseConnection>,
}

impl RegistrationRepository {
    /// Create a new registration repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a registration by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<registration::Model>> {
        Registration::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a registration by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<registration::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration {id}")))
    }

    /// Create a new registration.
    pub async fn create(&self, model: registration::ActiveModel) -> AppResult<registration::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List registrations, newest first.
    pub async fn list(
        &self,
        filter: &RegistrationFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<registration::Model>> {
        Registration::find()
            .filter(filter.condition())
            .order_by_desc(registration::Column::CreatedAt)
            .order_by_desc(registration::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count registrations matching a filter.
    pub async fn count(&self, filter: &RegistrationFilter) -> AppResult<u64> {
        Registration::find()
            .filter(filter.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count registrations in a given status.
    pub async fn count_by_status(&self, status: RegistrationStatus) -> AppResult<u64> {
        Registration::find()
            .filter(registration::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move a pending registration to `account_created` and insert its account.
    ///
    /// Both writes share one transaction. The status update is conditional on the
    /// row still being `pending`, so of two concurrent approvals exactly one inserts
    /// a user. A failed user insert rolls the status change back.
    pub async fn approve_with_account(
        &self,
        id: &str,
        reviewer_id: &str,
        reviewed_at: DateTime<Utc>,
        account: user::ActiveModel,
    ) -> AppResult<StatusTransition<user::Model>> {
        let user_id = account
            .id
            .clone()
            .take()
            .ok_or_else(|| AppError::Internal("account id must be set".to_string()))?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let updated = Registration::update_many()
            .col_expr(
                registration::Column::Status,
                Expr::value(RegistrationStatus::AccountCreated.as_str()),
            )
            .col_expr(registration::Column::UserId, Expr::value(user_id))
            .col_expr(registration::Column::ReviewedBy, Expr::value(reviewer_id))
            .col_expr(registration::Column::ReviewedAt, Expr::value(reviewed_at))
            .col_expr(registration::Column::UpdatedAt, Expr::value(reviewed_at))
            .filter(registration::Column::Id.eq(id))
            .filter(registration::Column::Status.eq(RegistrationStatus::Pending))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if updated.rows_affected == 0 {
            let current = Registration::find_by_id(id)
                .one(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?
                .map(|r| r.status);
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(StatusTransition::Stale(current));
        }

        let user = match account.insert(&txn).await {
            Ok(user) => user,
            Err(e) => {
                txn.rollback()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                return Err(AppError::AccountCreationFailed(e.to_string()));
            }
        };

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(StatusTransition::Applied(user))
    }

    /// Move a pending registration to `rejected`.
    pub async fn reject(
        &self,
        id: &str,
        reviewer_id: &str,
        reason: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> AppResult<StatusTransition<()>> {
        let updated = Registration::update_many()
            .col_expr(
                registration::Column::Status,
                Expr::value(RegistrationStatus::Rejected.as_str()),
            )
            .col_expr(registration::Column::RejectionReason, Expr::value(reason))
            .col_expr(registration::Column::ReviewedBy, Expr::value(reviewer_id))
            .col_expr(registration::Column::ReviewedAt, Expr::value(reviewed_at))
            .col_expr(registration::Column::UpdatedAt, Expr::value(reviewed_at))
            .filter(registration::Column::Id.eq(id))
            .filter(registration::Column::Status.eq(RegistrationStatus::Pending))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if updated.rows_affected == 0 {
            let current = self.find_by_id(id).await?.map(|r| r.status);
            return Ok(StatusTransition::Stale(current));
        }

        Ok(StatusTransition::Applied(()))
    }

    /// Hard-delete a registration in any status.
    ///
    /// The account created from it, if any, is deactivated in the same transaction.
    /// Returns `None` if the registration does not exist.
    pub async fn delete_and_deactivate(&self, id: &str) -> AppResult<Option<DeletedRegistration>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(registration) = Registration::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(None);
        };

        let mut deactivated_user_id = None;
        if let Some(user_id) = registration.user_id.clone() {
            let result = User::update_many()
                .col_expr(user::Column::IsActive, Expr::value(false))
                .col_expr(user::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(user::Column::Id.eq(user_id.as_str()))
                .filter(user::Column::IsActive.eq(true))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            if result.rows_affected > 0 {
                deactivated_user_id = Some(user_id);
            }
        }

        Registration::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Some(DeletedRegistration {
            registration,
            deactivated_user_id,
        }))
    }
}
