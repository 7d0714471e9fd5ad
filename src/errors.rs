//! Unified error type for the order and rewards core.
//!
//! Every public operation surfaces exactly one of these variants. [`Error::kind`]
//! collapses them into the closed failure taxonomy handed to the HTTP layer, and
//! [`Error::is_retryable`] marks the only class that may be retried automatically.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    DbErr, RuntimeErr, SqlErr,
    sqlx::{self, sqlite::SqliteError},
};
use thiserror::Error;

/// Closed set of failure kinds exposed to callers of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced row does not exist or does not belong to the caller
    NotFound,
    /// Order state machine precondition not met
    InvalidTransition,
    /// Not enough stock, or the product is not on sale
    OutOfStock,
    /// A coin spend would take a balance below zero
    InsufficientBalance,
    /// Coupon or task rules not satisfied
    Ineligible,
    /// Second check-in, second claim, second goal in an open window
    Duplicate,
    /// Store-level race, lock contention or unique-key collision; safe to retry
    Conflict,
    /// Caller supplied invalid input
    Invalid,
    /// Storage or configuration failure
    Internal,
}

/// Every failure a core operation can report.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced row is missing or belongs to someone else
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of row, e.g. "order"
        entity: &'static str,
        /// Key that was looked up
        id: String,
    },

    /// The order is not in a state that allows `action`
    #[error("Order {order_id} cannot {action} while {from}")]
    InvalidTransition {
        /// Order the caller tried to move
        order_id: i64,
        /// Status the order was in
        from: String,
        /// Attempted operation, e.g. "ship"
        action: &'static str,
    },

    /// Not enough units on sale
    #[error("Product {product_id} out of stock: requested {requested}, available {available}")]
    OutOfStock {
        /// Product that ran short
        product_id: i64,
        /// Units asked for
        requested: i32,
        /// Units left, 0 when the product is off sale
        available: i32,
    },

    /// A debit would take a coin balance below zero
    #[error("Insufficient {coin_type} coins: current {current}, required {required}")]
    InsufficientBalance {
        /// "sport", "food" or "sport+food" for exchanges
        coin_type: String,
        /// Balance at the time of the attempt
        current: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// Coupon or task rules are not met
    #[error("Not eligible: {reason}")]
    Ineligible {
        /// Human-readable rule that failed
        reason: String,
    },

    /// A check-in already exists for the day
    #[error("Already checked in on {date}")]
    AlreadyCheckedIn {
        /// Day that was already checked in
        date: NaiveDate,
    },

    /// The task reward was paid before
    #[error("Reward for task {task_id} already claimed")]
    AlreadyClaimed {
        /// Task whose reward was claimed
        task_id: i64,
    },

    /// The caller already holds what they asked to create
    #[error("Duplicate: {what}")]
    Duplicate {
        /// What was duplicated
        what: String,
    },

    /// Another transaction won a race, or the store reported lock contention
    #[error("Conflict: {message}")]
    Conflict {
        /// Store or rule message
        message: String,
    },

    /// A coin amount that cannot be applied
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Malformed caller input
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// Bad or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Any other store failure
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl Error {
    /// Maps this error onto the closed failure taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::OutOfStock { .. } => ErrorKind::OutOfStock,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Ineligible { .. } => ErrorKind::Ineligible,
            Self::AlreadyCheckedIn { .. }
            | Self::AlreadyClaimed { .. }
            | Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidAmount { .. } | Self::Validation { .. } => ErrorKind::Invalid,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Internal,
        }
    }

    /// Only conflicts may be retried; every other kind is terminal for the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict)
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn ineligible(reason: impl Into<String>) -> Self {
        Self::Ineligible {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            return Self::Conflict { message };
        }
        if is_contention(&err) {
            return Self::Conflict {
                message: err.to_string(),
            };
        }
        Self::Database(err)
    }
}

/// Whether the store refused the statement because another transaction holds a
/// conflicting lock or committed first. A fresh transaction can get past these.
fn is_contention(err: &DbErr) -> bool {
    let (DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db_err)))) = err
    else {
        return false;
    };
    let Some(code) = db_err.code() else {
        return false;
    };

    if db_err.try_downcast_ref::<SqliteError>().is_some() {
        // SQLITE_BUSY and SQLITE_LOCKED, including extended codes like BUSY_SNAPSHOT
        return code
            .parse::<i32>()
            .is_ok_and(|code| matches!(code & 0xff, 5 | 6));
    }
    is_retryable_sqlstate(&code)
}

/// SQLSTATE `40001` (serialization failure) and `40P01` (deadlock detected).
fn is_retryable_sqlstate(code: &str) -> bool {
    matches!(code, "40001" | "40P01")
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflict_is_retryable() {
        let conflict = Error::Conflict {
            message: "order_no".to_string(),
        };
        assert!(conflict.is_retryable());

        let stock = Error::OutOfStock {
            product_id: 1,
            requested: 2,
            available: 1,
        };
        assert!(!stock.is_retryable());
        assert_eq!(stock.kind(), ErrorKind::OutOfStock);
    }

    #[test]
    fn test_duplicate_family_shares_kind() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
        assert_eq!(
            Error::AlreadyCheckedIn { date }.kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            Error::AlreadyClaimed { task_id: 3 }.kind(),
            ErrorKind::Duplicate
        );
        assert_eq!(
            Error::Duplicate {
                what: "goal".to_string()
            }
            .kind(),
            ErrorKind::Duplicate
        );
    }

    #[test]
    fn test_serialization_sqlstates_are_retryable() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(!is_retryable_sqlstate("23505"));
    }

    #[test]
    fn test_plain_db_error_is_internal() {
        let err: Error = DbErr::Custom("boom".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_retryable());
    }
}
