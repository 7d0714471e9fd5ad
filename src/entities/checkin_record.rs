//! Check-in record entity - One row per user per calendar date.
//!
//! Uniqueness on `(user_id, checkin_date)` is enforced by a composite index
//! created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily check-in database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkin_records")]
pub struct Model {
    /// Unique identifier for the check-in
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who checked in
    pub user_id: i64,
    /// Calendar date of the check-in
    pub checkin_date: Date,
    /// Sport coins paid for this check-in
    pub sport_coins_earned: i64,
    /// Food coins paid for this check-in
    pub food_coins_earned: i64,
    /// Whether this check-in extended the previous day's streak
    pub is_continuous: bool,
    /// Streak length including this day
    pub continuous_days: i32,
    /// Instant the check-in was recorded
    pub created_at: DateTime,
}

/// Check-ins have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
