//! Food check-in record entity - At most one row per user per calendar date.
//!
//! The `(user_id, checkin_date)` composite unique index is what makes the food
//! check-in reward once-a-day under concurrent requests.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Food check-in database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "food_checkin_records")]
pub struct Model {
    /// Unique identifier for the food check-in
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who checked in
    pub user_id: i64,
    /// Calendar date of the check-in
    pub checkin_date: Date,
    /// Food coins paid
    pub coins_earned: i64,
    /// Instant the check-in was recorded
    pub created_at: DateTime,
}

/// Food check-ins have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
