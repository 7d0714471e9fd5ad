//! Food record entity - One logged meal entry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Meal log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "food_records")]
pub struct Model {
    /// Unique identifier for the meal entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who logged the meal
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// breakfast, lunch, dinner or snack
    pub meal_type: String,
    /// Calendar date the meal belongs to
    pub record_date: Date,
    /// What was eaten
    pub food_name: String,
    /// Kilocalories as reported
    pub calories: i32,
    /// Food coins paid for logging
    pub coins_earned: i64,
    /// When the entry was logged
    pub created_at: DateTime,
}

/// Meal entries have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
