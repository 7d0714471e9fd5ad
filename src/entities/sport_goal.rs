//! Sport goal entity - A target over a fixed daily, weekly or monthly window.
//!
//! The window is fixed when the goal is created. `is_completed` only ever moves
//! from false to true.

use super::sea_orm_active_enums::{GoalPeriod, GoalType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sport goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sport_goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the goal
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// What is measured
    pub goal_type: GoalType,
    /// Value that completes the goal
    pub target_value: i64,
    /// Aggregated progress within the window
    pub current_value: i64,
    /// Display unit (e.g., "min", "km")
    pub unit: String,
    /// Window length
    pub period: GoalPeriod,
    /// First instant of the window
    pub start_date: DateTime,
    /// Last instant of the window (inclusive)
    pub end_date: DateTime,
    /// Set once `current_value >= target_value`, never cleared
    pub is_completed: bool,
    /// When the goal was created
    pub created_at: DateTime,
}

impl Model {
    /// Whether the window is still open at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime) -> bool {
        now <= self.end_date
    }
}

/// Goals have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
