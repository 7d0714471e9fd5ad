//! Sport record entity - One submitted workout.
//!
//! Goal progress is aggregated over these rows by `start_time`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Workout database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sport_records")]
pub struct Model {
    /// Unique identifier for the workout
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who exercised
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Activity kind (e.g., "running"), also selects the MET value
    pub sport_type: String,
    /// Minutes
    pub duration: i32,
    /// Metres
    pub distance: Option<f64>,
    /// Estimated kilocalories
    pub calories: i32,
    /// When the workout started
    pub start_time: DateTime,
    /// Start time plus duration
    pub end_time: DateTime,
    /// Sport coins paid for the workout
    pub coins_earned: i64,
    /// When the workout was submitted
    pub created_at: DateTime,
}

/// Workouts have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
