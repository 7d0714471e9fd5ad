//! User task record entity - Per-day progress on one daily task.
//!
//! Scoped to `(user_id, task_id, task_date)` by a composite unique index.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-day task progress database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_task_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User making progress
    pub user_id: i64,
    /// Task being advanced
    pub task_id: i64,
    /// Calendar day the progress counts for
    pub task_date: Date,
    /// Progress so far today
    pub current_value: i32,
    /// Set once `current_value` reaches the task target
    pub is_completed: bool,
    /// Set once the reward is paid
    pub is_claimed: bool,
    /// When the target was first reached
    pub completed_at: Option<DateTime>,
    /// When the reward was paid
    pub claimed_at: Option<DateTime>,
    /// When the first progress of the day arrived
    pub created_at: DateTime,
}

/// Defines relationships between task records and tasks
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record tracks one task
    #[sea_orm(
        belongs_to = "super::daily_task::Entity",
        from = "Column::TaskId",
        to = "super::daily_task::Column::Id"
    )]
    Task,
}

impl Related<super::daily_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
