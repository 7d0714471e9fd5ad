//! Daily task entity - Configured tasks that reset every calendar day.

use super::sea_orm_active_enums::CoinType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Daily task database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_tasks")]
pub struct Model {
    /// Unique identifier for the task
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique in the catalog
    pub name: String,
    /// Longer text shown under the name
    pub description: Option<String>,
    /// Activity kind that advances this task (e.g., "sport", "food")
    #[sea_orm(indexed)]
    pub task_type: String,
    /// Progress needed to complete the task
    pub target_value: i32,
    /// Coin type the reward is paid in
    pub reward_coin_type: CoinType,
    /// Coins paid on claim
    pub reward_amount: i64,
    /// Inactive tasks are neither advanced nor claimable
    pub is_active: bool,
    /// Display order, ascending
    pub sort_order: i32,
    /// When the task was configured
    pub created_at: DateTime,
}

/// Defines relationships between tasks and per-day progress
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One task has many per-user, per-day records
    #[sea_orm(has_many = "super::user_task_record::Entity")]
    Records,
}

impl Related<super::user_task_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
