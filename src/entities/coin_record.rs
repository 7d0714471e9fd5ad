//! Coin record entity - The append-only coin ledger.
//!
//! Each row records one signed change to one of a user's coin balances together
//! with the balance that resulted from it. Rows are inserted once and never
//! updated or deleted.

use super::sea_orm_active_enums::CoinType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coin_records")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the balance that changed
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Which balance changed
    pub coin_type: CoinType,
    /// Signed change (positive for earn, negative for spend)
    pub amount: i64,
    /// Balance immediately after this change
    pub balance: i64,
    /// What produced the change, e.g. `"daily_checkin"` or `"exchange"`
    pub source: String,
    /// Optional id of the row that produced the change
    pub source_id: Option<i64>,
    /// Human-readable description
    pub description: String,
    /// When the change happened
    pub created_at: DateTime,
}

/// Defines relationships between ledger entries and users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
