//! User entity - The resolved actor plus the counters the reward engine owns.
//!
//! `sport_coins` and `food_coins` are only ever changed through
//! `core::ledger::apply_delta`, which keeps them non-negative and mirrored by
//! exactly one ledger entry per change. Streak fields are maintained by check-in.

use super::sea_orm_active_enums::CoinType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub nickname: String,
    /// Membership tier, 0 for regular users
    pub member_level: i32,
    /// When the membership lapses; `None` means it does not expire
    pub member_expire_time: Option<DateTime>,
    /// Body weight used for calorie estimation
    pub weight_kg: Option<f64>,
    /// Sport coin balance, never negative
    pub sport_coins: i64,
    /// Food coin balance, never negative
    pub food_coins: i64,
    /// Monetary wallet balance
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub balance: Decimal,
    /// Length of the current check-in streak
    pub continuous_checkin_days: i32,
    /// Lifetime number of check-in days
    pub total_checkin_days: i32,
    /// Calendar date of the most recent check-in
    pub last_checkin_date: Option<Date>,
    /// When the user was created
    pub created_at: DateTime,
    /// When the user was last modified
    pub updated_at: DateTime,
}

impl Model {
    /// Whether the user holds an unexpired membership at `now`.
    #[must_use]
    pub fn is_member_at(&self, now: DateTime) -> bool {
        self.member_level > 0 && self.member_expire_time.is_none_or(|expires| expires > now)
    }

    /// Current balance of one coin type.
    #[must_use]
    pub const fn coins(&self, coin_type: CoinType) -> i64 {
        match coin_type {
            CoinType::Sport => self.sport_coins,
            CoinType::Food => self.food_coins,
        }
    }
}

/// Defines relationships between users, their ledger and their orders
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many ledger entries
    #[sea_orm(has_many = "super::coin_record::Entity")]
    CoinRecords,
    /// One user has many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::coin_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CoinRecords.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
