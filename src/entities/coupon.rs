//! Coupon entity - Discount templates with a shared issue pool.
//!
//! `used_count` counts issued instances and never exceeds `total_count`.

use super::sea_orm_active_enums::CouponType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Coupon template database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    /// Unique identifier for the template
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name (e.g., "Spring 10% off")
    pub name: String,
    /// Discount rule
    pub coupon_type: CouponType,
    /// Amount off for `fixed`, percentage for `percent`
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub value: Decimal,
    /// Minimum subtotal the coupon applies to
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub min_amount: Decimal,
    /// Cap on a percentage discount
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub max_discount: Option<Decimal>,
    /// Size of the issue pool
    pub total_count: i32,
    /// Instances issued so far
    pub used_count: i32,
    /// Start of the validity window
    pub start_time: DateTime,
    /// End of the validity window
    pub end_time: DateTime,
    /// Inactive templates can be neither issued nor redeemed
    pub is_active: bool,
    /// When the template was created
    pub created_at: DateTime,
}

impl Model {
    /// Whether `now` falls inside the validity window.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Defines relationships between coupon templates and issued coupons
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One template has many issued instances
    #[sea_orm(has_many = "super::user_coupon::Entity")]
    UserCoupons,
}

impl Related<super::user_coupon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserCoupons.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
