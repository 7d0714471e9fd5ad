//! User coupon entity - One user's single-use instance of a coupon template.

use super::sea_orm_active_enums::UserCouponStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Issued coupon database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_coupons")]
pub struct Model {
    /// Unique identifier for the issued coupon
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Holder
    pub user_id: i64,
    /// Template this instance was issued from
    pub coupon_id: i64,
    /// Unused, used or expired
    pub status: UserCouponStatus,
    /// Set when redeemed, cleared when the order is cancelled
    pub used_time: Option<DateTime>,
    /// Order that consumed this coupon
    pub order_id: Option<i64>,
    /// When the user received it
    pub received_at: DateTime,
}

/// Defines relationships between issued coupons and their templates
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each instance comes from one template
    #[sea_orm(
        belongs_to = "super::coupon::Entity",
        from = "Column::CouponId",
        to = "super::coupon::Column::Id"
    )]
    Coupon,
}

impl Related<super::coupon::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coupon.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
