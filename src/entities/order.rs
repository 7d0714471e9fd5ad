//! Order entity - The aggregate root of a purchase.
//!
//! Amounts are computed once at creation time. The receiver fields are a snapshot
//! of the address at that moment. Orders are never deleted; cancellation and
//! refund are states. `coupon_id` is only set when a coupon was actually redeemed
//! for this order.

use super::sea_orm_active_enums::{OrderStatus, PayType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Externally visible order number
    #[sea_orm(unique)]
    pub order_no: String,
    /// Buyer
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Sum of line subtotals
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    /// Discount from the attached coupon
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount_amount: Decimal,
    /// `max(total_amount - discount_amount, 0)`
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub pay_amount: Decimal,
    /// Shipping fee, currently always zero
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub freight_amount: Decimal,
    /// Redeemed `user_coupons.id`
    pub coupon_id: Option<i64>,
    /// Set on payment
    pub pay_type: Option<PayType>,
    /// Current lifecycle state
    pub status: OrderStatus,
    /// Receiver name at creation time
    pub receiver_name: String,
    /// Receiver phone at creation time
    pub receiver_phone: String,
    /// Composed receiver address at creation time
    pub receiver_address: String,
    /// Buyer note
    pub remark: Option<String>,
    /// Set on payment
    pub pay_time: Option<DateTime>,
    /// Set on shipment
    pub ship_time: Option<DateTime>,
    /// Set when the buyer confirms receipt
    pub receive_time: Option<DateTime>,
    /// Carrier name
    pub tracking_company: Option<String>,
    /// Carrier tracking number
    pub tracking_no: Option<String>,
    /// Whether the buyer has reviewed the order
    pub is_reviewed: bool,
    /// Amount recorded by the refund path
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub refund_amount: Option<Decimal>,
    /// Reason given by the buyer or the operator
    pub refund_reason: Option<String>,
    /// Set when the refund completes
    pub refund_time: Option<DateTime>,
    /// When the order was created
    pub created_at: DateTime,
    /// When the order was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between orders, their items and buyers
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many line snapshots
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// Each order belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
