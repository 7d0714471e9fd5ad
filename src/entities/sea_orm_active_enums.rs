//! String-backed enums stored in entity columns.
//!
//! Each enum round-trips through its `string_value`, which is also the value the
//! HTTP layer sees in JSON payloads.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two non-convertible in-app point balances.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CoinType {
    /// Earned through exercise
    #[sea_orm(string_value = "sport")]
    Sport,
    /// Earned through diet logging
    #[sea_orm(string_value = "food")]
    Food,
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sport => "sport",
            Self::Food => "food",
        })
    }
}

/// Order lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, stock reserved, awaiting payment
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payment confirmed, awaiting shipment
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Handed to the carrier
    #[sea_orm(string_value = "shipped")]
    Shipped,
    /// Buyer confirmed receipt
    #[sea_orm(string_value = "received")]
    Received,
    /// Closed; may still be reviewed once
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled before payment; stock and coupon returned
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Buyer asked for a refund
    #[sea_orm(string_value = "refunding")]
    Refunding,
    /// Money returned to the buyer
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Completed -> Completed` is allowed so that a completed but unreviewed
    /// order can still be reviewed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Shipped | Self::Refunding | Self::Refunded)
                | (
                    Self::Shipped,
                    Self::Received | Self::Refunding | Self::Refunded
                )
                | (Self::Received | Self::Completed, Self::Completed)
                | (Self::Refunding, Self::Refunded)
        )
    }

    /// Terminal states accept no further transitions (other than reviewing a completed order).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Received => "received",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunding => "refunding",
            Self::Refunded => "refunded",
        })
    }
}

/// How an order was paid. Payment itself is confirmed outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PayType {
    /// `WeChat` Pay
    #[sea_orm(string_value = "wechat")]
    Wechat,
    /// Alipay
    #[sea_orm(string_value = "alipay")]
    Alipay,
    /// Stored account balance
    #[sea_orm(string_value = "balance")]
    Balance,
    /// Paid with in-app coins
    #[sea_orm(string_value = "coins")]
    Coins,
}

/// Discount rule of a coupon template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    /// Flat amount off, capped at the subtotal
    #[sea_orm(string_value = "fixed")]
    Fixed,
    /// Percentage off, optionally capped by `max_discount`
    #[sea_orm(string_value = "percent")]
    Percent,
}

/// Lifecycle of one issued coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UserCouponStatus {
    /// Held and redeemable
    #[sea_orm(string_value = "unused")]
    Unused,
    /// Consumed by an order
    #[sea_orm(string_value = "used")]
    Used,
    /// Validity window passed while unused
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl fmt::Display for UserCouponStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unused => "unused",
            Self::Used => "used",
            Self::Expired => "expired",
        })
    }
}

/// Quantity a sport goal measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Total minutes
    #[sea_orm(string_value = "duration")]
    Duration,
    /// Total metres
    #[sea_orm(string_value = "distance")]
    Distance,
    /// Total kilocalories
    #[sea_orm(string_value = "calories")]
    Calories,
    /// Number of sessions
    #[sea_orm(string_value = "times")]
    Times,
}

/// Window length of a sport goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum GoalPeriod {
    /// Today
    #[sea_orm(string_value = "daily")]
    Daily,
    /// Monday to Sunday of the current week
    #[sea_orm(string_value = "weekly")]
    Weekly,
    /// The current calendar month
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_happy_path_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Received));
        assert!(OrderStatus::Received.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_cancel_only_from_pending() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_refund_sources() {
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Refunded));
        assert!(OrderStatus::Refunding.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Received.can_transition_to(OrderStatus::Refunded));
    }

    #[test]
    fn test_terminal_states_are_closed() {
        for next in OrderStatus::iter() {
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
            assert!(!OrderStatus::Refunded.can_transition_to(next));
        }
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }
}
