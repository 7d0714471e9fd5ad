//! Product entity - Shop items and the live stock/sales counters.
//!
//! `stock` and `sales_count` are shared mutable counters touched by order creation,
//! cancellation, payment and coin exchange. They are only changed through
//! `core::inventory`, which applies compare-and-swap updates so stock never goes
//! negative.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Protein Bar")
    pub name: String,
    /// Primary image URL, copied into order snapshots
    pub image: Option<String>,
    /// List price before any promotion
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub original_price: Decimal,
    /// Price charged to regular users
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub current_price: Decimal,
    /// Price charged to members, if the product has one
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub member_price: Option<Decimal>,
    /// Units available, never negative
    pub stock: i32,
    /// Units sold through paid orders, never decreases
    pub sales_count: i32,
    /// Off-sale products cannot be reserved
    pub is_on_sale: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

impl Model {
    /// Unit price for a buyer with or without member status.
    #[must_use]
    pub fn unit_price(&self, is_member: bool) -> Decimal {
        match self.member_price {
            Some(member_price) if is_member => member_price,
            _ => self.current_price,
        }
    }
}

/// Defines relationships between products and cart lines
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One product appears in many cart lines
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
