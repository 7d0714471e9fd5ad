//! Order item entity - Immutable per-line snapshot of product data at order time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the order line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this line belongs to
    #[sea_orm(indexed)]
    pub order_id: i64,
    /// Product bought
    pub product_id: i64,
    /// Product name at order time
    pub product_name: String,
    /// Product image at order time
    pub product_image: Option<String>,
    /// Chosen specification, if any
    pub spec_name: Option<String>,
    /// Unit price charged
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// Units bought
    pub quantity: i32,
    /// When the order was created
    pub created_at: DateTime,
}

impl Model {
    /// Unit price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Defines relationships between order lines and orders
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
