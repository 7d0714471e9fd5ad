//! Cart item entity - Ephemeral lines consumed by order creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    /// Unique identifier for the cart line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the cart
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Product in the cart
    pub product_id: i64,
    /// Optional product specification (size, flavour)
    pub spec_id: Option<String>,
    /// Units wanted, at least 1
    pub quantity: i32,
    /// Whether the line is ticked for checkout
    pub is_selected: bool,
    /// When the product was first added
    pub created_at: DateTime,
    /// When the quantity last changed
    pub updated_at: DateTime,
}

/// Defines relationships between cart lines and products
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each cart line points at one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
