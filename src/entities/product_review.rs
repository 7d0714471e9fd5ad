//! Product review entity - One row per order line, written when an order is reviewed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product review database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_reviews")]
pub struct Model {
    /// Unique identifier for the review
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Reviewed product
    pub product_id: i64,
    /// Reviewer
    pub user_id: i64,
    /// Order the reviewed line came from
    pub order_id: i64,
    /// 1 to 5
    pub rating: i32,
    /// Free-text review
    pub content: Option<String>,
    /// Hide the reviewer's name when shown
    pub is_anonymous: bool,
    /// When the review was written
    pub created_at: DateTime,
}

/// Reviews have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
