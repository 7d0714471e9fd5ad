//! Address entity - Shipping addresses owned by the address store.
//!
//! Orders never reference this table after creation; they copy a
//! [`ReceiverSnapshot`] instead, so later edits do not rewrite history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shipping address database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_addresses")]
pub struct Model {
    /// Unique identifier for the address
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the address
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Name of the person receiving the parcel
    pub receiver_name: String,
    /// Contact phone of the receiver
    pub receiver_phone: String,
    /// Province part of the address
    pub province: String,
    /// City part of the address
    pub city: String,
    /// District part of the address
    pub district: String,
    /// Street, building and room
    pub detail: String,
    /// Whether this is the owner's default address
    pub is_default: bool,
    /// When the address was added
    pub created_at: DateTime,
    /// When the address was last edited
    pub updated_at: DateTime,
}

/// Receiver fields copied onto an order at creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverSnapshot {
    /// Receiver name
    pub name: String,
    /// Receiver phone
    pub phone: String,
    /// Province, city, district and detail joined into one line
    pub address: String,
}

impl From<&Model> for ReceiverSnapshot {
    fn from(address: &Model) -> Self {
        Self {
            name: address.receiver_name.clone(),
            phone: address.receiver_phone.clone(),
            address: format!(
                "{}{}{}{}",
                address.province, address.city, address.district, address.detail
            ),
        }
    }
}

/// Addresses have no modelled relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
