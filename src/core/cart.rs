//! Shopping cart lines.
//!
//! Order creation removes the lines of the products it ordered.

use crate::{
    core::inventory,
    entities::{CartItem, CartItemModel, cart_item},
    errors::Result,
};
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::instrument;

/// Adds `quantity` of a product to the cart, merging into an existing line for the
/// same product and spec.
#[instrument(skip(db))]
pub async fn add_item<C>(
    db: &C,
    user_id: i64,
    product_id: i64,
    spec_id: Option<String>,
    quantity: i32,
    now: NaiveDateTime,
) -> Result<CartItemModel>
where
    C: ConnectionTrait,
{
    inventory::check_availability(db, product_id, quantity).await?;

    let spec_filter = match &spec_id {
        Some(spec) => cart_item::Column::SpecId.eq(spec.clone()),
        None => cart_item::Column::SpecId.is_null(),
    };
    let existing = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .filter(spec_filter)
        .one(db)
        .await?;

    match existing {
        Some(line) => {
            let quantity = line.quantity + quantity;
            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(quantity);
            line.is_selected = Set(true);
            line.updated_at = Set(now);
            Ok(line.update(db).await?)
        }
        None => Ok(cart_item::ActiveModel {
            user_id: Set(user_id),
            product_id: Set(product_id),
            spec_id: Set(spec_id),
            quantity: Set(quantity),
            is_selected: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?),
    }
}

/// The user's cart, oldest line first.
pub async fn list_items<C>(db: &C, user_id: i64) -> Result<Vec<CartItemModel>>
where
    C: ConnectionTrait,
{
    CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes the user's lines for any of `product_ids`. Returns the number removed.
pub(crate) async fn remove_products<C>(db: &C, user_id: i64, product_ids: Vec<i64>) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = CartItem::delete_many()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::ProductId.is_in(product_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::Error;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_add_item_merges_same_line() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let product = create_test_product(&db, "Oats", money(2500), 10).await?;

        add_item(&db, user.id, product.id, None, 1, test_now()).await?;
        let merged = add_item(&db, user.id, product.id, None, 2, test_now()).await?;
        assert_eq!(merged.quantity, 3);

        add_item(
            &db,
            user.id,
            product.id,
            Some("1kg".to_string()),
            1,
            test_now(),
        )
        .await?;
        assert_eq!(list_items(&db, user.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_item_checks_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "bob").await?;
        let product = create_test_product(&db, "Kettlebell", money(19900), 1).await?;

        let result = add_item(&db, user.id, product.id, None, 2, test_now()).await;
        assert!(matches!(result, Err(Error::OutOfStock { .. })));
        assert!(list_items(&db, user.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_products_only_touches_owner() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = create_test_user(&db, "alice").await?;
        let bob = create_test_user(&db, "bob").await?;
        let oats = create_test_product(&db, "Oats", money(2500), 10).await?;
        let nuts = create_test_product(&db, "Nuts", money(3000), 10).await?;

        add_item(&db, alice.id, oats.id, None, 1, test_now()).await?;
        add_item(&db, alice.id, nuts.id, None, 1, test_now()).await?;
        add_item(&db, bob.id, oats.id, None, 1, test_now()).await?;

        assert_eq!(remove_products(&db, alice.id, vec![oats.id]).await?, 1);
        let remaining = list_items(&db, alice.id).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].product_id, nuts.id);
        assert_eq!(list_items(&db, bob.id).await?.len(), 1);
        Ok(())
    }
}
