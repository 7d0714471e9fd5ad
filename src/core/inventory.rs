//! Inventory guard - the only writer of product `stock` and `sales_count`.
//!
//! Reservations are compare-and-swap updates:
//! `UPDATE products SET stock = stock - q WHERE id = ? AND is_on_sale AND stock >= q`.
//! The check and the decrement are one statement, so two buyers racing for the
//! last unit cannot both succeed and stock never goes negative.

use crate::{
    entities::{Product, ProductModel, product},
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, sea_query::Expr};
use tracing::{debug, instrument};

fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(Error::validation(format!(
            "quantity must be at least 1, got {quantity}"
        )));
    }
    Ok(())
}

async fn load_product<C>(db: &C, product_id: i64) -> Result<ProductModel>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("product", product_id))
}

fn out_of_stock(product: &ProductModel, requested: i32) -> Error {
    Error::OutOfStock {
        product_id: product.id,
        requested,
        available: if product.is_on_sale { product.stock } else { 0 },
    }
}

/// Atomically takes `quantity` units out of stock.
///
/// # Errors
/// * `NotFound` when the product does not exist
/// * `OutOfStock` when fewer than `quantity` units remain or the product is off sale
#[instrument(skip(db))]
pub async fn reserve<C>(
    db: &C,
    product_id: i64,
    quantity: i32,
    now: NaiveDateTime,
) -> Result<ProductModel>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::IsOnSale.eq(true))
        .filter(product::Column::Stock.gte(quantity))
        .exec(db)
        .await?;

    let product = load_product(db, product_id).await?;
    if result.rows_affected == 0 {
        return Err(out_of_stock(&product, quantity));
    }

    debug!(
        "Reserved {} of product {}, {} left",
        quantity, product_id, product.stock
    );
    Ok(product)
}

/// Puts `quantity` units back. Must be called exactly once per reservation being
/// reversed; callers gate it on the order status.
#[instrument(skip(db))]
pub async fn release<C>(
    db: &C,
    product_id: i64,
    quantity: i32,
    now: NaiveDateTime,
) -> Result<ProductModel>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("product", product_id));
    }

    load_product(db, product_id).await
}

/// Adds `quantity` to the product's sales counter once an order is paid.
#[instrument(skip(db))]
pub async fn record_sales<C>(
    db: &C,
    product_id: i64,
    quantity: i32,
    now: NaiveDateTime,
) -> Result<()>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;

    let result = Product::update_many()
        .col_expr(
            product::Column::SalesCount,
            Expr::col(product::Column::SalesCount).add(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(product_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("product", product_id));
    }
    Ok(())
}

/// Checks, without side effects, that `quantity` units could be reserved right now.
pub async fn check_availability<C>(db: &C, product_id: i64, quantity: i32) -> Result<ProductModel>
where
    C: ConnectionTrait,
{
    validate_quantity(quantity)?;

    let product = load_product(db, product_id).await?;
    if !product.is_on_sale || product.stock < quantity {
        return Err(out_of_stock(&product, quantity));
    }
    Ok(product)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::errors::ErrorKind;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase, TransactionTrait};

    #[tokio::test]
    async fn test_reserve_rejects_non_positive_quantity() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        for quantity in [0, -3] {
            let result = reserve(&db, 1, quantity, test_now()).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Yoga Mat", money(9900), 5).await?;

        let updated = reserve(&db, product.id, 3, test_now()).await?;
        assert_eq!(updated.stock, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_more_than_available() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Dumbbell", money(5000), 2).await?;

        let result = reserve(&db, product.id, 3, test_now()).await;
        assert!(matches!(
            result,
            Err(Error::OutOfStock {
                requested: 3,
                available: 2,
                ..
            })
        ));

        let unchanged = check_availability(&db, product.id, 2).await?;
        assert_eq!(unchanged.stock, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_off_sale_product_reports_zero_available() -> Result<()> {
        let db = setup_test_db().await?;
        let product =
            create_custom_product(&db, "Retired Shaker", money(2000), None, 10, false).await?;

        let result = reserve(&db, product.id, 1, test_now()).await;
        assert!(matches!(
            result,
            Err(Error::OutOfStock { available: 0, .. })
        ));
        assert!(check_availability(&db, product.id, 1).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() -> Result<()> {
        let db = setup_test_db().await?;
        let result = reserve(&db, 42, 1, test_now()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound {
                entity: "product",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_release_and_record_sales() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_test_product(&db, "Jump Rope", money(1500), 4).await?;

        reserve(&db, product.id, 4, test_now()).await?;
        let restored = release(&db, product.id, 4, test_now()).await?;
        assert_eq!(restored.stock, 4);

        record_sales(&db, product.id, 2, test_now()).await?;
        let product = check_availability(&db, product.id, 1).await?;
        assert_eq!(product.sales_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_write_on_stale_snapshot_is_retryable_conflict() -> Result<()> {
        let (db, path) = setup_file_test_db("stale-snapshot", 4).await?;
        let product = create_test_product(&db, "Foam Roller", money(3900), 3).await?;

        let slow = db.begin().await?;
        check_availability(&slow, product.id, 1).await?;

        let fast = db.begin().await?;
        reserve(&fast, product.id, 1, test_now()).await?;
        fast.commit().await?;

        let result = reserve(&slow, product.id, 1, test_now()).await;
        drop(slow);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict, "{err}");
        assert!(err.is_retryable());

        assert_eq!(check_availability(&db, product.id, 1).await?.stock, 2);
        db.close().await?;
        remove_file_test_db(&path);
        Ok(())
    }
}
