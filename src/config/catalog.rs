//! Catalog seeding from config.toml.
//!
//! Products, coupon templates and daily tasks listed in the config file are
//! inserted on startup. Entries are matched by name, so re-running the seed
//! against a populated database leaves existing rows untouched.

use crate::entities::{
    CoinType, Coupon, CouponType, DailyTask, Product, coupon, daily_task, product,
};
use crate::errors::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Seed lists, flattened into the top level of config.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    /// `[[products]]` entries
    #[serde(default)]
    pub products: Vec<ProductSeed>,
    /// `[[coupons]]` entries
    #[serde(default)]
    pub coupons: Vec<CouponSeed>,
    /// `[[tasks]]` entries
    #[serde(default)]
    pub tasks: Vec<TaskSeed>,
}

/// A `[[products]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    /// Unique product name
    pub name: String,
    /// Image URL
    #[serde(default)]
    pub image: Option<String>,
    /// List price before any markdown
    pub original_price: Decimal,
    /// Price charged to regular buyers
    pub current_price: Decimal,
    /// Price charged to members, when set
    #[serde(default)]
    pub member_price: Option<Decimal>,
    /// Initial stock
    pub stock: i32,
}

/// A `[[coupons]]` entry. The validity window opens at seed time.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponSeed {
    /// Unique coupon name
    pub name: String,
    /// Fixed amount or percentage
    pub coupon_type: CouponType,
    /// Amount off, or percentage off for percent coupons
    pub value: Decimal,
    /// Smallest subtotal the coupon applies to
    #[serde(default)]
    pub min_amount: Decimal,
    /// Cap on a percentage discount
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    /// Instances that can be handed out
    pub total_count: i32,
    /// Length of the validity window
    pub valid_days: i64,
}

/// A `[[tasks]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSeed {
    /// Unique task name
    pub name: String,
    /// Longer text shown under the name
    #[serde(default)]
    pub description: Option<String>,
    /// "sport" or "food"
    pub task_type: String,
    /// Progress needed in one day
    pub target_value: i32,
    /// Coin type of the reward
    pub reward_coin_type: CoinType,
    /// Coins paid on claim
    pub reward_amount: i64,
    /// Display order, ascending
    #[serde(default)]
    pub sort_order: i32,
}

/// Number of rows inserted by [`seed_catalog`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Products inserted
    pub products: usize,
    /// Coupon templates inserted
    pub coupons: usize,
    /// Daily tasks inserted
    pub tasks: usize,
}

fn validate(catalog: &Catalog) -> Result<()> {
    for seed in &catalog.products {
        if seed.name.trim().is_empty() {
            return Err(Error::validation("Product name cannot be empty"));
        }
        if seed.stock < 0 || seed.current_price < Decimal::ZERO {
            return Err(Error::Config {
                message: format!("Product '{}' has negative stock or price", seed.name),
            });
        }
    }
    for seed in &catalog.coupons {
        if seed.total_count < 0 || seed.valid_days <= 0 {
            return Err(Error::Config {
                message: format!("Coupon '{}' needs a positive window and pool", seed.name),
            });
        }
    }
    for seed in &catalog.tasks {
        if seed.target_value <= 0 || seed.reward_amount <= 0 {
            return Err(Error::Config {
                message: format!("Task '{}' needs a positive target and reward", seed.name),
            });
        }
    }
    Ok(())
}

/// Inserts catalog entries that are not in the database yet.
///
/// Runs in one transaction; a failure leaves the catalog unchanged.
#[instrument(skip(db, catalog))]
pub async fn seed_catalog(
    db: &DatabaseConnection,
    catalog: &Catalog,
    now: NaiveDateTime,
) -> Result<SeedSummary> {
    validate(catalog)?;
    info!(
        "Seeding catalog: {} products, {} coupons, {} tasks configured",
        catalog.products.len(),
        catalog.coupons.len(),
        catalog.tasks.len()
    );

    let txn = db.begin().await?;
    let mut summary = SeedSummary::default();

    for seed in &catalog.products {
        let exists = Product::find()
            .filter(product::Column::Name.eq(seed.name.trim()))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            debug!("Product '{}' already exists, skipping", seed.name);
            continue;
        }

        product::ActiveModel {
            name: Set(seed.name.trim().to_string()),
            image: Set(seed.image.clone()),
            original_price: Set(seed.original_price.round_dp(2)),
            current_price: Set(seed.current_price.round_dp(2)),
            member_price: Set(seed.member_price.map(|price| price.round_dp(2))),
            stock: Set(seed.stock),
            sales_count: Set(0),
            is_on_sale: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.products += 1;
    }

    for seed in &catalog.coupons {
        let exists = Coupon::find()
            .filter(coupon::Column::Name.eq(seed.name.trim()))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            debug!("Coupon '{}' already exists, skipping", seed.name);
            continue;
        }

        coupon::ActiveModel {
            name: Set(seed.name.trim().to_string()),
            coupon_type: Set(seed.coupon_type),
            value: Set(seed.value.round_dp(2)),
            min_amount: Set(seed.min_amount.round_dp(2)),
            max_discount: Set(seed.max_discount.map(|cap| cap.round_dp(2))),
            total_count: Set(seed.total_count),
            used_count: Set(0),
            start_time: Set(now),
            end_time: Set(now + Duration::days(seed.valid_days)),
            is_active: Set(true),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.coupons += 1;
    }

    for seed in &catalog.tasks {
        let exists = DailyTask::find()
            .filter(daily_task::Column::Name.eq(seed.name.trim()))
            .one(&txn)
            .await?
            .is_some();
        if exists {
            debug!("Task '{}' already exists, skipping", seed.name);
            continue;
        }

        daily_task::ActiveModel {
            name: Set(seed.name.trim().to_string()),
            description: Set(seed.description.clone()),
            task_type: Set(seed.task_type.clone()),
            target_value: Set(seed.target_value),
            reward_coin_type: Set(seed.reward_coin_type),
            reward_amount: Set(seed.reward_amount),
            is_active: Set(true),
            sort_order: Set(seed.sort_order),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        summary.tasks += 1;
    }

    txn.commit().await?;
    info!(
        "Catalog seeded: {} products, {} coupons, {} tasks inserted",
        summary.products, summary.coupons, summary.tasks
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::parse_config;
    use crate::test_utils::*;
    use sea_orm::PaginatorTrait;

    const CATALOG: &str = r#"
        [[products]]
        name = "Protein Bar"
        original_price = 12.5
        current_price = 9.9
        member_price = 8.9
        stock = 40

        [[coupons]]
        name = "Ten off"
        coupon_type = "fixed"
        value = 10
        min_amount = 50
        total_count = 100
        valid_days = 30

        [[tasks]]
        name = "Log a meal"
        task_type = "food"
        target_value = 1
        reward_coin_type = "food"
        reward_amount = 5
    "#;

    #[tokio::test]
    async fn test_seed_catalog_inserts_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(CATALOG)?;

        let summary = seed_catalog(&db, &config.catalog, test_now()).await?;
        assert_eq!(
            summary,
            SeedSummary {
                products: 1,
                coupons: 1,
                tasks: 1
            }
        );

        let product = Product::find().one(&db).await?.unwrap();
        assert_eq!(product.current_price, Decimal::new(990, 2));
        assert_eq!(product.member_price, Some(Decimal::new(890, 2)));
        assert!(product.is_on_sale);

        let coupon = Coupon::find().one(&db).await?.unwrap();
        assert_eq!(coupon.end_time, test_now() + Duration::days(30));
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_catalog_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = parse_config(CATALOG)?;

        seed_catalog(&db, &config.catalog, test_now()).await?;
        let second = seed_catalog(&db, &config.catalog, test_now()).await?;

        assert_eq!(second, SeedSummary::default());
        assert_eq!(Product::find().count(&db).await?, 1);
        assert_eq!(DailyTask::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_catalog_rejects_bad_task() -> Result<()> {
        let db = setup_test_db().await?;
        let catalog = Catalog {
            tasks: vec![TaskSeed {
                name: "Broken".to_string(),
                description: None,
                task_type: "sport".to_string(),
                target_value: 0,
                reward_coin_type: CoinType::Sport,
                reward_amount: 5,
                sort_order: 0,
            }],
            ..Default::default()
        };

        let result = seed_catalog(&db, &catalog, test_now()).await;
        assert!(matches!(result, Err(Error::Config { .. })));
        assert_eq!(DailyTask::find().count(&db).await?, 0);
        Ok(())
    }
}
