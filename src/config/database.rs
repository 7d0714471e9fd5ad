//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. The composite unique keys that the
//! transaction core relies on are added as explicit indexes after the tables exist:
//! one check-in and one food check-in per user per day, one task record per user per
//! task per day, and one issued coupon per user per template. Every statement is `IF NOT EXISTS`, so calling
//! [`create_tables`] on an existing database is a no-op.

use crate::entities::{
    Address, CartItem, CheckinRecord, CoinRecord, Coupon, DailyTask, FoodCheckinRecord, FoodRecord,
    Order, OrderItem, Product, ProductReview, SportGoal, SportRecord, User, UserCoupon,
    UserTaskRecord, checkin_record, food_checkin_record, user_coupon, user_task_record,
};
use crate::errors::{Error, Result};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/vitashop.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
pub fn get_database_url() -> Result<String> {
    Ok(std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()))
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url()?;
    ensure_sqlite_dir(&database_url)?;
    tracing::debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates the parent directory of a file-backed `SQLite` URL.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(file)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::Config {
            message: format!(
                "Failed to create database directory {}: {e}",
                parent.display()
            ),
        })?;
    }
    Ok(())
}

async fn create_entity_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

/// Creates all tables and indexes.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_entity_table(db, &schema, User).await?;
    create_entity_table(db, &schema, CoinRecord).await?;
    create_entity_table(db, &schema, CheckinRecord).await?;
    create_entity_table(db, &schema, Product).await?;
    create_entity_table(db, &schema, CartItem).await?;
    create_entity_table(db, &schema, Coupon).await?;
    create_entity_table(db, &schema, UserCoupon).await?;
    create_entity_table(db, &schema, Address).await?;
    create_entity_table(db, &schema, Order).await?;
    create_entity_table(db, &schema, OrderItem).await?;
    create_entity_table(db, &schema, ProductReview).await?;
    create_entity_table(db, &schema, SportRecord).await?;
    create_entity_table(db, &schema, FoodRecord).await?;
    create_entity_table(db, &schema, FoodCheckinRecord).await?;
    create_entity_table(db, &schema, SportGoal).await?;
    create_entity_table(db, &schema, DailyTask).await?;
    create_entity_table(db, &schema, UserTaskRecord).await?;

    let checkin_unique = Index::create()
        .name("uq_checkin_user_date")
        .table(CheckinRecord)
        .col(checkin_record::Column::UserId)
        .col(checkin_record::Column::CheckinDate)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&checkin_unique)).await?;

    let food_checkin_unique = Index::create()
        .name("uq_food_checkin_user_date")
        .table(FoodCheckinRecord)
        .col(food_checkin_record::Column::UserId)
        .col(food_checkin_record::Column::CheckinDate)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&food_checkin_unique)).await?;

    let task_record_unique = Index::create()
        .name("uq_task_record_user_task_date")
        .table(UserTaskRecord)
        .col(user_task_record::Column::UserId)
        .col(user_task_record::Column::TaskId)
        .col(user_task_record::Column::TaskDate)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&task_record_unique)).await?;

    let user_coupon_unique = Index::create()
        .name("uq_user_coupon_user_coupon")
        .table(UserCoupon)
        .col(user_coupon::Column::UserId)
        .col(user_coupon::Column::CouponId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&user_coupon_unique)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{LedgerEntry, OrderModel, UserModel, UserTaskRecordModel};
    use chrono::NaiveDate;
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<LedgerEntry> = CoinRecord::find().limit(1).all(&db).await?;
        let _: Vec<OrderModel> = Order::find().limit(1).all(&db).await?;
        let _: Vec<UserTaskRecordModel> = UserTaskRecord::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_checkin_unique_index_rejects_second_row() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let now = date.and_hms_opt(8, 0, 0).unwrap();
        let row = || checkin_record::ActiveModel {
            user_id: Set(1),
            checkin_date: Set(date),
            sport_coins_earned: Set(5),
            food_coins_earned: Set(5),
            is_continuous: Set(false),
            continuous_days: Set(1),
            created_at: Set(now),
            ..Default::default()
        };

        row().insert(&db).await?;
        let second = row().insert(&db).await;
        let err: Error = second.unwrap_err().into();
        assert!(matches!(err, Error::Conflict { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_food_checkin_unique_index_rejects_second_row() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let row = |hour| food_checkin_record::ActiveModel {
            user_id: Set(1),
            checkin_date: Set(date),
            coins_earned: Set(5),
            created_at: Set(date.and_hms_opt(hour, 0, 0).unwrap()),
            ..Default::default()
        };

        row(8).insert(&db).await?;
        let err: Error = row(20).insert(&db).await.unwrap_err().into();
        assert!(matches!(err, Error::Conflict { .. }));
        Ok(())
    }
}
