//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::ledger,
    entities::{
        self, CoinRecord, CoinType, CouponType, UserCouponStatus, address, coin_record, coupon,
        daily_task, product, user, user_coupon,
    },
    errors::Result,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, Set,
};
use std::path::{Path, PathBuf};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database in WAL mode with a pool of up to
/// `max_connections`, so transactions on different connections really overlap.
///
/// Call [`remove_file_test_db`] with the returned path once done.
pub async fn setup_file_test_db(
    name: &str,
    max_connections: u32,
) -> Result<(DatabaseConnection, PathBuf)> {
    let path = std::env::temp_dir().join(format!("vitashop-{name}-{}.sqlite", std::process::id()));
    remove_file_test_db(&path);

    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options.max_connections(max_connections).sqlx_logging(false);
    let db = Database::connect(options).await?;
    db.execute_unprepared("PRAGMA journal_mode=WAL").await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, path))
}

/// Deletes a database created by [`setup_file_test_db`] along with its WAL files.
pub fn remove_file_test_db(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}

/// Fixed reference instant: Wednesday 2024-05-15 10:00:00.
#[allow(clippy::unwrap_used)]
pub fn test_now() -> NaiveDateTime {
    test_date(2024, 5, 15).and_hms_opt(10, 0, 0).unwrap()
}

/// Date shorthand for tests.
#[allow(clippy::unwrap_used)]
pub fn test_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Money helper: `money(1990)` is 19.90.
pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Creates a regular user with no coins and no streak.
pub async fn create_test_user(db: &DatabaseConnection, nickname: &str) -> Result<user::Model> {
    let model = user::ActiveModel {
        nickname: Set(nickname.to_string()),
        member_level: Set(0),
        member_expire_time: Set(None),
        weight_kg: Set(None),
        sport_coins: Set(0),
        food_coins: Set(0),
        balance: Set(Decimal::ZERO),
        continuous_checkin_days: Set(0),
        total_checkin_days: Set(0),
        last_checkin_date: Set(None),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a level-1 member whose membership lapses at `expires` (never when `None`).
pub async fn create_member_user(
    db: &DatabaseConnection,
    nickname: &str,
    expires: Option<NaiveDateTime>,
) -> Result<user::Model> {
    let user = create_test_user(db, nickname).await?;
    let mut active: user::ActiveModel = user.into();
    active.member_level = Set(1);
    active.member_expire_time = Set(expires);
    Ok(active.update(db).await?)
}

/// Creates a user and funds both coin types through the ledger, so the ledger
/// and the counters agree from the start.
pub async fn create_funded_user(
    db: &DatabaseConnection,
    nickname: &str,
    sport_coins: i64,
    food_coins: i64,
) -> Result<user::Model> {
    let user = create_test_user(db, nickname).await?;
    for (coin_type, amount) in [(CoinType::Sport, sport_coins), (CoinType::Food, food_coins)] {
        if amount > 0 {
            ledger::apply_delta(
                db,
                user.id,
                coin_type,
                amount,
                ledger::sources::TASK_REWARD,
                None,
                "test funding",
                test_now(),
            )
            .await?;
        }
    }
    reload_user(db, user.id).await
}

/// Re-reads a user row.
pub async fn reload_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    entities::User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| crate::errors::Error::not_found("user", user_id))
}

/// Net sum of a user's ledger entries for one coin type.
pub async fn ledger_sum(db: &DatabaseConnection, user_id: i64, coin_type: CoinType) -> Result<i64> {
    let entries = CoinRecord::find()
        .filter(coin_record::Column::UserId.eq(user_id))
        .filter(coin_record::Column::CoinType.eq(coin_type))
        .all(db)
        .await?;
    Ok(entries.iter().map(|entry| entry.amount).sum())
}

/// Creates an on-sale product without a member price.
///
/// # Defaults
/// * `original_price`: equal to `price`
/// * `is_on_sale`: true
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    stock: i32,
) -> Result<product::Model> {
    create_custom_product(db, name, price, None, stock, true).await
}

/// Creates a product with custom parameters.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    member_price: Option<Decimal>,
    stock: i32,
    is_on_sale: bool,
) -> Result<product::Model> {
    let model = product::ActiveModel {
        name: Set(name.to_string()),
        image: Set(Some(format!("https://img.example/{name}.png"))),
        original_price: Set(price),
        current_price: Set(price),
        member_price: Set(member_price),
        stock: Set(stock),
        sales_count: Set(0),
        is_on_sale: Set(is_on_sale),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates a shipping address for `user_id`.
pub async fn create_test_address(db: &DatabaseConnection, user_id: i64) -> Result<address::Model> {
    let model = address::ActiveModel {
        user_id: Set(user_id),
        receiver_name: Set("Li Lei".to_string()),
        receiver_phone: Set("13800000000".to_string()),
        province: Set("Zhejiang".to_string()),
        city: Set("Hangzhou".to_string()),
        district: Set("Xihu".to_string()),
        detail: Set("1 Lakeside Rd".to_string()),
        is_default: Set(true),
        created_at: Set(test_now()),
        updated_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates an active coupon template valid from yesterday for 30 days.
///
/// # Defaults
/// * `total_count`: 100
/// * `used_count`: 0
pub async fn create_test_coupon(
    db: &DatabaseConnection,
    coupon_type: CouponType,
    value: Decimal,
    min_amount: Decimal,
    max_discount: Option<Decimal>,
) -> Result<coupon::Model> {
    let model = coupon::ActiveModel {
        name: Set(format!("{coupon_type:?} {value}")),
        coupon_type: Set(coupon_type),
        value: Set(value),
        min_amount: Set(min_amount),
        max_discount: Set(max_discount),
        total_count: Set(100),
        used_count: Set(0),
        start_time: Set(test_now() - Duration::days(1)),
        end_time: Set(test_now() + Duration::days(30)),
        is_active: Set(true),
        created_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Inserts an unused coupon instance for `user_id` directly.
pub async fn issue_test_coupon(
    db: &DatabaseConnection,
    user_id: i64,
    coupon_id: i64,
) -> Result<user_coupon::Model> {
    let model = user_coupon::ActiveModel {
        user_id: Set(user_id),
        coupon_id: Set(coupon_id),
        status: Set(UserCouponStatus::Unused),
        used_time: Set(None),
        order_id: Set(None),
        received_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Creates an active daily task.
pub async fn create_test_task(
    db: &DatabaseConnection,
    task_type: &str,
    target_value: i32,
    reward_coin_type: CoinType,
    reward_amount: i64,
) -> Result<daily_task::Model> {
    let model = daily_task::ActiveModel {
        name: Set(format!("{task_type} x{target_value}")),
        description: Set(None),
        task_type: Set(task_type.to_string()),
        target_value: Set(target_value),
        reward_coin_type: Set(reward_coin_type),
        reward_amount: Set(reward_amount),
        is_active: Set(true),
        sort_order: Set(0),
        created_at: Set(test_now()),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}
