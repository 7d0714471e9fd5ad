//! Coin ledger primitives.
//!
//! A user's `sport_coins` and `food_coins` counters are mirrored by an append-only
//! list of signed ledger entries. [`apply_delta`] is the only writer of those
//! counters: it changes the counter with one conditional `UPDATE` that refuses to
//! go below zero, then appends the entry carrying the resulting balance. Both
//! happen on the caller's connection, so inside a transaction they commit or roll
//! back together and the ledger always sums to the counter.

use crate::{
    core::Page,
    entities::{CoinRecord, CoinType, LedgerEntry, User, coin_record, user},
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, instrument};

/// Source kinds recorded on ledger entries.
pub mod sources {
    /// Daily check-in streak reward
    pub const DAILY_CHECKIN: &str = "daily_checkin";
    /// Sport check-in streak reward
    pub const SPORT_CHECKIN: &str = "sport_checkin";
    /// Coins for a recorded workout
    pub const SPORT_RECORD: &str = "sport_record";
    /// Coins for a logged meal
    pub const FOOD_RECORD: &str = "food_record";
    /// Once-a-day food check-in
    pub const FOOD_CHECKIN: &str = "food_checkin";
    /// Coins spent on a shop item
    pub const EXCHANGE: &str = "exchange";
    /// Claimed daily task reward
    pub const TASK_REWARD: &str = "task_reward";
}

/// Largest page a ledger listing may request.
pub const MAX_PAGE_SIZE: u64 = 50;

/// Snapshot of a user's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Sport coin counter
    pub sport_coins: i64,
    /// Food coin counter
    pub food_coins: i64,
    /// Stored money balance, untouched by the coin ledger
    pub balance: Decimal,
}

const fn coin_column(coin_type: CoinType) -> user::Column {
    match coin_type {
        CoinType::Sport => user::Column::SportCoins,
        CoinType::Food => user::Column::FoodCoins,
    }
}

/// Applies a signed coin change and appends its ledger entry.
///
/// The counter update is a single statement:
/// `UPDATE users SET <coin> = <coin> + amount WHERE id = ? AND <coin> >= -amount`.
/// When no row matches, the user is re-read to tell a missing user apart from an
/// insufficient balance.
///
/// # Errors
/// * `InvalidAmount` for a zero amount, or one whose negation does not fit in `i64`
/// * `NotFound` when the user does not exist
/// * `InsufficientBalance` when a debit would take the counter below zero
#[allow(clippy::too_many_arguments)]
#[instrument(skip(db, description))]
pub async fn apply_delta<C>(
    db: &C,
    user_id: i64,
    coin_type: CoinType,
    amount: i64,
    source: &str,
    source_id: Option<i64>,
    description: &str,
    now: NaiveDateTime,
) -> Result<LedgerEntry>
where
    C: ConnectionTrait,
{
    if amount == 0 || amount == i64::MIN {
        return Err(Error::InvalidAmount {
            amount: Decimal::from(amount),
        });
    }

    let column = coin_column(coin_type);
    let mut update = User::update_many()
        .col_expr(column, Expr::col(column).add(amount))
        .col_expr(user::Column::UpdatedAt, Expr::value(now))
        .filter(user::Column::Id.eq(user_id));
    if amount < 0 {
        update = update.filter(column.gte(-amount));
    }

    let result = update.exec(db).await?;
    if result.rows_affected == 0 {
        let user = User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id))?;
        return Err(Error::InsufficientBalance {
            coin_type: coin_type.to_string(),
            current: user.coins(coin_type),
            required: -amount,
        });
    }

    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;
    let balance = user.coins(coin_type);

    let entry = coin_record::ActiveModel {
        user_id: Set(user_id),
        coin_type: Set(coin_type),
        amount: Set(amount),
        balance: Set(balance),
        source: Set(source.to_string()),
        source_id: Set(source_id),
        description: Set(description.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        "{} {} coins for user {} -> {}",
        amount, coin_type, user_id, balance
    );
    Ok(entry)
}

/// Reads the current balances.
pub async fn get_balance<C>(db: &C, user_id: i64) -> Result<Balance>
where
    C: ConnectionTrait,
{
    let user = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    Ok(Balance {
        sport_coins: user.sport_coins,
        food_coins: user.food_coins,
        balance: user.balance,
    })
}

/// Lists ledger entries newest first, optionally restricted to one coin type.
///
/// `page` starts at 1; `page_size` must be between 1 and [`MAX_PAGE_SIZE`].
pub async fn list_entries<C>(
    db: &C,
    user_id: i64,
    coin_type: Option<CoinType>,
    page: u64,
    page_size: u64,
) -> Result<Page<LedgerEntry>>
where
    C: ConnectionTrait,
{
    if page == 0 {
        return Err(Error::validation("page starts at 1"));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(Error::validation(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let mut query = CoinRecord::find().filter(coin_record::Column::UserId.eq(user_id));
    if let Some(coin_type) = coin_type {
        query = query.filter(coin_record::Column::CoinType.eq(coin_type));
    }

    let paginator = query
        .order_by_desc(coin_record::Column::CreatedAt)
        .order_by_desc(coin_record::Column::Id)
        .paginate(db, page_size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items,
        total,
        page,
        page_size,
    })
}

/// Sum of the positive entries of one coin type, optionally for a single source.
pub async fn total_earned<C>(
    db: &C,
    user_id: i64,
    coin_type: CoinType,
    source: Option<&str>,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let mut query = CoinRecord::find()
        .select_only()
        .column_as(Expr::col(coin_record::Column::Amount).sum(), "total")
        .filter(coin_record::Column::UserId.eq(user_id))
        .filter(coin_record::Column::CoinType.eq(coin_type))
        .filter(coin_record::Column::Amount.gt(0));
    if let Some(source) = source {
        query = query.filter(coin_record::Column::Source.eq(source));
    }

    let total: Option<Option<i64>> = query.into_tuple().one(db).await?;
    Ok(total.flatten().unwrap_or(0))
}
