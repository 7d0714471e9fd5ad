//! Coin exchange for shop items.
//!
//! An item costs `floor(current_price x points_per_yuan)` coins per unit. Stock is
//! reserved first; the cost is then taken from sport coins and any remainder from
//! food coins, each as its own ledger entry pointing at the product.

use crate::{
    config::rewards::ExchangePolicy,
    core::{inventory, ledger},
    entities::{CoinType, LedgerEntry, ProductModel, User},
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use serde::Serialize;
use tracing::{info, instrument};

/// Outcome of a coin exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeReceipt {
    /// Product as read before the exchange
    pub product: ProductModel,
    /// Units exchanged
    pub quantity: i32,
    /// Total coins charged
    pub coin_cost: i64,
    /// Part of the cost paid in sport coins
    pub sport_spent: i64,
    /// Part of the cost paid in food coins
    pub food_spent: i64,
    /// Ledger rows written, sport first
    pub entries: Vec<LedgerEntry>,
}

/// Coin price of one unit of a product.
pub fn unit_cost(product: &ProductModel, policy: &ExchangePolicy) -> Result<i64> {
    (product.current_price * Decimal::from(policy.points_per_yuan))
        .floor()
        .to_i64()
        .ok_or_else(|| Error::validation(format!("product {} is not exchangeable", product.id)))
}

/// Exchanges coins for `quantity` units of a product.
///
/// # Errors
/// * `NotFound` for an unknown user or product
/// * `OutOfStock` when the product cannot supply `quantity`
/// * `InvalidAmount` when the total cost does not fit in a coin counter
/// * `InsufficientBalance` when sport and food coins together do not cover the cost
#[instrument(skip(db, policy))]
pub async fn exchange(
    db: &DatabaseConnection,
    user_id: i64,
    product_id: i64,
    quantity: i32,
    policy: &ExchangePolicy,
    now: NaiveDateTime,
) -> Result<ExchangeReceipt> {
    let txn = db.begin().await?;

    let user = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let product = inventory::reserve(&txn, product_id, quantity, now).await?;
    let unit = unit_cost(&product, policy)?;
    let coin_cost = unit
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| Error::InvalidAmount {
            amount: Decimal::from(unit) * Decimal::from(quantity),
        })?;

    let available = user.sport_coins.saturating_add(user.food_coins);
    if available < coin_cost {
        return Err(Error::InsufficientBalance {
            coin_type: "sport+food".to_string(),
            current: available,
            required: coin_cost,
        });
    }

    let sport_spent = user.sport_coins.min(coin_cost);
    let food_spent = coin_cost - sport_spent;
    let description = format!("Exchange {} x{}", product.name, quantity);

    let mut entries = Vec::with_capacity(2);
    for (coin_type, spent) in [(CoinType::Sport, sport_spent), (CoinType::Food, food_spent)] {
        if spent > 0 {
            let entry = ledger::apply_delta(
                &txn,
                user_id,
                coin_type,
                -spent,
                ledger::sources::EXCHANGE,
                Some(product.id),
                &description,
                now,
            )
            .await?;
            entries.push(entry);
        }
    }

    txn.commit().await?;
    info!(
        "User {} exchanged {} coins for {} x{}",
        user_id, coin_cost, product.name, quantity
    );

    Ok(ExchangeReceipt {
        product,
        quantity,
        coin_cost,
        sport_spent,
        food_spent,
        entries,
    })
}
