//! Order state machine.
//!
//! ```text
//! pending -> paid -> shipped -> received -> completed
//!    |        |  \______|________________
//!    v        v         v                \
//! cancelled  refunding -------------> refunded
//! ```
//!
//! Every transition is checked against [`OrderStatus::can_transition_to`] and then
//! written with a compare-and-swap on the status that was read, so two concurrent
//! requests (double pay, pay racing cancel) cannot both win: the loser sees
//! `Conflict`. Stock and coupon side effects run in the same transaction as the
//! status change, which makes them happen exactly once per transition.

use crate::{
    config::rewards::{CouponPolicy, OrderPolicy},
    core::{Actor, cart, coupon, inventory},
    entities::{
        Address, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus, PayType, ProductModel,
        ReceiverSnapshot, order, order_item, product_review,
    },
    errors::{Error, ErrorKind, Result},
};
use chrono::NaiveDateTime;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, UpdateMany, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

const RETRY_BACKOFF_MS: u64 = 20;

/// One requested line of a new order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderLine {
    /// Product to buy
    pub product_id: i64,
    /// Units, at least 1
    pub quantity: i32,
    /// Variant label such as a size
    #[serde(default)]
    pub spec_name: Option<String>,
}

/// Checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewOrder {
    /// Delivery address, must belong to the caller
    pub address_id: i64,
    /// Lines to buy, at least one
    pub items: Vec<OrderLine>,
    /// Id of the caller's coupon instance (a `user_coupons` row)
    #[serde(default)]
    pub coupon_id: Option<i64>,
    /// Free-text note for the shop
    #[serde(default)]
    pub remark: Option<String>,
}

/// What `create` hands back for the payment screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    /// Row id of the new order
    pub order_id: i64,
    /// Human-facing order number
    pub order_no: String,
    /// Sum of line subtotals before the coupon
    pub total_amount: Decimal,
    /// Coupon discount, zero without one
    pub discount_amount: Decimal,
    /// Amount due
    pub pay_amount: Decimal,
}

/// Review left on a completed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewInput {
    /// 1 to 5
    pub rating: i32,
    /// Review text
    #[serde(default)]
    pub content: Option<String>,
    /// Hide the reviewer name
    #[serde(default)]
    pub is_anonymous: bool,
}

/// An order with its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    /// The order row
    pub order: OrderModel,
    /// Its lines, in insertion order
    pub items: Vec<OrderItemModel>,
}

/// `YYYYMMDDHHMMSS` followed by six random digits.
#[must_use]
pub fn generate_order_no(now: NaiveDateTime) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{suffix:06}", now.format("%Y%m%d%H%M%S"))
}

fn validate_new_order(new_order: &NewOrder) -> Result<()> {
    if new_order.items.is_empty() {
        return Err(Error::validation("an order needs at least one item"));
    }
    if let Some(line) = new_order.items.iter().find(|line| line.quantity < 1) {
        return Err(Error::validation(format!(
            "quantity for product {} must be at least 1",
            line.product_id
        )));
    }
    Ok(())
}

/// Creates a pending order from `new_order`.
///
/// Stock for every line is reserved, lines are priced (member price when the actor
/// is a member and the product has one), the coupon is evaluated and redeemed, the
/// order and its item snapshots are written and the ordered products are removed
/// from the cart, all in one transaction. An attempt that fails with `Conflict`,
/// such as a colliding order number or a coupon another order took first, is
/// retried with a fresh transaction after a short backoff, up to
/// `policy.order_no_attempts` times.
///
/// # Errors
/// * `Validation` for an empty order or a non-positive quantity
/// * `NotFound` for an unknown address or product
/// * `OutOfStock` when any line cannot be reserved (nothing is reserved then)
/// * `Ineligible` / `NotFound` for the coupon under [`CouponPolicy::Strict`]
/// * `Conflict` when every attempt collided
#[instrument(skip(db, new_order, policy), fields(user_id = actor.user_id))]
pub async fn create(
    db: &DatabaseConnection,
    actor: &Actor,
    new_order: &NewOrder,
    policy: &OrderPolicy,
    now: NaiveDateTime,
) -> Result<OrderReceipt> {
    create_with_order_no(db, actor, new_order, policy, now, generate_order_no).await
}

/// [`create`] with the order-number source supplied by the caller. Each attempt
/// asks `next_order_no` for a fresh number.
async fn create_with_order_no<F>(
    db: &DatabaseConnection,
    actor: &Actor,
    new_order: &NewOrder,
    policy: &OrderPolicy,
    now: NaiveDateTime,
    mut next_order_no: F,
) -> Result<OrderReceipt>
where
    F: FnMut(NaiveDateTime) -> String,
{
    validate_new_order(new_order)?;

    let attempts = policy.order_no_attempts.max(1);
    let mut attempt = 1;
    loop {
        let order_no = next_order_no(now);
        match try_create(db, actor, new_order, policy.coupon_policy, &order_no, now).await {
            Err(err) if err.is_retryable() && attempt < attempts => {
                warn!("Order attempt {}/{} conflicted: {}", attempt, attempts, err);
                tokio::time::sleep(retry_backoff(attempt)).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Linear backoff with jitter, so two buyers that collided do not collide again.
fn retry_backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..RETRY_BACKOFF_MS);
    Duration::from_millis(u64::from(attempt) * RETRY_BACKOFF_MS + jitter)
}

struct PricedLine<'a> {
    line: &'a OrderLine,
    product: ProductModel,
    unit_price: Decimal,
}

async fn try_create(
    db: &DatabaseConnection,
    actor: &Actor,
    new_order: &NewOrder,
    coupon_policy: CouponPolicy,
    order_no: &str,
    now: NaiveDateTime,
) -> Result<OrderReceipt> {
    let txn = db.begin().await?;

    // Reservation is the first statement so SQLite takes the write lock before
    // the transaction has read anything.
    let mut priced = Vec::with_capacity(new_order.items.len());
    let mut total_amount = Decimal::ZERO;
    for line in &new_order.items {
        let product = inventory::reserve(&txn, line.product_id, line.quantity, now).await?;
        let unit_price = product.unit_price(actor.is_member);
        total_amount += unit_price * Decimal::from(line.quantity);
        priced.push(PricedLine {
            line,
            product,
            unit_price,
        });
    }
    let total_amount = total_amount.round_dp(2);

    let address = Address::find_by_id(new_order.address_id)
        .one(&txn)
        .await?
        .filter(|address| address.user_id == actor.user_id)
        .ok_or_else(|| Error::not_found("address", new_order.address_id))?;
    let receiver = ReceiverSnapshot::from(&address);

    let evaluation = match new_order.coupon_id {
        None => None,
        Some(user_coupon_id) => {
            match coupon::evaluate(&txn, user_coupon_id, actor.user_id, total_amount, now).await {
                Ok(evaluation) => Some(evaluation),
                Err(err)
                    if coupon_policy == CouponPolicy::Lenient
                        && matches!(err.kind(), ErrorKind::Ineligible | ErrorKind::NotFound) =>
                {
                    warn!(
                        "Ignoring coupon {} for user {}: {}",
                        user_coupon_id, actor.user_id, err
                    );
                    None
                }
                Err(err) => return Err(err),
            }
        }
    };
    let applied = evaluation.filter(|evaluation| evaluation.discount > Decimal::ZERO);
    let discount_amount = applied
        .as_ref()
        .map_or(Decimal::ZERO, |evaluation| evaluation.discount);
    let pay_amount = (total_amount - discount_amount).max(Decimal::ZERO);

    let order = order::ActiveModel {
        order_no: Set(order_no.to_string()),
        user_id: Set(actor.user_id),
        total_amount: Set(total_amount),
        discount_amount: Set(discount_amount),
        pay_amount: Set(pay_amount),
        freight_amount: Set(Decimal::ZERO),
        coupon_id: Set(applied.as_ref().map(|evaluation| evaluation.user_coupon.id)),
        pay_type: Set(None),
        status: Set(OrderStatus::Pending),
        receiver_name: Set(receiver.name),
        receiver_phone: Set(receiver.phone),
        receiver_address: Set(receiver.address),
        remark: Set(new_order.remark.clone()),
        pay_time: Set(None),
        ship_time: Set(None),
        receive_time: Set(None),
        tracking_company: Set(None),
        tracking_no: Set(None),
        is_reviewed: Set(false),
        refund_amount: Set(None),
        refund_reason: Set(None),
        refund_time: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for line in &priced {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            product_name: Set(line.product.name.clone()),
            product_image: Set(line.product.image.clone()),
            spec_name: Set(line.line.spec_name.clone()),
            price: Set(line.unit_price),
            quantity: Set(line.line.quantity),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    if let Some(evaluation) = &applied {
        redeem_for_order(&txn, evaluation.user_coupon.id, order.id, now).await?;
    }

    let product_ids = priced.iter().map(|line| line.product.id).collect();
    cart::remove_products(&txn, actor.user_id, product_ids).await?;

    txn.commit().await?;
    info!(
        "Order {} created for user {}: total {}, discount {}, pay {}",
        order.order_no, actor.user_id, total_amount, discount_amount, pay_amount
    );

    Ok(OrderReceipt {
        order_id: order.id,
        order_no: order.order_no,
        total_amount,
        discount_amount,
        pay_amount,
    })
}

/// Redeems the coupon picked at evaluation time. If another order used it in the
/// meantime the attempt fails with `Conflict`, and the retry re-evaluates it.
async fn redeem_for_order<C>(
    db: &C,
    user_coupon_id: i64,
    order_id: i64,
    now: NaiveDateTime,
) -> Result<()>
where
    C: ConnectionTrait,
{
    coupon::redeem(db, user_coupon_id, order_id, now)
        .await
        .map_err(|err| match err {
            Error::Ineligible { reason } => Error::Conflict { message: reason },
            other => other,
        })
}

fn ensure_transition(order: &OrderModel, next: OrderStatus, action: &'static str) -> Result<()> {
    if order.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            order_id: order.id,
            from: order.status.to_string(),
            action,
        })
    }
}

/// Applies `update` plus the status change, but only if the order still has the
/// status it had when it was read.
async fn commit_transition<C>(
    db: &C,
    update: UpdateMany<Order>,
    order: &OrderModel,
    next: OrderStatus,
    now: NaiveDateTime,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = update
        .col_expr(order::Column::Status, Expr::value(next))
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Status.eq(order.status))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("order {} changed while moving to {next}", order.id),
        });
    }
    Ok(())
}

async fn load_order<C>(db: &C, order_id: i64) -> Result<OrderModel>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))
}

/// Loads an order, hiding other users' orders behind `NotFound`.
async fn load_owned_order<C>(db: &C, user_id: i64, order_id: i64) -> Result<OrderModel>
where
    C: ConnectionTrait,
{
    let order = load_order(db, order_id).await?;
    if order.user_id != user_id {
        return Err(Error::not_found("order", order_id));
    }
    Ok(order)
}

async fn load_items<C>(db: &C, order_id: i64) -> Result<Vec<OrderItemModel>>
where
    C: ConnectionTrait,
{
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Confirms payment of a pending order and books the sales.
#[instrument(skip(db))]
pub async fn pay(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    pay_type: PayType,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_owned_order(&txn, user_id, order_id).await?;
    ensure_transition(&order, OrderStatus::Paid, "pay")?;

    let update = Order::update_many()
        .col_expr(order::Column::PayType, Expr::value(pay_type))
        .col_expr(order::Column::PayTime, Expr::value(now));
    commit_transition(&txn, update, &order, OrderStatus::Paid, now).await?;

    for item in load_items(&txn, order.id).await? {
        inventory::record_sales(&txn, item.product_id, item.quantity, now).await?;
    }

    let paid = load_order(&txn, order.id).await?;
    txn.commit().await?;
    info!("Order {} paid with {:?}", paid.order_no, pay_type);
    Ok(paid)
}

/// Cancels a pending order, returning its stock and its coupon.
#[instrument(skip(db))]
pub async fn cancel(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_owned_order(&txn, user_id, order_id).await?;
    ensure_transition(&order, OrderStatus::Cancelled, "cancel")?;

    commit_transition(
        &txn,
        Order::update_many(),
        &order,
        OrderStatus::Cancelled,
        now,
    )
    .await?;

    for item in load_items(&txn, order.id).await? {
        inventory::release(&txn, item.product_id, item.quantity, now).await?;
    }
    if let Some(user_coupon_id) = order.coupon_id {
        coupon::unredeem(&txn, user_coupon_id).await?;
    }

    let cancelled = load_order(&txn, order.id).await?;
    txn.commit().await?;
    info!("Order {} cancelled", cancelled.order_no);
    Ok(cancelled)
}

/// Marks a paid order as shipped. Admin path, so no ownership check.
#[instrument(skip(db))]
pub async fn ship(
    db: &DatabaseConnection,
    order_id: i64,
    tracking_company: &str,
    tracking_no: &str,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_order(&txn, order_id).await?;
    ensure_transition(&order, OrderStatus::Shipped, "ship")?;

    let update = Order::update_many()
        .col_expr(order::Column::ShipTime, Expr::value(now))
        .col_expr(
            order::Column::TrackingCompany,
            Expr::value(tracking_company),
        )
        .col_expr(order::Column::TrackingNo, Expr::value(tracking_no));
    commit_transition(&txn, update, &order, OrderStatus::Shipped, now).await?;

    let shipped = load_order(&txn, order.id).await?;
    txn.commit().await?;
    Ok(shipped)
}

/// Buyer confirms delivery of a shipped order.
///
/// # Errors
/// * `NotFound` when the order is not the caller's
/// * `InvalidTransition` unless the order is shipped
#[instrument(skip(db))]
pub async fn confirm_receipt(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_owned_order(&txn, user_id, order_id).await?;
    ensure_transition(&order, OrderStatus::Received, "confirm receipt")?;

    let update = Order::update_many().col_expr(order::Column::ReceiveTime, Expr::value(now));
    commit_transition(&txn, update, &order, OrderStatus::Received, now).await?;

    let received = load_order(&txn, order.id).await?;
    txn.commit().await?;
    Ok(received)
}

/// Reviews every line of a received order and completes it.
///
/// # Errors
/// * `Validation` when the rating is outside 1..=5
/// * `InvalidTransition` before the order is received
/// * `Duplicate` when the order was already reviewed
#[instrument(skip(db, input))]
pub async fn review(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    input: &ReviewInput,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    if !(1..=5).contains(&input.rating) {
        return Err(Error::validation(format!(
            "rating must be between 1 and 5, got {}",
            input.rating
        )));
    }

    let txn = db.begin().await?;
    let order = load_owned_order(&txn, user_id, order_id).await?;
    ensure_transition(&order, OrderStatus::Completed, "review")?;
    if order.is_reviewed {
        return Err(Error::Duplicate {
            what: format!("review for order {order_id}"),
        });
    }

    let update = Order::update_many()
        .col_expr(order::Column::IsReviewed, Expr::value(true))
        .filter(order::Column::IsReviewed.eq(false));
    commit_transition(&txn, update, &order, OrderStatus::Completed, now).await?;

    for item in load_items(&txn, order.id).await? {
        product_review::ActiveModel {
            product_id: Set(item.product_id),
            user_id: Set(user_id),
            order_id: Set(order.id),
            rating: Set(input.rating),
            content: Set(input.content.clone()),
            is_anonymous: Set(input.is_anonymous),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    let completed = load_order(&txn, order.id).await?;
    txn.commit().await?;
    Ok(completed)
}

/// Moves a paid or shipped order to `refunding`.
#[instrument(skip(db))]
pub async fn request_refund(
    db: &DatabaseConnection,
    user_id: i64,
    order_id: i64,
    reason: &str,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_owned_order(&txn, user_id, order_id).await?;
    ensure_transition(&order, OrderStatus::Refunding, "request a refund")?;

    let update = Order::update_many().col_expr(order::Column::RefundReason, Expr::value(reason));
    commit_transition(&txn, update, &order, OrderStatus::Refunding, now).await?;

    let refunding = load_order(&txn, order.id).await?;
    txn.commit().await?;
    Ok(refunding)
}

/// Records a confirmed refund. `amount` defaults to the paid amount and may not
/// exceed it. No money moves here; the gateway calls this after confirming.
#[instrument(skip(db))]
pub async fn refund(
    db: &DatabaseConnection,
    order_id: i64,
    amount: Option<Decimal>,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<OrderModel> {
    let txn = db.begin().await?;
    let order = load_order(&txn, order_id).await?;
    ensure_transition(&order, OrderStatus::Refunded, "refund")?;

    let amount = amount.unwrap_or(order.pay_amount).round_dp(2);
    if amount < Decimal::ZERO || amount > order.pay_amount {
        return Err(Error::InvalidAmount { amount });
    }

    let update = Order::update_many()
        .col_expr(order::Column::RefundAmount, Expr::value(amount))
        .col_expr(
            order::Column::RefundReason,
            Expr::value(reason.or_else(|| order.refund_reason.clone())),
        )
        .col_expr(order::Column::RefundTime, Expr::value(now));
    commit_transition(&txn, update, &order, OrderStatus::Refunded, now).await?;

    let refunded = load_order(&txn, order.id).await?;
    txn.commit().await?;
    info!("Order {} refunded {}", refunded.order_no, amount);
    Ok(refunded)
}

/// The caller's order with its line snapshots.
pub async fn get_order<C>(db: &C, user_id: i64, order_id: i64) -> Result<OrderDetail>
where
    C: ConnectionTrait,
{
    let order = load_owned_order(db, user_id, order_id).await?;
    let items = load_items(db, order.id).await?;
    Ok(OrderDetail { order, items })
}
