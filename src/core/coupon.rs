//! Coupon engine - discount math, eligibility, single-use redemption and issuing.
//!
//! A coupon template carries the rules and a shared issue pool; each user holds at
//! most one instance of a template. Instances move `unused -> used` through
//! [`redeem`] and back through [`unredeem`] when the order that used them is
//! cancelled. Both are compare-and-swap updates on the expected prior status, so a
//! coupon can never back two live orders.

use crate::{
    entities::{
        Coupon, CouponModel, CouponType, User, UserCoupon, UserCouponModel, UserCouponStatus,
        coupon, user_coupon,
    },
    errors::{Error, Result},
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use tracing::{debug, info, instrument};

/// Outcome of a successful eligibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Discount on the evaluated subtotal
    pub discount: Decimal,
    /// Instance that would be redeemed
    pub user_coupon: UserCouponModel,
    /// Its template
    pub coupon: CouponModel,
}

/// Discount a template grants on `subtotal`, rounded to 2 dp.
///
/// `fixed` takes `value` off but never more than the subtotal; `percent` takes
/// `value`% off, capped by `max_discount` when the template has one.
#[must_use]
pub fn compute_discount(coupon: &CouponModel, subtotal: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let discount = match coupon.coupon_type {
        CouponType::Fixed => coupon.value.min(subtotal),
        CouponType::Percent => {
            let raw = subtotal * coupon.value / Decimal::ONE_HUNDRED;
            match coupon.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
    };

    discount.max(Decimal::ZERO).round_dp(2)
}

/// Checks that the caller may apply `user_coupon_id` to an order of `subtotal` at `now`.
///
/// # Errors
/// * `NotFound` when the instance does not exist or belongs to another user
/// * `Ineligible` when it is not unused, or its template is inactive, outside its
///   window, or requires a larger subtotal
#[instrument(skip(db))]
pub async fn evaluate<C>(
    db: &C,
    user_coupon_id: i64,
    user_id: i64,
    subtotal: Decimal,
    now: NaiveDateTime,
) -> Result<Evaluation>
where
    C: ConnectionTrait,
{
    let user_coupon = UserCoupon::find_by_id(user_coupon_id)
        .one(db)
        .await?
        .filter(|instance| instance.user_id == user_id)
        .ok_or_else(|| Error::not_found("user_coupon", user_coupon_id))?;

    if user_coupon.status != UserCouponStatus::Unused {
        return Err(Error::ineligible(format!(
            "coupon {user_coupon_id} is {}",
            user_coupon.status
        )));
    }

    let coupon = Coupon::find_by_id(user_coupon.coupon_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("coupon", user_coupon.coupon_id))?;

    if !coupon.is_active {
        return Err(Error::ineligible(format!(
            "coupon '{}' is inactive",
            coupon.name
        )));
    }
    if !coupon.is_within_window(now) {
        return Err(Error::ineligible(format!(
            "coupon '{}' is outside its validity window",
            coupon.name
        )));
    }
    if subtotal < coupon.min_amount {
        return Err(Error::ineligible(format!(
            "subtotal {subtotal} is below the minimum {}",
            coupon.min_amount
        )));
    }

    let discount = compute_discount(&coupon, subtotal);
    Ok(Evaluation {
        discount,
        user_coupon,
        coupon,
    })
}

/// Marks an unused instance as used by `order_id`.
///
/// # Errors
/// `Ineligible` when the instance is no longer unused (another order got it first).
#[instrument(skip(db))]
pub async fn redeem<C>(db: &C, user_coupon_id: i64, order_id: i64, now: NaiveDateTime) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = UserCoupon::update_many()
        .col_expr(
            user_coupon::Column::Status,
            Expr::value(UserCouponStatus::Used),
        )
        .col_expr(user_coupon::Column::UsedTime, Expr::value(now))
        .col_expr(user_coupon::Column::OrderId, Expr::value(order_id))
        .filter(user_coupon::Column::Id.eq(user_coupon_id))
        .filter(user_coupon::Column::Status.eq(UserCouponStatus::Unused))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::ineligible(format!(
            "coupon {user_coupon_id} is no longer unused"
        )));
    }
    debug!("Coupon {} redeemed by order {}", user_coupon_id, order_id);
    Ok(())
}

/// Returns a used instance to `unused`, clearing its order and use time.
#[instrument(skip(db))]
pub async fn unredeem<C>(db: &C, user_coupon_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = UserCoupon::update_many()
        .col_expr(
            user_coupon::Column::Status,
            Expr::value(UserCouponStatus::Unused),
        )
        .col_expr(
            user_coupon::Column::UsedTime,
            Expr::value(Option::<NaiveDateTime>::None),
        )
        .col_expr(
            user_coupon::Column::OrderId,
            Expr::value(Option::<i64>::None),
        )
        .filter(user_coupon::Column::Id.eq(user_coupon_id))
        .filter(user_coupon::Column::Status.eq(UserCouponStatus::Used))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::Conflict {
            message: format!("coupon {user_coupon_id} is not in use"),
        });
    }
    Ok(())
}

/// Issues one instance of `coupon_id` to `user_id`.
///
/// The template's issued count is bumped with a CAS guarded by
/// `used_count < total_count`, so the pool is never oversubscribed.
///
/// # Errors
/// * `NotFound` when the user is unknown or the template is missing, inactive or
///   outside its window
/// * `Ineligible` when the pool is exhausted
/// * `Duplicate` when the user already holds an instance
#[instrument(skip(db))]
pub async fn receive(
    db: &DatabaseConnection,
    user_id: i64,
    coupon_id: i64,
    now: NaiveDateTime,
) -> Result<UserCouponModel> {
    let txn = db.begin().await?;

    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let template = Coupon::find_by_id(coupon_id)
        .one(&txn)
        .await?
        .filter(|template| template.is_active && template.is_within_window(now))
        .ok_or_else(|| Error::not_found("coupon", coupon_id))?;

    if template.used_count >= template.total_count {
        return Err(Error::ineligible(format!(
            "coupon '{}' is sold out",
            template.name
        )));
    }

    let already_held = UserCoupon::find()
        .filter(user_coupon::Column::UserId.eq(user_id))
        .filter(user_coupon::Column::CouponId.eq(coupon_id))
        .one(&txn)
        .await?
        .is_some();
    if already_held {
        return Err(Error::Duplicate {
            what: format!("coupon {coupon_id} already received"),
        });
    }

    let bumped = Coupon::update_many()
        .col_expr(
            coupon::Column::UsedCount,
            Expr::col(coupon::Column::UsedCount).add(1),
        )
        .filter(coupon::Column::Id.eq(coupon_id))
        .filter(Expr::col(coupon::Column::UsedCount).lt(Expr::col(coupon::Column::TotalCount)))
        .exec(&txn)
        .await?;
    if bumped.rows_affected == 0 {
        return Err(Error::ineligible(format!(
            "coupon '{}' is sold out",
            template.name
        )));
    }

    let issued = user_coupon::ActiveModel {
        user_id: Set(user_id),
        coupon_id: Set(coupon_id),
        status: Set(UserCouponStatus::Unused),
        used_time: Set(None),
        order_id: Set(None),
        received_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| match Error::from(err) {
        Error::Conflict { .. } => Error::Duplicate {
            what: format!("coupon {coupon_id} already received"),
        },
        other => other,
    })?;

    txn.commit().await?;
    info!("User {} received coupon {}", user_id, coupon_id);
    Ok(issued)
}

/// Marks unused instances whose template window has ended as expired.
///
/// Returns the number of instances expired.
#[instrument(skip(db))]
pub async fn expire_stale<C>(db: &C, now: NaiveDateTime) -> Result<u64>
where
    C: ConnectionTrait,
{
    let ended: Vec<i64> = Coupon::find()
        .select_only()
        .column(coupon::Column::Id)
        .filter(coupon::Column::EndTime.lt(now))
        .into_tuple()
        .all(db)
        .await?;
    if ended.is_empty() {
        return Ok(0);
    }

    let result = UserCoupon::update_many()
        .col_expr(
            user_coupon::Column::Status,
            Expr::value(UserCouponStatus::Expired),
        )
        .filter(user_coupon::Column::Status.eq(UserCouponStatus::Unused))
        .filter(user_coupon::Column::CouponId.is_in(ended))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!("Expired {} stale coupons", result.rows_affected);
    }
    Ok(result.rows_affected)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    fn template(
        coupon_type: CouponType,
        value: Decimal,
        max_discount: Option<Decimal>,
    ) -> CouponModel {
        CouponModel {
            id: 1,
            name: "test".to_string(),
            coupon_type,
            value,
            min_amount: Decimal::ZERO,
            max_discount,
            total_count: 10,
            used_count: 0,
            start_time: test_now(),
            end_time: test_now(),
            is_active: true,
            created_at: test_now(),
        }
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let coupon = template(CouponType::Fixed, money(2000), None);
        assert_eq!(compute_discount(&coupon, money(15000)), money(2000));
        assert_eq!(compute_discount(&coupon, money(1250)), money(1250));
        assert_eq!(compute_discount(&coupon, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_percent_discount_with_cap() {
        let capped = template(CouponType::Percent, Decimal::from(10), Some(money(1500)));
        assert_eq!(compute_discount(&capped, money(20000)), money(1500));
        assert_eq!(compute_discount(&capped, money(9999)), money(1000));

        let uncapped = template(CouponType::Percent, Decimal::from(15), None);
        assert_eq!(compute_discount(&uncapped, money(3333)), money(500));
    }

    #[tokio::test]
    async fn test_evaluate_eligible_coupon() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(1000), money(5000), None).await?;
        let instance = issue_test_coupon(&db, user.id, coupon.id).await?;

        let evaluation = evaluate(&db, instance.id, user.id, money(6000), test_now()).await?;
        assert_eq!(evaluation.discount, money(1000));
        assert_eq!(evaluation.coupon.id, coupon.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluate_rejections() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = create_test_user(&db, "owner").await?;
        let stranger = create_test_user(&db, "stranger").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(1000), money(5000), None).await?;
        let instance = issue_test_coupon(&db, owner.id, coupon.id).await?;

        let below_minimum = evaluate(&db, instance.id, owner.id, money(4999), test_now()).await;
        assert!(matches!(below_minimum, Err(Error::Ineligible { .. })));

        let not_mine = evaluate(&db, instance.id, stranger.id, money(6000), test_now()).await;
        assert!(matches!(not_mine, Err(Error::NotFound { .. })));

        let too_late = test_now() + Duration::days(31);
        let expired = evaluate(&db, instance.id, owner.id, money(6000), too_late).await;
        assert!(matches!(expired, Err(Error::Ineligible { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_is_single_use_until_unredeemed() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "bob").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(500), Decimal::ZERO, None).await?;
        let instance = issue_test_coupon(&db, user.id, coupon.id).await?;

        redeem(&db, instance.id, 11, test_now()).await?;
        let second = redeem(&db, instance.id, 12, test_now()).await;
        assert!(matches!(second, Err(Error::Ineligible { .. })));

        let used = UserCoupon::find_by_id(instance.id).one(&db).await?.unwrap();
        assert_eq!(used.status, UserCouponStatus::Used);
        assert_eq!(used.order_id, Some(11));
        assert_eq!(used.used_time, Some(test_now()));

        unredeem(&db, instance.id).await?;
        let restored = UserCoupon::find_by_id(instance.id).one(&db).await?.unwrap();
        assert_eq!(restored.status, UserCouponStatus::Unused);
        assert_eq!(restored.order_id, None);
        assert_eq!(restored.used_time, None);

        redeem(&db, instance.id, 12, test_now()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_receive_once_per_user() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "carol").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(500), Decimal::ZERO, None).await?;

        let issued = receive(&db, user.id, coupon.id, test_now()).await?;
        assert_eq!(issued.status, UserCouponStatus::Unused);

        let again = receive(&db, user.id, coupon.id, test_now()).await;
        assert!(matches!(again, Err(Error::Duplicate { .. })));

        let template = Coupon::find_by_id(coupon.id).one(&db).await?.unwrap();
        assert_eq!(template.used_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_receive_sold_out_and_inactive() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "dave").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(500), Decimal::ZERO, None).await?;

        let mut exhausted: coupon::ActiveModel = coupon.clone().into();
        exhausted.used_count = Set(100);
        exhausted.update(&db).await?;
        let sold_out = receive(&db, user.id, coupon.id, test_now()).await;
        assert!(matches!(sold_out, Err(Error::Ineligible { .. })));

        let before_window = test_now() - Duration::days(2);
        let early = receive(&db, user.id, coupon.id, before_window).await;
        assert!(matches!(early, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_expire_stale_only_touches_unused() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "erin").await?;
        let other = create_test_user(&db, "frank").await?;
        let coupon =
            create_test_coupon(&db, CouponType::Fixed, money(500), Decimal::ZERO, None).await?;
        let unused = issue_test_coupon(&db, user.id, coupon.id).await?;
        let used = issue_test_coupon(&db, other.id, coupon.id).await?;
        redeem(&db, used.id, 1, test_now()).await?;

        assert_eq!(expire_stale(&db, test_now()).await?, 0);

        let after_end = test_now() + Duration::days(31);
        assert_eq!(expire_stale(&db, after_end).await?, 1);

        let unused = UserCoupon::find_by_id(unused.id).one(&db).await?.unwrap();
        assert_eq!(unused.status, UserCouponStatus::Expired);
        let used = UserCoupon::find_by_id(used.id).one(&db).await?.unwrap();
        assert_eq!(used.status, UserCouponStatus::Used);
        Ok(())
    }
}
