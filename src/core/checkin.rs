//! Daily and sport check-in.
//!
//! One check-in record per user per calendar date, enforced twice: a pre-check
//! gives a clean `AlreadyCheckedIn`, and the `(user_id, checkin_date)` unique
//! index catches the concurrent second request that slips past it.
//!
//! The streak continues when the previous check-in was yesterday and restarts at 1
//! otherwise. Rewards come from a [`CheckinPolicy`]: `base_reward` times the
//! streak, with the multiplier capped at `cap`.

use crate::{
    config::rewards::CheckinPolicy,
    core::ledger,
    entities::{
        CheckinRecord, CheckinRecordModel, CoinType, User, UserModel, checkin_record, user,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};

/// What the check-in screen shows before the user taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckinStatus {
    /// A check-in exists for today
    pub checked_in_today: bool,
    /// Streak that is still alive (0 once a day has been missed)
    pub continuous_days: i32,
    /// Coins per granted type the next check-in would earn
    pub next_reward: i64,
}

/// Lifetime check-in figures for the profile screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckinStats {
    /// Days checked in, ever
    pub total_days: i32,
    /// Days checked in this calendar month
    pub month_days: usize,
    /// Longest streak reached
    pub max_streak: i32,
    /// Sport coins paid by daily check-ins
    pub sport_coins_earned: i64,
    /// Food coins paid by daily check-ins
    pub food_coins_earned: i64,
}

async fn load_user<C>(db: &C, user_id: i64) -> Result<UserModel>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))
}

/// Streak length after checking in on `today`.
fn next_streak(user: &UserModel, today: NaiveDate) -> i32 {
    match (user.last_checkin_date, today.pred_opt()) {
        (Some(last), Some(yesterday)) if last == yesterday => user.continuous_checkin_days + 1,
        _ => 1,
    }
}

/// Checks the user in for `now`'s calendar date and pays the streak reward.
///
/// # Errors
/// * `NotFound` when the user does not exist
/// * `AlreadyCheckedIn` on a second check-in the same day; balances are untouched
#[instrument(skip(db, policy), fields(source = %policy.source))]
pub async fn check_in(
    db: &DatabaseConnection,
    user_id: i64,
    policy: &CheckinPolicy,
    now: NaiveDateTime,
) -> Result<CheckinRecordModel> {
    let today = now.date();
    let txn = db.begin().await?;

    let user = load_user(&txn, user_id).await?;
    let existing = CheckinRecord::find()
        .filter(checkin_record::Column::UserId.eq(user_id))
        .filter(checkin_record::Column::CheckinDate.eq(today))
        .one(&txn)
        .await?;
    if existing.is_some() || user.last_checkin_date == Some(today) {
        return Err(Error::AlreadyCheckedIn { date: today });
    }

    let continuous_days = next_streak(&user, today);
    let reward = policy.reward(continuous_days);
    let sport_coins = if policy.grant_sport { reward } else { 0 };
    let food_coins = if policy.grant_food { reward } else { 0 };

    let record = checkin_record::ActiveModel {
        user_id: Set(user_id),
        checkin_date: Set(today),
        sport_coins_earned: Set(sport_coins),
        food_coins_earned: Set(food_coins),
        is_continuous: Set(continuous_days > 1),
        continuous_days: Set(continuous_days),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| match Error::from(err) {
        Error::Conflict { .. } => Error::AlreadyCheckedIn { date: today },
        other => other,
    })?;

    let description = format!("Check-in day {continuous_days}");
    for (coin_type, amount) in [(CoinType::Sport, sport_coins), (CoinType::Food, food_coins)] {
        if amount > 0 {
            ledger::apply_delta(
                &txn,
                user_id,
                coin_type,
                amount,
                &policy.source,
                Some(record.id),
                &description,
                now,
            )
            .await?;
        }
    }

    let total_checkin_days = user.total_checkin_days + 1;
    let mut streak: user::ActiveModel = user.into();
    streak.continuous_checkin_days = Set(continuous_days);
    streak.total_checkin_days = Set(total_checkin_days);
    streak.last_checkin_date = Set(Some(today));
    streak.updated_at = Set(now);
    streak.update(&txn).await?;

    txn.commit().await?;
    info!(
        "User {} checked in: day {}, +{} sport, +{} food",
        user_id, continuous_days, sport_coins, food_coins
    );
    Ok(record)
}

/// Whether `today` is checked in and what the next check-in pays.
pub async fn status<C>(
    db: &C,
    user_id: i64,
    policy: &CheckinPolicy,
    today: NaiveDate,
) -> Result<CheckinStatus>
where
    C: ConnectionTrait,
{
    let user = load_user(db, user_id).await?;
    let checked_in_today = user.last_checkin_date == Some(today);
    let alive = checked_in_today || today.pred_opt() == user.last_checkin_date;
    let continuous_days = if alive {
        user.continuous_checkin_days
    } else {
        0
    };

    Ok(CheckinStatus {
        checked_in_today,
        continuous_days,
        next_reward: policy.reward(continuous_days + 1),
    })
}

/// Lifetime and current-month check-in figures.
pub async fn stats<C>(db: &C, user_id: i64, today: NaiveDate) -> Result<CheckinStats>
where
    C: ConnectionTrait,
{
    let user = load_user(db, user_id).await?;
    let records = CheckinRecord::find()
        .filter(checkin_record::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    let month_days = records
        .iter()
        .filter(|record| {
            record.checkin_date.year() == today.year()
                && record.checkin_date.month() == today.month()
        })
        .count();

    Ok(CheckinStats {
        total_days: user.total_checkin_days,
        month_days,
        max_streak: records
            .iter()
            .map(|record| record.continuous_days)
            .max()
            .unwrap_or(0),
        sport_coins_earned: records.iter().map(|record| record.sport_coins_earned).sum(),
        food_coins_earned: records.iter().map(|record| record.food_coins_earned).sum(),
    })
}
