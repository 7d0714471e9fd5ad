//! Sport and food activity recording.
//!
//! Recording an activity writes the record, pays its coins through the ledger,
//! advances the matching daily tasks and, for workouts, refreshes the goals whose
//! window contains the workout. All of it commits or rolls back together.

use crate::{
    config::rewards::{FoodRewardPolicy, SportRewardPolicy},
    core::{goal, ledger, task},
    entities::{
        CoinType, FoodCheckinRecord, FoodRecord, FoodRecordModel, LedgerEntry, SportRecordModel,
        User, food_checkin_record, food_record, sport_record,
    },
    errors::{Error, Result},
};
use chrono::{Duration, NaiveDateTime};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{info, instrument};

/// Task type advanced by workouts.
pub const SPORT_TASK: &str = "sport";
/// Task type advanced by logged meals.
pub const FOOD_TASK: &str = "food";

/// Workout to record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewSportRecord {
    /// e.g. "running", "yoga"
    pub sport_type: String,
    /// Minutes
    pub duration: i32,
    /// Metres
    #[serde(default)]
    pub distance: Option<f64>,
    /// Measured calories; estimated from the sport type when absent
    #[serde(default)]
    pub calories: Option<i32>,
    /// When the workout began
    pub start_time: NaiveDateTime,
}

/// Meal to log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewFoodRecord {
    /// e.g. "breakfast"
    pub meal_type: String,
    /// What was eaten
    pub food_name: String,
    /// Kilocalories
    pub calories: i32,
}

/// Metabolic equivalent of a sport, 5.0 for unknown kinds.
#[must_use]
pub fn met_value(sport_type: &str) -> f64 {
    match sport_type {
        "running" => 9.8,
        "walking" => 3.5,
        "cycling" => 7.5,
        "swimming" => 8.0,
        "yoga" => 2.5,
        "hiit" => 12.0,
        "strength" => 6.0,
        "rope_jumping" => 11.0,
        // dancing
        _ => 5.0,
    }
}

/// Kilocalories burned: MET x weight (kg) x hours.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn estimate_calories(sport_type: &str, weight_kg: f64, duration: i32) -> i32 {
    (met_value(sport_type) * weight_kg * f64::from(duration) / 60.0).round() as i32
}

/// Records a workout and pays `min(duration / minutes_per_coin, max_coins)` sport coins.
///
/// # Errors
/// * `Validation` for a non-positive duration or a negative distance or calorie count
/// * `NotFound` when the user does not exist
#[instrument(skip(db, record, policy), fields(sport_type = %record.sport_type))]
pub async fn record_sport(
    db: &DatabaseConnection,
    user_id: i64,
    record: &NewSportRecord,
    policy: &SportRewardPolicy,
    now: NaiveDateTime,
) -> Result<SportRecordModel> {
    if record.duration < 1 {
        return Err(Error::validation(
            "workout duration must be at least one minute",
        ));
    }
    if record
        .distance
        .is_some_and(|distance| distance < 0.0 || !distance.is_finite())
    {
        return Err(Error::validation("distance cannot be negative"));
    }
    if record.calories.is_some_and(|calories| calories < 0) {
        return Err(Error::validation("calories cannot be negative"));
    }

    let txn = db.begin().await?;
    let user = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let calories = record.calories.unwrap_or_else(|| {
        let weight = user.weight_kg.unwrap_or(policy.default_weight_kg);
        estimate_calories(&record.sport_type, weight, record.duration)
    });
    let coins = policy.coins_for(record.duration);

    let saved = sport_record::ActiveModel {
        user_id: Set(user_id),
        sport_type: Set(record.sport_type.clone()),
        duration: Set(record.duration),
        distance: Set(record.distance),
        calories: Set(calories),
        start_time: Set(record.start_time),
        end_time: Set(record.start_time + Duration::minutes(i64::from(record.duration))),
        coins_earned: Set(coins),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if coins > 0 {
        ledger::apply_delta(
            &txn,
            user_id,
            CoinType::Sport,
            coins,
            ledger::sources::SPORT_RECORD,
            Some(saved.id),
            &format!("{} {} min", record.sport_type, record.duration),
            now,
        )
        .await?;
    }

    task::record_progress(&txn, user_id, SPORT_TASK, 1, now).await?;
    goal::recompute_for_activity(&txn, user_id, record.start_time, now).await?;

    txn.commit().await?;
    info!(
        "User {} recorded {} min of {}: {} kcal, +{} sport coins",
        user_id, record.duration, record.sport_type, calories, coins
    );
    Ok(saved)
}

/// Logs a meal and pays the flat per-record food coins.
#[instrument(skip(db, record, policy))]
pub async fn record_food(
    db: &DatabaseConnection,
    user_id: i64,
    record: &NewFoodRecord,
    policy: &FoodRewardPolicy,
    now: NaiveDateTime,
) -> Result<FoodRecordModel> {
    if record.food_name.trim().is_empty() {
        return Err(Error::validation("food name cannot be empty"));
    }
    if record.calories < 0 {
        return Err(Error::validation("calories cannot be negative"));
    }

    let txn = db.begin().await?;
    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("user", user_id))?;

    let coins = policy.coins_per_record.max(0);
    let saved = food_record::ActiveModel {
        user_id: Set(user_id),
        meal_type: Set(record.meal_type.clone()),
        record_date: Set(now.date()),
        food_name: Set(record.food_name.trim().to_string()),
        calories: Set(record.calories),
        coins_earned: Set(coins),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if coins > 0 {
        ledger::apply_delta(
            &txn,
            user_id,
            CoinType::Food,
            coins,
            ledger::sources::FOOD_RECORD,
            Some(saved.id),
            &format!("{}: {}", record.meal_type, saved.food_name),
            now,
        )
        .await?;
    }

    task::record_progress(&txn, user_id, FOOD_TASK, 1, now).await?;

    txn.commit().await?;
    Ok(saved)
}

/// Once-a-day food check-in, available after a meal has been logged today.
///
/// The day's `food_checkin_records` row is written before the coins are paid, so of
/// two concurrent check-ins only one can pay.
///
/// # Errors
/// * `Ineligible` when no meal has been logged today
/// * `AlreadyCheckedIn` on the second food check-in of the day
#[instrument(skip(db, policy))]
pub async fn food_check_in(
    db: &DatabaseConnection,
    user_id: i64,
    policy: &FoodRewardPolicy,
    now: NaiveDateTime,
) -> Result<LedgerEntry> {
    let today = now.date();
    let txn = db.begin().await?;

    let logged_today = FoodRecord::find()
        .filter(food_record::Column::UserId.eq(user_id))
        .filter(food_record::Column::RecordDate.eq(today))
        .one(&txn)
        .await?
        .is_some();
    if !logged_today {
        return Err(Error::ineligible("log a meal before the food check-in"));
    }

    let already = FoodCheckinRecord::find()
        .filter(food_checkin_record::Column::UserId.eq(user_id))
        .filter(food_checkin_record::Column::CheckinDate.eq(today))
        .one(&txn)
        .await?
        .is_some();
    if already {
        return Err(Error::AlreadyCheckedIn { date: today });
    }

    let record = food_checkin_record::ActiveModel {
        user_id: Set(user_id),
        checkin_date: Set(today),
        coins_earned: Set(policy.checkin_coins),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|err| match Error::from(err) {
        Error::Conflict { .. } => Error::AlreadyCheckedIn { date: today },
        other => other,
    })?;

    let entry = ledger::apply_delta(
        &txn,
        user_id,
        CoinType::Food,
        policy.checkin_coins,
        ledger::sources::FOOD_CHECKIN,
        Some(record.id),
        "Food check-in",
        now,
    )
    .await?;

    txn.commit().await?;
    info!(
        "User {} food check-in: +{} food coins",
        user_id, policy.checkin_coins
    );
    Ok(entry)
}
