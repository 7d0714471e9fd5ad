//! Periodic sport goals.
//!
//! A goal measures one quantity (minutes, metres, kilocalories or sessions) over a
//! daily, weekly (Monday to Sunday) or monthly window fixed at creation. Progress
//! is recomputed from the sport records inside the window whenever a workout is
//! recorded. Completion is sticky, and once the window has closed the stored
//! progress is never lowered.

use crate::{
    entities::{
        GoalPeriod, GoalType, SportGoal, SportGoalModel, SportRecord, sport_goal, sport_record,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Inclusive bounds of a goal window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First instant of the window
    pub start: NaiveDateTime,
    /// Last instant of the window
    pub end: NaiveDateTime,
}

/// Goal creation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewGoal {
    /// Quantity to measure
    pub goal_type: GoalType,
    /// Amount to reach within one window
    pub target_value: i64,
    /// Defaults to the natural unit of `goal_type`
    #[serde(default)]
    pub unit: Option<String>,
    /// Window length
    pub period: GoalPeriod,
}

const fn default_unit(goal_type: GoalType) -> &'static str {
    match goal_type {
        GoalType::Duration => "min",
        GoalType::Distance => "m",
        GoalType::Calories => "kcal",
        GoalType::Times => "times",
    }
}

/// The window of `period` containing `today`, from 00:00:00 on its first day to
/// 23:59:59 on its last.
pub fn period_window(period: GoalPeriod, today: NaiveDate) -> Result<Window> {
    let (first, last) = match period {
        GoalPeriod::Daily => (today, today),
        GoalPeriod::Weekly => {
            let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
            (monday, monday + Duration::days(6))
        }
        GoalPeriod::Monthly => {
            let first = today - Duration::days(i64::from(today.day0()));
            let next = first
                .checked_add_months(Months::new(1))
                .ok_or_else(|| Error::validation(format!("no month after {first}")))?;
            (first, next - Duration::days(1))
        }
    };

    Ok(Window {
        start: first.and_time(NaiveTime::MIN),
        end: (last + Duration::days(1)).and_time(NaiveTime::MIN) - Duration::seconds(1),
    })
}

/// Aggregates the user's sport records that started inside `[start, end]`.
#[allow(clippy::cast_possible_truncation)]
async fn measure<C>(
    db: &C,
    user_id: i64,
    goal_type: GoalType,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let records = SportRecord::find()
        .filter(sport_record::Column::UserId.eq(user_id))
        .filter(sport_record::Column::StartTime.between(start, end))
        .all(db)
        .await?;

    let value = match goal_type {
        GoalType::Duration => records.iter().map(|r| i64::from(r.duration)).sum(),
        GoalType::Distance => records
            .iter()
            .filter_map(|r| r.distance)
            .sum::<f64>()
            .round() as i64,
        GoalType::Calories => records.iter().map(|r| i64::from(r.calories)).sum(),
        GoalType::Times => records.len() as i64,
    };
    Ok(value)
}

/// Re-aggregates one goal and stores the result if it changed.
pub async fn recompute<C>(
    db: &C,
    goal: SportGoalModel,
    now: NaiveDateTime,
) -> Result<SportGoalModel>
where
    C: ConnectionTrait,
{
    let measured = measure(
        db,
        goal.user_id,
        goal.goal_type,
        goal.start_date,
        goal.end_date,
    )
    .await?;
    let current_value = if goal.is_open_at(now) {
        measured
    } else {
        measured.max(goal.current_value)
    };
    let is_completed = goal.is_completed || current_value >= goal.target_value;

    if current_value == goal.current_value && is_completed == goal.is_completed {
        return Ok(goal);
    }

    debug!(
        "Goal {} progress {} -> {} of {}",
        goal.id, goal.current_value, current_value, goal.target_value
    );
    let mut active: sport_goal::ActiveModel = goal.into();
    active.current_value = Set(current_value);
    active.is_completed = Set(is_completed);
    Ok(active.update(db).await?)
}

/// Recomputes every goal of the user whose window contains `at`.
#[instrument(skip(db))]
pub async fn recompute_for_activity<C>(
    db: &C,
    user_id: i64,
    at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<Vec<SportGoalModel>>
where
    C: ConnectionTrait,
{
    let goals = SportGoal::find()
        .filter(sport_goal::Column::UserId.eq(user_id))
        .filter(sport_goal::Column::StartDate.lte(at))
        .filter(sport_goal::Column::EndDate.gte(at))
        .all(db)
        .await?;

    let mut updated = Vec::with_capacity(goals.len());
    for goal in goals {
        updated.push(recompute(db, goal, now).await?);
    }
    Ok(updated)
}

fn validate_target(target_value: i64) -> Result<()> {
    if target_value < 1 {
        return Err(Error::validation(format!(
            "goal target must be at least 1, got {target_value}"
        )));
    }
    Ok(())
}

/// Creates a goal for the window containing `now` and computes its initial progress.
///
/// # Errors
/// * `Validation` for a target below 1
/// * `Duplicate` when a goal of the same type and period is still open
#[instrument(skip(db))]
pub async fn create(
    db: &DatabaseConnection,
    user_id: i64,
    new_goal: NewGoal,
    now: NaiveDateTime,
) -> Result<SportGoalModel> {
    validate_target(new_goal.target_value)?;
    let window = period_window(new_goal.period, now.date())?;

    let txn = db.begin().await?;
    let open = SportGoal::find()
        .filter(sport_goal::Column::UserId.eq(user_id))
        .filter(sport_goal::Column::GoalType.eq(new_goal.goal_type))
        .filter(sport_goal::Column::Period.eq(new_goal.period))
        .filter(sport_goal::Column::EndDate.gte(now))
        .one(&txn)
        .await?;
    if open.is_some() {
        return Err(Error::Duplicate {
            what: format!("open {:?} {:?} goal", new_goal.period, new_goal.goal_type),
        });
    }

    let unit = new_goal
        .unit
        .unwrap_or_else(|| default_unit(new_goal.goal_type).to_string());
    let goal = sport_goal::ActiveModel {
        user_id: Set(user_id),
        goal_type: Set(new_goal.goal_type),
        target_value: Set(new_goal.target_value),
        current_value: Set(0),
        unit: Set(unit),
        period: Set(new_goal.period),
        start_date: Set(window.start),
        end_date: Set(window.end),
        is_completed: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let goal = recompute(&txn, goal, now).await?;
    txn.commit().await?;
    info!("User {} created goal {}", user_id, goal.id);
    Ok(goal)
}

/// Changes a goal's target. A goal that is already completed stays completed.
#[instrument(skip(db))]
pub async fn update_target(
    db: &DatabaseConnection,
    user_id: i64,
    goal_id: i64,
    target_value: i64,
    now: NaiveDateTime,
) -> Result<SportGoalModel> {
    validate_target(target_value)?;

    let txn = db.begin().await?;
    let goal = SportGoal::find_by_id(goal_id)
        .one(&txn)
        .await?
        .filter(|goal| goal.user_id == user_id)
        .ok_or_else(|| Error::not_found("goal", goal_id))?;

    let is_completed = goal.is_completed || goal.current_value >= target_value;
    let mut active: sport_goal::ActiveModel = goal.into();
    active.target_value = Set(target_value);
    active.is_completed = Set(is_completed);
    let goal = active.update(&txn).await?;

    let goal = recompute(&txn, goal, now).await?;
    txn.commit().await?;
    Ok(goal)
}
