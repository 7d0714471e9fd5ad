//! Daily task progress and reward claiming.
//!
//! Progress lives in one `user_task_records` row per user, task and calendar day;
//! a new day starts from zero. Activity recording advances every active task of
//! the matching `task_type`. Claiming sets `is_claimed` with a compare-and-swap
//! before paying the reward, so a double tap pays exactly once.

use crate::{
    core::ledger,
    entities::{
        CoinType, DailyTask, DailyTaskModel, LedgerEntry, UserTaskRecord, UserTaskRecordModel,
        daily_task, user_task_record,
    },
    errors::{Error, Result},
};
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// One task as seen by a user on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    /// Daily task id
    pub task_id: i64,
    /// Display name
    pub name: String,
    /// Progress needed to complete
    pub target_value: i32,
    /// Progress so far today
    pub current_value: i32,
    /// Target reached
    pub is_completed: bool,
    /// Reward already paid
    pub is_claimed: bool,
    /// Currency of the reward
    pub reward_coin_type: CoinType,
    /// Coins paid on claim
    pub reward_amount: i64,
}

/// All active tasks for one user and day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskProgress {
    /// Active tasks in sort order
    pub tasks: Vec<TaskStatus>,
    /// Tasks completed today
    pub completed: usize,
    /// Completed but not yet claimed
    pub claimable: usize,
}

async fn find_record<C>(
    db: &C,
    user_id: i64,
    task_id: i64,
    date: NaiveDate,
) -> Result<Option<UserTaskRecordModel>>
where
    C: ConnectionTrait,
{
    UserTaskRecord::find()
        .filter(user_task_record::Column::UserId.eq(user_id))
        .filter(user_task_record::Column::TaskId.eq(task_id))
        .filter(user_task_record::Column::TaskDate.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn active_tasks<C>(db: &C, task_type: Option<&str>) -> Result<Vec<DailyTaskModel>>
where
    C: ConnectionTrait,
{
    let mut query = DailyTask::find().filter(daily_task::Column::IsActive.eq(true));
    if let Some(task_type) = task_type {
        query = query.filter(daily_task::Column::TaskType.eq(task_type));
    }
    query
        .order_by_asc(daily_task::Column::SortOrder)
        .order_by_asc(daily_task::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Advances today's record of every active task of `task_type` by `increment`.
///
/// The record is created at zero if missing and then incremented in place with
/// `current_value = current_value + increment`, so concurrent submissions never
/// overwrite each other. Completion is flipped once, by whichever increment
/// reaches the target.
///
/// Runs on the caller's connection; returns the touched records.
#[instrument(skip(db))]
pub async fn record_progress<C>(
    db: &C,
    user_id: i64,
    task_type: &str,
    increment: i32,
    now: NaiveDateTime,
) -> Result<Vec<UserTaskRecordModel>>
where
    C: ConnectionTrait,
{
    if increment < 1 {
        return Err(Error::validation(
            "task progress increment must be positive",
        ));
    }

    let today = now.date();
    let mut touched = Vec::new();
    for task in active_tasks(db, Some(task_type)).await? {
        let fresh = user_task_record::ActiveModel {
            user_id: Set(user_id),
            task_id: Set(task.id),
            task_date: Set(today),
            current_value: Set(0),
            is_completed: Set(false),
            is_claimed: Set(false),
            completed_at: Set(None),
            claimed_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        };
        UserTaskRecord::insert(fresh)
            .on_conflict(
                OnConflict::columns([
                    user_task_record::Column::UserId,
                    user_task_record::Column::TaskId,
                    user_task_record::Column::TaskDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        UserTaskRecord::update_many()
            .col_expr(
                user_task_record::Column::CurrentValue,
                Expr::col(user_task_record::Column::CurrentValue).add(increment),
            )
            .filter(user_task_record::Column::UserId.eq(user_id))
            .filter(user_task_record::Column::TaskId.eq(task.id))
            .filter(user_task_record::Column::TaskDate.eq(today))
            .exec(db)
            .await?;

        let completed = UserTaskRecord::update_many()
            .col_expr(user_task_record::Column::IsCompleted, Expr::value(true))
            .col_expr(user_task_record::Column::CompletedAt, Expr::value(now))
            .filter(user_task_record::Column::UserId.eq(user_id))
            .filter(user_task_record::Column::TaskId.eq(task.id))
            .filter(user_task_record::Column::TaskDate.eq(today))
            .filter(user_task_record::Column::IsCompleted.eq(false))
            .filter(user_task_record::Column::CurrentValue.gte(task.target_value))
            .exec(db)
            .await?;

        let record = find_record(db, user_id, task.id, today)
            .await?
            .ok_or_else(|| Error::not_found("task record", task.id))?;
        if completed.rows_affected > 0 {
            info!("User {} completed task {}", user_id, task.id);
        }
        debug!(
            "Task {} for user {}: {}/{}",
            task.id, user_id, record.current_value, task.target_value
        );
        touched.push(record);
    }
    Ok(touched)
}

/// Pays the reward of a task completed today.
///
/// # Errors
/// * `NotFound` when the task is unknown or inactive
/// * `Ineligible` when there is no progress today or the target is not reached
/// * `AlreadyClaimed` when the reward was already paid
#[instrument(skip(db))]
pub async fn claim(
    db: &DatabaseConnection,
    user_id: i64,
    task_id: i64,
    now: NaiveDateTime,
) -> Result<LedgerEntry> {
    let today = now.date();
    let txn = db.begin().await?;

    let task = DailyTask::find_by_id(task_id)
        .one(&txn)
        .await?
        .filter(|task| task.is_active)
        .ok_or_else(|| Error::not_found("task", task_id))?;

    let record = find_record(&txn, user_id, task_id, today)
        .await?
        .ok_or_else(|| Error::ineligible(format!("task '{}' has no progress today", task.name)))?;
    if !record.is_completed {
        return Err(Error::ineligible(format!(
            "task '{}' is at {}/{}",
            task.name, record.current_value, task.target_value
        )));
    }
    if record.is_claimed {
        return Err(Error::AlreadyClaimed { task_id });
    }

    let result = UserTaskRecord::update_many()
        .col_expr(user_task_record::Column::IsClaimed, Expr::value(true))
        .col_expr(user_task_record::Column::ClaimedAt, Expr::value(now))
        .filter(user_task_record::Column::Id.eq(record.id))
        .filter(user_task_record::Column::IsCompleted.eq(true))
        .filter(user_task_record::Column::IsClaimed.eq(false))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::AlreadyClaimed { task_id });
    }

    let entry = ledger::apply_delta(
        &txn,
        user_id,
        task.reward_coin_type,
        task.reward_amount,
        ledger::sources::TASK_REWARD,
        Some(task.id),
        &task.name,
        now,
    )
    .await?;

    txn.commit().await?;
    info!(
        "User {} claimed task {}: +{} {}",
        user_id, task_id, task.reward_amount, task.reward_coin_type
    );
    Ok(entry)
}

/// Every active task with the user's progress on `today`.
pub async fn progress<C>(db: &C, user_id: i64, today: NaiveDate) -> Result<TaskProgress>
where
    C: ConnectionTrait,
{
    let mut tasks = Vec::new();
    for task in active_tasks(db, None).await? {
        let record = find_record(db, user_id, task.id, today).await?;
        tasks.push(TaskStatus {
            task_id: task.id,
            name: task.name,
            target_value: task.target_value,
            current_value: record.as_ref().map_or(0, |record| record.current_value),
            is_completed: record.as_ref().is_some_and(|record| record.is_completed),
            is_claimed: record.as_ref().is_some_and(|record| record.is_claimed),
            reward_coin_type: task.reward_coin_type,
            reward_amount: task.reward_amount,
        });
    }

    let completed = tasks.iter().filter(|task| task.is_completed).count();
    let claimable = tasks
        .iter()
        .filter(|task| task.is_completed && !task.is_claimed)
        .count();
    Ok(TaskProgress {
        tasks,
        completed,
        claimable,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::{get_balance, list_entries};
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_progress_completes_at_target() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let task = create_test_task(&db, "sport", 2, CoinType::Sport, 10).await?;
        create_test_task(&db, "food", 1, CoinType::Food, 5).await?;

        let first = record_progress(&db, user.id, "sport", 1, test_now()).await?;
        assert_eq!(first.len(), 1);
        assert!(!first[0].is_completed);

        let second = record_progress(&db, user.id, "sport", 1, test_now()).await?;
        assert_eq!(second[0].task_id, task.id);
        assert_eq!(second[0].current_value, 2);
        assert!(second[0].is_completed);
        assert_eq!(second[0].completed_at, Some(test_now()));

        let summary = progress(&db, user.id, test_now().date()).await?;
        assert_eq!(summary.tasks.len(), 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.claimable, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_pays_once() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "bob").await?;
        let task = create_test_task(&db, "food", 1, CoinType::Food, 5).await?;
        record_progress(&db, user.id, "food", 1, test_now()).await?;

        let entry = claim(&db, user.id, task.id, test_now()).await?;
        assert_eq!(entry.amount, 5);
        assert_eq!(entry.source, ledger::sources::TASK_REWARD);

        let again = claim(&db, user.id, task.id, test_now()).await;
        assert!(matches!(again, Err(Error::AlreadyClaimed { .. })));

        assert_eq!(get_balance(&db, user.id).await?.food_coins, 5);
        assert_eq!(list_entries(&db, user.id, None, 1, 20).await?.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_rejections() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "carol").await?;
        let task = create_test_task(&db, "sport", 3, CoinType::Sport, 10).await?;

        let untouched = claim(&db, user.id, task.id, test_now()).await;
        assert!(matches!(untouched, Err(Error::Ineligible { .. })));

        record_progress(&db, user.id, "sport", 1, test_now()).await?;
        let partial = claim(&db, user.id, task.id, test_now()).await;
        assert!(matches!(partial, Err(Error::Ineligible { .. })));

        let unknown = claim(&db, user.id, 999, test_now()).await;
        assert!(matches!(unknown, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_progress_resets_next_day() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "dave").await?;
        let task = create_test_task(&db, "sport", 1, CoinType::Sport, 10).await?;
        record_progress(&db, user.id, "sport", 1, test_now()).await?;

        let tomorrow = test_now() + Duration::days(1);
        let summary = progress(&db, user.id, tomorrow.date()).await?;
        assert_eq!(summary.tasks[0].current_value, 0);
        assert!(!summary.tasks[0].is_completed);

        let late_claim = claim(&db, user.id, task.id, tomorrow).await;
        assert!(matches!(late_claim, Err(Error::Ineligible { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_time_is_kept_past_target() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "erin").await?;
        create_test_task(&db, "food", 1, CoinType::Food, 5).await?;

        record_progress(&db, user.id, "food", 1, test_now()).await?;
        let later = test_now() + Duration::hours(3);
        let records = record_progress(&db, user.id, "food", 2, later).await?;

        assert_eq!(records[0].current_value, 3);
        assert!(records[0].is_completed);
        assert_eq!(records[0].completed_at, Some(test_now()));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_progress_keeps_every_increment() -> Result<()> {
        let (db, path) = setup_file_test_db("task-progress", 4).await?;
        let user_id = create_test_user(&db, "frank").await?.id;
        let task = create_test_task(&db, "sport", 5, CoinType::Sport, 10).await?;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let db = sea_orm::SqlxSqliteConnector::from_sqlx_sqlite_pool(
                    db.get_sqlite_connection_pool().clone(),
                );
                tokio::spawn(
                    async move { record_progress(&db, user_id, "sport", 1, test_now()).await },
                )
            })
            .collect();
        for handle in handles {
            handle.await.unwrap()?;
        }

        let record = find_record(&db, user_id, task.id, test_now().date())
            .await?
            .unwrap();
        assert_eq!(record.current_value, 10);
        assert!(record.is_completed);
        db.close().await?;
        remove_file_test_db(&path);
        Ok(())
    }
}
