//! Core business logic - framework-agnostic order and reward operations.
//!
//! Every public operation takes the reference instant `now` explicitly and runs as
//! one all-or-nothing store transaction. Helpers that must join a caller's
//! transaction are generic over [`sea_orm::ConnectionTrait`] and never commit.

/// Sport and food activity recording
pub mod activity;
/// Shopping cart lines
pub mod cart;
/// Daily and sport check-in
pub mod checkin;
/// Coupon evaluation, redemption and issuing
pub mod coupon;
/// Coin exchange for shop items
pub mod exchange;
/// Periodic sport goals
pub mod goal;
/// Product inventory guard
pub mod inventory;
/// Coin ledger primitives
pub mod ledger;
/// Order state machine
pub mod order;
/// Daily task progress and reward claiming
pub mod task;

use crate::entities::User;
use crate::errors::{Error, Result};
use chrono::NaiveDateTime;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::Serialize;

/// The authenticated caller, as resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Authenticated user
    pub user_id: i64,
    /// Membership was active at the instant the actor was loaded
    pub is_member: bool,
}

impl Actor {
    /// Resolves the actor from the `users` row, evaluating membership at `now`.
    pub async fn load<C>(db: &C, user_id: i64, now: NaiveDateTime) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let user = User::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("user", user_id))?;

        Ok(Self {
            user_id,
            is_member: user.is_member_at(now),
        })
    }
}

/// One page of a newest-first listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Rows across all pages
    pub total: u64,
    /// 1-based page number
    pub page: u64,
    /// Rows per page
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` items.
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_actor_load_membership() -> Result<()> {
        let db = setup_test_db().await?;
        let regular = create_test_user(&db, "regular").await?;
        let member = create_member_user(&db, "member", None).await?;
        let lapsed =
            create_member_user(&db, "lapsed", Some(test_now() - Duration::days(1))).await?;

        assert!(!Actor::load(&db, regular.id, test_now()).await?.is_member);
        assert!(Actor::load(&db, member.id, test_now()).await?.is_member);
        assert!(!Actor::load(&db, lapsed.id, test_now()).await?.is_member);
        Ok(())
    }

    #[tokio::test]
    async fn test_actor_load_unknown_user() -> Result<()> {
        let db = setup_test_db().await?;
        let result = Actor::load(&db, 404, test_now()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound { entity: "user", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_total_pages() {
        let page: Page<i32> = Page {
            items: vec![],
            total: 41,
            page: 1,
            page_size: 20,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
