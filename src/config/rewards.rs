//! Reward and order policies.
//!
//! Every number the reward engine and the order state machine use comes from here,
//! so a policy change never touches the engine. Defaults reproduce the values the
//! shop has shipped with.

use serde::Deserialize;

/// All policy tables, as found under `[rewards]` in config.toml.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// General daily check-in (both coin types)
    pub daily_checkin: CheckinPolicy,
    /// Sport check-in (sport coins only)
    pub sport_checkin: CheckinPolicy,
    /// Coins for a submitted workout
    pub sport_record: SportRewardPolicy,
    /// Coins for logged meals and the food check-in
    pub food: FoodRewardPolicy,
    /// Coin price of shop items
    pub exchange: ExchangePolicy,
    /// Order creation behaviour
    pub orders: OrderPolicy,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            daily_checkin: CheckinPolicy::daily(),
            sport_checkin: CheckinPolicy::sport(),
            sport_record: SportRewardPolicy::default(),
            food: FoodRewardPolicy::default(),
            exchange: ExchangePolicy::default(),
            orders: OrderPolicy::default(),
        }
    }
}

/// Streak reward: `base_reward * min(continuous_days, cap)` per granted coin type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckinPolicy {
    /// Coins for a one-day streak
    pub base_reward: i64,
    /// Streak length at which the multiplier stops growing
    pub cap: i32,
    /// Pay sport coins
    pub grant_sport: bool,
    /// Pay food coins
    pub grant_food: bool,
    /// Ledger source recorded for the reward
    pub source: String,
}

impl CheckinPolicy {
    /// Daily check-in: 5 of each coin, multiplier capped at 7.
    #[must_use]
    pub fn daily() -> Self {
        Self {
            base_reward: 5,
            cap: 7,
            grant_sport: true,
            grant_food: true,
            source: "daily_checkin".to_string(),
        }
    }

    /// Sport check-in: 5 sport coins, multiplier capped at 5.
    #[must_use]
    pub fn sport() -> Self {
        Self {
            base_reward: 5,
            cap: 5,
            grant_sport: true,
            grant_food: false,
            source: "sport_checkin".to_string(),
        }
    }

    /// Multiplier for a streak of `continuous_days`.
    #[must_use]
    pub fn multiplier(&self, continuous_days: i32) -> i32 {
        continuous_days.clamp(1, self.cap.max(1))
    }

    /// Coins granted per coin type for a streak of `continuous_days`.
    #[must_use]
    pub fn reward(&self, continuous_days: i32) -> i64 {
        self.base_reward * i64::from(self.multiplier(continuous_days))
    }
}

/// Workout reward: one coin per `minutes_per_coin`, at most `max_coins`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SportRewardPolicy {
    /// Minutes of exercise per coin
    pub minutes_per_coin: i32,
    /// Cap per workout
    pub max_coins: i64,
    /// Weight assumed when the user has none recorded
    pub default_weight_kg: f64,
}

impl Default for SportRewardPolicy {
    fn default() -> Self {
        Self {
            minutes_per_coin: 10,
            max_coins: 50,
            default_weight_kg: 60.0,
        }
    }
}

impl SportRewardPolicy {
    /// Coins earned for a workout of `duration` minutes.
    #[must_use]
    pub fn coins_for(&self, duration: i32) -> i64 {
        if self.minutes_per_coin <= 0 {
            return 0;
        }
        i64::from(duration / self.minutes_per_coin).min(self.max_coins)
    }
}

/// Meal logging rewards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FoodRewardPolicy {
    /// Flat coins per logged meal
    pub coins_per_record: i64,
    /// Coins for the once-a-day food check-in
    pub checkin_coins: i64,
}

impl Default for FoodRewardPolicy {
    fn default() -> Self {
        Self {
            coins_per_record: 3,
            checkin_coins: 5,
        }
    }
}

/// Coin price of shop items.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExchangePolicy {
    /// Coins charged per unit of currency of the product's current price
    pub points_per_yuan: i64,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            points_per_yuan: 10,
        }
    }
}

/// What order creation does with a coupon that fails eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponPolicy {
    /// Create the order without a discount
    #[default]
    Lenient,
    /// Reject the order with the coupon error
    Strict,
}

/// Order creation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OrderPolicy {
    /// Handling of a coupon that fails eligibility
    pub coupon_policy: CouponPolicy,
    /// Attempts made when order creation hits a retryable conflict
    pub order_no_attempts: u32,
}

impl Default for OrderPolicy {
    fn default() -> Self {
        Self {
            coupon_policy: CouponPolicy::Lenient,
            order_no_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_checkin_multiplier_caps_at_seven() {
        let policy = CheckinPolicy::daily();
        assert_eq!(policy.reward(1), 5);
        assert_eq!(policy.reward(3), 15);
        assert_eq!(policy.reward(7), 35);
        assert_eq!(policy.reward(30), 35);
    }

    #[test]
    fn test_sport_checkin_multiplier_caps_at_five() {
        let policy = CheckinPolicy::sport();
        assert_eq!(policy.reward(5), 25);
        assert_eq!(policy.reward(6), 25);
        assert!(!policy.grant_food);
    }

    #[test]
    fn test_sport_coins_formula() {
        let policy = SportRewardPolicy::default();
        assert_eq!(policy.coins_for(9), 0);
        assert_eq!(policy.coins_for(45), 4);
        assert_eq!(policy.coins_for(600), 50);
    }
}
