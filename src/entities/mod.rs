//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod address;
pub mod cart_item;
pub mod checkin_record;
pub mod coin_record;
pub mod coupon;
pub mod daily_task;
pub mod food_checkin_record;
pub mod food_record;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_review;
pub mod sea_orm_active_enums;
pub mod sport_goal;
pub mod sport_record;
pub mod user;
pub mod user_coupon;
pub mod user_task_record;

// Re-export specific types to avoid conflicts
pub use address::{Entity as Address, Model as AddressModel, ReceiverSnapshot};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use checkin_record::{Entity as CheckinRecord, Model as CheckinRecordModel};
pub use coin_record::{Entity as CoinRecord, Model as LedgerEntry};
pub use coupon::{Entity as Coupon, Model as CouponModel};
pub use daily_task::{Entity as DailyTask, Model as DailyTaskModel};
pub use food_checkin_record::{Entity as FoodCheckinRecord, Model as FoodCheckinRecordModel};
pub use food_record::{Entity as FoodRecord, Model as FoodRecordModel};
pub use order::{Entity as Order, Model as OrderModel};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_review::{Entity as ProductReview, Model as ProductReviewModel};
pub use sea_orm_active_enums::{
    CoinType, CouponType, GoalPeriod, GoalType, OrderStatus, PayType, UserCouponStatus,
};
pub use sport_goal::{Entity as SportGoal, Model as SportGoalModel};
pub use sport_record::{Entity as SportRecord, Model as SportRecordModel};
pub use user::{Entity as User, Model as UserModel};
pub use user_coupon::{Entity as UserCoupon, Model as UserCouponModel};
pub use user_task_record::{Entity as UserTaskRecord, Model as UserTaskRecordModel};
