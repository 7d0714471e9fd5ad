#![allow(clippy::result_large_err)]

use chrono::Local;
use dotenvy::dotenv;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vitashop::{
    config::{self, catalog, database},
    core::coupon,
    errors::Result,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load the application configuration, falling back to built-in policies
    let app_config = if Path::new(CONFIG_PATH).exists() {
        config::load_config(CONFIG_PATH)
            .inspect_err(|e| error!("Critical error loading configuration: {}", e))?
    } else {
        warn!(
            "{} not found, using default reward policies and an empty catalog",
            CONFIG_PATH
        );
        config::Config::default()
    };

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed products, coupons and daily tasks
    let now = Local::now().naive_local();
    catalog::seed_catalog(&db, &app_config.catalog, now)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;

    // 6. Housekeeping
    let expired = coupon::expire_stale(&db, now).await?;

    let rewards = &app_config.rewards;
    info!(
        "vitashop core ready: daily check-in {}x{} cap, sport check-in {}x{} cap, {} coins per yuan, {:?} coupon policy, {} stale coupons expired",
        rewards.daily_checkin.base_reward,
        rewards.daily_checkin.cap,
        rewards.sport_checkin.base_reward,
        rewards.sport_checkin.cap,
        rewards.exchange.points_per_yuan,
        rewards.orders.coupon_policy,
        expired
    );

    Ok(())
}
