//! Cron-style maintenance entry point: restores expired admin cancellations
//! and purges votes that fell out of the counting window, then exits.

use common::config::AppConfig;
use common::logger::init_logger;
use services::maintenance::{auto_reset_cancelled_schedules, cleanup_old_votes};

#[tokio::main]
async fn main() {
    let config = AppConfig::get();
    init_logger(&config);

    log::info!("starting maintenance sweep ({})", config.env);
    let db = db::connect().await;

    let restored = auto_reset_cancelled_schedules(&db, config.cancellation_expiry_hours).await;
    let (purged, reset) = cleanup_old_votes(&db, config.vote_window_hours).await;

    log::info!(
        "sweep finished: {restored} schedule(s) restored, {purged} vote(s) purged, {reset} flag(s) reset"
    );
}
