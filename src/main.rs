use std::sync::Arc;

use dose_reminder::config;
use dose_reminder::db::open_database;
use dose_reminder::reminders::{
    channel, Clock, PatternLearner, ReminderError, ReminderRuntime, ReminderScheduler,
    SqliteCatalog, SqliteHistoryStore, SystemClock, TokioTimerFacility, TracingNotificationSink,
    TracingOutcomeSink,
};

#[tokio::main]
async fn main() {
    dose_reminder::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Reminder engine failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ReminderError> {
    let engine_config = config::load_engine_config(&config::engine_config_path())?;

    let data_dir = config::app_data_dir();
    std::fs::create_dir_all(&data_dir)
        .map_err(|e| ReminderError::Config(format!("{}: {e}", data_dir.display())))?;

    // Catalog and history each own a connection to the same file.
    let db_path = config::database_path();
    let catalog = Arc::new(SqliteCatalog::new(open_database(&db_path)?));
    let history = Arc::new(SqliteHistoryStore::new(open_database(&db_path)?));

    // History writes go to the blocking pool, off the dispatch loop.
    let learner = Arc::new(PatternLearner::with_background_store(&engine_config, history)?);
    learner.load_from_store()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (handle, rx) = channel();
    let timers = Arc::new(TokioTimerFacility::new(handle.sender(), clock.clone()));

    let scheduler = ReminderScheduler::new(
        engine_config,
        timers,
        learner,
        Arc::new(TracingNotificationSink),
        Arc::new(TracingOutcomeSink),
    )?;

    let runtime = ReminderRuntime::new(Arc::new(scheduler), catalog, clock, rx);
    let scheduler = runtime.scheduler().clone();
    handle.rebuild()?;

    let shutdown = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            let _ = shutdown.shutdown();
        }
    });

    runtime.run().await;
    scheduler.learner().flush().await;
    tracing::info!(
        live_timers = scheduler.active_timers().map(|t| t.len()).unwrap_or(0),
        "Exiting"
    );
    Ok(())
}
