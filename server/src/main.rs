use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ledger::settlement_manager::{spawn_scheduler, SettlementManager};
use ledger::*;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    info!(
        interval_secs = config.settlement_interval_secs,
        concurrency = config.settlement_concurrency,
        "starting settlement service"
    );

    let store = LedgerStore::open(&config).await?;
    let wagers = WagerRepository::new(store.clone());
    let users = UserRepository::new(store.clone(), config.starting_balance);
    let engine = SettlementEngine::new(store.clone(), wagers.clone(), users);
    let provider = MatchTableProvider::new(MatchRepository::new(store.clone()));
    let driver = SettlementDriver::new(
        Arc::new(provider),
        Arc::new(wagers),
        engine,
        config.settlement_concurrency,
    );

    let (settle_tx, settle_rx) = mpsc::channel(32);
    let mut manager = SettlementManager::new(settle_rx, driver);
    let manager_task = tokio::spawn(async move {
        manager.manage().await;
    });

    let scheduler_task = spawn_scheduler(
        Duration::from_secs(config.settlement_interval_secs),
        settle_tx,
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    // the scheduler owns the only sender; stopping it lets the manager drain
    scheduler_task.abort();
    let _ = scheduler_task.await;
    manager_task.await?;
    store.close().await;
    Ok(())
}
