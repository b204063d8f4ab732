use std::sync::Arc;

use anyhow::Result;
use ledger::*;
use tracing::{info, warn};

/// Runs one settlement pass against the match table and prints the report.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    info!("running the manual bet settlement pass");

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

    let report = driver.run_pass().await;
    store.close().await;
    let report = report?;

    if !report.is_clean() {
        warn!(
            failed = report.wagers_failed,
            failed_matches = report.matches_failed,
            "some wagers were left placed for the next pass"
        );
    }
    println!("{report:#?}");
    Ok(())
}
