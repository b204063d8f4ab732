use anyhow::Result;
use ledger::*;
use tracing::info;

const DEBUG_RIOT_ID: &str = "debug-user-riot-id";
const DEBUG_USERNAME: &str = "DebugUser";
const DEBUG_BALANCE: i64 = 9999;

/// Inserts the debug user. Safe to run more than once.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    let store = LedgerStore::open(&config).await?;
    let users = UserRepository::new(store.clone(), config.starting_balance);

    match users.find_by_riot_id(DEBUG_RIOT_ID).await? {
        Some(user) => info!(user_id = %user.id, "debug user already exists"),
        None => {
            let user = users
                .create_with_balance(DEBUG_RIOT_ID, DEBUG_USERNAME, DEBUG_BALANCE)
                .await?;
            info!(user_id = %user.id, "debug user inserted");
        }
    }

    store.close().await;
    Ok(())
}
