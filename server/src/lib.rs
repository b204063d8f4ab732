pub mod config;
pub mod database;
pub mod driver;
pub mod engine;
pub mod error;
pub mod matches;
pub mod providers;
pub mod settlement_manager;
pub mod users;
pub mod wagers;

pub use config::Config;
pub use database::{LedgerStore, Scope, Transaction};
pub use driver::{PlacedWagerSource, SettlementDriver};
pub use engine::SettlementEngine;
pub use error::{LedgerError, LedgerResult};
pub use matches::MatchRepository;
pub use providers::{MatchTableProvider, ResultsProvider, StaticResultsProvider};
pub use users::UserRepository;
pub use wagers::WagerRepository;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,ledger=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
