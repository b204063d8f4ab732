use common::{Match, MatchId, MatchStatus};

use crate::database::{match_thing, DbMatch, LedgerStore, Scope, Write, MATCH_TABLE};
use crate::error::LedgerResult;

/// Access to the match table. Its rows are owned by whatever ingests results;
/// the ledger only reads them, apart from `upsert` used by that ingestion.
#[derive(Clone)]
pub struct MatchRepository {
    store: LedgerStore,
}

impl MatchRepository {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, value: &Match) -> LedgerResult<()> {
        self.store
            .write(Scope::AutoCommit, Write::UpsertMatch(DbMatch::from(value)))
            .await?;
        Ok(())
    }

    pub async fn get(&self, match_id: MatchId) -> LedgerResult<Option<Match>> {
        let found: Option<DbMatch> = self.store.fetch(&match_thing(match_id)).await?;
        found.map(Match::try_from).transpose()
    }

    pub async fn list_finished(&self) -> LedgerResult<Vec<Match>> {
        let rows: Vec<DbMatch> = self
            .store
            .client()
            .query(format!(
                "SELECT * FROM {MATCH_TABLE} WHERE status = $status ORDER BY scheduled_at ASC;"
            ))
            .bind(("status", MatchStatus::Finished))
            .await?
            .take(0)?;
        rows.into_iter().map(Match::try_from).collect()
    }

    /// Matches still open for wagers, soonest first.
    pub async fn list_upcoming(&self) -> LedgerResult<Vec<Match>> {
        let rows: Vec<DbMatch> = self
            .store
            .client()
            .query(format!(
                "SELECT * FROM {MATCH_TABLE} WHERE status = $status ORDER BY scheduled_at ASC;"
            ))
            .bind(("status", MatchStatus::Scheduled))
            .await?
            .take(0)?;
        rows.into_iter().map(Match::try_from).collect()
    }
}
