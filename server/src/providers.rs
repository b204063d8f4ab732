use async_trait::async_trait;
use common::FinishedMatch;

use crate::error::LedgerResult;
use crate::matches::MatchRepository;

/// Source of match results. Entries without a winner are allowed; the
/// settlement pass skips them.
#[async_trait]
pub trait ResultsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_recently_finished_matches(&self) -> LedgerResult<Vec<FinishedMatch>>;
}

/// Reads finished rows of the match table, as written by result ingestion.
pub struct MatchTableProvider {
    matches: MatchRepository,
}

impl MatchTableProvider {
    pub fn new(matches: MatchRepository) -> Self {
        Self { matches }
    }
}

#[async_trait]
impl ResultsProvider for MatchTableProvider {
    fn name(&self) -> &'static str {
        "match-table"
    }

    async fn list_recently_finished_matches(&self) -> LedgerResult<Vec<FinishedMatch>> {
        let finished = self.matches.list_finished().await?;
        Ok(finished.iter().map(FinishedMatch::from).collect())
    }
}

/// A fixed list of results, for manual runs.
#[derive(Debug, Clone, Default)]
pub struct StaticResultsProvider {
    results: Vec<FinishedMatch>,
}

impl StaticResultsProvider {
    pub fn new(results: Vec<FinishedMatch>) -> Self {
        Self { results }
    }
}

#[async_trait]
impl ResultsProvider for StaticResultsProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn list_recently_finished_matches(&self) -> LedgerResult<Vec<FinishedMatch>> {
        Ok(self.results.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LedgerStore;
    use chrono::Utc;
    use common::{Match, MatchStatus};

    #[tokio::test]
    async fn match_table_provider_reports_finished_rows_only() {
        let store = LedgerStore::open_in_memory().await.unwrap();
        let matches = MatchRepository::new(store);
        for (id, status, winner) in [
            (101, MatchStatus::Finished, Some(1)),
            (102, MatchStatus::Running, None),
            (103, MatchStatus::Finished, None),
        ] {
            matches
                .upsert(&Match {
                    id,
                    name: format!("match {id}"),
                    side_a: 1,
                    side_b: 2,
                    scheduled_at: Utc::now(),
                    status,
                    winning_side_id: winner,
                    tournament_name: "Worlds".into(),
                })
                .await
                .unwrap();
        }

        let provider = MatchTableProvider::new(matches);
        let mut finished = provider.list_recently_finished_matches().await.unwrap();
        finished.sort_by_key(|m| m.match_id);

        assert_eq!(
            finished,
            vec![
                FinishedMatch {
                    match_id: 101,
                    winning_side_id: Some(1)
                },
                FinishedMatch {
                    match_id: 103,
                    winning_side_id: None
                },
            ]
        );
    }
}
