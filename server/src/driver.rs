use std::sync::Arc;

use async_trait::async_trait;
use common::{FinishedMatch, MatchId, SettlementReport, SideId, Wager};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::engine::SettlementEngine;
use crate::error::{LedgerError, LedgerResult};
use crate::providers::ResultsProvider;

/// Where a pass finds the wagers still waiting on a match.
#[async_trait]
pub trait PlacedWagerSource: Send + Sync {
    async fn list_placed_by_match(&self, match_id: MatchId) -> LedgerResult<Vec<Wager>>;
}

/// Runs a full settlement pass over every recently finished match.
pub struct SettlementDriver {
    provider: Arc<dyn ResultsProvider>,
    wagers: Arc<dyn PlacedWagerSource>,
    engine: SettlementEngine,
    concurrency: usize,
}

impl SettlementDriver {
    pub fn new(
        provider: Arc<dyn ResultsProvider>,
        wagers: Arc<dyn PlacedWagerSource>,
        engine: SettlementEngine,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            wagers,
            engine,
            concurrency: concurrency.max(1),
        }
    }

    /// Settles what it can and reports the rest. The only error is failing to
    /// reach the results provider at all; anything after that is recorded per
    /// item and the pass carries on.
    pub async fn run_pass(&self) -> LedgerResult<SettlementReport> {
        info!(provider = self.provider.name(), "starting settlement pass");

        let finished = self
            .provider
            .list_recently_finished_matches()
            .await
            .map_err(|e| {
                error!("could not list finished matches: {}", e);
                match e {
                    LedgerError::Provider(_) => e,
                    other => LedgerError::Provider(other.to_string()),
                }
            })?;

        let mut report = SettlementReport::default();
        if finished.is_empty() {
            info!("no recently finished matches to settle");
            return Ok(report);
        }
        info!(matches = finished.len(), "found finished matches");

        for finished_match in finished {
            self.settle_match(finished_match, &mut report).await;
        }

        info!(
            settled = report.wagers_settled,
            won = report.wagers_won,
            lost = report.wagers_lost,
            stale = report.wagers_stale,
            failed = report.wagers_failed,
            skipped_matches = report.matches_skipped,
            failed_matches = report.matches_failed,
            paid_out = report.total_paid_out,
            "settlement pass finished"
        );
        Ok(report)
    }

    async fn settle_match(&self, finished: FinishedMatch, report: &mut SettlementReport) {
        let match_id = finished.match_id;
        let Some(winning_side_id) = finished.winning_side_id else {
            info!(match_id, "match has no winner yet, skipping");
            report.record_skipped_match(match_id);
            return;
        };

        let placed = match self.wagers.list_placed_by_match(match_id).await {
            Ok(placed) => placed,
            Err(e) => {
                error!(match_id, "could not list placed wagers: {}", e);
                report.record_failed_match(match_id, e.to_string());
                return;
            }
        };
        report.matches_processed += 1;

        if placed.is_empty() {
            info!(match_id, "no placed wagers for match");
            return;
        }
        info!(match_id, winning_side_id, wagers = placed.len(), "settling match");

        let results: Vec<_> = stream::iter(placed)
            .map(|wager| self.settle_one(wager, winning_side_id))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (wager, result) in results {
            match result {
                Ok(outcome) => report.record_settled(&outcome),
                Err(LedgerError::StaleWager { wager_id }) => {
                    warn!(match_id, wager_id = %wager_id, "wager already settled, skipping");
                    report.record_stale(match_id, wager_id);
                }
                Err(e) => {
                    error!(match_id, wager_id = %wager.id, "failed to settle wager: {}", e);
                    report.record_failed(match_id, wager.id, e.to_string(), e.is_retryable());
                }
            }
        }
    }

    async fn settle_one(
        &self,
        wager: Wager,
        winning_side_id: SideId,
    ) -> (Wager, LedgerResult<common::SettlementOutcome>) {
        let result = self.engine.settle(&wager, winning_side_id).await;
        (wager, result)
    }
}
