use serde::{Deserialize, Serialize};

use crate::{MatchId, SettlementOutcome};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum ItemResult {
    Settled { won: bool, payout: i64 },
    /// The wager was no longer placed when the pass reached it.
    Stale,
    Failed { reason: String, retryable: bool },
    /// Whole match skipped because no winner is known yet.
    SkippedMatch,
    /// Placed wagers for the match could not be listed.
    MatchFailed { reason: String },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SettlementItem {
    pub match_id: MatchId,
    pub wager_id: Option<String>,
    pub result: ItemResult,
}

/// Aggregate of one settlement pass. Partial failure is normal here, so the
/// pass reports counts instead of a single pass/fail signal.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct SettlementReport {
    pub matches_processed: usize,
    pub matches_skipped: usize,
    pub matches_failed: usize,
    pub wagers_settled: usize,
    pub wagers_won: usize,
    pub wagers_lost: usize,
    pub wagers_stale: usize,
    pub wagers_failed: usize,
    pub total_paid_out: i64,
    pub items: Vec<SettlementItem>,
}

impl SettlementReport {
    pub fn record_settled(&mut self, outcome: &SettlementOutcome) {
        self.wagers_settled += 1;
        if outcome.won {
            self.wagers_won += 1;
        } else {
            self.wagers_lost += 1;
        }
        self.total_paid_out += outcome.payout;
        self.items.push(SettlementItem {
            match_id: outcome.match_id,
            wager_id: Some(outcome.wager_id.clone()),
            result: ItemResult::Settled {
                won: outcome.won,
                payout: outcome.payout,
            },
        });
    }

    pub fn record_stale(&mut self, match_id: MatchId, wager_id: impl Into<String>) {
        self.wagers_stale += 1;
        self.items.push(SettlementItem {
            match_id,
            wager_id: Some(wager_id.into()),
            result: ItemResult::Stale,
        });
    }

    pub fn record_failed(
        &mut self,
        match_id: MatchId,
        wager_id: impl Into<String>,
        reason: impl Into<String>,
        retryable: bool,
    ) {
        self.wagers_failed += 1;
        self.items.push(SettlementItem {
            match_id,
            wager_id: Some(wager_id.into()),
            result: ItemResult::Failed {
                reason: reason.into(),
                retryable,
            },
        });
    }

    pub fn record_skipped_match(&mut self, match_id: MatchId) {
        self.matches_skipped += 1;
        self.items.push(SettlementItem {
            match_id,
            wager_id: None,
            result: ItemResult::SkippedMatch,
        });
    }

    pub fn record_failed_match(&mut self, match_id: MatchId, reason: impl Into<String>) {
        self.matches_failed += 1;
        self.items.push(SettlementItem {
            match_id,
            wager_id: None,
            result: ItemResult::MatchFailed {
                reason: reason.into(),
            },
        });
    }

    pub fn is_clean(&self) -> bool {
        self.wagers_failed == 0 && self.matches_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(won: bool, payout: i64) -> SettlementOutcome {
        SettlementOutcome {
            wager_id: "w1".into(),
            user_id: "u1".into(),
            match_id: 7,
            won,
            payout,
        }
    }

    #[test]
    fn counts_follow_recorded_items() {
        let mut report = SettlementReport::default();
        report.record_settled(&outcome(true, 200));
        report.record_settled(&outcome(false, 0));
        report.record_stale(7, "w2");
        report.record_failed(7, "w3", "user missing", true);
        report.record_skipped_match(8);

        assert_eq!(report.wagers_settled, 2);
        assert_eq!(report.wagers_won, 1);
        assert_eq!(report.wagers_lost, 1);
        assert_eq!(report.wagers_stale, 1);
        assert_eq!(report.wagers_failed, 1);
        assert_eq!(report.matches_skipped, 1);
        assert_eq!(report.total_paid_out, 200);
        assert_eq!(report.items.len(), 5);
        assert!(!report.is_clean());
    }

    #[test]
    fn stale_and_skipped_items_keep_report_clean() {
        let mut report = SettlementReport::default();
        report.record_stale(1, "w1");
        report.record_skipped_match(2);
        assert!(report.is_clean());
    }
}
