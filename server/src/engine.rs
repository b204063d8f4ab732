use common::{SettlementOutcome, SideId, Wager, WagerStatus};
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::database::{LedgerStore, Scope, Transaction};
use crate::error::{LedgerError, LedgerResult};
use crate::users::UserRepository;
use crate::wagers::WagerRepository;

/// Fixed even-money odds: a winner gets the stake back plus the same again.
pub const PAYOUT_MULTIPLIER: i64 = 2;

pub fn payout_for(stake: i64) -> LedgerResult<i64> {
    stake
        .checked_mul(PAYOUT_MULTIPLIER)
        .ok_or_else(|| LedgerError::Validation(format!("payout for stake {stake} overflows")))
}

/// Resolves single wagers against a known match winner.
#[derive(Clone)]
pub struct SettlementEngine {
    store: LedgerStore,
    wagers: WagerRepository,
    users: UserRepository,
}

impl SettlementEngine {
    pub fn new(store: LedgerStore, wagers: WagerRepository, users: UserRepository) -> Self {
        Self {
            store,
            wagers,
            users,
        }
    }

    /// Flips the wager to won or lost and credits any payout, as one
    /// transaction. On error nothing is applied and the wager stays placed.
    pub async fn settle(
        &self,
        wager: &Wager,
        winning_side_id: SideId,
    ) -> LedgerResult<SettlementOutcome> {
        let won = wager.chosen_side_id == winning_side_id;
        let payout = if won { payout_for(wager.stake)? } else { 0 };
        let outcome = SettlementOutcome {
            wager_id: wager.id.clone(),
            user_id: wager.user_id.clone(),
            match_id: wager.match_id,
            won,
            payout,
        };

        debug!(
            wager_id = %wager.id,
            user_id = %wager.user_id,
            won,
            "settling wager"
        );

        let engine = self.clone();
        let result = self
            .store
            .run_transaction(move |tx| engine.apply(outcome, tx).boxed())
            .await;

        match &result {
            Ok(outcome) => info!(
                wager_id = %outcome.wager_id,
                won = outcome.won,
                payout = outcome.payout,
                "wager settled"
            ),
            Err(e) => warn!(wager_id = %wager.id, "settlement rolled back: {}", e),
        }
        result
    }

    async fn apply(
        self,
        outcome: SettlementOutcome,
        tx: &mut Transaction,
    ) -> LedgerResult<SettlementOutcome> {
        let status = if outcome.won {
            WagerStatus::Won
        } else {
            WagerStatus::Lost
        };

        let moved = self
            .wagers
            .set_status(Scope::Transaction(&mut *tx), &outcome.wager_id, status)
            .await?;
        if moved == 0 {
            return Err(LedgerError::StaleWager {
                wager_id: outcome.wager_id,
            });
        }

        // a lost stake was never credited back, so there is nothing to debit
        if outcome.won {
            let credited = self
                .users
                .adjust_balance(
                    Scope::Transaction(&mut *tx),
                    &outcome.user_id,
                    outcome.payout,
                )
                .await?;
            if credited == 0 {
                return Err(LedgerError::DanglingUser {
                    wager_id: outcome.wager_id,
                    user_id: outcome.user_id,
                });
            }
        }

        Ok(outcome)
    }
}
