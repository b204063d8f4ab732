use async_trait::async_trait;
use common::{MatchId, SideId, Wager, WagerStatus};
use tracing::info;

use crate::database::{user_thing, wager_thing, DbWager, LedgerStore, Scope, Write, WAGER_TABLE};
use crate::driver::PlacedWagerSource;
use crate::engine::payout_for;
use crate::error::{LedgerError, LedgerResult};

#[derive(Clone)]
pub struct WagerRepository {
    store: LedgerStore,
}

impl WagerRepository {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Places a wager. The stake is not deducted from the balance here; the
    /// ledger is only touched when the wager settles.
    pub async fn create(
        &self,
        user_id: &str,
        match_id: MatchId,
        chosen_side_id: SideId,
        stake: i64,
    ) -> LedgerResult<Wager> {
        if stake <= 0 {
            return Err(LedgerError::Validation(format!(
                "stake must be positive, got {stake}"
            )));
        }
        // a wager whose payout cannot be represented could never settle
        payout_for(stake)?;

        let wager = DbWager::new(user_thing(user_id), match_id, chosen_side_id, stake);
        let affected = self
            .store
            .write(Scope::AutoCommit, Write::InsertWager(wager.clone()))
            .await?;
        if affected == 0 {
            return Err(LedgerError::Constraint(format!(
                "user {user_id} does not exist"
            )));
        }

        let wager: Wager = wager.into();
        info!(
            wager_id = %wager.id,
            user_id,
            match_id,
            chosen_side_id,
            stake,
            "wager placed"
        );
        Ok(wager)
    }

    pub async fn get(&self, wager_id: &str) -> LedgerResult<Option<Wager>> {
        let found: Option<DbWager> = self.store.fetch(&wager_thing(wager_id)).await?;
        Ok(found.map(Into::into))
    }

    /// Placed wagers of one match, oldest first.
    pub async fn list_placed_by_match(&self, match_id: MatchId) -> LedgerResult<Vec<Wager>> {
        let wagers: Vec<DbWager> = self
            .store
            .client()
            .query(format!(
                "SELECT * FROM {WAGER_TABLE} WHERE match_id = $match_id AND status = $status ORDER BY created_at ASC;"
            ))
            .bind(("match_id", match_id))
            .bind(("status", WagerStatus::Placed))
            .await?
            .take(0)?;
        Ok(wagers.into_iter().map(Into::into).collect())
    }

    /// Every wager of one user, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> LedgerResult<Vec<Wager>> {
        let wagers: Vec<DbWager> = self
            .store
            .client()
            .query(format!(
                "SELECT * FROM {WAGER_TABLE} WHERE user = $user ORDER BY created_at DESC;"
            ))
            .bind(("user", user_thing(user_id)))
            .await?
            .take(0)?;
        Ok(wagers.into_iter().map(Into::into).collect())
    }

    /// Moves a placed wager to `status`. Returns zero when the wager is gone or
    /// already terminal.
    pub async fn set_status(
        &self,
        scope: Scope<'_>,
        wager_id: &str,
        status: WagerStatus,
    ) -> LedgerResult<u64> {
        if !status.is_terminal() {
            return Err(LedgerError::Validation(format!(
                "wager {wager_id} can only move to won or lost"
            )));
        }
        self.store
            .write(
                scope,
                Write::SetWagerStatus {
                    wager: wager_thing(wager_id),
                    status,
                },
            )
            .await
    }
}

#[async_trait]
impl PlacedWagerSource for WagerRepository {
    async fn list_placed_by_match(&self, match_id: MatchId) -> LedgerResult<Vec<Wager>> {
        WagerRepository::list_placed_by_match(self, match_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepository;
    use std::time::Duration;

    async fn setup() -> (WagerRepository, String) {
        let store = LedgerStore::open_in_memory().await.unwrap();
        let users = UserRepository::new(store.clone(), 1000);
        let user = users.create("riot-w", "wagerer").await.unwrap();
        (WagerRepository::new(store), user.id)
    }

    #[tokio::test]
    async fn create_rejects_non_positive_stake() {
        let (wagers, user_id) = setup().await;
        for stake in [0, -5] {
            let result = wagers.create(&user_id, 1, 10, stake).await;
            assert!(matches!(result, Err(LedgerError::Validation(_))));
        }
        assert!(wagers.list_by_user(&user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_stake_whose_payout_overflows() {
        let (wagers, user_id) = setup().await;
        let largest = i64::MAX / 2;

        let result = wagers.create(&user_id, 1, 10, largest + 1).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(wagers.list_by_user(&user_id).await.unwrap().is_empty());

        let wager = wagers.create(&user_id, 1, 10, largest).await.unwrap();
        assert_eq!(wager.stake, largest);
    }

    #[tokio::test]
    async fn create_requires_existing_user() {
        let (wagers, _) = setup().await;
        let result = wagers.create("ghost", 1, 10, 50).await;
        assert!(matches!(result, Err(LedgerError::Constraint(_))));
    }

    #[tokio::test]
    async fn created_wager_is_placed_and_readable() {
        let (wagers, user_id) = setup().await;
        let wager = wagers.create(&user_id, 1, 10, 50).await.unwrap();
        assert_eq!(wager.status, WagerStatus::Placed);

        let stored = wagers.get(&wager.id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, user_id);
        assert_eq!(stored.stake, 50);
        assert_eq!(stored.match_id, 1);
    }

    #[tokio::test]
    async fn list_placed_by_match_filters_status_and_match() {
        let (wagers, user_id) = setup().await;
        let first = wagers.create(&user_id, 1, 10, 50).await.unwrap();
        let second = wagers.create(&user_id, 1, 11, 70).await.unwrap();
        wagers.create(&user_id, 2, 20, 30).await.unwrap();

        wagers
            .set_status(Scope::AutoCommit, &second.id, WagerStatus::Lost)
            .await
            .unwrap();

        let placed = wagers.list_placed_by_match(1).await.unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].id, first.id);
    }

    #[tokio::test]
    async fn list_by_user_is_newest_first() {
        let (wagers, user_id) = setup().await;
        let older = wagers.create(&user_id, 1, 10, 50).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer = wagers.create(&user_id, 2, 20, 60).await.unwrap();

        let listed = wagers.list_by_user(&user_id).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn terminal_wager_cannot_move_again() {
        let (wagers, user_id) = setup().await;
        let wager = wagers.create(&user_id, 1, 10, 50).await.unwrap();

        let first = wagers
            .set_status(Scope::AutoCommit, &wager.id, WagerStatus::Won)
            .await
            .unwrap();
        let second = wagers
            .set_status(Scope::AutoCommit, &wager.id, WagerStatus::Lost)
            .await
            .unwrap();
        assert_eq!((first, second), (1, 0));

        let stored = wagers.get(&wager.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WagerStatus::Won);
    }

    #[tokio::test]
    async fn status_cannot_return_to_placed() {
        let (wagers, user_id) = setup().await;
        let wager = wagers.create(&user_id, 1, 10, 50).await.unwrap();
        let result = wagers
            .set_status(Scope::AutoCommit, &wager.id, WagerStatus::Placed)
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}
