use common::User;
use futures::FutureExt;
use surrealdb::sql::Thing;
use tracing::{info, warn};

use crate::database::{user_thing, DbUser, LedgerStore, Scope, Transaction, Write, USER_TABLE};
use crate::error::{LedgerError, LedgerResult};

#[derive(Clone)]
pub struct UserRepository {
    store: LedgerStore,
    starting_balance: i64,
}

impl UserRepository {
    pub fn new(store: LedgerStore, starting_balance: i64) -> Self {
        Self {
            store,
            starting_balance,
        }
    }

    pub async fn create(&self, riot_id: &str, username: &str) -> LedgerResult<User> {
        self.create_with_balance(riot_id, username, self.starting_balance)
            .await
    }

    pub async fn create_with_balance(
        &self,
        riot_id: &str,
        username: &str,
        balance: i64,
    ) -> LedgerResult<User> {
        let user = DbUser::new(riot_id, username, balance);
        let affected = self
            .store
            .write(Scope::AutoCommit, Write::InsertUser(user.clone()))
            .await?;
        if affected == 0 {
            return Err(LedgerError::Constraint(format!(
                "riot id {riot_id} is already registered"
            )));
        }
        Ok(user.into())
    }

    pub async fn get(&self, user_id: &str) -> LedgerResult<Option<User>> {
        let found: Option<DbUser> = self.store.fetch(&user_thing(user_id)).await?;
        Ok(found.map(Into::into))
    }

    pub async fn find_by_riot_id(&self, riot_id: &str) -> LedgerResult<Option<User>> {
        let mut found: Vec<DbUser> = self
            .store
            .client()
            .query(format!("SELECT * FROM {USER_TABLE} WHERE riot_id = $riot_id;"))
            .bind(("riot_id", riot_id))
            .await?
            .take(0)?;
        Ok(found.pop().map(Into::into))
    }

    /// Resolves a login identity to a ledger user, creating the user on first
    /// sight.
    pub async fn find_or_create(&self, riot_id: &str, username: &str) -> LedgerResult<User> {
        if let Some(user) = self.find_by_riot_id(riot_id).await? {
            info!(riot_id, "found existing user");
            return Ok(user);
        }

        info!(riot_id, "user not found, creating");
        match self.create(riot_id, username).await {
            Ok(user) => Ok(user),
            // lost a race with another login for the same identity
            Err(LedgerError::Constraint(_)) => self
                .find_by_riot_id(riot_id)
                .await?
                .ok_or_else(|| LedgerError::NotFound(format!("user with riot id {riot_id}"))),
            Err(e) => Err(e),
        }
    }

    pub async fn adjust_balance(
        &self,
        scope: Scope<'_>,
        user_id: &str,
        delta: i64,
    ) -> LedgerResult<u64> {
        self.store
            .write(
                scope,
                Write::AdjustBalance {
                    user: user_thing(user_id),
                    delta,
                },
            )
            .await
    }

    /// Deletes the user and all of their wagers in one transaction. Returns
    /// the number of wagers removed.
    pub async fn delete(&self, user_id: &str) -> LedgerResult<u64> {
        let store = self.store.clone();
        let user = user_thing(user_id);
        let removed = self
            .store
            .run_transaction(move |tx| delete_cascade(store, user, tx).boxed())
            .await;

        match &removed {
            Ok(wagers) => info!(user_id, wagers, "user deleted"),
            Err(e) => warn!(user_id, "user deletion rolled back: {}", e),
        }
        removed
    }
}

async fn delete_cascade(store: LedgerStore, user: Thing, tx: &mut Transaction) -> LedgerResult<u64> {
    let wagers = store
        .write(
            Scope::Transaction(&mut *tx),
            Write::DeleteWagersOfUser { user: user.clone() },
        )
        .await?;

    let deleted = store
        .write(
            Scope::Transaction(&mut *tx),
            Write::DeleteUser { user: user.clone() },
        )
        .await?;
    if deleted == 0 {
        return Err(LedgerError::NotFound(format!("user {user}")));
    }
    Ok(wagers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wagers::WagerRepository;

    async fn setup() -> (LedgerStore, UserRepository) {
        let store = LedgerStore::open_in_memory().await.unwrap();
        let users = UserRepository::new(store.clone(), 1000);
        (store, users)
    }

    #[tokio::test]
    async fn new_users_start_with_configured_balance() {
        let (_, users) = setup().await;
        let user = users.create("riot-a", "alice").await.unwrap();
        assert_eq!(user.balance, 1000);
        assert_eq!(users.get(&user.id).await.unwrap().unwrap().username, "alice");
    }

    #[tokio::test]
    async fn riot_id_is_unique() {
        let (_, users) = setup().await;
        users.create("riot-a", "alice").await.unwrap();
        let duplicate = users.create("riot-a", "impostor").await;
        assert!(matches!(duplicate, Err(LedgerError::Constraint(_))));
    }

    #[tokio::test]
    async fn find_or_create_is_stable_per_identity() {
        let (_, users) = setup().await;
        let first = users.find_or_create("riot-b", "bob").await.unwrap();
        let second = users.find_or_create("riot-b", "bob").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.balance, 1000);
    }

    #[tokio::test]
    async fn adjust_balance_reports_missing_user() {
        let (_, users) = setup().await;
        let user = users.create("riot-c", "carol").await.unwrap();

        let hit = users
            .adjust_balance(Scope::AutoCommit, &user.id, -300)
            .await
            .unwrap();
        let miss = users
            .adjust_balance(Scope::AutoCommit, "missing", 300)
            .await
            .unwrap();
        assert_eq!((hit, miss), (1, 0));
        assert_eq!(users.get(&user.id).await.unwrap().unwrap().balance, 700);
    }

    #[tokio::test]
    async fn delete_removes_wagers_before_user() {
        let (store, users) = setup().await;
        let wagers = WagerRepository::new(store);
        let user = users.create("riot-d", "dave").await.unwrap();
        let other = users.create("riot-e", "erin").await.unwrap();
        wagers.create(&user.id, 1, 10, 50).await.unwrap();
        wagers.create(&user.id, 2, 20, 60).await.unwrap();
        let kept = wagers.create(&other.id, 1, 10, 70).await.unwrap();

        let removed = users.delete(&user.id).await.unwrap();

        assert_eq!(removed, 2);
        assert!(users.get(&user.id).await.unwrap().is_none());
        assert!(wagers.list_by_user(&user.id).await.unwrap().is_empty());
        assert!(wagers.get(&kept.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_missing_user_fails() {
        let (_, users) = setup().await;
        let result = users.delete("nobody").await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }
}
