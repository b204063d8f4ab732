use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::sql::{Datetime, Id, Thing};
use surrealdb::Surreal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LedgerError, LedgerResult};

pub const USER_TABLE: &str = "user";
pub const WAGER_TABLE: &str = "wager";
pub const MATCH_TABLE: &str = "esports_match";

const SCHEMA: &str = "
    DEFINE INDEX user_riot_id ON TABLE user FIELDS riot_id UNIQUE;
    DEFINE INDEX wager_match_status ON TABLE wager FIELDS match_id, status;
    DEFINE INDEX wager_user ON TABLE wager FIELDS user;
";

pub fn user_thing(user_id: &str) -> Thing {
    Thing {
        tb: USER_TABLE.into(),
        id: Id::String(user_id.into()),
    }
}

pub fn wager_thing(wager_id: &str) -> Thing {
    Thing {
        tb: WAGER_TABLE.into(),
        id: Id::String(wager_id.into()),
    }
}

pub fn match_thing(match_id: common::MatchId) -> Thing {
    Thing {
        tb: MATCH_TABLE.into(),
        id: Id::Number(match_id),
    }
}

/// The key part of a record id, without the table prefix.
pub fn record_key(thing: &Thing) -> String {
    match &thing.id {
        Id::String(key) => key.clone(),
        other => other.to_string(),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbUser {
    pub id: Thing,
    pub riot_id: String,
    pub username: String,
    pub balance: i64,
    pub created_at: Datetime,
}

impl DbUser {
    pub fn new(riot_id: impl Into<String>, username: impl Into<String>, balance: i64) -> Self {
        Self {
            id: Thing {
                tb: USER_TABLE.into(),
                id: Id::rand(),
            },
            riot_id: riot_id.into(),
            username: username.into(),
            balance,
            created_at: Datetime::default(),
        }
    }
}

impl From<DbUser> for common::User {
    fn from(value: DbUser) -> Self {
        common::User {
            id: record_key(&value.id),
            riot_id: value.riot_id,
            username: value.username,
            balance: value.balance,
            created_at: value.created_at.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbWager {
    pub id: Thing,
    pub user: Thing,
    pub match_id: common::MatchId,
    pub chosen_side_id: common::SideId,
    pub stake: i64,
    pub status: common::WagerStatus,
    pub created_at: Datetime,
}

impl DbWager {
    pub fn new(
        user: Thing,
        match_id: common::MatchId,
        chosen_side_id: common::SideId,
        stake: i64,
    ) -> Self {
        Self {
            id: Thing {
                tb: WAGER_TABLE.into(),
                id: Id::rand(),
            },
            user,
            match_id,
            chosen_side_id,
            stake,
            status: common::WagerStatus::Placed,
            created_at: Datetime::default(),
        }
    }
}

impl From<DbWager> for common::Wager {
    fn from(value: DbWager) -> Self {
        common::Wager {
            id: record_key(&value.id),
            user_id: record_key(&value.user),
            match_id: value.match_id,
            chosen_side_id: value.chosen_side_id,
            stake: value.stake,
            status: value.status,
            created_at: value.created_at.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbMatch {
    pub id: Thing,
    pub name: String,
    pub side_a: common::SideId,
    pub side_b: common::SideId,
    pub scheduled_at: Datetime,
    pub status: common::MatchStatus,
    pub winning_side_id: Option<common::SideId>,
    pub tournament_name: String,
}

impl From<&common::Match> for DbMatch {
    fn from(value: &common::Match) -> Self {
        Self {
            id: match_thing(value.id),
            name: value.name.clone(),
            side_a: value.side_a,
            side_b: value.side_b,
            scheduled_at: Datetime::from(value.scheduled_at),
            status: value.status,
            winning_side_id: value.winning_side_id,
            tournament_name: value.tournament_name.clone(),
        }
    }
}

impl TryFrom<DbMatch> for common::Match {
    type Error = LedgerError;

    fn try_from(value: DbMatch) -> LedgerResult<Self> {
        let id = match value.id.id {
            Id::Number(id) => id,
            other => {
                return Err(LedgerError::Constraint(format!(
                    "match record {other} does not have a numeric id"
                )))
            }
        };
        Ok(common::Match {
            id,
            name: value.name,
            side_a: value.side_a,
            side_b: value.side_b,
            scheduled_at: value.scheduled_at.0,
            status: value.status,
            winning_side_id: value.winning_side_id,
            tournament_name: value.tournament_name,
        })
    }
}

/// A single mutation of ledger state. Writes are checked when they are issued
/// and applied when their scope commits.
#[derive(Debug, Clone)]
pub enum Write {
    InsertUser(DbUser),
    InsertWager(DbWager),
    /// Moves a placed wager to a terminal status.
    SetWagerStatus {
        wager: Thing,
        status: common::WagerStatus,
    },
    AdjustBalance {
        user: Thing,
        delta: i64,
    },
    DeleteWagersOfUser {
        user: Thing,
    },
    DeleteUser {
        user: Thing,
    },
    UpsertMatch(DbMatch),
}

impl Write {
    // Parameters carry the statement index so several writes can share one
    // request.
    fn statement(&self, index: usize) -> String {
        match self {
            Write::InsertUser(_) | Write::InsertWager(_) => {
                format!("CREATE $record_{index} CONTENT $content_{index};")
            }
            Write::SetWagerStatus { .. } => {
                format!("UPDATE $record_{index} SET status = $value_{index};")
            }
            Write::AdjustBalance { .. } => {
                format!("UPDATE $record_{index} SET balance += $value_{index};")
            }
            Write::DeleteWagersOfUser { .. } => {
                format!("DELETE {WAGER_TABLE} WHERE user = $record_{index};")
            }
            Write::DeleteUser { .. } => format!("DELETE $record_{index};"),
            Write::UpsertMatch(_) => format!("UPDATE $record_{index} CONTENT $content_{index};"),
        }
    }
}

/// Where a write runs: on its own, or as part of an open transaction.
pub enum Scope<'t> {
    /// Applied immediately as a single statement.
    AutoCommit,
    Transaction(&'t mut Transaction),
}

/// An open unit of work. Holds the store's write lock until it is committed
/// or dropped; dropping it without committing discards every staged write.
pub struct Transaction {
    store: LedgerStore,
    staged: Vec<Write>,
    _guard: OwnedMutexGuard<bool>,
}

impl Transaction {
    pub fn staged(&self) -> &[Write] {
        &self.staged
    }

    pub async fn commit(self) -> LedgerResult<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        self.store.execute(&self.staged).await
    }

    pub fn rollback(self) {
        debug!("rolling back {} staged writes", self.staged.len());
    }
}

/// Handle on the ledger's database. Opened once per process and cloned into
/// every repository.
#[derive(Clone)]
pub struct LedgerStore {
    connection: Surreal<Any>,
    // guards every write; the flag is set once the store is closed
    write_lock: Arc<Mutex<bool>>,
}

impl LedgerStore {
    pub async fn open(config: &Config) -> LedgerResult<Self> {
        let db = any::connect(config.database_url.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.db_username, &config.db_password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await?;
        db.query(SCHEMA).await?.check()?;

        info!(url = %config.database_url, "ledger store opened");
        Ok(Self {
            connection: db,
            write_lock: Arc::new(Mutex::new(false)),
        })
    }

    pub async fn open_in_memory() -> LedgerResult<Self> {
        Self::open(&Config::in_memory()).await
    }

    /// Waits for the transaction in flight, if any, then closes the store for
    /// every clone. Later writes fail with `LedgerError::Closed`. The
    /// connection itself goes once the last clone is dropped.
    pub async fn close(self) {
        let mut closed = self.write_lock.lock().await;
        if !*closed {
            *closed = true;
            info!("ledger store closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        *self.write_lock.lock().await
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.connection
    }

    pub async fn begin(&self) -> LedgerResult<Transaction> {
        let guard = self.write_lock.clone().lock_owned().await;
        if *guard {
            return Err(LedgerError::Closed);
        }
        Ok(Transaction {
            store: self.clone(),
            staged: vec![],
            _guard: guard,
        })
    }

    /// Runs `body` as one all-or-nothing unit. Its writes commit together when
    /// it returns `Ok`; on `Err` none of them are applied.
    pub async fn run_transaction<T, F>(&self, body: F) -> LedgerResult<T>
    where
        F: for<'t> FnOnce(
            &'t mut Transaction,
        ) -> futures::future::BoxFuture<'t, LedgerResult<T>>,
    {
        let mut tx = self.begin().await?;
        let result = body(&mut tx).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Issues `write` in `scope` and returns how many rows it affects. A write
    /// that affects nothing is not staged or executed.
    pub async fn write(&self, scope: Scope<'_>, write: Write) -> LedgerResult<u64> {
        match scope {
            Scope::AutoCommit => {
                let closed = self.write_lock.lock().await;
                if *closed {
                    return Err(LedgerError::Closed);
                }
                let affected = self.affected_rows(&write, &[]).await?;
                if affected > 0 {
                    self.execute(std::slice::from_ref(&write)).await?;
                }
                Ok(affected)
            }
            Scope::Transaction(tx) => {
                let affected = self.affected_rows(&write, &tx.staged).await?;
                if affected > 0 {
                    tx.staged.push(write);
                }
                Ok(affected)
            }
        }
    }

    // Callers hold the write lock, so committed state cannot move underneath
    // the count. `staged` covers earlier writes of the same transaction.
    async fn affected_rows(&self, write: &Write, staged: &[Write]) -> LedgerResult<u64> {
        let deleted_users: Vec<&Thing> = staged
            .iter()
            .filter_map(|w| match w {
                Write::DeleteUser { user } => Some(user),
                _ => None,
            })
            .collect();

        let affected = match write {
            Write::InsertUser(user) => {
                let existing: Vec<DbUser> = self
                    .connection
                    .query(format!("SELECT * FROM {USER_TABLE} WHERE riot_id = $riot_id;"))
                    .bind(("riot_id", &user.riot_id))
                    .await?
                    .take(0)?;
                let staged_duplicate = staged.iter().any(|w| {
                    matches!(w, Write::InsertUser(other) if other.riot_id == user.riot_id)
                });
                u64::from(existing.is_empty() && !staged_duplicate)
            }
            Write::InsertWager(wager) => {
                let staged_user = staged
                    .iter()
                    .any(|w| matches!(w, Write::InsertUser(u) if u.id == wager.user));
                let live = !deleted_users.contains(&&wager.user)
                    && (staged_user || self.user_exists(&wager.user).await?);
                u64::from(live)
            }
            Write::SetWagerStatus { wager, .. } => {
                let already_moved = staged
                    .iter()
                    .any(|w| matches!(w, Write::SetWagerStatus { wager: other, .. } if other == wager));
                let current: Option<DbWager> = self.fetch(wager).await?;
                let placed = current
                    .map(|w| w.status == common::WagerStatus::Placed)
                    .unwrap_or(false);
                u64::from(placed && !already_moved)
            }
            Write::AdjustBalance { user, .. } => {
                u64::from(!deleted_users.contains(&user) && self.user_exists(user).await?)
            }
            Write::DeleteWagersOfUser { user } => {
                let wagers: Vec<DbWager> = self
                    .connection
                    .query(format!("SELECT * FROM {WAGER_TABLE} WHERE user = $user;"))
                    .bind(("user", user))
                    .await?
                    .take(0)?;
                let staged_wagers = staged
                    .iter()
                    .filter(|w| matches!(w, Write::InsertWager(wager) if &wager.user == user))
                    .count();
                (wagers.len() + staged_wagers) as u64
            }
            Write::DeleteUser { user } => {
                u64::from(!deleted_users.contains(&user) && self.user_exists(user).await?)
            }
            Write::UpsertMatch(_) => 1,
        };
        Ok(affected)
    }

    pub async fn fetch<T: DeserializeOwned>(&self, record: &Thing) -> LedgerResult<Option<T>> {
        let mut response = self
            .connection
            .query("SELECT * FROM $record;")
            .bind(("record", record))
            .await?;
        Ok(response.take(0)?)
    }

    async fn user_exists(&self, user: &Thing) -> LedgerResult<bool> {
        let found: Option<DbUser> = self.fetch(user).await?;
        Ok(found.is_some())
    }

    // Always wrapped in a transaction so a multi-statement commit is applied
    // as a unit.
    async fn execute(&self, writes: &[Write]) -> LedgerResult<()> {
        let mut query = self.connection.query("BEGIN TRANSACTION;");

        for (index, write) in writes.iter().enumerate() {
            let record = format!("record_{index}");
            query = query.query(write.statement(index));
            query = match write {
                Write::InsertUser(user) => query
                    .bind((record, &user.id))
                    .bind((format!("content_{index}"), user)),
                Write::InsertWager(wager) => query
                    .bind((record, &wager.id))
                    .bind((format!("content_{index}"), wager)),
                Write::SetWagerStatus { wager, status } => query
                    .bind((record, wager))
                    .bind((format!("value_{index}"), status)),
                Write::AdjustBalance { user, delta } => query
                    .bind((record, user))
                    .bind((format!("value_{index}"), delta)),
                Write::DeleteWagersOfUser { user } | Write::DeleteUser { user } => {
                    query.bind((record, user))
                }
                Write::UpsertMatch(record_match) => query
                    .bind((record, &record_match.id))
                    .bind((format!("content_{index}"), record_match)),
            };
        }

        query = query.query("COMMIT TRANSACTION;");

        if let Err(e) = query.await?.check() {
            warn!("write of {} statements failed: {}", writes.len(), e);
            return Err(e.into());
        }
        Ok(())
    }
}
