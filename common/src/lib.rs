use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod report;

pub use report::{ItemResult, SettlementItem, SettlementReport};

pub type MatchId = i64;
pub type SideId = i64;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct User {
    pub id: String,
    pub riot_id: String,
    pub username: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Running,
    Finished,
    Canceled,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Match {
    pub id: MatchId,
    pub name: String,
    pub side_a: SideId,
    pub side_b: SideId,
    pub scheduled_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub winning_side_id: Option<SideId>,
    pub tournament_name: String,
}

// What the results provider hands the settlement pass. A missing winner means
// the match cannot be settled yet.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub struct FinishedMatch {
    pub match_id: MatchId,
    pub winning_side_id: Option<SideId>,
}

impl From<&Match> for FinishedMatch {
    fn from(value: &Match) -> Self {
        Self {
            match_id: value.id,
            winning_side_id: value.winning_side_id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Placed,
    Won,
    Lost,
}

impl WagerStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WagerStatus::Placed)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Wager {
    pub id: String,
    pub user_id: String,
    pub match_id: MatchId,
    pub chosen_side_id: SideId,
    pub stake: i64,
    pub status: WagerStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SettlementOutcome {
    pub wager_id: String,
    pub user_id: String,
    pub match_id: MatchId,
    pub won: bool,
    /// Amount credited to the user. Zero for a lost wager.
    pub payout: i64,
}
