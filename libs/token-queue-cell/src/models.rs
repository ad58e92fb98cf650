use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::{Doctor, OpdStatus};
use shared_models::auth::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Waiting,
    InConsultation,
    Completed,
    Missed,
    OnHold,
}

impl TokenStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TokenStatus::Completed | TokenStatus::Missed | TokenStatus::OnHold)
    }

    pub fn can_transition_to(&self, target: &TokenStatus) -> bool {
        use TokenStatus::*;
        matches!(
            (self, target),
            (Waiting, InConsultation)
                | (Waiting, Missed)
                | (Waiting, OnHold)
                | (InConsultation, Completed)
        )
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TokenStatus::Waiting => "WAITING",
            TokenStatus::InConsultation => "IN_CONSULTATION",
            TokenStatus::Completed => "COMPLETED",
            TokenStatus::Missed => "MISSED",
            TokenStatus::OnHold => "ON_HOLD",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub doctor_id: String,
    pub patient_id: String,
    pub token_number: u32,
    pub status: TokenStatus,
    pub booked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(
        doctor_id: &str,
        patient_id: &str,
        token_number: u32,
        booked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id: doctor_id.to_string(),
            patient_id: patient_id.to_string(),
            token_number,
            status: TokenStatus::Waiting,
            booked_at,
            start_time: None,
            end_time: None,
        }
    }
}

/// Wait estimate for a token. Closed and paused doctors are states, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "minutes", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Eta {
    Minutes(i64),
    Paused,
    Closed,
}

impl Eta {
    pub const PAUSED_SENTINEL: i64 = -1;
    pub const CLOSED_SENTINEL: i64 = 0;

    /// Minutes with the display sentinels: `-1` paused, `0` closed.
    pub fn minutes(&self) -> i64 {
        match self {
            Eta::Minutes(minutes) => *minutes,
            Eta::Paused => Self::PAUSED_SENTINEL,
            Eta::Closed => Self::CLOSED_SENTINEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    pub completed: Option<Token>,
    pub called: Option<Token>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub completed: usize,
    pub waiting: usize,
    pub missed: usize,
    pub on_hold: usize,
    pub in_consultation: usize,
    /// Waiting plus the patient currently inside.
    pub left: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorQueueView {
    pub doctor: Doctor,
    pub active: Option<Token>,
    pub waiting: Vec<Token>,
    pub history: Vec<Token>,
    pub stats: QueueStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientStatus {
    pub token: Token,
    pub doctor: Doctor,
    pub now_serving: Option<u32>,
    pub ahead: usize,
    pub eta: Eta,
    pub eta_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueEvent {
    TokenBooked,
    QueueAdvanced,
    TokenSkipped,
    TokenHeld,
    OpdStatusChanged,
    AvgTimeChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueUpdate {
    pub doctor_id: String,
    pub event: QueueEvent,
    pub message: String,
    pub tokens: Vec<Token>,
    pub opd_status: Option<OpdStatus>,
    pub broadcast_message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Everything that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub doctors: Vec<Doctor>,
    #[serde(default)]
    pub current_user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEtaResponse {
    pub token: Token,
    pub eta: Eta,
    pub eta_minutes: i64,
}
