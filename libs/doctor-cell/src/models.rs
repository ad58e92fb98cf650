use serde::{Deserialize, Serialize};

use crate::error::DoctorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpdStatus {
    Active,
    Paused,
    Closed,
}

impl std::fmt::Display for OpdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OpdStatus::Active => "ACTIVE",
            OpdStatus::Paused => "PAUSED",
            OpdStatus::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub specialty: String,
    pub hospital: String,
    /// Minutes; always positive.
    pub avg_consultation_time: u32,
    pub current_opd_status: OpdStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_message: Option<String>,
    pub experience_years: u32,
    pub rating: f32,
    pub reviews: u32,
    pub image_url: Option<String>,
}

impl Doctor {
    pub fn is_closed(&self) -> bool {
        self.current_opd_status == OpdStatus::Closed
    }

    pub fn is_paused(&self) -> bool {
        self.current_opd_status == OpdStatus::Paused
    }

    /// Status and broadcast change together; a missing broadcast clears the old one.
    pub fn apply_opd_status(&mut self, status: OpdStatus, broadcast: Option<String>) {
        self.current_opd_status = status;
        self.broadcast_message = broadcast.filter(|message| !message.trim().is_empty());
    }

    pub fn apply_avg_consultation_time(&mut self, minutes: i64) -> Result<(), DoctorError> {
        let minutes = validate_avg_consultation_time(minutes)?;
        self.avg_consultation_time = minutes;
        Ok(())
    }
}

pub fn validate_avg_consultation_time(minutes: i64) -> Result<u32, DoctorError> {
    if minutes <= 0 {
        return Err(DoctorError::InvalidAverageTime(minutes));
    }
    u32::try_from(minutes).map_err(|_| DoctorError::InvalidAverageTime(minutes))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOpdStatusRequest {
    pub status: OpdStatus,
    pub broadcast_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvgTimeRequest {
    pub minutes: i64,
}
