use thiserror::Error;
use uuid::Uuid;

use doctor_cell::DoctorError;

use crate::TokenStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Patient already holds token #{token_number} with doctor {doctor_id}")]
    DuplicateActiveBooking { doctor_id: String, token_number: u32 },

    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Average consultation time must be a positive number of minutes, got {0}")]
    InvalidAverageTime(i64),

    #[error("Token not found: {0}")]
    TokenNotFound(Uuid),

    #[error("Invalid token status transition from {from} to {to}")]
    InvalidStatusTransition { from: TokenStatus, to: TokenStatus },
}

impl From<DoctorError> for QueueError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(id) => QueueError::DoctorNotFound(id),
            DoctorError::InvalidAverageTime(minutes) => QueueError::InvalidAverageTime(minutes),
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
