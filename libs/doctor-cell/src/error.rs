use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    NotFound(String),

    #[error("Average consultation time must be a positive number of minutes, got {0}")]
    InvalidAverageTime(i64),
}
