#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use doctor_cell::DoctorRegistry;
use shared_utils::ManualClock;
use token_queue_cell::QueueEngine;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

/// Engine over the seeded roster with a clock the test controls.
pub fn seeded_engine() -> (Arc<QueueEngine>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = QueueEngine::new(DoctorRegistry::seeded(), clock.clone());
    (Arc::new(engine), clock)
}
