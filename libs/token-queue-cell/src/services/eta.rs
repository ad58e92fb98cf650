use chrono::{DateTime, Utc};

use doctor_cell::Doctor;

use crate::{Eta, Token, TokenLedger};

/// Read-side wait estimate over one doctor's queue. Never mutates, never fails.
pub struct EtaEstimator;

impl EtaEstimator {
    pub fn estimate(
        doctor: Option<&Doctor>,
        ledger: &TokenLedger,
        target: &Token,
        now: DateTime<Utc>,
    ) -> Eta {
        let doctor = match doctor {
            Some(doctor) if !doctor.is_closed() => doctor,
            _ => return Eta::Closed,
        };

        let avg = f64::from(doctor.avg_consultation_time);
        let ahead = ledger.waiting_ahead_of(target.token_number);
        let mut base = ahead as f64 * avg;

        if let Some(active) = ledger.active() {
            // No start time means the consultation has only just begun.
            let elapsed = active
                .start_time
                .map(|start| elapsed_minutes(start, now))
                .unwrap_or(0.0);
            base += (avg - elapsed).max(0.0);
        }

        // PAUSED overrides the computed wait.
        if doctor.is_paused() {
            return Eta::Paused;
        }

        Eta::Minutes(base.round() as i64)
    }
}

fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - since).num_milliseconds().max(0);
    millis as f64 / 60_000.0
}
