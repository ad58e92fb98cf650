use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{AdvanceOutcome, QueueError, QueueStats, Token, TokenStatus};

/// One doctor's token history plus the counter that numbers new tokens.
///
/// Tokens are kept in issue order, which is also `token_number` order.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    doctor_id: String,
    tokens: Vec<Token>,
    issued: u32,
}

impl TokenLedger {
    pub fn new(doctor_id: &str) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            tokens: Vec::new(),
            issued: 0,
        }
    }

    /// Rebuilds a ledger from persisted tokens. The counter resumes past the
    /// highest number ever handed out so restored queues never reuse one.
    pub fn from_tokens(doctor_id: &str, mut tokens: Vec<Token>) -> Self {
        tokens.retain(|t| t.doctor_id == doctor_id);
        tokens.sort_by_key(|t| t.token_number);
        let highest = tokens.iter().map(|t| t.token_number).max().unwrap_or(0);
        let issued = highest.max(tokens.len() as u32);

        Self {
            doctor_id: doctor_id.to_string(),
            tokens,
            issued,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn issued(&self) -> u32 {
        self.issued
    }

    pub fn find(&self, token_id: Uuid) -> Option<&Token> {
        self.tokens.iter().find(|t| t.id == token_id)
    }

    pub fn active(&self) -> Option<&Token> {
        self.tokens.iter().find(|t| t.status == TokenStatus::InConsultation)
    }

    pub fn next_waiting(&self) -> Option<&Token> {
        self.tokens
            .iter()
            .filter(|t| t.status == TokenStatus::Waiting)
            .min_by_key(|t| t.token_number)
    }

    pub fn waiting(&self) -> Vec<&Token> {
        let mut waiting: Vec<&Token> = self
            .tokens
            .iter()
            .filter(|t| t.status == TokenStatus::Waiting)
            .collect();
        waiting.sort_by_key(|t| t.token_number);
        waiting
    }

    /// WAITING tokens numbered strictly below `token_number`.
    pub fn waiting_ahead_of(&self, token_number: u32) -> usize {
        self.tokens
            .iter()
            .filter(|t| t.status == TokenStatus::Waiting && t.token_number < token_number)
            .count()
    }

    /// The patient's token that still blocks a new booking, if any.
    pub fn open_booking_for(&self, patient_id: &str) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|t| t.patient_id == patient_id && t.status != TokenStatus::Completed)
    }

    pub fn issue(&mut self, patient_id: &str, now: DateTime<Utc>) -> Result<Token, QueueError> {
        if let Some(existing) = self.open_booking_for(patient_id) {
            return Err(QueueError::DuplicateActiveBooking {
                doctor_id: self.doctor_id.clone(),
                token_number: existing.token_number,
            });
        }

        self.issued += 1;
        let token = Token::new(&self.doctor_id, patient_id, self.issued, now);
        self.tokens.push(token.clone());
        Ok(token)
    }

    /// Completes the active token and calls the lowest-numbered waiting one.
    /// Both indices are resolved before either token is touched.
    pub fn advance(&mut self, now: DateTime<Utc>) -> AdvanceOutcome {
        let active_idx = self
            .tokens
            .iter()
            .position(|t| t.status == TokenStatus::InConsultation);
        let next_idx = self
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TokenStatus::Waiting)
            .min_by_key(|(_, t)| t.token_number)
            .map(|(idx, _)| idx);

        let completed = active_idx.map(|idx| {
            let token = &mut self.tokens[idx];
            token.status = TokenStatus::Completed;
            token.end_time = Some(now);
            token.clone()
        });

        let called = next_idx.map(|idx| {
            let token = &mut self.tokens[idx];
            token.status = TokenStatus::InConsultation;
            token.start_time = Some(now);
            token.clone()
        });

        AdvanceOutcome { completed, called }
    }

    /// Moves a WAITING token to MISSED or ON_HOLD.
    pub fn set_aside(&mut self, token_id: Uuid, to: TokenStatus) -> Result<Token, QueueError> {
        let token = self
            .tokens
            .iter_mut()
            .find(|t| t.id == token_id)
            .ok_or(QueueError::TokenNotFound(token_id))?;

        let allowed = matches!(to, TokenStatus::Missed | TokenStatus::OnHold)
            && token.status.can_transition_to(&to);
        if !allowed {
            return Err(QueueError::InvalidStatusTransition {
                from: token.status,
                to,
            });
        }

        token.status = to;
        Ok(token.clone())
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.tokens.len(),
            ..QueueStats::default()
        };

        for token in &self.tokens {
            match token.status {
                TokenStatus::Waiting => stats.waiting += 1,
                TokenStatus::InConsultation => stats.in_consultation += 1,
                TokenStatus::Completed => stats.completed += 1,
                TokenStatus::Missed => stats.missed += 1,
                TokenStatus::OnHold => stats.on_hold += 1,
            }
        }
        stats.left = stats.waiting + stats.in_consultation;

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn ledger_with(patients: &[&str]) -> (TokenLedger, DateTime<Utc>) {
        let now = Utc::now();
        let mut ledger = TokenLedger::new("doc1");
        for (i, patient) in patients.iter().enumerate() {
            ledger
                .issue(patient, now + Duration::seconds(i as i64))
                .expect("fresh patient should book");
        }
        (ledger, now)
    }

    #[test]
    fn issue_numbers_tokens_sequentially() {
        let (ledger, _) = ledger_with(&["p1", "p2", "p3"]);

        let numbers: Vec<u32> = ledger.tokens().iter().map(|t| t.token_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(ledger.issued(), 3);
        assert!(ledger.tokens().iter().all(|t| t.status == TokenStatus::Waiting));
    }

    #[test]
    fn missed_token_still_blocks_rebooking() {
        let (mut ledger, now) = ledger_with(&["p1"]);
        let id = ledger.tokens()[0].id;
        ledger.set_aside(id, TokenStatus::Missed).unwrap();

        assert_matches!(
            ledger.issue("p1", now),
            Err(QueueError::DuplicateActiveBooking { token_number: 1, .. })
        );
    }

    #[test]
    fn completed_token_allows_rebooking_with_next_number() {
        let (mut ledger, now) = ledger_with(&["p1"]);
        ledger.advance(now);
        ledger.advance(now);

        let token = ledger.issue("p1", now).unwrap();
        assert_eq!(token.token_number, 2);
    }

    #[test]
    fn advance_skips_set_aside_tokens() {
        let (mut ledger, now) = ledger_with(&["p1", "p2", "p3"]);
        let first = ledger.tokens()[0].id;
        ledger.set_aside(first, TokenStatus::OnHold).unwrap();

        let outcome = ledger.advance(now);
        assert!(outcome.completed.is_none());
        assert_eq!(outcome.called.map(|t| t.token_number), Some(2));
    }

    #[test]
    fn set_aside_rejects_non_waiting_tokens() {
        let (mut ledger, now) = ledger_with(&["p1"]);
        let id = ledger.tokens()[0].id;
        ledger.advance(now);

        assert_matches!(
            ledger.set_aside(id, TokenStatus::Missed),
            Err(QueueError::InvalidStatusTransition {
                from: TokenStatus::InConsultation,
                to: TokenStatus::Missed
            })
        );
        assert_matches!(
            ledger.set_aside(id, TokenStatus::Completed),
            Err(QueueError::InvalidStatusTransition { .. })
        );
    }

    #[test]
    fn from_tokens_resumes_counter_past_highest_number() {
        let now = Utc::now();
        let mut restored = vec![
            Token::new("doc1", "p1", 4, now),
            Token::new("doc1", "p2", 2, now),
            Token::new("doc2", "p3", 9, now),
        ];
        restored[0].status = TokenStatus::Completed;

        let mut ledger = TokenLedger::from_tokens("doc1", restored);
        assert_eq!(ledger.tokens().len(), 2);
        assert_eq!(ledger.tokens()[0].token_number, 2);

        let token = ledger.issue("p9", now).unwrap();
        assert_eq!(token.token_number, 5);
    }

    #[test]
    fn stats_count_left_as_waiting_plus_active() {
        let (mut ledger, now) = ledger_with(&["p1", "p2", "p3", "p4"]);
        ledger.advance(now);
        ledger.advance(now);
        let third = ledger.tokens()[2].id;
        ledger.set_aside(third, TokenStatus::Missed).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_consultation, 1);
        assert_eq!(stats.missed, 1);
        assert_eq!(stats.waiting, 1);
        assert_eq!(stats.left, 2);
    }
}
