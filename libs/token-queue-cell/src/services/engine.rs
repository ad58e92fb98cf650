use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{Doctor, DoctorRegistry, OpdStatus};
use shared_models::auth::{Role, User};
use shared_utils::Clock;

use crate::services::eta::EtaEstimator;
use crate::services::persistence::{load_or_default, SnapshotStore, SnapshotWriter};
use crate::{
    AdvanceOutcome, DoctorQueueView, Eta, PatientStatus, QueueError, QueueEvent,
    QueueNotificationService, QueueStats, QueueUpdate, Snapshot, Token, TokenEtaResponse,
    TokenLedger, TokenStatus,
};

const DEFAULT_PATIENT_NAME: &str = "John Doe";

/// Owns every doctor record and token and is the only mutation path for them.
///
/// Each doctor has a lane: a lock around that doctor's token ledger. Every
/// mutation for a doctor holds its lane write lock for the whole transition,
/// so operations on one doctor are serialized while other doctors proceed in
/// parallel. Lanes are created at construction and never added or removed.
///
/// Lock order is lane, registry, token index, current user.
pub struct QueueEngine {
    registry: RwLock<DoctorRegistry>,
    lanes: HashMap<String, RwLock<TokenLedger>>,
    token_index: RwLock<HashMap<Uuid, String>>,
    current_user: RwLock<Option<User>>,
    clock: Arc<dyn Clock>,
    notifier: QueueNotificationService,
    writer: Option<SnapshotWriter>,
    revision: AtomicU64,
}

impl QueueEngine {
    pub fn new(registry: DoctorRegistry, clock: Arc<dyn Clock>) -> Self {
        Self::from_snapshot(
            Snapshot {
                doctors: registry.into_inner(),
                ..Snapshot::default()
            },
            clock,
        )
    }

    pub fn from_snapshot(snapshot: Snapshot, clock: Arc<dyn Clock>) -> Self {
        let Snapshot {
            tokens,
            doctors,
            current_user,
        } = snapshot;

        let mut by_doctor: HashMap<String, Vec<Token>> =
            doctors.iter().map(|d| (d.id.clone(), Vec::new())).collect();
        let mut token_index = HashMap::with_capacity(tokens.len());

        for token in tokens {
            match by_doctor.get_mut(&token.doctor_id) {
                Some(bucket) => {
                    token_index.insert(token.id, token.doctor_id.clone());
                    bucket.push(token);
                }
                None => warn!(
                    "Dropping token {} for unknown doctor {}",
                    token.id, token.doctor_id
                ),
            }
        }

        let lanes = by_doctor
            .into_iter()
            .map(|(doctor_id, tokens)| {
                let ledger = TokenLedger::from_tokens(&doctor_id, tokens);
                (doctor_id, RwLock::new(ledger))
            })
            .collect();

        info!("Queue engine ready with {} doctors", doctors.len());

        Self {
            registry: RwLock::new(DoctorRegistry::new(doctors)),
            lanes,
            token_index: RwLock::new(token_index),
            current_user: RwLock::new(current_user),
            clock,
            notifier: QueueNotificationService::new(),
            writer: None,
            revision: AtomicU64::new(0),
        }
    }

    /// Restores the last snapshot from `store` (seeding the default roster if
    /// it has no doctors) and saves every later change back to it.
    pub async fn bootstrap(
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        seed_doctors: bool,
    ) -> Self {
        let mut snapshot = load_or_default(store.as_ref()).await;
        if snapshot.doctors.is_empty() && seed_doctors {
            info!("Seeding default doctor roster");
            snapshot.doctors = DoctorRegistry::seeded().into_inner();
        }

        Self::from_snapshot(snapshot, clock).with_persistence(SnapshotWriter::spawn(store))
    }

    pub fn with_persistence(mut self, writer: SnapshotWriter) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn notifications(&self) -> &QueueNotificationService {
        &self.notifier
    }

    // Sessions

    pub async fn login(
        &self,
        phone: &str,
        role: Role,
        name: Option<String>,
    ) -> Result<User, QueueError> {
        let user = match role {
            Role::Doctor => {
                let registry = self.registry.read().await;
                let doctor = registry
                    .find_by_phone(phone)
                    .ok_or_else(|| QueueError::DoctorNotFound(format!("phone {}", phone)))?;
                User {
                    id: doctor.id.clone(),
                    name: doctor.name.clone(),
                    phone: doctor.phone.clone(),
                    role: Role::Doctor,
                }
            }
            Role::Patient => User {
                id: format!("p-{}", Uuid::new_v4()),
                name: name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PATIENT_NAME.to_string()),
                phone: phone.to_string(),
                role: Role::Patient,
            },
        };

        *self.current_user.write().await = Some(user.clone());
        info!("User {} logged in as {:?}", user.id, user.role);

        self.persist().await;
        Ok(user)
    }

    /// Clears the recorded user only when it is `user`; another session's
    /// logout leaves it alone.
    pub async fn logout(&self, user: &User) -> Option<User> {
        let previous = {
            let mut current = self.current_user.write().await;
            match current.as_ref() {
                Some(recorded) if recorded.id == user.id => current.take(),
                _ => None,
            }
        };

        match &previous {
            Some(_) => info!("User {} logged out", user.id),
            None => {
                debug!("Logout for {} left the recorded user unchanged", user.id);
                return None;
            }
        }

        self.persist().await;
        previous
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current_user.read().await.clone()
    }

    // Queue mutations

    #[instrument(skip(self))]
    pub async fn book_token(&self, doctor_id: &str, patient_id: &str) -> Result<Token, QueueError> {
        let lane = self.lane(doctor_id)?;

        let token = {
            let mut ledger = lane.write().await;
            let token = ledger.issue(patient_id, self.clock.now())?;
            self.token_index
                .write()
                .await
                .insert(token.id, doctor_id.to_string());
            token
        };

        info!(
            "Booked token #{} with doctor {} for patient {}",
            token.token_number, doctor_id, patient_id
        );

        self.announce(doctor_id, QueueEvent::TokenBooked, vec![token.clone()]).await;
        self.persist().await;
        Ok(token)
    }

    #[instrument(skip(self))]
    pub async fn advance_queue(&self, doctor_id: &str) -> Result<AdvanceOutcome, QueueError> {
        let lane = self.lane(doctor_id)?;

        let outcome = lane.write().await.advance(self.clock.now());

        match (&outcome.completed, &outcome.called) {
            (None, None) => debug!("Advance on doctor {} found nothing to move", doctor_id),
            (completed, called) => info!(
                "Doctor {} advanced: completed {:?}, called {:?}",
                doctor_id,
                completed.as_ref().map(|t| t.token_number),
                called.as_ref().map(|t| t.token_number)
            ),
        }

        let changed: Vec<Token> = outcome
            .completed
            .iter()
            .chain(outcome.called.iter())
            .cloned()
            .collect();
        self.announce(doctor_id, QueueEvent::QueueAdvanced, changed).await;
        self.persist().await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn skip_token(&self, token_id: Uuid) -> Result<Token, QueueError> {
        self.set_aside(token_id, TokenStatus::Missed, QueueEvent::TokenSkipped)
            .await
    }

    /// There is no way back from ON_HOLD.
    #[instrument(skip(self))]
    pub async fn hold_token(&self, token_id: Uuid) -> Result<Token, QueueError> {
        self.set_aside(token_id, TokenStatus::OnHold, QueueEvent::TokenHeld)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_doctor_opd(
        &self,
        doctor_id: &str,
        status: OpdStatus,
        broadcast: Option<String>,
    ) -> Result<Doctor, QueueError> {
        let lane = self.lane(doctor_id)?;

        let doctor = {
            let _ledger = lane.write().await;
            let mut registry = self.registry.write().await;
            registry.set_opd_status(doctor_id, status, broadcast)?.clone()
        };

        self.announce(doctor_id, QueueEvent::OpdStatusChanged, Vec::new()).await;
        self.persist().await;
        Ok(doctor)
    }

    #[instrument(skip(self))]
    pub async fn set_avg_time(&self, doctor_id: &str, minutes: i64) -> Result<Doctor, QueueError> {
        let lane = self.lane(doctor_id)?;

        let doctor = {
            let _ledger = lane.write().await;
            let mut registry = self.registry.write().await;
            registry.set_avg_consultation_time(doctor_id, minutes)?.clone()
        };

        self.announce(doctor_id, QueueEvent::AvgTimeChanged, Vec::new()).await;
        self.persist().await;
        Ok(doctor)
    }

    // Reads

    pub async fn get_eta(&self, token: &Token) -> Eta {
        let Some(lane) = self.lanes.get(&token.doctor_id) else {
            return Eta::Closed;
        };

        let ledger = lane.read().await;
        let registry = self.registry.read().await;
        EtaEstimator::estimate(
            registry.get(&token.doctor_id).ok(),
            &ledger,
            token,
            self.clock.now(),
        )
    }

    /// Looks the token up and estimates it from the same consistent view.
    pub async fn eta_for_token(&self, token_id: Uuid) -> Result<TokenEtaResponse, QueueError> {
        let doctor_id = self.owner_of(token_id).await?;
        let lane = self.lane(&doctor_id)?;

        let ledger = lane.read().await;
        let registry = self.registry.read().await;
        let token = ledger
            .find(token_id)
            .cloned()
            .ok_or(QueueError::TokenNotFound(token_id))?;
        let eta = EtaEstimator::estimate(
            registry.get(&doctor_id).ok(),
            &ledger,
            &token,
            self.clock.now(),
        );

        Ok(TokenEtaResponse {
            token,
            eta,
            eta_minutes: eta.minutes(),
        })
    }

    pub async fn doctors(&self) -> Vec<Doctor> {
        self.registry.read().await.list().to_vec()
    }

    pub async fn doctor(&self, doctor_id: &str) -> Result<Doctor, QueueError> {
        let registry = self.registry.read().await;
        Ok(registry.get(doctor_id)?.clone())
    }

    /// Every token of every doctor, oldest booking first.
    pub async fn tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        for lane in self.lanes.values() {
            tokens.extend(lane.read().await.tokens().iter().cloned());
        }
        tokens.sort_by(|a, b| {
            a.booked_at
                .cmp(&b.booked_at)
                .then_with(|| a.doctor_id.cmp(&b.doctor_id))
                .then_with(|| a.token_number.cmp(&b.token_number))
        });
        tokens
    }

    pub async fn token(&self, token_id: Uuid) -> Result<Token, QueueError> {
        let doctor_id = self.owner_of(token_id).await?;
        let lane = self.lane(&doctor_id)?;
        let ledger = lane.read().await;
        ledger
            .find(token_id)
            .cloned()
            .ok_or(QueueError::TokenNotFound(token_id))
    }

    pub async fn doctor_queue(&self, doctor_id: &str) -> Result<DoctorQueueView, QueueError> {
        let lane = self.lane(doctor_id)?;

        let ledger = lane.read().await;
        let registry = self.registry.read().await;
        let doctor = registry.get(doctor_id)?.clone();

        Ok(DoctorQueueView {
            doctor,
            active: ledger.active().cloned(),
            waiting: ledger.waiting().into_iter().cloned().collect(),
            history: ledger
                .tokens()
                .iter()
                .filter(|t| t.status.is_terminal())
                .cloned()
                .collect(),
            stats: ledger.stats(),
        })
    }

    pub async fn queue_stats(&self, doctor_id: &str) -> Result<QueueStats, QueueError> {
        let lane = self.lane(doctor_id)?;
        let stats = lane.read().await.stats();
        Ok(stats)
    }

    /// The patient's earliest open token with its live position and ETA.
    pub async fn patient_status(&self, patient_id: &str) -> Option<PatientStatus> {
        let mut best: Option<PatientStatus> = None;

        for (doctor_id, lane) in &self.lanes {
            let ledger = lane.read().await;
            let Some(token) = ledger.open_booking_for(patient_id) else {
                continue;
            };

            let registry = self.registry.read().await;
            let Ok(doctor) = registry.get(doctor_id) else {
                continue;
            };

            let eta = EtaEstimator::estimate(Some(doctor), &ledger, token, self.clock.now());
            let candidate = PatientStatus {
                token: token.clone(),
                doctor: doctor.clone(),
                now_serving: ledger.active().map(|t| t.token_number),
                ahead: ledger.waiting_ahead_of(token.token_number),
                eta,
                eta_minutes: eta.minutes(),
            };

            let earlier = best
                .as_ref()
                .map_or(true, |current| candidate.token.booked_at < current.token.booked_at);
            if earlier {
                best = Some(candidate);
            }
        }

        best
    }

    /// Full state for persistence. Lanes are copied one at a time, each from
    /// a consistent view of its doctor.
    pub async fn snapshot(&self) -> Snapshot {
        let mut doctor_ids: Vec<&String> = self.lanes.keys().collect();
        doctor_ids.sort();

        let mut tokens = Vec::new();
        for doctor_id in doctor_ids {
            if let Some(lane) = self.lanes.get(doctor_id) {
                tokens.extend(lane.read().await.tokens().iter().cloned());
            }
        }

        Snapshot {
            tokens,
            doctors: self.doctors().await,
            current_user: self.current_user().await,
        }
    }

    /// Waits for pending snapshot saves.
    pub async fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    pub async fn shutdown(&self) {
        if let Some(writer) = &self.writer {
            writer.shutdown().await;
        }
    }

    // Private helper methods

    fn lane(&self, doctor_id: &str) -> Result<&RwLock<TokenLedger>, QueueError> {
        self.lanes
            .get(doctor_id)
            .ok_or_else(|| QueueError::DoctorNotFound(doctor_id.to_string()))
    }

    async fn owner_of(&self, token_id: Uuid) -> Result<String, QueueError> {
        self.token_index
            .read()
            .await
            .get(&token_id)
            .cloned()
            .ok_or(QueueError::TokenNotFound(token_id))
    }

    async fn set_aside(
        &self,
        token_id: Uuid,
        to: TokenStatus,
        event: QueueEvent,
    ) -> Result<Token, QueueError> {
        let doctor_id = self.owner_of(token_id).await?;
        let lane = self.lane(&doctor_id)?;

        let token = lane.write().await.set_aside(token_id, to)?;
        info!(
            "Token #{} with doctor {} moved to {}",
            token.token_number, doctor_id, to
        );

        self.announce(&doctor_id, event, vec![token.clone()]).await;
        self.persist().await;
        Ok(token)
    }

    async fn announce(&self, doctor_id: &str, event: QueueEvent, tokens: Vec<Token>) {
        let (opd_status, broadcast_message) = match self.registry.read().await.get(doctor_id) {
            Ok(doctor) => (
                Some(doctor.current_opd_status),
                doctor.broadcast_message.clone(),
            ),
            Err(_) => (None, None),
        };

        self.notifier
            .publish(QueueUpdate {
                doctor_id: doctor_id.to_string(),
                event,
                message: QueueNotificationService::describe(event).to_string(),
                tokens,
                opd_status,
                broadcast_message,
                at: self.clock.now(),
            })
            .await;
    }

    async fn persist(&self) {
        let Some(writer) = &self.writer else {
            return;
        };

        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.snapshot().await;
        writer.submit(revision, snapshot);
    }
}
