use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::{QueueEvent, QueueUpdate};

pub type QueueUpdateSender = broadcast::Sender<QueueUpdate>;
pub type QueueUpdateReceiver = broadcast::Receiver<QueueUpdate>;

const DOCTOR_CHANNEL_CAPACITY: usize = 100;

/// Fan-out of queue changes, one channel per doctor.
pub struct QueueNotificationService {
    channels: Arc<RwLock<HashMap<String, QueueUpdateSender>>>,
}

impl QueueNotificationService {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn subscribe(&self, doctor_id: &str) -> QueueUpdateReceiver {
        if let Some(sender) = self.channels.read().await.get(doctor_id) {
            return sender.subscribe();
        }

        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(doctor_id.to_string())
            .or_insert_with(|| {
                debug!("Created queue channel for doctor {}", doctor_id);
                broadcast::channel(DOCTOR_CHANNEL_CAPACITY).0
            });
        sender.subscribe()
    }

    /// Having no listeners is normal and not reported.
    pub async fn publish(&self, update: QueueUpdate) {
        let doctor_id = update.doctor_id.clone();
        let event = update.event;

        match self.channels.read().await.get(&doctor_id) {
            Some(sender) => {
                if sender.send(update).is_err() {
                    debug!("No listeners on queue channel for doctor {}", doctor_id);
                }
            }
            None => debug!("No queue channel for doctor {}", doctor_id),
        }

        debug!("Published {:?} for doctor {}", event, doctor_id);
    }

    pub fn describe(event: QueueEvent) -> &'static str {
        match event {
            QueueEvent::TokenBooked => "A new token was booked",
            QueueEvent::QueueAdvanced => "The next patient has been called",
            QueueEvent::TokenSkipped => "A token was marked as missed",
            QueueEvent::TokenHeld => "A token was put on hold",
            QueueEvent::OpdStatusChanged => "The doctor's OPD status changed",
            QueueEvent::AvgTimeChanged => "The average consultation time changed",
        }
    }
}

impl Default for QueueNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for QueueNotificationService {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}
