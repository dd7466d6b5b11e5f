use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use email_service::{
    clients::{
        database::{DeliveryStore, PreferenceStore, RecordStore},
        queue::DispatchQueue,
        smtp::MailTransport,
    },
    models::{
        context::{RecordKind, RecordRef},
        delivery::{CreateDeliveryLog, DeliveryLog},
        message::{DispatchMessage, OutgoingEmail},
        preference::NotificationPreference,
        recipient::Recipient,
        retry::RetryConfig,
        status::DeliveryStatus,
    },
    notify::Notifier,
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryDeliveryStore {
    logs: Mutex<HashMap<Uuid, DeliveryLog>>,
}

impl MemoryDeliveryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.logs.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<DeliveryLog> {
        self.logs.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl DeliveryStore for MemoryDeliveryStore {
    async fn create_delivery(&self, create: CreateDeliveryLog) -> Result<DeliveryLog, Error> {
        let log = DeliveryLog {
            id: Uuid::new_v4(),
            email_type: create.email_type,
            recipient_email: create.recipient_email,
            recipient_id: create.recipient_id,
            subject: create.subject,
            status: DeliveryStatus::Queued,
            has_attachment: create.has_attachment,
            error_message: None,
            task_id: None,
            created_at: Utc::now(),
            sent_at: None,
        };

        self.logs.lock().unwrap().insert(log.id, log.clone());

        Ok(log)
    }

    async fn set_task_id(&self, id: Uuid, task_id: Uuid) -> Result<(), Error> {
        if let Some(log) = self.logs.lock().unwrap().get_mut(&id) {
            log.task_id = Some(task_id);
        }

        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error> {
        if let Some(log) = self.logs.lock().unwrap().get_mut(&id) {
            log.status = DeliveryStatus::Sent;
            log.sent_at = Some(sent_at);
            log.error_message = None;
        }

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), Error> {
        if let Some(log) = self.logs.lock().unwrap().get_mut(&id) {
            log.status = DeliveryStatus::Failed;
            log.error_message = Some(error.to_string());
        }

        Ok(())
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<DeliveryLog>, Error> {
        Ok(self.logs.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    prefs: Mutex<HashMap<Uuid, NotificationPreference>>,
    created: AtomicU32,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, preference: NotificationPreference) {
        self.prefs
            .lock()
            .unwrap()
            .insert(preference.recipient_id, preference);
    }

    pub fn created_count(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_or_create(&self, recipient_id: Uuid) -> Result<NotificationPreference, Error> {
        let mut prefs = self.prefs.lock().unwrap();

        if let Some(existing) = prefs.get(&recipient_id) {
            return Ok(existing.clone());
        }

        let created = NotificationPreference::defaults(recipient_id);
        prefs.insert(recipient_id, created.clone());
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(created)
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    displays: Mutex<HashMap<(RecordKind, Uuid), String>>,
    fail_fetches: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: &RecordRef) {
        self.displays
            .lock()
            .unwrap()
            .insert((record.kind, record.id), record.display.clone());
    }

    pub fn insert_display(&self, kind: RecordKind, id: Uuid, display: &str) {
        self.displays
            .lock()
            .unwrap()
            .insert((kind, id), display.to_string());
    }

    pub fn remove(&self, kind: RecordKind, id: Uuid) {
        self.displays.lock().unwrap().remove(&(kind, id));
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_display(&self, kind: RecordKind, id: Uuid) -> Result<Option<String>, Error> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(anyhow!("Record store unavailable"));
        }

        Ok(self.displays.lock().unwrap().get(&(kind, id)).cloned())
    }
}

#[derive(Default)]
pub struct MemoryQueue {
    published: Mutex<Vec<DispatchMessage>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<DispatchMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchQueue for MemoryQueue {
    async fn publish(&self, message: &DispatchMessage) -> Result<(), Error> {
        self.published.lock().unwrap().push(message.clone());

        Ok(())
    }
}

/// Mail transport that fails the first `n` sends, then succeeds, recording
/// everything it transmitted.
pub struct MockMailer {
    fail_remaining: AtomicU32,
    attempts: AtomicU32,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl MockMailer {
    pub fn reliable() -> Self {
        Self::failing_first(0)
    }

    pub fn failing_first(failures: u32) -> Self {
        Self {
            fail_remaining: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for MockMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(anyhow!("SMTP connection refused"));
        }

        self.sent.lock().unwrap().push(email.clone());

        Ok(())
    }
}

pub struct TestHarness {
    pub deliveries: Arc<MemoryDeliveryStore>,
    pub preferences: Arc<MemoryPreferenceStore>,
    pub queue: Arc<MemoryQueue>,
    pub notifier: Notifier,
}

pub fn harness() -> TestHarness {
    let deliveries = Arc::new(MemoryDeliveryStore::new());
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let queue = Arc::new(MemoryQueue::new());

    let notifier = Notifier::new(deliveries.clone(), preferences.clone(), queue.clone());

    TestHarness {
        deliveries,
        preferences,
        queue,
        notifier,
    }
}

pub fn test_recipient() -> Recipient {
    Recipient::new(
        Uuid::new_v4(),
        "Dra. Laura Gómez",
        "laura@clinicaveterinaria.com",
    )
}

pub fn protocol_ref(number: &str) -> RecordRef {
    RecordRef::new(Uuid::new_v4(), RecordKind::Protocol, number)
}

pub fn work_order_ref(number: &str) -> RecordRef {
    RecordRef::new(Uuid::new_v4(), RecordKind::WorkOrder, number)
}

pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 10,
        max_delay_ms: 50,
        backoff_multiplier: 2,
    }
}

pub fn dispatch_payload(message: &DispatchMessage) -> String {
    serde_json::to_string(message).unwrap()
}
