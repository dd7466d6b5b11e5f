use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::context::{RecordKind, RecordRef};

/// The veterinarian a notification is addressed to, as the business layer
/// hands it over. Only identity, name and address cross into this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(id: Uuid, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
        }
    }

    pub fn as_record_ref(&self) -> RecordRef {
        RecordRef::new(self.id, RecordKind::Veterinarian, self.full_name.clone())
    }
}
