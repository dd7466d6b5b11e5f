use anyhow::Result;
use email_service::{
    clients::database::PreferenceStore,
    models::{delivery::EmailType, preference::NotificationPreference},
};
use uuid::Uuid;

use crate::common::MemoryPreferenceStore;

/// Test: First lookup materializes a default-allow preference record
#[tokio::test]
async fn test_first_lookup_creates_default_allow_preferences() -> Result<()> {
    let store = MemoryPreferenceStore::new();
    let recipient_id = Uuid::new_v4();

    let prefs = store.get_or_create(recipient_id).await?;

    assert!(prefs.notify_on_reception);
    assert!(prefs.notify_on_report_ready);
    assert!(prefs.include_attachments);
    assert!(prefs.alternative_email.is_none());
    assert_eq!(store.created_count(), 1);

    Ok(())
}

/// Test: A second lookup for the same recipient does not create a duplicate
#[tokio::test]
async fn test_second_lookup_does_not_duplicate() -> Result<()> {
    let store = MemoryPreferenceStore::new();
    let recipient_id = Uuid::new_v4();

    let first = store.get_or_create(recipient_id).await?;
    let second = store.get_or_create(recipient_id).await?;

    assert_eq!(store.created_count(), 1);
    assert_eq!(first.recipient_id, second.recipient_id);
    assert_eq!(first.created_at, second.created_at);

    Ok(())
}

/// Test: Category flags gate the matching email types
#[tokio::test]
async fn test_should_send_maps_categories_to_flags() -> Result<()> {
    let mut prefs = NotificationPreference::defaults(Uuid::new_v4());
    prefs.notify_on_reception = false;

    assert!(!prefs.should_send(EmailType::SampleReception));
    assert!(!prefs.should_send(EmailType::SampleRejection));
    assert!(prefs.should_send(EmailType::ReportReady));

    prefs.notify_on_reception = true;
    prefs.notify_on_report_ready = false;

    assert!(prefs.should_send(EmailType::SampleReception));
    assert!(!prefs.should_send(EmailType::ReportReady));

    Ok(())
}

/// Test: Categories without a flag are always sent
#[tokio::test]
async fn test_unmapped_categories_default_to_send() -> Result<()> {
    let mut prefs = NotificationPreference::defaults(Uuid::new_v4());
    prefs.notify_on_reception = false;
    prefs.notify_on_report_ready = false;

    assert!(prefs.should_send(EmailType::WorkOrder));
    assert!(prefs.should_send(EmailType::Verification));
    assert!(prefs.should_send(EmailType::PasswordReset));
    assert!(prefs.should_send(EmailType::Custom));

    Ok(())
}

/// Test: The alternative email override takes precedence when set
#[tokio::test]
async fn test_effective_email_prefers_override() -> Result<()> {
    let mut prefs = NotificationPreference::defaults(Uuid::new_v4());

    assert_eq!(
        prefs.effective_email("laura@clinicaveterinaria.com"),
        "laura@clinicaveterinaria.com"
    );

    prefs.alternative_email = Some("recepcion@clinicaveterinaria.com".to_string());
    assert_eq!(
        prefs.effective_email("laura@clinicaveterinaria.com"),
        "recepcion@clinicaveterinaria.com"
    );

    prefs.alternative_email = Some(String::new());
    assert_eq!(
        prefs.effective_email("laura@clinicaveterinaria.com"),
        "laura@clinicaveterinaria.com"
    );

    Ok(())
}
