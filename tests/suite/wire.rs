//! Notification descriptor as the view layer receives it

use serde_json::json;
use updraft_engine::{ChannelRegistry, ConsentPrompt, ReleaseInfo};

#[test]
fn update_prompt_json_shape() {
    let registry = ChannelRegistry::new("notification:");
    let channels = registry.allocate_consent_channels();
    let release = ReleaseInfo::new("5.2.0").unwrap();
    let descriptor = ConsentPrompt::default().descriptor(&release, &channels);

    let value = serde_json::to_value(&descriptor).unwrap();
    assert_eq!(
        value,
        json!({
            "title": "Updraft Updater",
            "body": "Version 5.2.0 of Updraft is now available. Would you like to update?",
            "status": "info",
            "buttons": [
                { "label": "Yes, now", "backchannel": channels.yes_now.as_str(), "action": true },
                { "label": "Yes, on quit", "backchannel": channels.yes_later.as_str(), "action": true },
                { "label": "No", "backchannel": channels.no.as_str(), "secondary": true }
            ],
            "closeChannel": channels.no.as_str()
        })
    );
}

#[test]
fn backchannel_tokens_are_prefixed_and_unique() {
    let registry = ChannelRegistry::new("notification:");
    let first = registry.allocate_consent_channels();
    let second = registry.allocate_consent_channels();

    let tokens = [
        &first.yes_now,
        &first.yes_later,
        &first.no,
        &second.yes_now,
        &second.yes_later,
        &second.no,
    ]
    .map(|id| id.as_str().to_string());
    assert!(tokens.iter().all(|t| t.starts_with("notification:")));

    let mut deduped = tokens.to_vec();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), tokens.len());
}

#[test]
fn release_info_accepts_engine_json() {
    let release: ReleaseInfo = serde_json::from_value(json!({
        "version": "5.2.0",
        "releaseName": "Spring",
        "releaseDate": "2026-03-01"
    }))
    .unwrap();
    assert_eq!(release.version(), "5.2.0");
    assert_eq!(release.release_date(), Some("2026-03-01"));
    assert!(serde_json::from_value::<ReleaseInfo>(json!({ "version": " " })).is_err());
}
