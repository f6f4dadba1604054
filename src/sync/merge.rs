//! Merge engine
//!
//! Reconciles the local library with the descriptor found in the sync folder.
//! Pure functions only: the orchestrator does all I/O.
//!
//! Progress rules, per document known on both sides:
//! - remote strictly newer (`lastReadAt`) wins
//! - a local document still at index 0 takes any remote progress
//! - otherwise, including exact ties, local is kept and written back

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::config::SettingsPolicy;
use super::descriptor::SyncDescriptor;
use crate::library::{Document, ProgressEntry, ReaderSettings, SettingsRecord};

/// Result of reconciling local state with a remote descriptor
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub documents: Vec<Document>,
    pub settings: SettingsRecord,
    /// Anything local changed
    pub changed: bool,
    pub settings_changed: bool,
    /// Documents whose progress was replaced by the remote entry
    pub adopted: Vec<Uuid>,
}

/// Reconcile local documents and settings with `remote`.
///
/// Documents without a remote entry are returned untouched, as is everything
/// when there is no remote descriptor.
pub fn merge(
    documents: Vec<Document>,
    settings: &SettingsRecord,
    remote: Option<&SyncDescriptor>,
    policy: SettingsPolicy,
) -> MergeOutcome {
    let Some(remote) = remote else {
        return MergeOutcome {
            documents,
            settings: settings.clone(),
            changed: false,
            settings_changed: false,
            adopted: Vec::new(),
        };
    };

    let (merged_settings, settings_changed) = merge_settings(settings, remote, policy);

    let mut adopted = Vec::new();
    let documents = documents
        .into_iter()
        .map(|mut doc| {
            if let Some(entry) = remote.progress.get(&doc.id) {
                if adopt_progress(&mut doc, entry) {
                    adopted.push(doc.id);
                }
            }
            doc
        })
        .collect();

    MergeOutcome {
        documents,
        settings: merged_settings,
        changed: settings_changed || !adopted.is_empty(),
        settings_changed,
        adopted,
    }
}

/// Apply a remote progress entry if it wins. Returns whether `doc` changed.
pub(crate) fn adopt_progress(doc: &mut Document, remote: &ProgressEntry) -> bool {
    let remote_newer = remote.last_read_at > doc.last_read_at;
    let local_unread = doc.current_page_index == 0;
    if !remote_newer && !local_unread {
        return false;
    }

    let index = doc.clamp_index(remote.page_index);
    if index == doc.current_page_index && remote.last_read_at == doc.last_read_at {
        return false;
    }

    log::debug!(
        "Merge: '{}' takes remote position {} (local {})",
        doc.title,
        index,
        doc.current_page_index
    );
    doc.record_progress(index, remote.last_read_at);
    true
}

fn merge_settings(
    local: &SettingsRecord,
    remote: &SyncDescriptor,
    policy: SettingsPolicy,
) -> (SettingsRecord, bool) {
    let Some(remote_fields) = remote.settings.as_ref() else {
        return (local.clone(), false);
    };

    if policy == SettingsPolicy::NewerWins
        && local
            .updated_at
            .is_some_and(|local_at| local_at >= remote.updated_at)
    {
        return (local.clone(), false);
    }

    let mut fields = match serde_json::to_value(&local.settings) {
        Ok(serde_json::Value::Object(fields)) => fields,
        _ => serde_json::Map::new(),
    };
    for (key, value) in remote_fields {
        fields.insert(key.clone(), value.clone());
    }

    let merged: ReaderSettings = match serde_json::from_value(serde_json::Value::Object(fields)) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Merge: keeping local settings, remote snapshot is invalid: {}", e);
            return (local.clone(), false);
        }
    };

    if merged == local.settings {
        return (local.clone(), false);
    }

    log::debug!("Merge: settings replaced by remote snapshot");
    (
        SettingsRecord {
            settings: merged,
            updated_at: Some(remote.updated_at),
        },
        true,
    )
}

/// Descriptor to write back after a merge.
///
/// Holds every local document's progress plus remote entries for documents
/// this device has not imported, except ids in `removed` (documents deleted
/// here together with their file).
pub fn build_descriptor(
    documents: &[Document],
    settings: &SettingsRecord,
    remote: Option<&SyncDescriptor>,
    removed: &HashSet<Uuid>,
    now: DateTime<Utc>,
) -> SyncDescriptor {
    let mut descriptor = SyncDescriptor::new(now);

    if let Some(remote) = remote {
        for (id, entry) in &remote.progress {
            if !removed.contains(id) {
                descriptor.progress.insert(*id, *entry);
            }
        }
    }

    for doc in documents {
        descriptor.progress.insert(doc.id, doc.progress());
    }

    descriptor.settings = match serde_json::to_value(&settings.settings) {
        Ok(serde_json::Value::Object(fields)) => Some(fields),
        _ => None,
    };

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{Chapter, DocumentFormat, Theme};
    use chrono::TimeZone;

    fn millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn book(name: &str, chapters: usize, index: usize, read_at: i64) -> Document {
        let mut doc = Document::new(name.to_string(), DocumentFormat::Text, name, 1_000);
        doc.chapters = (0..chapters)
            .map(|i| Chapter {
                title: format!("Chapter {}", i + 1),
                start: 0,
                end: 0,
                page: None,
            })
            .collect();
        doc.current_page_index = index;
        doc.last_read_at = millis(read_at);
        doc
    }

    fn remote_with(entries: &[(Uuid, usize, i64)], updated_at: i64) -> SyncDescriptor {
        let mut descriptor = SyncDescriptor::new(millis(updated_at));
        for (id, page, at) in entries {
            descriptor.progress.insert(
                *id,
                ProgressEntry {
                    page_index: *page,
                    last_read_at: millis(*at),
                },
            );
        }
        descriptor
    }

    #[test]
    fn test_no_remote_is_a_no_op() {
        let docs = vec![book("a.txt", 5, 2, 100)];
        let outcome = merge(docs.clone(), &SettingsRecord::default(), None, SettingsPolicy::RemoteWins);
        assert!(!outcome.changed);
        assert_eq!(outcome.documents, docs);
    }

    #[test]
    fn test_newer_remote_wins() {
        let doc = book("a.txt", 20, 3, 100);
        let remote = remote_with(&[(doc.id, 7, 150)], 150);

        let outcome = merge(vec![doc.clone()], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);

        assert!(outcome.changed);
        assert_eq!(outcome.adopted, vec![doc.id]);
        assert_eq!(outcome.documents[0].current_page_index, 7);
        assert_eq!(outcome.documents[0].last_read_at, millis(150));
    }

    #[test]
    fn test_older_remote_loses_scenario_b() {
        let doc = book("x.txt", 20, 5, 200);
        let remote = remote_with(&[(doc.id, 5, 100)], 100);

        let outcome = merge(vec![doc.clone()], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);
        assert!(!outcome.changed);
        assert_eq!(outcome.documents[0], doc);

        let written = build_descriptor(&outcome.documents, &outcome.settings, Some(&remote), &HashSet::new(), millis(300));
        assert_eq!(
            written.progress[&doc.id],
            ProgressEntry {
                page_index: 5,
                last_read_at: millis(200)
            }
        );
    }

    #[test]
    fn test_unread_local_yields_to_older_remote_scenario_a() {
        // Imported fresh on a second device at t=5000, never opened
        let doc = book("x.txt", 30, 0, 5_000);
        let remote = remote_with(&[(doc.id, 10, 100)], 100);

        let outcome = merge(vec![doc.clone()], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);

        assert!(outcome.changed);
        assert_eq!(outcome.documents[0].current_page_index, 10);
        assert_eq!(outcome.documents[0].last_read_at, millis(100));
    }

    #[test]
    fn test_equal_timestamps_keep_local() {
        let doc = book("a.txt", 20, 4, 100);
        let remote = remote_with(&[(doc.id, 9, 100)], 100);

        let outcome = merge(vec![doc.clone()], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);
        assert!(!outcome.changed);
        assert_eq!(outcome.documents[0].current_page_index, 4);
    }

    #[test]
    fn test_identical_progress_is_not_a_change() {
        let doc = book("a.txt", 20, 0, 100);
        let remote = remote_with(&[(doc.id, 0, 100)], 100);

        let outcome = merge(vec![doc], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);
        assert!(!outcome.changed);
        assert!(outcome.adopted.is_empty());
    }

    #[test]
    fn test_adopted_progress_is_clamped() {
        let doc = book("a.txt", 3, 1, 100);
        let remote = remote_with(&[(doc.id, 50, 200)], 200);

        let outcome = merge(vec![doc], &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);
        assert_eq!(outcome.documents[0].current_page_index, 2);
    }

    #[test]
    fn test_documents_without_remote_entry_untouched() {
        let known = book("a.txt", 5, 0, 100);
        let local_only = book("b.txt", 5, 0, 100);
        let remote = remote_with(&[(known.id, 2, 50)], 50);

        let outcome = merge(
            vec![known.clone(), local_only.clone()],
            &SettingsRecord::default(),
            Some(&remote),
            SettingsPolicy::RemoteWins,
        );
        assert_eq!(outcome.adopted, vec![known.id]);
        assert_eq!(outcome.documents[1], local_only);
    }

    #[test]
    fn test_remote_settings_overwrite_local() {
        let local = SettingsRecord {
            settings: ReaderSettings::default(),
            updated_at: Some(millis(900)),
        };
        let mut remote = SyncDescriptor::new(millis(100));
        let mut fields = serde_json::Map::new();
        fields.insert("theme".to_string(), serde_json::json!("sepia"));
        fields.insert("fontSize".to_string(), serde_json::json!(24));
        remote.settings = Some(fields);

        let outcome = merge(Vec::new(), &local, Some(&remote), SettingsPolicy::RemoteWins);

        assert!(outcome.changed);
        assert!(outcome.settings_changed);
        assert_eq!(outcome.settings.settings.theme, Theme::Sepia);
        assert_eq!(outcome.settings.settings.font_size, 24);
        // Fields absent from the snapshot keep their local value
        assert_eq!(outcome.settings.settings.font_family, "serif");
    }

    #[test]
    fn test_newer_wins_policy_keeps_newer_local_settings() {
        let local = SettingsRecord {
            settings: ReaderSettings::default(),
            updated_at: Some(millis(900)),
        };
        let mut remote = SyncDescriptor::new(millis(100));
        let mut fields = serde_json::Map::new();
        fields.insert("theme".to_string(), serde_json::json!("dark"));
        remote.settings = Some(fields.clone());

        let outcome = merge(Vec::new(), &local, Some(&remote), SettingsPolicy::NewerWins);
        assert!(!outcome.settings_changed);
        assert_eq!(outcome.settings.settings.theme, Theme::Light);

        let newer_remote = SyncDescriptor {
            updated_at: millis(1_000),
            settings: Some(fields),
            progress: Default::default(),
        };
        let outcome = merge(Vec::new(), &local, Some(&newer_remote), SettingsPolicy::NewerWins);
        assert!(outcome.settings_changed);
        assert_eq!(outcome.settings.settings.theme, Theme::Dark);
        assert_eq!(outcome.settings.updated_at, Some(millis(1_000)));
    }

    #[test]
    fn test_invalid_remote_settings_are_ignored() {
        let mut remote = SyncDescriptor::new(millis(100));
        let mut fields = serde_json::Map::new();
        fields.insert("fontSize".to_string(), serde_json::json!("huge"));
        remote.settings = Some(fields);

        let outcome = merge(Vec::new(), &SettingsRecord::default(), Some(&remote), SettingsPolicy::RemoteWins);
        assert!(!outcome.settings_changed);
        assert_eq!(outcome.settings, SettingsRecord::default());
    }

    #[test]
    fn test_descriptor_carries_unknown_remote_entries() {
        let local = book("a.txt", 5, 1, 100);
        let elsewhere = Uuid::new_v4();
        let deleted_here = Uuid::new_v4();
        let remote = remote_with(&[(elsewhere, 3, 50), (deleted_here, 4, 60)], 60);
        let removed: HashSet<Uuid> = [deleted_here].into_iter().collect();

        let written = build_descriptor(&[local.clone()], &SettingsRecord::default(), Some(&remote), &removed, millis(70));

        assert_eq!(written.progress.len(), 2);
        assert!(written.progress.contains_key(&local.id));
        assert_eq!(written.progress[&elsewhere].page_index, 3);
        assert!(!written.progress.contains_key(&deleted_here));
        assert_eq!(written.updated_at, millis(70));
    }

    #[test]
    fn test_descriptor_has_no_content() {
        let mut doc = book("a.txt", 2, 1, 100);
        doc.content = "It was a bright cold day in April".to_string();
        doc.payload = Some(vec![1, 2, 3]);

        let written = build_descriptor(&[doc], &SettingsRecord::default(), None, &HashSet::new(), millis(1));
        let json = serde_json::to_string(&written).unwrap();

        assert!(!json.contains("bright cold day"));
        assert!(!json.contains("chapters"));
        assert!(!json.contains("payload"));
        assert!(!json.contains("content"));
        assert!(json.contains("\"theme\""));
    }
}
