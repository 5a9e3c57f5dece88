//! Progress Store - keyed persistence of records, drafts, solutions and settings
//!
//! Every concept gets its own key per concern, so a sweep over
//! `learned:*` and a single-concept mutation never contend on a shared
//! blob:
//!
//! ```text
//! learned:<id>   ConceptRecord JSON
//! draft:<id>     code text (autosaved)
//! solution:<id>  code text (last successful run)
//! settings       Settings JSON
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::ConceptRecord;
use crate::config::Settings;
use crate::kv::KvStore;
use crate::{Error, Result};

const LEARNED_PREFIX: &str = "learned:";
const DRAFT_PREFIX: &str = "draft:";
const SOLUTION_PREFIX: &str = "solution:";
const SETTINGS_KEY: &str = "settings";

fn learned_key(concept_id: &str) -> String {
    format!("{LEARNED_PREFIX}{concept_id}")
}

fn draft_key(concept_id: &str) -> String {
    format!("{DRAFT_PREFIX}{concept_id}")
}

fn solution_key(concept_id: &str) -> String {
    format!("{SOLUTION_PREFIX}{concept_id}")
}

fn decode_text(key: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::StorageError(format!("{key} is not UTF-8: {e}")))
}

/// Keyed persistence over an injected [`KvStore`].
///
/// Cheap to clone: clones share the same backing store.
pub struct ProgressStore<S> {
    kv: Arc<S>,
}

impl<S> Clone for ProgressStore<S> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<S: KvStore> ProgressStore<S> {
    /// Wrap a key-value store.
    #[must_use]
    pub fn new(kv: S) -> Self {
        Self { kv: Arc::new(kv) }
    }

    /// Wrap a key-value store that is shared with other owners.
    #[must_use]
    pub const fn from_shared(kv: Arc<S>) -> Self {
        Self { kv }
    }

    /// The underlying store.
    #[must_use]
    pub fn kv(&self) -> &S {
        &self.kv
    }

    // ------------------------------------------------------------------
    // Learned records
    // ------------------------------------------------------------------

    /// Persist a record, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the backing store fails
    pub async fn save_record(&self, concept_id: &str, record: &ConceptRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record)?;
        self.kv.set(&learned_key(concept_id), bytes).await
    }

    /// Fetch the record for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the stored value cannot be decoded
    pub async fn record(&self, concept_id: &str) -> Result<Option<ConceptRecord>> {
        match self.kv.get(&learned_key(concept_id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete the record for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn delete_record(&self, concept_id: &str) -> Result<()> {
        self.kv.delete(&learned_key(concept_id)).await
    }

    /// Ids of every concept with a stored record, sorted.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn record_ids(&self) -> Result<Vec<String>> {
        let keys = self.kv.keys_with_prefix(LEARNED_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(LEARNED_PREFIX).map(str::to_string))
            .collect())
    }

    /// Every stored record, sorted by concept id.
    ///
    /// Records that fail to decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn records(&self) -> Result<Vec<(String, ConceptRecord)>> {
        let mut out = Vec::new();
        for id in self.record_ids().await? {
            match self.record(&id).await {
                Ok(Some(record)) => out.push((id, record)),
                Ok(None) => {}
                Err(e) => warn!(concept_id = %id, error = %e, "skipping undecodable record"),
            }
        }
        Ok(out)
    }

    /// Delete the record for `concept_id` iff it is expired at `now`.
    ///
    /// The decision is made inside the store's atomic update, against the
    /// record present at that moment, so a record replaced since the
    /// caller last looked is judged on its own fresh `learned_at`.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn evict_if_expired(&self, concept_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut evicted = false;
        let flag = &mut evicted;
        self.kv
            .update(&learned_key(concept_id), move |current| {
                let bytes = current?;
                match serde_json::from_slice::<ConceptRecord>(bytes) {
                    Ok(record) if record.is_expired(now) => {
                        *flag = true;
                        None
                    }
                    Ok(_) => Some(bytes.to_vec()),
                    Err(e) => {
                        warn!(error = %e, "keeping undecodable record during sweep");
                        Some(bytes.to_vec())
                    }
                }
            })
            .await?;
        Ok(evicted)
    }

    // ------------------------------------------------------------------
    // Drafts and solutions
    // ------------------------------------------------------------------

    /// Overwrite the draft for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn save_draft(&self, concept_id: &str, code: &str) -> Result<()> {
        self.kv
            .set(&draft_key(concept_id), code.as_bytes().to_vec())
            .await
    }

    /// Fetch the draft for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the stored draft is not UTF-8
    pub async fn draft(&self, concept_id: &str) -> Result<Option<String>> {
        let key = draft_key(concept_id);
        self.kv
            .get(&key)
            .await?
            .map(|bytes| decode_text(&key, bytes))
            .transpose()
    }

    /// Remove the draft for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn clear_draft(&self, concept_id: &str) -> Result<()> {
        self.kv.delete(&draft_key(concept_id)).await
    }

    /// Overwrite the solution for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn save_solution(&self, concept_id: &str, code: &str) -> Result<()> {
        self.kv
            .set(&solution_key(concept_id), code.as_bytes().to_vec())
            .await
    }

    /// Fetch the solution for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the stored solution is not UTF-8
    pub async fn solution(&self, concept_id: &str) -> Result<Option<String>> {
        let key = solution_key(concept_id);
        self.kv
            .get(&key)
            .await?
            .map(|bytes| decode_text(&key, bytes))
            .transpose()
    }

    /// Remove the solution for a concept.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn delete_solution(&self, concept_id: &str) -> Result<()> {
        self.kv.delete(&solution_key(concept_id)).await
    }

    /// Remove record, solution and draft for a concept in one call.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn forget(&self, concept_id: &str) -> Result<()> {
        let keys = [
            learned_key(concept_id),
            solution_key(concept_id),
            draft_key(concept_id),
        ];
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.kv.batch_delete(&refs).await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Load persisted settings, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the stored value cannot be decoded
    pub async fn settings(&self) -> Result<Option<Settings>> {
        match self.kv.get(SETTINGS_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist settings.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the backing store fails
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let bytes = serde_json::to_vec(settings)?;
        self.kv.set(SETTINGS_KEY, bytes).await
    }

    /// Wipe every record, draft, solution and setting.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store fails
    pub async fn reset_all(&self) -> Result<()> {
        self.kv.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;
    use chrono::Duration;

    fn store() -> ProgressStore<MemoryKvStore> {
        ProgressStore::new(MemoryKvStore::new())
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn test_record_roundtrip_through_store() {
        let store = store();
        let record = ConceptRecord::new(at(5_000), 14, false);

        store.save_record("closures", &record).await.unwrap();

        assert_eq!(store.record("closures").await.unwrap(), Some(record));
        assert_eq!(store.record_ids().await.unwrap(), vec!["closures"]);
    }

    #[tokio::test]
    async fn test_records_skips_corrupt_entries() {
        let store = store();
        store
            .save_record("good", &ConceptRecord::new(at(0), 1, false))
            .await
            .unwrap();
        store
            .kv()
            .set("learned:bad", b"{not json".to_vec())
            .await
            .unwrap();

        let records = store.records().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "good");
    }

    #[tokio::test]
    async fn test_evict_if_expired_only_when_due() {
        let store = store();
        let record = ConceptRecord::new(at(0), 1, false);
        store.save_record("loops", &record).await.unwrap();

        let early = at(0) + Duration::hours(23);
        assert!(!store.evict_if_expired("loops", early).await.unwrap());
        assert!(store.record("loops").await.unwrap().is_some());

        assert!(store
            .evict_if_expired("loops", record.expires_at())
            .await
            .unwrap());
        assert!(store.record("loops").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evict_missing_record_is_noop() {
        let store = store();
        assert!(!store.evict_if_expired("nothing", at(0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_draft_and_solution_lifecycles_are_independent() {
        let store = store();
        store.save_draft("maps", "let m = #{};").await.unwrap();
        store.save_solution("maps", "print(1);").await.unwrap();

        store.clear_draft("maps").await.unwrap();

        assert_eq!(store.draft("maps").await.unwrap(), None);
        assert_eq!(
            store.solution("maps").await.unwrap(),
            Some("print(1);".to_string())
        );

        store.delete_solution("maps").await.unwrap();
        assert_eq!(store.solution("maps").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_forget_removes_all_three() {
        let store = store();
        store
            .save_record("arrays", &ConceptRecord::new(at(0), 3, true))
            .await
            .unwrap();
        store.save_draft("arrays", "draft").await.unwrap();
        store.save_solution("arrays", "solution").await.unwrap();

        store.forget("arrays").await.unwrap();

        assert!(store.record("arrays").await.unwrap().is_none());
        assert!(store.draft("arrays").await.unwrap().is_none());
        assert!(store.solution("arrays").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_draft_is_storage_error() {
        let store = store();
        store
            .kv()
            .set("draft:bin", vec![0xff, 0xfe])
            .await
            .unwrap();

        let err = store.draft("bin").await.unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));
    }

    #[tokio::test]
    async fn test_settings_roundtrip_and_reset_all() {
        let store = store();
        assert_eq!(store.settings().await.unwrap(), None);

        store
            .save_settings(&Settings {
                default_expiry_days: 30,
            })
            .await
            .unwrap();
        assert_eq!(
            store.settings().await.unwrap().map(|s| s.default_expiry_days),
            Some(30)
        );

        store.save_draft("x", "code").await.unwrap();
        store.reset_all().await.unwrap();

        assert_eq!(store.settings().await.unwrap(), None);
        assert_eq!(store.draft("x").await.unwrap(), None);
    }
}
