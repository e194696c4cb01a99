//! Sync metadata store: watermarks, device identity, conflict policy.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{ConflictPolicy, Domain, SyncMetadata};
use crate::store::LocalCache;

const METADATA_KEY: &str = "sync/metadata";

/// Durable sync metadata over the local cache.
///
/// All writes go through one mutex: concurrent domain passes may read
/// freely, but one domain's watermark update must not race another's
/// read-modify-write of the shared record.
#[derive(Clone)]
pub struct SyncMetadataStore {
    cache: Arc<dyn LocalCache>,
    write_lock: Arc<Mutex<()>>,
}

impl SyncMetadataStore {
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self {
            cache,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Load metadata, creating and persisting a fresh record (with a
    /// new device id) on first access.
    pub async fn load(&self) -> Result<SyncMetadata> {
        if let Some(bytes) = self.cache.get(METADATA_KEY).await? {
            return serde_json::from_slice(&bytes)
                .map_err(|error| Error::Corruption(format!("unreadable sync metadata: {error}")));
        }

        let _guard = self.write_lock.lock().await;
        // Re-check under the lock; another task may have initialized it.
        if let Some(bytes) = self.cache.get(METADATA_KEY).await? {
            return serde_json::from_slice(&bytes)
                .map_err(|error| Error::Corruption(format!("unreadable sync metadata: {error}")));
        }

        let metadata = SyncMetadata::new_installation();
        self.persist(&metadata).await?;
        tracing::info!("Initialized sync metadata with device id {}", metadata.device_id);
        Ok(metadata)
    }

    async fn persist(&self, metadata: &SyncMetadata) -> Result<()> {
        let bytes = serde_json::to_vec(metadata)?;
        self.cache.set(METADATA_KEY, &bytes).await
    }

    /// Last successful sync watermark for a domain (zero when never synced).
    pub async fn watermark(&self, domain: Domain) -> Result<i64> {
        Ok(self.load().await?.watermark(domain))
    }

    /// Advance a domain's watermark.
    pub async fn set_watermark(&self, domain: Domain, timestamp: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut metadata = self.load_unlocked().await?;
        metadata.set_watermark(domain, timestamp);
        self.persist(&metadata).await
    }

    /// Reset every watermark to zero, forcing the next sync pass to
    /// treat all remote data as new.
    pub async fn reset_watermarks(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut metadata = self.load_unlocked().await?;
        metadata.last_sync.clear();
        self.persist(&metadata).await
    }

    /// Stable per-installation device identifier.
    pub async fn device_id(&self) -> Result<String> {
        Ok(self.load().await?.device_id)
    }

    /// Configured conflict-resolution policy.
    pub async fn conflict_policy(&self) -> Result<ConflictPolicy> {
        Ok(self.load().await?.conflict_policy)
    }

    /// Change the conflict-resolution policy.
    pub async fn set_conflict_policy(&self, policy: ConflictPolicy) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut metadata = self.load_unlocked().await?;
        metadata.conflict_policy = policy;
        self.persist(&metadata).await
    }

    /// Load without taking the write lock (callers already hold it).
    async fn load_unlocked(&self) -> Result<SyncMetadata> {
        if let Some(bytes) = self.cache.get(METADATA_KEY).await? {
            return serde_json::from_slice(&bytes)
                .map_err(|error| Error::Corruption(format!("unreadable sync metadata: {error}")));
        }
        let metadata = SyncMetadata::new_installation();
        self.persist(&metadata).await?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::store::MemoryCache;

    use super::*;

    fn store() -> SyncMetadataStore {
        SyncMetadataStore::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn device_id_is_stable_across_loads() {
        let metadata = store();
        let first = metadata.device_id().await.unwrap();
        let second = metadata.device_id().await.unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[tokio::test]
    async fn watermarks_are_per_domain() {
        let metadata = store();
        metadata.set_watermark(Domain::Workout, 100).await.unwrap();

        assert_eq!(metadata.watermark(Domain::Workout).await.unwrap(), 100);
        assert_eq!(metadata.watermark(Domain::Meal).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_watermarks_zeroes_everything() {
        let metadata = store();
        metadata.set_watermark(Domain::Workout, 100).await.unwrap();
        metadata.set_watermark(Domain::Profile, 200).await.unwrap();

        metadata.reset_watermarks().await.unwrap();
        for domain in Domain::ALL {
            assert_eq!(metadata.watermark(domain).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn reset_preserves_device_identity() {
        let metadata = store();
        let device_id = metadata.device_id().await.unwrap();
        metadata.reset_watermarks().await.unwrap();
        assert_eq!(metadata.device_id().await.unwrap(), device_id);
    }

    #[tokio::test]
    async fn conflict_policy_defaults_to_newest_wins() {
        let metadata = store();
        assert_eq!(
            metadata.conflict_policy().await.unwrap(),
            ConflictPolicy::NewestWins
        );

        metadata
            .set_conflict_policy(ConflictPolicy::ServerWins)
            .await
            .unwrap();
        assert_eq!(
            metadata.conflict_policy().await.unwrap(),
            ConflictPolicy::ServerWins
        );
    }

    #[test]
    fn clones_share_the_write_lock() {
        let metadata = store();
        let clone = metadata.clone();
        assert!(Arc::ptr_eq(&metadata.write_lock, &clone.write_lock));
    }

    #[tokio::test]
    async fn concurrent_watermark_writes_do_not_race() {
        let metadata = store();
        let mut handles = Vec::new();
        for (index, domain) in Domain::ALL.into_iter().enumerate() {
            let metadata = metadata.clone();
            handles.push(tokio::spawn(async move {
                metadata.set_watermark(domain, index as i64 + 1).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for (index, domain) in Domain::ALL.into_iter().enumerate() {
            assert_eq!(
                metadata.watermark(domain).await.unwrap(),
                index as i64 + 1
            );
        }
    }
}
