//! Data-access contracts consumed by the content stores.

use crate::error::Result;
use crate::model::Content;
use async_trait::async_trait;
use std::sync::Arc;

/// Everything a content store needs to load, reconcile and persist one collection.
///
/// Keys are the items' [`Content::sort_key`] values.
#[async_trait]
pub trait ContentGateway<T: Content>: Send + Sync {
    /// Read the whole locally cached collection, in display order.
    async fn get_all(&self) -> Result<Vec<T>>;

    /// Key of the newest locally cached item, if any.
    async fn latest_key(&self) -> Result<Option<i64>>;

    /// Fetch the items newer than `key` from the remote source.
    async fn request_since(&self, key: Option<i64>) -> Result<Vec<T>>;

    /// Write newly fetched items to the local cache.
    async fn persist(&self, delta: &[T]) -> Result<()>;
}

/// The local half of a gateway.
#[async_trait]
pub trait LocalCache<T: Content>: Send + Sync {
    async fn get_all(&self) -> Result<Vec<T>>;

    async fn latest_key(&self) -> Result<Option<i64>>;

    async fn persist(&self, delta: &[T]) -> Result<()>;
}

/// The remote half of a gateway.
#[async_trait]
pub trait RemoteSource<T: Content>: Send + Sync {
    /// Fetch the items strictly newer than `key`; everything when `key` is `None`.
    async fn request_since(&self, key: Option<i64>) -> Result<Vec<T>>;
}

/// A gateway assembled from a separate local cache and remote source.
pub struct SplitGateway<T: Content> {
    local: Arc<dyn LocalCache<T>>,
    remote: Arc<dyn RemoteSource<T>>,
}

impl<T: Content> SplitGateway<T> {
    pub fn new(local: Arc<dyn LocalCache<T>>, remote: Arc<dyn RemoteSource<T>>) -> Self {
        Self { local, remote }
    }
}

#[async_trait]
impl<T: Content> ContentGateway<T> for SplitGateway<T> {
    async fn get_all(&self) -> Result<Vec<T>> {
        self.local.get_all().await
    }

    async fn latest_key(&self) -> Result<Option<i64>> {
        self.local.latest_key().await
    }

    async fn request_since(&self, key: Option<i64>) -> Result<Vec<T>> {
        self.remote.request_since(key).await
    }

    async fn persist(&self, delta: &[T]) -> Result<()> {
        self.local.persist(delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::{Single, TrackMeta};
    use parking_lot::Mutex;

    struct VecCache(Mutex<Vec<Single>>);

    #[async_trait]
    impl LocalCache<Single> for VecCache {
        async fn get_all(&self) -> Result<Vec<Single>> {
            Ok(self.0.lock().clone())
        }

        async fn latest_key(&self) -> Result<Option<i64>> {
            Ok(self.0.lock().iter().map(|s| s.date).max())
        }

        async fn persist(&self, delta: &[Single]) -> Result<()> {
            self.0.lock().extend_from_slice(delta);
            Ok(())
        }
    }

    struct Offline;

    #[async_trait]
    impl RemoteSource<Single> for Offline {
        async fn request_since(&self, _key: Option<i64>) -> Result<Vec<Single>> {
            Err(CoreError::Remote {
                reason: "offline".to_string(),
            })
        }
    }

    fn single(id: u64, date: i64) -> Single {
        Single {
            id,
            date,
            meta: TrackMeta::default(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_split_gateway_routes_calls() {
        let gateway = SplitGateway::new(
            Arc::new(VecCache(Mutex::new(vec![single(1, 3)]))),
            Arc::new(Offline),
        );

        assert_eq!(gateway.latest_key().await.unwrap(), Some(3));
        gateway.persist(&[single(2, 9)]).await.unwrap();
        assert_eq!(gateway.get_all().await.unwrap().len(), 2);
        assert!(matches!(
            gateway.request_since(Some(9)).await,
            Err(CoreError::Remote { .. })
        ));
    }
}
