use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use super::{BlobStore, PhotoSource, SyncError, VenueStore};

const PHOTO_MAX_WIDTH: u32 = 800;
const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

/// 一次照片缓存调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoOutcome {
    /// 照片地址已存在，未发起任何网络请求
    AlreadyCached,
    /// 本次完成了镜像
    Cached,
}

/// 照片镜像
///
/// 每个场所至多镜像一次：照片地址一旦写入就不再刷新，上游后续换图
/// 不会被跟进。失败由调用方决定是否忽略，场所记录本身保持有效。
pub struct PhotoCache {
    venues: Arc<dyn VenueStore>,
    photos: Arc<dyn PhotoSource>,
    blobs: Arc<dyn BlobStore>,
    bucket: String,
    bucket_ready: OnceCell<()>,
}

impl PhotoCache {
    pub fn new(
        venues: Arc<dyn VenueStore>,
        photos: Arc<dyn PhotoSource>,
        blobs: Arc<dyn BlobStore>,
        bucket: String,
    ) -> Self {
        Self {
            venues,
            photos,
            blobs,
            bucket,
            bucket_ready: OnceCell::new(),
        }
    }

    /// 确保场所首图已镜像到自有存储
    pub async fn cache_if_needed(
        &self,
        external_id: &str,
        photo_reference: &str,
    ) -> Result<PhotoOutcome, SyncError> {
        if self.venues.get_photo_url(external_id).await?.is_some() {
            return Ok(PhotoOutcome::AlreadyCached);
        }

        // 桶只在首次使用前确保一次；失败时下次调用会重试
        self.bucket_ready
            .get_or_try_init(|| async { self.blobs.ensure_bucket(&self.bucket).await })
            .await?;

        let bytes = self
            .photos
            .fetch_photo(photo_reference, PHOTO_MAX_WIDTH)
            .await?;
        let key = photo_object_key(external_id);
        let url = self
            .blobs
            .put_object(&self.bucket, &key, bytes, PHOTO_CONTENT_TYPE)
            .await?;
        self.venues.set_photo_url(external_id, &url).await?;

        Ok(PhotoOutcome::Cached)
    }
}

/// place_id 可能含有对象路径不友好的字符，用哈希生成确定性键
fn photo_object_key(external_id: &str) -> String {
    let digest = Sha256::digest(external_id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("venues/{}.jpg", hex)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::super::testing::{FakePhotoSource, MemoryBlobStore, MemoryVenueStore, test_venue};
    use super::*;

    fn photo_cache(
        store: Arc<MemoryVenueStore>,
        photos: Arc<FakePhotoSource>,
        blobs: Arc<MemoryBlobStore>,
    ) -> PhotoCache {
        PhotoCache::new(store, photos, blobs, "venue-photos".into())
    }

    #[tokio::test]
    async fn skips_without_network_when_url_is_already_set() {
        let store = Arc::new(MemoryVenueStore::default());
        let photos = Arc::new(FakePhotoSource::new());
        let blobs = Arc::new(MemoryBlobStore::default());

        let mut venue = test_venue("poi-1");
        venue.photo_url = Some("https://cdn.test/existing.jpg".into());
        store.seed(venue);

        let cache = photo_cache(store.clone(), photos.clone(), blobs.clone());
        let outcome = cache.cache_if_needed("poi-1", "ref-1").await.unwrap();

        assert_eq!(outcome, PhotoOutcome::AlreadyCached);
        assert_eq!(photos.calls.load(Ordering::SeqCst), 0);
        assert_eq!(blobs.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mirrors_once_and_records_the_url() {
        let store = Arc::new(MemoryVenueStore::default());
        let photos = Arc::new(FakePhotoSource::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        store.seed(test_venue("poi-1"));

        let cache = photo_cache(store.clone(), photos.clone(), blobs.clone());

        let first = cache.cache_if_needed("poi-1", "ref-1").await.unwrap();
        assert_eq!(first, PhotoOutcome::Cached);
        let stored = store.get("poi-1").unwrap();
        assert!(stored.photo_url.as_deref().unwrap().contains("venue-photos"));

        // 第二次调用命中前置检查，不重复上传
        let second = cache.cache_if_needed("poi-1", "ref-1").await.unwrap();
        assert_eq!(second, PhotoOutcome::AlreadyCached);
        assert_eq!(photos.calls.load(Ordering::SeqCst), 1);
        assert_eq!(blobs.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(blobs.ensure_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolve_failure_leaves_the_record_untouched() {
        let store = Arc::new(MemoryVenueStore::default());
        let photos = Arc::new(FakePhotoSource::failing_for(&["ref-bad"]));
        let blobs = Arc::new(MemoryBlobStore::default());
        store.seed(test_venue("poi-1"));

        let cache = photo_cache(store.clone(), photos.clone(), blobs.clone());
        let result = cache.cache_if_needed("poi-1", "ref-bad").await;

        assert!(result.is_err());
        assert!(store.get("poi-1").unwrap().photo_url.is_none());
        assert_eq!(blobs.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bucket_creation_is_retried_after_a_failure() {
        let store = Arc::new(MemoryVenueStore::default());
        let photos = Arc::new(FakePhotoSource::new());
        let blobs = Arc::new(MemoryBlobStore::with_ensure_failures(1));
        store.seed(test_venue("poi-1"));

        let cache = photo_cache(store.clone(), photos.clone(), blobs.clone());

        assert!(cache.cache_if_needed("poi-1", "ref-1").await.is_err());
        assert_eq!(
            cache.cache_if_needed("poi-1", "ref-1").await.unwrap(),
            PhotoOutcome::Cached
        );
        assert_eq!(blobs.ensure_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn object_keys_are_deterministic_and_path_safe() {
        let a = photo_object_key("ChIJ/with+odd=chars");
        let b = photo_object_key("ChIJ/with+odd=chars");
        assert_eq!(a, b);
        assert!(a.starts_with("venues/"));
        assert!(a.ends_with(".jpg"));
        assert!(!a.trim_start_matches("venues/").contains('/'));
    }
}
