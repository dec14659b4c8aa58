// 测试用的内存版协作方实现

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::{BlobStore, PhotoSource, SyncError, VenueStore};
use crate::database::models::venue::Venue;

pub fn test_venue(external_id: &str) -> Venue {
    Venue {
        external_id: external_id.to_string(),
        name: format!("Venue {}", external_id),
        category: "restaurant".to_string(),
        latitude: 20.21,
        longitude: -87.46,
        rating: Some(4.5),
        price_level: Some(2),
        address: Some("Tulum Centro".to_string()),
        phone: None,
        website: None,
        description: None,
        photo_url: None,
        raw_data: serde_json::json!({}),
        last_synced_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryVenueStore {
    venues: Mutex<HashMap<String, Venue>>,
    pub upserts: AtomicUsize,
}

impl MemoryVenueStore {
    pub fn seed(&self, venue: Venue) {
        self.venues
            .lock()
            .unwrap()
            .insert(venue.external_id.clone(), venue);
    }

    pub fn get(&self, external_id: &str) -> Option<Venue> {
        self.venues.lock().unwrap().get(external_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.venues.lock().unwrap().len()
    }
}

#[async_trait]
impl VenueStore for MemoryVenueStore {
    async fn upsert_venue(&self, venue: &Venue) -> Result<(), SyncError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut venues = self.venues.lock().unwrap();
        // 与数据库 upsert 一致：已缓存的照片地址不被覆盖
        let photo_url = venues
            .get(&venue.external_id)
            .and_then(|existing| existing.photo_url.clone());
        let mut stored = venue.clone();
        stored.photo_url = photo_url;
        venues.insert(stored.external_id.clone(), stored);
        Ok(())
    }

    async fn get_photo_url(&self, external_id: &str) -> Result<Option<String>, SyncError> {
        Ok(self
            .venues
            .lock()
            .unwrap()
            .get(external_id)
            .and_then(|venue| venue.photo_url.clone()))
    }

    async fn set_photo_url(&self, external_id: &str, url: &str) -> Result<(), SyncError> {
        if let Some(venue) = self.venues.lock().unwrap().get_mut(external_id) {
            venue.photo_url = Some(url.to_string());
        }
        Ok(())
    }
}

pub struct FakePhotoSource {
    pub calls: AtomicUsize,
    failing: Vec<String>,
}

impl FakePhotoSource {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: Vec::new(),
        }
    }

    pub fn failing_for(references: &[&str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: references.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[async_trait]
impl PhotoSource for FakePhotoSource {
    async fn fetch_photo(
        &self,
        photo_reference: &str,
        _max_width: u32,
    ) -> Result<Vec<u8>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|r| r == photo_reference) {
            return Err(SyncError::Provider(format!(
                "photo fetch failed for {}",
                photo_reference
            )));
        }
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    pub ensure_calls: AtomicUsize,
    pub uploads: AtomicUsize,
    ensure_failures: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn with_ensure_failures(count: usize) -> Self {
        Self {
            ensure_failures: AtomicUsize::new(count),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), SyncError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .ensure_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::Storage(format!(
                "bucket create for '{}' unavailable",
                bucket
            )));
        }
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, SyncError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://cdn.test/{}/{}", bucket, key))
    }
}
