use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::sleep;
use uuid::Uuid;

use super::{
    PhotoCache, PhotoOutcome, SearchProvider, SearchRegion, SearchSpec, SyncError, SyncPacing,
    VenueStore,
};
use crate::database::models::venue::{Venue, VenueCategory};
use crate::sync::places::RawPlace;

/// 一轮同步的统计
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncReport {
    pub upserted: u32,
    pub duplicates: u32,
    pub malformed: u32,
    pub photos_cached: u32,
    pub photo_failures: u32,
}

/// 兴趣点同步管道
///
/// 按固定顺序遍历搜索配置，翻完每条配置的所有分页，把结果归一化后
/// 幂等入库，并顺带镜像首图。节拍延迟穿插在照片、分页和配置之间。
pub struct PoiSyncPipeline {
    provider: Arc<dyn SearchProvider>,
    venues: Arc<dyn VenueStore>,
    photos: PhotoCache,
    region: SearchRegion,
    specs: Vec<SearchSpec>,
    pacing: SyncPacing,
}

impl PoiSyncPipeline {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        venues: Arc<dyn VenueStore>,
        photos: PhotoCache,
        region: SearchRegion,
        specs: Vec<SearchSpec>,
        pacing: SyncPacing,
    ) -> Self {
        Self {
            provider,
            venues,
            photos,
            region,
            specs,
            pacing,
        }
    }

    /// 跑一轮完整同步
    ///
    /// seen 集合只在本轮内有效，下一轮会重新处理同一批场所来跟进
    /// 评分和地址的变化。中途失败直接返回错误，已入库的数据保留，
    /// upsert 幂等所以半轮重放是安全的。
    pub async fn run_pass(&self) -> Result<SyncReport, SyncError> {
        let pass_id = Uuid::new_v4();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = SyncReport::default();

        tracing::info!(%pass_id, specs = self.specs.len(), "starting poi sync pass");

        for spec in &self.specs {
            let mut page_token: Option<String> = None;

            loop {
                let page = self
                    .provider
                    .search(
                        self.region.center,
                        self.region.radius_m,
                        spec.keyword,
                        spec.place_type,
                        page_token.as_deref(),
                    )
                    .await?;

                for raw in page.results {
                    self.process_result(spec, raw, &mut seen, &mut report)
                        .await?;
                }

                match page.next_page_token {
                    Some(token) => {
                        // 上游的翻页令牌需要预热，这个等待不可省略
                        sleep(self.pacing.page_delay).await;
                        page_token = Some(token);
                    }
                    None => break,
                }
            }

            tracing::debug!(%pass_id, keyword = spec.keyword, "search spec finished");
            sleep(self.pacing.spec_delay).await;
        }

        tracing::info!(
            %pass_id,
            upserted = report.upserted,
            duplicates = report.duplicates,
            malformed = report.malformed,
            photos_cached = report.photos_cached,
            photo_failures = report.photo_failures,
            "poi sync pass finished"
        );

        Ok(report)
    }

    async fn process_result(
        &self,
        spec: &SearchSpec,
        raw: serde_json::Value,
        seen: &mut HashSet<String>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let place: RawPlace = match serde_json::from_value(raw.clone()) {
            Ok(place) => place,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed search result");
                report.malformed += 1;
                return Ok(());
            }
        };

        // 本轮已处理过的场所不再入库，先到的配置决定归类
        if !seen.insert(place.place_id.clone()) {
            report.duplicates += 1;
            return Ok(());
        }

        let venue = normalize_place(spec, &place, raw);
        self.venues.upsert_venue(&venue).await?;
        report.upserted += 1;

        if let Some(photo) = place.photos.first() {
            match self
                .photos
                .cache_if_needed(&place.place_id, &photo.photo_reference)
                .await
            {
                Ok(PhotoOutcome::Cached) => report.photos_cached += 1,
                Ok(PhotoOutcome::AlreadyCached) => {}
                Err(e) => {
                    // 单张照片失败不影响本轮其余工作
                    tracing::warn!(
                        place_id = %place.place_id,
                        error = %e,
                        "photo cache failed, continuing"
                    );
                    report.photo_failures += 1;
                }
            }
            sleep(self.pacing.photo_delay).await;
        }

        Ok(())
    }
}

fn normalize_place(spec: &SearchSpec, place: &RawPlace, raw: serde_json::Value) -> Venue {
    let category =
        VenueCategory::from_types(&place.types).unwrap_or(spec.fallback_category);

    Venue {
        external_id: place.place_id.clone(),
        name: place.name.clone(),
        category: category.as_str().to_string(),
        latitude: place.geometry.location.lat,
        longitude: place.geometry.location.lng,
        rating: place.rating,
        price_level: place.price_level,
        address: place
            .formatted_address
            .clone()
            .or_else(|| place.vicinity.clone()),
        phone: place.international_phone_number.clone(),
        website: place.website.clone(),
        description: None,
        photo_url: None,
        raw_data: raw,
        last_synced_at: chrono::Utc::now(),
    }
}
