// 场所存储库
// 同步管道和查询接口共用的数据库操作

use async_trait::async_trait;
use sqlx::{Error as SqlxError, PgPool};

use crate::database::models::venue::Venue;
use crate::sync::{SyncError, VenueStore};
use crate::utils::calculate_distance;

const VENUE_COLUMNS: &str = "external_id, name, category, latitude, longitude, rating, \
     price_level, address, phone, website, description, photo_url, raw_data, last_synced_at";

/// 场所存储库，处理所有与场所相关的数据库操作
pub struct VenueRepository {
    db: PgPool,
}

impl VenueRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 按上游 place_id 幂等 upsert
    ///
    /// photo_url 不在更新列里：照片缓存单独维护该列，重复同步不能把
    /// 已缓存的地址冲掉。
    pub async fn upsert(&self, venue: &Venue) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            INSERT INTO venues (
                external_id, name, category, latitude, longitude, rating,
                price_level, address, phone, website, description, raw_data, last_synced_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (external_id) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                rating = EXCLUDED.rating,
                price_level = EXCLUDED.price_level,
                address = EXCLUDED.address,
                phone = EXCLUDED.phone,
                website = EXCLUDED.website,
                description = EXCLUDED.description,
                raw_data = EXCLUDED.raw_data,
                last_synced_at = EXCLUDED.last_synced_at
            "#,
        )
        .bind(&venue.external_id)
        .bind(&venue.name)
        .bind(&venue.category)
        .bind(venue.latitude)
        .bind(venue.longitude)
        .bind(venue.rating)
        .bind(venue.price_level)
        .bind(&venue.address)
        .bind(&venue.phone)
        .bind(&venue.website)
        .bind(&venue.description)
        .bind(&venue.raw_data)
        .bind(venue.last_synced_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 根据上游ID查找场所
    pub async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Venue>, SqlxError> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {} FROM venues WHERE external_id = $1",
            VENUE_COLUMNS
        ))
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(venue)
    }

    /// 根据位置查找附近场所
    pub async fn find_by_location(
        &self,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Vec<Venue>, SqlxError> {
        // 先用经纬度范围粗筛，再精确计算距离
        let lat_range = radius / 111_000.0;
        let lon_range = radius / (111_000.0 * latitude.to_radians().cos());

        let venues = sqlx::query_as::<_, Venue>(&format!(
            r#"
            SELECT {}
            FROM venues
            WHERE
                latitude BETWEEN ($1 - $3) AND ($1 + $3)
                AND longitude BETWEEN ($2 - $4) AND ($2 + $4)
            "#,
            VENUE_COLUMNS
        ))
        .bind(latitude)
        .bind(longitude)
        .bind(lat_range)
        .bind(lon_range)
        .fetch_all(&self.db)
        .await?;

        let nearby = venues
            .into_iter()
            .filter(|venue| {
                calculate_distance(latitude, longitude, venue.latitude, venue.longitude) <= radius
            })
            .collect();

        Ok(nearby)
    }

    /// 按分类查找场所，评分高的在前
    pub async fn find_by_category(&self, category: &str) -> Result<Vec<Venue>, SqlxError> {
        let venues = sqlx::query_as::<_, Venue>(&format!(
            r#"
            SELECT {}
            FROM venues
            WHERE category = $1
            ORDER BY rating DESC NULLS LAST
            LIMIT 50
            "#,
            VENUE_COLUMNS
        ))
        .bind(category)
        .fetch_all(&self.db)
        .await?;

        Ok(venues)
    }

    /// 读取已缓存的照片地址
    pub async fn photo_url(&self, external_id: &str) -> Result<Option<String>, SqlxError> {
        let url: Option<Option<String>> =
            sqlx::query_scalar("SELECT photo_url FROM venues WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(url.flatten())
    }

    /// 记录镜像后的照片地址
    pub async fn set_photo_url(&self, external_id: &str, url: &str) -> Result<(), SqlxError> {
        sqlx::query("UPDATE venues SET photo_url = $2 WHERE external_id = $1")
            .bind(external_id)
            .bind(url)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl VenueStore for VenueRepository {
    async fn upsert_venue(&self, venue: &Venue) -> Result<(), SyncError> {
        Ok(self.upsert(venue).await?)
    }

    async fn get_photo_url(&self, external_id: &str) -> Result<Option<String>, SyncError> {
        Ok(self.photo_url(external_id).await?)
    }

    async fn set_photo_url(&self, external_id: &str, url: &str) -> Result<(), SyncError> {
        Ok(VenueRepository::set_photo_url(self, external_id, url).await?)
    }
}
