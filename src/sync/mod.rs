// 同步模块
// 外部兴趣点的抓取、归一化、入库和照片镜像

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::MapLocation;
use crate::database::models::venue::{Venue, VenueCategory};

pub mod photo_cache;
pub mod pipeline;
pub mod places;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use photo_cache::{PhotoCache, PhotoOutcome};
pub use pipeline::{PoiSyncPipeline, SyncReport};
pub use places::{GooglePlacesClient, RawPlace, SearchPage};
pub use storage::SupabaseStorage;

/// 同步过程中的错误
#[derive(Debug)]
pub enum SyncError {
    /// 搜索服务返回异常状态或非法响应
    Provider(String),
    /// 数据库操作失败
    Database(sqlx::Error),
    /// 网络请求失败
    Http(reqwest::Error),
    /// Blob 存储返回异常状态
    Storage(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Provider(msg) => write!(f, "search provider error: {}", msg),
            SyncError::Database(e) => write!(f, "database error: {}", e),
            SyncError::Http(e) => write!(f, "http error: {}", e),
            SyncError::Storage(msg) => write!(f, "blob storage error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Database(e) => Some(e),
            SyncError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Database(e)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Http(e)
    }
}

/// 搜索服务：分页返回原始兴趣点
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        center: MapLocation,
        radius_m: f64,
        keyword: &str,
        place_type: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, SyncError>;
}

/// 照片解析服务：把上游照片引用换成图片字节
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn fetch_photo(&self, photo_reference: &str, max_width: u32) -> Result<Vec<u8>, SyncError>;
}

/// Blob 存储
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), SyncError>;

    /// 上传对象并返回可公开访问的地址
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, SyncError>;
}

/// 场所存储后端，upsert 以上游ID为幂等键
#[async_trait]
pub trait VenueStore: Send + Sync {
    async fn upsert_venue(&self, venue: &Venue) -> Result<(), SyncError>;
    async fn get_photo_url(&self, external_id: &str) -> Result<Option<String>, SyncError>;
    async fn set_photo_url(&self, external_id: &str, url: &str) -> Result<(), SyncError>;
}

/// 单条搜索配置
#[derive(Debug, Clone, Copy)]
pub struct SearchSpec {
    pub keyword: &'static str,
    pub place_type: &'static str,
    /// 上游 types 无法识别时使用的分类
    pub fallback_category: VenueCategory,
}

/// 固定的搜索配置清单，按此顺序执行
///
/// 同一个场所被多条配置命中时，先执行的配置决定它本轮的分类。
pub const SEARCH_SPECS: &[SearchSpec] = &[
    SearchSpec {
        keyword: "beach club",
        place_type: "night_club",
        fallback_category: VenueCategory::BeachClub,
    },
    SearchSpec {
        keyword: "restaurant",
        place_type: "restaurant",
        fallback_category: VenueCategory::Restaurant,
    },
    SearchSpec {
        keyword: "cenote",
        place_type: "tourist_attraction",
        fallback_category: VenueCategory::Attraction,
    },
    SearchSpec {
        keyword: "ruins",
        place_type: "museum",
        fallback_category: VenueCategory::Cultural,
    },
    SearchSpec {
        keyword: "cafe",
        place_type: "cafe",
        fallback_category: VenueCategory::Cafe,
    },
    SearchSpec {
        keyword: "bar",
        place_type: "bar",
        fallback_category: VenueCategory::Bar,
    },
    SearchSpec {
        keyword: "boutique hotel",
        place_type: "lodging",
        fallback_category: VenueCategory::Hotel,
    },
    SearchSpec {
        keyword: "spa",
        place_type: "spa",
        fallback_category: VenueCategory::Wellness,
    },
];

/// 同步的地理范围
#[derive(Debug, Clone, Copy)]
pub struct SearchRegion {
    pub center: MapLocation,
    pub radius_m: f64,
}

/// 管道的节拍参数
///
/// 这些延迟是对上游配额政策的承诺，正常运行时不可跳过；
/// 测试里可以整体置零。
#[derive(Debug, Clone, Copy)]
pub struct SyncPacing {
    /// 相邻两次照片缓存之间
    pub photo_delay: Duration,
    /// 翻页之前（上游的翻页令牌需要短暂预热）
    pub page_delay: Duration,
    /// 相邻两条搜索配置之间
    pub spec_delay: Duration,
}

impl Default for SyncPacing {
    fn default() -> Self {
        Self {
            photo_delay: Duration::from_millis(200),
            page_delay: Duration::from_secs(2),
            spec_delay: Duration::from_secs(1),
        }
    }
}

impl SyncPacing {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            photo_delay: Duration::ZERO,
            page_delay: Duration::ZERO,
            spec_delay: Duration::ZERO,
        }
    }
}
