use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub max_search_radius: f64,
    // 外部服务
    pub places_api_key: String,
    pub storage_url: String,
    pub storage_service_key: String,
    pub photo_bucket: String,
    // 同步任务
    pub sync_center_latitude: f64,
    pub sync_center_longitude: f64,
    pub sync_radius_m: f64,
    pub sync_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            max_search_radius: env::var("MAX_SEARCH_RADIUS")
                .map(|v| v.parse().unwrap_or(5000.0))
                .unwrap_or(5000.0),
            places_api_key: env::var("PLACES_API_KEY")?,
            storage_url: env::var("STORAGE_URL")?,
            storage_service_key: env::var("STORAGE_SERVICE_KEY")?,
            photo_bucket: env::var("PHOTO_BUCKET").unwrap_or_else(|_| "venue-photos".into()),
            // 默认以图卢姆镇中心为圆心，覆盖海滩区和考古区
            sync_center_latitude: env::var("SYNC_CENTER_LAT")
                .map(|v| v.parse().unwrap_or(20.2114))
                .unwrap_or(20.2114),
            sync_center_longitude: env::var("SYNC_CENTER_LNG")
                .map(|v| v.parse().unwrap_or(-87.4654))
                .unwrap_or(-87.4654),
            sync_radius_m: env::var("SYNC_RADIUS_M")
                .map(|v| v.parse().unwrap_or(15_000.0))
                .unwrap_or(15_000.0),
            sync_interval_secs: env::var("SYNC_INTERVAL")
                .map(|v| v.trim_end_matches('h').parse::<u64>().unwrap_or(6) * 3600)
                .unwrap_or(6 * 3600),
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}
