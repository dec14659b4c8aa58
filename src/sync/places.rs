use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{PhotoSource, SearchProvider, SyncError};
use crate::common::MapLocation;

const NEARBY_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const PHOTO_URL: &str = "https://maps.googleapis.com/maps/api/place/photo";

/// 一页搜索结果
///
/// results 保留上游原始 JSON，归一化在管道里做，
/// 单条解析失败只影响那一条。
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
}

/// 上游返回的原始兴趣点
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlace {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    pub geometry: RawGeometry,
    pub rating: Option<f64>,
    pub price_level: Option<i32>,
    pub vicinity: Option<String>,
    pub formatted_address: Option<String>,
    pub international_phone_number: Option<String>,
    pub website: Option<String>,
    #[serde(default)]
    pub photos: Vec<RawPhoto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
    pub location: RawLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLocation {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPhoto {
    pub photo_reference: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<serde_json::Value>,
    next_page_token: Option<String>,
    error_message: Option<String>,
}

/// Google Places 客户端，同时承担搜索和照片解析
pub struct GooglePlacesClient {
    http: reqwest::Client,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("places http client");
        Self {
            http,
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for GooglePlacesClient {
    async fn search(
        &self,
        center: MapLocation,
        radius_m: f64,
        keyword: &str,
        place_type: &str,
        page_token: Option<&str>,
    ) -> Result<SearchPage, SyncError> {
        // 带翻页令牌时，其它查询参数必须省略
        let params: Vec<(&str, String)> = match page_token {
            Some(token) => vec![
                ("pagetoken", token.to_string()),
                ("key", self.api_key.clone()),
            ],
            None => vec![
                (
                    "location",
                    format!("{},{}", center.latitude, center.longitude),
                ),
                ("radius", format!("{}", radius_m as u64)),
                ("keyword", keyword.to_string()),
                ("type", place_type.to_string()),
                ("key", self.api_key.clone()),
            ],
        };

        let response = self
            .http
            .get(NEARBY_SEARCH_URL)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let parsed: SearchResponse = response.json().await?;
        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => Ok(SearchPage {
                results: parsed.results,
                next_page_token: parsed.next_page_token,
            }),
            status => Err(SyncError::Provider(format!(
                "nearby search returned {}: {}",
                status,
                parsed.error_message.unwrap_or_default()
            ))),
        }
    }
}

#[async_trait]
impl PhotoSource for GooglePlacesClient {
    async fn fetch_photo(
        &self,
        photo_reference: &str,
        max_width: u32,
    ) -> Result<Vec<u8>, SyncError> {
        let response = self
            .http
            .get(PHOTO_URL)
            .query(&[
                ("maxwidth", max_width.to_string()),
                ("photo_reference", photo_reference.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_place_parses_a_nearby_search_result() {
        let value = serde_json::json!({
            "place_id": "ChIJabc123",
            "name": "Casa Jaguar",
            "types": ["restaurant", "point_of_interest"],
            "geometry": { "location": { "lat": 20.19, "lng": -87.45 } },
            "rating": 4.6,
            "price_level": 3,
            "vicinity": "Carretera Tulum-Boca Paila Km 7.5",
            "photos": [ { "photo_reference": "ref-1", "width": 1024 } ],
            "business_status": "OPERATIONAL"
        });

        let place: RawPlace = serde_json::from_value(value).unwrap();
        assert_eq!(place.place_id, "ChIJabc123");
        assert_eq!(place.geometry.location.lat, 20.19);
        assert_eq!(place.photos.len(), 1);
        assert_eq!(place.photos[0].photo_reference, "ref-1");
        assert!(place.website.is_none());
    }

    #[test]
    fn raw_place_rejects_results_without_an_id() {
        let value = serde_json::json!({
            "name": "Unnamed",
            "geometry": { "location": { "lat": 0.0, "lng": 0.0 } }
        });
        assert!(serde_json::from_value::<RawPlace>(value).is_err());
    }
}
