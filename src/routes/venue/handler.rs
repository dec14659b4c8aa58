use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::cache::{CacheError, keys};
use crate::database::models::venue::{Venue, VenueCategory};
use crate::database::repositories::venue::VenueRepository;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

use super::model::VenueInfo;

// 详情变化慢，列表跟着同步节奏走，位置查询结果变化较快
const DETAIL_CACHE_TTL: Duration = Duration::from_secs(3600);
const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(600);
const LOCATION_CACHE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub external_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: String,
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    let repo = VenueRepository::new(state.pool.clone());
    let cache_key = keys::venue_id_key(&query.external_id);

    let result: Result<Option<Venue>, CacheError> = state
        .cache
        .get(&cache_key, DETAIL_CACHE_TTL, || async {
            repo.find_by_external_id(&query.external_id)
                .await
                .map_err(CacheError::fill)
        })
        .await;

    match result {
        Ok(Some(venue)) => (
            StatusCode::OK,
            success_to_api_response(VenueInfo::from(venue)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Venue not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn find_by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> impl IntoResponse {
    let radius = query
        .radius
        .unwrap_or(1000.0)
        .min(state.config.max_search_radius);

    let repo = VenueRepository::new(state.pool.clone());
    let cache_key = keys::nearby_venues_key(query.latitude, query.longitude, radius);

    let result: Result<Vec<Venue>, CacheError> = state
        .cache
        .get(&cache_key, LOCATION_CACHE_TTL, || async {
            repo.find_by_location(query.latitude, query.longitude, radius)
                .await
                .map_err(CacheError::fill)
        })
        .await;

    match result {
        Ok(venues) => {
            let infos = venues.into_iter().map(VenueInfo::from).collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn find_by_category(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> impl IntoResponse {
    // 分类必须是已知枚举值，避免任意字符串打穿缓存
    if VenueCategory::parse(&query.category).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response::<Vec<VenueInfo>>(
                error_codes::VALIDATION_ERROR,
                format!("Unknown category: {}", query.category),
            ),
        );
    }

    let repo = VenueRepository::new(state.pool.clone());
    let cache_key = keys::venue_category_key(&query.category);

    let result: Result<Vec<Venue>, CacheError> = state
        .cache
        .get(&cache_key, CATEGORY_CACHE_TTL, || async {
            repo.find_by_category(&query.category)
                .await
                .map_err(CacheError::fill)
        })
        .await;

    match result {
        Ok(venues) => {
            let infos = venues.into_iter().map(VenueInfo::from).collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}
