use serde::Serialize;

use crate::database::models::venue::Venue;

/// 返回给前端的场所信息
#[derive(Debug, Serialize)]
pub struct VenueInfo {
    pub external_id: String,
    pub name: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub rating: Option<f64>,
    pub price_level: Option<i32>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl From<Venue> for VenueInfo {
    fn from(venue: Venue) -> Self {
        Self {
            external_id: venue.external_id,
            name: venue.name,
            category: venue.category,
            latitude: venue.latitude,
            longitude: venue.longitude,
            rating: venue.rating,
            price_level: venue.price_level,
            address: venue.address,
            phone: venue.phone,
            website: venue.website,
            description: venue.description,
            photo_url: venue.photo_url,
        }
    }
}
