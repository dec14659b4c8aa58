use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 场所记录，上游 place_id 为自然键
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Venue {
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
    pub raw_data: serde_json::Value,
    pub last_synced_at: DateTime<Utc>,
}

/// 场所分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueCategory {
    Club,
    BeachClub,
    Restaurant,
    Cafe,
    Bar,
    Cultural,
    Attraction,
    Hotel,
    Wellness,
}

impl VenueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueCategory::Club => "club",
            VenueCategory::BeachClub => "beach_club",
            VenueCategory::Restaurant => "restaurant",
            VenueCategory::Cafe => "cafe",
            VenueCategory::Bar => "bar",
            VenueCategory::Cultural => "cultural",
            VenueCategory::Attraction => "attraction",
            VenueCategory::Hotel => "hotel",
            VenueCategory::Wellness => "wellness",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "club" => Some(VenueCategory::Club),
            "beach_club" => Some(VenueCategory::BeachClub),
            "restaurant" => Some(VenueCategory::Restaurant),
            "cafe" => Some(VenueCategory::Cafe),
            "bar" => Some(VenueCategory::Bar),
            "cultural" => Some(VenueCategory::Cultural),
            "attraction" => Some(VenueCategory::Attraction),
            "hotel" => Some(VenueCategory::Hotel),
            "wellness" => Some(VenueCategory::Wellness),
            _ => None,
        }
    }

    /// 从上游返回的 types 推断分类，取第一个能识别的类型
    pub fn from_types(types: &[String]) -> Option<Self> {
        types.iter().find_map(|t| match t.as_str() {
            "night_club" => Some(VenueCategory::Club),
            "restaurant" | "meal_takeaway" | "meal_delivery" => Some(VenueCategory::Restaurant),
            "cafe" | "bakery" => Some(VenueCategory::Cafe),
            "bar" => Some(VenueCategory::Bar),
            "museum" | "art_gallery" => Some(VenueCategory::Cultural),
            "tourist_attraction" | "park" | "natural_feature" => Some(VenueCategory::Attraction),
            "lodging" => Some(VenueCategory::Hotel),
            "spa" | "gym" => Some(VenueCategory::Wellness),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_category() {
        for category in [
            VenueCategory::Club,
            VenueCategory::BeachClub,
            VenueCategory::Restaurant,
            VenueCategory::Cafe,
            VenueCategory::Bar,
            VenueCategory::Cultural,
            VenueCategory::Attraction,
            VenueCategory::Hotel,
            VenueCategory::Wellness,
        ] {
            assert_eq!(VenueCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(VenueCategory::parse("laundromat"), None);
    }

    #[test]
    fn first_recognized_type_wins() {
        let types = vec![
            "point_of_interest".to_string(),
            "bar".to_string(),
            "restaurant".to_string(),
        ];
        assert_eq!(VenueCategory::from_types(&types), Some(VenueCategory::Bar));
        assert_eq!(VenueCategory::from_types(&["establishment".into()]), None);
    }
}
