/// 缓存键模块
/// 提供各种缓存键生成函数

/// 场所缓存键的公共前缀，同步完成后按它整体失效
pub const VENUE_PREFIX: &str = "venue:";

const VENUE_ID_PREFIX: &str = "venue:id:";
const VENUE_CATEGORY_PREFIX: &str = "venue:cat:";
const VENUE_LOCATION_PREFIX: &str = "venue:loc:";

/// 生成场所详情缓存键
pub fn venue_id_key(external_id: &str) -> String {
    format!("{}{}", VENUE_ID_PREFIX, external_id)
}

/// 生成分类列表缓存键
pub fn venue_category_key(category: &str) -> String {
    format!("{}{}", VENUE_CATEGORY_PREFIX, category)
}

/// 生成附近场所缓存键
pub fn nearby_venues_key(lat: f64, lon: f64, radius: f64) -> String {
    // 坐标精确到小数点后两位，避免 key 过于分散
    let lat_rounded = (lat * 100.0).round() / 100.0;
    let lon_rounded = (lon * 100.0).round() / 100.0;
    format!(
        "{}{}:{}:{}",
        VENUE_LOCATION_PREFIX, lat_rounded, lon_rounded, radius
    )
}
