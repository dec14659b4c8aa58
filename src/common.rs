use serde::{Deserialize, Serialize};

/// 统一的接口响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    pub resp_data: Option<T>,
}

// 公共数据结构
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct MapLocation {
    pub latitude: f64,
    pub longitude: f64,
}
