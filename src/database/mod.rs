// 数据库模块
// 场所记录的模型与存储库

pub mod models;
pub mod repositories;

pub use models::venue::{Venue, VenueCategory};
pub use repositories::venue::VenueRepository;
