// 缓存模块
// 两级读穿缓存和缓存键生成逻辑

pub mod keys;
mod read_through;

pub use read_through::{CacheError, ReadThroughCache};
