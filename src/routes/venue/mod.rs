mod handler;
mod model;

pub use handler::{find_by_category, find_by_id, find_by_location};
