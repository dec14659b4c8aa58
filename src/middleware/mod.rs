mod error_handler;
mod rate_limit;

pub use error_handler::log_errors;
pub use rate_limit::{
    AI_PRESET, LOOKUP_PRESET, MUTATION_PRESET, RateLimitDecision, RateLimitPreset, RateLimiter,
    rate_limit,
};
