mod error_handler;
mod identity;
mod rate_limit;

pub use error_handler::log_errors;
pub use identity::{MAX_BODY_BYTES, capture_identity};
pub use rate_limit::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER, rate_limit};
