//! Small shared helpers: timestamps and input validation.

pub mod time;
pub mod validate;

pub use time::{format_iso, now, parse_iso, us_short_date};
pub use validate::is_valid_email;
