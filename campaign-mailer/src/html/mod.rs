//! HTML inspection for rendered campaign emails.

pub mod parser;
pub mod types;

pub use parser::{find_tracking_pixel, html_to_text, TRACKING_PATH};
pub use types::TrackingPixel;
