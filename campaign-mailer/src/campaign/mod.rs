//! Campaign rendering, sending and reporting.

pub mod analytics;
pub mod personalize;
pub mod render;
pub mod send;

pub use analytics::{Analytics, RecentOpen, TrackingStats};
pub use personalize::{escape_html, personalize, soften_subject, TokenContext};
pub use render::{render_email, tracking_pixel_tag, RenderedEmail};
pub use send::{check_relay, send_campaign, CampaignSendResult, SendStats, NO_PENDING_MESSAGE};
