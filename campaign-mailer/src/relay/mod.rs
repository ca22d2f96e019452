//! Mail relay: the process that owns the SMTP transport, plus the client the
//! dashboard uses to reach it.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /                 service index
//! GET  /api/health       transport status, SMTP settings, mock counters
//! POST /api/send-bulk    batched personalized sends
//! GET  /api/test-email   test message to the default recipient
//! POST /api/test-email   test message to {email}
//! POST /api/send-contact contact form plus auto-reply
//! ```

pub mod bulk;
pub mod client;
pub mod handlers;
pub mod templates;
pub mod types;

pub use bulk::{send_bulk, send_single};
pub use client::{RelayClient, RelayError};
pub use handlers::{router, RelayState};
pub use types::{
    BulkEmail, BulkRequest, BulkResponse, BulkResult, BulkSummary, ContactFormRequest,
    EmailServiceHealth, HealthReport, TestEmailRequest,
};
