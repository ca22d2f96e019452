//! Campaign mailer - email campaign dashboard with an SMTP relay.
//!
//! This library provides shared modules for the two binaries:
//! - `campaign-dashboard`: Dashboard API, contact store and open tracking
//! - `campaign-relay`: Mail relay owning the SMTP (or mock) transport
//!
//! ## Architecture
//!
//! ```text
//! Browser → Dashboard → /api/send-bulk → Relay → SMTP
//!    ↑                                              │
//!    └──────── /api/track/:id ← recipient's client ←┘
//! ```

pub mod campaign;
pub mod config;
pub mod html;
pub mod relay;
pub mod shutdown;
pub mod store;
pub mod transport;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use relay::{RelayClient, RelayState};
pub use shutdown::shutdown_signal;
pub use store::{Store, StoreError};
pub use transport::{init_mailer, Mailer};
pub use web::AppState;
