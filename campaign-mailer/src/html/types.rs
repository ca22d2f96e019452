//! Type definitions for HTML inspection.

use serde::Serialize;

/// A tracking pixel found in a rendered email.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingPixel {
    /// Full `src` of the image
    pub url: String,
    /// Contact id taken from the last path segment
    pub contact_id: String,
    /// Whether the image is declared 1x1
    pub is_one_by_one: bool,
}
