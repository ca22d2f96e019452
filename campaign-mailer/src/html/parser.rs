//! HTML parsing utilities for rendered emails: tracking pixel lookup and a
//! plain-text rendering for the text/plain alternative part.

use scraper::{Html, Node, Selector};
use tracing::{debug, info};
use url::Url;

use super::types::TrackingPixel;

/// Path prefix served by the open-tracking handler.
pub const TRACKING_PATH: &str = "/api/track/";

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["head", "title", "style", "script"];

/// Elements that start a new line in the text rendering.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "tr", "table", "hr",
];

/// Find the open-tracking pixel in rendered email HTML.
///
/// Looks for an `<img>` whose `src` is an absolute URL with a path of the
/// form `/api/track/<contactId>`.
pub fn find_tracking_pixel(html: &str) -> Option<TrackingPixel> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img[src]").expect("Invalid selector");

    let all_imgs: Vec<_> = document.select(&selector).collect();

    debug!(
        total_img_tags = all_imgs.len(),
        html_length = html.len(),
        "tracking_pixel_search"
    );

    for img in all_imgs {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        let Ok(url) = Url::parse(src) else {
            continue;
        };
        let Some(contact_id) = url.path().strip_prefix(TRACKING_PATH) else {
            continue;
        };
        if contact_id.is_empty() || contact_id.contains('/') {
            continue;
        }

        let is_one_by_one =
            img.value().attr("width") == Some("1") && img.value().attr("height") == Some("1");

        info!(
            contact_id = %contact_id,
            is_one_by_one = is_one_by_one,
            "tracking_pixel_found"
        );

        return Some(TrackingPixel {
            url: src.to_string(),
            contact_id: contact_id.to_string(),
            is_one_by_one,
        });
    }

    debug!("tracking_pixel_not_found");
    None
}

/// Render the visible text of an HTML document.
///
/// `<br>` and block elements become line breaks, runs of whitespace inside a
/// line collapse to one space, and at most one blank line is kept between
/// paragraphs.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Element(el) if el.name() == "br" || BLOCK_ELEMENTS.contains(&el.name()) => {
                raw.push('\n');
            }
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
                });
                if !hidden {
                    raw.push_str(text);
                }
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(&line);
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_tracking_pixel() {
        let html = r#"
            <html><body>
                <img src="https://cdn.example.com/logo.png">
                <img src="http://localhost:9002/api/track/42" width="1" height="1" alt="" style="display:none;" />
            </body></html>
        "#;

        let pixel = find_tracking_pixel(html).unwrap();
        assert_eq!(pixel.contact_id, "42");
        assert_eq!(pixel.url, "http://localhost:9002/api/track/42");
        assert!(pixel.is_one_by_one);
    }

    #[test]
    fn test_find_tracking_pixel_absent() {
        assert!(find_tracking_pixel("<p>No images</p>").is_none());
        assert!(find_tracking_pixel(r#"<img src="/api/track/1">"#).is_none());
        assert!(find_tracking_pixel(r#"<img src="https://x.test/api/track/">"#).is_none());
        assert!(find_tracking_pixel(r#"<img src="https://x.test/api/track/1/extra">"#).is_none());
    }

    #[test]
    fn test_html_to_text_skips_head_and_breaks_lines() {
        let html = r#"
            <html>
            <head><title>Subject</title><style>body { color: red; }</style></head>
            <body>
                <div class="header"><h1>Message from Team</h1></div>
                <div class="content">Dear Ada,<br><br>Hello   there.<br>Bye</div>
            </body>
            </html>
        "#;

        let text = html_to_text(html);
        assert!(!text.contains("Subject"));
        assert!(!text.contains("color"));
        assert!(text.starts_with("Message from Team"));
        assert!(text.contains("Dear Ada,\n\nHello there.\nBye"));
    }

    #[test]
    fn test_html_to_text_plain_input() {
        assert_eq!(html_to_text("just text"), "just text");
        assert_eq!(html_to_text(""), "");
    }
}
