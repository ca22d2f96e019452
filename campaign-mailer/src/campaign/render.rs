//! Per-contact email rendering.

use chrono::{DateTime, Utc};

use super::personalize::{escape_html, personalize, soften_subject, TokenContext};
use crate::html::{html_to_text, TRACKING_PATH};
use crate::store::{AppSettings, Campaign, Contact};
use crate::util::us_short_date;

/// A fully personalized message for one contact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// `<img>` tag that reports an open for `contact_id`.
pub fn tracking_pixel_tag(base_url: &str, contact_id: &str) -> String {
    format!(
        r#"<img src="{}{}{}" width="1" height="1" alt="" style="display:none;" />"#,
        base_url.trim_end_matches('/'),
        TRACKING_PATH,
        contact_id
    )
}

pub fn render_email(
    campaign: &Campaign,
    contact: &Contact,
    settings: &AppSettings,
    base_url: &str,
    now: &DateTime<Utc>,
) -> RenderedEmail {
    let date = us_short_date(now);
    let ctx = TokenContext::new(contact, settings, date.clone());

    let subject = soften_subject(&personalize(&campaign.subject, &ctx));
    let body = personalize(&campaign.body, &ctx.html_escaped()).replace('\n', "<br>");
    let pixel = if settings.realtime_tracking {
        tracking_pixel_tag(base_url, &contact.id)
    } else {
        String::new()
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #fff; padding: 30px; border: 1px solid #ddd; border-top: none; }}
    .footer {{ background: #f8f9fa; padding: 20px; text-align: center; font-size: 12px; color: #666; border-radius: 0 0 10px 10px; }}
  </style>
</head>
<body>
  <div class="header">
    <h1>Message from {sender}</h1>
  </div>
  <div class="content">
    {body}
  </div>
  <div class="footer">
    <p>Sent by {sender} | {date}</p>
    <p>This email was sent to {email}</p>
  </div>
  {pixel}
</body>
</html>"#,
        title = escape_html(&subject),
        sender = escape_html(&settings.team_lead_name),
        body = body,
        date = date,
        email = escape_html(&contact.email),
        pixel = pixel,
    );

    let text = html_to_text(&html);
    RenderedEmail { subject, html, text }
}
