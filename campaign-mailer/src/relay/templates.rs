//! HTML bodies for the relay's own messages.

use chrono::{DateTime, Utc};

use super::types::ContactFormRequest;
use crate::campaign::personalize::escape_html;

fn stamp(at: &DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p UTC").to_string()
}

fn paragraphs(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// Notification delivered to the operator inbox for a contact-form message.
pub fn contact_notification(form: &ContactFormRequest, at: &DateTime<Utc>) -> String {
    let phone = form
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p><strong>Phone:</strong> {}</p>", escape_html(p)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #fff; padding: 30px; border: 1px solid #ddd; border-top: none; }}
    .footer {{ background: #f8f9fa; padding: 20px; text-align: center; font-size: 12px; color: #666; border-radius: 0 0 10px 10px; }}
  </style>
</head>
<body>
  <div class="header">
    <h1>Message from {name}</h1>
  </div>
  <div class="content">
    <p><strong>From:</strong> {name} ({email})</p>
    {phone}
    <p><strong>Subject:</strong> {subject}</p>
    <hr>
    <div>{message}</div>
  </div>
  <div class="footer">
    <p>Sent via Bagga Bugs Email System | {stamp}</p>
  </div>
</body>
</html>"#,
        name = escape_html(&form.name),
        email = escape_html(&form.email),
        phone = phone,
        subject = escape_html(form.subject.as_deref().unwrap_or("No Subject")),
        message = paragraphs(&form.message),
        stamp = stamp(at),
    )
}

/// Acknowledgement sent back to the person who filled in the form.
pub fn auto_reply(form: &ContactFormRequest) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2 style="color: #667eea;">Thanks for reaching out, {name}!</h2>
  <p>We received your message and will get back to you shortly.</p>
  <blockquote style="border-left: 3px solid #ddd; margin: 20px 0; padding-left: 15px; color: #555;">{message}</blockquote>
  <p>Best regards,<br>The Bagga Bugs Team</p>
</div>"#,
        name = escape_html(&form.name),
        message = paragraphs(&form.message),
    )
}

/// Body of a delivery test.
pub fn test_email(
    host: &str,
    port: &str,
    from: &str,
    to: &str,
    attempt: u32,
    max_attempts: u32,
    at: &DateTime<Utc>,
) -> String {
    format!(
        r#"<div style="font-family: Arial; padding: 20px; background: #f5f5f5;">
  <div style="max-width: 600px; margin: 0 auto; background: white; padding: 30px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0,0,0,0.1);">
    <h1 style="color: #28a745; text-align: center;">Email Working!</h1>
    <p style="font-size: 16px; color: #333;">Your Bagga Bugs email system is working.</p>
    <div style="background: #e8f4fd; padding: 15px; border-radius: 5px; margin: 20px 0;">
      <h3 style="color: #007bff; margin-top: 0;">Test Details:</h3>
      <ul style="color: #555;">
        <li><strong>SMTP Host:</strong> {host}</li>
        <li><strong>Port:</strong> {port}</li>
        <li><strong>From:</strong> {from}</li>
        <li><strong>To:</strong> {to}</li>
        <li><strong>Test Time:</strong> {stamp}</li>
        <li><strong>Attempt:</strong> {attempt}/{max_attempts}</li>
      </ul>
    </div>
  </div>
</div>"#,
        host = escape_html(host),
        port = escape_html(port),
        from = escape_html(from),
        to = escape_html(to),
        stamp = stamp(at),
    )
}
