//! Merge-token substitution and subject-line clean-up.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::store::{AppSettings, Contact};

/// Values available to `{{token}}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenContext {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub team_lead_name: String,
    pub company_name: String,
    pub date: String,
}

impl TokenContext {
    pub fn new(contact: &Contact, settings: &AppSettings, date: String) -> Self {
        Self {
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
            email: contact.email.clone(),
            team_lead_name: settings.team_lead_name.clone(),
            company_name: settings.company_name.clone(),
            date,
        }
    }

    /// Same values, escaped for insertion into HTML.
    pub fn html_escaped(&self) -> Self {
        Self {
            first_name: escape_html(&self.first_name),
            last_name: escape_html(&self.last_name),
            email: escape_html(&self.email),
            team_lead_name: escape_html(&self.team_lead_name),
            company_name: escape_html(&self.company_name),
            date: escape_html(&self.date),
        }
    }

    fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    fn lookup(&self, token: &str) -> Option<String> {
        let value = match token {
            "firstName" => self.first_name.clone(),
            "lastName" => self.last_name.clone(),
            "fullName" => self.full_name(),
            "email" => self.email.clone(),
            "teamLeadName" => self.team_lead_name.clone(),
            "companyName" => self.company_name.clone(),
            "date" => self.date.clone(),
            _ => return None,
        };
        Some(value)
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid token pattern"))
}

/// Replace every known `{{token}}` in one pass. Unknown tokens stay as-is and
/// substituted values are never re-scanned.
pub fn personalize(template: &str, ctx: &TokenContext) -> String {
    token_pattern()
        .replace_all(template, |caps: &Captures| {
            ctx.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Spam-trigger phrases and their replacements. Longer phrases come first so
/// "WINNER" is not read as "WIN".
const SPAM_WORDS: &[(&str, &str)] = &[
    ("limited time", "Special Offer"),
    ("click here", "Learn More"),
    ("act now", "Take Action"),
    ("buy now", "Get Started"),
    ("winner", "Selected"),
    ("urgent", "Important"),
    ("money", "Value"),
    ("free", "Complimentary"),
    ("cash", "Savings"),
    ("deal", "Offer"),
    ("sale", "Special Price"),
    ("win", "Receive"),
];

fn spam_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternatives: Vec<String> = SPAM_WORDS
            .iter()
            .map(|(word, _)| word.replace(' ', r"\s+"))
            .collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .expect("Invalid spam pattern")
    })
}

fn repeated_punctuation() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"!{2,}|\?{2,}").expect("Invalid punctuation pattern"))
}

/// Soften a subject line for spam filters.
///
/// Replaces trigger words (whole words, any case), turns an all-caps subject
/// longer than five characters into sentence case, and collapses runs of
/// `!` or `?`.
pub fn soften_subject(subject: &str) -> String {
    let replaced = spam_pattern().replace_all(subject, |caps: &Captures| {
        let matched = caps[0].to_lowercase();
        let normalized = matched.split_whitespace().collect::<Vec<_>>().join(" ");
        SPAM_WORDS
            .iter()
            .find(|(word, _)| *word == normalized)
            .map(|(_, replacement)| replacement.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    let mut softened = replaced.into_owned();
    if softened.chars().count() > 5 && softened == softened.to_uppercase() {
        softened = crate::store::types::capitalize(&softened);
    }

    repeated_punctuation()
        .replace_all(&softened, |caps: &Captures| caps[0][..1].to_string())
        .into_owned()
}

/// Minimal HTML escaping for text inserted into markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
