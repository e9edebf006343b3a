//! Parsing, truncation, and schema validation of generated content
//!
//! The model reply is expected to be one JSON object, possibly wrapped in a
//! fenced code block. After parsing, each bounded field gets the safety-net
//! truncation, then the whole object is validated. Validation after
//! truncation can only fail for structural problems (missing or empty
//! fields, bad cardinality, bad URL), which indicate a prompt-quality
//! defect rather than a transient fault.

use crate::error::{GenerationError, Result};
use crate::types::ContentTarget;

use super::{
    GeneratedContent, InstagramContent, MediumContent, NewsletterContent, SocialPostContent,
};

pub const LINKEDIN_POST_MAX: usize = 500;
pub const FACEBOOK_POST_MAX: usize = 300;
pub const INSTAGRAM_CAPTION_MAX: usize = 300;
pub const NEWSLETTER_SUBJECT_MAX: usize = 100;
pub const NEWSLETTER_BODY_MAX: usize = 2_000;
pub const MEDIUM_TITLE_MAX: usize = 100;

pub const HASHTAGS_MIN: usize = 5;
pub const HASHTAGS_MAX: usize = 10;
pub const TAGS_MIN: usize = 1;
pub const TAGS_MAX: usize = 5;

/// How far back from a hard cut we look for a sentence boundary.
const BOUNDARY_LOOKBACK: usize = 100;

/// Strip a Markdown code fence (with an optional language tag) from around
/// the model reply.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("json") if present
    match rest.split_once('\n') {
        Some((first_line, body)) if first_line.trim().chars().all(char::is_alphanumeric) => {
            body.trim()
        }
        _ => rest.trim(),
    }
}

/// Truncate to `max_chars`, then cut back to the last sentence-ending
/// punctuation mark if one falls within the final 100 characters of the
/// truncated text. Text already within the limit is returned unchanged, so
/// the operation is idempotent.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let cut = &chars[..max_chars];
    let search_start = max_chars.saturating_sub(BOUNDARY_LOOKBACK);
    match cut.iter().rposition(|c| matches!(c, '.' | '!' | '?')) {
        Some(i) if i >= search_start => cut[..=i].iter().collect(),
        _ => cut.iter().collect(),
    }
}

/// Append the canonical URL unless the text already contains it.
pub fn append_canonical_url(text: &str, url: &str) -> String {
    if text.contains(url) {
        text.to_string()
    } else {
        format!("{}\n\n{}", text.trim_end(), url)
    }
}

/// Parse a raw model reply into the requested target's content.
pub fn parse_generated(target: ContentTarget, raw: &str) -> Result<GeneratedContent> {
    let json = strip_code_fence(raw);

    let parse_err =
        |e: serde_json::Error| GenerationError::Parse(format!("{} ({})", e, target));

    Ok(match target {
        ContentTarget::Newsletter => {
            GeneratedContent::Newsletter(serde_json::from_str::<NewsletterContent>(json).map_err(parse_err)?)
        }
        ContentTarget::Linkedin => {
            GeneratedContent::Linkedin(serde_json::from_str::<SocialPostContent>(json).map_err(parse_err)?)
        }
        ContentTarget::Facebook => {
            GeneratedContent::Facebook(serde_json::from_str::<SocialPostContent>(json).map_err(parse_err)?)
        }
        ContentTarget::Instagram => {
            GeneratedContent::Instagram(serde_json::from_str::<InstagramContent>(json).map_err(parse_err)?)
        }
        ContentTarget::Medium => {
            GeneratedContent::Medium(serde_json::from_str::<MediumContent>(json).map_err(parse_err)?)
        }
    })
}

/// Apply the safety-net truncation to every bounded text field.
pub fn enforce_limits(content: &mut GeneratedContent) {
    match content {
        GeneratedContent::Newsletter(c) => {
            c.subject = truncate_at_sentence(&c.subject, NEWSLETTER_SUBJECT_MAX);
            c.body = truncate_at_sentence(&c.body, NEWSLETTER_BODY_MAX);
        }
        GeneratedContent::Linkedin(c) => {
            c.post = truncate_at_sentence(&c.post, LINKEDIN_POST_MAX);
        }
        GeneratedContent::Facebook(c) => {
            c.post = truncate_at_sentence(&c.post, FACEBOOK_POST_MAX);
        }
        GeneratedContent::Instagram(c) => {
            c.caption = truncate_at_sentence(&c.caption, INSTAGRAM_CAPTION_MAX);
        }
        GeneratedContent::Medium(c) => {
            c.title = truncate_at_sentence(&c.title, MEDIUM_TITLE_MAX);
        }
    }
}

/// Validate structure after truncation. Length violations are impossible for
/// truncated fields; everything else is fatal.
pub fn validate(content: &GeneratedContent) -> Result<()> {
    match content {
        GeneratedContent::Newsletter(c) => {
            require_text("subject", &c.subject, NEWSLETTER_SUBJECT_MAX)?;
            require_text("body", &c.body, NEWSLETTER_BODY_MAX)?;
        }
        GeneratedContent::Linkedin(c) => {
            require_text("post", &c.post, LINKEDIN_POST_MAX)?;
        }
        GeneratedContent::Facebook(c) => {
            require_text("post", &c.post, FACEBOOK_POST_MAX)?;
        }
        GeneratedContent::Instagram(c) => {
            require_text("caption", &c.caption, INSTAGRAM_CAPTION_MAX)?;
            if c.hashtags.len() < HASHTAGS_MIN || c.hashtags.len() > HASHTAGS_MAX {
                return Err(GenerationError::Schema(format!(
                    "Expected {}-{} hashtags, got {}",
                    HASHTAGS_MIN,
                    HASHTAGS_MAX,
                    c.hashtags.len()
                ))
                .into());
            }
            if c.hashtags.iter().any(|tag| tag.trim().is_empty()) {
                return Err(GenerationError::Schema("Empty hashtag".to_string()).into());
            }
        }
        GeneratedContent::Medium(c) => {
            require_text("title", &c.title, MEDIUM_TITLE_MAX)?;
            if c.body.trim().is_empty() {
                return Err(GenerationError::Schema("Field 'body' is empty".to_string()).into());
            }
            if c.tags.len() < TAGS_MIN || c.tags.len() > TAGS_MAX {
                return Err(GenerationError::Schema(format!(
                    "Expected {}-{} tags, got {}",
                    TAGS_MIN,
                    TAGS_MAX,
                    c.tags.len()
                ))
                .into());
            }
            if !c.canonical_url.starts_with("http://") && !c.canonical_url.starts_with("https://")
            {
                return Err(GenerationError::Schema(format!(
                    "Invalid canonical URL: {}",
                    c.canonical_url
                ))
                .into());
            }
        }
    }
    Ok(())
}

fn require_text(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GenerationError::Schema(format!("Field '{}' is empty", field)).into());
    }
    let len = value.chars().count();
    if len > max_chars {
        return Err(GenerationError::Schema(format!(
            "Field '{}' is {} characters, maximum is {}",
            field, len, max_chars
        ))
        .into());
    }
    Ok(())
}
