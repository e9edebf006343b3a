//! Prompt templates per content target
//!
//! Every prompt instructs the model to reply with a single JSON object and
//! nothing else. The article body is capped before embedding so a long post
//! cannot blow up the context window.

use crate::types::ContentTarget;

use super::GenerateOptions;

/// Body cap for short social posts.
const SOCIAL_BODY_CAP: usize = 3_000;
/// Body cap for long-form targets (newsletter, Medium).
const LONGFORM_BODY_CAP: usize = 8_000;

pub fn build_prompt(target: ContentTarget, options: &GenerateOptions) -> String {
    let cap = match target {
        ContentTarget::Newsletter | ContentTarget::Medium => LONGFORM_BODY_CAP,
        _ => SOCIAL_BODY_CAP,
    };
    let body = capped(&options.body, cap);

    let article_block = format!(
        "Title: {}\nExcerpt: {}\n\nArticle:\n{}",
        options.title, options.excerpt, body
    );

    match target {
        ContentTarget::Linkedin => format!(
            "You are a social media editor. Write a LinkedIn post promoting the \
             article below. Professional tone, at most 500 characters, no hashtags, \
             no links.\n\n{}\n\nReply with a single JSON object and nothing else:\n\
             {{\"post\": \"...\"}}",
            article_block
        ),
        ContentTarget::Facebook => format!(
            "You are a social media editor. Write a Facebook post promoting the \
             article below. Conversational tone, at most 300 characters, no links.\n\n\
             {}\n\nReply with a single JSON object and nothing else:\n\
             {{\"post\": \"...\"}}",
            article_block
        ),
        ContentTarget::Instagram => format!(
            "You are a social media editor. Write an Instagram caption promoting \
             the article below, at most 300 characters, plus 5 to 10 relevant \
             hashtags without the leading '#'.\n\n{}\n\nReply with a single JSON \
             object and nothing else:\n\
             {{\"caption\": \"...\", \"hashtags\": [\"...\"]}}",
            article_block
        ),
        ContentTarget::Newsletter => format!(
            "You are an email editor. Write a newsletter issue introducing the \
             article below. Subject line at most 100 characters, body at most \
             2000 characters of plain text.\n\n{}\n\nReply with a single JSON \
             object and nothing else:\n\
             {{\"subject\": \"...\", \"body\": \"...\"}}",
            article_block
        ),
        ContentTarget::Medium => format!(
            "You are a cross-posting editor. Prepare a Medium version of the \
             article below. Title at most 100 characters, 1 to 5 topic tags. Use \
             this canonical URL verbatim: {}\n\n{}\n\nReply with a single JSON \
             object and nothing else:\n\
             {{\"title\": \"...\", \"subtitle\": \"...\", \"body\": \"...\", \
             \"tags\": [\"...\"], \"canonical_url\": \"...\"}}",
            options.canonical_url.as_deref().unwrap_or(""),
            article_block
        ),
    }
}

fn capped(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
