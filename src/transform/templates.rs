//! Built-in prompt templates.

use serde::Serialize;

/// Initial publication status of a created post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Saved as a draft.
    Draft,
    /// Published immediately.
    Published,
}

impl PostStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

/// A named prompt template.
///
/// The transformer uses only `instruction`; `tags` and `status` are applied
/// by the publisher.
#[derive(Debug, PartialEq, Eq)]
pub struct Template {
    /// Template name.
    pub name: &'static str,
    /// Instruction sent to the AI provider.
    pub instruction: &'static str,
    /// Tags applied to every post.
    pub tags: &'static [&'static str],
    /// Initial post status.
    pub status: PostStatus,
}

/// All built-in templates.
pub const TEMPLATES: &[Template] = &[
    Template {
        name: "newsletter",
        instruction: "Rewrite the following newsletter issue as a concise digest for our readers. \
            Keep every factual claim, drop greetings, sign-offs and promotional blocks, and \
            separate paragraphs with blank lines. Output plain text only.",
        tags: &["newsletter", "digest"],
        status: PostStatus::Draft,
    },
    Template {
        name: "blog_post",
        instruction: "Rewrite the following article as an original blog post with a short \
            introduction, a body of a few paragraphs and a one-paragraph conclusion. Keep the \
            facts, use a neutral tone, and separate paragraphs with blank lines. Output plain \
            text only.",
        tags: &["blog"],
        status: PostStatus::Draft,
    },
    Template {
        name: "social_summary",
        instruction: "Summarize the following article in at most three short sentences suitable \
            for a social media post. No hashtags, no emojis. Output plain text only.",
        tags: &["social", "summary"],
        status: PostStatus::Published,
    },
];

/// Look up a template by name.
pub fn find(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_builtin_templates() {
        for name in ["newsletter", "blog_post", "social_summary"] {
            let t = find(name).unwrap();
            assert_eq!(t.name, name);
            assert!(!t.instruction.is_empty());
            assert!(!t.tags.is_empty());
        }
    }

    #[test]
    fn test_find_unknown_template() {
        assert!(find("limerick").is_none());
        assert!(find("").is_none());
    }

    #[test]
    fn test_template_names_unique() {
        for (i, a) in TEMPLATES.iter().enumerate() {
            for b in &TEMPLATES[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_post_status_wire_format() {
        assert_eq!(PostStatus::Draft.as_str(), "draft");
        assert_eq!(
            serde_json::to_string(&PostStatus::Published).unwrap(),
            "\"published\""
        );
    }
}
