//! Conversion of transformed text to the CMS block document.
//!
//! The document is a tree `root -> paragraph -> text`. Paragraphs are split
//! on blank lines and on block-level HTML boundaries; all other markup is
//! stripped and entities are decoded.

use serde::Serialize;

/// A node of the block document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    /// Document root; children are paragraphs.
    Root {
        /// Paragraphs.
        children: Vec<Node>,
    },
    /// Paragraph; children are text runs.
    Paragraph {
        /// Text runs.
        children: Vec<Node>,
    },
    /// Plain text run.
    Text {
        /// Text content.
        text: String,
    },
}

impl Node {
    /// Concatenated text of the subtree, paragraphs separated by blank lines.
    pub fn plain_text(&self) -> String {
        match self {
            Node::Root { children } => children
                .iter()
                .map(Node::plain_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Node::Paragraph { children } => children.iter().map(Node::plain_text).collect(),
            Node::Text { text } => text.clone(),
        }
    }
}

/// Build the document for `content`. Always has at least one paragraph.
pub fn to_document(content: &str) -> Node {
    let mut children: Vec<Node> = paragraphs(content)
        .into_iter()
        .map(|text| Node::Paragraph {
            children: vec![Node::Text { text }],
        })
        .collect();

    if children.is_empty() {
        children.push(Node::Paragraph {
            children: vec![Node::Text {
                text: String::new(),
            }],
        });
    }

    Node::Root { children }
}

/// Split `content` into whitespace-normalized plain-text paragraphs.
pub fn paragraphs(content: &str) -> Vec<String> {
    let flat = flatten_html(content).replace("\r\n", "\n");

    let mut result = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in flat.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut result);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut result);

    result
}

fn flush(current: &mut Vec<&str>, out: &mut Vec<String>) {
    let text = current
        .iter()
        .flat_map(|line| line.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    if !text.is_empty() {
        out.push(text);
    }
    current.clear();
}

/// Strip tags and decode entities; block boundaries become blank lines.
fn flatten_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '<' if chars
                .peek()
                .is_some_and(|c| c.is_ascii_alphabetic() || *c == '/' || *c == '!') =>
            {
                let mut tag = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '>' {
                        closed = true;
                        break;
                    }
                    tag.push(c);
                }
                if !closed {
                    out.push('<');
                    out.push_str(&tag);
                } else if is_block_boundary(&tag) {
                    out.push_str("\n\n");
                }
            }
            '&' => {
                let mut entity = String::new();
                while let Some(&c) = chars.peek() {
                    if entity.len() > 10 || !(c.is_ascii_alphanumeric() || c == '#') {
                        break;
                    }
                    entity.push(c);
                    chars.next();
                }
                if chars.peek() == Some(&';') {
                    chars.next();
                    match decode_entity(&entity) {
                        Some(c) => out.push(c),
                        None => {
                            out.push('&');
                            out.push_str(&entity);
                            out.push(';');
                        }
                    }
                } else {
                    out.push('&');
                    out.push_str(&entity);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

fn is_block_boundary(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(
        name.as_str(),
        "p" | "br" | "div" | "li" | "ul" | "ol" | "blockquote" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
