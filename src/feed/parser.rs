//! Feed parsing into canonical entries.
//!
//! `feed-rs` does the format detection and normalization. A second pass with
//! `quick-xml` recovers the publication date strings exactly as written,
//! which feed-rs discards after parsing them.

use feed_rs::model;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::types::Entry;

/// Parse feed bytes into entries.
///
/// Never fails: input that is neither RSS nor Atom yields an empty list and
/// a warning.
pub fn parse_entries(bytes: &[u8]) -> Vec<Entry> {
    let feed = match feed_rs::parser::parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            warn!("Feed could not be parsed, treating as empty: {}", e);
            return Vec::new();
        }
    };

    let raw_dates = match raw_dates(bytes) {
        Some(dates) if dates.len() == feed.entries.len() => Some(dates),
        Some(dates) => {
            debug!(
                "Raw date pass found {} items but feed has {} entries; using parsed dates",
                dates.len(),
                feed.entries.len()
            );
            None
        }
        None => None,
    };

    feed.entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let raw = raw_dates.as_ref().and_then(|dates| dates[i].clone());
            convert_entry(entry, raw)
        })
        .collect()
}

/// Compute the content fingerprint of an entry.
///
/// Hex-encoded SHA-256 over title, link and raw published string, each
/// terminated by a newline. A missing date hashes as the empty string.
pub fn fingerprint(title: &str, link: &str, raw_published: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [title, link, raw_published.unwrap_or("")] {
        hasher.update(part.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn convert_entry(entry: model::Entry, raw_published: Option<String>) -> Entry {
    let title = entry.title.map(|t| t.content).unwrap_or_default();
    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_default();
    let published = entry.published.or(entry.updated);

    // Fall back to the parsed timestamp when the raw string is unavailable.
    let raw_published = raw_published
        .filter(|s| !s.is_empty())
        .or_else(|| published.map(|dt| dt.to_rfc3339()));

    let content = entry
        .content
        .and_then(|c| c.body)
        .filter(|b| !b.trim().is_empty())
        .or_else(|| {
            entry
                .summary
                .map(|s| s.content)
                .filter(|s| !s.trim().is_empty())
        })
        .or_else(|| {
            entry
                .media
                .into_iter()
                .find_map(|m| m.description.map(|d| d.content))
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or_default();

    let author = entry
        .authors
        .first()
        .map(|a| a.name.clone())
        .filter(|n| !n.is_empty());

    let tags = entry
        .categories
        .into_iter()
        .map(|c| c.label.unwrap_or(c.term))
        .filter(|t| !t.is_empty())
        .collect();

    let fingerprint = fingerprint(&title, &link, raw_published.as_deref());

    Entry {
        title,
        link,
        content,
        author,
        published,
        raw_published,
        tags,
        fingerprint,
    }
}

/// Which date element is being read.
#[derive(Clone, Copy)]
enum DateField {
    /// RSS `pubDate`, Atom `published`.
    Primary,
    /// `dc:date`, Atom `updated`.
    Secondary,
}

/// Collect the raw date string of every item/entry, in document order.
///
/// Returns `None` if the document is not well-formed XML.
fn raw_dates(bytes: &[u8]) -> Option<Vec<Option<String>>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut dates = Vec::new();
    let mut depth_in_item = 0usize;
    let mut primary: Option<String> = None;
    let mut secondary: Option<String> = None;
    let mut capture: Option<DateField> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" if depth_in_item == 0 => {
                        depth_in_item = 1;
                        primary = None;
                        secondary = None;
                    }
                    _ if depth_in_item > 0 => {
                        depth_in_item += 1;
                        // Only direct children carry the entry's own dates.
                        if depth_in_item == 2 {
                            capture = match name.as_ref() {
                                b"pubDate" | b"published" => Some(DateField::Primary),
                                b"date" | b"updated" => Some(DateField::Secondary),
                                _ => None,
                            };
                            text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                if depth_in_item == 0 && matches!(e.local_name().as_ref(), b"item" | b"entry") {
                    dates.push(None);
                }
            }
            Ok(Event::Text(t)) if capture.is_some() => match t.unescape() {
                Ok(s) => text.push_str(&s),
                Err(_) => text.push_str(&String::from_utf8_lossy(&t)),
            },
            Ok(Event::CData(c)) if capture.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(_)) if depth_in_item > 0 => {
                if depth_in_item == 2 {
                    let value = text.trim().to_string();
                    match capture.take() {
                        Some(DateField::Primary) if primary.is_none() && !value.is_empty() => {
                            primary = Some(value)
                        }
                        Some(DateField::Secondary) if secondary.is_none() && !value.is_empty() => {
                            secondary = Some(value)
                        }
                        _ => {}
                    }
                }
                depth_in_item -= 1;
                if depth_in_item == 0 {
                    dates.push(primary.take().or_else(|| secondary.take()));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some(dates)
}
