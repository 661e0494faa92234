//! Round-trips ToDaDot-only event fields through the free-text description
//! of an external calendar event.
//!
//! The block is `TODADOT_METADATA:{json}:END_METADATA`, appended after the
//! user-visible text. The markers are a wire convention shared with existing
//! calendars and must stay byte-exact.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const METADATA_PREFIX: &str = "TODADOT_METADATA:";
pub const METADATA_SUFFIX: &str = ":END_METADATA";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.category_id.is_none()
    }
}

struct Block {
    range: Range<usize>,
    metadata: Option<EventMetadata>,
}

/// Every marker block in `description`, in order. A block whose JSON does not
/// parse still spans prefix through suffix so it can be stripped; a prefix
/// with no closing suffix is plain text.
fn scan_blocks(description: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while let Some(found) = description[cursor..].find(METADATA_PREFIX) {
        let start = cursor + found;
        let body_start = start + METADATA_PREFIX.len();
        let body = &description[body_start..];

        let mut stream = serde_json::Deserializer::from_str(body).into_iter::<EventMetadata>();
        if let Some(Ok(metadata)) = stream.next() {
            let json_end = body_start + stream.byte_offset();
            if description[json_end..].starts_with(METADATA_SUFFIX) {
                let end = json_end + METADATA_SUFFIX.len();
                blocks.push(Block { range: start..end, metadata: Some(metadata) });
                cursor = end;
                continue;
            }
        }

        match body.find(METADATA_SUFFIX) {
            Some(offset) => {
                let end = body_start + offset + METADATA_SUFFIX.len();
                blocks.push(Block { range: start..end, metadata: None });
                cursor = end;
            }
            None => break,
        }
    }

    blocks
}

/// First well-formed block, if any.
pub fn extract_metadata(description: &str) -> Option<EventMetadata> {
    scan_blocks(description)
        .into_iter()
        .find_map(|block| block.metadata)
}

/// Description with every marker block removed and surrounding whitespace
/// trimmed.
pub fn remove_metadata_from_description(description: &str) -> String {
    let mut visible = String::with_capacity(description.len());
    let mut cursor = 0usize;
    for block in scan_blocks(description) {
        visible.push_str(&description[cursor..block.range.start]);
        cursor = block.range.end;
    }
    visible.push_str(&description[cursor..]);
    visible.trim().to_string()
}

/// Replace any existing block with one carrying `metadata`.
pub fn add_metadata_to_description(
    description: &str,
    metadata: &EventMetadata,
) -> Result<String, CoreError> {
    let visible = remove_metadata_from_description(description);
    let json = serde_json::to_string(metadata)?;
    let block = format!("{METADATA_PREFIX}{json}{METADATA_SUFFIX}");
    if visible.is_empty() {
        Ok(block)
    } else {
        Ok(format!("{visible}\n\n{block}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(color: Option<&str>, category: Option<&str>) -> EventMetadata {
        EventMetadata {
            color: color.map(str::to_string),
            category_id: category.map(str::to_string),
        }
    }

    #[test]
    fn exact_wire_format() {
        let out = add_metadata_to_description("Dentist", &meta(Some("#ff0000"), Some("health"))).unwrap();
        assert_eq!(
            out,
            "Dentist\n\nTODADOT_METADATA:{\"color\":\"#ff0000\",\"categoryId\":\"health\"}:END_METADATA"
        );
    }

    #[test]
    fn roundtrip_extract_and_remove() {
        let cases = [
            ("", meta(None, None)),
            ("plain note", meta(Some("#123456"), None)),
            ("multi\nline\n\nnote", meta(None, Some("c1"))),
            ("quotes \" and braces {}", meta(Some("weird :END_METADATA value"), Some("TODADOT_METADATA:"))),
        ];
        for (original, m) in cases {
            let description = add_metadata_to_description(original, &m).unwrap();
            assert_eq!(extract_metadata(&description), Some(m.clone()), "extract {description:?}");
            assert_eq!(remove_metadata_from_description(&description), original.trim());
        }
    }

    #[test]
    fn re_adding_replaces_existing_block() {
        let first = add_metadata_to_description("note", &meta(Some("#111111"), None)).unwrap();
        let second = add_metadata_to_description(&first, &meta(Some("#222222"), None)).unwrap();
        assert_eq!(second.matches(METADATA_PREFIX).count(), 1);
        assert_eq!(extract_metadata(&second), Some(meta(Some("#222222"), None)));
        assert_eq!(remove_metadata_from_description(&second), "note");
    }

    #[test]
    fn externally_edited_text_around_block_is_preserved() {
        let base = add_metadata_to_description("agenda", &meta(Some("#abcdef"), None)).unwrap();
        let edited = format!("Moved to room 4.\n{base}\nBring slides.");
        assert_eq!(extract_metadata(&edited), Some(meta(Some("#abcdef"), None)));
        assert_eq!(
            remove_metadata_from_description(&edited),
            "Moved to room 4.\nagenda\n\n\nBring slides."
        );
    }

    #[test]
    fn malformed_block_is_stripped_but_not_extracted() {
        let description = "hello TODADOT_METADATA:{not json}:END_METADATA";
        assert_eq!(extract_metadata(description), None);
        assert_eq!(remove_metadata_from_description(description), "hello");
    }

    #[test]
    fn unterminated_prefix_is_plain_text() {
        let description = "see TODADOT_METADATA: for details";
        assert_eq!(extract_metadata(description), None);
        assert_eq!(remove_metadata_from_description(description), description);
    }

    #[test]
    fn unknown_fields_in_block_are_ignored() {
        let description = "TODADOT_METADATA:{\"color\":\"#000\",\"future\":1}:END_METADATA";
        assert_eq!(extract_metadata(description), Some(meta(Some("#000"), None)));
    }
}
