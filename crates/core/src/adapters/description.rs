//! The properties block kept at the end of a tracking bug's description.
//!
//! ```text
//! free text written by humans
//!
//! -- swm properties --
//! { "phase": "Testing", ... }
//! ```

use thiserror::Error;

use crate::bug::BugProperties;

pub const PROPERTIES_MARKER: &str = "-- swm properties --";

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("invalid properties block: {0}")]
    Json(#[from] serde_json::Error),
}

/// Split a description into the human-written part and the raw properties
/// block, if there is one.
pub fn split_description(description: &str) -> (&str, Option<&str>) {
    match description.find(PROPERTIES_MARKER) {
        Some(at) => {
            let text = description[..at].trim_end();
            let block = description[at + PROPERTIES_MARKER.len()..].trim();
            (text, Some(block))
        }
        None => (description.trim_end(), None),
    }
}

/// Properties stored in a description. A description without a block (or
/// with an empty one) yields the defaults.
pub fn parse_properties(description: &str) -> Result<BugProperties, DescriptionError> {
    match split_description(description) {
        (_, Some(block)) if !block.is_empty() => Ok(serde_json::from_str(block)?),
        _ => Ok(BugProperties::default()),
    }
}

/// Replace the properties block of `description`, keeping the human text.
pub fn render_description(
    description: &str,
    properties: &BugProperties,
) -> Result<String, DescriptionError> {
    let (text, _) = split_description(description);
    let block = serde_json::to_string_pretty(properties)?;
    if text.is_empty() {
        Ok(format!("{}\n{}\n", PROPERTIES_MARKER, block))
    } else {
        Ok(format!("{}\n\n{}\n{}\n", text, PROPERTIES_MARKER, block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_block_gives_defaults() {
        let props = parse_properties("Just a kernel.\n").unwrap();
        assert_eq!(props, BugProperties::default());
    }

    #[test]
    fn test_render_keeps_human_text_and_unknown_keys() {
        let description = "This bug tracks linux noble.\n\n-- swm properties --\n{\"phase\": \"Packaging\", \"kernel-stable-master-bug\": 900}\n";

        let mut props = parse_properties(description).unwrap();
        assert_eq!(props.phase.as_deref(), Some("Packaging"));
        props.phase = Some("Testing".to_string());

        let rendered = render_description(description, &props).unwrap();
        assert!(rendered.starts_with("This bug tracks linux noble.\n\n-- swm properties --\n"));
        assert_eq!(rendered.matches(PROPERTIES_MARKER).count(), 1);

        let reparsed = parse_properties(&rendered).unwrap();
        assert_eq!(reparsed.phase.as_deref(), Some("Testing"));
        assert_eq!(
            reparsed.extra.get("kernel-stable-master-bug"),
            Some(&serde_json::json!(900))
        );
    }

    #[test]
    fn test_corrupt_block_is_an_error() {
        let result = parse_properties("text\n-- swm properties --\n{not json");
        assert!(matches!(result, Err(DescriptionError::Json(_))));
    }
}
