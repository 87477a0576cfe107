//! Placeholder scanning

use std::ops::Range;

/// A `{{name}}` placeholder found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRef {
    /// Trimmed name between the braces.
    pub name: String,
    /// Byte span of the full placeholder, braces included.
    pub span: Range<usize>,
}

/// Scans `template` for `{{name}}` placeholders, left to right.
///
/// Unterminated openers are left as literal text. Names are trimmed of
/// surrounding whitespace, so `{{ host }}` and `{{host}}` are equivalent.
#[must_use]
pub fn find_placeholders(template: &str) -> Vec<PlaceholderRef> {
    let mut refs = Vec::new();
    let mut cursor = 0;

    while let Some(open) = template[cursor..].find("{{") {
        let start = cursor + open;
        let Some(close) = template[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close + 2;
        let name = template[start + 2..end - 2].trim();
        if !name.is_empty() {
            refs.push(PlaceholderRef {
                name: name.to_string(),
                span: start..end,
            });
        }
        cursor = end;
    }

    refs
}
