//! Source spans.
//!
//! Spans are `rowan::TextRange` byte ranges, the same representation the
//! parser hands over. A [`SourceLocation`] pairs a span with the file it
//! belongs to, which is what downstream stages need once declarations from
//! several files are mixed in one program.

use std::fmt;

use serde::{Serialize, Serializer};

pub use rowan::{TextRange, TextSize};

/// A span qualified by the source file it points into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: String,
    #[serde(serialize_with = "serialize_range")]
    pub span: TextRange,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, span: TextRange) -> Self {
        SourceLocation { file: file.into(), span }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start: u32 = self.span.start().into();
        let end: u32 = self.span.end().into();
        write!(f, "{}@{}..{}", self.file, start, end)
    }
}

/// Build a range from raw byte offsets.
pub fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::from(start), TextSize::from(end))
}

fn serialize_range<S: Serializer>(range: &TextRange, serializer: S) -> Result<S::Ok, S::Error> {
    let start: u32 = range.start().into();
    let end: u32 = range.end().into();
    (start, end).serialize(serializer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display_includes_file_and_offsets() {
        let loc = SourceLocation::new("main.lm", range(4, 9));
        assert_eq!(loc.to_string(), "main.lm@4..9");
    }
}
