//! Help-text metadata embedded in command documentation.
//!
//! A command's doc blob is free text where any line whose trimmed form starts
//! with `#` is a role tag (`#STAFF`, `#OWNER`, ...). Everything else is the
//! human-readable description.

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedMetadata {
    /// Non-tag lines, in source order, each terminated by `\n`.
    pub description: String,
    /// Tag lines, trimmed, in source order.
    pub role_tags: Vec<String>,
}

impl ParsedMetadata {
    /// First non-blank description line, trimmed.
    pub fn summary(&self) -> &str {
        let trimmed = self.description.trim_matches(|c| c == '\n' || c == ' ');
        trimmed.lines().next().unwrap_or("")
    }

    /// First role tag without its `#` marker, e.g. `STAFF`.
    pub fn primary_role(&self) -> Option<&str> {
        self.role_tags
            .first()
            .map(|t| t.trim_matches(|c| c == '#' || c == ' '))
    }
}

/// Split a doc blob into description and role tags.
pub fn parse(blob: &str) -> ParsedMetadata {
    let mut out = ParsedMetadata::default();
    for line in blob.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            out.role_tags.push(trimmed.to_string());
        } else {
            out.description.push_str(line);
            out.description.push('\n');
        }
    }
    out
}

/// Alias kept for callers that know it by the help cog's name.
pub fn parse_help_str(blob: &str) -> ParsedMetadata {
    parse(blob)
}
