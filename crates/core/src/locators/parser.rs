use crate::error::{HarvestError, Result};
use crate::locators::roles::{LocatorSet, parse_directive};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Locator file parser
///
/// A locator file has one `role: selector` directive per line. Repeating a
/// role adds a fallback expression. `version: N` sets the table version and
/// `clear: role` drops every expression inherited for that role.
#[derive(Debug)]
pub struct LocatorParser;

impl LocatorParser {
    /// Parse a single locator file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<LocatorSet> {
        let file = std::fs::File::open(&path).map_err(|e| {
            HarvestError::LocatorError(format!("Cannot open file {}: {}", path.as_ref().display(), e))
        })?;

        let reader = BufReader::new(file);
        Self::parse_reader(reader)
    }

    /// Parse locators from a reader
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<LocatorSet> {
        let mut lines = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| HarvestError::LocatorError(format!("Read error at line {}: {}", index + 1, e)))?;
            lines.push(line);
        }
        Self::parse_lines(lines.iter().map(String::as_str))
    }

    /// Parse locators from a string
    pub fn parse_string(content: &str) -> Result<LocatorSet> {
        Self::parse_lines(content.lines())
    }

    fn parse_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Result<LocatorSet> {
        let mut set = LocatorSet::new();

        for (index, line) in lines.enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let directive = parse_directive(line)
                .map_err(|e| HarvestError::LocatorError(format!("Parse error at line {}: {}", index + 1, e)))?;
            set.add_directive(directive);
        }

        set.validate()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locators::Role;
    use std::io::Cursor;

    #[test]
    fn test_parse_string_basic() {
        let content = r#"
# Forum layout
version: 2
post_container: article.post
post_text: div.body
post_text: p
comment: li.comment
"#;

        let set = LocatorParser::parse_string(content).unwrap();

        assert_eq!(set.version, 2);
        assert_eq!(set.selectors(Role::PostContainer), &["article.post".to_string()]);
        assert_eq!(set.selectors(Role::PostText), &["div.body".to_string(), "p".to_string()]);
        assert_eq!(set.selectors(Role::Comment), &["li.comment".to_string()]);
        assert!(!set.has(Role::Reply));
    }

    #[test]
    fn test_parse_reader() {
        let cursor = Cursor::new("post_container: article\nreply: li.reply\n");
        let set = LocatorParser::parse_reader(cursor).unwrap();

        assert!(set.has(Role::PostContainer));
        assert!(set.has(Role::Reply));
    }

    #[test]
    fn test_parse_invalid_directive_reports_line() {
        let content = "post_container: article\nwithout_colon";

        let err = LocatorParser::parse_string(content).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_invalid_selector() {
        let result = LocatorParser::parse_string("comment: [[broken");
        assert!(matches!(result, Err(HarvestError::InvalidSelector { .. })));
    }

    #[test]
    fn test_parse_file_missing() {
        let result = LocatorParser::parse_file("/nonexistent/locators.txt");
        assert!(matches!(result, Err(HarvestError::LocatorError(_))));
    }
}
