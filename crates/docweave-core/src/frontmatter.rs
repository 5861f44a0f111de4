//! YAML/TOML header parsing for markdown sources.

use std::path::Path;

use crate::{
    content::Metadata,
    error::{CoreError, Result},
};

/// Delimiter types for frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontmatterFormat {
    /// YAML frontmatter delimited by `---`.
    Yaml,
    /// TOML frontmatter delimited by `+++`.
    Toml,
}

impl FrontmatterFormat {
    /// Get the delimiter string for this format.
    pub fn delimiter(&self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }
}

/// Split content into frontmatter and body.
pub fn split_frontmatter(content: &str) -> Option<(FrontmatterFormat, &str, &str)> {
    let content = content.trim_start();

    let format = if content.starts_with("---") {
        FrontmatterFormat::Yaml
    } else if content.starts_with("+++") {
        FrontmatterFormat::Toml
    } else {
        return None;
    };

    let delimiter = format.delimiter();

    let after_first = &content[delimiter.len()..];
    let closing_pos = find_delimiter_line(after_first, delimiter)?;

    let frontmatter = after_first[..closing_pos].trim();
    let body = after_first[closing_pos + delimiter.len()..].trim_start();

    Some((format, frontmatter, body))
}

/// Offset of the next line that consists solely of `delimiter`.
fn find_delimiter_line(text: &str, delimiter: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == delimiter && offset > 0 {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Parse a header into a metadata map; the body is returned unchanged.
pub fn parse_metadata(content: &str, path: &Path) -> Result<(Metadata, String)> {
    let Some((format, header, body)) = split_frontmatter(content) else {
        return Ok((Metadata::new(), content.to_string()));
    };

    let metadata = parse_header(format, header, path)?;
    Ok((metadata, body.to_string()))
}

fn parse_header(format: FrontmatterFormat, header: &str, path: &Path) -> Result<Metadata> {
    if header.is_empty() {
        return Ok(Metadata::new());
    }

    match format {
        FrontmatterFormat::Yaml => {
            serde_yaml::from_str(header).map_err(|e| CoreError::frontmatter(path, e.to_string()))
        }
        FrontmatterFormat::Toml => {
            toml::from_str(header).map_err(|e| CoreError::frontmatter(path, e.to_string()))
        }
    }
}

/// Split a document made of repeated `---` header + body sections.
///
/// Text before the first header is ignored. Used by overwrite documents,
/// where every section patches one uid.
pub fn split_sections(content: &str, path: &Path) -> Result<Vec<(Metadata, String)>> {
    let mut sections = Vec::new();
    let mut rest = content;

    while let Some(start) = find_section_start(rest) {
        let Some((format, header, body)) = split_frontmatter(&rest[start..]) else {
            return Err(CoreError::frontmatter(path, "unterminated YAML header"));
        };
        let metadata = parse_header(format, header, path)?;

        let end = find_section_start(body).unwrap_or(body.len());
        sections.push((metadata, body[..end].trim().to_string()));
        rest = &body[end..];
    }

    Ok(sections)
}

/// Offset of the next line that opens a YAML header (`---` followed by a `key:` line).
fn find_section_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut lines = text.split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        if line.trim_end() == "---"
            && lines
                .peek()
                .is_some_and(|next| next.contains(':') && !next.trim().is_empty())
        {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yaml_frontmatter() {
        let content = r#"---
title: "Getting Started"
uid: getting-started
---

This is the body content."#;

        let (format, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(format, FrontmatterFormat::Yaml);
        assert!(fm.contains("title:"));
        assert!(body.starts_with("This is the body"));
    }

    #[test]
    fn test_split_toml_frontmatter() {
        let content = r#"+++
title = "Getting Started"
+++

This is the body content."#;

        let (format, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(format, FrontmatterFormat::Toml);
        assert!(fm.contains("title ="));
        assert!(body.starts_with("This is the body"));
    }

    #[test]
    fn test_no_frontmatter() {
        assert!(split_frontmatter("Just some content without frontmatter.").is_none());
    }

    #[test]
    fn test_horizontal_rule_in_body_is_not_a_delimiter() {
        let content = "---\ntitle: A\n---\nintro\n\n---\n\noutro";
        let (_, fm, body) = split_frontmatter(content).expect("split");
        assert_eq!(fm, "title: A");
        assert!(body.contains("outro"));
    }

    #[test]
    fn test_parse_metadata() {
        let content = r#"---
title: "Getting Started"
uid: getting-started
tags: [intro]
---

Body"#;

        let (metadata, body) = parse_metadata(content, Path::new("intro.md")).expect("parse");
        assert_eq!(metadata["uid"], serde_json::json!("getting-started"));
        assert_eq!(metadata["tags"], serde_json::json!(["intro"]));
        assert_eq!(body, "Body");
    }

    #[test]
    fn test_parse_metadata_invalid_yaml() {
        let content = "---\ntitle: [unclosed\n---\nBody";
        let err = parse_metadata(content, Path::new("bad.md")).unwrap_err();
        assert!(err.to_string().contains("Frontmatter error in bad.md"));
    }

    #[test]
    fn test_split_sections() {
        let content = r#"---
uid: Contoso.Widget
summary: Replaced summary.
---

Widget conceptual text.

---
uid: Contoso.Widget.Spin*
---
Spin text.
"#;

        let sections = split_sections(content, Path::new("widget.overwrite.md")).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0["uid"], serde_json::json!("Contoso.Widget"));
        assert_eq!(sections[0].1, "Widget conceptual text.");
        assert_eq!(sections[1].0["uid"], serde_json::json!("Contoso.Widget.Spin*"));
        assert_eq!(sections[1].1, "Spin text.");
    }

    #[test]
    fn test_split_sections_empty() {
        assert!(split_sections("no headers", Path::new("x.md")).unwrap().is_empty());
    }
}
