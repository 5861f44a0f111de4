//! Markdown markup service using pulldown-cmark.

use std::path::Path;

use docweave_core::frontmatter::{parse_metadata, split_frontmatter};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::{Heading, MarkupContext, MarkupResult, MarkupService, Result};

/// Prefix of cross-reference link targets.
const XREF_SCHEME: &str = "xref:";

/// Markdown renderer reporting links, xref dependencies and headings.
#[derive(Debug, Clone)]
pub struct MarkdownMarkup {
    options: Options,
}

impl Default for MarkdownMarkup {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupService for MarkdownMarkup {
    fn markup(&self, raw: &str, context: &MarkupContext, inline: bool) -> Result<MarkupResult> {
        let (yaml_header, body) = if !inline && split_frontmatter(raw).is_some() {
            let (metadata, body) = parse_metadata(raw, Path::new(&context.file_key))?;
            (Some(metadata), body)
        } else {
            (None, raw.to_string())
        };

        let mut result = self.render(&body, context);
        result.yaml_header = yaml_header;
        if inline {
            result.html = strip_paragraph(&result.html);
        }
        Ok(result)
    }
}

impl MarkdownMarkup {
    /// Create a new markdown renderer with default options.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }

    fn render(&self, content: &str, context: &MarkupContext) -> MarkupResult {
        let parser = Parser::new_ext(content, self.options);
        let mut result = MarkupResult::default();
        let mut html = String::new();
        // (level, text, offset where the id attribute goes, explicit id)
        let mut current_heading: Option<(u8, String, usize, Option<String>)> = None;
        let mut code_block: Option<(Option<String>, String)> = None;
        let mut image_alt: Option<String> = None;

        for event in parser {
            match event {
                Event::Start(Tag::Heading { level, id, .. }) => {
                    let lvl = level as u8;
                    html.push_str(&format!("<h{lvl}"));
                    current_heading = Some((lvl, String::new(), html.len(), id.map(|i| i.to_string())));
                    html.push('>');
                }

                Event::End(TagEnd::Heading(level)) => {
                    let lvl = level as u8;
                    if let Some((_, text, offset, explicit)) = current_heading.take() {
                        let id = explicit.unwrap_or_else(|| slugify(&text));
                        html.insert_str(offset, &format!(" id=\"{id}\""));
                        result.headings.push(Heading {
                            level: lvl,
                            text,
                            id,
                        });
                    }
                    html.push_str(&format!("</h{lvl}>\n"));
                }

                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                    code_block = Some((lang, String::new()));
                }

                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, code)) = code_block.take() {
                        let class = lang
                            .map(|l| format!(" class=\"lang-{}\"", html_escape(&l)))
                            .unwrap_or_default();
                        html.push_str(&format!(
                            "<pre><code{class}>{}</code></pre>\n",
                            html_escape(&code)
                        ));
                    }
                }

                Event::Start(Tag::Link {
                    dest_url, title, ..
                }) => {
                    self.record_target(&dest_url, context, &mut result);
                    let title_attr = if title.is_empty() {
                        String::new()
                    } else {
                        format!(" title=\"{}\"", html_escape(&title))
                    };
                    html.push_str(&format!("<a href=\"{}\"{title_attr}>", html_escape(&dest_url)));
                }

                Event::Start(Tag::Image { dest_url, .. }) => {
                    self.record_target(&dest_url, context, &mut result);
                    html.push_str(&format!("<img src=\"{}\"", html_escape(&dest_url)));
                    image_alt = Some(String::new());
                }

                Event::End(TagEnd::Image) => {
                    let alt = image_alt.take().unwrap_or_default();
                    html.push_str(&format!(" alt=\"{}\" />", html_escape(&alt)));
                }

                Event::Text(text) => {
                    if let Some((_, code)) = code_block.as_mut() {
                        code.push_str(&text);
                    } else if let Some(alt) = image_alt.as_mut() {
                        alt.push_str(&text);
                    } else {
                        if let Some((_, heading_text, _, _)) = current_heading.as_mut() {
                            heading_text.push_str(&text);
                        }
                        html.push_str(&html_escape(&text));
                    }
                }

                Event::Code(code) => {
                    if let Some((_, heading_text, _, _)) = current_heading.as_mut() {
                        heading_text.push_str(&code);
                    }
                    html.push_str(&format!("<code>{}</code>", html_escape(&code)));
                }

                Event::SoftBreak => html.push('\n'),

                Event::HardBreak => html.push_str("<br />\n"),

                Event::Start(tag) => html.push_str(&tag_to_html_start(&tag)),

                Event::End(tag) => html.push_str(&tag_to_html_end(&tag)),

                Event::Html(raw) | Event::InlineHtml(raw) => html.push_str(&raw),

                Event::FootnoteReference(name) => {
                    html.push_str(&format!(
                        "<sup class=\"footnote-ref\"><a href=\"#fn-{name}\">[{name}]</a></sup>"
                    ));
                }

                Event::Rule => html.push_str("<hr />\n"),

                Event::TaskListMarker(checked) => {
                    html.push_str(if checked {
                        "<input type=\"checkbox\" checked disabled />"
                    } else {
                        "<input type=\"checkbox\" disabled />"
                    });
                }

                Event::InlineMath(math) => {
                    html.push_str(&format!("<span class=\"math inline\">\\({math}\\)</span>"));
                }

                Event::DisplayMath(math) => {
                    html.push_str(&format!("<div class=\"math display\">\\[{math}\\]</div>"));
                }
            }
        }

        result.html = html;
        result
    }

    fn record_target(&self, dest: &str, context: &MarkupContext, result: &mut MarkupResult) {
        if let Some(uid) = dest.strip_prefix(XREF_SCHEME) {
            let uid = uid.split(['?', '#']).next().unwrap_or(uid);
            if !uid.is_empty() {
                result.xref_dependencies.insert(uid.to_string());
            }
            return;
        }

        if let Some(target) = local_target(dest, context.directory()) {
            result.link_targets.insert(target);
        }
    }
}

/// Resolve a link destination to a content-root relative path, if it points at a local file.
fn local_target(dest: &str, directory: &str) -> Option<String> {
    let path = dest.split(['?', '#']).next().unwrap_or("");
    if path.is_empty() || path.contains("://") || path.starts_with("mailto:") {
        return None;
    }

    let joined = if let Some(rooted) = path.strip_prefix('/').or_else(|| path.strip_prefix("~/")) {
        rooted.to_string()
    } else if directory.is_empty() {
        path.to_string()
    } else {
        format!("{directory}/{path}")
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                // Escaping the content root is not a local target.
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Remove the paragraph wrapping a single-paragraph fragment.
fn strip_paragraph(html: &str) -> String {
    let trimmed = html.trim_end();
    match trimmed
        .strip_prefix("<p>")
        .and_then(|inner| inner.strip_suffix("</p>"))
    {
        Some(inner) if !inner.contains("<p>") => inner.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Convert a pulldown-cmark tag to HTML opening tag.
fn tag_to_html_start(tag: &Tag) -> String {
    match tag {
        Tag::Paragraph => "<p>".to_string(),
        Tag::BlockQuote(_) => "<blockquote>".to_string(),
        Tag::List(Some(start)) => format!("<ol start=\"{start}\">"),
        Tag::List(None) => "<ul>".to_string(),
        Tag::Item => "<li>".to_string(),
        Tag::FootnoteDefinition(name) => {
            format!("<div class=\"footnote\" id=\"fn-{name}\">")
        }
        Tag::Table(_) => "<table>".to_string(),
        Tag::TableHead => "<thead><tr>".to_string(),
        Tag::TableRow => "<tr>".to_string(),
        Tag::TableCell => "<td>".to_string(),
        Tag::Emphasis => "<em>".to_string(),
        Tag::Strong => "<strong>".to_string(),
        Tag::Strikethrough => "<del>".to_string(),
        Tag::DefinitionList => "<dl>".to_string(),
        Tag::DefinitionListTitle => "<dt>".to_string(),
        Tag::DefinitionListDefinition => "<dd>".to_string(),
        Tag::Superscript => "<sup>".to_string(),
        Tag::Subscript => "<sub>".to_string(),
        // Headings, code blocks, links and images are handled by the render loop.
        Tag::Heading { .. }
        | Tag::CodeBlock(_)
        | Tag::Link { .. }
        | Tag::Image { .. }
        | Tag::HtmlBlock
        | Tag::MetadataBlock(_) => String::new(),
    }
}

/// Convert a pulldown-cmark tag end to HTML closing tag.
fn tag_to_html_end(tag: &TagEnd) -> String {
    match tag {
        TagEnd::Paragraph => "</p>\n".to_string(),
        TagEnd::BlockQuote(_) => "</blockquote>\n".to_string(),
        TagEnd::List(true) => "</ol>\n".to_string(),
        TagEnd::List(false) => "</ul>\n".to_string(),
        TagEnd::Item => "</li>\n".to_string(),
        TagEnd::FootnoteDefinition => "</div>\n".to_string(),
        TagEnd::Table => "</table>\n".to_string(),
        TagEnd::TableHead => "</tr></thead>\n".to_string(),
        TagEnd::TableRow => "</tr>\n".to_string(),
        TagEnd::TableCell => "</td>".to_string(),
        TagEnd::Emphasis => "</em>".to_string(),
        TagEnd::Strong => "</strong>".to_string(),
        TagEnd::Strikethrough => "</del>".to_string(),
        TagEnd::Link => "</a>".to_string(),
        TagEnd::DefinitionList => "</dl>\n".to_string(),
        TagEnd::DefinitionListTitle => "</dt>\n".to_string(),
        TagEnd::DefinitionListDefinition => "</dd>\n".to_string(),
        TagEnd::Superscript => "</sup>".to_string(),
        TagEnd::Subscript => "</sub>".to_string(),
        TagEnd::Heading(_)
        | TagEnd::CodeBlock
        | TagEnd::Image
        | TagEnd::HtmlBlock
        | TagEnd::MetadataBlock(_) => String::new(),
    }
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert text to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(raw: &str, inline: bool) -> MarkupResult {
        MarkdownMarkup::new()
            .markup(raw, &MarkupContext::new("articles/guide/intro.md"), inline)
            .unwrap()
    }

    #[test]
    fn test_render_with_header() {
        let result = render(
            r#"---
uid: intro
title: Introduction
---

# Getting Started

This is a test."#,
            false,
        );

        let header = result.yaml_header.expect("header");
        assert_eq!(header["uid"].as_str(), Some("intro"));
        assert!(result.html.contains("<h1 id=\"getting-started\">Getting Started</h1>"));
        assert!(result.html.contains("<p>This is a test.</p>"));
        assert_eq!(result.headings[0].text, "Getting Started");
    }

    #[test]
    fn test_link_targets_resolved_against_directory() {
        let result = render(
            "[next](next.md) [up](../overview.md#top) [root](/index.md) [web](https://example.com) [anchor](#local) ![diagram](images/flow.png)",
            false,
        );

        let targets: Vec<_> = result.link_targets.iter().map(String::as_str).collect();
        assert_eq!(
            targets,
            vec![
                "articles/guide/images/flow.png",
                "articles/guide/next.md",
                "articles/overview.md",
                "index.md",
            ]
        );
        assert!(result.html.contains("alt=\"diagram\""));
    }

    #[test]
    fn test_xref_dependencies() {
        let result = render(
            "See [Widget](xref:Contoso.Widget) and <xref:Contoso.Widget.Spin*?displayProperty=name>.",
            false,
        );

        let deps: Vec<_> = result.xref_dependencies.iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["Contoso.Widget", "Contoso.Widget.Spin*"]);
        assert!(result.link_targets.is_empty());
    }

    #[test]
    fn test_inline_strips_paragraph() {
        let result = render("Spins the **widget**.", true);
        assert_eq!(result.html, "Spins the <strong>widget</strong>.");
        assert!(result.yaml_header.is_none());
    }

    #[test]
    fn test_inline_keeps_multiple_paragraphs() {
        let result = render("One.\n\nTwo.", true);
        assert!(result.html.starts_with("<p>One.</p>"));
    }

    #[test]
    fn test_code_block() {
        let result = render("```rust\nfn main() {}\n```", false);
        assert!(result.html.contains("<pre><code class=\"lang-rust\">fn main() {}\n</code></pre>"));
    }

    #[test]
    fn test_explicit_heading_id() {
        let result = render("## Setup {#install}", false);
        assert!(result.html.contains("<h2 id=\"install\">Setup</h2>"));
    }

    #[test]
    fn test_escaping_root_is_not_local() {
        assert_eq!(local_target("../../../x.md", "a"), None);
        assert_eq!(local_target("./b.md", "a"), Some("a/b.md".to_string()));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Special!@#Chars"), "specialchars");
    }
}
