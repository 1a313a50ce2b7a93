//! Turns sanitized article markup into styled terminal text.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

use crate::sanitize::decode_entities;

const BLOCK_TAGS: &[&str] = &[
    "blockquote", "dd", "div", "dl", "dt", "h1", "h2", "h3", "h4", "h5", "h6", "ol", "p", "pre",
    "table", "tr", "ul",
];

enum ListKind {
    Bullet,
    Ordered(u64),
}

#[derive(Default)]
struct MarkupWriter {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<ListKind>,
    links: Vec<Option<String>>,
    quote_depth: usize,
    preformatted: usize,
    pending_space: bool,
}

impl MarkupWriter {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, patch: Style) {
        self.styles.push(self.style().patch(patch));
    }

    fn pop_style(&mut self) {
        self.styles.pop();
    }

    fn prefix(&self) -> Option<Span<'static>> {
        (self.quote_depth > 0).then(|| {
            Span::styled("│ ".repeat(self.quote_depth), Style::default().fg(Color::DarkGray))
        })
    }

    fn at_line_start(&self) -> bool {
        self.current.iter().all(|s| s.content.trim().is_empty())
    }

    fn text(&mut self, raw: &str) {
        let text = decode_entities(raw);
        if self.preformatted > 0 {
            let mut parts = text.split('\n').peekable();
            while let Some(part) = parts.next() {
                self.push_span(part.to_string());
                if parts.peek().is_some() {
                    self.break_line();
                }
            }
            return;
        }
        for (idx, word) in text.split_whitespace().enumerate() {
            let leading = idx > 0 || (text.starts_with(char::is_whitespace) || self.pending_space);
            if leading && !self.at_line_start() {
                self.push_span(" ".to_string());
            }
            self.push_span(word.to_string());
            self.pending_space = false;
        }
        if text.ends_with(char::is_whitespace) {
            self.pending_space = true;
        }
    }

    fn push_span(&mut self, content: String) {
        if self.current.is_empty()
            && let Some(prefix) = self.prefix()
        {
            self.current.push(prefix);
        }
        let style = self.style();
        self.current.push(Span::styled(content, style));
    }

    fn break_line(&mut self) {
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
        self.pending_space = false;
    }

    fn end_block(&mut self) {
        if !self.current.is_empty() {
            self.break_line();
        }
    }

    fn blank_line(&mut self) {
        self.end_block();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn open(&mut self, name: &str, attributes: &str) {
        if BLOCK_TAGS.contains(&name) && self.lists.is_empty() {
            self.blank_line();
        } else if BLOCK_TAGS.contains(&name) {
            self.end_block();
        }
        match name {
            "b" | "strong" => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            "i" | "em" | "cite" | "q" => {
                self.push_style(Style::default().add_modifier(Modifier::ITALIC))
            }
            "u" | "ins" => self.push_style(Style::default().add_modifier(Modifier::UNDERLINED)),
            "s" | "strike" | "del" => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            "mark" => self.push_style(Style::default().add_modifier(Modifier::REVERSED)),
            "code" => self.push_style(Style::default().fg(Color::Cyan)),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.push_style(
                Style::default()
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::UNDERLINED),
            ),
            "a" => {
                self.push_style(
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.links.push(attribute(attributes, "href"));
            }
            "pre" => self.preformatted += 1,
            "blockquote" => self.quote_depth += 1,
            "ul" => self.lists.push(ListKind::Bullet),
            "ol" => {
                let start = attribute(attributes, "start")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1);
                self.lists.push(ListKind::Ordered(start));
            }
            "li" => {
                self.end_block();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.push_span(marker);
            }
            "br" => self.break_line(),
            "hr" => {
                self.end_block();
                self.lines.push(Line::styled(
                    "─".repeat(20),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            "td" | "th" => {
                if !self.at_line_start() {
                    self.push_span(" │ ".to_string());
                }
                if name == "th" {
                    self.push_style(Style::default().add_modifier(Modifier::BOLD));
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &str) {
        match name {
            "b" | "strong" | "i" | "em" | "cite" | "q" | "u" | "ins" | "s" | "strike" | "del"
            | "mark" | "code" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" => self.pop_style(),
            "a" => {
                self.pop_style();
                if let Some(Some(href)) = self.links.pop() {
                    self.push_span(format!(" ({href})"));
                }
            }
            "pre" => self.preformatted = self.preformatted.saturating_sub(1),
            "blockquote" => {
                self.end_block();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            "ul" | "ol" => {
                self.lists.pop();
            }
            "li" => self.end_block(),
            _ => {}
        }
        if BLOCK_TAGS.contains(&name) {
            self.end_block();
        }
    }

    fn finish(mut self) -> Text<'static> {
        self.end_block();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

fn attribute(attributes: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=\"");
    let start = attributes.find(&needle)? + needle.len();
    let end = attributes[start..].find('"')? + start;
    Some(decode_entities(&attributes[start..end]))
}

/// Render markup produced by `sanitize::sanitize`. Anything that is not a
/// well formed tag is shown as text.
pub fn to_text(markup: &str) -> Text<'static> {
    let mut writer = MarkupWriter::default();
    let mut rest = markup;
    while let Some(open) = rest.find('<') {
        writer.text(&rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            rest = &rest[open..];
            break;
        };
        let tag = &rest[open + 1..open + close];
        if let Some(name) = tag.strip_prefix('/') {
            writer.close(name.trim());
        } else {
            let (name, attributes) = tag.split_once(' ').unwrap_or((tag, ""));
            writer.open(name, attributes);
        }
        rest = &rest[open + close + 1..];
    }
    writer.text(rest);
    writer.finish()
}

/// The text a reader sees for `markup`, one line per rendered line.
pub fn plain_text(markup: &str) -> String {
    to_text(markup)
        .lines
        .iter()
        .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text) -> Vec<String> {
        text.lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let text = to_text("<p>First   one</p><p>Second</p>");
        assert_eq!(plain(&text), vec!["First one", "", "Second"]);
    }

    #[test]
    fn emphasis_is_styled() {
        let text = to_text("<p>a <strong>bold</strong> and <em>it</em></p>");
        let spans = &text.lines[0].spans;
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let it = spans.iter().find(|s| s.content == "it").unwrap();
        assert!(it.style.add_modifier.contains(Modifier::ITALIC));
        assert_eq!(plain(&text), vec!["a bold and it"]);
    }

    #[test]
    fn lists_get_markers() {
        let text = to_text("<ul><li>one</li><li>two</li></ul><ol start=\"3\"><li>three</li></ol>");
        assert_eq!(plain(&text), vec!["• one", "• two", "", "3. three"]);
    }

    #[test]
    fn links_show_their_target() {
        let text = to_text("<p>see <a href=\"https://example.com/?a=1&amp;b=2\">here</a></p>");
        assert_eq!(plain(&text), vec!["see here (https://example.com/?a=1&b=2)"]);
    }

    #[test]
    fn entities_and_breaks() {
        let text = to_text("Tom &amp; Jerry<br>&lt;3");
        assert_eq!(plain(&text), vec!["Tom & Jerry", "<3"]);
    }

    #[test]
    fn plain_text_drops_tags() {
        assert_eq!(
            plain_text("<p>a <strong>b</strong></p><ul><li>c</li></ul>"),
            "a b\n\n• c"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(plain(&to_text("No Content")), vec!["No Content"]);
        assert!(to_text("").lines.is_empty());
    }
}
