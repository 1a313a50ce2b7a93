//! Detail view for a single article.
//!
//! The overlay is either hidden or showing one record. Title and byline are
//! kept as plain text; only the article body is markup, and it is stored in
//! sanitized form. The overlay handles its own close control.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Flex, Layout, Position, Rect};
use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use tracing::{debug, trace, warn};

use crate::markup;
use crate::record::NewsItem;
use crate::sanitize::sanitize;

pub const CLOSE_LABEL: &str = "[ ✕ Close ]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayState {
    #[default]
    Hidden,
    Visible,
}

/// Screen regions of the overlay for a given frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayLayout {
    pub panel: Rect,
    pub body: Rect,
    pub close: Rect,
}

impl OverlayLayout {
    pub fn new(area: Rect) -> Self {
        let [panel] = Layout::horizontal([Constraint::Percentage(80)])
            .flex(Flex::Center)
            .areas(area);
        let [panel] = Layout::vertical([Constraint::Percentage(80)])
            .flex(Flex::Center)
            .areas(panel);
        let inner = panel.inner(ratatui::layout::Margin::new(1, 1));
        let [body, footer] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(inner);
        let [close] = Layout::horizontal([Constraint::Length(CLOSE_LABEL.chars().count() as u16)])
            .flex(Flex::End)
            .areas(footer);
        Self { panel, body, close }
    }
}

#[derive(Debug, Default)]
pub struct DetailOverlay {
    state: OverlayState,
    title: String,
    byline: String,
    content: String,
    scroll: u16,
}

impl DetailOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state() == OverlayState::Visible
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn byline(&self) -> &str {
        &self.byline
    }

    /// Sanitized article markup.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn show(&mut self, item: &NewsItem) {
        self.title = item.title.clone();
        self.byline = item.byline();
        self.content = match sanitize(&item.all_content) {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Not showing content of {:?}: {}", item.title, e);
                String::new()
            }
        };
        self.scroll = 0;
        self.state = OverlayState::Visible;
        debug!("Showing article {:?}", self.title);
    }

    /// Hide the overlay. The content stays until the next `show`.
    pub fn close(&mut self) {
        if self.is_visible() {
            trace!("Closing article {:?}", self.title);
        }
        self.state = OverlayState::Hidden;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Byline, a blank line and the rendered article body. Title and byline
    /// are inserted as raw text, never parsed.
    pub fn body_text(&self) -> Text<'static> {
        let mut text = Text::from(Line::from(
            Span::raw(self.byline.clone()).style(Style::default().fg(Color::DarkGray).italic()),
        ));
        text.push_line(Line::default());
        text.extend(markup::to_text(&self.content));
        text
    }

    /// Keep the last line of the body reachable but never scroll past it.
    pub fn clamp_scroll(&mut self, body: Rect) {
        let height = wrapped_height(&self.body_text(), body.width);
        let max = height.saturating_sub(body.height);
        if self.scroll > max {
            trace!("Clamping article scroll {} to {}", self.scroll, max);
            self.scroll = max;
        }
    }

    /// Keys addressed to the overlay while it is visible. Returns true when
    /// the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if !self.is_visible() {
            return false;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.close(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll_down(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_up(1),
            KeyCode::PageDown => self.scroll_down(10),
            KeyCode::PageUp => self.scroll_up(10),
            KeyCode::Home => self.scroll = 0,
            _ => return false,
        }
        true
    }

    /// Mouse click at `column`/`row` in a frame of size `area`.
    pub fn handle_click(&mut self, area: Rect, column: u16, row: u16) -> bool {
        if !self.is_visible() {
            return false;
        }
        if OverlayLayout::new(area).close.contains(Position::new(column, row)) {
            self.close();
        }
        // Clicks never fall through to the table below
        true
    }
}

/// Rows `text` occupies when word wrapped to `width` columns.
fn wrapped_height(text: &Text, width: u16) -> u16 {
    let width = width as usize;
    let mut rows: usize = 0;
    for line in text.lines.iter() {
        if width == 0 {
            rows += 1;
            continue;
        }
        let plain: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        let mut line_rows = 1;
        let mut current = 0;
        for word in plain.split_whitespace() {
            let word_width = Span::raw(word).width();
            if current == 0 {
                current = word_width;
            } else if current + 1 + word_width <= width {
                current += 1 + word_width;
            } else {
                line_rows += 1;
                current = word_width;
            }
            while current > width {
                line_rows += 1;
                current -= width;
            }
        }
        rows += line_rows;
    }
    rows.min(u16::MAX as usize) as u16
}
