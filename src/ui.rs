use std::time::Duration;

use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Widget, Wrap},
};

use crate::model::{Model, UILayout, column_constraints};
use crate::overlay::{CLOSE_LABEL, DetailOverlay, OverlayLayout};
use crate::table::TableWidget;

pub const STATUSLINE_HEIGHT: u16 = 1;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const TABLE_BORDER: u16 = 1;
pub const MIN_TABLE_HEIGHT: u16 = 4;
const STATUS_MESSAGE_HIGHLIGHT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct TableUI {}

struct TableView<'a> {
    table: &'a TableWidget,
    layout: &'a UILayout,
    title: String,
}

struct OverlayView<'a> {
    overlay: &'a DetailOverlay,
}

impl TableUI {
    pub fn new() -> Self {
        Self {}
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let layout = model.layout();
        let title = format!(" {} ", model.source_name());

        match (model.widget(), &model.renderer().container().error) {
            (Some(table), _) => frame.render_widget(
                TableView {
                    table,
                    layout,
                    title,
                },
                layout.table,
            ),
            (None, error) => {
                let message = error.clone().unwrap_or_else(|| "Loading ...".to_string());
                let block = Block::bordered()
                    .title(Line::from(title.bold()).centered())
                    .border_set(border::THICK)
                    .border_style(Style::default().fg(Color::Red));
                frame.render_widget(
                    Paragraph::new(message.red())
                        .wrap(Wrap { trim: true })
                        .block(block),
                    layout.table,
                );
            }
        }

        self.draw_statusline(model, frame, layout.statusline);

        if model.overlay().is_visible() {
            frame.render_widget(
                OverlayView {
                    overlay: model.overlay(),
                },
                layout.area(),
            );
        }

        if let Some(message) = model.show_popup() {
            let [area] = Layout::horizontal([Constraint::Length(60)])
                .flex(Flex::Center)
                .areas(layout.area());
            let [area] = Layout::vertical([Constraint::Length(
                message.lines().count() as u16 + 2,
            )])
            .flex(Flex::Center)
            .areas(area);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(message).block(
                    Block::bordered()
                        .title(Line::from(" Help ".bold()).centered())
                        .border_set(border::THICK),
                ),
                area,
            );
        }
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if let Some(input) = model.search_input() {
            let line = Line::from(vec!["Search: ".blue().bold(), Span::raw(input.input.clone())]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + "Search: ".len() as u16 + input.curser_pos as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        let instructions = Line::from(vec![
            " Open ".into(),
            "<Enter>".blue().bold(),
            " Sort ".into(),
            "<1-3>".blue().bold(),
            " Search ".into(),
            "</>".blue().bold(),
            " Help ".into(),
            "<?>".blue().bold(),
            " Quit ".into(),
            "<Q> ".blue().bold(),
        ])
        .right_aligned();
        let [message_area, instructions_area] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(instructions.width() as u16),
        ])
        .areas(area);
        let message = if model.status_message_age() < STATUS_MESSAGE_HIGHLIGHT {
            model.status_message().to_string().yellow()
        } else {
            model.status_message().to_string().dark_gray()
        };
        frame.render_widget(Paragraph::new(message), message_area);
        frame.render_widget(instructions, instructions_area);
    }
}

impl Widget for TableView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let table = self.table;
        let options = table.options();
        let (sort_column, direction) = table.order();

        let mut block = Block::bordered()
            .title(Line::from(self.title.bold()).centered())
            .title_bottom(Line::from(format!(" {} ", table.page_info())).right_aligned())
            .border_set(border::THICK);
        if !table.search_term().is_empty() {
            block = block.title(
                Line::from(format!(" /{} ", table.search_term()).yellow()).left_aligned(),
            );
        }

        // Style overrides apply to the header row only
        let header = Row::new(
            options
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.visible)
                .map(|(idx, c)| {
                    if idx == sort_column {
                        Cell::from(format!("{} {}", c.title, direction.marker()))
                    } else {
                        Cell::from(c.title)
                    }
                }),
        )
        .style(options.header_style.add_modifier(Modifier::BOLD))
        .height(TABLE_HEADER_HEIGHT);

        let page_rows = table.page_rows();
        let offset = self.layout.row_offset(table.selected_row());
        let rows = page_rows.iter().map(|item| {
            Row::new(
                options
                    .columns
                    .iter()
                    .filter(|c| c.visible)
                    .map(|c| Cell::from(c.field.value(item).replace('\n', " ↵ "))),
            )
        });

        let inner = block.inner(area);
        let widths = column_constraints(table);
        let widget = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(block);
        let mut state = TableState::default()
            .with_offset(offset)
            .with_selected((!page_rows.is_empty()).then_some(table.selected_row()));
        ratatui::widgets::StatefulWidget::render(widget, area, buf, &mut state);

        if table.is_empty() {
            let empty_area = Rect {
                y: inner.y + TABLE_HEADER_HEIGHT,
                height: inner.height.saturating_sub(TABLE_HEADER_HEIGHT),
                ..inner
            };
            Paragraph::new(options.empty_message.as_str().italic())
                .alignment(Alignment::Center)
                .render(empty_area, buf);
        }
    }
}

impl Widget for OverlayView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layout = OverlayLayout::new(area);
        let overlay = self.overlay;
        Clear.render(layout.panel, buf);

        // Raw text, never parsed as markup
        Block::bordered()
            .title(Line::from(Span::raw(overlay.title()).bold()).centered())
            .border_set(border::THICK)
            .render(layout.panel, buf);

        Paragraph::new(overlay.body_text())
            .wrap(Wrap { trim: false })
            .scroll((overlay.scroll(), 0))
            .render(layout.body, buf);

        Line::from(CLOSE_LABEL.on_dark_gray().bold()).render(layout.close, buf);
    }
}
