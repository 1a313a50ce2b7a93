use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Instant;

use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{FeedError, HELP_TEXT, Message};
use crate::inputter::{InputResult, Inputter};
use crate::overlay::{DetailOverlay, OverlayLayout};
use crate::record::{NewsItem, RawRow, map_rows};
use crate::renderer::TableRenderer;
use crate::settings::RenderSettings;
use crate::source::FeedSource;
use crate::table::TableWidget;
use crate::ui::{MIN_TABLE_HEIGHT, STATUSLINE_HEIGHT, TABLE_BORDER, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    DETAIL,
    POPUP,
    SEARCH,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table: Rect,
    pub table_rows: usize,
    pub statusline: Rect,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, height_percent: u16) -> Self {
        let width = ui_width.min(u16::MAX as usize) as u16;
        let height = ui_height.min(u16::MAX as usize) as u16;

        let available = height.saturating_sub(STATUSLINE_HEIGHT);
        let table_height = ((available as u32 * height_percent as u32) / 100) as u16;
        let table_height = table_height.max(MIN_TABLE_HEIGHT).min(available);

        let table = Rect::new(0, 0, width, table_height);
        let statusline = Rect::new(0, available, width, height.min(STATUSLINE_HEIGHT));
        let table_rows = table_height.saturating_sub(2 * TABLE_BORDER + TABLE_HEADER_HEIGHT) as usize;

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table,
            table_rows,
            statusline,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.table.width, self.statusline.bottom())
    }

    /// Inside of the table border.
    pub fn table_inner(&self) -> Rect {
        self.table.inner(ratatui::layout::Margin::new(TABLE_BORDER, TABLE_BORDER))
    }

    /// First page row drawn, so that the selected row stays visible.
    pub fn row_offset(&self, selected: usize) -> usize {
        if self.table_rows == 0 {
            0
        } else {
            selected.saturating_sub(self.table_rows - 1)
        }
    }

    /// Screen areas of the visible columns, one per width hint.
    pub fn column_areas(&self, widths: &[Constraint]) -> Vec<Rect> {
        Layout::horizontal(widths.to_vec())
            .spacing(1)
            .split(self.table_inner())
            .to_vec()
    }
}

pub struct Model {
    source: FeedSource,
    settings_path: Option<PathBuf>,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    renderer: TableRenderer,
    overlay: DetailOverlay,
    settings: RenderSettings,
    sender: Sender<Message>,
    mailbox: Receiver<Message>,
    uilayout: UILayout,
    input: Inputter,
    last_input: InputResult,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
    cycles: u64,
}

impl Model {
    pub fn init(source: FeedSource, settings_path: Option<PathBuf>) -> Self {
        let (sender, mailbox) = channel();
        Self {
            source,
            settings_path,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            renderer: TableRenderer::new(),
            overlay: DetailOverlay::new(),
            settings: RenderSettings::default(),
            sender,
            mailbox,
            uilayout: UILayout::default(),
            input: Inputter::default(),
            last_input: InputResult::default(),
            popup_message: String::new(),
            status_message: "Started newsfeed!".to_string(),
            last_status_message_update: Instant::now(),
            cycles: 0,
        }
    }

    /// One host update cycle: read data and settings, rebuild the table.
    pub fn refresh(&mut self) -> Result<(), FeedError> {
        let rows = self.source.load()?;
        let settings = RenderSettings::load(self.settings_path.as_deref());
        self.apply(&rows, settings)
    }

    pub fn apply(&mut self, rows: &[RawRow], settings: RenderSettings) -> Result<(), FeedError> {
        let start_time = Instant::now();
        let records = map_rows(rows);

        // The selection belongs to the table that is about to be destroyed
        self.overlay.close();
        if matches!(self.modus, Modus::DETAIL | Modus::SEARCH) {
            self.modus = Modus::TABLE;
        }
        // Clicks queued for the old table are stale
        while self.mailbox.try_recv().is_ok() {}

        let sender = self.sender.clone();
        let on_click = Box::new(move |item: &NewsItem| {
            if sender.send(Message::ShowDetail(item.clone())).is_err() {
                error!("Row click for {:?} was lost", item.title);
            }
        });

        let result = self.renderer.render(records, &settings, on_click);
        self.uilayout = UILayout::from_values(
            self.uilayout.width,
            self.uilayout.height,
            self.renderer.container().height_percent,
        );
        if settings != self.settings {
            info!("Render settings changed: {:?}", settings);
        }
        self.settings = settings;
        self.cycles += 1;

        match &result {
            Ok(()) => {
                let count = self.widget().map(|w| w.record_count()).unwrap_or(0);
                info!(
                    "Update cycle {} rendered {} articles in {}ms",
                    self.cycles,
                    count,
                    start_time.elapsed().as_millis()
                );
                self.set_status_message(format!("Loaded {count} articles"));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
        result
    }

    fn reload(&mut self) {
        if let Err(e) = self.refresh() {
            warn!("Reload failed: {}", e);
            self.set_status_message(format!("Reload failed: {e}"));
        }
    }

    pub fn renderer(&self) -> &TableRenderer {
        &self.renderer
    }

    pub fn widget(&self) -> Option<&TableWidget> {
        self.renderer.widget()
    }

    pub fn overlay(&self) -> &DetailOverlay {
        &self.overlay
    }

    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn source_name(&self) -> String {
        self.source.name()
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn show_popup(&self) -> Option<&str> {
        (self.modus == Modus::POPUP).then_some(self.popup_message.as_str())
    }

    pub fn search_input(&self) -> Option<&InputResult> {
        (self.modus == Modus::SEARCH).then_some(&self.last_input)
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    /// Keys go unmapped to the overlay and the search prompt.
    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::DETAIL | Modus::SEARCH)
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    pub fn status_message_age(&self) -> std::time::Duration {
        self.last_status_message_update.elapsed()
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout =
            UILayout::from_values(width, height, self.renderer.container().height_percent);
        self.clamp_overlay_scroll();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), FeedError> {
        if let Some(msg) = message {
            self.handle(msg);
        }
        // Messages posted by row click handlers
        while let Ok(msg) = self.mailbox.try_recv() {
            self.handle(msg);
        }
        Ok(())
    }

    fn handle(&mut self, msg: Message) {
        match (self.modus, msg) {
            (_, Message::Resize(width, height)) => self.ui_resize(width, height),
            (_, Message::ShowDetail(item)) => self.open_detail(&item),
            (Modus::TABLE, msg) => self.handle_table(msg),
            (Modus::DETAIL, msg) => self.handle_detail(msg),
            (Modus::POPUP, Message::Quit) => self.quit(),
            (Modus::POPUP, Message::Exit | Message::Help | Message::Enter) => self.close_popup(),
            (Modus::POPUP, _) => {}
            (Modus::SEARCH, Message::RawKey(key)) => self.search_input_key(key),
            (Modus::SEARCH, _) => {}
        }
    }

    fn handle_table(&mut self, msg: Message) {
        match msg {
            Message::Quit => self.quit(),
            Message::Reload => self.reload(),
            Message::Help => self.show_help(),
            Message::Search => self.enter_search(),
            Message::Click(column, row) => self.click_table(column, row),
            msg => {
                let Some(widget) = self.renderer.widget_mut() else {
                    return;
                };
                match msg {
                    Message::MoveDown => widget.move_down(),
                    Message::MoveUp => widget.move_up(),
                    Message::NextPage | Message::PageDown => widget.next_page(),
                    Message::PrevPage | Message::PageUp => widget.prev_page(),
                    Message::FirstPage => widget.first_page(),
                    Message::LastPage => widget.last_page(),
                    Message::Sort(visible_idx) => {
                        if let Some(&column) = widget.visible_columns().get(visible_idx) {
                            widget.sort_by(column);
                        }
                    }
                    Message::Enter => {
                        debug!("Opening {:?}", widget.selected().map(|item| &item.title));
                        widget.click_selected();
                    }
                    Message::Exit => {
                        if !widget.search_term().is_empty() {
                            widget.search("");
                        }
                    }
                    _ => (),
                }
            }
        }
    }

    fn handle_detail(&mut self, msg: Message) {
        match msg {
            Message::RawKey(key) => {
                self.overlay.handle_key(key);
            }
            Message::MoveDown => self.overlay.scroll_down(1),
            Message::MoveUp => self.overlay.scroll_up(1),
            Message::Click(column, row) => {
                self.overlay.handle_click(self.uilayout.area(), column, row);
            }
            _ => (),
        }
        if self.overlay.is_visible() {
            self.clamp_overlay_scroll();
        } else {
            self.modus = Modus::TABLE;
        }
    }

    fn clamp_overlay_scroll(&mut self) {
        let body = OverlayLayout::new(self.uilayout.area()).body;
        self.overlay.clamp_scroll(body);
    }

    fn open_detail(&mut self, item: &NewsItem) {
        self.overlay.show(item);
        self.previous_modus = self.modus;
        self.modus = Modus::DETAIL;
    }

    fn click_table(&mut self, column: u16, row: u16) {
        let layout = self.uilayout.clone();
        let Some(widget) = self.renderer.widget_mut() else {
            return;
        };
        let inner = layout.table_inner();
        if !inner.contains(Position::new(column, row)) {
            return;
        }
        if row < inner.y + TABLE_HEADER_HEIGHT {
            let widths = column_constraints(widget);
            let visible = widget.visible_columns();
            if let Some(idx) = layout
                .column_areas(&widths)
                .iter()
                .position(|a| a.contains(Position::new(column, row)))
                && let Some(&target) = visible.get(idx)
            {
                debug!("Header click sorts column {target}");
                widget.sort_by(target);
            }
            return;
        }
        let page_row =
            layout.row_offset(widget.selected_row()) + (row - inner.y - TABLE_HEADER_HEIGHT) as usize;
        widget.click_row(page_row);
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_search(&mut self) {
        if self.widget().is_none() {
            return;
        }
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        let current = self
            .widget()
            .map(|w| w.search_term().to_string())
            .unwrap_or_default();
        self.input.set(&current);
        self.last_input = self.input.get();
    }

    fn search_input_key(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        let term = self.last_input.input.clone();
        if let Some(widget) = self.renderer.widget_mut() {
            widget.search(&term);
        }
        if self.last_input.finished {
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::SEARCH;
            let matches = self.widget().map(|w| w.filtered_count()).unwrap_or(0);
            if self.last_input.canceled || term.is_empty() {
                self.set_status_message("Search cleared");
            } else {
                self.set_status_message(format!("{matches} articles match {term:?}"));
            }
        }
    }
}

/// Width hints of the visible columns.
pub fn column_constraints(widget: &TableWidget) -> Vec<Constraint> {
    widget
        .options()
        .columns
        .iter()
        .filter(|c| c.visible)
        .map(|c| match c.width {
            Some(pct) => Constraint::Percentage(pct),
            None => Constraint::Fill(1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Cell;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    fn raw(title: &str, date: &str, content: &str) -> RawRow {
        RawRow(vec![
            Cell::from(title),
            Cell::from(date),
            Cell::from("summary"),
            Cell::from(content),
            Cell::from("Desk"),
        ])
    }

    fn rows() -> Vec<RawRow> {
        vec![
            raw("New year", "2024-01-01", "<p>a</p>"),
            raw("Summer", "2024-06-15", "<p>Hi</p><script>evil()</script>"),
            raw("Winter", "2023-12-20", "<p>c</p>"),
        ]
    }

    fn model() -> Model {
        let mut model = Model::init(FeedSource::new(PathBuf::from("unused.csv")), None);
        model.update(Some(Message::Resize(100, 40))).unwrap();
        model.apply(&rows(), RenderSettings::default()).unwrap();
        model
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn update_cycle_renders_newest_first() {
        let model = model();
        let titles: Vec<String> = model
            .widget()
            .unwrap()
            .page_rows()
            .iter()
            .map(|i| i.title.clone())
            .collect();
        assert_eq!(titles, vec!["Summer", "New year", "Winter"]);
        assert_eq!(model.status_message(), "Loaded 3 articles");
    }

    #[test]
    fn enter_opens_sanitized_detail_and_escape_closes() {
        let mut model = model();
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.modus(), Modus::DETAIL);
        assert!(model.raw_keyevents());
        assert_eq!(model.overlay().title(), "Summer");
        assert_eq!(model.overlay().byline(), "15/06/2024 Desk");
        assert_eq!(model.overlay().content(), "<p>Hi</p>");

        model.update(Some(key(KeyCode::Esc))).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
        assert!(!model.overlay().is_visible());
        assert_eq!(model.overlay().content(), "<p>Hi</p>");
    }

    #[test]
    fn article_scroll_stops_at_the_last_line() {
        let mut model = model();
        model.update(Some(Message::Enter)).unwrap();
        for _ in 0..20 {
            model.update(Some(key(KeyCode::PageDown))).unwrap();
        }
        // The short article fits the overlay body, so there is nothing to scroll
        assert_eq!(model.overlay().scroll(), 0);
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.overlay().scroll(), 0);
    }

    #[test]
    fn clicking_a_row_opens_it() {
        let mut model = model();
        let inner = model.layout().table_inner();
        let row = inner.y + TABLE_HEADER_HEIGHT + 2;
        model.update(Some(Message::Click(inner.x + 1, row))).unwrap();
        assert!(model.overlay().is_visible());
        assert_eq!(model.overlay().title(), "Winter");
    }

    #[test]
    fn clicking_the_header_sorts() {
        let mut model = model();
        let inner = model.layout().table_inner();
        model.update(Some(Message::Click(inner.x + 1, inner.y))).unwrap();
        let widget = model.widget().unwrap();
        assert_eq!(widget.order().0, 0);
        assert_eq!(widget.page_rows()[0].title, "New year");
        assert!(!model.overlay().is_visible());
    }

    #[test]
    fn a_new_cycle_hides_the_overlay() {
        let mut model = model();
        model.update(Some(Message::Enter)).unwrap();
        assert!(model.overlay().is_visible());
        model.apply(&rows(), RenderSettings::default()).unwrap();
        assert!(!model.overlay().is_visible());
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn hundred_cycles_open_the_overlay_once_per_click() {
        let mut model = model();
        for _ in 0..100 {
            model.apply(&rows(), RenderSettings::default()).unwrap();
        }
        assert_eq!(model.widget().unwrap().handler_count(), 1);
        model.renderer.widget_mut().unwrap().click_row(0);
        let mut delivered = 0;
        while let Ok(msg) = model.mailbox.try_recv() {
            assert!(matches!(msg, Message::ShowDetail(_)));
            delivered += 1;
        }
        assert_eq!(delivered, 1);
    }

    #[test]
    fn broken_settings_surface_as_error() {
        let mut model = model();
        let result = model.apply(&rows(), RenderSettings::default().page_length(0usize));
        assert!(result.is_err());
        assert!(model.widget().is_none());
        assert!(model.renderer().container().error.is_some());
        // Keys addressed to the missing table are ignored
        model.update(Some(Message::Enter)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert!(!model.overlay().is_visible());
    }

    #[test]
    fn search_filters_as_you_type() {
        let mut model = model();
        model.update(Some(Message::Search)).unwrap();
        assert_eq!(model.modus(), Modus::SEARCH);
        for c in "wint".chars() {
            model.update(Some(key(KeyCode::Char(c)))).unwrap();
        }
        assert_eq!(model.widget().unwrap().filtered_count(), 1);
        model.update(Some(key(KeyCode::Enter))).unwrap();
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.widget().unwrap().search_term(), "wint");

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.widget().unwrap().filtered_count(), 3);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.show_popup().is_some());
        model.update(Some(Message::Exit)).unwrap();
        assert!(model.show_popup().is_none());
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn table_height_follows_settings() {
        let model = {
            let mut model = model();
            model
                .apply(&rows(), RenderSettings::default().table_height(100u16))
                .unwrap();
            model
        };
        assert_eq!(model.layout().table.height, 40 - STATUSLINE_HEIGHT);
        assert_eq!(model.settings.table_height, 100);
    }

    #[test]
    fn selected_row_stays_visible() {
        let layout = UILayout::from_values(80, 10, 100);
        assert_eq!(layout.table_rows, 6);
        assert_eq!(layout.row_offset(3), 0);
        assert_eq!(layout.row_offset(8), 3);
    }
}
