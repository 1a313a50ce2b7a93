//! The sortable, paginated news table bound to one set of records.
//!
//! A `TableWidget` is built once per update cycle by the renderer and thrown
//! away on the next one. Row clicks are dispatched to the handlers registered
//! on the instance, so dropping the instance drops its handlers as well.

use std::borrow::Cow;
use std::cmp::Ordering;

use ratatui::style::Style;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::domain::FeedError;
use crate::markup;
use crate::record::{NewsItem, parse_display_date};
use crate::sanitize::sanitize;
use crate::settings::RenderSettings;

pub const EMPTY_TABLE_MESSAGE: &str = "No news articles to show";

pub type RowClickHandler = Box<dyn FnMut(&NewsItem)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Date,
    Summary,
    AllContent,
    Author,
}

impl Field {
    pub fn value(self, item: &NewsItem) -> &str {
        match self {
            Field::Title => &item.title,
            Field::Date => &item.date,
            Field::Summary => &item.summary,
            Field::AllContent => &item.all_content,
            Field::Author => &item.author,
        }
    }

    /// The text search sees. Article content is matched on what the reader
    /// sees, so tags and dropped elements never match.
    fn search_value(self, item: &NewsItem) -> Cow<'_, str> {
        match self {
            Field::AllContent => match sanitize(&item.all_content) {
                Ok(markup) => Cow::Owned(markup::plain_text(&markup)),
                Err(e) => {
                    warn!("Content of {:?} is not searchable: {}", item.title, e);
                    Cow::Borrowed("")
                }
            },
            field => Cow::Borrowed(field.value(item)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub title: &'static str,
    pub field: Field,
    pub visible: bool,
    /// Width hint in percent of the table width.
    pub width: Option<u16>,
}

impl ColumnSpec {
    fn new(title: &'static str, field: Field, width: u16) -> Self {
        Self {
            title,
            field,
            visible: true,
            width: Some(width),
        }
    }

    fn hidden(title: &'static str, field: Field) -> Self {
        Self {
            title,
            field,
            visible: false,
            width: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub columns: Vec<ColumnSpec>,
    pub page_length: usize,
    pub order: (usize, SortDirection),
    pub empty_message: String,
    pub header_style: Style,
}

impl TableOptions {
    /// The fixed news layout: newest articles first, content and author
    /// kept for the detail view only.
    pub fn news(settings: &RenderSettings) -> Result<Self, FeedError> {
        let header_style = Style::default()
            .bg(settings.header_background()?)
            .fg(settings.header_foreground()?);
        Ok(Self {
            columns: vec![
                ColumnSpec::new("Title", Field::Title, 30),
                ColumnSpec::new("Issue Date", Field::Date, 10),
                ColumnSpec::new("Summary", Field::Summary, 60),
                ColumnSpec::hidden("", Field::AllContent),
                ColumnSpec::hidden("Author", Field::Author),
            ],
            page_length: settings.page_length,
            order: (1, SortDirection::Descending),
            empty_message: EMPTY_TABLE_MESSAGE.to_string(),
            header_style,
        })
    }

    fn validate(&self) -> Result<(), FeedError> {
        if self.columns.iter().all(|c| !c.visible) {
            return Err(FeedError::WidgetInit("no visible columns".into()));
        }
        if self.page_length == 0 {
            return Err(FeedError::WidgetInit("page length must be positive".into()));
        }
        let (sort_column, _) = self.order;
        match self.columns.get(sort_column) {
            None => {
                return Err(FeedError::WidgetInit(format!(
                    "sort column {sort_column} does not exist"
                )));
            }
            Some(c) if !c.visible => {
                return Err(FeedError::WidgetInit(format!(
                    "sort column {sort_column} is hidden"
                )));
            }
            _ => {}
        }
        let total_width: u16 = self
            .columns
            .iter()
            .filter(|c| c.visible)
            .filter_map(|c| c.width)
            .sum();
        if total_width > 100 {
            return Err(FeedError::WidgetInit(format!(
                "column widths add up to {total_width}%"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
impl Default for TableOptions {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            page_length: 10,
            order: (0, SortDirection::Ascending),
            empty_message: EMPTY_TABLE_MESSAGE.to_string(),
            header_style: Style::default().bg(ratatui::style::Color::DarkGray),
        }
    }
}

pub struct TableWidget {
    options: TableOptions,
    records: Vec<NewsItem>,
    rows: Vec<usize>, // Display order of record indices after search and sort
    search_text: Vec<String>, // Lowercased searchable text, one per record
    order: (usize, SortDirection),
    search: String,
    page: usize,
    curser_row: usize, // Relative to the current page
    handlers: Vec<RowClickHandler>,
}

impl TableWidget {
    pub fn new(records: Vec<NewsItem>, options: TableOptions) -> Result<Self, FeedError> {
        options.validate()?;
        let fields: Vec<Field> = options.columns.iter().map(|c| c.field).collect();
        let search_text = records
            .par_iter()
            .map(|item| {
                fields
                    .iter()
                    .map(|f| f.search_value(item).to_lowercase())
                    .collect::<Vec<String>>()
                    .join("\n")
            })
            .collect();
        let mut widget = Self {
            order: options.order,
            options,
            rows: (0..records.len()).collect(),
            search_text,
            records,
            search: String::new(),
            page: 0,
            curser_row: 0,
            handlers: Vec::new(),
        };
        widget.apply_order();
        debug!(
            "Built table with {} records, page length {}",
            widget.records.len(),
            widget.options.page_length
        );
        Ok(widget)
    }

    pub fn on_row_click(&mut self, handler: RowClickHandler) {
        self.handlers.push(handler);
    }

    #[cfg(test)]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Release handlers and data. The instance renders as empty afterwards.
    pub fn destroy(&mut self) {
        trace!(
            "Destroying table with {} handlers and {} records",
            self.handlers.len(),
            self.records.len()
        );
        self.handlers.clear();
        self.records.clear();
        self.rows.clear();
        self.search_text.clear();
        self.search.clear();
        self.page = 0;
        self.curser_row = 0;
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    pub fn visible_columns(&self) -> Vec<usize> {
        self.options
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.visible)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn order(&self) -> (usize, SortDirection) {
        self.order
    }

    /// Sort by `column`, reversing the direction when it is already the sort column.
    pub fn sort_by(&mut self, column: usize) {
        if !self.options.columns.get(column).is_some_and(|c| c.visible) {
            trace!("Ignoring sort on column {column}");
            return;
        }
        self.order = if self.order.0 == column {
            (column, self.order.1.toggled())
        } else {
            (column, SortDirection::Ascending)
        };
        self.apply_order();
        self.page = 0;
        self.curser_row = 0;
    }

    fn apply_order(&mut self) {
        let (column, direction) = self.order;
        let field = self.options.columns[column].field;
        let records = &self.records;
        self.rows.sort_by(|&a, &b| {
            let ord = compare(field, &records[a], &records[b]);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    /// Case insensitive filter over all columns, hidden ones included.
    pub fn search(&mut self, term: &str) {
        self.search = term.to_string();
        let needle = term.to_lowercase();
        self.rows = self
            .search_text
            .iter()
            .enumerate()
            .filter(|(_, text)| needle.is_empty() || text.contains(&needle))
            .map(|(idx, _)| idx)
            .collect();
        self.apply_order();
        self.page = 0;
        self.curser_row = 0;
        debug!("Search {:?} matched {} records", term, self.rows.len());
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn filtered_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.options.page_length).max(1)
    }

    pub fn page_info(&self) -> String {
        let mut info = format!(
            "Page {} of {} ({} articles",
            self.page() + 1,
            self.page_count(),
            self.rows.len()
        );
        if self.rows.len() != self.records.len() {
            info.push_str(&format!(", filtered from {}", self.records.len()));
        }
        info.push(')');
        info
    }

    pub fn page_rows(&self) -> Vec<&NewsItem> {
        let begin = self.page * self.options.page_length;
        let end = std::cmp::min(begin + self.options.page_length, self.rows.len());
        self.rows
            .get(begin..end)
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.records[idx])
            .collect()
    }

    pub fn selected_row(&self) -> usize {
        self.curser_row
    }

    pub fn selected(&self) -> Option<&NewsItem> {
        self.page_rows().get(self.curser_row).copied()
    }

    pub fn next_page(&mut self) {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            self.curser_row = 0;
        }
    }

    pub fn prev_page(&mut self) {
        if self.page > 0 {
            self.page -= 1;
            self.curser_row = 0;
        }
    }

    pub fn first_page(&mut self) {
        self.page = 0;
        self.curser_row = 0;
    }

    pub fn last_page(&mut self) {
        self.page = self.page_count() - 1;
        self.curser_row = 0;
    }

    pub fn move_down(&mut self) {
        let rows_on_page = self.page_rows().len();
        if self.curser_row + 1 < rows_on_page {
            self.curser_row += 1;
        } else if self.page + 1 < self.page_count() {
            self.next_page();
        }
    }

    pub fn move_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.page > 0 {
            self.prev_page();
            self.curser_row = self.page_rows().len().saturating_sub(1);
        }
    }

    /// Select the row at `row` on the current page and hand its record to
    /// every registered handler. Returns false when there is no such row.
    pub fn click_row(&mut self, row: usize) -> bool {
        let Some(item) = self.page_rows().get(row).map(|&item| item.clone()) else {
            return false;
        };
        self.curser_row = row;
        trace!("Row {row} clicked: {:?}", item.title);
        for handler in self.handlers.iter_mut() {
            handler(&item);
        }
        true
    }

    pub fn click_selected(&mut self) -> bool {
        self.click_row(self.curser_row)
    }
}

fn compare(field: Field, a: &NewsItem, b: &NewsItem) -> Ordering {
    match field {
        // Placeholder dates parse to None and sort below real ones
        Field::Date => parse_display_date(&a.date).cmp(&parse_display_date(&b.date)),
        _ => {
            let (a, b) = (field.value(a), field.value(b));
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        }
    }
}
