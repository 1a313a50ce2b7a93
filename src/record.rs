use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use tracing::trace;

pub const NO_TITLE: &str = "No Title";
pub const NO_DATE: &str = "No Date";
pub const NO_SUMMARY: &str = "No Summary";
pub const NO_CONTENT: &str = "No Content";

pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

// Below this many rows the rayon overhead is not worth it
const PARALLEL_THRESHOLD: usize = 4096;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single loosely typed input value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    Text(String),
    #[default]
    Absent,
}

impl Cell {
    /// Present means non-empty text.
    fn present(&self) -> Option<&str> {
        match self {
            Cell::Text(s) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<Option<&str>> for Cell {
    fn from(value: Option<&str>) -> Self {
        match value {
            Some(s) => Cell::Text(s.to_string()),
            None => Cell::Absent,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Positional input row: title, date, summary, full content, author.
/// Missing trailing positions count as absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow(pub Vec<Cell>);

impl RawRow {
    fn get(&self, pos: usize) -> Option<&str> {
        self.0.get(pos).and_then(Cell::present)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub date: String,
    pub summary: String,
    pub all_content: String,
    pub author: String,
}

impl NewsItem {
    pub fn from_raw(row: &RawRow) -> Self {
        NewsItem {
            title: row.get(0).unwrap_or(NO_TITLE).to_string(),
            date: row
                .get(1)
                .and_then(format_date)
                .unwrap_or_else(|| NO_DATE.to_string()),
            summary: row.get(2).unwrap_or(NO_SUMMARY).to_string(),
            all_content: row.get(3).unwrap_or(NO_CONTENT).to_string(),
            author: row.get(4).unwrap_or_default().to_string(),
        }
    }

    /// Date and author as shown under the article title.
    pub fn byline(&self) -> String {
        format!("{} {}", self.date, self.author)
    }
}

pub fn map_rows(rows: &[RawRow]) -> Vec<NewsItem> {
    trace!("Mapping {} raw rows", rows.len());
    if rows.len() < PARALLEL_THRESHOLD {
        rows.iter().map(NewsItem::from_raw).collect()
    } else {
        rows.par_iter().map(NewsItem::from_raw).collect()
    }
}

/// Parse a date and render it as `DD/MM/YYYY`.
///
/// Accepted inputs, tried in this order:
/// - RFC 3339 timestamps with an offset (`2024-06-15T09:30:00Z`,
///   `2024-06-15 09:30:00.000+00:00`)
/// - ISO date and time without an offset (`2024-06-15T09:30:00`,
///   `2024-06-15 09:30:00.250`, `2024-06-15 09:30`)
/// - ISO dates: `2024-06-15`, `2024/06/15`, `20240615`
/// - RFC 2822 (`Sat, 15 Jun 2024 09:30:00 +0000`)
///
/// Everything else, including month names (`June 15, 2024`) and
/// slash separated day/month orders (`06/15/2024`), gives `None`.
pub fn format_date(input: &str) -> Option<String> {
    parse_date(input.trim()).map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc2822(input)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Inverse of the display format, used for chronological sorting.
pub fn parse_display_date(display: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(display, DISPLAY_DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Option<&str>]) -> RawRow {
        RawRow(cells.iter().map(|c| Cell::from(*c)).collect())
    }

    #[test]
    fn empty_row_maps_to_defaults() {
        let item = NewsItem::from_raw(&row(&[None, None, None, None, None]));
        assert_eq!(
            item,
            NewsItem {
                title: "No Title".into(),
                date: "No Date".into(),
                summary: "No Summary".into(),
                all_content: "No Content".into(),
                author: "".into(),
            }
        );
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let item = NewsItem::from_raw(&row(&[Some(""), Some(""), Some(""), Some(""), Some("")]));
        assert_eq!(item.title, NO_TITLE);
        assert_eq!(item.date, NO_DATE);
        assert_eq!(item.summary, NO_SUMMARY);
        assert_eq!(item.all_content, NO_CONTENT);
        assert_eq!(item.author, "");
    }

    #[test]
    fn short_rows_are_padded_with_defaults() {
        let item = NewsItem::from_raw(&row(&[Some("Budget day")]));
        assert_eq!(item.title, "Budget day");
        assert_eq!(item.date, NO_DATE);
        assert_eq!(item.author, "");

        let item = NewsItem::from_raw(&RawRow::default());
        assert_eq!(item.title, NO_TITLE);
    }

    #[test]
    fn full_row_is_kept() {
        let item = NewsItem::from_raw(&row(&[
            Some("Title"),
            Some("2024-03-05"),
            Some("Short"),
            Some("<p>Long</p>"),
            Some("Aoife"),
        ]));
        assert_eq!(item.title, "Title");
        assert_eq!(item.date, "05/03/2024");
        assert_eq!(item.summary, "Short");
        assert_eq!(item.all_content, "<p>Long</p>");
        assert_eq!(item.author, "Aoife");
        assert_eq!(item.byline(), "05/03/2024 Aoife");
    }

    #[test]
    fn dates_are_formatted_day_first() {
        assert_eq!(format_date("2024-03-05").as_deref(), Some("05/03/2024"));
        assert_eq!(format_date("2024/12/31").as_deref(), Some("31/12/2024"));
        assert_eq!(format_date("20240102").as_deref(), Some("02/01/2024"));
        assert_eq!(
            format_date("2024-03-05T10:15:00").as_deref(),
            Some("05/03/2024")
        );
        assert_eq!(
            format_date("2024-03-05 10:15:00.000").as_deref(),
            Some("05/03/2024")
        );
        assert_eq!(
            format_date("2024-03-05T23:15:00+01:00").as_deref(),
            Some("05/03/2024")
        );
        assert_eq!(
            format_date("Tue, 5 Mar 2024 10:00:00 +0000").as_deref(),
            Some("05/03/2024")
        );
    }

    #[test]
    fn unparseable_dates_fall_back() {
        assert_eq!(format_date("next tuesday"), None);
        assert_eq!(format_date("2024-13-40"), None);
        assert_eq!(format_date("June 15, 2024"), None);
        assert_eq!(format_date("06/15/2024"), None);
        let item = NewsItem::from_raw(&row(&[Some("t"), Some("soon")]));
        assert_eq!(item.date, NO_DATE);
    }

    #[test]
    fn every_row_yields_one_record_in_order() {
        let rows: Vec<RawRow> = (0..PARALLEL_THRESHOLD + 10)
            .map(|i| {
                let title = i.to_string();
                row(&[Some(title.as_str()), None, None, None, None])
            })
            .collect();
        let items = map_rows(&rows);
        assert_eq!(items.len(), rows.len());
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item.title, i.to_string());
            assert!(!item.date.is_empty());
            assert!(!item.summary.is_empty());
            assert!(!item.all_content.is_empty());
        }
    }

    #[test]
    fn display_dates_round_trip_for_sorting() {
        let d = parse_display_date("15/06/2024").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert!(parse_display_date(NO_DATE).is_none());
    }
}
