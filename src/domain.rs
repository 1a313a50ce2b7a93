use std::fmt;
use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::record::NewsItem;

pub const HELP_TEXT: &str = "
 newsfeed - keys

 Table
   Up/Down, j/k      Move selection
   Left/Right, h/l   Previous / next page
   Home/End, g/G     First / last page
   1 2 3             Sort by Title / Issue Date / Summary (again to reverse)
   Enter, click      Open article
   /                 Search
   Esc               Clear search
   r                 Reload data and settings
   ?                 This help
   q                 Quit

 Article
   Up/Down, PgUp/PgDn  Scroll
   Esc, q, [Close]     Close article
";

#[derive(Debug)]
pub enum FeedError {
    IoError(Error),
    PolarsError(PolarsError),
    SettingsError(toml::de::Error),
    LoadingFailed(String),
    WidgetInit(String),
    Sanitize(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::IoError(e) => write!(f, "I/O error: {e}"),
            FeedError::PolarsError(e) => write!(f, "Failed to read data: {e}"),
            FeedError::SettingsError(e) => write!(f, "Invalid settings: {e}"),
            FeedError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            FeedError::WidgetInit(reason) => write!(f, "Table could not be initialized: {reason}"),
            FeedError::Sanitize(reason) => write!(f, "Content rejected: {reason}"),
            FeedError::FileNotFound => write!(f, "File not found"),
            FeedError::PermissionDenied => write!(f, "Permission denied"),
            FeedError::UnknownFileType => write!(f, "Unknown file type"),
        }
    }
}

impl std::error::Error for FeedError {}

impl From<Error> for FeedError {
    fn from(err: Error) -> Self {
        FeedError::IoError(err)
    }
}

impl From<PolarsError> for FeedError {
    fn from(err: PolarsError) -> Self {
        FeedError::PolarsError(err)
    }
}

impl From<toml::de::Error> for FeedError {
    fn from(err: toml::de::Error) -> Self {
        FeedError::SettingsError(err)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub event_poll_time: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    PageUp,
    PageDown,
    Sort(usize),
    Enter,
    Exit,
    Search,
    Reload,
    Help,
    Click(u16, u16),
    Resize(usize, usize),
    RawKey(KeyEvent),
    ShowDetail(NewsItem),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: FeedError = Error::other("boom").into();
        assert!(matches!(err, FeedError::IoError(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn widget_init_error_names_reason() {
        let err = FeedError::WidgetInit("page length must be positive".into());
        assert_eq!(
            err.to_string(),
            "Table could not be initialized: page length must be positive"
        );
    }
}
