use std::fs;
use std::path::Path;
use std::str::FromStr;

use derive_setters::Setters;
use ratatui::style::Color;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::FeedError;

pub const DEFAULT_HEADER_COLOR: &str = "#333333";
pub const DEFAULT_HEADER_FONT_COLOR: &str = "#ffffff";
pub const DEFAULT_TABLE_HEIGHT: u16 = 50;
pub const DEFAULT_PAGE_LENGTH: usize = 10;

/// Table settings, re-read on every update cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Setters)]
#[serde(default, rename_all = "camelCase")]
#[setters(into)]
pub struct RenderSettings {
    pub header_color: String,
    pub header_font_color: String,
    /// Percent of the available height used by the table container.
    pub table_height: u16,
    pub page_length: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            header_color: DEFAULT_HEADER_COLOR.to_string(),
            header_font_color: DEFAULT_HEADER_FONT_COLOR.to_string(),
            table_height: DEFAULT_TABLE_HEIGHT,
            page_length: DEFAULT_PAGE_LENGTH,
        }
    }
}

impl RenderSettings {
    pub fn from_toml(text: &str) -> Result<Self, FeedError> {
        Ok(toml::from_str(text)?)
    }

    pub fn read(path: &Path) -> Result<Self, FeedError> {
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Settings for one update cycle. A broken or missing file never stops the
    /// cycle, the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::read(path) {
            Ok(settings) => {
                debug!("Loaded settings from {}: {:?}", path.display(), settings);
                settings
            }
            Err(e) => {
                warn!("Using default settings, {} unusable: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn header_background(&self) -> Result<Color, FeedError> {
        parse_color("headerColor", &self.header_color)
    }

    pub fn header_foreground(&self) -> Result<Color, FeedError> {
        parse_color("headerFontColor", &self.header_font_color)
    }
}

fn parse_color(option: &str, value: &str) -> Result<Color, FeedError> {
    Color::from_str(value.trim())
        .map_err(|_| FeedError::WidgetInit(format!("{option} {value:?} is not a color")))
}

pub struct SettingDescriptor {
    pub name: &'static str,
    pub kind: &'static str,
    pub default: String,
    pub description: &'static str,
}

pub fn schema() -> Vec<SettingDescriptor> {
    let defaults = RenderSettings::default();
    vec![
        SettingDescriptor {
            name: "headerColor",
            kind: "color",
            default: format!("{:?}", defaults.header_color),
            description: "Background color of the table header row",
        },
        SettingDescriptor {
            name: "headerFontColor",
            kind: "color",
            default: format!("{:?}", defaults.header_font_color),
            description: "Text color of the table header row",
        },
        SettingDescriptor {
            name: "tableHeight",
            kind: "integer (percent)",
            default: defaults.table_height.to_string(),
            description: "Height of the table as a share of the window",
        },
        SettingDescriptor {
            name: "pageLength",
            kind: "integer (rows)",
            default: defaults.page_length.to_string(),
            description: "Number of articles per page",
        },
    ]
}

/// The settings schema as a commented TOML document with default values.
pub fn describe() -> String {
    schema()
        .iter()
        .map(|s| {
            format!(
                "# {} ({})\n{} = {}\n",
                s.description, s.kind, s.name, s.default
            )
        })
        .collect::<Vec<String>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_options_fall_back_to_defaults() {
        let settings = RenderSettings::from_toml("pageLength = 25").unwrap();
        assert_eq!(settings.page_length, 25);
        assert_eq!(settings.header_color, DEFAULT_HEADER_COLOR);
        assert_eq!(settings.table_height, DEFAULT_TABLE_HEIGHT);
    }

    #[test]
    fn camel_case_keys_are_read() {
        let settings = RenderSettings::from_toml(
            "headerColor = \"#102030\"\nheaderFontColor = \"yellow\"\ntableHeight = 80\n",
        )
        .unwrap();
        assert_eq!(settings.header_background().unwrap(), Color::Rgb(0x10, 0x20, 0x30));
        assert_eq!(settings.header_foreground().unwrap(), Color::Yellow);
        assert_eq!(settings.table_height, 80);
    }

    #[test]
    fn invalid_colors_are_init_errors() {
        let settings = RenderSettings::default().header_color("not-a-color");
        assert!(matches!(
            settings.header_background(),
            Err(FeedError::WidgetInit(_))
        ));
    }

    #[test]
    fn unreadable_files_give_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pageLength = \"many\"").unwrap();
        assert_eq!(RenderSettings::load(Some(file.path())), RenderSettings::default());
        assert_eq!(
            RenderSettings::load(Some(Path::new("/does/not/exist.toml"))),
            RenderSettings::default()
        );
        assert_eq!(RenderSettings::load(None), RenderSettings::default());
    }

    #[test]
    fn settings_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pageLength = 3").unwrap();
        assert_eq!(RenderSettings::load(Some(file.path())).page_length, 3);
    }

    #[test]
    fn description_parses_back_to_defaults() {
        let text = describe();
        assert!(text.contains("headerColor"));
        assert!(text.contains("pageLength"));
        assert_eq!(RenderSettings::from_toml(&text).unwrap(), RenderSettings::default());
    }
}
