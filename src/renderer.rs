use tracing::{debug, error};

use crate::domain::FeedError;
use crate::record::NewsItem;
use crate::settings::RenderSettings;
use crate::table::{RowClickHandler, TableOptions, TableWidget};

/// The area the table is drawn into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Percent of the available height.
    pub height_percent: u16,
    /// Shown instead of a table when the last build failed.
    pub error: Option<String>,
}

impl Default for Container {
    fn default() -> Self {
        Self {
            height_percent: crate::settings::DEFAULT_TABLE_HEIGHT,
            error: None,
        }
    }
}

/// Owns the one table instance bound to the container. Every `render` tears the
/// previous instance down completely before the next one is built.
#[derive(Default)]
pub struct TableRenderer {
    container: Container,
    widget: Option<TableWidget>,
    builds: u64,
}

impl TableRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        records: Vec<NewsItem>,
        settings: &RenderSettings,
        on_click: RowClickHandler,
    ) -> Result<(), FeedError> {
        self.container.height_percent = settings.table_height.clamp(1, 100);

        if let Some(mut previous) = self.widget.take() {
            previous.destroy();
        }
        self.container.error = None;

        match Self::build(records, settings, on_click) {
            Ok(widget) => {
                self.builds += 1;
                debug!(
                    "Table build #{} with {} records",
                    self.builds,
                    widget.record_count()
                );
                self.widget = Some(widget);
                Ok(())
            }
            Err(e) => {
                error!("Table build failed: {e}");
                self.container.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn build(
        records: Vec<NewsItem>,
        settings: &RenderSettings,
        on_click: RowClickHandler,
    ) -> Result<TableWidget, FeedError> {
        let options = TableOptions::news(settings)?;
        let mut widget = TableWidget::new(records, options)?;
        widget.on_row_click(on_click);
        Ok(widget)
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn widget(&self) -> Option<&TableWidget> {
        self.widget.as_ref()
    }

    pub fn widget_mut(&mut self) -> Option<&mut TableWidget> {
        self.widget.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn records() -> Vec<NewsItem> {
        ["01/01/2024", "15/06/2024", "20/12/2023"]
            .iter()
            .enumerate()
            .map(|(i, d)| NewsItem {
                title: format!("Story {i}"),
                date: d.to_string(),
                summary: "Summary".into(),
                all_content: "<p>Body</p>".into(),
                author: "".into(),
            })
            .collect()
    }

    fn visible(renderer: &TableRenderer) -> Vec<(String, String)> {
        renderer
            .widget()
            .unwrap()
            .page_rows()
            .iter()
            .map(|i| (i.title.clone(), i.date.clone()))
            .collect()
    }

    #[test]
    fn rendering_twice_is_idempotent() {
        let mut renderer = TableRenderer::new();
        let settings = RenderSettings::default();
        renderer.render(records(), &settings, Box::new(|_| {})).unwrap();
        let first = visible(&renderer);
        renderer.render(records(), &settings, Box::new(|_| {})).unwrap();
        assert_eq!(visible(&renderer), first);
        assert_eq!(renderer.widget().unwrap().handler_count(), 1);
    }

    #[test]
    fn previous_handlers_are_released() {
        let mut renderer = TableRenderer::new();
        let settings = RenderSettings::default();
        let token = Rc::new(());
        for _ in 0..5 {
            let held = Rc::clone(&token);
            renderer
                .render(
                    records(),
                    &settings,
                    Box::new(move |_| {
                        let _ = &held;
                    }),
                )
                .unwrap();
        }
        assert_eq!(Rc::strong_count(&token), 2);
    }

    #[test]
    fn hundred_cycles_leave_one_handler() {
        let mut renderer = TableRenderer::new();
        let settings = RenderSettings::default();
        let hits = Rc::new(Cell::new(0));
        for _ in 0..100 {
            let counter = Rc::clone(&hits);
            renderer
                .render(
                    records(),
                    &settings,
                    Box::new(move |_| counter.set(counter.get() + 1)),
                )
                .unwrap();
        }
        assert!(renderer.widget_mut().unwrap().click_row(0));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn container_follows_settings() {
        let mut renderer = TableRenderer::new();
        let settings = RenderSettings::default().table_height(75u16);
        renderer.render(records(), &settings, Box::new(|_| {})).unwrap();
        assert_eq!(renderer.container().height_percent, 75);

        let settings = RenderSettings::default().table_height(500u16);
        renderer.render(records(), &settings, Box::new(|_| {})).unwrap();
        assert_eq!(renderer.container().height_percent, 100);
    }

    #[test]
    fn failed_builds_leave_no_table() {
        let mut renderer = TableRenderer::new();
        renderer
            .render(records(), &RenderSettings::default(), Box::new(|_| {}))
            .unwrap();

        let broken = RenderSettings::default().page_length(0usize);
        let result = renderer.render(records(), &broken, Box::new(|_| {}));
        assert!(matches!(result, Err(FeedError::WidgetInit(_))));
        assert!(renderer.widget().is_none());
        assert!(renderer.container().error.is_some());

        renderer
            .render(records(), &RenderSettings::default(), Box::new(|_| {}))
            .unwrap();
        assert!(renderer.container().error.is_none());
    }

    #[test]
    fn bad_header_colors_fail_the_build() {
        let mut renderer = TableRenderer::new();
        let settings = RenderSettings::default().header_font_color("#zzzzzz");
        assert!(renderer.render(records(), &settings, Box::new(|_| {})).is_err());
        assert!(renderer.widget().is_none());
    }
}
