use std::env;
use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::crossterm::execute;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod inputter;
mod markup;
mod model;
mod overlay;
mod record;
mod renderer;
mod sanitize;
mod settings;
mod source;
mod table;
mod ui;

use controller::Controller;
use domain::{AppConfig, FeedError, Message};
use model::{Model, Status};
use source::FeedSource;
use ui::TableUI;

/// Browse a news feed stored in a CSV, Parquet or Arrow file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Data file with title, date, summary, content and author columns
    #[arg(required_unless_present = "describe_settings")]
    path: Option<String>,

    /// TOML file with render settings (header colors, table height, page length)
    #[arg(short, long)]
    settings: Option<String>,

    /// Write logs to this file. Filter with RUST_LOG
    #[arg(long)]
    log_file: Option<String>,

    /// Event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Print the recognised settings with their defaults and exit
    #[arg(long)]
    describe_settings: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.describe_settings {
        print!("{}", settings::describe());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Err(e) => {
            error!("Exiting with error: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, FeedError> {
    expand_with(path, || env::var("HOME").ok(), |var| env::var(var).map(Some))
}

/// Expand `~` and `$VAR` in `path`, looking variables up with `context`.
fn expand_with<H, C>(path: &str, home: H, context: C) -> Result<PathBuf, FeedError>
where
    H: FnOnce() -> Option<String>,
    C: FnMut(&str) -> Result<Option<String>, env::VarError>,
{
    shellexpand::full_with_context(path, home, context)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| FeedError::LoadingFailed(e.to_string()))
}

fn init_logging(log_file: Option<&str>) -> Result<(), FeedError> {
    // The terminal belongs to the TUI, so logs only go to a file
    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(expand(path)?)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(cli: Cli) -> Result<(), FeedError> {
    let path = match cli.path.as_deref() {
        Some(path) => expand(path)?,
        None => return Err(FeedError::FileNotFound),
    };
    let settings_path = cli.settings.as_deref().map(expand).transpose()?;
    info!("Starting newsfeed on {}", path.display());

    let mut model = Model::init(FeedSource::new(path), settings_path);
    model.refresh()?;

    let cfg = AppConfig {
        event_poll_time: cli.poll_ms,
    };
    let mut ui = TableUI::new();
    let controller = Controller::new(&cfg);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), FeedError> {
        execute!(stdout(), EnableMouseCapture)?;
        let size = terminal.size()?;
        model.update(Some(Message::Resize(
            size.width as usize,
            size.height as usize,
        )))?;

        while model.status != Status::QUITTING {
            terminal.draw(|f| ui.draw(&model, f))?;
            let message = controller.handle_event(&model)?;
            model.update(message)?;
        }
        Ok(())
    })();

    let _ = execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}
