//! Manual TUI Entry Point
//!
//! Launches the terminal UI for asking questions about a vehicle manual.
//!
//! Usage:
//!   manual-tui [OPTIONS]
//!
//! Options:
//!   --base-url <URL>        Manual QA service (default: http://localhost:8000)
//!   --timeout-secs <SECS>   Answer timeout (default: 120)
//!   --config <PATH>         Config file (default: ~/.config/manual-qa/client.toml)

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use manual_conductor::{ConductorConfig, HttpManualApi};
use manual_tui::config::{self, ClientConfig, ConfigOverrides, DEFAULT_LOG_FILTER};
use manual_tui::{App, ConductorClient};

/// Terminal client for the vehicle manual QA service
#[derive(Debug, Parser)]
#[command(name = "manual-tui", version, about)]
struct Cli {
    /// Base URL of the manual QA service
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Seconds to wait for an answer
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Configuration file to read instead of the default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(path) = &self.config {
            overrides = overrides.with_config_path(path.clone());
        }
        if let Some(url) = &self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if let Some(secs) = self.timeout_secs {
            overrides = overrides.with_timeout_secs(secs);
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.overrides())?;
    init_logging(&config);

    tracing::info!(
        base_url = %config.base_url,
        source = %config.base_url_source(),
        timeout_secs = config.request_timeout.as_secs(),
        "Starting manual-tui"
    );

    // Check if we have a TTY before attempting initialization
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("❌ Error: manual-tui requires a terminal (TTY)");
        eprintln!();
        eprintln!("This usually means:");
        eprintln!("  • Running in a non-interactive environment (CI, container)");
        eprintln!("  • SSH without -t flag");
        eprintln!("  • Piped stdin/stdout");
        std::process::exit(1);
    }

    let api = HttpManualApi::new(config.api_config())?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal before printing panic
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let result = run_app(&mut terminal, api).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Show goodbye message after TUI closes
    if let Ok(Some(goodbye)) = &result {
        println!("\n\x1b[34mBot:\x1b[0m {goodbye}\n");
    }

    result.map(|_| ())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    api: HttpManualApi,
) -> anyhow::Result<Option<String>> {
    let client = ConductorClient::new(api, ConductorConfig::default());
    let mut app = App::new(client, config::transcript_dir());
    app.run(terminal).await?;
    Ok(app.goodbye().map(str::to_string))
}

/// Log to a file so the alternate screen stays clean
fn init_logging(config: &ClientConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let file = config.log_path().and_then(|path| {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });
    let writer = match file {
        Some(file) => BoxMakeWriter::new(Mutex::new(file)),
        None => BoxMakeWriter::new(io::sink),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .with(filter)
        .init();
}
