mod app;
mod viewer;

use std::io::stdout;
use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use opsdeck_core::BackendClient;
use opsdeck_core::Config;
use opsdeck_core::SessionGuard;
use opsdeck_core::StreamController;
use opsdeck_core::config::find_opsdeck_home;
use opsdeck_core::stream::SseTransport;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub use app::App;

pub async fn run_main(config: Config) -> Result<()> {
    // Logs go to a file; stdout belongs to the alternate screen.
    let _log_guard = init_logging()?;

    let client = BackendClient::new(&config);
    let guard = Arc::new(SessionGuard::new(client.clone(), config.api_key.clone()));
    let revalidation = guard.spawn_revalidation(config.status_interval);
    let controller = StreamController::new(
        Arc::new(SseTransport::new(client)),
        config.persist_output,
    );
    let mut app = App::new(guard, controller, config.read_only_args);

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;
    drop(revalidation);
    result
}

fn init_logging() -> Result<WorkerGuard> {
    let log_dir = find_opsdeck_home().join("log");
    std::fs::create_dir_all(&log_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        log_dir,
        "opsdeck-tui.log",
    ));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("opsdeck_core=info,opsdeck_tui=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}
