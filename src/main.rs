use clap::{Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use kanban::api::HttpTaskApi;
use kanban::app::App;
use kanban::clock::{Clock, SystemClock};
use kanban::config::{Config, LogConfig};
use kanban::filter::TaskFilterValidator;
use kanban::repository::InMemoryTaskRepository;
use kanban::server::{self, TaskController};
use kanban::service::TaskService;
use kanban::store::TaskStore;
use kanban::ui::run_app;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kanban", version, about = "Kanban task board")]
struct Cli {
    /// Config file (default: <config dir>/kanban/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the task REST API
    Serve {
        #[arg(long)]
        host: Option<IpAddr>,
        #[arg(long)]
        port: Option<u16>,
        /// Persist tasks to this JSON file
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
    /// Open the terminal board (default)
    Board {
        #[arg(long)]
        api_url: Option<String>,
    },
}

fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn setup_server_tracing(log: &LogConfig) {
    tracing_subscriber::registry()
        .with(env_filter(&log.filter))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

// The board owns the terminal, so it only ever logs to a file
fn setup_board_tracing(log: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = &log.file else {
        return Ok(());
    };
    let file = open_log_file(path)
        .map_err(|err| format!("Failed to open log file {}: {err}", path.display()))?;
    tracing_subscriber::registry()
        .with(env_filter(&log.filter))
        .with(fmt::layer().with_writer(file).with_ansi(false))
        .init();
    info!(path = %path.display(), "board tracing initialized");
    Ok(())
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    setup_server_tracing(&config.log);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repository = match &config.server.data_file {
        Some(path) => InMemoryTaskRepository::open(path.clone(), clock.clone()).await?,
        None => InMemoryTaskRepository::with_clock(clock.clone()),
    };
    let service = TaskService::with_clock(repository, clock);
    let controller = TaskController::new(service, TaskFilterValidator);

    server::serve(config.server_addr(), server::router(controller)).await?;
    Ok(())
}

async fn board(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Before the alternate screen, so the error stays visible
    setup_board_tracing(&config.log)?;

    let store = TaskStore::new(HttpTaskApi::new(config.client.api_url));
    store.load().await;
    let app = App::new(store);

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Board { api_url: None }) {
        Command::Serve {
            host,
            port,
            data_file,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if data_file.is_some() {
                config.server.data_file = data_file;
            }
            serve(config).await
        }
        Command::Board { api_url } => {
            if let Some(api_url) = api_url {
                config.client.api_url = api_url;
            }
            board(config).await
        }
    }
}
