use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use teleop_console::config::{PromptBackend, TeleopConfig};
use teleop_console::confirm::{TerminalPrompter, UiPrompter};
use teleop_console::link::{LinkHandle, LinkState};
use teleop_console::session::Session;
use teleop_console::telemetry::{GamepadSource, GilrsSource};
use teleop_console::ui::OperatorUI;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = setup_config().await?;
    setup_logging_env(config.prompt.backend);
    info!(
        "Link {} with {} prompts, telemetry {}",
        config.link.url,
        config.prompt.backend,
        if config.telemetry.enabled { "enabled" } else { "disabled" }
    );
    let source = setup_gamepad(&config);
    let shutdown = CancellationToken::new();

    match config.prompt.backend {
        PromptBackend::Window => run_window(&config, source, shutdown).await,
        PromptBackend::Terminal => run_terminal(&config, source, shutdown).await,
    }
}

async fn run_window(
    config: &TeleopConfig,
    source: Option<Box<dyn GamepadSource>>,
    shutdown: CancellationToken,
) -> Result<()> {
    // One prompt in flight at a time; the service never asks concurrently.
    let (prompter, prompts) = UiPrompter::channel(1);
    let (session, link) = Session::connect(config, prompter, source, shutdown).await?;
    let link_state = link.subscribe();
    let status = session.status();

    info!("Starting operator window");
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([640.0, 360.0]),
        ..Default::default()
    };
    let result = eframe::run_native(
        "Teleop Console",
        native_options,
        Box::new(move |cc| Ok(Box::new(OperatorUI::new(cc, prompts, link_state, status)))),
    );

    info!("Operator window closed");
    session.shutdown().await;
    result.map_err(|e| eyre!("Operator window failed: {}", e))
}

async fn run_terminal(
    config: &TeleopConfig,
    source: Option<Box<dyn GamepadSource>>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (session, link) =
        Session::connect(config, TerminalPrompter::stdio(), source, shutdown).await?;
    info!("Console running, press Ctrl-C to stop");

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
            info!("Ctrl-C received");
        }
        _ = wait_for_close(&link) => warn!("Link closed by peer"),
    }

    session.shutdown().await;
    Ok(())
}

async fn wait_for_close(link: &LinkHandle) {
    let mut state = link.subscribe();
    if state.wait_for(|s| *s == LinkState::Closed).await.is_err() {
        warn!("Link state feed ended");
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn setup_logging_env(backend: PromptBackend) {
    // Terminal prompts own stdout.
    let writer = if backend.owns_stdout() {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    FmtSubscriber::builder()
        .with_writer(writer)
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<TeleopConfig> {
    let path = TeleopConfig::default_path();
    TeleopConfig::ensure_default(&path).await?;
    Ok(TeleopConfig::load(&path).await?)
}

fn setup_gamepad(config: &TeleopConfig) -> Option<Box<dyn GamepadSource>> {
    if !config.telemetry.enabled {
        info!("Telemetry disabled in config");
        return None;
    }
    match GilrsSource::new() {
        Ok(source) => Some(Box::new(source)),
        Err(e) => {
            warn!("Continuing without telemetry: {}", e);
            None
        }
    }
}
