//! X52 Panel - demo for the X52 Pro multi-function display
//!
//! Opens a session, creates the pages described in the config file and keeps
//! them updated until the run time elapses or CTRL+C is pressed.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x52_panel::config::{Backend, PageConfig, PanelConfig};
use x52_panel::device::{DirectOutput, SimulatedController, SOFT_BUTTON_DOWN};
use x52_panel::{LedColor, PageHandle, Session, SessionEvent, X52Button};

/// Seconds between demo updates
const TICK_SECONDS: u64 = 2;

/// X52 Panel - drive the Saitek X52 Pro MFD and button LEDs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "x52-panel.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override how long the demo runs, in seconds
    #[arg(long)]
    run_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting X52 Panel...");
    info!("Configuration file: {}", args.config);

    let mut config = if Path::new(&args.config).exists() {
        PanelConfig::load(&args.config).await?
    } else {
        warn!("Configuration file not found, using defaults");
        PanelConfig::default()
    };
    if config.pages.is_empty() {
        config.pages = demo_pages();
    }
    let run_for = Duration::from_secs(args.run_seconds.unwrap_or(config.run_seconds));

    let (driver, simulated) = open_driver(&config)?;
    let options = config.session_options();
    let session = tokio::task::spawn_blocking(move || Session::open(options, move || driver))
        .await
        .context("Session startup task failed")?
        .context("Failed to open X52 Pro session")?;
    info!(device = ?session.device(), "Session ready");

    tokio::spawn(log_events(session.subscribe()));

    let pages = create_pages(&session, &config.pages).await?;
    info!("{} page(s) created", pages.len());

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = tokio::time::sleep(run_for) => info!("Run time of {:?} elapsed", run_for),
        result = run_demo(&pages, simulated) => {
            if let Err(e) = result {
                warn!("Demo stopped: {}", e);
            }
        }
    }

    for page in &pages {
        if let Some(snapshot) = page.snapshot_async().await? {
            debug!("Final page state: {}", serde_json::to_string(&snapshot)?);
        }
    }

    session.close_async().await?;
    info!("X52 Panel shutdown complete");
    Ok(())
}

/// Pick the driver backend; the simulated one also hands back its controller
fn open_driver(
    config: &PanelConfig,
) -> Result<(Box<dyn DirectOutput + Send>, Option<SimulatedController>)> {
    match config.backend {
        Backend::Simulated => {
            info!("Using simulated DirectOutput backend");
            let controller = SimulatedController::with_device(config.device_class);
            Ok((Box::new(controller.device()), Some(controller)))
        }
        #[cfg(all(windows, feature = "directoutput"))]
        Backend::DirectOutput => {
            let driver = x52_panel::device::native::NativeDirectOutput::load(&config.library_paths)
                .context("Failed to load DirectOutput.dll")?;
            Ok((Box::new(driver), None))
        }
        #[cfg(not(all(windows, feature = "directoutput")))]
        Backend::DirectOutput => {
            anyhow::bail!("The directoutput backend needs Windows and the `directoutput` feature")
        }
    }
}

async fn create_pages(session: &Session, configs: &[PageConfig]) -> Result<Vec<PageHandle>> {
    let mut pages = Vec::with_capacity(configs.len());
    for config in configs {
        let page = session
            .add_page_async(config.title.as_str(), config.max_lines)
            .await
            .with_context(|| format!("Failed to add page '{}'", config.title))?;
        for line in &config.lines {
            page.add_line(line.as_str())?;
        }
        for (button, color) in &config.leds {
            page.set_color(*button, *color)?;
        }
        pages.push(page);
    }
    Ok(pages)
}

/// Pages shown when the config file defines none
fn demo_pages() -> Vec<PageConfig> {
    vec![
        PageConfig {
            title: "Status".to_string(),
            max_lines: 20,
            lines: vec!["X52 Panel".to_string(), "ready".to_string()],
            leds: [
                (X52Button::FireA, LedColor::Green),
                (X52Button::Toggle1_2, LedColor::Amber),
                (X52Button::Throttle, LedColor::On),
            ]
            .into_iter()
            .collect(),
        },
        PageConfig {
            title: "Log".to_string(),
            max_lines: 50,
            lines: Vec::new(),
            leds: [(X52Button::Clutch, LedColor::Red)].into_iter().collect(),
        },
    ]
}

/// Keep the display busy: append a line every tick and, on the simulated
/// device, flip pages and press "down" like a user would
async fn run_demo(pages: &[PageHandle], simulated: Option<SimulatedController>) -> Result<()> {
    let Some(log_page) = pages.last() else {
        return std::future::pending().await;
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(TICK_SECONDS));
    let mut tick: u64 = 0;
    loop {
        ticker.tick().await;
        tick += 1;
        log_page.add_line(format!("tick {}", tick))?;

        if let Some(controller) = &simulated {
            let target = pages[(tick as usize) % pages.len()].index();
            controller.select_page(target);
            controller.press_soft_buttons(SOFT_BUTTON_DOWN);
        }
    }
}

async fn log_events(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::PageActivated { page }) => info!(page, "Page activated"),
            Ok(SessionEvent::DriverCallFailed { op, page, error }) => {
                warn!(%op, ?page, %error, "Driver call failed")
            }
            Ok(SessionEvent::Closed) | Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagging"),
        }
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(true),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}
