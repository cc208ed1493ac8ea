use anyhow::Context;
use cncconsole::{
    init_logging, load_tool_table, log_notifications, run, Console, ConsoleConfig, EventBus,
    FilePreferenceStore, OperatorEvent, Preferences, SimulatedMachine, DEFAULT_POLL_PERIOD,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ConsoleConfig> {
    match path {
        Some(path) => ConsoleConfig::load_from_file(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            tracing::info!("No configuration given, using defaults");
            Ok(ConsoleConfig::default())
        }
    }
}

// One JSON-encoded operator event per line; malformed lines are skipped.
async fn read_operator_events(tx: mpsc::UnboundedSender<OperatorEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<OperatorEvent>(&line) {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Ignoring operator input '{}': {}", line, e),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Reading operator input failed: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Operator input closed");
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;
    let store = FilePreferenceStore::default_location(Preferences::default())?;
    let tools = load_tool_table(&config)?;
    let machine = SimulatedMachine::new(config.num_axes());

    let bus = Arc::new(EventBus::new());
    log_notifications(&bus);

    let mut console = Console::new(machine, config, Box::new(store), tools, bus)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(read_operator_events(tx));

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Waiting for interrupt failed: {}", e);
            }
        };

        tracing::info!("CNC console {} running", cncconsole::VERSION);
        run(&mut console, DEFAULT_POLL_PERIOD, rx, shutdown)
            .await
            .context("status sync stopped")
    })
}
