use anyhow::Result;
use clap::Parser;
use log::info;
use simple_logger::SimpleLogger;
use tokio::sync::mpsc;
use tracelog_monitor::{config, console, monitor, sse};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;

    SimpleLogger::new().with_level(config.log_level()?).init()?;

    info!("Starting tracelog-monitor");
    info!("Report feed: {}{}", config.server_url, config.report_path);

    let transport = sse::SseTransport::new(config.server_url.clone());
    let mut monitor = monitor::Monitor::new(&config, transport);
    monitor.connect();

    // Console input is the only other task; everything else happens on
    // the monitor loop.
    let (command_tx, command_rx) = mpsc::channel(32);
    tokio::spawn(console::read_stdin(command_tx));

    println!("{}", console::HELP);
    monitor.run(command_rx).await;

    info!("Shutting down");
    Ok(())
}
