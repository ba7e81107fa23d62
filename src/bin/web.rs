use funnelboard::{app, loader};
use std::env;

/// Main entry point for the dashboard server.
///
/// # Arguments
/// * First positional argument: path to the CSV export
///   (default `data/funnel.csv`)
/// * Second positional argument: bind address
///   (default `127.0.0.1:3000`)
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let csv_path = args.get(1).map(String::as_str).unwrap_or("data/funnel.csv");
    let addr = args.get(2).map(String::as_str).unwrap_or("127.0.0.1:3000");

    let snapshot = loader::from_csv(csv_path)?;
    if snapshot.is_empty() {
        log::warn!("{csv_path} contains no data rows; the dashboard will show empty states");
    } else {
        log::info!("loaded {} daily rows from {csv_path}", snapshot.len());
    }

    app::run(snapshot, addr).await
}
