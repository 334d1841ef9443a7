use log::info;
use metronome_core::Config;
use metronome_server::{logging, run_server};

#[tokio::main]
async fn main() {
    logging::init_logger();

    info!("Starting metronome...");

    run_server(Config::default()).await;
}
