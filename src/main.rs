use clap::Parser;
use log::{error, info};

use vg2roidb::{process_dataset, Args};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    for input in [&args.image_data, &args.objects, &args.relationships] {
        if !input.exists() {
            error!("The specified input does not exist: {}", input.display());
            std::process::exit(1);
        }
    }

    info!("Starting the encoding process...");

    if let Err(e) = process_dataset(&args) {
        error!("Failed to process dataset: {}", e);
        std::process::exit(1);
    }
}
