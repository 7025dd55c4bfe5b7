use clap::Parser;
use ddlkit_rs::cli::args::Cli;
use ddlkit_rs::cli::dispatch::handle;
use ddlkit_rs::logger::setup_logger;
use ddlkit_rs::model::config::{Config, LoggingConfig};
use log::error;

fn main() {
    let cli = Cli::parse();

    match Config::load(cli.config.as_deref(), cli.env.as_deref()) {
        Ok(config) => {
            setup_logger(cli.verbose, &config.logging);
            handle(cli, config);
        }
        Err(e) => {
            setup_logger(cli.verbose, &LoggingConfig::default());
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
