use clap::Parser;
use colored::*;
use env_logger::Env;

use crate::cli::{command::execute_command, Cli};

mod cli;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = execute_command(&cli.command) {
        eprintln!("{} {}", "❌ Error:".red().bold(), e);
        std::process::exit(1);
    }
}
