mod cli;
mod config;
mod handlers;
mod inventory;
mod logger;
mod runner;
mod upfile;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use handlers::{list, run};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    if cli.list {
        list::handle_list(&cli)
    } else {
        run::handle_run(&cli)
    }
}
