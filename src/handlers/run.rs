use anyhow::{Result, bail};
use colored::*;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use crate::cli::Cli;
use crate::config::{load_inventory, load_upfile, load_vars};
use crate::handlers::prompt::StdinPrompt;
use crate::inventory::TagSelection;
use crate::runner::batch::make_batches;
use crate::runner::shell::{detect_shell, ShellExecutor, SystemShell};
use crate::runner::{HostOutcome, Orchestrator, RunSummary};
use crate::utils::calc_checksum;

pub fn handle_run(cli: &Cli) -> Result<()> {
    let current_dir = env::current_dir()?;
    let vars = load_vars(&current_dir)?;
    let shell = Arc::new(SystemShell::new(detect_shell(), vars.clone()));
    let summary = execute(cli, vars, shell)?;

    for (tag, report) in &summary.tags {
        for result in report.groups.iter().flatten() {
            debug!("{} [{}] {:?}", tag, result.host, result.outcome);
        }
        if report.stopped {
            warn!("{} {} stopped after {} group(s)", "⚠️".yellow(), tag.bold(), report.groups.len());
        }
    }
    info!(
        "{} success: {} deployed, {} already up to date",
        "✅".green(),
        summary.count(HostOutcome::Deployed),
        summary.count(HostOutcome::Satisfied)
    );
    Ok(())
}

/// Upfile → inventory → checksum → batches → orchestrated run.
fn execute(
    cli: &Cli,
    vars: HashMap<String, String>,
    shell: Arc<dyn ShellExecutor>,
) -> Result<RunSummary> {
    let upfile = load_upfile(&cli.upfile)?;

    // Like make, no command means the first one in the Upfile.
    let command = match &cli.command {
        Some(c) => {
            if upfile.get(c).is_none() {
                bail!("undefined command: {}", c);
            }
            c.clone()
        }
        None => upfile.default_command.clone(),
    };

    // No tags means the tag named after the command: `upgen app | up -f -`
    let selection = match &cli.tags {
        Some(tags) => tags.parse::<TagSelection>()?,
        None => TagSelection::only(&command),
    };
    let inventory = load_inventory(&cli.inventory)?.select(&selection)?;

    info!("{} Running {} on {}", "⚡".yellow(), command.bold(), selection);

    info!("calculating checksum");
    let checksum = calc_checksum(&cli.directory)?;
    debug!("checksum: {}", checksum);

    let batches = make_batches(&inventory.hosts_by_tag(), cli.serial, &mut rand::thread_rng())?;
    debug!("got batches: {:?}", batches);

    let mut orchestrator = Orchestrator::new(upfile.into(), &command, shell)?
        .vars(vars)
        .checksum(checksum)
        .verbose(cli.verbose);
    if cli.prompt {
        orchestrator = orchestrator.confirm(Arc::new(StdinPrompt::default()));
    }
    orchestrator.run(batches)
}
