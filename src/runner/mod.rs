pub mod batch;
pub mod shell;

use anyhow::{Context, Result, bail};
use colored::*;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::collections::{BTreeMap, HashMap};
use std::sync::{mpsc, Arc};
use std::thread;

use crate::logger::dispatch_line;
use crate::upfile::{substitute, Cmd, Scope, Upfile};
use self::batch::Batches;
use self::shell::ShellExecutor;

/// Asked before each rolling group after the first one of a tag.
pub trait Confirm: Send + Sync {
    /// `Ok(false)` stops the tag's pipeline without failing the run.
    fn confirm(&self, tag: &str, next_group: usize) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOutcome {
    /// The main body ran and every line exited zero.
    Deployed,
    /// Every guard passed, so the main body was skipped.
    Satisfied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResult {
    pub host: String,
    pub outcome: HostOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    pub groups: Vec<Vec<HostResult>>,
    /// The operator declined to continue before every group ran.
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tags: BTreeMap<String, TagReport>,
}

impl RunSummary {
    pub fn count(&self, outcome: HostOutcome) -> usize {
        self.tags
            .values()
            .flat_map(|t| t.groups.iter().flatten())
            .filter(|r| r.outcome == outcome)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Non-zero exit means "condition failed".
    Guard,
    /// Non-zero exit is fatal for the group.
    Exec,
}

/// Runs one Upfile command over rolling batches of hosts.
///
/// Tags run in parallel, groups within a tag one after another, hosts within
/// a group in parallel. The first fatal error ends [`Orchestrator::run`];
/// pipelines of other tags are not cancelled, only no longer waited on.
pub struct Orchestrator {
    upfile: Arc<Upfile>,
    command: String,
    vars: HashMap<String, String>,
    checksum: String,
    verbose: bool,
    shell: Arc<dyn ShellExecutor>,
    confirm: Option<Arc<dyn Confirm>>,
}

impl Orchestrator {
    pub fn new(upfile: Arc<Upfile>, command: &str, shell: Arc<dyn ShellExecutor>) -> Result<Self> {
        if upfile.get(command).is_none() {
            bail!("undefined command: {}", command);
        }
        Ok(Self {
            upfile,
            command: command.to_string(),
            vars: HashMap::new(),
            checksum: String::new(),
            verbose: false,
            shell,
            confirm: None,
        })
    }

    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn run(self, batches: Batches) -> Result<RunSummary> {
        let this = Arc::new(self);
        let (tx, rx) = mpsc::channel();
        let total = batches.len();

        for (tag, groups) in batches {
            let this = Arc::clone(&this);
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("up-{}", tag))
                .spawn(move || {
                    let res = this.run_tag(&tag, groups);
                    // The receiver is gone once another tag has failed.
                    let _ = tx.send((tag, res));
                })
                .context("Failed to spawn tag pipeline")?;
        }
        drop(tx);

        let mut summary = RunSummary::default();
        for _ in 0..total {
            let (tag, res) = rx
                .recv()
                .context("A tag pipeline exited without reporting")?;
            let report = res.with_context(|| format!("tag {}", tag))?;
            summary.tags.insert(tag, report);
        }
        Ok(summary)
    }

    fn run_tag(&self, tag: &str, groups: Vec<Vec<String>>) -> Result<TagReport> {
        let cmd = self
            .upfile
            .get(&self.command)
            .with_context(|| format!("undefined command: {}", self.command))?;
        let total = groups.len();
        let mut report = TagReport::default();

        for (i, group) in groups.into_iter().enumerate() {
            if i > 0 {
                if let Some(confirm) = &self.confirm {
                    if !confirm.confirm(tag, i)? {
                        warn!("{} Stopping {} before group {}/{}", "✋".yellow(), tag.bold(), i + 1, total);
                        report.stopped = true;
                        break;
                    }
                }
            }
            info!(
                "{} {} group {}/{}: {}",
                "🚀".cyan(),
                tag.bold(),
                i + 1,
                total,
                group.join(", ")
            );
            let results = self.run_group(cmd, &group)?;
            report.groups.push(results);
        }
        Ok(report)
    }

    fn run_group(&self, cmd: &Cmd, hosts: &[String]) -> Result<Vec<HostResult>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(hosts.len())
            .build()
            .context("Failed to build host thread pool")?;
        let scope = Scope::new(&self.upfile).with_value("checksum", &self.checksum);

        // Guards gate the whole group: one failing host runs the body everywhere.
        let mut needs_run = false;
        for guard in &cmd.exec_ifs {
            let guard_cmd = self
                .upfile
                .get(guard)
                .with_context(|| format!("{} is undefined", guard))?;
            for step in &guard_cmd.execs {
                if !self.dispatch(&pool, &scope, step, hosts, Mode::Guard)? {
                    needs_run = true;
                }
            }
        }

        let outcome = |outcome: HostOutcome| -> Vec<HostResult> {
            hosts
                .iter()
                .map(|host| HostResult { host: host.clone(), outcome })
                .collect()
        };

        if !cmd.exec_ifs.is_empty() && !needs_run {
            info!("{} {} already up to date", "✨".green(), hosts.join(", "));
            return Ok(outcome(HostOutcome::Satisfied));
        }

        for line in &cmd.execs {
            let expanded = substitute(&self.vars, &scope, line)
                .with_context(|| format!("Failed to substitute: {}", line))?;
            // A substituted command may span several lines.
            for sub_line in expanded.split('\n').filter(|l| !l.trim().is_empty()) {
                self.dispatch(&pool, &scope, sub_line, hosts, Mode::Exec)?;
            }
        }
        Ok(outcome(HostOutcome::Deployed))
    }

    /// Run `line` on every host at once. Reports whether all of them passed.
    fn dispatch(
        &self,
        pool: &ThreadPool,
        scope: &Scope,
        line: &str,
        hosts: &[String],
        mode: Mode,
    ) -> Result<bool> {
        let results: Vec<Result<bool>> = pool.install(|| {
            hosts
                .par_iter()
                .map(|host| self.run_on_host(scope, line, host, mode))
                .collect()
        });

        let mut pass = true;
        let mut first_err = None;
        for res in results {
            match res {
                Ok(ok) => pass &= ok,
                Err(e) => {
                    pass = false;
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(pass),
        }
    }

    fn run_on_host(&self, scope: &Scope, line: &str, host: &str, mode: Mode) -> Result<bool> {
        let host_scope = scope.with_value("server", host);
        let cmd_line = substitute(&self.vars, &host_scope, line)
            .with_context(|| format!("[{}] Failed to substitute: {}", host, line))?;

        info!("{}", dispatch_line(host, &cmd_line, self.verbose));
        let out = self.shell.run(host, &cmd_line)?;
        if out.success() {
            return Ok(true);
        }
        match mode {
            Mode::Guard => {
                debug!(
                    "[{}] condition failed with exit code {}: {}",
                    host,
                    out.exit_code,
                    out.output.trim()
                );
                Ok(false)
            }
            Mode::Exec => bail!(
                "❌ [{}] failed at: '{}' -> Exit code {}",
                host,
                cmd_line,
                out.exit_code
            ),
        }
    }
}
