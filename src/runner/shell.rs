use anyhow::{Context, Result};
use colored::*;
use std::collections::HashMap;
use std::env;
use std::process::{Command, Stdio};

/// Exit status and combined stdout+stderr of one command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a fully substituted command line on behalf of one host.
///
/// Synchronous, no retries. `Err` means the command could not be started at
/// all; a non-zero exit is reported through [`ExecOutput::exit_code`].
pub trait ShellExecutor: Send + Sync {
    fn run(&self, host: &str, line: &str) -> Result<ExecOutput>;
}

/// Runs lines locally through `<shell> -c`; reaching a host is the line's job
/// (`ssh $server ...`).
pub struct SystemShell {
    shell: String,
    env: HashMap<String, String>,
}

impl SystemShell {
    pub fn new(shell: String, env: HashMap<String, String>) -> Self {
        Self { shell, env }
    }
}

impl ShellExecutor for SystemShell {
    fn run(&self, host: &str, line: &str) -> Result<ExecOutput> {
        // "cmd" on Windows takes /C, every POSIX-ish shell takes -c
        let flag = if self.shell.contains("cmd") && !self.shell.contains("sh") {
            "/C"
        } else {
            "-c"
        };

        let output = Command::new(&self.shell)
            .arg(flag)
            .arg(line)
            .envs(&self.env)
            .env("UP_SERVER", host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to spawn {} for [{}]", self.shell, host))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stdout.trim().is_empty() {
            println!("[{}] {}", host.cyan(), stdout.trim());
        }
        if !stderr.trim().is_empty() {
            eprintln!("[{}] {}", host.red(), stderr.trim());
        }

        Ok(ExecOutput {
            // Killed by a signal: no code, count it as a failure.
            exit_code: output.status.code().unwrap_or(1),
            output: format!("{}{}", stdout, stderr),
        })
    }
}

pub fn detect_shell() -> String {
    env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| if cfg!(windows) { "cmd".to_string() } else { "sh".to_string() })
}
