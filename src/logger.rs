use env_logger::{Builder, Env};
use std::io::Write;

/// Dispatch log lines longer than this are cut unless running verbose.
pub const MAX_LOG_LINE: usize = 90;

/// Plain `message` lines on stderr. `RUST_LOG` still overrides the level.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

/// `[host] command`, truncated with `...` when not verbose.
pub fn dispatch_line(host: &str, cmd: &str, verbose: bool) -> String {
    let line = format!("[{}] {}", host, cmd);
    if verbose || line.chars().count() <= MAX_LOG_LINE {
        return line;
    }
    let cut: String = line.chars().take(MAX_LOG_LINE - 3).collect();
    format!("{}...", cut)
}
