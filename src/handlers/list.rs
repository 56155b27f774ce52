use anyhow::Result;
use colored::*;

use crate::cli::Cli;
use crate::config::load_upfile;
use crate::upfile::Upfile;

pub fn handle_list(cli: &Cli) -> Result<()> {
    let upfile = load_upfile(&cli.upfile)?;
    print!("{}", render(&upfile));
    if cli.verbose {
        // The table as parsed, comments and spacing normalized.
        println!();
        print!("{}", upfile.to_source());
    }
    Ok(())
}

/// One line per command: name, guards, and a marker on the default.
fn render(upfile: &Upfile) -> String {
    let names = upfile.names();
    let max_len = names.iter().map(|n| n.len()).max().unwrap_or(0);

    let mut out = format!("{}\n", "Available Commands:".bold().underline());
    for name in names {
        let cmd = &upfile.commands[name];
        let padding = " ".repeat(max_len - name.len() + 2);
        let guards = if cmd.exec_ifs.is_empty() {
            String::new()
        } else {
            format!("if not: {}", cmd.exec_ifs.join(", "))
        };
        let default = if name == upfile.default_command { " (default)" } else { "" };
        let line = format!(
            "  {}{}{}{}",
            name.cyan(),
            padding,
            guards.italic(),
            default.dimmed()
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
