use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "up",
    version,
    about = "Up: deploy with an Upfile, one rolling batch at a time",
    after_help = "Upfile commands run only when one of their guards exits non-zero.\n\
                  Inside commands, $server is the current host and $checksum the\n\
                  checksum of --directory. Exits 0 on success, 1 on any failure."
)]
pub struct Cli {
    /// Path to the Upfile, or "-" to read it from stdin
    #[arg(short = 'f', long = "upfile", default_value = "Upfile")]
    pub upfile: String,

    /// Path to the JSON inventory (host -> tags)
    #[arg(short = 'i', long = "inventory", default_value = "inventory.json")]
    pub inventory: PathBuf,

    /// Command to run (defaults to the first command in the Upfile)
    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    /// Comma-separated inventory tags, or "all" (defaults to the command name)
    #[arg(short = 't', long = "tags")]
    pub tags: Option<String>,

    /// How many servers of one tag to operate on at a time (0 = all of them)
    #[arg(short = 'n', long = "serial", default_value_t = 1)]
    pub serial: usize,

    /// Directory used to calculate $checksum
    #[arg(short = 'd', long = "directory", default_value = ".")]
    pub directory: PathBuf,

    /// Prompt before moving to the next batch
    #[arg(short = 'p', long = "prompt")]
    pub prompt: bool,

    /// Log full commands instead of truncating them
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// List the commands in the Upfile and exit
    #[arg(short = 'l', long = "list")]
    pub list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["up"]);
        assert_eq!(cli.upfile, "Upfile");
        assert_eq!(cli.inventory, PathBuf::from("inventory.json"));
        assert_eq!(cli.serial, 1);
        assert!(cli.command.is_none() && cli.tags.is_none());
        assert!(!cli.prompt && !cli.verbose && !cli.list);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["up", "-f", "-", "-c", "deploy", "-t", "web,db", "-n", "0", "-p", "-v"]);
        assert_eq!(cli.upfile, "-");
        assert_eq!(cli.command.as_deref(), Some("deploy"));
        assert_eq!(cli.tags.as_deref(), Some("web,db"));
        assert_eq!(cli.serial, 0);
        assert!(cli.prompt && cli.verbose);
    }
}
