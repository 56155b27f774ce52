use anyhow::{Context, Result};
use colored::*;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crate::runner::Confirm;

/// Asks on the terminal before each rolling group.
///
/// Tags roll in parallel, so questions are serialized through a lock.
#[derive(Default)]
pub struct StdinPrompt {
    lock: Mutex<()>,
}

impl Confirm for StdinPrompt {
    fn confirm(&self, tag: &str, next_group: usize) -> Result<bool> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let stdin = io::stdin();
        let mut input = stdin.lock();
        loop {
            print!("{} group {} next. do you want to continue? [Y/n] ", tag.bold(), next_group + 1);
            io::stdout().flush().context("Failed to flush prompt")?;
            let mut answer = String::new();
            if input.read_line(&mut answer).context("Failed to read answer")? == 0 {
                // stdin closed: nobody can say yes
                return Ok(false);
            }
            match parse_answer(&answer) {
                Some(proceed) => return Ok(proceed),
                None => println!("unknown input: {}", answer.trim()),
            }
        }
    }
}

/// `y`, `yes` or nothing proceeds; `n` or `no` stops; anything else asks again.
fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" | "" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
