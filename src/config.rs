use anyhow::{Context, Result};
use colored::*;
use log::info;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::Path;

use crate::inventory::Inventory;
use crate::upfile::{parse_upfile, Upfile};

/// Parse the Upfile at `path`, or from stdin when `path` is "-".
pub fn load_upfile(path: &str) -> Result<Upfile> {
    if path == "-" {
        return parse_upfile(io::stdin().lock()).context("Failed to parse Upfile from stdin");
    }
    let file = fs::File::open(path).with_context(|| format!("Failed to open Upfile {:?}", path))?;
    parse_upfile(file).with_context(|| format!("Failed to parse Upfile {:?}", path))
}

pub fn load_inventory(path: &Path) -> Result<Inventory> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open inventory {:?}", path))?;
    Inventory::from_reader(file).with_context(|| format!("Failed to parse inventory {:?}", path))
}

/// Runtime variables available as `$NAME`.
///
/// 1. The process environment (base layer)
/// 2. `.env` in `dir`, or `.env.<UP_ENV>` when `UP_ENV` is set (override layer)
pub fn load_vars(dir: &Path) -> Result<HashMap<String, String>> {
    let mut vars: HashMap<String, String> = env::vars().collect();

    let env_filename = env::var("UP_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());
    let env_path = dir.join(&env_filename);

    if env_path.exists() {
        info!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());
        for item in dotenvy::from_path_iter(&env_path)
            .with_context(|| format!("Failed to read {}", env_filename))?
        {
            let (key, val) = item.with_context(|| format!("Failed to parse {}", env_filename))?;
            vars.insert(key, val);
        }
    }
    Ok(vars)
}
