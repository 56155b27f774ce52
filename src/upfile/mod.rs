pub mod ast;
pub mod lexer;
pub mod parser;
pub mod substitute;

pub use ast::{Cmd, Upfile};
pub use parser::{parse, UpfileError};
pub use substitute::{substitute, Scope, SubstituteError};

use anyhow::{Context, Result};
use std::io::Read;


/// Read and parse an Upfile from any reader (a file or stdin).
pub fn parse_upfile(mut rdr: impl Read) -> Result<Upfile> {
    let mut text = String::new();
    rdr.read_to_string(&mut text).context("Failed to read Upfile")?;
    Ok(parse(&text)?)
}
