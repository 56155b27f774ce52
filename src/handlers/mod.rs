pub mod list;
pub mod prompt;
pub mod run;
