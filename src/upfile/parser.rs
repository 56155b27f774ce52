use std::collections::HashMap;
use thiserror::Error;

use crate::upfile::ast::{Cmd, Upfile};
use crate::upfile::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpfileError {
    #[error("{0}")]
    Lex(String),
    #[error("unexpected double indent in {0}")]
    DoubleIndent(String),
    #[error("unexpected end of file in command line for {0}")]
    UnexpectedEof(String),
    #[error("unexpected {found:?} in {context}")]
    UnexpectedToken { found: String, context: String },
    #[error("body lines of {0} must be indented with a tab, not spaces")]
    SpaceIndent(String),
    #[error("inventory blocks are not supported in an Upfile, use an inventory file")]
    InlineInventory,
    #[error("duplicate command {0}")]
    DuplicateCommand(String),
    #[error("nothing to exec for {0}")]
    NothingToExec(String),
    #[error("{0} depends on itself")]
    SelfReference(String),
    #[error("{guard} is undefined (guard of {command})")]
    UndefinedGuard { command: String, guard: String },
    #[error("empty Upfile, no commands defined")]
    Empty,
}

/// Parse Upfile text into a validated command table.
pub fn parse(text: &str) -> Result<Upfile, UpfileError> {
    let mut parser = Parser::new(text);
    parser.parse()?;
    let Parser {
        commands,
        default_command,
        ..
    } = parser;
    let default_command = default_command.ok_or(UpfileError::Empty)?;

    // Guards may be declared in any order, so they are checked once the whole
    // table is loaded.
    let mut names: Vec<&String> = commands.keys().collect();
    names.sort_unstable();
    for name in names {
        for guard in &commands[name].exec_ifs {
            if guard == name {
                return Err(UpfileError::SelfReference(name.clone()));
            }
            if !commands.contains_key(guard) {
                return Err(UpfileError::UndefinedGuard {
                    command: name.clone(),
                    guard: guard.clone(),
                });
            }
        }
    }

    Ok(Upfile {
        commands,
        default_command,
    })
}

struct Parser<'a> {
    lex: Lexer<'a>,
    backed_up: Option<Token<'a>>,
    commands: HashMap<String, Cmd>,
    default_command: Option<String>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lex: Lexer::new(text),
            backed_up: None,
            commands: HashMap::new(),
            default_command: None,
        }
    }

    fn next_token(&mut self) -> Result<Token<'a>, UpfileError> {
        let token = match self.backed_up.take() {
            Some(t) => t,
            // A fused lexer only runs dry after Eof or Error was handed out.
            None => self.lex.next().unwrap_or(Token {
                kind: TokenKind::Eof,
                text: "",
            }),
        };
        if token.kind == TokenKind::Error {
            let msg = self.lex.error().unwrap_or("lexer error").to_string();
            return Err(UpfileError::Lex(msg));
        }
        Ok(token)
    }

    /// Push one token back. Only one may be pending at a time.
    fn backup(&mut self, token: Token<'a>) {
        debug_assert!(self.backed_up.is_none());
        self.backed_up = Some(token);
    }

    fn skip_comment_line(&mut self) -> Result<Token<'a>, UpfileError> {
        loop {
            let tkn = self.next_token()?;
            if matches!(tkn.kind, TokenKind::Newline | TokenKind::Eof) {
                return Ok(tkn);
            }
        }
    }

    fn parse(&mut self) -> Result<(), UpfileError> {
        loop {
            let tkn = self.next_token()?;
            match tkn.kind {
                TokenKind::Eof => return Ok(()),
                TokenKind::Newline => continue,
                TokenKind::Comment => {
                    self.skip_comment_line()?;
                }
                TokenKind::Space => {
                    let after = self.next_token()?;
                    match after.kind {
                        TokenKind::Newline | TokenKind::Eof => self.backup(after),
                        TokenKind::Comment => {
                            self.skip_comment_line()?;
                        }
                        _ => {
                            return Err(UpfileError::UnexpectedToken {
                                found: tkn.text.to_string(),
                                context: "command header".to_string(),
                            });
                        }
                    }
                }
                TokenKind::Text => self.command(tkn.text)?,
                TokenKind::Inventory => return Err(UpfileError::InlineInventory),
                TokenKind::Tab => {
                    return Err(UpfileError::UnexpectedToken {
                        found: tkn.text.to_string(),
                        context: "command header".to_string(),
                    });
                }
                TokenKind::Error => unreachable!("next_token maps error tokens"),
            }
        }
    }

    fn command(&mut self, name: &str) -> Result<(), UpfileError> {
        if self.commands.contains_key(name) {
            return Err(UpfileError::DuplicateCommand(name.to_string()));
        }
        if self.default_command.is_none() {
            self.default_command = Some(name.to_string());
        }
        let mut cmd = Cmd::default();

        // Header: guard names until the newline.
        loop {
            let tkn = self.next_token()?;
            match tkn.kind {
                TokenKind::Text | TokenKind::Inventory => cmd.exec_ifs.push(tkn.text.to_string()),
                TokenKind::Space => {}
                TokenKind::Newline => break,
                TokenKind::Comment => {
                    if self.skip_comment_line()?.kind == TokenKind::Eof {
                        return Err(UpfileError::UnexpectedEof(name.to_string()));
                    }
                    break;
                }
                TokenKind::Eof => return Err(UpfileError::UnexpectedEof(name.to_string())),
                _ => {
                    return Err(UpfileError::UnexpectedToken {
                        found: tkn.text.to_string(),
                        context: format!("command line for {}", name),
                    });
                }
            }
        }

        // Body: tab-indented lines until the next unindented text.
        let mut indented = false;
        let mut line = String::new();
        loop {
            let tkn = self.next_token()?;
            match tkn.kind {
                TokenKind::Newline | TokenKind::Eof => {
                    indented = false;
                    let exec = line.trim_end();
                    if !exec.is_empty() {
                        cmd.execs.push(exec.to_string());
                    }
                    line.clear();
                    if tkn.kind == TokenKind::Eof {
                        break;
                    }
                }
                TokenKind::Tab => {
                    if !indented {
                        indented = true;
                    } else if line.is_empty() {
                        let after = self.next_token()?;
                        let trailing = matches!(after.kind, TokenKind::Newline | TokenKind::Eof)
                            || (after.kind == TokenKind::Tab);
                        if !trailing {
                            return Err(UpfileError::DoubleIndent(name.to_string()));
                        }
                        self.backup(after);
                    } else {
                        line.push_str(tkn.text);
                    }
                }
                TokenKind::Comment => {
                    // Drop the rest of the line; the newline flushes it.
                }
                TokenKind::Text | TokenKind::Inventory => {
                    if !indented {
                        self.backup(tkn);
                        break;
                    }
                    line.push_str(tkn.text);
                }
                TokenKind::Space => {
                    if indented {
                        line.push_str(tkn.text);
                        continue;
                    }
                    let after = self.next_token()?;
                    match after.kind {
                        TokenKind::Newline | TokenKind::Eof | TokenKind::Comment => {
                            self.backup(after)
                        }
                        _ => return Err(UpfileError::SpaceIndent(name.to_string())),
                    }
                }
                TokenKind::Error => unreachable!("next_token maps error tokens"),
            }
        }

        if cmd.execs.is_empty() {
            return Err(UpfileError::NothingToExec(name.to_string()));
        }
        self.commands.insert(name.to_string(), cmd);
        Ok(())
    }
}
