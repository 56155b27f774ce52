use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Error,
    Space,
    Tab,
    Newline,
    Text,
    Comment,
    // Keywords
    Inventory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

impl<'a> Token<'a> {
    fn new(kind: TokenKind, text: &'a str) -> Self {
        Self { kind, text }
    }
}

fn keyword(text: &str) -> Option<TokenKind> {
    match text {
        "inventory" => Some(TokenKind::Inventory),
        _ => None,
    }
}

fn is_end_of_line(c: char) -> bool {
    c == '\r' || c == '\n'
}

/// Pull-based tokenizer over Upfile text.
///
/// Yields tokens on demand and ends with a single `Eof` (or `Error`) token;
/// after that the iterator is exhausted.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    done: bool,
    error: Option<String>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            done: false,
            error: None,
        }
    }

    /// Message carried by the error token, once one has been emitted.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|&(i, _)| i).unwrap_or(self.input.len())
    }

    fn errorf(&mut self, msg: String) -> Token<'a> {
        self.done = true;
        self.error = Some(msg);
        Token::new(TokenKind::Error, "")
    }

    fn lex_spaces(&mut self, start: usize) -> Token<'a> {
        while let Some(&(_, ' ')) = self.chars.peek() {
            self.chars.next();
        }
        let end = self.pos();
        Token::new(TokenKind::Space, &self.input[start..end])
    }

    fn lex_comment(&mut self, start: usize) -> Token<'a> {
        while let Some(&(_, c)) = self.chars.peek() {
            if is_end_of_line(c) {
                break;
            }
            self.chars.next();
        }
        let end = self.pos();
        Token::new(TokenKind::Comment, &self.input[start..end])
    }

    fn lex_text(&mut self, start: usize) -> Token<'a> {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == ' ' || c == '\t' || is_end_of_line(c) || c == '\0' {
                break;
            }
            self.chars.next();
        }
        let end = self.pos();
        let text = &self.input[start..end];
        Token::new(keyword(text).unwrap_or(TokenKind::Text), text)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.done {
            return None;
        }
        let Some((start, c)) = self.chars.next() else {
            self.done = true;
            return Some(Token::new(TokenKind::Eof, ""));
        };
        let end = start + c.len_utf8();
        let token = match c {
            ' ' => self.lex_spaces(start),
            '\t' => Token::new(TokenKind::Tab, &self.input[start..end]),
            '\r' | '\n' => Token::new(TokenKind::Newline, &self.input[start..end]),
            '#' => self.lex_comment(start),
            '\0' => self.errorf(format!("unexpected NUL byte at offset {}", start)),
            _ => self.lex_text(start),
        };
        Some(token)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}
