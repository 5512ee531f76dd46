// Condition Expression Lexer
// Tokenizes gating expressions: $VAR, literals, = / != / &&

use std::fmt;

/// Token types for gating expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Environment variable reference: $NAME
    Var(String),
    /// Bare or quoted literal word
    Literal(String),
    /// Equality: = or ==
    Eq,
    /// Inequality: !=
    Ne,
    /// Logical AND: &&
    And,
    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Var(name) => write!(f, "${}", name),
            Token::Literal(s) => write!(f, "'{}'", s),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "!="),
            Token::And => write!(f, "&&"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer error
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Lexer for gating expressions
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            position: 0,
        }
    }

    /// Tokenize the whole input, appending an Eof marker.
    pub fn tokenize(input: &'a str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let (pos, ch) = match self.chars.peek().copied() {
            Some(pair) => pair,
            None => return Ok(Token::Eof),
        };
        self.position = pos;

        match ch {
            '$' => {
                self.chars.next();
                let name = self.read_ident();
                if name.is_empty() {
                    return Err(self.error("expected variable name after '$'"));
                }
                Ok(Token::Var(name))
            }
            '=' => {
                self.chars.next();
                // Accept both '=' and '=='
                if matches!(self.chars.peek(), Some((_, '='))) {
                    self.chars.next();
                }
                Ok(Token::Eq)
            }
            '!' => {
                self.chars.next();
                match self.chars.next() {
                    Some((_, '=')) => Ok(Token::Ne),
                    _ => Err(self.error("expected '=' after '!'")),
                }
            }
            '&' => {
                self.chars.next();
                match self.chars.next() {
                    Some((_, '&')) => Ok(Token::And),
                    _ => Err(self.error("expected '&' after '&'")),
                }
            }
            '\'' | '"' => {
                let quote = ch;
                self.chars.next();
                let mut value = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(self.error("unterminated string literal")),
                    }
                }
                Ok(Token::Literal(value))
            }
            c if is_word_char(c) => {
                let word = self.read_word();
                Ok(Token::Literal(word))
            }
            c => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn read_ident(&mut self) -> String {
        let mut ident = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        ident
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if is_word_char(c) {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            position: self.position,
        }
    }
}

/// Characters allowed in bare literal words (target triples included)
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':')
}
