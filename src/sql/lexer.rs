//! Tokenizer for CREATE TABLE statements.

use std::iter::Peekable;
use std::str::Chars;

/// DDL token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Table,
    If,
    Not,
    Exists,
    Primary,
    Key,
    Foreign,
    References,
    Null,
    Unique,
    Default,
    On,
    Constraint,
    Index,
    Check,
    AutoIncrement,
    /// SERIAL, BIGSERIAL or SMALLSERIAL, upper-cased.
    Serial(String),

    Ident(String),
    Str(String),
    Num(String),

    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    Eof,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Look one character past the current one.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('-') if self.peek_second() == Some('-') => self.skip_line(),
                Some('#') => self.skip_line(),
                Some('/') if self.peek_second() == Some('*') => {
                    self.chars.next();
                    self.chars.next();
                    let mut prev = '\0';
                    for c in self.chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                _ => break,
            }
        }
    }

    fn skip_line(&mut self) {
        for c in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    /// Read up to `close`; a doubled delimiter is an escaped delimiter.
    fn read_delimited(&mut self, close: char, backslash_escapes: bool) -> String {
        self.chars.next();
        let mut text = String::new();
        while let Some(c) = self.chars.next() {
            if c == close {
                if close != ']' && self.chars.peek() == Some(&close) {
                    self.chars.next();
                    text.push(c);
                    continue;
                }
                break;
            }
            if c == '\\' && backslash_escapes {
                match self.chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(other) => text.push(other),
                    None => break,
                }
                continue;
            }
            text.push(c);
        }
        text
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        if self.chars.peek() == Some(&'-') {
            num.push('-');
            self.chars.next();
        }
        let mut seen_dot = false;
        while let Some(&c) = self.chars.peek() {
            match c {
                '0'..='9' => num.push(c),
                '.' if !seen_dot => {
                    seen_dot = true;
                    num.push(c);
                }
                _ => break,
            }
            self.chars.next();
        }
        num
    }

    fn classify(word: String) -> Token {
        match word.to_ascii_uppercase().as_str() {
            "CREATE" => Token::Create,
            "TABLE" => Token::Table,
            "IF" => Token::If,
            "NOT" => Token::Not,
            "EXISTS" => Token::Exists,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "CHECK" => Token::Check,
            "AUTO_INCREMENT" | "AUTOINCREMENT" => Token::AutoIncrement,
            upper @ ("SERIAL" | "BIGSERIAL" | "SMALLSERIAL") => Token::Serial(upper.to_string()),
            _ => Token::Ident(word),
        }
    }

    /// Next token plus the source spelling when it was a bare word, so a
    /// keyword can still be read back as a name.
    fn next_lexeme(&mut self) -> (Token, Option<String>) {
        loop {
            self.skip_trivia();
            let Some(&c) = self.chars.peek() else {
                return (Token::Eof, None);
            };

            let single = match c {
                '(' => Some(Token::LParen),
                ')' => Some(Token::RParen),
                ',' => Some(Token::Comma),
                ';' => Some(Token::Semicolon),
                '.' => Some(Token::Dot),
                _ => None,
            };
            if let Some(token) = single {
                self.chars.next();
                return (token, None);
            }

            let token = match c {
                '"' => Token::Ident(self.read_delimited('"', false)),
                '`' => Token::Ident(self.read_delimited('`', false)),
                '[' => Token::Ident(self.read_delimited(']', false)),
                '\'' => Token::Str(self.read_delimited('\'', true)),
                '-' if self.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                    Token::Num(self.read_number())
                }
                c if c.is_ascii_digit() => Token::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.read_word();
                    return (Self::classify(word.clone()), Some(word));
                }
                _ => {
                    // Operators and stray punctuation carry no DDL meaning here.
                    self.chars.next();
                    continue;
                }
            };
            return (token, None);
        }
    }

    #[cfg(test)]
    fn tokenize(self) -> Vec<Token> {
        self.tokenize_words().into_iter().map(|(token, _)| token).collect()
    }

    /// Tokens paired with the spelling of bare words.
    pub fn tokenize_words(mut self) -> Vec<(Token, Option<String>)> {
        let mut lexemes = Vec::new();
        loop {
            let lexeme = self.next_lexeme();
            let done = lexeme.0 == Token::Eof;
            lexemes.push(lexeme);
            if done {
                return lexemes;
            }
        }
    }
}
