//! Hand-written lexer for gx source files.
//!
//! Two departures from a plain scanner, both forced by the language:
//! automatic semicolon insertion at line ends (the grammar is
//! newline-sensitive) and comment capture (doc comments carry compiler
//! directives, so comments are tokens the parser attaches, not trivia).

use crate::ast::{FileId, Span};
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals; the payload is the source text verbatim (quotes included
    // for strings and chars) so the backend can re-emit it untouched.
    Ident(String),
    Int(String),
    Float(String),
    Str(String),
    Char(String),
    /// Backtick string; payload is the interior (struct field tags).
    RawStr(String),
    /// `// …` comment, slashes included.
    Comment(String),

    // Keywords
    Package,
    Import,
    Func,
    Type,
    Struct,
    Interface,
    Var,
    Const,
    If,
    Else,
    For,
    Range,
    Return,
    Break,
    Continue,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,
    Ellipsis, // ...

    // Operators
    Assign, // =
    Define, // :=
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Shl,   // <<
    Shr,   // >>
    AndAnd,
    OrOr,
    Not, // !
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    Inc, // ++
    Dec, // --

    Eof,
}

impl Token {
    /// Whether a newline after this token inserts a semicolon.
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Char(_)
                | Token::RawStr(_)
                | Token::Return
                | Token::Break
                | Token::Continue
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Inc
                | Token::Dec
        )
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
    pub line: u32,
}

#[derive(Error, Debug)]
pub enum LexError {
    #[error("unexpected character: {0:?}")]
    UnexpectedChar(char, Span),
    #[error("unterminated string literal")]
    UnterminatedString(Span),
    #[error("unterminated character literal")]
    UnterminatedChar(Span),
    #[error("unterminated block comment")]
    UnterminatedComment(Span),
    #[error("malformed number: {0}")]
    MalformedNumber(String, Span),
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar(_, span) => *span,
            LexError::UnterminatedString(span) => *span,
            LexError::UnterminatedChar(span) => *span,
            LexError::UnterminatedComment(span) => *span,
            LexError::MalformedNumber(_, span) => *span,
        }
    }
}

pub struct Lexer<'a> {
    file: FileId,
    chars: Peekable<Chars<'a>>,
    pos: usize,
    line: u32,
    /// Last non-comment token, for semicolon insertion.
    last: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(file: FileId, input: &'a str) -> Self {
        Self {
            file,
            chars: input.chars().peekable(),
            pos: 0,
            line: 1,
            last: None,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.token == Token::Eof;
            if !matches!(tok.token, Token::Comment(_)) {
                self.last = Some(tok.token.clone());
            }
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn spanned(&self, token: Token, start: usize, line: u32) -> SpannedToken {
        SpannedToken {
            token,
            span: Span::new(self.file, start, self.pos),
            line,
        }
    }

    fn next_token(&mut self) -> Result<SpannedToken, LexError> {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('\n') => {
                    if self.last.as_ref().map_or(false, |t| t.ends_statement()) {
                        let start = self.pos;
                        let line = self.line;
                        self.advance();
                        return Ok(self.spanned(Token::Semi, start, line));
                    }
                    self.advance();
                }
                Some('/') => {
                    let start = self.pos;
                    let line = self.line;
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => {
                            self.advance();
                            self.advance();
                            let mut text = String::from("//");
                            while let Some(c) = self.peek() {
                                if c == '\n' {
                                    break;
                                }
                                text.push(c);
                                self.advance();
                            }
                            return Ok(self.spanned(Token::Comment(text), start, line));
                        }
                        Some('*') => {
                            self.advance();
                            self.advance();
                            let mut saw_newline = false;
                            loop {
                                match self.advance() {
                                    Some('*') if self.peek() == Some('/') => {
                                        self.advance();
                                        break;
                                    }
                                    Some('\n') => saw_newline = true,
                                    Some(_) => {}
                                    None => {
                                        return Err(LexError::UnterminatedComment(Span::new(
                                            self.file, start, self.pos,
                                        )))
                                    }
                                }
                            }
                            // A block comment spanning lines acts as a
                            // newline for semicolon insertion.
                            if saw_newline
                                && self.last.as_ref().map_or(false, |t| t.ends_statement())
                            {
                                return Ok(self.spanned(Token::Semi, start, line));
                            }
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }

        let start = self.pos;
        let line = self.line;

        let Some(c) = self.advance() else {
            let mut tok = self.spanned(Token::Eof, start, line);
            // Close a final statement that lacks a trailing newline.
            if self.last.as_ref().map_or(false, |t| t.ends_statement()) {
                tok.token = Token::Semi;
                self.pos = start;
            }
            return Ok(tok);
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            ';' => Token::Semi,
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    if self.advance() != Some('.') {
                        return Err(LexError::UnexpectedChar(
                            '.',
                            Span::new(self.file, start, self.pos),
                        ));
                    }
                    Token::Ellipsis
                } else {
                    Token::Dot
                }
            }
            ':' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Define
                } else {
                    Token::Colon
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Neq
                } else {
                    Token::Not
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Le
                } else if self.peek() == Some('<') {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::ShlAssign
                    } else {
                        Token::Shl
                    }
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Ge
                } else if self.peek() == Some('>') {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::ShrAssign
                    } else {
                        Token::Shr
                    }
                } else {
                    Token::Gt
                }
            }
            '+' => {
                if self.peek() == Some('+') {
                    self.advance();
                    Token::Inc
                } else if self.peek() == Some('=') {
                    self.advance();
                    Token::PlusAssign
                } else {
                    Token::Plus
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.advance();
                    Token::Dec
                } else if self.peek() == Some('=') {
                    self.advance();
                    Token::MinusAssign
                } else {
                    Token::Minus
                }
            }
            '*' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::StarAssign
                } else {
                    Token::Star
                }
            }
            '/' => {
                // Comments were handled above, so this is division.
                if self.peek() == Some('=') {
                    self.advance();
                    Token::SlashAssign
                } else {
                    Token::Slash
                }
            }
            '%' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::PercentAssign
                } else {
                    Token::Percent
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    Token::AndAnd
                } else if self.peek() == Some('=') {
                    self.advance();
                    Token::AmpAssign
                } else {
                    Token::Amp
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    Token::OrOr
                } else if self.peek() == Some('=') {
                    self.advance();
                    Token::PipeAssign
                } else {
                    Token::Pipe
                }
            }
            '^' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::CaretAssign
                } else {
                    Token::Caret
                }
            }
            '"' => self.lex_string(start)?,
            '\'' => self.lex_char(start)?,
            '`' => self.lex_raw_string(start)?,
            c if c.is_ascii_digit() => self.lex_number(c, start)?,
            c if c.is_alphabetic() || c == '_' => self.lex_ident(c),
            _ => {
                return Err(LexError::UnexpectedChar(
                    c,
                    Span::new(self.file, start, self.pos),
                ))
            }
        };

        Ok(self.spanned(token, start, line))
    }

    fn lex_string(&mut self, start: usize) -> Result<Token, LexError> {
        let mut s = String::from("\"");
        loop {
            match self.advance() {
                Some('"') => {
                    s.push('"');
                    break;
                }
                Some('\\') => {
                    s.push('\\');
                    match self.advance() {
                        Some(c) => s.push(c),
                        None => {
                            return Err(LexError::UnterminatedString(Span::new(
                                self.file, start, self.pos,
                            )))
                        }
                    }
                }
                Some('\n') | None => {
                    return Err(LexError::UnterminatedString(Span::new(
                        self.file, start, self.pos,
                    )))
                }
                Some(c) => s.push(c),
            }
        }
        Ok(Token::Str(s))
    }

    fn lex_char(&mut self, start: usize) -> Result<Token, LexError> {
        let mut s = String::from("'");
        match self.advance() {
            Some('\\') => {
                s.push('\\');
                match self.advance() {
                    Some(c) => s.push(c),
                    None => {
                        return Err(LexError::UnterminatedChar(Span::new(
                            self.file, start, self.pos,
                        )))
                    }
                }
            }
            Some(c) if c != '\'' => s.push(c),
            _ => {
                return Err(LexError::UnterminatedChar(Span::new(
                    self.file, start, self.pos,
                )))
            }
        }
        if self.advance() != Some('\'') {
            return Err(LexError::UnterminatedChar(Span::new(
                self.file, start, self.pos,
            )));
        }
        s.push('\'');
        Ok(Token::Char(s))
    }

    fn lex_raw_string(&mut self, start: usize) -> Result<Token, LexError> {
        let mut s = String::new();
        loop {
            match self.advance() {
                Some('`') => break,
                Some(c) => s.push(c),
                None => {
                    return Err(LexError::UnterminatedString(Span::new(
                        self.file, start, self.pos,
                    )))
                }
            }
        }
        Ok(Token::RawStr(s))
    }

    fn lex_number(&mut self, first: char, start: usize) -> Result<Token, LexError> {
        let mut s = String::new();
        s.push(first);

        if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            s.push(self.advance().unwrap());
            let mut any = false;
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    any = true;
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            if !any {
                return Err(LexError::MalformedNumber(
                    s,
                    Span::new(self.file, start, self.pos),
                ));
            }
            return Ok(Token::Int(s));
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if self.peek() == Some('.') {
            // `1.method` never occurs in the subset, but `[...]` does:
            // only consume the dot when a digit follows.
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek().map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                s.push('.');
                self.advance();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            s.push(self.advance().unwrap());
            if matches!(self.peek(), Some('+') | Some('-')) {
                s.push(self.advance().unwrap());
            }
            let mut any = false;
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    any = true;
                    s.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            if !any {
                return Err(LexError::MalformedNumber(
                    s,
                    Span::new(self.file, start, self.pos),
                ));
            }
        }

        if is_float {
            Ok(Token::Float(s))
        } else {
            Ok(Token::Int(s))
        }
    }

    fn lex_ident(&mut self, first: char) -> Token {
        let mut s = String::new();
        s.push(first);
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match s.as_str() {
            "package" => Token::Package,
            "import" => Token::Import,
            "func" => Token::Func,
            "type" => Token::Type,
            "struct" => Token::Struct,
            "interface" => Token::Interface,
            "var" => Token::Var,
            "const" => Token::Const,
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "range" => Token::Range,
            "return" => Token::Return,
            "break" => Token::Break,
            "continue" => Token::Continue,
            _ => Token::Ident(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(FileId(0), input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn basic_define() {
        assert_eq!(
            tokens("x := 42"),
            vec![
                Token::Ident("x".into()),
                Token::Define,
                Token::Int("42".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn semicolon_insertion_at_newline() {
        assert_eq!(
            tokens("x++\ny--\n"),
            vec![
                Token::Ident("x".into()),
                Token::Inc,
                Token::Semi,
                Token::Ident("y".into()),
                Token::Dec,
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operator() {
        assert_eq!(
            tokens("x +\ny"),
            vec![
                Token::Ident("x".into()),
                Token::Plus,
                Token::Ident("y".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_tokens() {
        let toks = tokens("//gx:extern rect::Rect\ntype Rect struct {}");
        assert_eq!(toks[0], Token::Comment("//gx:extern rect::Rect".into()));
        assert_eq!(toks[1], Token::Type);
    }

    #[test]
    fn trailing_comment_keeps_semicolon() {
        assert_eq!(
            tokens("x := 1 // note\ny := 2"),
            vec![
                Token::Ident("x".into()),
                Token::Define,
                Token::Int("1".into()),
                Token::Comment("// note".into()),
                Token::Semi,
                Token::Ident("y".into()),
                Token::Define,
                Token::Int("2".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn literals_verbatim() {
        assert_eq!(
            tokens(r#""foo" 'f' 1.25 0x2A"#),
            vec![
                Token::Str("\"foo\"".into()),
                Token::Char("'f'".into()),
                Token::Float("1.25".into()),
                Token::Int("0x2A".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn raw_string_interior() {
        assert_eq!(
            tokens("`default:\"42\"`"),
            vec![
                Token::RawStr("default:\"42\"".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn ellipsis_vs_dot() {
        assert_eq!(
            tokens("[...]int"),
            vec![
                Token::LBracket,
                Token::Ellipsis,
                Token::RBracket,
                Token::Ident("int".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            tokens("a << 2 >>= 1 &^x"),
            vec![
                Token::Ident("a".into()),
                Token::Shl,
                Token::Int("2".into()),
                Token::ShrAssign,
                Token::Int("1".into()),
                Token::Amp,
                Token::Caret,
                Token::Ident("x".into()),
                Token::Semi,
                Token::Eof,
            ]
        );
    }
}
