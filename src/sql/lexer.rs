//! SQL Lexer
//!
//! Wraps sqlparser's tokenizer and keeps the verbatim source text of every
//! token, so rendering a lexeme list reproduces its input byte for byte.

use crate::error::{EngineError, Result};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, TokenWithLocation, Tokenizer};

/// A token plus the exact source text it was lexed from
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub text: String,
}

impl Lexeme {
    /// Upper-cased word for unquoted identifiers and keywords
    pub fn keyword(&self) -> Option<String> {
        match &self.token {
            Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_ascii_uppercase()),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.token, Token::Word(w) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
    }

    /// Whitespace and comments
    pub fn is_trivia(&self) -> bool {
        matches!(self.token, Token::Whitespace(_))
    }
}

pub fn tokenize(sql: &str) -> Result<Vec<Lexeme>> {
    let dialect = GenericDialect {};
    let located = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| EngineError::unparsable(sql, format!("tokenizer: {}", e)))?;

    let starts = byte_offsets(sql, &located)
        .ok_or_else(|| EngineError::unparsable(sql, "token positions do not match the input"))?;

    let mut lexemes = Vec::with_capacity(located.len());
    for (idx, twl) in located.into_iter().enumerate() {
        if matches!(twl.token, Token::EOF) {
            continue;
        }
        let start = starts[idx];
        let end = starts.get(idx + 1).copied().unwrap_or(sql.len());
        if end < start {
            return Err(EngineError::unparsable(sql, "token positions are not monotonic"));
        }
        lexemes.push(Lexeme {
            token: twl.token,
            text: sql[start..end].to_string(),
        });
    }

    if lexemes.iter().map(|l| l.text.len()).sum::<usize>() != sql.len() {
        return Err(EngineError::unparsable(sql, "token spans do not cover the input"));
    }

    Ok(lexemes)
}

/// Converts the tokenizer's 1-based (line, column) start positions, counted in
/// chars, into byte offsets.
fn byte_offsets(sql: &str, located: &[TokenWithLocation]) -> Option<Vec<usize>> {
    let mut offsets = Vec::with_capacity(located.len());
    let mut chars = sql.char_indices().peekable();
    let (mut line, mut column) = (1u64, 1u64);

    for twl in located {
        let target = (twl.location.line, twl.location.column);
        while (line, column) < target {
            let (_, ch) = chars.next()?;
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        if (line, column) != target {
            return None;
        }
        offsets.push(chars.peek().map(|(i, _)| *i).unwrap_or(sql.len()));
    }

    Some(offsets)
}

/// Splits a lexeme stream on top-level `;`. Separators are dropped.
pub fn split_on_semicolons(lexemes: Vec<Lexeme>) -> Vec<Vec<Lexeme>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;

    for lexeme in lexemes {
        match lexeme.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::SemiColon if depth == 0 => {
                statements.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(lexeme);
    }
    statements.push(current);

    statements
}

/// Drops leading and trailing whitespace and comments.
pub fn trim_trivia(mut lexemes: Vec<Lexeme>) -> Vec<Lexeme> {
    while lexemes.last().map_or(false, Lexeme::is_trivia) {
        lexemes.pop();
    }
    let leading = lexemes.iter().take_while(|l| l.is_trivia()).count();
    lexemes.drain(..leading);
    lexemes
}
