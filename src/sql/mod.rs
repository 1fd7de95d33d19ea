//! SQL handling: lexing, the minimal statement tree, predicate injection and
//! identifier rewriting.

pub mod ast;
pub mod inject;
pub mod lexer;

pub use ast::{SelectStatement, SqlStatement, StatementKind};
pub use inject::{inject_predicate, inject_statements};

use crate::error::Result;
use sqlparser::tokenizer::Token;

/// Source text of each non-empty statement, without separators.
pub fn split_statements(sql: &str) -> Result<Vec<String>> {
    let lexemes = lexer::tokenize(sql)?;
    Ok(lexer::split_on_semicolons(lexemes)
        .into_iter()
        .map(lexer::trim_trivia)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| chunk.iter().map(|l| l.text.as_str()).collect())
        .collect())
}

/// Replaces every identifier token equal to `from` (ASCII case-insensitive)
/// with `to`. String literals and comments are never touched.
///
/// Returns `None` when nothing matched or the SQL cannot be tokenized.
pub fn replace_identifier(sql: &str, from: &str, to: &str) -> Option<String> {
    let lexemes = lexer::tokenize(sql).ok()?;
    let mut replaced = 0usize;

    let rewritten: String = lexemes
        .iter()
        .map(|lexeme| match &lexeme.token {
            Token::Word(word) if word.value.eq_ignore_ascii_case(from) => {
                replaced += 1;
                match word.quote_style {
                    None => to.to_string(),
                    Some(_) => lexeme.text.replacen(&word.value, to, 1),
                }
            }
            _ => lexeme.text.clone(),
        })
        .collect();

    (replaced > 0).then_some(rewritten)
}
