//! Minimal SQL statement tree
//!
//! Just enough structure to scope a query: a statement is either a SELECT
//! (optional WITH prefix, one or more bodies joined by set operators) or an
//! opaque token run. Parenthesized regions become groups, and a group whose
//! content is itself SELECT-shaped is parsed as a nested statement.
//!
//! Every node keeps its source text; rewrites only add `Inserted` nodes.

use crate::error::{EngineError, Result};
use crate::sql::lexer::{self, Lexeme};
use sqlparser::tokenizer::Token;
use std::fmt;

/// Clauses that may follow WHERE inside one SELECT body
const TRAILING_CLAUSES: &[&str] = &["HAVING", "LIMIT", "OFFSET", "WINDOW", "QUALIFY", "FETCH"];
const SET_OPERATORS: &[&str] = &["UNION", "INTERSECT", "EXCEPT"];
const WRITE_KEYWORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "MERGE"];

#[derive(Debug, Clone)]
pub enum Node {
    Lexeme(Lexeme),
    Group(Group),
    /// Text added by a rewrite
    Inserted(String),
}

#[derive(Debug, Clone)]
pub struct Group {
    pub open: Lexeme,
    pub body: GroupBody,
    pub close: Lexeme,
}

#[derive(Debug, Clone)]
pub enum GroupBody {
    Query(Box<SelectStatement>),
    Nodes(Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Other,
}

/// One parsed SQL statement
#[derive(Debug, Clone)]
pub enum SqlStatement {
    Select(SelectStatement),
    Opaque(Vec<Node>),
}

#[derive(Debug, Clone)]
pub struct SelectStatement {
    /// Everything before the first top-level SELECT (the WITH clause, if any)
    pub(crate) prefix: Vec<Node>,
    pub(crate) bodies: Vec<SelectBody>,
    /// `operators[i]` follows `bodies[i]`
    pub(crate) operators: Vec<Vec<Node>>,
}

#[derive(Debug, Clone)]
pub struct SelectBody {
    /// `SELECT ... FROM ...` up to WHERE or the first trailing clause
    pub(crate) head: Vec<Node>,
    pub(crate) selection: Option<Selection>,
    /// From the first trailing clause (`GROUP BY`, `ORDER BY`, ...) to the end
    pub(crate) tail: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub(crate) keyword: Node,
    pub(crate) condition: Vec<Node>,
}

impl Node {
    fn lexeme(&self) -> Option<&Lexeme> {
        match self {
            Node::Lexeme(lexeme) => Some(lexeme),
            _ => None,
        }
    }

    pub fn keyword(&self) -> Option<String> {
        self.lexeme().and_then(Lexeme::keyword)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.lexeme().map_or(false, |l| l.is_keyword(keyword))
    }

    pub fn is_trivia(&self) -> bool {
        self.lexeme().map_or(false, Lexeme::is_trivia)
    }

    fn is_set_operator(&self) -> bool {
        SET_OPERATORS.iter().any(|op| self.is_keyword(op))
    }
}

impl GroupBody {
    fn from_nodes(nodes: Vec<Node>) -> Self {
        if shape(&nodes) != Shape::Select {
            return GroupBody::Nodes(nodes);
        }
        match SelectStatement::parse(nodes) {
            Ok(query) => GroupBody::Query(Box::new(query)),
            Err(nodes) => GroupBody::Nodes(nodes),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Shape {
    Select,
    Write,
    Other,
}

fn first_keyword(nodes: &[Node]) -> Option<String> {
    nodes.iter().find(|n| !n.is_trivia()).and_then(Node::keyword)
}

fn shape(nodes: &[Node]) -> Shape {
    match first_keyword(nodes).as_deref() {
        Some("SELECT") => Shape::Select,
        // the main statement after the CTE list decides
        Some("WITH") => {
            let main = nodes.iter().find(|n| {
                n.is_keyword("SELECT") || WRITE_KEYWORDS.iter().any(|kw| n.is_keyword(kw))
            });
            match main {
                Some(node) if !node.is_keyword("SELECT") => Shape::Write,
                _ => Shape::Select,
            }
        }
        _ => Shape::Other,
    }
}

/// Nests parenthesized regions. Fails on unbalanced parentheses.
fn build_tree(lexemes: Vec<Lexeme>) -> std::result::Result<Vec<Node>, String> {
    let mut stack: Vec<(Option<Lexeme>, Vec<Node>)> = vec![(None, Vec::new())];

    for lexeme in lexemes {
        match lexeme.token {
            Token::LParen => stack.push((Some(lexeme), Vec::new())),
            Token::RParen => {
                let (open, inner) = match stack.pop() {
                    Some((Some(open), inner)) => (open, inner),
                    _ => return Err("unbalanced ')'".to_string()),
                };
                let group = Group {
                    open,
                    body: GroupBody::from_nodes(inner),
                    close: lexeme,
                };
                match stack.last_mut() {
                    Some((_, parent)) => parent.push(Node::Group(group)),
                    None => return Err("unbalanced ')'".to_string()),
                }
            }
            _ => match stack.last_mut() {
                Some((_, nodes)) => nodes.push(Node::Lexeme(lexeme)),
                None => return Err("unbalanced ')'".to_string()),
            },
        }
    }

    match stack.pop() {
        Some((None, root)) if stack.is_empty() => Ok(root),
        _ => Err("unbalanced '('".to_string()),
    }
}

impl SqlStatement {
    /// Parses every `;`-separated statement in `sql`.
    pub fn parse_all(sql: &str) -> Result<Vec<SqlStatement>> {
        let lexemes = lexer::tokenize(sql)?;
        let mut statements = Vec::new();

        for chunk in lexer::split_on_semicolons(lexemes) {
            let chunk = lexer::trim_trivia(chunk);
            if chunk.is_empty() {
                continue;
            }
            let nodes = build_tree(chunk).map_err(|reason| EngineError::unparsable(sql, reason))?;
            statements.push(Self::from_nodes(sql, nodes)?);
        }

        if statements.is_empty() {
            return Err(EngineError::unparsable(sql, "no statements found"));
        }
        Ok(statements)
    }

    fn from_nodes(sql: &str, nodes: Vec<Node>) -> Result<Self> {
        match shape(&nodes) {
            Shape::Select => SelectStatement::parse(nodes)
                .map(SqlStatement::Select)
                .map_err(|_| EngineError::unparsable(sql, "WITH clause without a SELECT body")),
            Shape::Write | Shape::Other => Ok(SqlStatement::Opaque(nodes)),
        }
    }

    pub fn kind(&self) -> StatementKind {
        match self {
            SqlStatement::Select(_) => StatementKind::Select,
            SqlStatement::Opaque(_) => StatementKind::Other,
        }
    }

    /// Condition text of the first body's WHERE clause
    pub fn where_clause(&self) -> Option<String> {
        match self {
            SqlStatement::Select(select) => select.where_clause(),
            SqlStatement::Opaque(_) => None,
        }
    }

    /// SELECT statements nested one level down (subqueries and CTE bodies)
    pub fn subqueries(&self) -> Vec<&SelectStatement> {
        match self {
            SqlStatement::Select(select) => select.subqueries(),
            SqlStatement::Opaque(_) => Vec::new(),
        }
    }

    /// ANDs `predicate` into every SELECT body, nested ones included.
    /// Opaque statements are left untouched.
    pub fn inject(&mut self, predicate: &str) {
        if let SqlStatement::Select(select) = self {
            select.inject(predicate);
        }
    }
}

impl SelectStatement {
    /// Returns the nodes back when no top-level SELECT keyword exists.
    fn parse(mut nodes: Vec<Node>) -> std::result::Result<Self, Vec<Node>> {
        let select_at = match nodes.iter().position(|n| n.is_keyword("SELECT")) {
            Some(idx) => idx,
            None => return Err(nodes),
        };
        let rest = nodes.split_off(select_at);
        let prefix = nodes;

        let mut bodies = Vec::new();
        let mut operators = Vec::new();
        let mut current = Vec::new();
        let mut iter = rest.into_iter().peekable();

        while let Some(node) = iter.next() {
            if !node.is_set_operator() {
                current.push(node);
                continue;
            }
            bodies.push(SelectBody::parse(std::mem::take(&mut current)));
            let mut operator = vec![node];
            while iter.peek().map_or(false, |n| !n.is_keyword("SELECT")) {
                if let Some(n) = iter.next() {
                    operator.push(n);
                }
            }
            operators.push(operator);
        }
        if !current.is_empty() {
            bodies.push(SelectBody::parse(current));
        }

        Ok(Self {
            prefix,
            bodies,
            operators,
        })
    }

    pub fn where_clause(&self) -> Option<String> {
        self.bodies
            .first()
            .and_then(|body| body.selection.as_ref())
            .map(|selection| render(&selection.condition).trim().to_string())
    }

    pub fn subqueries(&self) -> Vec<&SelectStatement> {
        let mut found = Vec::new();
        collect_queries(&self.prefix, &mut found);
        for body in &self.bodies {
            collect_queries(&body.head, &mut found);
            if let Some(selection) = &body.selection {
                collect_queries(&selection.condition, &mut found);
            }
            collect_queries(&body.tail, &mut found);
        }
        for operator in &self.operators {
            collect_queries(operator, &mut found);
        }
        found
    }

    pub fn inject(&mut self, predicate: &str) {
        inject_nested(&mut self.prefix, predicate);
        for operator in &mut self.operators {
            inject_nested(operator, predicate);
        }
        for body in &mut self.bodies {
            body.inject(predicate);
        }
    }
}

impl SelectBody {
    fn parse(mut nodes: Vec<Node>) -> Self {
        let tail_at = (0..nodes.len()).find(|&i| starts_trailing_clause(&nodes, i));
        let where_at = nodes
            .iter()
            .position(|n| n.is_keyword("WHERE"))
            .filter(|&w| tail_at.map_or(true, |t| w < t));

        let tail = match tail_at {
            Some(idx) => nodes.split_off(idx),
            None => Vec::new(),
        };
        let selection = where_at.map(|idx| {
            let mut condition = nodes.split_off(idx);
            let keyword = condition.remove(0);
            Selection { keyword, condition }
        });

        Self {
            head: nodes,
            selection,
            tail,
        }
    }

    fn inject(&mut self, predicate: &str) {
        inject_nested(&mut self.head, predicate);
        inject_nested(&mut self.tail, predicate);

        match &mut self.selection {
            Some(selection) => {
                inject_nested(&mut selection.condition, predicate);
                let trailing = split_trailing_trivia(&mut selection.condition);
                let leading_len = selection.condition.iter().take_while(|n| n.is_trivia()).count();
                let existing: Vec<Node> = selection.condition.drain(leading_len..).collect();

                // (W) AND (p): an OR inside W must not escape the scope
                selection.condition.push(Node::Inserted("(".to_string()));
                selection.condition.extend(existing);
                selection
                    .condition
                    .push(Node::Inserted(format!(") AND ({})", predicate)));
                selection.condition.extend(trailing);
            }
            None => {
                let trailing = split_trailing_trivia(&mut self.head);
                let needs_gap = trailing.is_empty() && !self.tail.is_empty();
                self.head.push(Node::Inserted(format!(" WHERE {}", predicate)));
                if needs_gap {
                    self.head.push(Node::Inserted(" ".to_string()));
                }
                self.head.extend(trailing);
            }
        }
    }
}

fn starts_trailing_clause(nodes: &[Node], idx: usize) -> bool {
    let keyword = match nodes[idx].keyword() {
        Some(keyword) => keyword,
        None => return false,
    };
    match keyword.as_str() {
        // WITHIN GROUP (...) is not GROUP BY
        "GROUP" | "ORDER" => nodes[idx + 1..]
            .iter()
            .find(|n| !n.is_trivia())
            .map_or(false, |n| n.is_keyword("BY")),
        other => TRAILING_CLAUSES.contains(&other),
    }
}

fn split_trailing_trivia(nodes: &mut Vec<Node>) -> Vec<Node> {
    let keep = nodes.len() - nodes.iter().rev().take_while(|n| n.is_trivia()).count();
    nodes.split_off(keep)
}

fn inject_nested(nodes: &mut [Node], predicate: &str) {
    for node in nodes {
        if let Node::Group(group) = node {
            match &mut group.body {
                GroupBody::Query(query) => query.inject(predicate),
                GroupBody::Nodes(inner) => inject_nested(inner, predicate),
            }
        }
    }
}

fn collect_queries<'a>(nodes: &'a [Node], found: &mut Vec<&'a SelectStatement>) {
    for node in nodes {
        if let Node::Group(group) = node {
            match &group.body {
                GroupBody::Query(query) => found.push(query),
                GroupBody::Nodes(inner) => collect_queries(inner, found),
            }
        }
    }
}

fn render(nodes: &[Node]) -> String {
    nodes.iter().map(|n| n.to_string()).collect()
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Lexeme(lexeme) => f.write_str(&lexeme.text),
            Node::Inserted(text) => f.write_str(text),
            Node::Group(group) => {
                f.write_str(&group.open.text)?;
                match &group.body {
                    GroupBody::Query(query) => write!(f, "{}", query)?,
                    GroupBody::Nodes(nodes) => f.write_str(&render(nodes))?,
                }
                f.write_str(&group.close.text)
            }
        }
    }
}

impl fmt::Display for SelectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.head))?;
        if let Some(selection) = &self.selection {
            write!(f, "{}{}", selection.keyword, render(&selection.condition))?;
        }
        f.write_str(&render(&self.tail))
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.prefix))?;
        for (idx, body) in self.bodies.iter().enumerate() {
            write!(f, "{}", body)?;
            if let Some(operator) = self.operators.get(idx) {
                f.write_str(&render(operator))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlStatement::Select(select) => write!(f, "{}", select),
            SqlStatement::Opaque(nodes) => f.write_str(&render(nodes)),
        }
    }
}
