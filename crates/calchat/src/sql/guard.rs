//! Restricted statement guard.
//!
//! Generated SQL is untrusted model output feeding a command
//! interpreter, so it is parsed into a closed statement AST before
//! execution instead of being run as raw text. Exactly four statement
//! shapes over the fixed `calendar` table are admitted; everything else
//! is rejected with a reason. The grammar is deliberately smaller than
//! SQLite's: the translator's instruction never asks for more.

use std::fmt;

/// The only table statements may touch.
pub const TABLE_NAME: &str = "calendar";

/// The fixed schema columns.
pub const COLUMNS: [&str; 4] = ["day", "clock", "location", "passage"];

/// Why a candidate statement was refused.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardRejection {
    pub reason: String,
}

impl GuardRejection {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for GuardRejection {}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: CompareOp,
        value: Literal,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// A statement admitted by the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        columns: Vec<String>,
        values: Vec<Literal>,
    },
    /// `columns: None` means `SELECT *`.
    Select {
        columns: Option<Vec<String>>,
        filter: Option<Condition>,
        order_by: Option<OrderBy>,
    },
    Update {
        assignments: Vec<(String, Literal)>,
        filter: Option<Condition>,
    },
    Delete {
        filter: Option<Condition>,
    },
}

impl Statement {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Statement::Select { .. })
    }
}

/// Validate candidate SQL text against the closed grammar.
pub fn check(sql: &str) -> Result<Statement, GuardRejection> {
    let tokens = tokenize(sql)?;
    if tokens.is_empty() {
        return Err(GuardRejection::new("empty statement"));
    }
    let mut parser = Parser { tokens, index: 0 };
    let statement = parser.parse_statement()?;
    parser.expect_end()?;
    Ok(statement)
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Integer(i64),
    Text(String),
    Star,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(word) => format!("'{word}'"),
            Token::Integer(n) => format!("'{n}'"),
            Token::Text(_) => "string literal".to_string(),
            Token::Star => "'*'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::Eq => "'='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::LtEq => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::GtEq => "'>='".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, GuardRejection> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    return Err(GuardRejection::new("unexpected character '!'"));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::LtEq);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'>') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::GtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' => {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            value.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(GuardRejection::new("unterminated string literal"));
                        }
                    }
                }
                tokens.push(Token::Text(value));
            }
            '-' => {
                if matches!(chars.get(i + 1), Some(ch) if ch.is_ascii_digit()) {
                    let (number, next) = read_integer(&chars, i + 1, true)?;
                    tokens.push(number);
                    i = next;
                } else if chars.get(i + 1) == Some(&'-') {
                    return Err(GuardRejection::new("comments are not allowed"));
                } else {
                    return Err(GuardRejection::new("unexpected character '-'"));
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'*') {
                    return Err(GuardRejection::new("comments are not allowed"));
                }
                return Err(GuardRejection::new("unexpected character '/'"));
            }
            c if c.is_ascii_digit() => {
                let (number, next) = read_integer(&chars, i, false)?;
                tokens.push(number);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    word.push(chars[i]);
                    i += 1;
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(GuardRejection::new(format!(
                    "unexpected character '{other}'"
                )));
            }
        }
    }

    Ok(tokens)
}

fn read_integer(
    chars: &[char],
    start: usize,
    negative: bool,
) -> Result<(Token, usize), GuardRejection> {
    let mut i = start;
    let mut digits = String::new();
    while i < chars.len() && chars[i].is_ascii_digit() {
        digits.push(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        return Err(GuardRejection::new("non-integer numbers are not allowed"));
    }
    let value: i64 = digits
        .parse()
        .map_err(|_| GuardRejection::new(format!("integer out of range: {digits}")))?;
    let value = if negative { -value } else { value };
    Ok((Token::Integer(value), i))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn peek_is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_is_keyword(keyword) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), GuardRejection> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {}", keyword.to_uppercase())))
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), GuardRejection> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(GuardRejection::new(format!(
                "expected {}, found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(GuardRejection::new(format!(
                "expected {}, found end of statement",
                expected.describe()
            ))),
        }
    }

    fn unexpected(&self, context: &str) -> GuardRejection {
        match self.peek() {
            Some(token) => GuardRejection::new(format!("{context}, found {}", token.describe())),
            None => GuardRejection::new(format!("{context}, found end of statement")),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, GuardRejection> {
        if self.consume_keyword("insert") {
            self.parse_insert()
        } else if self.consume_keyword("select") {
            self.parse_select()
        } else if self.consume_keyword("update") {
            self.parse_update()
        } else if self.consume_keyword("delete") {
            self.parse_delete()
        } else {
            Err(self.unexpected("expected INSERT, SELECT, UPDATE, or DELETE"))
        }
    }

    fn expect_end(&mut self) -> Result<(), GuardRejection> {
        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.index += 1;
        }
        // One optional trailing semicolon; anything after it is a second
        // statement or junk.
        if self.index < self.tokens.len() {
            return Err(GuardRejection::new(
                "unexpected trailing input; only a single statement is allowed".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_table_name(&mut self) -> Result<(), GuardRejection> {
        match self.next() {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(TABLE_NAME) => Ok(()),
            Some(Token::Word(word)) => Err(GuardRejection::new(format!(
                "unknown table '{word}'; only '{TABLE_NAME}' is allowed"
            ))),
            _ => Err(GuardRejection::new("expected table name")),
        }
    }

    fn parse_column_name(&mut self) -> Result<String, GuardRejection> {
        match self.next() {
            Some(Token::Word(word)) => {
                let lowered = word.to_ascii_lowercase();
                if COLUMNS.contains(&lowered.as_str()) {
                    Ok(lowered)
                } else {
                    Err(GuardRejection::new(format!("unknown column '{word}'")))
                }
            }
            Some(token) => Err(GuardRejection::new(format!(
                "expected column name, found {}",
                token.describe()
            ))),
            None => Err(GuardRejection::new(
                "expected column name, found end of statement".to_string(),
            )),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, GuardRejection> {
        match self.next() {
            Some(Token::Integer(n)) => Ok(Literal::Integer(n)),
            Some(Token::Text(s)) => Ok(Literal::Text(s)),
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("select") => Err(
                GuardRejection::new("subqueries are not allowed".to_string()),
            ),
            Some(token) => Err(GuardRejection::new(format!(
                "expected a literal value, found {}",
                token.describe()
            ))),
            None => Err(GuardRejection::new(
                "expected a literal value, found end of statement".to_string(),
            )),
        }
    }

    fn parse_insert(&mut self) -> Result<Statement, GuardRejection> {
        self.expect_keyword("into")?;
        self.parse_table_name()?;

        let columns = if matches!(self.peek(), Some(Token::LParen)) {
            self.expect_token(Token::LParen)?;
            let mut columns = Vec::new();
            loop {
                let column = self.parse_column_name()?;
                if columns.contains(&column) {
                    return Err(GuardRejection::new(format!(
                        "duplicate column '{column}' in insert"
                    )));
                }
                columns.push(column);
                match self.next() {
                    Some(Token::Comma) => continue,
                    Some(Token::RParen) => break,
                    _ => return Err(GuardRejection::new("malformed column list")),
                }
            }
            columns
        } else {
            COLUMNS.iter().map(|c| c.to_string()).collect()
        };

        self.expect_keyword("values")?;
        self.expect_token(Token::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(GuardRejection::new("malformed value list")),
            }
        }

        if values.len() != columns.len() {
            return Err(GuardRejection::new(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }

        Ok(Statement::Insert { columns, values })
    }

    fn parse_select(&mut self) -> Result<Statement, GuardRejection> {
        let columns = if matches!(self.peek(), Some(Token::Star)) {
            self.index += 1;
            None
        } else {
            let mut columns = vec![self.parse_column_name()?];
            while matches!(self.peek(), Some(Token::Comma)) {
                self.index += 1;
                columns.push(self.parse_column_name()?);
            }
            Some(columns)
        };

        self.expect_keyword("from")?;
        self.parse_table_name()?;

        let filter = self.parse_optional_where()?;

        let order_by = if self.consume_keyword("order") {
            self.expect_keyword("by")?;
            let column = self.parse_column_name()?;
            let descending = if self.consume_keyword("desc") {
                true
            } else {
                let _ = self.consume_keyword("asc");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        Ok(Statement::Select {
            columns,
            filter,
            order_by,
        })
    }

    fn parse_update(&mut self) -> Result<Statement, GuardRejection> {
        self.parse_table_name()?;
        self.expect_keyword("set")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.parse_column_name()?;
            self.expect_token(Token::Eq)?;
            let value = self.parse_literal()?;
            assignments.push((column, value));
            if matches!(self.peek(), Some(Token::Comma)) {
                self.index += 1;
                continue;
            }
            break;
        }

        let filter = self.parse_optional_where()?;
        Ok(Statement::Update {
            assignments,
            filter,
        })
    }

    fn parse_delete(&mut self) -> Result<Statement, GuardRejection> {
        self.expect_keyword("from")?;
        self.parse_table_name()?;
        let filter = self.parse_optional_where()?;
        Ok(Statement::Delete { filter })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Condition>, GuardRejection> {
        if self.consume_keyword("where") {
            Ok(Some(self.parse_or_condition()?))
        } else {
            Ok(None)
        }
    }

    fn parse_or_condition(&mut self) -> Result<Condition, GuardRejection> {
        let mut condition = self.parse_and_condition()?;
        while self.consume_keyword("or") {
            let rhs = self.parse_and_condition()?;
            condition = Condition::Or(Box::new(condition), Box::new(rhs));
        }
        Ok(condition)
    }

    fn parse_and_condition(&mut self) -> Result<Condition, GuardRejection> {
        let mut condition = self.parse_primary_condition()?;
        while self.consume_keyword("and") {
            let rhs = self.parse_primary_condition()?;
            condition = Condition::And(Box::new(condition), Box::new(rhs));
        }
        Ok(condition)
    }

    fn parse_primary_condition(&mut self) -> Result<Condition, GuardRejection> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.index += 1;
            let condition = self.parse_or_condition()?;
            self.expect_token(Token::RParen)?;
            return Ok(condition);
        }

        let column = self.parse_column_name()?;
        let op = match self.next() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::NotEq,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::LtEq) => CompareOp::LtEq,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::GtEq) => CompareOp::GtEq,
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("like") => CompareOp::Like,
            Some(token) => {
                return Err(GuardRejection::new(format!(
                    "expected a comparison operator, found {}",
                    token.describe()
                )))
            }
            None => {
                return Err(GuardRejection::new(
                    "expected a comparison operator, found end of statement".to_string(),
                ))
            }
        };
        let value = self.parse_literal()?;
        Ok(Condition::Compare { column, op, value })
    }
}
