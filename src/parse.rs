//! A minimal hand-rolled front end covering exactly the statement shapes
//! this engine executes: `CREATE TABLE`, `CREATE INDEX`, `DROP TABLE`,
//! `DROP INDEX`, and the three `SHOW` forms. Nothing else is recognized.

use crate::error::{Error, Result};

/// `CREATE TABLE` or `CREATE INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateKind {
    Table,
    Index,
}

/// `DROP TABLE` or `DROP INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Table,
    Index,
}

/// `SHOW TABLES`, `SHOW COLUMNS`, or `SHOW INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowKind {
    Tables,
    Columns,
    Index,
}

/// A parsed `CREATE TABLE`/`CREATE INDEX` statement.
#[derive(Debug, Clone)]
pub struct CreateStatement {
    pub kind: CreateKind,
    pub table_name: String,
    pub columns: Vec<(String, String)>,
    pub if_not_exists: bool,
    pub index_name: Option<String>,
    pub index_columns: Option<Vec<String>>,
    pub index_type: Option<String>,
}

/// A parsed `DROP TABLE`/`DROP INDEX` statement.
#[derive(Debug, Clone)]
pub struct DropStatement {
    pub kind: DropKind,
    pub name: String,
    pub index_name: Option<String>,
}

/// A parsed `SHOW ...` statement.
#[derive(Debug, Clone)]
pub struct ShowStatement {
    pub kind: ShowKind,
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    LParen,
    RParen,
    Comma,
    Semicolon,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            let (line, col) = (self.line, self.col);
            let Some(c) = self.peek() else { break };
            match c {
                '(' => {
                    self.advance();
                    tokens.push(Token::LParen);
                }
                ')' => {
                    self.advance();
                    tokens.push(Token::RParen);
                }
                ',' => {
                    self.advance();
                    tokens.push(Token::Comma);
                }
                ';' => {
                    self.advance();
                    tokens.push(Token::Semicolon);
                }
                c if c.is_alphanumeric() || c == '_' => {
                    let mut word = String::new();
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                        word.push(self.advance().unwrap());
                    }
                    tokens.push(Token::Word(word));
                }
                other => {
                    return Err(Error::Parse(format!(
                        "unexpected character '{other}' at line {line}, column {col}"
                    )));
                }
            }
        }
        Ok(tokens)
    }
}

/// Parses one statement out of `tokens`, tracking position for error
/// messages.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect_word(&mut self) -> Result<String> {
        match self.bump() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(Error::Parse(format!("expected an identifier, found {other:?}"))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        match self.bump() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => Ok(()),
            other => Err(Error::Parse(format!(
                "expected '{keyword}', found {other:?}"
            ))),
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.bump() {
            Some(t) if t == token => Ok(()),
            other => Err(Error::Parse(format!("expected {token:?}, found {other:?}"))),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.eat_keyword_token(Token::Semicolon);
        if self.peek().is_some() {
            return Err(Error::Parse("trailing input after statement".to_string()));
        }
        Ok(())
    }

    fn eat_keyword_token(&mut self, token: Token) -> bool {
        if self.peek() == Some(&token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse exactly one statement and assert no trailing input remains
    /// besides an optional terminating `;`.
    pub fn parse_statement(&mut self) -> Result<crate::exec::Statement> {
        let keyword = self.expect_word()?;
        let stmt = match keyword.to_ascii_uppercase().as_str() {
            "CREATE" => self.parse_create()?,
            "DROP" => self.parse_drop()?,
            "SHOW" => self.parse_show()?,
            other => return Err(Error::Parse(format!("unrecognized statement '{other}'"))),
        };
        self.finish()?;
        Ok(stmt)
    }

    fn parse_create(&mut self) -> Result<crate::exec::Statement> {
        let what = self.expect_word()?;
        match what.to_ascii_uppercase().as_str() {
            "TABLE" => {
                let if_not_exists = self.eat_keyword("IF") && {
                    self.expect_keyword("NOT")?;
                    self.expect_keyword("EXISTS")?;
                    true
                };
                let table_name = self.expect_word()?;
                self.expect(Token::LParen)?;
                let mut columns = Vec::new();
                loop {
                    let col = self.expect_word()?;
                    let ty = self.expect_word()?;
                    columns.push((col, ty));
                    if self.eat_keyword_token(Token::Comma) {
                        continue;
                    }
                    break;
                }
                self.expect(Token::RParen)?;
                Ok(crate::exec::Statement::Create(CreateStatement {
                    kind: CreateKind::Table,
                    table_name,
                    columns,
                    if_not_exists,
                    index_name: None,
                    index_columns: None,
                    index_type: None,
                }))
            }
            "INDEX" => {
                let index_name = self.expect_word()?;
                self.expect_keyword("ON")?;
                let table_name = self.expect_word()?;
                self.expect(Token::LParen)?;
                let mut cols = Vec::new();
                loop {
                    cols.push(self.expect_word()?);
                    if self.eat_keyword_token(Token::Comma) {
                        continue;
                    }
                    break;
                }
                self.expect(Token::RParen)?;
                let index_type = if self.eat_keyword("USING") {
                    Some(self.expect_word()?.to_ascii_uppercase())
                } else {
                    None
                };
                Ok(crate::exec::Statement::Create(CreateStatement {
                    kind: CreateKind::Index,
                    table_name,
                    columns: Vec::new(),
                    if_not_exists: false,
                    index_name: Some(index_name),
                    index_columns: Some(cols),
                    index_type,
                }))
            }
            other => Err(Error::Parse(format!(
                "expected TABLE or INDEX after CREATE, found '{other}'"
            ))),
        }
    }

    fn parse_drop(&mut self) -> Result<crate::exec::Statement> {
        let what = self.expect_word()?;
        match what.to_ascii_uppercase().as_str() {
            "TABLE" => {
                let name = self.expect_word()?;
                Ok(crate::exec::Statement::Drop(DropStatement {
                    kind: DropKind::Table,
                    name,
                    index_name: None,
                }))
            }
            "INDEX" => {
                let index_name = self.expect_word()?;
                self.expect_keyword("ON")?;
                let table = self.expect_word()?;
                Ok(crate::exec::Statement::Drop(DropStatement {
                    kind: DropKind::Index,
                    name: table,
                    index_name: Some(index_name),
                }))
            }
            other => Err(Error::Parse(format!(
                "expected TABLE or INDEX after DROP, found '{other}'"
            ))),
        }
    }

    fn parse_show(&mut self) -> Result<crate::exec::Statement> {
        let what = self.expect_word()?;
        match what.to_ascii_uppercase().as_str() {
            "TABLES" => Ok(crate::exec::Statement::Show(ShowStatement {
                kind: ShowKind::Tables,
                table_name: None,
            })),
            "COLUMNS" => {
                self.expect_keyword("FROM")?;
                let table_name = self.expect_word()?;
                Ok(crate::exec::Statement::Show(ShowStatement {
                    kind: ShowKind::Columns,
                    table_name: Some(table_name),
                }))
            }
            "INDEX" => {
                self.expect_keyword("FROM")?;
                let table_name = self.expect_word()?;
                Ok(crate::exec::Statement::Show(ShowStatement {
                    kind: ShowKind::Index,
                    table_name: Some(table_name),
                }))
            }
            other => Err(Error::Parse(format!(
                "expected TABLES, COLUMNS, or INDEX after SHOW, found '{other}'"
            ))),
        }
    }
}

/// Parse a single statement out of `input`.
pub fn parse(input: &str) -> Result<crate::exec::Statement> {
    Parser::new(input)?.parse_statement()
}
