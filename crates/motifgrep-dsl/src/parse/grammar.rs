use crate::error::CompileError;
use crate::parse::lexer::{Token, TokenKind};
use crate::skeleton::{Action, EdgeSpec};
use crate::value::{Op, Value};

/// One parsed motif statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Edge(EdgeStmt),
    Constraint(ConstraintStmt),
    MacroDef(MacroDef),
    MacroCall(MacroCall),
    Automorphism(String, String),
}

/// `U <rel> V [clauses] as NAME`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EdgeStmt {
    pub u: String,
    pub rel: EdgeSpec,
    pub v: String,
    pub clauses: Vec<Clause>,
    pub name: Option<String>,
}

/// One `key OP value` triple from a clause list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Clause {
    pub attr: String,
    pub op: Op,
    pub value: Value,
}

/// `ENTITY.attr OP rhs` where the entity is a node or a named edge;
/// which one is decided at the end of transformation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConstraintStmt {
    pub entity: String,
    pub attr: String,
    pub op: Op,
    pub rhs: Rhs,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Rhs {
    Literal(Value),
    /// `OTHER.attr`, making the constraint a dynamic attribute-to-attribute
    /// comparison.
    Attr { entity: String, attr: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MacroDef {
    pub name: String,
    pub formals: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MacroCall {
    pub name: String,
    pub args: Vec<String>,
}

/// Parse a token stream into top-level statements.
pub(crate) fn parse(tokens: Vec<Token>, source: &str) -> Result<Vec<Stmt>, CompileError> {
    Parser {
        tokens,
        pos: 0,
        lines: source.lines().map(str::to_string).collect(),
    }
    .run()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    lines: Vec<String>,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> CompileError {
        let token = &self.tokens[self.pos];
        CompileError::Syntax {
            line: token.line,
            column: token.column,
            message: message.into(),
            snippet: self
                .lines
                .get(token.line.saturating_sub(1))
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            TokenKind::Ident(_) => {
                let TokenKind::Ident(name) = self.bump().kind else {
                    unreachable!()
                };
                Ok(name)
            }
            other => Err(self.error_here(format!("expected {what}, found {}", other.describe()))),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CompileError> {
        if *self.peek() == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.error_here(format!(
                "expected {}, found {}",
                kind.describe(),
                self.peek().describe()
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == TokenKind::Newline {
            self.bump();
        }
    }

    fn run(mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if *self.peek() == TokenKind::Eof {
                return Ok(stmts);
            }
            stmts.push(self.statement(false)?);
            self.end_of_statement(false)?;
        }
    }

    /// A statement must end with a separator, EOF, or (inside a macro body)
    /// the closing brace.
    fn end_of_statement(&mut self, in_body: bool) -> Result<(), CompileError> {
        match self.peek() {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            TokenKind::RBrace if in_body => Ok(()),
            other => Err(self.error_here(format!(
                "expected end of statement, found {}",
                other.describe()
            ))),
        }
    }

    fn statement(&mut self, in_body: bool) -> Result<Stmt, CompileError> {
        if !matches!(self.peek(), TokenKind::Ident(_)) {
            return Err(self.error_here(format!(
                "expected a statement, found {}",
                self.peek().describe()
            )));
        }
        match self.peek_at(1) {
            TokenKind::Dot | TokenKind::LBracket => self.constraint().map(Stmt::Constraint),
            TokenKind::TripleEq => {
                if in_body {
                    return Err(
                        self.error_here("automorphism declarations are not allowed inside macros")
                    );
                }
                let a = self.expect_ident("node name")?;
                self.expect(TokenKind::TripleEq)?;
                let b = self.expect_ident("node name")?;
                Ok(Stmt::Automorphism(a, b))
            }
            TokenKind::LParen => self.macro_def_or_call(in_body),
            TokenKind::Dash | TokenKind::Bang | TokenKind::Tilde => self.edge().map(Stmt::Edge),
            other => Err(self.error_here(format!(
                "expected a relation, constraint, or macro after identifier, found {}",
                other.describe()
            ))),
        }
    }

    // -- edges --

    fn edge(&mut self) -> Result<EdgeStmt, CompileError> {
        let u = self.expect_ident("node name")?;
        let rel = self.relation()?;
        let v = self.expect_ident("node name")?;
        let clauses = if *self.peek() == TokenKind::LBracket {
            self.clause_list()?
        } else {
            Vec::new()
        };
        let name = if *self.peek() == TokenKind::Ident("as".to_string()) {
            self.bump();
            Some(self.expect_ident("edge name")?)
        } else {
            None
        };
        Ok(EdgeStmt {
            u,
            rel,
            v,
            clauses,
            name,
        })
    }

    fn relation(&mut self) -> Result<EdgeSpec, CompileError> {
        let exists = match self.peek() {
            TokenKind::Dash => true,
            TokenKind::Bang | TokenKind::Tilde => false,
            other => {
                return Err(self.error_here(format!(
                    "expected an existence marker ('-', '!', or '~'), found {}",
                    other.describe()
                )));
            }
        };
        self.bump();
        let action = match self.peek() {
            TokenKind::CompareOp(">") => {
                self.bump();
                Action::Default
            }
            TokenKind::Plus => {
                self.bump();
                Action::Positive
            }
            TokenKind::Dash | TokenKind::Pipe => {
                self.bump();
                Action::Negative
            }
            TokenKind::LBracket => {
                self.bump();
                let name = self.expect_ident("relation type name")?;
                self.expect(TokenKind::RBracket)?;
                Action::Custom(name)
            }
            other => {
                return Err(self.error_here(format!(
                    "expected a relation type ('>', '+', '-', '|', or '[name]'), found {}",
                    other.describe()
                )));
            }
        };
        Ok(EdgeSpec { exists, action })
    }

    fn clause_list(&mut self) -> Result<Vec<Clause>, CompileError> {
        self.expect(TokenKind::LBracket)?;
        let mut clauses = vec![self.clause()?];
        while *self.peek() == TokenKind::Comma {
            self.bump();
            clauses.push(self.clause()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(clauses)
    }

    fn clause(&mut self) -> Result<Clause, CompileError> {
        let attr = match self.peek() {
            TokenKind::Str(_) => {
                let TokenKind::Str(s) = self.bump().kind else {
                    unreachable!()
                };
                s
            }
            _ => self.expect_ident("attribute key")?,
        };
        let op = self.operator()?;
        let value = self.value()?;
        Ok(Clause { attr, op, value })
    }

    // -- constraints --

    fn constraint(&mut self) -> Result<ConstraintStmt, CompileError> {
        let entity = self.expect_ident("node or edge name")?;
        let attr = self.attr_key()?;
        let op = self.operator()?;
        let rhs = self.rhs()?;
        Ok(ConstraintStmt {
            entity,
            attr,
            op,
            rhs,
        })
    }

    /// `.key` or `["key"]` after an entity name.
    fn attr_key(&mut self) -> Result<String, CompileError> {
        match self.peek() {
            TokenKind::Dot => {
                self.bump();
                self.expect_ident("attribute key")
            }
            TokenKind::LBracket => {
                self.bump();
                let key = match self.peek() {
                    TokenKind::Str(_) => {
                        let TokenKind::Str(s) = self.bump().kind else {
                            unreachable!()
                        };
                        s
                    }
                    _ => self.expect_ident("attribute key")?,
                };
                self.expect(TokenKind::RBracket)?;
                Ok(key)
            }
            other => Err(self.error_here(format!(
                "expected '.' or '[' before attribute key, found {}",
                other.describe()
            ))),
        }
    }

    fn rhs(&mut self) -> Result<Rhs, CompileError> {
        if matches!(self.peek(), TokenKind::Ident(_))
            && matches!(self.peek_at(1), TokenKind::Dot | TokenKind::LBracket)
        {
            let entity = self.expect_ident("node or edge name")?;
            let attr = self.attr_key()?;
            return Ok(Rhs::Attr { entity, attr });
        }
        Ok(Rhs::Literal(self.value()?))
    }

    fn operator(&mut self) -> Result<Op, CompileError> {
        match self.peek().clone() {
            TokenKind::CompareOp(token) => {
                self.bump();
                Op::from_token(token)
                    .ok_or_else(|| self.error_here(format!("unknown operator '{token}'")))
            }
            TokenKind::Ident(word) if word == "in" || word == "contains" => {
                self.bump();
                Ok(if word == "in" { Op::In } else { Op::Contains })
            }
            TokenKind::Bang => {
                self.bump();
                let word = self.expect_ident("'in' or 'contains'")?;
                match word.as_str() {
                    "in" => Ok(Op::NotIn),
                    "contains" => Ok(Op::NotContains),
                    other => Err(self.error_here(format!(
                        "expected 'in' or 'contains' after '!', found '{other}'"
                    ))),
                }
            }
            other => Err(self.error_here(format!(
                "expected a comparison operator, found {}",
                other.describe()
            ))),
        }
    }

    fn value(&mut self) -> Result<Value, CompileError> {
        match self.peek().clone() {
            TokenKind::Int(i) => {
                self.bump();
                Ok(Value::Int(i))
            }
            TokenKind::Float(v) => {
                self.bump();
                Ok(Value::Float(v))
            }
            TokenKind::Str(_) => {
                let TokenKind::Str(s) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Value::Str(s))
            }
            TokenKind::Ident(_) => {
                let TokenKind::Ident(s) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Value::Ident(s))
            }
            TokenKind::Dash => {
                self.bump();
                match self.peek().clone() {
                    TokenKind::Int(i) => {
                        self.bump();
                        Ok(Value::Int(-i))
                    }
                    TokenKind::Float(v) => {
                        self.bump();
                        Ok(Value::Float(-v))
                    }
                    other => Err(self.error_here(format!(
                        "expected a number after '-', found {}",
                        other.describe()
                    ))),
                }
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                if *self.peek() != TokenKind::RBracket {
                    items.push(self.value()?);
                    while *self.peek() == TokenKind::Comma {
                        self.bump();
                        items.push(self.value()?);
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Value::List(items))
            }
            other => Err(self.error_here(format!(
                "expected a value, found {}",
                other.describe()
            ))),
        }
    }

    // -- macros --

    fn macro_def_or_call(&mut self, in_body: bool) -> Result<Stmt, CompileError> {
        let name = self.expect_ident("macro name")?;
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != TokenKind::RParen {
            args.push(self.expect_ident("argument name")?);
            while *self.peek() == TokenKind::Comma {
                self.bump();
                args.push(self.expect_ident("argument name")?);
            }
        }
        self.expect(TokenKind::RParen)?;

        // A brace (possibly on the next line) makes this a definition.
        let mut ahead = 0;
        while *self.peek_at(ahead) == TokenKind::Newline {
            ahead += 1;
        }
        if *self.peek_at(ahead) != TokenKind::LBrace {
            return Ok(Stmt::MacroCall(MacroCall { name, args }));
        }
        if in_body {
            return Err(self.error_here("macro definitions cannot be nested"));
        }
        self.skip_newlines();
        self.expect(TokenKind::LBrace)?;
        let body = self.macro_body()?;
        Ok(Stmt::MacroDef(MacroDef {
            name,
            formals: args,
            body,
        }))
    }

    fn macro_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                TokenKind::RBrace => {
                    self.bump();
                    return Ok(body);
                }
                TokenKind::Eof => {
                    return Err(self.error_here("unterminated macro body, expected '}'"));
                }
                _ => {
                    body.push(self.statement(true)?);
                    self.end_of_statement(true)?;
                }
            }
        }
    }
}
