use crate::error::CompileError;

/// One lexed token with its source position (both 1-based).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    /// Statement separator: newline or `;`.
    Newline,
    /// `===`
    TripleEq,
    /// A comparison operator token: `==`, `=`, `!=`, `<>`, `>`, `>=`, `<`, `<=`.
    CompareOp(&'static str),
    /// `!` not followed by `=` (negative existence marker, or `!in`/`!contains`).
    Bang,
    /// `~` (alias for `!`).
    Tilde,
    /// `-`
    Dash,
    /// `+`
    Plus,
    /// `|`
    Pipe,
    Dot,
    Comma,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Eof,
}

impl TokenKind {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{s}'"),
            TokenKind::Int(i) => format!("number '{i}'"),
            TokenKind::Float(v) => format!("number '{v}'"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Newline => "end of statement".to_string(),
            TokenKind::TripleEq => "'==='".to_string(),
            TokenKind::CompareOp(op) => format!("'{op}'"),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Tilde => "'~'".to_string(),
            TokenKind::Dash => "'-'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Pipe => "'|'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Tokenize motif source.
///
/// Comments run from `#` to end of line. `;` and `\n` both produce
/// [`TokenKind::Newline`]; consecutive separators are preserved (the parser
/// skips them). The final token is always [`TokenKind::Eof`].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    lines: Vec<&'a str>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            lines: source.lines().collect(),
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token { kind, line, column });
    }

    fn error(&self, line: usize, column: usize, message: String) -> CompileError {
        CompileError::Syntax {
            line,
            column,
            message,
            snippet: self
                .lines
                .get(line.saturating_sub(1))
                .map(|l| l.to_string())
                .unwrap_or_default(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, CompileError> {
        while let Some(c) = self.peek() {
            let (line, column) = (self.line, self.column);
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '\n' | ';' => {
                    self.bump();
                    self.push(TokenKind::Newline, line, column);
                }
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.ident(),
                '=' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        if self.peek() == Some('=') {
                            self.bump();
                            self.push(TokenKind::TripleEq, line, column);
                        } else {
                            self.push(TokenKind::CompareOp("=="), line, column);
                        }
                    } else {
                        self.push(TokenKind::CompareOp("="), line, column);
                    }
                }
                '!' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::CompareOp("!="), line, column);
                    } else {
                        self.push(TokenKind::Bang, line, column);
                    }
                }
                '<' => {
                    self.bump();
                    match self.peek() {
                        Some('=') => {
                            self.bump();
                            self.push(TokenKind::CompareOp("<="), line, column);
                        }
                        Some('>') => {
                            self.bump();
                            self.push(TokenKind::CompareOp("<>"), line, column);
                        }
                        _ => self.push(TokenKind::CompareOp("<"), line, column),
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        self.push(TokenKind::CompareOp(">="), line, column);
                    } else {
                        self.push(TokenKind::CompareOp(">"), line, column);
                    }
                }
                '~' => {
                    self.bump();
                    self.push(TokenKind::Tilde, line, column);
                }
                '-' => {
                    self.bump();
                    self.push(TokenKind::Dash, line, column);
                }
                '+' => {
                    self.bump();
                    self.push(TokenKind::Plus, line, column);
                }
                '|' => {
                    self.bump();
                    self.push(TokenKind::Pipe, line, column);
                }
                '.' => {
                    self.bump();
                    self.push(TokenKind::Dot, line, column);
                }
                ',' => {
                    self.bump();
                    self.push(TokenKind::Comma, line, column);
                }
                '[' => {
                    self.bump();
                    self.push(TokenKind::LBracket, line, column);
                }
                ']' => {
                    self.bump();
                    self.push(TokenKind::RBracket, line, column);
                }
                '{' => {
                    self.bump();
                    self.push(TokenKind::LBrace, line, column);
                }
                '}' => {
                    self.bump();
                    self.push(TokenKind::RBrace, line, column);
                }
                '(' => {
                    self.bump();
                    self.push(TokenKind::LParen, line, column);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::RParen, line, column);
                }
                other => {
                    return Err(self.error(line, column, format!("unexpected character '{other}'")));
                }
            }
        }
        let (line, column) = (self.line, self.column);
        self.push(TokenKind::Eof, line, column);
        Ok(self.tokens)
    }

    fn string(&mut self, quote: char) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut content = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\n') | None => {
                    return Err(self.error(line, column, "unterminated string literal".to_string()));
                }
                Some(c) => {
                    content.push(c);
                    self.bump();
                }
            }
        }
        self.push(TokenKind::Str(content), line, column);
        Ok(())
    }

    fn number(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        // Consume a fraction only when a digit follows the dot, so `1.x`
        // still lexes as Int, Dot, Ident.
        let is_float = self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            text.push(self.bump().unwrap());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(line, column, format!("invalid number '{text}'")))?;
            self.push(TokenKind::Float(value), line, column);
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.error(line, column, format!("integer out of range '{text}'")))?;
            self.push(TokenKind::Int(value), line, column);
        }
        Ok(())
    }

    fn ident(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            text.push(self.bump().unwrap());
        }
        self.push(TokenKind::Ident(text), line, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn simple_edge() {
        assert_eq!(
            kinds("A -> B"),
            vec![
                TokenKind::Ident("A".into()),
                TokenKind::Dash,
                TokenKind::CompareOp(">"),
                TokenKind::Ident("B".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn semicolon_is_a_separator() {
        assert_eq!(
            kinds("A->B;B->C"),
            vec![
                TokenKind::Ident("A".into()),
                TokenKind::Dash,
                TokenKind::CompareOp(">"),
                TokenKind::Ident("B".into()),
                TokenKind::Newline,
                TokenKind::Ident("B".into()),
                TokenKind::Dash,
                TokenKind::CompareOp(">"),
                TokenKind::Ident("C".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_run_to_end_of_line() {
        assert_eq!(
            kinds("# a comment\nA # trailing\n"),
            vec![
                TokenKind::Newline,
                TokenKind::Ident("A".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn operator_greediness() {
        assert_eq!(kinds("==="), vec![TokenKind::TripleEq, TokenKind::Eof]);
        assert_eq!(kinds("=="), vec![TokenKind::CompareOp("=="), TokenKind::Eof]);
        assert_eq!(kinds("="), vec![TokenKind::CompareOp("="), TokenKind::Eof]);
        assert_eq!(kinds("<>"), vec![TokenKind::CompareOp("<>"), TokenKind::Eof]);
        assert_eq!(kinds(">="), vec![TokenKind::CompareOp(">="), TokenKind::Eof]);
        assert_eq!(kinds("!="), vec![TokenKind::CompareOp("!="), TokenKind::Eof]);
        assert_eq!(kinds("!"), vec![TokenKind::Bang, TokenKind::Eof]);
    }

    #[test]
    fn numbers() {
        assert_eq!(kinds("42"), vec![TokenKind::Int(42), TokenKind::Eof]);
        assert_eq!(kinds("4.5"), vec![TokenKind::Float(4.5), TokenKind::Eof]);
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::Int(1),
                TokenKind::Dot,
                TokenKind::Ident("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_with_either_quote() {
        assert_eq!(
            kinds(r#""hello" 'world'"#),
            vec![
                TokenKind::Str("hello".into()),
                TokenKind::Str("world".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let err = tokenize("A.x = \"oops").unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = tokenize("A\nBB -> C").unwrap();
        let bb = tokens.iter().find(|t| t.kind == TokenKind::Ident("BB".into())).unwrap();
        assert_eq!((bb.line, bb.column), (2, 1));
        let c = tokens.iter().find(|t| t.kind == TokenKind::Ident("C".into())).unwrap();
        assert_eq!((c.line, c.column), (2, 7));
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("A -> B $").unwrap_err();
        match err {
            CompileError::Syntax { line, column, snippet, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 8);
                assert_eq!(snippet, "A -> B $");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }
}
