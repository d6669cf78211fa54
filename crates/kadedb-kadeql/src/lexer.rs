//! KadeQL lexer
//!
//! Byte-level scanner producing position-tagged tokens. Keywords are
//! case-insensitive; identifiers preserve their original case. String
//! literals accept single or double quotes with backslash escapes, and
//! `--` starts a line comment.

use crate::error::ParseError;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Select,
    From,
    Where,
    Insert,
    Into,
    Values,
    Update,
    Delete,
    Set,
    Not,
    And,
    Or,
    Between,
    As,
    True,
    False,
    Null,

    // Literals and identifiers
    Identifier(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),

    // Operators
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Plus,
    Minus,
    Star,
    Slash,

    // Delimiters
    Comma,
    Semicolon,
    LeftParen,
    RightParen,

    Eof,
}

impl TokenKind {
    /// Short description used in parser error messages
    pub fn describe(&self) -> String {
        match self {
            | Self::Identifier(name) => format!("identifier '{name}'"),
            | Self::IntegerLiteral(v) => format!("integer {v}"),
            | Self::FloatLiteral(v) => format!("float {v}"),
            | Self::StringLiteral(s) => format!("string '{s}'"),
            | Self::Eof => "end of input".to_string(),
            | other => format!("{other:?}").to_uppercase(),
        }
    }
}

/// Token with its source position (1-based line and column)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    match ident.to_ascii_uppercase().as_str() {
        | "SELECT" => Some(TokenKind::Select),
        | "FROM" => Some(TokenKind::From),
        | "WHERE" => Some(TokenKind::Where),
        | "INSERT" => Some(TokenKind::Insert),
        | "INTO" => Some(TokenKind::Into),
        | "VALUES" => Some(TokenKind::Values),
        | "UPDATE" => Some(TokenKind::Update),
        | "DELETE" => Some(TokenKind::Delete),
        | "SET" => Some(TokenKind::Set),
        | "NOT" => Some(TokenKind::Not),
        | "AND" => Some(TokenKind::And),
        | "OR" => Some(TokenKind::Or),
        | "BETWEEN" => Some(TokenKind::Between),
        | "AS" => Some(TokenKind::As),
        | "TRUE" => Some(TokenKind::True),
        | "FALSE" => Some(TokenKind::False),
        | "NULL" => Some(TokenKind::Null),
        | _ => None,
    }
}

/// Byte-level scanner over a query string
pub struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `input`
    pub fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the whole input, appending a trailing Eof token
    pub fn tokenize(input: &'a str) -> Result<Vec<Token>, ParseError> {
        let mut lexer = Self::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                | Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                | Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                | _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace_and_comments();
        let line = self.line;
        let column = self.column;
        let Some(byte) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
                column,
            });
        };

        let kind = match byte {
            | b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.scan_identifier(),
            | b'0'..=b'9' => self.scan_number(line, column)?,
            | b'\'' | b'"' => self.scan_string(line, column)?,
            | b'=' => {
                self.bump();
                TokenKind::Equal
            }
            | b'!' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::NotEqual
                } else {
                    return Err(ParseError::new("expected '=' after '!'", line, column));
                }
            }
            | b'<' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            | b'>' => {
                self.bump();
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            | b'+' => {
                self.bump();
                TokenKind::Plus
            }
            | b'-' => {
                self.bump();
                TokenKind::Minus
            }
            | b'*' => {
                self.bump();
                TokenKind::Star
            }
            | b'/' => {
                self.bump();
                TokenKind::Slash
            }
            | b',' => {
                self.bump();
                TokenKind::Comma
            }
            | b';' => {
                self.bump();
                TokenKind::Semicolon
            }
            | b'(' => {
                self.bump();
                TokenKind::LeftParen
            }
            | b')' => {
                self.bump();
                TokenKind::RightParen
            }
            | other => {
                return Err(ParseError::new(
                    format!("unexpected character '{}'", other as char),
                    line,
                    column,
                ))
            }
        };
        Ok(Token { kind, line, column })
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        // Identifier bytes are ASCII by construction.
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        keyword(&text).unwrap_or(TokenKind::Identifier(text))
    }

    fn scan_number(&mut self, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                | b'0'..=b'9' => {
                    self.bump();
                }
                | b'.' if !is_float && matches!(self.peek_at(1), Some(b'0'..=b'9')) => {
                    is_float = true;
                    self.bump();
                }
                | _ => break,
            }
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::FloatLiteral)
                .map_err(|_| ParseError::new(format!("bad float literal '{text}'"), line, column))
        } else {
            text.parse::<i64>()
                .map(TokenKind::IntegerLiteral)
                .map_err(|_| {
                    ParseError::new(format!("integer literal '{text}' out of range"), line, column)
                })
        }
    }

    fn scan_string(&mut self, line: u32, column: u32) -> Result<TokenKind, ParseError> {
        let quote = self.bump().unwrap_or(b'\'');
        let mut content = Vec::new();
        loop {
            match self.bump() {
                | None => {
                    return Err(ParseError::new("unterminated string literal", line, column))
                }
                | Some(b) if b == quote => break,
                | Some(b'\\') => match self.bump() {
                    | Some(b'n') => content.push(b'\n'),
                    | Some(b't') => content.push(b'\t'),
                    | Some(b'r') => content.push(b'\r'),
                    | Some(b'\\') => content.push(b'\\'),
                    | Some(b'\'') => content.push(b'\''),
                    | Some(b'"') => content.push(b'"'),
                    | Some(other) => {
                        return Err(self.error(format!("unknown escape '\\{}'", other as char)))
                    }
                    | None => {
                        return Err(ParseError::new(
                            "unterminated string literal",
                            line,
                            column,
                        ))
                    }
                },
                | Some(b) => content.push(b),
            }
        }
        String::from_utf8(content)
            .map(TokenKind::StringLiteral)
            .map_err(|_| ParseError::new("string literal is not valid UTF-8", line, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("select FROM WhErE"),
            vec![
                TokenKind::Select,
                TokenKind::From,
                TokenKind::Where,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_identifiers_preserve_case() {
        assert_eq!(
            kinds("UserName _tmp x2"),
            vec![
                TokenKind::Identifier("UserName".into()),
                TokenKind::Identifier("_tmp".into()),
                TokenKind::Identifier("x2".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.5 0"),
            vec![
                TokenKind::IntegerLiteral(42),
                TokenKind::FloatLiteral(3.5),
                TokenKind::IntegerLiteral(0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "dq" 'a\nb\t\\'"#),
            vec![
                TokenKind::StringLiteral("it's".into()),
                TokenKind::StringLiteral("dq".into()),
                TokenKind::StringLiteral("a\nb\t\\".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators_and_delimiters() {
        assert_eq!(
            kinds("= != < <= > >= + - * / , ; ( )"),
            vec![
                TokenKind::Equal,
                TokenKind::NotEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Comma,
                TokenKind::Semicolon,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_line_comments_skipped() {
        assert_eq!(
            kinds("SELECT -- the projection\n*"),
            vec![TokenKind::Select, TokenKind::Star, TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::tokenize("SELECT a\nFROM t").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 8));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 1));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 6));
    }

    #[test]
    fn test_unterminated_string_position() {
        let err = Lexer::tokenize("SELECT 'oops").unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!((err.line, err.column), (1, 8));
    }

    #[test]
    fn test_bare_bang_rejected() {
        let err = Lexer::tokenize("a ! b").unwrap_err();
        assert!(err.message.contains("expected '='"));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::tokenize("SELECT @").unwrap_err();
        assert!(err.message.contains('@'));
        assert_eq!(err.column, 8);
    }
}
