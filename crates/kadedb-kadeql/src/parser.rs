//! KadeQL recursive-descent parser
//!
//! Grammar, lowest to highest precedence: OR, AND, NOT,
//! comparison/BETWEEN, additive, multiplicative, unary sign, primary.
//! `a BETWEEN lo AND hi` desugars to `a >= lo AND a <= hi` at parse time,
//! and a leading sign folds into numeric literals. Trailing semicolons are
//! accepted. INSERT tuple arities are checked here so malformed statements
//! never reach the executor.

use tracing::debug;

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

/// Parse a KadeQL query string into a statement
pub fn parse_query(input: &str) -> Result<Statement, ParseError> {
    debug!("parsing KadeQL query ({} bytes)", input.len());
    let tokens = Lexer::tokenize(input)?;
    Parser::new(tokens).parse_statement()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        ParseError::new(message, token.line, token.column)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!(
                "expected {what}, found {}",
                self.peek_kind().describe()
            )))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek_kind() {
            | TokenKind::Identifier(_) => {
                let token = self.bump();
                match token.kind {
                    | TokenKind::Identifier(name) => Ok(name),
                    | _ => unreachable!(),
                }
            }
            | _ => Err(self.error_here(format!(
                "expected {what}, found {}",
                self.peek_kind().describe()
            ))),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let statement = match self.peek_kind() {
            | TokenKind::Select => Statement::Select(self.parse_select()?),
            | TokenKind::Insert => Statement::Insert(self.parse_insert()?),
            | TokenKind::Update => Statement::Update(self.parse_update()?),
            | TokenKind::Delete => Statement::Delete(self.parse_delete()?),
            | other => {
                return Err(self.error_here(format!(
                    "expected SELECT, INSERT, UPDATE or DELETE, found {}",
                    other.describe()
                )))
            }
        };
        while self.eat(&TokenKind::Semicolon) {}
        if self.peek_kind() != &TokenKind::Eof {
            return Err(self.error_here(format!(
                "unexpected {} after statement",
                self.peek_kind().describe()
            )));
        }
        Ok(statement)
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn parse_select(&mut self) -> Result<SelectStatement, ParseError> {
        self.expect(&TokenKind::Select, "SELECT")?;

        let projection = if self.eat(&TokenKind::Star) {
            Projection::Columns(Vec::new())
        } else {
            let mut items = Vec::new();
            loop {
                let expr = self.parse_expression()?;
                let alias = if self.eat(&TokenKind::As) {
                    Some(self.expect_identifier("alias after AS")?)
                } else {
                    None
                };
                items.push(SelectItem { expr, alias });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            // Legacy column-list mode: every item a bare identifier, no AS.
            let all_bare = items
                .iter()
                .all(|item| item.alias.is_none() && matches!(item.expr, Expression::Identifier(_)));
            if all_bare {
                Projection::Columns(
                    items
                        .into_iter()
                        .map(|item| match item.expr {
                            | Expression::Identifier(name) => name,
                            | _ => unreachable!(),
                        })
                        .collect(),
                )
            } else {
                Projection::Expressions(items)
            }
        };

        self.expect(&TokenKind::From, "FROM")?;
        let table = self.expect_identifier("table name")?;
        let where_clause = self.parse_optional_where()?;
        Ok(SelectStatement {
            table,
            projection,
            where_clause,
        })
    }

    fn parse_insert(&mut self) -> Result<InsertStatement, ParseError> {
        self.expect(&TokenKind::Insert, "INSERT")?;
        self.expect(&TokenKind::Into, "INTO")?;
        let table = self.expect_identifier("table name")?;

        let columns = if self.eat(&TokenKind::LeftParen) {
            let mut columns = Vec::new();
            loop {
                columns.push(self.expect_identifier("column name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightParen, "')'")?;
            Some(columns)
        } else {
            None
        };

        self.expect(&TokenKind::Values, "VALUES")?;
        let mut values: Vec<Vec<Expression>> = Vec::new();
        loop {
            let tuple_token = self.peek().clone();
            self.expect(&TokenKind::LeftParen, "'('")?;
            let mut tuple = Vec::new();
            if self.peek_kind() != &TokenKind::RightParen {
                loop {
                    tuple.push(self.parse_expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen, "')'")?;

            // Arity checks are parse-time errors.
            if let Some(columns) = &columns {
                if tuple.len() != columns.len() {
                    return Err(ParseError::new(
                        format!(
                            "VALUES tuple has {} expressions but {} columns were named",
                            tuple.len(),
                            columns.len()
                        ),
                        tuple_token.line,
                        tuple_token.column,
                    ));
                }
            }
            if let Some(first) = values.first() {
                if tuple.len() != first.len() {
                    return Err(ParseError::new(
                        format!(
                            "VALUES tuple has {} expressions, earlier tuples have {}",
                            tuple.len(),
                            first.len()
                        ),
                        tuple_token.line,
                        tuple_token.column,
                    ));
                }
            }
            values.push(tuple);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(InsertStatement {
            table,
            columns,
            values,
        })
    }

    fn parse_update(&mut self) -> Result<UpdateStatement, ParseError> {
        self.expect(&TokenKind::Update, "UPDATE")?;
        let table = self.expect_identifier("table name")?;
        self.expect(&TokenKind::Set, "SET")?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_identifier("column name")?;
            self.expect(&TokenKind::Equal, "'='")?;
            let value = self.parse_expression()?;
            assignments.push(Assignment { column, value });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let where_clause = self.parse_optional_where()?;
        Ok(UpdateStatement {
            table,
            assignments,
            where_clause,
        })
    }

    fn parse_delete(&mut self) -> Result<DeleteStatement, ParseError> {
        self.expect(&TokenKind::Delete, "DELETE")?;
        self.expect(&TokenKind::From, "FROM")?;
        let table = self.expect_identifier("table name")?;
        let where_clause = self.parse_optional_where()?;
        Ok(DeleteStatement {
            table,
            where_clause,
        })
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expression>, ParseError> {
        if self.eat(&TokenKind::Where) {
            Ok(Some(self.parse_expression()?))
        } else {
            Ok(None)
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_not()?;
            left = binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_not()?;
            Ok(Expression::UnaryOp {
                operator: UnaryOperator::Not,
                operand: Box::new(operand),
            })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            if self.eat(&TokenKind::Between) {
                // a BETWEEN lo AND hi  →  a >= lo AND a <= hi
                let low = self.parse_additive()?;
                self.expect(&TokenKind::And, "AND in BETWEEN")?;
                let high = self.parse_additive()?;
                let lower = binary(left.clone(), BinaryOperator::GreaterThanOrEqual, low);
                let upper = binary(left, BinaryOperator::LessThanOrEqual, high);
                left = binary(lower, BinaryOperator::And, upper);
                continue;
            }
            let operator = match self.peek_kind() {
                | TokenKind::Equal => BinaryOperator::Equal,
                | TokenKind::NotEqual => BinaryOperator::NotEqual,
                | TokenKind::Less => BinaryOperator::LessThan,
                | TokenKind::LessEqual => BinaryOperator::LessThanOrEqual,
                | TokenKind::Greater => BinaryOperator::GreaterThan,
                | TokenKind::GreaterEqual => BinaryOperator::GreaterThanOrEqual,
                | _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = match self.peek_kind() {
                | TokenKind::Plus => BinaryOperator::Add,
                | TokenKind::Minus => BinaryOperator::Subtract,
                | _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary_sign()?;
        loop {
            let operator = match self.peek_kind() {
                | TokenKind::Star => BinaryOperator::Multiply,
                | TokenKind::Slash => BinaryOperator::Divide,
                | _ => break,
            };
            self.bump();
            let right = self.parse_unary_sign()?;
            left = binary(left, operator, right);
        }
        Ok(left)
    }

    fn parse_unary_sign(&mut self) -> Result<Expression, ParseError> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary_sign()?;
            // A signed numeric literal folds into the literal itself.
            return Ok(match operand {
                | Expression::Literal(Literal::Integer(v)) => {
                    Expression::Literal(Literal::Integer(-v))
                }
                | Expression::Literal(Literal::Float(v)) => {
                    Expression::Literal(Literal::Float(-v))
                }
                | other => Expression::UnaryOp {
                    operator: UnaryOperator::Minus,
                    operand: Box::new(other),
                },
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.parse_unary_sign();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.peek_kind().clone() {
            | TokenKind::IntegerLiteral(v) => {
                self.bump();
                Ok(Expression::Literal(Literal::Integer(v)))
            }
            | TokenKind::FloatLiteral(v) => {
                self.bump();
                Ok(Expression::Literal(Literal::Float(v)))
            }
            | TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(Expression::Literal(Literal::String(s)))
            }
            | TokenKind::True => {
                self.bump();
                Ok(Expression::Literal(Literal::Boolean(true)))
            }
            | TokenKind::False => {
                self.bump();
                Ok(Expression::Literal(Literal::Boolean(false)))
            }
            | TokenKind::Null => {
                self.bump();
                Ok(Expression::Literal(Literal::Null))
            }
            | TokenKind::Identifier(name) => {
                self.bump();
                if self.eat(&TokenKind::LeftParen) {
                    let mut args = Vec::new();
                    if self.peek_kind() != &TokenKind::RightParen {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RightParen, "')'")?;
                    Ok(Expression::FunctionCall { name, args })
                } else {
                    Ok(Expression::Identifier(name))
                }
            }
            | TokenKind::LeftParen => {
                self.bump();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            | other => Err(self.error_here(format!(
                "expected expression, found {}",
                other.describe()
            ))),
        }
    }
}

fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Expression {
    Expression::BinaryOp {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    }
}
