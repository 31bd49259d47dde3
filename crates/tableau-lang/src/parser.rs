use crate::lexer::{Lexer, Span, Token, TokenKind};
use tableau_solver::{Constraint, Model, Objective, ObjectiveSense, Relation, SignRestriction};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Line {line}: expected {expected}, found {found} at position {span:?}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Line {line}: invalid number '{text}'")]
    InvalidNumber { line: usize, text: String },
    #[error("Line {line}: constraint has no relation (<=, >= or =)")]
    MissingRelation { line: usize },
    #[error("Line {line}: constraint has no right-hand side")]
    MissingRhs { line: usize },
    #[error("Input is empty")]
    EmptyInput,
    #[error("Line {line}: expected {expected} sign restrictions, found {found}")]
    SignRestrictionCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(source: &str) -> Result<Model, ParseError> {
        let tokens = Lexer::tokenize(source);
        let mut parser = Parser::new(tokens);
        parser.parse_model()
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> TokenKind {
        self.current().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn line(&self) -> usize {
        self.current()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn skip_newlines_and_comments(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Comment) {
            self.advance();
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Comment | TokenKind::Eof
        )
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.current() {
            Some(t) => ParseError::UnexpectedToken {
                line: t.line,
                expected: expected.to_string(),
                found: describe(t),
                span: t.span,
            },
            None => ParseError::UnexpectedToken {
                line: self.line(),
                expected: expected.to_string(),
                found: "end of input".to_string(),
                span: Span::new(0, 0),
            },
        }
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        if !self.at_line_end() {
            return Err(self.unexpected("end of line"));
        }
        Ok(())
    }

    fn parse_model(&mut self) -> Result<Model, ParseError> {
        self.skip_newlines_and_comments();
        if self.peek_kind() == TokenKind::Eof {
            return Err(ParseError::EmptyInput);
        }

        let objective = self.parse_objective()?;
        let mut constraints = Vec::new();

        let sign_restrictions = loop {
            self.skip_newlines_and_comments();
            match self.peek_kind() {
                TokenKind::Eof => {
                    // the last line read was a constraint, not the sign line
                    return Err(ParseError::SignRestrictionCount {
                        line: self.line(),
                        expected: width(&objective, &constraints),
                        found: 0,
                    });
                }
                TokenKind::Plus | TokenKind::Minus | TokenKind::Urs | TokenKind::Int | TokenKind::Bin => {
                    let line = self.line();
                    let restrictions = self.parse_sign_restrictions()?;
                    self.skip_newlines_and_comments();
                    if self.peek_kind() != TokenKind::Eof {
                        return Err(self.unexpected("end of input after sign restrictions"));
                    }
                    break (line, restrictions);
                }
                _ => constraints.push(self.parse_constraint()?),
            }
        };

        let (line, sign_restrictions) = sign_restrictions;
        let expected = width(&objective, &constraints);
        if sign_restrictions.len() != expected {
            return Err(ParseError::SignRestrictionCount {
                line,
                expected,
                found: sign_restrictions.len(),
            });
        }

        let mut model = Model {
            objective,
            constraints,
            sign_restrictions,
        };
        model.pad();
        Ok(model)
    }

    fn parse_objective(&mut self) -> Result<Objective, ParseError> {
        let sense = match self.peek_kind() {
            TokenKind::Max => ObjectiveSense::Max,
            TokenKind::Min => ObjectiveSense::Min,
            _ => return Err(self.unexpected("'max' or 'min'")),
        };
        self.advance();

        let coefficients = self.parse_numbers()?;
        self.expect_line_end()?;
        Ok(Objective { sense, coefficients })
    }

    fn parse_constraint(&mut self) -> Result<Constraint, ParseError> {
        let line = self.line();
        let coefficients = self.parse_numbers()?;

        let relation = match self.peek_kind() {
            TokenKind::Le => Relation::Le,
            TokenKind::Ge => Relation::Ge,
            TokenKind::Eq => Relation::Eq,
            _ if self.at_line_end() => return Err(ParseError::MissingRelation { line }),
            _ => return Err(self.unexpected("a number or a relation")),
        };
        self.advance();

        if self.at_line_end() {
            return Err(ParseError::MissingRhs { line });
        }
        if self.peek_kind() != TokenKind::Number {
            return Err(self.unexpected("a right-hand side"));
        }
        let rhs = self.parse_number()?;
        self.expect_line_end()?;

        Ok(Constraint::new(coefficients, relation, rhs))
    }

    fn parse_sign_restrictions(&mut self) -> Result<Vec<SignRestriction>, ParseError> {
        let mut restrictions = Vec::new();
        while !self.at_line_end() {
            let restriction = match self.peek_kind() {
                TokenKind::Plus => SignRestriction::NonNegative,
                TokenKind::Minus => SignRestriction::NonPositive,
                TokenKind::Urs => SignRestriction::Free,
                TokenKind::Int => SignRestriction::Integer,
                TokenKind::Bin => SignRestriction::Binary,
                _ => return Err(self.unexpected("'+', '-', 'urs', 'int' or 'bin'")),
            };
            self.advance();
            restrictions.push(restriction);
        }
        Ok(restrictions)
    }

    fn parse_numbers(&mut self) -> Result<Vec<f64>, ParseError> {
        let mut numbers = Vec::new();
        while self.peek_kind() == TokenKind::Number {
            numbers.push(self.parse_number()?);
        }
        Ok(numbers)
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let Some(token) = self.advance() else {
            return Err(ParseError::EmptyInput);
        };
        match token.text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ParseError::InvalidNumber {
                line: token.line,
                text: token.text.clone(),
            }),
        }
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        _ => format!("'{}'", token.text),
    }
}

fn width(objective: &Objective, constraints: &[Constraint]) -> usize {
    constraints
        .iter()
        .map(|c| c.coefficients.len())
        .fold(objective.coefficients.len(), usize::max)
}
