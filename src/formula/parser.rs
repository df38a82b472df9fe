//! Restricted arithmetic grammar for custom formulas.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER
//!          | '(' expr ')'
//!          | '[' (expr (',' expr)*)? ']'
//!          | REDUCER '(' (expr (',' expr)*)? ')'
//!          | VARIABLE ('.' FIELD)?
//! ```
//!
//! Variables are `grades` (graded scores) and `assignments` (max points);
//! reducers are `sum`, `average`, `max`, `min` and `count`. Nothing else
//! resolves, so an expression can only ever compute a number.

use super::EvaluationBudget;
use crate::error::FormulaError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Token<'s> {
    kind: TokenKind,
    text: &'s str,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token<'_>>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let starts_number = ch.is_ascii_digit()
            || (ch == '.' && source[start + 1..].starts_with(|c: char| c.is_ascii_digit()));

        if starts_number {
            let mut end = start;
            while let Some(&(index, c)) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    end = index + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &source[start..end];
            let value = text
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber {
                    text: text.to_string(),
                    position: start,
                })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                text,
                position: start,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let mut end = start;
            while let Some(&(index, c)) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    end = index + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text: &source[start..end],
                position: start,
            });
            continue;
        }

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            found => {
                return Err(FormulaError::UnexpectedCharacter {
                    found,
                    position: start,
                })
            }
        };
        chars.next();
        tokens.push(Token {
            kind,
            text: &source[start..start + ch.len_utf8()],
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        text: "",
        position: source.len(),
    });
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Series {
    GradeScores,
    AssignmentPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Add => "addition",
            Self::Sub => "subtraction",
            Self::Mul => "multiplication",
            Self::Div => "division",
            Self::Rem => "remainder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reducer {
    Sum,
    Average,
    Max,
    Min,
    Count,
}

impl Reducer {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "average" => Some(Self::Average),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            "count" => Some(Self::Count),
            _ => None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Max => "max",
            Self::Min => "min",
            Self::Count => "count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Series(Series),
    List(Vec<Expr>),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Reduce {
        reducer: Reducer,
        args: Vec<Expr>,
    },
}

/// A custom formula expression that has passed the grammar and limits.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub(crate) root: Expr,
}

impl CompiledExpression {
    pub fn compile(source: &str, budget: &EvaluationBudget) -> Result<Self, FormulaError> {
        if source.trim().is_empty() {
            return Err(FormulaError::MissingExpression);
        }
        if source.len() > budget.max_length {
            return Err(FormulaError::TooLong {
                limit: budget.max_length,
            });
        }

        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
            max_depth: budget.max_depth,
        };
        let root = parser.expression()?;
        parser.expect(TokenKind::End, "end of expression")?;
        Ok(Self { root })
    }
}

struct Parser<'s> {
    tokens: Vec<Token<'s>>,
    cursor: usize,
    depth: usize,
    max_depth: usize,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Token<'s> {
        self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'s> {
        let token = self.peek();
        if token.kind != TokenKind::End {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(
        &mut self,
        kind: TokenKind,
        expected: &'static str,
    ) -> Result<Token<'s>, FormulaError> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            Err(FormulaError::UnexpectedToken {
                expected,
                position: token.position,
            })
        }
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FormulaError::TooDeep {
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr, FormulaError> {
        self.descend()?;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.ascend();
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        match self.peek().kind {
            TokenKind::Minus | TokenKind::Plus => {
                let negate = self.advance().kind == TokenKind::Minus;
                self.descend()?;
                let operand = self.unary()?;
                self.ascend();
                Ok(if negate {
                    Expr::Negate(Box::new(operand))
                } else {
                    operand
                })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let items = self.arguments(TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            TokenKind::Ident if self.peek().kind == TokenKind::LParen => {
                let reducer = Reducer::from_name(token.text)
                    .ok_or_else(|| FormulaError::UnknownFunction(token.text.to_string()))?;
                self.advance();
                let args = self.arguments(TokenKind::RParen, "')'")?;
                Ok(Expr::Reduce { reducer, args })
            }
            TokenKind::Ident => self.variable(token.text),
            _ => Err(FormulaError::UnexpectedToken {
                expected: "a number, variable, or function call",
                position: token.position,
            }),
        }
    }

    fn arguments(
        &mut self,
        close: TokenKind,
        expected: &'static str,
    ) -> Result<Vec<Expr>, FormulaError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(TokenKind::Comma) {
                continue;
            }
            self.expect(close, expected)?;
            return Ok(items);
        }
    }

    fn variable(&mut self, name: &str) -> Result<Expr, FormulaError> {
        let field = if self.eat(TokenKind::Dot) {
            Some(self.expect(TokenKind::Ident, "a field name")?.text)
        } else {
            None
        };

        let series = match (name, field) {
            ("grades", None | Some("score" | "scores")) => Series::GradeScores,
            ("assignments", None | Some("points" | "maxPoints" | "max_points")) => {
                Series::AssignmentPoints
            }
            ("grades" | "assignments", Some(field)) => {
                return Err(FormulaError::UnknownField {
                    variable: name.to_string(),
                    field: field.to_string(),
                })
            }
            _ => return Err(FormulaError::UnknownVariable(name.to_string())),
        };
        Ok(Expr::Series(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Expr, FormulaError> {
        CompiledExpression::compile(source, &EvaluationBudget::default()).map(|c| c.root)
    }

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = compile("1 + 2 * 3").expect("parses");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. })),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn reducers_and_fields_resolve() {
        let expr = compile("average(grades.score) / max(assignments)").expect("parses");
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Div, .. }));
        assert!(compile("sum([1, 2, .5])").is_ok());
        assert!(compile("count()").is_ok());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert_eq!(
            compile("process.exit(1)"),
            Err(FormulaError::UnknownVariable("process".to_string()))
        );
        assert_eq!(
            compile("eval(1)"),
            Err(FormulaError::UnknownFunction("eval".to_string()))
        );
        assert!(matches!(
            compile("grades.length"),
            Err(FormulaError::UnknownField { .. })
        ));
    }

    #[test]
    fn malformed_input_reports_a_position() {
        assert!(matches!(
            compile("1 +"),
            Err(FormulaError::UnexpectedToken { position: 3, .. })
        ));
        assert!(matches!(
            compile("(1 + 2"),
            Err(FormulaError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            compile("1 2"),
            Err(FormulaError::UnexpectedToken { position: 2, .. })
        ));
        assert!(matches!(
            compile("grades; 1"),
            Err(FormulaError::UnexpectedCharacter { found: ';', .. })
        ));
        assert!(matches!(
            compile("1.2.3"),
            Err(FormulaError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn limits_are_enforced_before_evaluation() {
        let budget = EvaluationBudget {
            max_depth: 8,
            max_length: 32,
            ..EvaluationBudget::default()
        };
        let nested = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert!(matches!(
            CompiledExpression::compile(&nested, &budget),
            Err(FormulaError::TooDeep { limit: 8 })
        ));
        let negations = format!("{}1", "-".repeat(20));
        assert!(matches!(
            CompiledExpression::compile(&negations, &budget),
            Err(FormulaError::TooDeep { .. })
        ));
        let long = "1+".repeat(20) + "1";
        assert_eq!(
            CompiledExpression::compile(&long, &budget),
            Err(FormulaError::TooLong { limit: 32 })
        );
        assert_eq!(
            CompiledExpression::compile("   ", &budget),
            Err(FormulaError::MissingExpression)
        );
    }

    #[test]
    fn length_limit_counts_bytes() {
        let budget = EvaluationBudget {
            max_length: 8,
            ..EvaluationBudget::default()
        };
        // Eight characters, eleven bytes.
        let accented = "1 + 2 ééé";
        assert_eq!(accented.chars().count(), 8);
        assert_eq!(
            CompiledExpression::compile(accented, &budget),
            Err(FormulaError::TooLong { limit: 8 })
        );
        assert!(matches!(
            CompiledExpression::compile("é + ;", &EvaluationBudget::default()),
            Err(FormulaError::UnexpectedCharacter { found: ';', position: 5 })
        ));
    }
}
