use super::parser::{BinaryOp, Expr, Reducer, Series};
use crate::error::FormulaError;
use crate::models::{AssignmentRef, GradeRecord};

/// The two series a custom expression can see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormulaScope {
    /// Finite scores of the graded records.
    pub grades: Vec<f64>,
    /// `max_points` of every assignment.
    pub assignments: Vec<f64>,
}

impl FormulaScope {
    pub fn new(records: &[GradeRecord], assignments: &[AssignmentRef]) -> Self {
        Self {
            grades: records.iter().filter_map(GradeRecord::graded_score).collect(),
            assignments: assignments
                .iter()
                .map(|assignment| assignment.max_points)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    List(Vec<f64>),
}

pub(crate) fn evaluate(
    expr: &Expr,
    scope: &FormulaScope,
    max_steps: usize,
) -> Result<f64, FormulaError> {
    let mut evaluator = Evaluator {
        scope,
        steps: 0,
        max_steps,
    };
    match evaluator.eval(expr)? {
        Value::Number(value) if value.is_finite() => Ok(value),
        Value::Number(_) => Err(FormulaError::NonFinite),
        Value::List(_) => Err(FormulaError::ListResult),
    }
}

struct Evaluator<'s> {
    scope: &'s FormulaScope,
    steps: usize,
    max_steps: usize,
}

impl Evaluator<'_> {
    /// Every node costs one step and every list element touched costs one
    /// more.
    fn charge(&mut self, cost: usize) -> Result<(), FormulaError> {
        self.steps = self.steps.saturating_add(cost);
        if self.steps > self.max_steps {
            return Err(FormulaError::BudgetExhausted {
                limit: self.max_steps,
            });
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, FormulaError> {
        self.charge(1)?;
        match expr {
            Expr::Number(value) => Ok(Value::Number(*value)),
            Expr::Series(series) => {
                let scope = self.scope;
                let values = match series {
                    Series::GradeScores => &scope.grades,
                    Series::AssignmentPoints => &scope.assignments,
                };
                self.charge(values.len())?;
                Ok(Value::List(values.clone()))
            }
            Expr::List(items) => Ok(Value::List(self.flatten(items)?)),
            Expr::Negate(operand) => Ok(Value::Number(-self.number(operand, "negation")?)),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.number(lhs, op.name())?;
                let rhs = self.number(rhs, op.name())?;
                apply_binary(*op, lhs, rhs).map(Value::Number)
            }
            Expr::Reduce { reducer, args } => {
                let values = self.flatten(args)?;
                self.charge(values.len())?;
                reduce(*reducer, &values).map(Value::Number)
            }
        }
    }

    fn number(&mut self, expr: &Expr, operation: &'static str) -> Result<f64, FormulaError> {
        match self.eval(expr)? {
            Value::Number(value) => Ok(value),
            Value::List(_) => Err(FormulaError::ExpectedNumber { operation }),
        }
    }

    fn flatten(&mut self, items: &[Expr]) -> Result<Vec<f64>, FormulaError> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match self.eval(item)? {
                Value::Number(value) => values.push(value),
                Value::List(inner) => values.extend(inner),
            }
        }
        Ok(values)
    }
}

fn apply_binary(op: BinaryOp, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
    match op {
        BinaryOp::Add => Ok(lhs + rhs),
        BinaryOp::Sub => Ok(lhs - rhs),
        BinaryOp::Mul => Ok(lhs * rhs),
        BinaryOp::Div | BinaryOp::Rem if rhs == 0.0 => Err(FormulaError::DivisionByZero),
        BinaryOp::Div => Ok(lhs / rhs),
        BinaryOp::Rem => Ok(lhs % rhs),
    }
}

fn reduce(reducer: Reducer, values: &[f64]) -> Result<f64, FormulaError> {
    let empty = || FormulaError::EmptyList {
        function: reducer.name(),
    };
    match reducer {
        Reducer::Sum => Ok(values.iter().sum()),
        Reducer::Count => Ok(values.len() as f64),
        Reducer::Average if values.is_empty() => Err(empty()),
        Reducer::Average => Ok(values.iter().sum::<f64>() / values.len() as f64),
        Reducer::Max => values.iter().copied().reduce(f64::max).ok_or_else(empty),
        Reducer::Min => values.iter().copied().reduce(f64::min).ok_or_else(empty),
    }
}
