// Formula evaluator - two-stack reduction over canonical formula text.

use super::lexer::{Lexer, OpKind, Token};

/// A runtime evaluation failure: division by zero or a variable without a
/// numeric value.
///
/// This is a *value*, not a control-flow error. The workbook stores it as a
/// cell's value and lets it propagate lazily: a formula that reads a cell in
/// an error state produces an error of its own at its next evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaError {
    /// Human-readable explanation, built at construction.
    pub reason: String,
}

impl FormulaError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The named variable has no numeric value: it is undefined, or its cell
    /// holds text or an error.
    pub(crate) fn undefined_variable(name: &str) -> Self {
        Self::new(format!("variable '{}' has no numeric value", name))
    }

    pub(crate) fn divide_by_zero() -> Self {
        Self::new("division by zero")
    }
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for FormulaError {}

/// Operator stack entry: a binary operator or an open parenthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StackOp {
    Op(OpKind),
    LParen,
}

fn apply(op: OpKind, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
    match op {
        OpKind::Add => Ok(lhs + rhs),
        OpKind::Sub => Ok(lhs - rhs),
        OpKind::Mul => Ok(lhs * rhs),
        OpKind::Div => {
            if rhs == 0.0 {
                Err(FormulaError::divide_by_zero())
            } else {
                Ok(lhs / rhs)
            }
        }
    }
}

/// Push an operand, first folding a pending `*` or `/` so multiplicative
/// chains reduce as soon as their right operand arrives.
fn push_operand(
    values: &mut Vec<f64>,
    ops: &mut Vec<StackOp>,
    operand: f64,
) -> Result<(), FormulaError> {
    if let Some(StackOp::Op(op @ (OpKind::Mul | OpKind::Div))) = ops.last().copied() {
        ops.pop();
        // Canonical text is pre-validated; an operator always has its left
        // operand on the stack.
        let lhs = values.pop().unwrap();
        values.push(apply(op, lhs, operand)?);
    } else {
        values.push(operand);
    }
    Ok(())
}

/// Fold a pending `+` or `-` on the operator top, if any.
fn reduce_additive(values: &mut Vec<f64>, ops: &mut Vec<StackOp>) {
    if let Some(StackOp::Op(op @ (OpKind::Add | OpKind::Sub))) = ops.last().copied() {
        ops.pop();
        let rhs = values.pop().unwrap();
        let lhs = values.pop().unwrap();
        // Addition and subtraction cannot fail.
        values.push(apply(op, lhs, rhs).unwrap());
    }
}

/// Evaluate pre-validated canonical formula text against a variable lookup.
///
/// `lookup` returns `Some(n)` when the variable currently has the numeric
/// value `n`, and `None` otherwise. Division by zero and variables without a
/// numeric value come back as `Err(FormulaError)`; this function never
/// panics on canonical input.
pub(super) fn evaluate<F>(canonical: &str, lookup: F) -> Result<f64, FormulaError>
where
    F: Fn(&str) -> Option<f64>,
{
    let mut values: Vec<f64> = Vec::new();
    let mut ops: Vec<StackOp> = Vec::new();

    for token in Lexer::new(canonical) {
        match token {
            Token::Num(n) => push_operand(&mut values, &mut ops, n)?,
            Token::Var(name) => {
                let value =
                    lookup(&name).ok_or_else(|| FormulaError::undefined_variable(&name))?;
                push_operand(&mut values, &mut ops, value)?;
            }
            Token::Op(op @ (OpKind::Add | OpKind::Sub)) => {
                reduce_additive(&mut values, &mut ops);
                ops.push(StackOp::Op(op));
            }
            Token::Op(op) => ops.push(StackOp::Op(op)),
            Token::LParen => ops.push(StackOp::LParen),
            Token::RParen => {
                reduce_additive(&mut values, &mut ops);
                let open = ops.pop();
                debug_assert_eq!(open, Some(StackOp::LParen));
                // The closed group is a finished operand; fold a pending
                // `*` or `/` revealed underneath the parenthesis.
                if let Some(StackOp::Op(op @ (OpKind::Mul | OpKind::Div))) = ops.last().copied() {
                    ops.pop();
                    let rhs = values.pop().unwrap();
                    let lhs = values.pop().unwrap();
                    values.push(apply(op, lhs, rhs)?);
                }
            }
            Token::Unknown(c) => {
                // Unreachable on canonical text; surface rather than panic.
                return Err(FormulaError::new(format!(
                    "unexpected character '{}' in formula",
                    c
                )));
            }
        }
    }

    // At most one additive operator remains.
    reduce_additive(&mut values, &mut ops);
    debug_assert!(ops.is_empty());

    Ok(values.pop().unwrap())
}
