//! Formula parsing, canonicalization, and evaluation.
//!
//! A [`Formula`] is an immutable, validated infix arithmetic expression over
//! f64 with variable references. Construction is the only validation site:
//! once a `Formula` exists, its canonical text is well-formed and every
//! variable in it has passed the workbook's name policy.
//!
//! The canonical text is whitespace-free, renders numbers through `f64`
//! `Display` (so `2.0`, `2.000`, and `2` all canonicalize to `2`), and spells
//! variables in normalized form. Equality and hashing derive from it alone.

pub(crate) mod lexer;

mod eval;

pub use eval::FormulaError;

use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use crate::name::{is_identifier, NamePolicy};

use lexer::{Lexer, Token};

/// A formula whose text could not be parsed: bad syntax, mismatched
/// parentheses, or a variable the name policy rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaFormatError {
    pub message: String,
}

impl FormulaFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FormulaFormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FormulaFormatError {}

/// What the previous token was, for positional syntax checks.
///
/// `Start` behaves like an open parenthesis (an operand must follow);
/// `Operand` and `Close` both mean "a finished value" (an operator or close
/// parenthesis must follow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev {
    Start,
    Open,
    Close,
    Op,
    Operand,
}

impl Prev {
    fn expects_operand(self) -> bool {
        matches!(self, Prev::Start | Prev::Open | Prev::Op)
    }
}

/// An immutable, parsed, normalized arithmetic expression.
#[derive(Debug, Clone)]
pub struct Formula {
    canonical: String,
    variables: Vec<String>,
}

impl Formula {
    /// Parse and validate expression text under a name policy.
    ///
    /// A single left-to-right pass checks the positional grammar (operands
    /// and operators must alternate, parentheses must balance), normalizes
    /// and validates every variable, and builds the canonical text.
    pub fn parse(source: &str, policy: &NamePolicy) -> Result<Self, FormulaFormatError> {
        let mut canonical = String::new();
        let mut variables: Vec<String> = Vec::new();
        let mut depth: usize = 0;
        let mut prev = Prev::Start;

        for token in Lexer::new(source) {
            match token {
                Token::Unknown(c) => {
                    return Err(FormulaFormatError::new(format!(
                        "unrecognized character '{}'",
                        c
                    )));
                }
                Token::LParen => {
                    if !prev.expects_operand() {
                        return Err(FormulaFormatError::new(
                            "'(' must follow an operator or another '('",
                        ));
                    }
                    depth += 1;
                    canonical.push('(');
                    prev = Prev::Open;
                }
                Token::RParen => {
                    if prev.expects_operand() {
                        return Err(FormulaFormatError::new(
                            "')' must follow a number, variable, or ')'",
                        ));
                    }
                    if depth == 0 {
                        return Err(FormulaFormatError::new(
                            "')' without a matching '('",
                        ));
                    }
                    depth -= 1;
                    canonical.push(')');
                    prev = Prev::Close;
                }
                Token::Op(op) => {
                    if prev.expects_operand() {
                        return Err(FormulaFormatError::new(format!(
                            "operator '{}' must follow a number, variable, or ')'",
                            op.symbol()
                        )));
                    }
                    canonical.push(op.symbol());
                    prev = Prev::Op;
                }
                Token::Num(n) => {
                    if !prev.expects_operand() {
                        return Err(FormulaFormatError::new(format!(
                            "number {} must follow an operator or '('",
                            n
                        )));
                    }
                    // Re-render through Display so spellings of the same
                    // value canonicalize identically.
                    write!(canonical, "{}", n).unwrap();
                    prev = Prev::Operand;
                }
                Token::Var(raw) => {
                    if !prev.expects_operand() {
                        return Err(FormulaFormatError::new(format!(
                            "variable '{}' must follow an operator or '('",
                            raw
                        )));
                    }
                    let normalized = policy.normalize(&raw);
                    if !is_identifier(&normalized) {
                        return Err(FormulaFormatError::new(format!(
                            "variable '{}' normalizes to '{}', which is not a valid name",
                            raw, normalized
                        )));
                    }
                    if !policy.allows(&normalized) {
                        return Err(FormulaFormatError::new(format!(
                            "variable '{}' is not allowed here",
                            normalized
                        )));
                    }
                    canonical.push_str(&normalized);
                    if !variables.contains(&normalized) {
                        variables.push(normalized);
                    }
                    prev = Prev::Operand;
                }
            }
        }

        if prev == Prev::Start {
            return Err(FormulaFormatError::new("formula is empty"));
        }
        if depth != 0 {
            return Err(FormulaFormatError::new("'(' without a matching ')'"));
        }
        if !matches!(prev, Prev::Operand | Prev::Close) {
            return Err(FormulaFormatError::new(
                "formula must end with a number, variable, or ')'",
            ));
        }

        Ok(Self {
            canonical,
            variables,
        })
    }

    /// The canonical text: normalized variables, re-rendered numbers, no
    /// whitespace. This is also the `Display` form.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Distinct normalized variables in first-occurrence order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate against a variable lookup.
    ///
    /// `lookup` returns `Some(n)` when a variable currently has numeric value
    /// `n`. Division by zero and variables without a numeric value yield a
    /// [`FormulaError`] value; evaluation never panics.
    pub fn evaluate<F>(&self, lookup: F) -> Result<f64, FormulaError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        eval::evaluate(&self.canonical, lookup)
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

// Equality and hashing go through the canonical text only; the variable list
// is derived from it.
impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Formula {}

impl Hash for Formula {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn parse(source: &str) -> Result<Formula, FormulaFormatError> {
        Formula::parse(source, &NamePolicy::permissive())
    }

    fn upper_policy() -> NamePolicy {
        NamePolicy::new(Box::new(|s| s.to_uppercase()), Box::new(|_| true))
    }

    #[test]
    fn test_canonical_strips_whitespace() {
        let f = parse("x + 2 * ( y - 1 )").unwrap();
        assert_eq!(f.canonical(), "x+2*(y-1)");
    }

    #[test]
    fn test_canonical_rerenders_numbers() {
        assert_eq!(parse("2.000").unwrap().canonical(), "2");
        assert_eq!(parse("2.0 + 03").unwrap().canonical(), "2+3");
        assert_eq!(parse("6.6e-3").unwrap().canonical(), "0.0066");
        assert_eq!(parse("1e3").unwrap().canonical(), "1000");
    }

    #[test]
    fn test_canonical_normalizes_variables() {
        let f = Formula::parse("a1 + b2", &upper_policy()).unwrap();
        assert_eq!(f.canonical(), "A1+B2");
        assert_eq!(f.variables(), &["A1".to_string(), "B2".to_string()]);
    }

    #[test]
    fn test_variables_first_occurrence_deduplicated() {
        let f = parse("b + a + b * a").unwrap();
        assert_eq!(f.variables(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_no_variables() {
        let f = parse("(1 + 2) * 3").unwrap();
        assert!(f.variables().is_empty());
    }

    #[test]
    fn test_empty_formula_rejected() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn test_unbalanced_parens_rejected() {
        assert!(parse("(1+2").is_err());
        assert!(parse("1+2)").is_err());
        assert!(parse(")1+2(").is_err());
        assert!(parse("((1+2)").is_err());
    }

    #[test]
    fn test_positional_rules() {
        // First token must be a number, variable, or '('.
        assert!(parse("+1").is_err());
        assert!(parse("*x").is_err());
        // Last token must be a number, variable, or ')'.
        assert!(parse("1+").is_err());
        // After '(' or an operator: number, variable, or '('.
        assert!(parse("(+1)").is_err());
        assert!(parse("1++2").is_err());
        assert!(parse("1*/2").is_err());
        // After a value: operator or ')'.
        assert!(parse("1 2").is_err());
        assert!(parse("x y").is_err());
        assert!(parse("(1)(2)").is_err());
        assert!(parse("2x").is_err());
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(parse("()").is_err());
        assert!(parse("1+()").is_err());
    }

    #[test]
    fn test_unknown_character_rejected() {
        assert!(parse("1 & 2").is_err());
        assert!(parse("a1:b2").is_err());
        assert!(parse("50%").is_err());
    }

    #[test]
    fn test_no_unary_sign() {
        assert!(parse("-5").is_err());
        assert!(parse("3 * -5").is_err());
    }

    #[test]
    fn test_validator_rejects_variable() {
        let policy = NamePolicy::new(
            Box::new(|s| s.to_string()),
            Box::new(|s| s.starts_with('A')),
        );
        assert!(Formula::parse("A1 + A2", &policy).is_ok());
        assert!(Formula::parse("A1 + B2", &policy).is_err());
    }

    #[test]
    fn test_normalizer_breaking_shape_rejects_variable() {
        let policy = NamePolicy::new(Box::new(|_| "2bad".to_string()), Box::new(|_| true));
        assert!(Formula::parse("x + 1", &policy).is_err());
    }

    #[test]
    fn test_equality_is_canonical_text() {
        let a = parse("x+2.0").unwrap();
        let b = parse("x + 2").unwrap();
        let c = parse("x+3").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let upper = Formula::parse("x1+y1", &upper_policy()).unwrap();
        let direct = parse("X1+Y1").unwrap();
        assert_eq!(upper, direct);
    }

    #[test]
    fn test_hash_follows_equality() {
        fn hash_of(f: &Formula) -> u64 {
            let mut h = DefaultHasher::new();
            f.hash(&mut h);
            h.finish()
        }
        let a = parse("x+2.0").unwrap();
        let b = parse("x + 2").unwrap();
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_round_trip() {
        for source in ["x+y*2", "(a-b)/(c+1)", "0.0066*q", "_v1+2.5e2"] {
            let f = parse(source).unwrap();
            let again = parse(&f.to_string()).unwrap();
            assert_eq!(f, again);
            assert_eq!(f.canonical(), again.canonical());
        }
    }

    #[test]
    fn test_evaluate_through_formula() {
        let f = parse("6.6e-3").unwrap();
        assert_eq!(f.evaluate(|_| Some(0.0)).unwrap(), 0.0066);

        let f = parse("5 / 0").unwrap();
        assert!(f.evaluate(|_| Some(0.0)).is_err());

        let f = Formula::parse("a1 - 1", &upper_policy()).unwrap();
        assert_eq!(f.evaluate(|name| (name == "A1").then_some(5.0)).unwrap(), 4.0);
    }
}
