//! Named-variable table with arithmetic mutation.
//!
//! Values are stored as strings; `$name` tokens resolve through the
//! table, anything else is a literal. Missing or empty tokens resolve
//! to a neutral default rather than failing, so scripts written against
//! sloppy corpora keep playing.

use std::collections::BTreeMap;

/// Mutating operations exposed by the arithmetic command verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Multiply,
    Divide,
    Tangent,
    Trunc,
    Sinus,
}

#[derive(Debug, Default, Clone)]
pub struct VariableTable {
    values: BTreeMap<String, String>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a variable. The value may itself be a
    /// `$var` reference, which is resolved at definition time.
    pub fn define(&mut self, name: &str, value: &str) {
        let resolved = self.eval_string(value);
        self.values.insert(name.to_string(), resolved);
    }

    /// Apply an arithmetic op to `name` against a resolved operand.
    ///
    /// Binary ops mutate the current value in place; the unary ops
    /// (tangent, trunc, sinus) replace it with `f(operand)`. Trig
    /// operands are in degrees. Division by zero logs and no-ops.
    pub fn apply(&mut self, op: ArithmeticOp, name: &str, operand: &str) {
        let rhs = self.eval_double(operand);
        let current = self.eval_double(&format!("${name}"));
        let next = match op {
            ArithmeticOp::Add => current + rhs,
            ArithmeticOp::Sub => current - rhs,
            ArithmeticOp::Multiply => current * rhs,
            ArithmeticOp::Divide => {
                if rhs == 0.0 {
                    log::warn!("divide {name} by zero ignored");
                    return;
                }
                current / rhs
            }
            ArithmeticOp::Tangent => rhs.to_radians().tan(),
            ArithmeticOp::Trunc => rhs.trunc(),
            ArithmeticOp::Sinus => rhs.to_radians().sin(),
        };
        self.values.insert(name.to_string(), format_double(next));
    }

    /// Resolve a `$var`-or-literal token to a string. Missing variables
    /// resolve to the empty string.
    pub fn eval_string(&self, token: &str) -> String {
        match token.strip_prefix('$') {
            Some(name) => self.values.get(name).cloned().unwrap_or_default(),
            None => token.to_string(),
        }
    }

    /// Resolve a token to a double, defaulting to 0.0.
    pub fn eval_double(&self, token: &str) -> f64 {
        self.try_eval_double(token).unwrap_or(0.0)
    }

    /// Resolve a token to an integer, defaulting to 0. Fractional
    /// values truncate toward zero.
    pub fn eval_int(&self, token: &str) -> i64 {
        self.eval_double(token).trunc() as i64
    }

    /// Like [`eval_double`](Self::eval_double) but reports a token that
    /// resolves to no number at all, which the conditional evaluator
    /// treats specially.
    pub fn try_eval_double(&self, token: &str) -> Option<f64> {
        let resolved = self.eval_string(token);
        resolved.trim().parse::<f64>().ok()
    }

    /// Drop every variable. Invoked at config-reload boundaries.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Diagnostic dump of the whole table.
    pub fn dump(&self) {
        if self.values.is_empty() {
            log::info!("variable table is empty");
            return;
        }
        for (name, value) in &self.values {
            log::info!("variable {name} = {value}");
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Render a double the way scripts expect to read it back: integral
/// values print without a fractional part.
fn format_double(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::{ArithmeticOp, VariableTable};

    #[test]
    fn define_then_resolve() {
        let mut vars = VariableTable::new();
        vars.define("year", "2004");
        assert_eq!(vars.eval_string("$year"), "2004");
        assert_eq!(vars.eval_double("$year"), 2004.0);
        assert_eq!(vars.eval_int("$year"), 2004);
    }

    #[test]
    fn define_resolves_variable_references() {
        let mut vars = VariableTable::new();
        vars.define("a", "7");
        vars.define("b", "$a");
        assert_eq!(vars.eval_string("$b"), "7");
    }

    #[test]
    fn missing_variable_is_neutral_not_an_error() {
        let vars = VariableTable::new();
        assert_eq!(vars.eval_string("$nope"), "");
        assert_eq!(vars.eval_double("$nope"), 0.0);
        assert_eq!(vars.eval_int("$nope"), 0);
        assert!(vars.try_eval_double("$nope").is_none());
    }

    #[test]
    fn literals_pass_through() {
        let vars = VariableTable::new();
        assert_eq!(vars.eval_string("Mars"), "Mars");
        assert_eq!(vars.eval_double("2.5"), 2.5);
        assert_eq!(vars.eval_int("2.9"), 2);
    }

    #[test]
    fn binary_ops_mutate_in_place() {
        let mut vars = VariableTable::new();
        vars.define("x", "10");
        vars.apply(ArithmeticOp::Add, "x", "5");
        assert_eq!(vars.eval_double("$x"), 15.0);
        vars.apply(ArithmeticOp::Sub, "x", "3");
        assert_eq!(vars.eval_double("$x"), 12.0);
        vars.apply(ArithmeticOp::Multiply, "x", "2");
        assert_eq!(vars.eval_double("$x"), 24.0);
        vars.apply(ArithmeticOp::Divide, "x", "4");
        assert_eq!(vars.eval_double("$x"), 6.0);
    }

    #[test]
    fn operand_may_be_a_variable_reference() {
        let mut vars = VariableTable::new();
        vars.define("x", "10");
        vars.define("step", "4");
        vars.apply(ArithmeticOp::Add, "x", "$step");
        assert_eq!(vars.eval_double("$x"), 14.0);
    }

    #[test]
    fn divide_by_zero_is_ignored() {
        let mut vars = VariableTable::new();
        vars.define("x", "10");
        vars.apply(ArithmeticOp::Divide, "x", "0");
        assert_eq!(vars.eval_double("$x"), 10.0);
    }

    #[test]
    fn unary_ops_store_function_of_operand() {
        let mut vars = VariableTable::new();
        vars.apply(ArithmeticOp::Sinus, "s", "90");
        assert!((vars.eval_double("$s") - 1.0).abs() < 1e-9);
        vars.apply(ArithmeticOp::Tangent, "t", "45");
        assert!((vars.eval_double("$t") - 1.0).abs() < 1e-9);
        vars.apply(ArithmeticOp::Trunc, "n", "3.9");
        assert_eq!(vars.eval_double("$n"), 3.0);
    }

    #[test]
    fn undefined_target_starts_from_zero() {
        let mut vars = VariableTable::new();
        vars.apply(ArithmeticOp::Add, "fresh", "2");
        assert_eq!(vars.eval_double("$fresh"), 2.0);
    }

    #[test]
    fn clear_wipes_the_table() {
        let mut vars = VariableTable::new();
        vars.define("x", "1");
        assert_eq!(vars.len(), 1);
        vars.clear();
        assert!(vars.is_empty());
        assert_eq!(vars.eval_string("$x"), "");
    }

    #[test]
    fn integral_results_print_without_fraction() {
        let mut vars = VariableTable::new();
        vars.define("x", "1.5");
        vars.apply(ArithmeticOp::Add, "x", "0.5");
        assert_eq!(vars.eval_string("$x"), "2");
    }
}
