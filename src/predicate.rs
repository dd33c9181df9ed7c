use crate::error::{ReplayError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Between,
    Outside,
}

const DEFAULT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Predicate {
    pub op: Op,
    pub val: f64,
    pub val2: Option<f64>,
    pub tolerance: Option<f64>,
}

impl Predicate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.op, Op::Between | Op::Outside) && self.val2.is_none() {
            return Err(ReplayError::validation(
                "VALIDATION_ERROR",
                format!("{:?} requires val2", self.op),
            )
            .with_field("val2"));
        }
        Ok(())
    }

    fn tolerance(&self) -> f64 {
        self.tolerance.unwrap_or(DEFAULT_TOLERANCE)
    }

    pub fn matches(&self, metric: f64) -> bool {
        let tol = self.tolerance();
        match self.op {
            Op::Eq => (metric - self.val).abs() <= tol,
            Op::Ne => (metric - self.val).abs() > tol,
            Op::Gt => metric > self.val,
            Op::Ge => metric >= self.val - tol,
            Op::Lt => metric < self.val,
            Op::Le => metric <= self.val + tol,
            Op::Between => {
                let hi = self.val2.unwrap_or(self.val);
                metric >= self.val - tol && metric <= hi + tol
            }
            Op::Outside => {
                let hi = self.val2.unwrap_or(self.val);
                metric < self.val - tol || metric > hi + tol
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_is_inclusive() {
        let p = Predicate {
            op: Op::Between,
            val: 40.0,
            val2: Some(60.0),
            tolerance: Some(0.0),
        };
        assert!(p.matches(40.0));
        assert!(p.matches(60.0));
        assert!(!p.matches(39.999));
    }

    #[test]
    fn eq_uses_default_tolerance_for_floats() {
        let p = Predicate {
            op: Op::Eq,
            val: 2.0,
            val2: None,
            tolerance: None,
        };
        assert!(p.matches(2.0 + 1e-10));
        assert!(!p.matches(2.01));
    }

    #[test]
    fn outside_requires_val2() {
        let p = Predicate {
            op: Op::Outside,
            val: 1.0,
            val2: None,
            tolerance: None,
        };
        assert!(p.validate().is_err());
    }
}
