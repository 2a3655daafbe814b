//! Rule AST data structures.
//!
//! The abstract syntax tree for entry/exit/filter rules:
//! - `Operand`: what can be compared (price fields, constants, indicators)
//! - `IndicatorRef`: reference to an indicator with a specific field
//! - `CmpOp`: the comparison operator, kept as configured (strict vs
//!   inclusive bounds are distinct operators, never normalized)
//! - `Rule`: comparisons, crossovers, and boolean composites

use std::fmt;

use crate::domain::indicator::{IndicatorField, IndicatorId};

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorRef),
}

impl Operand {
    pub fn collect_indicators(&self, out: &mut Vec<IndicatorId>) {
        if let Operand::Indicator(r) = self
            && !out.contains(&r.id)
        {
            out.push(r.id.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub id: IndicatorId,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn compare(self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Lt => left < right,
            CmpOp::Le => left <= right,
            CmpOp::Gt => left > right,
            CmpOp::Ge => left >= right,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    All(Vec<Rule>),
    Any(Vec<Rule>),
    Not(Box<Rule>),
}

impl Rule {
    /// Every indicator this rule reads, deduplicated.
    pub fn indicator_ids(&self) -> Vec<IndicatorId> {
        let mut out = Vec::new();
        self.collect_indicators(&mut out);
        out
    }

    pub fn collect_indicators(&self, out: &mut Vec<IndicatorId>) {
        match self {
            Rule::Compare { left, right, .. }
            | Rule::CrossAbove { left, right }
            | Rule::CrossBelow { left, right } => {
                left.collect_indicators(out);
                right.collect_indicators(out);
            }
            Rule::All(rules) | Rule::Any(rules) => {
                for rule in rules {
                    rule.collect_indicators(out);
                }
            }
            Rule::Not(inner) => inner.collect_indicators(out),
        }
    }
}
