//! Moniker range expressions.
//!
//! Grammar:
//!
//! ```text
//! range          := comparator-set { "||" comparator-set }
//! comparator-set := { comparator }                 // implicit AND
//! comparator     := [ operator ] moniker-name
//! operator       := "=" | ">" | "<" | ">=" | "<="   // "=" if omitted
//! moniker-name   := [A-Za-z_][\w.\-]*
//! ```
//!
//! Parsing is recursive descent over the raw string. Terminals are matched with
//! anchored regular expressions and the matched prefix is consumed.

use std::{fmt, sync::OnceLock};

use regex::Regex;

use crate::moniker::MonikerError;

/// Comparison operator of a comparator leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// The operator as written in a range string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

/// Boolean connective between two sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    /// Juxtaposition inside a comparator set.
    And,
    /// `||` between comparator sets.
    Or,
}

/// Parsed moniker range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeExpr {
    Comparator {
        op: Operator,
        moniker: String,
    },
    Logic {
        left: Box<RangeExpr>,
        op: LogicOp,
        right: Box<RangeExpr>,
    },
}

/// Visitor over a [`RangeExpr`] tree.
pub trait RangeVisitor {
    type Output;

    fn visit_comparator(&mut self, op: Operator, moniker: &str) -> Self::Output;

    fn visit_logic(&mut self, left: &RangeExpr, op: LogicOp, right: &RangeExpr) -> Self::Output;
}

impl RangeExpr {
    /// Parse a range string.
    pub fn parse(input: &str) -> Result<Self, MonikerError> {
        let mut parser = RangeParser {
            source: input,
            rest: input,
        };
        let expr = parser.parse_range()?;

        let remainder = parser.rest.trim_start();
        if !remainder.is_empty() {
            return Err(parser.error("unexpected input"));
        }

        Ok(expr)
    }

    /// Dispatch to the matching visitor method.
    pub fn accept<V: RangeVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Self::Comparator { op, moniker } => visitor.visit_comparator(*op, moniker),
            Self::Logic { left, op, right } => visitor.visit_logic(left, *op, right),
        }
    }

    fn logic(left: RangeExpr, op: LogicOp, right: RangeExpr) -> Self {
        Self::Logic {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }
}

impl fmt::Display for RangeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparator { op, moniker } => write!(f, "{}{moniker}", op.as_str()),
            Self::Logic {
                left,
                op: LogicOp::And,
                right,
            } => write!(f, "{left} {right}"),
            Self::Logic {
                left,
                op: LogicOp::Or,
                right,
            } => write!(f, "({left} || {right})"),
        }
    }
}

fn comparator_regex() -> &'static Regex {
    static COMPARATOR: OnceLock<Regex> = OnceLock::new();
    COMPARATOR.get_or_init(|| {
        Regex::new(r"^\s*(>=|<=|=|>|<)?\s*([A-Za-z_][\w.\-]*)").expect("Invalid regex")
    })
}

fn or_regex() -> &'static Regex {
    static OR: OnceLock<Regex> = OnceLock::new();
    OR.get_or_init(|| Regex::new(r"^\s*\|\|").expect("Invalid regex"))
}

struct RangeParser<'a> {
    source: &'a str,
    rest: &'a str,
}

impl RangeParser<'_> {
    fn parse_range(&mut self) -> Result<RangeExpr, MonikerError> {
        let mut expr = self.parse_comparator_set()?;

        while let Some(found) = or_regex().find(self.rest) {
            self.rest = &self.rest[found.end()..];
            let right = self.parse_comparator_set()?;
            expr = RangeExpr::logic(expr, LogicOp::Or, right);
        }

        Ok(expr)
    }

    fn parse_comparator_set(&mut self) -> Result<RangeExpr, MonikerError> {
        let Some(mut expr) = self.parse_comparator() else {
            return Err(self.error("expected a comparator"));
        };

        while let Some(next) = self.parse_comparator() {
            expr = RangeExpr::logic(expr, LogicOp::And, next);
        }

        Ok(expr)
    }

    fn parse_comparator(&mut self) -> Option<RangeExpr> {
        let captures = comparator_regex().captures(self.rest)?;
        let whole = captures.get(0)?;
        let op = captures
            .get(1)
            .and_then(|m| Operator::from_token(m.as_str()))
            .unwrap_or(Operator::Eq);
        let moniker = captures.get(2)?.as_str().to_string();

        self.rest = &self.rest[whole.end()..];
        Some(RangeExpr::Comparator { op, moniker })
    }

    fn error(&self, message: &str) -> MonikerError {
        MonikerError::Parse {
            range: self.source.to_string(),
            remainder: self.rest.trim().to_string(),
            message: message.to_string(),
        }
    }
}
