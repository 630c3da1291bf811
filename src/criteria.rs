//! Composable boolean criteria expressions and update assignments
//!
//! A [`Criteria`] is a left-leaning linked tree: each condition node points at
//! everything accumulated before it together with the combinator (AND/OR) used
//! to attach it. Building is step-wise: naming a column yields a
//! [`CriteriaStep`] and applying a comparator yields the extended
//! [`Criteria`], which keeps half-built conditions unrepresentable.
//!
//! The tree is handed to the persistence engine as data; rendering it into a
//! concrete SQL dialect is that engine's concern, not ours.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a condition attaches to the criteria accumulated before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    /// First condition of an expression; nothing precedes it
    Initial,
    And,
    Or,
}

/// Comparison operator of a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    Like,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

/// A composed boolean criteria expression
///
/// `PartialEq` compares full tree shape, so two expressions are equal only
/// when they were folded from the same conditions in the same order; AND/OR
/// folds are not commutative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criteria {
    /// The empty expression; matches everything
    Empty,
    /// One condition plus everything accumulated before it
    Condition {
        previous: Box<Criteria>,
        combinator: Combinator,
        column: String,
        comparator: Comparator,
        /// `None` for the nullary comparators (`IsNull`/`IsNotNull`)
        value: Option<Value>,
    },
}

impl Criteria {
    /// The empty expression
    pub fn empty() -> Self {
        Criteria::Empty
    }

    /// Start a new expression keyed on `column`
    pub fn column(column: impl Into<String>) -> CriteriaStep {
        CriteriaStep {
            previous: Criteria::Empty,
            combinator: Combinator::Initial,
            column: column.into(),
        }
    }

    /// Attach a further condition on `column` with AND
    pub fn and(self, column: impl Into<String>) -> CriteriaStep {
        CriteriaStep {
            previous: self,
            combinator: Combinator::And,
            column: column.into(),
        }
    }

    /// Attach a further condition on `column` with OR
    pub fn or(self, column: impl Into<String>) -> CriteriaStep {
        CriteriaStep {
            previous: self,
            combinator: Combinator::Or,
            column: column.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Criteria::Empty)
    }

    /// Number of conditions in the expression
    pub fn len(&self) -> usize {
        match self {
            Criteria::Empty => 0,
            Criteria::Condition { previous, .. } => 1 + previous.len(),
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::Empty
    }
}

/// A criteria expression with a column named but no comparator applied yet
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaStep {
    previous: Criteria,
    combinator: Combinator,
    column: String,
}

impl CriteriaStep {
    fn finish(self, comparator: Comparator, value: Option<Value>) -> Criteria {
        Criteria::Condition {
            previous: Box::new(self.previous),
            combinator: self.combinator,
            column: self.column,
            comparator,
            value,
        }
    }

    /// `column = value`
    pub fn is(self, value: Value) -> Criteria {
        self.finish(Comparator::Eq, Some(value))
    }

    /// `column != value`
    pub fn not(self, value: Value) -> Criteria {
        self.finish(Comparator::Ne, Some(value))
    }

    pub fn greater_than(self, value: Value) -> Criteria {
        self.finish(Comparator::Gt, Some(value))
    }

    pub fn greater_than_or_equals(self, value: Value) -> Criteria {
        self.finish(Comparator::Ge, Some(value))
    }

    pub fn less_than(self, value: Value) -> Criteria {
        self.finish(Comparator::Lt, Some(value))
    }

    pub fn less_than_or_equals(self, value: Value) -> Criteria {
        self.finish(Comparator::Le, Some(value))
    }

    /// `column IN (values...)`
    pub fn in_list(self, values: Vec<Value>) -> Criteria {
        self.finish(Comparator::In, Some(Value::Array(values)))
    }

    /// `column NOT IN (values...)`
    pub fn not_in_list(self, values: Vec<Value>) -> Criteria {
        self.finish(Comparator::NotIn, Some(Value::Array(values)))
    }

    /// `column LIKE pattern`; the pattern is used verbatim
    pub fn like(self, pattern: impl Into<String>) -> Criteria {
        self.finish(Comparator::Like, Some(Value::String(pattern.into())))
    }

    /// Inclusive range condition
    pub fn between(self, begin: Value, end: Value) -> Criteria {
        self.finish(Comparator::Between, Some(Value::Array(vec![begin, end])))
    }

    /// Negated inclusive range condition
    pub fn not_between(self, begin: Value, end: Value) -> Criteria {
        self.finish(Comparator::NotBetween, Some(Value::Array(vec![begin, end])))
    }

    /// `column IS NULL`
    pub fn is_null(self) -> Criteria {
        self.finish(Comparator::IsNull, None)
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(self) -> Criteria {
        self.finish(Comparator::IsNotNull, None)
    }
}

/// An ordered set of column assignments for an update statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    assignments: Vec<(String, Value)>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-assignment update, the shape the logic-delete plugin produces
    pub fn of(column: impl Into<String>, value: Value) -> Self {
        Self::new().set(column, value)
    }

    /// Append an assignment; a column assigned twice keeps the later value
    /// at the position of its first appearance
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        let column = column.into();
        if let Some(existing) = self.assignments.iter_mut().find(|(c, _)| *c == column) {
            existing.1 = value;
        } else {
            self.assignments.push((column, value));
        }
        self
    }

    pub fn assignments(&self) -> &[(String, Value)] {
        &self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
