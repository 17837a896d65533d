//! Incremental construction of a filter tree from conditions seen in textual
//! order.
//!
//! Both parsers feed this builder: they call [`WhereBuilder::and`] or
//! [`WhereBuilder::or`] when they meet a connective, then
//! [`WhereBuilder::observe`] for the condition that follows it.
//!
//! ```text
//! a and b and c      -> AND(a, b, c)
//! a and b or c       -> AND(a, b, OR(c))
//! a and b or c or d  -> AND(a, b, OR(c, d))
//! a or b and c       -> OR(a, b, AND(c))
//! ```
//!
//! Runs of the same connective flatten into one node. When the connective
//! changes, the new run nests under the trailing child of the current root
//! instead of wrapping the root.

use tracing::trace;

use crate::condition::{Condition, Operator, Where};
use crate::error::Result;
use crate::value::Value;

#[derive(Debug)]
pub struct WhereBuilder {
    condition: Option<Condition>,
    /// Most recent connective; `and` until an `or` is seen
    and: bool,
}

impl Default for WhereBuilder {
    fn default() -> Self {
        Self { condition: None, and: true }
    }
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self) {
        self.and = true;
    }

    pub fn or(&mut self) {
        self.and = false;
    }

    /// Builds a comparison leaf, negated when `negate` is set, and combines
    /// it with what was observed so far.
    pub fn observe(&mut self, name: &str, operator: Operator, value: Value, negate: bool) -> Result<()> {
        let mut condition = Condition::new(name, operator, value)?;
        if negate {
            condition = condition.negate();
        }
        self.push(condition);
        Ok(())
    }

    /// Combines an already built condition using the current connective.
    pub fn push(&mut self, condition: Condition) {
        let operator = if self.and { Operator::And } else { Operator::Or };
        trace!(?operator, %condition, "combining condition");
        self.condition = Some(match self.condition.take() {
            None => condition,
            Some(current) => combine(current, operator, condition),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_none()
    }

    pub fn build(self) -> Option<Where> {
        self.condition.map(Where::new)
    }
}

fn combine(mut current: Condition, operator: Operator, condition: Condition) -> Condition {
    if current.operator() == operator {
        if let Some(children) = current.conditions_mut() {
            children.push(condition);
        }
        return current;
    }

    let appendable = matches!(current.operator(), Operator::And | Operator::Or);
    if !appendable {
        return Condition::logical(operator, vec![current, condition]);
    }

    // `current` is a node of the other connective
    if let Some(children) = current.conditions_mut() {
        let extends_last = children.last().is_some_and(|last| last.operator() == operator);
        if extends_last {
            if let Some(grandchildren) = children.last_mut().and_then(Condition::conditions_mut) {
                grandchildren.push(condition);
            }
        } else {
            children.push(Condition::logical(operator, vec![condition]));
        }
    }
    current
}
