//! Condition tree: comparison leaves combined by AND / OR / NOT nodes.

use std::fmt;

use crate::error::{Error, Result};
use crate::value::Value;

/// Comparison and logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    GreaterThan,
    GreaterEqualsThan,
    LesserThan,
    LesserEqualsThan,
    Like,
    In,
    Between,
    And,
    Or,
    Not,
}

impl Operator {
    pub fn is_logical(self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Not)
    }

    /// Synthetic name given to AND / OR / NOT nodes.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            Operator::And => Some("_AND"),
            Operator::Or => Some("_OR"),
            Operator::Not => Some("_NOT"),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::GreaterThan => ">",
            Operator::GreaterEqualsThan => ">=",
            Operator::LesserThan => "<",
            Operator::LesserEqualsThan => "<=",
            Operator::Like => "like",
            Operator::In => "in",
            Operator::Between => "between",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }
}

/// The right-hand side of a condition: a value for comparisons, nested
/// conditions for AND / OR / NOT.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Value(Value),
    Conditions(Vec<Condition>),
}

/// One node of a filter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    name: String,
    operator: Operator,
    value: ConditionValue,
}

impl Condition {
    /// Builds a comparison leaf, checking the value's shape against the
    /// operator. Logical operators are rejected here; use [`Condition::and`],
    /// [`Condition::or`] or [`Condition::negate`].
    pub fn new(name: impl Into<String>, operator: Operator, value: Value) -> Result<Self> {
        if operator.is_logical() {
            return Err(Error::Argument(format!(
                "`{}` combines conditions and cannot compare a value",
                operator.symbol()
            )));
        }
        check_shape(operator, &value)?;
        Ok(Self { name: name.into(), operator, value: ConditionValue::Value(value) })
    }

    pub fn eq(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { name: name.into(), operator: Operator::Equals, value: ConditionValue::Value(value.into()) }
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::logical(Operator::And, conditions)
    }

    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::logical(Operator::Or, conditions)
    }

    pub(crate) fn logical(operator: Operator, conditions: Vec<Condition>) -> Self {
        let name = operator.marker().unwrap_or_default();
        Self { name: name.to_string(), operator, value: ConditionValue::Conditions(conditions) }
    }

    /// NOT(c) becomes c, anything else is wrapped in a NOT node.
    pub fn negate(self) -> Self {
        match (self.operator, self.value) {
            (Operator::Not, ConditionValue::Conditions(mut inner)) if inner.len() == 1 => {
                inner.remove(0)
            }
            (operator, value) => {
                let original = Self { name: self.name, operator, value };
                Self::logical(Operator::Not, vec![original])
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &ConditionValue {
        &self.value
    }

    /// The compared value of a leaf.
    pub fn as_value(&self) -> Option<&Value> {
        match &self.value {
            ConditionValue::Value(value) => Some(value),
            ConditionValue::Conditions(_) => None,
        }
    }

    /// Children of an AND / OR / NOT node.
    pub fn conditions(&self) -> &[Condition] {
        match &self.value {
            ConditionValue::Conditions(conditions) => conditions,
            ConditionValue::Value(_) => &[],
        }
    }

    pub(crate) fn conditions_mut(&mut self) -> Option<&mut Vec<Condition>> {
        match &mut self.value {
            ConditionValue::Conditions(conditions) => Some(conditions),
            ConditionValue::Value(_) => None,
        }
    }
}

/// Checks IN / BETWEEN / LIKE values. Parameters are accepted as-is and
/// checked again once resolved.
pub(crate) fn check_shape(operator: Operator, value: &Value) -> Result<()> {
    if value.is_param() {
        return Ok(());
    }
    match operator {
        Operator::In if value.as_array().is_none() => {
            Err(Error::Argument(format!("`in` expects an array, got {value}")))
        }
        Operator::Between => match value.as_array() {
            Some(values) if values.len() == 2 => Ok(()),
            Some(values) => Err(Error::Argument(format!(
                "`between` expects exactly 2 elements, got {}",
                values.len()
            ))),
            None => Err(Error::Argument(format!("`between` expects an array, got {value}"))),
        },
        Operator::Like if !matches!(value, Value::String(_) | Value::Function(_)) => {
            Err(Error::Argument(format!("`like` expects a string, got {value}")))
        }
        _ => Ok(()),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operator, &self.value) {
            (Operator::Not, ConditionValue::Conditions(inner)) => {
                write!(f, "not ")?;
                match inner.as_slice() {
                    [single] if !single.operator.is_logical() => write!(f, "{single}"),
                    _ => write_group(f, "and", inner),
                }
            }
            (operator, ConditionValue::Conditions(inner)) => write_group(f, operator.symbol(), inner),
            (operator, ConditionValue::Value(value)) => {
                write!(f, "{} {} {}", self.name, operator.symbol(), value)
            }
        }
    }
}

fn write_group(f: &mut fmt::Formatter<'_>, connective: &str, conditions: &[Condition]) -> fmt::Result {
    write!(f, "(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, " {connective} ")?;
        }
        write!(f, "{condition}")?;
    }
    write!(f, ")")
}

/// Root of a statement's filter tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    condition: Condition,
}

impl Where {
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn into_condition(self) -> Condition {
        self.condition
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "where {}", self.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use rstest::rstest;

    fn range(values: &[i64]) -> Value {
        Value::Array(values.iter().copied().map(Value::from).collect())
    }

    #[rstest]
    #[case(&[12])]
    #[case(&[1, 2, 3])]
    #[case(&[])]
    fn test_between_rejects_wrong_arity(#[case] values: &[i64]) {
        let result = Condition::new("age", Operator::Between, range(values));
        assert!(matches!(result, Err(Error::Argument(_))));
    }

    #[test]
    fn test_between_keeps_order() {
        let condition = Condition::new("age", Operator::Between, range(&[12, 13])).unwrap();
        assert_eq!(condition.as_value(), Some(&range(&[12, 13])));
    }

    #[test]
    fn test_in_requires_array() {
        assert!(matches!(
            Condition::new("name", Operator::In, Value::from("Diana")),
            Err(Error::Argument(_))
        ));
        assert!(Condition::new("name", Operator::In, range(&[])).is_ok());
    }

    #[test]
    fn test_like_requires_string() {
        assert!(matches!(
            Condition::new("name", Operator::Like, Value::from(3)),
            Err(Error::Argument(_))
        ));
        assert!(Condition::new("name", Operator::Like, Value::from("Dia%")).is_ok());
    }

    #[test]
    fn test_params_defer_shape_checks() {
        let mut params = Params::new();
        let value = Value::Param(params.add("ages"));
        assert!(Condition::new("age", Operator::Between, value.clone()).is_ok());
        assert!(Condition::new("age", Operator::In, value).is_ok());
    }

    #[test]
    fn test_logical_operator_is_not_a_comparison() {
        assert!(matches!(
            Condition::new("age", Operator::And, Value::from(1)),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_double_negation_round_trip() {
        let condition = Condition::new("age", Operator::GreaterThan, Value::from(10)).unwrap();
        let negated = condition.clone().negate();
        assert_eq!(negated.operator(), Operator::Not);
        assert_eq!(negated.name(), "_NOT");
        assert_eq!(negated.conditions(), &[condition.clone()]);
        assert_eq!(negated.negate(), condition);
    }

    #[test]
    fn test_display() {
        let tree = Condition::or(vec![
            Condition::eq("name", "Diana"),
            Condition::new("age", Operator::In, range(&[1, 2])).unwrap().negate(),
        ]);
        assert_eq!(tree.to_string(), r#"(name = "Diana" or not age in [1, 2])"#);
        assert_eq!(Where::new(tree).to_string(), r#"where (name = "Diana" or not age in [1, 2])"#);
    }
}
