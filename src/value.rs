//! Literal values produced while parsing.

use std::fmt;

use serde_json::Number;

use crate::error::{Error, Result};
use crate::params::ParamValue;

/// A value used in conditions, assignments and key-value statements.
///
/// Parsed values are immutable. A [`Value::Param`] only becomes concrete once
/// its parameter is bound; use [`Value::resolved`] to obtain a parameter-free
/// copy.
///
/// # Examples
///
/// ```
/// use nosql_query::Value;
///
/// let age = Value::from(30);
/// let name = Value::from("Diana");
/// let range = Value::Array(vec![Value::from(12), Value::from(13)]);
/// assert_eq!(range.to_string(), "[12, 13]");
/// assert_eq!(name.to_string(), "\"Diana\"");
/// assert_eq!(age.as_number().and_then(|n| n.as_i64()), Some(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer or floating point number
    Number(Number),

    String(String),

    /// JSON object literal, or a JSON scalar (`true`, `false`, `null`) bound
    /// from the outside
    Json(serde_json::Value),

    Array(Vec<Value>),

    /// Function call such as `convert(12, Integer)`
    Function(Function),

    /// Named parameter `@name`
    Param(ParamValue),
}

/// A function call literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Value>,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Value::Param(_))
    }

    /// Returns a copy with every parameter replaced by its bound value and
    /// every function evaluated.
    pub fn resolved(&self) -> Result<Value> {
        match self {
            Value::Param(param) => param.get()?.resolved(),
            Value::Array(values) => Ok(Value::Array(
                values.iter().map(Value::resolved).collect::<Result<Vec<_>>>()?,
            )),
            Value::Function(function) => function.evaluate(),
            other => Ok(other.clone()),
        }
    }

    /// Converts the resolved value into plain JSON.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self.resolved()? {
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::Json(json) => json,
            Value::Array(values) => serde_json::Value::Array(
                values.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            ),
            // resolved() leaves neither functions nor parameters behind
            Value::Function(_) | Value::Param(_) => serde_json::Value::Null,
        })
    }
}

impl Function {
    /// Evaluates the function. Only `convert(value, Type)` is known.
    pub fn evaluate(&self) -> Result<Value> {
        match self.name.to_ascii_lowercase().as_str() {
            "convert" => self.convert(),
            _ => Err(Error::UnsupportedOperation(format!("function `{}`", self.name))),
        }
    }

    fn convert(&self) -> Result<Value> {
        let [value, target] = self.params.as_slice() else {
            return Err(Error::Argument(format!(
                "convert expects 2 arguments, got {}",
                self.params.len()
            )));
        };
        let Some(target) = target.as_str() else {
            return Err(Error::Argument(format!("convert target must be a type name, got {target}")));
        };
        let value = value.resolved()?;
        let short_name = target.rsplit('.').next().unwrap_or(target);

        match short_name {
            "Integer" | "Long" | "Short" | "Byte" | "int" | "long" => {
                let n = match &value {
                    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                n.map(Value::from).ok_or_else(|| cannot_convert(&value, target))
            }
            "Double" | "Float" | "BigDecimal" | "double" | "float" => {
                let n = match &value {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                n.and_then(Number::from_f64).map(Value::Number).ok_or_else(|| cannot_convert(&value, target))
            }
            "String" => match value {
                Value::String(s) => Ok(Value::String(s)),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Json(json) => Ok(Value::String(json.to_string())),
                other => Err(cannot_convert(&other, target)),
            },
            "Boolean" | "boolean" => match &value {
                Value::Json(serde_json::Value::Bool(b)) => Ok(Value::Json(serde_json::Value::Bool(*b))),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::from(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::from(false)),
                _ => Err(cannot_convert(&value, target)),
            },
            _ => Err(Error::UnsupportedOperation(format!("convert to `{target}`"))),
        }
    }
}

fn cannot_convert(value: &Value, target: &str) -> Error {
    Error::Argument(format!("cannot convert {value} to {target}"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
            Value::Json(json) => write!(f, "{json}"),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Value::Function(function) => write!(f, "{function}"),
            Value::Param(param) => write!(f, "@{}", param.name()),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            // type names are bare identifiers
            match param {
                Value::String(s) if i > 0 => write!(f, "{s}")?,
                other => write!(f, "{other}")?,
            }
        }
        write!(f, ")")
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(Number::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Json(serde_json::Value::Null))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Json(serde_json::Value::Bool(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(values)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(values) => {
                Value::Array(values.into_iter().map(Value::from).collect())
            }
            other => Value::Json(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use rstest::rstest;
    use serde_json::json;

    fn convert(value: Value, target: &str) -> Function {
        Function { name: "convert".to_string(), params: vec![value, Value::from(target)] }
    }

    #[test]
    fn test_resolved_replaces_params_inside_arrays() {
        let mut params = Params::new();
        let low = Value::Param(params.add("low"));
        let value = Value::Array(vec![low, Value::from(20)]);
        assert!(matches!(value.resolved(), Err(Error::Query(_))));

        params.bind("low", 10);
        assert_eq!(value.resolved().unwrap(), Value::Array(vec![Value::from(10), Value::from(20)]));
    }

    #[rstest]
    #[case(Value::from("12"), "Integer", Value::from(12))]
    #[case(Value::from(12.9), "java.lang.Long", Value::from(12))]
    #[case(Value::from(3), "Double", Value::from(3.0))]
    #[case(Value::from(42), "String", Value::from("42"))]
    #[case(Value::from("TRUE"), "Boolean", Value::from(true))]
    fn test_convert(#[case] input: Value, #[case] target: &str, #[case] expected: Value) {
        assert_eq!(convert(input, target).evaluate().unwrap(), expected);
    }

    #[test]
    fn test_convert_failures() {
        assert!(matches!(convert(Value::from("abc"), "Integer").evaluate(), Err(Error::Argument(_))));
        assert!(matches!(
            convert(Value::from(1), "MonthDay").evaluate(),
            Err(Error::UnsupportedOperation(_))
        ));
        let unknown = Function { name: "upper".to_string(), params: vec![Value::from("x")] };
        assert!(matches!(unknown.evaluate(), Err(Error::UnsupportedOperation(_))));
    }

    #[test]
    fn test_to_json() {
        let value = Value::Array(vec![Value::from("a"), Value::from(1), Value::Json(json!({"k": true}))]);
        assert_eq!(value.to_json().unwrap(), json!(["a", 1, {"k": true}]));
    }

    #[test]
    fn test_from_json_normalizes_scalars() {
        assert_eq!(Value::from(json!("x")), Value::from("x"));
        assert_eq!(Value::from(json!([1, 2])), Value::Array(vec![Value::from(1), Value::from(2)]));
        assert_eq!(Value::from(json!({"a": 1})), Value::Json(json!({"a": 1})));
    }

    #[test]
    fn test_display() {
        let mut params = Params::new();
        let function = Function {
            name: "convert".to_string(),
            params: vec![Value::Param(params.add("age")), Value::from("Integer")],
        };
        assert_eq!(Value::Function(function).to_string(), "convert(@age, Integer)");
        assert_eq!(Value::from("say \"hi\"").to_string(), r#""say \"hi\"""#);
    }
}
