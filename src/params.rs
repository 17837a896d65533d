//! Named parameter registry.
//!
//! Every `@name` found while parsing registers a [`ParamValue`] cell here. The
//! same cell is embedded in the condition tree, so binding a value through the
//! registry is visible wherever the parameter was used.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::value::Value;

/// A shared, late-bound parameter cell.
#[derive(Clone)]
pub struct ParamValue {
    name: Rc<str>,
    cell: Rc<RefCell<Option<Value>>>,
}

impl ParamValue {
    fn new(name: &str) -> Self {
        Self { name: Rc::from(name), cell: Rc::new(RefCell::new(None)) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.cell.borrow().is_some()
    }

    /// The bound value. Fails until the parameter has been bound.
    pub fn get(&self) -> Result<Value> {
        self.cell
            .borrow()
            .clone()
            .ok_or_else(|| Error::Query(format!("parameter `{}` is not bound", self.name)))
    }

    fn set(&self, value: Value) {
        *self.cell.borrow_mut() = Some(value);
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && *self.cell.borrow() == *other.cell.borrow()
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamValue")
            .field("name", &self.name)
            .field("value", &*self.cell.borrow())
            .finish()
    }
}

/// Parameters declared by one parsed query.
///
/// Not thread-safe: a registry and the statement owning it belong to a single
/// caller at a time.
#[derive(Debug, Default, Clone)]
pub struct Params {
    declared: Vec<ParamValue>,
    /// Values bound under names the query never declared.
    extra: Vec<ParamValue>,
    unbound: Vec<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, or returns the cell already registered under it.
    pub fn add(&mut self, name: &str) -> ParamValue {
        if let Some(existing) = self.declared.iter().find(|p| p.name() == name) {
            return existing.clone();
        }
        // a value bound before the name was declared carries over
        if let Some(index) = self.extra.iter().position(|p| p.name() == name) {
            let param = self.extra.remove(index);
            self.declared.push(param.clone());
            return param;
        }
        let param = ParamValue::new(name);
        self.declared.push(param.clone());
        self.unbound.push(name.to_string());
        param
    }

    /// Stores `value` under `name`. Binding again overwrites the previous value.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        debug!(name, value = %value, "binding parameter");
        if let Some(param) = self.find(name) {
            param.set(value);
        } else {
            let param = ParamValue::new(name);
            param.set(value);
            self.extra.push(param);
        }
        self.unbound.retain(|n| n != name);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.find(name)
    }

    fn find(&self, name: &str) -> Option<&ParamValue> {
        self.declared.iter().chain(self.extra.iter()).find(|p| p.name() == name)
    }

    /// Whether the query declared any parameter at all.
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Names still waiting for a value, in declaration order.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.unbound.iter().map(String::as_str).collect()
    }

    /// Every declared name, in declaration order.
    pub fn declared_names(&self) -> Vec<&str> {
        self.declared.iter().map(ParamValue::name).collect()
    }

    pub fn is_fully_bound(&self) -> bool {
        self.unbound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_param_fails() {
        let mut params = Params::new();
        let param = params.add("name");
        assert!(!param.is_bound());
        assert!(matches!(param.get(), Err(Error::Query(_))));
        assert_eq!(params.parameter_names(), vec!["name"]);
    }

    #[test]
    fn test_bind_is_visible_through_existing_cells() {
        let mut params = Params::new();
        let param = params.add("name");
        params.bind("name", "Diana");
        assert_eq!(param.get().unwrap(), Value::String("Diana".to_string()));
        assert!(params.parameter_names().is_empty());
        assert!(params.is_fully_bound());
    }

    #[test]
    fn test_add_returns_existing_cell() {
        let mut params = Params::new();
        let first = params.add("age");
        let second = params.add("age");
        params.bind("age", 30);
        assert_eq!(first.get().unwrap(), second.get().unwrap());
        assert_eq!(params.declared_names(), vec!["age"]);
    }

    #[test]
    fn test_rebinding_overwrites() {
        let mut params = Params::new();
        let param = params.add("age");
        params.bind("age", 30);
        params.bind("age", 31);
        assert_eq!(param.get().unwrap(), Value::from(31));
    }

    #[test]
    fn test_binding_unknown_name_does_not_declare_it() {
        let mut params = Params::new();
        params.add("name");
        params.bind("other", 1);
        assert_eq!(params.parameter_names(), vec!["name"]);
        assert_eq!(params.declared_names(), vec!["name"]);
        assert_eq!(params.get("other").unwrap().get().unwrap(), Value::from(1));
    }

    #[test]
    fn test_declaring_a_bound_name_keeps_its_value() {
        let mut params = Params::new();
        params.bind("name", "Diana");
        let param = params.add("name");
        assert_eq!(param.get().unwrap(), Value::from("Diana"));
        assert_eq!(params.declared_names(), vec!["name"]);
        assert!(params.is_fully_bound());

        params.bind("name", "Artemis");
        assert_eq!(param.get().unwrap(), Value::from("Artemis"));
    }

    #[test]
    fn test_names_shrink_in_declaration_order() {
        let mut params = Params::new();
        params.add("a");
        params.add("b");
        params.add("c");
        params.bind("b", 2);
        assert_eq!(params.parameter_names(), vec!["a", "c"]);
        assert!(params.is_not_empty());
        assert!(Params::new().is_empty());
    }
}
