//! Prepared statements: parse once, bind parameters, execute against an
//! injected [`Manager`].

use std::time::Duration;

use tracing::debug;

use crate::ast::{DeleteQuery, InsertQuery, Query, SelectQuery, UpdateQuery};
use crate::error::{Error, Result};
use crate::method_parser::parse_method;
use crate::params::Params;
use crate::parser::{parse, ParsedQuery};
use crate::value::Value;

/// The store a statement runs against.
///
/// Every operation defaults to [`Error::UnsupportedOperation`], so a key-value
/// store implements `get`/`put`/`remove` and a document or column store
/// implements `select`/`insert`/`update`/`delete`. Parameters inside the
/// queries are bound by the time the manager sees them; call
/// [`Value::resolved`] to read them.
pub trait Manager {
    type Item;

    fn select(&mut self, query: &SelectQuery) -> Result<Vec<Self::Item>> {
        let _ = query;
        Err(unsupported("select"))
    }

    fn insert(&mut self, query: &InsertQuery) -> Result<()> {
        let _ = query;
        Err(unsupported("insert"))
    }

    fn update(&mut self, query: &UpdateQuery) -> Result<()> {
        let _ = query;
        Err(unsupported("update"))
    }

    fn delete(&mut self, query: &DeleteQuery) -> Result<()> {
        let _ = query;
        Err(unsupported("delete"))
    }

    /// Value stored under `key`, if any. `key` is already resolved.
    fn get(&mut self, key: &Value) -> Result<Option<Self::Item>> {
        let _ = key;
        Err(unsupported("get"))
    }

    fn put(&mut self, key: &Value, value: &Value, ttl: Option<Duration>) -> Result<()> {
        let _ = (key, value, ttl);
        Err(unsupported("put"))
    }

    fn remove(&mut self, key: &Value) -> Result<()> {
        let _ = key;
        Err(unsupported("remove"))
    }
}

fn unsupported(operation: &str) -> Error {
    Error::UnsupportedOperation(format!("`{operation}` is not supported by this manager"))
}

/// Parses `text` into a statement bound to `manager`.
pub fn prepare<'m, M: Manager>(text: &str, manager: &'m mut M) -> Result<PreparedStatement<'m, M>> {
    Ok(PreparedStatement::new(parse(text)?, manager))
}

/// Parses a repository method name into a statement bound to `manager`.
pub fn prepare_method<'m, M: Manager>(
    method: &str,
    entity: &str,
    manager: &'m mut M,
) -> Result<PreparedStatement<'m, M>> {
    let parsed = parse_method(method, entity)?;
    Ok(PreparedStatement::new(ParsedQuery { query: parsed.query, params: parsed.params }, manager))
}

/// Parses and runs `text` in one go. Statements with parameters must go
/// through [`prepare`].
pub fn query<M: Manager>(text: &str, manager: &mut M) -> Result<Vec<M::Item>> {
    let parsed = parse(text)?;
    if parsed.params.is_not_empty() {
        return Err(Error::Query(format!(
            "parameters {:?} need a prepared statement",
            parsed.params.declared_names()
        )));
    }
    PreparedStatement::new(parsed, manager).get_result_list()
}

/// A parsed statement, its parameters and the manager it runs against.
///
/// Not thread-safe; bind and execute from one caller at a time.
pub struct PreparedStatement<'m, M: Manager> {
    query: Query,
    params: Params,
    manager: &'m mut M,
}

impl<'m, M: Manager> PreparedStatement<'m, M> {
    pub fn new(parsed: ParsedQuery, manager: &'m mut M) -> Self {
        Self { query: parsed.query, params: parsed.params, manager }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Binds `name`. Binding again overwrites, so a statement can be re-run
    /// with new values.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.params.bind(name, value);
        self
    }

    /// Binds `args` to the declared parameters in declaration order, the way
    /// a repository method's arguments map onto its name.
    pub fn bind_args<I, V>(&mut self, args: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let args: Vec<Value> = args.into_iter().map(Into::into).collect();
        let names: Vec<String> = self.params.declared_names().into_iter().map(String::from).collect();
        if args.len() > names.len() {
            return Err(Error::Argument(format!(
                "too many arguments: the statement declares {} parameters, got {}",
                names.len(),
                args.len()
            )));
        }
        for (name, arg) in names.iter().zip(args) {
            self.params.bind(name, arg);
        }
        Ok(self)
    }

    /// Runs the statement. Writes return an empty list.
    pub fn get_result_list(&mut self) -> Result<Vec<M::Item>> {
        let mut results = Vec::new();
        self.execute(|item| {
            results.push(item);
            true
        })?;
        Ok(results)
    }

    /// Runs the statement and expects at most one result.
    pub fn get_single_result(&mut self) -> Result<Option<M::Item>> {
        let mut first = None;
        let mut count = 0;
        self.execute(|item| {
            count += 1;
            if first.is_none() {
                first = Some(item);
            }
            count < 2
        })?;
        if count > 1 {
            return Err(Error::NonUniqueResult(count));
        }
        Ok(first)
    }

    /// Feeds results to `sink` until it returns `false`. Keys of a `get` are
    /// looked up one at a time, so stopping early skips the remaining lookups.
    fn execute<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(M::Item) -> bool,
    {
        let unbound = self.params.parameter_names();
        if !unbound.is_empty() {
            return Err(Error::Query(format!("unbound parameters: {}", unbound.join(", "))));
        }
        debug!(kind = ?self.query.kind(), "executing statement");

        match &self.query {
            Query::Select(select) => {
                for item in self.manager.select(select)? {
                    if !sink(item) {
                        break;
                    }
                }
            }
            Query::Get(get) => {
                for key in get.keys() {
                    if let Some(item) = self.manager.get(&key.resolved()?)? {
                        if !sink(item) {
                            break;
                        }
                    }
                }
            }
            Query::Insert(insert) => self.manager.insert(insert)?,
            Query::Update(update) => self.manager.update(update)?,
            Query::Delete(delete) => self.manager.delete(delete)?,
            Query::Put(put) => {
                self.manager.put(&put.key().resolved()?, &put.value().resolved()?, put.ttl())?
            }
            Query::Del(del) => {
                for key in del.keys() {
                    self.manager.remove(&key.resolved()?)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use anyhow::anyhow;

    /// Key-value store keyed by the key's text form.
    #[derive(Default)]
    struct KeyValueStore {
        entries: HashMap<String, Value>,
        lookups: usize,
    }

    impl Manager for KeyValueStore {
        type Item = Value;

        fn get(&mut self, key: &Value) -> Result<Option<Value>> {
            self.lookups += 1;
            Ok(self.entries.get(&key.to_string()).cloned())
        }

        fn put(&mut self, key: &Value, value: &Value, _ttl: Option<Duration>) -> Result<()> {
            self.entries.insert(key.to_string(), value.clone());
            Ok(())
        }

        fn remove(&mut self, key: &Value) -> Result<()> {
            self.entries.remove(&key.to_string());
            Ok(())
        }
    }

    /// Document store that records what it was asked to do.
    #[derive(Default)]
    struct DocumentStore {
        documents: Vec<Value>,
        updated: Vec<(String, Value)>,
        inserted: Vec<String>,
        offline: bool,
    }

    impl Manager for DocumentStore {
        type Item = Value;

        fn select(&mut self, _query: &SelectQuery) -> Result<Vec<Value>> {
            if self.offline {
                return Err(anyhow!("store offline").into());
            }
            Ok(self.documents.clone())
        }

        fn insert(&mut self, query: &InsertQuery) -> Result<()> {
            self.inserted.push(query.entity().to_string());
            Ok(())
        }

        fn update(&mut self, query: &UpdateQuery) -> Result<()> {
            for change in query.changes() {
                if let Some(value) = change.as_value() {
                    self.updated.push((change.name().to_string(), value.resolved()?));
                }
            }
            Ok(())
        }
    }

    fn store_with(keys: &[&str]) -> KeyValueStore {
        let mut store = KeyValueStore::default();
        for key in keys {
            store.entries.insert(Value::from(*key).to_string(), Value::from(format!("value of {key}")));
        }
        store
    }

    #[test]
    fn test_update_requires_bound_parameter() {
        let mut store = DocumentStore::default();
        let mut statement = prepare("update God (name = @name)", &mut store).unwrap();

        let error = statement.get_result_list().unwrap_err();
        assert!(matches!(&error, Error::Query(message) if message.contains("name")));

        statement.bind("name", "Diana");
        assert!(statement.get_result_list().unwrap().is_empty());
        drop(statement);
        assert_eq!(store.updated, vec![("name".to_string(), Value::from("Diana"))]);
    }

    #[test]
    fn test_rebinding_reuses_statement() {
        let mut store = DocumentStore::default();
        let mut statement = prepare("update God (age = @age)", &mut store).unwrap();
        statement.bind("age", 30).get_result_list().unwrap();
        statement.bind("age", 31).get_result_list().unwrap();
        drop(statement);
        assert_eq!(
            store.updated,
            vec![("age".to_string(), Value::from(30)), ("age".to_string(), Value::from(31))]
        );
    }

    #[test]
    fn test_single_result_of_no_keys_is_none() {
        let mut store = store_with(&[]);
        let mut statement = prepare(r#"get "missing""#, &mut store).unwrap();
        assert_eq!(statement.get_single_result().unwrap(), None);
    }

    #[test]
    fn test_single_result_of_one_key() {
        let mut store = store_with(&["Diana"]);
        let mut statement = prepare(r#"get "Diana", "missing""#, &mut store).unwrap();
        assert_eq!(statement.get_single_result().unwrap(), Some(Value::from("value of Diana")));
    }

    #[test]
    fn test_single_result_of_two_keys_is_not_unique() {
        let mut store = store_with(&["Diana", "Artemis", "Apollo"]);
        let mut statement = prepare(r#"get "Diana", "Artemis", "Apollo""#, &mut store).unwrap();
        assert!(matches!(statement.get_single_result(), Err(Error::NonUniqueResult(2))));
        drop(statement);
        // stops after the second hit
        assert_eq!(store.lookups, 2);
    }

    #[test]
    fn test_get_skips_absent_keys() {
        let mut store = store_with(&["Diana", "Artemis"]);
        let results = query(r#"get "Diana", "missing", "Artemis""#, &mut store).unwrap();
        assert_eq!(results, vec![Value::from("value of Diana"), Value::from("value of Artemis")]);
    }

    #[test]
    fn test_put_and_remove() {
        let mut store = KeyValueStore::default();
        assert!(query(r#"put {"Diana", "Hunt"} 10 seconds"#, &mut store).unwrap().is_empty());
        assert_eq!(store.entries.get("\"Diana\""), Some(&Value::from("Hunt")));

        query(r#"remove "Diana""#, &mut store).unwrap();
        assert!(store.entries.is_empty());
    }

    #[test]
    fn test_get_with_parameter_key() {
        let mut store = store_with(&["Diana"]);
        let mut statement = prepare("get @key", &mut store).unwrap();
        statement.bind("key", "Diana");
        assert_eq!(statement.get_result_list().unwrap(), vec![Value::from("value of Diana")]);
    }

    #[test]
    fn test_one_shot_query_rejects_parameters() {
        let mut store = store_with(&["Diana"]);
        assert!(matches!(query("get @key", &mut store), Err(Error::Query(_))));
    }

    #[test]
    fn test_unsupported_operation() {
        let mut store = KeyValueStore::default();
        assert!(matches!(
            query("select * from God", &mut store),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_manager_failure_is_execution_error() {
        let mut store = DocumentStore { offline: true, ..Default::default() };
        assert!(matches!(query("select * from God", &mut store), Err(Error::Execution(_))));
    }

    #[test]
    fn test_select_single_result() {
        let mut store = DocumentStore { documents: vec![Value::from("Diana")], ..Default::default() };
        let mut statement = prepare("select * from God", &mut store).unwrap();
        assert_eq!(statement.get_single_result().unwrap(), Some(Value::from("Diana")));
    }

    #[test]
    fn test_insert_returns_empty_list() {
        let mut store = DocumentStore::default();
        assert!(query(r#"insert God (name = "Diana")"#, &mut store).unwrap().is_empty());
        assert_eq!(store.inserted, vec!["God".to_string()]);
    }

    #[test]
    fn test_method_statement_binds_by_position() {
        let mut store = DocumentStore::default();
        let mut statement = prepare_method("findByAgeAndName", "God", &mut store).unwrap();
        assert_eq!(statement.params().parameter_names(), vec!["age_0", "name_1"]);
        assert!(statement.get_result_list().is_err());

        statement.bind_args([Value::from(30), Value::from("Diana")]).unwrap();
        assert!(statement.params().is_fully_bound());
        assert!(statement.get_result_list().unwrap().is_empty());

        assert!(matches!(statement.bind_args([1, 2, 3]), Err(Error::Argument(_))));
        assert_eq!(statement.params().get("age_0").and_then(|p| p.get().ok()), Some(Value::from(30)));
    }

    #[test]
    fn test_too_many_arguments_bind_nothing() {
        let mut store = DocumentStore::default();
        let mut statement = prepare_method("findByAgeAndName", "God", &mut store).unwrap();

        assert!(matches!(statement.bind_args([1, 2, 3]), Err(Error::Argument(_))));
        assert_eq!(statement.params().parameter_names(), vec!["age_0", "name_1"]);
        assert!(statement.params().get("age_0").is_some_and(|p| !p.is_bound()));
    }

    #[test]
    fn test_fewer_arguments_bind_a_prefix() {
        let mut store = DocumentStore::default();
        let mut statement = prepare_method("findByAgeAndName", "God", &mut store).unwrap();
        statement.bind_args([30]).unwrap();
        assert_eq!(statement.params().parameter_names(), vec!["name_1"]);
    }
}
