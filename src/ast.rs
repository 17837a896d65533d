//! Query ASTs, one per statement kind.

use std::time::Duration;

use crate::condition::{Condition, Where};
use crate::value::Value;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectQuery),
    Update(UpdateQuery),
    Insert(InsertQuery),
    Delete(DeleteQuery),
    Get(GetQuery),
    Put(PutQuery),
    Del(DelQuery),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Update,
    Insert,
    Delete,
    Get,
    Put,
    Del,
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Select(_) => QueryKind::Select,
            Query::Update(_) => QueryKind::Update,
            Query::Insert(_) => QueryKind::Insert,
            Query::Delete(_) => QueryKind::Delete,
            Query::Get(_) => QueryKind::Get,
            Query::Put(_) => QueryKind::Put,
            Query::Del(_) => QueryKind::Del,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One `order by` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub name: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: Direction::Asc }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self { name: name.into(), direction: Direction::Desc }
    }
}

/// `select fields from entity [where ...] [order by ...] [skip n] [limit n]`
///
/// An empty field list selects every field; `skip` and `limit` of zero mean
/// "not set".
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    entity: String,
    fields: Vec<String>,
    condition: Option<Where>,
    sorts: Vec<Sort>,
    skip: u64,
    limit: u64,
}

impl SelectQuery {
    pub fn new(
        entity: impl Into<String>,
        fields: Vec<String>,
        condition: Option<Where>,
        sorts: Vec<Sort>,
        skip: u64,
        limit: u64,
    ) -> Self {
        Self { entity: entity.into(), fields, condition, sorts, skip, limit }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn condition(&self) -> Option<&Where> {
        self.condition.as_ref()
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// `update entity (name = value, ...) [where ...]`
///
/// Assignments are kept as EQUALS conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    entity: String,
    changes: Vec<Condition>,
    condition: Option<Where>,
}

impl UpdateQuery {
    pub fn new(entity: impl Into<String>, changes: Vec<Condition>, condition: Option<Where>) -> Self {
        Self { entity: entity.into(), changes, condition }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn changes(&self) -> &[Condition] {
        &self.changes
    }

    pub fn condition(&self) -> Option<&Where> {
        self.condition.as_ref()
    }
}

/// `insert entity (name = value, ...) [ttl duration]`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    entity: String,
    changes: Vec<Condition>,
    ttl: Option<Duration>,
}

impl InsertQuery {
    pub fn new(entity: impl Into<String>, changes: Vec<Condition>, ttl: Option<Duration>) -> Self {
        Self { entity: entity.into(), changes, ttl }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn changes(&self) -> &[Condition] {
        &self.changes
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// `delete [fields] from entity [where ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    entity: String,
    fields: Vec<String>,
    condition: Option<Where>,
}

impl DeleteQuery {
    pub fn new(entity: impl Into<String>, fields: Vec<String>, condition: Option<Where>) -> Self {
        Self { entity: entity.into(), fields, condition }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn condition(&self) -> Option<&Where> {
        self.condition.as_ref()
    }
}

/// `get key [, key]*`
#[derive(Debug, Clone, PartialEq)]
pub struct GetQuery {
    keys: Vec<Value>,
}

impl GetQuery {
    pub fn new(keys: Vec<Value>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }
}

/// `put {key, value} [ttl duration]`
#[derive(Debug, Clone, PartialEq)]
pub struct PutQuery {
    key: Value,
    value: Value,
    ttl: Option<Duration>,
}

impl PutQuery {
    pub fn new(key: Value, value: Value, ttl: Option<Duration>) -> Self {
        Self { key, value, ttl }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// `remove key [, key]*`
#[derive(Debug, Clone, PartialEq)]
pub struct DelQuery {
    keys: Vec<Value>,
}

impl DelQuery {
    pub fn new(keys: Vec<Value>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[Value] {
        &self.keys
    }
}
