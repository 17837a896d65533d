//! SQL compiler that turns parsed statements into PostgreSQL using sea-query.

use sea_query::{
    Asterisk, DeleteStatement, Expr, Iden, InsertStatement, Order, PostgresQueryBuilder,
    SelectStatement, SimpleExpr, UpdateStatement, Value as SqlValue,
};
use tracing::debug;

use crate::ast::{DeleteQuery, Direction, InsertQuery, Query, SelectQuery, UpdateQuery};
use crate::condition::{Condition, Operator};
use crate::config::{IdentityTranslator, NameTranslator};
use crate::error::{Error, Result};
use crate::value::Value;

/// Configuration for SQL optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Minimum number of same-field equalities under an OR before it becomes IN
    pub max_or_conditions_for_in: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self { max_or_conditions_for_in: 5 }
    }
}

/// Table identifier wrapper
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// Compiles document-style statements (`select`, `update`, `insert`,
/// `delete`) to SQL. Entity and field names go through a [`NameTranslator`].
pub struct SqlCompiler {
    config: OptimizationConfig,
    translator: Box<dyn NameTranslator>,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::with_config(OptimizationConfig::default())
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self { config, translator: Box::new(IdentityTranslator) }
    }

    pub fn with_translator(mut self, translator: impl NameTranslator + 'static) -> Self {
        self.translator = Box::new(translator);
        self
    }

    /// Compile a statement into SQL. Bound parameters are inlined.
    pub fn compile(&self, query: &Query) -> Result<CompileResult> {
        let mut optimizations = Vec::new();
        let sql = match query {
            Query::Select(select) => self.compile_select(select, &mut optimizations)?,
            Query::Update(update) => self.compile_update(update, &mut optimizations)?,
            Query::Insert(insert) => self.compile_insert(insert)?,
            Query::Delete(delete) => self.compile_delete(delete, &mut optimizations)?,
            Query::Get(_) | Query::Put(_) | Query::Del(_) => {
                return Err(Error::UnsupportedOperation(format!(
                    "{:?} is a key-value statement and has no SQL form",
                    query.kind()
                )))
            }
        };
        debug!(%sql, optimizations = optimizations.len(), "compiled statement");
        Ok(CompileResult { sql, optimizations })
    }

    fn compile_select(&self, query: &SelectQuery, optimizations: &mut Vec<Optimization>) -> Result<String> {
        let entity = query.entity();
        let mut select = SelectStatement::new();
        select.from(self.table(entity));

        if query.fields().is_empty() {
            select.column(Asterisk);
        } else {
            select.columns(query.fields().iter().map(|field| self.column(entity, field)));
        }

        if let Some(condition) = query.condition() {
            select.and_where(self.compile_condition(entity, condition.condition(), optimizations)?);
        }

        for sort in query.sorts() {
            let order = match sort.direction {
                Direction::Asc => Order::Asc,
                Direction::Desc => Order::Desc,
            };
            select.order_by(self.column(entity, &sort.name), order);
        }

        if query.limit() > 0 {
            select.limit(query.limit());
        }
        if query.skip() > 0 {
            select.offset(query.skip());
        }

        Ok(select.to_string(PostgresQueryBuilder))
    }

    fn compile_update(&self, query: &UpdateQuery, optimizations: &mut Vec<Optimization>) -> Result<String> {
        let entity = query.entity();
        let mut update = UpdateStatement::new();
        update.table(self.table(entity));

        let values = query
            .changes()
            .iter()
            .map(|change| -> Result<(ColumnName, SimpleExpr)> {
                Ok((self.column(entity, change.name()), self.change_value(change)?.into()))
            })
            .collect::<Result<Vec<_>>>()?;
        update.values(values);

        if let Some(condition) = query.condition() {
            update.and_where(self.compile_condition(entity, condition.condition(), optimizations)?);
        }

        Ok(update.to_string(PostgresQueryBuilder))
    }

    fn compile_insert(&self, query: &InsertQuery) -> Result<String> {
        if query.ttl().is_some() {
            return Err(Error::UnsupportedOperation("SQL tables have no ttl".to_string()));
        }

        let entity = query.entity();
        let mut insert = InsertStatement::new();
        insert.into_table(self.table(entity));
        insert.columns(query.changes().iter().map(|change| self.column(entity, change.name())));

        let values = query
            .changes()
            .iter()
            .map(|change| -> Result<SimpleExpr> { Ok(self.change_value(change)?.into()) })
            .collect::<Result<Vec<_>>>()?;
        insert.values(values).map_err(|e| Error::Argument(e.to_string()))?;

        Ok(insert.to_string(PostgresQueryBuilder))
    }

    fn compile_delete(&self, query: &DeleteQuery, optimizations: &mut Vec<Optimization>) -> Result<String> {
        if !query.fields().is_empty() {
            return Err(Error::UnsupportedOperation(
                "deleting individual fields has no SQL form".to_string(),
            ));
        }

        let entity = query.entity();
        let mut delete = DeleteStatement::new();
        delete.from_table(self.table(entity));

        if let Some(condition) = query.condition() {
            delete.and_where(self.compile_condition(entity, condition.condition(), optimizations)?);
        }

        Ok(delete.to_string(PostgresQueryBuilder))
    }

    /// Compile a condition tree
    fn compile_condition(
        &self,
        entity: &str,
        condition: &Condition,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SimpleExpr> {
        match condition.operator() {
            Operator::And => {
                let exprs = self.compile_children(entity, condition, optimizations)?;
                Ok(combine(exprs, SimpleExpr::and))
            }
            Operator::Or => {
                if let Some((in_expr, optimization)) = self.try_optimize_or_to_in(entity, condition)? {
                    optimizations.push(optimization);
                    return Ok(in_expr);
                }
                let exprs = self.compile_children(entity, condition, optimizations)?;
                Ok(combine(exprs, SimpleExpr::or))
            }
            Operator::Not => {
                let exprs = self.compile_children(entity, condition, optimizations)?;
                Ok(combine(exprs, SimpleExpr::and).not())
            }
            _ => self.compile_comparison(entity, condition),
        }
    }

    fn compile_children(
        &self,
        entity: &str,
        condition: &Condition,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<Vec<SimpleExpr>> {
        condition
            .conditions()
            .iter()
            .map(|child| self.compile_condition(entity, child, optimizations))
            .collect()
    }

    /// Rewrite `f = a or f = b or ...` as `f in (a, b, ...)` once it is long enough
    fn try_optimize_or_to_in(
        &self,
        entity: &str,
        condition: &Condition,
    ) -> Result<Option<(SimpleExpr, Optimization)>> {
        let children = condition.conditions();
        let Some(first) = children.first() else {
            return Ok(None);
        };
        let same_field_equalities = children
            .iter()
            .all(|child| child.operator() == Operator::Equals && child.name() == first.name());
        if !same_field_equalities || children.len() < self.config.max_or_conditions_for_in {
            return Ok(None);
        }

        let in_values = children
            .iter()
            .map(|child| self.comparison_value(child))
            .collect::<Result<Vec<_>>>()?
            .iter()
            .map(to_sql_value)
            .collect::<Result<Vec<_>>>()?;

        let in_expr = Expr::col(self.column(entity, first.name())).is_in(in_values);
        let optimization = Optimization::OrToIn {
            field: first.name().to_string(),
            value_count: children.len(),
        };
        Ok(Some((in_expr, optimization)))
    }

    /// Compile a single comparison. AND / OR / NOT nodes are rejected.
    pub fn compile_comparison(&self, entity: &str, condition: &Condition) -> Result<SimpleExpr> {
        let col = Expr::col(self.column(entity, condition.name()));
        let resolve = || self.comparison_value(condition);

        let expr = match condition.operator() {
            Operator::Equals => col.eq(to_sql_value(&resolve()?)?),
            Operator::GreaterThan => col.gt(to_sql_value(&resolve()?)?),
            Operator::GreaterEqualsThan => col.gte(to_sql_value(&resolve()?)?),
            Operator::LesserThan => col.lt(to_sql_value(&resolve()?)?),
            Operator::LesserEqualsThan => col.lte(to_sql_value(&resolve()?)?),
            Operator::Like => match resolve()? {
                Value::String(pattern) => col.like(pattern),
                other => {
                    return Err(Error::Argument(format!("`like` expects a string, got {other}")))
                }
            },
            Operator::In => match resolve()? {
                Value::Array(values) => {
                    col.is_in(values.iter().map(to_sql_value).collect::<Result<Vec<_>>>()?)
                }
                other => return Err(Error::Argument(format!("`in` expects an array, got {other}"))),
            },
            Operator::Between => match resolve()?.as_array() {
                Some([low, high]) => col.between(to_sql_value(low)?, to_sql_value(high)?),
                _ => {
                    return Err(Error::Argument(
                        "`between` expects an array of 2 elements".to_string(),
                    ))
                }
            },
            operator @ (Operator::And | Operator::Or | Operator::Not) => {
                return Err(Error::UnsupportedOperation(format!(
                    "`{}` is not a comparison",
                    operator.symbol()
                )))
            }
        };

        Ok(expr)
    }

    fn comparison_value(&self, condition: &Condition) -> Result<Value> {
        condition
            .as_value()
            .ok_or_else(|| Error::Argument(format!("`{}` has no value", condition.name())))?
            .resolved()
    }

    fn change_value(&self, change: &Condition) -> Result<SqlValue> {
        to_sql_value(&self.comparison_value(change)?)
    }

    fn table(&self, entity: &str) -> TableName {
        TableName(self.translator.entity_name(entity))
    }

    fn column(&self, entity: &str, field: &str) -> ColumnName {
        ColumnName(self.translator.field_name(entity, field))
    }
}

fn combine(exprs: Vec<SimpleExpr>, connective: fn(SimpleExpr, SimpleExpr) -> SimpleExpr) -> SimpleExpr {
    exprs.into_iter().reduce(connective).unwrap_or_else(|| Expr::value(true))
}

/// Convert a resolved value into a sea-query value
fn to_sql_value(value: &Value) -> Result<SqlValue> {
    match value {
        Value::String(s) => Ok(SqlValue::String(Some(Box::new(s.clone())))),
        Value::Number(n) => Ok(number_to_sql(n)),
        Value::Json(json) => match json {
            serde_json::Value::Null => Ok(SqlValue::String(None)),
            serde_json::Value::Bool(b) => Ok(SqlValue::Bool(Some(*b))),
            serde_json::Value::Number(n) => Ok(number_to_sql(n)),
            serde_json::Value::String(s) => Ok(SqlValue::String(Some(Box::new(s.clone())))),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(Error::UnsupportedOperation(
                format!("JSON value {json} has no SQL literal form"),
            )),
        },
        Value::Array(_) => Err(Error::Argument(format!("expected a single value, got {value}"))),
        Value::Function(_) | Value::Param(_) => to_sql_value(&value.resolved()?),
    }
}

fn number_to_sql(n: &serde_json::Number) -> SqlValue {
    if let Some(i) = n.as_i64() {
        SqlValue::BigInt(Some(i))
    } else if let Some(u) = n.as_u64() {
        SqlValue::BigUnsigned(Some(u))
    } else {
        SqlValue::Double(n.as_f64())
    }
}
