//! A query language for NoSQL stores.
//!
//! Statements are parsed either from text (`select * from God where age > 10`)
//! or from repository method names (`findByAgeAndName`), turned into a query
//! AST with a condition tree, and executed through a [`Manager`] or compiled
//! to SQL with [`SqlCompiler`].

pub mod ast;
pub mod condition;
pub mod config;
pub mod error;
pub mod lexer;
pub mod method_parser;
pub mod params;
pub mod parser;
pub mod prepared;
pub mod sql_compiler;
pub mod token;
pub mod value;
pub mod where_builder;

pub use ast::{
    DelQuery, DeleteQuery, Direction, GetQuery, InsertQuery, PutQuery, Query, QueryKind, SelectQuery, Sort,
    UpdateQuery,
};
pub use condition::{Condition, ConditionValue, Operator, Where};
pub use config::{ConfigError, IdentityTranslator, NameMappingConfig, NameTranslator};
pub use error::{Error, ParseError, Result};
pub use method_parser::{parse_method, MethodPrefix, MethodQuery};
pub use params::{ParamValue, Params};
pub use parser::{parse, ParsedQuery};
pub use prepared::{prepare, prepare_method, query, Manager, PreparedStatement};
pub use sql_compiler::{CompileResult, OptimizationConfig, Optimization, SqlCompiler};
pub use value::{Function, Value};
pub use where_builder::WhereBuilder;
