//! 声明式查询语言的语法分析器
//!
//! ## 解析流程
//!
//! ```text
//! parse()
//!   ├─ "select" → parse_select()
//!   │               ├─ fields ("*" or name list), "from", entity
//!   │               ├─ parse_where()
//!   │               └─ clauses in any order: "order by", "skip", "limit"
//!   ├─ "delete" → parse_delete()   [fields] "from" entity [where]
//!   ├─ "update" → parse_update()   entity changes [where]
//!   ├─ "insert" → parse_insert()   entity changes [ttl]
//!   ├─ "get"    → parse_keys()     value ("," value)*
//!   ├─ "remove" → parse_keys()     value ("," value)*
//!   └─ "put"    → parse_put()      "{" key "," value ["," duration] "}" [ttl]
//!
//! parse_where()
//!   └─ parse_condition() (("and" | "or") parse_condition())*
//!        ├─ optional "not"
//!        ├─ field name
//!        ├─ operator: = > >= < <= like in between
//!        └─ parse_value()
//!             ├─ number, 'string' / "string"
//!             ├─ "{" ... "}" → JSON object
//!             ├─ "[" ... "]" → array
//!             ├─ @name       → named parameter
//!             └─ name(...)   → function call
//! ```
//!
//! 这里不按优先级构建条件树：每个条件连同它前面的连接词
//! 一起交给 [`WhereBuilder`]。
//!
//! ## 示例
//!
//! ```text
//! select * from God where age > 10 and name like "Dia%" order by name desc limit 5
//! delete from God where name in ["Diana", "Artemis"]
//! update God (age = 30, name = "Artemis") where id = @id
//! insert God {"name": "Diana", "age": 30} ttl 10 seconds
//! get "Diana", "Artemis"
//! put {"Diana", "The goddess of hunt"} 1 day
//! remove "Diana"
//! ```

use std::time::Duration;

use serde_json::{Map, Number};
use tracing::debug;

use crate::ast::{
    DelQuery, DeleteQuery, Direction, GetQuery, InsertQuery, PutQuery, Query, SelectQuery, Sort,
    UpdateQuery,
};
use crate::condition::{Condition, Operator, Where};
use crate::error::{ParseError, Result};
use crate::lexer::Lexer;
use crate::params::Params;
use crate::token::{Token, TokenKind};
use crate::value::{Function, Value};
use crate::where_builder::WhereBuilder;

/// 语句及其声明的参数
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub query: Query,
    pub params: Params,
}

/// 对一条语句进行词法分析和语法分析
pub fn parse(text: &str) -> Result<ParsedQuery> {
    let tokens: Vec<_> = Lexer::new(text).collect();
    Parser::new(text, &tokens).parse()
}

/// 一次性的语法分析器，[`Parser::parse`] 会消费它
pub struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    position: usize,
    params: Params,
    conditions: WhereBuilder,
}

impl<'a> Parser<'a> {
    /// `tokens` 必须来自对 `source` 的词法分析
    pub fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            position: 0,
            params: Params::new(),
            conditions: WhereBuilder::new(),
        }
    }

    /// 返回当前token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前token并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 消费期望类型的token，否则返回错误
    fn expect(&mut self, expected: TokenKind<'_>) -> std::result::Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 检查当前token是否为给定类型
    fn match_token(&self, kind: &TokenKind<'_>) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    /// 如果当前token为给定类型则消费它
    fn eat(&mut self, kind: &TokenKind<'_>) -> bool {
        let matched = self.match_token(kind);
        if matched {
            self.position += 1;
        }
        matched
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::at_position(
                format!("Expected {}, found {:?}", expected, token.kind),
                token.span,
            ),
            None => ParseError::new(format!("Expected {}, but reached end of input", expected), None),
        }
    }

    pub fn parse(mut self) -> Result<ParsedQuery> {
        if let Some(token) = self.tokens.iter().find(|t| t.kind == TokenKind::Illegal) {
            return Err(ParseError::at_position("Illegal token".to_string(), token.span).into());
        }

        let Some(token) = self.peek() else {
            return Err(ParseError::new("Empty query".to_string(), None).into());
        };
        let query = match token.kind {
            TokenKind::Select => self.parse_select()?,
            TokenKind::Delete => self.parse_delete()?,
            TokenKind::Update => self.parse_update()?,
            TokenKind::Insert => self.parse_insert()?,
            TokenKind::Get => Query::Get(GetQuery::new(self.parse_keys()?)),
            TokenKind::Remove => Query::Del(DelQuery::new(self.parse_keys()?)),
            TokenKind::Put => self.parse_put()?,
            _ => {
                return Err(ParseError::at_position(
                    format!("Expected a statement, found {:?}", token.kind),
                    token.span,
                )
                .into())
            }
        };

        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected token after statement: {:?}", token.kind),
                token.span,
            )
            .into());
        }

        debug!(kind = ?query.kind(), params = ?self.params.declared_names(), "parsed statement");
        Ok(ParsedQuery { query, params: self.params })
    }

    fn parse_select(&mut self) -> Result<Query> {
        self.advance(); // "select"
        let fields = if self.eat(&TokenKind::Star) {
            Vec::new()
        } else {
            self.parse_name_list()?
        };
        self.expect(TokenKind::From)?;
        let entity = self.parse_name()?;
        let condition = self.parse_where()?;

        let mut sorts: Option<Vec<Sort>> = None;
        let mut skip: Option<u64> = None;
        let mut limit: Option<u64> = None;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Order if sorts.is_none() => {
                    self.advance();
                    self.expect(TokenKind::By)?;
                    sorts = Some(self.parse_sorts()?);
                }
                TokenKind::Skip if skip.is_none() => {
                    self.advance();
                    skip = Some(self.parse_integer()?);
                }
                TokenKind::Limit if limit.is_none() => {
                    self.advance();
                    limit = Some(self.parse_integer()?);
                }
                TokenKind::Order | TokenKind::Skip | TokenKind::Limit => {
                    return Err(ParseError::at_position(
                        format!("Duplicate {:?} clause", token.kind),
                        token.span,
                    )
                    .into());
                }
                _ => break,
            }
        }

        Ok(Query::Select(SelectQuery::new(
            entity,
            fields,
            condition,
            sorts.unwrap_or_default(),
            skip.unwrap_or(0),
            limit.unwrap_or(0),
        )))
    }

    fn parse_delete(&mut self) -> Result<Query> {
        self.advance(); // "delete"
        let fields = if self.match_token(&TokenKind::From) {
            Vec::new()
        } else {
            self.parse_name_list()?
        };
        self.expect(TokenKind::From)?;
        let entity = self.parse_name()?;
        let condition = self.parse_where()?;
        Ok(Query::Delete(DeleteQuery::new(entity, fields, condition)))
    }

    fn parse_update(&mut self) -> Result<Query> {
        self.advance(); // "update"
        let entity = self.parse_name()?;
        let changes = self.parse_changes()?;
        let condition = self.parse_where()?;
        Ok(Query::Update(UpdateQuery::new(entity, changes, condition)))
    }

    fn parse_insert(&mut self) -> Result<Query> {
        self.advance(); // "insert"
        let entity = self.parse_name()?;
        let changes = self.parse_changes()?;
        let ttl = self.parse_ttl()?;
        Ok(Query::Insert(InsertQuery::new(entity, changes, ttl)))
    }

    /// `get` / `remove` 的键列表
    fn parse_keys(&mut self) -> Result<Vec<Value>> {
        self.advance(); // "get" | "remove"
        let mut keys = vec![self.parse_value()?];
        while self.eat(&TokenKind::Comma) {
            keys.push(self.parse_value()?);
        }
        Ok(keys)
    }

    fn parse_put(&mut self) -> Result<Query> {
        self.advance(); // "put"
        self.expect(TokenKind::LBrace)?;
        let key = self.parse_value()?;
        self.expect(TokenKind::Comma)?;
        let value = self.parse_value()?;
        let inner_ttl = if self.eat(&TokenKind::Comma) {
            Some(self.parse_duration()?)
        } else {
            None
        };
        self.expect(TokenKind::RBrace)?;

        let ttl = match (inner_ttl, self.parse_ttl()?) {
            (Some(_), Some(_)) => {
                return Err(ParseError::new("ttl given twice".to_string(), None).into());
            }
            (inner, outer) => inner.or(outer),
        };
        Ok(Query::Put(PutQuery::new(key, value, ttl)))
    }

    /// `(name = value, ...)` 或JSON对象，每一对都成为一个 EQUALS 条件
    fn parse_changes(&mut self) -> Result<Vec<Condition>> {
        if self.match_token(&TokenKind::LBrace) {
            let object = self.parse_json_object()?;
            if object.is_empty() {
                return Err(self.unexpected("at least one field").into());
            }
            return Ok(object
                .into_iter()
                .map(|(name, json)| Condition::eq(name, Value::from(json)))
                .collect());
        }

        self.expect(TokenKind::LParen)?;
        let mut changes = Vec::new();
        loop {
            let name = self.parse_name()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_value()?;
            changes.push(Condition::new(name, Operator::Equals, value)?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(changes)
    }

    fn parse_where(&mut self) -> Result<Option<Where>> {
        if self.eat(&TokenKind::Where) {
            loop {
                self.parse_condition()?;
                if self.eat(&TokenKind::And) {
                    self.conditions.and();
                } else if self.eat(&TokenKind::Or) {
                    self.conditions.or();
                } else {
                    break;
                }
            }
        }
        Ok(std::mem::take(&mut self.conditions).build())
    }

    /// `[not] name op value`，直接交给 where 构建器
    fn parse_condition(&mut self) -> Result<()> {
        let negate = self.eat(&TokenKind::Not);
        let name = self.parse_name()?;

        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected comparison operator".to_string(), None).into());
        };
        let operator = match token.kind {
            TokenKind::Eq => Operator::Equals,
            TokenKind::Gt => Operator::GreaterThan,
            TokenKind::Gte => Operator::GreaterEqualsThan,
            TokenKind::Lt => Operator::LesserThan,
            TokenKind::Lte => Operator::LesserEqualsThan,
            TokenKind::Like => Operator::Like,
            TokenKind::In => Operator::In,
            TokenKind::Between => Operator::Between,
            _ => {
                return Err(ParseError::at_position(
                    format!("Expected comparison operator, found {:?}", token.kind),
                    token.span,
                )
                .into())
            }
        };

        let mut value = self.parse_value()?;
        // 支持 `between a and b` 和 `between [a, b]`；
        // `and` 后面不是值时，它是下一个条件的连接词
        if operator == Operator::Between && value.as_array().is_none() && self.and_starts_value() {
            self.advance();
            let upper = self.parse_value()?;
            value = Value::Array(vec![value, upper]);
        }

        self.conditions.observe(&name, operator, value, negate)
    }

    /// 当前token是否为 `and` 且其后紧跟一个值
    fn and_starts_value(&self) -> bool {
        if !self.match_token(&TokenKind::And) {
            return false;
        }
        let next = self.tokens.get(self.position + 1).map(|token| &token.kind);
        let after = self.tokens.get(self.position + 2).map(|token| &token.kind);
        match next {
            Some(
                TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::Param(_)
                | TokenKind::LBracket
                | TokenKind::LBrace,
            ) => true,
            Some(TokenKind::Identifier(_)) => matches!(after, Some(TokenKind::LParen)),
            _ => false,
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new("Expected a value, but reached end of input".to_string(), None).into());
        };
        let value = match token.kind {
            TokenKind::Number(raw) => {
                self.advance();
                Value::Number(parse_number(raw, token)?)
            }
            TokenKind::String(raw) => {
                self.advance();
                Value::String(unescape(raw))
            }
            TokenKind::Param(name) => {
                self.advance();
                Value::Param(self.params.add(name))
            }
            TokenKind::LBrace => Value::Json(serde_json::Value::Object(self.parse_json_object()?)),
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                if !self.match_token(&TokenKind::RBracket) {
                    loop {
                        values.push(self.parse_value()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Value::Array(values)
            }
            TokenKind::Identifier(name) if self.next_is(&TokenKind::LParen) => {
                self.advance();
                Value::Function(self.parse_function(name)?)
            }
            _ => return Err(self.unexpected("a value").into()),
        };
        Ok(value)
    }

    fn next_is(&self, kind: &TokenKind<'_>) -> bool {
        self.tokens
            .get(self.position + 1)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    /// `name(...)` 的参数；裸标识符参数是类型名
    fn parse_function(&mut self, name: &str) -> Result<Function> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.match_token(&TokenKind::RParen) {
            loop {
                let param = match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::Identifier(type_name)) if !self.next_is(&TokenKind::LParen) => {
                        self.advance();
                        Value::String(type_name.to_string())
                    }
                    _ => self.parse_value()?,
                };
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(Function { name: name.to_string(), params })
    }

    fn parse_json_object(&mut self) -> Result<Map<String, serde_json::Value>> {
        self.expect(TokenKind::LBrace)?;
        let mut object = Map::new();
        if self.eat(&TokenKind::RBrace) {
            return Ok(object);
        }
        loop {
            let key = match self.advance() {
                Some(Token { kind: TokenKind::String(raw), .. }) => unescape(raw),
                Some(Token { kind: TokenKind::Identifier(name), .. }) => name.to_string(),
                Some(token) => {
                    return Err(ParseError::at_position(
                        format!("Expected object key, found {:?}", token.kind),
                        token.span,
                    )
                    .into())
                }
                None => return Err(ParseError::new("Expected object key".to_string(), None).into()),
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_json_value()?;
            object.insert(key, value);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(object)
    }

    fn parse_json_value(&mut self) -> Result<serde_json::Value> {
        let Some(token) = self.peek() else {
            return Err(ParseError::new("Expected a JSON value".to_string(), None).into());
        };
        let json = match token.kind {
            TokenKind::String(raw) => {
                self.advance();
                serde_json::Value::String(unescape(raw))
            }
            TokenKind::Number(raw) => {
                self.advance();
                serde_json::Value::Number(parse_number(raw, token)?)
            }
            TokenKind::True => {
                self.advance();
                serde_json::Value::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                serde_json::Value::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                serde_json::Value::Null
            }
            TokenKind::LBrace => serde_json::Value::Object(self.parse_json_object()?),
            TokenKind::LBracket => {
                self.advance();
                let mut values = Vec::new();
                if !self.match_token(&TokenKind::RBracket) {
                    loop {
                        values.push(self.parse_json_value()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                serde_json::Value::Array(values)
            }
            _ => return Err(self.unexpected("a JSON value").into()),
        };
        Ok(json)
    }

    /// 字段名或实体名。除连接词以外的关键字也可作为名称
    fn parse_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token { kind: TokenKind::Identifier(name), .. }) => {
                self.advance();
                Ok(name.to_string())
            }
            Some(token) if token.kind.is_name_keyword() => {
                self.advance();
                // 保留语句中的原始写法
                match self.source.get(token.span.start..token.span.end) {
                    Some(text) => Ok(text.to_string()),
                    None => Err(ParseError::at_position("Name outside of source".to_string(), token.span).into()),
                }
            }
            Some(_) => Err(self.unexpected("a name").into()),
            None => Err(self.unexpected("a name").into()),
        }
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.parse_name()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.parse_name()?);
        }
        Ok(names)
    }

    fn parse_sorts(&mut self) -> Result<Vec<Sort>> {
        let mut sorts = Vec::new();
        loop {
            let name = self.parse_name()?;
            let direction = if self.eat(&TokenKind::Desc) {
                Direction::Desc
            } else {
                self.eat(&TokenKind::Asc);
                Direction::Asc
            };
            sorts.push(Sort { name, direction });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(sorts)
    }

    fn parse_integer(&mut self) -> Result<u64> {
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected a non-negative integer".to_string(), None).into());
        };
        let parsed = match token.kind {
            TokenKind::Number(raw) => raw.trim_start_matches('+').parse::<u64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            ParseError::at_position(
                format!("Expected a non-negative integer, found {:?}", token.kind),
                token.span,
            )
            .into()
        })
    }

    /// 可选的 `[ttl] <integer> <unit>`
    fn parse_ttl(&mut self) -> Result<Option<Duration>> {
        if self.eat(&TokenKind::Ttl) || self.match_token(&TokenKind::Number("")) {
            return Ok(Some(self.parse_duration()?));
        }
        Ok(None)
    }

    fn parse_duration(&mut self) -> Result<Duration> {
        let amount = self.parse_integer()?;
        let Some(token) = self.advance() else {
            return Err(ParseError::new("Expected a time unit".to_string(), None).into());
        };
        let TokenKind::Identifier(unit) = token.kind else {
            return Err(ParseError::at_position(
                format!("Expected a time unit, found {:?}", token.kind),
                token.span,
            )
            .into());
        };
        let unit = unit.to_ascii_lowercase();
        let duration = match unit.trim_end_matches('s') {
            "nanosecond" => Some(Duration::from_nanos(amount)),
            "microsecond" => Some(Duration::from_micros(amount)),
            "millisecond" => Some(Duration::from_millis(amount)),
            "second" => Some(Duration::from_secs(amount)),
            "minute" => amount.checked_mul(60).map(Duration::from_secs),
            "hour" => amount.checked_mul(60 * 60).map(Duration::from_secs),
            "day" => amount.checked_mul(24 * 60 * 60).map(Duration::from_secs),
            _ => {
                return Err(ParseError::at_position(format!("Unknown time unit `{unit}`"), token.span).into());
            }
        };
        duration.ok_or_else(|| ParseError::at_position("Duration overflow".to_string(), token.span).into())
    }
}

fn parse_number(raw: &str, token: &Token<'_>) -> std::result::Result<Number, ParseError> {
    let text = raw.trim_start_matches('+');
    let number = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().and_then(Number::from_f64)
    } else {
        text.parse::<i64>()
            .map(Number::from)
            .or_else(|_| text.parse::<u64>().map(Number::from))
            .ok()
    };
    number.ok_or_else(|| ParseError::at_position(format!("Invalid number `{raw}`"), token.span))
}

/// 处理原始字符串token中的反斜杠转义
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}
