//! Queries derived from repository method names.
//!
//! ```text
//! findByAgeAndName                     -> select, where AND(age = @age_0, name = @name_1)
//! findByAgeGreaterThanOrNameLike       -> select, where OR(age > @age_0, name like @name_1)
//! findByAgeBetweenOrderByNameDesc      -> select, where age between [@age_0, @age_1], sort name desc
//! countByNameNotIn                     -> select, where NOT(name in @name_0)
//! deleteByName                         -> delete, where name = @name_0
//! findAllOrderByAgeAscNameDesc         -> select, no where, two sorts
//! ```
//!
//! The name is split on camel-case boundaries. Every condition reads its value
//! from a parameter named `<field>_<ordinal>`, bound later by position or name.

use tracing::debug;

use crate::ast::{DeleteQuery, Direction, Query, SelectQuery, Sort};
use crate::condition::Operator;
use crate::error::{Error, ParseError, Result};
use crate::params::Params;
use crate::token::Span;
use crate::value::Value;
use crate::where_builder::WhereBuilder;

/// The verb a method name starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodPrefix {
    Find,
    Count,
    Exists,
    Delete,
}

/// A query derived from a method name, with its parameters.
#[derive(Debug, Clone)]
pub struct MethodQuery {
    pub prefix: MethodPrefix,
    pub query: Query,
    pub params: Params,
}

const OPERATOR_SUFFIXES: &[(&[&str], Operator)] = &[
    (&["Greater", "Than", "Equal"], Operator::GreaterEqualsThan),
    (&["Greater", "Than"], Operator::GreaterThan),
    (&["Less", "Than", "Equal"], Operator::LesserEqualsThan),
    (&["Less", "Than"], Operator::LesserThan),
    (&["Between"], Operator::Between),
    (&["Like"], Operator::Like),
    (&["Equals"], Operator::Equals),
    (&["In"], Operator::In),
];

/// Parses `method` (e.g. `findByAgeAndName` or `findByAgeAndName(Integer,String)`)
/// as a query over `entity`.
pub fn parse_method(method: &str, entity: &str) -> Result<MethodQuery> {
    let name = method.split('(').next().unwrap_or_default().trim();
    MethodParser::new(name).parse(entity)
}

struct Word<'a> {
    text: &'a str,
    offset: usize,
}

impl Word<'_> {
    fn span(&self) -> Span {
        Span::new(self.offset, self.offset + self.text.len())
    }
}

struct MethodParser<'a> {
    words: Vec<Word<'a>>,
    position: usize,
    params: Params,
    conditions: WhereBuilder,
    param_count: usize,
}

impl<'a> MethodParser<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            words: split_words(name),
            position: 0,
            params: Params::new(),
            conditions: WhereBuilder::new(),
            param_count: 0,
        }
    }

    fn peek(&self) -> Option<&str> {
        self.words.get(self.position).map(|w| w.text)
    }

    fn at_order_by(&self, position: usize) -> bool {
        matches!(
            (self.words.get(position), self.words.get(position + 1)),
            (Some(Word { text: "Order", .. }), Some(Word { text: "By", .. }))
        )
    }

    fn error(&self, message: String, position: usize) -> Error {
        let span = self.words.get(position).map(Word::span);
        ParseError::new(message, span).into()
    }

    fn parse(mut self, entity: &str) -> Result<MethodQuery> {
        let prefix = match self.peek() {
            Some("find") => MethodPrefix::Find,
            Some("count") => MethodPrefix::Count,
            Some("exists") => MethodPrefix::Exists,
            Some("delete") | Some("remove") => MethodPrefix::Delete,
            Some(other) => {
                return Err(self.error(format!("Unknown method prefix `{other}`"), 0));
            }
            None => return Err(ParseError::new("Empty method name".to_string(), None).into()),
        };
        self.position += 1;
        if self.peek() == Some("All") {
            self.position += 1;
        }

        let mut sorts = Vec::new();
        if self.peek() == Some("By") {
            self.position += 1;
            self.parse_conditions()?;
        }
        if self.at_order_by(self.position) {
            self.position += 2;
            sorts = self.parse_sorts()?;
        }
        if self.position < self.words.len() {
            let word = self.words[self.position].text;
            return Err(self.error(format!("Unexpected `{word}` in method name"), self.position));
        }

        let condition = std::mem::take(&mut self.conditions).build();
        let query = match prefix {
            MethodPrefix::Delete if !sorts.is_empty() => {
                return Err(ParseError::new("Delete methods cannot be ordered".to_string(), None).into());
            }
            MethodPrefix::Delete => Query::Delete(DeleteQuery::new(entity, Vec::new(), condition)),
            _ => Query::Select(SelectQuery::new(entity, Vec::new(), condition, sorts, 0, 0)),
        };
        debug!(?prefix, entity, params = ?self.params.declared_names(), "parsed method query");
        Ok(MethodQuery { prefix, query, params: self.params })
    }

    /// `<cond> ((And | Or) <cond>)*` up to `OrderBy` or the end
    fn parse_conditions(&mut self) -> Result<()> {
        loop {
            let start = self.position;
            while self.position < self.words.len()
                && !matches!(self.peek(), Some("And") | Some("Or"))
                && !self.at_order_by(self.position)
            {
                self.position += 1;
            }
            if start == self.position {
                return Err(self.error("Expected a condition".to_string(), self.position));
            }
            self.parse_condition(start, self.position)?;

            match self.peek() {
                Some("And") => self.conditions.and(),
                Some("Or") => self.conditions.or(),
                _ => return Ok(()),
            }
            self.position += 1;
        }
    }

    /// `<Field>[Not][operator]` over `words[start..end]`
    fn parse_condition(&mut self, start: usize, end: usize) -> Result<()> {
        let texts: Vec<&str> = self.words[start..end].iter().map(|w| w.text).collect();
        let (operator, suffix_len) = OPERATOR_SUFFIXES
            .iter()
            .find(|(suffix, _)| texts.len() > suffix.len() && texts.ends_with(suffix))
            .map(|(suffix, operator)| (*operator, suffix.len()))
            .unwrap_or((Operator::Equals, 0));

        let mut field_words = &texts[..texts.len() - suffix_len];
        let negate = field_words.len() > 1 && field_words.last() == Some(&"Not");
        if negate {
            field_words = &field_words[..field_words.len() - 1];
        }
        if field_words.is_empty() {
            return Err(self.error("Expected a field name".to_string(), start));
        }

        let field = field_name(field_words);
        let value = if operator == Operator::Between {
            Value::Array(vec![self.next_param(&field), self.next_param(&field)])
        } else {
            self.next_param(&field)
        };
        self.conditions.observe(&field, operator, value, negate)
    }

    fn next_param(&mut self, field: &str) -> Value {
        let name = format!("{}_{}", field, self.param_count);
        self.param_count += 1;
        Value::Param(self.params.add(&name))
    }

    /// `(<Field>[Asc|Desc])+`
    fn parse_sorts(&mut self) -> Result<Vec<Sort>> {
        let mut sorts = Vec::new();
        let mut field_words: Vec<&str> = Vec::new();
        while let Some(word) = self.peek() {
            let direction = match word {
                "Asc" => Some(Direction::Asc),
                "Desc" => Some(Direction::Desc),
                _ => None,
            };
            match direction {
                Some(_) if field_words.is_empty() => {
                    return Err(self.error("Expected a field to order by".to_string(), self.position));
                }
                Some(direction) => {
                    sorts.push(Sort { name: field_name(&field_words), direction });
                    field_words.clear();
                }
                None => field_words.push(self.words[self.position].text),
            }
            self.position += 1;
        }
        if !field_words.is_empty() {
            sorts.push(Sort::asc(field_name(&field_words)));
        }
        if sorts.is_empty() {
            return Err(ParseError::new("Expected a field after OrderBy".to_string(), None).into());
        }
        Ok(sorts)
    }
}

/// `["First", "Name"]` -> `firstName`
fn field_name(words: &[&str]) -> String {
    let joined = words.concat();
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => joined,
    }
}

/// Splits a camel-case identifier into words, keeping acronyms together:
/// `findByURLAndName` -> `find`, `By`, `URL`, `And`, `Name`.
fn split_words(identifier: &str) -> Vec<Word<'_>> {
    let chars: Vec<(usize, char)> = identifier.char_indices().collect();
    let mut words = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let (offset, c) = chars[i];
        let previous = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, n)| n.is_lowercase());
        let boundary = c.is_uppercase()
            && (previous.is_lowercase()
                || previous.is_ascii_digit()
                || (previous.is_uppercase() && next_is_lower));
        if boundary {
            words.push(Word { text: &identifier[start..offset], offset: start });
            start = offset;
        }
    }
    if start < identifier.len() {
        words.push(Word { text: &identifier[start..], offset: start });
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use rstest::rstest;

    fn select(method: &str) -> (SelectQuery, Params) {
        let parsed = parse_method(method, "God").unwrap();
        match parsed.query {
            Query::Select(select) => (select, parsed.params),
            other => panic!("Expected select, got {other:?}"),
        }
    }

    fn tree(method: &str) -> Condition {
        select(method).0.condition().unwrap().condition().clone()
    }

    fn param_name(condition: &Condition) -> String {
        match condition.as_value() {
            Some(Value::Param(param)) => param.name().to_string(),
            other => panic!("Expected parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_split_words() {
        let texts = |s| split_words(s).iter().map(|w| w.text.to_string()).collect::<Vec<_>>();
        assert_eq!(texts("findByAgeAndName"), vec!["find", "By", "Age", "And", "Name"]);
        assert_eq!(texts("findByURLAndName"), vec!["find", "By", "URL", "And", "Name"]);
        assert_eq!(texts("findByAge2Or"), vec!["find", "By", "Age2", "Or"]);
    }

    #[test]
    fn test_find_by_age_and_name() {
        let (query, params) = select("findByAgeAndName(Integer,String)");
        assert_eq!(query.entity(), "God");
        let condition = query.condition().unwrap().condition();
        assert_eq!(condition.operator(), Operator::And);
        let children = condition.conditions();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), "age");
        assert_eq!(children[0].operator(), Operator::Equals);
        assert_eq!(children[1].name(), "name");
        assert_eq!(param_name(&children[0]), "age_0");
        assert_eq!(param_name(&children[1]), "name_1");
        assert_eq!(params.declared_names(), vec!["age_0", "name_1"]);
    }

    #[test]
    fn test_single_field_is_a_leaf() {
        let condition = tree("findByName");
        assert_eq!(condition.name(), "name");
        assert_eq!(condition.operator(), Operator::Equals);
    }

    #[rstest]
    #[case("findByAgeGreaterThan", Operator::GreaterThan)]
    #[case("findByAgeGreaterThanEqual", Operator::GreaterEqualsThan)]
    #[case("findByAgeLessThan", Operator::LesserThan)]
    #[case("findByAgeLessThanEqual", Operator::LesserEqualsThan)]
    #[case("findByAgeLike", Operator::Like)]
    #[case("findByAgeIn", Operator::In)]
    #[case("findByAgeEquals", Operator::Equals)]
    fn test_operator_suffixes(#[case] method: &str, #[case] operator: Operator) {
        let condition = tree(method);
        assert_eq!(condition.name(), "age");
        assert_eq!(condition.operator(), operator);
    }

    #[test]
    fn test_between_takes_two_params() {
        let (query, params) = select("findByAgeBetween");
        let condition = query.condition().unwrap().condition();
        assert_eq!(condition.operator(), Operator::Between);
        assert_eq!(params.declared_names(), vec!["age_0", "age_1"]);
        assert_eq!(condition.as_value().and_then(Value::as_array).map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_not_negates() {
        let condition = tree("findByNameNotIn");
        assert_eq!(condition.operator(), Operator::Not);
        assert_eq!(condition.conditions()[0].operator(), Operator::In);

        let condition = tree("findByNameNot");
        assert_eq!(condition.operator(), Operator::Not);
        assert_eq!(condition.conditions()[0].operator(), Operator::Equals);
    }

    #[test]
    fn test_field_name_words_are_joined() {
        let condition = tree("findByFirstNameOrLastName");
        assert_eq!(condition.operator(), Operator::Or);
        assert_eq!(condition.conditions()[0].name(), "firstName");
        assert_eq!(condition.conditions()[1].name(), "lastName");
    }

    #[test]
    fn test_mixed_connectives_share_where_builder_rules() {
        let condition = tree("findByAAndBOrC");
        assert_eq!(condition.operator(), Operator::And);
        assert_eq!(condition.conditions().len(), 3);
        assert_eq!(condition.conditions()[2].operator(), Operator::Or);
    }

    #[test]
    fn test_order_by() {
        let (query, _) = select("findByAgeOrderByNameDescAge");
        assert_eq!(query.sorts(), &[Sort::desc("name"), Sort::asc("age")]);

        let (query, params) = select("findAllOrderByFirstNameAsc");
        assert!(query.condition().is_none());
        assert!(params.is_empty());
        assert_eq!(query.sorts(), &[Sort::asc("firstName")]);
    }

    #[test]
    fn test_find_all() {
        let (query, _) = select("findAll");
        assert!(query.condition().is_none());
        assert!(query.sorts().is_empty());
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(parse_method("countByName", "God").unwrap().prefix, MethodPrefix::Count);
        assert_eq!(parse_method("existsByName", "God").unwrap().prefix, MethodPrefix::Exists);

        let parsed = parse_method("deleteByName", "God").unwrap();
        assert_eq!(parsed.prefix, MethodPrefix::Delete);
        let Query::Delete(delete) = parsed.query else {
            panic!("Expected delete query");
        };
        assert_eq!(delete.entity(), "God");
        assert_eq!(delete.condition().unwrap().condition().name(), "name");
    }

    #[rstest]
    #[case("")]
    #[case("saveByName")]
    #[case("findBy")]
    #[case("findByAndName")]
    #[case("findByNameAnd")]
    #[case("findByNameOrderBy")]
    #[case("findByNameOrderByDesc")]
    #[case("findName")]
    #[case("deleteByNameOrderByAge")]
    fn test_syntax_errors(#[case] method: &str) {
        assert!(matches!(parse_method(method, "God"), Err(Error::Syntax(_))), "{method} should not parse");
    }

    #[test]
    fn test_error_span_points_at_word() {
        let Err(Error::Syntax(error)) = parse_method("findByAndName", "God") else {
            panic!("Expected syntax error");
        };
        assert_eq!(error.span, Some(Span::new(6, 9)));
    }
}
