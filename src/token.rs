//! The token definition for the query language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Statement keywords
    Select, // "select"
    Update, // "update"
    Insert, // "insert"
    Delete, // "delete"
    Get,    // "get"
    Put,    // "put"
    Remove, // "remove"

    // Clause keywords
    From,  // "from"
    Where, // "where"
    Order, // "order"
    By,    // "by"
    Asc,   // "asc"
    Desc,  // "desc"
    Skip,  // "skip"
    Limit, // "limit"
    Ttl,   // "ttl"

    // Condition keywords
    And,     // "and"
    Or,      // "or"
    Not,     // "not"
    Like,    // "like"
    In,      // "in"
    Between, // "between"

    // JSON keywords
    True,  // "true"
    False, // "false"
    Null,  // "null"

    // Literals
    Identifier(&'a str),
    /// The raw string content between the quotes, escapes not yet processed
    String(&'a str),
    /// The raw number text, sign included
    Number(&'a str),
    /// A named parameter, without the leading `@`
    Param(&'a str),

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    LBrace,   // {
    RBrace,   // }
    Comma,    // ,
    Colon,    // :
    Star,     // *

    // Operators
    Eq,  // =
    Gt,  // >
    Lt,  // <
    Gte, // >=
    Lte, // <=

    // Special
    Illegal, // An illegal/unknown character or an unterminated string
}

impl TokenKind<'_> {
    /// Keywords double as plain names wherever a name is expected, so
    /// `select order from Shop` and `where limit > 3` keep working.
    pub fn is_name_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Select
                | TokenKind::Update
                | TokenKind::Insert
                | TokenKind::Delete
                | TokenKind::Get
                | TokenKind::Put
                | TokenKind::Remove
                | TokenKind::From
                | TokenKind::Where
                | TokenKind::Order
                | TokenKind::By
                | TokenKind::Asc
                | TokenKind::Desc
                | TokenKind::Skip
                | TokenKind::Limit
                | TokenKind::Ttl
                | TokenKind::Like
                | TokenKind::Between
        )
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
