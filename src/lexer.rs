//! 查询语言的词法分析器

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token { kind, span: Span::new(start, self.position) }
    }

    /// 读取数字字面量：可选符号、整数部分、可选小数和指数部分。
    /// 符号（如果有）已由调用方消费。
    fn read_number(&mut self, start: usize) -> Token<'a> {
        self.eat_digits();
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.eat_digits();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let rest = &self.input[self.position + 1..];
            let mut chars = rest.chars();
            let exponent_follows = match chars.next() {
                Some('+') | Some('-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.eat_digits();
            }
        }
        self.token(TokenKind::Number(&self.input[start..self.position]), start)
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    /// 读取带引号的字符串，开头的引号已被消费。
    /// 转义序列原样保留；未闭合的字符串为非法token。
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == quote {
                let content = &self.input[content_start..self.position];
                self.bump(); // 结尾引号
                return self.token(TokenKind::String(content), start);
            }
            if c == '\\' {
                self.bump();
            }
            self.bump();
        }
        self.token(TokenKind::Illegal, start)
    }

    /// 读取标识符或关键字。标识符可包含字母、数字、下划线和点
    /// （用于子文档字段，如 `address.city`）。
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }

    /// 读取 `@name` 参数，`@` 已被消费。
    fn read_param(&mut self, start: usize) -> Token<'a> {
        let name_start = self.position;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        if name_start == self.position {
            return self.token(TokenKind::Illegal, start);
        }
        self.token(TokenKind::Param(&self.input[name_start..self.position]), start)
    }
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "select" => TokenKind::Select,
        "update" => TokenKind::Update,
        "insert" => TokenKind::Insert,
        "delete" => TokenKind::Delete,
        "get" => TokenKind::Get,
        "put" => TokenKind::Put,
        "remove" => TokenKind::Remove,
        "from" => TokenKind::From,
        "where" => TokenKind::Where,
        "order" => TokenKind::Order,
        "by" => TokenKind::By,
        "asc" => TokenKind::Asc,
        "desc" => TokenKind::Desc,
        "skip" => TokenKind::Skip,
        "limit" => TokenKind::Limit,
        "ttl" => TokenKind::Ttl,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "like" => TokenKind::Like,
        "in" => TokenKind::In,
        "between" => TokenKind::Between,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?;

        let token = match c {
            '=' => self.token(TokenKind::Eq, start),
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            '[' => self.token(TokenKind::LBracket, start),
            ']' => self.token(TokenKind::RBracket, start),
            '{' => self.token(TokenKind::LBrace, start),
            '}' => self.token(TokenKind::RBrace, start),
            ',' => self.token(TokenKind::Comma, start),
            ':' => self.token(TokenKind::Colon, start),
            '*' => self.token(TokenKind::Star, start),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '-' | '+' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(start),
            '"' | '\'' => self.read_string(start, c),
            '@' => self.read_param(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }
}
