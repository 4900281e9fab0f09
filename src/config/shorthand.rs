//! The configuration shorthand mini-language
//!
//! A compact assignment syntax for configuration trees:
//!
//! ```text
//! smallerTableAmountRows=1000; ratioRows=10; overlapChance=42.0;
//! smallerTableSorted=true; sizes=[4,5,6,7];
//! ```
//!
//! The input denotes one object: each `name = value;` assignment contributes
//! a child, values are booleans, integers, floats, strings, lists or nested
//! `{ ... }` objects, and whitespace is free except inside strings. Parsing
//! yields the same `serde_json::Value` tree the JSON configuration format
//! produces, so both front ends share one application path.

use serde_json::{Map, Value as TreeNode};

use super::error::ConfigError;

/// The NAME rule of the shorthand grammar, also used for option identifiers
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse a shorthand string into a configuration tree.
///
/// An empty input is a valid empty object. Errors carry the 1-based line
/// and column of the first unexpected character.
pub fn parse(input: &str) -> Result<TreeNode, ConfigError> {
    let mut parser = Parser::new(input)?;
    let object = parser.parse_assignments()?;
    parser.expect_kind(&TokenKind::Eof, "another assignment or end of input")?;
    Ok(TreeNode::Object(object))
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Name(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Equals,
    Semicolon,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Name(name) => format!("name {name:?}"),
            TokenKind::Bool(b) => format!("'{b}'"),
            TokenKind::Int(i) => format!("integer {i}"),
            TokenKind::Float(x) => format!("float {x}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<Token, ConfigError> {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        let (line, column) = (self.line, self.column);
        let token = |kind| Token { kind, line, column };

        let Some(c) = self.peek() else {
            return Ok(token(TokenKind::Eof));
        };
        match c {
            '=' => {
                self.bump();
                Ok(token(TokenKind::Equals))
            }
            ';' => {
                self.bump();
                Ok(token(TokenKind::Semicolon))
            }
            '[' => {
                self.bump();
                Ok(token(TokenKind::LBracket))
            }
            ']' => {
                self.bump();
                Ok(token(TokenKind::RBracket))
            }
            '{' => {
                self.bump();
                Ok(token(TokenKind::LBrace))
            }
            '}' => {
                self.bump();
                Ok(token(TokenKind::RBrace))
            }
            ',' => {
                self.bump();
                Ok(token(TokenKind::Comma))
            }
            '"' => self.lex_string().map(token),
            '-' => {
                if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
                    self.lex_number().map(token)
                } else {
                    Err(self.error(line, column, "expected a digit after '-'"))
                }
            }
            d if d.is_ascii_digit() => self.lex_number().map(token),
            a if a.is_ascii_alphabetic() || a == '_' => {
                let mut name = String::new();
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    name.push(self.bump().unwrap_or_default());
                }
                let kind = match name.as_str() {
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    _ => TokenKind::Name(name),
                };
                Ok(token(kind))
            }
            other => Err(self.error(line, column, format!("unexpected character {other:?}"))),
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, ConfigError> {
        let (line, column) = (self.line, self.column);
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(self.error(line, column, "unterminated string literal"));
                }
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => {
                    let Some(escaped) = self.bump() else {
                        return Err(self.error(line, column, "unterminated string literal"));
                    };
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                Some(other) => text.push(other),
            }
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, ConfigError> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push(self.bump().unwrap_or_default());
        }
        while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
            text.push(self.bump().unwrap_or_default());
        }
        let is_float = self.peek() == Some('.')
            && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit());
        if is_float {
            text.push(self.bump().unwrap_or_default());
            while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                text.push(self.bump().unwrap_or_default());
            }
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(line, column, format!("malformed float literal {text:?}")))?;
            Ok(TokenKind::Float(value))
        } else {
            let value: i64 = text.parse().map_err(|_| {
                self.error(line, column, format!("integer literal {text} is out of range"))
            })?;
            Ok(TokenKind::Int(value))
        }
    }
}

struct Parser {
    lexer: Lexer,
    current: Token,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ConfigError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<Token, ConfigError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn unexpected(&self, expected: &str) -> ConfigError {
        ConfigError::Syntax {
            line: self.current.line,
            column: self.current.column,
            message: format!("expected {expected}, found {}", self.current.kind.describe()),
        }
    }

    fn expect_kind(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ConfigError> {
        if &self.current.kind == kind {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// Zero or more `name = value;` assignments, collected into one object
    fn parse_assignments(&mut self) -> Result<Map<String, TreeNode>, ConfigError> {
        let mut object = Map::new();
        while let TokenKind::Name(_) = &self.current.kind {
            let name_token = self.advance()?;
            let TokenKind::Name(name) = name_token.kind else {
                unreachable!("loop condition checked the kind");
            };
            if object.contains_key(&name) {
                return Err(ConfigError::DuplicateKey {
                    name,
                    line: name_token.line,
                    column: name_token.column,
                });
            }
            self.expect_kind(&TokenKind::Equals, "'=' after the option name")?;
            let value = self.parse_content()?;
            self.expect_kind(&TokenKind::Semicolon, "';' after the value")?;
            object.insert(name, value);
        }
        Ok(object)
    }

    /// One value: a literal, a `[...]` list or a `{...}` object
    fn parse_content(&mut self) -> Result<TreeNode, ConfigError> {
        match &self.current.kind {
            TokenKind::Bool(b) => {
                let value = TreeNode::from(*b);
                self.advance()?;
                Ok(value)
            }
            TokenKind::Int(i) => {
                let value = TreeNode::from(*i);
                self.advance()?;
                Ok(value)
            }
            TokenKind::Float(x) => {
                let value = TreeNode::from(*x);
                self.advance()?;
                Ok(value)
            }
            TokenKind::Str(s) => {
                let value = TreeNode::from(s.clone());
                self.advance()?;
                Ok(value)
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => self.parse_object(),
            _ => Err(self.unexpected("a value")),
        }
    }

    fn parse_list(&mut self) -> Result<TreeNode, ConfigError> {
        self.advance()?; // '['
        let mut items = Vec::new();
        if self.current.kind != TokenKind::RBracket {
            items.push(self.parse_content()?);
            while self.current.kind == TokenKind::Comma {
                self.advance()?;
                items.push(self.parse_content()?);
            }
        }
        self.expect_kind(&TokenKind::RBracket, "',' or ']' in the list")?;
        Ok(TreeNode::Array(items))
    }

    fn parse_object(&mut self) -> Result<TreeNode, ConfigError> {
        self.advance()?; // '{'
        let object = self.parse_assignments()?;
        self.expect_kind(&TokenKind::RBrace, "an assignment or '}'")?;
        Ok(TreeNode::Object(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_input_is_empty_object() {
        assert_eq!(parse("").unwrap(), json!({}));
        assert_eq!(parse("   \n\t ").unwrap(), json!({}));
    }

    #[test]
    fn test_literals() {
        let tree = parse("a=true; b=false; c=-12; d=3.25; e=\"text\";").unwrap();
        assert_eq!(
            tree,
            json!({"a": true, "b": false, "c": -12, "d": 3.25, "e": "text"})
        );
    }

    #[test]
    fn test_spec_example() {
        let tree = parse(
            "smallerTableAmountRows=1000; ratioRows=10; overlapChance=42.0; \
             smallerTableSorted=true; sizes=[4,5,6,7];",
        )
        .unwrap();
        assert_eq!(
            tree,
            json!({
                "smallerTableAmountRows": 1000,
                "ratioRows": 10,
                "overlapChance": 42.0,
                "smallerTableSorted": true,
                "sizes": [4, 5, 6, 7]
            })
        );
    }

    #[test]
    fn test_nested_objects_and_lists() {
        let tree = parse("outer={inner={x=1;}; list=[[1,2],[3]];};").unwrap();
        assert_eq!(
            tree,
            json!({"outer": {"inner": {"x": 1}, "list": [[1, 2], [3]]}})
        );
        assert_eq!(parse("empty=[];").unwrap(), json!({"empty": []}));
        assert_eq!(parse("empty={};").unwrap(), json!({"empty": {}}));
    }

    #[test]
    fn test_string_escapes() {
        let tree = parse(r#"s="a\"b\\c\nd";"#).unwrap();
        assert_eq!(tree, json!({"s": "a\"b\\c\nd"}));
    }

    #[test]
    fn test_whitespace_insensitive() {
        let tree = parse("  a\n =\n 1 ;\n b = [ 1 , 2 ] ; ").unwrap();
        assert_eq!(tree, json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_duplicate_key_same_scope() {
        let err = parse("x=1; x=2;").unwrap_err();
        match err {
            ConfigError::DuplicateKey { name, line, column } => {
                assert_eq!(name, "x");
                assert_eq!(line, 1);
                assert_eq!(column, 6);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_same_key_in_different_scopes() {
        let tree = parse("x=1; nested={x=2;};").unwrap();
        assert_eq!(tree, json!({"x": 1, "nested": {"x": 2}}));
    }

    #[test]
    fn test_syntax_error_positions() {
        // Missing semicolon: the error points at the end of input.
        match parse("x=1").unwrap_err() {
            ConfigError::Syntax { line, column, .. } => {
                assert_eq!((line, column), (1, 4));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // Unexpected character.
        match parse("x = @;").unwrap_err() {
            ConfigError::Syntax { line, column, .. } => {
                assert_eq!((line, column), (1, 5));
            }
            other => panic!("unexpected error {other:?}"),
        }
        // Positions are tracked across lines.
        match parse("a=1;\nb=;").unwrap_err() {
            ConfigError::Syntax { line, column, .. } => {
                assert_eq!((line, column), (2, 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_malformed_numbers() {
        assert!(parse("x=-;").is_err());
        assert!(parse("x=99999999999999999999;").is_err());
        // "1." is not a FLOAT; the dot is an unexpected character.
        assert!(parse("x=1.;").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            parse("x=\"abc;"),
            Err(ConfigError::Syntax { .. })
        ));
    }

    #[test]
    fn test_identifier_rule() {
        assert!(is_valid_identifier("a"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("camelCase123"));
        assert!(is_valid_identifier("with-dash"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("-leading"));
        assert!(!is_valid_identifier("has space"));
    }

    #[test]
    fn test_names_with_dashes_parse() {
        let tree = parse("my-option=1;").unwrap();
        assert_eq!(tree, json!({"my-option": 1}));
    }
}
