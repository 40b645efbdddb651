use super::error::{ErrorLocation, ParseResult, ParserError, ParserErrorKind};
use super::expr::{Expr, ExprKind, TemplatePart, UnaryOp};
use super::stmt::{ClassDef, FunctionDef, Module, Param, Stmt, StmtKind};
use super::utils::{get_precedence, NOT_PRECEDENCE};
use crate::kit::lexer::{tokenize, Coordinate, Lexer, SourcePosition, Token, TokenKind};

/// Parse a whole source text into a [`Module`]
pub fn parse(source: &str) -> ParseResult<Module> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse()
}

/// Enclosing definition while parsing, used to validate `return`, `yield`
/// and `await` and to detect generator functions
#[derive(Debug, Clone, Copy)]
enum Scope {
    Function { is_async: bool, has_yield: bool },
    Class,
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    scopes: Vec<Scope>,
}

impl Parser {
    /// `tokens` must end with an `Eof` token, as produced by [`tokenize`]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            scopes: Vec::new(),
        }
    }

    /// Parse the whole module
    pub fn parse(&mut self) -> ParseResult<Module> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Module { statements })
    }

    // ---- token helpers ----

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.current + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_coordinate(&self) -> Coordinate {
        self.peek().span.start.coordinate()
    }

    fn current_location(&self) -> ErrorLocation {
        match self.kind() {
            TokenKind::Eof => ErrorLocation::Eof,
            _ => ErrorLocation::At(self.current_coordinate()),
        }
    }

    fn current_token_text(&self) -> String {
        let token = self.peek();
        match token.kind {
            TokenKind::Identifier => format!("'{}'", token.text),
            TokenKind::Integer | TokenKind::Float => token.text.clone(),
            kind => kind.describe().to_string(),
        }
    }

    fn error_here(&self, kind: ParserErrorKind) -> ParserError {
        ParserError {
            kind,
            location: self.current_location(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(ParserErrorKind::UnexpectedToken {
                found: self.current_token_text(),
                expected: vec![kind.describe().to_string()],
            }))
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<String> {
        if self.check(TokenKind::Identifier) {
            Ok(self.advance().text)
        } else {
            Err(self.error_here(ParserErrorKind::ExpectedIdentifier {
                found: self.current_token_text(),
            }))
        }
    }

    fn parse_module_path(&mut self) -> ParseResult<Vec<String>> {
        let mut path = vec![self.expect_identifier()?];
        while self.match_token(TokenKind::Dot) {
            path.push(self.expect_identifier()?);
        }
        Ok(path)
    }

    /// `Some(is_async)` when the innermost scope is a function body
    fn innermost_function(&self) -> Option<bool> {
        match self.scopes.last() {
            Some(Scope::Function { is_async, .. }) => Some(*is_async),
            _ => None,
        }
    }

    // ---- statements ----

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LeftCurlyBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightCurlyBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.error_here(ParserErrorKind::UnexpectedToken {
                    found: self.current_token_text(),
                    expected: vec!["'}'".to_string()],
                }));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let position = self.current_coordinate();
        let kind = match self.kind() {
            TokenKind::At => return self.parse_decorated(),
            TokenKind::Fn | TokenKind::Async => {
                return Ok(self.parse_function(Vec::new())?);
            }
            TokenKind::Class => return self.parse_class(Vec::new()),
            TokenKind::Var => {
                self.advance();
                let name = self.expect_identifier()?;
                self.expect(TokenKind::Equal)?;
                let initializer = self.parse_expression()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::VarDecl { name, initializer }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                StmtKind::While { condition, body }
            }
            TokenKind::For => {
                self.advance();
                let variable = self.expect_identifier()?;
                self.expect(TokenKind::In)?;
                let iterable = self.parse_expression()?;
                let body = self.parse_block()?;
                StmtKind::For {
                    variable,
                    iterable,
                    body,
                }
            }
            TokenKind::Try => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(TokenKind::Catch)?;
                let error_name = self.expect_identifier()?;
                let handler = self.parse_block()?;
                StmtKind::Try {
                    body,
                    error_name,
                    handler,
                }
            }
            TokenKind::Return => {
                if self.innermost_function().is_none() {
                    return Err(self.error_here(ParserErrorKind::ReturnOutsideFunction));
                }
                self.advance();
                let value = self.parse_optional_expression()?;
                StmtKind::Return(value)
            }
            TokenKind::Yield => {
                match self.innermost_function() {
                    None => return Err(self.error_here(ParserErrorKind::YieldOutsideFunction)),
                    Some(true) => return Err(self.error_here(ParserErrorKind::YieldInAsync)),
                    Some(false) => {
                        if let Some(Scope::Function { has_yield, .. }) = self.scopes.last_mut() {
                            *has_yield = true;
                        }
                    }
                }
                self.advance();
                let value = self.parse_optional_expression()?;
                StmtKind::Yield(value)
            }
            TokenKind::Raise => {
                self.advance();
                let value = self.parse_expression()?;
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Raise(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Continue
            }
            TokenKind::Pass => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Pass
            }
            TokenKind::Import => {
                self.advance();
                let path = self.parse_module_path()?;
                let alias = if self.match_token(TokenKind::As) {
                    Some(self.expect_identifier()?)
                } else {
                    None
                };
                self.expect(TokenKind::Semicolon)?;
                StmtKind::Import { path, alias }
            }
            TokenKind::From => {
                self.advance();
                let path = self.parse_module_path()?;
                self.expect(TokenKind::Import)?;
                let mut names = vec![self.expect_identifier()?];
                while self.match_token(TokenKind::Comma) {
                    names.push(self.expect_identifier()?);
                }
                self.expect(TokenKind::Semicolon)?;
                StmtKind::FromImport { path, names }
            }
            _ => {
                let expr = self.parse_expression()?;
                if self.match_token(TokenKind::Equal) {
                    match expr.kind {
                        ExprKind::VarRef(_)
                        | ExprKind::MemberAccess { .. }
                        | ExprKind::IndexAccess { .. } => {}
                        _ => {
                            return Err(ParserError::here(
                                ParserErrorKind::InvalidAssignmentTarget,
                                expr.position,
                            ))
                        }
                    }
                    let value = self.parse_expression()?;
                    self.expect(TokenKind::Semicolon)?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    self.expect(TokenKind::Semicolon)?;
                    StmtKind::Expr(expr)
                }
            }
        };
        Ok(Stmt { kind, position })
    }

    fn parse_optional_expression(&mut self) -> ParseResult<Option<Expr>> {
        if self.match_token(TokenKind::Semicolon) {
            return Ok(None);
        }
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Some(value))
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.expect(TokenKind::If)?;
        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        branches.push((condition, body));
        let mut else_body = None;
        loop {
            if self.match_token(TokenKind::Elif) {
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                branches.push((condition, body));
            } else if self.match_token(TokenKind::Else) {
                else_body = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            else_body,
        })
    }

    fn parse_decorated(&mut self) -> ParseResult<Stmt> {
        let mut decorators = Vec::new();
        while self.match_token(TokenKind::At) {
            decorators.push(self.parse_expression()?);
        }
        match self.kind() {
            TokenKind::Fn | TokenKind::Async => self.parse_function(decorators),
            TokenKind::Class => self.parse_class(decorators),
            _ => Err(self.error_here(ParserErrorKind::UnexpectedToken {
                found: self.current_token_text(),
                expected: vec!["'fn'".to_string(), "'async'".to_string(), "'class'".to_string()],
            })),
        }
    }

    fn parse_function(&mut self, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        let keyword = self.current_coordinate();
        let is_async = self.match_token(TokenKind::Async);
        self.expect(TokenKind::Fn)?;
        let name = self.expect_identifier()?;

        self.expect(TokenKind::LeftParenthesis)?;
        let mut params: Vec<Param> = Vec::new();
        if !self.check(TokenKind::RightParenthesis) {
            loop {
                let position = self.current_coordinate();
                let param_name = self.expect_identifier()?;
                if params.iter().any(|p| p.name == param_name) {
                    return Err(ParserError::here(
                        ParserErrorKind::Custom(format!("duplicate parameter '{param_name}'")),
                        position,
                    ));
                }
                let default = if self.match_token(TokenKind::Equal) {
                    Some(self.parse_expression()?)
                } else {
                    if params.iter().any(|p| p.default.is_some()) {
                        return Err(ParserError::here(
                            ParserErrorKind::Custom(
                                "non-default parameter follows default parameter".to_string(),
                            ),
                            position,
                        ));
                    }
                    None
                };
                params.push(Param {
                    name: param_name,
                    default,
                });
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParenthesis)?;

        self.scopes.push(Scope::Function {
            is_async,
            has_yield: false,
        });
        let body = self.parse_block();
        let scope = self.scopes.pop();
        let body = body?;
        let is_generator = matches!(scope, Some(Scope::Function { has_yield: true, .. }));

        Ok(Stmt {
            kind: StmtKind::Function(FunctionDef {
                name,
                params,
                body,
                decorators,
                is_async,
                is_generator,
                keyword,
            }),
            position: keyword,
        })
    }

    fn parse_class(&mut self, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        let keyword = self.current_coordinate();
        self.expect(TokenKind::Class)?;
        let name = self.expect_identifier()?;
        self.scopes.push(Scope::Class);
        let body = self.parse_block();
        self.scopes.pop();
        Ok(Stmt {
            kind: StmtKind::Class(ClassDef {
                name,
                body: body?,
                decorators,
                keyword,
            }),
            position: keyword,
        })
    }

    // ---- expressions ----

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some((precedence, op)) = get_precedence(self.kind()) {
            if precedence < min_precedence {
                break;
            }
            let position = self.current_coordinate();
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                position,
            );
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        let position = self.current_coordinate();
        match self.kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    position,
                ))
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_binary(NOT_PRECEDENCE + 1)?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    position,
                ))
            }
            TokenKind::Await => {
                if self.innermost_function() != Some(true) {
                    return Err(self.error_here(ParserErrorKind::AwaitOutsideAsync));
                }
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Await(Box::new(operand)), position))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let position = self.current_coordinate();
            match self.kind() {
                TokenKind::LeftParenthesis => {
                    self.advance();
                    let (arguments, keywords) = self.parse_arguments()?;
                    expr = Expr::new(
                        ExprKind::FunctionCall {
                            callee: Box::new(expr),
                            arguments,
                            keywords,
                        },
                        position,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let member = self.expect_identifier()?;
                    expr = Expr::new(
                        ExprKind::MemberAccess {
                            object: Box::new(expr),
                            member,
                        },
                        position,
                    );
                }
                TokenKind::LeftSquareBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightSquareBracket)?;
                    expr = Expr::new(
                        ExprKind::IndexAccess {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        position,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn parse_arguments(&mut self) -> ParseResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut arguments = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();
        while !self.check(TokenKind::RightParenthesis) {
            if self.check(TokenKind::Identifier) && self.peek_kind_at(1) == TokenKind::Equal {
                let position = self.current_coordinate();
                let name = self.advance().text;
                self.advance();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(ParserError::here(
                        ParserErrorKind::Custom(format!("keyword argument repeated: {name}")),
                        position,
                    ));
                }
                keywords.push((name, self.parse_expression()?));
            } else {
                if !keywords.is_empty() {
                    return Err(self.error_here(ParserErrorKind::Custom(
                        "positional argument follows keyword argument".to_string(),
                    )));
                }
                arguments.push(self.parse_expression()?);
            }
            if !self.match_token(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParenthesis)?;
        Ok((arguments, keywords))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let position = self.current_coordinate();
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Integer => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| {
                    ParserError::here(
                        ParserErrorKind::Custom(format!("invalid integer '{}'", token.text)),
                        position,
                    )
                })?;
                ExprKind::LiteralInt(value)
            }
            TokenKind::Float => {
                self.advance();
                let value = token.text.parse::<f64>().map_err(|_| {
                    ParserError::here(
                        ParserErrorKind::Custom(format!("invalid float '{}'", token.text)),
                        position,
                    )
                })?;
                ExprKind::LiteralFloat(value)
            }
            TokenKind::String => {
                self.advance();
                ExprKind::LiteralString(token.text)
            }
            TokenKind::Template => {
                self.advance();
                ExprKind::Template(self.parse_template(&token.text, token.span.start)?)
            }
            TokenKind::True => {
                self.advance();
                ExprKind::LiteralTrue
            }
            TokenKind::False => {
                self.advance();
                ExprKind::LiteralFalse
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::LiteralNull
            }
            TokenKind::Identifier => {
                self.advance();
                ExprKind::VarRef(token.text)
            }
            TokenKind::LeftParenthesis => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParenthesis)?;
                return Ok(inner);
            }
            TokenKind::LeftSquareBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(TokenKind::RightSquareBracket) {
                    items.push(self.parse_expression()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightSquareBracket)?;
                ExprKind::LiteralList(items)
            }
            TokenKind::LeftCurlyBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(TokenKind::RightCurlyBrace) {
                    let key = match self.kind() {
                        TokenKind::String | TokenKind::Identifier => self.advance().text,
                        _ => {
                            return Err(self.error_here(ParserErrorKind::UnexpectedToken {
                                found: self.current_token_text(),
                                expected: vec!["string".to_string(), "identifier".to_string()],
                            }))
                        }
                    };
                    self.expect(TokenKind::Colon)?;
                    entries.push((key, self.parse_expression()?));
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightCurlyBrace)?;
                ExprKind::LiteralMap(entries)
            }
            _ => {
                return Err(self.error_here(ParserErrorKind::UnexpectedToken {
                    found: self.current_token_text(),
                    expected: vec!["expression".to_string()],
                }))
            }
        };
        Ok(Expr::new(kind, position))
    }

    /// Split a raw template body into literal text and interpolations
    fn parse_template(
        &mut self,
        raw: &str,
        start: SourcePosition,
    ) -> ParseResult<Vec<TemplatePart>> {
        let at = start.coordinate();
        let invalid = |msg: &str| {
            ParserError::here(ParserErrorKind::InvalidTemplate(msg.to_string()), at)
        };

        let chars: Vec<char> = raw.chars().collect();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    let escaped = chars.get(i + 1).copied().ok_or_else(|| invalid("dangling '\\'"))?;
                    let decoded = crate::kit::lexer::decode_escape_char(escaped)
                        .ok_or_else(|| invalid(&format!("invalid escape '\\{escaped}'")))?;
                    text.push(decoded);
                    i += 2;
                }
                '{' if chars.get(i + 1) == Some(&'{') => {
                    text.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    text.push('}');
                    i += 2;
                }
                '}' => return Err(invalid("single '}' is not allowed")),
                '{' => {
                    let mut depth = 1;
                    let mut j = i + 1;
                    let mut in_string = false;
                    while j < chars.len() {
                        let c = chars[j];
                        if in_string {
                            if c == '\\' {
                                j += 1;
                            } else if c == '"' {
                                in_string = false;
                            }
                        } else if c == '"' {
                            in_string = true;
                        } else if c == '{' {
                            depth += 1;
                        } else if c == '}' {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        j += 1;
                    }
                    if depth != 0 {
                        return Err(invalid("expected '}'"));
                    }
                    let source: String = chars[i + 1..j].iter().collect();
                    if source.trim().is_empty() {
                        return Err(invalid("empty expression"));
                    }
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    parts.push(TemplatePart::Interpolation(self.parse_interpolation(&source, start)?));
                    i = j + 1;
                }
                c => {
                    text.push(c);
                    i += 1;
                }
            }
        }
        if !text.is_empty() || parts.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        Ok(parts)
    }

    fn parse_interpolation(&self, source: &str, start: SourcePosition) -> ParseResult<Expr> {
        let mut lexer = Lexer::with_position(source, start);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        let mut sub = Parser {
            tokens,
            current: 0,
            scopes: self.scopes.clone(),
        };
        let expr = sub.parse_expression()?;
        if !sub.check(TokenKind::Eof) {
            return Err(sub.error_here(ParserErrorKind::UnexpectedToken {
                found: sub.current_token_text(),
                expected: vec!["'}'".to_string()],
            }));
        }
        Ok(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::expr::BinaryOp;

    fn first(source: &str) -> StmtKind {
        parse(source).unwrap().statements.remove(0).kind
    }

    fn function(source: &str) -> FunctionDef {
        match first(source) {
            StmtKind::Function(def) => def,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_var_decl() {
        match first("var x = 1 + 2 * 3;") {
            StmtKind::VarDecl { name, initializer } => {
                assert_eq!(name, "x");
                match initializer.kind {
                    ExprKind::Binary { op, right, .. } => {
                        assert_eq!(op, BinaryOp::Add);
                        assert!(matches!(
                            right.kind,
                            ExprKind::Binary {
                                op: BinaryOp::Multiply,
                                ..
                            }
                        ));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_with_defaults() {
        let def = function("fn greet(name, greeting = \"hi\") { return name; }");
        assert_eq!(def.name, "greet");
        assert_eq!(def.params.len(), 2);
        assert!(def.params[1].default.is_some());
        assert!(!def.is_generator);
        assert!(!def.is_async);
        assert_eq!(def.keyword, Coordinate { line: 1, column: 1 });
    }

    #[test]
    fn test_non_default_after_default() {
        assert!(parse("fn f(a = 1, b) { pass; }").is_err());
    }

    #[test]
    fn test_generator_detection_ignores_nested_functions() {
        let def = function("fn outer() { fn inner() { yield 1; } return inner; }");
        assert!(!def.is_generator);

        let def = function("fn gen() { if true { yield 1; } }");
        assert!(def.is_generator);
    }

    #[test]
    fn test_async_function() {
        let def = function("  async fn fetch(x) { return await x; }");
        assert!(def.is_async);
        assert_eq!(def.keyword, Coordinate { line: 1, column: 3 });
    }

    #[test]
    fn test_yield_in_async_is_error() {
        let err = parse("async fn f() { yield 1; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::YieldInAsync);
    }

    #[test]
    fn test_context_errors() {
        assert_eq!(
            parse("return 1;").unwrap_err().kind,
            ParserErrorKind::ReturnOutsideFunction
        );
        assert_eq!(
            parse("yield 1;").unwrap_err().kind,
            ParserErrorKind::YieldOutsideFunction
        );
        assert_eq!(
            parse("fn f() { await g(); }").unwrap_err().kind,
            ParserErrorKind::AwaitOutsideAsync
        );
        assert_eq!(
            parse("fn f() { class C { return 1; } }").unwrap_err().kind,
            ParserErrorKind::ReturnOutsideFunction
        );
    }

    #[test]
    fn test_decorators_in_order() {
        let def = function("@a @b.c(\"x\") fn f() { pass; }");
        assert_eq!(def.decorators.len(), 2);
        assert!(matches!(def.decorators[0].kind, ExprKind::VarRef(ref n) if n == "a"));
        assert!(matches!(def.decorators[1].kind, ExprKind::FunctionCall { .. }));
        assert_eq!(def.keyword.column, 14);
    }

    #[test]
    fn test_class() {
        match first("class Greeter { var greeting = \"hi\"; fn greet(self) { pass; } }") {
            StmtKind::Class(def) => {
                assert_eq!(def.name, "Greeter");
                assert_eq!(def.body.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        match first("if a { pass; } elif b { pass; } else { pass; }") {
            StmtKind::If {
                branches,
                else_body,
            } => {
                assert_eq!(branches.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_targets() {
        assert!(matches!(first("a.b = 1;"), StmtKind::Assign { .. }));
        assert!(matches!(first("a[0] = 1;"), StmtKind::Assign { .. }));
        assert_eq!(
            parse("f() = 1;").unwrap_err().kind,
            ParserErrorKind::InvalidAssignmentTarget
        );
    }

    #[test]
    fn test_keyword_arguments() {
        match first("f(1, b = 2);") {
            StmtKind::Expr(Expr {
                kind:
                    ExprKind::FunctionCall {
                        arguments,
                        keywords,
                        ..
                    },
                ..
            }) => {
                assert_eq!(arguments.len(), 1);
                assert_eq!(keywords[0].0, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("f(a = 1, 2);").is_err());
    }

    #[test]
    fn test_imports() {
        assert_eq!(
            first("import a.b as c;"),
            StmtKind::Import {
                path: vec!["a".to_string(), "b".to_string()],
                alias: Some("c".to_string())
            }
        );
        assert_eq!(
            first("from a import x, y;"),
            StmtKind::FromImport {
                path: vec!["a".to_string()],
                names: vec!["x".to_string(), "y".to_string()]
            }
        );
    }

    #[test]
    fn test_template_parts() {
        match first(r#"var s = f"hello {name}! {{literal}} {d["k"]}";"#) {
            StmtKind::VarDecl { initializer, .. } => match initializer.kind {
                ExprKind::Template(parts) => {
                    assert_eq!(parts.len(), 4);
                    assert_eq!(parts[0], TemplatePart::Text("hello ".to_string()));
                    assert!(matches!(parts[1], TemplatePart::Interpolation(_)));
                    assert_eq!(parts[2], TemplatePart::Text("! {literal} ".to_string()));
                    assert!(matches!(
                        parts[3],
                        TemplatePart::Interpolation(Expr {
                            kind: ExprKind::IndexAccess { .. },
                            ..
                        })
                    ));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            parse(r#"var s = f"a } b";"#).unwrap_err().kind,
            ParserErrorKind::InvalidTemplate(_)
        ));
        assert!(matches!(
            parse(r#"var s = f"{}";"#).unwrap_err().kind,
            ParserErrorKind::InvalidTemplate(_)
        ));
        assert!(parse(r#"var s = f"{a b}";"#).is_err());
    }

    #[test]
    fn test_not_binds_looser_than_comparison() {
        match first("var x = not a == b;") {
            StmtKind::VarDecl { initializer, .. } => match initializer.kind {
                ExprKind::Unary { op, operand } => {
                    assert_eq!(op, UnaryOp::Not);
                    assert!(matches!(operand.kind, ExprKind::Binary { op: BinaryOp::Equal, .. }));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_position() {
        let err = parse("var x = 1;\nvar y = ;").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.column(), Some(9));
    }

    #[test]
    fn test_missing_brace_at_eof() {
        let err = parse("fn f() {").unwrap_err();
        assert_eq!(err.location, ErrorLocation::Eof);
    }
}
