//! The Pratt precedence-climbing parser.
//!
//! The parser keeps a two-token window over the lexer and dispatches
//! statements on the leading token kind. Expression parsing climbs the
//! precedence ladder; `->` recurses one level below its own precedence so
//! chains associate to the right while the chain's value stays the leftmost
//! operand.
//!
//! Errors accumulate: a failed statement contributes no AST and parsing
//! continues with the next token, but any recorded error discards the whole
//! parse: the caller gets the full error list instead of a tree.

use std::io::Read;

use crate::{
    ast::{
        Ast, AssignExpr, ArrowExpr, Block, BoolLit, CallExpr, CommentStmt, Expr, FnDef, FnLit, ForeachStmt, Ident,
        IfExpr, ImportStmt, InfixExpr, IntegerLit, InternalExpr, LetStmt, ListLit, MapLit, ModDef, NamedNodeExpr,
        NodeDef, NodeLabel, NotExpr, Param, Stmt, StringLit, TagName,
    },
    error::{ParseError, ParseErrorList},
    lexer::Lexer,
    token::{Token, TokenKind},
};

/// Binding powers, lowest to highest. `,`, `=`, `or`, and `->` share the OR
/// level; `.` and `:` bind tightest.
mod prec {
    pub const LOWEST: u8 = 1;
    pub const OR: u8 = 2;
    pub const AND: u8 = 3;
    pub const EQUAL: u8 = 4;
    pub const SUM: u8 = 5;
    pub const PRODUCT: u8 = 6;
    pub const PREFIX: u8 = 7;
    pub const CALL: u8 = 8;
    pub const DEREF: u8 = 9;
}

fn precedence_of(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Comma | TokenKind::Assign | TokenKind::Or | TokenKind::Arrow => prec::OR,
        TokenKind::And => prec::AND,
        TokenKind::Eq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq => prec::EQUAL,
        TokenKind::Plus | TokenKind::Minus => prec::SUM,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => prec::PRODUCT,
        TokenKind::LParen => prec::CALL,
        TokenKind::Dot | TokenKind::Colon => prec::DEREF,
        _ => prec::LOWEST,
    }
}

pub struct Parser<R> {
    lexer: Lexer<R>,
    cur: Token,
    peek: Token,
    errors: Vec<ParseError>,
    /// Set when the lexer failed; the token stream then reads as EOF.
    halted: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(input: R) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(input),
            cur: Token::eof(Default::default()),
            peek: Token::eof(Default::default()),
            errors: Vec::new(),
            halted: false,
        };
        parser.advance();
        parser.advance();
        parser
    }

    /// Parses the whole input. Any recorded error invalidates the parse.
    pub fn parse(mut self) -> Result<Ast, ParseErrorList> {
        let mut statements = Vec::new();
        while self.cur.kind != TokenKind::Eof {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.advance();
        }
        if self.errors.is_empty() {
            Ok(Ast { statements })
        } else {
            Err(ParseErrorList(self.errors))
        }
    }

    fn advance(&mut self) {
        let next = if self.halted {
            Token::eof(self.peek.position)
        } else {
            match self.lexer.next_token() {
                Ok(token) => token,
                Err(err) => {
                    self.halted = true;
                    self.errors.push(err.into());
                    Token::eof(self.peek.position)
                }
            }
        };
        self.cur = std::mem::replace(&mut self.peek, next);
    }

    /// Advances when the peeked token has the expected kind; records an
    /// error and leaves the window alone otherwise.
    fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek.kind == kind {
            self.advance();
            Some(())
        } else {
            self.error_at(&self.peek.clone(), &kind.to_string());
            None
        }
    }

    fn error_at(&mut self, have: &Token, expected: &str) {
        self.errors.push(ParseError::Expected {
            line: have.position.line,
            column: have.position.column,
            expected: expected.to_owned(),
            have: have.kind.to_string(),
        });
    }

    fn cur_ident(&self) -> Ident {
        Ident {
            token: self.cur.clone(),
            name: self.cur.text.clone(),
        }
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Comment => Some(Stmt::Comment(CommentStmt {
                token: self.cur.clone(),
                text: self.cur.text.clone(),
            })),
            TokenKind::Import => self.parse_import(),
            TokenKind::Fn => self.parse_fn_statement(),
            TokenKind::Node => self.parse_node_statement(),
            TokenKind::Mod => self.parse_mod_statement(),
            TokenKind::Foreach => self.parse_foreach(),
            // a bare separator between statements
            TokenKind::Semicolon => None,
            _ => self.parse_expression(prec::LOWEST).map(Stmt::Expr),
        }
    }

    fn parse_let(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur_ident();
        self.expect_peek(TokenKind::Assign)?;
        self.advance();
        let value = self.parse_expression(prec::LOWEST)?;
        if self.peek.kind == TokenKind::Semicolon {
            self.advance();
        }
        Some(Stmt::Let(LetStmt { token, name, value }))
    }

    fn parse_import(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Str)?;
        Some(Stmt::Import(ImportStmt {
            token,
            path: self.cur.text.clone(),
        }))
    }

    fn parse_fn_statement(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur_ident();
        self.expect_peek(TokenKind::LParen)?;
        let params = self.parse_parameter_list(TokenKind::RParen)?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block()?;
        Some(Stmt::Fn(FnDef {
            token,
            name,
            params,
            body,
        }))
    }

    /// `node[inputs] Name(args) -> [outputs] { block }`
    fn parse_node_statement(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::LBracket)?;
        let inputs = self.parse_parameter_list(TokenKind::RBracket)?;
        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur_ident();
        self.expect_peek(TokenKind::LParen)?;
        let args = self.parse_parameter_list(TokenKind::RParen)?;
        self.expect_peek(TokenKind::Arrow)?;
        self.expect_peek(TokenKind::LBracket)?;
        let outputs = self.parse_parameter_list(TokenKind::RBracket)?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block()?;
        Some(Stmt::Node(NodeDef {
            token,
            name,
            inputs,
            args,
            outputs,
            body,
        }))
    }

    fn parse_mod_statement(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Ident)?;
        let name = self.cur_ident();
        self.expect_peek(TokenKind::LParen)?;
        let params = self.parse_parameter_list(TokenKind::RParen)?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block()?;
        Some(Stmt::Mod(ModDef {
            token,
            name,
            params,
            body,
        }))
    }

    fn parse_foreach(&mut self) -> Option<Stmt> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Ident)?;
        let var = self.cur_ident();
        self.expect_peek(TokenKind::In)?;
        self.advance();
        let iterable = self.parse_expression(prec::LOWEST)?;
        self.expect_peek(TokenKind::LBrace)?;
        let body = self.parse_block()?;
        Some(Stmt::Foreach(ForeachStmt {
            token,
            var,
            iterable,
            body,
        }))
    }

    /// A raw block in statement-body position: no map reinterpretation.
    /// The current token must be `{`; on success the window rests on `}`.
    fn parse_block(&mut self) -> Option<Block> {
        let token = self.cur.clone();
        self.advance();
        let mut statements = Vec::new();
        while self.cur.kind != TokenKind::RBrace && self.cur.kind != TokenKind::Eof {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            self.advance();
        }
        if self.cur.kind != TokenKind::RBrace {
            self.error_at(&self.cur.clone(), &TokenKind::RBrace.to_string());
            return None;
        }
        Some(Block { token, statements })
    }

    /// A brace expression: a block whose statements are all assignments
    /// (vacuously including `{}`) re-reads as a map literal.
    fn parse_brace_expression(&mut self) -> Option<Expr> {
        let block = self.parse_block()?;
        let all_assign = block
            .statements
            .iter()
            .all(|stmt| matches!(stmt, Stmt::Expr(Expr::Assign(_))));
        if all_assign {
            let assignments = block
                .statements
                .into_iter()
                .map(|stmt| match stmt {
                    Stmt::Expr(Expr::Assign(assign)) => *assign,
                    _ => unreachable!("checked all statements are assignments"),
                })
                .collect();
            Some(Expr::Map(MapLit {
                token: block.token,
                assignments,
            }))
        } else {
            Some(Expr::Block(block))
        }
    }

    fn parse_expression(&mut self, precedence: u8) -> Option<Expr> {
        let mut left = self.parse_prefix()?;
        while self.peek.kind != TokenKind::Semicolon
            && self.peek.kind != TokenKind::Eof
            && precedence < precedence_of(self.peek.kind)
        {
            left = match self.peek.kind {
                TokenKind::LParen => {
                    self.advance();
                    self.parse_call(left)?
                }
                TokenKind::Arrow => {
                    self.advance();
                    self.parse_arrow(left)?
                }
                TokenKind::Assign => {
                    self.advance();
                    self.parse_assign(left)?
                }
                TokenKind::Colon => {
                    self.advance();
                    self.parse_named_node(left)?
                }
                TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Dot
                | TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
                | TokenKind::And
                | TokenKind::Or => {
                    self.advance();
                    self.parse_infix(left)?
                }
                _ => return Some(left),
            };
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::Integer => {
                let token = self.cur.clone();
                match token.text.parse::<i64>() {
                    Ok(value) => Some(Expr::Integer(IntegerLit { token, value })),
                    Err(_) => {
                        self.error_at(&token, &TokenKind::Integer.to_string());
                        None
                    }
                }
            }
            TokenKind::Str => Some(Expr::Str(StringLit {
                token: self.cur.clone(),
                value: self.cur.text.clone(),
            })),
            TokenKind::True | TokenKind::False => Some(Expr::Bool(BoolLit {
                token: self.cur.clone(),
                value: self.cur.kind == TokenKind::True,
            })),
            TokenKind::Ident => Some(Expr::Ident(self.cur_ident())),
            TokenKind::LBrace => self.parse_brace_expression(),
            TokenKind::LParen => self.parse_grouped(),
            TokenKind::Fn => self.parse_fn_expression(),
            TokenKind::Internal => self.parse_internal(),
            TokenKind::Bang => self.parse_not(),
            TokenKind::If => self.parse_conditional(),
            TokenKind::LBracket => self.parse_list(),
            TokenKind::At => self.parse_tag(),
            _ => {
                self.error_at(&self.cur.clone(), "expression");
                None
            }
        }
    }

    fn parse_grouped(&mut self) -> Option<Expr> {
        self.advance(); // eat the '('
        let expr = self.parse_expression(prec::LOWEST)?;
        self.expect_peek(TokenKind::RParen)?;
        Some(expr)
    }

    fn parse_call(&mut self, callee: Expr) -> Option<Expr> {
        let token = self.cur.clone();
        let args = self.parse_expression_list(TokenKind::RParen)?;
        Some(Expr::Call(Box::new(CallExpr { token, callee, args })))
    }

    /// Right side parsed one level below the arrow's own precedence: chains
    /// lean right while the chain's value stays the leftmost operand.
    fn parse_arrow(&mut self, left: Expr) -> Option<Expr> {
        let token = self.cur.clone();
        let precedence = precedence_of(token.kind);
        self.advance();
        let right = self.parse_expression(precedence - 1)?;
        Some(Expr::Arrow(Box::new(ArrowExpr { token, left, right })))
    }

    fn parse_assign(&mut self, left: Expr) -> Option<Expr> {
        let token = self.cur.clone();
        let Expr::Ident(target) = left else {
            self.error_at(&token, &TokenKind::Ident.to_string());
            return None;
        };
        let precedence = precedence_of(token.kind);
        self.advance();
        let value = self.parse_expression(precedence)?;
        Some(Expr::Assign(Box::new(AssignExpr { token, target, value })))
    }

    /// `name: expr` / `@tag: expr`: the left side names the node the right
    /// side evaluates to.
    fn parse_named_node(&mut self, left: Expr) -> Option<Expr> {
        let token = self.cur.clone();
        let label = match left {
            Expr::Ident(ident) => Some(NodeLabel::Field(ident)),
            Expr::Tag(tag) => Some(NodeLabel::Tag(tag.name)),
            _ => None,
        };
        self.advance();
        let value = self.parse_expression(prec::LOWEST)?;
        Some(Expr::Named(Box::new(NamedNodeExpr { token, label, value })))
    }

    fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        let token = self.cur.clone();
        let precedence = precedence_of(token.kind);
        self.advance();
        let right = self.parse_expression(precedence)?;
        Some(Expr::Infix(Box::new(InfixExpr { token, left, right })))
    }

    fn parse_not(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        self.advance();
        let expr = self.parse_expression(prec::PREFIX)?;
        Some(Expr::Not(Box::new(NotExpr { token, expr })))
    }

    fn parse_conditional(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        self.advance();
        let condition = self.parse_expression(prec::LOWEST)?;
        self.expect_peek(TokenKind::LBrace)?;
        let then_block = self.parse_block()?;
        let else_branch = if self.peek.kind == TokenKind::Else {
            self.advance();
            self.advance();
            Some(self.parse_expression(prec::LOWEST)?)
        } else {
            None
        };
        Some(Expr::If(Box::new(IfExpr {
            token,
            condition,
            then_block,
            else_branch,
        })))
    }

    /// `fn(params): expr`: the body becomes a single-statement block.
    fn parse_fn_expression(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::LParen)?;
        let params = self.parse_parameter_list(TokenKind::RParen)?;
        self.expect_peek(TokenKind::Colon)?;
        self.advance();
        let body_token = self.cur.clone();
        let expr = self.parse_expression(prec::LOWEST)?;
        Some(Expr::Fn(Box::new(FnLit {
            token,
            params,
            body: Block {
                token: body_token,
                statements: vec![Stmt::Expr(expr)],
            },
        })))
    }

    fn parse_internal(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Str)?;
        Some(Expr::Internal(InternalExpr {
            token,
            name: StringLit {
                token: self.cur.clone(),
                value: self.cur.text.clone(),
            },
        }))
    }

    fn parse_list(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        Some(Expr::List(ListLit { token, elements }))
    }

    fn parse_tag(&mut self) -> Option<Expr> {
        let token = self.cur.clone();
        self.expect_peek(TokenKind::Ident)?;
        Some(Expr::Tag(TagName {
            token,
            name: self.cur_ident(),
        }))
    }

    fn parse_parameter_list(&mut self, end: TokenKind) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if self.peek.kind == end {
            self.advance();
            return Some(params);
        }
        self.advance();
        params.push(self.parse_param()?);
        while self.peek.kind == TokenKind::Comma {
            self.advance();
            self.advance();
            params.push(self.parse_param()?);
        }
        self.expect_peek(end)?;
        Some(params)
    }

    fn parse_param(&mut self) -> Option<Param> {
        if self.cur.kind != TokenKind::Ident {
            self.error_at(&self.cur.clone(), &TokenKind::Ident.to_string());
            return None;
        }
        Some(Param {
            token: self.cur.clone(),
            name: self.cur_ident(),
        })
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expr>> {
        let mut list = Vec::new();
        if self.peek.kind == end {
            self.advance();
            return Some(list);
        }
        self.advance();
        list.push(self.parse_expression(prec::LOWEST)?);
        while self.peek.kind == TokenKind::Comma {
            self.advance();
            self.advance();
            list.push(self.parse_expression(prec::LOWEST)?);
        }
        self.expect_peek(end)?;
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(input: &str) -> Result<Ast, ParseErrorList> {
        Parser::new(input.as_bytes()).parse()
    }

    fn statement_count(input: &str) -> usize {
        parse(input).expect("parse failure").statements.len()
    }

    #[test]
    fn single_statements() {
        let cases = [
            "let foo = \"bar\"",
            "snmp.foo",
            "get(\"sysDescr\")",
            "snmp.get(\"sysDescr\")",
            "snmp.foo(\"sysDescr\", \"sysDescr\")",
            "snmp.get(\"sysDescr\") -> snmp.get(\"foo\")",
            "import \"foo.stitch\"\n",
            "1+2",
            "[1,2,3,4]",
            "{foo = \"bar\"; bar = 2}",
        ];
        for case in cases {
            assert_eq!(statement_count(case), 1, "program: {case}");
        }
    }

    #[test]
    fn multiple_statements() {
        let cases = [
            ("let foo = \"bar\";\nsnmp.get(\"sysDescr\");\n", 2),
            ("{\n  let foo = \"bar\";\n}\n;\n", 1),
            ("let foo = {\n  snmp.get(\"sysDescr\");\n}\n;\n", 1),
        ];
        for (case, expected) in cases {
            assert_eq!(statement_count(case), expected, "program: {case}");
        }
    }

    #[test]
    fn all_assignment_braces_become_maps() {
        let ast = parse("{foo = \"bar\"; bar = 2}").unwrap();
        let Stmt::Expr(Expr::Map(map)) = &ast.statements[0] else {
            panic!("expected map literal, got {:?}", ast.statements[0]);
        };
        assert_eq!(map.assignments.len(), 2);
        assert_eq!(map.assignments[0].target.name, "foo");
    }

    #[test]
    fn empty_braces_are_an_empty_map() {
        let ast = parse("let m = {}").unwrap();
        let Stmt::Let(let_stmt) = &ast.statements[0] else {
            panic!("expected let");
        };
        assert!(matches!(&let_stmt.value, Expr::Map(map) if map.assignments.is_empty()));
    }

    #[test]
    fn mixed_braces_stay_blocks() {
        let ast = parse("{ let foo = 1; foo }").unwrap();
        let Stmt::Expr(Expr::Block(block)) = &ast.statements[0] else {
            panic!("expected block");
        };
        assert_eq!(block.statements.len(), 2);
    }

    #[test]
    fn arrows_lean_right_and_keep_the_left_value() {
        let ast = parse("a -> b -> c").unwrap();
        let Stmt::Expr(Expr::Arrow(outer)) = &ast.statements[0] else {
            panic!("expected arrow");
        };
        assert!(matches!(&outer.left, Expr::Ident(ident) if ident.name == "a"));
        let Expr::Arrow(inner) = &outer.right else {
            panic!("expected nested arrow");
        };
        assert!(matches!(&inner.left, Expr::Ident(ident) if ident.name == "b"));
        assert!(matches!(&inner.right, Expr::Ident(ident) if ident.name == "c"));
    }

    #[test]
    fn named_node_captures_field_and_tag() {
        let ast = parse("poller: get(\"1.3\")").unwrap();
        let Stmt::Expr(Expr::Named(named)) = &ast.statements[0] else {
            panic!("expected named node");
        };
        assert!(matches!(&named.label, Some(NodeLabel::Field(ident)) if ident.name == "poller"));

        let ast = parse("@edge: get(\"1.3\")").unwrap();
        let Stmt::Expr(Expr::Named(named)) = &ast.statements[0] else {
            panic!("expected named node");
        };
        assert!(matches!(&named.label, Some(NodeLabel::Tag(ident)) if ident.name == "edge"));
    }

    #[test]
    fn anonymous_function_bodies_are_single_expression_blocks() {
        let ast = parse("let add = fn(a, b): a + b").unwrap();
        let Stmt::Let(let_stmt) = &ast.statements[0] else {
            panic!("expected let");
        };
        let Expr::Fn(fn_lit) = &let_stmt.value else {
            panic!("expected fn literal");
        };
        assert_eq!(fn_lit.params.len(), 2);
        assert_eq!(fn_lit.body.statements.len(), 1);
    }

    #[test]
    fn unterminated_block_discards_the_parse() {
        let errors = parse("foreach i in [1,2,3,4] {").expect_err("expected parse failure");
        assert!(
            errors
                .iter()
                .any(|err| err.to_string().contains("expected '}'; have EOF")),
            "errors: {errors}"
        );
    }

    #[test]
    fn parse_error_messages_carry_position_and_kinds() {
        let errors = parse("let 1 = 2").expect_err("expected parse failure");
        assert_eq!(
            errors.iter().next().unwrap().to_string(),
            "line 0 column 4: expected IDENTIFIER; have INTEGER literal"
        );
    }

    #[test]
    fn lex_errors_halt_and_surface_in_the_error_list() {
        let errors = parse("let a = 1\n$").expect_err("expected parse failure");
        assert!(
            errors.iter().any(|err| err.to_string().contains("unexpected character")),
            "errors: {errors}"
        );
    }

    #[test]
    fn node_definitions_parse_slots_arguments_and_body() {
        let ast = parse("node[Input] Double(factor) -> [Output, Error] { factor }").unwrap();
        let Stmt::Node(node) = &ast.statements[0] else {
            panic!("expected node definition");
        };
        assert_eq!(node.name.name, "Double");
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(node.args.len(), 1);
        assert_eq!(node.outputs.len(), 2);
        assert_eq!(node.body.statements.len(), 1);
    }

    #[test]
    fn conditionals_chain_through_else() {
        let ast = parse("if a < b { 1 } else if b < c { 2 } else { 3 }").unwrap();
        let Stmt::Expr(Expr::If(outer)) = &ast.statements[0] else {
            panic!("expected conditional");
        };
        assert!(matches!(outer.else_branch, Some(Expr::If(_))));
    }

    #[test]
    fn comments_are_preserved_as_statements() {
        let ast = parse("# heading\nlet a = 1").unwrap();
        assert_eq!(ast.statements.len(), 2);
        assert!(matches!(&ast.statements[0], Stmt::Comment(c) if c.text == " heading"));
    }
}
