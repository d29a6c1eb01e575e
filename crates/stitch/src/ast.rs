//! The abstract syntax tree.
//!
//! A [`Ast`] owns an ordered sequence of statements. Every node keeps the
//! token it was parsed from so diagnostics can point back into the source.

use std::fmt;

use crate::token::Token;

/// A parsed program: the ordered top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let(LetStmt),
    Import(ImportStmt),
    Fn(FnDef),
    Node(NodeDef),
    Mod(ModDef),
    Foreach(ForeachStmt),
    Comment(CommentStmt),
    Expr(Expr),
}

/// `let name = expr` with an optional trailing `;`.
#[derive(Debug, Clone)]
pub struct LetStmt {
    pub token: Token,
    pub name: Ident,
    pub value: Expr,
}

/// `import "path"`.
#[derive(Debug, Clone)]
pub struct ImportStmt {
    pub token: Token,
    pub path: String,
}

/// `fn name(params) { block }`: the named, statement form.
#[derive(Debug, Clone)]
pub struct FnDef {
    pub token: Token,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
}

/// `node[inputs] Name(args) -> [outputs] { block }`.
#[derive(Debug, Clone)]
pub struct NodeDef {
    pub token: Token,
    pub name: Ident,
    pub inputs: Vec<Param>,
    pub args: Vec<Param>,
    pub outputs: Vec<Param>,
    pub body: Block,
}

/// `mod name(params) { block }`.
#[derive(Debug, Clone)]
pub struct ModDef {
    pub token: Token,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
}

/// `foreach var in expr { block }`.
#[derive(Debug, Clone)]
pub struct ForeachStmt {
    pub token: Token,
    pub var: Ident,
    pub iterable: Expr,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct CommentStmt {
    pub token: Token,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Integer(IntegerLit),
    Str(StringLit),
    Bool(BoolLit),
    List(ListLit),
    Map(MapLit),
    Ident(Ident),
    Fn(Box<FnLit>),
    Internal(InternalExpr),
    If(Box<IfExpr>),
    Block(Block),
    Arrow(Box<ArrowExpr>),
    Infix(Box<InfixExpr>),
    Assign(Box<AssignExpr>),
    Call(Box<CallExpr>),
    Named(Box<NamedNodeExpr>),
    Not(Box<NotExpr>),
    Tag(TagName),
}

#[derive(Debug, Clone)]
pub struct IntegerLit {
    pub token: Token,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct StringLit {
    pub token: Token,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct BoolLit {
    pub token: Token,
    pub value: bool,
}

#[derive(Debug, Clone)]
pub struct ListLit {
    pub token: Token,
    pub elements: Vec<Expr>,
}

/// A brace expression whose statements were all assignments: an ordered list
/// of field assignments.
#[derive(Debug, Clone)]
pub struct MapLit {
    pub token: Token,
    pub assignments: Vec<AssignExpr>,
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub token: Token,
    pub name: String,
}

/// `fn(params): expr`: the anonymous, expression form. The body is a block
/// holding the single expression.
#[derive(Debug, Clone)]
pub struct FnLit {
    pub token: Token,
    pub params: Vec<Param>,
    pub body: Block,
}

/// `internal "name"`: a host-supplied binding.
#[derive(Debug, Clone)]
pub struct InternalExpr {
    pub token: Token,
    pub name: StringLit,
}

/// `if cond { ... } else ...`; the else branch is any expression, which is how
/// `else if` chains arise.
#[derive(Debug, Clone)]
pub struct IfExpr {
    pub token: Token,
    pub condition: Expr,
    pub then_block: Block,
    pub else_branch: Option<Expr>,
}

/// `{ statements }`, valued at its last statement.
#[derive(Debug, Clone)]
pub struct Block {
    pub token: Token,
    pub statements: Vec<Stmt>,
}

/// `A -> B`: a graph connection; right-associative, valued at the left side.
#[derive(Debug, Clone)]
pub struct ArrowExpr {
    pub token: Token,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone)]
pub struct InfixExpr {
    pub token: Token,
    pub left: Expr,
    pub right: Expr,
}

impl InfixExpr {
    /// The operator spelling, e.g. `+` or `and`.
    pub fn operator(&self) -> &str {
        &self.token.text
    }
}

/// `target = expr`: an assignment; also the building block of map literals.
#[derive(Debug, Clone)]
pub struct AssignExpr {
    pub token: Token,
    pub target: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub token: Token,
    pub callee: Expr,
    pub args: Vec<Expr>,
}

/// What the named-node syntax labels the node with.
#[derive(Debug, Clone)]
pub enum NodeLabel {
    /// `field: expr`
    Field(Ident),
    /// `@tag: expr`
    Tag(Ident),
}

/// `field: expr` or `@tag: expr`: labels the node the right side evaluates to.
#[derive(Debug, Clone)]
pub struct NamedNodeExpr {
    pub token: Token,
    pub label: Option<NodeLabel>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct NotExpr {
    pub token: Token,
    pub expr: Expr,
}

/// A bare `@ident`.
#[derive(Debug, Clone)]
pub struct TagName {
    pub token: Token,
    pub name: Ident,
}

/// A declared parameter name (function parameters, node arguments, slots).
#[derive(Debug, Clone)]
pub struct Param {
    pub token: Token,
    pub name: Ident,
}

impl Stmt {
    /// The originating token, for diagnostics.
    pub fn token(&self) -> &Token {
        match self {
            Self::Let(s) => &s.token,
            Self::Import(s) => &s.token,
            Self::Fn(s) => &s.token,
            Self::Node(s) => &s.token,
            Self::Mod(s) => &s.token,
            Self::Foreach(s) => &s.token,
            Self::Comment(s) => &s.token,
            Self::Expr(e) => e.token(),
        }
    }
}

impl Expr {
    /// The originating token, for diagnostics.
    pub fn token(&self) -> &Token {
        match self {
            Self::Integer(e) => &e.token,
            Self::Str(e) => &e.token,
            Self::Bool(e) => &e.token,
            Self::List(e) => &e.token,
            Self::Map(e) => &e.token,
            Self::Ident(e) => &e.token,
            Self::Fn(e) => &e.token,
            Self::Internal(e) => &e.token,
            Self::If(e) => &e.token,
            Self::Block(e) => &e.token,
            Self::Arrow(e) => &e.token,
            Self::Infix(e) => &e.token,
            Self::Assign(e) => &e.token,
            Self::Call(e) => &e.token,
            Self::Named(e) => &e.token,
            Self::Not(e) => &e.token,
            Self::Tag(e) => &e.token,
        }
    }

    pub fn line(&self) -> usize {
        self.token().line()
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Let(s) => write!(f, "let {} = {}", s.name, s.value),
            Self::Import(s) => write!(f, "import \"{}\"", s.path),
            Self::Fn(s) => {
                write!(f, "fn {}(", s.name)?;
                write_params(f, &s.params)?;
                f.write_str(") ")?;
                write_block(f, &s.body)
            }
            Self::Node(s) => {
                write!(f, "node[")?;
                write_params(f, &s.inputs)?;
                write!(f, "] {}(", s.name)?;
                write_params(f, &s.args)?;
                write!(f, ") -> [")?;
                write_params(f, &s.outputs)?;
                write!(f, "] {{ ... }}")
            }
            Self::Mod(s) => {
                write!(f, "mod {}(", s.name)?;
                write_params(f, &s.params)?;
                write!(f, ") {{ ... }}")
            }
            Self::Foreach(s) => write!(f, "foreach {} in {} {{ ... }}", s.var, s.iterable),
            Self::Comment(s) => write!(f, "#{}", s.text),
            Self::Expr(e) => e.fmt(f),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(e) => write!(f, "{}", e.value),
            Self::Str(e) => write!(f, "\"{}\"", e.value),
            Self::Bool(e) => write!(f, "{}", e.value),
            Self::List(e) => {
                f.write_str("[")?;
                for (i, elem) in e.elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    elem.fmt(f)?;
                }
                f.write_str("]")
            }
            Self::Map(e) => {
                f.write_str("{")?;
                for assign in &e.assignments {
                    write!(f, "{} = {};", assign.target, assign.value)?;
                }
                f.write_str("}")
            }
            Self::Ident(e) => f.write_str(&e.name),
            Self::Fn(e) => {
                f.write_str("fn(")?;
                write_params(f, &e.params)?;
                f.write_str("): ...")
            }
            Self::Internal(e) => write!(f, "internal \"{}\"", e.name.value),
            Self::If(e) => {
                write!(f, "if {} ", e.condition)?;
                write_block(f, &e.then_block)?;
                if let Some(els) = &e.else_branch {
                    write!(f, " else {els}")?;
                }
                Ok(())
            }
            Self::Block(e) => write_block(f, e),
            Self::Arrow(e) => write!(f, "{} -> {}", e.left, e.right),
            Self::Infix(e) => write!(f, "{}{}{}", e.left, e.operator(), e.right),
            Self::Assign(e) => write!(f, "{} = {}", e.target, e.value),
            Self::Call(e) => {
                write!(f, "{}(", e.callee)?;
                for (i, arg) in e.args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")
            }
            Self::Named(e) => match &e.label {
                Some(NodeLabel::Field(name)) => write!(f, "{name}: {}", e.value),
                Some(NodeLabel::Tag(name)) => write!(f, "@{name}: {}", e.value),
                None => write!(f, ": {}", e.value),
            },
            Self::Not(e) => write!(f, "!{}", e.expr),
            Self::Tag(e) => write!(f, "@{}", e.name),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[Param]) -> fmt::Result {
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        f.write_str(&param.name.name)?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
    f.write_str("{ ")?;
    for stmt in &block.statements {
        write!(f, "{stmt}; ")?;
    }
    f.write_str("}")
}
