//! The tree-walking evaluator.
//!
//! One [`Evaluator`] owns everything an evaluation mutates: the node arena,
//! the environment table, and the host capabilities (resolver and source
//! loader). Evaluation is a single exhaustive match over AST variants; the
//! first failure propagates unchanged to the caller and nothing is rolled
//! back. Side effects on the node graph (construction, labelling, wiring)
//! happen as the walk computes values.

use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::{
        Ast, AssignExpr, ArrowExpr, Block, CallExpr, Expr, FnDef, ForeachStmt, IfExpr, ImportStmt, InfixExpr,
        LetStmt, ListLit, MapLit, ModDef, NamedNodeExpr, NodeDef, NodeLabel, Stmt,
    },
    env::{EnvId, EnvTable},
    error::{EvalError, EvalErrorKind},
    node::{self, NodeArena, NodeInstance, NodeType},
    parser::Parser,
    resolver::{NoImports, Resolver, SourceLoader},
    token::TokenKind,
    value::{self, FunctionValue, ListValue, PackageValue, TypeTag, Value},
};

pub struct Evaluator {
    pub arena: NodeArena,
    pub envs: EnvTable,
    resolver: Box<dyn Resolver>,
    loader: Box<dyn SourceLoader>,
}

impl Evaluator {
    /// An evaluator with the given resolver and no import support.
    pub fn new(resolver: Box<dyn Resolver>) -> Self {
        Self {
            arena: NodeArena::new(),
            envs: EnvTable::new(),
            resolver,
            loader: Box::new(NoImports),
        }
    }

    /// An evaluator whose `import` statements read through `loader`.
    pub fn with_loader(resolver: Box<dyn Resolver>, loader: Box<dyn SourceLoader>) -> Self {
        Self {
            arena: NodeArena::new(),
            envs: EnvTable::new(),
            resolver,
            loader,
        }
    }

    /// The global environment of this evaluator.
    pub fn root(&self) -> EnvId {
        self.envs.root()
    }

    /// Evaluates every statement in order; the result is the last
    /// statement's value, if any.
    pub fn eval_program(&mut self, ast: &Ast, env: EnvId) -> Result<Option<Value>, EvalError> {
        let mut last = None;
        for stmt in &ast.statements {
            last = self.eval_stmt(stmt, env)?;
        }
        Ok(last)
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: EnvId) -> Result<Option<Value>, EvalError> {
        match stmt {
            Stmt::Let(let_stmt) => self.eval_let(let_stmt, env),
            Stmt::Import(import) => self.eval_import(import, env),
            Stmt::Fn(def) => self.eval_fn_def(def, env),
            Stmt::Node(def) => self.eval_node_def(def, env),
            Stmt::Mod(def) => self.eval_mod_def(def, env),
            Stmt::Foreach(foreach) => self.eval_foreach(foreach, env),
            Stmt::Comment(_) => Ok(None),
            Stmt::Expr(expr) => self.eval_expr(expr, env),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: EnvId) -> Result<Option<Value>, EvalError> {
        match expr {
            Expr::Integer(lit) => Ok(Some(Value::Integer(lit.value))),
            Expr::Str(lit) => Ok(Some(Value::Str(lit.value.clone()))),
            Expr::Bool(lit) => Ok(Some(Value::Bool(lit.value))),
            Expr::List(lit) => self.eval_list(lit, env).map(Some),
            Expr::Map(lit) => self.eval_map(lit, env).map(Some),
            Expr::Ident(ident) => self
                .envs
                .get(env, &ident.name)
                .map(Some)
                .ok_or_else(|| EvalErrorKind::UnknownIdentifier(ident.name.clone()).at(ident.token.line())),
            Expr::Fn(lit) => Ok(Some(Value::Function(Rc::new(FunctionValue {
                params: param_names(&lit.params),
                body: lit.body.clone(),
                env,
            })))),
            Expr::Internal(internal) => self.eval_internal(&internal.name.value, env).map(Some),
            Expr::If(cond) => self.eval_conditional(cond, env),
            Expr::Block(block) => self.eval_block(block, env),
            Expr::Arrow(arrow) => self.eval_arrow(arrow, env).map(Some),
            Expr::Infix(infix) => self.eval_infix(infix, env).map(Some),
            Expr::Assign(assign) => self.eval_assign(assign, env).map(Some),
            Expr::Call(call) => self.eval_call(call, env),
            Expr::Named(named) => self.eval_named_node(named, env).map(Some),
            Expr::Not(not) => {
                let value = self.eval_value(&not.expr, env)?;
                let Value::Bool(b) = value else {
                    return Err(EvalErrorKind::NotOperatorUndefined(value.type_tag()).at(not.token.line()));
                };
                Ok(Some(Value::Bool(!b)))
            }
            Expr::Tag(tag) => Err(EvalErrorKind::StrayTag(tag.name.name.clone()).at(tag.token.line())),
        }
    }

    /// Evaluates an expression in a context that needs a value.
    fn eval_value(&mut self, expr: &Expr, env: EnvId) -> Result<Value, EvalError> {
        self.eval_expr(expr, env)?
            .ok_or_else(|| EvalErrorKind::NoValue.at(expr.line()))
    }

    fn eval_let(&mut self, let_stmt: &LetStmt, env: EnvId) -> Result<Option<Value>, EvalError> {
        let value = self.eval_value(&let_stmt.value, env)?;
        self.envs.put(env, &let_stmt.name.name, value);
        Ok(None)
    }

    /// Assignment requires an existing binding somewhere on the chain; the
    /// assigned value is also the expression's value.
    fn eval_assign(&mut self, assign: &AssignExpr, env: EnvId) -> Result<Value, EvalError> {
        let value = self.eval_value(&assign.value, env)?;
        if self.envs.get(env, &assign.target.name).is_none() {
            return Err(EvalErrorKind::UnknownIdentifier(assign.target.name.clone()).at(assign.token.line()));
        }
        self.envs.put(env, &assign.target.name, value.clone());
        Ok(value)
    }

    fn eval_block(&mut self, block: &Block, env: EnvId) -> Result<Option<Value>, EvalError> {
        let mut last = None;
        for stmt in &block.statements {
            last = self.eval_stmt(stmt, env)?;
        }
        Ok(last)
    }

    fn eval_list(&mut self, lit: &ListLit, env: EnvId) -> Result<Value, EvalError> {
        let mut elem = TypeTag::Unknown;
        let mut items = Vec::with_capacity(lit.elements.len());
        for element in &lit.elements {
            let value = self.eval_value(element, env)?;
            if elem == TypeTag::Unknown {
                elem = value.type_tag();
            } else if elem != value.type_tag() {
                return Err(EvalErrorKind::MixedList.at(lit.token.line()));
            }
            items.push(value);
        }
        Ok(Value::List(ListValue { elem, items }))
    }

    fn eval_map(&mut self, lit: &MapLit, env: EnvId) -> Result<Value, EvalError> {
        let mut map = indexmap::IndexMap::new();
        for assign in &lit.assignments {
            let value = self.eval_value(&assign.value, env)?;
            map.insert(assign.target.name.clone(), value);
        }
        Ok(Value::Map(map))
    }

    fn eval_conditional(&mut self, cond: &IfExpr, env: EnvId) -> Result<Option<Value>, EvalError> {
        let condition = self.eval_value(&cond.condition, env)?;
        let Value::Bool(b) = condition else {
            return Err(EvalErrorKind::ExpectedBool(condition.type_tag()).at(cond.token.line()));
        };
        if b {
            self.eval_block(&cond.then_block, env)
        } else if let Some(else_branch) = &cond.else_branch {
            self.eval_expr(else_branch, env)
        } else {
            Ok(None)
        }
    }

    /// The iterable must be a list; each element is bound into a fresh child
    /// scope of the current environment.
    fn eval_foreach(&mut self, foreach: &ForeachStmt, env: EnvId) -> Result<Option<Value>, EvalError> {
        let iterable = self.eval_value(&foreach.iterable, env)?;
        let Value::List(list) = iterable else {
            return Err(EvalErrorKind::ForeachNotList(iterable.type_tag()).at(foreach.token.line()));
        };
        for item in list.items {
            let scope = self.envs.clone_env(env);
            self.envs.put(scope, &foreach.var.name, item);
            self.eval_block(&foreach.body, scope)?;
        }
        Ok(None)
    }

    /// Named function definitions bind in the current environment and have
    /// no value.
    fn eval_fn_def(&mut self, def: &FnDef, env: EnvId) -> Result<Option<Value>, EvalError> {
        let function = Value::Function(Rc::new(FunctionValue {
            params: param_names(&def.params),
            body: def.body.clone(),
            env,
        }));
        self.envs.put(env, &def.name.name, function);
        Ok(None)
    }

    /// Modifier definitions elaborate exactly like named functions.
    fn eval_mod_def(&mut self, def: &ModDef, env: EnvId) -> Result<Option<Value>, EvalError> {
        let function = Value::Function(Rc::new(FunctionValue {
            params: param_names(&def.params),
            body: def.body.clone(),
            env,
        }));
        self.envs.put(env, &def.name.name, function);
        Ok(None)
    }

    /// A node-type definition binds the new template under its name; the
    /// template is also the statement's value.
    fn eval_node_def(&mut self, def: &NodeDef, env: EnvId) -> Result<Option<Value>, EvalError> {
        let node_type = Rc::new(NodeType {
            name: def.name.name.clone(),
            params: param_names(&def.args),
            input_slots: param_names(&def.inputs),
            output_slots: param_names(&def.outputs),
            body: Some(def.body.clone()),
            env: Some(env),
        });
        let value = Value::NodeType(Rc::clone(&node_type));
        self.envs.put(env, &node_type.name, value.clone());
        Ok(Some(value))
    }

    /// Resolves a host binding. Internal functions are re-bound to the
    /// environment of the `internal` expression so host calls see the
    /// caller's scope.
    fn eval_internal(&mut self, name: &str, env: EnvId) -> Result<Value, EvalError> {
        let value = self.resolver.resolve(name)?;
        match value {
            Value::Internal(mut func) => {
                func.env = Some(env);
                Ok(Value::Internal(func))
            }
            other => Ok(other),
        }
    }

    /// `import "path"`: load through the host capability, parse, evaluate in
    /// a fresh root environment, and register the result as a package at
    /// this chain's root.
    fn eval_import(&mut self, import: &ImportStmt, env: EnvId) -> Result<Option<Value>, EvalError> {
        let name = package_name(&import.path)
            .ok_or_else(|| EvalErrorKind::InvalidPackageName(import.path.clone()).at(import.token.line()))?;
        let source = self.loader.load(&import.path)?;
        let ast = Parser::new(source.as_bytes()).parse().map_err(|errors| {
            EvalErrorKind::ImportParse {
                path: import.path.clone(),
                errors,
            }
            .at(import.token.line())
        })?;
        let package_env = self.envs.new_root();
        self.eval_program(&ast, package_env)?;
        debug!(package = %name, path = %import.path, "imported package");
        self.envs.put_package(
            env,
            Rc::new(PackageValue {
                name,
                env: package_env,
            }),
        );
        Ok(None)
    }

    fn eval_call(&mut self, call: &CallExpr, env: EnvId) -> Result<Option<Value>, EvalError> {
        let callee = self.eval_value(&call.callee, env)?;
        let line = call.token.line();
        match callee {
            Value::NodeType(node_type) => {
                check_arity(node_type.params.len(), call.args.len(), line)?;
                let args = self.eval_args(&call.args, env)?;
                let instance = NodeInstance::new(Rc::clone(&node_type), args);
                let id = self.arena.alloc(instance);
                debug!(node_type = %node_type.name, id = ?id, "constructed node");
                let value = Value::Node(id);
                self.envs.put_unbound(env, &value);
                Ok(Some(value))
            }
            Value::Function(function) => {
                check_arity(function.params.len(), call.args.len(), line)?;
                let args = self.eval_args(&call.args, env)?;
                let scope = self.envs.clone_env(function.env);
                for (param, arg) in function.params.iter().zip(args) {
                    self.envs.put(scope, param, arg);
                }
                let result = self.eval_block(&function.body, scope)?;
                if let Some(value) = &result {
                    // a node bubbling out of a call starts unbound in the
                    // calling scope
                    self.envs.put_unbound(env, value);
                }
                Ok(result)
            }
            Value::Internal(function) => {
                check_arity(function.native.params.len(), call.args.len(), line)?;
                let args = self.eval_args(&call.args, env)?;
                let native = Rc::clone(&function.native);
                let captured = function.env.unwrap_or(env);
                let result = native.call(self, captured, &args)?;
                if let Some(value) = &result {
                    self.envs.put_unbound(env, value);
                }
                Ok(result)
            }
            other => Err(EvalErrorKind::NotCallable(other.type_tag()).at(line)),
        }
    }

    /// Arguments evaluate strictly left to right.
    fn eval_args(&mut self, args: &[Expr], env: EnvId) -> Result<Vec<Value>, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_value(arg, env)?);
        }
        Ok(values)
    }

    fn eval_infix(&mut self, infix: &InfixExpr, env: EnvId) -> Result<Value, EvalError> {
        let line = infix.token.line();
        match infix.token.kind {
            TokenKind::And | TokenKind::Or => self.eval_logical(infix, env),
            TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => {
                let left = self.eval_value(&infix.left, env)?;
                let right = self.eval_value(&infix.right, env)?;
                let result = value::compare(infix.token.kind, &left, &right).map_err(|kind| kind.at(line))?;
                Ok(Value::Bool(result))
            }
            TokenKind::Dot => {
                let left = self.eval_value(&infix.left, env)?;
                let Expr::Ident(member) = &infix.right else {
                    return Err(EvalErrorKind::ExpectedIdentifier(infix.right.to_string()).at(line));
                };
                self.member_access(&left, &member.name, line)
            }
            TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash | TokenKind::Percent => {
                let left = self.eval_value(&infix.left, env)?;
                let right = self.eval_value(&infix.right, env)?;
                value::arith(infix.token.kind, infix.operator(), &left, &right).map_err(|kind| kind.at(line))
            }
            _ => Err(EvalErrorKind::OperatorUndefined {
                operator: infix.operator().to_owned(),
                tag: TypeTag::Unknown,
            }
            .at(line)),
        }
    }

    /// `and`/`or` evaluate both sides eagerly and require booleans.
    fn eval_logical(&mut self, infix: &InfixExpr, env: EnvId) -> Result<Value, EvalError> {
        let line = infix.token.line();
        let left = self.eval_value(&infix.left, env)?;
        let right = self.eval_value(&infix.right, env)?;
        let Value::Bool(l) = left else {
            return Err(EvalErrorKind::ExpectedBool(left.type_tag()).at(line));
        };
        let Value::Bool(r) = right else {
            return Err(EvalErrorKind::ExpectedBool(right.type_tag()).at(line));
        };
        Ok(Value::Bool(match infix.token.kind {
            TokenKind::And => l && r,
            _ => l || r,
        }))
    }

    /// `.`: Map by field, Node by slot name, Package by exported name.
    fn member_access(&mut self, value: &Value, name: &str, line: usize) -> Result<Value, EvalError> {
        match value {
            Value::Map(map) => map
                .get(name)
                .cloned()
                .ok_or_else(|| EvalErrorKind::FieldNotFound(name.to_owned()).at(line)),
            Value::Node(id) => self
                .arena
                .get(*id)
                .slot(*id, name)
                .map(Value::Slot)
                .ok_or_else(|| {
                    EvalErrorKind::MemberUndefined {
                        name: name.to_owned(),
                        tag: TypeTag::Node,
                    }
                    .at(line)
                }),
            Value::Package(pkg) => self.envs.get(pkg.env, name).ok_or_else(|| {
                EvalErrorKind::UnknownPackageIdentifier {
                    name: name.to_owned(),
                    package: pkg.name.clone(),
                }
                .at(line)
            }),
            other => Err(EvalErrorKind::MemberUndefined {
                name: name.to_owned(),
                tag: other.type_tag(),
            }
            .at(line)),
        }
    }

    /// `A -> B`: both sides must be connectable; the connection is recorded
    /// on the left and the left side is the expression's value, so chains
    /// hang downstream edges off the first node.
    fn eval_arrow(&mut self, arrow: &ArrowExpr, env: EnvId) -> Result<Value, EvalError> {
        let line = arrow.token.line();
        let left = self.eval_value(&arrow.left, env)?;
        if !left.is_connectable() {
            return Err(EvalErrorKind::NotConnectable(left.type_tag()).at(line));
        }
        let right = self.eval_value(&arrow.right, env)?;
        if !right.is_connectable() {
            return Err(EvalErrorKind::NotConnectable(right.type_tag()).at(line));
        }
        node::connect(&mut self.arena, &left, &right).map_err(|kind| kind.at(line))?;
        Ok(left)
    }

    /// `name: expr` / `@tag: expr`: the right side must be a node; the
    /// label lands on the node and the node is the expression's value.
    fn eval_named_node(&mut self, named: &NamedNodeExpr, env: EnvId) -> Result<Value, EvalError> {
        let line = named.token.line();
        let value = self.eval_value(&named.value, env)?;
        let Value::Node(id) = value else {
            return Err(EvalErrorKind::NotANode(value.type_tag()).at(line));
        };
        match &named.label {
            Some(NodeLabel::Field(ident)) => {
                self.arena.get_mut(id).field_name = Some(ident.name.clone());
            }
            Some(NodeLabel::Tag(ident)) => {
                self.arena.get_mut(id).tag_name = Some(ident.name.clone());
            }
            None => return Err(EvalErrorKind::InvalidNamedExpression.at(line)),
        }
        Ok(value)
    }
}

fn check_arity(expected: usize, found: usize, line: usize) -> Result<(), EvalError> {
    if expected == found {
        Ok(())
    } else {
        Err(EvalErrorKind::ArityMismatch { expected, found }.at(line))
    }
}

fn param_names(params: &[crate::ast::Param]) -> Vec<String> {
    params.iter().map(|param| param.name.name.clone()).collect()
}

/// The leading alphanumeric run of the path's file name, e.g.
/// `lib/foo.stitch` → `foo`. An empty run is no name.
fn package_name(path: &str) -> Option<String> {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let name: String = base.chars().take_while(char::is_ascii_alphanumeric).collect();
    if name.is_empty() { None } else { Some(name) }
}
