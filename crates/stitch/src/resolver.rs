//! Host bindings.
//!
//! `internal "name"` reaches outside the language: the evaluator holds a
//! single [`Resolver`] capability and asks it for a value by name. Hosts
//! register native functions (a parameter list plus a closure receiving the
//! evaluator, the captured environment, and the evaluated arguments) and
//! hosted [`NodeType`] templates. Registries are plain values passed into
//! the evaluator; there is no process-wide state.
//!
//! Imports follow the same pattern: the [`SourceLoader`] capability maps an
//! import path to source text, keeping all I/O on the host side of the
//! boundary.

use std::{fmt, rc::Rc};

use ahash::AHashMap;

use crate::{
    env::EnvId,
    error::{EvalError, EvalErrorKind},
    eval::Evaluator,
    node::NodeType,
    value::Value,
};

/// The callable a host registers: evaluator scope, the function's captured
/// environment, and the evaluated arguments.
pub type NativeFnImpl = dyn Fn(&mut Evaluator, EnvId, &[Value]) -> Result<Option<Value>, EvalError>;

/// A host-supplied function: its declared parameter names and the
/// implementation.
pub struct NativeFunction {
    pub params: Vec<String>,
    func: Box<NativeFnImpl>,
}

impl NativeFunction {
    pub fn new(
        params: Vec<String>,
        func: impl Fn(&mut Evaluator, EnvId, &[Value]) -> Result<Option<Value>, EvalError> + 'static,
    ) -> Self {
        Self {
            params,
            func: Box::new(func),
        }
    }

    pub fn call(&self, scope: &mut Evaluator, env: EnvId, args: &[Value]) -> Result<Option<Value>, EvalError> {
        (self.func)(scope, env, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("params", &self.params).finish_non_exhaustive()
    }
}

/// A native function bound into a program, together with the environment it
/// captured at the `internal` expression site.
#[derive(Debug, Clone)]
pub struct InternalFunction {
    pub native: Rc<NativeFunction>,
    pub env: Option<EnvId>,
}

/// The capability the evaluator uses to resolve `internal "name"`.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Result<Value, EvalError>;
}

/// The capability the evaluator uses to load `import "path"` source text.
pub trait SourceLoader {
    fn load(&self, path: &str) -> Result<String, EvalError>;
}

/// The default loader: refuses every import.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImports;

impl SourceLoader for NoImports {
    fn load(&self, path: &str) -> Result<String, EvalError> {
        Err(EvalErrorKind::ImportFailed {
            path: path.to_owned(),
            reason: "no source loader configured".to_owned(),
        }
        .into())
    }
}

/// A name → binding table implementing [`Resolver`].
#[derive(Debug, Default)]
pub struct Registry {
    functions: AHashMap<String, Rc<NativeFunction>>,
    node_types: AHashMap<String, Rc<NodeType>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a native function under `name`.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        func: impl Fn(&mut Evaluator, EnvId, &[Value]) -> Result<Option<Value>, EvalError> + 'static,
    ) {
        self.functions
            .insert(name.into(), Rc::new(NativeFunction::new(params, func)));
    }

    /// Registers a hosted node template under its own name.
    pub fn register_node_type(&mut self, node_type: NodeType) {
        self.node_types.insert(node_type.name.clone(), Rc::new(node_type));
    }
}

impl Resolver for Registry {
    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(func) = self.functions.get(name) {
            return Ok(Value::Internal(InternalFunction {
                native: Rc::clone(func),
                env: None,
            }));
        }
        if let Some(node_type) = self.node_types.get(name) {
            return Ok(Value::NodeType(Rc::clone(node_type)));
        }
        Err(EvalErrorKind::UnknownInternal(name.to_owned()).into())
    }
}
