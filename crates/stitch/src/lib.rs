//! Stitch is a small language for describing *flow graphs*: directed graphs
//! of typed processing nodes connected through named input/output slots.
//!
//! A program moves through four stages:
//!
//! 1. the [`lexer`] turns bytes into positioned tokens,
//! 2. the [`parser`] climbs precedences into an AST,
//! 3. the [`eval`] walker elaborates the tree, computing values and, as a
//!    side effect, constructing and wiring node instances, and
//! 4. the [`graph`] emitter lowers the accumulated node objects into a flat
//!    description for a downstream runtime.
//!
//! Hosts participate through capabilities: a [`Resolver`] supplies the
//! values behind `internal "name"`, and a [`SourceLoader`] supplies the text
//! behind `import "path"`.
//!
//! ```
//! use stitch::{Evaluator, Program, Registry};
//!
//! let program = Program::parse("let x = 1 + 2".as_bytes()).unwrap();
//! let mut eval = Evaluator::new(Box::new(Registry::new()));
//! let root = eval.root();
//! eval.eval_program(&program.tree, root).unwrap();
//! ```

pub mod analysis;
pub mod ast;
pub mod env;
pub mod error;
pub mod eval;
pub mod graph;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod program;
pub mod resolver;
pub mod token;
pub mod value;

pub use crate::{
    analysis::{StitchType, Symbol, SymbolTable},
    env::{EnvId, EnvTable},
    error::{AnalysisError, EmitError, EvalError, EvalErrorKind, LexError, ParseError, ParseErrorList},
    eval::Evaluator,
    graph::{ConfigValue, Configuration, Graph, GraphConnection, GraphNode, Socket, SocketRef},
    lexer::Lexer,
    node::{Connection, NodeArena, NodeId, NodeInstance, NodeType, SlotRef},
    parser::Parser,
    program::Program,
    resolver::{InternalFunction, NativeFunction, NoImports, Registry, Resolver, SourceLoader},
    token::{Position, Token, TokenKind},
    value::{FunctionValue, ListValue, PackageValue, TypeTag, Value},
};
