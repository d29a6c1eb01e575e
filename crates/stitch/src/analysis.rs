//! Advisory pre-pass over top-level statements.
//!
//! The pass records a symbol per `let` binding, flags re-declarations, and
//! flags `+ - * /` whose operand types disagree. It is intentionally
//! shallow (most expressions classify as [`StitchType::Unknown`]) and its
//! failures never prevent evaluation.

use indexmap::IndexMap;
use strum::Display;

use crate::{
    ast::{Ast, Expr, InfixExpr, Stmt},
    error::AnalysisError,
};

/// The minimal type enum the pre-pass classifies against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StitchType {
    #[strum(serialize = "UNKNOWN")]
    Unknown,
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "FLOAT")]
    Float,
    #[strum(serialize = "STRING")]
    String,
    #[strum(serialize = "BOOL")]
    Bool,
    #[strum(serialize = "NODE")]
    Node,
    #[strum(serialize = "NODE TYPE")]
    NodeType,
    #[strum(serialize = "LIST")]
    List,
    #[strum(serialize = "MAP")]
    Map,
    #[strum(serialize = "SLOT")]
    NodeSlot,
    #[strum(serialize = "FUNCTION")]
    Function,
}

/// A recorded `let` binding.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: StitchType,
    pub line: usize,
}

/// The symbols recorded for one program, in declaration order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a symbol; re-declaration is an error.
    pub fn add(&mut self, symbol: Symbol) -> Result<(), AnalysisError> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(AnalysisError::DuplicateSymbol { name: symbol.name });
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Walks the top-level statements, stopping at the first finding.
pub fn analyze(ast: &Ast) -> Result<SymbolTable, AnalysisError> {
    let mut table = SymbolTable::new();
    for stmt in &ast.statements {
        analyze_stmt(stmt, &mut table)?;
    }
    Ok(table)
}

fn analyze_stmt(stmt: &Stmt, table: &mut SymbolTable) -> Result<StitchType, AnalysisError> {
    match stmt {
        Stmt::Let(let_stmt) => {
            let ty = classify(&let_stmt.value)?;
            table.add(Symbol {
                name: let_stmt.name.name.clone(),
                ty,
                line: let_stmt.token.line(),
            })?;
            Ok(ty)
        }
        Stmt::Expr(expr) => classify(expr),
        _ => Ok(StitchType::Unknown),
    }
}

fn classify(expr: &Expr) -> Result<StitchType, AnalysisError> {
    match expr {
        Expr::Integer(_) => Ok(StitchType::Integer),
        Expr::Str(_) => Ok(StitchType::String),
        Expr::Bool(_) => Ok(StitchType::Bool),
        Expr::List(_) => Ok(StitchType::List),
        Expr::Map(_) => Ok(StitchType::Map),
        Expr::Fn(_) => Ok(StitchType::Function),
        Expr::Infix(infix) => classify_infix(infix),
        _ => Ok(StitchType::Unknown),
    }
}

fn classify_infix(infix: &InfixExpr) -> Result<StitchType, AnalysisError> {
    let left = classify(&infix.left)?;
    let right = classify(&infix.right)?;
    match infix.operator() {
        "+" | "-" | "*" | "/" => {
            if left == right {
                Ok(left)
            } else {
                Err(AnalysisError::TypeMismatch {
                    operator: infix.operator().to_owned(),
                    left,
                    right,
                })
            }
        }
        _ => Ok(StitchType::Unknown),
    }
}
