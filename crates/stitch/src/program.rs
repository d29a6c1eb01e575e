//! The parse-and-analyze driver type.

use std::io::Read;

use tracing::warn;

use crate::{
    analysis::{self, SymbolTable},
    ast::Ast,
    error::ParseErrorList,
    parser::Parser,
};

/// A parsed program together with the advisory symbol table.
///
/// Parsing failures are fatal; analysis failures are logged and leave the
/// symbol table empty, since the pass is advisory.
#[derive(Debug)]
pub struct Program {
    pub tree: Ast,
    pub symbols: Option<SymbolTable>,
}

impl Program {
    pub fn parse(input: impl Read) -> Result<Self, ParseErrorList> {
        let tree = Parser::new(input).parse()?;
        let symbols = match analysis::analyze(&tree) {
            Ok(table) => Some(table),
            Err(err) => {
                warn!(error = %err, "analysis failed");
                None
            }
        };
        Ok(Self { tree, symbols })
    }
}
