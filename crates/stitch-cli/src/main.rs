//! The stitch driver: read a program, evaluate it against the built-in host
//! registry, and print the compiled graph as JSON.
//!
//! Usage: `stitch <file|-> [root-identifier]`
//!
//! With no root identifier the first node still unbound at the global scope
//! is compiled.

use std::{
    env, fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use stitch::{
    Evaluator, Graph, NodeType, Program, Registry, SourceLoader, Value,
    error::{EvalError, EvalErrorKind},
};

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: stitch <file|-> [root-identifier]");
        return ExitCode::FAILURE;
    };
    let root_ident = args.get(2);

    let source = match read_source(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error opening file: {err}");
            return ExitCode::FAILURE;
        }
    };

    let program = match Program::parse(source.as_bytes()) {
        Ok(program) => program,
        Err(errors) => {
            for err in &errors {
                eprintln!("{err}");
            }
            return ExitCode::FAILURE;
        }
    };

    let loader = FsLoader::for_source(file_path);
    let mut eval = Evaluator::with_loader(Box::new(builtins()), Box::new(loader));
    let root_env = eval.root();
    if let Err(err) = eval.eval_program(&program.tree, root_env) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let root_node = match root_ident {
        Some(name) => match eval.envs.get(root_env, name) {
            Some(Value::Node(id)) => id,
            Some(other) => {
                eprintln!("error: '{name}' is not a NODE (found {})", other.type_tag());
                return ExitCode::FAILURE;
            }
            None => {
                eprintln!("error: unknown identifier '{name}'");
                return ExitCode::FAILURE;
            }
        },
        None => {
            let unbound = eval.envs.unbound_nodes(root_env);
            match unbound.first() {
                Some((_, id)) => *id,
                None => {
                    eprintln!("error: no unbound node to compile; name one explicitly");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let graph_name = graph_name(file_path);
    let graph = match Graph::from_node(&eval.arena, root_node, graph_name) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string(&graph) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(source)
    } else {
        fs::read_to_string(path)
    }
}

fn graph_name(path: &str) -> String {
    if path == "-" {
        return "stitch".to_owned();
    }
    Path::new(path)
        .file_stem()
        .map_or_else(|| "stitch".to_owned(), |stem| stem.to_string_lossy().into_owned())
}

/// Loads `import` paths relative to the directory of the driving source file.
struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    fn for_source(path: &str) -> Self {
        let base = if path == "-" {
            PathBuf::from(".")
        } else {
            Path::new(path).parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        };
        Self { base }
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, EvalError> {
        fs::read_to_string(self.base.join(path)).map_err(|err| {
            EvalErrorKind::ImportFailed {
                path: path.to_owned(),
                reason: err.to_string(),
            }
            .into()
        })
    }
}

/// The host bindings the driver ships: a print function and a handful of
/// hosted node templates.
fn builtins() -> Registry {
    let mut registry = Registry::new();

    registry.register_function("std:println", vec!["msg".to_owned()], |eval, _env, args| {
        let [msg] = args else {
            return Err(EvalErrorKind::ArityMismatch {
                expected: 1,
                found: args.len(),
            }
            .into());
        };
        match msg {
            Value::Str(s) => println!("{s}"),
            other => println!("{}", other.inspect(&eval.arena)),
        }
        Ok(None)
    });

    registry.register_node_type(NodeType::hosted(
        "snmp:get",
        vec!["oid".to_owned()],
        vec!["Input".to_owned()],
        vec!["Output".to_owned(), "Error".to_owned(), "Missing".to_owned()],
    ));
    registry.register_node_type(NodeType::hosted(
        "snmp:walk",
        vec!["oid".to_owned()],
        vec!["Input".to_owned()],
        vec!["Output".to_owned(), "Error".to_owned()],
    ));
    registry.register_node_type(NodeType::hosted(
        "std:passthru",
        Vec::new(),
        vec!["Input".to_owned()],
        vec!["Output".to_owned()],
    ));

    registry
}
