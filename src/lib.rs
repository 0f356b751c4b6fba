//! Parser and tree-walking evaluator for the Monkey scripting language.
//!
//! Source text flows through [`lexer::Lexer`] into [`parser::Parser`], which
//! builds an [`ast::Program`]; [`evaluator::Evaluator`] reduces that tree to an
//! [`object::Object`].
//!
//! ```
//! use monkey_core::object::Object;
//!
//! let value = monkey_core::run("let double = fn(x) { x * 2 }; double(21)").unwrap();
//! assert_eq!(value, Object::Integer(42));
//! ```

use std::sync::Once;

use anyhow::{bail, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod object;
pub mod parser;
mod stack;
pub mod token;

use crate::ast::Program;
use crate::config::Config;
use crate::error::ParseErrors;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::object::Object;
use crate::parser::Parser;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber for parser and evaluator events.
///
/// Does nothing unless `RUST_LOG` is set, e.g. `RUST_LOG=monkey_core=trace`.
/// Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            install_subscriber(filter);
        }
    });
}

// Leaves any subscriber the host process already installed in place.
fn install_subscriber(filter: EnvFilter) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .try_init();
}

/// Parses `source`, failing with every recorded syntax error if any statement
/// could not be parsed.
pub fn parse(source: &str) -> Result<Program, ParseErrors> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    let errors = parser.into_errors();

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(ParseErrors(errors))
    }
}

/// Parses and evaluates `source` in a fresh environment.
///
/// Error objects produced by evaluation are returned as `Err`. Global bindings
/// are released before returning, so recursive functions do not outlive the run.
pub fn run(source: &str) -> Result<Object> {
    run_with_config(source, Config::default())
}

pub fn run_with_config(source: &str, config: Config) -> Result<Object> {
    let program = parse(source)?;

    let mut evaluator = Evaluator::with_config(config);
    let value = evaluator.eval(&program);
    evaluator.reset();

    match value {
        Object::Error(message) => bail!("evaluation failed: {message}"),
        value => Ok(value),
    }
}
