//! The Knit Script language.
//!
//! Source text flows through [`lexer`] and [`parser`] into the [`ast`],
//! which the [`interp::Interpreter`] executes against a
//! [`Machine`](crate::machine::Machine):
//!
//! - dynamically typed [`value::Value`]s with lexical block scopes
//!   ([`scope`]);
//! - user functions with defaults, keyword arguments and closures;
//! - built-in functions ([`builtins`]) and importable library modules
//!   ([`stdlib`]);
//! - machine statements (`knit`, `xfer`, `rack`, …) that read the ambient
//!   `Carrier` and `Direction`.
//!
//! # Quick start
//!
//! ```rust
//! use knit_script::script::Interpreter;
//!
//! let mut interp = Interpreter::default();
//! interp.exec_source("x = 6; print(x * 7);").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! ```

pub mod ast;
pub mod builtins;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod stdlib;
pub mod value;

// Re-exports for convenience.
pub use interp::Interpreter;
pub use parser::{parse_expression, parse_program};
pub use printer::print_program;
pub use stdlib::Library;
pub use value::Value;
