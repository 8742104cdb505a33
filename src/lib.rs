//! A micro-Scheme interpreter built on a pooled arena with a
//! mark-and-sweep collector.
//!
//! The [`eval::Interp`] owns all state: cells and scopes live in pool
//! slots inside an [`arena::Arena`] and are referenced by compact integer
//! handles, never by Rust references. Evaluation failures do not unwind;
//! they evaluate to the nil sentinel and leave a log line behind. Garbage
//! collection runs only when the host calls [`eval::Interp::collect`],
//! typically between top-level expressions.
//!
//! ```
//! use uscheme::eval::Interp;
//! use uscheme::printer::print;
//!
//! let mut interp = Interp::new();
//! let result = interp.eval_str("(define x 3) (+ x 4)").unwrap();
//! assert_eq!(print(&interp, result), "7");
//! interp.collect();
//! ```

pub mod arena;
pub mod env;
pub mod error;
pub mod eval;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod value;
