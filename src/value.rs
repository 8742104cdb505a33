use std::fmt;

use crate::eval::Interp;

/// Handle to a cell slot in the arena. This is the GC handle: identity of a
/// runtime value is identity of its `CellId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub u32);

/// Handle to a scope slot in the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(pub u32);

/// Native function: receives the interpreter and a pre-evaluated,
/// nil-terminated argument list. Resolved to a fn pointer once, at
/// registration time.
pub type NativeFn = fn(&mut Interp, CellId) -> CellId;

/// A runtime value. Every cell lives in an arena pool slot; `Cons` and
/// `Proc` reference other slots by handle only, never by ownership.
#[derive(Debug, Clone, Default)]
pub enum Cell {
    /// Empty tag: freshly reset slots, and the nil/#t/#f singletons.
    #[default]
    None,
    Int(i64),
    Real(f64),
    Str(String),
    Symbol(String),
    Cons(CellId, CellId),
    /// Interpreted procedure: parameter list, body form sequence, and the
    /// scope captured at definition time.
    Proc {
        params: CellId,
        body: CellId,
        env: EnvId,
    },
    Native {
        name: &'static str,
        func: NativeFn,
    },
}

impl Cell {
    pub fn is_cons(&self) -> bool {
        matches!(self, Cell::Cons(_, _))
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Cell::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({})", self.0)
    }
}

impl fmt::Debug for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvId({})", self.0)
    }
}
