use tracing::{debug, error, info, warn};

use crate::arena::Arena;
use crate::env;
use crate::error::Result;
use crate::primitives;
use crate::reader;
use crate::value::{Cell, CellId, EnvId, NativeFn};

/// The special forms, dispatched through a closed enum rather than repeated
/// string comparison at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Quote,
    If,
    Define,
    Set,
    Lambda,
}

impl SpecialForm {
    fn from_name(name: &str) -> Option<SpecialForm> {
        match name {
            "quote" => Some(SpecialForm::Quote),
            "if" => Some(SpecialForm::If),
            "define" => Some(SpecialForm::Define),
            "set!" => Some(SpecialForm::Set),
            "lambda" => Some(SpecialForm::Lambda),
            _ => None,
        }
    }
}

/// A micro-Scheme interpreter: one arena, one global scope, three
/// singletons. All state lives here so the collector can find its roots,
/// and so independent interpreters can coexist in one process.
pub struct Interp {
    arena: Arena,
    global: EnvId,
    nil: CellId,
    t: CellId,
    f: CellId,
}

impl Interp {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        // The singletons occupy the first three slots of the first pool.
        // Everything compares against them by handle identity.
        let nil = arena.alloc_cell(Cell::None);
        let t = arena.alloc_cell(Cell::None);
        let f = arena.alloc_cell(Cell::None);
        let global = arena.alloc_env(0);
        let mut interp = Interp {
            arena,
            global,
            nil,
            t,
            f,
        };
        primitives::register_all(&mut interp);
        info!(?global, "interp: created");
        interp
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn global(&self) -> EnvId {
        self.global
    }

    pub fn nil(&self) -> CellId {
        self.nil
    }

    pub fn t(&self) -> CellId {
        self.t
    }

    pub fn f(&self) -> CellId {
        self.f
    }

    /// The #t/#f singleton for a host-side boolean.
    pub fn bool(&self, cond: bool) -> CellId {
        if cond {
            self.t
        } else {
            self.f
        }
    }

    // ------------------------------------------------------------------
    // Value construction: the only way cells come into existence.
    // ------------------------------------------------------------------

    pub fn int(&mut self, value: i64) -> CellId {
        self.arena.alloc_cell(Cell::Int(value))
    }

    pub fn real(&mut self, value: f64) -> CellId {
        self.arena.alloc_cell(Cell::Real(value))
    }

    pub fn string(&mut self, value: impl Into<String>) -> CellId {
        self.arena.alloc_cell(Cell::Str(value.into()))
    }

    pub fn symbol(&mut self, name: impl Into<String>) -> CellId {
        self.arena.alloc_cell(Cell::Symbol(name.into()))
    }

    pub fn cons(&mut self, car: CellId, cdr: CellId) -> CellId {
        self.arena.alloc_cell(Cell::Cons(car, cdr))
    }

    pub fn native(&mut self, name: &'static str, func: NativeFn) -> CellId {
        self.arena.alloc_cell(Cell::Native { name, func })
    }

    /// Build a proper list from a slice, preserving order.
    pub fn list(&mut self, items: &[CellId]) -> CellId {
        let mut result = self.nil;
        for &item in items.iter().rev() {
            result = self.cons(item, result);
        }
        result
    }

    /// Bind `name` in the global scope. Hosts use this to install extra
    /// natives; the builtin table goes through it too.
    pub fn define_global(&mut self, name: &str, value: CellId) {
        let binding = env::lookup_or_create(&mut self.arena, self.global, name);
        env::set_binding(&mut self.arena, binding, value);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// car of a non-cons is nil: the fail-soft accessor contract.
    pub fn car(&self, id: CellId) -> CellId {
        match self.arena.cell(id) {
            Cell::Cons(car, _) => *car,
            _ => self.nil,
        }
    }

    pub fn cdr(&self, id: CellId) -> CellId {
        match self.arena.cell(id) {
            Cell::Cons(_, cdr) => *cdr,
            _ => self.nil,
        }
    }

    /// Collect a proper list into a Vec; `None` when the tail is improper.
    pub fn list_to_vec(&self, id: CellId) -> Option<Vec<CellId>> {
        let mut items = Vec::new();
        let mut current = id;
        loop {
            if current == self.nil {
                return Some(items);
            }
            match self.arena.cell(current) {
                Cell::Cons(car, cdr) => {
                    items.push(*car);
                    current = *cdr;
                }
                _ => return None,
            }
        }
    }

    // ------------------------------------------------------------------
    // Host entry points
    // ------------------------------------------------------------------

    /// Parse and evaluate every expression in `source` against the global
    /// scope; the value of the last one is returned. Expressions are parsed
    /// one at a time so that unevaluated text never holds arena references
    /// the collector cannot see.
    pub fn eval_str(&mut self, source: &str) -> Result<CellId> {
        let mut result = self.nil;
        let mut pos = 0;
        while let Some((expr, next)) = reader::read_one_at(source, pos, self)? {
            pos = next;
            result = self.eval(expr, self.global);
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // The evaluator: a recursive tree-walk over cells.
    //
    // Recursion here is plain native-stack recursion. There is no
    // trampoline and no tail-call elimination; deep non-tail recursion
    // consumes call stack proportional to its depth.
    // ------------------------------------------------------------------

    /// Evaluate an expression in a scope. Failures evaluate to nil and are
    /// logged; this function never unwinds.
    pub fn eval(&mut self, expr: CellId, scope: EnvId) -> CellId {
        match self.arena.cell(expr) {
            // Self-evaluating tags, the singletons included.
            Cell::None
            | Cell::Int(_)
            | Cell::Real(_)
            | Cell::Str(_)
            | Cell::Proc { .. }
            | Cell::Native { .. } => expr,

            Cell::Symbol(name) => {
                let name = name.clone();
                match env::lookup(&self.arena, scope, &name) {
                    Some(binding) => {
                        env::binding_value(&self.arena, binding).unwrap_or(self.nil)
                    }
                    None => {
                        warn!(symbol = %name, "eval: undefined symbol");
                        self.nil
                    }
                }
            }

            Cell::Cons(car, cdr) => {
                let (head, rest) = (*car, *cdr);
                self.eval_form(head, rest, scope)
            }
        }
    }

    fn eval_form(&mut self, head: CellId, rest: CellId, scope: EnvId) -> CellId {
        if let Cell::Symbol(name) = self.arena.cell(head) {
            if let Some(form) = SpecialForm::from_name(name) {
                return self.eval_special(form, rest, scope);
            }
        }
        self.apply(head, rest, scope)
    }

    fn eval_special(&mut self, form: SpecialForm, rest: CellId, scope: EnvId) -> CellId {
        let Some(args) = self.list_to_vec(rest) else {
            warn!(?form, "eval: malformed special form");
            return self.nil;
        };
        match form {
            SpecialForm::Quote => {
                if args.len() != 1 {
                    warn!("eval: quote expects exactly one argument");
                    return self.nil;
                }
                args[0]
            }

            SpecialForm::Define | SpecialForm::Set => self.eval_assign(form, &args, scope),

            SpecialForm::If => {
                if args.len() < 2 || args.len() > 3 {
                    warn!("eval: if expects a test, a then-branch and an optional else-branch");
                    return self.nil;
                }
                let test = self.eval(args[0], scope);
                // Only the #t singleton itself selects the then-branch;
                // identity, not truthiness.
                if test == self.t {
                    self.eval(args[1], scope)
                } else if args.len() == 3 {
                    self.eval(args[2], scope)
                } else {
                    self.nil
                }
            }

            SpecialForm::Lambda => {
                if args.len() < 2 {
                    warn!("eval: lambda expects a parameter list and a body");
                    return self.nil;
                }
                // The scope captured is the one active at definition time.
                let params = self.car(rest);
                let body = self.cdr(rest);
                self.arena.alloc_cell(Cell::Proc {
                    params,
                    body,
                    env: scope,
                })
            }
        }
    }

    /// define creates (nearest defining scope wins, otherwise the local
    /// scope); set! only assigns, and an undefined target is a no-op.
    fn eval_assign(&mut self, form: SpecialForm, args: &[CellId], scope: EnvId) -> CellId {
        if args.len() != 2 {
            warn!(?form, "eval: assignment expects a name and a value");
            return self.nil;
        }
        let name = match self.arena.cell(args[0]) {
            Cell::Symbol(name) => name.clone(),
            _ => {
                warn!(?form, "eval: assignment target is not a symbol");
                return self.nil;
            }
        };
        let value = self.eval(args[1], scope);
        let binding = if form == SpecialForm::Define {
            env::lookup_or_create(&mut self.arena, scope, &name)
        } else {
            match env::lookup(&self.arena, scope, &name) {
                Some(binding) => binding,
                None => {
                    warn!(symbol = %name, "eval: set! of an undefined symbol");
                    return self.nil;
                }
            }
        };
        env::set_binding(&mut self.arena, binding, value);
        value
    }

    /// Evaluate the operator position, then dispatch on its tag.
    fn apply(&mut self, op_expr: CellId, args_expr: CellId, scope: EnvId) -> CellId {
        let Some(actuals) = self.list_to_vec(args_expr) else {
            warn!("eval: improper argument list");
            return self.nil;
        };
        let op = self.eval(op_expr, scope);
        match self.arena.cell(op) {
            Cell::Proc { params, body, env } => {
                let (params, body, captured) = (*params, *body, *env);
                self.apply_proc(params, body, captured, &actuals, scope)
            }
            Cell::Native { name, func } => {
                let (name, func) = (*name, *func);
                self.apply_native(name, func, &actuals, scope)
            }
            _ => {
                warn!("eval: operator is not applicable");
                self.nil
            }
        }
    }

    fn apply_proc(
        &mut self,
        params: CellId,
        body: CellId,
        captured: EnvId,
        actuals: &[CellId],
        caller: EnvId,
    ) -> CellId {
        let Some(formals) = self.list_to_vec(params) else {
            warn!("eval: malformed parameter list");
            return self.nil;
        };
        if formals.len() != actuals.len() {
            error!(
                expected = formals.len(),
                got = actuals.len(),
                "eval: call arity mismatch"
            );
            return self.nil;
        }

        // Fresh scope sized to the argument count (0 means the default).
        let call_scope = self.arena.alloc_env(formals.len());
        for (&formal, &actual) in formals.iter().zip(actuals) {
            let name = match self.arena.cell(formal) {
                Cell::Symbol(name) => name.clone(),
                _ => {
                    warn!("eval: parameter is not a symbol");
                    return self.nil;
                }
            };
            // Actuals are evaluated in the caller's scope, positionally.
            let value = self.eval(actual, caller);
            let binding = env::lookup_or_create(&mut self.arena, call_scope, &name);
            env::set_binding(&mut self.arena, binding, value);
        }
        // Chain only after every parameter is installed, so a parameter
        // name cannot resolve through the captured scope mid-bind.
        env::chain(&mut self.arena, call_scope, captured);

        self.eval_body(body, call_scope)
    }

    /// Evaluate a body form sequence; the last form's value is the result.
    fn eval_body(&mut self, body: CellId, scope: EnvId) -> CellId {
        let Some(forms) = self.list_to_vec(body) else {
            warn!("eval: malformed procedure body");
            return self.nil;
        };
        let mut result = self.nil;
        for form in forms {
            result = self.eval(form, scope);
        }
        result
    }

    fn apply_native(
        &mut self,
        name: &'static str,
        func: NativeFn,
        actuals: &[CellId],
        caller: EnvId,
    ) -> CellId {
        // Order-preserving: evaluate left to right, then cons up the list.
        let mut evaluated = Vec::with_capacity(actuals.len());
        for &actual in actuals {
            evaluated.push(self.eval(actual, caller));
        }
        let args = self.list(&evaluated);
        debug!(native = name, "eval: native call");
        func(self, args)
    }

    // ------------------------------------------------------------------
    // Collector: stop-the-world mark and sweep.
    // ------------------------------------------------------------------

    /// Reclaim every slot unreachable from the global scope. Invoked
    /// explicitly between top-level evaluations; allocation pressure never
    /// triggers it.
    pub fn collect(&mut self) {
        self.arena.reset_to_empty();
        // The singletons are unconditional roots: identity comparisons
        // depend on their slots never being reused.
        self.arena.mark_cell_used(self.nil);
        self.arena.mark_cell_used(self.t);
        self.arena.mark_cell_used(self.f);
        self.mark_env(self.global);

        let stats = self.arena.stats();
        debug!(
            cell_pools = stats.cell_pools,
            free_cells = stats.free_cells,
            env_pools = stats.env_pools,
            free_envs = stats.free_envs,
            "gc: collection done"
        );
    }

    fn mark_cell(&mut self, id: CellId) {
        if self.arena.is_cell_used(id) {
            // Shared structure or a cycle; the mask stops the recursion.
            return;
        }
        self.arena.mark_cell_used(id);
        match self.arena.cell(id) {
            Cell::Cons(car, cdr) => {
                let (car, cdr) = (*car, *cdr);
                self.mark_cell(car);
                self.mark_cell(cdr);
            }
            Cell::Proc { params, body, env } => {
                let (params, body, env) = (*params, *body, *env);
                self.mark_cell(params);
                self.mark_cell(body);
                self.mark_env(env);
            }
            _ => {}
        }
    }

    fn mark_env(&mut self, id: EnvId) {
        if self.arena.is_env_used(id) {
            return;
        }
        self.arena.mark_env_used(id);
        let values: Vec<CellId> = self.arena.env(id).bound_values().collect();
        for value in values {
            self.mark_cell(value);
        }
        if let Some(parent) = self.arena.env(id).parent {
            self.mark_env(parent);
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
