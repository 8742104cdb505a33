use crate::arena::Arena;
use crate::value::{CellId, EnvId};

/// One name-to-value association in a scope.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    /// `None` until the first assignment, so a freshly created binding is
    /// distinguishable from one bound to nil.
    pub value: Option<CellId>,
}

/// A scope: hash buckets of bindings plus an optional parent scope.
/// The parent reference is non-owning and used only for lookup traversal.
#[derive(Debug, Clone, Default)]
pub struct Env {
    pub(crate) buckets: Vec<Vec<Binding>>,
    pub(crate) parent: Option<EnvId>,
}

impl Env {
    pub(crate) fn init_buckets(&mut self, size: usize) {
        self.buckets = vec![Vec::new(); size];
        self.parent = None;
    }

    /// Clear collision chains for slot reuse. The bucket array itself is
    /// retained at its original size across GC cycles.
    pub(crate) fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.parent = None;
    }

    /// Every value bound in this scope, in bucket order.
    pub(crate) fn bound_values(&self) -> impl Iterator<Item = CellId> + '_ {
        self.buckets.iter().flatten().filter_map(|b| b.value)
    }
}

/// Location of a binding: scope handle plus bucket/chain position. Stable
/// across later inserts into the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingRef {
    env: EnvId,
    bucket: usize,
    index: usize,
}

/// djb2 by Dan Bernstein: h = h*33 + c, wrapping u64.
fn djb2(name: &str) -> u64 {
    name.bytes()
        .fold(5381u64, |h, c| h.wrapping_mul(33).wrapping_add(u64::from(c)))
}

fn bucket_of(arena: &Arena, env: EnvId, name: &str) -> usize {
    (djb2(name) % arena.env(env).buckets.len() as u64) as usize
}

/// Resolve `name` in the nearest enclosing scope that defines it. Returns
/// `None` when the name is undefined anywhere in the chain.
pub fn lookup(arena: &Arena, env: EnvId, name: &str) -> Option<BindingRef> {
    let mut current = Some(env);
    while let Some(e) = current {
        let bucket = bucket_of(arena, e, name);
        let scope = arena.env(e);
        // Newest binding first: chains grow by prepending.
        for (index, binding) in scope.buckets[bucket].iter().enumerate().rev() {
            if binding.name == name {
                return Some(BindingRef { env: e, bucket, index });
            }
        }
        current = scope.parent;
    }
    None
}

/// Like `lookup`, but when the name is undefined everywhere, create an
/// unset binding in the *local* scope. Bindings are never created in a
/// parent.
pub fn lookup_or_create(arena: &mut Arena, env: EnvId, name: &str) -> BindingRef {
    if let Some(found) = lookup(arena, env, name) {
        return found;
    }
    let bucket = bucket_of(arena, env, name);
    let chain = &mut arena.env_mut(env).buckets[bucket];
    chain.push(Binding {
        name: name.to_string(),
        value: None,
    });
    BindingRef {
        env,
        bucket,
        index: chain.len() - 1,
    }
}

/// Chain a scope to a parent. No allocation.
pub fn chain(arena: &mut Arena, env: EnvId, parent: EnvId) {
    arena.env_mut(env).parent = Some(parent);
}

pub fn binding_value(arena: &Arena, binding: BindingRef) -> Option<CellId> {
    arena.env(binding.env).buckets[binding.bucket][binding.index].value
}

pub fn set_binding(arena: &mut Arena, binding: BindingRef, value: CellId) {
    arena.env_mut(binding.env).buckets[binding.bucket][binding.index].value = Some(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Cell;

    #[test]
    fn lookup_of_undefined_name_is_none() {
        let mut arena = Arena::new();
        let env = arena.alloc_env(0);
        assert_eq!(lookup(&arena, env, "missing"), None);
    }

    #[test]
    fn created_binding_starts_unset() {
        let mut arena = Arena::new();
        let env = arena.alloc_env(0);
        let binding = lookup_or_create(&mut arena, env, "x");
        // Unset, not bound-to-nil: the two must stay distinguishable.
        assert_eq!(binding_value(&arena, binding), None);

        let value = arena.alloc_cell(Cell::Int(42));
        set_binding(&mut arena, binding, value);
        assert_eq!(binding_value(&arena, binding), Some(value));
    }

    #[test]
    fn lookup_resolves_through_parent_chain() {
        let mut arena = Arena::new();
        let parent = arena.alloc_env(0);
        let child = arena.alloc_env(8);
        chain(&mut arena, child, parent);

        let value = arena.alloc_cell(Cell::Int(7));
        let binding = lookup_or_create(&mut arena, parent, "x");
        set_binding(&mut arena, binding, value);

        let found = lookup(&arena, child, "x").expect("resolved via parent");
        assert_eq!(binding_value(&arena, found), Some(value));
    }

    #[test]
    fn nearest_scope_wins() {
        let mut arena = Arena::new();
        let parent = arena.alloc_env(0);
        let child = arena.alloc_env(8);
        chain(&mut arena, child, parent);

        let outer = arena.alloc_cell(Cell::Int(1));
        let inner = arena.alloc_cell(Cell::Int(2));
        let b = lookup_or_create(&mut arena, parent, "x");
        set_binding(&mut arena, b, outer);
        let b = lookup_or_create(&mut arena, child, "x");
        // Existing parent binding is returned; nothing is created locally.
        set_binding(&mut arena, b, inner);

        let found = lookup(&arena, child, "x").unwrap();
        assert_eq!(binding_value(&arena, found), Some(inner));
        let found = lookup(&arena, parent, "x").unwrap();
        assert_eq!(binding_value(&arena, found), Some(inner));
    }

    #[test]
    fn creation_targets_the_local_scope_when_undefined() {
        let mut arena = Arena::new();
        let parent = arena.alloc_env(0);
        let child = arena.alloc_env(8);
        chain(&mut arena, child, parent);

        let value = arena.alloc_cell(Cell::Int(3));
        let b = lookup_or_create(&mut arena, child, "y");
        set_binding(&mut arena, b, value);

        assert!(lookup(&arena, parent, "y").is_none());
        assert!(lookup(&arena, child, "y").is_some());
    }

    #[test]
    fn colliding_names_share_a_bucket() {
        let mut arena = Arena::new();
        // One bucket forces every name into the same chain.
        let env = arena.alloc_env(1);
        for (j, name) in ["a", "b", "c"].iter().enumerate() {
            let value = arena.alloc_cell(Cell::Int(j as i64));
            let b = lookup_or_create(&mut arena, env, name);
            set_binding(&mut arena, b, value);
        }
        for (j, name) in ["a", "b", "c"].iter().enumerate() {
            let found = lookup(&arena, env, name).unwrap();
            let id = binding_value(&arena, found).unwrap();
            assert!(matches!(arena.cell(id), Cell::Int(n) if *n == j as i64));
        }
    }
}
