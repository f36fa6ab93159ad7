//! Lexical scopes, stored in an arena indexed by [`ScopeId`].
//!
//! Each frame holds its bindings and the id of its parent.  Children point
//! at parents, never the reverse, so the scope chain is a tree and closures
//! need no reference counting: a function value just records the id of its
//! defining frame.  Popping a frame frees its slot for reuse unless a
//! closure captured it (or one of its descendants); captured frames live
//! until the arena is dropped.

use indexmap::IndexMap;

use super::value::Value;

pub type ScopeId = usize;

/// The root scope: built-ins, machine constants, and top-level bindings.
pub const ROOT: ScopeId = 0;

#[derive(Debug, Default)]
struct Frame {
    bindings: IndexMap<String, Value>,
    parent: Option<ScopeId>,
    captured: bool,
}

#[derive(Debug)]
pub struct Scopes {
    frames: Vec<Option<Frame>>,
    free: Vec<ScopeId>,
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Scopes {
            frames: vec![Some(Frame::default())],
            free: Vec::new(),
        }
    }

    fn frame(&self, id: ScopeId) -> Option<&Frame> {
        self.frames.get(id).and_then(Option::as_ref)
    }

    fn frame_mut(&mut self, id: ScopeId) -> Option<&mut Frame> {
        self.frames.get_mut(id).and_then(Option::as_mut)
    }

    /// Create a child of `parent`.
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let frame = Frame {
            parent: Some(parent),
            ..Frame::default()
        };
        match self.free.pop() {
            Some(id) => {
                self.frames[id] = Some(frame);
                id
            }
            None => {
                self.frames.push(Some(frame));
                self.frames.len() - 1
            }
        }
    }

    /// Destroy `id`, releasing its bindings, unless a closure captured it.
    pub fn pop(&mut self, id: ScopeId) {
        if id == ROOT {
            return;
        }
        if let Some(frame) = self.frames.get_mut(id) {
            if frame.as_ref().is_some_and(|f| !f.captured) {
                *frame = None;
                self.free.push(id);
            }
        }
    }

    /// Keep `id` and all of its ancestors alive for a closure.
    pub fn capture(&mut self, id: ScopeId) {
        let mut cur = Some(id);
        while let Some(i) = cur {
            let Some(frame) = self.frame_mut(i) else { return };
            if frame.captured {
                return;
            }
            frame.captured = true;
            cur = frame.parent;
        }
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.frame(id)?.parent
    }

    /// Look `name` up along the parent chain.
    pub fn resolve(&self, id: ScopeId, name: &str) -> Option<&Value> {
        let mut cur = Some(id);
        while let Some(i) = cur {
            let frame = self.frame(i)?;
            if let Some(v) = frame.bindings.get(name) {
                return Some(v);
            }
            cur = frame.parent;
        }
        None
    }

    /// Mutable access to the nearest binding of `name`.
    pub fn resolve_mut(&mut self, id: ScopeId, name: &str) -> Option<&mut Value> {
        let owner = self.owner(id, name)?;
        self.frame_mut(owner)?.bindings.get_mut(name)
    }

    /// The scope on the chain from `id` that binds `name`.
    fn owner(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        let mut cur = Some(id);
        while let Some(i) = cur {
            let frame = self.frame(i)?;
            if frame.bindings.contains_key(name) {
                return Some(i);
            }
            cur = frame.parent;
        }
        None
    }

    /// Bind `name` in `id` itself, overwriting any existing binding there.
    pub fn define(&mut self, id: ScopeId, name: &str, value: Value) {
        if let Some(frame) = self.frame_mut(id) {
            frame.bindings.insert(name.to_owned(), value);
        }
    }

    /// Rebind the nearest existing `name`; define it in `id` if none exists.
    pub fn assign(&mut self, id: ScopeId, name: &str, value: Value) {
        let owner = self.owner(id, name).unwrap_or(id);
        self.define(owner, name, value);
    }

    /// Bindings made directly in `id`, in definition order.
    pub fn bindings(&self, id: ScopeId) -> impl Iterator<Item = (&String, &Value)> {
        self.frame(id).into_iter().flat_map(|f| f.bindings.iter())
    }

    /// Number of live frames (for tests and diagnostics).
    pub fn live(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_walks_parents_and_shadows() {
        let mut s = Scopes::new();
        s.define(ROOT, "x", Value::Int(1));
        let child = s.push(ROOT);
        assert_eq!(s.resolve(child, "x"), Some(&Value::Int(1)));
        s.define(child, "x", Value::Int(2));
        assert_eq!(s.resolve(child, "x"), Some(&Value::Int(2)));
        assert_eq!(s.resolve(ROOT, "x"), Some(&Value::Int(1)));
        assert!(s.resolve(child, "y").is_none());
    }

    #[test]
    fn assign_updates_existing_binding_in_outer_scope() {
        let mut s = Scopes::new();
        s.define(ROOT, "i", Value::Int(0));
        let child = s.push(ROOT);
        s.assign(child, "i", Value::Int(5));
        s.assign(child, "fresh", Value::Int(1));
        assert_eq!(s.resolve(ROOT, "i"), Some(&Value::Int(5)));
        assert!(s.resolve(ROOT, "fresh").is_none());
        assert_eq!(s.resolve(child, "fresh"), Some(&Value::Int(1)));
    }

    #[test]
    fn pop_frees_slots_for_reuse() {
        let mut s = Scopes::new();
        let a = s.push(ROOT);
        s.define(a, "tmp", Value::Int(1));
        s.pop(a);
        assert_eq!(s.live(), 1);
        let b = s.push(ROOT);
        assert_eq!(a, b);
        assert!(s.resolve(b, "tmp").is_none());
    }

    #[test]
    fn captured_frames_survive_pop() {
        let mut s = Scopes::new();
        let outer = s.push(ROOT);
        let inner = s.push(outer);
        s.define(outer, "n", Value::Int(3));
        s.capture(inner);
        s.pop(inner);
        s.pop(outer);
        assert_eq!(s.live(), 3);
        assert_eq!(s.resolve(inner, "n"), Some(&Value::Int(3)));
    }

    #[test]
    fn root_is_never_popped() {
        let mut s = Scopes::new();
        s.define(ROOT, "a", Value::None);
        s.pop(ROOT);
        assert!(s.resolve(ROOT, "a").is_some());
    }
}
