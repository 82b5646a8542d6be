use std::collections::HashMap;

/// The bindings visible to evaluated code.
///
/// Globals belong to the caller and are only ever read. Every write lands in
/// the locals, which live as long as one top-level copy and are shared by all
/// re-entrant body copies, so a loop variable bound by one clause is visible
/// to the next.
#[derive(Debug)]
pub struct Namespace<'g, V> {
    globals: &'g HashMap<String, V>,
    locals: HashMap<String, V>,
}

impl<'g, V: Clone> Namespace<'g, V> {
    pub fn new(globals: &'g HashMap<String, V>) -> Self {
        Namespace {
            globals,
            locals: HashMap::new(),
        }
    }

    /// Look up a name, locals first.
    pub fn get(&self, name: &str) -> Option<&V> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: V) {
        self.locals.insert(name.into(), value);
    }

    /// Mutable access to a binding. A global is first copied into the
    /// locals, so in-place updates never reach the caller's map.
    pub fn local_mut(&mut self, name: &str) -> Option<&mut V> {
        if !self.locals.contains_key(name) {
            let global = self.globals.get(name)?.clone();
            self.locals.insert(name.to_string(), global);
        }
        self.locals.get_mut(name)
    }

    pub fn into_locals(self) -> HashMap<String, V> {
        self.locals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locals_shadow_globals() {
        let globals = HashMap::from([("x".to_string(), 1)]);
        let mut ns = Namespace::new(&globals);
        assert_eq!(ns.get("x"), Some(&1));
        ns.set("x", 2);
        assert_eq!(ns.get("x"), Some(&2));
        assert_eq!(globals["x"], 1);
    }

    #[test]
    fn local_mut_copies_globals_on_write() {
        let globals = HashMap::from([("items".to_string(), vec![1, 2])]);
        let mut ns = Namespace::new(&globals);
        ns.local_mut("items").unwrap().push(3);
        assert_eq!(ns.get("items"), Some(&vec![1, 2, 3]));
        assert_eq!(globals["items"], vec![1, 2]);
        assert!(ns.local_mut("missing").is_none());
    }
}
