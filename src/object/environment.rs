use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::Object;

/// Identifier bindings for one scope, chained to the scope it was created in.
#[derive(Default)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed_environment(outer: Rc<RefCell<Environment>>) -> Self {
        Self {
            store: HashMap::new(),
            outer: Some(outer),
        }
    }

    pub fn get(&self, key: &str) -> Option<Object> {
        match self.store.get(key) {
            Some(obj) => Some(obj.clone()),
            None => self.outer.as_ref()?.borrow().get(key),
        }
    }

    pub fn set(&mut self, key: String, val: Object) -> Object {
        self.store.insert(key, val.clone());
        val
    }

    /// Drops this scope's own bindings; outer scopes are untouched.
    pub fn clear(&mut self) {
        self.store.clear();
    }
}

// Bound closures point back at this environment, so only names are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.store.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("enclosed", &self.outer.is_some())
            .finish()
    }
}
