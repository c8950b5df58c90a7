use std::{cell::RefCell, collections::HashMap, fmt::Debug, rc::Rc};

use log::debug;

use crate::{
    error::{runtime_error, ErrorMsg, Exception},
    stdlib,
    types::Value,
};

#[derive(Default)]
pub struct Env {
    values: HashMap<String, Value>,
    pub parent: Option<Rc<RefCell<Env>>>,
}

// Function values point back at their defining env, so only list the names
impl Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Env")
            .field("values", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Env {
    /// The prelude env holding the builtins. Programs run in a child of it.
    pub fn prelude() -> Rc<RefCell<Self>> {
        let mut env = Self::default();
        stdlib::init(&mut env);
        Rc::new(RefCell::new(env))
    }

    pub fn with_parent(parent: Rc<RefCell<Env>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            ..Default::default()
        }))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        debug!("Set {name} -> {value:?}");
        self.values.insert(name.to_string(), value);
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    pub fn get_at_depth(&self, name: &str, depth: usize) -> Result<Value, Exception> {
        debug!("Get {name} at depth {depth}");
        if depth == 0 {
            return self
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| runtime_error(ErrorMsg::MisresolvedVar, name));
        }
        match &self.parent {
            Some(parent) => parent.borrow().get_at_depth(name, depth - 1),
            None => Err(runtime_error(ErrorMsg::MisresolvedVar, name)),
        }
    }

    pub fn assign_at_depth(
        &mut self,
        name: &str,
        value: Value,
        depth: usize,
    ) -> Result<(), Exception> {
        debug!("Assign {name} -> {value:?} at depth {depth}");
        if depth == 0 {
            return match self.values.get_mut(name) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(runtime_error(ErrorMsg::MisresolvedVar, name)),
            };
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().assign_at_depth(name, value, depth - 1),
            None => Err(runtime_error(ErrorMsg::MisresolvedVar, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depths_walk_the_parent_chain() {
        let global = Env::with_parent(Env::prelude());
        global.borrow_mut().set("x", Value::Number(1.0));
        let inner = Env::with_parent(Rc::clone(&global));
        inner.borrow_mut().set("x", Value::Number(2.0));

        let env = inner.borrow();
        assert!(env.get_at_depth("x", 0).unwrap().is_eq(&Value::Number(2.0)));
        assert!(env.get_at_depth("x", 1).unwrap().is_eq(&Value::Number(1.0)));
        assert!(matches!(
            env.get_at_depth("print", 2).unwrap(),
            Value::NativeFunc(_)
        ));
        assert!(env.get_at_depth("x", 2).is_err());
        assert!(env.get_at_depth("x", 5).is_err());
    }

    #[test]
    fn assign_updates_the_right_env() {
        let global = Env::with_parent(Env::prelude());
        global.borrow_mut().set("x", Value::Number(1.0));
        let inner = Env::with_parent(Rc::clone(&global));
        inner
            .borrow_mut()
            .assign_at_depth("x", Value::Number(3.0), 1)
            .unwrap();
        assert!(global
            .borrow()
            .get_at_depth("x", 0)
            .unwrap()
            .is_eq(&Value::Number(3.0)));
        // Assigning never declares
        assert!(inner
            .borrow_mut()
            .assign_at_depth("y", Value::Null, 0)
            .is_err());
    }
}
