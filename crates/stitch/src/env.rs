//! Lexically scoped environments.
//!
//! All environments for one evaluation live in a single [`EnvTable`] and are
//! addressed by [`EnvId`]. The parent link is an index, never an owning
//! back-reference, so closures can capture their defining environment as a
//! plain id and ancestor mutation through a child stays a table operation.
//!
//! The table also carries the unbound-node side table: a node value that no
//! binding refers to yet is tracked at the *root* environment under a
//! synthetic `_unbound{N}` name from a deterministic counter, so graph
//! traversal can find it later. Non-root scopes never track unbound nodes;
//! their creations bubble up only when returned.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    node::NodeId,
    value::{PackageValue, Value},
};

/// Identifier of an environment inside an [`EnvTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(u32);

impl EnvId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("environment table overflow"))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Default)]
struct Environment {
    store: IndexMap<String, Value>,
    /// Synthetic name → node id. Populated only on root environments.
    unbound: IndexMap<String, NodeId>,
    /// Populated only on root environments.
    packages: IndexMap<String, Rc<PackageValue>>,
    parent: Option<EnvId>,
}

/// Storage for every environment of one evaluation.
#[derive(Debug)]
pub struct EnvTable {
    envs: Vec<Environment>,
    unbound_counter: u64,
}

impl EnvTable {
    /// Creates the table with the root environment at index 0.
    pub fn new() -> Self {
        Self {
            envs: vec![Environment::default()],
            unbound_counter: 0,
        }
    }

    /// The root environment created with the table.
    pub fn root(&self) -> EnvId {
        EnvId(0)
    }

    /// Allocates a fresh root environment (used for imported packages).
    pub fn new_root(&mut self) -> EnvId {
        let id = EnvId::new(self.envs.len());
        self.envs.push(Environment::default());
        id
    }

    /// Clones an environment: an empty child whose parent is the original.
    /// Mutation of the original stays visible through the clone.
    pub fn clone_env(&mut self, parent: EnvId) -> EnvId {
        let id = EnvId::new(self.envs.len());
        self.envs.push(Environment {
            parent: Some(parent),
            ..Environment::default()
        });
        id
    }

    pub fn is_root(&self, env: EnvId) -> bool {
        self.envs[env.index()].parent.is_none()
    }

    /// The root of the chain `env` belongs to.
    pub fn root_of(&self, env: EnvId) -> EnvId {
        let mut current = env;
        while let Some(parent) = self.envs[current.index()].parent {
            current = parent;
        }
        current
    }

    /// Looks a name up, walking the parent chain. The chain's root also
    /// answers for unbound nodes and packages.
    pub fn get(&self, env: EnvId, name: &str) -> Option<Value> {
        let mut current = env;
        loop {
            let e = &self.envs[current.index()];
            if let Some(value) = e.store.get(name) {
                return Some(value.clone());
            }
            if let Some(id) = e.unbound.get(name) {
                return Some(Value::Node(*id));
            }
            match e.parent {
                Some(parent) => current = parent,
                None => return e.packages.get(name).map(|pkg| Value::Package(Rc::clone(pkg))),
            }
        }
    }

    /// Binds or assigns a name. A name already bound in an ancestor is
    /// mutated there; otherwise the binding is local. Storing a value under
    /// a name removes that value from the unbound set wherever the walk
    /// passed, transferring the node from "unbound" to "named".
    pub fn put(&mut self, env: EnvId, name: &str, value: Value) {
        let target = self.binding_env(env, name).unwrap_or(env);
        self.envs[target.index()]
            .store
            .insert(name.to_owned(), value.clone());

        if let Value::Node(id) = value {
            let mut current = env;
            loop {
                self.envs[current.index()].unbound.retain(|_, v| *v != id);
                if current == target {
                    break;
                }
                match self.envs[current.index()].parent {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }
    }

    /// The nearest environment on the chain whose store already binds `name`.
    fn binding_env(&self, env: EnvId, name: &str) -> Option<EnvId> {
        let mut current = env;
        loop {
            if self.envs[current.index()].store.contains_key(name) {
                return Some(current);
            }
            current = self.envs[current.index()].parent?;
        }
    }

    /// Tracks a node value that is not referenced by any name. Only root
    /// environments track; elsewhere this is a no-op.
    pub fn put_unbound(&mut self, env: EnvId, value: &Value) {
        if let Value::Node(id) = value {
            if self.is_root(env) {
                let name = format!("_unbound{}", self.unbound_counter);
                self.unbound_counter += 1;
                self.envs[env.index()].unbound.insert(name, *id);
            }
        }
    }

    /// The unbound nodes tracked by `env`, in tracking order.
    pub fn unbound_nodes(&self, env: EnvId) -> Vec<(String, NodeId)> {
        self.envs[env.index()]
            .unbound
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect()
    }

    /// The names bound in `env` itself, in binding order.
    pub fn names(&self, env: EnvId) -> Vec<String> {
        self.envs[env.index()].store.keys().cloned().collect()
    }

    /// Registers a package at the root of `env`'s chain. Re-registration
    /// under an existing name is ignored.
    pub fn put_package(&mut self, env: EnvId, pkg: Rc<PackageValue>) {
        let root = self.root_of(env);
        let packages = &mut self.envs[root.index()].packages;
        if !packages.contains_key(&pkg.name) {
            packages.insert(pkg.name.clone(), pkg);
        }
    }

    /// Looks up a package at the root of `env`'s chain.
    pub fn get_package(&self, env: EnvId, name: &str) -> Option<Rc<PackageValue>> {
        let root = self.root_of(env);
        self.envs[root.index()].packages.get(name).map(Rc::clone)
    }
}

impl Default for EnvTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn lookup_walks_the_parent_chain() {
        let mut envs = EnvTable::new();
        let root = envs.root();
        envs.put(root, "x", Value::Integer(1));
        let child = envs.clone_env(root);
        let Some(Value::Integer(v)) = envs.get(child, "x") else {
            panic!("expected x in child scope");
        };
        assert_eq!(v, 1);
    }

    #[test]
    fn put_mutates_the_binding_ancestor() {
        let mut envs = EnvTable::new();
        let root = envs.root();
        envs.put(root, "x", Value::Integer(1));
        let child = envs.clone_env(root);
        envs.put(child, "x", Value::Integer(2));
        let Some(Value::Integer(v)) = envs.get(root, "x") else {
            panic!("expected x at root");
        };
        assert_eq!(v, 2);
        assert!(envs.names(child).is_empty());
    }

    #[test]
    fn put_binds_locally_when_no_ancestor_has_the_name() {
        let mut envs = EnvTable::new();
        let root = envs.root();
        let child = envs.clone_env(root);
        envs.put(child, "y", Value::Integer(3));
        assert!(envs.get(root, "y").is_none());
        assert!(envs.get(child, "y").is_some());
    }

    #[test]
    fn parent_mutation_is_visible_through_a_clone() {
        let mut envs = EnvTable::new();
        let root = envs.root();
        let child = envs.clone_env(root);
        envs.put(root, "z", Value::Bool(true));
        assert!(envs.get(child, "z").is_some());
    }
}
