//! Mapping between remote class names and local type ids
//!
//! The broker names typed objects by their server side class, for example
//! `remoting.amfclient.ServerCustomType`. Registering an alias lets decoded objects carry a
//! local type id instead, and maps the local id back to the remote name when sending.
use crate::types::{ClassDefinition, Element, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;

#[derive(Debug, Default)]
struct Aliases {
    remote_to_local: HashMap<String, String>,
    local_to_remote: HashMap<String, String>,
}

/// A two way table of remote class names and local type ids
#[derive(Debug, Default)]
pub struct TypeAliasRegistry {
    aliases: RwLock<Aliases>,
}

static GLOBAL: LazyLock<TypeAliasRegistry> = LazyLock::new(TypeAliasRegistry::default);

impl TypeAliasRegistry {
    /// The process wide registry
    pub fn global() -> &'static TypeAliasRegistry {
        &GLOBAL
    }

    /// Map `remote` to `local` and back, replacing earlier mappings of either name
    pub fn register(&self, remote: impl Into<String>, local: impl Into<String>) {
        let (remote, local) = (remote.into(), local.into());
        let mut aliases = self.aliases.write();
        if let Some(old_local) = aliases.remote_to_local.remove(&remote) {
            aliases.local_to_remote.remove(&old_local);
        }
        if let Some(old_remote) = aliases.local_to_remote.remove(&local) {
            aliases.remote_to_local.remove(&old_remote);
        }
        aliases.remote_to_local.insert(remote.clone(), local.clone());
        aliases.local_to_remote.insert(local, remote);
    }

    /// Remove the mapping of a remote class name, returns whether one existed
    pub fn unregister(&self, remote: &str) -> bool {
        let mut aliases = self.aliases.write();
        match aliases.remote_to_local.remove(remote) {
            Some(local) => {
                aliases.local_to_remote.remove(&local);
                true
            }
            None => false,
        }
    }

    /// The local type id registered for a remote class name
    pub fn resolve(&self, remote: &str) -> Option<String> {
        self.aliases.read().remote_to_local.get(remote).cloned()
    }

    /// The remote class name registered for a local type id
    pub fn resolve_remote(&self, local: &str) -> Option<String> {
        self.aliases.read().local_to_remote.get(local).cloned()
    }
}

/// Register an alias in the process wide registry
pub fn register_alias(remote: impl Into<String>, local: impl Into<String>) {
    TypeAliasRegistry::global().register(remote, local);
}

fn rename_def(def: &ClassDefinition, lookup: &dyn Fn(&str) -> Option<String>) -> ClassDefinition {
    if def.is_anonymous() {
        return def.clone();
    }
    match lookup(&def.name) {
        Some(name) => def.renamed(name),
        None => def.clone(),
    }
}

fn rename_elements(elements: &[Element], lookup: &dyn Fn(&str) -> Option<String>) -> Vec<Element> {
    elements
        .iter()
        .map(|e| Element {
            name: e.name.clone(),
            value: rename_classes(&e.value, lookup),
        })
        .collect()
}

fn rename_values(values: &[Rc<Value>], lookup: &dyn Fn(&str) -> Option<String>) -> Vec<Rc<Value>> {
    values.iter().map(|v| rename_classes(v, lookup)).collect()
}

/// Rebuild `value` with every class name that `lookup` knows replaced
fn rename_classes(value: &Rc<Value>, lookup: &dyn Fn(&str) -> Option<String>) -> Rc<Value> {
    let renamed = match value.as_ref() {
        Value::Object(elements, def) => Value::Object(
            rename_elements(elements, lookup),
            def.as_ref().map(|d| rename_def(d, lookup)),
        ),
        Value::Custom(custom, elements, def) => Value::Custom(
            rename_elements(custom, lookup),
            rename_elements(elements, lookup),
            def.clone(),
        ),
        Value::ECMAArray(dense, elements, length) => Value::ECMAArray(
            rename_values(dense, lookup),
            rename_elements(elements, lookup),
            *length,
        ),
        Value::StrictArray(values) => Value::StrictArray(rename_values(values, lookup)),
        Value::VectorObject(values, type_name, fixed) => Value::VectorObject(
            rename_values(values, lookup),
            lookup(type_name).unwrap_or_else(|| type_name.clone()),
            *fixed,
        ),
        Value::Dictionary(pairs, weak_keys) => Value::Dictionary(
            pairs
                .iter()
                .map(|(k, v)| (rename_classes(k, lookup), rename_classes(v, lookup)))
                .collect(),
            *weak_keys,
        ),
        Value::AMF3(inner) => Value::AMF3(rename_classes(inner, lookup)),
        _ => return Rc::clone(value),
    };
    Rc::new(renamed)
}

/// Replace remote class names that have an alias with their local type id
///
/// Externalized values keep their class, their decoder is chosen by it.
pub fn materialize(value: &Rc<Value>, registry: &TypeAliasRegistry) -> Rc<Value> {
    rename_classes(value, &|name| registry.resolve(name))
}

/// Replace local type ids that have an alias with their remote class name
pub fn to_remote(value: &Rc<Value>, registry: &TypeAliasRegistry) -> Rc<Value> {
    rename_classes(value, &|name| registry.resolve_remote(name))
}

#[cfg(test)]
mod tests {
    use super::{TypeAliasRegistry, materialize, to_remote};
    use crate::types::{Element, Value};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    #[test]
    fn lookups_go_both_ways() {
        let registry = TypeAliasRegistry::default();
        registry.register("remote.Type", "LocalType");
        assert_eq!(registry.resolve("remote.Type").as_deref(), Some("LocalType"));
        assert_eq!(registry.resolve_remote("LocalType").as_deref(), Some("remote.Type"));
        assert_eq!(registry.resolve("LocalType"), None);
    }

    #[test]
    fn re_registering_replaces_both_directions() {
        let registry = TypeAliasRegistry::default();
        registry.register("remote.Type", "A");
        registry.register("remote.Type", "B");
        assert_eq!(registry.resolve_remote("A"), None);
        assert_eq!(registry.resolve("remote.Type").as_deref(), Some("B"));

        assert!(registry.unregister("remote.Type"));
        assert!(!registry.unregister("remote.Type"));
        assert_eq!(registry.resolve_remote("B"), None);
    }

    #[test]
    fn nested_objects_are_renamed() {
        let registry = TypeAliasRegistry::default();
        registry.register("remote.Inner", "Inner");

        let remote = Rc::new(Value::AMF3(Rc::new(Value::array([Value::object(vec![
            Element::new("inner", Value::typed_object("remote.Inner", vec![])),
            Element::new("other", Value::typed_object("remote.Other", vec![])),
        ])]))));

        let local = materialize(&remote, &registry);
        let Value::AMF3(array) = local.as_ref() else {
            panic!("switch removed: {local:?}");
        };
        let Value::StrictArray(items) = array.as_ref() else {
            panic!("not an array: {array:?}");
        };
        assert_eq!(items[0].get("inner").and_then(|v| v.class_name()), Some("Inner"));
        assert_eq!(
            items[0].get("other").and_then(|v| v.class_name()),
            Some("remote.Other")
        );

        assert_eq!(to_remote(&local, &registry), remote);
    }

    #[test]
    fn values_without_classes_are_shared() {
        let registry = TypeAliasRegistry::default();
        let value = Rc::new(Value::from("text"));
        assert!(Rc::ptr_eq(&materialize(&value, &registry), &value));
    }
}
