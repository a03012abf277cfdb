//! Extension point for opaque "special type" collaborator objects.
//!
//! The interpreter core knows nothing about files, sockets, timers or any
//! other outside-world resource; a host embeds that behavior by
//! implementing [`SpecialTypeDispatcher`] and registering it under a type
//! tag via [`SpecialTypeRegistry::register`]. `InitSpecialType` creates an
//! [`crate::object::Object`] carrying that tag (`Object::new_special`);
//! `LoadField`/`StoreField`/`CallMethod` on such an object forward to the
//! dispatcher instead of touching `fields` directly.

use crate::fault::Fault;
use crate::value::Value;
use std::collections::HashMap;

/// Host-implemented behavior for one special type tag.
///
/// All three hooks receive the tag so a single dispatcher may back more
/// than one type name.
pub trait SpecialTypeDispatcher {
    fn call_method(&mut self, tag: &str, method: &str, args: &[Value]) -> Result<Value, Fault>;

    fn get_property(&mut self, tag: &str, name: &str) -> Result<Value, Fault>;

    fn set_property(&mut self, tag: &str, name: &str, value: Value) -> Result<(), Fault>;
}

/// Per-VM table of registered special types, keyed by tag name
/// (case-insensitive, matching class name lookup elsewhere).
#[derive(Default)]
pub struct SpecialTypeRegistry {
    dispatchers: HashMap<String, Box<dyn SpecialTypeDispatcher>>,
}

impl SpecialTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: impl Into<String>, dispatcher: Box<dyn SpecialTypeDispatcher>) {
        self.dispatchers.insert(tag.into().to_ascii_lowercase(), dispatcher);
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.dispatchers.contains_key(&tag.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, tag: &str) -> Option<&mut Box<dyn SpecialTypeDispatcher>> {
        self.dispatchers.get_mut(&tag.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoDispatcher;

    impl SpecialTypeDispatcher for EchoDispatcher {
        fn call_method(&mut self, _tag: &str, method: &str, _args: &[Value]) -> Result<Value, Fault> {
            Ok(Value::string(method))
        }
        fn get_property(&mut self, _tag: &str, name: &str) -> Result<Value, Fault> {
            Ok(Value::string(name))
        }
        fn set_property(&mut self, _tag: &str, _name: &str, _value: Value) -> Result<(), Fault> {
            Ok(())
        }
    }

    #[test]
    fn dispatch_routes_by_registered_tag() {
        let mut registry = SpecialTypeRegistry::new();
        registry.register("Arquivo", Box::new(EchoDispatcher));
        assert!(registry.is_registered("arquivo"));
        let dispatcher = registry.get_mut("ARQUIVO").unwrap();
        let result = dispatcher.call_method("arquivo", "ler", &[]).unwrap();
        assert_eq!(result.as_string(), "ler");
    }

    #[test]
    fn unregistered_tag_returns_none() {
        let mut registry = SpecialTypeRegistry::new();
        assert!(registry.get_mut("nada").is_none());
    }
}
