//! Call resolution: unqualified `Call`, static-qualified `classname:fn`, and
//! `$classname` (`LoadClass`).

use crate::registry::Registry;
use crate::unit::{Constant, Function};
use crate::value::{ObjectRef, UnitRef, Value};
use std::collections::HashMap;

/// What an unqualified `Call` resolved to, per the six-step order: bound
/// method, expression constant (bound to the this-object or none), plain
/// function, expression constant on the current unit, or a builtin name
/// (caller pushes `Value::Null` if that also misses).
pub enum CallTarget {
    Method {
        unit: UnitRef,
        function: Function,
        this: ObjectRef,
    },
    ExpressionConstant {
        unit: UnitRef,
        bytecode: Vec<u8>,
        this: Option<ObjectRef>,
    },
    Function {
        unit: UnitRef,
        function: Function,
    },
    Builtin(String),
}

pub fn resolve_unqualified_call(name: &str, this: Option<&ObjectRef>, current_unit: &UnitRef) -> CallTarget {
    if let Some(this_obj) = this {
        if let Some((unit, function)) = this_obj.borrow().find_method(name) {
            return CallTarget::Method {
                unit,
                function,
                this: this_obj.clone(),
            };
        }
        if let Some((unit, Constant::Expression(bytecode))) = this_obj.borrow().find_constant(name) {
            return CallTarget::ExpressionConstant {
                unit,
                bytecode,
                this: Some(this_obj.clone()),
            };
        }
    }
    if let Some(function) = current_unit.find_function(name) {
        return CallTarget::Function {
            unit: current_unit.clone(),
            function: function.clone(),
        };
    }
    if let Some(Constant::Expression(bytecode)) = current_unit.find_constant(name) {
        return CallTarget::ExpressionConstant {
            unit: current_unit.clone(),
            bytecode: bytecode.clone(),
            this: this.cloned(),
        };
    }
    CallTarget::Builtin(name.to_string())
}

/// `$classname` / `LoadClass`: the first registered instance, or else a
/// `ClassReference` to its Unit.
pub fn load_class(name: &str, registry: &Registry, unit_table: &HashMap<String, UnitRef>) -> Value {
    if let Some(obj) = registry.get_first_object(name) {
        return Value::Object(obj);
    }
    match unit_table.get(&name.to_ascii_lowercase()) {
        Some(unit) => Value::ClassReference(unit.clone()),
        None => Value::Null,
    }
}

/// Resolve the named class's Unit for a static-qualified call or
/// `classname:member` access, preferring a live instance's defining unit
/// (matching `LoadClass`'s preference) and falling back to the unit table.
pub fn resolve_static_unit(name: &str, registry: &Registry, unit_table: &HashMap<String, UnitRef>) -> Option<UnitRef> {
    if let Some(obj) = registry.get_first_object(name) {
        return Some(obj.borrow().unit.clone());
    }
    unit_table.get(&name.to_ascii_lowercase()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use crate::unit::UnitBuilder;
    use std::rc::Rc;

    #[test]
    fn unqualified_call_prefers_bound_method_over_current_unit_function() {
        let a = UnitBuilder::new("A")
            .function(
                "greet",
                Function {
                    bytecode: vec![1],
                    argc: 0,
                },
            )
            .build();
        let a = Rc::new(a);
        let caller = Rc::new(UnitBuilder::new("Caller").function("greet", Function { bytecode: vec![2], argc: 0 }).build());
        let table: HashMap<String, UnitRef> = HashMap::new();
        let obj = Object::new(a, &table);
        match resolve_unqualified_call("greet", Some(&obj), &caller) {
            CallTarget::Method { function, .. } => assert_eq!(function.bytecode, vec![1]),
            _ => panic!("expected method target"),
        }
    }

    #[test]
    fn unqualified_call_falls_back_to_current_unit_function_without_this() {
        let caller = Rc::new(
            UnitBuilder::new("Caller")
                .function("greet", Function { bytecode: vec![2], argc: 0 })
                .build(),
        );
        match resolve_unqualified_call("greet", None, &caller) {
            CallTarget::Function { function, .. } => assert_eq!(function.bytecode, vec![2]),
            _ => panic!("expected function target"),
        }
    }

    #[test]
    fn unqualified_call_falls_back_to_builtin_name() {
        let caller = Rc::new(UnitBuilder::new("Caller").build());
        match resolve_unqualified_call("txtlen", None, &caller) {
            CallTarget::Builtin(name) => assert_eq!(name, "txtlen"),
            _ => panic!("expected builtin target"),
        }
    }

    #[test]
    fn load_class_falls_back_to_class_reference_when_no_instance_exists() {
        let unit = Rc::new(UnitBuilder::new("Bicho").build());
        let mut table: HashMap<String, UnitRef> = HashMap::new();
        table.insert("bicho".to_string(), unit);
        let registry = Registry::new();
        let v = load_class("Bicho", &registry, &table);
        assert!(matches!(v, Value::ClassReference(_)));
    }
}
