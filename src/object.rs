//! Live object instances and class-hierarchy resolution.

use crate::unit::{Constant, Function, Unit};
use crate::value::{ObjectRef, UnitRef, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// A live instance of a user-defined class.
///
/// `unit` is the defining (most-derived) class; `bases` is the fully
/// resolved, depth-first, first-occurrence-flattened ancestor chain
/// (diamond bases collapse to their first declaration order occurrence).
/// `next`/`prev` form this object's link in its class's Registry list —
/// `next` is a strong reference (the chain keeps every member alive from
/// head to tail) and `prev` is a `Weak` to avoid a reference cycle, the
/// classic doubly-linked-list-over-`Rc` pattern.
pub struct Object {
    pub unit: UnitRef,
    pub bases: Vec<UnitRef>,
    pub fields: HashMap<String, Value>,
    /// Set for opaque external-collaborator instances (file/socket/timer/
    /// screen handles); when present, field and method access forward to
    /// the host's `SpecialTypeDispatcher` instead of `fields`.
    pub special_tag: Option<String>,
    pub(crate) class_key: String,
    pub(crate) next: Option<ObjectRef>,
    pub(crate) prev: Option<Weak<RefCell<Object>>>,
}

impl Object {
    /// Construct a new instance of `unit`, resolving its base-class chain
    /// from `unit_table`, and seed fields from declared variable defaults.
    pub fn new(unit: UnitRef, unit_table: &HashMap<String, UnitRef>) -> ObjectRef {
        let bases = resolve_bases(&unit, unit_table);
        let mut fields = HashMap::new();
        for base in std::iter::once(&unit).chain(bases.iter()).rev() {
            for var in base.variables.values() {
                fields
                    .entry(var.name.to_ascii_lowercase())
                    .or_insert_with(|| var.default.clone());
            }
        }
        let class_key = unit.class_name.to_ascii_lowercase();
        Rc::new(RefCell::new(Object {
            unit,
            bases,
            fields,
            special_tag: None,
            class_key,
            next: None,
            prev: None,
        }))
    }

    pub fn new_special(tag: impl Into<String>, unit: UnitRef) -> ObjectRef {
        let class_key = unit.class_name.to_ascii_lowercase();
        Rc::new(RefCell::new(Object {
            unit,
            bases: Vec::new(),
            fields: HashMap::new(),
            special_tag: Some(tag.into()),
            class_key,
            next: None,
            prev: None,
        }))
    }

    pub fn class_name(&self) -> &str {
        &self.unit.class_name
    }

    /// `InstanceOf`: exact class or any resolved base matches, case
    /// insensitively.
    pub fn is_instance_of(&self, class_name: &str) -> bool {
        self.unit.class_name.eq_ignore_ascii_case(class_name)
            || self
                .bases
                .iter()
                .any(|b| b.class_name.eq_ignore_ascii_case(class_name))
    }

    /// Walk `unit` then each resolved base, most-derived first, looking
    /// for a method of `name`. Returns the *defining* unit (whose string
    /// pool the bytecode must be read against) and the function.
    pub fn find_method(&self, name: &str) -> Option<(UnitRef, Function)> {
        for u in std::iter::once(&self.unit).chain(self.bases.iter()) {
            if let Some(f) = u.find_function(name) {
                return Some((u.clone(), f.clone()));
            }
        }
        None
    }

    /// Same walk, for expression constants (callable-under-dispatch) or
    /// plain constants.
    pub fn find_constant(&self, name: &str) -> Option<(UnitRef, Constant)> {
        for u in std::iter::once(&self.unit).chain(self.bases.iter()) {
            if let Some(c) = u.find_constant(name) {
                return Some((u.clone(), c.clone()));
            }
        }
        None
    }

    /// Field-type lookup (for narrow-integer clamping), same hierarchy
    /// walk as methods/constants.
    pub fn find_variable_type(&self, name: &str) -> Option<crate::unit::FieldType> {
        for u in std::iter::once(&self.unit).chain(self.bases.iter()) {
            if let Some(v) = u.find_variable(name) {
                return Some(v.ty);
            }
        }
        None
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(&name.to_ascii_lowercase())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_ascii_lowercase(), value);
    }

    /// `objantes`/`objdepois`: the object's neighbors in its class's
    /// Registry list, or `None` at either end.
    pub fn next_in_class(&self) -> Option<ObjectRef> {
        self.next.clone()
    }

    pub fn prev_in_class(&self) -> Option<ObjectRef> {
        self.prev.as_ref().and_then(Weak::upgrade)
    }
}

/// Depth-first, declaration-order resolution of `unit`'s ancestor chain,
/// flattening diamonds by first occurrence. Does not include `unit`
/// itself. Missing base names are silently skipped (an external compiler
/// is assumed to have already validated them; this core only executes).
pub fn resolve_bases(unit: &UnitRef, unit_table: &HashMap<String, UnitRef>) -> Vec<UnitRef> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(unit.class_name.to_ascii_lowercase());
    let mut out = Vec::new();
    for base_name in &unit.base_names {
        collect_bases(base_name, unit_table, &mut seen, &mut out);
    }
    out
}

fn collect_bases(
    name: &str,
    unit_table: &HashMap<String, UnitRef>,
    seen: &mut HashSet<String>,
    out: &mut Vec<UnitRef>,
) {
    let key = name.to_ascii_lowercase();
    if seen.contains(&key) {
        return;
    }
    let Some(base_unit) = unit_table.get(&key) else {
        return;
    };
    seen.insert(key);
    out.push(base_unit.clone());
    for grandparent in &base_unit.base_names {
        collect_bases(grandparent, unit_table, seen, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitBuilder;

    fn unit_table(units: Vec<Unit>) -> HashMap<String, UnitRef> {
        units
            .into_iter()
            .map(|u| (u.class_name.to_ascii_lowercase(), Rc::new(u)))
            .collect()
    }

    #[test]
    fn inheritance_dispatch_prefers_most_derived() {
        let a = UnitBuilder::new("A")
            .function(
                "greet",
                Function {
                    bytecode: vec![],
                    argc: 0,
                },
            )
            .build();
        let b = UnitBuilder::new("B")
            .base("A")
            .function(
                "greet",
                Function {
                    bytecode: vec![1],
                    argc: 0,
                },
            )
            .build();
        let table = unit_table(vec![a, b]);
        let b_unit = table.get("b").unwrap().clone();
        let obj = Object::new(b_unit, &table);
        let (defining, f) = obj.borrow().find_method("greet").unwrap();
        assert_eq!(defining.class_name, "B");
        assert_eq!(f.bytecode, vec![1]);
    }

    #[test]
    fn inheritance_falls_back_to_base_when_not_overridden() {
        let a = UnitBuilder::new("A")
            .function(
                "greet",
                Function {
                    bytecode: vec![9],
                    argc: 0,
                },
            )
            .build();
        let b = UnitBuilder::new("B").base("A").build();
        let table = unit_table(vec![a, b]);
        let b_unit = table.get("b").unwrap().clone();
        let obj = Object::new(b_unit, &table);
        let (defining, f) = obj.borrow().find_method("greet").unwrap();
        assert_eq!(defining.class_name, "A");
        assert_eq!(f.bytecode, vec![9]);
    }

    #[test]
    fn diamond_bases_flatten_by_first_occurrence() {
        let root = UnitBuilder::new("Root").build();
        let left = UnitBuilder::new("Left").base("Root").build();
        let right = UnitBuilder::new("Right").base("Root").build();
        let child = UnitBuilder::new("Child").base("Left").base("Right").build();
        let table = unit_table(vec![root, left, right, child]);
        let child_unit = table.get("child").unwrap().clone();
        let bases = resolve_bases(&child_unit, &table);
        let names: Vec<_> = bases.iter().map(|u| u.class_name.clone()).collect();
        assert_eq!(names, vec!["Left", "Root", "Right"]);
    }

    #[test]
    fn instance_of_checks_case_insensitively() {
        let a = UnitBuilder::new("Animal").build();
        let table = unit_table(vec![a]);
        let unit = table.get("animal").unwrap().clone();
        let obj = Object::new(unit, &table);
        assert!(obj.borrow().is_instance_of("ANIMAL"));
        assert!(!obj.borrow().is_instance_of("Plant"));
    }
}
