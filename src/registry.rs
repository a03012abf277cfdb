//! Per-class object registry, owned by a single `VM`.
//!
//! Exposes the `$classname` primitive (`GetFirstObject`) and the
//! `objantes`/`objdepois` walk. Object handles are `Rc`/`Weak`, so the
//! registry is `!Send`/`!Sync` and cannot be shared across threads or
//! parked in a `'static`; each `VM` owns one, per the concurrency model in
//! SPEC_FULL.md §5 (single-process, cooperative, one `Registry` per `VM`).
//! The internal `Mutex` guards against re-entrant access from within a
//! single thread (e.g. a special-type dispatcher calling back into the
//! registry while a borrow is outstanding), not cross-thread sharing.
//! Iteration returns a cloned snapshot so mutation during iteration can't
//! invalidate it.

use crate::object::Object;
use crate::value::ObjectRef;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Mutex;

struct ClassList {
    head: Option<ObjectRef>,
    tail: Option<Weak<std::cell::RefCell<Object>>>,
}

pub struct Registry {
    classes: Mutex<HashMap<String, ClassList>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            classes: Mutex::new(HashMap::new()),
        }
    }

    /// Append `obj` to the tail of its class's list.
    pub fn register(&self, obj: &ObjectRef) {
        let class_key = obj.borrow().class_key.clone();
        let mut map = self.classes.lock().unwrap();
        let list = map
            .entry(class_key)
            .or_insert_with(|| ClassList { head: None, tail: None });

        match list.tail.take() {
            None => {
                list.head = Some(obj.clone());
                list.tail = Some(Rc::downgrade(obj));
            }
            Some(tail_weak) => {
                if let Some(tail) = tail_weak.upgrade() {
                    tail.borrow_mut().next = Some(obj.clone());
                    obj.borrow_mut().prev = Some(Rc::downgrade(&tail));
                    list.tail = Some(Rc::downgrade(obj));
                } else {
                    // Tail was dropped without going through unregister;
                    // treat as an empty list rather than panic.
                    list.head = Some(obj.clone());
                    list.tail = Some(Rc::downgrade(obj));
                }
            }
        }
    }

    /// Remove `obj` from its class's list, repairing neighbor links first.
    pub fn unregister(&self, obj: &ObjectRef) {
        let class_key = obj.borrow().class_key.clone();
        let mut map = self.classes.lock().unwrap();
        let Some(list) = map.get_mut(&class_key) else {
            return;
        };

        let prev = obj.borrow_mut().prev.take();
        let next = obj.borrow_mut().next.take();

        match (prev.as_ref().and_then(Weak::upgrade), next.clone()) {
            (None, None) => {
                list.head = None;
                list.tail = None;
            }
            (None, Some(next_strong)) => {
                next_strong.borrow_mut().prev = None;
                list.head = Some(next_strong);
            }
            (Some(prev_strong), None) => {
                prev_strong.borrow_mut().next = None;
                list.tail = Some(Rc::downgrade(&prev_strong));
            }
            (Some(prev_strong), Some(next_strong)) => {
                prev_strong.borrow_mut().next = Some(next_strong.clone());
                next_strong.borrow_mut().prev = prev;
            }
        }

        if list.head.is_none() {
            map.remove(&class_key);
        }
    }

    pub fn get_first_object(&self, class_name: &str) -> Option<ObjectRef> {
        let map = self.classes.lock().unwrap();
        map.get(&class_name.to_ascii_lowercase())
            .and_then(|l| l.head.clone())
    }

    pub fn get_last_object(&self, class_name: &str) -> Option<ObjectRef> {
        let map = self.classes.lock().unwrap();
        map.get(&class_name.to_ascii_lowercase())
            .and_then(|l| l.tail.as_ref())
            .and_then(Weak::upgrade)
    }

    /// Snapshot of every live object of `class_name`, head to tail.
    pub fn get_objects(&self, class_name: &str) -> Vec<ObjectRef> {
        let map = self.classes.lock().unwrap();
        let mut out = Vec::new();
        if let Some(list) = map.get(&class_name.to_ascii_lowercase()) {
            let mut cur = list.head.clone();
            while let Some(node) = cur {
                let next = node.borrow().next.clone();
                out.push(node);
                cur = next;
            }
        }
        out
    }

    /// Snapshot of every live object across every class.
    pub fn get_all_objects(&self) -> Vec<ObjectRef> {
        let map = self.classes.lock().unwrap();
        let mut out = Vec::new();
        for list in map.values() {
            let mut cur = list.head.clone();
            while let Some(node) = cur {
                let next = node.borrow().next.clone();
                out.push(node);
                cur = next;
            }
        }
        out
    }

    pub fn clear(&self) {
        self.classes.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitBuilder;
    use std::collections::HashMap as StdHashMap;

    fn make_object(class: &str) -> ObjectRef {
        let unit = Rc::new(UnitBuilder::new(class).build());
        let table: StdHashMap<String, Rc<crate::unit::Unit>> = StdHashMap::new();
        Object::new(unit, &table)
    }

    #[test]
    fn linkage_matches_insertion_order() {
        let registry = Registry::new();
        let x = make_object("C");
        let y = make_object("C");
        let z = make_object("C");
        registry.register(&x);
        registry.register(&y);
        registry.register(&z);

        assert!(Rc::ptr_eq(&registry.get_first_object("C").unwrap(), &x));
        assert!(Rc::ptr_eq(&x.borrow().next_in_class().unwrap(), &y));
        assert!(Rc::ptr_eq(&y.borrow().next_in_class().unwrap(), &z));
        assert!(z.borrow().next_in_class().is_none());
        assert!(Rc::ptr_eq(&z.borrow().prev_in_class().unwrap(), &y));
    }

    #[test]
    fn unregister_repairs_neighbor_links() {
        let registry = Registry::new();
        let x = make_object("C");
        let y = make_object("C");
        let z = make_object("C");
        registry.register(&x);
        registry.register(&y);
        registry.register(&z);

        registry.unregister(&y);

        assert!(Rc::ptr_eq(&x.borrow().next_in_class().unwrap(), &z));
        assert!(Rc::ptr_eq(&z.borrow().prev_in_class().unwrap(), &x));
        assert_eq!(registry.get_objects("C").len(), 2);
    }

    #[test]
    fn every_object_belongs_to_at_most_one_class_list() {
        let registry = Registry::new();
        let x = make_object("C");
        registry.register(&x);
        assert_eq!(registry.get_objects("C").len(), 1);
        registry.unregister(&x);
        assert_eq!(registry.get_objects("C").len(), 0);
    }
}
