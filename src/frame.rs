//! Call frame record.

use crate::value::{ObjectRef, UnitRef, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared argument vector: `LoadArg`/`StoreArg` read and write through this
/// handle, so a callee's `StoreArg` is visible to the caller (per spec —
/// the argument vector is shared, not copied).
pub type ArgVector = Rc<RefCell<Vec<Value>>>;

/// A single function/method activation.
pub struct CallFrame {
    /// The unit whose string pool bytecode in this frame indexes into.
    /// For a method call this is the *defining* unit, not necessarily the
    /// this-object's own class (see dispatch rules for static-qualified
    /// "super" calls).
    pub unit: UnitRef,
    pub bytecode: Rc<Vec<u8>>,
    pub ip: usize,
    pub stack_base: usize,
    pub args: ArgVector,
    pub this: Option<ObjectRef>,
}

impl CallFrame {
    pub fn new(unit: UnitRef, bytecode: Rc<Vec<u8>>, stack_base: usize, args: ArgVector) -> Self {
        CallFrame {
            unit,
            bytecode,
            ip: 0,
            stack_base,
            args,
            this: None,
        }
    }

    pub fn with_this(mut self, this: ObjectRef) -> Self {
        self.this = Some(this);
        self
    }

    pub fn get_string(&self, index: u16) -> &str {
        self.unit.get_string(index)
    }
}
