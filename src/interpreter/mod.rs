//! The bytecode interpreter: fetch-decode-execute loop, operand stack,
//! locals, globals, and the embedding API surface (`execute`, `set_write`,
//! `set_read`, `globals`, `register_special_type`).

mod dispatch;
mod field_access;

use crate::builtins;
use crate::fault::Fault;
use crate::frame::{ArgVector, CallFrame};
use crate::object::Object;
use crate::opcode::{self, Opcode};
use crate::registry::Registry;
use crate::special_type::{SpecialTypeDispatcher, SpecialTypeRegistry};
use crate::unit::{Constant, Function, UnitBuilder};
use crate::value::{self, ObjectRef, UnitRef, Value};
use crate::vartroca::MemberEvaluator;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use dispatch::CallTarget;
pub use field_access::{clamp_for_store, load_field, load_index, store_field, store_index};

pub const MAX_STACK: usize = 500;
pub const MAX_CALL_DEPTH: usize = 40;
pub const MAX_LOCALS: usize = 256;

/// A stack-based bytecode VM. Executes units installed in its unit table
/// against a shared operand stack, a 256-slot locals array that is
/// snapshotted and restored around nested calls, and an owned object
/// [`Registry`].
pub struct VM {
    root_unit: UnitRef,
    unit_table: HashMap<String, UnitRef>,
    registry: Registry,
    globals: HashMap<String, Value>,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    locals: Box<[Value; MAX_LOCALS]>,
    specials: SpecialTypeRegistry,
    special_units: HashMap<String, UnitRef>,
    write_callback: Option<Box<dyn FnMut(&str)>>,
    read_callback: Option<Box<dyn FnMut() -> String>>,
    capture: String,
}

impl VM {
    /// `new_vm(root_unit, unit_table)`: construct a VM whose top-level
    /// `execute` resolves functions against `root_unit`.
    pub fn new(root_unit: UnitRef, unit_table: HashMap<String, UnitRef>) -> VM {
        VM {
            root_unit,
            unit_table,
            registry: Registry::new(),
            globals: HashMap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            locals: Self::fresh_locals(),
            specials: SpecialTypeRegistry::new(),
            special_units: HashMap::new(),
            write_callback: None,
            read_callback: None,
            capture: String::new(),
        }
    }

    fn fresh_locals() -> Box<[Value; MAX_LOCALS]> {
        Box::new(std::array::from_fn(|_| Value::Null))
    }

    pub fn set_write(&mut self, callback: impl FnMut(&str) + 'static) {
        self.write_callback = Some(Box::new(callback));
    }

    pub fn set_read(&mut self, callback: impl FnMut() -> String + 'static) {
        self.read_callback = Some(Box::new(callback));
    }

    pub fn register_special_type(&mut self, tag: impl Into<String>, dispatcher: Box<dyn SpecialTypeDispatcher>) {
        self.specials.register(tag, dispatcher);
    }

    /// Snapshot of this VM's global map at call time.
    pub fn globals(&self) -> HashMap<String, Value> {
        self.globals.clone()
    }

    pub fn unit_table(&self) -> &HashMap<String, UnitRef> {
        &self.unit_table
    }

    /// `vm.execute(function_name, args)`: resolve `function_name` on the
    /// root unit and run it to completion.
    pub fn execute(&mut self, function_name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        let function = self
            .root_unit
            .find_function(function_name)
            .cloned()
            .ok_or_else(|| Fault::FunctionNotFound(function_name.to_string()))?;
        let unit = self.root_unit.clone();
        self.invoke(unit, function, None, args)
    }

    /// Host write callback, also appended to the capture buffer used by
    /// `escreva`/`escrevaln`.
    pub(crate) fn write_out(&mut self, text: &str, newline: bool) {
        self.capture.push_str(text);
        if newline {
            self.capture.push('\n');
        }
        if let Some(cb) = self.write_callback.as_mut() {
            cb(text);
            if newline {
                cb("\n");
            }
        }
    }

    pub(crate) fn read_in(&mut self) -> String {
        match self.read_callback.as_mut() {
            Some(cb) => cb(),
            None => String::new(),
        }
    }

    pub fn capture_buffer(&self) -> &str {
        &self.capture
    }

    fn special_unit(&mut self, tag: &str) -> UnitRef {
        self.special_units
            .entry(tag.to_ascii_lowercase())
            .or_insert_with(|| Rc::new(UnitBuilder::new(tag).build()))
            .clone()
    }

    fn current_frame(&self) -> &CallFrame {
        self.frames.last().expect("execute_opcode called without an active frame")
    }

    fn push(&mut self, value: Value) -> Result<(), Fault> {
        if self.stack.len() >= MAX_STACK {
            return Err(Fault::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, Fault> {
        let base = self.frames.last().map(|f| f.stack_base).unwrap_or(0);
        if self.stack.len() <= base {
            return Err(Fault::StackUnderflow);
        }
        Ok(self.stack.pop().unwrap())
    }

    fn pop_args(&mut self, argc: u8) -> Result<Vec<Value>, Fault> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    fn load_local(&self, idx: u16) -> Value {
        self.locals.get(idx as usize).cloned().unwrap_or(Value::Null)
    }

    fn store_local(&mut self, idx: u16, value: Value) {
        if let Some(slot) = self.locals.get_mut(idx as usize) {
            *slot = value;
        }
    }

    /// Push `frame`, run it to completion, then pop it and restore the
    /// caller's locals — the snapshot/restore discipline nested calls need.
    fn run_pushed_frame(&mut self, frame: CallFrame) -> Result<Value, Fault> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(Fault::CallStackOverflow);
        }
        let stack_base = frame.stack_base;
        let saved_locals = std::mem::replace(&mut self.locals, Self::fresh_locals());
        self.frames.push(frame);
        let result = self.run_frame();
        self.frames.pop();
        self.stack.truncate(stack_base);
        self.locals = saved_locals;
        result
    }

    fn invoke(&mut self, unit: UnitRef, function: Function, this: Option<ObjectRef>, args: Vec<Value>) -> Result<Value, Fault> {
        let stack_base = self.stack.len();
        let argvec: ArgVector = Rc::new(RefCell::new(args));
        let mut frame = CallFrame::new(unit, Rc::new(function.bytecode), stack_base, argvec);
        if let Some(t) = this {
            frame = frame.with_this(t);
        }
        self.run_pushed_frame(frame)
    }

    /// The constant-expression sub-interpreter (§4.7): same dispatch loop,
    /// run over a constant's bytecode with a bound this-object and an
    /// explicit argument vector (empty when driven by `vartroca`, the
    /// caller's own args when promoted to a callable by unqualified-call
    /// resolution).
    fn eval_expression(&mut self, unit: UnitRef, this: Option<ObjectRef>, bytecode: Vec<u8>, args: Vec<Value>) -> Result<Value, Fault> {
        let stack_base = self.stack.len();
        let argvec: ArgVector = Rc::new(RefCell::new(args));
        let mut frame = CallFrame::new(unit, Rc::new(bytecode), stack_base, argvec);
        if let Some(t) = this {
            frame = frame.with_this(t);
        }
        self.run_pushed_frame(frame)
    }

    fn run_frame(&mut self) -> Result<Value, Fault> {
        loop {
            let (ip, len) = {
                let frame = self.current_frame();
                (frame.ip, frame.bytecode.len())
            };
            if ip >= len {
                return Ok(Value::Null);
            }
            let bytecode = self.current_frame().bytecode.clone();
            let (op, next_ip) = opcode::decode(&bytecode, ip)?;
            self.frames.last_mut().unwrap().ip = next_ip;
            if let Some(result) = self.execute_opcode(op)? {
                return Ok(result);
            }
        }
    }

    fn class_member_key(class_name: &str, member_name: &str) -> String {
        format!("{}:{}", class_name.to_ascii_lowercase(), member_name.to_ascii_lowercase())
    }

    /// Execute one decoded instruction. Returns `Some(value)` when the
    /// frame should end (`Return`/`ReturnValue`; falling off the end is
    /// handled by `run_frame`), `None` to keep looping.
    fn execute_opcode(&mut self, op: Opcode) -> Result<Option<Value>, Fault> {
        match op {
            Opcode::Nop | Opcode::Debug | Opcode::Line(_) => {}

            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let v = self.pop()?;
                self.push(v.clone())?;
                self.push(v)?;
            }
            Opcode::Swap => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)?;
            }
            Opcode::PushNull => self.push(Value::Null)?,
            Opcode::PushTrue => self.push(Value::Boolean(true))?,
            Opcode::PushFalse => self.push(Value::Boolean(false))?,
            Opcode::PushInt(n) => self.push(Value::Integer(n as i64))?,
            Opcode::PushDouble(d) => self.push(Value::Double(d))?,
            Opcode::PushString(idx) => {
                let s = self.current_frame().get_string(idx).to_string();
                self.push(Value::string(s))?;
            }

            Opcode::LoadLocal(idx) => self.push(self.load_local(idx))?,
            Opcode::StoreLocal(idx) => {
                let v = self.pop()?;
                self.store_local(idx, v);
            }

            Opcode::LoadGlobal(idx) => {
                let name = self.current_frame().get_string(idx).to_ascii_lowercase();
                self.push(self.globals.get(&name).cloned().unwrap_or(Value::Null))?;
            }
            Opcode::StoreGlobal(idx) => {
                let name = self.current_frame().get_string(idx).to_ascii_lowercase();
                let v = self.pop()?;
                self.globals.insert(name, v);
            }

            Opcode::LoadField(idx) => {
                let name = self.current_frame().get_string(idx).to_string();
                let target = self.pop()?;
                self.push(load_field(&target, &name, &mut self.specials))?;
            }
            Opcode::StoreField(idx) => {
                let name = self.current_frame().get_string(idx).to_string();
                let v = self.pop()?;
                let target = self.pop()?;
                store_field(&target, &name, v, &mut self.specials);
                self.push(target)?;
            }
            Opcode::LoadFieldDynamic => {
                let name = self.pop()?.as_string();
                let target = self.pop()?;
                self.push(load_field(&target, &name, &mut self.specials))?;
            }
            Opcode::StoreFieldDynamic => {
                let name = self.pop()?.as_string();
                let v = self.pop()?;
                let target = self.pop()?;
                store_field(&target, &name, v, &mut self.specials);
                self.push(target)?;
            }

            Opcode::LoadArg(idx) => {
                let args = self.current_frame().args.clone();
                let v = args.borrow().get(idx as usize).cloned().unwrap_or(Value::Null);
                self.push(v)?;
            }
            Opcode::StoreArg(idx) => {
                let v = self.pop()?;
                let args = self.current_frame().args.clone();
                if let Some(slot) = args.borrow_mut().get_mut(idx as usize) {
                    *slot = v;
                }
            }
            Opcode::LoadArgCount => {
                let len = self.current_frame().args.borrow().len() as i64;
                self.push(Value::Integer(len))?;
            }
            Opcode::LoadThis => {
                let this = self.current_frame().this.clone();
                self.push(this.map(Value::Object).unwrap_or(Value::Null))?;
            }

            Opcode::LoadIndex => {
                let index = self.pop()?;
                let target = self.pop()?;
                self.push(load_index(&target, &index, &mut self.specials))?;
            }
            Opcode::StoreIndex => {
                let v = self.pop()?;
                let index = self.pop()?;
                let target = self.pop()?;
                store_index(&target, &index, v, &mut self.specials);
                self.push(target)?;
            }

            Opcode::LoadDynamic => {
                let name = self.pop()?.as_string();
                self.push(self.load_dynamic(&name))?;
            }
            Opcode::StoreDynamic => {
                let name = self.pop()?.as_string();
                let v = self.pop()?;
                self.store_dynamic(&name, v);
            }

            Opcode::Concat => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(value::concat(&a, &b))?;
            }
            Opcode::Add => self.binary_op(value::add)?,
            Opcode::Sub => self.binary_op(value::sub)?,
            Opcode::Mul => self.binary_op(value::mul)?,
            Opcode::Div => self.binary_op(value::div)?,
            Opcode::Mod => self.binary_op(value::rem)?,
            Opcode::Neg => {
                let v = self.pop()?;
                self.push(value::neg(&v))?;
            }
            Opcode::Inc => {
                let v = self.pop()?;
                self.push(value::add(&v, &Value::Integer(1)))?;
            }
            Opcode::Dec => {
                let v = self.pop()?;
                self.push(value::sub(&v, &Value::Integer(1)))?;
            }
            Opcode::BitAnd => self.binary_op(value::bitwise_and)?,
            Opcode::BitOr => self.binary_op(value::bitwise_or)?,
            Opcode::BitXor => self.binary_op(value::bitwise_xor)?,
            Opcode::BitNot => {
                let v = self.pop()?;
                self.push(value::bitwise_not(&v))?;
            }
            Opcode::Shl => self.binary_op(value::shl)?,
            Opcode::Shr => self.binary_op(value::shr)?,

            Opcode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.loose_eq(&b)))?;
            }
            Opcode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(!a.loose_eq(&b)))?;
            }
            Opcode::Lt => self.compare_op(|o| o.is_lt())?,
            Opcode::Le => self.compare_op(|o| o.is_le())?,
            Opcode::Gt => self.compare_op(|o| o.is_gt())?,
            Opcode::Ge => self.compare_op(|o| o.is_ge())?,
            Opcode::StrictEq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.strict_eq(&b)))?;
            }
            Opcode::StrictNe => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(!a.strict_eq(&b)))?;
            }
            Opcode::And => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.truthy() && b.truthy()))?;
            }
            Opcode::Or => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(a.truthy() || b.truthy()))?;
            }
            Opcode::Not => {
                let v = self.pop()?;
                self.push(Value::Boolean(!v.truthy()))?;
            }

            Opcode::Jump(offset) => self.jump(offset),
            Opcode::JumpIfTrue(offset) => {
                let v = self.pop()?;
                if v.truthy() {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfFalse(offset) => {
                let v = self.pop()?;
                if !v.truthy() {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfNull(offset) => {
                let v = self.pop()?;
                if matches!(v, Value::Null) {
                    self.jump(offset);
                }
            }
            Opcode::JumpIfNotNull(offset) => {
                let v = self.pop()?;
                if !matches!(v, Value::Null) {
                    self.jump(offset);
                }
            }

            Opcode::Call(name_idx, argc) => {
                let name = self.current_frame().get_string(name_idx).to_string();
                let args = self.pop_args(argc)?;
                let result = self.dispatch_unqualified_call(&name, args)?;
                self.push(result)?;
            }
            Opcode::CallMethod(name_idx, argc) => {
                let name = self.current_frame().get_string(name_idx).to_string();
                let args = self.pop_args(argc)?;
                let receiver = self.pop()?;
                let result = self.dispatch_method_call(&receiver, &name, args)?;
                self.push(result)?;
            }
            Opcode::CallMethodDynamic(argc) => {
                let name = self.pop()?.as_string();
                let args = self.pop_args(argc)?;
                let receiver = self.pop()?;
                let result = self.dispatch_method_call(&receiver, &name, args)?;
                self.push(result)?;
            }
            Opcode::CallDynamic(argc) => {
                let name = self.pop()?.as_string();
                let args = self.pop_args(argc)?;
                let result = self.dispatch_unqualified_call(&name, args)?;
                self.push(result)?;
            }
            Opcode::CallStatic(class_idx, name_idx, argc) => {
                let class_name = self.current_frame().get_string(class_idx).to_string();
                let method_name = self.current_frame().get_string(name_idx).to_string();
                let args = self.pop_args(argc)?;
                let this = self.current_frame().this.clone();
                let result = self.dispatch_static_call(&class_name, &method_name, this, args)?;
                self.push(result)?;
            }
            Opcode::CallBuiltin(_id, argc) => {
                // Numeric builtin ids are a reserved slot the compiler never
                // emits; `Call` resolves builtins by name instead. Pop the
                // declared operands and yield Null.
                let _ = self.pop_args(argc)?;
                self.push(Value::Null)?;
            }

            Opcode::Return => return Ok(Some(Value::Null)),
            Opcode::ReturnValue => {
                let v = self.pop()?;
                return Ok(Some(v));
            }

            Opcode::New(name_idx, argc) => {
                let class_name = self.current_frame().get_string(name_idx).to_string();
                let args = self.pop_args(argc)?;
                let obj = self.construct(&class_name, args)?;
                self.push(Value::Object(obj))?;
            }
            Opcode::Delete => {
                self.pop()?;
                self.push(Value::Null)?;
            }
            Opcode::TypeOf => {
                let v = self.pop()?;
                self.push(Value::string(v.type_name()))?;
            }
            Opcode::InstanceOf(name_idx) => {
                let class_name = self.current_frame().get_string(name_idx).to_string();
                let v = self.pop()?;
                let is = matches!(&v, Value::Object(o) if o.borrow().is_instance_of(&class_name));
                self.push(Value::Boolean(is))?;
            }

            Opcode::LoadClass(name_idx) => {
                let name = self.current_frame().get_string(name_idx).to_string();
                self.push(dispatch::load_class(&name, &self.registry, &self.unit_table))?;
            }
            Opcode::LoadClassMember(class_idx, member_idx) => {
                let class_name = self.current_frame().get_string(class_idx).to_string();
                let member_name = self.current_frame().get_string(member_idx).to_string();
                let key = Self::class_member_key(&class_name, &member_name);
                self.push(self.globals.get(&key).cloned().unwrap_or(Value::Null))?;
            }
            Opcode::StoreClassMember(class_idx, member_idx) => {
                let class_name = self.current_frame().get_string(class_idx).to_string();
                let member_name = self.current_frame().get_string(member_idx).to_string();
                let v = self.pop()?;
                let key = Self::class_member_key(&class_name, &member_name);
                self.globals.insert(key, v);
            }
            Opcode::LoadClassDynamic => {
                let name = self.pop()?.as_string();
                self.push(dispatch::load_class(&name, &self.registry, &self.unit_table))?;
            }
            Opcode::LoadClassMemberDynamic => {
                let member_name = self.pop()?.as_string();
                let class_name = self.pop()?.as_string();
                let key = Self::class_member_key(&class_name, &member_name);
                self.push(self.globals.get(&key).cloned().unwrap_or(Value::Null))?;
            }
            Opcode::StoreClassMemberDynamic => {
                let member_name = self.pop()?.as_string();
                let class_name = self.pop()?.as_string();
                let v = self.pop()?;
                let key = Self::class_member_key(&class_name, &member_name);
                self.globals.insert(key, v);
            }

            Opcode::InitSpecialType(name_idx) => {
                let tag = self.current_frame().get_string(name_idx).to_string();
                let unit = self.special_unit(&tag);
                let obj = Object::new_special(tag, unit);
                self.push(Value::Object(obj))?;
            }

            Opcode::Terminate => return Err(Fault::Terminate),
        }
        Ok(None)
    }

    fn jump(&mut self, offset: i16) {
        let frame = self.frames.last_mut().unwrap();
        frame.ip = (frame.ip as i64 + offset as i64).max(0) as usize;
    }

    fn binary_op(&mut self, f: impl Fn(&Value, &Value) -> Value) -> Result<(), Fault> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(&a, &b))
    }

    fn compare_op(&mut self, accept: impl Fn(std::cmp::Ordering) -> bool) -> Result<(), Fault> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(Value::Boolean(accept(a.compare(&b))))
    }

    /// `LoadDynamic`: this-field (even if Null) takes priority over the
    /// global map.
    fn load_dynamic(&self, name: &str) -> Value {
        if let Some(this) = &self.current_frame().this {
            if this.borrow().has_field(name) {
                return this.borrow().get_field(name).cloned().unwrap_or(Value::Null);
            }
        }
        self.globals.get(&name.to_ascii_lowercase()).cloned().unwrap_or(Value::Null)
    }

    fn store_dynamic(&mut self, name: &str, value: Value) {
        let this = self.current_frame().this.clone();
        if let Some(this) = this {
            if this.borrow().has_field(name) {
                this.borrow_mut().set_field(name, value);
                return;
            }
        }
        self.globals.insert(name.to_ascii_lowercase(), value);
    }

    fn dispatch_unqualified_call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        let this = self.current_frame().this.clone();
        let current_unit = self.current_frame().unit.clone();
        match dispatch::resolve_unqualified_call(name, this.as_ref(), &current_unit) {
            CallTarget::Method { unit, function, this } => self.invoke(unit, function, Some(this), args),
            CallTarget::ExpressionConstant { unit, bytecode, this } => self.eval_expression(unit, this, bytecode, args),
            CallTarget::Function { unit, function } => self.invoke(unit, function, None, args),
            CallTarget::Builtin(name) => builtins::call(self, &name, args),
        }
    }

    fn dispatch_method_call(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        match receiver {
            Value::Object(obj) => {
                let tag = obj.borrow().special_tag.clone();
                if let Some(tag) = tag {
                    return match self.specials.get_mut(&tag) {
                        Some(dispatcher) => dispatcher.call_method(&tag, name, &args),
                        None => Ok(Value::Null),
                    };
                }
                let method = obj.borrow().find_method(name);
                match method {
                    Some((unit, function)) => self.invoke(unit, function, Some(obj.clone()), args),
                    None => {
                        let constant = obj.borrow().find_constant(name);
                        match constant {
                            Some((unit, Constant::Expression(bytecode))) => {
                                self.eval_expression(unit, Some(obj.clone()), bytecode, args)
                            }
                            _ => Ok(Value::Null),
                        }
                    }
                }
            }
            _ => Ok(Value::Null),
        }
    }

    /// `classname:fn` static-qualified call (§4.3): resolve the named
    /// class's Unit (preferring a live instance, per `LoadClass`) and run
    /// the named function with that Unit's string pool but the *caller's*
    /// this-object, if any — the language's spelling of a super call.
    fn dispatch_static_call(&mut self, class_name: &str, method_name: &str, this: Option<ObjectRef>, args: Vec<Value>) -> Result<Value, Fault> {
        let unit = match dispatch::resolve_static_unit(class_name, &self.registry, &self.unit_table) {
            Some(unit) => unit,
            None => return Ok(Value::Null),
        };
        match unit.find_function(method_name).cloned() {
            Some(function) => self.invoke(unit, function, this, args),
            None => Ok(Value::Null),
        }
    }

    /// `New` / `criar`: resolve the class, build the Object, register it,
    /// then invoke `ini` (falling back to `inicializar`) if present.
    pub(crate) fn construct(&mut self, class_name: &str, args: Vec<Value>) -> Result<ObjectRef, Fault> {
        let unit = self
            .unit_table
            .get(&class_name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Fault::ClassNotFound(class_name.to_string()))?;
        let obj = Object::new(unit, &self.unit_table);
        self.registry.register(&obj);
        let constructor = obj
            .borrow()
            .find_method("ini")
            .or_else(|| obj.borrow().find_method("inicializar"));
        if let Some((unit, function)) = constructor {
            self.invoke(unit, function, Some(obj.clone()), args)?;
        }
        Ok(obj)
    }

    /// `apagar` / `delete`: run `fim` if present, then unregister.
    pub(crate) fn destroy(&mut self, obj: &ObjectRef) -> Result<(), Fault> {
        let destructor = obj.borrow().find_method("fim");
        if let Some((unit, function)) = destructor {
            self.invoke(unit, function, Some(obj.clone()), Vec::new())?;
        }
        self.registry.unregister(obj);
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `args` builtin / `LoadArgCount`: the active frame's argument vector.
    pub(crate) fn current_args(&self) -> Vec<Value> {
        self.current_frame().args.borrow().clone()
    }

    pub(crate) fn current_this(&self) -> Option<ObjectRef> {
        self.current_frame().this.clone()
    }
}

impl MemberEvaluator for VM {
    fn field_value(&mut self, object: &ObjectRef, name: &str) -> Value {
        object.borrow().get_field(name).cloned().unwrap_or(Value::Null)
    }

    fn call_function(&mut self, unit: &UnitRef, this: &ObjectRef, function_name: &str, args: Vec<Value>) -> Result<Value, Fault> {
        match unit.find_function(function_name).cloned() {
            Some(function) => self.invoke(unit.clone(), function, Some(this.clone()), args),
            None => Ok(Value::Null),
        }
    }

    fn eval_expression(&mut self, unit: &UnitRef, this: &ObjectRef, bytecode: &[u8]) -> Result<Value, Fault> {
        VM::eval_expression(self, unit.clone(), Some(this.clone()), bytecode.to_vec(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Assembler;
    use crate::unit::{FieldType, UnitBuilder};

    #[test]
    fn s1_add_coerces_numeric_string() {
        let mut unit_builder = UnitBuilder::new("Entry");
        unit_builder.intern_string("3");
        let bytecode = Assembler::new().push_int(2).push_string(0).add().return_value().build();
        let unit = unit_builder.function("main", Function { bytecode, argc: 0 }).build();
        let mut vm = VM::new(Rc::new(unit), HashMap::new());
        let result = vm.execute("main", vec![]).unwrap();
        assert_eq!(result.as_int(), 5);
    }

    #[test]
    fn s1_concat_does_not_coerce() {
        let mut builder = UnitBuilder::new("Entry");
        let a = builder.intern_string("2");
        let b = builder.intern_string("3");
        let bytecode = Assembler::new()
            .push_string(a)
            .push_string(b)
            .concat()
            .return_value()
            .build();
        let unit = builder.function("main", Function { bytecode, argc: 0 }).build();
        let mut vm = VM::new(Rc::new(unit), HashMap::new());
        let result = vm.execute("main", vec![]).unwrap();
        assert_eq!(result.as_string(), "23");
    }

    #[test]
    fn s2_inheritance_dispatch_uses_most_derived_override() {
        let mut a_builder = UnitBuilder::new("A");
        a_builder.intern_string("A");
        let a_greet = Assembler::new().push_string(0).return_value().build();
        let a = a_builder.function("greet", Function { bytecode: a_greet, argc: 0 }).build();

        let mut b_builder = UnitBuilder::new("B").base("A");
        b_builder.intern_string("B");
        let b_greet = Assembler::new().push_string(0).return_value().build();
        let b = b_builder.function("greet", Function { bytecode: b_greet, argc: 0 }).build();

        let mut entry_builder = UnitBuilder::new("Entry");
        entry_builder.intern_string("B");
        entry_builder.intern_string("greet");
        let call_greet = Assembler::new()
            .op_u16_u8(crate::opcode::OP_NEW, 0, 0)
            .op_u16_u8(crate::opcode::OP_CALL_METHOD, 1, 0)
            .return_value()
            .build();
        let entry = entry_builder
            .function("main", Function { bytecode: call_greet, argc: 0 })
            .build();

        let mut table = HashMap::new();
        table.insert("a".to_string(), Rc::new(a));
        table.insert("b".to_string(), Rc::new(b));
        let mut vm = VM::new(Rc::new(entry), table);
        let result = vm.execute("main", vec![]).unwrap();
        assert_eq!(result.as_string(), "B");
    }

    #[test]
    fn s4_narrow_integer_clamp_round_trips_through_field_store() {
        let unit = UnitBuilder::new("Bicho")
            .variable("h", FieldType::UInt8, Value::Integer(0))
            .build();
        let table: HashMap<String, UnitRef> = HashMap::new();
        let obj = Object::new(Rc::new(unit), &table);
        let mut vm = VM::new(Rc::new(UnitBuilder::new("Entry").build()), HashMap::new());
        store_field(&Value::Object(obj.clone()), "h", Value::Integer(300), &mut vm.specials);
        assert_eq!(load_field(&Value::Object(obj.clone()), "h", &mut vm.specials).as_int(), 255);
        store_field(&Value::Object(obj.clone()), "h", Value::Integer(-7), &mut vm.specials);
        assert_eq!(load_field(&Value::Object(obj), "h", &mut vm.specials).as_int(), 0);
    }

    #[test]
    fn s6_dynamic_resolution_prefers_this_field_over_global() {
        let unit = UnitBuilder::new("Jogador")
            .variable("score", FieldType::Int32, Value::Integer(0))
            .build();
        let table: HashMap<String, UnitRef> = HashMap::new();
        let obj = Object::new(Rc::new(unit), &table);

        let mut entry_builder = UnitBuilder::new("Entry");
        entry_builder.intern_string("score");
        let bytecode = Assembler::new()
            .push_int(42)
            .push_string(0)
            .op(crate::opcode::OP_STORE_DYNAMIC)
            .push_string(0)
            .op(crate::opcode::OP_LOAD_DYNAMIC)
            .return_value()
            .build();
        let entry = entry_builder.function("main", Function { bytecode, argc: 0 }).build();
        let mut vm = VM::new(Rc::new(entry), HashMap::new());

        let function = vm.root_unit.find_function("main").cloned().unwrap();
        let unit = vm.root_unit.clone();
        let result = vm.invoke(unit, function, Some(obj.clone()), vec![]).unwrap();
        assert_eq!(result.as_int(), 42);
        assert_eq!(obj.borrow().get_field("score").unwrap().as_int(), 42);
    }

    #[test]
    fn static_qualified_call_uses_named_classs_pool_with_callers_this() {
        let mut base_builder = UnitBuilder::new("Base");
        let tag_idx = base_builder.intern_string("tag");
        let label = Assembler::new()
            .op(crate::opcode::OP_LOAD_THIS)
            .op_u16(crate::opcode::OP_LOAD_FIELD, tag_idx)
            .return_value()
            .build();
        let base = base_builder.function("label", Function { bytecode: label, argc: 0 }).build();

        let derived = UnitBuilder::new("Derived")
            .base("Base")
            .variable("tag", FieldType::Txt, Value::string("fromderived"))
            .build();

        let mut entry_builder = UnitBuilder::new("Entry");
        let class_idx = entry_builder.intern_string("Base");
        let method_idx = entry_builder.intern_string("label");
        let call_base_label = Assembler::new()
            .op_u16_u16_u8(crate::opcode::OP_CALL_STATIC, class_idx, method_idx, 0)
            .return_value()
            .build();
        let entry = entry_builder
            .function("main", Function { bytecode: call_base_label, argc: 0 })
            .build();

        let mut table = HashMap::new();
        table.insert("base".to_string(), Rc::new(base));
        table.insert("derived".to_string(), Rc::new(derived));
        let mut vm = VM::new(Rc::new(entry), table);

        let derived_unit = vm.unit_table().get("derived").cloned().unwrap();
        let obj = Object::new(derived_unit, vm.unit_table());

        let function = vm.root_unit.find_function("main").cloned().unwrap();
        let unit = vm.root_unit.clone();
        let result = vm.invoke(unit, function, Some(obj), vec![]).unwrap();
        assert_eq!(result.as_string(), "fromderived");
    }

    #[test]
    fn call_stack_overflow_faults_past_max_depth() {
        let mut builder = UnitBuilder::new("Entry");
        builder.intern_string("loop");
        let recurse = Assembler::new()
            .op_u16_u8(crate::opcode::OP_CALL, 0, 0)
            .return_value()
            .build();
        let unit = builder.function("loop", Function { bytecode: recurse, argc: 0 }).build();
        let mut vm = VM::new(Rc::new(unit), HashMap::new());
        let err = vm.execute("loop", vec![]).unwrap_err();
        assert_eq!(err, Fault::CallStackOverflow);
    }
}
