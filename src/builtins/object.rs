//! Object lifecycle and registry-walk builtins: `criar`/`apagar`, `ref`,
//! `objantes`/`objdepois`.

use crate::fault::Fault;
use crate::interpreter::VM;
use crate::value::Value;

pub fn call(vm: &mut VM, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    Ok(Some(match name {
        "criar" | "new" => {
            let class_name = args.first().map(Value::as_string).unwrap_or_default();
            let ctor_args = args.get(1..).map(<[Value]>::to_vec).unwrap_or_default();
            Value::Object(vm.construct(&class_name, ctor_args)?)
        }
        "apagar" | "delete" => {
            if let Some(Value::Object(obj)) = args.first() {
                vm.destroy(obj)?;
            }
            Value::Null
        }
        "ref" => args.first().cloned().unwrap_or(Value::Null),
        "objantes" => match args.first() {
            Some(Value::Object(obj)) => obj.borrow().prev_in_class().map(Value::Object).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "objdepois" => match args.first() {
            Some(Value::Object(obj)) => obj.borrow().next_in_class().map(Value::Object).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        _ => return Ok(None),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitBuilder;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[test]
    fn criar_constructs_and_registers_an_instance() {
        let class = Rc::new(UnitBuilder::new("Bicho").build());
        let mut table = HashMap::new();
        table.insert("bicho".to_string(), class.clone());
        let mut vm = VM::new(Rc::new(UnitBuilder::new("Entry").build()), table);
        let result = call(&mut vm, "criar", &[Value::string("Bicho")]).unwrap().unwrap();
        assert!(matches!(result, Value::Object(_)));
    }

    #[test]
    fn unknown_object_builtin_returns_none() {
        let mut vm = VM::new(Rc::new(UnitBuilder::new("Entry").build()), HashMap::new());
        assert!(call(&mut vm, "naoexiste", &[]).unwrap().is_none());
    }
}
