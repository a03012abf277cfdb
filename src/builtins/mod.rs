//! The flat builtin name table: text, math, array, type-introspection,
//! object, I/O, substitution, time and meta categories. Unknown names
//! return `Null` per the dispatch contract in `interpreter::dispatch`.

mod array;
mod io;
mod numeric;
mod object;
mod text;
mod time;

use crate::fault::Fault;
use crate::interpreter::VM;
use crate::value::Value;

/// Dispatch a builtin call by name. Case-sensitive: the language's builtin
/// table is lowercase by convention and callers (the compiler) emit names
/// as written in source.
pub fn call(vm: &mut VM, name: &str, args: Vec<Value>) -> Result<Value, Fault> {
    if let Some(v) = text::call(name, &args) {
        return Ok(v);
    }
    if let Some(v) = numeric::call(name, &args) {
        return Ok(v);
    }
    if let Some(v) = array::call(name, &args) {
        return Ok(v);
    }
    if let Some(v) = type_introspection(name, &args) {
        return Ok(v);
    }
    if let Some(v) = object::call(vm, name, &args)? {
        return Ok(v);
    }
    if let Some(v) = io::call(vm, name, &args) {
        return Ok(v);
    }
    if let Some(v) = substitution(vm, name, &args)? {
        return Ok(v);
    }
    if let Some(v) = time::call(name, &args) {
        return Ok(v);
    }
    if name == "args" {
        let current = vm.current_args();
        return Ok(Value::array(current));
    }
    Ok(Value::Null)
}

fn type_introspection(name: &str, args: &[Value]) -> Option<Value> {
    let v = args.first().cloned().unwrap_or(Value::Null);
    Some(match name {
        "isnull" => Value::Boolean(matches!(v, Value::Null)),
        "isnum" => Value::Boolean(v.is_numeric()),
        "istext" => Value::Boolean(matches!(v, Value::String(_))),
        "isarray" => Value::Boolean(matches!(v, Value::Array(_))),
        "isobject" => Value::Boolean(v.is_object()),
        "typeof" | "tipode" => Value::string(v.type_name()),
        _ => return None,
    })
}

fn substitution(vm: &mut VM, name: &str, args: &[Value]) -> Result<Option<Value>, Fault> {
    if name != "vartroca" && name != "vartrocacod" {
        return Ok(None);
    }
    let text = args.first().map(Value::as_string).unwrap_or_default();
    let pattern = args.get(1).map(Value::as_string).unwrap_or_default();
    let var_prefix = args.get(2).map(Value::as_string).unwrap_or_default();
    let probability = args.get(3).map(Value::as_int).unwrap_or(100);
    let spacing = args.get(4).map(Value::as_int).unwrap_or(0);
    let this = vm.current_this();
    let result = if name == "vartroca" {
        crate::vartroca::vartroca(vm, this.as_ref(), &text, &pattern, &var_prefix, probability, spacing)?
    } else {
        crate::vartroca::vartrocacod(vm, this.as_ref(), &text, &pattern, &var_prefix, probability, spacing)?
    };
    Ok(Some(Value::string(result)))
}
