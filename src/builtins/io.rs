//! I/O builtins: `escreva`/`escrevaln` forward to the host write callback
//! (and the capture buffer); `leia` invokes the host read callback.

use crate::interpreter::VM;
use crate::value::Value;

pub fn call(vm: &mut VM, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "escreva" | "print" => {
            let text = join_args(args);
            vm.write_out(&text, false);
            Some(Value::Null)
        }
        "escrevaln" | "println" => {
            let text = join_args(args);
            vm.write_out(&text, true);
            Some(Value::Null)
        }
        "leia" | "read" => Some(Value::string(vm.read_in())),
        _ => None,
    }
}

fn join_args(args: &[Value]) -> String {
    args.iter().map(Value::as_string).collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitBuilder;
    use std::collections::HashMap;
    use std::rc::Rc;

    #[test]
    fn escreva_appends_to_capture_buffer() {
        let unit = Rc::new(UnitBuilder::new("Entry").build());
        let mut vm = VM::new(unit, HashMap::new());
        call(&mut vm, "escreva", &[Value::string("oi")]);
        assert_eq!(vm.capture_buffer(), "oi");
    }

    #[test]
    fn escrevaln_appends_newline() {
        let unit = Rc::new(UnitBuilder::new("Entry").build());
        let mut vm = VM::new(unit, HashMap::new());
        call(&mut vm, "escrevaln", &[Value::string("oi")]);
        assert_eq!(vm.capture_buffer(), "oi\n");
    }
}
