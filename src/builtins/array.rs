//! Array builtins: `vetor/array`, `arr*`.

use crate::value::Value;

pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "vetor" | "array" => Some(Value::array(args.to_vec())),
        "arrlen" | "count" => Some(Value::Integer(len_of(args) as i64)),
        "arrpush" => {
            if let Some(Value::Array(a)) = args.first() {
                a.borrow_mut().push(args.get(1).cloned().unwrap_or(Value::Null));
            }
            Some(args.first().cloned().unwrap_or(Value::Null))
        }
        "arrpop" => match args.first() {
            Some(Value::Array(a)) => Some(a.borrow_mut().pop().unwrap_or(Value::Null)),
            _ => Some(Value::Null),
        },
        "arrshift" => match args.first() {
            Some(Value::Array(a)) if !a.borrow().is_empty() => Some(a.borrow_mut().remove(0)),
            _ => Some(Value::Null),
        },
        "arrunshift" => {
            if let Some(Value::Array(a)) = args.first() {
                a.borrow_mut().insert(0, args.get(1).cloned().unwrap_or(Value::Null));
            }
            Some(args.first().cloned().unwrap_or(Value::Null))
        }
        "arrindexof" => match args.first() {
            Some(Value::Array(a)) => {
                let needle = args.get(1).cloned().unwrap_or(Value::Null);
                let pos = a.borrow().iter().position(|v| v.loose_eq(&needle));
                Some(Value::Integer(pos.map(|p| p as i64).unwrap_or(-1)))
            }
            _ => Some(Value::Integer(-1)),
        },
        "arrcontains" => match args.first() {
            Some(Value::Array(a)) => {
                let needle = args.get(1).cloned().unwrap_or(Value::Null);
                Some(Value::Boolean(a.borrow().iter().any(|v| v.loose_eq(&needle))))
            }
            _ => Some(Value::Boolean(false)),
        },
        "arrclear" => {
            if let Some(Value::Array(a)) = args.first() {
                a.borrow_mut().clear();
            }
            Some(Value::Null)
        }
        "arrreverse" => {
            if let Some(Value::Array(a)) = args.first() {
                a.borrow_mut().reverse();
            }
            Some(args.first().cloned().unwrap_or(Value::Null))
        }
        _ => None,
    }
}

fn len_of(args: &[Value]) -> usize {
    match args.first() {
        Some(Value::Array(a)) => a.borrow().len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrpush_mutates_shared_array_in_place() {
        let arr = Value::array(vec![Value::Integer(1)]);
        call("arrpush", &[arr.clone(), Value::Integer(2)]);
        if let Value::Array(a) = &arr {
            assert_eq!(a.borrow().len(), 2);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn arrindexof_finds_by_loose_equality() {
        let arr = Value::array(vec![Value::Integer(1), Value::Integer(2)]);
        let result = call("arrindexof", &[arr, Value::Double(2.0)]).unwrap();
        assert_eq!(result.as_int(), 1);
    }

    #[test]
    fn arrshift_on_empty_array_yields_null() {
        let arr = Value::array(vec![]);
        let result = call("arrshift", &[arr]).unwrap();
        assert!(matches!(result, Value::Null));
    }
}
