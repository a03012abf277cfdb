//! `LoadField`/`StoreField` semantics, including narrow-integer clamping.

use crate::special_type::SpecialTypeRegistry;
use crate::unit::FieldType;
use crate::value::{ObjectRef, Value};

/// Clamp an incoming store value to its field's declared narrow type.
/// `real2` (and anything not covered by [`FieldType::is_narrow`]) passes
/// through unchanged.
pub fn clamp_for_store(ty: FieldType, value: &Value) -> Value {
    match ty {
        FieldType::Int1 => Value::Integer(if value.truthy() { 1 } else { 0 }),
        FieldType::Int8 => Value::Integer(value.as_int().clamp(-128, 127)),
        FieldType::UInt8 => Value::Integer(value.as_int().clamp(0, 255)),
        FieldType::Int16 => Value::Integer(value.as_int().clamp(-32768, 32767)),
        FieldType::UInt16 => Value::Integer(value.as_int().clamp(0, 65535)),
        FieldType::Int32 => Value::Integer(value.as_int().clamp(i32::MIN as i64, i32::MAX as i64)),
        FieldType::UInt32 => {
            let clamped = value.as_double().clamp(0.0, u32::MAX as f64);
            Value::Integer(clamped as i64)
        }
        FieldType::Real => Value::Double(value.as_double() as f32 as f64),
        FieldType::Real2 | FieldType::Txt | FieldType::Ref | FieldType::Vetor | FieldType::Objeto => {
            value.clone()
        }
    }
}

fn string_char_or_index(s: &str, name: &str) -> Option<Value> {
    if let Ok(idx) = name.parse::<usize>() {
        return Some(
            s.chars()
                .nth(idx)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or(Value::Null),
        );
    }
    match name {
        "tamanho" | "tam" => Some(Value::Integer(s.chars().count() as i64)),
        "maiusculo" | "mai" => Some(Value::string(s.to_uppercase())),
        "minusculo" | "min" => Some(Value::string(s.to_lowercase())),
        _ => None,
    }
}

fn array_field_or_index(values: &[Value], name: &str) -> Option<Value> {
    if let Ok(idx) = name.parse::<usize>() {
        return Some(values.get(idx).cloned().unwrap_or(Value::Null));
    }
    match name {
        "tamanho" | "tam" | "total" => Some(Value::Integer(values.len() as i64)),
        "ini" | "primeiro" | "first" => Some(values.first().cloned().unwrap_or(Value::Null)),
        "fim" | "ultimo" | "last" => Some(values.last().cloned().unwrap_or(Value::Null)),
        _ => None,
    }
}

/// Load `target.name`. `specials` handles opaque collaborator objects.
pub fn load_field(target: &Value, name: &str, specials: &mut SpecialTypeRegistry) -> Value {
    match target {
        Value::Object(obj) => {
            let tag = obj.borrow().special_tag.clone();
            if let Some(tag) = tag {
                return specials
                    .get_mut(&tag)
                    .and_then(|d| d.get_property(&tag, name).ok())
                    .unwrap_or(Value::Null);
            }
            obj.borrow().get_field(name).cloned().unwrap_or(Value::Null)
        }
        Value::Array(a) => array_field_or_index(&a.borrow(), name).unwrap_or(Value::Null),
        Value::String(s) => string_char_or_index(s, name).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Store `value` into `target.name`. Object stores auto-create unless the
/// field has a declared narrow type, in which case `value` is clamped.
/// Array stores auto-extend with `Null`; string stores are a no-op
/// (strings are immutable).
pub fn store_field(target: &Value, name: &str, value: Value, specials: &mut SpecialTypeRegistry) {
    match target {
        Value::Object(obj) => {
            let tag = obj.borrow().special_tag.clone();
            if let Some(tag) = tag {
                if let Some(d) = specials.get_mut(&tag) {
                    let _ = d.set_property(&tag, name, value);
                }
                return;
            }
            let declared_ty = obj.borrow().find_variable_type(name);
            let stored = match declared_ty {
                Some(ty) if ty.is_narrow() => clamp_for_store(ty, &value),
                _ => value,
            };
            obj.borrow_mut().set_field(name, stored);
        }
        Value::Array(a) => {
            if let Ok(idx) = name.parse::<usize>() {
                let mut values = a.borrow_mut();
                if idx >= values.len() {
                    values.resize(idx + 1, Value::Null);
                }
                values[idx] = value;
            }
        }
        Value::String(_) => {}
        _ => {}
    }
}

/// `LoadIndex`/`StoreIndex` operate the same way as field access with a
/// stringified numeric key, reusing the same rules.
pub fn load_index(target: &Value, index: &Value, specials: &mut SpecialTypeRegistry) -> Value {
    load_field(target, &index.as_int().to_string(), specials)
}

pub fn store_index(target: &Value, index: &Value, value: Value, specials: &mut SpecialTypeRegistry) {
    store_field(target, &index.as_int().to_string(), value, specials);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint8_store_saturates_both_directions() {
        assert_eq!(clamp_for_store(FieldType::UInt8, &Value::Integer(300)).as_int(), 255);
        assert_eq!(clamp_for_store(FieldType::UInt8, &Value::Integer(-7)).as_int(), 0);
    }

    #[test]
    fn int1_clamp_derives_from_truthiness() {
        assert_eq!(clamp_for_store(FieldType::Int1, &Value::Integer(42)).as_int(), 1);
        assert_eq!(clamp_for_store(FieldType::Int1, &Value::Integer(0)).as_int(), 0);
    }

    #[test]
    fn array_store_auto_extends_with_null() {
        let arr = Value::array(vec![Value::Integer(1)]);
        store_index(&arr, &Value::Integer(3), Value::Integer(9), &mut SpecialTypeRegistry::new());
        if let Value::Array(a) = &arr {
            let values = a.borrow();
            assert_eq!(values.len(), 4);
            assert!(matches!(values[1], Value::Null));
            assert_eq!(values[3].as_int(), 9);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn string_store_is_a_silent_no_op() {
        let s = Value::string("abc");
        store_field(&s, "0", Value::string("z"), &mut SpecialTypeRegistry::new());
        assert_eq!(s.as_string(), "abc");
    }

    #[test]
    fn string_length_alias_field() {
        let s = Value::string("abc");
        let v = load_field(&s, "tamanho", &mut SpecialTypeRegistry::new());
        assert_eq!(v.as_int(), 3);
    }
}
