//! Compiled unit: the immutable artifact an external compiler produces and
//! the VM executes. Building one from source text is out of this crate's
//! scope; [`UnitBuilder`] is the host-facing assembly API, and
//! [`Unit::to_bytes`]/[`Unit::from_bytes`] give a minimal wire encoding for
//! the `load_unit` embedding entry point.

use std::collections::HashMap;

/// Declared narrow-integer / scalar field type, used for store-time
/// clamping (see `interpreter::field_access`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int1,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Real,
    Real2,
    Txt,
    Ref,
    Vetor,
    Objeto,
}

impl FieldType {
    pub fn from_name(name: &str) -> Option<FieldType> {
        Some(match name {
            "int1" => FieldType::Int1,
            "int8" => FieldType::Int8,
            "uint8" => FieldType::UInt8,
            "int16" => FieldType::Int16,
            "uint16" => FieldType::UInt16,
            "int32" => FieldType::Int32,
            "uint32" => FieldType::UInt32,
            "real" => FieldType::Real,
            "real2" => FieldType::Real2,
            "txt" => FieldType::Txt,
            "ref" => FieldType::Ref,
            "vetor" => FieldType::Vetor,
            "objeto" => FieldType::Objeto,
            _ => return None,
        })
    }

    /// Narrow integer/float types that get clamped on store; `txt`, `ref`,
    /// `vetor`, `objeto` and `real2` pass through unchanged.
    pub fn is_narrow(&self) -> bool {
        matches!(
            self,
            FieldType::Int1
                | FieldType::Int8
                | FieldType::UInt8
                | FieldType::Int16
                | FieldType::UInt16
                | FieldType::Int32
                | FieldType::UInt32
                | FieldType::Real
        )
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: FieldType,
    pub default: crate::value::Value,
}

/// `{bytecode, argc}` — a named, callable chunk of raw bytecode.
#[derive(Debug, Clone)]
pub struct Function {
    pub bytecode: Vec<u8>,
    pub argc: u8,
}

#[derive(Debug, Clone)]
pub enum Constant {
    Int(i64),
    Double(f64),
    String(String),
    /// Expression bytecode, evaluated by the constant-expression
    /// sub-interpreter; these are the language's "expression constants",
    /// callable under the resolution rules in `interpreter::dispatch`.
    Expression(Vec<u8>),
}

impl Constant {
    pub fn is_expression(&self) -> bool {
        matches!(self, Constant::Expression(_))
    }
}

/// A compiled class: name, bases, string pool, and the three member maps.
/// Immutable once constructed; shared via `Rc` by every `Object` it backs.
#[derive(Debug, Clone)]
pub struct Unit {
    pub class_name: String,
    pub base_names: Vec<String>,
    pub strings: Vec<String>,
    pub variables: HashMap<String, Variable>,
    pub functions: HashMap<String, Function>,
    pub constants: HashMap<String, Constant>,
}

impl Unit {
    pub fn get_string(&self, index: u16) -> &str {
        self.strings
            .get(index as usize)
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    pub fn find_constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(&name.to_ascii_lowercase())
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(&name.to_ascii_lowercase())
    }

    /// Serialize to the crate's minimal wire format: this is a reference
    /// encoding for the embedding API, not a reverse-engineering of any
    /// real compiler's on-disk format (that loader is out of scope).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.class_name);
        write_u16(&mut out, self.base_names.len() as u16);
        for b in &self.base_names {
            write_str(&mut out, b);
        }
        write_u16(&mut out, self.strings.len() as u16);
        for s in &self.strings {
            write_str(&mut out, s);
        }
        write_u16(&mut out, self.variables.len() as u16);
        for v in self.variables.values() {
            write_str(&mut out, &v.name);
            out.push(field_type_tag(v.ty));
        }
        write_u16(&mut out, self.functions.len() as u16);
        for (name, f) in &self.functions {
            write_str(&mut out, name);
            out.push(f.argc);
            write_u32(&mut out, f.bytecode.len() as u32);
            out.extend_from_slice(&f.bytecode);
        }
        write_u16(&mut out, self.constants.len() as u16);
        for (name, c) in &self.constants {
            write_str(&mut out, name);
            match c {
                Constant::Int(n) => {
                    out.push(0);
                    out.extend_from_slice(&n.to_le_bytes());
                }
                Constant::Double(d) => {
                    out.push(1);
                    out.extend_from_slice(&d.to_le_bytes());
                }
                Constant::String(s) => {
                    out.push(2);
                    write_str(&mut out, s);
                }
                Constant::Expression(bc) => {
                    out.push(3);
                    write_u32(&mut out, bc.len() as u32);
                    out.extend_from_slice(bc);
                }
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Unit, String> {
        let mut pos = 0usize;
        let class_name = read_str(bytes, &mut pos)?;
        let base_count = read_u16(bytes, &mut pos)?;
        let mut base_names = Vec::with_capacity(base_count as usize);
        for _ in 0..base_count {
            base_names.push(read_str(bytes, &mut pos)?);
        }
        let string_count = read_u16(bytes, &mut pos)?;
        let mut strings = Vec::with_capacity(string_count as usize);
        for _ in 0..string_count {
            strings.push(read_str(bytes, &mut pos)?);
        }
        let var_count = read_u16(bytes, &mut pos)?;
        let mut variables = HashMap::new();
        for _ in 0..var_count {
            let name = read_str(bytes, &mut pos)?;
            let tag = *bytes.get(pos).ok_or("truncated unit: variable type")?;
            pos += 1;
            let ty = field_type_from_tag(tag)?;
            let key = name.to_ascii_lowercase();
            variables.insert(
                key,
                Variable {
                    name,
                    ty,
                    default: crate::value::Value::Null,
                },
            );
        }
        let fn_count = read_u16(bytes, &mut pos)?;
        let mut functions = HashMap::new();
        for _ in 0..fn_count {
            let name = read_str(bytes, &mut pos)?;
            let argc = *bytes.get(pos).ok_or("truncated unit: function argc")?;
            pos += 1;
            let len = read_u32(bytes, &mut pos)? as usize;
            let bytecode = bytes
                .get(pos..pos + len)
                .ok_or("truncated unit: function bytecode")?
                .to_vec();
            pos += len;
            functions.insert(name.to_ascii_lowercase(), Function { bytecode, argc });
        }
        let const_count = read_u16(bytes, &mut pos)?;
        let mut constants = HashMap::new();
        for _ in 0..const_count {
            let name = read_str(bytes, &mut pos)?;
            let tag = *bytes.get(pos).ok_or("truncated unit: constant tag")?;
            pos += 1;
            let value = match tag {
                0 => {
                    let n = read_i64(bytes, &mut pos)?;
                    Constant::Int(n)
                }
                1 => {
                    let d = read_f64(bytes, &mut pos)?;
                    Constant::Double(d)
                }
                2 => Constant::String(read_str(bytes, &mut pos)?),
                3 => {
                    let len = read_u32(bytes, &mut pos)? as usize;
                    let bc = bytes
                        .get(pos..pos + len)
                        .ok_or("truncated unit: expression bytecode")?
                        .to_vec();
                    pos += len;
                    Constant::Expression(bc)
                }
                other => return Err(format!("unknown constant tag {other}")),
            };
            constants.insert(name.to_ascii_lowercase(), value);
        }
        Ok(Unit {
            class_name,
            base_names,
            strings,
            variables,
            functions,
            constants,
        })
    }
}

fn field_type_tag(ty: FieldType) -> u8 {
    match ty {
        FieldType::Int1 => 0,
        FieldType::Int8 => 1,
        FieldType::UInt8 => 2,
        FieldType::Int16 => 3,
        FieldType::UInt16 => 4,
        FieldType::Int32 => 5,
        FieldType::UInt32 => 6,
        FieldType::Real => 7,
        FieldType::Real2 => 8,
        FieldType::Txt => 9,
        FieldType::Ref => 10,
        FieldType::Vetor => 11,
        FieldType::Objeto => 12,
    }
}

fn field_type_from_tag(tag: u8) -> Result<FieldType, String> {
    Ok(match tag {
        0 => FieldType::Int1,
        1 => FieldType::Int8,
        2 => FieldType::UInt8,
        3 => FieldType::Int16,
        4 => FieldType::UInt16,
        5 => FieldType::Int32,
        6 => FieldType::UInt32,
        7 => FieldType::Real,
        8 => FieldType::Real2,
        9 => FieldType::Txt,
        10 => FieldType::Ref,
        11 => FieldType::Vetor,
        12 => FieldType::Objeto,
        other => return Err(format!("unknown field type tag {other}")),
    })
}

fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}
fn write_str(out: &mut Vec<u8>, s: &str) {
    write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> Result<u16, String> {
    let slice = bytes
        .get(*pos..*pos + 2)
        .ok_or("truncated unit: u16")?;
    *pos += 2;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}
fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32, String> {
    let slice = bytes
        .get(*pos..*pos + 4)
        .ok_or("truncated unit: u32")?;
    *pos += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}
fn read_i64(bytes: &[u8], pos: &mut usize) -> Result<i64, String> {
    let slice = bytes
        .get(*pos..*pos + 8)
        .ok_or("truncated unit: i64")?;
    *pos += 8;
    Ok(i64::from_le_bytes(slice.try_into().unwrap()))
}
fn read_f64(bytes: &[u8], pos: &mut usize) -> Result<f64, String> {
    let slice = bytes
        .get(*pos..*pos + 8)
        .ok_or("truncated unit: f64")?;
    *pos += 8;
    Ok(f64::from_le_bytes(slice.try_into().unwrap()))
}
fn read_str(bytes: &[u8], pos: &mut usize) -> Result<String, String> {
    let len = read_u32(bytes, pos)? as usize;
    let slice = bytes
        .get(*pos..*pos + len)
        .ok_or("truncated unit: string bytes")?;
    *pos += len;
    String::from_utf8(slice.to_vec()).map_err(|e| e.to_string())
}

/// Host-facing builder for assembling a `Unit` programmatically, standing
/// in for what a real compiler's codegen backend would emit.
#[derive(Debug, Default)]
pub struct UnitBuilder {
    class_name: String,
    base_names: Vec<String>,
    strings: Vec<String>,
    variables: HashMap<String, Variable>,
    functions: HashMap<String, Function>,
    constants: HashMap<String, Constant>,
}

impl UnitBuilder {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn base(mut self, name: impl Into<String>) -> Self {
        self.base_names.push(name.into());
        self
    }

    pub fn intern_string(&mut self, s: impl Into<String>) -> u16 {
        let idx = self.strings.len() as u16;
        self.strings.push(s.into());
        idx
    }

    pub fn variable(mut self, name: impl Into<String>, ty: FieldType, default: crate::value::Value) -> Self {
        let name = name.into();
        self.variables.insert(
            name.to_ascii_lowercase(),
            Variable { name, ty, default },
        );
        self
    }

    pub fn function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.functions.insert(name.into().to_ascii_lowercase(), function);
        self
    }

    pub fn constant(mut self, name: impl Into<String>, constant: Constant) -> Self {
        self.constants.insert(name.into().to_ascii_lowercase(), constant);
        self
    }

    pub fn build(self) -> Unit {
        Unit {
            class_name: self.class_name,
            base_names: self.base_names,
            strings: self.strings,
            variables: self.variables,
            functions: self.functions,
            constants: self.constants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_narrow_classification() {
        assert!(FieldType::UInt8.is_narrow());
        assert!(!FieldType::Txt.is_narrow());
        assert!(!FieldType::Real2.is_narrow());
    }

    #[test]
    fn wire_format_round_trips() {
        let unit = UnitBuilder::new("Bicho")
            .base("Animal")
            .variable("h", FieldType::UInt8, crate::value::Value::Integer(0))
            .function(
                "fala",
                Function {
                    bytecode: vec![0x02, 0x01],
                    argc: 1,
                },
            )
            .constant("pi", Constant::Double(3.14))
            .build();

        let bytes = unit.to_bytes();
        let decoded = Unit::from_bytes(&bytes).expect("round trip");
        assert_eq!(decoded.class_name, "Bicho");
        assert_eq!(decoded.base_names, vec!["Animal".to_string()]);
        assert!(decoded.find_variable("H").is_some());
        assert_eq!(decoded.find_function("FALA").unwrap().argc, 1);
        match decoded.find_constant("pi").unwrap() {
            Constant::Double(d) => assert!((d - 3.14).abs() < 1e-9),
            _ => panic!("expected double constant"),
        }
    }
}
