//! Bytecode instruction set: decode and (for tests/builders) encode.
//!
//! Instructions are variable length; all multi-byte operands are
//! little-endian. Jump offsets are signed and relative, added to the
//! instruction pointer *after* the operand has been read.

use crate::fault::Fault;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Opcode {
    Nop,
    Pop,
    Dup,
    Swap,
    PushNull,
    PushTrue,
    PushFalse,
    PushInt(i32),
    PushDouble(f64),
    PushString(u16),
    LoadLocal(u16),
    StoreLocal(u16),
    LoadGlobal(u16),
    StoreGlobal(u16),
    LoadField(u16),
    StoreField(u16),
    LoadFieldDynamic,
    StoreFieldDynamic,
    LoadArg(u8),
    StoreArg(u8),
    LoadArgCount,
    LoadThis,
    LoadIndex,
    StoreIndex,
    LoadDynamic,
    StoreDynamic,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Inc,
    Dec,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    StrictEq,
    StrictNe,
    And,
    Or,
    Not,
    Jump(i16),
    JumpIfTrue(i16),
    JumpIfFalse(i16),
    JumpIfNull(i16),
    JumpIfNotNull(i16),
    Call(u16, u8),
    CallMethod(u16, u8),
    CallMethodDynamic(u8),
    CallDynamic(u8),
    CallBuiltin(u16, u8),
    Return,
    ReturnValue,
    New(u16, u8),
    Delete,
    TypeOf,
    InstanceOf(u16),
    LoadClass(u16),
    LoadClassMember(u16, u16),
    StoreClassMember(u16, u16),
    LoadClassDynamic,
    LoadClassMemberDynamic,
    StoreClassMemberDynamic,
    InitSpecialType(u16),
    Terminate,
    Debug,
    Line(u16),
    CallStatic(u16, u16, u8),
}

macro_rules! tags {
    ($($name:ident = $val:expr),* $(,)?) => {
        $(pub const $name: u8 = $val;)*
    };
}

tags! {
    OP_NOP = 0, OP_POP = 1, OP_DUP = 2, OP_SWAP = 3,
    OP_PUSH_NULL = 4, OP_PUSH_TRUE = 5, OP_PUSH_FALSE = 6,
    OP_PUSH_INT = 7, OP_PUSH_DOUBLE = 8, OP_PUSH_STRING = 9,
    OP_LOAD_LOCAL = 10, OP_STORE_LOCAL = 11,
    OP_LOAD_GLOBAL = 12, OP_STORE_GLOBAL = 13,
    OP_LOAD_FIELD = 14, OP_STORE_FIELD = 15,
    OP_LOAD_FIELD_DYN = 16, OP_STORE_FIELD_DYN = 17,
    OP_LOAD_ARG = 18, OP_STORE_ARG = 19, OP_LOAD_ARG_COUNT = 20,
    OP_LOAD_THIS = 21,
    OP_LOAD_INDEX = 22, OP_STORE_INDEX = 23,
    OP_LOAD_DYNAMIC = 24, OP_STORE_DYNAMIC = 25,
    OP_CONCAT = 26,
    OP_ADD = 27, OP_SUB = 28, OP_MUL = 29, OP_DIV = 30, OP_MOD = 31,
    OP_NEG = 32, OP_INC = 33, OP_DEC = 34,
    OP_BIT_AND = 35, OP_BIT_OR = 36, OP_BIT_XOR = 37, OP_BIT_NOT = 38,
    OP_SHL = 39, OP_SHR = 40,
    OP_EQ = 41, OP_NE = 42, OP_LT = 43, OP_LE = 44, OP_GT = 45, OP_GE = 46,
    OP_STRICT_EQ = 47, OP_STRICT_NE = 48,
    OP_AND = 49, OP_OR = 50, OP_NOT = 51,
    OP_JUMP = 52, OP_JUMP_IF_TRUE = 53, OP_JUMP_IF_FALSE = 54,
    OP_JUMP_IF_NULL = 55, OP_JUMP_IF_NOT_NULL = 56,
    OP_CALL = 57, OP_CALL_METHOD = 58, OP_CALL_METHOD_DYN = 59,
    OP_CALL_DYNAMIC = 60, OP_CALL_BUILTIN = 61,
    OP_RETURN = 62, OP_RETURN_VALUE = 63,
    OP_NEW = 64, OP_DELETE = 65, OP_TYPE_OF = 66,
    OP_INSTANCE_OF = 67,
    OP_LOAD_CLASS = 68, OP_LOAD_CLASS_MEMBER = 69, OP_STORE_CLASS_MEMBER = 70,
    OP_LOAD_CLASS_DYN = 71, OP_LOAD_CLASS_MEMBER_DYN = 72, OP_STORE_CLASS_MEMBER_DYN = 73,
    OP_INIT_SPECIAL_TYPE = 74,
    OP_TERMINATE = 75, OP_DEBUG = 76, OP_LINE = 77,
    OP_CALL_STATIC = 78,
}

#[inline]
fn read_u8(bytes: &[u8], ip: usize) -> Result<u8, Fault> {
    bytes.get(ip).copied().ok_or(Fault::StackUnderflow)
}
#[inline]
fn read_u16(bytes: &[u8], ip: usize) -> Result<u16, Fault> {
    let slice = bytes.get(ip..ip + 2).ok_or(Fault::StackUnderflow)?;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}
#[inline]
fn read_i16(bytes: &[u8], ip: usize) -> Result<i16, Fault> {
    Ok(read_u16(bytes, ip)? as i16)
}
#[inline]
fn read_i32(bytes: &[u8], ip: usize) -> Result<i32, Fault> {
    let slice = bytes.get(ip..ip + 4).ok_or(Fault::StackUnderflow)?;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
}
#[inline]
fn read_f64(bytes: &[u8], ip: usize) -> Result<f64, Fault> {
    let slice = bytes.get(ip..ip + 8).ok_or(Fault::StackUnderflow)?;
    Ok(f64::from_le_bytes(slice.try_into().unwrap()))
}

/// Decode one instruction starting at `ip`. Returns the opcode and the
/// instruction pointer positioned just past its operands (jump targets
/// are computed relative to *that* position, per spec §4.1).
pub fn decode(bytes: &[u8], ip: usize) -> Result<(Opcode, usize), Fault> {
    let tag = *bytes.get(ip).ok_or(Fault::UnknownOpcode(0))?;
    let mut p = ip + 1;
    let op = match tag {
        OP_NOP => Opcode::Nop,
        OP_POP => Opcode::Pop,
        OP_DUP => Opcode::Dup,
        OP_SWAP => Opcode::Swap,
        OP_PUSH_NULL => Opcode::PushNull,
        OP_PUSH_TRUE => Opcode::PushTrue,
        OP_PUSH_FALSE => Opcode::PushFalse,
        OP_PUSH_INT => {
            let v = read_i32(bytes, p)?;
            p += 4;
            Opcode::PushInt(v)
        }
        OP_PUSH_DOUBLE => {
            let v = read_f64(bytes, p)?;
            p += 8;
            Opcode::PushDouble(v)
        }
        OP_PUSH_STRING => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::PushString(v)
        }
        OP_LOAD_LOCAL => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::LoadLocal(v)
        }
        OP_STORE_LOCAL => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::StoreLocal(v)
        }
        OP_LOAD_GLOBAL => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::LoadGlobal(v)
        }
        OP_STORE_GLOBAL => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::StoreGlobal(v)
        }
        OP_LOAD_FIELD => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::LoadField(v)
        }
        OP_STORE_FIELD => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::StoreField(v)
        }
        OP_LOAD_FIELD_DYN => Opcode::LoadFieldDynamic,
        OP_STORE_FIELD_DYN => Opcode::StoreFieldDynamic,
        OP_LOAD_ARG => {
            let v = read_u8(bytes, p)?;
            p += 1;
            Opcode::LoadArg(v)
        }
        OP_STORE_ARG => {
            let v = read_u8(bytes, p)?;
            p += 1;
            Opcode::StoreArg(v)
        }
        OP_LOAD_ARG_COUNT => Opcode::LoadArgCount,
        OP_LOAD_THIS => Opcode::LoadThis,
        OP_LOAD_INDEX => Opcode::LoadIndex,
        OP_STORE_INDEX => Opcode::StoreIndex,
        OP_LOAD_DYNAMIC => Opcode::LoadDynamic,
        OP_STORE_DYNAMIC => Opcode::StoreDynamic,
        OP_CONCAT => Opcode::Concat,
        OP_ADD => Opcode::Add,
        OP_SUB => Opcode::Sub,
        OP_MUL => Opcode::Mul,
        OP_DIV => Opcode::Div,
        OP_MOD => Opcode::Mod,
        OP_NEG => Opcode::Neg,
        OP_INC => Opcode::Inc,
        OP_DEC => Opcode::Dec,
        OP_BIT_AND => Opcode::BitAnd,
        OP_BIT_OR => Opcode::BitOr,
        OP_BIT_XOR => Opcode::BitXor,
        OP_BIT_NOT => Opcode::BitNot,
        OP_SHL => Opcode::Shl,
        OP_SHR => Opcode::Shr,
        OP_EQ => Opcode::Eq,
        OP_NE => Opcode::Ne,
        OP_LT => Opcode::Lt,
        OP_LE => Opcode::Le,
        OP_GT => Opcode::Gt,
        OP_GE => Opcode::Ge,
        OP_STRICT_EQ => Opcode::StrictEq,
        OP_STRICT_NE => Opcode::StrictNe,
        OP_AND => Opcode::And,
        OP_OR => Opcode::Or,
        OP_NOT => Opcode::Not,
        OP_JUMP => {
            let v = read_i16(bytes, p)?;
            p += 2;
            Opcode::Jump(v)
        }
        OP_JUMP_IF_TRUE => {
            let v = read_i16(bytes, p)?;
            p += 2;
            Opcode::JumpIfTrue(v)
        }
        OP_JUMP_IF_FALSE => {
            let v = read_i16(bytes, p)?;
            p += 2;
            Opcode::JumpIfFalse(v)
        }
        OP_JUMP_IF_NULL => {
            let v = read_i16(bytes, p)?;
            p += 2;
            Opcode::JumpIfNull(v)
        }
        OP_JUMP_IF_NOT_NULL => {
            let v = read_i16(bytes, p)?;
            p += 2;
            Opcode::JumpIfNotNull(v)
        }
        OP_CALL => {
            let name = read_u16(bytes, p)?;
            p += 2;
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::Call(name, argc)
        }
        OP_CALL_METHOD => {
            let name = read_u16(bytes, p)?;
            p += 2;
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::CallMethod(name, argc)
        }
        OP_CALL_METHOD_DYN => {
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::CallMethodDynamic(argc)
        }
        OP_CALL_DYNAMIC => {
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::CallDynamic(argc)
        }
        OP_CALL_BUILTIN => {
            let id = read_u16(bytes, p)?;
            p += 2;
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::CallBuiltin(id, argc)
        }
        OP_RETURN => Opcode::Return,
        OP_RETURN_VALUE => Opcode::ReturnValue,
        OP_NEW => {
            let name = read_u16(bytes, p)?;
            p += 2;
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::New(name, argc)
        }
        OP_DELETE => Opcode::Delete,
        OP_TYPE_OF => Opcode::TypeOf,
        OP_INSTANCE_OF => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::InstanceOf(v)
        }
        OP_LOAD_CLASS => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::LoadClass(v)
        }
        OP_LOAD_CLASS_MEMBER => {
            let c = read_u16(bytes, p)?;
            p += 2;
            let m = read_u16(bytes, p)?;
            p += 2;
            Opcode::LoadClassMember(c, m)
        }
        OP_STORE_CLASS_MEMBER => {
            let c = read_u16(bytes, p)?;
            p += 2;
            let m = read_u16(bytes, p)?;
            p += 2;
            Opcode::StoreClassMember(c, m)
        }
        OP_LOAD_CLASS_DYN => Opcode::LoadClassDynamic,
        OP_LOAD_CLASS_MEMBER_DYN => Opcode::LoadClassMemberDynamic,
        OP_STORE_CLASS_MEMBER_DYN => Opcode::StoreClassMemberDynamic,
        OP_INIT_SPECIAL_TYPE => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::InitSpecialType(v)
        }
        OP_TERMINATE => Opcode::Terminate,
        OP_DEBUG => Opcode::Debug,
        OP_LINE => {
            let v = read_u16(bytes, p)?;
            p += 2;
            Opcode::Line(v)
        }
        OP_CALL_STATIC => {
            let class_name = read_u16(bytes, p)?;
            p += 2;
            let method_name = read_u16(bytes, p)?;
            p += 2;
            let argc = read_u8(bytes, p)?;
            p += 1;
            Opcode::CallStatic(class_name, method_name, argc)
        }
        other => return Err(Fault::UnknownOpcode(other)),
    };
    Ok((op, p))
}

/// A minimal bytecode assembler, used by tests and by `UnitBuilder`
/// callers that want to hand-assemble a `Function` body without depending
/// on the (out-of-scope) compiler.
#[derive(Debug, Default)]
pub struct Assembler {
    bytes: Vec<u8>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_null(mut self) -> Self {
        self.bytes.push(OP_PUSH_NULL);
        self
    }
    pub fn push_true(mut self) -> Self {
        self.bytes.push(OP_PUSH_TRUE);
        self
    }
    pub fn push_false(mut self) -> Self {
        self.bytes.push(OP_PUSH_FALSE);
        self
    }
    pub fn push_int(mut self, v: i32) -> Self {
        self.bytes.push(OP_PUSH_INT);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn push_double(mut self, v: f64) -> Self {
        self.bytes.push(OP_PUSH_DOUBLE);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn push_string(mut self, idx: u16) -> Self {
        self.bytes.push(OP_PUSH_STRING);
        self.bytes.extend_from_slice(&idx.to_le_bytes());
        self
    }
    pub fn add(mut self) -> Self {
        self.bytes.push(OP_ADD);
        self
    }
    pub fn concat(mut self) -> Self {
        self.bytes.push(OP_CONCAT);
        self
    }
    pub fn return_value(mut self) -> Self {
        self.bytes.push(OP_RETURN_VALUE);
        self
    }
    pub fn return_(mut self) -> Self {
        self.bytes.push(OP_RETURN);
        self
    }
    pub fn op(mut self, tag: u8) -> Self {
        self.bytes.push(tag);
        self
    }
    pub fn op_u16(mut self, tag: u8, v: u16) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn op_u8(mut self, tag: u8, v: u8) -> Self {
        self.bytes.push(tag);
        self.bytes.push(v);
        self
    }
    pub fn op_u16_u8(mut self, tag: u8, a: u16, b: u8) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&a.to_le_bytes());
        self.bytes.push(b);
        self
    }
    pub fn op_u16_u16_u8(mut self, tag: u8, a: u16, b: u16, c: u8) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&a.to_le_bytes());
        self.bytes.extend_from_slice(&b.to_le_bytes());
        self.bytes.push(c);
        self
    }
    pub fn op_i16(mut self, tag: u8, v: i16) -> Self {
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_push_int_then_add() {
        let bytecode = Assembler::new().push_int(2).push_int(3).add().return_value().build();
        let (op, p) = decode(&bytecode, 0).unwrap();
        assert_eq!(op, Opcode::PushInt(2));
        let (op, p) = decode(&bytecode, p).unwrap();
        assert_eq!(op, Opcode::PushInt(3));
        let (op, p) = decode(&bytecode, p).unwrap();
        assert_eq!(op, Opcode::Add);
        let (op, _) = decode(&bytecode, p).unwrap();
        assert_eq!(op, Opcode::ReturnValue);
    }

    #[test]
    fn unknown_opcode_is_a_fault() {
        let bytecode = vec![250];
        let err = decode(&bytecode, 0).unwrap_err();
        assert_eq!(err, Fault::UnknownOpcode(250));
    }
}
