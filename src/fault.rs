//! Typed VM faults.
//!
//! The source interpreter this crate's design is modeled on reports errors
//! as plain strings; we type them instead so a host can match on
//! [`Fault::Terminate`] without string-sniffing (the host must be able to
//! tell an orderly `Terminate` apart from a real fault).

use thiserror::Error;

/// A runtime fault. Every variant here unwinds all call frames and
/// propagates to the host; non-fatal conditions (division by zero, missing
/// fields, out-of-range loads, ...) never produce a `Fault` — they resolve
/// to `Value::Null` or `0` per the language's permissive contract.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Fault {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("call stack overflow")]
    CallStackOverflow,

    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("terminate")]
    Terminate,
}

impl Fault {
    /// True for the cooperative exit signal, which hosts should not log as
    /// an error.
    pub fn is_terminate(&self) -> bool {
        matches!(self, Fault::Terminate)
    }
}
