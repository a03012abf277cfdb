//! mudvm: a stack-based bytecode VM for a Portuguese-keyword, dynamically
//! typed object-oriented scripting language.
//!
//! This crate is the execution core only: it runs pre-compiled [`Unit`]s
//! (classes with bytecode, string pools and declared fields) produced by an
//! external compiler. Parsing source text into a `Unit` is outside this
//! crate's scope; see [`unit::UnitBuilder`] for the host-facing way to
//! assemble one, and [`unit::Unit::from_bytes`]/[`unit::Unit::to_bytes`] for
//! the minimal wire encoding used by the embedding API.

pub mod builtins;
pub mod fault;
pub mod frame;
pub mod interpreter;
pub mod object;
pub mod opcode;
pub mod registry;
pub mod special_type;
pub mod unit;
pub mod value;
pub mod vartroca;

pub use fault::Fault;
pub use interpreter::VM;
pub use object::Object;
pub use registry::Registry;
pub use unit::Unit;
pub use value::Value;
