//! Class-file back end
//!
//! Takes validated symbols and lowered method bodies to binary class files:
//! the deduplicating constant pool and descriptor codec, the instruction
//! assembler, the verification model that computes stack-map frames, and
//! the emitter that lays everything out.

pub mod assembler;
pub mod attribute;
pub mod class;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod emitter;
pub mod error;
pub mod field;
pub mod flag;
pub mod frame;
pub mod instruction;
pub mod method;
pub mod mutf8;
pub mod opcodes;
pub mod stackmap;
pub mod writer;

pub use constpool::{Constant, ConstantPool};
pub use emitter::{emit_class, BodyMap, EmittedClass, MethodBodies, NoBodies};
pub use instruction::{Handler, Instruction, Label, MethodBody, ValueKind};
