//! Instruction assembler
//!
//! Lowering interns every operand through the class's pool first, so the
//! size of each instruction (`ldc` or `ldc_w`, short or `wide` local forms,
//! switch padding) is known when offsets are laid out. Branches are then
//! patched against the resolved label offsets.

use std::collections::HashMap;

use super::attribute::ExceptionTableEntry;
use super::constpool::ConstantPool;
use super::descriptor::{class_constant_name, field_descriptor, method_descriptor};
use super::error::ConstPoolError;
use super::instruction::{ArithOp, CompareOp, FieldOp, Instruction, InvokeKind, Label, MethodBody, ValueKind};
use super::opcodes::*;
use crate::ast::PrimitiveType;
use crate::consts::MAX_CODE_LENGTH;
use crate::error::{Error, LimitError, Result};
use crate::symbol::Type;

const MAX_BRANCH_DISTANCE: i64 = 32767;

/// Bytecode plus the layout needed by the stack-map model
#[derive(Debug, Clone)]
pub struct AssembledCode {
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    /// Offset of every instruction, followed by the code length
    pub offsets: Vec<u32>,
    pub labels: HashMap<Label, u32>,
}

enum Piece {
    Bytes(Vec<u8>),
    Jump { opcode: u8, target: Label },
    Table { low: i32, targets: Vec<Label>, default: Label },
    Lookup { pairs: Vec<(i32, Label)>, default: Label },
    Mark,
}

fn switch_padding(at: u32) -> u32 {
    (4 - (at + 1) % 4) % 4
}

impl Piece {
    fn size(&self, at: u32) -> u32 {
        match self {
            Piece::Bytes(bytes) => bytes.len() as u32,
            Piece::Jump { .. } => 3,
            Piece::Table { targets, .. } => 1 + switch_padding(at) + 12 + 4 * targets.len() as u32,
            Piece::Lookup { pairs, .. } => 1 + switch_padding(at) + 8 + 8 * pairs.len() as u32,
            Piece::Mark => 0,
        }
    }
}

pub struct Assembler<'a> {
    pool: &'a mut ConstantPool,
    class: &'a str,
    method: &'a str,
}

impl<'a> Assembler<'a> {
    /// `class` and `method` only label diagnostics
    pub fn new(pool: &'a mut ConstantPool, class: &'a str, method: &'a str) -> Self {
        Self { pool, class, method }
    }

    fn internal(&self, message: impl std::fmt::Display) -> Error {
        Error::internal(format!("{}.{}: {}", self.class, self.method, message))
    }

    fn pool_error(&self, error: ConstPoolError) -> Error {
        error.for_class(self.class, self.pool.len())
    }

    pub fn assemble(&mut self, body: &MethodBody) -> Result<AssembledCode> {
        let mut pieces = Vec::with_capacity(body.instructions.len());
        let mut offsets = Vec::with_capacity(body.instructions.len() + 1);
        let mut labels = HashMap::new();
        let mut offset: u32 = 0;

        for instruction in &body.instructions {
            offsets.push(offset);
            if let Instruction::Label(label) = instruction {
                if labels.insert(*label, offset).is_some() {
                    return Err(self.internal(format!("label {:?} bound twice", label)));
                }
            }
            let piece = self.lower(instruction)?;
            offset += piece.size(offset);
            pieces.push(piece);
        }
        offsets.push(offset);

        if offset == 0 {
            return Err(self.internal("empty method body"));
        }
        if offset as usize > MAX_CODE_LENGTH {
            return Err(Error::limit(
                self.class,
                LimitError::CodeTooLarge { method: self.method.to_string(), length: offset as usize },
            ));
        }

        let (class, method) = (self.class, self.method);
        let resolve = |label: &Label| {
            labels.get(label).copied().ok_or_else(|| {
                Error::internal(format!("{}.{}: label {:?} is never bound", class, method, label))
            })
        };
        let mut code = Vec::with_capacity(offset as usize);
        for (piece, &at) in pieces.iter().zip(&offsets) {
            let relative = |label: &Label| resolve(label).map(|target| target as i64 - at as i64);
            match piece {
                Piece::Bytes(bytes) => code.extend_from_slice(bytes),
                Piece::Jump { opcode, target } => {
                    let delta = relative(target)?;
                    if delta.abs() > MAX_BRANCH_DISTANCE {
                        return Err(Error::limit(
                            class,
                            LimitError::BranchTooFar { method: method.to_string(), offset: delta },
                        ));
                    }
                    code.push(*opcode);
                    code.extend_from_slice(&(delta as i16).to_be_bytes());
                }
                Piece::Table { low, targets, default } => {
                    code.push(TABLESWITCH);
                    code.resize(code.len() + switch_padding(at) as usize, 0);
                    code.extend_from_slice(&(relative(default)? as i32).to_be_bytes());
                    code.extend_from_slice(&low.to_be_bytes());
                    let high = low + targets.len() as i32 - 1;
                    code.extend_from_slice(&high.to_be_bytes());
                    for target in targets {
                        code.extend_from_slice(&(relative(target)? as i32).to_be_bytes());
                    }
                }
                Piece::Lookup { pairs, default } => {
                    code.push(LOOKUPSWITCH);
                    code.resize(code.len() + switch_padding(at) as usize, 0);
                    code.extend_from_slice(&(relative(default)? as i32).to_be_bytes());
                    code.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                    for (key, target) in pairs {
                        code.extend_from_slice(&key.to_be_bytes());
                        code.extend_from_slice(&(relative(target)? as i32).to_be_bytes());
                    }
                }
                Piece::Mark => {}
            }
        }

        let mut exception_table = Vec::with_capacity(body.handlers.len());
        for handler in &body.handlers {
            let start = resolve(&handler.start)?;
            let end = resolve(&handler.end)?;
            if start >= end {
                return Err(Error::internal(format!("{}.{}: empty protected range {}..{}", class, method, start, end)));
            }
            let handler_pc = resolve(&handler.handler)?;
            let catch_type = match &handler.catch_type {
                Some(catch) => self.pool.add_class(catch).map_err(|e| self.pool_error(e))?,
                None => 0,
            };
            exception_table.push(ExceptionTableEntry::new(start as u16, end as u16, handler_pc as u16, catch_type));
        }

        Ok(AssembledCode { code, exception_table, offsets, labels })
    }

    fn lower(&mut self, instruction: &Instruction) -> Result<Piece> {
        use Instruction as I;
        let bytes = match instruction {
            I::Label(_) => return Ok(Piece::Mark),
            I::Nop => vec![NOP],
            I::AConstNull => vec![ACONST_NULL],
            I::IConst(value) => self.int_constant(*value)?,
            I::LConst(value @ (0 | 1)) => vec![LCONST_0 + *value as u8],
            I::LConst(value) => {
                let index = self.pool.add_long(*value).map_err(|e| self.pool_error(e))?;
                wide_index(LDC2_W, index)
            }
            I::FConst(value) => match value.to_bits() {
                bits if bits == 0f32.to_bits() => vec![FCONST_0],
                bits if bits == 1f32.to_bits() => vec![FCONST_1],
                bits if bits == 2f32.to_bits() => vec![FCONST_2],
                _ => {
                    let index = self.pool.add_float(*value).map_err(|e| self.pool_error(e))?;
                    ldc(index)
                }
            },
            I::DConst(value) => match value.to_bits() {
                bits if bits == 0f64.to_bits() => vec![DCONST_0],
                bits if bits == 1f64.to_bits() => vec![DCONST_1],
                _ => {
                    let index = self.pool.add_double(*value).map_err(|e| self.pool_error(e))?;
                    wide_index(LDC2_W, index)
                }
            },
            I::LdcString(value) => {
                let index = self.pool.add_string(value).map_err(|e| self.pool_error(e))?;
                ldc(index)
            }
            I::LdcClass(ty) => {
                let index = self.class_index(ty)?;
                ldc(index)
            }
            I::Load(kind, index) => local_op(LOAD_SHORT_BASE, LOAD_BASE, *kind, *index),
            I::Store(kind, index) => local_op(STORE_SHORT_BASE, STORE_BASE, *kind, *index),
            I::IInc(index, delta) => match (u8::try_from(*index), i8::try_from(*delta)) {
                (Ok(index), Ok(delta)) => vec![IINC, index, delta as u8],
                _ => {
                    let mut bytes = vec![WIDE, IINC];
                    bytes.extend_from_slice(&index.to_be_bytes());
                    bytes.extend_from_slice(&delta.to_be_bytes());
                    bytes
                }
            },
            I::ArrayLoad(kind) => vec![ARRAY_LOAD_BASE + kind.family_index()],
            I::ArrayStore(kind) => vec![ARRAY_STORE_BASE + kind.family_index()],
            I::Pop => vec![POP],
            I::Pop2 => vec![POP2],
            I::Dup => vec![DUP],
            I::DupX1 => vec![DUP_X1],
            I::DupX2 => vec![DUP_X2],
            I::Dup2 => vec![DUP2],
            I::Swap => vec![SWAP],
            I::Arith(kind, op) => vec![self.arith_opcode(*kind, *op)?],
            I::Convert(from, to) => vec![self.convert_opcode(*from, *to)?],
            I::Compare(op) => vec![match op {
                CompareOp::LCmp => LCMP,
                CompareOp::FCmpL => FCMPL,
                CompareOp::FCmpG => FCMPG,
                CompareOp::DCmpL => DCMPL,
                CompareOp::DCmpG => DCMPG,
            }],
            I::If(condition, target) => return Ok(Piece::Jump { opcode: IFEQ + condition.offset(), target: *target }),
            I::IfICmp(condition, target) => {
                return Ok(Piece::Jump { opcode: IF_ICMPEQ + condition.offset(), target: *target })
            }
            I::IfACmp(equal, target) => {
                let opcode = if *equal { IF_ACMPEQ } else { IF_ACMPNE };
                return Ok(Piece::Jump { opcode, target: *target });
            }
            I::IfNull(target) => return Ok(Piece::Jump { opcode: IFNULL, target: *target }),
            I::IfNonNull(target) => return Ok(Piece::Jump { opcode: IFNONNULL, target: *target }),
            I::Goto(target) => return Ok(Piece::Jump { opcode: GOTO, target: *target }),
            I::TableSwitch { low, targets, default } => {
                if targets.is_empty() {
                    return Err(self.internal("tableswitch without targets"));
                }
                return Ok(Piece::Table { low: *low, targets: targets.clone(), default: *default });
            }
            I::LookupSwitch { pairs, default } => {
                let mut pairs = pairs.clone();
                pairs.sort_by_key(|(key, _)| *key);
                if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
                    return Err(self.internal("lookupswitch with a repeated key"));
                }
                return Ok(Piece::Lookup { pairs, default: *default });
            }
            I::Return(Some(kind)) => vec![RETURN_BASE + kind.family_index()],
            I::Return(None) => vec![RETURN],
            I::AThrow => vec![ATHROW],
            I::Field { op, owner, name, ty } => {
                let opcode = match op {
                    FieldOp::GetStatic => GETSTATIC,
                    FieldOp::PutStatic => PUTSTATIC,
                    FieldOp::GetField => GETFIELD,
                    FieldOp::PutField => PUTFIELD,
                };
                let index =
                    self.pool.add_field_ref(owner, name, &field_descriptor(ty)).map_err(|e| self.pool_error(e))?;
                wide_index(opcode, index)
            }
            I::Invoke { kind, owner, name, params, ret } => {
                let descriptor = method_descriptor(params, ret.as_ref());
                match kind {
                    InvokeKind::Interface => {
                        let index = self
                            .pool
                            .add_interface_method_ref(owner, name, &descriptor)
                            .map_err(|e| self.pool_error(e))?;
                        let count = 1 + params.iter().map(Type::slot_size).sum::<usize>();
                        let count =
                            u8::try_from(count).map_err(|_| self.internal("too many interface call arguments"))?;
                        let mut bytes = wide_index(INVOKEINTERFACE, index);
                        bytes.extend_from_slice(&[count, 0]);
                        bytes
                    }
                    other => {
                        let opcode = match other {
                            InvokeKind::Virtual => INVOKEVIRTUAL,
                            InvokeKind::Special => INVOKESPECIAL,
                            _ => INVOKESTATIC,
                        };
                        let index =
                            self.pool.add_method_ref(owner, name, &descriptor).map_err(|e| self.pool_error(e))?;
                        wide_index(opcode, index)
                    }
                }
            }
            I::New(class) => {
                let index = self.pool.add_class(class).map_err(|e| self.pool_error(e))?;
                wide_index(NEW, index)
            }
            I::NewArray(Type::Primitive(element)) => vec![NEWARRAY, primitive_array_code(*element)],
            I::NewArray(element) => wide_index(ANEWARRAY, self.class_index(element)?),
            I::ArrayLength => vec![ARRAYLENGTH],
            I::CheckCast(ty) => wide_index(CHECKCAST, self.class_index(ty)?),
            I::InstanceOf(ty) => wide_index(INSTANCEOF, self.class_index(ty)?),
        };
        Ok(Piece::Bytes(bytes))
    }

    fn class_index(&mut self, ty: &Type) -> Result<u16> {
        let name = class_constant_name(ty).ok_or_else(|| self.internal(format!("{} is not a class type", ty)))?;
        self.pool.add_class(&name).map_err(|e| self.pool_error(e))
    }

    fn int_constant(&mut self, value: i32) -> Result<Vec<u8>> {
        Ok(match value {
            -1..=5 => vec![(ICONST_0 as i32 + value) as u8],
            -128..=127 => vec![BIPUSH, value as i8 as u8],
            -32768..=32767 => {
                let mut bytes = vec![SIPUSH];
                bytes.extend_from_slice(&(value as i16).to_be_bytes());
                bytes
            }
            _ => {
                let index = self.pool.add_integer(value).map_err(|e| self.pool_error(e))?;
                ldc(index)
            }
        })
    }

    fn arith_opcode(&self, kind: ValueKind, op: ArithOp) -> Result<u8> {
        let family = kind.family_index();
        if kind == ValueKind::Reference || (op.is_integral_only() && family > 1) {
            return Err(self.internal(format!("{:?} is not defined for {:?}", op, kind)));
        }
        let base = match op {
            ArithOp::Add => IADD,
            ArithOp::Sub => ISUB,
            ArithOp::Mul => IMUL,
            ArithOp::Div => IDIV,
            ArithOp::Rem => IREM,
            ArithOp::Neg => INEG,
            ArithOp::Shl => ISHL,
            ArithOp::Shr => ISHR,
            ArithOp::Ushr => IUSHR,
            ArithOp::And => IAND,
            ArithOp::Or => IOR,
            ArithOp::Xor => IXOR,
        };
        Ok(base + family)
    }

    fn convert_opcode(&self, from: ValueKind, to: ValueKind) -> Result<u8> {
        if from == to || from == ValueKind::Reference || to == ValueKind::Reference {
            return Err(self.internal(format!("no conversion from {:?} to {:?}", from, to)));
        }
        let (from, to) = (from.family_index(), to.family_index());
        let to = if to > from { to - 1 } else { to };
        Ok(CONVERT_BASE + from * 3 + to)
    }
}

fn ldc(index: u16) -> Vec<u8> {
    match u8::try_from(index) {
        Ok(short) => vec![LDC, short],
        Err(_) => wide_index(LDC_W, index),
    }
}

fn wide_index(opcode: u8, index: u16) -> Vec<u8> {
    let [hi, lo] = index.to_be_bytes();
    vec![opcode, hi, lo]
}

fn local_op(short_base: u8, base: u8, kind: ValueKind, index: u16) -> Vec<u8> {
    let family = kind.family_index();
    match index {
        0..=3 => vec![short_base + family * 4 + index as u8],
        4..=255 => vec![base + family, index as u8],
        _ => {
            let [hi, lo] = index.to_be_bytes();
            vec![WIDE, base + family, hi, lo]
        }
    }
}

fn primitive_array_code(element: PrimitiveType) -> u8 {
    use super::opcodes::array_types::*;
    match element {
        PrimitiveType::Boolean => T_BOOLEAN,
        PrimitiveType::Char => T_CHAR,
        PrimitiveType::Float => T_FLOAT,
        PrimitiveType::Double => T_DOUBLE,
        PrimitiveType::Byte => T_BYTE,
        PrimitiveType::Short => T_SHORT,
        PrimitiveType::Int => T_INT,
        PrimitiveType::Long => T_LONG,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::instruction::Condition;

    fn assemble(instructions: Vec<Instruction>) -> Result<AssembledCode> {
        let mut pool = ConstantPool::new();
        Assembler::new(&mut pool, "T", "m").assemble(&MethodBody::new(4, 4, instructions))
    }

    #[test]
    fn constants_pick_the_shortest_form() {
        let code = assemble(vec![
            Instruction::IConst(-1),
            Instruction::IConst(100),
            Instruction::IConst(1000),
            Instruction::IConst(100_000),
            Instruction::Return(None),
        ])
        .unwrap()
        .code;
        assert_eq!(code, vec![ICONST_M1, BIPUSH, 100, SIPUSH, 0x03, 0xe8, LDC, 1, RETURN]);
    }

    #[test]
    fn ldc_switches_to_wide_index_past_255() {
        let mut pool = ConstantPool::new();
        for i in 0..300 {
            pool.add_utf8(&format!("filler{}", i)).unwrap();
        }
        let body = MethodBody::new(1, 0, vec![Instruction::LdcString("late".into()), Instruction::Return(None)]);
        let code = Assembler::new(&mut pool, "T", "m").assemble(&body).unwrap().code;
        assert_eq!(code[0], LDC_W);
        assert_eq!(code.len(), 4);
    }

    #[test]
    fn locals_use_short_normal_and_wide_forms() {
        let code = assemble(vec![
            Instruction::Load(ValueKind::Reference, 0),
            Instruction::Load(ValueKind::Int, 4),
            Instruction::Store(ValueKind::Long, 300),
            Instruction::IInc(2, 1000),
            Instruction::Return(None),
        ])
        .unwrap()
        .code;
        assert_eq!(
            code,
            vec![0x2a, 0x15, 4, WIDE, 0x37, 0x01, 0x2c, WIDE, IINC, 0, 2, 0x03, 0xe8, RETURN]
        );
    }

    #[test]
    fn branches_resolve_backwards_and_forwards() {
        let assembled = assemble(vec![
            Instruction::Label(Label(0)),
            Instruction::IConst(0),
            Instruction::If(Condition::Ne, Label(1)),
            Instruction::Goto(Label(0)),
            Instruction::Label(Label(1)),
            Instruction::Return(None),
        ])
        .unwrap();
        assert_eq!(assembled.code, vec![ICONST_0, 0x9a, 0x00, 0x06, GOTO, 0xff, 0xfc, RETURN]);
        assert_eq!(assembled.labels[&Label(1)], 7);
        assert_eq!(assembled.offsets, vec![0, 0, 1, 4, 7, 7, 8]);
    }

    #[test]
    fn switch_is_padded_to_four_bytes() {
        let assembled = assemble(vec![
            Instruction::IConst(1),
            Instruction::TableSwitch { low: 0, targets: vec![Label(0)], default: Label(0) },
            Instruction::Label(Label(0)),
            Instruction::Return(None),
        ])
        .unwrap();
        // opcode at 1, two padding bytes, default/low/high, one target
        assert_eq!(assembled.labels[&Label(0)], 1 + 1 + 2 + 12 + 4);
        assert_eq!(&assembled.code[1..4], &[TABLESWITCH, 0, 0]);
    }

    #[test]
    fn label_errors_are_internal() {
        let err = assemble(vec![Instruction::Goto(Label(9))]).unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        let err = assemble(vec![Instruction::Label(Label(1)), Instruction::Label(Label(1)), Instruction::Return(None)])
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[test]
    fn far_branch_is_a_limit_error() {
        let mut instructions = vec![Instruction::Goto(Label(0))];
        instructions.extend(std::iter::repeat(Instruction::Nop).take(40_000));
        instructions.push(Instruction::Label(Label(0)));
        instructions.push(Instruction::Return(None));
        let err = assemble(instructions).unwrap_err();
        assert!(matches!(err, Error::Limit { error: LimitError::BranchTooFar { .. }, .. }));
    }

    #[test]
    fn oversized_code_is_a_limit_error() {
        let mut instructions = vec![Instruction::Nop; 70_000];
        instructions.push(Instruction::Return(None));
        let err = assemble(instructions).unwrap_err();
        assert!(matches!(err, Error::Limit { error: LimitError::CodeTooLarge { length: 70_001, .. }, .. }));
    }

    #[test]
    fn conversions_and_arithmetic_map_to_opcodes() {
        let code = assemble(vec![
            Instruction::Convert(ValueKind::Int, ValueKind::Double),
            Instruction::Convert(ValueKind::Double, ValueKind::Float),
            Instruction::Arith(ValueKind::Long, ArithOp::Shl),
            Instruction::Arith(ValueKind::Double, ArithOp::Rem),
            Instruction::Return(None),
        ])
        .unwrap()
        .code;
        assert_eq!(code, vec![0x87, 0x90, 0x79, 0x73, RETURN]);
        assert!(assemble(vec![Instruction::Arith(ValueKind::Float, ArithOp::Xor)]).is_err());
    }
}
