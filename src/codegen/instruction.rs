//! Symbolic method bodies
//!
//! The external code generator describes each body as a list of
//! [`Instruction`]s with symbolic labels and operands. The assembler interns
//! the operands through the class's constant pool and picks the encodings;
//! the stack-map model simulates the same list to compute frames.

use crate::ast::PrimitiveType;
use crate::symbol::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

/// Computational category of a local or stack value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl ValueKind {
    /// Position in the int/long/float/double/reference opcode families
    pub(crate) fn family_index(self) -> u8 {
        match self {
            ValueKind::Int => 0,
            ValueKind::Long => 1,
            ValueKind::Float => 2,
            ValueKind::Double => 3,
            ValueKind::Reference => 4,
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, ValueKind::Long | ValueKind::Double)
    }

    pub fn of(ty: &Type) -> Self {
        match ty {
            Type::Primitive(PrimitiveType::Long) => ValueKind::Long,
            Type::Primitive(PrimitiveType::Float) => ValueKind::Float,
            Type::Primitive(PrimitiveType::Double) => ValueKind::Double,
            Type::Primitive(_) => ValueKind::Int,
            Type::Reference(_) | Type::Array(_) => ValueKind::Reference,
        }
    }
}

/// Array element family for `*aload` / `*astore`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    /// byte and boolean arrays
    Byte,
    Char,
    Short,
}

impl ArrayKind {
    pub(crate) fn family_index(self) -> u8 {
        match self {
            ArrayKind::Int => 0,
            ArrayKind::Long => 1,
            ArrayKind::Float => 2,
            ArrayKind::Double => 3,
            ArrayKind::Reference => 4,
            ArrayKind::Byte => 5,
            ArrayKind::Char => 6,
            ArrayKind::Short => 7,
        }
    }

    /// Kind of the value loaded from or stored into the array
    pub fn value_kind(self) -> ValueKind {
        match self {
            ArrayKind::Long => ValueKind::Long,
            ArrayKind::Float => ValueKind::Float,
            ArrayKind::Double => ValueKind::Double,
            ArrayKind::Reference => ValueKind::Reference,
            ArrayKind::Int | ArrayKind::Byte | ArrayKind::Char | ArrayKind::Short => ValueKind::Int,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl ArithOp {
    /// Shifts and bitwise operations exist for int and long only
    pub fn is_integral_only(self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr | ArithOp::And | ArithOp::Or | ArithOp::Xor)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr)
    }
}

/// Branch condition, in opcode order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    pub(crate) fn offset(self) -> u8 {
        match self {
            Condition::Eq => 0,
            Condition::Ne => 1,
            Condition::Lt => 2,
            Condition::Ge => 3,
            Condition::Gt => 4,
            Condition::Le => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LCmp,
    FCmpL,
    FCmpG,
    DCmpL,
    DCmpG,
}

impl CompareOp {
    pub fn operand_kind(self) -> ValueKind {
        match self {
            CompareOp::LCmp => ValueKind::Long,
            CompareOp::FCmpL | CompareOp::FCmpG => ValueKind::Float,
            CompareOp::DCmpL | CompareOp::DCmpG => ValueKind::Double,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Binds a label to the offset of the next instruction
    Label(Label),
    Nop,
    AConstNull,
    IConst(i32),
    LConst(i64),
    FConst(f32),
    DConst(f64),
    LdcString(String),
    LdcClass(Type),
    Load(ValueKind, u16),
    Store(ValueKind, u16),
    IInc(u16, i16),
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Swap,
    Arith(ValueKind, ArithOp),
    Convert(ValueKind, ValueKind),
    Compare(CompareOp),
    If(Condition, Label),
    IfICmp(Condition, Label),
    /// `true` compares for equality
    IfACmp(bool, Label),
    IfNull(Label),
    IfNonNull(Label),
    Goto(Label),
    TableSwitch { low: i32, targets: Vec<Label>, default: Label },
    LookupSwitch { pairs: Vec<(i32, Label)>, default: Label },
    Return(Option<ValueKind>),
    AThrow,
    /// `owner` is a binary class name
    Field { op: FieldOp, owner: String, name: String, ty: Type },
    Invoke { kind: InvokeKind, owner: String, name: String, params: Vec<Type>, ret: Option<Type> },
    /// Allocate an uninitialized instance of a binary-named class
    New(String),
    /// One-dimensional array of the given element type
    NewArray(Type),
    ArrayLength,
    CheckCast(Type),
    InstanceOf(Type),
}

impl Instruction {
    /// Labels this instruction may jump to
    pub fn branch_targets(&self) -> Vec<Label> {
        match self {
            Instruction::If(_, target)
            | Instruction::IfICmp(_, target)
            | Instruction::IfACmp(_, target)
            | Instruction::IfNull(target)
            | Instruction::IfNonNull(target)
            | Instruction::Goto(target) => vec![*target],
            Instruction::TableSwitch { targets, default, .. } => {
                targets.iter().copied().chain(std::iter::once(*default)).collect()
            }
            Instruction::LookupSwitch { pairs, default, .. } => {
                pairs.iter().map(|(_, l)| *l).chain(std::iter::once(*default)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Whether control can continue with the next instruction
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::Return(_)
                | Instruction::AThrow
        )
    }
}

/// Protected range with its handler. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// Binary class name, `None` catches everything
    pub catch_type: Option<String>,
}

/// A method body as supplied by the code generator
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    pub instructions: Vec<Instruction>,
    pub handlers: Vec<Handler>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl MethodBody {
    pub fn new(max_stack: u16, max_locals: u16, instructions: Vec<Instruction>) -> Self {
        Self { instructions, handlers: Vec::new(), max_stack, max_locals }
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }
}
