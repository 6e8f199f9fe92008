//! Verification model
//!
//! Simulates a lowered body over verification types, one state per
//! instruction, until the states reach a fixpoint. The StackMapTable is then
//! read off the states at branch targets and handler entries.
//!
//! Locals are stored slot by slot with an explicit `Top` after each long or
//! double. The operand stack holds one entry per value; wide values count
//! as two units against `max_stack`.

use std::collections::{BTreeMap, HashMap};

use super::assembler::AssembledCode;
use super::constpool::ConstantPool;
use super::defs::CONSTRUCTOR_METHOD_NAME;
use super::descriptor::{class_constant_name, type_from_class_constant};
use super::frame::{StackMapFrame, StackMapTable, VerificationType};
use super::instruction::{ArithOp, FieldOp, Instruction, InvokeKind, MethodBody, ValueKind};
use crate::ast::PrimitiveType;
use crate::consts::{ROOT_CLASS, STRING_CLASS, THROWABLE_CLASS};
use crate::context::CompilationContext;
use crate::error::{Error, Result};
use crate::symbol::Type;

const CLASS_CLASS: &str = "java/lang/Class";

/// Superclass queries needed to merge reference types
pub trait ClassHierarchy {
    /// The class itself followed by its superclasses up to the root
    fn superclass_chain(&mut self, binary_name: &str) -> Result<Vec<String>>;

    fn is_interface(&mut self, binary_name: &str) -> Result<bool>;
}

impl CompilationContext {
    fn known_class(&mut self, binary_name: &str) -> Result<crate::symbol::ClassId> {
        self.find_class(binary_name)?
            .ok_or_else(|| Error::internal(format!("class {} is unknown to the verification model", binary_name)))
    }
}

impl ClassHierarchy for CompilationContext {
    fn superclass_chain(&mut self, binary_name: &str) -> Result<Vec<String>> {
        let id = self.known_class(binary_name)?;
        let mut chain = vec![binary_name.to_string()];
        chain.extend(self.tree.superclass_chain(id).into_iter().map(|c| self.tree.binary_name(c).to_string()));
        Ok(chain)
    }

    fn is_interface(&mut self, binary_name: &str) -> Result<bool> {
        let id = self.known_class(binary_name)?;
        Ok(self.tree.class(id).is_interface())
    }
}

/// Verification type of a local slot or stack entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VType {
    Top,
    Int,
    Float,
    Long,
    Double,
    Null,
    UninitThis,
    /// Result of the `new` at `offset`, not yet constructed
    Uninit { offset: u32, class: String },
    /// Class-constant name: a binary name or an array descriptor
    Object(String),
}

impl VType {
    pub fn of(ty: &Type) -> Self {
        match ty {
            Type::Primitive(PrimitiveType::Long) => VType::Long,
            Type::Primitive(PrimitiveType::Float) => VType::Float,
            Type::Primitive(PrimitiveType::Double) => VType::Double,
            Type::Primitive(_) => VType::Int,
            // class_constant_name only declines primitives
            _ => VType::Object(class_constant_name(ty).unwrap_or_default()),
        }
    }

    fn of_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Int => VType::Int,
            ValueKind::Long => VType::Long,
            ValueKind::Float => VType::Float,
            ValueKind::Double => VType::Double,
            ValueKind::Reference => VType::Null,
        }
    }

    fn object(name: &str) -> Self {
        VType::Object(name.to_string())
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, VType::Long | VType::Double)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, VType::Null | VType::UninitThis | VType::Uninit { .. } | VType::Object(_))
    }

    fn units(&self) -> usize {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    fn encode(&self, pool: &mut ConstantPool, class: &str) -> Result<VerificationType> {
        Ok(match self {
            VType::Top => VerificationType::Top,
            VType::Int => VerificationType::Integer,
            VType::Float => VerificationType::Float,
            VType::Long => VerificationType::Long,
            VType::Double => VerificationType::Double,
            VType::Null => VerificationType::Null,
            VType::UninitThis => VerificationType::UninitializedThis,
            VType::Uninit { offset, .. } => VerificationType::Uninitialized(*offset as u16),
            VType::Object(name) => {
                VerificationType::Object(pool.add_class(name).map_err(|e| e.for_class(class, pool.len()))?)
            }
        })
    }
}

/// What the model needs to know about the method being compiled
#[derive(Debug, Clone)]
pub struct MethodFrame<'a> {
    /// Binary name of the declaring class
    pub class: &'a str,
    pub name: &'a str,
    pub is_static: bool,
    pub params: &'a [Type],
}

impl MethodFrame<'_> {
    fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_METHOD_NAME
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct State {
    locals: Vec<VType>,
    stack: Vec<VType>,
}

impl State {
    fn stack_units(&self) -> usize {
        self.stack.iter().map(VType::units).sum()
    }

    /// Locals as written into a frame: wide values once, trailing tops dropped
    fn frame_locals(&self) -> Vec<VType> {
        let mut out = Vec::new();
        let mut slot = 0;
        while slot < self.locals.len() {
            let ty = &self.locals[slot];
            slot += ty.units();
            out.push(ty.clone());
        }
        while out.last() == Some(&VType::Top) {
            out.pop();
        }
        out
    }

    fn replace(&mut self, from: &VType, to: &VType) {
        for slot in self.locals.iter_mut().chain(self.stack.iter_mut()) {
            if slot == from {
                *slot = to.clone();
            }
        }
    }
}

pub struct StackMapBuilder<'a, H: ClassHierarchy + ?Sized> {
    hierarchy: &'a mut H,
    method: MethodFrame<'a>,
    body: &'a MethodBody,
    code: &'a AssembledCode,
    labels: HashMap<super::instruction::Label, usize>,
}

impl<'a, H: ClassHierarchy + ?Sized> StackMapBuilder<'a, H> {
    pub fn new(hierarchy: &'a mut H, method: MethodFrame<'a>, body: &'a MethodBody, code: &'a AssembledCode) -> Self {
        let labels = body
            .instructions
            .iter()
            .enumerate()
            .filter_map(|(index, instruction)| match instruction {
                Instruction::Label(label) => Some((*label, index)),
                _ => None,
            })
            .collect();
        Self { hierarchy, method, body, code, labels }
    }

    fn internal(&self, message: impl std::fmt::Display) -> Error {
        Error::internal(format!("{}.{}: {}", self.method.class, self.method.name, message))
    }

    fn target(&self, label: &super::instruction::Label) -> Result<usize> {
        self.labels.get(label).copied().ok_or_else(|| self.internal(format!("label {:?} is never bound", label)))
    }

    fn initial_state(&self) -> Result<State> {
        let mut locals = Vec::new();
        if !self.method.is_static {
            let receiver =
                if self.method.is_constructor() { VType::UninitThis } else { VType::object(self.method.class) };
            locals.push(receiver);
        }
        for param in self.method.params {
            let ty = VType::of(param);
            let wide = ty.is_wide();
            locals.push(ty);
            if wide {
                locals.push(VType::Top);
            }
        }
        let max_locals = self.body.max_locals as usize;
        if locals.len() > max_locals {
            return Err(self.internal(format!(
                "parameters need {} local slots, max_locals is {}",
                locals.len(),
                max_locals
            )));
        }
        locals.resize(max_locals, VType::Top);
        Ok(State { locals, stack: Vec::new() })
    }

    /// Run the model to a fixpoint and derive the frame table
    pub fn build(mut self, pool: &mut ConstantPool) -> Result<StackMapTable> {
        let body = self.body;
        let count = body.instructions.len();
        let mut states: Vec<Option<State>> = vec![None; count];
        if count == 0 {
            return Err(self.internal("empty method body"));
        }
        let initial = self.initial_state()?;
        states[0] = Some(initial.clone());

        // (first index, end index, handler index, caught type) per handler
        let mut handlers = Vec::with_capacity(self.body.handlers.len());
        for handler in &self.body.handlers {
            let caught = handler.catch_type.as_deref().unwrap_or(THROWABLE_CLASS);
            handlers.push((
                self.target(&handler.start)?,
                self.target(&handler.end)?,
                self.target(&handler.handler)?,
                VType::object(caught),
            ));
        }

        let mut worklist = vec![0usize];
        while let Some(index) = worklist.pop() {
            let state = match &states[index] {
                Some(state) => state.clone(),
                None => continue,
            };
            let instruction = &body.instructions[index];
            let out = self.step(index, instruction, state.clone())?;

            let mut successors = Vec::new();
            for label in instruction.branch_targets() {
                successors.push((self.target(&label)?, out.clone()));
            }
            if instruction.falls_through() {
                if index + 1 >= count {
                    return Err(self.internal("control falls off the end of the code"));
                }
                successors.push((index + 1, out.clone()));
            }
            for (start, end, entry, caught) in &handlers {
                if (*start..*end).contains(&index) {
                    for locals in [&state.locals, &out.locals] {
                        let thrown = State { locals: locals.clone(), stack: vec![caught.clone()] };
                        successors.push((*entry, thrown));
                    }
                }
            }

            for (successor, incoming) in successors {
                let changed = match &states[successor] {
                    None => {
                        states[successor] = Some(incoming);
                        true
                    }
                    Some(existing) => {
                        let merged = self.merge_states(existing, &incoming)?;
                        let changed = &merged != existing;
                        states[successor] = Some(merged);
                        changed
                    }
                };
                if changed && !worklist.contains(&successor) {
                    worklist.push(successor);
                }
            }
        }

        for (index, instruction) in self.body.instructions.iter().enumerate() {
            if states[index].is_none() && !matches!(instruction, Instruction::Label(_)) {
                return Err(self.internal(format!("unreachable code at offset {}", self.code.offsets[index])));
            }
        }

        // Frame offsets, each mapped to the last instruction index laid out there
        let mut frame_points: BTreeMap<u32, usize> = BTreeMap::new();
        let mark = |index: usize, points: &mut BTreeMap<u32, usize>| {
            let offset = self.code.offsets[index];
            let last = (index..count).take_while(|i| self.code.offsets[*i] == offset).last().unwrap_or(index);
            points.insert(offset, last);
        };
        for instruction in &self.body.instructions {
            for label in instruction.branch_targets() {
                mark(self.target(&label)?, &mut frame_points);
            }
        }
        for (_, _, entry, _) in &handlers {
            mark(*entry, &mut frame_points);
        }

        let mut table = StackMapTable::new();
        let mut previous_locals = initial.frame_locals();
        let mut previous_offset: Option<u32> = None;
        for (offset, index) in frame_points {
            let state = states[index].as_ref().ok_or_else(|| self.internal(format!("no state at offset {}", offset)))?;
            let offset_delta = match previous_offset {
                None => offset,
                Some(prev) => offset - prev - 1,
            } as u16;
            let locals = state.frame_locals();
            let frame = if state.stack.is_empty() && locals == previous_locals {
                StackMapFrame::Same { offset_delta }
            } else {
                let class = self.method.class;
                StackMapFrame::Full {
                    offset_delta,
                    locals: locals.iter().map(|t| t.encode(pool, class)).collect::<Result<_>>()?,
                    stack: state.stack.iter().map(|t| t.encode(pool, class)).collect::<Result<_>>()?,
                }
            };
            log::trace!("{}.{}: frame at {}: {:?}", self.method.class, self.method.name, offset, frame);
            table.frames.push(frame);
            previous_locals = locals;
            previous_offset = Some(offset);
        }
        Ok(table)
    }

    fn merge_states(&mut self, existing: &State, incoming: &State) -> Result<State> {
        if existing.stack.len() != incoming.stack.len() {
            return Err(self.internal(format!(
                "stack heights {} and {} meet at a join",
                existing.stack.len(),
                incoming.stack.len()
            )));
        }
        let mut locals = Vec::with_capacity(existing.locals.len());
        for (a, b) in existing.locals.iter().zip(&incoming.locals) {
            locals.push(self.merge_types(a, b)?);
        }
        // A wide value whose second half merged away is dead
        for slot in 0..locals.len() {
            if locals[slot].is_wide() && locals.get(slot + 1) != Some(&VType::Top) {
                locals[slot] = VType::Top;
            }
        }
        let mut stack = Vec::with_capacity(existing.stack.len());
        for (a, b) in existing.stack.iter().zip(&incoming.stack) {
            let merged = self.merge_types(a, b)?;
            if merged == VType::Top {
                return Err(self.internal(format!("stack types {:?} and {:?} cannot be merged", a, b)));
            }
            stack.push(merged);
        }
        Ok(State { locals, stack })
    }

    fn merge_types(&mut self, a: &VType, b: &VType) -> Result<VType> {
        Ok(match (a, b) {
            _ if a == b => a.clone(),
            (VType::Null, VType::Object(_)) => b.clone(),
            (VType::Object(_), VType::Null) => a.clone(),
            (VType::Object(x), VType::Object(y)) => VType::Object(self.common_superclass(x, y)?),
            _ => VType::Top,
        })
    }

    fn common_superclass(&mut self, x: &str, y: &str) -> Result<String> {
        if x.starts_with('[') || y.starts_with('[') {
            return Ok(ROOT_CLASS.to_string());
        }
        if self.hierarchy.is_interface(x)? || self.hierarchy.is_interface(y)? {
            return Ok(ROOT_CLASS.to_string());
        }
        let left = self.hierarchy.superclass_chain(x)?;
        let right = self.hierarchy.superclass_chain(y)?;
        Ok(left.into_iter().find(|c| right.contains(c)).unwrap_or_else(|| ROOT_CLASS.to_string()))
    }

    fn pop(&self, state: &mut State) -> Result<VType> {
        state.stack.pop().ok_or_else(|| self.internal("operand stack underflow"))
    }

    fn pop_n(&self, state: &mut State, n: usize) -> Result<()> {
        for _ in 0..n {
            self.pop(state)?;
        }
        Ok(())
    }

    fn pop_narrow(&self, state: &mut State) -> Result<VType> {
        let value = self.pop(state)?;
        if value.is_wide() {
            return Err(self.internal("category-1 stack operation on a long or double"));
        }
        Ok(value)
    }

    fn push(&self, state: &mut State, value: VType) -> Result<()> {
        state.stack.push(value);
        let units = state.stack_units();
        if units > self.body.max_stack as usize {
            return Err(self.internal(format!("stack needs {} units, max_stack is {}", units, self.body.max_stack)));
        }
        Ok(())
    }

    fn local_slot(&self, state: &State, index: u16, kind: ValueKind) -> Result<usize> {
        let slot = index as usize;
        let width = if kind.is_wide() { 2 } else { 1 };
        if slot + width > state.locals.len() {
            return Err(self.internal(format!("local {} is beyond max_locals {}", index, state.locals.len())));
        }
        Ok(slot)
    }

    /// Effect of one instruction on the state reaching it
    fn step(&self, index: usize, instruction: &Instruction, mut state: State) -> Result<State> {
        use Instruction as I;
        let s = &mut state;
        match instruction {
            I::Label(_) | I::Nop | I::Goto(_) | I::IInc(..) => {}
            I::AConstNull => self.push(s, VType::Null)?,
            I::IConst(_) => self.push(s, VType::Int)?,
            I::LConst(_) => self.push(s, VType::Long)?,
            I::FConst(_) => self.push(s, VType::Float)?,
            I::DConst(_) => self.push(s, VType::Double)?,
            I::LdcString(_) => self.push(s, VType::object(STRING_CLASS))?,
            I::LdcClass(_) => self.push(s, VType::object(CLASS_CLASS))?,
            I::Load(kind, local) => {
                let slot = self.local_slot(s, *local, *kind)?;
                let value = s.locals[slot].clone();
                let compatible = match kind {
                    ValueKind::Reference => value.is_reference(),
                    other => value == VType::of_kind(*other),
                };
                if !compatible {
                    return Err(self.internal(format!("load of {:?} from local {} holding {:?}", kind, local, value)));
                }
                self.push(s, value)?;
            }
            I::Store(kind, local) => {
                let slot = self.local_slot(s, *local, *kind)?;
                let value = self.pop(s)?;
                if slot > 0 && s.locals[slot - 1].is_wide() {
                    s.locals[slot - 1] = VType::Top;
                }
                if kind.is_wide() {
                    s.locals[slot + 1] = VType::Top;
                }
                s.locals[slot] = value;
            }
            I::ArrayLoad(kind) => {
                self.pop(s)?;
                let array = self.pop(s)?;
                let element = match (kind.value_kind(), &array) {
                    (ValueKind::Reference, VType::Object(name)) => match type_from_class_constant(name) {
                        Ok(Type::Array(element)) => VType::of(&element),
                        _ => return Err(self.internal(format!("aaload from non-array {}", name))),
                    },
                    (ValueKind::Reference, _) => VType::Null,
                    (other, _) => VType::of_kind(other),
                };
                self.push(s, element)?;
            }
            I::ArrayStore(_) => self.pop_n(s, 3)?,
            I::Pop => {
                self.pop_narrow(s)?;
            }
            I::Pop2 => {
                if !self.pop(s)?.is_wide() {
                    self.pop_narrow(s)?;
                }
            }
            I::Dup => {
                let top = self.pop_narrow(s)?;
                self.push(s, top.clone())?;
                self.push(s, top)?;
            }
            I::DupX1 => {
                let v1 = self.pop_narrow(s)?;
                let v2 = self.pop_narrow(s)?;
                for v in [v1.clone(), v2, v1] {
                    self.push(s, v)?;
                }
            }
            I::DupX2 => {
                let v1 = self.pop_narrow(s)?;
                let v2 = self.pop(s)?;
                if v2.is_wide() {
                    for v in [v1.clone(), v2, v1] {
                        self.push(s, v)?;
                    }
                } else {
                    let v3 = self.pop_narrow(s)?;
                    for v in [v1.clone(), v3, v2, v1] {
                        self.push(s, v)?;
                    }
                }
            }
            I::Dup2 => {
                let v1 = self.pop(s)?;
                if v1.is_wide() {
                    self.push(s, v1.clone())?;
                    self.push(s, v1)?;
                } else {
                    let v2 = self.pop_narrow(s)?;
                    for v in [v2.clone(), v1.clone(), v2, v1] {
                        self.push(s, v)?;
                    }
                }
            }
            I::Swap => {
                let v1 = self.pop_narrow(s)?;
                let v2 = self.pop_narrow(s)?;
                self.push(s, v1)?;
                self.push(s, v2)?;
            }
            I::Arith(kind, op) => {
                let operands = if *op == ArithOp::Neg { 1 } else { 2 };
                self.pop_n(s, operands)?;
                self.push(s, VType::of_kind(*kind))?;
            }
            I::Convert(_, to) => {
                self.pop(s)?;
                self.push(s, VType::of_kind(*to))?;
            }
            I::Compare(_) => {
                self.pop_n(s, 2)?;
                self.push(s, VType::Int)?;
            }
            I::If(..) | I::IfNull(_) | I::IfNonNull(_) | I::TableSwitch { .. } | I::LookupSwitch { .. } => {
                self.pop(s)?;
            }
            I::IfICmp(..) | I::IfACmp(..) => self.pop_n(s, 2)?,
            I::Return(value) => {
                if value.is_some() {
                    self.pop(s)?;
                }
                if self.method.is_constructor() && s.locals.contains(&VType::UninitThis) {
                    return Err(self.internal("constructor returns before the superclass constructor runs"));
                }
            }
            I::AThrow => {
                self.pop(s)?;
            }
            I::Field { op, ty, .. } => match op {
                FieldOp::GetStatic => self.push(s, VType::of(ty))?,
                FieldOp::PutStatic => self.pop_n(s, 1)?,
                FieldOp::GetField => {
                    self.pop(s)?;
                    self.push(s, VType::of(ty))?;
                }
                FieldOp::PutField => self.pop_n(s, 2)?,
            },
            I::Invoke { kind, owner, name, params, ret } => {
                self.pop_n(s, params.len())?;
                if *kind != InvokeKind::Static {
                    let receiver = self.pop(s)?;
                    if name == CONSTRUCTOR_METHOD_NAME {
                        let constructed = match &receiver {
                            VType::UninitThis => VType::object(self.method.class),
                            VType::Uninit { class, .. } => VType::object(class),
                            other => {
                                return Err(self.internal(format!("{}.<init> called on initialized {:?}", owner, other)))
                            }
                        };
                        s.replace(&receiver, &constructed);
                    }
                }
                if let Some(ret) = ret {
                    self.push(s, VType::of(ret))?;
                }
            }
            I::New(class) => {
                let offset = self.code.offsets[index];
                self.push(s, VType::Uninit { offset, class: class.clone() })?;
            }
            I::NewArray(element) => {
                self.pop(s)?;
                self.push(s, VType::of(&Type::array_of(element.clone())))?;
            }
            I::ArrayLength | I::InstanceOf(_) => {
                self.pop(s)?;
                self.push(s, VType::Int)?;
            }
            I::CheckCast(ty) => {
                self.pop(s)?;
                self.push(s, VType::of(ty))?;
            }
        }
        Ok(state)
    }
}
