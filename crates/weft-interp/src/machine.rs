// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The VIR machine: function table, foreign functions and container storage.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use weft_ast::{BinOp, ReduceOp, ScalarKind, UnaryOp};
use weft_vir::{
    FunctionRef, LocalId, VirConst, VirFunction, VirOperand, VirRValue, VirStmt, VirTerminator,
    VirType,
};

use crate::value::{Aggregate, Scalar, Value};
use crate::InterpError;

type ForeignFn = Box<dyn FnMut(&[Scalar]) -> Scalar>;

const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

/// Element storage of one container, one array per field.
struct Buffer {
    elem: VirType,
    fields: Vec<ScalarKind>,
    len: usize,
    data: Vec<Scalar>,
}

impl Buffer {
    fn new(elem: VirType, len: usize) -> Result<Self, InterpError> {
        let fields = match &elem {
            VirType::Scalar(k) => vec![*k],
            VirType::Aggregate { fields, .. } => fields.clone(),
            other => {
                return Err(InterpError::TypeMismatch(format!(
                    "containers cannot hold {}",
                    other
                )))
            }
        };
        let mut data = Vec::with_capacity(fields.len() * len);
        for kind in &fields {
            data.extend(std::iter::repeat(Scalar::zero(*kind)).take(len));
        }
        Ok(Buffer {
            elem,
            fields,
            len,
            data,
        })
    }

    fn check(&self, index: i128) -> Result<usize, InterpError> {
        if index < 0 || index >= self.len as i128 {
            return Err(InterpError::OutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(index as usize)
    }

    fn read(&self, index: i128) -> Result<Value, InterpError> {
        let i = self.check(index)?;
        let instance: Vec<Scalar> = (0..self.fields.len())
            .map(|f| self.data[f * self.len + i])
            .collect();
        match self.elem {
            VirType::Scalar(_) => Ok(Value::Scalar(instance[0])),
            _ => Ok(Value::instance(&instance)),
        }
    }

    fn write(&mut self, index: i128, value: &Value) -> Result<(), InterpError> {
        let i = self.check(index)?;
        let value = value.clone().conform(&self.elem)?;
        let instance = match &value {
            Value::Scalar(s) => vec![*s],
            Value::Aggregate(a) => a.instance(0),
            other => return Err(InterpError::TypeMismatch(format!("container element {:?}", other))),
        };
        for (f, v) in instance.into_iter().enumerate() {
            self.data[f * self.len + i] = v;
        }
        Ok(())
    }
}

/// Executes VIR functions.
pub struct Machine {
    functions: IndexMap<String, Rc<VirFunction>>,
    foreign: HashMap<String, ForeignFn>,
    buffers: Vec<Buffer>,
    steps: u64,
    step_limit: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self {
            functions: IndexMap::new(),
            foreign: HashMap::new(),
            buffers: Vec::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn load<'a>(&mut self, functions: impl IntoIterator<Item = &'a VirFunction>) {
        for f in functions {
            self.functions.insert(f.name.clone(), Rc::new(f.clone()));
        }
    }

    /// Register the target of `c_call(name, ...)`.
    pub fn define_foreign(&mut self, name: impl Into<String>, f: impl FnMut(&[Scalar]) -> Scalar + 'static) {
        self.foreign.insert(name.into(), Box::new(f));
    }

    pub fn set_step_limit(&mut self, limit: u64) {
        self.step_limit = limit;
    }

    /// New container of `elements.len()` elements of type `elem`.
    pub fn alloc_buffer(&mut self, elem: VirType, elements: &[Value]) -> Result<Value, InterpError> {
        let mut buffer = Buffer::new(elem, elements.len())?;
        for (i, v) in elements.iter().enumerate() {
            buffer.write(i as i128, v)?;
        }
        self.buffers.push(buffer);
        Ok(Value::Buffer(self.buffers.len() - 1))
    }

    pub fn read_buffer(&self, handle: &Value) -> Result<Vec<Value>, InterpError> {
        let buffer = self.buffer(handle)?;
        (0..buffer.len as i128).map(|i| buffer.read(i)).collect()
    }

    /// Call `name` and return one value per result slot.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        self.steps = 0;
        self.invoke(name, args)
    }

    fn buffer(&self, handle: &Value) -> Result<&Buffer, InterpError> {
        match handle {
            Value::Buffer(h) => self.buffers.get(*h).ok_or(InterpError::DanglingBuffer),
            _ => Err(InterpError::DanglingBuffer),
        }
    }

    fn buffer_mut(&mut self, handle: &Value) -> Result<&mut Buffer, InterpError> {
        match handle {
            Value::Buffer(h) => self.buffers.get_mut(*h).ok_or(InterpError::DanglingBuffer),
            _ => Err(InterpError::DanglingBuffer),
        }
    }

    fn tick(&mut self) -> Result<(), InterpError> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(InterpError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        let func = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| InterpError::UndefinedFunction(name.to_string()))?;
        if args.len() != func.params.len() {
            return Err(InterpError::ArityMismatch {
                function: func.name.clone(),
                expected: func.params.len(),
                got: args.len(),
            });
        }

        let mut frame = Frame {
            func: &func,
            values: func.locals.iter().map(|l| Value::zero(&l.ty)).collect(),
        };
        for (param, arg) in func.params.iter().zip(args) {
            frame.set(param.id, arg)?;
        }

        let mut block = func.entry_block;
        loop {
            let b = func
                .block(block)
                .ok_or_else(|| InterpError::Unreachable(func.name.clone()))?;
            for stmt in &b.statements {
                self.tick()?;
                self.exec(&mut frame, stmt)?;
            }
            self.tick()?;
            match &b.terminator {
                VirTerminator::Return { values } => {
                    return values
                        .iter()
                        .zip(&func.results)
                        .map(|(v, ty)| frame.operand(v)?.conform(ty))
                        .collect();
                }
                VirTerminator::Goto { target } => block = *target,
                VirTerminator::Branch {
                    cond,
                    then_block,
                    else_block,
                } => {
                    let cond = frame.scalar(cond)?.truthy();
                    block = if cond { *then_block } else { *else_block };
                }
                VirTerminator::Unreachable => return Err(InterpError::Unreachable(func.name.clone())),
            }
        }
    }

    fn exec(&mut self, frame: &mut Frame<'_>, stmt: &VirStmt) -> Result<(), InterpError> {
        match stmt {
            VirStmt::Assign { dst, rvalue } => {
                let ty = frame.ty(*dst)?.clone();
                let value = frame.rvalue(rvalue, &ty)?;
                frame.set(*dst, value)
            }
            VirStmt::Call { dsts, func, args } => {
                let args = args.iter().map(|a| frame.operand(a)).collect::<Result<Vec<_>, _>>()?;
                let results = self.dispatch(func, args)?;
                for (dst, value) in dsts.iter().zip(results) {
                    frame.set(*dst, value)?;
                }
                Ok(())
            }
            VirStmt::LaneCall {
                dsts,
                func,
                args,
                mask,
                lanes,
            } => {
                let lanes = *lanes as usize;
                let mask = frame.mask(mask, lanes)?;
                let args = args.iter().map(|a| frame.operand(a)).collect::<Result<Vec<_>, _>>()?;
                let mut outs = dsts
                    .iter()
                    .map(|d| frame.ty(*d).map(Value::zero))
                    .collect::<Result<Vec<_>, _>>()?;
                for lane in (0..lanes).filter(|l| mask[*l]) {
                    let lane_args = args.iter().map(|a| a.lane(lane)).collect::<Result<Vec<_>, _>>()?;
                    let results = self.dispatch(func, lane_args)?;
                    for (out, value) in outs.iter_mut().zip(results) {
                        out.set_lane(lane, &value)?;
                    }
                }
                for (dst, value) in dsts.iter().zip(outs) {
                    frame.set(*dst, value)?;
                }
                Ok(())
            }
            VirStmt::ContainerAlloc { dst, len } => {
                let elem = match frame.ty(*dst)? {
                    VirType::Buffer { elem } => (**elem).clone(),
                    other => return Err(InterpError::TypeMismatch(format!("container of type {}", other))),
                };
                let len = frame.scalar(len)?.to_int().max(0) as usize;
                self.buffers.push(Buffer::new(elem, len)?);
                frame.set(*dst, Value::Buffer(self.buffers.len() - 1))
            }
            VirStmt::Gather {
                dst,
                buffer,
                index,
                guard,
            } => {
                if !frame.guard(guard.as_ref())? {
                    let zero = Value::zero(frame.ty(*dst)?);
                    return frame.set(*dst, zero);
                }
                let index = frame.scalar(index)?.to_int();
                let value = self.buffer(frame.local(*buffer)?)?.read(index)?;
                frame.set(*dst, value)
            }
            VirStmt::Scatter {
                buffer,
                index,
                value,
                guard,
            } => {
                if !frame.guard(guard.as_ref())? {
                    return Ok(());
                }
                let index = frame.scalar(index)?.to_int();
                let value = frame.operand(value)?;
                let handle = frame.local(*buffer)?.clone();
                self.buffer_mut(&handle)?.write(index, &value)
            }
            VirStmt::LoadBatch {
                dst,
                buffer,
                base,
                mask,
            } => {
                let mut out = Value::zero(frame.ty(*dst)?);
                let lanes = out.lanes();
                let bits = frame.optional_mask(mask.as_ref(), lanes)?;
                let base = frame.scalar(base)?.to_int();
                let buffer = self.buffer(frame.local(*buffer)?)?;
                for lane in (0..lanes).filter(|l| bits[*l]) {
                    out.set_lane(lane, &buffer.read(base + lane as i128)?)?;
                }
                frame.set(*dst, out)
            }
            VirStmt::StoreBatch {
                buffer,
                base,
                value,
                mask,
            } => {
                let value = frame.operand(value)?;
                let lanes = value.lanes();
                let bits = frame.optional_mask(mask.as_ref(), lanes)?;
                let base = frame.scalar(base)?.to_int();
                let handle = frame.local(*buffer)?.clone();
                let buffer = self.buffer_mut(&handle)?;
                for lane in (0..lanes).filter(|l| bits[*l]) {
                    buffer.write(base + lane as i128, &value.lane(lane)?)?;
                }
                Ok(())
            }
            VirStmt::Transpose { dst, src, to } => match frame.operand(src)? {
                Value::Aggregate(a) => frame.set(*dst, Value::Aggregate(a.relayout(*to))),
                other => Err(InterpError::TypeMismatch(format!("cannot transpose {:?}", other))),
            },
        }
    }

    fn dispatch(&mut self, func: &FunctionRef, args: Vec<Value>) -> Result<Vec<Value>, InterpError> {
        if !func.is_extern {
            return self.invoke(&func.name, args);
        }
        let scalars = args
            .iter()
            .map(|a| {
                a.as_scalar()
                    .ok_or_else(|| InterpError::TypeMismatch(format!("foreign argument {:?}", a)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let f = self
            .foreign
            .get_mut(&func.name)
            .ok_or_else(|| InterpError::UndefinedFunction(func.name.clone()))?;
        Ok(vec![Value::Scalar(f(&scalars))])
    }
}

/// Locals of one activation.
struct Frame<'f> {
    func: &'f VirFunction,
    values: Vec<Value>,
}

impl Frame<'_> {
    fn ty(&self, id: LocalId) -> Result<&VirType, InterpError> {
        self.func
            .local(id)
            .map(|l| &l.ty)
            .ok_or_else(|| InterpError::TypeMismatch(format!("unknown local _{} in `{}`", id.0, self.func.name)))
    }

    fn local(&self, id: LocalId) -> Result<&Value, InterpError> {
        self.values
            .get(id.0 as usize)
            .ok_or_else(|| InterpError::TypeMismatch(format!("unknown local _{} in `{}`", id.0, self.func.name)))
    }

    fn set(&mut self, id: LocalId, value: Value) -> Result<(), InterpError> {
        let value = value.conform(self.ty(id)?).map_err(|e| {
            InterpError::TypeMismatch(format!("writing _{} in `{}`: {}", id.0, self.func.name, e))
        })?;
        self.values[id.0 as usize] = value;
        Ok(())
    }

    fn operand(&self, op: &VirOperand) -> Result<Value, InterpError> {
        match op {
            VirOperand::Local(id) => self.local(*id).cloned(),
            VirOperand::Constant(c) => Ok(Value::Scalar(match c {
                VirConst::Int(v) => Scalar::Int(*v as i128),
                VirConst::Real(r) => Scalar::Real(*r),
                VirConst::Bool(b) => Scalar::Bool(*b),
            })),
        }
    }

    fn scalar(&self, op: &VirOperand) -> Result<Scalar, InterpError> {
        let value = self.operand(op)?;
        value
            .as_scalar()
            .ok_or_else(|| InterpError::TypeMismatch(format!("expected a scalar, found {:?}", value)))
    }

    fn mask(&self, op: &VirOperand, lanes: usize) -> Result<Vec<bool>, InterpError> {
        match self.operand(op)? {
            Value::Mask(m) if m.len() == lanes => Ok(m),
            Value::Scalar(s) => Ok(vec![s.truthy(); lanes]),
            other => Err(InterpError::TypeMismatch(format!("expected a {}-lane mask, found {:?}", lanes, other))),
        }
    }

    fn optional_mask(&self, op: Option<&VirOperand>, lanes: usize) -> Result<Vec<bool>, InterpError> {
        match op {
            Some(op) => self.mask(op, lanes),
            None => Ok(vec![true; lanes]),
        }
    }

    fn guard(&self, op: Option<&VirOperand>) -> Result<bool, InterpError> {
        match op {
            Some(op) => Ok(self.scalar(op)?.truthy()),
            None => Ok(true),
        }
    }

    fn rvalue(&self, rvalue: &VirRValue, ty: &VirType) -> Result<Value, InterpError> {
        match rvalue {
            VirRValue::Use(op) => self.operand(op),
            VirRValue::BinaryOp { op, left, right } => binary(*op, self.operand(left)?, self.operand(right)?),
            VirRValue::UnaryOp { op, operand } => map_lanes(self.operand(operand)?, ty, |s| unary(*op, s)),
            VirRValue::Cast { value, to } => {
                let to = *to;
                map_lanes(self.operand(value)?, ty, |s| Ok(s.normalize(to)))
            }
            VirRValue::Splat { value, lanes } => splat(self.operand(value)?, *lanes as usize, ty),
            VirRValue::Select {
                mask,
                then_value,
                else_value,
            } => {
                let then_value = self.operand(then_value)?;
                let else_value = self.operand(else_value)?;
                match self.operand(mask)? {
                    Value::Scalar(s) => Ok(if s.truthy() { then_value } else { else_value }),
                    Value::Mask(bits) => {
                        let mut out = then_value;
                        if out.lanes() != bits.len() {
                            return Err(InterpError::TypeMismatch(format!(
                                "select of {} lanes under a {}-lane mask",
                                out.lanes(),
                                bits.len()
                            )));
                        }
                        for lane in (0..bits.len()).filter(|l| !bits[*l]) {
                            out.set_lane(lane, &else_value.lane(lane)?)?;
                        }
                        Ok(out)
                    }
                    other => Err(InterpError::TypeMismatch(format!("select mask {:?}", other))),
                }
            }
            VirRValue::Iota { elem, lanes } => Value::from_lanes(
                ty,
                (0..*lanes).map(|l| Scalar::Int(l as i128).normalize(*elem)).collect(),
            ),
            VirRValue::Extract { vector, lane } => {
                let lane = self.scalar(lane)?.to_int();
                let vector = self.operand(vector)?;
                if lane < 0 {
                    return Err(InterpError::OutOfBounds {
                        index: lane,
                        len: vector.lanes(),
                    });
                }
                vector.lane(lane as usize)
            }
            VirRValue::Reduce { op, value, mask } => {
                let value = self.operand(value)?;
                let lanes = value.lanes();
                let bits = self.optional_mask(mask.as_ref(), lanes)?;
                let selected = (0..lanes)
                    .filter(|l| bits[*l])
                    .map(|l| value.lane(l).and_then(|v| lane_scalar(&v)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Scalar(reduce(*op, &selected)))
            }
            VirRValue::FieldGet { base, field } => match self.operand(base)? {
                Value::Aggregate(a) if (*field as usize) < a.fields => {
                    let lanes = (0..a.lanes).map(|l| a.get(l, *field as usize)).collect();
                    Value::from_lanes(ty, lanes)
                }
                other => Err(InterpError::TypeMismatch(format!("field {} of {:?}", field, other))),
            },
            VirRValue::FieldSet { base, field, value } => {
                let field = *field as usize;
                let mut agg = match self.operand(base)? {
                    Value::Aggregate(a) if field < a.fields => a,
                    other => return Err(InterpError::TypeMismatch(format!("field {} of {:?}", field, other))),
                };
                let value = self.operand(value)?;
                for lane in 0..agg.lanes {
                    agg.set(lane, field, lane_scalar(&value.lane(lane)?)?);
                }
                Ok(Value::Aggregate(agg))
            }
            VirRValue::Compose { fields } => {
                let VirType::Aggregate { lanes, layout, .. } = ty else {
                    return Err(InterpError::TypeMismatch(format!("compose into {}", ty)));
                };
                let values = fields.iter().map(|f| self.operand(f)).collect::<Result<Vec<_>, _>>()?;
                let instances = (0..*lanes as usize)
                    .map(|lane| {
                        values
                            .iter()
                            .map(|v| v.lane(lane).and_then(|v| lane_scalar(&v)))
                            .collect::<Result<Vec<_>, _>>()
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let mut agg = Aggregate::from_instances(*layout, &instances);
                agg.fields = fields.len();
                Ok(Value::Aggregate(agg))
            }
        }
    }
}

fn lane_scalar(value: &Value) -> Result<Scalar, InterpError> {
    value
        .as_scalar()
        .ok_or_else(|| InterpError::TypeMismatch(format!("expected one lane, found {:?}", value)))
}

/// Apply `f` to every lane of a scalar, vector or mask, shaped as `ty`.
fn map_lanes(
    value: Value,
    ty: &VirType,
    f: impl Fn(Scalar) -> Result<Scalar, InterpError>,
) -> Result<Value, InterpError> {
    let lanes = match value {
        Value::Scalar(s) => vec![s],
        Value::Vector(v) => v,
        Value::Mask(m) => m.into_iter().map(Scalar::Bool).collect(),
        other => return Err(InterpError::TypeMismatch(format!("lane-wise operation on {:?}", other))),
    };
    let lanes = lanes.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
    Value::from_lanes(ty, lanes)
}

fn splat(value: Value, lanes: usize, ty: &VirType) -> Result<Value, InterpError> {
    match (value, ty) {
        (Value::Scalar(s), VirType::Vector { .. } | VirType::Mask { .. }) => Value::from_lanes(ty, vec![s; lanes]),
        (Value::Aggregate(a), VirType::Aggregate { layout, .. }) if a.lanes == 1 => {
            let mut out = Aggregate::from_instances(*layout, &vec![a.instance(0); lanes]);
            out.fields = a.fields;
            Ok(Value::Aggregate(out))
        }
        (value, ty) => Err(InterpError::TypeMismatch(format!("cannot splat {:?} into {}", value, ty))),
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> Result<Value, InterpError> {
    match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(scalar_binary(op, a, b)?)),
        (Value::Vector(a), Value::Vector(b)) if a.len() == b.len() => {
            let lanes = a
                .into_iter()
                .zip(b)
                .map(|(a, b)| scalar_binary(op, a, b))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if op.is_comparison() {
                Value::Mask(lanes.into_iter().map(Scalar::truthy).collect())
            } else {
                Value::Vector(lanes)
            })
        }
        (Value::Mask(a), Value::Mask(b)) if a.len() == b.len() => a
            .into_iter()
            .zip(b)
            .map(|(a, b)| scalar_binary(op, Scalar::Bool(a), Scalar::Bool(b)).map(Scalar::truthy))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Mask),
        (a, b) => Err(InterpError::TypeMismatch(format!(
            "`{}` between {:?} and {:?}",
            op.symbol(),
            a,
            b
        ))),
    }
}

fn scalar_binary(op: BinOp, a: Scalar, b: Scalar) -> Result<Scalar, InterpError> {
    if let (Scalar::Bool(x), Scalar::Bool(y)) = (a, b) {
        return Ok(Scalar::Bool(match op {
            BinOp::And | BinOp::BitAnd => x && y,
            BinOp::Or | BinOp::BitOr => x || y,
            BinOp::BitXor | BinOp::Ne => x != y,
            BinOp::Eq => x == y,
            _ => {
                return Err(InterpError::TypeMismatch(format!(
                    "`{}` on booleans",
                    op.symbol()
                )))
            }
        }));
    }
    if matches!(op, BinOp::And | BinOp::Or) {
        let (x, y) = (a.truthy(), b.truthy());
        return Ok(Scalar::Bool(if op == BinOp::And { x && y } else { x || y }));
    }

    let real = matches!(a, Scalar::Real(_)) || matches!(b, Scalar::Real(_));
    if real {
        let (x, y) = (a.to_real(), b.to_real());
        return Ok(match op {
            BinOp::Add => Scalar::Real(x + y),
            BinOp::Sub => Scalar::Real(x - y),
            BinOp::Mul => Scalar::Real(x * y),
            BinOp::Div => Scalar::Real(x / y),
            BinOp::Mod => Scalar::Real(x % y),
            BinOp::Eq => Scalar::Bool(x == y),
            BinOp::Ne => Scalar::Bool(x != y),
            BinOp::Lt => Scalar::Bool(x < y),
            BinOp::Gt => Scalar::Bool(x > y),
            BinOp::Le => Scalar::Bool(x <= y),
            BinOp::Ge => Scalar::Bool(x >= y),
            _ => {
                return Err(InterpError::TypeMismatch(format!(
                    "`{}` on reals",
                    op.symbol()
                )))
            }
        });
    }

    let (x, y) = (a.to_int(), b.to_int());
    Ok(match op {
        BinOp::Add => Scalar::Int(x.wrapping_add(y)),
        BinOp::Sub => Scalar::Int(x.wrapping_sub(y)),
        BinOp::Mul => Scalar::Int(x.wrapping_mul(y)),
        BinOp::Div | BinOp::Mod if y == 0 => return Err(InterpError::DivisionByZero),
        BinOp::Div => Scalar::Int(x.wrapping_div(y)),
        BinOp::Mod => Scalar::Int(x.wrapping_rem(y)),
        BinOp::Eq => Scalar::Bool(x == y),
        BinOp::Ne => Scalar::Bool(x != y),
        BinOp::Lt => Scalar::Bool(x < y),
        BinOp::Gt => Scalar::Bool(x > y),
        BinOp::Le => Scalar::Bool(x <= y),
        BinOp::Ge => Scalar::Bool(x >= y),
        BinOp::BitAnd => Scalar::Int(x & y),
        BinOp::BitOr => Scalar::Int(x | y),
        BinOp::BitXor => Scalar::Int(x ^ y),
        BinOp::Shl => Scalar::Int(x.wrapping_shl((y & 127) as u32)),
        BinOp::Shr => Scalar::Int(x.wrapping_shr((y & 127) as u32)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    })
}

fn unary(op: UnaryOp, s: Scalar) -> Result<Scalar, InterpError> {
    Ok(match (op, s) {
        (UnaryOp::Neg, Scalar::Real(r)) => Scalar::Real(-r),
        (UnaryOp::Neg, s) => Scalar::Int(s.to_int().wrapping_neg()),
        (UnaryOp::Not, s) => Scalar::Bool(!s.truthy()),
        (UnaryOp::BitNot, Scalar::Int(v)) => Scalar::Int(!v),
        (UnaryOp::BitNot, Scalar::Bool(b)) => Scalar::Bool(!b),
        (UnaryOp::BitNot, Scalar::Real(_)) => {
            return Err(InterpError::TypeMismatch("`~` on a real".to_string()))
        }
    })
}

fn reduce(op: ReduceOp, lanes: &[Scalar]) -> Scalar {
    match op {
        ReduceOp::Any => Scalar::Bool(lanes.iter().any(|s| s.truthy())),
        ReduceOp::All => Scalar::Bool(lanes.iter().all(|s| s.truthy())),
        ReduceOp::Sum => {
            if lanes.iter().any(|s| matches!(s, Scalar::Real(_))) {
                Scalar::Real(lanes.iter().map(|s| s.to_real()).sum())
            } else {
                Scalar::Int(lanes.iter().map(|s| s.to_int()).fold(0i128, i128::wrapping_add))
            }
        }
        ReduceOp::Min | ReduceOp::Max => {
            let real = lanes.iter().any(|s| matches!(s, Scalar::Real(_)));
            let pick = |a: Scalar, b: Scalar| {
                let b_first = if real {
                    (b.to_real() < a.to_real()) == (op == ReduceOp::Min)
                } else {
                    (b.to_int() < a.to_int()) == (op == ReduceOp::Min)
                };
                if b_first {
                    b
                } else {
                    a
                }
            };
            lanes.iter().copied().reduce(pick).unwrap_or(Scalar::Int(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_vir::{AggregateLayout, BlockBuilder};

    fn i32x4() -> VirType {
        VirType::Vector {
            elem: ScalarKind::Int32,
            lanes: 4,
        }
    }

    fn point_batch(layout: AggregateLayout) -> VirType {
        VirType::Aggregate {
            class: "Point".into(),
            fields: vec![ScalarKind::Int32, ScalarKind::Int32],
            lanes: 4,
            layout,
        }
    }

    // ── Arithmetic ──

    #[test]
    fn vector_add_wraps_per_lane() {
        let mut b = BlockBuilder::new("add".into(), vec![i32x4()]);
        let x = b.add_param("x".into(), i32x4());
        let y = b.alloc_temp(i32x4());
        b.push_stmt(VirStmt::Assign {
            dst: y,
            rvalue: VirRValue::BinaryOp {
                op: BinOp::Add,
                left: VirOperand::Local(x),
                right: VirOperand::Local(x),
            },
        });
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(y)],
        });
        let mut m = Machine::new();
        m.load([&b.finish()]);
        let out = m
            .call("add", vec![Value::ints(&[1, -2, i32::MAX as i64, 0])])
            .unwrap();
        assert_eq!(out[0], Value::ints(&[2, -4, -2, 0]));
    }

    #[test]
    fn comparison_of_vectors_is_a_mask() {
        let out = binary(BinOp::Lt, Value::ints(&[1, 5]), Value::ints(&[3, 3])).unwrap();
        assert_eq!(out, Value::mask(&[true, false]));
    }

    #[test]
    fn integer_division_by_zero_faults() {
        assert_eq!(
            binary(BinOp::Div, Value::int(1), Value::int(0)),
            Err(InterpError::DivisionByZero)
        );
    }

    #[test]
    fn mixed_shapes_are_rejected() {
        assert!(binary(BinOp::Add, Value::ints(&[1, 2]), Value::int(1)).is_err());
    }

    #[test]
    fn reductions_respect_the_mask_lanes() {
        let lanes = [Scalar::Int(4), Scalar::Int(-2), Scalar::Int(7)];
        assert_eq!(reduce(ReduceOp::Sum, &lanes), Scalar::Int(9));
        assert_eq!(reduce(ReduceOp::Min, &lanes), Scalar::Int(-2));
        assert_eq!(reduce(ReduceOp::Max, &lanes), Scalar::Int(7));
        assert_eq!(reduce(ReduceOp::Any, &[]), Scalar::Bool(false));
        assert_eq!(reduce(ReduceOp::All, &[]), Scalar::Bool(true));
    }

    // ── Control flow ──

    #[test]
    fn branch_on_scalar_condition() {
        let int = VirType::Scalar(ScalarKind::Int32);
        let mut b = BlockBuilder::new("abs".into(), vec![int.clone()]);
        let x = b.add_param("x".into(), int.clone());
        let neg = b.alloc_temp(VirType::Scalar(ScalarKind::Bool));
        let then_block = b.create_block();
        let else_block = b.create_block();
        b.push_stmt(VirStmt::Assign {
            dst: neg,
            rvalue: VirRValue::BinaryOp {
                op: BinOp::Lt,
                left: VirOperand::Local(x),
                right: VirOperand::int(0),
            },
        });
        b.terminate(VirTerminator::Branch {
            cond: VirOperand::Local(neg),
            then_block,
            else_block,
        });
        b.switch_to_block(then_block);
        let r = b.alloc_temp(int);
        b.push_stmt(VirStmt::Assign {
            dst: r,
            rvalue: VirRValue::UnaryOp {
                op: UnaryOp::Neg,
                operand: VirOperand::Local(x),
            },
        });
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(r)],
        });
        b.switch_to_block(else_block);
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(x)],
        });

        let mut m = Machine::new();
        m.load([&b.finish()]);
        assert_eq!(m.call("abs", vec![Value::int(-5)]).unwrap(), vec![Value::int(5)]);
        assert_eq!(m.call("abs", vec![Value::int(3)]).unwrap(), vec![Value::int(3)]);
    }

    #[test]
    fn step_limit_stops_infinite_loops() {
        let mut b = BlockBuilder::new("spin".into(), vec![]);
        let head = b.create_block();
        b.terminate(VirTerminator::Goto { target: head });
        b.switch_to_block(head);
        b.terminate(VirTerminator::Goto { target: head });
        let mut m = Machine::new();
        m.load([&b.finish()]);
        m.set_step_limit(100);
        assert_eq!(m.call("spin", vec![]), Err(InterpError::StepLimit(100)));
    }

    #[test]
    fn arity_is_checked() {
        let mut b = BlockBuilder::new("f".into(), vec![]);
        b.add_param("x".into(), VirType::Scalar(ScalarKind::Int32));
        b.terminate(VirTerminator::Return { values: vec![] });
        let mut m = Machine::new();
        m.load([&b.finish()]);
        assert!(matches!(
            m.call("f", vec![]),
            Err(InterpError::ArityMismatch { expected: 1, got: 0, .. })
        ));
    }

    // ── Calls ──

    #[test]
    fn lane_call_skips_masked_off_lanes() {
        use std::cell::Cell;

        let mut b = BlockBuilder::new("each".into(), vec![i32x4()]);
        let x = b.add_param("x".into(), i32x4());
        let m = b.add_param("m".into(), VirType::Mask { lanes: 4 });
        let y = b.alloc_temp(i32x4());
        b.push_stmt(VirStmt::LaneCall {
            dsts: vec![y],
            func: FunctionRef::extern_c("twice".into()),
            args: vec![VirOperand::Local(x)],
            mask: VirOperand::Local(m),
            lanes: 4,
        });
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(y)],
        });

        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let mut machine = Machine::new();
        machine.load([&b.finish()]);
        machine.define_foreign("twice", move |args| {
            seen.set(seen.get() + 1);
            Scalar::Int(args[0].to_int() * 2)
        });
        let out = machine
            .call(
                "each",
                vec![Value::ints(&[1, 2, 3, 4]), Value::mask(&[true, false, true, false])],
            )
            .unwrap();
        assert_eq!(out[0], Value::ints(&[2, 0, 6, 0]));
        assert_eq!(calls.get(), 2);
    }

    // ── Memory ──

    #[test]
    fn masked_batch_load_and_store() {
        let elem = VirType::Scalar(ScalarKind::Int32);
        let buf_ty = VirType::Buffer {
            elem: Box::new(elem.clone()),
        };
        let mut b = BlockBuilder::new("bump".into(), vec![]);
        let buf = b.add_param("buf".into(), buf_ty);
        let m = b.add_param("m".into(), VirType::Mask { lanes: 4 });
        let v = b.alloc_temp(i32x4());
        let one = b.alloc_temp(i32x4());
        let w = b.alloc_temp(i32x4());
        b.push_stmt(VirStmt::LoadBatch {
            dst: v,
            buffer: buf,
            base: VirOperand::int(1),
            mask: Some(VirOperand::Local(m)),
        });
        b.push_stmt(VirStmt::Assign {
            dst: one,
            rvalue: VirRValue::Splat {
                value: VirOperand::int(1),
                lanes: 4,
            },
        });
        b.push_stmt(VirStmt::Assign {
            dst: w,
            rvalue: VirRValue::BinaryOp {
                op: BinOp::Add,
                left: VirOperand::Local(v),
                right: VirOperand::Local(one),
            },
        });
        b.push_stmt(VirStmt::StoreBatch {
            buffer: buf,
            base: VirOperand::int(1),
            value: VirOperand::Local(w),
            mask: Some(VirOperand::Local(m)),
        });
        b.terminate(VirTerminator::Return { values: vec![] });

        let mut machine = Machine::new();
        machine.load([&b.finish()]);
        let data: Vec<Value> = (0..5).map(|i| Value::int(i * 10)).collect();
        let handle = machine.alloc_buffer(elem, &data).unwrap();
        // The last lane would be index 5, past the end; it is masked off.
        machine
            .call("bump", vec![handle.clone(), Value::mask(&[true, true, false, false])])
            .unwrap();
        let after: Vec<i64> = machine
            .read_buffer(&handle)
            .unwrap()
            .iter()
            .map(|v| v.as_int().unwrap())
            .collect();
        assert_eq!(after, vec![0, 11, 21, 30, 40]);

        let err = machine
            .call("bump", vec![handle, Value::mask(&[true; 4])])
            .unwrap_err();
        assert_eq!(err, InterpError::OutOfBounds { index: 5, len: 5 });
    }

    #[test]
    fn transpose_then_field_get() {
        let mut b = BlockBuilder::new("xs".into(), vec![i32x4()]);
        let p = b.add_param("p".into(), point_batch(AggregateLayout::Aos));
        let soa = b.alloc_temp(point_batch(AggregateLayout::Soa));
        let x = b.alloc_temp(i32x4());
        b.push_stmt(VirStmt::Transpose {
            dst: soa,
            src: VirOperand::Local(p),
            to: AggregateLayout::Soa,
        });
        b.push_stmt(VirStmt::Assign {
            dst: x,
            rvalue: VirRValue::FieldGet {
                base: VirOperand::Local(soa),
                field: 0,
            },
        });
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(x)],
        });
        let mut m = Machine::new();
        m.load([&b.finish()]);
        let points: Vec<Vec<Scalar>> = (0..4)
            .map(|i| vec![Scalar::Int(i), Scalar::Int(-i)])
            .collect();
        let out = m
            .call("xs", vec![Value::batch(AggregateLayout::Aos, &points)])
            .unwrap();
        assert_eq!(out[0], Value::ints(&[0, 1, 2, 3]));
    }

    #[test]
    fn storing_a_batch_with_the_wrong_layout_is_a_type_error() {
        let mut b = BlockBuilder::new("bad".into(), vec![]);
        let p = b.add_param("p".into(), point_batch(AggregateLayout::Aos));
        let soa = b.alloc_temp(point_batch(AggregateLayout::Soa));
        b.push_stmt(VirStmt::Assign {
            dst: soa,
            rvalue: VirRValue::Use(VirOperand::Local(p)),
        });
        b.terminate(VirTerminator::Return { values: vec![] });
        let mut m = Machine::new();
        m.load([&b.finish()]);
        let points: Vec<Vec<Scalar>> = (0..4).map(|i| vec![Scalar::Int(i), Scalar::Int(i)]).collect();
        assert!(matches!(
            m.call("bad", vec![Value::batch(AggregateLayout::Aos, &points)]),
            Err(InterpError::TypeMismatch(_))
        ));
    }
}
