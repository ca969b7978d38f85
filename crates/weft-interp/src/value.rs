// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime values.

use weft_ast::ScalarKind;
use weft_vir::{AggregateLayout, VirType};

use crate::InterpError;

/// One lane's worth of data. Integers of every width share `Int` and are
/// kept inside their kind's range by [`Scalar::normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i128),
    Real(f64),
}

impl Scalar {
    pub fn zero(kind: ScalarKind) -> Scalar {
        Scalar::Int(0).normalize(kind)
    }

    pub fn truthy(self) -> bool {
        match self {
            Scalar::Bool(b) => b,
            Scalar::Int(v) => v != 0,
            Scalar::Real(r) => r != 0.0,
        }
    }

    /// Truncating for reals; NaN becomes 0.
    pub fn to_int(self) -> i128 {
        match self {
            Scalar::Bool(b) => b as i128,
            Scalar::Int(v) => v,
            Scalar::Real(r) => r as i128,
        }
    }

    pub fn to_real(self) -> f64 {
        match self {
            Scalar::Bool(b) => b as u8 as f64,
            Scalar::Int(v) => v as f64,
            Scalar::Real(r) => r,
        }
    }

    /// Convert into `kind`, wrapping or saturating integers and rounding
    /// `real32` through `f32`.
    pub fn normalize(self, kind: ScalarKind) -> Scalar {
        match kind {
            ScalarKind::Bool => Scalar::Bool(self.truthy()),
            ScalarKind::Real32 => Scalar::Real(self.to_real() as f32 as f64),
            ScalarKind::Real64 => Scalar::Real(self.to_real()),
            _ => Scalar::Int(fit_integer(self.to_int(), kind)),
        }
    }
}

fn fit_integer(v: i128, kind: ScalarKind) -> i128 {
    match kind {
        ScalarKind::Int8 => v as i8 as i128,
        ScalarKind::Int16 => v as i16 as i128,
        ScalarKind::Int32 => v as i32 as i128,
        ScalarKind::Int64 => v as i64 as i128,
        ScalarKind::UInt8 => v as u8 as i128,
        ScalarKind::UInt16 => v as u16 as i128,
        ScalarKind::UInt32 => v as u32 as i128,
        ScalarKind::UInt64 | ScalarKind::Index => v as u64 as i128,
        ScalarKind::Sat8 => v.clamp(i8::MIN as i128, i8::MAX as i128),
        ScalarKind::Sat16 => v.clamp(i16::MIN as i128, i16::MAX as i128),
        ScalarKind::USat8 => v.clamp(0, u8::MAX as i128),
        ScalarKind::USat16 => v.clamp(0, u16::MAX as i128),
        ScalarKind::Bool | ScalarKind::Real32 | ScalarKind::Real64 => v,
    }
}

/// Class instances. `lanes == 1` is a single instance, for which both
/// layouts coincide.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub layout: AggregateLayout,
    pub lanes: usize,
    pub fields: usize,
    pub data: Vec<Scalar>,
}

impl Aggregate {
    pub fn from_instances(layout: AggregateLayout, instances: &[Vec<Scalar>]) -> Aggregate {
        let fields = instances.first().map(Vec::len).unwrap_or(0);
        let mut agg = Aggregate {
            layout,
            lanes: instances.len(),
            fields,
            data: vec![Scalar::Int(0); instances.len() * fields],
        };
        for (lane, instance) in instances.iter().enumerate() {
            for (field, value) in instance.iter().enumerate() {
                agg.set(lane, field, *value);
            }
        }
        agg
    }

    fn slot(&self, lane: usize, field: usize) -> usize {
        match self.layout {
            AggregateLayout::Aos => lane * self.fields + field,
            AggregateLayout::Soa => field * self.lanes + lane,
        }
    }

    pub fn get(&self, lane: usize, field: usize) -> Scalar {
        self.data[self.slot(lane, field)]
    }

    pub fn set(&mut self, lane: usize, field: usize, value: Scalar) {
        let slot = self.slot(lane, field);
        self.data[slot] = value;
    }

    pub fn instance(&self, lane: usize) -> Vec<Scalar> {
        (0..self.fields).map(|f| self.get(lane, f)).collect()
    }

    pub fn relayout(&self, to: AggregateLayout) -> Aggregate {
        let instances: Vec<Vec<Scalar>> = (0..self.lanes).map(|l| self.instance(l)).collect();
        let mut out = Aggregate::from_instances(to, &instances);
        out.fields = self.fields;
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Scalar(Scalar),
    Vector(Vec<Scalar>),
    Mask(Vec<bool>),
    Aggregate(Aggregate),
    /// Handle into the machine's container table.
    Buffer(usize),
}

impl Value {
    pub fn int(v: i64) -> Value {
        Value::Scalar(Scalar::Int(v as i128))
    }

    pub fn real(v: f64) -> Value {
        Value::Scalar(Scalar::Real(v))
    }

    pub fn bool(v: bool) -> Value {
        Value::Scalar(Scalar::Bool(v))
    }

    pub fn ints(values: &[i64]) -> Value {
        Value::Vector(values.iter().map(|v| Scalar::Int(*v as i128)).collect())
    }

    pub fn reals(values: &[f64]) -> Value {
        Value::Vector(values.iter().map(|v| Scalar::Real(*v)).collect())
    }

    pub fn mask(bits: &[bool]) -> Value {
        Value::Mask(bits.to_vec())
    }

    /// One class instance.
    pub fn instance(fields: &[Scalar]) -> Value {
        Value::Aggregate(Aggregate::from_instances(
            AggregateLayout::Aos,
            &[fields.to_vec()],
        ))
    }

    pub fn batch(layout: AggregateLayout, instances: &[Vec<Scalar>]) -> Value {
        Value::Aggregate(Aggregate::from_instances(layout, instances))
    }

    /// Zero value of `ty`. Buffers start out as dangling handles.
    pub fn zero(ty: &VirType) -> Value {
        match ty {
            VirType::Void => Value::Void,
            VirType::Scalar(k) => Value::Scalar(Scalar::zero(*k)),
            VirType::Vector { elem, lanes } => Value::Vector(vec![Scalar::zero(*elem); *lanes as usize]),
            VirType::Mask { lanes } => Value::Mask(vec![false; *lanes as usize]),
            VirType::Aggregate {
                fields,
                lanes,
                layout,
                ..
            } => {
                let instance: Vec<Scalar> = fields.iter().map(|k| Scalar::zero(*k)).collect();
                Value::Aggregate(Aggregate::from_instances(
                    *layout,
                    &vec![instance; *lanes as usize],
                ))
            }
            VirType::Buffer { .. } => Value::Buffer(usize::MAX),
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_scalar().map(|s| s.to_int() as i64)
    }

    pub fn as_real(&self) -> Option<f64> {
        self.as_scalar().map(Scalar::to_real)
    }

    pub fn to_ints(&self) -> Option<Vec<i64>> {
        match self {
            Value::Vector(v) => Some(v.iter().map(|s| s.to_int() as i64).collect()),
            _ => None,
        }
    }

    pub fn to_reals(&self) -> Option<Vec<f64>> {
        match self {
            Value::Vector(v) => Some(v.iter().map(|s| s.to_real()).collect()),
            _ => None,
        }
    }

    pub fn to_bools(&self) -> Option<Vec<bool>> {
        match self {
            Value::Mask(m) => Some(m.clone()),
            _ => None,
        }
    }

    /// Lane count; 1 for uniform values.
    pub fn lanes(&self) -> usize {
        match self {
            Value::Vector(v) => v.len(),
            Value::Mask(m) => m.len(),
            Value::Aggregate(a) => a.lanes,
            _ => 1,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Value::Vector(_) | Value::Mask(_))
            || matches!(self, Value::Aggregate(a) if a.lanes > 1)
    }

    /// Lane `lane` of a batch, or the value itself when it is uniform.
    pub fn lane(&self, lane: usize) -> Result<Value, InterpError> {
        let out_of_range = || InterpError::OutOfBounds {
            index: lane as i128,
            len: self.lanes(),
        };
        match self {
            Value::Vector(v) => v.get(lane).map(|s| Value::Scalar(*s)).ok_or_else(out_of_range),
            Value::Mask(m) => m.get(lane).map(|b| Value::bool(*b)).ok_or_else(out_of_range),
            Value::Aggregate(a) if a.lanes > 1 => {
                if lane >= a.lanes {
                    return Err(out_of_range());
                }
                Ok(Value::instance(&a.instance(lane)))
            }
            other => Ok(other.clone()),
        }
    }

    /// Overwrite lane `lane` of a batch with a single-lane value.
    pub fn set_lane(&mut self, lane: usize, value: &Value) -> Result<(), InterpError> {
        let len = self.lanes();
        if lane >= len {
            return Err(InterpError::OutOfBounds {
                index: lane as i128,
                len,
            });
        }
        match (self, value) {
            (Value::Vector(v), Value::Scalar(s)) => v[lane] = *s,
            (Value::Mask(m), Value::Scalar(s)) => m[lane] = s.truthy(),
            (Value::Aggregate(a), Value::Aggregate(one)) if one.lanes == 1 && one.fields == a.fields => {
                for field in 0..a.fields {
                    a.set(lane, field, one.get(0, field));
                }
            }
            (target, value) => {
                return Err(InterpError::TypeMismatch(format!(
                    "cannot store {:?} into a lane of {:?}",
                    value, target
                )))
            }
        }
        Ok(())
    }

    /// Build a value of type `ty` from one scalar per lane.
    pub fn from_lanes(ty: &VirType, lanes: Vec<Scalar>) -> Result<Value, InterpError> {
        match ty {
            VirType::Scalar(k) if lanes.len() == 1 => Ok(Value::Scalar(lanes[0].normalize(*k))),
            VirType::Vector { elem, .. } => Ok(Value::Vector(lanes.into_iter().map(|s| s.normalize(*elem)).collect())),
            VirType::Mask { .. } => Ok(Value::Mask(lanes.into_iter().map(Scalar::truthy).collect())),
            other => Err(InterpError::TypeMismatch(format!(
                "{} lane values do not form a {}",
                lanes.len(),
                other
            ))),
        }
    }

    /// Check `self` against `ty` and bring every scalar into range.
    pub fn conform(self, ty: &VirType) -> Result<Value, InterpError> {
        let mismatch = |v: &Value| InterpError::TypeMismatch(format!("{:?} is not a {}", v, ty));
        match (self, ty) {
            (Value::Void, VirType::Void) => Ok(Value::Void),
            (Value::Scalar(s), VirType::Scalar(k)) => Ok(Value::Scalar(s.normalize(*k))),
            (Value::Vector(v), VirType::Vector { elem, lanes }) if v.len() == *lanes as usize => {
                Ok(Value::Vector(v.into_iter().map(|s| s.normalize(*elem)).collect()))
            }
            (Value::Mask(m), VirType::Mask { lanes }) if m.len() == *lanes as usize => Ok(Value::Mask(m)),
            (
                Value::Aggregate(mut a),
                VirType::Aggregate {
                    fields,
                    lanes,
                    layout,
                    ..
                },
            ) if a.lanes == *lanes as usize
                && a.fields == fields.len()
                && (a.layout == *layout || a.lanes == 1) =>
            {
                a.layout = *layout;
                for lane in 0..a.lanes {
                    for (field, kind) in fields.iter().enumerate() {
                        let v = a.get(lane, field).normalize(*kind);
                        a.set(lane, field, v);
                    }
                }
                Ok(Value::Aggregate(a))
            }
            (Value::Buffer(h), VirType::Buffer { .. }) => Ok(Value::Buffer(h)),
            (v, _) => Err(mismatch(&v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Scalars ──

    #[test]
    fn integers_wrap_to_their_width() {
        assert_eq!(Scalar::Int(130).normalize(ScalarKind::Int8), Scalar::Int(-126));
        assert_eq!(Scalar::Int(-1).normalize(ScalarKind::UInt16), Scalar::Int(65535));
        assert_eq!(
            Scalar::Int(i32::MAX as i128 + 1).normalize(ScalarKind::Int32),
            Scalar::Int(i32::MIN as i128)
        );
    }

    #[test]
    fn saturating_kinds_clamp() {
        assert_eq!(Scalar::Int(300).normalize(ScalarKind::Sat8), Scalar::Int(127));
        assert_eq!(Scalar::Int(-300).normalize(ScalarKind::Sat8), Scalar::Int(-128));
        assert_eq!(Scalar::Int(-5).normalize(ScalarKind::USat8), Scalar::Int(0));
        assert_eq!(Scalar::Int(70000).normalize(ScalarKind::USat16), Scalar::Int(65535));
    }

    #[test]
    fn real32_rounds_through_f32() {
        let Scalar::Real(r) = Scalar::Real(0.1).normalize(ScalarKind::Real32) else {
            panic!("expected a real");
        };
        assert_eq!(r, 0.1f32 as f64);
        assert_eq!(Scalar::Real(2.9).normalize(ScalarKind::Int32), Scalar::Int(2));
    }

    // ── Aggregates ──

    #[test]
    fn relayout_preserves_instances() {
        let instances = vec![
            vec![Scalar::Int(1), Scalar::Int(2)],
            vec![Scalar::Int(3), Scalar::Int(4)],
        ];
        let aos = Aggregate::from_instances(AggregateLayout::Aos, &instances);
        assert_eq!(aos.data, vec![Scalar::Int(1), Scalar::Int(2), Scalar::Int(3), Scalar::Int(4)]);
        let soa = aos.relayout(AggregateLayout::Soa);
        assert_eq!(soa.data, vec![Scalar::Int(1), Scalar::Int(3), Scalar::Int(2), Scalar::Int(4)]);
        assert_eq!(soa.instance(1), instances[1]);
        assert_eq!(soa.relayout(AggregateLayout::Aos), aos);
    }

    #[test]
    fn lanes_of_a_soa_batch_are_instances() {
        let mut batch = Value::batch(
            AggregateLayout::Soa,
            &[vec![Scalar::Int(1), Scalar::Int(2)], vec![Scalar::Int(3), Scalar::Int(4)]],
        );
        assert_eq!(batch.lane(1).unwrap(), Value::instance(&[Scalar::Int(3), Scalar::Int(4)]));
        batch
            .set_lane(0, &Value::instance(&[Scalar::Int(9), Scalar::Int(8)]))
            .unwrap();
        assert_eq!(batch.lane(0).unwrap(), Value::instance(&[Scalar::Int(9), Scalar::Int(8)]));
        assert!(batch.lane(2).is_err());
    }

    // ── Conformance ──

    #[test]
    fn conform_rejects_lane_count_mismatch() {
        let ty = VirType::Vector {
            elem: ScalarKind::Int32,
            lanes: 4,
        };
        assert!(Value::ints(&[1, 2]).conform(&ty).is_err());
        assert_eq!(
            Value::ints(&[1, 2, 3, 1 << 40]).conform(&ty).unwrap(),
            Value::ints(&[1, 2, 3, 0])
        );
    }

    #[test]
    fn conform_rejects_layout_mismatch_on_batches() {
        let batch = Value::batch(
            AggregateLayout::Aos,
            &[vec![Scalar::Int(1)], vec![Scalar::Int(2)]],
        );
        let soa = VirType::Aggregate {
            class: "P".into(),
            fields: vec![ScalarKind::Int32],
            lanes: 2,
            layout: AggregateLayout::Soa,
        };
        assert!(batch.conform(&soa).is_err());
    }

    #[test]
    fn zero_of_mask_is_all_false() {
        assert_eq!(Value::zero(&VirType::Mask { lanes: 3 }), Value::mask(&[false; 3]));
    }
}
