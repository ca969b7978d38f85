// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Display implementations for VIR types.

use crate::*;
use std::fmt;

impl fmt::Display for AggregateLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateLayout::Aos => write!(f, "aos"),
            AggregateLayout::Soa => write!(f, "soa"),
        }
    }
}

impl fmt::Display for VirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirType::Void => write!(f, "void"),
            VirType::Scalar(k) => write!(f, "{}", k),
            VirType::Vector { elem, lanes } => write!(f, "{}x{}", elem, lanes),
            VirType::Mask { lanes } => write!(f, "mask{}", lanes),
            VirType::Aggregate {
                class,
                lanes,
                layout,
                ..
            } => {
                if *lanes == 1 {
                    write!(f, "{}", class)
                } else {
                    write!(f, "{}[{}; {}]", class, layout, lanes)
                }
            }
            VirType::Buffer { elem } => write!(f, "buffer<{}>", elem),
        }
    }
}

impl fmt::Display for VirOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirOperand::Local(id) => write!(f, "_{}", id.0),
            VirOperand::Constant(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for VirConst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirConst::Int(v) => write!(f, "{}", v),
            VirConst::Real(v) => write!(f, "{:?}", v),
            VirConst::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for VirRValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirRValue::Use(op) => write!(f, "{}", op),
            VirRValue::BinaryOp { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            VirRValue::UnaryOp { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            VirRValue::Cast { value, to } => write!(f, "{} as {}", value, to),
            VirRValue::Splat { value, lanes } => write!(f, "splat({}, {})", value, lanes),
            VirRValue::Select {
                mask,
                then_value,
                else_value,
            } => write!(f, "select({}, {}, {})", mask, then_value, else_value),
            VirRValue::Iota { elem, lanes } => write!(f, "iota.{}x{}", elem, lanes),
            VirRValue::Extract { vector, lane } => write!(f, "{}[{}]", vector, lane),
            VirRValue::Reduce { op, value, mask } => match mask {
                Some(m) => write!(f, "reduce.{}({}, {})", op.name(), value, m),
                None => write!(f, "reduce.{}({})", op.name(), value),
            },
            VirRValue::FieldGet { base, field } => write!(f, "{}.{}", base, field),
            VirRValue::FieldSet { base, field, value } => {
                write!(f, "{} with .{} = {}", base, field, value)
            }
            VirRValue::Compose { fields } => {
                write!(f, "{{")?;
                write_list(f, fields)?;
                write!(f, "}}")
            }
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[VirOperand]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_dsts(f: &mut fmt::Formatter<'_>, dsts: &[LocalId]) -> fmt::Result {
    if dsts.is_empty() {
        return Ok(());
    }
    for (i, d) in dsts.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "_{}", d.0)?;
    }
    write!(f, " = ")
}

fn write_guard(f: &mut fmt::Formatter<'_>, guard: &Option<VirOperand>) -> fmt::Result {
    match guard {
        Some(g) => write!(f, " if {}", g),
        None => Ok(()),
    }
}

impl fmt::Display for VirStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirStmt::Assign { dst, rvalue } => write!(f, "_{} = {}", dst.0, rvalue),
            VirStmt::Call { dsts, func, args } => {
                write_dsts(f, dsts)?;
                if func.is_extern {
                    write!(f, "extern ")?;
                }
                write!(f, "{}(", func.name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            VirStmt::LaneCall {
                dsts,
                func,
                args,
                mask,
                lanes,
            } => {
                write_dsts(f, dsts)?;
                write!(f, "lanes<{}>[{}] ", lanes, mask)?;
                if func.is_extern {
                    write!(f, "extern ")?;
                }
                write!(f, "{}(", func.name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            VirStmt::ContainerAlloc { dst, len } => write!(f, "_{} = alloc({})", dst.0, len),
            VirStmt::Gather {
                dst,
                buffer,
                index,
                guard,
            } => {
                write!(f, "_{} = gather _{}[{}]", dst.0, buffer.0, index)?;
                write_guard(f, guard)
            }
            VirStmt::Scatter {
                buffer,
                index,
                value,
                guard,
            } => {
                write!(f, "scatter _{}[{}] = {}", buffer.0, index, value)?;
                write_guard(f, guard)
            }
            VirStmt::LoadBatch {
                dst,
                buffer,
                base,
                mask,
            } => {
                write!(f, "_{} = load _{}[{}..]", dst.0, buffer.0, base)?;
                write_guard(f, mask)
            }
            VirStmt::StoreBatch {
                buffer,
                base,
                value,
                mask,
            } => {
                write!(f, "store _{}[{}..] = {}", buffer.0, base, value)?;
                write_guard(f, mask)
            }
            VirStmt::Transpose { dst, src, to } => {
                write!(f, "_{} = transpose.{}({})", dst.0, to, src)
            }
        }
    }
}

impl fmt::Display for VirTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirTerminator::Return { values } => {
                write!(f, "return")?;
                if !values.is_empty() {
                    write!(f, " ")?;
                    write_list(f, values)?;
                }
                Ok(())
            }
            VirTerminator::Goto { target } => write!(f, "goto bb{}", target.0),
            VirTerminator::Branch {
                cond,
                then_block,
                else_block,
            } => write!(f, "if {} then bb{} else bb{}", cond, then_block.0, else_block.0),
            VirTerminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

impl fmt::Display for VirFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Signature
        write!(f, "func {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &p.name {
                Some(name) => write!(f, "{}: {}", name, p.ty)?,
                None => write!(f, "_{}: {}", p.id.0, p.ty)?,
            }
        }
        write!(f, ") -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", r)?;
        }
        writeln!(f, ") {{")?;

        // Locals (non-param)
        for local in &self.locals {
            if !local.is_param {
                match &local.name {
                    Some(name) => writeln!(f, "  let {}: {}  // _{}", name, local.ty, local.id.0)?,
                    None => writeln!(f, "  let _{}: {}", local.id.0, local.ty)?,
                }
            }
        }
        if self.locals.iter().any(|l| !l.is_param) {
            writeln!(f)?;
        }

        // Blocks
        for block in &self.blocks {
            writeln!(f, "  bb{}:", block.id.0)?;
            for stmt in &block.statements {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ast::ScalarKind;

    #[test]
    fn masked_store_shows_its_mask() {
        let stmt = VirStmt::StoreBatch {
            buffer: LocalId(0),
            base: VirOperand::Local(LocalId(1)),
            value: VirOperand::Local(LocalId(2)),
            mask: Some(VirOperand::Local(LocalId(3))),
        };
        assert_eq!(stmt.to_string(), "store _0[_1..] = _2 if _3");
    }

    #[test]
    fn function_header_lists_results() {
        let mut b = BlockBuilder::new(
            "step.simd4".into(),
            vec![VirType::vector(ScalarKind::Int32, 4)],
        );
        let m = b.add_param("exec_mask".into(), VirType::Mask { lanes: 4 });
        let a = b.add_param("a".into(), VirType::vector(ScalarKind::Int32, 4));
        let r = b.alloc_local("r".into(), VirType::vector(ScalarKind::Int32, 4));
        b.push_stmt(VirStmt::Assign {
            dst: r,
            rvalue: VirRValue::Select {
                mask: VirOperand::Local(m),
                then_value: VirOperand::Local(a),
                else_value: VirOperand::Local(r),
            },
        });
        b.terminate(VirTerminator::Return {
            values: vec![VirOperand::Local(r)],
        });
        let text = b.finish().to_string();
        assert!(text.starts_with("func step.simd4(exec_mask: mask4, a: int32x4) -> (int32x4) {"));
        assert!(text.contains("let r: int32x4  // _2"));
        assert!(text.contains("_2 = select(_0, _1, _2)"));
        assert!(text.contains("return _2"));
    }
}
