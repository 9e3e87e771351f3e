//! Evaluating const expressions.

use crate::{I31, Ref, Val};
use anyhow::{Result, anyhow, bail};
use i31ref_environ::{ConstExpr, ConstOp, GlobalIndex, PrimaryMap};
use smallvec::SmallVec;

/// An interpreter for const expressions.
///
/// This can be reused across many const expression evaluations to reuse
/// allocated resources, if any.
#[derive(Default)]
pub struct ConstExprEvaluator {
    stack: SmallVec<[Val; 2]>,
}

/// The context within which a particular const expression is evaluated: the
/// values of the globals initialized so far.
pub struct ConstEvalContext<'a> {
    globals: &'a PrimaryMap<GlobalIndex, Val>,
}

impl<'a> ConstEvalContext<'a> {
    /// Create a new context.
    pub fn new(globals: &'a PrimaryMap<GlobalIndex, Val>) -> Self {
        Self { globals }
    }

    fn global_get(&self, index: GlobalIndex) -> Result<Val> {
        self.globals.get(index).copied().ok_or_else(|| {
            anyhow!(
                "const expr evaluation error: global {} is not initialized yet",
                index.as_u32()
            )
        })
    }
}

impl ConstExprEvaluator {
    /// Evaluate the given const expression in the given context.
    ///
    /// The expression must already have been validated; operand types are
    /// only checked as far as needed to avoid panicking.
    pub fn eval(&mut self, context: &ConstEvalContext<'_>, expr: &ConstExpr) -> Result<Val> {
        log::trace!("evaluating const expr: {expr:?}");

        self.stack.clear();

        for op in expr.ops() {
            log::trace!("const-evaluating op: {op:?}");
            match op {
                ConstOp::I32Const(i) => self.stack.push(Val::I32(i)),
                ConstOp::GlobalGet(g) => self.stack.push(context.global_get(g)?),
                ConstOp::RefNull(_) => self.stack.push(Val::null()),
                ConstOp::RefI31 => {
                    let i = self.pop_i32()?;
                    self.stack.push(Val::Ref(Ref::I31(I31::wrapping_i32(i))));
                }
                ConstOp::I32Add => {
                    let b = self.pop_i32()?;
                    let a = self.pop_i32()?;
                    self.stack.push(Val::I32(a.wrapping_add(b)));
                }
                ConstOp::I32Sub => {
                    let b = self.pop_i32()?;
                    let a = self.pop_i32()?;
                    self.stack.push(Val::I32(a.wrapping_sub(b)));
                }
                ConstOp::I32Mul => {
                    let b = self.pop_i32()?;
                    let a = self.pop_i32()?;
                    self.stack.push(Val::I32(a.wrapping_mul(b)));
                }
                // Conversions between the two hierarchies keep the value.
                ConstOp::AnyConvertExtern | ConstOp::ExternConvertAny => {
                    if self.stack.last().and_then(Val::ref_).is_none() {
                        bail!("const expr evaluation error: expected a reference operand");
                    }
                }
            }
        }

        if self.stack.len() == 1 {
            log::trace!("const expr evaluated to {:?}", self.stack[0]);
            return Ok(self.stack[0]);
        }

        bail!(
            "const expr evaluation error: expected 1 resulting value, found {}",
            self.stack.len()
        )
    }

    fn pop(&mut self) -> Result<Val> {
        self.stack.pop().ok_or_else(|| {
            anyhow!(
                "const expr evaluation error: attempted to pop from an empty \
                 evaluation stack"
            )
        })
    }

    fn pop_i32(&mut self) -> Result<i32> {
        match self.pop()? {
            Val::I32(i) => Ok(i),
            Val::Ref(_) => bail!("const expr evaluation error: expected an i32 operand"),
        }
    }
}
