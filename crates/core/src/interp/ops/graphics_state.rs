//! Graphics state operators.
//!
//! Handles: q, Q, cm, w, J, j, M, d, ri, i, gs
//!
//! These operators manage the graphics state stack and transformation matrix.
//! - q/Q: Push/pop graphics state
//! - cm: Concatenate transformation matrix
//! - w, J, j, M, d: Line styling (width, cap, join, miter limit, dash)
//! - ri, i: Rendering intent and flatness
//! - gs: Set parameters from graphics state dictionary

use super::{bad_operand, name, number, numbers, tail};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::interp::engine::{Engine, OpResult};
use crate::model::object::{Dictionary, Value};
use crate::model::state::DashPattern;
use crate::utils::mult_matrix;

#[allow(non_snake_case)]
impl Engine<'_> {
    /// Saves the current graphics state to the stack.
    ///
    /// PDF operator: `q`
    pub fn do_q(&mut self, _operands: &[Value]) -> OpResult {
        self.saved.push(self.state.clone());
        Ok(())
    }

    /// Restores the graphics state from the stack. With nothing saved in
    /// this frame the state is left as is.
    ///
    /// PDF operator: `Q`
    pub fn do_Q(&mut self, _operands: &[Value]) -> OpResult {
        match self.saved.pop() {
            Some(state) => {
                self.state = state;
                Ok(())
            }
            None => Err(Diagnostic::new(
                DiagnosticKind::StackUnderflow,
                "Q with no saved graphics state",
            )),
        }
    }

    /// Concatenates a matrix to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub fn do_cm(&mut self, operands: &[Value]) -> OpResult {
        let [a, b, c, d, e, f] = numbers::<6>("cm", operands)?;
        self.state.ctm = mult_matrix((a, b, c, d, e, f), self.state.ctm);
        Ok(())
    }

    /// Sets the line width, in user space units.
    ///
    /// PDF operator: `w`
    pub fn do_w(&mut self, operands: &[Value]) -> OpResult {
        let [width] = numbers::<1>("w", operands)?;
        self.state.line_width = width;
        Ok(())
    }

    /// PDF operator: `J`
    pub fn do_J(&mut self, operands: &[Value]) -> OpResult {
        let [cap] = numbers::<1>("J", operands)?;
        self.state.line_cap = cap as i64;
        Ok(())
    }

    /// PDF operator: `j`
    pub fn do_j(&mut self, operands: &[Value]) -> OpResult {
        let [join] = numbers::<1>("j", operands)?;
        self.state.line_join = join as i64;
        Ok(())
    }

    /// PDF operator: `M`
    pub fn do_M(&mut self, operands: &[Value]) -> OpResult {
        let [limit] = numbers::<1>("M", operands)?;
        self.state.miter_limit = limit;
        Ok(())
    }

    /// Sets the line dash pattern.
    ///
    /// PDF operator: `d`
    pub fn do_d(&mut self, operands: &[Value]) -> OpResult {
        let [array, phase] = tail::<2>("d", operands)?;
        self.state.dash = dash_pattern("d", array, phase)?;
        Ok(())
    }

    /// Sets the color rendering intent.
    ///
    /// PDF operator: `ri`
    pub fn do_ri(&mut self, operands: &[Value]) -> OpResult {
        let [intent] = tail::<1>("ri", operands)?;
        self.state.rendering_intent = name("ri", intent)?.into();
        Ok(())
    }

    /// Sets the flatness tolerance.
    ///
    /// PDF operator: `i`
    pub fn do_i(&mut self, operands: &[Value]) -> OpResult {
        let [flatness] = numbers::<1>("i", operands)?;
        self.state.flatness = flatness;
        Ok(())
    }

    /// Sets parameters from an `/ExtGState` resource.
    ///
    /// PDF operator: `gs`
    pub fn do_gs(&mut self, operands: &[Value]) -> OpResult {
        let [resource] = tail::<1>("gs", operands)?;
        let key = name("gs", resource)?;
        let params = self
            .resource("ExtGState", key)
            .map(|v| self.resolve(&v))
            .ok_or_else(|| bad_operand("gs", format!("no ExtGState named {key}")))?;
        let params = params
            .as_dict()
            .map_err(|_| bad_operand("gs", format!("ExtGState {key} is not a dictionary")))?;
        self.apply_ext_gstate(params)
    }

    fn apply_ext_gstate(&mut self, params: &Dictionary) -> OpResult {
        for (key, value) in params {
            let value = self.resolve(value);
            match key.as_str() {
                "LW" => self.state.line_width = number("gs", &value)?,
                "LC" => self.state.line_cap = number("gs", &value)? as i64,
                "LJ" => self.state.line_join = number("gs", &value)? as i64,
                "ML" => self.state.miter_limit = number("gs", &value)?,
                "D" => {
                    let parts = value
                        .as_array()
                        .map_err(|_| bad_operand("gs", "/D is not an array"))?;
                    let [array, phase] = tail::<2>("gs", parts)?;
                    self.state.dash = dash_pattern("gs", array, phase)?;
                }
                "RI" => self.state.rendering_intent = name("gs", &value)?.into(),
                "FL" => self.state.flatness = number("gs", &value)?,
                "Font" => {
                    let parts = value
                        .as_array()
                        .map_err(|_| bad_operand("gs", "/Font is not an array"))?;
                    let [font, size] = tail::<2>("gs", parts)?;
                    // /Font holds a font dictionary reference, not a resource name
                    self.state.text.font = match font {
                        Value::Name(n) => Some(n.clone()),
                        Value::Reference(font_ref) => Some(format!("{font_ref} R").into()),
                        _ => None,
                    };
                    self.state.text.font_size = number("gs", size)?;
                }
                "CA" => self.state.stroke_alpha = number("gs", &value)?,
                "ca" => self.state.fill_alpha = number("gs", &value)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn dash_pattern(op: &str, array: &Value, phase: &Value) -> Result<DashPattern, Diagnostic> {
    let array = array
        .as_numbers()
        .map_err(|_| bad_operand(op, "dash array must hold numbers"))?;
    Ok(DashPattern {
        array,
        phase: number(op, phase)?,
    })
}
