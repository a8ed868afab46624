//! Text operators.
//!
//! Handles: BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T*, Tj, TJ, ', "
//!
//! Text object:
//! - BT/ET: Begin/end text object
//!
//! Text state:
//! - Tc: Character spacing
//! - Tw: Word spacing
//! - Tz: Horizontal scaling
//! - TL: Leading
//! - Tf: Font and size
//! - Tr: Rendering mode
//! - Ts: Rise (baseline offset)
//!
//! Text positioning:
//! - Td/TD: Move to next line (TD also sets leading)
//! - Tm: Set text matrix directly
//! - T*: Move to next line using current leading
//!
//! Text showing:
//! - Tj: Show string
//! - TJ: Show with individual glyph positioning
//! - ': Move to next line and show
//! - ": Set spacing, move to next line, and show
//!
//! Text state operators are legal outside `BT`/`ET`; positioning and
//! showing are not.

use super::{bad_operand, name, number, numbers, tail};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::interp::device::GlyphRun;
use crate::interp::engine::{Engine, OpResult, TextMode};
use crate::model::object::Value;
use crate::model::state::TextObject;
use crate::utils::{mult_matrix, translate_matrix};

#[allow(non_snake_case)]
impl Engine<'_> {
    fn require_text_object(&self, op: &str) -> OpResult {
        match self.text_mode {
            TextMode::InTextObject => Ok(()),
            TextMode::Idle => Err(Diagnostic::new(
                DiagnosticKind::TextObjectMisuse,
                format!("{op} outside BT/ET"),
            )),
        }
    }

    /// Shows one string and advances the text matrix past it.
    fn show_string(&mut self, codes: &[u8]) {
        let ts = &self.state.text;
        let scale = ts.scale_factor();
        let params = (ts.font_size * scale, 0.0, 0.0, ts.font_size, 0.0, ts.rise);
        let run = GlyphRun {
            font: ts.font.clone(),
            font_size: ts.font_size,
            codes: codes.to_vec(),
            matrix: mult_matrix(params, mult_matrix(self.text.matrix, self.state.ctm)),
            render_mode: ts.render_mode,
        };
        let glyph_advance = self.device.show_glyphs(&self.state, &run);

        let ts = &self.state.text;
        let spaces = codes.iter().filter(|&&b| b == b' ').count() as f64;
        let tx = (glyph_advance / 1000.0 * ts.font_size
            + ts.char_spacing * codes.len() as f64
            + ts.word_spacing * spaces)
            * scale;
        self.text.matrix = translate_matrix(self.text.matrix, (tx, 0.0));
    }

    // ========================================================================
    // Text Object Operators
    // ========================================================================

    /// BT - Begin text object.
    ///
    /// Resets the text matrix and text line matrix to identity. A nested
    /// `BT` is reported and treated as a fresh text object.
    pub fn do_BT(&mut self, _operands: &[Value]) -> OpResult {
        let nested = self.text_mode == TextMode::InTextObject;
        self.text_mode = TextMode::InTextObject;
        self.text = TextObject::default();
        if nested {
            return Err(Diagnostic::new(
                DiagnosticKind::TextObjectMisuse,
                "BT inside a text object",
            ));
        }
        Ok(())
    }

    /// ET - End text object. The text matrices are discarded.
    pub fn do_ET(&mut self, _operands: &[Value]) -> OpResult {
        self.require_text_object("ET")?;
        self.text_mode = TextMode::Idle;
        self.text = TextObject::default();
        Ok(())
    }

    // ========================================================================
    // Text State Operators
    // ========================================================================

    /// Tc - Set character spacing.
    pub fn do_Tc(&mut self, operands: &[Value]) -> OpResult {
        let [spacing] = numbers::<1>("Tc", operands)?;
        self.state.text.char_spacing = spacing;
        Ok(())
    }

    /// Tw - Set word spacing.
    pub fn do_Tw(&mut self, operands: &[Value]) -> OpResult {
        let [spacing] = numbers::<1>("Tw", operands)?;
        self.state.text.word_spacing = spacing;
        Ok(())
    }

    /// Tz - Set horizontal scaling, in percent.
    pub fn do_Tz(&mut self, operands: &[Value]) -> OpResult {
        let [scale] = numbers::<1>("Tz", operands)?;
        self.state.text.horizontal_scale = scale;
        Ok(())
    }

    /// TL - Set text leading.
    pub fn do_TL(&mut self, operands: &[Value]) -> OpResult {
        let [leading] = numbers::<1>("TL", operands)?;
        self.state.text.leading = leading;
        Ok(())
    }

    /// Tf - Set font resource and size.
    pub fn do_Tf(&mut self, operands: &[Value]) -> OpResult {
        let [font, size] = tail::<2>("Tf", operands)?;
        let font = name("Tf", font)?;
        let size = number("Tf", size)?;
        if self.resource("Font", font).is_none() && self.resources.contains_key("Font") {
            tracing::debug!(font, "Tf names a font missing from resources");
        }
        self.state.text.font = Some(font.into());
        self.state.text.font_size = size;
        Ok(())
    }

    /// Tr - Set rendering mode.
    pub fn do_Tr(&mut self, operands: &[Value]) -> OpResult {
        let [mode] = numbers::<1>("Tr", operands)?;
        self.state.text.render_mode = mode as i64;
        Ok(())
    }

    /// Ts - Set rise.
    pub fn do_Ts(&mut self, operands: &[Value]) -> OpResult {
        let [rise] = numbers::<1>("Ts", operands)?;
        self.state.text.rise = rise;
        Ok(())
    }

    // ========================================================================
    // Text Positioning Operators
    // ========================================================================

    /// Td - Move to the start of the next line, offset by (tx, ty).
    pub fn do_Td(&mut self, operands: &[Value]) -> OpResult {
        let [tx, ty] = numbers::<2>("Td", operands)?;
        self.require_text_object("Td")?;
        self.text.line_matrix = translate_matrix(self.text.line_matrix, (tx, ty));
        self.text.matrix = self.text.line_matrix;
        Ok(())
    }

    /// TD - Move to the next line and set leading to -ty.
    pub fn do_TD(&mut self, operands: &[Value]) -> OpResult {
        let [_, ty] = tail::<2>("TD", operands)?;
        let leading = -number("TD", ty)?;
        self.invoke("TL", &[Value::Real(leading)])?;
        self.invoke("Td", operands)
    }

    /// Tm - Set the text matrix and text line matrix.
    pub fn do_Tm(&mut self, operands: &[Value]) -> OpResult {
        let [a, b, c, d, e, f] = numbers::<6>("Tm", operands)?;
        self.require_text_object("Tm")?;
        self.text.matrix = (a, b, c, d, e, f);
        self.text.line_matrix = self.text.matrix;
        Ok(())
    }

    /// T* - Move to the start of the next line using the leading.
    pub fn do_T_star(&mut self, _operands: &[Value]) -> OpResult {
        let leading = self.state.text.leading;
        self.invoke("Td", &[Value::Int(0), Value::Real(-leading)])
    }

    // ========================================================================
    // Text Showing Operators
    // ========================================================================

    /// Tj - Show a text string.
    pub fn do_Tj(&mut self, operands: &[Value]) -> OpResult {
        let [string] = tail::<1>("Tj", operands)?;
        let codes = string
            .as_string()
            .map_err(|_| bad_operand("Tj", format!("expected string, got {}", string.type_name())))?;
        self.require_text_object("Tj")?;
        self.show_string(codes);
        Ok(())
    }

    /// TJ - Show strings with individual positioning.
    ///
    /// Numbers move the next glyph left by thousandths of text space.
    pub fn do_TJ(&mut self, operands: &[Value]) -> OpResult {
        let [array] = tail::<1>("TJ", operands)?;
        let items = array
            .as_array()
            .map_err(|_| bad_operand("TJ", format!("expected array, got {}", array.type_name())))?;
        self.require_text_object("TJ")?;
        for item in items {
            match item {
                Value::String(codes) => self.show_string(codes),
                Value::Int(_) | Value::Real(_) => {
                    let adjust = number("TJ", item)?;
                    let ts = &self.state.text;
                    let tx = -adjust / 1000.0 * ts.font_size * ts.scale_factor();
                    self.text.matrix = translate_matrix(self.text.matrix, (tx, 0.0));
                }
                other => {
                    return Err(bad_operand(
                        "TJ",
                        format!("unexpected {} in array", other.type_name()),
                    ));
                }
            }
        }
        Ok(())
    }

    /// ' - Move to the next line and show a string.
    pub fn do_quote(&mut self, operands: &[Value]) -> OpResult {
        let [string] = tail::<1>("'", operands)?;
        self.invoke("T*", &[])?;
        self.invoke("Tj", std::slice::from_ref(string))
    }

    /// " - Set word and character spacing, move to the next line, and show
    /// a string.
    pub fn do_doublequote(&mut self, operands: &[Value]) -> OpResult {
        let [aw, ac, string] = tail::<3>("\"", operands)?;
        self.invoke("Tw", std::slice::from_ref(aw))?;
        self.invoke("Tc", std::slice::from_ref(ac))?;
        self.invoke("'", std::slice::from_ref(string))
    }
}
