//! Color operators.
//!
//! Handles: G, g, RG, rg, K, k, CS, cs, SC, SCN, sc, scn
//!
//! Device color shortcuts:
//! - G/g: Gray (stroke/fill)
//! - RG/rg: RGB (stroke/fill)
//! - K/k: CMYK (stroke/fill)
//!
//! Color space operators:
//! - CS/cs: Set color space (stroke/fill)
//! - SC/sc: Set color in current space (stroke/fill)
//! - SCN/scn: Set color with pattern support (stroke/fill)
//!
//! Uppercase operators affect stroking, lowercase affect non-stroking.

use super::{bad_operand, missing_operands, name, number, numbers, tail};
use crate::diagnostics::Diagnostic;
use crate::interp::engine::{Engine, OpResult};
use crate::model::color::{Color, ColorSpace};
use crate::model::object::Value;

#[allow(non_snake_case)]
impl Engine<'_> {
    fn set_color_space(&mut self, op: &str, operands: &[Value], stroke: bool) -> OpResult {
        let [operand] = tail::<1>(op, operands)?;
        let key = name(op, operand)?;
        let space = match ColorSpace::from_name(key) {
            Some(space) => space,
            None => self
                .resource("ColorSpace", key)
                .and_then(|def| ColorSpace::from_value(&def, &|v| self.resolve(v)))
                .ok_or_else(|| bad_operand(op, format!("unknown color space {key}")))?,
        };
        if stroke {
            self.state.set_stroke_space(space);
        } else {
            self.state.set_fill_space(space);
        }
        Ok(())
    }

    fn set_color(&mut self, op: &str, operands: &[Value], stroke: bool) -> OpResult {
        let space = if stroke {
            &self.state.stroke_space
        } else {
            &self.state.fill_space
        };
        let color = color_operands(op, space, operands)?;
        if stroke {
            self.state.stroke_color = color;
        } else {
            self.state.fill_color = color;
        }
        Ok(())
    }

    fn set_device_color(&mut self, space: ColorSpace, color: Color, stroke: bool) {
        if stroke {
            self.state.stroke_space = space;
            self.state.stroke_color = color;
        } else {
            self.state.fill_space = space;
            self.state.fill_color = color;
        }
    }

    // ========================================================================
    // Color Space Operators
    // ========================================================================

    /// CS - Set stroking color space.
    pub fn do_CS(&mut self, operands: &[Value]) -> OpResult {
        self.set_color_space("CS", operands, true)
    }

    /// cs - Set non-stroking color space.
    pub fn do_cs(&mut self, operands: &[Value]) -> OpResult {
        self.set_color_space("cs", operands, false)
    }

    /// SC - Set stroking color in the current space.
    pub fn do_SC(&mut self, operands: &[Value]) -> OpResult {
        if self.state.stroke_space.is_pattern() {
            return Err(bad_operand("SC", "pattern spaces need SCN"));
        }
        self.set_color("SC", operands, true)
    }

    /// SCN - Set stroking color, patterns included.
    pub fn do_SCN(&mut self, operands: &[Value]) -> OpResult {
        self.set_color("SCN", operands, true)
    }

    /// sc - Set non-stroking color in the current space.
    pub fn do_sc(&mut self, operands: &[Value]) -> OpResult {
        if self.state.fill_space.is_pattern() {
            return Err(bad_operand("sc", "pattern spaces need scn"));
        }
        self.set_color("sc", operands, false)
    }

    /// scn - Set non-stroking color, patterns included.
    pub fn do_scn(&mut self, operands: &[Value]) -> OpResult {
        self.set_color("scn", operands, false)
    }

    // ========================================================================
    // Device Color Operators
    // ========================================================================

    /// G - Set stroking gray level.
    pub fn do_G(&mut self, operands: &[Value]) -> OpResult {
        let [gray] = numbers::<1>("G", operands)?;
        self.set_device_color(ColorSpace::DeviceGray, Color::Gray(gray), true);
        Ok(())
    }

    /// g - Set non-stroking gray level.
    pub fn do_g(&mut self, operands: &[Value]) -> OpResult {
        let [gray] = numbers::<1>("g", operands)?;
        self.set_device_color(ColorSpace::DeviceGray, Color::Gray(gray), false);
        Ok(())
    }

    /// RG - Set stroking RGB color.
    pub fn do_RG(&mut self, operands: &[Value]) -> OpResult {
        let [r, g, b] = numbers::<3>("RG", operands)?;
        self.set_device_color(ColorSpace::DeviceRgb, Color::Rgb(r, g, b), true);
        Ok(())
    }

    /// rg - Set non-stroking RGB color.
    pub fn do_rg(&mut self, operands: &[Value]) -> OpResult {
        let [r, g, b] = numbers::<3>("rg", operands)?;
        self.set_device_color(ColorSpace::DeviceRgb, Color::Rgb(r, g, b), false);
        Ok(())
    }

    /// K - Set stroking CMYK color.
    pub fn do_K(&mut self, operands: &[Value]) -> OpResult {
        let [c, m, y, k] = numbers::<4>("K", operands)?;
        self.set_device_color(ColorSpace::DeviceCmyk, Color::Cmyk(c, m, y, k), true);
        Ok(())
    }

    /// k - Set non-stroking CMYK color.
    pub fn do_k(&mut self, operands: &[Value]) -> OpResult {
        let [c, m, y, k] = numbers::<4>("k", operands)?;
        self.set_device_color(ColorSpace::DeviceCmyk, Color::Cmyk(c, m, y, k), false);
        Ok(())
    }
}

/// Builds a color from `SC`/`SCN` style operands. The operand count must
/// match the space exactly; in a pattern space a trailing pattern name
/// follows the base space's components.
fn color_operands(op: &str, space: &ColorSpace, operands: &[Value]) -> Result<Color, Diagnostic> {
    let (pattern, operands) = match (space, operands.split_last()) {
        (ColorSpace::Pattern { .. }, Some((last, rest))) => (Some(name(op, last)?), rest),
        (ColorSpace::Pattern { .. }, None) => return Err(missing_operands(op, 1, 0)),
        _ => (None, operands),
    };

    let expected = space.ncomponents();
    if operands.len() < expected {
        return Err(missing_operands(op, expected, operands.len()));
    }
    if operands.len() > expected {
        return Err(bad_operand(
            op,
            format!(
                "{} takes {expected} components, got {}",
                space.family(),
                operands.len()
            ),
        ));
    }
    let values = operands
        .iter()
        .map(|v| number(op, v))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match (space, pattern) {
        (ColorSpace::Pattern { base: Some(base) }, Some(pattern)) => {
            Color::PatternUncolored(Box::new(base.color_from(&values)), pattern.into())
        }
        (_, Some(pattern)) => Color::PatternColored(pattern.into()),
        (_, None) => space.color_from(&values),
    })
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::interp::device::RecordingDevice;
    use crate::interp::engine::Engine;
    use crate::model::color::{Color, ColorSpace};
    use crate::model::object::{Dictionary, Value};
    use crate::model::state::GraphicsState;

    fn engine_with_spaces(dev: &mut RecordingDevice) -> Engine<'_> {
        let mut spaces = Dictionary::new();
        spaces.insert(
            "P0".into(),
            Value::Array(vec![Value::name("Pattern"), Value::name("DeviceRGB")]),
        );
        spaces.insert(
            "Sep".into(),
            Value::Array(vec![
                Value::name("Separation"),
                Value::name("Spot"),
                Value::name("DeviceCMYK"),
                Value::Null,
            ]),
        );
        let mut resources = Dictionary::new();
        resources.insert("ColorSpace".into(), Value::Dictionary(spaces));
        Engine::new(dev, GraphicsState::default()).with_resources(resources)
    }

    #[test]
    fn test_device_shortcuts_set_space() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"1 0 0 RG 0 0 0 1 k");
        assert_eq!(engine.state().stroke_space, ColorSpace::DeviceRgb);
        assert_eq!(engine.state().stroke_color, Color::Rgb(1.0, 0.0, 0.0));
        assert_eq!(engine.state().fill_space, ColorSpace::DeviceCmyk);
        assert_eq!(engine.state().fill_color, Color::Cmyk(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_cs_resets_color() {
        let mut dev = RecordingDevice::new();
        let mut engine = engine_with_spaces(&mut dev);
        engine.run(b"0.5 g /Sep cs");
        assert_eq!(engine.state().fill_color, Color::Components([1.0].into_iter().collect()));
        engine.run(b"0.25 sc");
        assert_eq!(engine.state().fill_color, Color::Components([0.25].into_iter().collect()));
        assert!(engine.diagnostics().is_empty());
    }

    #[test]
    fn test_sc_component_count() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"/DeviceRGB CS 1 0 SC 1 0 0 0 SC");
        let diags = engine.diagnostics();
        assert_eq!(diags.count(DiagnosticKind::MissingOperands), 1);
        assert_eq!(diags.count(DiagnosticKind::BadOperand), 1);
        assert_eq!(engine.state().stroke_color, Color::Rgb(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_uncolored_pattern() {
        let mut dev = RecordingDevice::new();
        let mut engine = engine_with_spaces(&mut dev);
        engine.run(b"/P0 cs 1 0 0 /Hatch scn");
        assert_eq!(
            engine.state().fill_color,
            Color::PatternUncolored(Box::new(Color::Rgb(1.0, 0.0, 0.0)), "Hatch".into())
        );
        engine.run(b"/Pattern CS /Dots SCN 1 sc");
        assert_eq!(engine.state().stroke_color, Color::PatternColored("Dots".into()));
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
    }

    #[test]
    fn test_unknown_space() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"/Nope cs");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
        assert_eq!(engine.state().fill_space, ColorSpace::DeviceGray);
    }
}
