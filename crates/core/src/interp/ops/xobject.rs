//! XObject, image and marked content operators.
//!
//! Handles: Do, BI, ID, EI, BMC, BDC, EMC, MP, DP, sh, d0, d1, BX, EX
//!
//! - Do: Paint an XObject (form or image)
//! - BI/ID/EI: Inline images. The content parser folds the whole
//!   `BI ... ID data EI` sequence into one `BI` operation; a stray `ID` or
//!   `EI` is an error.
//! - BMC/BDC/EMC: Marked content sequences
//! - MP/DP: Marked content points
//! - sh: Paint a shading
//! - d0/d1: Type 3 glyph metrics
//! - BX/EX: Compatibility sections, where unknown operators are ignored

use super::{bad_operand, name, numbers, tail};
use crate::diagnostics::Diagnostic;
use crate::interp::device::ImageXObject;
use crate::interp::engine::{Engine, OpResult};
use crate::model::object::{Name, Value};

#[allow(non_snake_case)]
impl Engine<'_> {
    /// Properties operand of `BDC`/`DP`: inline dictionary or a name in
    /// `/Properties`.
    fn marked_content_props(&self, op: &str, props: &Value) -> Result<Value, Diagnostic> {
        match props {
            Value::Name(key) => self
                .resource("Properties", key)
                .map(|v| self.resolve(&v))
                .ok_or_else(|| bad_operand(op, format!("no Properties named {key}"))),
            Value::Dictionary(_) => Ok(props.clone()),
            other => Err(bad_operand(
                op,
                format!("expected dictionary or name, got {}", other.type_name()),
            )),
        }
    }

    // ========================================================================
    // XObject Operators
    // ========================================================================

    /// Do - Paint the named XObject.
    ///
    /// Forms run in a child frame; images go to the device. Other
    /// subtypes (PostScript) are skipped.
    pub fn do_Do(&mut self, operands: &[Value]) -> OpResult {
        let [operand] = tail::<1>("Do", operands)?;
        let xobj_name = name("Do", operand)?;
        let entry = self
            .resource("XObject", xobj_name)
            .ok_or_else(|| bad_operand("Do", format!("no XObject named {xobj_name}")))?;
        let key = entry.as_reference().ok();
        let Value::Stream(xobj) = self.resolve(&entry) else {
            return Err(bad_operand("Do", format!("XObject {xobj_name} is not a stream")));
        };

        match xobj.get("Subtype").and_then(|s| s.as_name().ok()) {
            Some("Form") => self.run_form(xobj_name, key, &xobj),
            Some("Image") => {
                let image = ImageXObject {
                    name: Some(Name::new(xobj_name)),
                    key,
                    dict: xobj.dict.clone(),
                    data: xobj.raw_bytes(),
                    ctm: self.state.ctm,
                };
                self.device.draw_image(&self.state, &image);
                Ok(())
            }
            other => {
                tracing::debug!(xobject = xobj_name, subtype = ?other, "skipping XObject");
                Ok(())
            }
        }
    }

    // ========================================================================
    // Inline Image Operators
    // ========================================================================

    /// BI - Paint the inline image attached to this operation.
    pub fn do_BI(&mut self, _operands: &[Value]) -> OpResult {
        let Some(inline) = self.pending_inline.take() else {
            return Err(bad_operand("BI", "no image data"));
        };
        let image = ImageXObject {
            name: None,
            key: None,
            dict: inline.params,
            data: inline.data,
            ctm: self.state.ctm,
        };
        self.device.draw_image(&self.state, &image);
        Ok(())
    }

    /// ID - Only valid inside `BI`.
    pub fn do_ID(&mut self, _operands: &[Value]) -> OpResult {
        Err(bad_operand("ID", "outside an inline image"))
    }

    /// EI - Only valid inside `BI`.
    pub fn do_EI(&mut self, _operands: &[Value]) -> OpResult {
        Err(bad_operand("EI", "outside an inline image"))
    }

    // ========================================================================
    // Marked Content Operators
    // ========================================================================

    /// BMC - Begin marked content.
    pub fn do_BMC(&mut self, operands: &[Value]) -> OpResult {
        let [tag] = tail::<1>("BMC", operands)?;
        let tag = name("BMC", tag)?;
        self.device.begin_marked_content(tag, None);
        Ok(())
    }

    /// BDC - Begin marked content with a property list.
    pub fn do_BDC(&mut self, operands: &[Value]) -> OpResult {
        let [tag, props] = tail::<2>("BDC", operands)?;
        let tag = name("BDC", tag)?;
        let props = self.marked_content_props("BDC", props)?;
        self.device.begin_marked_content(tag, Some(&props));
        Ok(())
    }

    /// EMC - End marked content.
    pub fn do_EMC(&mut self, _operands: &[Value]) -> OpResult {
        self.device.end_marked_content();
        Ok(())
    }

    /// MP - Marked content point.
    pub fn do_MP(&mut self, operands: &[Value]) -> OpResult {
        let [tag] = tail::<1>("MP", operands)?;
        let tag = name("MP", tag)?;
        self.device.mark_point(tag, None);
        Ok(())
    }

    /// DP - Marked content point with a property list.
    pub fn do_DP(&mut self, operands: &[Value]) -> OpResult {
        let [tag, props] = tail::<2>("DP", operands)?;
        let tag = name("DP", tag)?;
        let props = self.marked_content_props("DP", props)?;
        self.device.mark_point(tag, Some(&props));
        Ok(())
    }

    // ========================================================================
    // Shading and Type 3 Operators
    // ========================================================================

    /// sh - Paint the named shading over the current clip.
    pub fn do_sh(&mut self, operands: &[Value]) -> OpResult {
        let [shading] = tail::<1>("sh", operands)?;
        let shading = name("sh", shading)?;
        self.device.shade(&self.state, shading);
        Ok(())
    }

    /// d0 - Type 3 glyph width. Only meaningful inside a glyph procedure.
    pub fn do_d0(&mut self, operands: &[Value]) -> OpResult {
        numbers::<2>("d0", operands)?;
        Ok(())
    }

    /// d1 - Type 3 glyph width and bounding box.
    pub fn do_d1(&mut self, operands: &[Value]) -> OpResult {
        numbers::<6>("d1", operands)?;
        Ok(())
    }

    // ========================================================================
    // Compatibility Operators
    // ========================================================================

    /// BX - Begin compatibility section.
    pub fn do_BX(&mut self, _operands: &[Value]) -> OpResult {
        self.compat_depth += 1;
        Ok(())
    }

    /// EX - End compatibility section.
    pub fn do_EX(&mut self, _operands: &[Value]) -> OpResult {
        if self.compat_depth == 0 {
            return Err(bad_operand("EX", "no open BX"));
        }
        self.compat_depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::interp::device::{DeviceCall, RecordingDevice};
    use crate::interp::engine::Engine;
    use crate::model::object::{Dictionary, Stream, Value};
    use crate::model::state::GraphicsState;

    fn xobject_resources(entries: Vec<(&str, Value)>) -> Dictionary {
        let mut xobjects = Dictionary::new();
        for (name, value) in entries {
            xobjects.insert(name.into(), value);
        }
        let mut resources = Dictionary::new();
        resources.insert("XObject".into(), Value::Dictionary(xobjects));
        resources
    }

    fn stream(subtype: &str, extra: Vec<(&str, Value)>, data: &'static [u8]) -> Value {
        let mut dict = Dictionary::new();
        dict.insert("Subtype".into(), Value::name(subtype));
        for (key, value) in extra {
            dict.insert(key.into(), value);
        }
        Value::Stream(Box::new(Stream::new(dict, data)))
    }

    #[test]
    fn test_image_xobject() {
        let resources = xobject_resources(vec![(
            "Im1",
            stream("Image", vec![("Width", Value::Int(1))], b"\xff"),
        )]);
        let mut dev = RecordingDevice::new();
        let mut engine =
            Engine::new(&mut dev, GraphicsState::default()).with_resources(resources);
        engine.run(b"q 50 0 0 50 10 10 cm /Im1 Do Q /Missing Do");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
        drop(engine);
        let DeviceCall::DrawImage(image) = &dev.calls[0] else {
            panic!("expected image, got {:?}", dev.calls[0]);
        };
        assert_eq!(image.name.as_deref(), Some("Im1"));
        assert_eq!(image.ctm, (50.0, 0.0, 0.0, 50.0, 10.0, 10.0));
        assert_eq!(&image.data[..], b"\xff");
    }

    #[test]
    fn test_form_xobject_runs_nested() {
        let form = stream(
            "Form",
            vec![
                (
                    "Matrix",
                    Value::Array(vec![1, 0, 0, 1, 5, 5].into_iter().map(Value::Int).collect()),
                ),
                (
                    "BBox",
                    Value::Array(vec![0, 0, 10, 10].into_iter().map(Value::Int).collect()),
                ),
            ],
            b"0 0 1 1 re f q",
        );
        let resources = xobject_resources(vec![("Fm1", form)]);
        let mut dev = RecordingDevice::new();
        let mut engine =
            Engine::new(&mut dev, GraphicsState::default()).with_resources(resources);
        engine.run(b"/Fm1 Do 0 0 m");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::UnbalancedSave), 1);
        assert_eq!(engine.stack_depth(), 1);
        assert_eq!(engine.form_depth(), 0);
        assert_eq!(engine.state().clip.len(), 0);
        drop(engine);
        assert!(matches!(dev.calls[0], DeviceCall::BeginForm(_)));
        assert!(matches!(dev.calls.last(), Some(DeviceCall::EndForm)));
        let (path, _) = dev.paths().next().unwrap();
        assert_eq!(path.bounding_box(), Some((5.0, 5.0, 6.0, 6.0)));
    }

    #[test]
    fn test_inline_image_reaches_device() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\x01 EI EI");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
        drop(engine);
        let DeviceCall::DrawImage(image) = &dev.calls[0] else {
            panic!("expected image");
        };
        assert!(image.name.is_none());
        assert_eq!(&image.data[..], b"\x00\x01");
        assert_eq!(image.dict.get("Width"), Some(&Value::Int(2)));
        assert_eq!(image.dict.get("ColorSpace"), Some(&Value::name("DeviceGray")));
    }

    #[test]
    fn test_marked_content() {
        let mut props = Dictionary::new();
        props.insert("MCID".into(), Value::Int(0));
        let mut named = Dictionary::new();
        named.insert("P1".into(), Value::Dictionary(props.clone()));
        let mut resources = Dictionary::new();
        resources.insert("Properties".into(), Value::Dictionary(named));

        let mut dev = RecordingDevice::new();
        let mut engine =
            Engine::new(&mut dev, GraphicsState::default()).with_resources(resources);
        engine.run(b"/Span /P1 BDC EMC /Tag MP /Tag <</MCID 0>> DP /X /Nope BDC");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
        drop(engine);
        assert_eq!(
            dev.calls[0],
            DeviceCall::BeginMarkedContent {
                tag: "Span".into(),
                props: Some(Value::Dictionary(props.clone())),
            }
        );
        assert_eq!(dev.calls[1], DeviceCall::EndMarkedContent);
        assert_eq!(
            dev.calls[3],
            DeviceCall::MarkPoint {
                tag: "Tag".into(),
                props: Some(Value::Dictionary(props)),
            }
        );
    }

    #[test]
    fn test_unmatched_ex() {
        let mut dev = RecordingDevice::new();
        let mut engine = Engine::new(&mut dev, GraphicsState::default());
        engine.run(b"EX 1 0 0 1 0 0 d1 5 d0");
        assert_eq!(engine.diagnostics().count(DiagnosticKind::BadOperand), 1);
        assert_eq!(engine.diagnostics().count(DiagnosticKind::MissingOperands), 1);
    }
}
