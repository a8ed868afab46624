//! Content stream execution.
//!
//! The [`Engine`] owns the graphics state stack, the text object, the
//! path under construction and the form invocation stack. Operators are
//! looked up in an [`OperatorTable`] and run against it one at a time.

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::codec::{self, FlateDecoder};
use crate::config::ParseParams;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::document::graph::ObjectGraph;
use crate::interp::content::{ContentParser, InlineImage, Operation};
use crate::interp::device::{Device, FillRule, FormInfo, Path, PaintOp};
use crate::interp::ops::OperatorTable;
use crate::model::object::{Dictionary, Name, ObjectKey, Stream, Value};
use crate::model::state::{ClipPath, GraphicsState, TextObject};
use crate::utils::{MATRIX_IDENTITY, Matrix, Point, matrix_from_slice, mult_matrix};

/// Outcome of an operator handler. Errors are recorded, never fatal.
pub type OpResult = std::result::Result<(), Diagnostic>;

/// An operator implementation.
pub type OpHandler = fn(&mut Engine<'_>, &[Value]) -> OpResult;

/// Whether a `BT` is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Idle,
    InTextObject,
}

/// Shared flag that stops execution at the next operator boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of running a content stream.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub diagnostics: Diagnostics,
    /// Operators executed, nested forms included.
    pub operators: usize,
    /// Stopped early by cancellation or the operator budget.
    pub cancelled: bool,
    pub final_state: GraphicsState,
}

/// Per-invocation state that a form frame replaces and later restores.
struct Frame {
    state: GraphicsState,
    saved: Vec<GraphicsState>,
    text_mode: TextMode,
    text: TextObject,
    path: Path,
    current_point: Option<Point>,
    subpath_start: Option<Point>,
    pending_clip: Option<FillRule>,
    resources: Dictionary,
    compat_depth: usize,
}

/// Content stream interpreter.
pub struct Engine<'a> {
    table: &'a OperatorTable,
    pub(super) device: &'a mut dyn Device,
    graph: Option<&'a ObjectGraph>,
    max_form_depth: usize,
    operator_budget: Option<usize>,
    cancel: Option<CancelToken>,

    pub(super) state: GraphicsState,
    pub(super) saved: Vec<GraphicsState>,
    pub(super) text_mode: TextMode,
    pub(super) text: TextObject,
    pub(super) path: Path,
    pub(super) current_point: Option<Point>,
    pub(super) subpath_start: Option<Point>,
    pub(super) pending_clip: Option<FillRule>,
    pub(super) resources: Dictionary,
    pub(super) compat_depth: usize,
    pub(super) pending_inline: Option<InlineImage>,
    form_stack: Vec<Option<ObjectKey>>,

    executed: usize,
    halted: bool,
    offset: usize,
    diagnostics: Diagnostics,
}

impl<'a> Engine<'a> {
    /// Engine over the shared operator table with default limits.
    pub fn new(device: &'a mut dyn Device, start: GraphicsState) -> Self {
        let params = ParseParams::default();
        Self {
            table: OperatorTable::shared(),
            device,
            graph: None,
            max_form_depth: params.max_form_depth,
            operator_budget: params.operator_budget,
            cancel: None,
            state: start,
            saved: Vec::new(),
            text_mode: TextMode::Idle,
            text: TextObject::default(),
            path: Path::new(),
            current_point: None,
            subpath_start: None,
            pending_clip: None,
            resources: Dictionary::new(),
            compat_depth: 0,
            pending_inline: None,
            form_stack: Vec::new(),
            executed: 0,
            halted: false,
            offset: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_params(mut self, params: &ParseParams) -> Self {
        self.max_form_depth = params.max_form_depth;
        self.operator_budget = params.operator_budget;
        self
    }

    pub fn with_table(mut self, table: &'a OperatorTable) -> Self {
        self.table = table;
        self
    }

    /// Resolves references in resources and decodes form streams
    /// through `graph`.
    pub fn with_graph(mut self, graph: &'a ObjectGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Resource dictionary for names used by `gs`, `Do`, `CS`, `sh` and `BDC`.
    pub fn with_resources(mut self, resources: Dictionary) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Number of states on the stack, the current one included.
    pub fn stack_depth(&self) -> usize {
        self.saved.len() + 1
    }

    pub fn text_mode(&self) -> TextMode {
        self.text_mode
    }

    /// Text matrices, meaningful only inside `BT`/`ET`.
    pub fn text_object(&self) -> &TextObject {
        &self.text
    }

    pub fn current_path(&self) -> &Path {
        &self.path
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn operators_executed(&self) -> usize {
        self.executed
    }

    /// True once cancellation or the budget stopped execution.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Forms currently being executed, outermost first.
    pub fn form_depth(&self) -> usize {
        self.form_stack.len()
    }

    pub fn finish(self) -> RunReport {
        RunReport {
            diagnostics: self.diagnostics,
            operators: self.executed,
            cancelled: self.halted,
            final_state: self.state,
        }
    }

    /// Parses and runs decoded content bytes.
    pub fn run(&mut self, content: &[u8]) {
        let mut parser = ContentParser::new(content);
        let base = self.saved.len();
        for op in parser.by_ref() {
            if self.should_stop() {
                break;
            }
            self.execute(op);
        }
        self.diagnostics.extend(parser.take_diagnostics());
        self.check_balance(base);
    }

    /// Runs already-parsed operations.
    pub fn run_operations(&mut self, ops: impl IntoIterator<Item = Operation>) {
        let base = self.saved.len();
        for op in ops {
            if self.should_stop() {
                break;
            }
            self.execute(op);
        }
        self.check_balance(base);
    }

    /// Runs a page `/Contents` value: one stream or an array of streams.
    /// Needs a graph; decode and reference problems are recorded on it.
    pub fn run_contents(&mut self, contents: &Value) {
        let Some(graph) = self.graph else {
            self.report(Diagnostic::new(
                DiagnosticKind::MissingObject,
                "page contents need an object graph",
            ));
            return;
        };
        let data = graph.content_bytes(contents);
        self.run(&data);
    }

    fn execute(&mut self, op: Operation) {
        self.executed += 1;
        self.offset = op.offset;
        self.pending_inline = op.inline_image;
        if let Err(diag) = self.invoke(&op.operator, &op.operands) {
            self.report(diag);
        }
        self.pending_inline = None;
    }

    fn should_stop(&mut self) -> bool {
        if self.halted {
            return true;
        }
        let reason = if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            Some("cancelled".to_string())
        } else {
            self.operator_budget
                .filter(|budget| self.executed >= *budget)
                .map(|budget| format!("operator budget of {budget} exhausted"))
        };
        match reason {
            Some(reason) => {
                self.halted = true;
                self.report(Diagnostic::new(DiagnosticKind::Cancelled, reason));
                true
            }
            None => false,
        }
    }

    fn check_balance(&mut self, base: usize) {
        let open = self.saved.len().saturating_sub(base);
        if open > 0 {
            self.report(Diagnostic::new(
                DiagnosticKind::UnbalancedSave,
                format!("{open} q without matching Q"),
            ));
        }
    }

    /// Runs one operator through the table. Compound operators call this
    /// with their primitive names.
    pub fn invoke(&mut self, name: &str, operands: &[Value]) -> OpResult {
        match self.table.get(name) {
            Some(handler) => handler(self, operands),
            None if self.compat_depth > 0 => {
                tracing::trace!(operator = name, "ignored inside BX/EX");
                Ok(())
            }
            None => Err(Diagnostic::new(
                DiagnosticKind::UnknownOperator,
                format!("unknown operator {name}"),
            )),
        }
    }

    /// Records a diagnostic at the current operator.
    pub fn report(&mut self, mut diag: Diagnostic) {
        if diag.offset.is_none() {
            diag.offset = Some(self.offset);
        }
        self.diagnostics.push(diag);
    }

    /// Dereferences through the graph when there is one.
    pub(super) fn resolve(&self, value: &Value) -> Value {
        match self.graph {
            Some(graph) => graph.resolve(value),
            None => value.clone(),
        }
    }

    /// Entry `name` of resource category `category` (`/XObject`, `/Font` ...).
    pub(super) fn resource(&self, category: &str, name: &str) -> Option<Value> {
        let category = self.resolve(self.resources.get(category)?);
        let entry = category.as_dict().ok()?.get(name)?.clone();
        Some(entry)
    }

    pub(super) fn decode(&self, stream: &Stream) -> crate::error::Result<Vec<u8>> {
        match self.graph {
            Some(graph) => graph.decode_stream(stream),
            None => codec::decode_stream(stream, &FlateDecoder, &|v: &Value| v.clone()),
        }
    }

    /// Paints the current path, applies a pending clip, and starts a new
    /// path.
    pub(super) fn end_path(&mut self, paint: Option<PaintOp>) {
        let path = mem::take(&mut self.path);
        if let Some(paint) = paint
            && !path.is_empty()
        {
            self.device.paint_path(&self.state, &path, paint);
        }
        if let Some(rule) = self.pending_clip.take() {
            self.device.clip_path(&self.state, &path, rule);
            self.state.clip.push(ClipPath { path, rule });
        }
        self.current_point = None;
        self.subpath_start = None;
    }

    /// Executes a form XObject in a child frame.
    pub(super) fn run_form(
        &mut self,
        name: &str,
        key: Option<ObjectKey>,
        form: &Stream,
    ) -> OpResult {
        if self.form_stack.len() >= self.max_form_depth {
            return Err(Diagnostic::new(
                DiagnosticKind::RecursionLimit,
                format!(
                    "form {name} nested deeper than {} levels",
                    self.max_form_depth
                ),
            ));
        }
        if let Some(key) = key
            && self.form_stack.contains(&Some(key))
        {
            return Err(Diagnostic::new(
                DiagnosticKind::RecursionLimit,
                format!("form {name} ({key} R) invokes itself"),
            ));
        }

        let content = self.decode(form).map_err(|err| {
            Diagnostic::new(DiagnosticKind::DecodeFailed, format!("form {name}: {err}"))
        })?;
        let matrix = self.form_matrix(form);
        let bbox = self.form_bbox(form);
        let resources = match form.get("Resources").map(|r| self.resolve(r)) {
            Some(Value::Dictionary(dict)) => dict,
            _ => self.resources.clone(),
        };

        let mut state = self.state.clone();
        state.ctm = mult_matrix(matrix, state.ctm);
        if let Some((x0, y0, x1, y1)) = bbox {
            state.clip.push(ClipPath {
                path: Path::rect(state.ctm, x0, y0, x1 - x0, y1 - y0),
                rule: FillRule::NonZero,
            });
        }
        let info = FormInfo {
            name: Name::new(name),
            key,
            bbox: bbox.unwrap_or_default(),
            matrix,
        };

        tracing::trace!(form = name, depth = self.form_stack.len() + 1, "entering form");
        let parent = self.enter_frame(state, resources);
        self.form_stack.push(key);
        self.device.begin_form(&self.state, &info);
        self.run(&content);
        self.device.end_form();
        self.form_stack.pop();
        self.leave_frame(parent);
        Ok(())
    }

    fn form_matrix(&self, form: &Stream) -> Matrix {
        form.get("Matrix")
            .map(|m| self.resolve(m))
            .and_then(|m| m.as_numbers().ok())
            .and_then(|values| matrix_from_slice(&values))
            .unwrap_or(MATRIX_IDENTITY)
    }

    fn form_bbox(&self, form: &Stream) -> Option<(f64, f64, f64, f64)> {
        let values = self.resolve(form.get("BBox")?).as_numbers().ok()?;
        match values.as_slice() {
            [a, b, c, d] => Some((a.min(*c), b.min(*d), a.max(*c), b.max(*d))),
            _ => None,
        }
    }

    fn enter_frame(&mut self, state: GraphicsState, resources: Dictionary) -> Frame {
        Frame {
            state: mem::replace(&mut self.state, state),
            saved: mem::take(&mut self.saved),
            text_mode: mem::replace(&mut self.text_mode, TextMode::Idle),
            text: mem::take(&mut self.text),
            path: mem::take(&mut self.path),
            current_point: self.current_point.take(),
            subpath_start: self.subpath_start.take(),
            pending_clip: self.pending_clip.take(),
            resources: mem::replace(&mut self.resources, resources),
            compat_depth: mem::take(&mut self.compat_depth),
        }
    }

    fn leave_frame(&mut self, frame: Frame) {
        self.state = frame.state;
        self.saved = frame.saved;
        self.text_mode = frame.text_mode;
        self.text = frame.text;
        self.path = frame.path;
        self.current_point = frame.current_point;
        self.subpath_start = frame.subpath_start;
        self.pending_clip = frame.pending_clip;
        self.resources = frame.resources;
        self.compat_depth = frame.compat_depth;
    }
}

/// Runs `content` from `start` over the shared operator table.
pub fn run_content_stream(
    content: &[u8],
    start: GraphicsState,
    device: &mut dyn Device,
) -> RunReport {
    let mut engine = Engine::new(device, start);
    engine.run(content);
    engine.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::device::{DeviceCall, PathSegment, RecordingDevice};

    #[test]
    fn test_translation_reaches_fill() {
        let mut dev = RecordingDevice::new();
        let report = run_content_stream(
            b"1 0 0 1 10 20 cm 0 0 100 50 re f",
            GraphicsState::default(),
            &mut dev,
        );
        assert!(report.diagnostics.is_empty());
        let (path, paint) = dev.paths().next().unwrap();
        assert_eq!(paint, PaintOp::Fill(FillRule::NonZero));
        assert_eq!(path.segments[0], PathSegment::MoveTo((10.0, 20.0)));
        assert_eq!(path.bounding_box(), Some((10.0, 20.0, 110.0, 70.0)));
    }

    #[test]
    fn test_budget_stops_execution() {
        let mut dev = RecordingDevice::new();
        let params = ParseParams::default().with_operator_budget(2);
        let mut engine = Engine::new(&mut dev, GraphicsState::default()).with_params(&params);
        engine.run(b"q Q q Q 0 0 1 1 re f");
        assert_eq!(engine.operators_executed(), 2);
        let report = engine.finish();
        assert!(report.cancelled);
        assert_eq!(report.diagnostics.count(DiagnosticKind::Cancelled), 1);
        assert!(dev.calls.is_empty());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        token.cancel();
        let mut dev = RecordingDevice::new();
        let mut engine =
            Engine::new(&mut dev, GraphicsState::default()).with_cancel_token(token.clone());
        engine.run(b"0 0 m 1 1 l S");
        assert!(engine.is_halted());
        assert_eq!(engine.operators_executed(), 0);
    }

    #[test]
    fn test_unbalanced_save_reported() {
        let mut dev = RecordingDevice::new();
        let report = run_content_stream(b"q q 2 w Q", GraphicsState::default(), &mut dev);
        assert_eq!(report.diagnostics.count(DiagnosticKind::UnbalancedSave), 1);
    }

    #[test]
    fn test_unknown_operator_in_compat_section_silent() {
        let mut dev = RecordingDevice::new();
        let report = run_content_stream(b"BX 1 2 zz EX zz", GraphicsState::default(), &mut dev);
        assert_eq!(report.diagnostics.count(DiagnosticKind::UnknownOperator), 1);
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_clip_applied_after_paint() {
        let mut dev = RecordingDevice::new();
        let report = run_content_stream(b"0 0 10 10 re W n", GraphicsState::default(), &mut dev);
        assert_eq!(report.final_state.clip.len(), 1);
        assert!(matches!(dev.calls[0], DeviceCall::ClipPath { rule: FillRule::NonZero, .. }));
        assert_eq!(dev.calls.len(), 1);
    }
}
