//! Content stream operator implementations.
//!
//! Operators are grouped by category:
//! - `graphics_state` - State stack and transforms (q, Q, cm, w, J, j, M, d, ri, i, gs)
//! - `color` - Color space and values (G, g, RG, rg, K, k, CS, cs, SC, SCN, sc, scn)
//! - `path` - Path construction and painting (m, l, c, v, y, h, re, S, s, f, F, f\*, B, B\*, b, b\*, n, W, W\*)
//! - `text` - Text state and rendering (BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T\*, Tj, TJ, ', ")
//! - `xobject` - XObjects, inline images, marked content, shading, Type 3
//!   metrics and compatibility sections (Do, BI, ID, EI, BMC, BDC, EMC, MP,
//!   DP, sh, d0, d1, BX, EX)
//!
//! Each file adds `do_*` methods to [`Engine`](crate::interp::engine::Engine);
//! [`OperatorTable::standard`] wires them to their operator names.

mod color;
mod graphics_state;
mod path;
mod text;
mod xobject;

use std::sync::LazyLock;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::interp::engine::OpHandler;
use crate::model::object::Value;

/// Operator name to handler.
///
/// Built once and only read afterwards, so one table can serve any number
/// of engines on any number of threads.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    handlers: FxHashMap<SmolStr, OpHandler>,
}

static SHARED: LazyLock<OperatorTable> = LazyLock::new(OperatorTable::standard);

impl OperatorTable {
    /// A table with no operators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The process-wide standard table.
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// Every operator this crate implements.
    pub fn standard() -> Self {
        let mut table = Self::empty();

        // graphics state
        table.register("q", |e, o| e.do_q(o));
        table.register("Q", |e, o| e.do_Q(o));
        table.register("cm", |e, o| e.do_cm(o));
        table.register("w", |e, o| e.do_w(o));
        table.register("J", |e, o| e.do_J(o));
        table.register("j", |e, o| e.do_j(o));
        table.register("M", |e, o| e.do_M(o));
        table.register("d", |e, o| e.do_d(o));
        table.register("ri", |e, o| e.do_ri(o));
        table.register("i", |e, o| e.do_i(o));
        table.register("gs", |e, o| e.do_gs(o));

        // path construction
        table.register("m", |e, o| e.do_m(o));
        table.register("l", |e, o| e.do_l(o));
        table.register("c", |e, o| e.do_c(o));
        table.register("v", |e, o| e.do_v(o));
        table.register("y", |e, o| e.do_y(o));
        table.register("h", |e, o| e.do_h(o));
        table.register("re", |e, o| e.do_re(o));

        // path painting and clipping
        table.register("S", |e, o| e.do_S(o));
        table.register("s", |e, o| e.do_s(o));
        table.register("f", |e, o| e.do_f(o));
        table.register("F", |e, o| e.do_F(o));
        table.register("f*", |e, o| e.do_f_star(o));
        table.register("B", |e, o| e.do_B(o));
        table.register("B*", |e, o| e.do_B_star(o));
        table.register("b", |e, o| e.do_b(o));
        table.register("b*", |e, o| e.do_b_star(o));
        table.register("n", |e, o| e.do_n(o));
        table.register("W", |e, o| e.do_W(o));
        table.register("W*", |e, o| e.do_W_star(o));

        // text
        table.register("BT", |e, o| e.do_BT(o));
        table.register("ET", |e, o| e.do_ET(o));
        table.register("Tc", |e, o| e.do_Tc(o));
        table.register("Tw", |e, o| e.do_Tw(o));
        table.register("Tz", |e, o| e.do_Tz(o));
        table.register("TL", |e, o| e.do_TL(o));
        table.register("Tf", |e, o| e.do_Tf(o));
        table.register("Tr", |e, o| e.do_Tr(o));
        table.register("Ts", |e, o| e.do_Ts(o));
        table.register("Td", |e, o| e.do_Td(o));
        table.register("TD", |e, o| e.do_TD(o));
        table.register("Tm", |e, o| e.do_Tm(o));
        table.register("T*", |e, o| e.do_T_star(o));
        table.register("Tj", |e, o| e.do_Tj(o));
        table.register("TJ", |e, o| e.do_TJ(o));
        table.register("'", |e, o| e.do_quote(o));
        table.register("\"", |e, o| e.do_doublequote(o));

        // color
        table.register("CS", |e, o| e.do_CS(o));
        table.register("cs", |e, o| e.do_cs(o));
        table.register("SC", |e, o| e.do_SC(o));
        table.register("SCN", |e, o| e.do_SCN(o));
        table.register("sc", |e, o| e.do_sc(o));
        table.register("scn", |e, o| e.do_scn(o));
        table.register("G", |e, o| e.do_G(o));
        table.register("g", |e, o| e.do_g(o));
        table.register("RG", |e, o| e.do_RG(o));
        table.register("rg", |e, o| e.do_rg(o));
        table.register("K", |e, o| e.do_K(o));
        table.register("k", |e, o| e.do_k(o));

        // xobjects, images, marked content and the rest
        table.register("Do", |e, o| e.do_Do(o));
        table.register("BI", |e, o| e.do_BI(o));
        table.register("ID", |e, o| e.do_ID(o));
        table.register("EI", |e, o| e.do_EI(o));
        table.register("BMC", |e, o| e.do_BMC(o));
        table.register("BDC", |e, o| e.do_BDC(o));
        table.register("EMC", |e, o| e.do_EMC(o));
        table.register("MP", |e, o| e.do_MP(o));
        table.register("DP", |e, o| e.do_DP(o));
        table.register("sh", |e, o| e.do_sh(o));
        table.register("d0", |e, o| e.do_d0(o));
        table.register("d1", |e, o| e.do_d1(o));
        table.register("BX", |e, o| e.do_BX(o));
        table.register("EX", |e, o| e.do_EX(o));

        table
    }

    /// Adds or replaces an operator, returning the previous handler.
    pub fn register(&mut self, name: &str, handler: OpHandler) -> Option<OpHandler> {
        self.handlers.insert(SmolStr::new(name), handler)
    }

    pub fn get(&self, name: &str) -> Option<OpHandler> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(SmolStr::as_str).collect();
        names.sort_unstable();
        names
    }
}

// Operand helpers. Operators read their operands from the end of the
// list, so extra leading operands are ignored.

pub(crate) fn missing_operands(op: &str, expected: usize, got: usize) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::MissingOperands,
        format!("{op} needs {expected} operands, got {got}"),
    )
}

pub(crate) fn bad_operand(op: &str, message: impl AsRef<str>) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::BadOperand,
        format!("{op}: {}", message.as_ref()),
    )
}

/// The last `N` operands.
pub(crate) fn tail<'v, const N: usize>(
    op: &str,
    operands: &'v [Value],
) -> Result<&'v [Value; N], Diagnostic> {
    let start = operands
        .len()
        .checked_sub(N)
        .ok_or_else(|| missing_operands(op, N, operands.len()))?;
    operands[start..]
        .try_into()
        .map_err(|_| missing_operands(op, N, operands.len()))
}

pub(crate) fn number(op: &str, value: &Value) -> Result<f64, Diagnostic> {
    value
        .as_num()
        .map_err(|_| bad_operand(op, format!("expected number, got {}", value.type_name())))
}

/// The last `N` operands as numbers.
pub(crate) fn numbers<const N: usize>(op: &str, operands: &[Value]) -> Result<[f64; N], Diagnostic> {
    let values = tail::<N>(op, operands)?;
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = number(op, value)?;
    }
    Ok(out)
}

pub(crate) fn name<'v>(op: &str, value: &'v Value) -> Result<&'v str, Diagnostic> {
    value
        .as_name()
        .map_err(|_| bad_operand(op, format!("expected name, got {}", value.type_name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_complete() {
        let table = OperatorTable::standard();
        for op in [
            "q", "Q", "cm", "w", "J", "j", "M", "d", "ri", "i", "gs", "m", "l", "c", "v", "y",
            "h", "re", "S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n", "W", "W*", "BT",
            "ET", "Tc", "Tw", "Tz", "TL", "Tf", "Tr", "Ts", "Td", "TD", "Tm", "T*", "Tj", "TJ",
            "'", "\"", "CS", "cs", "SC", "SCN", "sc", "scn", "G", "g", "RG", "rg", "K", "k",
            "Do", "BI", "ID", "EI", "BMC", "BDC", "EMC", "MP", "DP", "sh", "d0", "d1", "BX",
            "EX",
        ] {
            assert!(table.contains(op), "missing {op}");
        }
        assert_eq!(table.len(), 73);
        assert!(std::ptr::eq(OperatorTable::shared(), OperatorTable::shared()));
    }

    #[test]
    fn test_numbers_reads_tail() {
        let ops = [Value::name("junk"), Value::Int(1), Value::Real(2.5)];
        assert_eq!(numbers::<2>("l", &ops).unwrap(), [1.0, 2.5]);
        let err = numbers::<3>("c", &ops[1..]).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::MissingOperands);
        let err = numbers::<3>("rg", &ops).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::BadOperand);
    }

    #[test]
    fn test_register_replaces() {
        let mut table = OperatorTable::empty();
        assert!(table.register("q", |_, _| Ok(())).is_none());
        assert!(table.register("q", |_, _| Ok(())).is_some());
        assert_eq!(table.names(), vec!["q"]);
    }
}
