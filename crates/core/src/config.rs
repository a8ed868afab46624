//! Parsing and interpretation parameters.
//!
//! Contains `ParseParams`, the knobs that bound work on hostile input.

/// Parameters for document loading and content stream execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseParams {
    /// Longest chain of references `resolve` follows before giving up
    /// and returning null.
    pub max_reference_depth: usize,

    /// Deepest nesting of form XObjects the engine will enter.
    pub max_form_depth: usize,

    /// Maximum number of operators executed per content stream, nested
    /// forms included. `None` means unbounded.
    pub operator_budget: Option<usize>,

    /// Block size of the scratch store used while reading the byte source.
    pub scratch_block_size: usize,

    /// Refuse byte sources larger than this. `None` means unbounded.
    pub max_document_bytes: Option<usize>,

    /// Number of parsed objects kept in the per-document cache.
    pub object_cache_capacity: usize,
}

impl Default for ParseParams {
    fn default() -> Self {
        Self {
            max_reference_depth: 32,
            max_form_depth: 16,
            operator_budget: None,
            scratch_block_size: 8 * 1024,
            max_document_bytes: None,
            object_cache_capacity: 1024,
        }
    }
}

impl ParseParams {
    /// Same defaults with an operator budget.
    pub fn with_operator_budget(mut self, budget: usize) -> Self {
        self.operator_budget = Some(budget);
        self
    }

    /// Same defaults with a different form nesting bound.
    pub fn with_max_form_depth(mut self, depth: usize) -> Self {
        self.max_form_depth = depth;
        self
    }

    /// Same defaults with a document size cap.
    pub fn with_max_document_bytes(mut self, limit: usize) -> Self {
        self.max_document_bytes = Some(limit);
        self
    }
}
