//! The queryable object graph.
//!
//! Objects are materialized lazily from the resolved location table and
//! kept in a bounded cache. References are followed only by [`ObjectGraph::resolve`];
//! edits go back through the graph by key.

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use bytes::Bytes;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use super::xref::{Location, ResolvedTable};
use crate::codec::{self, FlateDecoder, StreamDecoder};
use crate::config::ParseParams;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{PdfError, Result};
use crate::model::object::{Dictionary, ObjectKey, Stream, Value};
use crate::parser::lexer::{Lexer, Token};
use crate::parser::object_parser::{parse_object_at, parse_object_at_with, parse_value_at};

/// Small LRU keyed by object.
struct ObjectCache {
    capacity: usize,
    map: IndexMap<ObjectKey, Arc<Value>>,
}

impl ObjectCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: IndexMap::new(),
        }
    }

    fn get(&mut self, key: ObjectKey) -> Option<Arc<Value>> {
        let pos = self.map.get_index_of(&key)?;
        let value = Arc::clone(self.map.get_index(pos)?.1);
        if pos + 1 != self.map.len() {
            self.map.move_index(pos, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, key: ObjectKey, value: Arc<Value>) {
        if self.capacity == 0 {
            return;
        }
        self.map.shift_remove(&key);
        self.map.insert(key, value);
        if self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }

    fn remove(&mut self, key: ObjectKey) {
        self.map.shift_remove(&key);
    }
}

/// A decoded object stream: object numbers and where each body starts.
struct ObjectStream {
    data: Vec<u8>,
    entries: Vec<(u32, usize)>,
}

impl ObjectStream {
    fn parse(data: Vec<u8>, count: usize, first: usize) -> Self {
        let mut entries = Vec::with_capacity(count.min(4096));
        let mut lexer = Lexer::new(&data, 0);
        while entries.len() < count {
            match (lexer.next_token(), lexer.next_token()) {
                (Some((_, Token::Int(num))), Some((_, Token::Int(off)))) => {
                    let (Ok(num), Ok(off)) = (u32::try_from(num), usize::try_from(off)) else {
                        break;
                    };
                    entries.push((num, first.saturating_add(off)));
                }
                _ => break,
            }
        }
        Self { data, entries }
    }

    fn value_for(&self, number: u32, index: u32) -> Result<Value> {
        // The index is a hint; trust the header's object number.
        let pos = match self.entries.get(index as usize) {
            Some((n, pos)) if *n == number => *pos,
            _ => self
                .entries
                .iter()
                .find(|(n, _)| *n == number)
                .map(|(_, pos)| *pos)
                .ok_or(PdfError::ObjectNotFound(ObjectKey::new(number, 0)))?,
        };
        parse_value_at(&self.data, pos)
    }
}

/// Objects of one document, keyed by [`ObjectKey`].
pub struct ObjectGraph {
    data: Bytes,
    table: ResolvedTable,
    edits: FxHashMap<ObjectKey, Arc<Value>>,
    cache: Mutex<ObjectCache>,
    object_streams: Mutex<FxHashMap<ObjectKey, Arc<ObjectStream>>>,
    /// Containers being indexed, per thread.
    indexing: Mutex<FxHashSet<(ThreadId, ObjectKey)>>,
    decoder: Arc<dyn StreamDecoder>,
    max_reference_depth: usize,
    diagnostics: Mutex<Diagnostics>,
}

impl std::fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("objects", &self.table.len())
            .field("edits", &self.edits.len())
            .finish_non_exhaustive()
    }
}

impl ObjectGraph {
    pub fn new(
        data: Bytes,
        table: ResolvedTable,
        params: &ParseParams,
        decoder: Arc<dyn StreamDecoder>,
    ) -> Self {
        Self {
            data,
            table,
            edits: FxHashMap::default(),
            cache: Mutex::new(ObjectCache::new(params.object_cache_capacity)),
            object_streams: Mutex::new(FxHashMap::default()),
            indexing: Mutex::new(FxHashSet::default()),
            decoder,
            max_reference_depth: params.max_reference_depth,
            diagnostics: Mutex::new(Diagnostics::new()),
        }
    }

    /// A graph with no backing file; populate it with [`insert`](Self::insert).
    pub fn in_memory() -> Self {
        Self::new(
            Bytes::new(),
            ResolvedTable::default(),
            &ParseParams::default(),
            Arc::new(FlateDecoder),
        )
    }

    pub fn table(&self) -> &ResolvedTable {
        &self.table
    }

    /// The merged trailer.
    pub fn trailer(&self) -> &Dictionary {
        self.table.trailer()
    }

    pub fn decoder(&self) -> &dyn StreamDecoder {
        self.decoder.as_ref()
    }

    /// Records a recoverable condition.
    pub fn report(&self, diag: Diagnostic) {
        if let Ok(mut diags) = self.diagnostics.lock() {
            diags.push(diag);
        }
    }

    /// Appends diagnostics that were already logged when recorded.
    pub(crate) fn absorb(&self, diags: Diagnostics) {
        if let Ok(mut all) = self.diagnostics.lock() {
            all.extend(diags);
        }
    }

    /// Drains everything recorded so far.
    pub fn take_diagnostics(&self) -> Diagnostics {
        self.diagnostics
            .lock()
            .map(|mut diags| std::mem::take(&mut *diags))
            .unwrap_or_default()
    }

    /// All addressable keys, file objects and edits, ascending.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys = self.table.keys();
        keys.extend(self.edits.keys().copied());
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Replaces (or adds) the object stored under `key`.
    pub fn insert(&mut self, key: ObjectKey, value: Value) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(key);
        }
        self.edits.insert(key, Arc::new(value));
    }

    /// Loads one object without following references.
    pub fn get(&self, key: ObjectKey) -> Result<Arc<Value>> {
        if let Some(value) = self.edits.get(&key) {
            return Ok(Arc::clone(value));
        }
        if let Ok(mut cache) = self.cache.lock()
            && let Some(value) = cache.get(key)
        {
            return Ok(value);
        }

        let location = self.table.get(key).ok_or(PdfError::ObjectNotFound(key))?;
        let value = Arc::new(self.load(key, location)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&value));
        }
        Ok(value)
    }

    fn load(&self, key: ObjectKey, location: Location) -> Result<Value> {
        match location {
            Location::Offset { offset, .. } => {
                let mut diags = Diagnostics::new();
                let resolve_length = |k: ObjectKey| self.direct_length(k, key);
                let (found, value) =
                    parse_object_at_with(&self.data, offset, &resolve_length, &mut diags)?;
                self.absorb(diags);
                if found.number == key.number {
                    return Ok(value);
                }
                self.report(
                    Diagnostic::new(
                        DiagnosticKind::MissingObject,
                        format!("xref entry for {key} points at {found}"),
                    )
                    .at(offset),
                );
                self.load_by_scan(key)
            }
            Location::Compressed { container, index } => {
                let objstm = self.object_stream(container)?;
                objstm.value_for(key.number, index)
            }
        }
    }

    /// Finds the last `N G obj` header for `key` anywhere in the file.
    fn load_by_scan(&self, key: ObjectKey) -> Result<Value> {
        let header = format!("{} {} obj", key.number, key.generation);
        let header = header.as_bytes();
        let offset = self
            .data
            .windows(header.len())
            .enumerate()
            .rev()
            .find(|&(pos, window)| {
                window == header && (pos == 0 || !self.data[pos - 1].is_ascii_digit())
            })
            .map(|(pos, _)| pos)
            .ok_or(PdfError::ObjectNotFound(key))?;

        let mut diags = Diagnostics::new();
        let resolve_length = |k: ObjectKey| self.direct_length(k, key);
        let (_, value) = parse_object_at_with(&self.data, offset, &resolve_length, &mut diags)?;
        self.absorb(diags);
        tracing::debug!(%key, offset, "object recovered by header scan");
        Ok(value)
    }

    /// Reads an indirect `/Length` without recursing into stream parsing.
    fn direct_length(&self, length_key: ObjectKey, owner: ObjectKey) -> Option<i64> {
        if length_key == owner {
            return None;
        }
        if let Some(value) = self.edits.get(&length_key) {
            return value.as_int().ok();
        }
        match self.table.get(length_key)? {
            Location::Offset { offset, .. } => {
                let (_, value) = parse_object_at(&self.data, offset, &mut Diagnostics::new()).ok()?;
                value.as_int().ok()
            }
            Location::Compressed { .. } => {
                let mut cache = self.cache.lock().ok()?;
                cache.get(length_key)?.as_int().ok()
            }
        }
    }

    fn object_stream(&self, container: ObjectKey) -> Result<Arc<ObjectStream>> {
        if let Ok(streams) = self.object_streams.lock()
            && let Some(objstm) = streams.get(&container)
        {
            return Ok(Arc::clone(objstm));
        }
        if let Some(Location::Compressed { .. }) = self.table.get(container) {
            return Err(PdfError::syntax(
                0,
                format!("object stream {container} is itself compressed"),
            ));
        }

        // `/N`, `/First` or the filter parameters may point back into the
        // container being indexed.
        let marker = (thread::current().id(), container);
        let entered = self
            .indexing
            .lock()
            .map(|mut active| active.insert(marker))
            .unwrap_or(true);
        if !entered {
            self.report(Diagnostic::new(
                DiagnosticKind::ReferenceCycle,
                format!("object stream {container} refers into itself"),
            ));
            return Err(PdfError::ObjectNotFound(container));
        }
        let indexed = self.index_object_stream(container);
        if let Ok(mut active) = self.indexing.lock() {
            active.remove(&marker);
        }
        let objstm = Arc::new(indexed?);
        tracing::trace!(%container, objects = objstm.entries.len(), "indexed object stream");

        if let Ok(mut streams) = self.object_streams.lock() {
            streams.insert(container, Arc::clone(&objstm));
        }
        Ok(objstm)
    }

    fn index_object_stream(&self, container: ObjectKey) -> Result<ObjectStream> {
        let value = self.get(container)?;
        let stream = value.as_stream()?;
        let count = self.resolve_opt(stream.get("N")).as_int().unwrap_or(0).max(0) as usize;
        let first = self.resolve_opt(stream.get("First")).as_int().unwrap_or(0).max(0) as usize;
        let data = self.decode_stream(stream)?;
        Ok(ObjectStream::parse(data, count, first))
    }

    /// Follows references until a direct value is reached.
    ///
    /// Cycles, chains longer than the configured depth and missing objects
    /// all yield `Null` and a diagnostic.
    pub fn resolve(&self, value: &Value) -> Value {
        let Value::Reference(start) = value else {
            return value.clone();
        };
        let mut current = *start;
        let mut visited = FxHashSet::default();

        for _ in 0..self.max_reference_depth {
            if !visited.insert(current) {
                self.report(Diagnostic::new(
                    DiagnosticKind::ReferenceCycle,
                    format!("reference chain from {start} revisits {current}"),
                ));
                return Value::Null;
            }
            match self.get(current) {
                Ok(found) => match found.as_ref() {
                    Value::Reference(next) => current = *next,
                    direct => return direct.clone(),
                },
                Err(err) => {
                    self.report(Diagnostic::new(
                        DiagnosticKind::MissingObject,
                        format!("{current} R: {err}"),
                    ));
                    return Value::Null;
                }
            }
        }

        self.report(Diagnostic::new(
            DiagnosticKind::ReferenceDepthExceeded,
            format!(
                "reference chain from {start} longer than {}",
                self.max_reference_depth
            ),
        ));
        Value::Null
    }

    /// Resolves an optional dictionary entry.
    pub fn resolve_opt(&self, value: Option<&Value>) -> Value {
        value.map_or(Value::Null, |v| self.resolve(v))
    }

    /// Resolves the object stored under `key`.
    pub fn resolve_key(&self, key: ObjectKey) -> Value {
        self.resolve(&Value::Reference(key))
    }

    /// Runs a stream's filters through the decoder.
    pub fn decode_stream(&self, stream: &Stream) -> Result<Vec<u8>> {
        codec::decode_stream(stream, self.decoder.as_ref(), &|v| self.resolve(v))
    }

    /// Decoded bytes of a content value: a stream, or an array of streams
    /// joined with newlines. Undecodable parts are skipped and reported.
    pub fn content_bytes(&self, value: &Value) -> Vec<u8> {
        match self.resolve(value) {
            Value::Stream(stream) => self.decode_or_report(&stream),
            Value::Array(parts) => {
                let mut out = Vec::new();
                for part in &parts {
                    if let Value::Stream(stream) = self.resolve(part) {
                        if !out.is_empty() {
                            out.push(b'\n');
                        }
                        out.extend(self.decode_or_report(&stream));
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }

    fn decode_or_report(&self, stream: &Stream) -> Vec<u8> {
        match self.decode_stream(stream) {
            Ok(data) => data,
            Err(err) => {
                self.report(Diagnostic::new(DiagnosticKind::DecodeFailed, err.to_string()));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::xref::{XrefEntry, XrefResolver};

    fn graph_with(objects: &[(u32, Value)]) -> ObjectGraph {
        let mut graph = ObjectGraph::in_memory();
        for (n, v) in objects {
            graph.insert(ObjectKey::new(*n, 0), v.clone());
        }
        graph
    }

    fn r(n: u32) -> Value {
        Value::Reference(ObjectKey::new(n, 0))
    }

    #[test]
    fn test_resolve_chain() {
        let graph = graph_with(&[(1, r(2)), (2, Value::Int(42))]);
        assert_eq!(graph.resolve(&r(1)), Value::Int(42));
        assert!(graph.take_diagnostics().is_empty());
    }

    #[test]
    fn test_resolve_cycle_is_null() {
        let graph = graph_with(&[(1, r(2)), (2, r(1))]);
        assert_eq!(graph.resolve(&r(1)), Value::Null);
        let diags = graph.take_diagnostics();
        assert_eq!(diags.count(DiagnosticKind::ReferenceCycle), 1);
    }

    #[test]
    fn test_resolve_self_reference() {
        let graph = graph_with(&[(1, r(1))]);
        assert_eq!(graph.resolve(&r(1)), Value::Null);
        assert_eq!(graph.take_diagnostics().count(DiagnosticKind::ReferenceCycle), 1);
    }

    #[test]
    fn test_resolve_depth_bound() {
        let objects: Vec<(u32, Value)> = (1..=40).map(|n| (n, r(n + 1))).collect();
        let graph = graph_with(&objects);
        assert_eq!(graph.resolve(&r(1)), Value::Null);
        assert_eq!(
            graph
                .take_diagnostics()
                .count(DiagnosticKind::ReferenceDepthExceeded),
            1
        );
    }

    #[test]
    fn test_missing_object() {
        let graph = ObjectGraph::in_memory();
        assert_eq!(graph.resolve(&r(9)), Value::Null);
        assert_eq!(graph.take_diagnostics().count(DiagnosticKind::MissingObject), 1);
    }

    #[test]
    fn test_keys_and_insert_overrides() {
        let mut graph = graph_with(&[(3, Value::Int(1))]);
        graph.insert(ObjectKey::new(3, 0), Value::Int(2));
        assert_eq!(graph.keys(), vec![ObjectKey::new(3, 0)]);
        assert_eq!(*graph.get(ObjectKey::new(3, 0)).unwrap(), Value::Int(2));
    }

    fn file_graph(data: &'static [u8], entries: Vec<(u32, Location)>) -> ObjectGraph {
        let mut resolver = XrefResolver::new();
        resolver.add_fragment(
            0,
            entries
                .into_iter()
                .map(|(n, location)| (n, XrefEntry::InUse(location))),
            Some(Dictionary::new()),
        );
        let table = resolver.resolve(0, &mut Diagnostics::new()).unwrap();
        ObjectGraph::new(
            Bytes::from_static(data),
            table,
            &ParseParams::default(),
            Arc::new(FlateDecoder),
        )
    }

    fn at(offset: usize) -> Location {
        Location::Offset {
            offset,
            generation: 0,
        }
    }

    #[test]
    fn test_object_stream_count_points_into_itself() {
        let data = b"1 0 obj\n<< /Type /ObjStm /N 2 0 R /First 4 /Length 8 >>\nstream\n2 0 null\nendstream\nendobj\n";
        let graph = file_graph(
            data,
            vec![
                (1, at(0)),
                (
                    2,
                    Location::Compressed {
                        container: ObjectKey::new(1, 0),
                        index: 0,
                    },
                ),
            ],
        );
        assert_eq!(graph.resolve(&r(2)), Value::Null);
        assert_eq!(graph.take_diagnostics().count(DiagnosticKind::ReferenceCycle), 1);
    }

    #[test]
    fn test_misplaced_offset_is_not_substituted() {
        // "21 0 obj" sits at offset 21
        let data = b"1 0 obj\n(one)\nendobj\n21 0 obj\n(decoy)\nendobj\n1 0 obj\n(newer one)\nendobj\n";
        let graph = file_graph(data, vec![(1, at(21)), (2, at(0))]);

        assert_eq!(graph.resolve(&r(1)), Value::String(b"newer one".to_vec()));
        let diags = graph.take_diagnostics();
        assert_eq!(diags.count(DiagnosticKind::MissingObject), 1);
        assert_eq!(diags.iter().next().and_then(|d| d.offset), Some(21));

        // no header for 2 anywhere
        assert_eq!(graph.resolve(&r(2)), Value::Null);
        assert_eq!(graph.take_diagnostics().count(DiagnosticKind::MissingObject), 2);
    }

    #[test]
    fn test_wrong_offset_finds_right_header() {
        let data = b"1 0 obj\n(one)\nendobj\n2 0 obj\n(two)\nendobj\n";
        let graph = file_graph(data, vec![(1, at(0)), (2, at(0))]);
        assert_eq!(graph.resolve(&r(2)), Value::String(b"two".to_vec()));
        let diags = graph.take_diagnostics();
        assert_eq!(diags.count(DiagnosticKind::MissingObject), 1);
        assert_eq!(diags.iter().next().and_then(|d| d.offset), Some(0));
    }

    #[test]
    fn test_cache_lru_eviction() {
        let mut cache = ObjectCache::new(2);
        cache.insert(ObjectKey::new(1, 0), Arc::new(Value::Int(1)));
        cache.insert(ObjectKey::new(2, 0), Arc::new(Value::Int(2)));
        cache.get(ObjectKey::new(1, 0));
        cache.insert(ObjectKey::new(3, 0), Arc::new(Value::Int(3)));
        assert!(cache.get(ObjectKey::new(2, 0)).is_none());
        assert!(cache.get(ObjectKey::new(1, 0)).is_some());
    }
}
