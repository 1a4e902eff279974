//! Links parsed files into a [`Schema`].
//!
//! The linker owns every file it has seen, a flat registry of declared types
//! keyed by qualified name, and the error collector. Work happens in phases
//! (see [`file_linker`]); each phase is a latch on the file so re-entering it
//! from an import cycle is harmless.
//!
//! Linking never stops at the first problem. An unresolvable type links as
//! `bytes` and linking carries on, so one run reports every independent error.
//! The collected errors are raised once, at the end of [`Linker::link`].
//!
//! Notes:
//! - Dependencies are loaded lazily: only when a name cannot be resolved
//!   with what is already loaded, unless `load_exhaustively` is set.
//! - Types the sources actually resolve are recorded as requested; for
//!   dependency files only requested declarations reach the output.
//! - Opaque types resolve to `bytes` and are never requested, so nothing
//!   they reference is pulled in either.

mod file_linker;
mod options;
mod validate;

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::cycle::{CycleChecker, FileImports};
use crate::descriptor::DESCRIPTOR_PROTO;
use crate::element::ProtoFileElement;
use crate::error::SchemaError;
use crate::error_collector::{ErrorCollector, Frame};
use crate::loader::Loader;
use crate::model::{ProtoFile, Type, TypeKind};
use crate::proto_type::{ProtoMember, ProtoType, ScalarType};
use crate::schema::Schema;

use file_linker::FileLinker;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkerOptions {
    /// Load every transitive import up front instead of on demand.
    pub load_exhaustively: bool,
    /// Skip the package cycle check.
    pub permit_package_cycles: bool,
    /// Types that link as `bytes`.
    pub opaque_types: Vec<String>,
}

// =============================================================================
// Registry records
// =============================================================================

/// Where a registered type lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TypeRecord {
    pub(crate) ty: ProtoType,
    pub(crate) kind: TypeKind,
    pub(crate) file: usize,
    pub(crate) path: Vec<usize>,
}

/// One extension field: file, extend block, field index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtensionRef {
    pub(crate) file: usize,
    pub(crate) extend: usize,
    pub(crate) field: usize,
}

/// Looks `name` up relative to `scope`, innermost scope first.
///
/// A leading `.` makes the name absolute. Otherwise `scope.name` is tried,
/// then the scope is shortened one segment at a time, then `name` alone.
pub(crate) fn resolve<'m, V>(name: &str, scope: &str, map: &'m HashMap<String, V>) -> Option<&'m V> {
    if let Some(absolute) = name.strip_prefix('.') {
        return map.get(absolute);
    }
    let mut prefix = scope;
    while !prefix.is_empty() {
        if let Some(found) = map.get(&format!("{prefix}.{name}")) {
            return Some(found);
        }
        prefix = match prefix.rfind('.') {
            Some(dot) => &prefix[..dot],
            None => "",
        };
    }
    map.get(name)
}

// =============================================================================
// Linker
// =============================================================================

pub struct Linker {
    loader: Box<dyn Loader>,
    options: LinkerOptions,
    opaque_types: HashSet<ProtoType>,
    files: Vec<FileLinker>,
    paths: HashMap<String, usize>,
    failed_loads: HashSet<String>,
    registry: HashMap<String, TypeRecord>,
    extensions: HashMap<ProtoType, Vec<ExtensionRef>>,
    requested_types: HashSet<ProtoType>,
    requested_queue: VecDeque<ProtoType>,
    requested_fields: HashSet<ProtoMember>,
    file_options_queue: VecDeque<usize>,
    errors: ErrorCollector,
}

impl Linker {
    pub fn new(loader: impl Loader + 'static) -> Self {
        Self::with_options(loader, LinkerOptions::default())
    }

    pub fn with_options(loader: impl Loader + 'static, options: LinkerOptions) -> Self {
        let opaque_types = options.opaque_types.iter().map(ProtoType::named).collect();
        Self {
            loader: Box::new(loader),
            options,
            opaque_types,
            files: Vec::new(),
            paths: HashMap::new(),
            failed_loads: HashSet::new(),
            registry: HashMap::new(),
            extensions: HashMap::new(),
            requested_types: HashSet::new(),
            requested_queue: VecDeque::new(),
            requested_fields: HashSet::new(),
            file_options_queue: VecDeque::new(),
            errors: ErrorCollector::new(),
        }
    }

    pub fn options(&self) -> &LinkerOptions {
        &self.options
    }

    /// Links `sources` and whatever they import. Sources appear in the
    /// output in full; dependencies keep only what the sources used.
    pub fn link(mut self, sources: Vec<ProtoFileElement>) -> Result<Schema, SchemaError> {
        info!(sources = sources.len(), "linking");
        self.check_opaque_types();

        let mut source_files = Vec::new();
        for element in &sources {
            if self.paths.contains_key(element.path()) {
                self.errors.report(format!("{} is declared more than once", element.path()));
                continue;
            }
            let file = self.add_file(element.clone(), true);
            source_files.push(file);
        }

        // A loader without the descriptor only loses option linking; imports
        // of it still report the missing file.
        let detached = ErrorCollector::new();
        let mut full = source_files.clone();
        match self.file_linker(DESCRIPTOR_PROTO, &detached) {
            Some(descriptor) if !full.contains(&descriptor) => full.push(descriptor),
            Some(_) => {}
            None => {
                self.failed_loads.remove(DESCRIPTOR_PROTO);
            }
        }
        if self.options.load_exhaustively {
            self.load_exhaustively(&mut full);
        }
        for &file in &full {
            self.files[file].linked_in_full = true;
        }

        for &file in &full {
            self.require_extensions_linked(file);
        }
        for &file in &full {
            self.link_members(file);
        }
        self.drain_requested_types();
        for &file in &full {
            let validate = self.files[file].is_source;
            self.link_options(file, validate);
        }
        self.drain_requested_types();
        self.drain_file_options_queue();
        self.check_opaque_enums();

        for &file in &source_files {
            self.validate_file(file);
        }
        self.check_cycles();

        debug!(
            files = self.files.len(),
            types = self.registry.len(),
            requested = self.requested_types.len(),
            errors = self.errors.len(),
            "linking finished"
        );
        self.errors.throw_if_non_empty()?;

        let requested_types = std::mem::take(&mut self.requested_types);
        let requested_fields = std::mem::take(&mut self.requested_fields);
        let mut output = Vec::new();
        for file_linker in std::mem::take(&mut self.files) {
            if file_linker.linked_in_full {
                output.push(file_linker.file);
                continue;
            }
            let retained = file_linker.file.retain_linked(&requested_types, &requested_fields);
            if retained.is_empty() {
                trace!(path = retained.path(), "dropped unused dependency");
                continue;
            }
            output.push(retained);
        }

        let schema = Schema::new(output);
        info!(files = schema.files().len(), types = schema.types().len(), "linked schema");
        Ok(schema)
    }

    fn sorted_opaque_types(&self) -> Vec<&ProtoType> {
        let mut opaque: Vec<&ProtoType> = self.opaque_types.iter().collect();
        opaque.sort_by_key(|ty| ty.to_string());
        opaque
    }

    fn check_opaque_types(&self) {
        for ty in self.sorted_opaque_types() {
            if !ty.is_named() {
                self.errors.report(format!("scalar types cannot be opaque: {ty}"));
            }
        }
    }

    /// Runs once every loaded file is registered, so enums nothing refers
    /// to are rejected too.
    fn check_opaque_enums(&self) {
        for ty in self.sorted_opaque_types() {
            if self.kind_of(ty) == Some(TypeKind::Enum) {
                self.errors.report(format!("enums cannot be opaque: {ty}"));
            }
        }
    }

    fn load_exhaustively(&mut self, full: &mut Vec<usize>) {
        let mut queue: VecDeque<usize> = full.iter().copied().collect();
        while let Some(file) = queue.pop_front() {
            let context = self.file_context(file);
            let imports: Vec<String> = self.files[file].file.all_imports().cloned().collect();
            for import in imports {
                let Some(imported) = self.file_linker(&import, &context) else {
                    continue;
                };
                if !full.contains(&imported) {
                    full.push(imported);
                    queue.push_back(imported);
                }
            }
        }
    }

    // =========================================================================
    // Files
    // =========================================================================

    fn add_file(&mut self, element: ProtoFileElement, is_source: bool) -> usize {
        let index = self.files.len();
        let file = ProtoFile::from_element(&element);
        self.paths.insert(file.path().to_string(), index);
        self.files.push(FileLinker::new(file, is_source));
        self.file_options_queue.push_back(index);
        self.require_types_registered(index);
        index
    }

    /// The file at `path`, loading it on first use. Failed loads are
    /// reported once, against whoever asked first.
    pub(crate) fn file_linker(&mut self, path: &str, context: &ErrorCollector) -> Option<usize> {
        if let Some(&index) = self.paths.get(path) {
            return Some(index);
        }
        if self.failed_loads.contains(path) {
            return None;
        }
        match self.loader.load(path) {
            Ok(mut element) => {
                trace!(path, "loaded dependency");
                element.location.path = path.to_string();
                Some(self.add_file(element, false))
            }
            Err(err) => {
                self.failed_loads.insert(path.to_string());
                context.report(err.to_string());
                None
            }
        }
    }

    /// Files visible from `file`: its imports plus whatever those re-export
    /// through public imports, transitively.
    pub(crate) fn effective_imports(&mut self, file: usize) -> Vec<usize> {
        let context = self.file_context(file);
        let mut queue: VecDeque<String> = self.files[file].file.all_imports().cloned().collect();
        let mut seen = HashSet::new();
        let mut visible = Vec::new();
        while let Some(path) = queue.pop_front() {
            if !seen.insert(path.clone()) {
                continue;
            }
            let Some(index) = self.file_linker(&path, &context) else {
                continue;
            };
            visible.push(index);
            queue.extend(self.files[index].file.public_imports().iter().cloned());
        }
        visible
    }

    fn drain_requested_types(&mut self) {
        while let Some(ty) = self.requested_queue.pop_front() {
            let Some(record) = self.registry.get(&ty.to_string()).cloned() else {
                continue;
            };
            self.require_members_linked(record.file, &record.path);
        }
    }

    /// File options of dependencies still feed naming (`java_package`,
    /// `wire.wire_package`), so every loaded file gets them linked.
    fn drain_file_options_queue(&mut self) {
        while let Some(file) = self.file_options_queue.pop_front() {
            self.require_file_options_linked(file, false);
        }
    }

    fn check_cycles(&self) {
        let checker = CycleChecker::new(self.files.iter().map(|f| FileImports::of(&f.file)));
        for error in checker.check_import_cycles() {
            self.errors.report(error);
        }
        if !self.options.permit_package_cycles {
            for error in checker.check_package_cycles() {
                self.errors.report(error);
            }
        }
    }

    // =========================================================================
    // Contexts
    // =========================================================================

    pub(crate) fn file_context(&self, file: usize) -> ErrorCollector {
        let file = &self.files[file].file;
        self.errors.at(Frame::File {
            path: file.path().to_string(),
            package: file.package_name().map(str::to_string),
        })
    }

    /// Context for the type at `path`, with a frame per enclosing type.
    pub(crate) fn type_context(&self, file: usize, path: &[usize]) -> ErrorCollector {
        let mut context = self.file_context(file);
        for depth in 1..=path.len() {
            if let Some(ty) = self.files[file].file.type_at(&path[..depth]) {
                context = context.at(type_frame(ty));
            }
        }
        context
    }

    // =========================================================================
    // Type resolution
    // =========================================================================

    fn kind_of(&self, ty: &ProtoType) -> Option<TypeKind> {
        let name = ty.as_named()?;
        self.registry.get(name).map(|record| record.kind)
    }

    fn request_type(&mut self, ty: &ProtoType) {
        if ty.is_named() && self.requested_types.insert(ty.clone()) {
            self.requested_queue.push_back(ty.clone());
        }
    }

    pub(crate) fn request_field(&mut self, member: ProtoMember) {
        let owner = member.ty().clone();
        self.requested_fields.insert(member);
        self.request_type(&owner);
    }

    fn lookup(&self, name: &str, scope: &str) -> Option<TypeRecord> {
        resolve(name, scope, &self.registry).cloned()
    }

    /// Registers the types of every file visible from the context's file.
    fn load_context_imports(&mut self, context: &ErrorCollector) {
        let Some(file) = context.file_path().and_then(|path| self.paths.get(path)).copied() else {
            return;
        };
        self.require_imported_types_registered(file);
    }

    /// Resolves a declared type name. Unresolvable names report an error and
    /// link as `bytes`.
    pub(crate) fn resolve_type(&mut self, name: &str, message_only: bool, context: &ErrorCollector) -> ProtoType {
        if let Some(scalar) = ScalarType::from_name(name) {
            if message_only {
                context.report(format!("expected a message but was {name}"));
            }
            return ProtoType::Scalar(scalar);
        }
        if let Some(inner) = name.strip_prefix("map<").and_then(|n| n.strip_suffix('>')) {
            return self.resolve_map_type(name, inner, context);
        }

        // An outer-scope match is only final once every import is registered.
        self.load_context_imports(context);
        let scope = context.resolution_scope();
        let Some(record) = self.lookup(name, &scope) else {
            context.report(format!("unable to resolve {name}"));
            return ProtoType::BYTES;
        };

        if message_only && record.kind != TypeKind::Message {
            context.report(format!("expected a message but was {name}"));
            return record.ty;
        }
        if self.opaque_types.contains(&record.ty) && record.kind != TypeKind::Enum {
            return ProtoType::BYTES;
        }
        self.request_type(&record.ty);
        record.ty
    }

    fn resolve_map_type(&mut self, name: &str, inner: &str, context: &ErrorCollector) -> ProtoType {
        let Some((key, value)) = inner.split_once(',') else {
            context.report(format!("unable to resolve {name}"));
            return ProtoType::BYTES;
        };
        let key = match ScalarType::from_name(key.trim()) {
            Some(scalar) => ProtoType::Scalar(scalar),
            None => ProtoType::Named(key.trim().to_string()),
        };
        let value = self.resolve_type(value.trim(), false, context);
        match ProtoType::map(key, value) {
            Ok(map) => map,
            Err(err) => {
                context.report(err.to_string());
                ProtoType::BYTES
            }
        }
    }
}

pub(crate) fn type_frame(ty: &Type) -> Frame {
    match ty {
        Type::Message(message) => Frame::Message {
            ty: message.ty().clone(),
            location: message.location().clone(),
        },
        Type::Enum(enum_type) => Frame::Enum {
            ty: enum_type.ty().clone(),
            location: enum_type.location().clone(),
        },
        Type::Enclosing(enclosing) => Frame::Enclosing {
            ty: enclosing.ty().clone(),
            location: ty.location().clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> HashMap<String, usize> {
        names.iter().enumerate().map(|(i, n)| (n.to_string(), i)).collect()
    }

    #[test]
    fn nearest_scope_wins() {
        let map = registry(&["a.MessageA", "a.b.MessageA", "a.b.c.MessageA", "MessageA"]);
        assert_eq!(resolve("MessageA", "a.b.c", &map), Some(&2));
        assert_eq!(resolve("MessageA", "a.b", &map), Some(&1));
        assert_eq!(resolve("MessageA", "a.x", &map), Some(&0));
        assert_eq!(resolve("MessageA", "", &map), Some(&3));
        assert_eq!(resolve(".a.MessageA", "a.b.c", &map), Some(&0));
        assert_eq!(resolve(".MessageA", "a.b", &map), Some(&3));
    }

    #[test]
    fn partially_qualified_names_resolve_from_outer_scopes() {
        let map = registry(&["a.b.Outer.Inner"]);
        assert_eq!(resolve("Outer.Inner", "a.b.Other", &map), Some(&0));
        assert_eq!(resolve("b.Outer.Inner", "a", &map), Some(&0));
        assert_eq!(resolve("Inner", "a.b", &map), None);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: LinkerOptions = serde_json::from_str(r#"{"opaque_types": ["a.Big"]}"#).expect("options");
        assert!(!options.load_exhaustively);
        assert_eq!(options.opaque_types, vec!["a.Big".to_string()]);
        assert!(serde_json::from_str::<LinkerOptions>(r#"{"unknown": true}"#).is_err());
    }
}
