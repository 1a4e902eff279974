//! Mark-and-sweep pruning of a linked [`Schema`].
//!
//! Pruning runs in three steps:
//! 1. mark roots: every type or service the rules name as a root, and every
//!    member rooted explicitly when its owner is not,
//! 2. mark everything reachable from the marks with an explicit work queue,
//! 3. retain: rebuild each file keeping only marked declarations, then
//!    drop imports nothing references any more.
//!
//! Notes:
//! - Marking a message marks its declared and oneof fields but never the
//!   extension fields other files attach to it; those survive only when
//!   something reaches them as members (usually through an option).
//! - Types referenced by an explicitly rooted member are kept even when the
//!   rules prune them.
//! - Fields and enum constants outside the rules' version range are never
//!   marked.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, trace};

use crate::mark_set::MarkSet;
use crate::model::{Options, ProtoFile, Type};
use crate::proto_type::{ProtoMember, ProtoType};
use crate::rules::PruningRules;
use crate::schema::Schema;

/// A node of the reachability graph.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reachable {
    Type(ProtoType),
    Member(ProtoMember),
}

pub struct Pruner<'a, 'r> {
    schema: &'a Schema,
    marks: MarkSet<'r>,
    queue: VecDeque<Reachable>,
}

impl<'a, 'r> Pruner<'a, 'r> {
    pub fn new(schema: &'a Schema, rules: &'r mut PruningRules) -> Self {
        Self {
            schema,
            marks: MarkSet::new(rules),
            queue: VecDeque::new(),
        }
    }

    pub fn prune(mut self) -> Schema {
        self.mark_roots();
        self.mark_reachable();
        self.mark_file_options();
        self.mark_reachable();
        debug!(
            types = self.marks.marked_type_count(),
            members = self.marks.marked_member_count(),
            "marked reachable declarations"
        );

        let retained: Vec<ProtoFile> = self
            .schema
            .files()
            .iter()
            .map(|file| file.retain_all(&mut self.marks))
            .collect();
        let pruned = retain_imports(self.schema, Schema::new(retained));

        self.marks.rules().log_unused();
        info!(
            files = pruned.files().len(),
            types = pruned.types().len(),
            before = self.schema.types().len(),
            "pruned schema"
        );
        pruned
    }

    // ========================================================================
    // Marking
    // ========================================================================

    fn mark_type(&mut self, ty: &ProtoType) {
        let target = ty.value_type().unwrap_or(ty);
        if self.marks.mark_type(target) {
            trace!(%target, "marked type");
            self.queue.push_back(Reachable::Type(target.clone()));
        }
    }

    /// Marks the type a rooted member points at, ignoring prunes.
    fn force_mark_type(&mut self, ty: &ProtoType) {
        let target = ty.value_type().unwrap_or(ty);
        if self.marks.force_mark_type(target) {
            trace!(%target, "force-marked type");
            self.queue.push_back(Reachable::Type(target.clone()));
        }
    }

    fn mark_member(&mut self, member: ProtoMember) {
        if self.marks.mark_member(&member) {
            trace!(%member, "marked member");
            self.queue.push_back(Reachable::Member(member));
        }
    }

    fn mark_options(&mut self, options: &Options) {
        for member in options.members() {
            self.mark_member(member);
        }
    }

    fn root_member(&mut self, member: ProtoMember) {
        self.marks.root(&member);
        self.queue.push_back(Reachable::Member(member));
    }

    fn mark_roots(&mut self) {
        let schema = self.schema;
        for file in schema.files() {
            for ty in file.all_types() {
                if self.marks.rules_mut().is_root_type(ty.ty()) {
                    self.mark_type(ty.ty());
                    continue;
                }
                match ty {
                    Type::Message(message) => {
                        for field in message.fields() {
                            let member = field.member(message.ty());
                            if self.marks.rules_mut().is_root_member(&member)
                                && self.marks.rules().is_field_retained(field.options())
                            {
                                self.root_member(member);
                            }
                        }
                    }
                    Type::Enum(enum_type) => {
                        for constant in enum_type.constants() {
                            let member = ProtoMember::new(enum_type.ty().clone(), constant.name());
                            if self.marks.rules_mut().is_root_member(&member)
                                && self.marks.rules().is_field_retained(constant.options())
                            {
                                self.root_member(member);
                            }
                        }
                    }
                    Type::Enclosing(_) => {}
                }
            }

            for service in file.services() {
                if self.marks.rules_mut().is_root_type(service.ty()) {
                    self.mark_type(service.ty());
                    continue;
                }
                for rpc in service.rpcs() {
                    let member = ProtoMember::new(service.ty().clone(), rpc.name());
                    if self.marks.rules_mut().is_root_member(&member) {
                        self.root_member(member);
                    }
                }
            }

            for extend in file.extends() {
                let Some(target) = extend.ty() else {
                    continue;
                };
                for field in extend.fields() {
                    let member = field.member(target);
                    if self.marks.rules_mut().is_root_member(&member)
                        && self.marks.rules().is_field_retained(field.options())
                    {
                        self.root_member(member);
                    }
                }
            }
        }
    }

    fn mark_reachable(&mut self) {
        while let Some(node) = self.queue.pop_front() {
            match node {
                Reachable::Type(ty) => self.expand_type(&ty),
                Reachable::Member(member) => self.expand_member(&member),
            }
        }
    }

    fn expand_type(&mut self, ty: &ProtoType) {
        let schema = self.schema;
        if let Some(declared) = schema.get_type(ty) {
            match declared {
                Type::Message(message) => {
                    self.mark_options(message.options());
                    for field in message.fields() {
                        if self.marks.rules().is_field_retained(field.options()) {
                            self.mark_member(field.member(ty));
                        }
                    }
                    for one_of in message.one_ofs() {
                        self.mark_options(one_of.options());
                    }
                }
                Type::Enum(enum_type) => {
                    self.mark_options(enum_type.options());
                    for constant in enum_type.constants() {
                        if self.marks.rules().is_field_retained(constant.options()) {
                            self.mark_member(ProtoMember::new(ty.clone(), constant.name()));
                        }
                    }
                }
                Type::Enclosing(_) => {}
            }
        } else if let Some(service) = schema.get_service(ty) {
            self.mark_options(service.options());
            for rpc in service.rpcs() {
                self.mark_member(ProtoMember::new(ty.clone(), rpc.name()));
            }
        }
    }

    fn expand_member(&mut self, member: &ProtoMember) {
        let schema = self.schema;
        let rooted = self.marks.is_root_member(member);

        if let Some(field) = schema.get_field(member).or_else(|| schema.extension_field(member)) {
            self.mark_options(field.options());
            if let Some(ty) = field.ty() {
                if rooted {
                    self.force_mark_type(ty);
                } else {
                    self.mark_type(ty);
                }
            }
            return;
        }

        if let Some(constant) = schema.get_enum(&member.ty().to_string()).and_then(|e| e.constant(member.member())) {
            self.mark_options(constant.options());
            return;
        }

        if let Some(rpc) = schema.get_service(member.ty()).and_then(|s| s.rpc(member.member())) {
            self.mark_options(rpc.options());
            for ty in [rpc.request_type(), rpc.response_type()].into_iter().flatten() {
                if rooted {
                    self.force_mark_type(ty);
                } else {
                    self.mark_type(ty);
                }
            }
        }
    }

    /// File options survive only on files that keep some content, or that
    /// never had any.
    fn mark_file_options(&mut self) {
        let schema = self.schema;
        for file in schema.files() {
            if file.is_empty() || self.retains_content(file) {
                self.mark_options(file.options());
            }
        }
    }

    fn retains_content(&mut self, file: &ProtoFile) -> bool {
        for ty in file.all_types() {
            if ty.kind().is_some() && self.marks.contains_type(ty.ty()) {
                return true;
            }
        }
        for service in file.services() {
            if self.marks.contains_type(service.ty()) {
                return true;
            }
        }
        for extend in file.extends() {
            let Some(target) = extend.ty() else {
                continue;
            };
            for field in extend.fields() {
                if self.marks.contains_member(&field.member(target)) {
                    return true;
                }
            }
        }
        false
    }
}

// ============================================================================
// Import minimization
// ============================================================================

/// Paths of the other files `file` refers to through types, extension
/// fields and option members.
fn file_references(schema: &Schema, file: &ProtoFile) -> HashSet<String> {
    let mut types: Vec<ProtoType> = Vec::new();
    let mut members: Vec<ProtoMember> = Vec::new();

    members.extend(file.options().members());
    for ty in file.all_types() {
        if let Some(options) = ty.options() {
            members.extend(options.members());
        }
        match ty {
            Type::Message(message) => {
                for field in message.fields() {
                    types.extend(field.ty().cloned());
                    members.extend(field.options().members());
                }
                for one_of in message.one_ofs() {
                    members.extend(one_of.options().members());
                }
            }
            Type::Enum(enum_type) => {
                for constant in enum_type.constants() {
                    members.extend(constant.options().members());
                }
            }
            Type::Enclosing(_) => {}
        }
    }
    for service in file.services() {
        members.extend(service.options().members());
        for rpc in service.rpcs() {
            types.extend(rpc.request_type().cloned());
            types.extend(rpc.response_type().cloned());
            members.extend(rpc.options().members());
        }
    }
    for extend in file.extends() {
        types.extend(extend.ty().cloned());
        for field in extend.fields() {
            types.extend(field.ty().cloned());
            members.extend(field.options().members());
        }
    }

    let mut paths = HashSet::new();
    for ty in &types {
        let target = ty.value_type().unwrap_or(ty);
        if let Some(declaring) = schema.proto_file_for_type(target) {
            paths.insert(declaring.path().to_string());
        }
    }
    for member in &members {
        if let Some(declaring) = schema.proto_file_for_type(member.ty()) {
            paths.insert(declaring.path().to_string());
        }
        if member.is_extension() {
            if let Some(declaring) = schema.extension_file(member) {
                paths.insert(declaring.path().to_string());
            }
        }
    }
    paths.remove(file.path());
    paths
}

/// `path` plus everything it re-exports through public imports.
fn exported_files(schema: &Schema, path: &str) -> HashSet<String> {
    let mut exported = HashSet::new();
    let mut queue = VecDeque::from([path.to_string()]);
    while let Some(next) = queue.pop_front() {
        if !exported.insert(next.clone()) {
            continue;
        }
        if let Some(file) = schema.proto_file(&next) {
            queue.extend(file.public_imports().iter().cloned());
        }
    }
    exported
}

fn has_content(schema: &Schema, path: &str) -> bool {
    schema.proto_file(path).is_some_and(|f| !f.is_empty())
}

/// Drops imports whose justification pruning removed. An import that was
/// already unused before pruning is left alone unless its target emptied.
fn retain_imports(original: &Schema, pruned: Schema) -> Schema {
    let mut files = Vec::with_capacity(pruned.files().len());
    for file in pruned.files() {
        let Some(before_file) = original.proto_file(file.path()) else {
            files.push(file.clone());
            continue;
        };
        let before = file_references(original, before_file);
        let after = file_references(&pruned, file);

        let keep = |import: &String| -> bool {
            let justified_after = exported_files(&pruned, import).iter().any(|p| after.contains(p));
            if justified_after {
                return true;
            }
            let justified_before = exported_files(original, import).iter().any(|p| before.contains(p));
            let emptied = has_content(original, import) && !has_content(&pruned, import);
            !justified_before && !emptied
        };

        let imports: Vec<String> = file.imports().iter().filter(|&i| keep(i)).cloned().collect();
        let public_imports: Vec<String> = file
            .public_imports()
            .iter()
            .filter(|&i| keep(i) || has_content(&pruned, i))
            .cloned()
            .collect();
        let weak_imports: Vec<String> = file.weak_imports().iter().filter(|&i| keep(i)).cloned().collect();

        let dropped = file.all_imports().count() - imports.len() - public_imports.len() - weak_imports.len();
        if dropped > 0 {
            debug!(path = file.path(), dropped, "dropped unused imports");
        }
        files.push(file.with_imports(imports, public_imports, weak_imports));
    }
    Schema::new(files)
}
