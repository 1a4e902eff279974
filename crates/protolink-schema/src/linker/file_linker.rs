//! Per-file linking phases.
//!
//! Each phase is a one-way latch on [`FileLinker`]; calling a phase again is
//! a no-op. Member linking is latched per type rather than per file because
//! option linking can need one type's fields long before the rest of its
//! file is linked.
//!
//! Phase order for a file:
//! 1. types registered (on load),
//! 2. extend blocks resolved and indexed by target,
//! 3. extensions of visible files linked, so option names can use them,
//! 4. members: field, oneof, extension and rpc types,
//! 5. options: file options first, then every other declaration.

use std::collections::HashSet;

use tracing::debug;

use crate::descriptor::WIRE_PACKAGE_OPTION;
use crate::error_collector::{ErrorCollector, Frame};
use crate::model::{Field, FieldSlot, MessageType, OptionSite, ProtoFile, Type};
use crate::proto_type::ProtoType;

use super::{ExtensionRef, Linker, TypeRecord};

#[derive(Debug)]
pub(crate) struct FileLinker {
    pub(crate) file: ProtoFile,
    pub(crate) is_source: bool,
    /// Sources, the descriptor, and everything loaded exhaustively.
    pub(crate) linked_in_full: bool,
    types_registered: bool,
    imported_types_registered: bool,
    extensions_linked: bool,
    imported_extensions_registered: bool,
    extend_members_linked: bool,
    services_linked: bool,
    file_options_linked: bool,
    options_linked: bool,
    types_with_members_linked: HashSet<ProtoType>,
}

impl FileLinker {
    pub(crate) fn new(file: ProtoFile, is_source: bool) -> Self {
        Self {
            file,
            is_source,
            linked_in_full: false,
            types_registered: false,
            imported_types_registered: false,
            extensions_linked: false,
            imported_extensions_registered: false,
            extend_members_linked: false,
            services_linked: false,
            file_options_linked: false,
            options_linked: false,
            types_with_members_linked: HashSet::new(),
        }
    }
}

pub(crate) fn field_frame(field: &Field) -> Frame {
    Frame::Field {
        name: field.name().to_string(),
        location: field.location().clone(),
        extension_package: field
            .is_extension()
            .then(|| field.namespace().unwrap_or_default().to_string()),
    }
}

impl Linker {
    pub(crate) fn message_at(&self, file: usize, path: &[usize]) -> Option<&MessageType> {
        self.files[file].file.type_at(path)?.as_message()
    }

    fn message_at_mut(&mut self, file: usize, path: &[usize]) -> Option<&mut MessageType> {
        self.files[file].file.type_at_mut(path)?.as_message_mut()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub(crate) fn require_types_registered(&mut self, file: usize) {
        if self.files[file].types_registered {
            return;
        }
        self.files[file].types_registered = true;

        let mut registered = 0usize;
        for path in self.files[file].file.type_paths() {
            let Some(ty) = self.files[file].file.type_at(&path) else {
                continue;
            };
            let Some(kind) = ty.kind() else {
                continue;
            };
            let key = ty.ty().to_string();
            if let Some(existing) = self.registry.get(&key) {
                let location = self.files[existing.file]
                    .file
                    .type_at(&existing.path)
                    .map(|t| t.location().to_string())
                    .unwrap_or_default();
                self.type_context(file, &path)
                    .report(format!("{key} is already defined at {location}"));
                continue;
            }
            let record = TypeRecord {
                ty: ty.ty().clone(),
                kind,
                file,
                path,
            };
            self.registry.insert(key, record);
            registered += 1;
        }
        debug!(path = self.files[file].file.path(), registered, "registered types");
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    /// Resolves every `extend` target in `file` and indexes its fields by
    /// the extended type.
    pub(crate) fn require_extensions_linked(&mut self, file: usize) {
        if self.files[file].extensions_linked {
            return;
        }
        self.files[file].extensions_linked = true;

        for e in 0..self.files[file].file.extends.len() {
            let (name, frame, count) = {
                let extend = &self.files[file].file.extends[e];
                let frame = Frame::Extend {
                    name: extend.name().to_string(),
                    location: extend.location().clone(),
                };
                (extend.name().to_string(), frame, extend.fields.len())
            };
            let context = self.file_context(file).at(frame);
            let target = self.resolve_type(&name, true, &context);
            if !target.is_named() {
                continue;
            }
            self.files[file].file.extends[e].ty = Some(target.clone());
            let refs = self.extensions.entry(target).or_default();
            refs.extend((0..count).map(|field| ExtensionRef { file, extend: e, field }));
        }
        debug!(path = self.files[file].file.path(), "linked extensions");
    }

    /// Extensions declared in `file` and every file it can see, so option
    /// names in `file` can refer to them.
    /// Registers the types of every file visible from `file`, so name
    /// resolution in `file` sees all of its candidates at once.
    pub(crate) fn require_imported_types_registered(&mut self, file: usize) {
        if self.files[file].imported_types_registered {
            return;
        }
        self.files[file].imported_types_registered = true;

        self.require_types_registered(file);
        for imported in self.effective_imports(file) {
            self.require_types_registered(imported);
        }
    }

    pub(crate) fn require_imported_extensions_registered(&mut self, file: usize) {
        if self.files[file].imported_extensions_registered {
            return;
        }
        self.files[file].imported_extensions_registered = true;

        self.require_extensions_linked(file);
        for imported in self.effective_imports(file) {
            self.require_extensions_linked(imported);
        }
    }

    // =========================================================================
    // Members
    // =========================================================================

    pub(crate) fn link_members(&mut self, file: usize) {
        for path in self.files[file].file.type_paths() {
            self.require_members_linked(file, &path);
        }
        self.link_extend_members(file);
        self.link_services(file);
        debug!(path = self.files[file].file.path(), "linked members");
    }

    /// Links the field types of the message at `path`, once.
    pub(crate) fn require_members_linked(&mut self, file: usize, path: &[usize]) {
        let Some((ty, slots)) = self
            .message_at(file, path)
            .map(|m| (m.ty().clone(), m.field_slots()))
        else {
            return;
        };
        if !self.files[file].types_with_members_linked.insert(ty) {
            return;
        }

        let rules = self.files[file].file.syntax_rules();
        let type_context = self.type_context(file, path);
        for slot in slots {
            let Some((element_type, context)) = self.message_at(file, path).and_then(|message| {
                let field = message.field_at(slot)?;
                let mut context = type_context.clone();
                if let FieldSlot::OneOf(o, _) = slot {
                    let one_of = message.one_ofs().get(o)?;
                    context = context.at(Frame::OneOf {
                        name: one_of.name().to_string(),
                        location: one_of.location().clone(),
                    });
                }
                Some((field.element_type().to_string(), context.at(field_frame(field))))
            }) else {
                continue;
            };

            let resolved = self.resolve_type(&element_type, false, &context);
            let kind = self.kind_of(&resolved);
            let in_one_of = matches!(slot, FieldSlot::OneOf(..));
            if let Some(field) = self.message_at_mut(file, path).and_then(|m| m.field_at_mut(slot)) {
                field.link(resolved, kind, rules, in_one_of);
            }
        }
    }

    pub(crate) fn link_extend_members(&mut self, file: usize) {
        if self.files[file].extend_members_linked {
            return;
        }
        self.files[file].extend_members_linked = true;

        let rules = self.files[file].file.syntax_rules();
        for e in 0..self.files[file].file.extends.len() {
            for f in 0..self.files[file].file.extends[e].fields.len() {
                let (element_type, context) = {
                    let extend = &self.files[file].file.extends[e];
                    let field = &extend.fields[f];
                    let context = self
                        .file_context(file)
                        .at(Frame::Extend {
                            name: extend.name().to_string(),
                            location: extend.location().clone(),
                        })
                        .at(field_frame(field));
                    (field.element_type().to_string(), context)
                };
                let resolved = self.resolve_type(&element_type, false, &context);
                let kind = self.kind_of(&resolved);
                self.files[file].file.extends[e].fields[f].link(resolved, kind, rules, false);
            }
        }
    }

    fn link_services(&mut self, file: usize) {
        if self.files[file].services_linked {
            return;
        }
        self.files[file].services_linked = true;

        for s in 0..self.files[file].file.services.len() {
            for r in 0..self.files[file].file.services[s].rpcs.len() {
                let (request, response, context) = {
                    let service = &self.files[file].file.services[s];
                    let rpc = &service.rpcs[r];
                    let context = self
                        .file_context(file)
                        .at(service_frame(&self.files[file].file, s))
                        .at(Frame::Rpc {
                            name: rpc.name().to_string(),
                            location: rpc.location().clone(),
                        });
                    (
                        rpc.request_type_element().to_string(),
                        rpc.response_type_element().to_string(),
                        context,
                    )
                };
                let request = self.resolve_type(&request, true, &context);
                let response = self.resolve_type(&response, true, &context);
                self.files[file].file.services[s].rpcs[r].link(request, response);
            }
        }
    }

    // =========================================================================
    // Options
    // =========================================================================

    /// File options come first: later declarations read `java_package` and
    /// `wire.wire_package` from them.
    pub(crate) fn require_file_options_linked(&mut self, file: usize, validate: bool) {
        if self.files[file].file_options_linked {
            return;
        }
        self.files[file].file_options_linked = true;

        self.require_imported_extensions_registered(file);
        self.link_options_at(file, &OptionSite::File, validate);

        let proto_file = &mut self.files[file].file;
        proto_file.java_package = proto_file.options.element_str("java_package").map(str::to_string);
        proto_file.wire_package = proto_file
            .options
            .element_str(WIRE_PACKAGE_OPTION)
            .map(str::to_string);
    }

    pub(crate) fn link_options(&mut self, file: usize, validate: bool) {
        if self.files[file].options_linked {
            return;
        }
        self.files[file].options_linked = true;

        self.require_file_options_linked(file, validate);
        for site in self.files[file].file.option_sites() {
            if site != OptionSite::File {
                self.link_options_at(file, &site, validate);
            }
        }
        debug!(path = self.files[file].file.path(), "linked options");
    }

    fn link_options_at(&mut self, file: usize, site: &OptionSite, validate: bool) {
        let Some((option_type, elements)) = self.files[file]
            .file
            .options_at(site)
            .map(|o| (o.option_type().clone(), o.elements().to_vec()))
        else {
            return;
        };
        let entries = if elements.is_empty() {
            Vec::new()
        } else {
            let context = self.site_context(file, site);
            self.link_option_elements(&option_type, &elements, &context, validate)
        };
        if let Some(options) = self.files[file].file.options_at_mut(site) {
            options.set_entries(entries);
        }
    }

    /// Error context for the declaration carrying options at `site`.
    pub(crate) fn site_context(&self, file: usize, site: &OptionSite) -> ErrorCollector {
        let proto_file = &self.files[file].file;
        match site {
            OptionSite::File => self.file_context(file),
            OptionSite::Type(path) => self.type_context(file, path),
            OptionSite::Field(path, slot) => {
                let mut context = self.type_context(file, path);
                let Some(message) = proto_file.type_at(path).and_then(Type::as_message) else {
                    return context;
                };
                if let FieldSlot::OneOf(o, _) = slot {
                    if let Some(one_of) = message.one_ofs().get(*o) {
                        context = context.at(Frame::OneOf {
                            name: one_of.name().to_string(),
                            location: one_of.location().clone(),
                        });
                    }
                }
                match message.field_at(*slot) {
                    Some(field) => context.at(field_frame(field)),
                    None => context,
                }
            }
            OptionSite::OneOf(path, o) => {
                let context = self.type_context(file, path);
                match proto_file
                    .type_at(path)
                    .and_then(Type::as_message)
                    .and_then(|m| m.one_ofs().get(*o))
                {
                    Some(one_of) => context.at(Frame::OneOf {
                        name: one_of.name().to_string(),
                        location: one_of.location().clone(),
                    }),
                    None => context,
                }
            }
            OptionSite::Constant(path, c) => {
                let context = self.type_context(file, path);
                match proto_file
                    .type_at(path)
                    .and_then(Type::as_enum)
                    .and_then(|e| e.constants().get(*c))
                {
                    Some(constant) => context.at(Frame::EnumConstant {
                        name: constant.name().to_string(),
                        location: constant.location().clone(),
                    }),
                    None => context,
                }
            }
            OptionSite::Service(s) => self.file_context(file).at(service_frame(proto_file, *s)),
            OptionSite::Rpc(s, r) => {
                let context = self.file_context(file).at(service_frame(proto_file, *s));
                match proto_file.services.get(*s).and_then(|service| service.rpcs().get(*r)) {
                    Some(rpc) => context.at(Frame::Rpc {
                        name: rpc.name().to_string(),
                        location: rpc.location().clone(),
                    }),
                    None => context,
                }
            }
            OptionSite::ExtendField(e, f) => {
                let context = self.file_context(file);
                let Some(extend) = proto_file.extends.get(*e) else {
                    return context;
                };
                let context = context.at(Frame::Extend {
                    name: extend.name().to_string(),
                    location: extend.location().clone(),
                });
                match extend.fields.get(*f) {
                    Some(field) => context.at(field_frame(field)),
                    None => context,
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_type(&self, name: &str) -> Option<&TypeRecord> {
        self.registry.get(name)
    }
}

fn service_frame(file: &ProtoFile, service: usize) -> Frame {
    match file.services.get(service) {
        Some(service) => Frame::Service {
            ty: service.ty().clone(),
            location: service.location().clone(),
        },
        None => Frame::File {
            path: file.path().to_string(),
            package: file.package_name().map(str::to_string),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ExtendElement, FieldElement, MessageElement, ProtoFileElement};
    use crate::loader::MemoryLoader;

    fn linker_with(files: Vec<ProtoFileElement>) -> Linker {
        Linker::new(MemoryLoader::with_files(files))
    }

    #[test]
    fn phases_are_idempotent() {
        let mut linker = linker_with(vec![]);
        let element = ProtoFileElement::new("a.proto").package("a").message(
            MessageElement::new("M")
                .field(FieldElement::optional("int32", "x", 1))
                .nested_message(MessageElement::new("N")),
        );
        let file = linker.add_file(element, true);
        let registered = linker.registry.len();
        linker.require_types_registered(file);
        linker.require_types_registered(file);
        assert_eq!(linker.registry.len(), registered);
        assert_eq!(registered, 2);
        assert!(linker.registered_type("a.M.N").is_some());

        linker.link_members(file);
        let linked = linker.files[file].file.clone();
        linker.link_members(file);
        assert_eq!(linker.files[file].file, linked);
        assert!(linker.errors.is_empty());
    }

    #[test]
    fn extends_are_indexed_by_target() {
        let mut linker = linker_with(vec![]);
        let element = ProtoFileElement::new("a.proto")
            .package("a")
            .message(MessageElement::new("M").extension_range(100, 200))
            .extend(ExtendElement::new("M").field(FieldElement::optional("string", "note", 100)));
        let file = linker.add_file(element, true);
        linker.require_extensions_linked(file);
        linker.require_extensions_linked(file);
        let refs = &linker.extensions[&ProtoType::named("a.M")];
        assert_eq!(refs, &vec![ExtensionRef { file, extend: 0, field: 0 }]);
        assert_eq!(linker.files[file].file.extends()[0].ty(), Some(&ProtoType::named("a.M")));
    }

    #[test]
    fn duplicate_types_are_reported_with_the_first_location() {
        let mut linker = linker_with(vec![]);
        linker.add_file(ProtoFileElement::new("one.proto").package("a").message(MessageElement::new("M")), true);
        linker.add_file(ProtoFileElement::new("two.proto").package("a").message(MessageElement::new("M")), true);
        let errors = linker.errors.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("a.M is already defined at one.proto"), "{}", errors[0]);
    }
}
