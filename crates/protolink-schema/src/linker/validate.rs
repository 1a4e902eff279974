//! Validation of linked source files.
//!
//! Runs after every type and option is linked. Problems are reported against
//! the offending declaration and never stop validation of the rest.
//!
//! Checks:
//! - field tags in range, unique per message (extensions included), not reserved
//! - field names and (proto3) JSON names unique, names not reserved
//! - proto3: no `required`, no default values, enums start at zero, only
//!   option types extended
//! - enum tags unique unless `allow_alias`; sibling enums never share a
//!   constant name
//! - rpc names unique per service
//! - extension tags inside the target's extension ranges
//! - every referenced type declared in this file or a visible import

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::descriptor::is_valid_tag;
use crate::error_collector::{ErrorCollector, Frame};
use crate::location::Location;
use crate::model::{Field, FieldSlot, Type, TypeKind};
use crate::proto_type::ProtoType;
use crate::syntax_rules::SyntaxRules;

use super::file_linker::field_frame;
use super::Linker;

/// What duplicate checks need to know about one field.
struct FieldFacts {
    name: String,
    tag: i32,
    json_name: String,
    location: Location,
    extension: bool,
}

/// `multiple KIND share WHAT VALUE:` followed by a numbered list.
fn report_duplicates<'a, K: std::fmt::Display>(
    context: &ErrorCollector,
    kind: &str,
    what: &str,
    groups: BTreeMap<K, Vec<(String, &'a Location)>>,
) {
    for (key, entries) in groups {
        if entries.len() < 2 {
            continue;
        }
        let mut message = format!("multiple {kind} share {what} {key}:");
        for (i, (name, location)) in entries.iter().enumerate() {
            message.push_str(&format!("\n  {}. {name} ({location})", i + 1));
        }
        context.report(message);
    }
}

impl Linker {
    pub(crate) fn validate_file(&mut self, file: usize) {
        let visible: HashSet<String> = self
            .effective_imports(file)
            .into_iter()
            .map(|i| self.files[i].file.path().to_string())
            .collect();
        let rules = self.files[file].file.syntax_rules();
        let errors_before = self.errors.len();

        for path in self.files[file].file.type_paths() {
            match self.files[file].file.type_at(&path) {
                Some(Type::Message(_)) => {
                    self.validate_message(file, &path, rules, &visible);
                    self.validate_sibling_enums(self.type_context(file, &path), self.nested_types_at(file, &path));
                }
                Some(Type::Enum(_)) => self.validate_enum(file, &path, rules),
                Some(Type::Enclosing(_)) | None => {}
            }
        }
        self.validate_sibling_enums(self.file_context(file), self.files[file].file.types());
        self.validate_services(file, &visible);
        self.validate_extends(file, rules, &visible);

        debug!(
            path = self.files[file].file.path(),
            errors = self.errors.len() - errors_before,
            "validated"
        );
    }

    fn nested_types_at(&self, file: usize, path: &[usize]) -> &[Type] {
        self.files[file]
            .file
            .type_at(path)
            .map(Type::nested_types)
            .unwrap_or(&[])
    }

    /// Reports `ty` if it is declared in a file `own_path` cannot see.
    fn check_import(&self, ty: &ProtoType, own_path: &str, visible: &HashSet<String>, context: &ErrorCollector) {
        let target = ty.value_type().unwrap_or(ty);
        let Some(record) = target.as_named().and_then(|name| self.registry.get(name)) else {
            return;
        };
        let declaring = self.files[record.file].file.path();
        if declaring != own_path && !visible.contains(declaring) {
            context.report(format!("{own_path} needs to import {declaring}"));
        }
    }

    fn validate_field(
        &self,
        field: &Field,
        rules: SyntaxRules,
        own_path: &str,
        visible: &HashSet<String>,
        context: &ErrorCollector,
    ) {
        if !is_valid_tag(field.tag()) {
            context.report(format!("tag is out of range: {}", field.tag()));
        }
        if let Some(error) = rules.validate_label(field.label()) {
            context.report(error);
        }
        if let Some(error) = rules.validate_default_value(field.default_value().is_some()) {
            context.report(error);
        }
        let Some(ty) = field.ty() else {
            return;
        };
        self.check_import(ty, own_path, visible, context);

        if field.options().element_bool("packed") == Some(true) {
            let packable = ty.as_scalar().is_some_and(|s| s.is_packable()) || self.kind_of(ty) == Some(TypeKind::Enum);
            if !field.is_repeated() || !packable {
                context.report(format!("packed=true not permitted on {}", field.element_type()));
            }
        }
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn validate_message(&self, file: usize, path: &[usize], rules: SyntaxRules, visible: &HashSet<String>) {
        let proto_file = &self.files[file].file;
        let Some(message) = proto_file.type_at(path).and_then(Type::as_message) else {
            return;
        };
        let own_path = proto_file.path();
        let type_context = self.type_context(file, path);

        let mut facts = Vec::new();
        for slot in message.field_slots() {
            let Some(field) = message.field_at(slot) else {
                continue;
            };
            let mut context = type_context.clone();
            if let FieldSlot::OneOf(o, _) = slot {
                if let Some(one_of) = message.one_ofs().get(o) {
                    context = context.at(Frame::OneOf {
                        name: one_of.name().to_string(),
                        location: one_of.location().clone(),
                    });
                }
            }
            let context = context.at(field_frame(field));
            self.validate_field(field, rules, own_path, visible, &context);

            for reserved in message.reserveds() {
                if reserved.matches_tag(field.tag()) {
                    context.report(format!("tag {} is reserved ({})", field.tag(), reserved.location()));
                }
                if reserved.matches_name(field.name()) {
                    context.report(format!("name '{}' is reserved ({})", field.name(), reserved.location()));
                }
            }
            facts.push(FieldFacts {
                name: field.name().to_string(),
                tag: field.tag(),
                json_name: field.json_name(),
                location: field.location().clone(),
                extension: false,
            });
        }

        for extension in self.extensions.get(message.ty()).into_iter().flatten() {
            let Some(field) = self
                .files
                .get(extension.file)
                .and_then(|f| f.file.extends.get(extension.extend))
                .and_then(|e| e.fields.get(extension.field))
            else {
                continue;
            };
            facts.push(FieldFacts {
                name: field.qualified_name(),
                tag: field.tag(),
                json_name: field.json_name(),
                location: field.location().clone(),
                extension: true,
            });
        }

        let mut by_tag: BTreeMap<i32, Vec<(String, &Location)>> = BTreeMap::new();
        let mut by_name: BTreeMap<&str, Vec<(String, &Location)>> = BTreeMap::new();
        let mut by_json: BTreeMap<&str, Vec<(String, &Location)>> = BTreeMap::new();
        for fact in &facts {
            by_tag.entry(fact.tag).or_default().push((fact.name.clone(), &fact.location));
            if fact.extension {
                continue;
            }
            by_name.entry(&fact.name).or_default().push((fact.name.clone(), &fact.location));
            by_json.entry(&fact.json_name).or_default().push((fact.name.clone(), &fact.location));
        }
        report_duplicates(&type_context, "fields", "tag", by_tag);
        report_duplicates(&type_context, "fields", "name", by_name);
        if rules.json_names_must_be_unique() {
            report_duplicates(&type_context, "fields", "JSON name", by_json);
        }

        for extensions in message.extensions() {
            for range in extensions.values() {
                if !is_valid_tag(range.start) || !is_valid_tag(range.end) || range.start > range.end {
                    type_context
                        .at(Frame::Extensions {
                            location: extensions.location().clone(),
                        })
                        .report(format!("extension range {} to {} is out of range", range.start, range.end));
                }
            }
        }
    }

    // =========================================================================
    // Enums
    // =========================================================================

    fn validate_enum(&self, file: usize, path: &[usize], rules: SyntaxRules) {
        let Some(enum_type) = self.files[file].file.type_at(path).and_then(Type::as_enum) else {
            return;
        };
        let context = self.type_context(file, path);
        if let Some(error) = rules.validate_enum_constants(enum_type.constants()) {
            context.report(error);
        }

        let mut by_tag: BTreeMap<i32, Vec<(String, &Location)>> = BTreeMap::new();
        let mut by_name: BTreeMap<&str, Vec<(String, &Location)>> = BTreeMap::new();
        for constant in enum_type.constants() {
            by_tag
                .entry(constant.tag())
                .or_default()
                .push((constant.name().to_string(), constant.location()));
            by_name
                .entry(constant.name())
                .or_default()
                .push((constant.name().to_string(), constant.location()));

            let constant_context = context.at(Frame::EnumConstant {
                name: constant.name().to_string(),
                location: constant.location().clone(),
            });
            for reserved in enum_type.reserveds() {
                if reserved.matches_tag(constant.tag()) {
                    constant_context.report(format!("tag {} is reserved ({})", constant.tag(), reserved.location()));
                }
                if reserved.matches_name(constant.name()) {
                    constant_context.report(format!("name '{}' is reserved ({})", constant.name(), reserved.location()));
                }
            }
        }
        if !enum_type.allow_alias() {
            report_duplicates(&context, "enum constants", "tag", by_tag);
        }
        report_duplicates(&context, "enum constants", "name", by_name);
    }

    /// Enum constants live in the scope enclosing their enum, so sibling
    /// enums may not share a constant name.
    fn validate_sibling_enums(&self, context: ErrorCollector, siblings: &[Type]) {
        let mut by_constant: BTreeMap<&str, Vec<(String, &Location)>> = BTreeMap::new();
        for enum_type in siblings.iter().filter_map(Type::as_enum) {
            let mut seen = HashSet::new();
            for constant in enum_type.constants() {
                if !seen.insert(constant.name()) {
                    continue;
                }
                by_constant
                    .entry(constant.name())
                    .or_default()
                    .push((format!("{}.{}", enum_type.ty(), constant.name()), constant.location()));
            }
        }
        report_duplicates(&context, "enums", "constant", by_constant);
    }

    // =========================================================================
    // Services and extends
    // =========================================================================

    fn validate_services(&self, file: usize, visible: &HashSet<String>) {
        let proto_file = &self.files[file].file;
        let own_path = proto_file.path();
        for service in proto_file.services() {
            let context = self.file_context(file).at(Frame::Service {
                ty: service.ty().clone(),
                location: service.location().clone(),
            });
            let mut by_name: BTreeMap<&str, Vec<(String, &Location)>> = BTreeMap::new();
            for rpc in service.rpcs() {
                by_name
                    .entry(rpc.name())
                    .or_default()
                    .push((rpc.name().to_string(), rpc.location()));
                let rpc_context = context.at(Frame::Rpc {
                    name: rpc.name().to_string(),
                    location: rpc.location().clone(),
                });
                for ty in [rpc.request_type(), rpc.response_type()].into_iter().flatten() {
                    self.check_import(ty, own_path, visible, &rpc_context);
                }
            }
            report_duplicates(&context, "rpcs", "name", by_name);
        }
    }

    fn validate_extends(&self, file: usize, rules: SyntaxRules, visible: &HashSet<String>) {
        let proto_file = &self.files[file].file;
        let own_path = proto_file.path();
        for extend in proto_file.extends() {
            let context = self.file_context(file).at(Frame::Extend {
                name: extend.name().to_string(),
                location: extend.location().clone(),
            });
            let target = extend.ty();
            if let Some(target) = target {
                if !rules.can_extend(target) {
                    context.report(format!(
                        "only option types may be extended in {}, not {target}",
                        rules.syntax().as_str()
                    ));
                }
                self.check_import(target, own_path, visible, &context);
            }
            let target_message = target
                .and_then(|t| t.as_named())
                .and_then(|name| self.registry.get(name))
                .and_then(|record| self.message_at(record.file, &record.path));

            for field in extend.fields() {
                let field_context = context.at(field_frame(field));
                self.validate_field(field, rules, own_path, visible, &field_context);
                if let Some(message) = target_message {
                    if is_valid_tag(field.tag()) && !message.allows_extension_tag(field.tag()) {
                        field_context.report(format!(
                            "extension fields cannot use tag {}: {} declares no extension range containing it",
                            field.tag(),
                            message.ty()
                        ));
                    }
                }
            }
        }
    }
}
