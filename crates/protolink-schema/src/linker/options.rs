//! Option linking: option names to members, option values to
//! [`LinkedValue`]s.
//!
//! A name like `(acme.rules).limits.max` is a field path. Its head is either
//! a field declared on the options message or an extension of it; each
//! further segment is a field (or `[extension]`) of the previous segment's
//! message type. Resolving a segment links the members of the type it lives
//! on, so option types declared in dependencies are linked on demand.
//!
//! Notes:
//! - Unqualified names try declared fields first, then extensions by the
//!   longest dotted prefix that resolves.
//! - Every member an option touches is recorded as requested so dependency
//!   files keep the declarations options need.

use std::collections::HashMap;

use crate::element::{OptionElement, OptionValue};
use crate::error_collector::ErrorCollector;
use crate::model::{Field, LinkedValue, OptionEntry, Options, TypeKind};
use crate::proto_type::{ProtoMember, ProtoType};

use super::{resolve, ExtensionRef, Linker};

/// One resolved segment of an option name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OptionField {
    member: ProtoMember,
    ty: ProtoType,
}

impl Linker {
    /// Links every element of one options block. Elements naming the same
    /// top-level member merge into one entry.
    pub(crate) fn link_option_elements(
        &mut self,
        option_type: &ProtoType,
        elements: &[OptionElement],
        context: &ErrorCollector,
        validate: bool,
    ) -> Vec<OptionEntry> {
        let mut entries = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            let scope = context.resolution_scope();
            let Some(path) = self.option_field_path(option_type, &element.name, element.is_parenthesized, &scope) else {
                if validate {
                    context.report(format!("unable to resolve option {}", element.name));
                }
                continue;
            };
            if let Some((member, value)) = self.link_path_value(path, &element.value, context, validate) {
                Options::merge_entry(
                    &mut entries,
                    OptionEntry {
                        member,
                        value,
                        elements: vec![index],
                    },
                );
            }
        }
        entries
    }

    /// Links `value` against the last field of `path` and wraps it in one
    /// message level per earlier segment.
    fn link_path_value(
        &mut self,
        path: Vec<OptionField>,
        value: &OptionValue,
        context: &ErrorCollector,
        validate: bool,
    ) -> Option<(ProtoMember, LinkedValue)> {
        let (first, rest) = path.split_first()?;
        let target = rest.last().unwrap_or(first);
        let mut linked = self.link_value(target, value, context, validate);
        for field in rest.iter().rev() {
            linked = LinkedValue::Message(vec![(field.member.clone(), linked)]);
        }
        Some((first.member.clone(), linked))
    }

    fn link_value(&mut self, field: &OptionField, value: &OptionValue, context: &ErrorCollector, validate: bool) -> LinkedValue {
        match value {
            OptionValue::String(s) => LinkedValue::String(s.clone()),
            OptionValue::Boolean(b) => LinkedValue::Bool(*b),
            OptionValue::Number(n) => LinkedValue::Number(n.clone()),
            OptionValue::Enum(e) if field.ty == ProtoType::BOOL && (e == "true" || e == "false") => {
                LinkedValue::Bool(e == "true")
            }
            OptionValue::Enum(e) => LinkedValue::Enum(e.clone()),
            OptionValue::List(items) => LinkedValue::List(
                items
                    .iter()
                    .map(|item| self.link_value(field, item, context, validate))
                    .collect(),
            ),
            OptionValue::Option(nested) => {
                let pairs = self
                    .link_pair(&field.ty, &nested.name, nested.is_parenthesized, &nested.value, context, validate)
                    .into_iter()
                    .collect();
                LinkedValue::Message(pairs)
            }
            OptionValue::Map(entries) => {
                let mut pairs = Vec::new();
                for (key, value) in entries {
                    let (name, parenthesized) = match key.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
                        Some(extension) => (extension, true),
                        None => (key.as_str(), false),
                    };
                    pairs.extend(self.link_pair(&field.ty, name, parenthesized, value, context, validate));
                }
                LinkedValue::Message(pairs)
            }
        }
    }

    fn link_pair(
        &mut self,
        owner: &ProtoType,
        name: &str,
        parenthesized: bool,
        value: &OptionValue,
        context: &ErrorCollector,
        validate: bool,
    ) -> Option<(ProtoMember, LinkedValue)> {
        let scope = context.resolution_scope();
        match self.option_field_path(owner, name, parenthesized, &scope) {
            Some(path) => self.link_path_value(path, value, context, validate),
            None => {
                if validate {
                    context.report(format!("unable to resolve option {name} on {owner}"));
                }
                None
            }
        }
    }

    // =========================================================================
    // Field paths
    // =========================================================================

    fn option_field_path(&mut self, owner: &ProtoType, name: &str, parenthesized: bool, scope: &str) -> Option<Vec<OptionField>> {
        if let Some(inner) = name.strip_prefix('(') {
            let (extension, rest) = inner.split_once(')')?;
            let first = self.extension_option_field(owner, extension, scope)?;
            let rest = rest.strip_prefix('.').unwrap_or(rest);
            let segments: Vec<&str> = rest.split('.').filter(|s| !s.is_empty()).collect();
            return self.extend_path(vec![first], &segments, scope);
        }

        let segments: Vec<&str> = name.split('.').collect();
        if !parenthesized {
            if let Some(first) = self.declared_option_field(owner, segments[0]) {
                return self.extend_path(vec![first], &segments[1..], scope);
            }
        }
        for split in (1..=segments.len()).rev() {
            let head = segments[..split].join(".");
            if let Some(first) = self.extension_option_field(owner, &head, scope) {
                return self.extend_path(vec![first], &segments[split..], scope);
            }
        }
        None
    }

    fn extend_path(&mut self, mut path: Vec<OptionField>, segments: &[&str], scope: &str) -> Option<Vec<OptionField>> {
        for segment in segments {
            let owner = path.last()?.ty.clone();
            let next = self.dereference(&owner, segment, scope)?;
            path.push(next);
        }
        Some(path)
    }

    fn dereference(&mut self, owner: &ProtoType, segment: &str, scope: &str) -> Option<OptionField> {
        let bracketed = segment
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .or_else(|| segment.strip_prefix('(').and_then(|s| s.strip_suffix(')')));
        if let Some(extension) = bracketed {
            return self.extension_option_field(owner, extension, scope);
        }
        self.declared_option_field(owner, segment)
            .or_else(|| self.extension_option_field(owner, segment, scope))
    }

    fn declared_option_field(&mut self, owner: &ProtoType, name: &str) -> Option<OptionField> {
        let record = self.registry.get(owner.as_named()?)?.clone();
        if record.kind != TypeKind::Message {
            return None;
        }
        self.require_members_linked(record.file, &record.path);
        let ty = self.message_at(record.file, &record.path)?.field(name)?.ty()?.clone();
        let member = ProtoMember::new(owner.clone(), name);
        Some(self.option_field(member, ty))
    }

    fn extension_option_field(&mut self, owner: &ProtoType, name: &str, scope: &str) -> Option<OptionField> {
        let refs = self.extensions.get(owner)?.clone();
        let mut by_name: HashMap<String, ExtensionRef> = HashMap::new();
        for extension in refs {
            if let Some(field) = self.extension_field_at(extension) {
                by_name.insert(field.qualified_name(), extension);
            }
        }
        let found = *resolve(name, scope, &by_name)?;
        self.link_extend_members(found.file);
        let field = self.extension_field_at(found)?;
        let ty = field.ty()?.clone();
        let member = field.member(owner);
        Some(self.option_field(member, ty))
    }

    fn extension_field_at(&self, extension: ExtensionRef) -> Option<&Field> {
        self.files
            .get(extension.file)?
            .file
            .extends
            .get(extension.extend)?
            .fields
            .get(extension.field)
    }

    fn option_field(&mut self, member: ProtoMember, ty: ProtoType) -> OptionField {
        self.request_field(member.clone());
        self.request_type(ty.value_type().unwrap_or(&ty));
        OptionField { member, ty }
    }
}

#[cfg(test)]
mod tests {
    use crate::element::{
        ExtendElement, FieldElement, MessageElement, OptionElement, OptionValue, ProtoFileElement,
    };
    use crate::linker::Linker;
    use crate::loader::MemoryLoader;
    use crate::model::LinkedValue;
    use crate::proto_type::ProtoMember;

    fn options_file() -> ProtoFileElement {
        ProtoFileElement::new("acme/options.proto")
            .package("acme")
            .import("google/protobuf/descriptor.proto")
            .message(
                MessageElement::new("Limits")
                    .field(FieldElement::optional("int32", "min", 1))
                    .field(FieldElement::optional("int32", "max", 2)),
            )
            .extend(
                ExtendElement::new("google.protobuf.FieldOptions")
                    .field(FieldElement::optional("Limits", "limits", 60_001))
                    .field(FieldElement::optional("bool", "secret", 60_002)),
            )
    }

    fn source(field: FieldElement) -> ProtoFileElement {
        ProtoFileElement::new("acme/user.proto")
            .package("acme")
            .import("acme/options.proto")
            .message(MessageElement::new("User").field(field))
    }

    #[test]
    fn nested_option_paths_merge_into_one_entry() {
        let field = FieldElement::optional("int32", "age", 1)
            .option(OptionElement::extension("acme.limits", OptionValue::Map(vec![("min".into(), OptionValue::number(0))])))
            .option(OptionElement::new("(acme.limits).max", OptionValue::number(150)))
            .option(OptionElement::new("deprecated", OptionValue::Enum("true".into())));
        let schema = Linker::new(MemoryLoader::with_files(vec![options_file()]))
            .link(vec![source(field)])
            .expect("link");

        let age = schema.get_message("acme.User").and_then(|m| m.field("age")).expect("age");
        let limits = age
            .options()
            .get(&ProtoMember::parse("google.protobuf.FieldOptions#acme.limits").expect("member"))
            .expect("limits");
        assert_eq!(limits.field("min").and_then(LinkedValue::as_str), Some("0"));
        assert_eq!(limits.field("max").and_then(LinkedValue::as_str), Some("150"));
        assert_eq!(age.options().get_named("deprecated"), Some(&LinkedValue::Bool(true)));
        assert_eq!(age.options().entries().len(), 2);
    }

    #[test]
    fn unknown_options_are_reported_in_sources() {
        let field = FieldElement::optional("int32", "age", 1)
            .option(OptionElement::extension("acme.missing", OptionValue::Boolean(true)))
            .option(OptionElement::extension("acme.limits", OptionValue::Map(vec![("bogus".into(), OptionValue::number(1))])));
        let err = Linker::new(MemoryLoader::with_files(vec![options_file()]))
            .link(vec![source(field)])
            .expect_err("unresolved options");
        assert!(err.mentions("unable to resolve option acme.missing"), "{err}");
        assert!(err.mentions("unable to resolve option bogus on acme.Limits"), "{err}");
    }
}
