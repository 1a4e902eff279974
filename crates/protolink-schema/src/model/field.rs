use crate::descriptor::FIELD_OPTIONS;
use crate::descriptor::ONEOF_OPTIONS;
use crate::element::{FieldElement, FieldLabel, OneOfElement};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::{Options, TypeKind};
use crate::proto_type::{ProtoMember, ProtoType};
use crate::syntax_rules::SyntaxRules;

/// How a field's presence is represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeMode {
    /// Optional; absent values are omitted.
    NullIfAbsent,
    Required,
    /// proto3 singular scalars: the zero value is not written.
    OmitIdentity,
    Repeated,
    Packed,
    Map,
}

#[derive(Debug, Clone, PartialEq)]
struct LinkedField {
    ty: ProtoType,
    encode_mode: EncodeMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Package of the declaring file; qualifies extension names.
    namespace: Option<String>,
    location: Location,
    label: Option<FieldLabel>,
    element_type: String,
    name: String,
    default_value: Option<String>,
    declared_json_name: Option<String>,
    tag: i32,
    documentation: String,
    pub(crate) options: Options,
    extension: bool,
    linked: Option<LinkedField>,
}

impl Field {
    pub fn from_element(namespace: Option<&str>, element: &FieldElement, extension: bool) -> Field {
        Field {
            namespace: namespace.map(str::to_string),
            location: element.location.clone(),
            label: element.label,
            element_type: element.type_name.clone(),
            name: element.name.clone(),
            default_value: element.default_value.clone(),
            declared_json_name: element.json_name.clone(),
            tag: element.tag,
            documentation: element.documentation.clone(),
            options: Options::new(FIELD_OPTIONS, element.options.clone()),
            extension,
            linked: None,
        }
    }

    pub fn to_element(&self) -> FieldElement {
        FieldElement {
            location: self.location.clone(),
            label: self.label,
            type_name: self.element_type.clone(),
            name: self.name.clone(),
            default_value: self.default_value.clone(),
            json_name: self.declared_json_name.clone(),
            tag: self.tag,
            documentation: self.documentation.clone(),
            options: self.options.to_elements(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `package.name` for extensions, `name` otherwise. This is the member
    /// name used in [`ProtoMember`]s.
    pub fn qualified_name(&self) -> String {
        match (&self.namespace, self.extension) {
            (Some(package), true) if !package.is_empty() => format!("{package}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn label(&self) -> Option<FieldLabel> {
        self.label
    }

    /// The unresolved type text as declared.
    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_extension(&self) -> bool {
        self.extension
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    /// The resolved type; `None` until linked.
    pub fn ty(&self) -> Option<&ProtoType> {
        self.linked.as_ref().map(|l| &l.ty)
    }

    pub fn encode_mode(&self) -> Option<EncodeMode> {
        self.linked.as_ref().map(|l| l.encode_mode)
    }

    pub fn is_repeated(&self) -> bool {
        self.label == Some(FieldLabel::Repeated)
    }

    pub fn is_required(&self) -> bool {
        self.label == Some(FieldLabel::Required)
    }

    pub fn is_packed(&self) -> bool {
        self.encode_mode() == Some(EncodeMode::Packed)
    }

    pub fn is_deprecated(&self) -> bool {
        self.options.element_bool("deprecated").unwrap_or(false)
    }

    /// True for `debug_redact = true` or any option whose name ends in
    /// `redacted` set to true, like `(acme.redacted) = true`.
    pub fn is_redacted(&self) -> bool {
        self.options.element_bool("debug_redact").unwrap_or(false)
            || self.options.elements().iter().any(|element| {
                element.name.trim_end_matches(')').ends_with("redacted") && element.value.as_bool() == Some(true)
            })
    }

    /// The declared JSON name, else the lowerCamelCase form of the name.
    pub fn json_name(&self) -> String {
        match &self.declared_json_name {
            Some(name) => name.clone(),
            None => camel_case(&self.name),
        }
    }

    pub fn declared_json_name(&self) -> Option<&str> {
        self.declared_json_name.as_deref()
    }

    pub fn member(&self, owner: &ProtoType) -> ProtoMember {
        ProtoMember::new(owner.clone(), self.qualified_name())
    }

    pub(crate) fn link(&mut self, ty: ProtoType, kind: Option<TypeKind>, rules: SyntaxRules, in_one_of: bool) {
        let encode_mode = rules.encode_mode(&ty, kind, self.label, self.options.element_bool("packed"), in_one_of);
        self.linked = Some(LinkedField { ty, encode_mode });
    }

    pub(crate) fn retain_all(&self, owner: &ProtoType, marks: &mut MarkSet<'_>) -> Option<Field> {
        let member = self.member(owner);
        if !marks.contains_member(&member) {
            return None;
        }
        let ty = self.ty()?;
        if !marks.retains_reference(&member, ty) {
            return None;
        }
        Some(Field {
            options: self.options.retain_all(marks),
            ..self.clone()
        })
    }

    pub(crate) fn retain_linked(&self) -> Option<Field> {
        self.linked.as_ref()?;
        Some(Field {
            options: self.options.retain_linked(),
            ..self.clone()
        })
    }
}

pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ============================================================================
// Oneofs
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OneOf {
    name: String,
    documentation: String,
    location: Location,
    pub(crate) fields: Vec<Field>,
    pub(crate) options: Options,
}

impl OneOf {
    pub fn from_element(namespace: Option<&str>, element: &OneOfElement) -> OneOf {
        OneOf {
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            location: element.location.clone(),
            fields: element
                .fields
                .iter()
                .map(|f| Field::from_element(namespace, f, false))
                .collect(),
            options: Options::new(ONEOF_OPTIONS, element.options.clone()),
        }
    }

    pub fn to_element(&self) -> OneOfElement {
        OneOfElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            fields: self.fields.iter().map(Field::to_element).collect(),
            options: self.options.to_elements(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn retain_all(&self, owner: &ProtoType, marks: &mut MarkSet<'_>) -> Option<OneOf> {
        let fields: Vec<Field> = self.fields.iter().filter_map(|f| f.retain_all(owner, marks)).collect();
        if fields.is_empty() {
            return None;
        }
        Some(OneOf {
            fields,
            options: self.options.retain_all(marks),
            ..self.clone()
        })
    }

    pub(crate) fn retain_linked(&self) -> Option<OneOf> {
        let fields: Vec<Field> = self.fields.iter().filter_map(Field::retain_linked).collect();
        if fields.is_empty() {
            return None;
        }
        Some(OneOf {
            fields,
            options: self.options.retain_linked(),
            ..self.clone()
        })
    }
}
