//! Parsed schema elements (the input side of the linker).
//!
//! Elements are plain data as produced by a `.proto` parser: names are
//! unresolved strings, option values are uninterpreted. The linker turns a
//! set of [`ProtoFileElement`]s into a linked [`crate::Schema`], and
//! [`crate::Schema::to_elements`] turns a (possibly pruned) schema back into
//! elements.
//!
//! Notes:
//! - Every element derives serde so that bundles of parsed files can be
//!   stored and exchanged as JSON.
//! - The builder-style helpers (`ProtoFileElement::new(..).package(..)`) stamp
//!   the file path into nested locations that do not carry one yet.

use serde::{Deserialize, Serialize};

use crate::location::Location;

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Syntax {
    Proto2,
    Proto3,
}

impl Syntax {
    pub fn as_str(self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLabel {
    Optional,
    Required,
    Repeated,
}

// ============================================================================
// Options
// ============================================================================

/// `name = value`. A parenthesized name refers to an extension field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionElement {
    pub name: String,
    pub value: OptionValue,
    #[serde(default)]
    pub is_parenthesized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    String(String),
    Boolean(bool),
    /// Numbers keep their source text so that 64-bit values survive intact.
    Number(String),
    Enum(String),
    List(Vec<OptionValue>),
    /// `{ a: 1, b { c: 2 } }`.
    Map(Vec<(String, OptionValue)>),
    /// A nested single assignment: `(a).b = 1` parses as `a = { b: 1 }`.
    Option(Box<OptionElement>),
}

impl OptionElement {
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
            is_parenthesized: false,
        }
    }

    /// `(name) = value`, i.e. an extension option.
    pub fn extension(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
            is_parenthesized: true,
        }
    }

    pub fn to_source(&self) -> String {
        let name = if self.is_parenthesized {
            format!("({})", self.name)
        } else {
            self.name.clone()
        };
        match &self.value {
            OptionValue::Option(nested) => format!("{name}.{}", nested.to_source()),
            value => format!("{name} = {}", value.to_source()),
        }
    }
}

impl OptionValue {
    pub fn string(value: impl Into<String>) -> Self {
        OptionValue::String(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        OptionValue::Number(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) | OptionValue::Number(s) | OptionValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Boolean(b) => Some(*b),
            OptionValue::Enum(s) | OptionValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn to_source(&self) -> String {
        match self {
            OptionValue::String(s) => format!("{s:?}"),
            OptionValue::Boolean(b) => b.to_string(),
            OptionValue::Number(n) | OptionValue::Enum(n) => n.clone(),
            OptionValue::List(items) => {
                let items: Vec<String> = items.iter().map(OptionValue::to_source).collect();
                format!("[{}]", items.join(", "))
            }
            OptionValue::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.to_source()))
                    .collect();
                format!("{{ {} }}", entries.join(", "))
            }
            OptionValue::Option(nested) => format!("{{ {} }}", nested.to_source()),
        }
    }
}

/// The value of the first element named `name` (parenthesized or not).
pub fn find_option<'a>(options: &'a [OptionElement], name: &str) -> Option<&'a OptionValue> {
    options.iter().find(|o| o.name == name).map(|o| &o.value)
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoFileElement {
    pub location: Location,
    pub package_name: Option<String>,
    pub syntax: Option<Syntax>,
    pub imports: Vec<String>,
    pub public_imports: Vec<String>,
    pub weak_imports: Vec<String>,
    pub types: Vec<TypeElement>,
    pub services: Vec<ServiceElement>,
    pub extend_declarations: Vec<ExtendElement>,
    pub options: Vec<OptionElement>,
}

impl ProtoFileElement {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            location: Location::get(path),
            ..Self::default()
        }
    }

    pub fn path(&self) -> &str {
        &self.location.path
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package_name = Some(package.into());
        self
    }

    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    pub fn import(mut self, path: impl Into<String>) -> Self {
        self.imports.push(path.into());
        self
    }

    pub fn public_import(mut self, path: impl Into<String>) -> Self {
        self.public_imports.push(path.into());
        self
    }

    pub fn weak_import(mut self, path: impl Into<String>) -> Self {
        self.weak_imports.push(path.into());
        self
    }

    pub fn message(mut self, mut message: MessageElement) -> Self {
        message.stamp(&self.location);
        self.types.push(TypeElement::Message(message));
        self
    }

    pub fn enum_type(mut self, mut enum_type: EnumElement) -> Self {
        enum_type.stamp(&self.location);
        self.types.push(TypeElement::Enum(enum_type));
        self
    }

    pub fn service(mut self, mut service: ServiceElement) -> Self {
        stamp(&mut service.location, &self.location);
        for rpc in &mut service.rpcs {
            stamp(&mut rpc.location, &self.location);
        }
        self.services.push(service);
        self
    }

    pub fn extend(mut self, mut extend: ExtendElement) -> Self {
        stamp(&mut extend.location, &self.location);
        for field in &mut extend.fields {
            stamp(&mut field.location, &self.location);
        }
        self.extend_declarations.push(extend);
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }
}

fn stamp(location: &mut Location, file: &Location) {
    if location.path.is_empty() {
        location.base = file.base.clone();
        location.path = file.path.clone();
    }
}

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeElement {
    Message(MessageElement),
    Enum(EnumElement),
}

impl TypeElement {
    pub fn name(&self) -> &str {
        match self {
            TypeElement::Message(m) => &m.name,
            TypeElement::Enum(e) => &e.name,
        }
    }

    fn stamp(&mut self, file: &Location) {
        match self {
            TypeElement::Message(m) => m.stamp(file),
            TypeElement::Enum(e) => e.stamp(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub nested_types: Vec<TypeElement>,
    pub options: Vec<OptionElement>,
    pub reserveds: Vec<ReservedElement>,
    pub fields: Vec<FieldElement>,
    pub one_ofs: Vec<OneOfElement>,
    pub extensions: Vec<ExtensionsElement>,
}

impl MessageElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, line: i32, column: i32) -> Self {
        self.location = self.location.at(line, column);
        self
    }

    pub fn field(mut self, field: FieldElement) -> Self {
        self.fields.push(field);
        self
    }

    pub fn one_of(mut self, one_of: OneOfElement) -> Self {
        self.one_ofs.push(one_of);
        self
    }

    pub fn nested_message(mut self, message: MessageElement) -> Self {
        self.nested_types.push(TypeElement::Message(message));
        self
    }

    pub fn nested_enum(mut self, enum_type: EnumElement) -> Self {
        self.nested_types.push(TypeElement::Enum(enum_type));
        self
    }

    pub fn extension_range(mut self, start: i32, end: i32) -> Self {
        self.extensions.push(ExtensionsElement {
            location: Location::default(),
            documentation: String::new(),
            values: vec![TagRange { start, end }],
        });
        self
    }

    pub fn reserved(mut self, value: ReservedValue) -> Self {
        self.reserveds.push(ReservedElement {
            location: Location::default(),
            documentation: String::new(),
            values: vec![value],
        });
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }

    fn stamp(&mut self, file: &Location) {
        stamp(&mut self.location, file);
        for field in &mut self.fields {
            stamp(&mut field.location, file);
        }
        for one_of in &mut self.one_ofs {
            stamp(&mut one_of.location, file);
            for field in &mut one_of.fields {
                stamp(&mut field.location, file);
            }
        }
        for extensions in &mut self.extensions {
            stamp(&mut extensions.location, file);
        }
        for reserved in &mut self.reserveds {
            stamp(&mut reserved.location, file);
        }
        for nested in &mut self.nested_types {
            nested.stamp(file);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub options: Vec<OptionElement>,
    pub constants: Vec<EnumConstantElement>,
    pub reserveds: Vec<ReservedElement>,
}

impl EnumElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn constant(mut self, name: impl Into<String>, tag: i32) -> Self {
        self.constants.push(EnumConstantElement {
            name: name.into(),
            tag,
            ..EnumConstantElement::default()
        });
        self
    }

    pub fn constant_element(mut self, constant: EnumConstantElement) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }

    fn stamp(&mut self, file: &Location) {
        stamp(&mut self.location, file);
        for constant in &mut self.constants {
            stamp(&mut constant.location, file);
        }
        for reserved in &mut self.reserveds {
            stamp(&mut reserved.location, file);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumConstantElement {
    pub location: Location,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

impl EnumConstantElement {
    pub fn new(name: impl Into<String>, tag: i32) -> Self {
        Self {
            name: name.into(),
            tag,
            ..Self::default()
        }
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }
}

// ============================================================================
// Fields
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldElement {
    pub location: Location,
    pub label: Option<FieldLabel>,
    /// Unresolved type text: `int32`, `Foo`, `.a.b.Foo`, `map<string, Foo>`.
    pub type_name: String,
    pub name: String,
    pub default_value: Option<String>,
    pub json_name: Option<String>,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

impl FieldElement {
    pub fn new(label: Option<FieldLabel>, type_name: impl Into<String>, name: impl Into<String>, tag: i32) -> Self {
        Self {
            label,
            type_name: type_name.into(),
            name: name.into(),
            tag,
            ..Self::default()
        }
    }

    pub fn optional(type_name: impl Into<String>, name: impl Into<String>, tag: i32) -> Self {
        Self::new(Some(FieldLabel::Optional), type_name, name, tag)
    }

    pub fn required(type_name: impl Into<String>, name: impl Into<String>, tag: i32) -> Self {
        Self::new(Some(FieldLabel::Required), type_name, name, tag)
    }

    pub fn repeated(type_name: impl Into<String>, name: impl Into<String>, tag: i32) -> Self {
        Self::new(Some(FieldLabel::Repeated), type_name, name, tag)
    }

    /// No label: proto3 singular fields, oneof members and map fields.
    pub fn plain(type_name: impl Into<String>, name: impl Into<String>, tag: i32) -> Self {
        Self::new(None, type_name, name, tag)
    }

    pub fn at(mut self, line: i32, column: i32) -> Self {
        self.location = self.location.at(line, column);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn json_name(mut self, value: impl Into<String>) -> Self {
        self.json_name = Some(value.into());
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OneOfElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
    pub options: Vec<OptionElement>,
}

impl OneOfElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: FieldElement) -> Self {
        self.fields.push(field);
        self
    }
}

// ============================================================================
// Ranges
// ============================================================================

/// Inclusive tag range; a single tag has `start == end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagRange {
    pub start: i32,
    pub end: i32,
}

impl TagRange {
    pub fn single(tag: i32) -> Self {
        Self { start: tag, end: tag }
    }

    pub fn contains(&self, tag: i32) -> bool {
        self.start <= tag && tag <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ReservedValue {
    Name(String),
    Range(TagRange),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservedElement {
    pub location: Location,
    pub documentation: String,
    pub values: Vec<ReservedValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsElement {
    pub location: Location,
    pub documentation: String,
    pub values: Vec<TagRange>,
}

// ============================================================================
// Services and extends
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub rpcs: Vec<RpcElement>,
    pub options: Vec<OptionElement>,
}

impl ServiceElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn rpc(mut self, rpc: RpcElement) -> Self {
        self.rpcs.push(rpc);
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub request_type: String,
    pub response_type: String,
    pub request_streaming: bool,
    pub response_streaming: bool,
    pub options: Vec<OptionElement>,
}

impl RpcElement {
    pub fn new(name: impl Into<String>, request_type: impl Into<String>, response_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_type: request_type.into(),
            response_type: response_type.into(),
            ..Self::default()
        }
    }

    pub fn streaming(mut self, request: bool, response: bool) -> Self {
        self.request_streaming = request;
        self.response_streaming = response;
        self
    }

    pub fn option(mut self, option: OptionElement) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendElement {
    pub location: Location,
    /// Unresolved name of the extended message.
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
}

impl ExtendElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: FieldElement) -> Self {
        self.fields.push(field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_stamp_file_locations() {
        let file = ProtoFileElement::new("a/b.proto")
            .package("a")
            .message(MessageElement::new("M").field(FieldElement::optional("string", "s", 1).at(4, 3)));
        let TypeElement::Message(message) = &file.types[0] else {
            panic!("expected a message");
        };
        assert_eq!(message.location.path, "a/b.proto");
        assert_eq!(message.fields[0].location.to_string(), "a/b.proto:4:3");
    }

    #[test]
    fn option_source_rendering() {
        let option = OptionElement::extension(
            "my.opt",
            OptionValue::Option(Box::new(OptionElement::new("depth", OptionValue::number(3)))),
        );
        assert_eq!(option.to_source(), "(my.opt).depth = 3");
        assert_eq!(
            OptionValue::Map(vec![("a".to_string(), OptionValue::string("x"))]).to_source(),
            "{ a: \"x\" }"
        );
    }

    #[test]
    fn elements_deserialize_with_defaults() {
        let json = r#"{
            "location": { "path": "x.proto" },
            "package_name": "x",
            "types": [
                { "kind": "message", "name": "M",
                  "fields": [ { "label": "optional", "type_name": "int32", "name": "a", "tag": 1 } ] },
                { "kind": "enum", "name": "E", "constants": [ { "name": "ZERO", "tag": 0 } ] }
            ],
            "options": [ { "name": "java_package", "value": { "kind": "string", "value": "com.x" } } ]
        }"#;
        let file: ProtoFileElement = serde_json::from_str(json).expect("deserialize");
        assert_eq!(file.path(), "x.proto");
        assert_eq!(file.location.line, -1);
        assert_eq!(file.types.len(), 2);
        assert_eq!(
            find_option(&file.options, "java_package").and_then(OptionValue::as_str),
            Some("com.x")
        );
    }
}
