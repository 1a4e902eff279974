//! Type and member identifiers.
//!
//! A [`ProtoType`] names one of the built-in scalars, a `map<K, V>`, or a
//! declared message/enum/service by its fully-qualified dotted name. A
//! [`ProtoMember`] names something declared inside a type: a field, an enum
//! constant, an RPC, or an extension field (whose member name is itself
//! package-qualified).
//!
//! Notes:
//! - Constructors canonicalize: `ProtoType::named("int32")` is the scalar, so
//!   structural equality agrees with equality of the printed form.
//! - Both identifiers serialize as their printed form (`"a.b.C"`,
//!   `"map<string, a.B>"`, `"a.B#field"`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtoTypeError;

// ============================================================================
// Scalars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    Bool,
    Bytes,
    Double,
    Float,
    Fixed32,
    Fixed64,
    Int32,
    Int64,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
    String,
    Uint32,
    Uint64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Bool,
        ScalarType::Bytes,
        ScalarType::Double,
        ScalarType::Float,
        ScalarType::Fixed32,
        ScalarType::Fixed64,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::Sfixed32,
        ScalarType::Sfixed64,
        ScalarType::Sint32,
        ScalarType::Sint64,
        ScalarType::String,
        ScalarType::Uint32,
        ScalarType::Uint64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Bytes => "bytes",
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::String => "string",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Floating point and bytes keys are not allowed in maps.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, ScalarType::Bytes | ScalarType::Double | ScalarType::Float)
    }

    /// Length-delimited scalars cannot use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarType::Bytes | ScalarType::String)
    }
}

// ============================================================================
// ProtoType
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtoType {
    Scalar(ScalarType),
    Map {
        key: ScalarType,
        value: Box<ProtoType>,
    },
    Named(String),
}

impl ProtoType {
    pub const BOOL: ProtoType = ProtoType::Scalar(ScalarType::Bool);
    pub const BYTES: ProtoType = ProtoType::Scalar(ScalarType::Bytes);
    pub const DOUBLE: ProtoType = ProtoType::Scalar(ScalarType::Double);
    pub const FLOAT: ProtoType = ProtoType::Scalar(ScalarType::Float);
    pub const INT32: ProtoType = ProtoType::Scalar(ScalarType::Int32);
    pub const INT64: ProtoType = ProtoType::Scalar(ScalarType::Int64);
    pub const STRING: ProtoType = ProtoType::Scalar(ScalarType::String);
    pub const UINT32: ProtoType = ProtoType::Scalar(ScalarType::Uint32);
    pub const UINT64: ProtoType = ProtoType::Scalar(ScalarType::Uint64);

    /// A declared type by its dotted name. Scalar names yield the scalar.
    pub fn named(name: impl Into<String>) -> ProtoType {
        let name = name.into();
        match ScalarType::from_name(&name) {
            Some(scalar) => ProtoType::Scalar(scalar),
            None => ProtoType::Named(name),
        }
    }

    /// Parses `int32`, `a.b.C` or `map<K, V>`.
    pub fn parse(text: &str) -> Result<ProtoType, ProtoTypeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ProtoTypeError::Empty);
        }
        if let Some(inner) = text.strip_prefix("map<").and_then(|t| t.strip_suffix('>')) {
            let (key, value) = inner
                .split_once(',')
                .ok_or_else(|| ProtoTypeError::Malformed(text.to_string()))?;
            return ProtoType::map(ProtoType::parse(key)?, ProtoType::parse(value)?);
        }
        if text.starts_with('.')
            || text.ends_with('.')
            || text.contains("..")
            || text.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ',' | '#'))
        {
            return Err(ProtoTypeError::Malformed(text.to_string()));
        }
        Ok(ProtoType::named(text))
    }

    pub fn map(key: ProtoType, value: ProtoType) -> Result<ProtoType, ProtoTypeError> {
        let key = match key {
            ProtoType::Scalar(scalar) if scalar.is_valid_map_key() => scalar,
            other => return Err(ProtoTypeError::InvalidMapKey(other.to_string())),
        };
        if value.is_map() {
            return Err(ProtoTypeError::NestedMap(value.to_string()));
        }
        Ok(ProtoType::Map {
            key,
            value: Box::new(value),
        })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ProtoType::Scalar(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ProtoType::Map { .. })
    }

    pub fn is_named(&self) -> bool {
        matches!(self, ProtoType::Named(_))
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            ProtoType::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&str> {
        match self {
            ProtoType::Named(name) => Some(name),
            _ => None,
        }
    }

    pub fn key_type(&self) -> Option<ProtoType> {
        match self {
            ProtoType::Map { key, .. } => Some(ProtoType::Scalar(*key)),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<&ProtoType> {
        match self {
            ProtoType::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The last dotted segment of a named type; the full text otherwise.
    pub fn simple_name(&self) -> String {
        match self {
            ProtoType::Named(name) => match name.rfind('.') {
                Some(dot) => name[dot + 1..].to_string(),
                None => name.clone(),
            },
            other => other.to_string(),
        }
    }

    /// Everything before the last dot: the enclosing type or the package.
    pub fn enclosing_type_or_package(&self) -> Option<&str> {
        self.as_named()
            .and_then(|name| name.rfind('.').map(|dot| &name[..dot]))
    }

    pub fn nested_type(&self, name: &str) -> ProtoType {
        debug_assert!(self.is_named(), "scalars and maps have no nested types");
        ProtoType::Named(format!("{self}.{name}"))
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtoType::Scalar(scalar) => f.write_str(scalar.name()),
            ProtoType::Map { key, value } => write!(f, "map<{}, {}>", key.name(), value),
            ProtoType::Named(name) => f.write_str(name),
        }
    }
}

impl TryFrom<String> for ProtoType {
    type Error = ProtoTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProtoType::parse(&value)
    }
}

impl From<ProtoType> for String {
    fn from(value: ProtoType) -> Self {
        value.to_string()
    }
}

// ============================================================================
// ProtoMember
// ============================================================================

/// `TYPE#MEMBER`. Extension members use the extension's qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtoMember {
    ty: ProtoType,
    member: String,
}

impl ProtoMember {
    pub fn new(ty: ProtoType, member: impl Into<String>) -> ProtoMember {
        debug_assert!(ty.is_named(), "members live on declared types");
        ProtoMember {
            ty,
            member: member.into(),
        }
    }

    pub fn try_new(ty: ProtoType, member: impl Into<String>) -> Result<ProtoMember, ProtoTypeError> {
        if !ty.is_named() {
            return Err(ProtoTypeError::MemberOnScalar(ty.to_string()));
        }
        Ok(ProtoMember::new(ty, member))
    }

    pub fn parse(text: &str) -> Result<ProtoMember, ProtoTypeError> {
        let (ty, member) = text
            .split_once('#')
            .ok_or_else(|| ProtoTypeError::MalformedMember(text.to_string()))?;
        if member.is_empty() {
            return Err(ProtoTypeError::MalformedMember(text.to_string()));
        }
        ProtoMember::try_new(ProtoType::parse(ty)?, member)
    }

    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    /// Last segment of the member name (unqualified extension name).
    pub fn simple_name(&self) -> &str {
        match self.member.rfind('.') {
            Some(dot) => &self.member[dot + 1..],
            None => &self.member,
        }
    }

    pub fn is_extension(&self) -> bool {
        self.member.contains('.')
    }
}

impl fmt::Display for ProtoMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ty, self.member)
    }
}

impl TryFrom<String> for ProtoMember {
    type Error = ProtoTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ProtoMember::parse(&value)
    }
}

impl From<ProtoMember> for String {
    fn from(value: ProtoMember) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_names_canonicalize() {
        assert_eq!(ProtoType::named("int32"), ProtoType::INT32);
        assert_eq!(ProtoType::parse("string").expect("parse"), ProtoType::STRING);
        assert!(ProtoType::parse("a.b.C").expect("parse").is_named());
    }

    #[test]
    fn maps_print_and_reject_bad_keys() {
        let map = ProtoType::parse("map<string, a.B>").expect("parse");
        assert_eq!(map.to_string(), "map<string, a.B>");
        assert_eq!(map.key_type(), Some(ProtoType::STRING));
        assert_eq!(map.value_type(), Some(&ProtoType::named("a.B")));

        let err = ProtoType::parse("map<bytes, string>").expect_err("bytes key");
        assert!(err.to_string().contains("map key"));
        assert!(ProtoType::parse("map<a.B, string>").is_err());
        assert!(ProtoType::parse("map<string, map<string, string>>").is_err());
    }

    #[test]
    fn enclosing_and_simple_names() {
        let ty = ProtoType::named("a.b.Outer.Inner");
        assert_eq!(ty.simple_name(), "Inner");
        assert_eq!(ty.enclosing_type_or_package(), Some("a.b.Outer"));
        assert_eq!(ProtoType::named("Top").enclosing_type_or_package(), None);
        assert_eq!(ty.nested_type("Leaf").to_string(), "a.b.Outer.Inner.Leaf");
    }

    #[test]
    fn members_parse_and_print() {
        let member = ProtoMember::parse("a.B#pkg.ext").expect("parse");
        assert_eq!(member.ty(), &ProtoType::named("a.B"));
        assert_eq!(member.member(), "pkg.ext");
        assert_eq!(member.simple_name(), "ext");
        assert!(member.is_extension());
        assert_eq!(member.to_string(), "a.B#pkg.ext");

        assert!(ProtoMember::parse("int32#x").is_err());
        assert!(ProtoMember::parse("a.B").is_err());
    }

    #[test]
    fn identifiers_serialize_as_strings() {
        let ty = ProtoType::parse("map<int64, a.B>").expect("parse");
        let json = serde_json::to_string(&ty).expect("serialize");
        assert_eq!(json, "\"map<int64, a.B>\"");
        let back: ProtoType = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ty);
    }
}
