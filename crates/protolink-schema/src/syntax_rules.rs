//! Per-syntax rules: what proto2 and proto3 files may declare, and how their
//! fields are encoded.

use crate::descriptor::is_option_type;
use crate::element::{FieldLabel, Syntax};
use crate::model::{EncodeMode, EnumConstant, TypeKind};
use crate::proto_type::ProtoType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxRules {
    Proto2,
    Proto3,
}

impl SyntaxRules {
    /// Files without a `syntax` statement are proto2.
    pub fn get(syntax: Option<Syntax>) -> Self {
        match syntax {
            Some(Syntax::Proto3) => SyntaxRules::Proto3,
            Some(Syntax::Proto2) | None => SyntaxRules::Proto2,
        }
    }

    pub fn syntax(self) -> Syntax {
        match self {
            SyntaxRules::Proto2 => Syntax::Proto2,
            SyntaxRules::Proto3 => Syntax::Proto3,
        }
    }

    pub fn validate_default_value(self, has_default_value: bool) -> Option<String> {
        match self {
            SyntaxRules::Proto3 if has_default_value => {
                Some("user-defined default values are not permitted in proto3".to_string())
            }
            _ => None,
        }
    }

    pub fn validate_label(self, label: Option<FieldLabel>) -> Option<String> {
        match (self, label) {
            (SyntaxRules::Proto3, Some(FieldLabel::Required)) => {
                Some("required fields are not allowed in proto3".to_string())
            }
            _ => None,
        }
    }

    /// proto3 files may only extend the descriptor's option messages.
    pub fn can_extend(self, target: &ProtoType) -> bool {
        match self {
            SyntaxRules::Proto2 => true,
            SyntaxRules::Proto3 => is_option_type(target),
        }
    }

    pub fn validate_enum_constants(self, constants: &[EnumConstant]) -> Option<String> {
        match self {
            SyntaxRules::Proto3 if constants.first().map(EnumConstant::tag) != Some(0) => {
                Some("missing a zero value at the first element in proto3".to_string())
            }
            _ => None,
        }
    }

    pub fn is_packed_by_default(self) -> bool {
        matches!(self, SyntaxRules::Proto3)
    }

    pub fn json_names_must_be_unique(self) -> bool {
        matches!(self, SyntaxRules::Proto3)
    }

    pub fn encode_mode(
        self,
        ty: &ProtoType,
        kind: Option<TypeKind>,
        label: Option<FieldLabel>,
        packed: Option<bool>,
        in_one_of: bool,
    ) -> EncodeMode {
        if ty.is_map() {
            return EncodeMode::Map;
        }
        match label {
            Some(FieldLabel::Repeated) => {
                let packable = ty.as_scalar().is_some_and(|s| s.is_packable()) || kind == Some(TypeKind::Enum);
                if packable && packed.unwrap_or(self.is_packed_by_default()) {
                    EncodeMode::Packed
                } else {
                    EncodeMode::Repeated
                }
            }
            Some(FieldLabel::Required) => EncodeMode::Required,
            Some(FieldLabel::Optional) => EncodeMode::NullIfAbsent,
            None if in_one_of => EncodeMode::NullIfAbsent,
            None => match self {
                SyntaxRules::Proto2 => EncodeMode::NullIfAbsent,
                SyntaxRules::Proto3 if kind == Some(TypeKind::Message) => EncodeMode::NullIfAbsent,
                SyntaxRules::Proto3 => EncodeMode::OmitIdentity,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Location;

    #[test]
    fn proto3_restrictions() {
        let rules = SyntaxRules::get(Some(Syntax::Proto3));
        assert!(rules.validate_default_value(true).is_some());
        assert!(rules.validate_label(Some(FieldLabel::Required)).is_some());
        assert!(!rules.can_extend(&ProtoType::named("a.B")));
        assert!(rules.can_extend(&ProtoType::named("google.protobuf.FieldOptions")));

        let proto2 = SyntaxRules::get(None);
        assert!(proto2.validate_default_value(true).is_none());
        assert!(proto2.can_extend(&ProtoType::named("a.B")));
    }

    #[test]
    fn proto3_enums_start_at_zero() {
        let rules = SyntaxRules::Proto3;
        let one = EnumConstant::new(Location::default(), "ONE", 1);
        let zero = EnumConstant::new(Location::default(), "ZERO", 0);
        assert!(rules.validate_enum_constants(&[one.clone(), zero.clone()]).is_some());
        assert!(rules.validate_enum_constants(&[zero, one]).is_none());
        assert!(rules.validate_enum_constants(&[]).is_some());
        assert!(SyntaxRules::Proto2.validate_enum_constants(&[]).is_none());
    }

    #[test]
    fn encode_modes() {
        let p3 = SyntaxRules::Proto3;
        let p2 = SyntaxRules::Proto2;
        let repeated = Some(FieldLabel::Repeated);
        assert_eq!(p3.encode_mode(&ProtoType::INT32, None, repeated, None, false), EncodeMode::Packed);
        assert_eq!(p2.encode_mode(&ProtoType::INT32, None, repeated, None, false), EncodeMode::Repeated);
        assert_eq!(p2.encode_mode(&ProtoType::INT32, None, repeated, Some(true), false), EncodeMode::Packed);
        assert_eq!(p3.encode_mode(&ProtoType::STRING, None, repeated, None, false), EncodeMode::Repeated);
        assert_eq!(
            p3.encode_mode(&ProtoType::named("a.E"), Some(TypeKind::Enum), repeated, None, false),
            EncodeMode::Packed
        );
        assert_eq!(p3.encode_mode(&ProtoType::STRING, None, None, None, false), EncodeMode::OmitIdentity);
        assert_eq!(p3.encode_mode(&ProtoType::STRING, None, None, None, true), EncodeMode::NullIfAbsent);
        assert_eq!(
            p3.encode_mode(&ProtoType::named("a.M"), Some(TypeKind::Message), None, None, false),
            EncodeMode::NullIfAbsent
        );
        let map = ProtoType::map(ProtoType::STRING, ProtoType::INT32).expect("map");
        assert_eq!(p2.encode_mode(&map, None, None, None, false), EncodeMode::Map);
    }
}
