//! The built-in `google/protobuf/descriptor.proto`.
//!
//! Options are declared as fields of the `*Options` messages below, so the
//! linker needs this file even when no source imports it. Loaders fall back
//! to this trimmed copy when the caller does not supply their own.

use crate::element::{
    EnumElement, FieldElement, MessageElement, OptionElement, OptionValue, ProtoFileElement, Syntax,
};
use crate::proto_type::ProtoType;

pub const DESCRIPTOR_PROTO: &str = "google/protobuf/descriptor.proto";
pub const DESCRIPTOR_PACKAGE: &str = "google.protobuf";

pub const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
pub const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
pub const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
pub const ONEOF_OPTIONS: &str = "google.protobuf.OneofOptions";
pub const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
pub const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
pub const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
pub const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

pub const OPTION_TYPES: [&str; 8] = [
    FILE_OPTIONS,
    MESSAGE_OPTIONS,
    FIELD_OPTIONS,
    ONEOF_OPTIONS,
    ENUM_OPTIONS,
    ENUM_VALUE_OPTIONS,
    SERVICE_OPTIONS,
    METHOD_OPTIONS,
];

/// Field options the pruner and linker read directly.
pub const SINCE_OPTION: &str = "wire.since";
pub const UNTIL_OPTION: &str = "wire.until";
pub const WIRE_PACKAGE_OPTION: &str = "wire.wire_package";

pub fn is_option_type(ty: &ProtoType) -> bool {
    ty.as_named().is_some_and(|name| OPTION_TYPES.contains(&name))
}

/// Reserved for protobuf implementations; never valid as a field tag.
pub const RESERVED_TAGS: std::ops::RangeInclusive<i32> = 19000..=19999;
pub const MAX_TAG: i32 = 536_870_911;

pub fn is_valid_tag(tag: i32) -> bool {
    (1..=MAX_TAG).contains(&tag) && !RESERVED_TAGS.contains(&tag)
}

fn options_message(name: &str, fields: Vec<FieldElement>) -> MessageElement {
    let mut message = MessageElement::new(name)
        .field(FieldElement::optional("bool", "deprecated", 3).default_value("false"))
        .field(FieldElement::repeated("UninterpretedOption", "uninterpreted_option", 999))
        .extension_range(1000, MAX_TAG);
    message.fields.extend(fields);
    message
}

pub fn descriptor_proto() -> ProtoFileElement {
    ProtoFileElement::new(DESCRIPTOR_PROTO)
        .package(DESCRIPTOR_PACKAGE)
        .syntax(Syntax::Proto2)
        .option(OptionElement::new("java_package", OptionValue::string("com.google.protobuf")))
        .message(options_message(
            "FileOptions",
            vec![
                FieldElement::optional("string", "java_package", 1),
                FieldElement::optional("string", "java_outer_classname", 8),
                FieldElement::optional("bool", "java_multiple_files", 10),
                FieldElement::optional("string", "go_package", 11),
                FieldElement::optional("OptimizeMode", "optimize_for", 9),
                FieldElement::optional("bool", "cc_enable_arenas", 31),
                FieldElement::optional("string", "objc_class_prefix", 36),
                FieldElement::optional("string", "csharp_namespace", 37),
                FieldElement::optional("string", "swift_prefix", 39),
                FieldElement::optional("string", "php_namespace", 41),
                FieldElement::optional("string", "ruby_package", 45),
            ],
        ))
        .enum_type(
            EnumElement::new("OptimizeMode")
                .constant("SPEED", 1)
                .constant("CODE_SIZE", 2)
                .constant("LITE_RUNTIME", 3),
        )
        .message(options_message(
            "MessageOptions",
            vec![
                FieldElement::optional("bool", "message_set_wire_format", 1),
                FieldElement::optional("bool", "no_standard_descriptor_accessor", 2),
                FieldElement::optional("bool", "map_entry", 7),
            ],
        ))
        .message(
            options_message(
                "FieldOptions",
                vec![
                    FieldElement::optional("CType", "ctype", 1),
                    FieldElement::optional("bool", "packed", 2),
                    FieldElement::optional("JSType", "jstype", 6),
                    FieldElement::optional("bool", "lazy", 5),
                    FieldElement::optional("bool", "weak", 10),
                    FieldElement::optional("bool", "debug_redact", 16),
                ],
            )
            .nested_enum(
                EnumElement::new("CType")
                    .constant("STRING", 0)
                    .constant("CORD", 1)
                    .constant("STRING_PIECE", 2),
            )
            .nested_enum(
                EnumElement::new("JSType")
                    .constant("JS_NORMAL", 0)
                    .constant("JS_STRING", 1)
                    .constant("JS_NUMBER", 2),
            ),
        )
        .message(options_message("OneofOptions", vec![]))
        .message(options_message(
            "EnumOptions",
            vec![FieldElement::optional("bool", "allow_alias", 2)],
        ))
        .message(options_message(
            "EnumValueOptions",
            vec![FieldElement::optional("bool", "debug_redact", 3)],
        ))
        .message(options_message("ServiceOptions", vec![]))
        .message(
            options_message(
                "MethodOptions",
                vec![FieldElement::optional("IdempotencyLevel", "idempotency_level", 34)],
            )
            .nested_enum(
                EnumElement::new("IdempotencyLevel")
                    .constant("IDEMPOTENCY_UNKNOWN", 0)
                    .constant("NO_SIDE_EFFECTS", 1)
                    .constant("IDEMPOTENT", 2),
            ),
        )
        .message(
            MessageElement::new("UninterpretedOption")
                .field(FieldElement::repeated("NamePart", "name", 2))
                .field(FieldElement::optional("string", "identifier_value", 3))
                .field(FieldElement::optional("uint64", "positive_int_value", 4))
                .field(FieldElement::optional("int64", "negative_int_value", 5))
                .field(FieldElement::optional("double", "double_value", 6))
                .field(FieldElement::optional("bytes", "string_value", 7))
                .field(FieldElement::optional("string", "aggregate_value", 8))
                .nested_message(
                    MessageElement::new("NamePart")
                        .field(FieldElement::required("string", "name_part", 1))
                        .field(FieldElement::required("bool", "is_extension", 2)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_every_option_type() {
        let file = descriptor_proto();
        for option_type in OPTION_TYPES {
            let simple = option_type.rsplit('.').next().unwrap_or(option_type);
            assert!(
                file.types.iter().any(|t| t.name() == simple),
                "missing {option_type}"
            );
        }
    }

    #[test]
    fn tag_validity() {
        assert!(is_valid_tag(1));
        assert!(is_valid_tag(MAX_TAG));
        assert!(!is_valid_tag(0));
        assert!(!is_valid_tag(19_500));
        assert!(!is_valid_tag(MAX_TAG + 1));
    }
}
