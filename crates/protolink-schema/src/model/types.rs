use std::collections::HashSet;

use crate::element::{MessageElement, TypeElement};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::{EnumType, MessageType, Options};
use crate::proto_type::{ProtoMember, ProtoType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Message,
    Enum,
}

/// A message kept only because something nested inside it survived
/// pruning or was referenced from a dependency. It has no fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclosingType {
    ty: ProtoType,
    location: Location,
    name: String,
    documentation: String,
    pub(crate) nested_types: Vec<Type>,
}

impl EnclosingType {
    pub fn new(
        ty: ProtoType,
        location: Location,
        name: String,
        documentation: String,
        nested_types: Vec<Type>,
    ) -> EnclosingType {
        EnclosingType {
            ty,
            location,
            name,
            documentation,
            nested_types,
        }
    }

    pub fn ty(&self) -> &ProtoType {
        &self.ty
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Message(MessageType),
    Enum(EnumType),
    Enclosing(EnclosingType),
}

impl Type {
    pub fn from_element(package: Option<&str>, enclosing: Option<&ProtoType>, element: &TypeElement) -> Type {
        let ty = match (enclosing, package) {
            (Some(enclosing), _) => enclosing.nested_type(element.name()),
            (None, Some(package)) if !package.is_empty() => {
                ProtoType::named(format!("{package}.{}", element.name()))
            }
            (None, _) => ProtoType::named(element.name()),
        };
        match element {
            TypeElement::Message(message) => Type::Message(MessageType::from_element(package, ty, message)),
            TypeElement::Enum(enum_type) => Type::Enum(EnumType::from_element(ty, enum_type)),
        }
    }

    pub fn to_element(&self) -> TypeElement {
        match self {
            Type::Message(message) => TypeElement::Message(message.to_element()),
            Type::Enum(enum_type) => TypeElement::Enum(enum_type.to_element()),
            Type::Enclosing(enclosing) => TypeElement::Message(MessageElement {
                location: enclosing.location.clone(),
                name: enclosing.name.clone(),
                documentation: enclosing.documentation.clone(),
                nested_types: enclosing.nested_types.iter().map(Type::to_element).collect(),
                ..MessageElement::default()
            }),
        }
    }

    pub fn ty(&self) -> &ProtoType {
        match self {
            Type::Message(m) => m.ty(),
            Type::Enum(e) => e.ty(),
            Type::Enclosing(e) => &e.ty,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Type::Message(m) => m.name(),
            Type::Enum(e) => e.name(),
            Type::Enclosing(e) => &e.name,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Type::Message(m) => m.location(),
            Type::Enum(e) => e.location(),
            Type::Enclosing(e) => &e.location,
        }
    }

    pub fn documentation(&self) -> &str {
        match self {
            Type::Message(m) => m.documentation(),
            Type::Enum(e) => e.documentation(),
            Type::Enclosing(e) => &e.documentation,
        }
    }

    /// `None` for enclosing shells.
    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            Type::Message(_) => Some(TypeKind::Message),
            Type::Enum(_) => Some(TypeKind::Enum),
            Type::Enclosing(_) => None,
        }
    }

    pub fn options(&self) -> Option<&Options> {
        match self {
            Type::Message(m) => Some(m.options()),
            Type::Enum(e) => Some(e.options()),
            Type::Enclosing(_) => None,
        }
    }

    pub fn nested_types(&self) -> &[Type] {
        match self {
            Type::Message(m) => m.nested_types(),
            Type::Enum(_) => &[],
            Type::Enclosing(e) => &e.nested_types,
        }
    }

    pub(crate) fn nested_types_mut(&mut self) -> Option<&mut Vec<Type>> {
        match self {
            Type::Message(m) => Some(&mut m.nested_types),
            Type::Enum(_) => None,
            Type::Enclosing(e) => Some(&mut e.nested_types),
        }
    }

    pub fn as_message(&self) -> Option<&MessageType> {
        match self {
            Type::Message(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn as_message_mut(&mut self) -> Option<&mut MessageType> {
        match self {
            Type::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn options_mut(&mut self) -> Option<&mut Options> {
        match self {
            Type::Message(m) => Some(&mut m.options),
            Type::Enum(e) => Some(&mut e.options),
            Type::Enclosing(_) => None,
        }
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Option<Type> {
        match self {
            Type::Message(m) => m.retain_all(marks),
            Type::Enum(e) => e.retain_all(marks),
            Type::Enclosing(e) => {
                let nested: Vec<Type> = e.nested_types.iter().filter_map(|t| t.retain_all(marks)).collect();
                if nested.is_empty() {
                    return None;
                }
                Some(Type::Enclosing(EnclosingType {
                    nested_types: nested,
                    ..e.clone()
                }))
            }
        }
    }

    pub(crate) fn retain_linked(
        &self,
        requested_types: &HashSet<ProtoType>,
        requested_fields: &HashSet<ProtoMember>,
    ) -> Option<Type> {
        match self {
            Type::Message(m) => m.retain_linked(requested_types, requested_fields),
            Type::Enum(e) => e.retain_linked(requested_types),
            Type::Enclosing(e) => {
                let nested: Vec<Type> = e
                    .nested_types
                    .iter()
                    .filter_map(|t| t.retain_linked(requested_types, requested_fields))
                    .collect();
                if nested.is_empty() {
                    return None;
                }
                Some(Type::Enclosing(EnclosingType {
                    nested_types: nested,
                    ..e.clone()
                }))
            }
        }
    }
}
