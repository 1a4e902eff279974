use std::collections::HashSet;

use crate::descriptor::MESSAGE_OPTIONS;
use crate::element::{ExtensionsElement, MessageElement, ReservedElement, ReservedValue, TagRange};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::{EnclosingType, Field, OneOf, Options, Type};
use crate::proto_type::{ProtoMember, ProtoType};

// ============================================================================
// Reserved names/tags and extension ranges
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Reserved {
    location: Location,
    documentation: String,
    values: Vec<ReservedValue>,
}

impl Reserved {
    pub fn from_element(element: &ReservedElement) -> Reserved {
        Reserved {
            location: element.location.clone(),
            documentation: element.documentation.clone(),
            values: element.values.clone(),
        }
    }

    pub fn to_element(&self) -> ReservedElement {
        ReservedElement {
            location: self.location.clone(),
            documentation: self.documentation.clone(),
            values: self.values.clone(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn values(&self) -> &[ReservedValue] {
        &self.values
    }

    pub fn matches_tag(&self, tag: i32) -> bool {
        self.values.iter().any(|v| matches!(v, ReservedValue::Range(r) if r.contains(tag)))
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.values.iter().any(|v| matches!(v, ReservedValue::Name(n) if n == name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extensions {
    location: Location,
    documentation: String,
    values: Vec<TagRange>,
}

impl Extensions {
    pub fn from_element(element: &ExtensionsElement) -> Extensions {
        Extensions {
            location: element.location.clone(),
            documentation: element.documentation.clone(),
            values: element.values.clone(),
        }
    }

    pub fn to_element(&self) -> ExtensionsElement {
        ExtensionsElement {
            location: self.location.clone(),
            documentation: self.documentation.clone(),
            values: self.values.clone(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn values(&self) -> &[TagRange] {
        &self.values
    }

    pub fn contains(&self, tag: i32) -> bool {
        self.values.iter().any(|r| r.contains(tag))
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Addresses a field inside a message: declared directly or inside a oneof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldSlot {
    Declared(usize),
    OneOf(usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    ty: ProtoType,
    location: Location,
    name: String,
    documentation: String,
    pub(crate) declared_fields: Vec<Field>,
    /// Extension fields declared elsewhere that target this message. Filled
    /// in when the schema is assembled.
    pub(crate) extension_fields: Vec<Field>,
    pub(crate) one_ofs: Vec<OneOf>,
    pub(crate) nested_types: Vec<Type>,
    extensions_list: Vec<Extensions>,
    reserveds: Vec<Reserved>,
    pub(crate) options: Options,
}

impl MessageType {
    pub fn from_element(package: Option<&str>, ty: ProtoType, element: &MessageElement) -> MessageType {
        let nested_types = element
            .nested_types
            .iter()
            .map(|nested| Type::from_element(package, Some(&ty), nested))
            .collect();
        MessageType {
            location: element.location.clone(),
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            declared_fields: element
                .fields
                .iter()
                .map(|f| Field::from_element(package, f, false))
                .collect(),
            extension_fields: Vec::new(),
            one_ofs: element.one_ofs.iter().map(|o| OneOf::from_element(package, o)).collect(),
            nested_types,
            extensions_list: element.extensions.iter().map(Extensions::from_element).collect(),
            reserveds: element.reserveds.iter().map(Reserved::from_element).collect(),
            options: Options::new(MESSAGE_OPTIONS, element.options.clone()),
            ty,
        }
    }

    pub fn to_element(&self) -> MessageElement {
        MessageElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            nested_types: self.nested_types.iter().map(Type::to_element).collect(),
            options: self.options.to_elements(),
            reserveds: self.reserveds.iter().map(Reserved::to_element).collect(),
            fields: self.declared_fields.iter().map(Field::to_element).collect(),
            one_ofs: self.one_ofs.iter().map(OneOf::to_element).collect(),
            extensions: self.extensions_list.iter().map(Extensions::to_element).collect(),
        }
    }

    pub fn ty(&self) -> &ProtoType {
        &self.ty
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

    pub fn declared_fields(&self) -> &[Field] {
        &self.declared_fields
    }

    pub fn extension_fields(&self) -> &[Field] {
        &self.extension_fields
    }

    pub fn one_ofs(&self) -> &[OneOf] {
        &self.one_ofs
    }

    pub fn nested_types(&self) -> &[Type] {
        &self.nested_types
    }

    pub fn extensions(&self) -> &[Extensions] {
        &self.extensions_list
    }

    pub fn reserveds(&self) -> &[Reserved] {
        &self.reserveds
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Declared fields followed by oneof fields.
    pub fn fields(&self) -> Vec<&Field> {
        self.declared_fields
            .iter()
            .chain(self.one_ofs.iter().flat_map(|o| o.fields.iter()))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().into_iter().find(|f| f.name() == name)
    }

    pub fn field_by_tag(&self, tag: i32) -> Option<&Field> {
        self.fields().into_iter().find(|f| f.tag() == tag)
    }

    pub fn extension_field(&self, qualified_name: &str) -> Option<&Field> {
        self.extension_fields
            .iter()
            .find(|f| f.qualified_name() == qualified_name)
    }

    /// Declared, oneof or extension field by member name.
    pub fn member_field(&self, member: &str) -> Option<&Field> {
        self.field(member).or_else(|| self.extension_field(member))
    }

    pub fn is_deprecated(&self) -> bool {
        self.options.element_bool("deprecated").unwrap_or(false)
    }

    pub fn allows_extension_tag(&self, tag: i32) -> bool {
        self.extensions_list.iter().any(|e| e.contains(tag))
    }

    pub(crate) fn field_slots(&self) -> Vec<FieldSlot> {
        let declared = (0..self.declared_fields.len()).map(FieldSlot::Declared);
        let one_of = self
            .one_ofs
            .iter()
            .enumerate()
            .flat_map(|(o, one_of)| (0..one_of.fields.len()).map(move |f| FieldSlot::OneOf(o, f)));
        declared.chain(one_of).collect()
    }

    pub(crate) fn field_at(&self, slot: FieldSlot) -> Option<&Field> {
        match slot {
            FieldSlot::Declared(i) => self.declared_fields.get(i),
            FieldSlot::OneOf(o, f) => self.one_ofs.get(o).and_then(|one_of| one_of.fields.get(f)),
        }
    }

    pub(crate) fn field_at_mut(&mut self, slot: FieldSlot) -> Option<&mut Field> {
        match slot {
            FieldSlot::Declared(i) => self.declared_fields.get_mut(i),
            FieldSlot::OneOf(o, f) => self.one_ofs.get_mut(o).and_then(|one_of| one_of.fields.get_mut(f)),
        }
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Option<Type> {
        let nested: Vec<Type> = self.nested_types.iter().filter_map(|t| t.retain_all(marks)).collect();
        if !marks.contains_type(&self.ty) {
            return self.enclosing_shell(nested);
        }
        let declared_fields = self
            .declared_fields
            .iter()
            .filter_map(|f| f.retain_all(&self.ty, marks))
            .collect();
        let one_ofs = self
            .one_ofs
            .iter()
            .filter_map(|o| o.retain_all(&self.ty, marks))
            .collect();
        Some(Type::Message(MessageType {
            declared_fields,
            extension_fields: Vec::new(),
            one_ofs,
            nested_types: nested,
            options: self.options.retain_all(marks),
            ..self.clone()
        }))
    }

    pub(crate) fn retain_linked(
        &self,
        requested_types: &HashSet<ProtoType>,
        requested_fields: &HashSet<ProtoMember>,
    ) -> Option<Type> {
        let nested: Vec<Type> = self
            .nested_types
            .iter()
            .filter_map(|t| t.retain_linked(requested_types, requested_fields))
            .collect();
        if !requested_types.contains(&self.ty) {
            return self.enclosing_shell(nested);
        }
        Some(Type::Message(MessageType {
            declared_fields: self.declared_fields.iter().filter_map(Field::retain_linked).collect(),
            extension_fields: Vec::new(),
            one_ofs: self.one_ofs.iter().filter_map(OneOf::retain_linked).collect(),
            nested_types: nested,
            options: self.options.retain_linked(),
            ..self.clone()
        }))
    }

    fn enclosing_shell(&self, nested: Vec<Type>) -> Option<Type> {
        if nested.is_empty() {
            return None;
        }
        Some(Type::Enclosing(EnclosingType::new(
            self.ty.clone(),
            self.location.clone(),
            self.name.clone(),
            self.documentation.clone(),
            nested,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{FieldElement, OneOfElement};

    #[test]
    fn fields_include_oneof_members() {
        let element = MessageElement::new("M")
            .field(FieldElement::optional("int32", "a", 1))
            .one_of(OneOfElement::new("choice").field(FieldElement::plain("string", "b", 2)))
            .extension_range(100, 200)
            .reserved(ReservedValue::Name("old".to_string()));
        let message = MessageType::from_element(Some("p"), ProtoType::named("p.M"), &element);

        let names: Vec<&str> = message.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(message.field_by_tag(2).map(Field::name), Some("b"));
        assert_eq!(message.field_slots(), vec![FieldSlot::Declared(0), FieldSlot::OneOf(0, 0)]);
        assert!(message.allows_extension_tag(150));
        assert!(!message.allows_extension_tag(201));
        assert!(message.reserveds()[0].matches_name("old"));
        assert_eq!(message.to_element(), element);
    }
}
