use std::collections::HashSet;

use crate::descriptor::{ENUM_OPTIONS, ENUM_VALUE_OPTIONS};
use crate::element::{EnumConstantElement, EnumElement};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::{Options, Reserved, Type};
use crate::proto_type::{ProtoMember, ProtoType};

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstant {
    location: Location,
    name: String,
    tag: i32,
    documentation: String,
    pub(crate) options: Options,
}

impl EnumConstant {
    pub fn new(location: Location, name: impl Into<String>, tag: i32) -> EnumConstant {
        EnumConstant {
            location,
            name: name.into(),
            tag,
            documentation: String::new(),
            options: Options::new(ENUM_VALUE_OPTIONS, Vec::new()),
        }
    }

    pub fn from_element(element: &EnumConstantElement) -> EnumConstant {
        EnumConstant {
            location: element.location.clone(),
            name: element.name.clone(),
            tag: element.tag,
            documentation: element.documentation.clone(),
            options: Options::new(ENUM_VALUE_OPTIONS, element.options.clone()),
        }
    }

    pub fn to_element(&self) -> EnumConstantElement {
        EnumConstantElement {
            location: self.location.clone(),
            name: self.name.clone(),
            tag: self.tag,
            documentation: self.documentation.clone(),
            options: self.options.to_elements(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> i32 {
        self.tag
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_deprecated(&self) -> bool {
        self.options.element_bool("deprecated").unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    ty: ProtoType,
    location: Location,
    name: String,
    documentation: String,
    pub(crate) constants: Vec<EnumConstant>,
    reserveds: Vec<Reserved>,
    pub(crate) options: Options,
}

impl EnumType {
    pub fn from_element(ty: ProtoType, element: &EnumElement) -> EnumType {
        EnumType {
            ty,
            location: element.location.clone(),
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            constants: element.constants.iter().map(EnumConstant::from_element).collect(),
            reserveds: element.reserveds.iter().map(Reserved::from_element).collect(),
            options: Options::new(ENUM_OPTIONS, element.options.clone()),
        }
    }

    pub fn to_element(&self) -> EnumElement {
        EnumElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            options: self.options.to_elements(),
            constants: self.constants.iter().map(EnumConstant::to_element).collect(),
            reserveds: self.reserveds.iter().map(Reserved::to_element).collect(),
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

    pub fn constants(&self) -> &[EnumConstant] {
        &self.constants
    }

    pub fn reserveds(&self) -> &[Reserved] {
        &self.reserveds
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    pub fn constant_by_tag(&self, tag: i32) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.tag == tag)
    }

    pub fn allow_alias(&self) -> bool {
        self.options.element_bool("allow_alias").unwrap_or(false)
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Option<Type> {
        if !marks.contains_type(&self.ty) {
            return None;
        }
        let mut constants = Vec::new();
        for constant in &self.constants {
            if marks.contains_member(&ProtoMember::new(self.ty.clone(), constant.name.clone())) {
                constants.push(EnumConstant {
                    options: constant.options.retain_all(marks),
                    ..constant.clone()
                });
            }
        }
        Some(Type::Enum(EnumType {
            constants,
            options: self.options.retain_all(marks),
            ..self.clone()
        }))
    }

    pub(crate) fn retain_linked(&self, requested_types: &HashSet<ProtoType>) -> Option<Type> {
        if !requested_types.contains(&self.ty) {
            return None;
        }
        Some(Type::Enum(EnumType {
            constants: self
                .constants
                .iter()
                .map(|c| EnumConstant {
                    options: c.options.retain_linked(),
                    ..c.clone()
                })
                .collect(),
            options: self.options.retain_linked(),
            ..self.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{OptionElement, OptionValue};

    #[test]
    fn lookups_and_aliasing() {
        let element = EnumElement::new("E")
            .option(OptionElement::new("allow_alias", OptionValue::Boolean(true)))
            .constant("ZERO", 0)
            .constant("NONE", 0)
            .constant("ONE", 1);
        let enum_type = EnumType::from_element(ProtoType::named("p.E"), &element);
        assert!(enum_type.allow_alias());
        assert_eq!(enum_type.constant_by_tag(0).map(EnumConstant::name), Some("ZERO"));
        assert_eq!(enum_type.constant("ONE").map(EnumConstant::tag), Some(1));
        assert_eq!(enum_type.to_element(), element);
    }
}
