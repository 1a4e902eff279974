use std::collections::HashSet;

use crate::descriptor::FILE_OPTIONS;
use crate::element::{ExtendElement, ProtoFileElement, Syntax};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::{Field, FieldSlot, Options, Service, Type};
use crate::proto_type::{ProtoMember, ProtoType};
use crate::syntax_rules::SyntaxRules;

// ============================================================================
// Extend blocks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Extend {
    location: Location,
    documentation: String,
    name: String,
    /// The extended message; `None` until linked.
    pub(crate) ty: Option<ProtoType>,
    pub(crate) fields: Vec<Field>,
}

impl Extend {
    pub fn from_element(package: Option<&str>, element: &ExtendElement) -> Extend {
        Extend {
            location: element.location.clone(),
            documentation: element.documentation.clone(),
            name: element.name.clone(),
            ty: None,
            fields: element
                .fields
                .iter()
                .map(|f| Field::from_element(package, f, true))
                .collect(),
        }
    }

    pub fn to_element(&self) -> ExtendElement {
        ExtendElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            fields: self.fields.iter().map(Field::to_element).collect(),
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

    pub fn ty(&self) -> Option<&ProtoType> {
        self.ty.as_ref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Option<Extend> {
        let target = self.ty.as_ref()?;
        let fields: Vec<Field> = self.fields.iter().filter_map(|f| f.retain_all(target, marks)).collect();
        if fields.is_empty() {
            return None;
        }
        Some(Extend {
            fields,
            ..self.clone()
        })
    }

    fn retain_linked(&self, requested_fields: &HashSet<ProtoMember>) -> Option<Extend> {
        let target = self.ty.as_ref()?;
        let fields: Vec<Field> = self
            .fields
            .iter()
            .filter(|f| requested_fields.contains(&f.member(target)))
            .filter_map(Field::retain_linked)
            .collect();
        if fields.is_empty() {
            return None;
        }
        Some(Extend {
            fields,
            ..self.clone()
        })
    }
}

// ============================================================================
// Option sites
// ============================================================================

/// Addresses one declaration that carries options. Type paths index into
/// `types` and then nested types level by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionSite {
    File,
    Type(Vec<usize>),
    Field(Vec<usize>, FieldSlot),
    OneOf(Vec<usize>, usize),
    Constant(Vec<usize>, usize),
    Service(usize),
    Rpc(usize, usize),
    ExtendField(usize, usize),
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFile {
    location: Location,
    package_name: Option<String>,
    syntax: Option<Syntax>,
    pub(crate) imports: Vec<String>,
    pub(crate) public_imports: Vec<String>,
    pub(crate) weak_imports: Vec<String>,
    pub(crate) types: Vec<Type>,
    pub(crate) services: Vec<Service>,
    pub(crate) extends: Vec<Extend>,
    pub(crate) options: Options,
    pub(crate) java_package: Option<String>,
    pub(crate) wire_package: Option<String>,
}

impl ProtoFile {
    pub fn from_element(element: &ProtoFileElement) -> ProtoFile {
        let package = element.package_name.as_deref();
        ProtoFile {
            location: element.location.clone(),
            package_name: element.package_name.clone(),
            syntax: element.syntax,
            imports: element.imports.clone(),
            public_imports: element.public_imports.clone(),
            weak_imports: element.weak_imports.clone(),
            types: element
                .types
                .iter()
                .map(|t| Type::from_element(package, None, t))
                .collect(),
            services: element
                .services
                .iter()
                .map(|s| {
                    let ty = match package {
                        Some(package) if !package.is_empty() => ProtoType::named(format!("{package}.{}", s.name)),
                        _ => ProtoType::named(s.name.clone()),
                    };
                    Service::from_element(ty, s)
                })
                .collect(),
            extends: element
                .extend_declarations
                .iter()
                .map(|e| Extend::from_element(package, e))
                .collect(),
            options: Options::new(FILE_OPTIONS, element.options.clone()),
            java_package: None,
            wire_package: None,
        }
    }

    pub fn to_element(&self) -> ProtoFileElement {
        ProtoFileElement {
            location: self.location.clone(),
            package_name: self.package_name.clone(),
            syntax: self.syntax,
            imports: self.imports.clone(),
            public_imports: self.public_imports.clone(),
            weak_imports: self.weak_imports.clone(),
            types: self.types.iter().map(Type::to_element).collect(),
            services: self.services.iter().map(Service::to_element).collect(),
            extend_declarations: self.extends.iter().map(Extend::to_element).collect(),
            options: self.options.to_elements(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn path(&self) -> &str {
        &self.location.path
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    pub fn syntax(&self) -> Option<Syntax> {
        self.syntax
    }

    pub fn syntax_rules(&self) -> SyntaxRules {
        SyntaxRules::get(self.syntax)
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn public_imports(&self) -> &[String] {
        &self.public_imports
    }

    pub fn weak_imports(&self) -> &[String] {
        &self.weak_imports
    }

    /// Every import statement's target, in declaration kind order.
    pub fn all_imports(&self) -> impl Iterator<Item = &String> {
        self.imports
            .iter()
            .chain(&self.public_imports)
            .chain(&self.weak_imports)
    }

    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn extends(&self) -> &[Extend] {
        &self.extends
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// From the `java_package` file option, once file options are linked.
    pub fn java_package(&self) -> Option<&str> {
        self.java_package.as_deref()
    }

    pub fn wire_package(&self) -> Option<&str> {
        self.wire_package.as_deref()
    }

    pub fn go_package(&self) -> Option<&str> {
        self.options.element_str("go_package")
    }

    /// True if the file declares no types, services or extensions.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.services.is_empty() && self.extends.is_empty()
    }

    /// Paths of every type, nested ones included, in declaration pre-order.
    pub fn type_paths(&self) -> Vec<Vec<usize>> {
        let mut paths = Vec::new();
        let mut stack: Vec<Vec<usize>> = (0..self.types.len()).rev().map(|i| vec![i]).collect();
        while let Some(path) = stack.pop() {
            if let Some(ty) = self.type_at(&path) {
                for i in (0..ty.nested_types().len()).rev() {
                    let mut child = path.clone();
                    child.push(i);
                    stack.push(child);
                }
            }
            paths.push(path);
        }
        paths
    }

    /// Every type, nested ones included, in declaration pre-order.
    pub fn all_types(&self) -> Vec<&Type> {
        self.type_paths().iter().filter_map(|p| self.type_at(p)).collect()
    }

    pub fn type_at(&self, path: &[usize]) -> Option<&Type> {
        let (first, rest) = path.split_first()?;
        let mut ty = self.types.get(*first)?;
        for &i in rest {
            ty = ty.nested_types().get(i)?;
        }
        Some(ty)
    }

    pub(crate) fn type_at_mut(&mut self, path: &[usize]) -> Option<&mut Type> {
        let (first, rest) = path.split_first()?;
        let mut ty = self.types.get_mut(*first)?;
        for &i in rest {
            ty = ty.nested_types_mut()?.get_mut(i)?;
        }
        Some(ty)
    }

    pub(crate) fn option_sites(&self) -> Vec<OptionSite> {
        let mut sites = vec![OptionSite::File];
        for path in self.type_paths() {
            let Some(ty) = self.type_at(&path) else {
                continue;
            };
            match ty {
                Type::Message(message) => {
                    sites.push(OptionSite::Type(path.clone()));
                    for slot in message.field_slots() {
                        sites.push(OptionSite::Field(path.clone(), slot));
                    }
                    for o in 0..message.one_ofs.len() {
                        sites.push(OptionSite::OneOf(path.clone(), o));
                    }
                }
                Type::Enum(enum_type) => {
                    sites.push(OptionSite::Type(path.clone()));
                    for c in 0..enum_type.constants.len() {
                        sites.push(OptionSite::Constant(path.clone(), c));
                    }
                }
                Type::Enclosing(_) => {}
            }
        }
        for (s, service) in self.services.iter().enumerate() {
            sites.push(OptionSite::Service(s));
            for r in 0..service.rpcs.len() {
                sites.push(OptionSite::Rpc(s, r));
            }
        }
        for (e, extend) in self.extends.iter().enumerate() {
            for f in 0..extend.fields.len() {
                sites.push(OptionSite::ExtendField(e, f));
            }
        }
        sites
    }

    pub(crate) fn options_at(&self, site: &OptionSite) -> Option<&Options> {
        match site {
            OptionSite::File => Some(&self.options),
            OptionSite::Type(path) => self.type_at(path)?.options(),
            OptionSite::Field(path, slot) => Some(&self.type_at(path)?.as_message()?.field_at(*slot)?.options),
            OptionSite::OneOf(path, o) => Some(&self.type_at(path)?.as_message()?.one_ofs.get(*o)?.options),
            OptionSite::Constant(path, c) => Some(&self.type_at(path)?.as_enum()?.constants.get(*c)?.options),
            OptionSite::Service(s) => Some(&self.services.get(*s)?.options),
            OptionSite::Rpc(s, r) => Some(&self.services.get(*s)?.rpcs.get(*r)?.options),
            OptionSite::ExtendField(e, f) => Some(&self.extends.get(*e)?.fields.get(*f)?.options),
        }
    }

    pub(crate) fn options_at_mut(&mut self, site: &OptionSite) -> Option<&mut Options> {
        match site {
            OptionSite::File => Some(&mut self.options),
            OptionSite::Type(path) => self.type_at_mut(path)?.options_mut(),
            OptionSite::Field(path, slot) => Some(&mut self.type_at_mut(path)?.as_message_mut()?.field_at_mut(*slot)?.options),
            OptionSite::OneOf(path, o) => Some(&mut self.type_at_mut(path)?.as_message_mut()?.one_ofs.get_mut(*o)?.options),
            OptionSite::Constant(path, c) => match self.type_at_mut(path)? {
                Type::Enum(enum_type) => Some(&mut enum_type.constants.get_mut(*c)?.options),
                _ => None,
            },
            OptionSite::Service(s) => Some(&mut self.services.get_mut(*s)?.options),
            OptionSite::Rpc(s, r) => Some(&mut self.services.get_mut(*s)?.rpcs.get_mut(*r)?.options),
            OptionSite::ExtendField(e, f) => Some(&mut self.extends.get_mut(*e)?.fields.get_mut(*f)?.options),
        }
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> ProtoFile {
        let types = self.types.iter().filter_map(|t| t.retain_all(marks)).collect();
        let services = self.services.iter().filter_map(|s| s.retain_all(marks)).collect();
        let extends = self.extends.iter().filter_map(|e| e.retain_all(marks)).collect();
        ProtoFile {
            types,
            services,
            extends,
            options: self.options.retain_all(marks),
            ..self.clone()
        }
    }

    /// What a dependency file contributes to the linked schema: the types,
    /// nested shells and extension fields sources actually used.
    pub(crate) fn retain_linked(
        &self,
        requested_types: &HashSet<ProtoType>,
        requested_fields: &HashSet<ProtoMember>,
    ) -> ProtoFile {
        ProtoFile {
            types: self
                .types
                .iter()
                .filter_map(|t| t.retain_linked(requested_types, requested_fields))
                .collect(),
            services: Vec::new(),
            extends: self
                .extends
                .iter()
                .filter_map(|e| e.retain_linked(requested_fields))
                .collect(),
            options: self.options.retain_linked(),
            ..self.clone()
        }
    }

    pub(crate) fn with_imports(&self, imports: Vec<String>, public_imports: Vec<String>, weak_imports: Vec<String>) -> ProtoFile {
        ProtoFile {
            imports,
            public_imports,
            weak_imports,
            ..self.clone()
        }
    }
}
