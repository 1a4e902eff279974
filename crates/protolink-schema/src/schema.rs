//! A fully linked set of files.
//!
//! Built by [`crate::Linker::link`] and by [`Schema::prune`]. Files are kept
//! sorted by path; lookups by type, service and extension member go through
//! indices built once at construction.

use std::collections::HashMap;

use tracing::debug;

use crate::element::ProtoFileElement;
use crate::error::TopologicalOrderError;
use crate::graph::DirectedAcyclicGraph;
use crate::model::{EnumType, Field, MessageType, ProtoFile, Service, Type};
use crate::proto_type::{ProtoMember, ProtoType};
use crate::pruner::Pruner;
use crate::rules::PruningRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TypeIndex {
    file: usize,
    path_start: usize,
    path_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExtensionIndex {
    file: usize,
    extend: usize,
    field: usize,
}

#[derive(Debug, Clone)]
pub struct Schema {
    files: Vec<ProtoFile>,
    /// Flattened type paths; `TypeIndex` slices into this.
    paths: Vec<usize>,
    types: HashMap<ProtoType, TypeIndex>,
    services: HashMap<ProtoType, (usize, usize)>,
    extensions: HashMap<ProtoMember, ExtensionIndex>,
    file_paths: HashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.files == other.files
    }
}

impl Schema {
    /// Sorts files by path, attaches copies of extension fields to the
    /// messages they extend, and indexes every declaration.
    pub fn new(mut files: Vec<ProtoFile>) -> Schema {
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut paths = Vec::new();
        let mut types = HashMap::new();
        let mut services = HashMap::new();
        let mut extensions = HashMap::new();
        let mut file_paths = HashMap::new();

        for (f, file) in files.iter().enumerate() {
            file_paths.insert(file.path().to_string(), f);
            for path in file.type_paths() {
                let Some(ty) = file.type_at(&path) else {
                    continue;
                };
                types.insert(
                    ty.ty().clone(),
                    TypeIndex {
                        file: f,
                        path_start: paths.len(),
                        path_len: path.len(),
                    },
                );
                paths.extend(path);
            }
            for (s, service) in file.services.iter().enumerate() {
                services.insert(service.ty().clone(), (f, s));
            }
            for (e, extend) in file.extends.iter().enumerate() {
                let Some(target) = &extend.ty else {
                    continue;
                };
                for (i, field) in extend.fields.iter().enumerate() {
                    extensions.insert(
                        field.member(target),
                        ExtensionIndex {
                            file: f,
                            extend: e,
                            field: i,
                        },
                    );
                }
            }
        }

        let mut schema = Schema {
            files,
            paths,
            types,
            services,
            extensions,
            file_paths,
        };
        schema.attach_extension_fields();
        debug!(
            files = schema.files.len(),
            types = schema.types.len(),
            services = schema.services.len(),
            "assembled schema"
        );
        schema
    }

    fn attach_extension_fields(&mut self) {
        for file in &mut self.files {
            for path in file.type_paths() {
                if let Some(message) = file.type_at_mut(&path).and_then(Type::as_message_mut) {
                    message.extension_fields.clear();
                }
            }
        }

        let mut attachments: Vec<(ProtoType, Field)> = Vec::new();
        for file in &self.files {
            for extend in &file.extends {
                if let Some(target) = &extend.ty {
                    attachments.extend(extend.fields.iter().map(|f| (target.clone(), f.clone())));
                }
            }
        }
        for (target, field) in attachments {
            let Some(index) = self.types.get(&target).copied() else {
                continue;
            };
            let path = self.paths[index.path_start..index.path_start + index.path_len].to_vec();
            if let Some(message) = self.files[index.file]
                .type_at_mut(&path)
                .and_then(Type::as_message_mut)
            {
                message.extension_fields.push(field);
            }
        }
    }

    pub fn files(&self) -> &[ProtoFile] {
        &self.files
    }

    pub fn proto_file(&self, path: &str) -> Option<&ProtoFile> {
        self.file_paths.get(path).map(|&i| &self.files[i])
    }

    pub fn get_type(&self, ty: &ProtoType) -> Option<&Type> {
        let index = self.types.get(ty)?;
        let path = &self.paths[index.path_start..index.path_start + index.path_len];
        self.files[index.file].type_at(path)
    }

    pub fn get_type_named(&self, name: &str) -> Option<&Type> {
        self.get_type(&ProtoType::named(name))
    }

    pub fn get_message(&self, name: &str) -> Option<&MessageType> {
        self.get_type_named(name).and_then(Type::as_message)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumType> {
        self.get_type_named(name).and_then(Type::as_enum)
    }

    pub fn get_service(&self, ty: &ProtoType) -> Option<&Service> {
        let &(file, service) = self.services.get(ty)?;
        self.files[file].services.get(service)
    }

    pub fn get_service_named(&self, name: &str) -> Option<&Service> {
        self.get_service(&ProtoType::named(name))
    }

    /// A declared, oneof or extension field.
    pub fn get_field(&self, member: &ProtoMember) -> Option<&Field> {
        self.get_type(member.ty())?
            .as_message()?
            .member_field(member.member())
    }

    pub fn proto_file_for_type(&self, ty: &ProtoType) -> Option<&ProtoFile> {
        if let Some(index) = self.types.get(ty) {
            return Some(&self.files[index.file]);
        }
        self.services.get(ty).map(|&(file, _)| &self.files[file])
    }

    /// The file declaring the extension field `member`.
    pub fn extension_file(&self, member: &ProtoMember) -> Option<&ProtoFile> {
        self.extensions.get(member).map(|index| &self.files[index.file])
    }

    pub(crate) fn extension_field(&self, member: &ProtoMember) -> Option<&Field> {
        let index = self.extensions.get(member)?;
        self.files[index.file]
            .extends
            .get(index.extend)?
            .fields
            .get(index.field)
    }

    /// Every type in every file, nested types included.
    pub fn types(&self) -> Vec<&Type> {
        self.files.iter().flat_map(ProtoFile::all_types).collect()
    }

    pub fn services(&self) -> Vec<&Service> {
        self.files.iter().flat_map(|f| f.services.iter()).collect()
    }

    fn import_graph(&self) -> DirectedAcyclicGraph<String> {
        DirectedAcyclicGraph::new(self.files.iter().map(|f| f.path().to_string()), |path: &String| {
            self.proto_file(path)
                .map(|f| {
                    f.all_imports()
                        .filter(|i| self.file_paths.contains_key(i.as_str()))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        })
    }

    /// Files ordered so that each comes after everything it imports.
    pub fn dependency_order(&self) -> Result<Vec<&ProtoFile>, TopologicalOrderError> {
        let order = self.import_graph().topological_order()?;
        Ok(order.iter().filter_map(|path| self.proto_file(path)).collect())
    }

    /// Groups of files connected through imports, by path.
    pub fn file_groups(&self) -> Vec<Vec<String>> {
        self.import_graph().disjoint_graphs()
    }

    pub fn to_elements(&self) -> Vec<ProtoFileElement> {
        self.files.iter().map(ProtoFile::to_element).collect()
    }

    /// A copy of this schema holding only what `rules` retains.
    pub fn prune(&self, rules: &mut PruningRules) -> Schema {
        Pruner::new(self, rules).prune()
    }
}
