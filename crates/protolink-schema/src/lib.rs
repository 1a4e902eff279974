//! Protolink: linking and pruning of protobuf-style schemas
//!
//! Takes parsed `.proto` files (the [`element`] tree), resolves every type
//! reference and option against the files they import, validates the result,
//! and produces an immutable [`Schema`]. A schema can then be pruned down to
//! what a set of roots needs.
//!
//! Key pieces:
//! 1. **Linker**: lazy, phase-latched linking. Dependencies are loaded only
//!    when something needs them and keep only what sources reference.
//! 2. **Validation**: tags, names, reserved values, imports and cycles,
//!    reported all at once with a path to the offending declaration.
//! 3. **Pruner**: mark-and-sweep over types and members driven by
//!    [`PruningRules`], followed by import minimization.
//!
//! ## Module Organization
//!
//! - `element`: input declarations as produced by a parser
//! - `model`: linked schema objects
//! - `linker`: resolution, option linking and validation
//! - `rules` / `mark_set` / `pruner`: pruning
//! - `graph` / `cycle`: graph algorithms and import cycle checks

pub mod cycle;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod error_collector;
pub mod graph;
pub mod linker;
pub mod loader;
pub mod location;
pub mod mark_set;
pub mod model;
pub mod proto_type;
pub mod pruner;
pub mod rules;
pub mod schema;
pub mod syntax_rules;

// Re-export key types
pub use cycle::{CycleChecker, FileImports};
pub use element::{
    EnumConstantElement, EnumElement, ExtendElement, ExtensionsElement, FieldElement, FieldLabel,
    MessageElement, OneOfElement, OptionElement, OptionValue, ProtoFileElement, ReservedElement,
    ReservedValue, RpcElement, ServiceElement, Syntax, TagRange, TypeElement,
};
pub use error::{LoadError, ProtoTypeError, RulesError, SchemaError, TopologicalOrderError};
pub use error_collector::{ErrorCollector, Frame};
pub use graph::{DagChecker, DirectedAcyclicGraph};
pub use linker::{Linker, LinkerOptions};
pub use loader::{Loader, MemoryLoader, RootedLoader};
pub use location::Location;
pub use mark_set::MarkSet;
pub use model::{
    EncodeMode, EnclosingType, EnumConstant, EnumType, Extend, Extensions, Field, LinkedValue,
    MessageType, OneOf, OptionEntry, Options, ProtoFile, Reserved, Rpc, RpcStreaming, Service, Type,
    TypeKind,
};
pub use proto_type::{ProtoMember, ProtoType, ScalarType};
pub use pruner::Pruner;
pub use rules::{
    compare_versions, EmittingRules, EmittingRulesBuilder, PruningRules, PruningRulesBuilder, PruningRulesConfig,
};
pub use schema::Schema;
pub use syntax_rules::SyntaxRules;
