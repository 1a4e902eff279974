//! The linked declaration model.
//!
//! Declarations are built from parsed elements with every name unresolved.
//! The linker fills in resolved types and linked options in place; nothing
//! outside this crate can observe a half-linked declaration because linking
//! consumes the linker and hands back a finished [`crate::Schema`].
//!
//! Each declaration can:
//! - round-trip to its element (`to_element`),
//! - be filtered by a [`crate::MarkSet`] (`retain_all`, used by the pruner),
//! - be reduced to what a dependency contributes (`retain_linked`).

mod enum_type;
mod field;
mod file;
mod message;
mod options;
mod service;
mod types;

pub use enum_type::{EnumConstant, EnumType};
pub use field::{EncodeMode, Field, OneOf};
pub use file::{Extend, ProtoFile};
pub use message::{Extensions, MessageType, Reserved};
pub use options::{LinkedValue, OptionEntry, Options};
pub use service::{Rpc, RpcStreaming, Service};
pub use types::{EnclosingType, Type, TypeKind};

pub(crate) use file::OptionSite;
pub(crate) use message::FieldSlot;
