//! Accumulates linking/validation errors with a declaration context.
//!
//! An [`ErrorCollector`] is a cheap handle: a shared error list plus an
//! immutable stack of [`Frame`]s. `at(frame)` returns a new handle one frame
//! deeper that reports into the same list, so callers can pass context down
//! without threading `&mut` state through every helper.
//!
//! Reported messages get one context line per frame, innermost first:
//!
//! ```text
//! unable to resolve Missing
//!   for field f (a.proto:4:3)
//!   in message a.M (a.proto:3:1)
//! ```
//!
//! File frames are dropped whenever a more specific frame is present.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::SchemaError;
use crate::location::Location;
use crate::proto_type::ProtoType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    File {
        path: String,
        package: Option<String>,
    },
    Message {
        ty: ProtoType,
        location: Location,
    },
    Enum {
        ty: ProtoType,
        location: Location,
    },
    Enclosing {
        ty: ProtoType,
        location: Location,
    },
    Service {
        ty: ProtoType,
        location: Location,
    },
    Rpc {
        name: String,
        location: Location,
    },
    /// `extension_package` is set for extension fields, whose names resolve
    /// relative to the declaring file's package.
    Field {
        name: String,
        location: Location,
        extension_package: Option<String>,
    },
    OneOf {
        name: String,
        location: Location,
    },
    EnumConstant {
        name: String,
        location: Location,
    },
    Extend {
        name: String,
        location: Location,
    },
    Extensions {
        location: Location,
    },
}

impl Frame {
    fn is_file(&self) -> bool {
        matches!(self, Frame::File { .. })
    }

    /// The dotted scope names resolve against, if this frame opens one.
    fn scope(&self) -> Option<String> {
        match self {
            Frame::Message { ty, .. }
            | Frame::Enum { ty, .. }
            | Frame::Enclosing { ty, .. }
            | Frame::Service { ty, .. } => Some(ty.to_string()),
            Frame::Field {
                extension_package: Some(package),
                ..
            } => Some(package.clone()),
            Frame::File { package, .. } => Some(package.clone().unwrap_or_default()),
            _ => None,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::File { path, .. } => write!(f, "file {path}"),
            Frame::Message { ty, location } => write!(f, "message {ty} ({location})"),
            Frame::Enum { ty, location } => write!(f, "enum {ty} ({location})"),
            Frame::Enclosing { ty, location } => write!(f, "message {ty} ({location})"),
            Frame::Service { ty, location } => write!(f, "service {ty} ({location})"),
            Frame::Rpc { name, location } => write!(f, "rpc {name} ({location})"),
            Frame::Field { name, location, .. } => write!(f, "field {name} ({location})"),
            Frame::OneOf { name, location } => write!(f, "oneof {name} ({location})"),
            Frame::EnumConstant { name, location } => write!(f, "constant {name} ({location})"),
            Frame::Extend { name, location } => write!(f, "extend {name} ({location})"),
            Frame::Extensions { location } => write!(f, "extensions ({location})"),
        }
    }
}

#[derive(Debug)]
struct ContextNode {
    frame: Frame,
    parent: Option<Rc<ContextNode>>,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    errors: Rc<RefCell<Vec<String>>>,
    context: Option<Rc<ContextNode>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle one frame deeper, sharing this collector's error list.
    pub fn at(&self, frame: Frame) -> Self {
        Self {
            errors: Rc::clone(&self.errors),
            context: Some(Rc::new(ContextNode {
                frame,
                parent: self.context.clone(),
            })),
        }
    }

    /// Innermost frame first.
    pub fn frames(&self) -> Vec<&Frame> {
        let mut frames = Vec::new();
        let mut node = self.context.as_deref();
        while let Some(current) = node {
            frames.push(&current.frame);
            node = current.parent.as_deref();
        }
        frames
    }

    /// The scope relative names are resolved in: the innermost enclosing
    /// type, else the package of an extension field or of the file.
    pub fn resolution_scope(&self) -> String {
        self.frames()
            .into_iter()
            .find_map(Frame::scope)
            .unwrap_or_default()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.frames().into_iter().find_map(|frame| match frame {
            Frame::File { path, .. } => Some(path.as_str()),
            _ => None,
        })
    }

    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        let frames = self.frames();
        let has_specific = frames.iter().any(|f| !f.is_file());
        let mut rendered = message;
        let mut first = true;
        for frame in frames {
            if has_specific && frame.is_file() {
                continue;
            }
            let prefix = if first { "for" } else { "in" };
            rendered.push_str(&format!("\n  {prefix} {frame}"));
            first = false;
        }
        self.errors.borrow_mut().push(rendered);
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn throw_if_non_empty(&self) -> Result<(), SchemaError> {
        let errors = self.errors.borrow();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::new(errors.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_frame() -> Frame {
        Frame::File {
            path: "a.proto".to_string(),
            package: Some("a".to_string()),
        }
    }

    #[test]
    fn nested_frames_render_innermost_first_without_file() {
        let root = ErrorCollector::new();
        let message = root.at(file_frame()).at(Frame::Message {
            ty: ProtoType::named("a.M"),
            location: Location::get("a.proto").at(3, 1),
        });
        message
            .at(Frame::Field {
                name: "f".to_string(),
                location: Location::get("a.proto").at(4, 3),
                extension_package: None,
            })
            .report("unable to resolve Missing");

        assert_eq!(
            root.errors(),
            vec!["unable to resolve Missing\n  for field f (a.proto:4:3)\n  in message a.M (a.proto:3:1)".to_string()]
        );
    }

    #[test]
    fn file_frame_is_kept_when_alone() {
        let root = ErrorCollector::new();
        root.at(file_frame()).report("unable to find b.proto");
        let err = root.throw_if_non_empty().expect_err("one error");
        assert_eq!(err.errors, vec!["unable to find b.proto\n  for file a.proto".to_string()]);
    }

    #[test]
    fn scopes_follow_the_innermost_type_or_extension_package() {
        let file = ErrorCollector::new().at(file_frame());
        assert_eq!(file.resolution_scope(), "a");

        let message = file.at(Frame::Message {
            ty: ProtoType::named("a.M"),
            location: Location::default(),
        });
        assert_eq!(message.resolution_scope(), "a.M");

        let extension = file
            .at(Frame::Extend {
                name: "Target".to_string(),
                location: Location::default(),
            })
            .at(Frame::Field {
                name: "ext".to_string(),
                location: Location::default(),
                extension_package: Some("a".to_string()),
            });
        assert_eq!(extension.resolution_scope(), "a");
        assert_eq!(extension.file_path(), Some("a.proto"));
    }

    #[test]
    fn empty_collector_does_not_throw() {
        assert!(ErrorCollector::new().throw_if_non_empty().is_ok());
    }
}
