use crate::descriptor::{METHOD_OPTIONS, SERVICE_OPTIONS};
use crate::element::{RpcElement, ServiceElement};
use crate::location::Location;
use crate::mark_set::MarkSet;
use crate::model::Options;
use crate::proto_type::{ProtoMember, ProtoType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStreaming {
    Unary,
    ClientStreaming,
    ServerStreaming,
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rpc {
    location: Location,
    name: String,
    documentation: String,
    request_type_element: String,
    response_type_element: String,
    request_streaming: bool,
    response_streaming: bool,
    pub(crate) request_type: Option<ProtoType>,
    pub(crate) response_type: Option<ProtoType>,
    pub(crate) options: Options,
}

impl Rpc {
    pub fn from_element(element: &RpcElement) -> Rpc {
        Rpc {
            location: element.location.clone(),
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            request_type_element: element.request_type.clone(),
            response_type_element: element.response_type.clone(),
            request_streaming: element.request_streaming,
            response_streaming: element.response_streaming,
            request_type: None,
            response_type: None,
            options: Options::new(METHOD_OPTIONS, element.options.clone()),
        }
    }

    pub fn to_element(&self) -> RpcElement {
        RpcElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            request_type: self.request_type_element.clone(),
            response_type: self.response_type_element.clone(),
            request_streaming: self.request_streaming,
            response_streaming: self.response_streaming,
            options: self.options.to_elements(),
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

    pub fn request_type_element(&self) -> &str {
        &self.request_type_element
    }

    pub fn response_type_element(&self) -> &str {
        &self.response_type_element
    }

    /// Resolved request message; `None` until linked.
    pub fn request_type(&self) -> Option<&ProtoType> {
        self.request_type.as_ref()
    }

    pub fn response_type(&self) -> Option<&ProtoType> {
        self.response_type.as_ref()
    }

    pub fn streaming(&self) -> RpcStreaming {
        match (self.request_streaming, self.response_streaming) {
            (false, false) => RpcStreaming::Unary,
            (true, false) => RpcStreaming::ClientStreaming,
            (false, true) => RpcStreaming::ServerStreaming,
            (true, true) => RpcStreaming::Bidirectional,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn link(&mut self, request_type: ProtoType, response_type: ProtoType) {
        self.request_type = Some(request_type);
        self.response_type = Some(response_type);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    ty: ProtoType,
    location: Location,
    name: String,
    documentation: String,
    pub(crate) rpcs: Vec<Rpc>,
    pub(crate) options: Options,
}

impl Service {
    pub fn from_element(ty: ProtoType, element: &ServiceElement) -> Service {
        Service {
            ty,
            location: element.location.clone(),
            name: element.name.clone(),
            documentation: element.documentation.clone(),
            rpcs: element.rpcs.iter().map(Rpc::from_element).collect(),
            options: Options::new(SERVICE_OPTIONS, element.options.clone()),
        }
    }

    pub fn to_element(&self) -> ServiceElement {
        ServiceElement {
            location: self.location.clone(),
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            rpcs: self.rpcs.iter().map(Rpc::to_element).collect(),
            options: self.options.to_elements(),
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

    pub fn rpcs(&self) -> &[Rpc] {
        &self.rpcs
    }

    pub fn rpc(&self, name: &str) -> Option<&Rpc> {
        self.rpcs.iter().find(|r| r.name == name)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Option<Service> {
        if !marks.contains_type(&self.ty) {
            return None;
        }
        let mut rpcs = Vec::new();
        for rpc in &self.rpcs {
            let member = ProtoMember::new(self.ty.clone(), rpc.name.clone());
            if !marks.contains_member(&member) {
                continue;
            }
            let (Some(request), Some(response)) = (&rpc.request_type, &rpc.response_type) else {
                continue;
            };
            if !marks.retains_reference(&member, request) || !marks.retains_reference(&member, response) {
                continue;
            }
            rpcs.push(Rpc {
                options: rpc.options.retain_all(marks),
                ..rpc.clone()
            });
        }
        Some(Service {
            rpcs,
            options: self.options.retain_all(marks),
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_kinds() {
        let unary = Rpc::from_element(&RpcElement::new("Get", "Req", "Resp"));
        assert_eq!(unary.streaming(), RpcStreaming::Unary);
        let bidi = Rpc::from_element(&RpcElement::new("Chat", "Msg", "Msg").streaming(true, true));
        assert_eq!(bidi.streaming(), RpcStreaming::Bidirectional);
        assert!(bidi.request_type().is_none());
    }
}
