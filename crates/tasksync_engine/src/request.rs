//! Request descriptors and the builder that produces them.

use crate::config::SyncConfig;
use crate::operation::{Operation, OperationKind};
use std::fmt;
use std::time::Duration;
use tasksync_protocol::{ElementRequest, ListRequest, ProtocolResult, Revision};

/// Header carrying the client's last known revision.
pub const REVISION_HEADER: &str = "X-Last-Known-Revision";

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Header describing the body encoding.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a transport needs to send one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Operation this request belongs to.
    pub kind: OperationKind,
    /// HTTP method.
    pub method: Method,
    /// Path relative to the service base URL.
    pub path: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Revision embedded in the request, for mutating operations.
    pub known_revision: Option<Revision>,
    /// Timeout for this attempt.
    pub timeout: Duration,
}

impl RequestDescriptor {
    /// Returns the value of a header, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Builds the request for one attempt of an operation.
///
/// Implementations must be free of side effects: the engine calls the builder
/// again for every retry so the latest revision is embedded.
pub trait RequestBuilder: Send + Sync + 'static {
    /// Builds a request for `operation` given the revision currently known.
    fn build_request(
        &self,
        operation: &Operation,
        known_revision: Revision,
    ) -> ProtocolResult<RequestDescriptor>;
}

/// Builder for the REST list service.
///
/// | operation | request |
/// |---|---|
/// | fetch list | `GET /list` |
/// | push list | `PATCH /list` |
/// | create item | `POST /list` |
/// | read item | `GET /list/{id}` |
/// | update item | `PUT /list/{id}` |
/// | delete item | `DELETE /list/{id}` |
#[derive(Debug, Clone)]
pub struct RestRequestBuilder {
    token: Option<String>,
    timeout: Duration,
}

impl RestRequestBuilder {
    /// Creates a builder with the given token and per-attempt timeout.
    pub fn new(token: Option<String>, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    /// Creates a builder from the engine configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.token.clone(), config.request_timeout)
    }
}

impl RequestBuilder for RestRequestBuilder {
    fn build_request(
        &self,
        operation: &Operation,
        known_revision: Revision,
    ) -> ProtocolResult<RequestDescriptor> {
        let (method, path, body) = match operation {
            Operation::FetchList => (Method::Get, "/list".to_string(), None),
            Operation::PushList { items } => (
                Method::Patch,
                "/list".to_string(),
                Some(ListRequest::new(items.clone()).encode()?),
            ),
            Operation::CreateItem { item } => (
                Method::Post,
                "/list".to_string(),
                Some(ElementRequest::new(item.clone()).encode()?),
            ),
            Operation::ReadItem { id } => {
                (Method::Get, format!("/list/{}", id.path_segment()?), None)
            }
            Operation::UpdateItem { item } => (
                Method::Put,
                format!("/list/{}", item.id.path_segment()?),
                Some(ElementRequest::new(item.clone()).encode()?),
            ),
            Operation::DeleteItem { id } => (
                Method::Delete,
                format!("/list/{}", id.path_segment()?),
                None,
            ),
        };

        let kind = operation.kind();
        let known_revision = kind.sends_revision().then_some(known_revision);

        let mut headers = Vec::new();
        if let Some(token) = &self.token {
            headers.push((AUTHORIZATION_HEADER.to_string(), format!("Bearer {}", token)));
        }
        if let Some(revision) = known_revision {
            headers.push((REVISION_HEADER.to_string(), revision.to_string()));
        }
        if body.is_some() {
            headers.push((CONTENT_TYPE_HEADER.to_string(), "application/json".to_string()));
        }

        Ok(RequestDescriptor {
            kind,
            method,
            path,
            headers,
            body,
            known_revision,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_protocol::{ItemId, TodoItem};

    fn builder() -> RestRequestBuilder {
        RestRequestBuilder::new(Some("secret".into()), Duration::from_secs(10))
    }

    #[test]
    fn fetch_list_has_no_revision() {
        let request = builder()
            .build_request(&Operation::FetchList, Revision::new(9))
            .unwrap();

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "/list");
        assert_eq!(request.known_revision, None);
        assert_eq!(request.header(REVISION_HEADER), None);
        assert_eq!(request.header("authorization"), Some("Bearer secret"));
        assert!(request.body.is_none());
    }

    #[test]
    fn unsafe_item_id_is_rejected() {
        for operation in [
            Operation::ReadItem { id: "a/b".into() },
            Operation::DeleteItem { id: "".into() },
            Operation::UpdateItem {
                item: TodoItem {
                    id: ItemId::new("x?y"),
                    ..TodoItem::new("t", "d")
                },
            },
        ] {
            assert!(matches!(
                builder().build_request(&operation, Revision::new(1)),
                Err(tasksync_protocol::ProtocolError::InvalidItemId(_))
            ));
        }
    }

    #[test]
    fn delete_embeds_known_revision() {
        let request = builder()
            .build_request(
                &Operation::DeleteItem { id: ItemId::new("x") },
                Revision::new(5),
            )
            .unwrap();

        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "/list/x");
        assert_eq!(request.known_revision, Some(Revision::new(5)));
        assert_eq!(request.header("x-last-known-revision"), Some("5"));
    }

    #[test]
    fn update_carries_element_body() {
        let item = TodoItem::new("water plants", "phone");
        let request = builder()
            .build_request(&Operation::UpdateItem { item: item.clone() }, Revision::new(2))
            .unwrap();

        assert_eq!(request.method, Method::Put);
        assert_eq!(request.path, format!("/list/{}", item.id));
        let body = ElementRequest::decode(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.element, item);
        assert_eq!(request.header(CONTENT_TYPE_HEADER), Some("application/json"));
    }

    #[test]
    fn no_token_no_auth_header() {
        let builder = RestRequestBuilder::new(None, Duration::from_secs(1));
        let request = builder
            .build_request(&Operation::PushList { items: vec![] }, Revision::INITIAL)
            .unwrap();

        assert_eq!(request.method, Method::Patch);
        assert_eq!(request.header(AUTHORIZATION_HEADER), None);
        assert_eq!(request.known_revision, Some(Revision::INITIAL));
    }
}
