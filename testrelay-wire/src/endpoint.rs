// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    FinishItemRequest, FinishLaunchRequest, PostLogRequest, StartItemRequest, StartLaunchRequest,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// HTTP method of an endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl Method {
    /// Returns the method as an HTTP verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an endpoint's parameters are encoded onto the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParameterEncoding {
    /// Url-encoded form body.
    Url,
    /// JSON body.
    Json,
    /// Multipart body carrying a JSON payload part and a file part.
    Multipart,
}

/// A binary attachment carried by a multipart endpoint.
#[derive(Clone, Debug)]
pub struct Attachment {
    /// File name reported to the backend.
    pub file_name: String,
    /// MIME content type of the payload.
    pub content_type: String,
    /// The payload itself.
    pub bytes: Vec<u8>,
}

/// A declarative description of one backend request.
///
/// The agent builds these; a transport turns them into actual HTTP calls.
/// Paths are relative to the transport's project-scoped base URL.
#[derive(Clone, Debug)]
pub struct EndpointRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the project base URL.
    pub relative_path: String,
    /// Extra headers beyond what the transport installs itself.
    pub headers: Vec<(String, String)>,
    /// Parameter encoding for the body.
    pub encoding: ParameterEncoding,
    /// The request body as a JSON value.
    pub body: Value,
    /// Optional binary attachment, only meaningful for multipart encoding.
    pub attachment: Option<Attachment>,
}

impl EndpointRequest {
    fn json(method: Method, relative_path: String, body: Value) -> Self {
        Self {
            method,
            relative_path,
            headers: Vec::new(),
            encoding: ParameterEncoding::Json,
            body,
            attachment: None,
        }
    }

    /// The start-launch endpoint: `POST launch`.
    pub fn start_launch(request: &StartLaunchRequest) -> Self {
        Self::json(Method::Post, "launch".to_owned(), body_of(request))
    }

    /// The start-item endpoint: `POST item`, or `POST item/{parent}` when the
    /// item is nested under an existing one.
    pub fn start_item(request: &StartItemRequest, parent_id: Option<&str>) -> Self {
        let relative_path = match parent_id {
            Some(parent_id) => format!("item/{parent_id}"),
            None => "item".to_owned(),
        };
        Self::json(Method::Post, relative_path, body_of(request))
    }

    /// The finish-item endpoint: `PUT item/{id}`.
    pub fn finish_item(item_id: &str, request: &FinishItemRequest) -> Self {
        Self::json(Method::Put, format!("item/{item_id}"), body_of(request))
    }

    /// The post-log endpoint: `POST log`.
    pub fn post_log(request: &PostLogRequest) -> Self {
        Self::json(Method::Post, "log".to_owned(), body_of(request))
    }

    /// The attachment variant of the post-log endpoint: `POST log` with a
    /// multipart body carrying the JSON payload and the file.
    pub fn post_attachment(request: &PostLogRequest, attachment: Attachment) -> Self {
        Self {
            method: Method::Post,
            relative_path: "log".to_owned(),
            headers: Vec::new(),
            encoding: ParameterEncoding::Multipart,
            body: body_of(request),
            attachment: Some(attachment),
        }
    }

    /// The finish-launch endpoint: `PUT launch/{id}/finish`.
    pub fn finish_launch(launch_id: &str, request: &FinishLaunchRequest) -> Self {
        Self::json(
            Method::Put,
            format!("launch/{launch_id}/finish"),
            body_of(request),
        )
    }
}

// Wire bodies are plain structs of strings, enums and timestamps; converting
// them to a JSON value cannot fail.
fn body_of<T: Serialize>(request: &T) -> Value {
    serde_json::to_value(request).expect("wire body serializes to JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ItemType, LogLevel, TestStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn start_item_path_includes_parent() {
        let request = StartItemRequest::new("suite", ItemType::Test, "launch-1");

        let root = EndpointRequest::start_item(&request, None);
        assert_eq!(root.relative_path, "item");
        assert_eq!(root.method, Method::Post);

        let nested = EndpointRequest::start_item(&request, Some("root-1"));
        assert_eq!(nested.relative_path, "item/root-1");
    }

    #[test]
    fn finish_endpoints_use_put() {
        let finish = EndpointRequest::finish_item("item-9", &FinishItemRequest::new(TestStatus::Passed));
        assert_eq!(finish.method, Method::Put);
        assert_eq!(finish.relative_path, "item/item-9");

        let finish = EndpointRequest::finish_launch("launch-3", &FinishLaunchRequest::new(TestStatus::Failed));
        assert_eq!(finish.method, Method::Put);
        assert_eq!(finish.relative_path, "launch/launch-3/finish");
        assert_eq!(finish.body["status"], "failed");
    }

    #[test]
    fn post_attachment_is_multipart() {
        let request = PostLogRequest::new("item-1", LogLevel::Info, "screenshot");
        let endpoint = EndpointRequest::post_attachment(
            &request,
            Attachment {
                file_name: "failure.png".to_owned(),
                content_type: "image/png".to_owned(),
                bytes: vec![0x89, 0x50],
            },
        );
        assert_eq!(endpoint.encoding, ParameterEncoding::Multipart);
        assert_eq!(endpoint.relative_path, "log");
        let attachment = endpoint.attachment.expect("attachment present");
        assert_eq!(attachment.file_name, "failure.png");
    }
}
