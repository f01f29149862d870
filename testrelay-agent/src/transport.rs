// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seam between the reporting engine and the backend's HTTP API.
//!
//! The engine only ever talks to a [`Transport`]: one call per endpoint
//! request, returning the decoded JSON response or a typed error. The
//! production implementation is [`HttpTransport`]; tests substitute
//! in-memory doubles to observe or fail individual requests.

use crate::{config::RunConfiguration, errors::TransportError};
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
    multipart,
};
use serde_json::Value;
use testrelay_wire::{EndpointRequest, Method, ParameterEncoding};

/// Sends declarative endpoint requests to the reporting backend.
pub trait Transport: Send + 'static {
    /// Performs one endpoint request and returns the decoded JSON response.
    fn send(
        &self,
        request: EndpointRequest,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// HTTP transport over [`reqwest`].
///
/// The authorization token is installed as a default header at construction,
/// so every request carries it; the base URL is the backend URL joined with
/// the project path segment.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Builds the transport for a run configuration.
    pub fn new(config: &RunConfiguration) -> Result<Self, TransportError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(TransportError::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(TransportError::BuildClient)?;
        let base_url = format!(
            "{}/{}",
            config.portal_url.trim_end_matches('/'),
            config.project
        );
        Ok(Self { client, base_url })
    }

    fn method_of(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: EndpointRequest) -> Result<Value, TransportError> {
        let EndpointRequest {
            method,
            relative_path,
            headers,
            encoding,
            body,
            attachment,
        } = request;

        let url = format!("{}/{relative_path}", self.base_url);
        let mut builder = self.client.request(Self::method_of(method), url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        builder = match encoding {
            ParameterEncoding::Json => builder.json(&body),
            ParameterEncoding::Url => builder.form(&body),
            ParameterEncoding::Multipart => {
                let mut form = multipart::Form::new().text("json_request_part", body.to_string());
                if let Some(attachment) = attachment {
                    let part = multipart::Part::bytes(attachment.bytes)
                        .file_name(attachment.file_name)
                        .mime_str(&attachment.content_type)
                        .map_err(|source| TransportError::Request {
                            path: relative_path.clone(),
                            source,
                        })?;
                    form = form.part("file", part);
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: relative_path.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                path: relative_path,
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| TransportError::Decode {
                path: relative_path,
                source,
            })
    }
}
