//! Blocking client for the Telegraph publishing API.
//!
//! # Overview
//! Covers accounts, pages, view counts and file uploads. Every operation is a
//! single round-trip: build parameters, execute through a `Transport`, decode
//! the `{ok, error, result}` envelope into a typed record.
//!
//! # Design
//! - `TelegraphClient` holds only configuration and an injected transport, so
//!   one client can be shared across threads without locking.
//! - `build_*` / `parse_*` are public, keeping the I/O boundary explicit for
//!   callers that execute requests themselves.
//! - Page content goes through `node::normalize`, which accepts a JSON node
//!   array or an HTML fragment and rejects anything the API would refuse.
//! - The upload endpoint's non-envelope response is decoded in one place
//!   (`envelope::decode_upload`) and never leaks to callers.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod node;
pub mod types;

pub use client::{parse_envelope, parse_response, parse_upload, TelegraphClient};
pub use config::ClientConfig;
pub use error::{ApiError, BoxError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Params, Transport, TransportMode, UreqTransport};
pub use node::{content_field, normalize, Node, NodeElement};
pub use types::{
    Account, AccountField, CreateAccountOpts, EditAccountInfoOpts, Page, PageList, PageListOpts,
    PageOpts, PageViews, PageViewsOpts,
};
