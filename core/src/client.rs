//! Request building, execution and response parsing for every API method.
//!
//! # Design
//! `TelegraphClient` holds a `ClientConfig` and a `Transport` and carries no
//! mutable state between calls. Each method is split the same way:
//! `build_*` turns arguments into an `HttpRequest`, the transport executes
//! it, and the shared envelope decoder turns the body into a typed record.
//! The `build_*` and `parse_*` halves are public so callers that run their
//! own I/O can skip the transport entirely.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use tracing::debug;

use crate::config::ClientConfig;
use crate::envelope::{decode_envelope, decode_upload, UPLOAD_METHOD};
use crate::error::{ApiError, Result};
use crate::http::{
    encode_params, HttpMethod, HttpRequest, HttpResponse, MultipartForm, Params, Transport,
    TransportMode, UreqTransport,
};
use crate::node::content_field;
use crate::types::{
    Account, AccountField, CreateAccountOpts, EditAccountInfoOpts, Page, PageList, PageListOpts,
    PageOpts, PageViews, PageViewsOpts,
};

/// API method names.
pub mod methods {
    pub const CREATE_ACCOUNT: &str = "createAccount";
    pub const EDIT_ACCOUNT_INFO: &str = "editAccountInfo";
    pub const GET_ACCOUNT_INFO: &str = "getAccountInfo";
    pub const REVOKE_ACCESS_TOKEN: &str = "revokeAccessToken";
    pub const CREATE_PAGE: &str = "createPage";
    pub const EDIT_PAGE: &str = "editPage";
    pub const GET_PAGE: &str = "getPage";
    pub const GET_PAGE_LIST: &str = "getPageList";
    pub const GET_VIEWS: &str = "getViews";
}

use methods::*;

/// Form field the upload endpoint reads the file from.
const UPLOAD_FIELD: &str = "file";

/// Client for the Telegraph API.
#[derive(Debug, Clone)]
pub struct TelegraphClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl TelegraphClient<UreqTransport> {
    /// Client with the default `ureq` transport, bounded by the configured timeout.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self { config, transport }
    }
}

impl Default for TelegraphClient<UreqTransport> {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl<T: Transport> TelegraphClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------------
    // Envelope handling
    // -----------------------------------------------------------------------

    /// Build the request for `method` with `params` placed according to `mode`.
    pub fn build_request(&self, method: &str, params: &Params, mode: TransportMode) -> HttpRequest {
        let url = self.config.method_url(method);
        match mode {
            TransportMode::Get => {
                let query = encode_params(params);
                HttpRequest {
                    method: HttpMethod::Get,
                    url: if query.is_empty() { url } else { format!("{url}?{query}") },
                    headers: Vec::new(),
                    body: None,
                }
            }
            TransportMode::Form => HttpRequest {
                method: HttpMethod::Post,
                url,
                headers: vec![(
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )],
                body: Some(encode_params(params).into_bytes()),
            },
            TransportMode::Multipart => {
                let form = params
                    .iter()
                    .fold(MultipartForm::new(), |form, (key, value)| form.text(key, value));
                HttpRequest {
                    method: HttpMethod::Post,
                    url,
                    headers: vec![("content-type".to_string(), form.content_type())],
                    body: Some(form.into_body()),
                }
            }
        }
    }

    /// Call `method` and return the raw `result` payload of its envelope.
    pub fn invoke(&self, method: &str, params: &Params, mode: TransportMode) -> Result<Box<RawValue>> {
        let request = self.build_request(method, params, mode);
        let response = self.execute(method, &request)?;
        parse_envelope(method, &response)
    }

    fn execute(&self, method: &str, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.split_once('?').map_or(request.url.as_str(), |(base, _)| base);
        debug!(method, http_method = ?request.method, url, "sending request");
        let response = self
            .transport
            .execute(request)
            .map_err(|source| ApiError::Transport {
                method: method.to_string(),
                source,
            })?;
        debug!(method, status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }

    fn call<R: DeserializeOwned>(&self, method: &str, request: &HttpRequest) -> Result<R> {
        let response = self.execute(method, request)?;
        parse_response(method, &response)
    }

    // -----------------------------------------------------------------------
    // Accounts
    // -----------------------------------------------------------------------

    pub fn build_create_account(&self, short_name: &str, opts: &CreateAccountOpts) -> HttpRequest {
        let params = Params::new()
            .push("short_name", short_name)
            .push_opt("author_name", opts.author_name.as_deref())
            .push_opt("author_url", opts.author_url.as_deref());
        self.build_request(CREATE_ACCOUNT, &params, TransportMode::Get)
    }

    /// Create a new account. The returned `Account` carries its access token.
    pub fn create_account(&self, short_name: &str, opts: &CreateAccountOpts) -> Result<Account> {
        self.call(CREATE_ACCOUNT, &self.build_create_account(short_name, opts))
    }

    pub fn build_edit_account_info(&self, access_token: &str, opts: &EditAccountInfoOpts) -> HttpRequest {
        let params = Params::new()
            .push("access_token", access_token)
            .push_opt("short_name", opts.short_name.as_deref())
            .push_opt("author_name", opts.author_name.as_deref())
            .push_opt("author_url", opts.author_url.as_deref());
        self.build_request(EDIT_ACCOUNT_INFO, &params, TransportMode::Get)
    }

    pub fn edit_account_info(&self, access_token: &str, opts: &EditAccountInfoOpts) -> Result<Account> {
        self.call(EDIT_ACCOUNT_INFO, &self.build_edit_account_info(access_token, opts))
    }

    /// An empty `fields` slice requests every field.
    pub fn build_get_account_info(&self, access_token: &str, fields: &[AccountField]) -> Result<HttpRequest> {
        let all = AccountField::ALL;
        let fields = if fields.is_empty() { &all[..] } else { fields };
        let fields = serde_json::to_string(fields).map_err(|source| ApiError::Encode {
            method: GET_ACCOUNT_INFO.to_string(),
            source,
        })?;
        let params = Params::new()
            .push("access_token", access_token)
            .push("fields", fields);
        Ok(self.build_request(GET_ACCOUNT_INFO, &params, TransportMode::Get))
    }

    pub fn get_account_info(&self, access_token: &str, fields: &[AccountField]) -> Result<Account> {
        self.call(GET_ACCOUNT_INFO, &self.build_get_account_info(access_token, fields)?)
    }

    pub fn build_revoke_access_token(&self, access_token: &str) -> HttpRequest {
        let params = Params::new().push("access_token", access_token);
        self.build_request(REVOKE_ACCESS_TOKEN, &params, TransportMode::Get)
    }

    /// Revoke `access_token`. The returned `Account` carries the new token.
    pub fn revoke_access_token(&self, access_token: &str) -> Result<Account> {
        self.call(REVOKE_ACCESS_TOKEN, &self.build_revoke_access_token(access_token))
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// `content` is either a JSON node array or an HTML fragment.
    pub fn build_create_page(
        &self,
        access_token: &str,
        title: &str,
        content: &str,
        opts: &PageOpts,
    ) -> Result<HttpRequest> {
        let params = Params::new()
            .push("access_token", access_token)
            .push("title", title);
        let params = page_params(CREATE_PAGE, params, content, opts)?;
        Ok(self.build_request(CREATE_PAGE, &params, TransportMode::Form))
    }

    pub fn create_page(&self, access_token: &str, title: &str, content: &str, opts: &PageOpts) -> Result<Page> {
        self.call(CREATE_PAGE, &self.build_create_page(access_token, title, content, opts)?)
    }

    pub fn build_edit_page(
        &self,
        access_token: &str,
        path: &str,
        title: &str,
        content: &str,
        opts: &PageOpts,
    ) -> Result<HttpRequest> {
        let params = Params::new()
            .push("access_token", access_token)
            .push("path", path)
            .push("title", title);
        let params = page_params(EDIT_PAGE, params, content, opts)?;
        Ok(self.build_request(EDIT_PAGE, &params, TransportMode::Form))
    }

    pub fn edit_page(
        &self,
        access_token: &str,
        path: &str,
        title: &str,
        content: &str,
        opts: &PageOpts,
    ) -> Result<Page> {
        self.call(EDIT_PAGE, &self.build_edit_page(access_token, path, title, content, opts)?)
    }

    pub fn build_get_page(&self, path: &str, return_content: bool) -> HttpRequest {
        let params = Params::new()
            .push("path", path)
            .push("return_content", return_content);
        self.build_request(GET_PAGE, &params, TransportMode::Get)
    }

    pub fn get_page(&self, path: &str, return_content: bool) -> Result<Page> {
        self.call(GET_PAGE, &self.build_get_page(path, return_content))
    }

    pub fn build_get_page_list(&self, access_token: &str, opts: &PageListOpts) -> HttpRequest {
        let params = Params::new()
            .push("access_token", access_token)
            .push_opt("offset", opts.offset)
            .push_opt("limit", opts.limit);
        self.build_request(GET_PAGE_LIST, &params, TransportMode::Get)
    }

    pub fn get_page_list(&self, access_token: &str, opts: &PageListOpts) -> Result<PageList> {
        self.call(GET_PAGE_LIST, &self.build_get_page_list(access_token, opts))
    }

    pub fn build_get_views(&self, path: &str, opts: &PageViewsOpts) -> HttpRequest {
        let params = Params::new()
            .push("path", path)
            .push_opt("year", opts.year)
            .push_opt("month", opts.month)
            .push_opt("day", opts.day)
            .push_opt("hour", opts.hour);
        self.build_request(GET_VIEWS, &params, TransportMode::Get)
    }

    pub fn get_views(&self, path: &str, opts: &PageViewsOpts) -> Result<PageViews> {
        self.call(GET_VIEWS, &self.build_get_views(path, opts))
    }

    // -----------------------------------------------------------------------
    // Uploads
    // -----------------------------------------------------------------------

    pub fn build_upload(&self, file_name: &str, data: Vec<u8>) -> HttpRequest {
        let form = MultipartForm::new().file(UPLOAD_FIELD, file_name, data);
        HttpRequest {
            method: HttpMethod::Post,
            url: self.config.upload_url().to_string(),
            headers: vec![("content-type".to_string(), form.content_type())],
            body: Some(form.into_body()),
        }
    }

    /// Upload in-memory file contents and return the hosted path
    /// (everything after `https://telegra.ph`).
    pub fn upload_bytes(&self, file_name: &str, data: Vec<u8>) -> Result<String> {
        let response = self.execute(UPLOAD_METHOD, &self.build_upload(file_name, data))?;
        parse_upload(&response)
    }

    /// Read `path` from disk and upload it.
    pub fn upload_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| ApiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| UPLOAD_FIELD.to_string());
        self.upload_bytes(&file_name, data)
    }
}

/// Append `content` and the shared page options for `method`.
fn page_params(method: &str, params: Params, content: &str, opts: &PageOpts) -> Result<Params> {
    Ok(params
        .push("content", content_field(method, content)?)
        .push_opt("author_name", opts.author_name.as_deref())
        .push_opt("author_url", opts.author_url.as_deref())
        .push("return_content", opts.return_content))
}

/// Decode the envelope in `response` and return its raw `result`.
///
/// A body that is not an envelope is reported with the HTTP status when the
/// status itself signals failure.
pub fn parse_envelope(method: &str, response: &HttpResponse) -> Result<Box<RawValue>> {
    match decode_envelope(method, &response.body) {
        Err(ApiError::Transport { .. }) if !(200..300).contains(&response.status) => Err(ApiError::transport(
            method,
            format!("HTTP {}: {}", response.status, snippet(&response.body)),
        )),
        other => other,
    }
}

/// Decode the envelope in `response` and its `result` into `R`.
pub fn parse_response<R: DeserializeOwned>(method: &str, response: &HttpResponse) -> Result<R> {
    let raw = parse_envelope(method, response)?;
    serde_json::from_str(raw.get())
        .map_err(|e| ApiError::transport(method, format!("unexpected result shape: {e}")))
}

/// Decode an upload response into the hosted file path.
pub fn parse_upload(response: &HttpResponse) -> Result<String> {
    match decode_upload(&response.body) {
        Err(ApiError::Transport { .. }) if !(200..300).contains(&response.status) => Err(ApiError::transport(
            UPLOAD_METHOD,
            format!("HTTP {}: {}", response.status, snippet(&response.body)),
        )),
        other => other,
    }
}

fn snippet(body: &str) -> &str {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

// ---------------------------------------------------------------------------
// Record helpers
// ---------------------------------------------------------------------------

impl Account {
    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingAccessToken)
    }

    /// Fresh copy of this account's info. The access token is carried over.
    pub fn info<T: Transport>(&self, client: &TelegraphClient<T>) -> Result<Account> {
        let token = self.token()?;
        let mut account = client.get_account_info(token, &[])?;
        account.access_token.get_or_insert_with(|| token.to_string());
        Ok(account)
    }

    pub fn edit_info<T: Transport>(&self, client: &TelegraphClient<T>, opts: &EditAccountInfoOpts) -> Result<Account> {
        let token = self.token()?;
        let mut account = client.edit_account_info(token, opts)?;
        account.access_token.get_or_insert_with(|| token.to_string());
        Ok(account)
    }

    /// Revoke this account's token. Use the returned account from then on.
    pub fn revoke<T: Transport>(&self, client: &TelegraphClient<T>) -> Result<Account> {
        client.revoke_access_token(self.token()?)
    }

    pub fn create_page<T: Transport>(
        &self,
        client: &TelegraphClient<T>,
        title: &str,
        content: &str,
        opts: &PageOpts,
    ) -> Result<Page> {
        client.create_page(self.token()?, title, content, opts)
    }

    pub fn edit_page<T: Transport>(
        &self,
        client: &TelegraphClient<T>,
        path: &str,
        title: &str,
        content: &str,
        opts: &PageOpts,
    ) -> Result<Page> {
        client.edit_page(self.token()?, path, title, content, opts)
    }

    pub fn page_list<T: Transport>(&self, client: &TelegraphClient<T>, opts: &PageListOpts) -> Result<PageList> {
        client.get_page_list(self.token()?, opts)
    }
}

impl Page {
    /// Re-fetch this page by path.
    pub fn fetch<T: Transport>(&self, client: &TelegraphClient<T>, return_content: bool) -> Result<Page> {
        client.get_page(&self.path, return_content)
    }

    pub fn views<T: Transport>(&self, client: &TelegraphClient<T>, opts: &PageViewsOpts) -> Result<PageViews> {
        client.get_views(&self.path, opts)
    }
}
