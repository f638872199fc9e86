//! Records returned by the API and the option structs callers pass in.
//!
//! Records are snapshots: each successful call decodes a fresh value and
//! nothing is tracked locally. Optional fields that the API only returns
//! for some methods are `Option`s so their absence is visible.

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// A Telegraph account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_url: String,
    /// Only returned by `createAccount` and `revokeAccessToken`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// One-time browser login link, valid for five minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i64>,
}

/// A Telegraph page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub path: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Present only when content was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<Node>>,
    #[serde(default)]
    pub views: i64,
    /// Present only when an access token was passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_edit: Option<bool>,
}

/// Pages of an account, most recently created first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageList {
    pub total_count: i64,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageViews {
    pub views: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateAccountOpts {
    pub author_name: Option<String>,
    pub author_url: Option<String>,
}

/// Only the fields that are set are sent.
#[derive(Debug, Clone, Default)]
pub struct EditAccountInfoOpts {
    pub short_name: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
}

/// Options shared by `createPage` and `editPage`.
#[derive(Debug, Clone, Default)]
pub struct PageOpts {
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    /// Ask for `content` in the returned `Page`.
    pub return_content: bool,
}

/// `offset` defaults to 0 and `limit` to 50 (0..=200) on the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageListOpts {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Narrow the view count to a year, month, day or hour. Each finer field
/// requires the coarser ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageViewsOpts {
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub day: Option<i64>,
    pub hour: Option<i64>,
}

/// Field selectable through `getAccountInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountField {
    ShortName,
    AuthorName,
    AuthorUrl,
    AuthUrl,
    PageCount,
}

impl AccountField {
    pub const ALL: [AccountField; 5] = [
        AccountField::ShortName,
        AccountField::AuthorName,
        AccountField::AuthorUrl,
        AccountField::AuthUrl,
        AccountField::PageCount,
    ];
}
