use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, RawQuery, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Largest file `/upload` accepts.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct Account {
    pub short_name: String,
    pub author_name: String,
    pub author_url: String,
}

#[derive(Clone, Debug)]
pub struct Page {
    pub path: String,
    pub title: String,
    pub author_name: String,
    pub author_url: String,
    pub content: Value,
    pub views: i64,
    pub owner: String,
}

impl Page {
    fn to_json(&self, return_content: bool, viewer: Option<&str>) -> Value {
        let mut page = json!({
            "path": self.path,
            "url": format!("https://telegra.ph/{}", self.path),
            "title": self.title,
            "description": description(&self.content),
            "author_name": self.author_name,
            "author_url": self.author_url,
            "views": self.views,
        });
        if return_content {
            page["content"] = self.content.clone();
        }
        if let Some(token) = viewer {
            page["can_edit"] = Value::Bool(token == self.owner);
        }
        page
    }
}

/// In-memory state. Pages are kept in creation order.
#[derive(Debug, Default)]
pub struct Store {
    accounts: HashMap<String, Account>,
    pages: Vec<Page>,
}

pub type Db = Arc<RwLock<Store>>;
type Params = HashMap<String, String>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(2 * MAX_UPLOAD_BYTES)),
        )
        .route("/{method}", get(call_query).post(call_form))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn call_query(
    State(db): State<Db>,
    Path(method): Path<String>,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    let params = parse_params(query.as_deref().unwrap_or_default().as_bytes());
    Json(db.write().await.dispatch(&method, &params))
}

async fn call_form(
    State(db): State<Db>,
    Path(method): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Json<Value> {
    let mut params = parse_params(query.as_deref().unwrap_or_default().as_bytes());
    params.extend(parse_params(&body));
    Json(db.write().await.dispatch(&method, &params))
}

/// Answers with a bare `[{"path"}]` array or an `{"error"}` object, never an
/// envelope.
async fn upload(mut multipart: Multipart) -> Json<Value> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => return Json(json!({"error": "Bad request"})),
        };
        if field.name() != Some("file") {
            continue;
        }
        let ext = field
            .file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(_) => return Json(json!({"error": "Bad request"})),
        };
        if data.is_empty() {
            return Json(json!({"error": "File type invalid"}));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Json(json!({"error": "File too big"}));
        }
        let path = format!("/file/{}.{ext}", Uuid::new_v4().simple());
        return Json(json!([{ "path": path }]));
    }
    Json(json!({"error": "File type invalid"}))
}

fn parse_params(raw: &[u8]) -> Params {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

fn ok(result: Value) -> Value {
    json!({"ok": true, "result": result})
}

fn fail(error: &str) -> Value {
    json!({"ok": false, "error": error})
}

/// First 100 characters of the page text.
fn description(content: &Value) -> String {
    fn collect(node: &Value, out: &mut String) {
        match node {
            Value::String(text) => out.push_str(text),
            Value::Array(nodes) => nodes.iter().for_each(|n| collect(n, out)),
            Value::Object(el) => {
                if let Some(children) = el.get("children") {
                    collect(children, out);
                }
            }
            _ => {}
        }
    }
    let mut text = String::new();
    collect(content, &mut text);
    text.chars().take(100).collect()
}

fn slug(title: &str) -> String {
    let words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    if words.is_empty() {
        "Page".to_string()
    } else {
        words.join("-")
    }
}

fn int_param(params: &Params, key: &str) -> Result<Option<i64>, &'static str> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| "INVALID_NUMBER"),
    }
}

impl Store {
    pub fn dispatch(&mut self, method: &str, params: &Params) -> Value {
        let result = match method {
            "createAccount" => self.create_account(params),
            "editAccountInfo" => self.edit_account_info(params),
            "getAccountInfo" => self.get_account_info(params),
            "revokeAccessToken" => self.revoke_access_token(params),
            "createPage" => self.create_page(params),
            "editPage" => self.edit_page(params),
            "getPage" => self.get_page(params),
            "getPageList" => self.get_page_list(params),
            "getViews" => self.get_views(params),
            _ => Err("METHOD_NOT_FOUND"),
        };
        match result {
            Ok(value) => ok(value),
            Err(error) => {
                tracing::debug!(method, error, "request rejected");
                fail(error)
            }
        }
    }

    fn token<'a>(&self, params: &'a Params) -> Result<&'a str, &'static str> {
        let token = params.get("access_token").ok_or("ACCESS_TOKEN_REQUIRED")?;
        if self.accounts.contains_key(token) {
            Ok(token.as_str())
        } else {
            Err("ACCESS_TOKEN_INVALID")
        }
    }

    fn page_count(&self, token: &str) -> usize {
        self.pages.iter().filter(|p| p.owner == token).count()
    }

    fn create_account(&mut self, params: &Params) -> Result<Value, &'static str> {
        let short_name = params
            .get("short_name")
            .filter(|s| !s.is_empty())
            .ok_or("SHORT_NAME_REQUIRED")?;
        let account = Account {
            short_name: short_name.clone(),
            author_name: params.get("author_name").cloned().unwrap_or_default(),
            author_url: params.get("author_url").cloned().unwrap_or_default(),
        };
        let token = Uuid::new_v4().simple().to_string();
        let mut result = serde_json::to_value(&account).map_err(|_| "INTERNAL_ERROR")?;
        result["access_token"] = json!(token);
        result["auth_url"] = json!(format!("https://edit.telegra.ph/auth/{token}"));
        result["page_count"] = json!(0);
        self.accounts.insert(token, account);
        Ok(result)
    }

    fn edit_account_info(&mut self, params: &Params) -> Result<Value, &'static str> {
        let token = self.token(params)?;
        let account = self.accounts.get_mut(token).ok_or("ACCESS_TOKEN_INVALID")?;
        if let Some(name) = params.get("short_name") {
            account.short_name = name.clone();
        }
        if let Some(name) = params.get("author_name") {
            account.author_name = name.clone();
        }
        if let Some(url) = params.get("author_url") {
            account.author_url = url.clone();
        }
        serde_json::to_value(&*account).map_err(|_| "INTERNAL_ERROR")
    }

    fn get_account_info(&self, params: &Params) -> Result<Value, &'static str> {
        let token = self.token(params)?;
        let account = self.accounts.get(token).ok_or("ACCESS_TOKEN_INVALID")?;
        let fields: Vec<String> = match params.get("fields") {
            Some(raw) => serde_json::from_str(raw).map_err(|_| "FIELDS_FORMAT_INVALID")?,
            None => vec!["short_name".into(), "author_name".into(), "author_url".into()],
        };
        let mut result = json!({});
        for field in fields {
            let value = match field.as_str() {
                "short_name" => json!(account.short_name),
                "author_name" => json!(account.author_name),
                "author_url" => json!(account.author_url),
                "auth_url" => json!(format!("https://edit.telegra.ph/auth/{token}")),
                "page_count" => json!(self.page_count(token)),
                _ => return Err("FIELDS_FORMAT_INVALID"),
            };
            result[field] = value;
        }
        Ok(result)
    }

    fn revoke_access_token(&mut self, params: &Params) -> Result<Value, &'static str> {
        let old = self.token(params)?.to_string();
        let account = self.accounts.remove(&old).ok_or("ACCESS_TOKEN_INVALID")?;
        let token = Uuid::new_v4().simple().to_string();
        for page in self.pages.iter_mut().filter(|p| p.owner == old) {
            page.owner = token.clone();
        }
        let mut result = serde_json::to_value(&account).map_err(|_| "INTERNAL_ERROR")?;
        result["access_token"] = json!(token);
        result["auth_url"] = json!(format!("https://edit.telegra.ph/auth/{token}"));
        self.accounts.insert(token, account);
        Ok(result)
    }

    fn content(params: &Params) -> Result<Value, &'static str> {
        let raw = params.get("content").ok_or("CONTENT_REQUIRED")?;
        let content: Value = serde_json::from_str(raw).map_err(|_| "CONTENT_FORMAT_INVALID")?;
        match content.as_array() {
            Some(nodes) if !nodes.is_empty() => Ok(content),
            Some(_) => Err("CONTENT_TEXT_REQUIRED"),
            None => Err("CONTENT_FORMAT_INVALID"),
        }
    }

    fn create_page(&mut self, params: &Params) -> Result<Value, &'static str> {
        let token = self.token(params)?.to_string();
        let title = params
            .get("title")
            .filter(|t| !t.is_empty())
            .ok_or("TITLE_REQUIRED")?;
        let content = Self::content(params)?;
        let account = self.accounts.get(&token).ok_or("ACCESS_TOKEN_INVALID")?;

        let base = slug(title);
        let mut path = base.clone();
        let mut n = 1;
        while self.pages.iter().any(|p| p.path == path) {
            n += 1;
            path = format!("{base}-{n}");
        }

        let page = Page {
            path,
            title: title.clone(),
            author_name: params.get("author_name").cloned().unwrap_or_else(|| account.author_name.clone()),
            author_url: params.get("author_url").cloned().unwrap_or_else(|| account.author_url.clone()),
            content,
            views: 0,
            owner: token,
        };
        let return_content = params.get("return_content").is_some_and(|v| v == "true");
        let result = page.to_json(return_content, None);
        self.pages.push(page);
        Ok(result)
    }

    fn edit_page(&mut self, params: &Params) -> Result<Value, &'static str> {
        let token = self.token(params)?.to_string();
        let path = params.get("path").ok_or("PAGE_NOT_FOUND")?;
        let title = params
            .get("title")
            .filter(|t| !t.is_empty())
            .ok_or("TITLE_REQUIRED")?;
        let content = Self::content(params)?;
        let page = self
            .pages
            .iter_mut()
            .find(|p| &p.path == path)
            .ok_or("PAGE_NOT_FOUND")?;
        if page.owner != token {
            return Err("PAGE_ACCESS_DENIED");
        }
        page.title = title.clone();
        page.content = content;
        if let Some(name) = params.get("author_name") {
            page.author_name = name.clone();
        }
        if let Some(url) = params.get("author_url") {
            page.author_url = url.clone();
        }
        let return_content = params.get("return_content").is_some_and(|v| v == "true");
        Ok(page.to_json(return_content, None))
    }

    fn get_page(&mut self, params: &Params) -> Result<Value, &'static str> {
        let path = params.get("path").ok_or("PAGE_NOT_FOUND")?;
        let page = self
            .pages
            .iter_mut()
            .find(|p| &p.path == path)
            .ok_or("PAGE_NOT_FOUND")?;
        page.views += 1;
        let return_content = params.get("return_content").is_some_and(|v| v == "true");
        Ok(page.to_json(return_content, None))
    }

    fn get_page_list(&self, params: &Params) -> Result<Value, &'static str> {
        let token = self.token(params)?;
        let offset = int_param(params, "offset")?.unwrap_or(0);
        let limit = int_param(params, "limit")?.unwrap_or(50);
        if offset < 0 || !(0..=200).contains(&limit) {
            return Err("INVALID_PAGING");
        }
        let owned: Vec<&Page> = self.pages.iter().rev().filter(|p| p.owner == token).collect();
        let pages: Vec<Value> = owned
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|p| p.to_json(false, Some(token)))
            .collect();
        Ok(json!({"total_count": owned.len(), "pages": pages}))
    }

    fn get_views(&self, params: &Params) -> Result<Value, &'static str> {
        let path = params.get("path").ok_or("PAGE_NOT_FOUND")?;
        let year = int_param(params, "year")?;
        let month = int_param(params, "month")?;
        let day = int_param(params, "day")?;
        let hour = int_param(params, "hour")?;
        if hour.is_some() && day.is_none() {
            return Err("DAY_REQUIRED");
        }
        if day.is_some() && month.is_none() {
            return Err("MONTH_REQUIRED");
        }
        if month.is_some() && year.is_none() {
            return Err("YEAR_REQUIRED");
        }
        let page = self
            .pages
            .iter()
            .find(|p| &p.path == path)
            .ok_or("PAGE_NOT_FOUND")?;
        // Views are not bucketed by period here.
        Ok(json!({"views": page.views}))
    }
}
