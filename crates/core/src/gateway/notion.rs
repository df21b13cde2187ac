use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method, Url,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::decode_json;
use crate::{
    config::AppConfig,
    error::{HttpError, SyncError},
    http::RetryingClient,
    models::NotionGameRecord,
};

const SERVICE: &str = "notion";

/// API version pinned in the `Notion-Version` header.
pub const NOTION_VERSION: &str = "2022-06-28";
/// Title given to a provisioned database.
pub const DATABASE_TITLE: &str = "Game List";

const PROP_NAME: &str = "name";
const PROP_PLAYTIME: &str = "playtime";
const PROP_LAST_PLAY: &str = "last play";
const PROP_STORE_URL: &str = "store url";
const PROP_COMPLETION: &str = "completion";
const PROP_TOTAL: &str = "total achievements";
const PROP_ACHIEVED: &str = "achieved achievements";

/// A page found by name lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingPage {
    /// Notion page id.
    pub id: String,
    /// Value of the `playtime` property, if set.
    pub playtime_hours: Option<f64>,
}

/// A page returned by a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRef {
    /// Notion page id.
    pub id: String,
    /// Browser URL of the page.
    #[serde(default)]
    pub url: Option<String>,
}

/// The games database, found or freshly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    /// Notion database id.
    pub id: String,
    /// `true` when this call created the database.
    pub created: bool,
}

/// Pages of one Notion database.
#[derive(Clone)]
pub struct NotionGateway {
    client: RetryingClient,
    base_url: String,
    database_id: String,
}

impl NotionGateway {
    /// Build a gateway with auth and version headers from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.notion_token))
            .map_err(|_| HttpError::InvalidRequest("notion token is not a valid header".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = RetryingClient::builder()
            .policy(config.retry_policy())
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.notion_api_base.trim_end_matches('/').to_string(),
            database_id: config.notion_database_id.clone().unwrap_or_default(),
        })
    }

    /// Find the page whose title equals `name` exactly.
    ///
    /// When several pages share the title, the first one Notion returns wins.
    pub async fn find_page_by_exact_name(
        &self,
        name: &str,
    ) -> Result<Option<ExistingPage>, SyncError> {
        info!(game = %name, "querying database");
        let url = self.url(&format!("v1/databases/{}/query", self.database_id))?;
        let body = json!({
            "filter": {
                "property": PROP_NAME,
                "title": { "equals": name }
            }
        });

        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        let value: Value = decode_json(SERVICE, response).await?;
        let results = value
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| SyncError::decode(SERVICE, "query response has no results array"))?;

        if results.len() > 1 {
            warn!(game = %name, matches = results.len(), "several pages share this name; using the first");
        }

        results.first().map(parse_existing_page).transpose()
    }

    /// Create a page for `record` in the configured database.
    pub async fn create_page(&self, record: &NotionGameRecord) -> Result<PageRef, SyncError> {
        info!(game = %record.name, "adding game to notion");
        let url = self.url("v1/pages")?;
        let mut body = page_body(record);
        body["parent"] = json!({
            "type": "database_id",
            "database_id": self.database_id,
        });

        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        let page: PageRef = decode_json(SERVICE, response).await?;
        info!(game = %record.name, page_id = %page.id, "game added");
        Ok(page)
    }

    /// Overwrite the properties, cover and icon of an existing page.
    pub async fn update_page(
        &self,
        page_id: &str,
        record: &NotionGameRecord,
    ) -> Result<PageRef, SyncError> {
        info!(game = %record.name, page_id, "updating game in notion");
        let url = self.url(&format!("v1/pages/{page_id}"))?;
        let body = page_body(record);

        let response = self.client.send(Method::PATCH, url, Some(&body)).await?;
        let page: PageRef = decode_json(SERVICE, response).await?;
        info!(game = %record.name, page_id = %page.id, "game updated");
        Ok(page)
    }

    /// Return the games database under `parent_page_id`, creating it when missing.
    pub async fn ensure_database_schema(
        &self,
        parent_page_id: &str,
    ) -> Result<DatabaseRef, SyncError> {
        if let Some(id) = self.find_database(parent_page_id).await? {
            info!(database_id = %id, "games database already exists");
            return Ok(DatabaseRef { id, created: false });
        }

        info!(parent_page_id, "creating games database");
        let url = self.url("v1/databases")?;
        let body = json!({
            "parent": { "type": "page_id", "page_id": parent_page_id },
            "title": [{ "type": "text", "text": { "content": DATABASE_TITLE } }],
            "properties": {
                PROP_NAME: { "title": {} },
                PROP_COMPLETION: { "number": {} },
                PROP_PLAYTIME: { "number": {} },
                PROP_LAST_PLAY: { "date": {} },
                PROP_TOTAL: { "number": {} },
                PROP_ACHIEVED: { "number": {} },
                PROP_STORE_URL: { "url": {} },
            },
        });

        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        let value: Value = decode_json(SERVICE, response).await?;
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::decode(SERVICE, "created database has no id"))?;
        info!(database_id = %id, "games database created");
        Ok(DatabaseRef {
            id: id.to_string(),
            created: true,
        })
    }

    async fn find_database(&self, parent_page_id: &str) -> Result<Option<String>, SyncError> {
        let url = self.url("v1/search")?;
        let body = json!({
            "query": DATABASE_TITLE,
            "filter": { "property": "object", "value": "database" },
        });

        let response = self.client.send(Method::POST, url, Some(&body)).await?;
        let value: Value = decode_json(SERVICE, response).await?;
        let results = value
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| SyncError::decode(SERVICE, "search response has no results array"))?;

        let parent = normalize_id(parent_page_id);
        Ok(results
            .iter()
            .filter(|db| {
                db.pointer("/parent/page_id")
                    .and_then(Value::as_str)
                    .map(|id| normalize_id(id) == parent)
                    .unwrap_or(false)
            })
            .filter(|db| plain_title(db) == DATABASE_TITLE)
            .find_map(|db| db.get("id").and_then(Value::as_str).map(str::to_string)))
    }

    fn url(&self, path: &str) -> Result<Url, HttpError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|err| HttpError::InvalidRequest(err.to_string()))
    }
}

/// Properties, cover and icon shared by page creation and update.
pub fn page_body(record: &NotionGameRecord) -> Value {
    json!({
        "properties": {
            PROP_NAME: {
                "type": "title",
                "title": [{ "type": "text", "text": { "content": record.name } }]
            },
            PROP_PLAYTIME: { "type": "number", "number": record.playtime_hours },
            PROP_LAST_PLAY: { "type": "date", "date": { "start": record.last_play_date } },
            PROP_STORE_URL: { "type": "url", "url": record.store_url },
            PROP_COMPLETION: { "type": "number", "number": record.completion_percent },
            PROP_TOTAL: { "type": "number", "number": record.total_achievements },
            PROP_ACHIEVED: { "type": "number", "number": record.achieved_achievements },
        },
        "cover": { "type": "external", "external": { "url": record.cover_url } },
        "icon": { "type": "external", "external": { "url": record.icon_url } },
    })
}

fn parse_existing_page(page: &Value) -> Result<ExistingPage, SyncError> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::decode(SERVICE, "page in results has no id"))?;
    let playtime_hours = page
        .pointer("/properties/playtime/number")
        .and_then(Value::as_f64);
    Ok(ExistingPage {
        id: id.to_string(),
        playtime_hours,
    })
}

fn plain_title(database: &Value) -> String {
    database
        .get("title")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_id(id: &str) -> String {
    id.chars().filter(|ch| *ch != '-').collect::<String>().to_ascii_lowercase()
}
