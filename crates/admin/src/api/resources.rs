//! CRUD over the CMS content types.
//!
//! One generic client serves every kind of content. List pages are cached
//! per `(kind, page, limit)`; any successful mutation invalidates every
//! cached page of its kind, and sign-in/sign-out drop the whole cache.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;

use folio_core::ResourceId;

use super::client::ApiClient;
use super::request::ApiRequest;
use super::wire::{Envelope, ListEnvelope, Pagination, PresignedUpload};
use super::{ApiError, endpoints};

const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: u64 = 256;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What a kind of content supports beyond listing and reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub mark_read: bool,
    pub activate: bool,
}

impl Capabilities {
    const EDITABLE: Self = Self {
        create: true,
        update: true,
        delete: true,
        mark_read: false,
        activate: false,
    };
}

/// CMS content types managed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Projects,
    Blogs,
    Tags,
    Categories,
    Careers,
    Educations,
    Certificates,
    Resumes,
    Contacts,
    Users,
    About,
}

impl ResourceKind {
    pub const ALL: [Self; 11] = [
        Self::Projects,
        Self::Blogs,
        Self::Tags,
        Self::Categories,
        Self::Careers,
        Self::Educations,
        Self::Certificates,
        Self::Resumes,
        Self::Contacts,
        Self::Users,
        Self::About,
    ];

    /// URL segment, both in the dashboard and on the backend.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Blogs => "blogs",
            Self::Tags => "tags",
            Self::Categories => "categories",
            Self::Careers => "careers",
            Self::Educations => "educations",
            Self::Certificates => "certificates",
            Self::Resumes => "resumes",
            Self::Contacts => "contacts",
            Self::Users => "users",
            Self::About => "about",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Projects => "Projects",
            Self::Blogs => "Blogs",
            Self::Tags => "Tags",
            Self::Categories => "Categories",
            Self::Careers => "Careers",
            Self::Educations => "Education",
            Self::Certificates => "Certificates",
            Self::Resumes => "Resumes",
            Self::Contacts => "Contacts",
            Self::Users => "Users",
            Self::About => "About",
        }
    }

    #[must_use]
    pub const fn capabilities(self) -> Capabilities {
        match self {
            Self::Users => Capabilities {
                create: false,
                update: false,
                delete: false,
                mark_read: false,
                activate: false,
            },
            Self::Contacts => Capabilities {
                create: false,
                update: false,
                delete: true,
                mark_read: true,
                activate: false,
            },
            Self::Resumes => Capabilities {
                activate: true,
                ..Capabilities::EDITABLE
            },
            _ => Capabilities::EDITABLE,
        }
    }

    fn collection_path(self) -> String {
        format!("{}/{}", endpoints::ADMIN_PREFIX, self.slug())
    }

    fn item_path(self, id: &ResourceId) -> String {
        format!("{}/{}", self.collection_path(), id)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| ResourceError::UnknownKind(s.to_string()))
    }
}

/// Optional pagination of a list request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One page of items.
#[derive(Debug, Clone, Default)]
pub struct ResourceList {
    pub items: Vec<Value>,
    pub pagination: Option<Pagination>,
}

impl ResourceList {
    /// Total item count, from pagination when the backend reports it.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pagination
            .as_ref()
            .map_or(self.items.len() as u64, |p| p.total)
    }
}

/// Errors from resource operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Unknown resource: {0}")]
    UnknownKind(String),

    #[error("{kind} does not support {action}")]
    Unsupported {
        kind: ResourceKind,
        action: &'static str,
    },

    #[error("Invalid resource id: {0:?}")]
    InvalidId(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: ResourceKind,
    page: PageQuery,
}

/// Cached resource client.
#[derive(Clone)]
pub struct ResourceClient {
    api: ApiClient,
    cache: Cache<CacheKey, ResourceList>,
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("cached_pages", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .support_invalidation_closures()
            .build();
        Self { api, cache }
    }

    /// List one page, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Any pipeline error.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn list(&self, kind: ResourceKind, page: PageQuery) -> Result<ResourceList, ResourceError> {
        let key = CacheKey { kind, page };
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("Resource list cache hit");
            return Ok(hit);
        }

        let mut request = ApiRequest::get(kind.collection_path());
        if let Some(page) = page.page {
            request = request.with_query("page", page);
        }
        if let Some(limit) = page.limit {
            request = request.with_query("limit", limit);
        }

        let envelope: ListEnvelope = self.api.json(request).await?;
        let list = ResourceList {
            items: envelope.data,
            pagination: envelope.pagination,
        };
        self.cache.insert(key, list.clone()).await;
        Ok(list)
    }

    /// Fetch one item.
    ///
    /// # Errors
    ///
    /// `ResourceError::InvalidId` for ids that cannot be put in a path, or
    /// any pipeline error.
    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    pub async fn get(&self, kind: ResourceKind, id: &ResourceId) -> Result<Value, ResourceError> {
        check_id(id)?;
        let envelope: Envelope<Value> = self.api.json(ApiRequest::get(kind.item_path(id))).await?;
        Ok(envelope.data)
    }

    /// Create an item.
    ///
    /// # Errors
    ///
    /// `ResourceError::Unsupported` for read-only kinds, or any pipeline
    /// error.
    #[instrument(skip(self, payload), fields(kind = %kind))]
    pub async fn create(&self, kind: ResourceKind, payload: Value) -> Result<Value, ResourceError> {
        require(kind, kind.capabilities().create, "create")?;
        let response = self
            .api
            .send(ApiRequest::post(kind.collection_path(), payload))
            .await?;
        self.invalidate(kind);
        Ok(unwrap_data(response.body))
    }

    /// Replace an item.
    ///
    /// # Errors
    ///
    /// `ResourceError::Unsupported`, `ResourceError::InvalidId`, or any
    /// pipeline error.
    #[instrument(skip(self, payload), fields(kind = %kind, id = %id))]
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: &ResourceId,
        payload: Value,
    ) -> Result<Value, ResourceError> {
        require(kind, kind.capabilities().update, "update")?;
        check_id(id)?;
        let response = self
            .api
            .send(ApiRequest::put(kind.item_path(id), payload))
            .await?;
        self.invalidate(kind);
        Ok(unwrap_data(response.body))
    }

    /// Delete an item.
    ///
    /// # Errors
    ///
    /// `ResourceError::Unsupported`, `ResourceError::InvalidId`, or any
    /// pipeline error.
    #[instrument(skip(self), fields(kind = %kind, id = %id))]
    pub async fn delete(&self, kind: ResourceKind, id: &ResourceId) -> Result<(), ResourceError> {
        require(kind, kind.capabilities().delete, "delete")?;
        check_id(id)?;
        self.api.send(ApiRequest::delete(kind.item_path(id))).await?;
        self.invalidate(kind);
        Ok(())
    }

    /// Mark a contact message as read.
    ///
    /// # Errors
    ///
    /// `ResourceError::InvalidId`, or any pipeline error.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn mark_read(&self, id: &ResourceId) -> Result<(), ResourceError> {
        let kind = ResourceKind::Contacts;
        check_id(id)?;
        let path = format!("{}/read", kind.item_path(id));
        self.api
            .send(ApiRequest::new(reqwest::Method::PUT, path))
            .await?;
        self.invalidate(kind);
        Ok(())
    }

    /// Make a resume the active one.
    ///
    /// # Errors
    ///
    /// `ResourceError::InvalidId`, or any pipeline error.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn activate(&self, id: &ResourceId) -> Result<(), ResourceError> {
        let kind = ResourceKind::Resumes;
        check_id(id)?;
        let path = format!("{}/activate", kind.item_path(id));
        self.api
            .send(ApiRequest::new(reqwest::Method::POST, path))
            .await?;
        self.invalidate(kind);
        Ok(())
    }

    /// Ask the backend for a presigned upload target under `folder`.
    ///
    /// # Errors
    ///
    /// Any pipeline error, or `ApiError::Parse` if the answer has no
    /// upload target.
    #[instrument(skip(self), fields(folder = %folder))]
    pub async fn upload_url(
        &self,
        folder: &str,
        file_name: &str,
        content_type: &str,
    ) -> Result<PresignedUpload, ResourceError> {
        let body = json!({
            "file_name": file_name,
            "content_type": content_type,
            "folder": folder,
        });
        let envelope: Envelope<PresignedUpload> = self
            .api
            .json(ApiRequest::post(endpoints::UPLOAD_URL, body))
            .await?;
        Ok(envelope.data)
    }

    /// Upload a file and return its public URL.
    ///
    /// Gets a presigned target through the pipeline, then `PUT`s the bytes
    /// to it directly. An empty `content_type` is sent as
    /// `application/octet-stream`.
    ///
    /// # Errors
    ///
    /// Any error from [`upload_url`](Self::upload_url), or the storage
    /// rejection from the `PUT`.
    #[instrument(skip(self, bytes), fields(folder = %folder, size = bytes.len()))]
    pub async fn upload_file(
        &self,
        folder: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ResourceError> {
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };
        let target = self.upload_url(folder, file_name, content_type).await?;
        self.api
            .put_presigned(&target.upload_url, content_type, bytes)
            .await?;
        tracing::info!(key = %target.key, "Uploaded file");
        Ok(target.file_url)
    }

    /// Drop every cached page of one kind.
    pub fn invalidate(&self, kind: ResourceKind) {
        if let Err(e) = self.cache.invalidate_entries_if(move |key, _| key.kind == kind) {
            tracing::warn!(error = %e, kind = %kind, "Failed to invalidate cached pages, clearing cache");
            self.cache.invalidate_all();
        }
    }

    /// Drop everything, e.g. when the signed-in user changes.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

fn require(kind: ResourceKind, allowed: bool, action: &'static str) -> Result<(), ResourceError> {
    if allowed {
        Ok(())
    } else {
        Err(ResourceError::Unsupported { kind, action })
    }
}

fn check_id(id: &ResourceId) -> Result<(), ResourceError> {
    if id.is_path_safe() {
        Ok(())
    } else {
        Err(ResourceError::InvalidId(id.to_string()))
    }
}

/// Mutation responses are usually enveloped; fall back to the raw body.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_slug_round_trip_for_every_kind() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.slug().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!(matches!(
            "widgets".parse::<ResourceKind>(),
            Err(ResourceError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_capabilities() {
        assert!(!ResourceKind::Users.capabilities().create);
        assert!(!ResourceKind::Users.capabilities().delete);
        assert!(ResourceKind::Contacts.capabilities().mark_read);
        assert!(!ResourceKind::Contacts.capabilities().create);
        assert!(ResourceKind::Resumes.capabilities().activate);
        assert!(ResourceKind::Resumes.capabilities().update);
        assert!(ResourceKind::Projects.capabilities().create);
        assert!(!ResourceKind::Projects.capabilities().activate);
    }

    #[test]
    fn test_paths() {
        assert_eq!(ResourceKind::Blogs.collection_path(), "/v1/admin/blogs");
        assert_eq!(
            ResourceKind::About.item_path(&ResourceId::new("1")),
            "/v1/admin/about/1"
        );
    }

    #[test]
    fn test_check_id() {
        assert!(check_id(&ResourceId::new("abc-1")).is_ok());
        assert!(matches!(
            check_id(&ResourceId::new("../x")),
            Err(ResourceError::InvalidId(_))
        ));
    }

    #[test]
    fn test_unwrap_data() {
        assert_eq!(unwrap_data(json!({"success": true, "data": {"id": "1"}})), json!({"id": "1"}));
        assert_eq!(unwrap_data(json!({"id": "1"})), json!({"id": "1"}));
        assert_eq!(unwrap_data(Value::Null), Value::Null);
    }

    #[test]
    fn test_list_total() {
        let list = ResourceList {
            items: vec![json!({}), json!({})],
            pagination: None,
        };
        assert_eq!(list.total(), 2);

        let list = ResourceList {
            items: vec![json!({})],
            pagination: Some(Pagination {
                total: 40,
                ..Pagination::default()
            }),
        };
        assert_eq!(list.total(), 40);
    }
}
