//! View models shared by the page templates.

use askama::Template;
use axum::response::Html;
use serde_json::Value;

use folio_core::UserRecord;

use crate::api::{Pagination, ResourceKind};
use crate::error::AppError;
use crate::notify::Notice;
use crate::paths;
use crate::state::AppState;

const MAX_COLUMNS: usize = 5;
const MAX_CELL_CHARS: usize = 80;

/// Fields shown first in resource tables when present.
const PREFERRED_COLUMNS: &[&str] = &[
    "title",
    "name",
    "email",
    "subject",
    "company",
    "position",
    "institution",
    "degree",
    "issuer",
    "slug",
    "status",
    "is_active",
    "isActive",
    "is_read",
    "isRead",
    "created_at",
    "createdAt",
];

/// Render a template into an HTML response.
///
/// # Errors
///
/// Returns `AppError::Internal` if rendering fails.
pub fn render(template: &impl Template) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// A toast as rendered.
#[derive(Debug, Clone)]
pub struct NoticeView {
    pub class: &'static str,
    pub title: String,
    pub description: String,
    pub seconds: u64,
}

impl From<Notice> for NoticeView {
    fn from(notice: Notice) -> Self {
        Self {
            class: notice.level.css_class(),
            title: notice.title,
            description: notice.description.unwrap_or_default(),
            seconds: notice.duration.as_secs().max(1),
        }
    }
}

/// Take pending notices for the page being rendered.
#[must_use]
pub fn take_notices(state: &AppState) -> Vec<NoticeView> {
    state
        .notices()
        .drain()
        .into_iter()
        .map(NoticeView::from)
        .collect()
}

/// Signed-in user as shown in the header.
#[derive(Debug, Clone)]
pub struct UserView {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<&UserRecord> for UserView {
    fn from(user: &UserRecord) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user
                .role
                .as_ref()
                .map_or_else(String::new, |r| r.as_str().to_string()),
        }
    }
}

/// Sidebar entry.
#[derive(Debug, Clone)]
pub struct NavItem {
    pub href: String,
    pub label: &'static str,
    pub active: bool,
}

/// Sidebar for the dashboard, with `active` highlighted.
#[must_use]
pub fn nav(active: Option<ResourceKind>) -> Vec<NavItem> {
    let mut items = vec![NavItem {
        href: paths::DASHBOARD.to_string(),
        label: "Overview",
        active: active.is_none(),
    }];
    items.extend(ResourceKind::ALL.into_iter().map(|kind| NavItem {
        href: paths::resource(kind.slug()),
        label: kind.label(),
        active: active == Some(kind),
    }));
    items
}

/// One row of a resource table.
#[derive(Debug, Clone)]
pub struct RowView {
    pub id: String,
    pub cells: Vec<String>,
    pub json: String,
}

/// A resource listing laid out as a table.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<RowView>,
}

impl TableView {
    /// Pick up to five scalar columns (id first, then well-known fields,
    /// then the rest alphabetically) and stringify each item.
    #[must_use]
    pub fn from_items(items: &[Value]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let scalar_keys: Vec<&String> = items
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|obj| obj.iter().filter(|(_, v)| is_scalar(v)).map(|(k, _)| k))
            .collect();

        if scalar_keys.iter().any(|k| k.as_str() == "id") {
            columns.push("id".to_string());
        }
        for preferred in PREFERRED_COLUMNS {
            if columns.len() >= MAX_COLUMNS {
                break;
            }
            if scalar_keys.iter().any(|k| k.as_str() == *preferred)
                && !columns.iter().any(|c| c == preferred)
            {
                columns.push((*preferred).to_string());
            }
        }
        let mut rest: Vec<&String> = scalar_keys
            .into_iter()
            .filter(|k| !columns.contains(k))
            .collect();
        rest.sort();
        rest.dedup();
        for key in rest {
            if columns.len() >= MAX_COLUMNS {
                break;
            }
            columns.push(key.clone());
        }

        let rows = items
            .iter()
            .map(|item| RowView {
                id: item.get("id").map(id_string).unwrap_or_default(),
                cells: columns
                    .iter()
                    .map(|c| item.get(c).map(cell).unwrap_or_default())
                    .collect(),
                json: serde_json::to_string_pretty(item).unwrap_or_default(),
            })
            .collect();

        Self { columns, rows }
    }
}

const fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null
    )
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if s.chars().count() > MAX_CELL_CHARS => {
            let cut: String = s.chars().take(MAX_CELL_CHARS).collect();
            format!("{cut}...")
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(_) => "{...}".to_string(),
        other => other.to_string(),
    }
}

/// Pager links.
#[derive(Debug, Clone)]
pub struct PageView {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageView {
    #[must_use]
    pub fn new(kind: ResourceKind, pagination: &Pagination) -> Self {
        let base = paths::resource(kind.slug());
        let link = |page: u32| {
            if pagination.limit > 0 {
                format!("{base}?page={page}&limit={}", pagination.limit)
            } else {
                format!("{base}?page={page}")
            }
        };
        let page = pagination.page.max(1);

        Self {
            page,
            total_pages: pagination.total_pages.max(1),
            total: pagination.total,
            prev: (page > 1).then(|| link(page - 1)),
            next: (pagination.has_next || page < pagination.total_pages).then(|| link(page + 1)),
        }
    }
}
