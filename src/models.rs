use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

pub type AuthorityId = i64;
pub type MenuId = i64;
pub type UserId = i64;

// --- Core Records (Mapped to Database) ---

/// Authority
///
/// A role. Grants are scoped to authorities, never to individual users.
/// `parent_id` links the role hierarchy; the graph it forms is kept acyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Authority {
    // Assigned by the store on creation; zero until then.
    pub id: AuthorityId,
    pub name: String,
    // Stable external identifier, globally unique.
    pub code: String,
    pub parent_id: Option<AuthorityId>,
    // Landing route after sign-in.
    pub default_route: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// MenuKind
///
/// Discriminates navigable pages from guarded action buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MenuKind {
    #[default]
    Page,
    Action,
}

impl MenuKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuKind::Page => "page",
            MenuKind::Action => "action",
        }
    }
}

impl TryFrom<String> for MenuKind {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "page" => Ok(MenuKind::Page),
            "action" => Ok(MenuKind::Action),
            other => Err(crate::Error::Validation(format!("unknown menu kind '{other}'"))),
        }
    }
}

/// MenuEntry
///
/// A page or an action button. Both kinds may have children (a page usually
/// carries its buttons). Navigation fields are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MenuEntry {
    pub id: MenuId,
    // Absent for top-level entries.
    pub parent_id: Option<MenuId>,
    pub title: String,
    pub name: String,
    pub path: String,
    pub component: String,
    pub icon: String,
    pub hidden: bool,
    // Ascending; ties keep insertion order.
    pub sort: i32,
    #[sqlx(try_from = "String")]
    pub kind: MenuKind,
    // Required and non-empty for `action` entries.
    pub permission_code: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// User
///
/// The slice of a console user this service needs: which authority they act under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub authority_id: AuthorityId,
}

// --- Tree Output ---

/// MenuNode
///
/// One node of a rendered menu forest. `checked` is only present in the
/// grant-annotated rendering used by the permission editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MenuNode {
    #[serde(flatten)]
    pub entry: MenuEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub checked: Option<bool>,
    #[schema(no_recursion)]
    pub children: Vec<MenuNode>,
}

/// GrantMatrix
///
/// Output for the permission editor (GET /admin/authorities/{id}/menus):
/// the granted ids plus the full menu tree with each node's `checked` flag.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GrantMatrix {
    pub menu_ids: Vec<MenuId>,
    pub menus: Vec<MenuNode>,
}

/// Page
///
/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

// --- Request Payloads (Input Schemas) ---

/// CreateAuthorityRequest
///
/// Any `id` sent by the caller is ignored; the store assigns identities.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateAuthorityRequest {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub parent_id: Option<AuthorityId>,
    #[serde(default)]
    pub default_route: Option<String>,
}

/// UpdateAuthorityRequest
///
/// Partial update: only `Some` fields change.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAuthorityRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AuthorityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_route: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateMenuRequest {
    #[serde(default)]
    pub parent_id: Option<MenuId>,
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub kind: MenuKind,
    #[serde(default)]
    pub permission_code: Option<String>,
}

/// UpdateMenuRequest
///
/// Partial update for a menu entry. The merged record is re-validated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMenuRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<MenuId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MenuKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_code: Option<String>,
}

/// ReplaceGrantsRequest
///
/// The complete new grant set for an authority. Replaces, never merges.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ReplaceGrantsRequest {
    pub menu_ids: Vec<MenuId>,
}

// --- Listing Filters ---

/// Pagination
///
/// Normalised paging window: page starts at 1, page size clamped to 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;
    pub const MAX_PAGE_SIZE: i64 = 100;

    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip; saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn wrap<T>(&self, list: Vec<T>, total: i64) -> Page<T> {
        Page {
            list,
            total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Substring filters for the menu listing.
#[derive(Debug, Clone, Default)]
pub struct MenuFilter {
    pub title: Option<String>,
    pub path: Option<String>,
}
