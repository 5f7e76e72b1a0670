//! Menu entry management: the page/action catalogue the grants refer to.

use crate::{
    error::{Error, Result},
    models::{
        CreateMenuRequest, MenuEntry, MenuFilter, MenuId, MenuKind, MenuNode, Page, Pagination,
        UpdateMenuRequest,
    },
    repository::Repository,
    tree::{TreeMode, build_tree, introduces_cycle},
};
use std::collections::HashMap;

pub async fn get(repo: &dyn Repository, id: MenuId) -> Result<MenuEntry> {
    repo.get_menu(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("menu {id}")))
}

pub async fn list(
    repo: &dyn Repository,
    filter: MenuFilter,
    paging: Pagination,
) -> Result<Page<MenuEntry>> {
    let filter = MenuFilter {
        title: filter.title.filter(|t| !t.is_empty()),
        path: filter.path.filter(|p| !p.is_empty()),
    };
    let (list, total) = repo
        .list_menus(&filter, paging.page_size, paging.offset())
        .await?;
    Ok(paging.wrap(list, total))
}

/// The full catalogue as a plain forest.
pub async fn tree(repo: &dyn Repository) -> Result<Vec<MenuNode>> {
    let entries = repo.all_menus().await?;
    Ok(build_tree(&entries, TreeMode::Plain))
}

/// create
///
/// Adds an entry under an existing parent (or at the top level).
pub async fn create(repo: &dyn Repository, req: CreateMenuRequest) -> Result<MenuEntry> {
    let entry = MenuEntry {
        parent_id: req.parent_id,
        title: req.title,
        name: req.name,
        path: req.path,
        component: req.component,
        icon: req.icon,
        hidden: req.hidden,
        sort: req.sort,
        kind: req.kind,
        permission_code: req.permission_code,
        ..MenuEntry::default()
    };
    validate(&entry)?;
    if let Some(parent_id) = entry.parent_id {
        get(repo, parent_id).await?;
    }

    let created = repo.insert_menu(entry).await?;
    tracing::info!(menu_id = created.id, kind = created.kind.as_str(), "menu created");
    Ok(created)
}

/// update
///
/// Merges the patch onto the stored entry, re-validates the result, and checks
/// a new parent the same way authority parents are checked.
pub async fn update(repo: &dyn Repository, id: MenuId, patch: UpdateMenuRequest) -> Result<MenuEntry> {
    let mut entry = get(repo, id).await?;

    if let Some(parent_id) = patch.parent_id {
        if parent_id == id {
            return Err(Error::Validation(format!("menu {id} cannot be its own parent")));
        }
        get(repo, parent_id).await?;
        let parents: HashMap<i64, Option<i64>> = repo
            .all_menus()
            .await?
            .into_iter()
            .map(|m| (m.id, m.parent_id))
            .collect();
        if introduces_cycle(id, parent_id, &parents) {
            tracing::warn!(menu_id = id, parent_id, "rejected cyclic menu parent");
            return Err(Error::Cycle { id, parent_id });
        }
        entry.parent_id = Some(parent_id);
    }
    if let Some(title) = patch.title {
        entry.title = title;
    }
    if let Some(name) = patch.name {
        entry.name = name;
    }
    if let Some(path) = patch.path {
        entry.path = path;
    }
    if let Some(component) = patch.component {
        entry.component = component;
    }
    if let Some(icon) = patch.icon {
        entry.icon = icon;
    }
    if let Some(hidden) = patch.hidden {
        entry.hidden = hidden;
    }
    if let Some(sort) = patch.sort {
        entry.sort = sort;
    }
    if let Some(kind) = patch.kind {
        entry.kind = kind;
    }
    if let Some(code) = patch.permission_code {
        entry.permission_code = Some(code);
    }

    validate(&entry)?;
    repo.update_menu(&entry).await?;
    tracing::info!(menu_id = id, "menu updated");
    get(repo, id).await
}

/// delete
///
/// Blocked while the entry still has children. Grants on it are dropped too.
pub async fn delete(repo: &dyn Repository, id: MenuId) -> Result<()> {
    get(repo, id).await?;
    let children = repo.count_menu_children(id).await?;
    if children > 0 {
        return Err(Error::Conflict(format!(
            "menu {id} still has {children} child entries"
        )));
    }
    if !repo.delete_menu(id).await? {
        return Err(Error::NotFound(format!("menu {id}")));
    }
    tracing::info!(menu_id = id, "menu deleted");
    Ok(())
}

fn validate(entry: &MenuEntry) -> Result<()> {
    if entry.title.trim().is_empty() {
        return Err(Error::Validation("menu title must not be empty".into()));
    }
    if entry.kind == MenuKind::Action
        && entry
            .permission_code
            .as_deref()
            .is_none_or(|c| c.trim().is_empty())
    {
        return Err(Error::Validation(
            "action entries require a permission code".into(),
        ));
    }
    Ok(())
}
