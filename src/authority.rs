//! Authority hierarchy management: role CRUD with the parent-chain invariants.

use crate::{
    error::{Error, Result},
    models::{
        Authority, AuthorityId, CreateAuthorityRequest, MenuId, Page, Pagination,
        UpdateAuthorityRequest,
    },
    repository::Repository,
    tree::introduces_cycle,
};
use std::collections::HashMap;

/// Landing route applied when a new authority does not name one.
pub const DEFAULT_ROUTE: &str = "dashboard";

/// get
///
/// Resolves an authority or fails with `NotFound`.
pub async fn get(repo: &dyn Repository, id: AuthorityId) -> Result<Authority> {
    repo.get_authority(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("authority {id}")))
}

pub async fn all(repo: &dyn Repository) -> Result<Vec<Authority>> {
    repo.all_authorities().await
}

/// list
///
/// One page of authorities whose name contains `name` (case-insensitive).
pub async fn list(
    repo: &dyn Repository,
    name: Option<&str>,
    paging: Pagination,
) -> Result<Page<Authority>> {
    let name = name.filter(|n| !n.is_empty());
    let (list, total) = repo
        .list_authorities(name, paging.page_size, paging.offset())
        .await?;
    Ok(paging.wrap(list, total))
}

/// create
///
/// Creates a role. Name and code are required, the code must be unused, and a
/// supplied parent must already exist. The id is always store-assigned.
pub async fn create(repo: &dyn Repository, req: CreateAuthorityRequest) -> Result<Authority> {
    if req.name.trim().is_empty() {
        return Err(Error::Validation("authority name must not be empty".into()));
    }
    if req.code.trim().is_empty() {
        return Err(Error::Validation("authority code must not be empty".into()));
    }
    if repo.find_authority_by_code(&req.code).await?.is_some() {
        return Err(Error::Conflict(format!(
            "authority code '{}' already exists",
            req.code
        )));
    }
    if let Some(parent_id) = req.parent_id {
        get(repo, parent_id).await?;
    }

    let default_route = req
        .default_route
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_ROUTE.to_string());

    let created = repo
        .insert_authority(Authority {
            name: req.name,
            code: req.code,
            parent_id: req.parent_id,
            default_route,
            ..Authority::default()
        })
        .await?;

    tracing::info!(
        authority_id = created.id,
        code = %created.code,
        parent_id = ?created.parent_id,
        "authority created"
    );
    Ok(created)
}

/// update
///
/// Applies a partial patch. Every check runs before anything is written:
/// code uniqueness (only when the code changes), then for a new parent the
/// self-parent, existence and ancestor-cycle checks, and finally that the
/// authority's current grants fit inside the new parent's.
pub async fn update(
    repo: &dyn Repository,
    id: AuthorityId,
    patch: UpdateAuthorityRequest,
) -> Result<Authority> {
    let mut authority = get(repo, id).await?;

    if let Some(name) = patch.name {
        if name.trim().is_empty() {
            return Err(Error::Validation("authority name must not be empty".into()));
        }
        authority.name = name;
    }

    if let Some(code) = patch.code {
        if code.trim().is_empty() {
            return Err(Error::Validation("authority code must not be empty".into()));
        }
        if code != authority.code {
            if let Some(other) = repo.find_authority_by_code(&code).await? {
                if other.id != id {
                    return Err(Error::Conflict(format!(
                        "authority code '{code}' already exists"
                    )));
                }
            }
        }
        authority.code = code;
    }

    if let Some(parent_id) = patch.parent_id {
        ensure_valid_parent(repo, id, parent_id).await?;
        authority.parent_id = Some(parent_id);
    }

    if let Some(route) = patch.default_route {
        authority.default_route = route;
    }

    repo.update_authority(&authority).await?;
    tracing::info!(authority_id = id, "authority updated");
    get(repo, id).await
}

/// delete
///
/// Refuses while users act under the authority or child authorities still
/// point at it. Its grants go with it.
pub async fn delete(repo: &dyn Repository, id: AuthorityId) -> Result<()> {
    get(repo, id).await?;

    let users = repo.count_users_with_authority(id).await?;
    if users > 0 {
        return Err(Error::Conflict(format!(
            "authority {id} is still assigned to {users} user(s)"
        )));
    }
    let children = repo.count_child_authorities(id).await?;
    if children > 0 {
        return Err(Error::Conflict(format!(
            "authority {id} still has {children} child authorities"
        )));
    }

    if !repo.delete_authority(id).await? {
        return Err(Error::NotFound(format!("authority {id}")));
    }
    tracing::info!(authority_id = id, "authority deleted");
    Ok(())
}

async fn ensure_valid_parent(
    repo: &dyn Repository,
    id: AuthorityId,
    parent_id: AuthorityId,
) -> Result<()> {
    if parent_id == id {
        return Err(Error::Validation(format!(
            "authority {id} cannot be its own parent"
        )));
    }
    get(repo, parent_id).await?;

    let parents: HashMap<i64, Option<i64>> = repo
        .all_authorities()
        .await?
        .into_iter()
        .map(|a| (a.id, a.parent_id))
        .collect();
    if introduces_cycle(id, parent_id, &parents) {
        tracing::warn!(authority_id = id, parent_id, "rejected cyclic authority parent");
        return Err(Error::Cycle { id, parent_id });
    }

    let held = repo.grants_for(id).await?;
    let parent_grants = repo.grants_for(parent_id).await?;
    let excess: Vec<MenuId> = held.difference(&parent_grants).copied().collect();
    if !excess.is_empty() {
        tracing::warn!(
            authority_id = id,
            parent_id,
            ?excess,
            "rejected parent lacking the authority's grants"
        );
        return Err(Error::Containment {
            authority_id: id,
            excess,
        });
    }
    Ok(())
}
