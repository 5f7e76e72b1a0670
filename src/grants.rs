//! Permission assignment: which menu entries an authority may use.
//!
//! Grants are only ever written here, and only as a whole: `replace` checks the
//! containment invariant (a child never holds what its parent lacks) once,
//! up front, and then swaps the authority's grant set inside one transaction.

use crate::{
    authority,
    error::{Error, Result},
    models::{Authority, AuthorityId, GrantMatrix, MenuId},
    repository::Repository,
    tree::{TreeMode, build_tree},
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// get_grants
///
/// The ids granted to an authority. Fails with `NotFound` for an unknown authority.
pub async fn get_grants(repo: &dyn Repository, authority_id: AuthorityId) -> Result<BTreeSet<MenuId>> {
    authority::get(repo, authority_id).await?;
    repo.grants_for(authority_id).await
}

/// grant_matrix
///
/// The permission-editor view: granted ids plus the whole catalogue with
/// each node marked `checked` when granted.
pub async fn grant_matrix(repo: &dyn Repository, authority_id: AuthorityId) -> Result<GrantMatrix> {
    let granted = get_grants(repo, authority_id).await?;
    let entries = repo.all_menus().await?;
    Ok(GrantMatrix {
        menus: build_tree(&entries, TreeMode::Checked(&granted)),
        menu_ids: granted.into_iter().collect(),
    })
}

/// replace
///
/// Replaces every grant of `authority_id` with `menu_ids`.
///
/// 1. The authority and every requested entry must exist (`NotFound`).
/// 2. With a parent, the new set must be a subset of the parent's current
///    grants (`Containment`); nothing is written otherwise.
/// 3. Inside one transaction: drop the old grants, insert the new ones, and
///    revoke whatever the authority lost from all of its descendants so the
///    invariant keeps holding below it. Any failure rolls the whole set back.
///
/// The parent's grants are read before the transaction opens; two concurrent
/// replacements on a parent and its child can interleave between that read
/// and the commit.
pub async fn replace(
    repo: &dyn Repository,
    authority_id: AuthorityId,
    menu_ids: impl IntoIterator<Item = MenuId>,
) -> Result<()> {
    let requested: BTreeSet<MenuId> = menu_ids.into_iter().collect();
    let target = authority::get(repo, authority_id).await?;

    let known: HashSet<MenuId> = repo.all_menus().await?.into_iter().map(|m| m.id).collect();
    let unknown: Vec<MenuId> = requested
        .iter()
        .filter(|id| !known.contains(id))
        .copied()
        .collect();
    if !unknown.is_empty() {
        return Err(Error::NotFound(format!("menus {unknown:?}")));
    }

    if let Some(parent_id) = target.parent_id {
        let parent_grants = repo.grants_for(parent_id).await?;
        let excess: Vec<MenuId> = requested.difference(&parent_grants).copied().collect();
        if !excess.is_empty() {
            tracing::warn!(
                authority_id,
                parent_id,
                ?excess,
                "rejected grants exceeding parent authority"
            );
            return Err(Error::Containment {
                authority_id,
                excess,
            });
        }
    }

    let previous = repo.grants_for(authority_id).await?;
    let revoked: Vec<MenuId> = previous.difference(&requested).copied().collect();
    let descendants = if revoked.is_empty() {
        Vec::new()
    } else {
        descendants_of(&repo.all_authorities().await?, authority_id)
    };

    let mut tx = repo.begin().await?;
    tx.delete_grants(authority_id).await?;
    for &menu_id in &requested {
        tx.insert_grant(authority_id, menu_id).await?;
    }
    for &child in &descendants {
        tx.revoke_grants(child, &revoked).await?;
    }
    tx.commit().await?;

    tracing::info!(
        authority_id,
        granted = requested.len(),
        revoked = revoked.len(),
        descendants = descendants.len(),
        "grants replaced"
    );
    Ok(())
}

/// Every authority below `root`. Each id is visited once, so a pre-existing
/// loop in the stored hierarchy cannot stall the walk.
fn descendants_of(authorities: &[Authority], root: AuthorityId) -> Vec<AuthorityId> {
    let mut children: HashMap<AuthorityId, Vec<AuthorityId>> = HashMap::new();
    for a in authorities {
        if let Some(parent_id) = a.parent_id {
            children.entry(parent_id).or_default().push(a.id);
        }
    }

    let mut seen = HashSet::from([root]);
    let mut out = Vec::new();
    let mut queue = vec![root];
    while let Some(id) = queue.pop() {
        for &child in children.get(&id).into_iter().flatten() {
            if seen.insert(child) {
                out.push(child);
                queue.push(child);
            }
        }
    }
    out
}
