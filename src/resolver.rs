use crate::{
    error::Result,
    grants,
    models::{AuthorityId, MenuId, MenuNode},
    repository::RepositoryState,
    tree::{TreeMode, build_tree},
};
use std::collections::BTreeSet;

/// MenuPolicy
///
/// Deployment-level choices for rendering a user's navigation when their
/// authority holds no explicit grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuPolicy {
    /// The one authority treated as all-access without explicit grants.
    pub root_authority_id: AuthorityId,
    /// Entries every signed-in user reaches regardless of configuration.
    pub bootstrap_menu_ids: BTreeSet<MenuId>,
}

impl Default for MenuPolicy {
    fn default() -> Self {
        Self {
            root_authority_id: 888,
            bootstrap_menu_ids: BTreeSet::from([1, 2]),
        }
    }
}

/// MenuResolver
///
/// Decides which menu tree a user acting under a given authority sees.
#[derive(Clone)]
pub struct MenuResolver {
    repo: RepositoryState,
    policy: MenuPolicy,
}

impl MenuResolver {
    pub fn new(repo: RepositoryState, policy: MenuPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &MenuPolicy {
        &self.policy
    }

    /// resolve
    ///
    /// Three-way policy:
    /// - explicit grants: the catalogue filtered to those grants;
    /// - no grants, root authority: the whole catalogue;
    /// - no grants, any other authority: only the bootstrap entries.
    ///
    /// An empty grant set therefore never means "everything" except for the
    /// configured root, and never locks a user out entirely.
    pub async fn resolve(&self, authority_id: AuthorityId) -> Result<Vec<MenuNode>> {
        let granted = grants::get_grants(self.repo.as_ref(), authority_id).await?;
        let entries = self.repo.all_menus().await?;

        if !granted.is_empty() {
            tracing::debug!(authority_id, grants = granted.len(), "resolving explicit grants");
            return Ok(build_tree(&entries, TreeMode::Filtered(&granted)));
        }
        if authority_id == self.policy.root_authority_id {
            tracing::debug!(authority_id, "root authority without grants, full menu");
            return Ok(build_tree(&entries, TreeMode::Plain));
        }
        tracing::debug!(authority_id, "no grants configured, bootstrap menu only");
        Ok(build_tree(
            &entries,
            TreeMode::Filtered(&self.policy.bootstrap_menu_ids),
        ))
    }
}
