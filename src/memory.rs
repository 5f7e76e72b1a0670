use crate::{
    error::{Error, Result},
    models::{Authority, AuthorityId, MenuEntry, MenuFilter, MenuId, User, UserId},
    repository::{GrantTransaction, Repository},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

#[derive(Default)]
struct MemoryState {
    authorities: BTreeMap<AuthorityId, Authority>,
    menus: BTreeMap<MenuId, MenuEntry>,
    users: BTreeMap<UserId, User>,
    grants: BTreeSet<(AuthorityId, MenuId)>,
    last_authority_id: AuthorityId,
    last_menu_id: MenuId,
    // Grant inserts for this menu id fail with a store error.
    fail_grant_insert: Option<MenuId>,
}

/// MemoryRepository
///
/// An in-process `Repository` with the same observable semantics as the
/// Postgres store: store-assigned ids, unique authority codes, cascading grant
/// removal, and grant transactions that hold the write lock until they commit
/// or are dropped. Backs the test-suite.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `authority` under its own id, bypassing every service check.
    pub async fn seed_authority(&self, authority: Authority) {
        let mut state = self.state.write().await;
        state.last_authority_id = state.last_authority_id.max(authority.id);
        state.authorities.insert(authority.id, authority);
    }

    /// Stores `menu` under its own id, bypassing every service check.
    pub async fn seed_menu(&self, menu: MenuEntry) {
        let mut state = self.state.write().await;
        state.last_menu_id = state.last_menu_id.max(menu.id);
        state.menus.insert(menu.id, menu);
    }

    /// Writes grants directly, without the containment check.
    pub async fn seed_grants(&self, authority_id: AuthorityId, menu_ids: &[MenuId]) {
        let mut state = self.state.write().await;
        for &menu_id in menu_ids {
            state.grants.insert((authority_id, menu_id));
        }
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Makes every subsequent grant insert for `menu_id` fail mid-transaction.
    pub async fn fail_grant_insert_on(&self, menu_id: MenuId) {
        self.state.write().await.fail_grant_insert = Some(menu_id);
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.fail_grant_insert = None;
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_authority(&self, id: AuthorityId) -> Result<Option<Authority>> {
        Ok(self.state.read().await.authorities.get(&id).cloned())
    }

    async fn find_authority_by_code(&self, code: &str) -> Result<Option<Authority>> {
        let state = self.state.read().await;
        Ok(state.authorities.values().find(|a| a.code == code).cloned())
    }

    async fn all_authorities(&self) -> Result<Vec<Authority>> {
        Ok(self.state.read().await.authorities.values().cloned().collect())
    }

    async fn list_authorities(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Authority>, i64)> {
        let state = self.state.read().await;
        let matching: Vec<&Authority> = state
            .authorities
            .values()
            .filter(|a| name.is_none_or(|n| contains_ignore_case(&a.name, n)))
            .collect();
        let total = matching.len() as i64;
        let list = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((list, total))
    }

    async fn insert_authority(&self, mut authority: Authority) -> Result<Authority> {
        let mut state = self.state.write().await;
        if state.authorities.values().any(|a| a.code == authority.code) {
            return Err(Error::Conflict(format!(
                "authority code '{}' already exists",
                authority.code
            )));
        }
        state.last_authority_id += 1;
        let now = Utc::now();
        authority.id = state.last_authority_id;
        authority.created_at = now;
        authority.updated_at = now;
        state.authorities.insert(authority.id, authority.clone());
        Ok(authority)
    }

    async fn update_authority(&self, authority: &Authority) -> Result<()> {
        let mut state = self.state.write().await;
        if state
            .authorities
            .values()
            .any(|a| a.id != authority.id && a.code == authority.code)
        {
            return Err(Error::Conflict(format!(
                "authority code '{}' already exists",
                authority.code
            )));
        }
        if let Some(existing) = state.authorities.get_mut(&authority.id) {
            *existing = Authority {
                updated_at: Utc::now(),
                ..authority.clone()
            };
        }
        Ok(())
    }

    async fn delete_authority(&self, id: AuthorityId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.authorities.remove(&id).is_some();
        state.grants.retain(|(authority_id, _)| *authority_id != id);
        Ok(removed)
    }

    async fn count_child_authorities(&self, id: AuthorityId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .authorities
            .values()
            .filter(|a| a.parent_id == Some(id))
            .count() as i64)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn count_users_with_authority(&self, id: AuthorityId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.users.values().filter(|u| u.authority_id == id).count() as i64)
    }

    async fn get_menu(&self, id: MenuId) -> Result<Option<MenuEntry>> {
        Ok(self.state.read().await.menus.get(&id).cloned())
    }

    async fn all_menus(&self) -> Result<Vec<MenuEntry>> {
        let mut menus: Vec<MenuEntry> = self.state.read().await.menus.values().cloned().collect();
        // Map iteration is already id-ordered, so a stable sort gives (sort, id).
        menus.sort_by_key(|m| m.sort);
        Ok(menus)
    }

    async fn list_menus(
        &self,
        filter: &MenuFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MenuEntry>, i64)> {
        let matching: Vec<MenuEntry> = self
            .all_menus()
            .await?
            .into_iter()
            .filter(|m| {
                filter
                    .title
                    .as_deref()
                    .is_none_or(|t| contains_ignore_case(&m.title, t))
                    && filter
                        .path
                        .as_deref()
                        .is_none_or(|p| contains_ignore_case(&m.path, p))
            })
            .collect();
        let total = matching.len() as i64;
        let list = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((list, total))
    }

    async fn insert_menu(&self, mut menu: MenuEntry) -> Result<MenuEntry> {
        let mut state = self.state.write().await;
        state.last_menu_id += 1;
        let now = Utc::now();
        menu.id = state.last_menu_id;
        menu.created_at = now;
        menu.updated_at = now;
        state.menus.insert(menu.id, menu.clone());
        Ok(menu)
    }

    async fn update_menu(&self, menu: &MenuEntry) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.menus.get_mut(&menu.id) {
            *existing = MenuEntry {
                updated_at: Utc::now(),
                ..menu.clone()
            };
        }
        Ok(())
    }

    async fn delete_menu(&self, id: MenuId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.menus.remove(&id).is_some();
        state.grants.retain(|(_, menu_id)| *menu_id != id);
        Ok(removed)
    }

    async fn count_menu_children(&self, id: MenuId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .menus
            .values()
            .filter(|m| m.parent_id == Some(id))
            .count() as i64)
    }

    async fn grants_for(&self, authority_id: AuthorityId) -> Result<BTreeSet<MenuId>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .range((authority_id, MenuId::MIN)..=(authority_id, MenuId::MAX))
            .map(|(_, menu_id)| *menu_id)
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn GrantTransaction>> {
        let guard = self.state.clone().write_owned().await;
        let snapshot = guard.grants.clone();
        Ok(Box::new(MemoryGrantTransaction {
            guard,
            snapshot: Some(snapshot),
        }))
    }
}

/// MemoryGrantTransaction
///
/// Writes straight into the locked state and keeps a snapshot of the grant
/// table; dropping without `commit` restores the snapshot.
struct MemoryGrantTransaction {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    snapshot: Option<BTreeSet<(AuthorityId, MenuId)>>,
}

#[async_trait]
impl GrantTransaction for MemoryGrantTransaction {
    async fn delete_grants(&mut self, authority_id: AuthorityId) -> Result<()> {
        self.guard.grants.retain(|(a, _)| *a != authority_id);
        Ok(())
    }

    async fn revoke_grants(
        &mut self,
        authority_id: AuthorityId,
        menu_ids: &[MenuId],
    ) -> Result<()> {
        for menu_id in menu_ids {
            self.guard.grants.remove(&(authority_id, *menu_id));
        }
        Ok(())
    }

    async fn insert_grant(&mut self, authority_id: AuthorityId, menu_id: MenuId) -> Result<()> {
        if self.guard.fail_grant_insert == Some(menu_id) {
            return Err(Error::Store(
                format!("injected failure inserting grant ({authority_id}, {menu_id})").into(),
            ));
        }
        if !self.guard.authorities.contains_key(&authority_id)
            || !self.guard.menus.contains_key(&menu_id)
        {
            return Err(Error::Store(
                format!("foreign key violation for grant ({authority_id}, {menu_id})").into(),
            ));
        }
        self.guard.grants.insert((authority_id, menu_id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.snapshot = None;
        Ok(())
    }
}

impl Drop for MemoryGrantTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.guard.grants = snapshot;
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
