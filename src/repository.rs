use crate::{
    error::Result,
    models::{Authority, AuthorityId, MenuEntry, MenuFilter, MenuId, User, UserId},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction, query_builder::QueryBuilder};
use std::{collections::BTreeSet, sync::Arc};

/// Repository Trait
///
/// The persistence contract the authorization core consumes. Every call is a
/// potential suspension point and may fail; failures come back as
/// `Error::Store` and are never retried here.
///
/// Writes that must land together (grant replacement) go through
/// [`Repository::begin`], which hands out a [`GrantTransaction`].
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Authorities ---
    async fn get_authority(&self, id: AuthorityId) -> Result<Option<Authority>>;
    async fn find_authority_by_code(&self, code: &str) -> Result<Option<Authority>>;
    // Every authority; used for hierarchy walks.
    async fn all_authorities(&self) -> Result<Vec<Authority>>;
    // Name-substring filtered page plus the unpaged total.
    async fn list_authorities(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Authority>, i64)>;
    // Inserts with a store-assigned id; the incoming `id` is ignored.
    async fn insert_authority(&self, authority: Authority) -> Result<Authority>;
    async fn update_authority(&self, authority: &Authority) -> Result<()>;
    // Removes the authority together with its grants.
    async fn delete_authority(&self, id: AuthorityId) -> Result<bool>;
    async fn count_child_authorities(&self, id: AuthorityId) -> Result<i64>;

    // --- Users ---
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn count_users_with_authority(&self, id: AuthorityId) -> Result<i64>;

    // --- Menu Entries ---
    async fn get_menu(&self, id: MenuId) -> Result<Option<MenuEntry>>;
    // Every entry, ordered by (sort, id).
    async fn all_menus(&self) -> Result<Vec<MenuEntry>>;
    async fn list_menus(
        &self,
        filter: &MenuFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MenuEntry>, i64)>;
    async fn insert_menu(&self, menu: MenuEntry) -> Result<MenuEntry>;
    async fn update_menu(&self, menu: &MenuEntry) -> Result<()>;
    // Removes the entry together with every grant that references it.
    async fn delete_menu(&self, id: MenuId) -> Result<bool>;
    async fn count_menu_children(&self, id: MenuId) -> Result<i64>;

    // --- Grants ---
    async fn grants_for(&self, authority_id: AuthorityId) -> Result<BTreeSet<MenuId>>;
    async fn begin(&self) -> Result<Box<dyn GrantTransaction>>;
}

/// GrantTransaction
///
/// An open all-or-nothing unit of grant writes. Nothing is visible to other
/// readers until `commit`; dropping the value without committing rolls every
/// write back.
#[async_trait]
pub trait GrantTransaction: Send {
    // Removes every grant held by the authority.
    async fn delete_grants(&mut self, authority_id: AuthorityId) -> Result<()>;
    // Removes only the listed grants from the authority.
    async fn revoke_grants(&mut self, authority_id: AuthorityId, menu_ids: &[MenuId])
    -> Result<()>;
    async fn insert_grant(&mut self, authority_id: AuthorityId, menu_id: MenuId) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const AUTHORITY_COLUMNS: &str =
    "id, name, code, parent_id, default_route, created_at, updated_at";
const MENU_COLUMNS: &str = "id, parent_id, title, name, path, component, icon, hidden, sort, \
     kind, permission_code, created_at, updated_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Queries are checked at
/// runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the shared `WHERE` clause for menu listings to `builder`.
fn push_menu_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &MenuFilter) {
    builder.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        builder.push(" AND title ILIKE ");
        builder.push_bind(format!("%{}%", title));
    }
    if let Some(path) = &filter.path {
        builder.push(" AND path ILIKE ");
        builder.push_bind(format!("%{}%", path));
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_authority(&self, id: AuthorityId) -> Result<Option<Authority>> {
        let sql = format!("SELECT {AUTHORITY_COLUMNS} FROM authorities WHERE id = $1");
        Ok(sqlx::query_as::<_, Authority>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_authority_by_code(&self, code: &str) -> Result<Option<Authority>> {
        let sql = format!("SELECT {AUTHORITY_COLUMNS} FROM authorities WHERE code = $1");
        Ok(sqlx::query_as::<_, Authority>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn all_authorities(&self) -> Result<Vec<Authority>> {
        let sql = format!("SELECT {AUTHORITY_COLUMNS} FROM authorities ORDER BY id");
        Ok(sqlx::query_as::<_, Authority>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// list_authorities
    ///
    /// Uses QueryBuilder so the optional name filter stays parameterised.
    async fn list_authorities(
        &self,
        name: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Authority>, i64)> {
        let pattern = name.map(|n| format!("%{}%", n));

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM authorities");
        if let Some(p) = &pattern {
            count.push(" WHERE name ILIKE ");
            count.push_bind(p.clone());
        }
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {AUTHORITY_COLUMNS} FROM authorities"));
        if let Some(p) = pattern {
            builder.push(" WHERE name ILIKE ");
            builder.push_bind(p);
        }
        builder.push(" ORDER BY id LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let list = builder
            .build_query_as::<Authority>()
            .fetch_all(&self.pool)
            .await?;
        Ok((list, total))
    }

    async fn insert_authority(&self, authority: Authority) -> Result<Authority> {
        let sql = format!(
            "INSERT INTO authorities (name, code, parent_id, default_route, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {AUTHORITY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Authority>(&sql)
            .bind(&authority.name)
            .bind(&authority.code)
            .bind(authority.parent_id)
            .bind(&authority.default_route)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_authority(&self, authority: &Authority) -> Result<()> {
        sqlx::query(
            "UPDATE authorities SET name = $2, code = $3, parent_id = $4, default_route = $5, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(authority.id)
        .bind(&authority.name)
        .bind(&authority.code)
        .bind(authority.parent_id)
        .bind(&authority.default_route)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_authority(&self, id: AuthorityId) -> Result<bool> {
        // Grants go through ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM authorities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_child_authorities(&self, id: AuthorityId) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM authorities WHERE parent_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT id, username, authority_id FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn count_users_with_authority(&self, id: AuthorityId) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE authority_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn get_menu(&self, id: MenuId) -> Result<Option<MenuEntry>> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM menus WHERE id = $1");
        Ok(sqlx::query_as::<_, MenuEntry>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn all_menus(&self) -> Result<Vec<MenuEntry>> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM menus ORDER BY sort ASC, id ASC");
        Ok(sqlx::query_as::<_, MenuEntry>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_menus(
        &self,
        filter: &MenuFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MenuEntry>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM menus");
        push_menu_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {MENU_COLUMNS} FROM menus"));
        push_menu_filter(&mut builder, filter);
        builder.push(" ORDER BY sort ASC, id ASC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let list = builder
            .build_query_as::<MenuEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok((list, total))
    }

    async fn insert_menu(&self, menu: MenuEntry) -> Result<MenuEntry> {
        let sql = format!(
            "INSERT INTO menus (parent_id, title, name, path, component, icon, hidden, sort, kind, \
             permission_code, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) RETURNING {MENU_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, MenuEntry>(&sql)
            .bind(menu.parent_id)
            .bind(&menu.title)
            .bind(&menu.name)
            .bind(&menu.path)
            .bind(&menu.component)
            .bind(&menu.icon)
            .bind(menu.hidden)
            .bind(menu.sort)
            .bind(menu.kind.as_str())
            .bind(&menu.permission_code)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn update_menu(&self, menu: &MenuEntry) -> Result<()> {
        sqlx::query(
            "UPDATE menus SET parent_id = $2, title = $3, name = $4, path = $5, component = $6, \
             icon = $7, hidden = $8, sort = $9, kind = $10, permission_code = $11, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(menu.id)
        .bind(menu.parent_id)
        .bind(&menu.title)
        .bind(&menu.name)
        .bind(&menu.path)
        .bind(&menu.component)
        .bind(&menu.icon)
        .bind(menu.hidden)
        .bind(menu.sort)
        .bind(menu.kind.as_str())
        .bind(&menu.permission_code)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_menu(&self, id: MenuId) -> Result<bool> {
        let res = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_menu_children(&self, id: MenuId) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM menus WHERE parent_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn grants_for(&self, authority_id: AuthorityId) -> Result<BTreeSet<MenuId>> {
        let ids: Vec<MenuId> =
            sqlx::query_scalar("SELECT menu_id FROM authority_menus WHERE authority_id = $1")
                .bind(authority_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn begin(&self) -> Result<Box<dyn GrantTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgGrantTransaction { tx }))
    }
}

/// PgGrantTransaction
///
/// Wraps a sqlx transaction; sqlx rolls back on drop when `commit` was never reached.
struct PgGrantTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GrantTransaction for PgGrantTransaction {
    async fn delete_grants(&mut self, authority_id: AuthorityId) -> Result<()> {
        sqlx::query("DELETE FROM authority_menus WHERE authority_id = $1")
            .bind(authority_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn revoke_grants(
        &mut self,
        authority_id: AuthorityId,
        menu_ids: &[MenuId],
    ) -> Result<()> {
        sqlx::query("DELETE FROM authority_menus WHERE authority_id = $1 AND menu_id = ANY($2)")
            .bind(authority_id)
            .bind(menu_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_grant(&mut self, authority_id: AuthorityId, menu_id: MenuId) -> Result<()> {
        sqlx::query("INSERT INTO authority_menus (authority_id, menu_id) VALUES ($1, $2)")
            .bind(authority_id)
            .bind(menu_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
