use console_rbac::{
    Error, MemoryRepository,
    authority::{self, DEFAULT_ROUTE},
    grants,
    models::{
        Authority, CreateAuthorityRequest, MenuEntry, Pagination, UpdateAuthorityRequest, User,
    },
    repository::Repository,
};

// --- Helpers ---

fn create_req(name: &str, code: &str, parent_id: Option<i64>) -> CreateAuthorityRequest {
    CreateAuthorityRequest {
        name: name.to_string(),
        code: code.to_string(),
        parent_id,
        default_route: None,
    }
}

async fn seeded_repo() -> MemoryRepository {
    let repo = MemoryRepository::new();
    repo.seed_authority(Authority {
        id: 888,
        name: "Super Admin".into(),
        code: "super_admin".into(),
        default_route: "dashboard".into(),
        ..Authority::default()
    })
    .await;
    repo
}

// --- Create ---

#[tokio::test]
async fn test_create_assigns_id_and_default_route() {
    let repo = seeded_repo().await;

    let created = authority::create(&repo, create_req("Editor", "editor", Some(888)))
        .await
        .unwrap();

    assert!(created.id > 888, "ids are store-assigned after the seed");
    assert_eq!(created.parent_id, Some(888));
    assert_eq!(created.default_route, DEFAULT_ROUTE);
    assert_eq!(authority::get(&repo, created.id).await.unwrap(), created);
}

#[tokio::test]
async fn test_create_keeps_supplied_default_route() {
    let repo = seeded_repo().await;
    let mut req = create_req("Auditor", "auditor", None);
    req.default_route = Some("reports".into());

    let created = authority::create(&repo, req).await.unwrap();
    assert_eq!(created.default_route, "reports");
}

#[tokio::test]
async fn test_create_rejects_empty_name_and_code() {
    let repo = seeded_repo().await;

    let err = authority::create(&repo, create_req("  ", "x", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = authority::create(&repo, create_req("X", "", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_create_rejects_duplicate_code() {
    let repo = seeded_repo().await;

    let err = authority::create(&repo, create_req("Another Root", "super_admin", None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(repo.all_authorities().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_rejects_missing_parent() {
    let repo = seeded_repo().await;

    let err = authority::create(&repo, create_req("Orphan", "orphan", Some(4242)))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// --- Update ---

#[tokio::test]
async fn test_update_applies_only_supplied_fields() {
    let repo = seeded_repo().await;
    let editor = authority::create(&repo, create_req("Editor", "editor", Some(888)))
        .await
        .unwrap();

    let updated = authority::update(
        &repo,
        editor.id,
        UpdateAuthorityRequest {
            name: Some("Senior Editor".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.name, "Senior Editor");
    assert_eq!(updated.code, "editor");
    assert_eq!(updated.parent_id, Some(888));
}

#[tokio::test]
async fn test_update_rejects_self_parent() {
    let repo = seeded_repo().await;

    let err = authority::update(
        &repo,
        888,
        UpdateAuthorityRequest {
            parent_id: Some(888),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_update_rejects_cycle_through_descendant() {
    let repo = seeded_repo().await;
    let child = authority::create(&repo, create_req("Child", "child", Some(888)))
        .await
        .unwrap();
    let grandchild = authority::create(&repo, create_req("Grandchild", "grandchild", Some(child.id)))
        .await
        .unwrap();

    let err = authority::update(
        &repo,
        888,
        UpdateAuthorityRequest {
            parent_id: Some(grandchild.id),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Cycle { id: 888, parent_id } if parent_id == grandchild.id));
    // Nothing was written.
    assert_eq!(authority::get(&repo, 888).await.unwrap().parent_id, None);
}

#[tokio::test]
async fn test_update_allows_reparenting_to_sibling() {
    let repo = seeded_repo().await;
    let a = authority::create(&repo, create_req("A", "a", Some(888)))
        .await
        .unwrap();
    let b = authority::create(&repo, create_req("B", "b", Some(888)))
        .await
        .unwrap();

    let moved = authority::update(
        &repo,
        b.id,
        UpdateAuthorityRequest {
            parent_id: Some(a.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.parent_id, Some(a.id));
}

#[tokio::test]
async fn test_reparent_rejected_when_new_parent_lacks_grants() {
    let repo = seeded_repo().await;
    for id in [10, 20] {
        repo.seed_menu(MenuEntry {
            id,
            title: format!("Menu {id}"),
            ..MenuEntry::default()
        })
        .await;
    }
    let a = authority::create(&repo, create_req("A", "a", None)).await.unwrap();
    let b = authority::create(&repo, create_req("B", "b", None)).await.unwrap();
    grants::replace(&repo, a.id, [10]).await.unwrap();
    grants::replace(&repo, b.id, [10, 20]).await.unwrap();

    let err = authority::update(
        &repo,
        b.id,
        UpdateAuthorityRequest {
            parent_id: Some(a.id),
            name: Some("Renamed".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    match err {
        Error::Containment {
            authority_id,
            excess,
        } => {
            assert_eq!(authority_id, b.id);
            assert_eq!(excess, vec![20]);
        }
        other => panic!("expected containment error, got {other:?}"),
    }
    // Nothing from the patch was written.
    let unchanged = authority::get(&repo, b.id).await.unwrap();
    assert_eq!(unchanged.parent_id, None);
    assert_eq!(unchanged.name, "B");

    // Once the child fits inside the parent the move goes through.
    grants::replace(&repo, b.id, [10]).await.unwrap();
    let moved = authority::update(
        &repo,
        b.id,
        UpdateAuthorityRequest {
            parent_id: Some(a.id),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.parent_id, Some(a.id));
}

#[tokio::test]
async fn test_update_code_conflict_and_unchanged_code() {
    let repo = seeded_repo().await;
    let editor = authority::create(&repo, create_req("Editor", "editor", None))
        .await
        .unwrap();

    let err = authority::update(
        &repo,
        editor.id,
        UpdateAuthorityRequest {
            code: Some("super_admin".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    // Re-sending the authority's own code is not a conflict.
    let same = authority::update(
        &repo,
        editor.id,
        UpdateAuthorityRequest {
            code: Some("editor".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(same.code, "editor");
}

#[tokio::test]
async fn test_update_rejects_empty_name() {
    let repo = seeded_repo().await;
    let err = authority::update(
        &repo,
        888,
        UpdateAuthorityRequest {
            name: Some(String::new()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_update_unknown_authority_is_not_found() {
    let repo = seeded_repo().await;
    let err = authority::update(&repo, 1, UpdateAuthorityRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// --- Delete ---

#[tokio::test]
async fn test_delete_blocked_while_users_assigned() {
    let repo = seeded_repo().await;
    let editor = authority::create(&repo, create_req("Editor", "editor", None))
        .await
        .unwrap();
    repo.insert_user(User {
        id: 1,
        username: "alice".into(),
        authority_id: editor.id,
    })
    .await;

    let err = authority::delete(&repo, editor.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert!(repo.get_authority(editor.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_blocked_while_children_exist() {
    let repo = seeded_repo().await;
    authority::create(&repo, create_req("Child", "child", Some(888)))
        .await
        .unwrap();

    let err = authority::delete(&repo, 888).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_delete_removes_grants() {
    let repo = seeded_repo().await;
    repo.seed_menu(MenuEntry {
        id: 1,
        title: "Dashboard".into(),
        ..MenuEntry::default()
    })
    .await;
    let editor = authority::create(&repo, create_req("Editor", "editor", None))
        .await
        .unwrap();
    grants::replace(&repo, editor.id, [1]).await.unwrap();

    authority::delete(&repo, editor.id).await.unwrap();

    assert!(repo.get_authority(editor.id).await.unwrap().is_none());
    assert!(repo.grants_for(editor.id).await.unwrap().is_empty());
    let err = authority::delete(&repo, editor.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// --- Listing ---

#[tokio::test]
async fn test_list_filters_and_pages() {
    let repo = seeded_repo().await;
    for i in 0..5 {
        authority::create(&repo, create_req(&format!("Editor {i}"), &format!("editor_{i}"), None))
            .await
            .unwrap();
    }

    let page = authority::list(&repo, Some("editor"), Pagination::new(Some(2), Some(2)))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.page, 2);
    assert_eq!(page.list.len(), 2);
    assert_eq!(page.list[0].name, "Editor 2");

    // Empty filter lists everything.
    let all = authority::list(&repo, Some(""), Pagination::new(None, None))
        .await
        .unwrap();
    assert_eq!(all.total, 6);
}

#[test]
fn test_pagination_normalisation() {
    let p = Pagination::new(Some(0), Some(1000));
    assert_eq!(p.page, 1);
    assert_eq!(p.page_size, Pagination::MAX_PAGE_SIZE);
    assert_eq!(p.offset(), 0);

    let p = Pagination::new(Some(3), None);
    assert_eq!(p.page_size, Pagination::DEFAULT_PAGE_SIZE);
    assert_eq!(p.offset(), 20);

    let p = Pagination::new(Some(i64::MAX), Some(100));
    assert_eq!(p.offset(), i64::MAX);
}
