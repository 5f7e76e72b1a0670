use console_rbac::{
    Error, MemoryRepository,
    grants, menu,
    models::{
        Authority, CreateMenuRequest, MenuFilter, MenuKind, Pagination, UpdateMenuRequest,
    },
    repository::Repository,
};

fn page(title: &str, parent_id: Option<i64>, sort: i32) -> CreateMenuRequest {
    CreateMenuRequest {
        parent_id,
        title: title.to_string(),
        name: title.to_lowercase(),
        path: format!("/{}", title.to_lowercase()),
        sort,
        ..CreateMenuRequest::default()
    }
}

#[tokio::test]
async fn test_create_page_and_action() {
    let repo = MemoryRepository::new();
    let system = menu::create(&repo, page("System", None, 1)).await.unwrap();

    let button = menu::create(
        &repo,
        CreateMenuRequest {
            parent_id: Some(system.id),
            title: "Delete user".into(),
            kind: MenuKind::Action,
            permission_code: Some("user:delete".into()),
            ..CreateMenuRequest::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(button.parent_id, Some(system.id));
    assert_eq!(button.kind, MenuKind::Action);
    assert_ne!(button.id, system.id);
}

#[tokio::test]
async fn test_create_validations() {
    let repo = MemoryRepository::new();

    let err = menu::create(&repo, page(" ", None, 0)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = menu::create(
        &repo,
        CreateMenuRequest {
            title: "Export".into(),
            kind: MenuKind::Action,
            permission_code: None,
            ..CreateMenuRequest::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = menu::create(&repo, page("Lost", Some(77), 0)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_update_merges_and_revalidates() {
    let repo = MemoryRepository::new();
    let entry = menu::create(&repo, page("Reports", None, 1)).await.unwrap();

    let updated = menu::update(
        &repo,
        entry.id,
        UpdateMenuRequest {
            icon: Some("chart".into()),
            sort: Some(9),
            ..UpdateMenuRequest::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.icon, "chart");
    assert_eq!(updated.sort, 9);
    assert_eq!(updated.title, "Reports");

    // Switching to an action without a permission code is invalid.
    let err = menu::update(
        &repo,
        entry.id,
        UpdateMenuRequest {
            kind: Some(MenuKind::Action),
            ..UpdateMenuRequest::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(menu::get(&repo, entry.id).await.unwrap().kind, MenuKind::Page);
}

#[tokio::test]
async fn test_update_rejects_self_and_cyclic_parent() {
    let repo = MemoryRepository::new();
    let top = menu::create(&repo, page("Top", None, 0)).await.unwrap();
    let mid = menu::create(&repo, page("Mid", Some(top.id), 0)).await.unwrap();
    let leaf = menu::create(&repo, page("Leaf", Some(mid.id), 0)).await.unwrap();

    let err = menu::update(
        &repo,
        top.id,
        UpdateMenuRequest {
            parent_id: Some(top.id),
            ..UpdateMenuRequest::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = menu::update(
        &repo,
        top.id,
        UpdateMenuRequest {
            parent_id: Some(leaf.id),
            ..UpdateMenuRequest::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Cycle { .. }));
}

#[tokio::test]
async fn test_delete_blocked_by_children_and_drops_grants() {
    let repo = MemoryRepository::new();
    repo.seed_authority(Authority {
        id: 888,
        code: "root".into(),
        name: "Root".into(),
        ..Authority::default()
    })
    .await;
    let parent = menu::create(&repo, page("Parent", None, 0)).await.unwrap();
    let child = menu::create(&repo, page("Child", Some(parent.id), 0)).await.unwrap();
    grants::replace(&repo, 888, [parent.id, child.id]).await.unwrap();

    let err = menu::delete(&repo, parent.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    menu::delete(&repo, child.id).await.unwrap();
    assert_eq!(
        repo.grants_for(888).await.unwrap().into_iter().collect::<Vec<_>>(),
        vec![parent.id]
    );

    let err = menu::delete(&repo, child.id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_list_and_tree() {
    let repo = MemoryRepository::new();
    let system = menu::create(&repo, page("System", None, 2)).await.unwrap();
    menu::create(&repo, page("Users", Some(system.id), 1)).await.unwrap();
    menu::create(&repo, page("Dashboard", None, 1)).await.unwrap();

    let filtered = menu::list(
        &repo,
        MenuFilter {
            title: Some("user".into()),
            path: None,
        },
        Pagination::new(None, None),
    )
    .await
    .unwrap();
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.list[0].title, "Users");

    let tree = menu::tree(&repo).await.unwrap();
    let top: Vec<&str> = tree.iter().map(|n| n.entry.title.as_str()).collect();
    assert_eq!(top, vec!["Dashboard", "System"]);
    assert_eq!(tree[1].children[0].entry.title, "Users");
}
