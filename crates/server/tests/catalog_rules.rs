//! Category tree rules, exercised through the catalog service over the
//! in-memory store.

#![allow(clippy::unwrap_used)]

mod common;

use souq_core::CategoryId;
use souq_server::services::CatalogError;
use souq_server::services::catalog::CategoryInput;

fn input(name: &str, parent_id: Option<CategoryId>) -> CategoryInput {
    CategoryInput {
        name: name.to_owned(),
        slug: None,
        description: None,
        image: String::new(),
        parent_id,
        sort_order: 0,
        is_active: None,
    }
}

#[tokio::test]
async fn parent_cycle_is_rejected() {
    let state = common::test_state();
    let catalog = state.catalog();

    let root = catalog.create_category(input("Root", None)).await.unwrap();
    let child = catalog
        .create_category(input("Child", Some(root.id)))
        .await
        .unwrap();
    let grandchild = catalog
        .create_category(input("Grandchild", Some(child.id)))
        .await
        .unwrap();

    // Reparenting the root under its own grandchild closes a loop.
    let err = catalog
        .update_category(root.id, input("Root", Some(grandchild.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::CategoryCycle));

    // A category cannot be its own parent either.
    let err = catalog
        .update_category(root.id, input("Root", Some(root.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::CategoryCycle));

    // Legitimate reparenting still works.
    let moved = catalog
        .update_category(grandchild.id, input("Grandchild", Some(root.id)))
        .await
        .unwrap();
    assert_eq!(moved.parent_id, Some(root.id));
}

#[tokio::test]
async fn unknown_parent_is_rejected() {
    let state = common::test_state();
    let catalog = state.catalog();

    let err = catalog
        .create_category(input("Orphan", Some(CategoryId::generate())))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::UnknownCategory));
}

#[tokio::test]
async fn deleting_a_parent_detaches_children() {
    let state = common::test_state();
    let catalog = state.catalog();

    let root = catalog.create_category(input("Root", None)).await.unwrap();
    let child = catalog
        .create_category(input("Child", Some(root.id)))
        .await
        .unwrap();

    catalog.delete_category(root.id).await.unwrap();

    let child = state.store().category(child.id).await.unwrap().unwrap();
    assert_eq!(child.parent_id, None);
}

#[tokio::test]
async fn duplicate_slugs_conflict() {
    let state = common::test_state();
    let catalog = state.catalog();

    catalog.create_category(input("Honey", None)).await.unwrap();
    let err = catalog
        .create_category(input("Honey", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::Store(_)));
}
