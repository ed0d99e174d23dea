use std::collections::BTreeMap;

use docpatch::{memory::InMemoryStore, prelude::*, serde_json::json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Schema, Document)]
#[serde(rename_all = "PascalCase")]
struct BlogPost {
    title: String,
    #[schema(nested)]
    author: Author,
    tags: Vec<String>,
    views: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    subtitle: Option<String>,
    #[schema(collection)]
    reactions: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Schema)]
#[serde(rename_all = "PascalCase")]
struct Author {
    name: String,
    #[serde(rename = "EmailAddress")]
    email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
#[document(collection = "RSSFeeds")]
struct Feed {
    url: String,
}

fn sample_post() -> BlogPost {
    BlogPost {
        title: "Hello".to_string(),
        author: Author {
            name: "Bob".to_string(),
            email: Some("bob@example.com".to_string()),
        },
        tags: vec!["intro".to_string()],
        views: 1,
        subtitle: None,
        reactions: BTreeMap::new(),
    }
}

#[tokio::test]
async fn patches_apply_to_stored_document() {
    let store = DocumentStore::new(InMemoryStore::new());
    let key = store.conventions().generate_document_key::<BlogPost>(1);
    assert_eq!(key, "blog-posts/1");

    let stored = store.commands().store(&key, &sample_post(), None).await.unwrap();

    let mut patch = store.patch::<BlogPost>(&key).unwrap();
    patch
        .set_if(&select!(BlogPost, |p| p.author.name).unwrap(), "Alice", "Bob")
        .unwrap()
        .unset(&select!(BlogPost, |p| p.author.email).unwrap())
        .unwrap()
        .add(&select!(BlogPost, |p| p.tags).unwrap(), "rust")
        .unwrap()
        .set(&select!(BlogPost, |p| p.views as u64).unwrap(), &2)
        .unwrap();

    let command = patch.build_with_etag(stored.etag().cloned().unwrap());
    let result = store.commands().patch(command, false).await.unwrap();
    assert_eq!(result.patch_result, Some(PatchResult::Patched));

    let backend = store.backend();
    let document = backend.document(&key).await.unwrap();
    assert_eq!(document["Author"], json!({"Name": "Alice"}));
    assert_eq!(document["Tags"], json!(["intro", "rust"]));
    assert_eq!(document["Views"], json!(2));

    let metadata = store.commands().load_metadata(&key).await.unwrap().unwrap();
    assert_ne!(metadata.etag(), stored.etag());
}

#[tokio::test]
async fn stale_etag_and_previous_value_are_conflicts() {
    let store = DocumentStore::new(InMemoryStore::new());
    let stored = store.commands().store("blog-posts/1", &sample_post(), None).await.unwrap();

    let mut patch = store.patch::<BlogPost>("blog-posts/1").unwrap();
    patch.set(&select!(BlogPost, |p| p.views).unwrap(), &5).unwrap();
    store.commands().patch(patch.build(), false).await.unwrap();

    let stale = patch.build_with_etag(stored.etag().cloned().unwrap());
    let result = store.commands().patch(stale, false).await;
    assert!(matches!(result, Err(DocumentStoreError::Concurrency { .. })));

    let mut guarded = store.patch::<BlogPost>("blog-posts/1").unwrap();
    guarded
        .set_if(&select!(BlogPost, |p| p.title).unwrap(), "Changed", "Not the title")
        .unwrap();
    let result = store.commands().patch(guarded.build(), false).await;
    assert!(matches!(result, Err(DocumentStoreError::Concurrency { .. })));
}

#[tokio::test]
async fn missing_documents_follow_ignore_missing() {
    let store = DocumentStore::new(InMemoryStore::new());

    let mut patch = store.patch::<BlogPost>("blog-posts/404").unwrap();
    patch.set(&select!(BlogPost, |p| p.title).unwrap(), "x").unwrap();

    let result = store.commands().patch(patch.build(), false).await;
    assert!(matches!(result, Err(DocumentStoreError::DocumentNotFound(_))));

    let result = store.commands().patch(patch.build(), true).await.unwrap();
    assert_eq!(result.patch_result, Some(PatchResult::DocumentDoesNotExist));
    assert!(!store.commands().exists("blog-posts/404").await.unwrap());
}

#[test]
fn patch_commands_serialize_to_wire_shape() {
    let store = DocumentStore::new(InMemoryStore::new());

    let mut patch = store.patch::<BlogPost>("blog-posts/1").unwrap();
    patch
        .set(&select!(BlogPost, |p| p.author.name).unwrap(), "Alice")
        .unwrap();

    assert_eq!(
        serde_json::to_value(Command::from(patch.build())).unwrap(),
        json!({
            "Method": "PATCH",
            "Key": "blog-posts/1",
            "Etag": null,
            "Patches": [{
                "Type": "Modify",
                "Name": "Author",
                "Nested": [{"Type": "Set", "Name": "Name", "Value": "Alice"}]
            }]
        })
    );
}

#[test]
fn selectors_are_checked_against_the_schema() {
    assert_eq!(
        select!(BlogPost, |p| p.author.email).unwrap().extract().unwrap().as_slice(),
        ["Author", "EmailAddress"]
    );
    assert!(matches!(
        select!(BlogPost, |p| p.title.len()),
        Ok(selector) if selector.extract().is_err()
    ));

    let store = DocumentStore::new(InMemoryStore::new());
    let mut patch = store.patch::<BlogPost>("blog-posts/1").unwrap();

    let result = patch.add(&select!(BlogPost, |p| p.title).unwrap(), "x");
    assert!(matches!(result, Err(DocumentStoreError::InvalidSelector { .. })));

    patch
        .add(&select!(BlogPost, |p| p.reactions).unwrap(), &json!({"Like": 1}))
        .unwrap();
    assert_eq!(patch.len(), 1);
}

#[test]
fn conventions_use_collection_override() {
    let conventions = Conventions::default();

    assert_eq!(conventions.find_type_tag_name::<Feed>(), "RSSFeeds");
    assert_eq!(conventions.document_key_prefix::<Feed>(), "rssfeeds");
    assert_eq!(conventions.find_type_tag_name::<BlogPost>(), "BlogPosts");
}

#[tokio::test]
async fn scripted_patches_reach_the_backend() {
    let store = DocumentStore::new(InMemoryStore::new());

    let command = store
        .script("blog-posts/1")
        .unwrap()
        .script("this.Views += views;")
        .unwrap()
        .parameters([("views", 1)])
        .unwrap()
        .build();

    let result = store.commands().scripted_patch(command, false).await;
    assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
}
