use dummyjson_portal::{
    models::{Address, User},
    storage::{FileSessionStore, SessionStore},
};
use tempfile::TempDir;

fn sample_user() -> User {
    User {
        id: 1,
        username: "emilys".to_string(),
        email: "emily.johnson@x.dummyjson.com".to_string(),
        first_name: "Emily".to_string(),
        last_name: "Johnson".to_string(),
        address: Some(Address {
            city: Some("Phoenix".to_string()),
            ..Address::default()
        }),
        access_token: Some("token".to_string()),
        ..User::default()
    }
}

fn store_in(dir: &TempDir) -> FileSessionStore {
    FileSessionStore::new(dir.path().join("session.json"))
}

#[tokio::test]
async fn test_missing_file_loads_as_no_session() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_saved_user_is_loaded_back() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_user()).await.unwrap();
    let loaded = store.load().await.unwrap().unwrap();

    assert_eq!(loaded, sample_user());
    // No temp file is left behind after the atomic rename.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_save_replaces_previous_user_wholesale() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_user()).await.unwrap();
    let other = User {
        id: 2,
        username: "michaelw".to_string(),
        ..User::default()
    };
    store.save(&other).await.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert_eq!(loaded.id, 2);
    assert!(loaded.address.is_none());
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    store.save(&sample_user()).await.unwrap();
    store.clear().await.unwrap();
    store.clear().await.unwrap();

    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), b"{not json").unwrap();

    assert!(store.load().await.is_err());
}

#[tokio::test]
async fn test_overlapping_saves_leave_one_valid_session() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let other = User {
        id: 2,
        username: "michaelw".to_string(),
        ..User::default()
    };

    let first_user = sample_user();
    let (first, second) = tokio::join!(store.save(&first_user), store.save(&other));
    first.unwrap();
    second.unwrap();

    let loaded = store.load().await.unwrap().unwrap();
    assert!(loaded.id == 1 || loaded.id == 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
