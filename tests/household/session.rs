//! Session persistence through the file store.

use std::sync::Arc;

use household_sync::error::SessionError;
use household_sync::household::{
    FileStore, KeyValueStore, SessionContext, SessionUser, Theme, THEME_KEY, USER_KEY,
};
use household_sync::types::RecordId;

fn ben() -> SessionUser {
    SessionUser {
        id: RecordId::from("8"),
        name: "Ben".into(),
        is_admin: true,
    }
}

#[test]
fn session_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("session.json");

    {
        let mut ctx = SessionContext::load(Arc::new(FileStore::new(&path))).unwrap();
        ctx.sign_in(ben()).unwrap();
        ctx.set_theme(Theme::Dark).unwrap();
    }

    let ctx = SessionContext::load(Arc::new(FileStore::new(&path))).unwrap();
    assert_eq!(ctx.user(), Some(&ben()));
    assert!(ctx.is_admin());
    assert_eq!(ctx.theme(), Theme::Dark);
}

#[test]
fn clear_removes_user_but_keeps_theme() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = Arc::new(FileStore::new(&path));

    let mut ctx = SessionContext::load(store.clone()).unwrap();
    ctx.sign_in(ben()).unwrap();
    ctx.toggle_theme().unwrap();
    ctx.clear().unwrap();

    assert!(store.get(USER_KEY).unwrap().is_none());
    assert_eq!(store.get(THEME_KEY).unwrap().as_deref(), Some("dark"));
    let reloaded = SessionContext::load(store).unwrap();
    assert!(reloaded.user().is_none());
    assert_eq!(reloaded.theme(), Theme::Dark);
}

#[test]
fn missing_file_is_a_fresh_session() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = SessionContext::load(Arc::new(FileStore::new(dir.path().join("none.json")))).unwrap();
    assert!(ctx.user().is_none());
    assert_eq!(ctx.theme(), Theme::Light);
}

#[test]
fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not json").unwrap();
    let result = SessionContext::load(Arc::new(FileStore::new(&path)));
    assert!(matches!(result, Err(SessionError::Corrupt(_))));
}
