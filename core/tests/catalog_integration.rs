//! End-to-end tests across `BuiltinCatalog` + `MemoryInodeStore` +
//! `CachingCatalog`, exercising the public crate surface the way a caller
//! assembling a stack would (§8 scenarios 3 and 6).

use meridian_core::application::catalog::{BuiltinCatalog, Catalog};
use meridian_core::application::inode_store::InodeStore;
use meridian_core::application::plugin_manager::PluginManager;
use meridian_core::application::stack::StackInstance;
use meridian_core::domain::identity::{GroupInfo, UserInfo};
use meridian_core::domain::security::{SecurityContext, SecurityCredentials};
use meridian_core::infrastructure::inode::memory::MemoryInodeStore;
use std::sync::Arc;

fn ctx(uid: u32, gid: u32) -> SecurityContext {
    SecurityContext {
        user: UserInfo::new(uid, format!("u{uid}")),
        primary_group: GroupInfo::new(gid, format!("g{gid}")),
        groups: vec![],
        credentials: SecurityCredentials {
            mechanism: "x509".into(),
            client_name: format!("/CN=u{uid}"),
            remote_address: "127.0.0.1".into(),
            fqans: vec![],
            session_id: None,
        },
    }
}

fn catalog_for(store: Arc<dyn InodeStore>, uid: u32, gid: u32) -> (StackInstance, BuiltinCatalog) {
    let stack = StackInstance::new(Arc::new(PluginManager::new()));
    stack.set_security_context(ctx(uid, gid));
    let catalog = BuiltinCatalog::new(store, stack.handle());
    (stack, catalog)
}

/// Scenario 3: mode 0640, owner uid=100 gid=200.
#[tokio::test]
async fn scenario_3_permission_matrix_through_the_catalog() {
    let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
    let (_admin_stack, admin) = catalog_for(store.clone(), 0, 0);
    admin.set_mode("/", 0o777).await.unwrap();

    let (_owner_stack, owner) = catalog_for(store.clone(), 100, 200);
    owner.create("/f", 0o640).await.unwrap();
    owner.set_owner("/f", Some(100), Some(200)).await.unwrap();

    // owner: read/write ok via get_comment (read) and set_comment (write).
    owner.get_comment("/f").await.unwrap();
    owner.set_comment("/f", Some("hi".into())).await.unwrap();

    // same-group, non-owner: read ok (get_comment), write denied (set_mode).
    let (_grp_stack, grp) = catalog_for(store.clone(), 101, 200);
    grp.get_comment("/f").await.unwrap();
    assert!(grp.set_mode("/f", 0o600).await.is_err());

    // other: read denied.
    let (_other_stack, other) = catalog_for(store, 102, 201);
    assert!(other.get_comment("/f").await.is_err());
}

#[tokio::test]
async fn directory_iteration_lists_created_children() {
    let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
    let (_stack, catalog) = catalog_for(store, 0, 0);
    catalog.make_dir("/d", 0o755).await.unwrap();
    catalog.create("/d/a", 0o644).await.unwrap();
    catalog.create("/d/b", 0o644).await.unwrap();

    let mut handle = catalog.open_dir("/d").await.unwrap();
    let mut names = vec![];
    while let Some(entry) = handle.read_dir().unwrap() {
        names.push(entry.name);
    }
    names.sort();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    catalog.close_dir(&mut handle).await.unwrap();
    assert!(handle.read_dir().is_err());
}

/// Scenario 6 (cache invalidation), exercised against `CachingCatalog`
/// wrapping a `BuiltinCatalog`, with an in-process shared tier standing in
/// for the remote KV store per DESIGN.md's Open Questions note.
#[tokio::test]
async fn scenario_6_cache_invalidation_is_read_your_own_write() {
    use meridian_core::application::cache_overlay::CachingCatalog;
    use meridian_core::infrastructure::cache::local::LocalLru;
    use meridian_core::infrastructure::cache::shared::InProcessSharedCache;
    use std::time::Duration;

    let store: Arc<dyn InodeStore> = Arc::new(MemoryInodeStore::new());
    let (_stack, inner) = catalog_for(store, 0, 0);
    inner.create("/p", 0o644).await.unwrap();

    let local = Arc::new(LocalLru::new(64));
    let shared = Arc::new(InProcessSharedCache::new());
    let cached = CachingCatalog::new(Arc::new(inner), local, shared, Duration::from_secs(60));

    let before = cached.extended_stat("/p", true).await.unwrap();
    assert_eq!(before.mode, 0o644);

    cached.set_mode("/p", 0o700).await.unwrap();

    let after = cached.extended_stat("/p", true).await.unwrap();
    assert_eq!(after.mode, 0o700);
}
