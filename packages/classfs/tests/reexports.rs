use std::sync::Arc;

use classfs::classfile::ClassFile;
use classfs::testing::MockRuntime;
use classfs::vfs::{Backing, DiskBacking};
use classfs::{ClassFileCodec, EventBus, Source, StoreConfig, Workspace};

#[test]
fn test_live_workspace_on_disk_backing() {
    let dir = tempfile::tempdir().unwrap();
    let backing = Arc::new(DiskBacking::new(dir.path()).unwrap());

    let runtime = Arc::new(MockRuntime::new());
    let bytes = ClassFile::synthetic("pkg/A", "java/lang/Object").unwrap().to_bytes();
    runtime.add_unit("pkg.A", Some(bytes.clone()));

    let ws = Workspace::open_with_backing(
        Source::Live(runtime),
        ClassFileCodec,
        backing.clone(),
        Arc::new(EventBus::new()),
        StoreConfig::default(),
    )
    .unwrap();

    ws.modify_class("pkg/A", |c| c.minor_version = 3).unwrap();
    ws.checkpoint().unwrap();

    // Raw slot and history slot are real files under the root.
    assert!(dir.path().join("pkg/A").is_file());
    assert_eq!(std::fs::read(dir.path().join("pkg/A.hst0")).unwrap(), bytes.to_vec());
    assert_eq!(backing.files().len(), 2);

    ws.undo("pkg/A").unwrap();
    assert_eq!(ws.class("pkg/A").unwrap().unwrap().minor_version, 0);
    assert!(!dir.path().join("pkg/A.hst0").exists());
}
