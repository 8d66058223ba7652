// Windows-only integration test that snapshots the calling process token
#![cfg(windows)]
#![allow(clippy::expect_used, reason = "Expect is not an issue in tests")]
#![allow(clippy::unwrap_used, reason = "Unwrap is not an issue in tests")]

use std::time::Duration;

use win_token_inspector::{
    Entry, InspectorConfig, OpenError, QueryClass, SnapshotAssembler, SubjectKind, TokenSubject,
    UNRESOLVED_PLACEHOLDER, query,
};

#[test]
fn current_process_groups_resolve() {
    let assembler =
        SnapshotAssembler::system(InspectorConfig::DEFAULT).expect("Failed to start resolvers");
    let token = TokenSubject::current_process().expect("Failed to open own token");
    let mut snapshot = assembler
        .build_snapshot(&token)
        .expect("Failed to snapshot own token");

    let groups: Vec<_> = snapshot
        .entries()
        .iter()
        .filter(|entry| matches!(entry, Entry::Group(_)))
        .collect();
    assert!(!groups.is_empty(), "Token without groups");

    while snapshot.pending() > 0 {
        assert!(
            snapshot.wait_update(Duration::from_secs(30), |_, _| {}),
            "Resolution did not settle"
        );
    }
    for (entry, item) in snapshot.entries().iter().enumerate() {
        if let Entry::Group(_) = item {
            let display = snapshot
                .display(win_token_inspector::EntryIndex::new(entry, 0))
                .unwrap();
            assert_ne!(display, UNRESOLVED_PLACEHOLDER);
        }
    }
}

#[test]
fn current_process_privileges_query() {
    let token = TokenSubject::current_process().unwrap();
    let buffer = query(QueryClass::Privileges, &token).unwrap();
    assert!(buffer.len() >= 4);
}

#[test]
fn missing_process_is_reported() {
    // Process ids are multiples of four; this one is never assigned.
    let error = TokenSubject::open(SubjectKind::Process(u32::MAX - 2)).unwrap_err();
    assert!(
        matches!(error, OpenError::NotFound | OpenError::AccessDenied),
        "{error:?}"
    );
}
