//! End-to-end resolution against synthetic installations

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

mod common;

use casclite_crypto::ContentKey;
use casclite_storage::{
    ArchiveError, ArchiveSpan, BlockDecoder, CascHandler, LoadPhase, LocaleFlags,
    PassthroughDecoder, StorageError,
};
use common::{InstallBuilder, read};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn open_resolves_enus_file_to_archive_span() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"hello from a/b")
        .build();
    let handler = CascHandler::open(install.config.clone()).expect("installation opens");

    let (offset, size) = install.records[0];
    assert_eq!(offset, 0);
    let span = handler.locate("a\\b.txt", LocaleFlags::ENUS).unwrap();
    assert_eq!(
        span,
        ArchiveSpan {
            archive_id: 0,
            offset: u64::from(offset) + 30,
            length: u64::from(size) - 30,
        }
    );

    let mut content = Vec::new();
    handler
        .open_file("a\\b.txt", LocaleFlags::ENUS)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, b"hello from a/b");
}

#[test]
fn any_intersecting_locale_bit_resolves_the_same_bytes() {
    let install = InstallBuilder::new()
        .file("x\\shared.dbc", LocaleFlags::ENUS | LocaleFlags::ENGB, b"shared")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    let us = handler.locate("x\\shared.dbc", LocaleFlags::ENUS).unwrap();
    let gb = handler.locate("x\\shared.dbc", LocaleFlags::ENGB).unwrap();
    let all = handler.locate("x\\shared.dbc", LocaleFlags::ALL).unwrap();
    assert_eq!(us, gb);
    assert_eq!(us, all);
    assert_eq!(
        handler.open_file("X/SHARED.DBC", LocaleFlags::ENGB).unwrap().into_inner(),
        b"shared"
    );
}

#[test]
fn locale_without_variant_is_unsupported() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"english only")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    let err = handler.open_file("a\\b.txt", LocaleFlags::KOKR).unwrap_err();
    match err {
        StorageError::UnsupportedLocale { path, locale } => {
            assert_eq!(path, "a\\b.txt");
            assert_eq!(locale, LocaleFlags::KOKR);
        }
        other => panic!("expected UnsupportedLocale, got {other:?}"),
    }
}

#[test]
fn locale_variants_resolve_independently() {
    let install = InstallBuilder::new()
        .file("Interface\\GlueXML\\a.lua", LocaleFlags::ENUS, b"english")
        .file("Interface\\GlueXML\\a.lua", LocaleFlags::KOKR, b"korean")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    let hash = handler.path_hash("Interface\\GlueXML\\a.lua");
    assert_eq!(handler.root_entries(hash).unwrap().len(), 2);
    assert_eq!(
        handler
            .open_file("Interface\\GlueXML\\a.lua", LocaleFlags::KOKR)
            .unwrap()
            .into_inner(),
        b"korean"
    );
    assert_eq!(
        handler
            .open_file("Interface\\GlueXML\\a.lua", LocaleFlags::ENUS)
            .unwrap()
            .into_inner(),
        b"english"
    );
}

#[test]
fn unknown_path_does_not_exist_and_is_skipped_by_namespace() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"b")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    assert!(handler.file_exists("a\\b.txt"));
    assert!(!handler.file_exists("unknown\\path"));
    let err = handler.open_file("unknown\\path", LocaleFlags::ENUS).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(err.is_not_found());

    let mut builder = handler.namespace();
    let tree = builder.build(["unknown\\path", "a\\b.txt"]);
    assert_eq!(tree.file_count(), 1);
    assert_eq!(builder.names().file_count(), 1);
}

#[test]
fn missing_encoding_entry_falls_through_to_next_candidate() {
    let install = InstallBuilder::new()
        .unencoded("a\\b.txt", LocaleFlags::ENUS, b"orphan")
        .file("a\\b.txt", LocaleFlags::ENUS, b"fallback")
        .unencoded("c\\d.txt", LocaleFlags::ENUS, b"nothing")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    assert_eq!(
        handler.open_file("a\\b.txt", LocaleFlags::ENUS).unwrap().into_inner(),
        b"fallback"
    );

    let err = handler.open_file("c\\d.txt", LocaleFlags::ENUS).unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn missing_local_index_entry_is_archive_failure() {
    let install = InstallBuilder::new()
        .unindexed("a\\b.txt", LocaleFlags::ENUS, b"not on disk")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    let err = handler.open_file("a\\b.txt", LocaleFlags::ENUS).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ArchiveAccess {
            source: ArchiveError::MissingLocalIndexEntry,
            ..
        }
    ));
    assert!(!err.is_not_found());

    // A failed lookup leaves the handler usable
    assert!(handler.file_exists("a\\b.txt"));
}

#[test]
fn extract_to_writes_destination() {
    let install = InstallBuilder::new()
        .file("DBFilesClient\\Map.dbc", LocaleFlags::ENUS, b"map rows")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();
    let out = install.dir.path().join("out").join("DBFilesClient").join("Map.dbc");

    let bytes = handler
        .extract_to("DBFilesClient\\Map.dbc", &out, LocaleFlags::ENUS)
        .unwrap();
    assert_eq!(bytes, b"map rows");
    assert_eq!(read(&out), b"map rows");
}

#[test]
fn open_content_bypasses_root() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"by content")
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    let ckey = ContentKey::from_data(b"by content");
    assert_eq!(handler.resolve_content(&ckey).unwrap().size, 10);
    assert_eq!(handler.open_content(&ckey).unwrap(), b"by content");

    let err = handler
        .open_content(&ContentKey::from_bytes([0; 16]))
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn bootstrap_copies_are_reused_without_extraction() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"payload")
        .build();

    let first = CascHandler::open(install.config.clone()).unwrap();
    let stats = first.stats();
    drop(first);

    let encoding_cache = install.config.encoding_cache_path();
    let root_cache = install.config.root_cache_path();
    let encoding_before = std::fs::metadata(&encoding_cache).unwrap().modified().unwrap();
    let root_before = std::fs::metadata(&root_cache).unwrap().modified().unwrap();

    // Bootstrap records can no longer be read from the archive
    std::fs::write(install.archive_path(), b"").unwrap();

    let second = CascHandler::open(install.config.clone()).expect("cached tables are used");
    assert_eq!(second.stats().encoding_entries, stats.encoding_entries);
    assert_eq!(second.stats().root_paths, stats.root_paths);
    assert_eq!(
        std::fs::metadata(&encoding_cache).unwrap().modified().unwrap(),
        encoding_before
    );
    assert_eq!(
        std::fs::metadata(&root_cache).unwrap().modified().unwrap(),
        root_before
    );
}

#[test]
fn stale_bootstrap_copy_is_replaced() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"payload")
        .build();
    let root_cache = install.config.root_cache_path();
    std::fs::create_dir_all(root_cache.parent().unwrap()).unwrap();
    std::fs::write(&root_cache, b"not the root table").unwrap();

    let handler = CascHandler::open(install.config.clone()).unwrap();
    assert!(handler.file_exists("a\\b.txt"));
    assert_eq!(
        ContentKey::from_data(&read(&root_cache)),
        install.config.root_content_key
    );
}

#[test]
fn first_shard_wins_over_later_duplicates() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"from shard zero")
        .shadow_shard()
        .build();
    let handler = CascHandler::open(install.config.clone()).unwrap();

    assert_eq!(handler.stats().shard_files, 2);
    assert!(handler.local_index().duplicates() > 0);
    assert_eq!(
        handler.open_file("a\\b.txt", LocaleFlags::ENUS).unwrap().into_inner(),
        b"from shard zero"
    );
}

#[test]
fn zero_locale_block_fails_open() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"fine")
        .file("c\\d.txt", LocaleFlags::NONE, b"corrupt")
        .build();

    let err = CascHandler::open(install.config.clone()).unwrap_err();
    assert!(matches!(err, StorageError::CorruptRootBlock { .. }));
}

#[test]
fn ambiguous_root_bootstrap_fails_open() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"fine")
        .ambiguous_root()
        .build();

    let err = CascHandler::open(install.config.clone()).unwrap_err();
    assert!(matches!(err, StorageError::MissingBootstrapEntry(_)));
}

#[test]
fn missing_shard_files_fail_open() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"fine")
        .build();
    for entry in std::fs::read_dir(install.data_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "idx") {
            std::fs::remove_file(path).unwrap();
        }
    }

    let err = CascHandler::open(install.config.clone()).unwrap_err();
    assert!(matches!(err, StorageError::MissingIndexFiles(_)));
}

#[test]
fn progress_is_monotonic_per_phase() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"one")
        .file("c\\d.txt", LocaleFlags::DEDE, b"two")
        .build();

    let seen = Mutex::new(Vec::new());
    let observer = |phase: LoadPhase, percent: u8| seen.lock().push((phase, percent));
    CascHandler::builder(install.config.clone())
        .progress(&observer)
        .open()
        .unwrap();

    let seen = seen.into_inner();
    for phase in [LoadPhase::LocalIndex, LoadPhase::Encoding, LoadPhase::Root] {
        let values: Vec<u8> = seen
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, v)| *v)
            .collect();
        assert_eq!(values.first(), Some(&0), "{phase} starts at 0");
        assert_eq!(values.last(), Some(&100), "{phase} ends at 100");
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{phase} increases");
    }

    let order: Vec<LoadPhase> = seen.iter().map(|(p, _)| *p).collect();
    let first_root = order.iter().position(|p| *p == LoadPhase::Root).unwrap();
    let last_index = order.iter().rposition(|p| *p == LoadPhase::LocalIndex).unwrap();
    assert!(last_index < first_root);
}

/// Passthrough decoder that counts its calls
struct CountingDecoder(Arc<AtomicUsize>);

impl BlockDecoder for CountingDecoder {
    fn decode(&self, input: &mut dyn Read, length: u64) -> Result<Vec<u8>, ArchiveError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        PassthroughDecoder.decode(input, length)
    }
}

#[test]
fn custom_decoder_sees_every_payload_and_handles_are_cached() {
    let install = InstallBuilder::new()
        .file("a\\b.txt", LocaleFlags::ENUS, b"one")
        .file("c\\d.txt", LocaleFlags::ENUS, b"two")
        .build();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = CascHandler::builder(install.config.clone())
        .decoder(CountingDecoder(Arc::clone(&calls)))
        .open()
        .unwrap();

    // Encoding and root tables were extracted on this first open
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    handler.open_file("a\\b.txt", LocaleFlags::ENUS).unwrap();
    handler.open_file("c\\d.txt", LocaleFlags::ENUS).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(handler.stats().open_archives, 1);

    handler.close_archives();
    assert_eq!(handler.stats().open_archives, 0);
    handler.open_file("a\\b.txt", LocaleFlags::ENUS).unwrap();
    assert_eq!(handler.stats().open_archives, 1);
}
