use std::{io::Write, sync::Arc};

use pretty_assertions::assert_eq;
use spore_dbpf::{
    error::{Error, FormatError},
    CompressionMethod, DbpfArchive, ResourceKey, Variant,
};
use tracing_test::traced_test;

mod common;
use common::{raw_payload, spore_moder, PackageBuilder, PACKED_KEY, RAW_KEY, SPORE_MODER};

#[traced_test]
#[test]
fn scenario_package_lists_in_index_order() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    assert_eq!(dbpf.variant(), Variant::Narrow);
    assert_eq!(dbpf.version(), (2, 0));
    assert_eq!(dbpf.index_version(), (0, 3));

    let listing = dbpf
        .list_entries(None)
        .map(|summary| summary.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        listing,
        [
            "12345678!9ABCDEF0.2F4E681C | uncompressed | 100 bytes",
            "00000001!00000002.00000003 | compressed | 20 -> 50 bytes",
        ]
    );

    assert!(logs_contain("header parsed"));
    assert!(logs_contain("index parsed"));
    Ok(())
}

#[test]
fn list_limit_is_a_prefix() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    let everything = dbpf.list_entries(None).collect::<Vec<_>>();
    let first = dbpf.list_entries(Some(1)).collect::<Vec<_>>();
    assert_eq!(first.as_slice(), &everything[..1]);
    assert_eq!(dbpf.list_entries(Some(0)).len(), 0);
    assert_eq!(dbpf.list_entries(Some(10)).len(), 2);
    Ok(())
}

#[test]
fn read_scenario_entries() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    assert_eq!(dbpf.read_entry(&RAW_KEY)?, raw_payload());

    let data = dbpf.read_entry(&PACKED_KEY)?;
    assert_eq!(data, spore_moder());
    assert_eq!(String::from_utf8_lossy(&data), "SporeModer".repeat(5));

    for entry in dbpf.entries() {
        assert_eq!(
            dbpf.read_entry_data(entry)?.len(),
            entry.uncompressed_size as usize
        );
    }
    assert_eq!(dbpf.decompressed_size(), 150);
    Ok(())
}

#[test]
fn entry_info_reports_index_fields() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    let info = dbpf.entry_info(&PACKED_KEY)?;
    assert_eq!(info.index, 1);
    assert_eq!(info.offset, 96 + 100);
    assert_eq!(info.stored_size, 20);
    assert_eq!(info.uncompressed_size, 50);
    assert_eq!(info.compression, CompressionMethod::RefPack);
    assert!(info.committed);
    assert_eq!(info.records_with_key, 1);

    let missing = ResourceKey::new(9, 9, 9);
    assert!(matches!(
        dbpf.entry_info(&missing),
        Err(Error::NotFound(key)) if key == missing
    ));
    assert!(matches!(dbpf.read_entry(&missing), Err(Error::NotFound(_))));
    Ok(())
}

#[test]
fn extract_entry_to_writer() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    let mut out = Vec::new();
    assert_eq!(dbpf.extract_entry_to(&PACKED_KEY, &mut out)?, 50);
    assert_eq!(out, spore_moder());
    Ok(())
}

#[test]
fn wide_package_matches_narrow() -> Result<(), Error> {
    let wide = PackageBuilder::wide()
        .raw(RAW_KEY, &raw_payload())
        .packed(PACKED_KEY, &SPORE_MODER, 50)
        .build();
    let dbpf = DbpfArchive::new(wide)?;

    assert_eq!(dbpf.variant(), Variant::Wide);
    assert_eq!(dbpf.version(), (3, 0));
    assert_eq!(dbpf.by_index(0).map(|e| e.offset), Some(120));
    assert_eq!(dbpf.read_entry(&RAW_KEY)?, raw_payload());
    assert_eq!(dbpf.read_entry(&PACKED_KEY)?, spore_moder());
    Ok(())
}

#[test]
fn compact_index() -> Result<(), Error> {
    let package = PackageBuilder::wide()
        .compact()
        .raw(RAW_KEY, &raw_payload())
        .packed(PACKED_KEY, &SPORE_MODER, 50)
        .build();
    let dbpf = DbpfArchive::new(package)?;

    assert_eq!(dbpf.index_version(), (0, 0));
    let packed = dbpf.by_key(&PACKED_KEY).map(|e| (e.stored_size, e.uncompressed_size));
    assert_eq!(packed, Some((20, 50)));
    assert_eq!(dbpf.read_entry(&PACKED_KEY)?, spore_moder());
    assert_eq!(dbpf.read_entry(&RAW_KEY)?, raw_payload());
    Ok(())
}

#[traced_test]
#[test]
fn duplicate_keys_resolve_to_first_record() -> Result<(), Error> {
    let package = PackageBuilder::narrow()
        .raw(RAW_KEY, b"first")
        .raw(PACKED_KEY, b"other")
        .raw(RAW_KEY, b"second")
        .build();
    let dbpf = DbpfArchive::new(package)?;

    assert_eq!(dbpf.len(), 3);
    assert_eq!(dbpf.list_entries(None).count(), 3);
    assert_eq!(dbpf.index_of(&RAW_KEY), Some(0));
    assert_eq!(dbpf.count_of(&RAW_KEY), 2);
    assert_eq!(dbpf.read_entry(&RAW_KEY)?, b"first");
    assert_eq!(dbpf.entry_info(&RAW_KEY)?.records_with_key, 2);

    assert!(logs_contain("package repeats resource keys"));
    Ok(())
}

#[test]
fn entries_matching_plain_keys() -> Result<(), Error> {
    let dbpf = DbpfArchive::new(PackageBuilder::scenario().build())?;

    let found = dbpf
        .entries_matching("9abcdef0", None)
        .map(|summary| summary.key)
        .collect::<Vec<_>>();
    assert_eq!(found, [RAW_KEY]);
    assert_eq!(dbpf.entries_matching("!", None).count(), 2);
    assert_eq!(dbpf.entries_matching("nothing", None).count(), 0);
    Ok(())
}

#[test]
fn concurrent_reads_share_one_archive() -> Result<(), Error> {
    let dbpf = Arc::new(DbpfArchive::new(PackageBuilder::scenario().build())?);

    std::thread::scope(|scope| {
        let handles = (0..8)
            .map(|_| {
                let dbpf = Arc::clone(&dbpf);
                scope.spawn(move || (dbpf.read_entry(&RAW_KEY), dbpf.read_entry(&PACKED_KEY)))
            })
            .collect::<Vec<_>>();

        for handle in handles {
            let (raw, packed) = handle.join().unwrap();
            assert_eq!(raw.unwrap(), raw_payload());
            assert_eq!(packed.unwrap(), spore_moder());
        }
    });
    Ok(())
}

#[test]
fn open_from_file_and_close() -> Result<(), Error> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&PackageBuilder::scenario().build())?;
    file.flush()?;

    let dbpf = DbpfArchive::open(file.path())?;
    assert_eq!(dbpf.read_entry(&PACKED_KEY)?, spore_moder());

    let source = dbpf.close();
    assert_eq!(source.metadata()?.len(), 96 + 100 + 20 + 4 + 2 * 28);
    Ok(())
}

#[test]
fn rejects_unknown_magic() {
    let mut package = PackageBuilder::scenario().build();
    package[..4].copy_from_slice(b"ABCD");

    assert!(matches!(
        DbpfArchive::new(package),
        Err(Error::Format(FormatError::InvalidMagic(magic))) if &magic == b"ABCD"
    ));
}

#[test]
fn entry_past_end_of_package() -> Result<(), Error> {
    let package = PackageBuilder::narrow()
        .raw(RAW_KEY, &raw_payload())
        .dangling(PACKED_KEY, 16, 1 << 20)
        .build();
    let dbpf = DbpfArchive::new(package)?;

    assert_eq!(dbpf.read_entry(&RAW_KEY)?, raw_payload());
    assert!(matches!(
        dbpf.read_entry(&PACKED_KEY),
        Err(Error::Format(FormatError::EntryOutOfBounds { key, offset, .. }))
            if key == PACKED_KEY && offset == 1 << 20
    ));
    Ok(())
}

#[test]
fn corrupt_compressed_entry_names_its_key() -> Result<(), Error> {
    let package = PackageBuilder::narrow()
        .packed(PACKED_KEY, &SPORE_MODER, 51)
        .build();
    let dbpf = DbpfArchive::new(package)?;

    assert!(matches!(
        dbpf.read_entry(&PACKED_KEY),
        Err(Error::Decode { key: Some(key), .. }) if key == PACKED_KEY
    ));
    Ok(())
}
