use std::io::Write;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use spore_registry::{compute_hash, error::Result, table::TableReport, NameRegistry, Table};
use tracing_test::traced_test;

fn resources() -> PathBuf {
    PathBuf::from(format!("{}/resources", env!("CARGO_MANIFEST_DIR")))
}

#[traced_test]
#[test]
fn load_fixture_registries() -> Result<()> {
    let registry = NameRegistry::load(resources())?;

    let report = registry.report();
    assert_eq!(report.table(Table::File), TableReport { loaded: 7, skipped: 1 });
    assert_eq!(report.table(Table::Type), TableReport { loaded: 4, skipped: 1 });
    assert_eq!(report.table(Table::Property), TableReport { loaded: 3, skipped: 0 });
    assert_eq!(report.skipped(), 2);

    assert_eq!(registry.file_name(0x61BCECF8), Some("creature_editor"));
    assert_eq!(registry.file_name(0xE64015F0), Some("icon"));
    assert_eq!(registry.type_name(0x2F4E681C), Some("rw4"));
    assert_eq!(registry.property_name(0x93365609), Some("blockName"));
    assert_eq!(registry.lookup(Table::File, 0xDEADBEEF), None);

    Ok(())
}

#[traced_test]
#[test]
fn registry_hashes_match_fnv() -> Result<()> {
    let registry = NameRegistry::load(resources())?;

    let hash = compute_hash("sporemaster");
    assert_eq!(hash, 0xFF13FBD8);
    assert_eq!(registry.file_name(hash), Some("sporemaster"));

    assert_eq!(
        registry.file_name(compute_hash("spore_readme")),
        Some("spore_readme")
    );
    assert_eq!(registry.property_name(compute_hash("parent")), Some("parent"));

    Ok(())
}

#[traced_test]
#[test]
fn latin1_names_do_not_abort_the_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join("reg_file.txt"),
        b"sporemaster\t0xFF13FBD8\ncaf\xE9\t0x00000001\nicon\t0xE64015F0\n",
    )?;

    let registry = NameRegistry::load(dir.path())?;

    assert_eq!(
        registry.report().table(Table::File),
        TableReport { loaded: 2, skipped: 1 }
    );
    assert_eq!(registry.file_name(0xFF13FBD8), Some("sporemaster"));
    assert_eq!(registry.file_name(0xE64015F0), Some("icon"));
    assert_eq!(registry.file_name(0x00000001), None);
    assert!(logs_contain("skipping malformed registry line"));

    Ok(())
}

#[traced_test]
#[test]
fn missing_registry_files_are_empty() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("reg_type.txt"), "prop\t0x00B1B104\n")?;

    let registry = NameRegistry::load(dir.path())?;

    assert!(registry.table(Table::File).is_empty());
    assert!(registry.table(Table::Property).is_empty());
    assert_eq!(registry.type_name(0x00B1B104), Some("prop"));
    assert!(logs_contain("registry file not found"));

    Ok(())
}

#[traced_test]
#[test]
fn load_large_registry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut file = std::fs::File::create(dir.path().join("reg_file.txt"))?;
    for i in 0..5000 {
        writeln!(file, "resource_{i}\t0x{:08X}", compute_hash(&format!("resource_{i}")))?;
    }
    drop(file);

    let registry = NameRegistry::load(dir.path())?;

    assert_eq!(registry.report().file.loaded, 5000);
    assert_eq!(registry.table(Table::File).len(), 5000);
    assert_eq!(
        registry.file_name(compute_hash("resource_4321")),
        Some("resource_4321")
    );

    Ok(())
}
