//! Dataset loading and concurrent snapshot tests.

use std::io::Write;
use std::sync::Arc;

use obd_catalog::sanitize::FORUM_PHRASES;
use obd_catalog::{CatalogError, CatalogHandle, CodeCatalog, TroubleCode};

fn code(s: &str) -> TroubleCode {
    TroubleCode::try_from(s).unwrap()
}

#[test]
fn test_load_from_file_strips_forum_text() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "version": "scraped-1",
            "codes": [{{
                "code": "P0401",
                "description": "Insufficient   EGR flow",
                "causes": ["Clogged EGR valve", "My car did this after I bought it", "clogged egr valve"],
                "fixes": ["Someone said to unplug the battery", "Clean EGR valve"]
            }}]
        }}"#
    )
    .unwrap();

    let catalog = CodeCatalog::load(file.path()).unwrap();
    let def = catalog.lookup(&code("P0401")).unwrap();

    assert_eq!(def.description, "Insufficient EGR flow");
    assert_eq!(def.causes, vec!["Clogged EGR valve"]);
    assert_eq!(def.fixes, vec!["Clean EGR valve"]);
}

#[test]
fn test_builtin_dataset_is_clean() {
    let catalog = CodeCatalog::builtin().unwrap();
    for c in catalog.codes() {
        let def = catalog.lookup(c).unwrap();
        assert!(!def.causes.is_empty(), "{c} has no causes");
        assert!(!def.fixes.is_empty(), "{c} has no fixes");
        for item in def.causes.iter().chain(def.fixes.iter()) {
            let lower = item.to_lowercase();
            for phrase in FORUM_PHRASES {
                assert!(!lower.contains(phrase), "{c}: {item}");
            }
        }
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CodeCatalog::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, CatalogError::Io(_)));
}

#[test]
fn test_concurrent_readers_see_whole_catalogs() {
    let handle = Arc::new(CatalogHandle::new(CodeCatalog::builtin().unwrap()));
    let replacement = r#"{"version": "tiny", "codes": [{"code": "P0171", "description": "lean"}]}"#;

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let handle = Arc::clone(&handle);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let snap = handle.snapshot().unwrap();
                    // Each snapshot is internally consistent: either catalog, never a mix.
                    match snap.version() {
                        "tiny" => assert_eq!(snap.len(), 1),
                        _ => assert!(snap.len() > 1),
                    }
                    assert!(snap.lookup(&code("P0171")).is_some());
                }
            })
        })
        .collect();

    handle
        .swap(CodeCatalog::from_json(replacement.as_bytes()).unwrap())
        .unwrap();

    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(handle.snapshot().unwrap().version(), "tiny");
}
