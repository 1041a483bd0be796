use pretty_assertions::assert_eq;
use tempfile::tempdir;

use hdr_core::db;
use hdr_core::error::ErrorKind;
use hdr_core::files::{
    add_file, clear_files, get_file, list_files, remove_file, totals, FileTotals, NewFile,
};

fn new_file(name: &str, chunks: u32) -> NewFile {
    NewFile {
        filename: name.to_string(),
        file_type: "txt".to_string(),
        chunks,
        size: 1024,
    }
}

#[test]
fn add_get_list_and_remove_roundtrip() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");

    let a = add_file(&conn, new_file("manual.txt", 3)).expect("add a");
    let b = add_file(&conn, new_file("faq.txt", 5)).expect("add b");
    assert!(a.id.starts_with("file_"));
    assert_ne!(a.id, b.id);

    let got = get_file(&conn, &a.id).expect("get").expect("present");
    assert_eq!(got, a);

    let all = list_files(&conn).expect("list");
    assert_eq!(all.len(), 2);

    assert_eq!(
        totals(&conn).expect("totals"),
        FileTotals {
            total_files: 2,
            total_chunks: 8
        }
    );

    assert!(remove_file(&conn, &a.id).expect("remove"));
    assert!(!remove_file(&conn, &a.id).expect("remove again"));
    assert_eq!(get_file(&conn, &a.id).expect("get"), None);
    assert_eq!(totals(&conn).expect("totals").total_chunks, 5);
}

#[test]
fn empty_registry_reports_zero_totals() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    assert_eq!(totals(&conn).expect("totals"), FileTotals::default());
    assert!(list_files(&conn).expect("list").is_empty());
}

#[test]
fn rejects_blank_filename() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    let err = add_file(&conn, new_file("  ", 1)).expect_err("blank");
    assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[test]
fn on_disk_registry_survives_reopen() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("nested").join("files.sqlite");

    let id = {
        let conn = db::open_and_migrate(&path).expect("create");
        add_file(&conn, new_file("policy.md", 2)).expect("add").id
    };

    let conn = db::open_and_migrate(&path).expect("reopen");
    let rec = get_file(&conn, &id).expect("get").expect("present");
    assert_eq!(rec.filename, "policy.md");
    assert_eq!(rec.chunks, 2);
}

#[test]
fn clear_drops_every_record() {
    let mut conn = db::open_in_memory().expect("open");
    db::migrate(&mut conn).expect("migrate");
    add_file(&conn, new_file("a.txt", 1)).expect("add a");
    add_file(&conn, new_file("b.pdf", 4)).expect("add b");

    assert_eq!(clear_files(&conn).expect("clear"), 2);
    assert_eq!(totals(&conn).expect("totals"), FileTotals::default());
    assert_eq!(clear_files(&conn).expect("clear again"), 0);
}
