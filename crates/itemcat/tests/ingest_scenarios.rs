//! Upload ingestion scenarios driven through the service API and the worker.

mod common;

use common::{csv, xlsx, TestHarness};
use itemcat::db::category_repo;
use itemcat::db::seed::DEFAULT_CATEGORIES;
use itemcat::upload::lifecycle;
use itemcat::{DedupeMode, RowStatus, UploadStatus};

const TWO_ROWS: &[&[&str]] = &[
    &["sku", "name", "primary_detail", "category"],
    &["U1", "Item1", "D1", "Electronics"],
    &["U2", "Item2", "D2", "NewCat"],
];

#[test]
fn two_row_csv_creates_items_and_one_category() {
    let h = TestHarness::new();
    let upload = h.queue("items.csv", &csv(TWO_ROWS), DedupeMode::Skip);

    let summary = h.run_pass();
    assert_eq!(summary.processed, 1);

    let record = h.record(&upload.id);
    assert_eq!(record.status, UploadStatus::Done);
    assert_eq!(record.items_created, 2);
    assert!(record.file_path.is_none());

    assert_eq!(h.item_count(), 2);
    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len() + 1);

    let u1 = h.item("U1").unwrap();
    assert_eq!(u1.category_id.as_deref(), Some("electronics"));
    assert_eq!(u1.primary_detail.as_deref(), Some("D1"));
    assert_eq!(u1.updated_by.as_deref(), Some(h.user_id.as_str()));

    let new_cat = category_repo::find_by_name_ci(&h.db, "NewCat").unwrap().unwrap();
    assert_eq!(h.item("U2").unwrap().category_id, Some(new_cat.id));

    let rows = h.rows(&upload.id);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status == RowStatus::Created));
    assert_eq!(
        rows.iter().map(|r| r.row_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(
        rows[0].raw_data,
        r#"{"sku":"U1","name":"Item1","primary_detail":"D1","category":"Electronics"}"#
    );
}

#[test]
fn same_file_again_with_skip_skips_every_row() {
    let h = TestHarness::new();
    h.queue("items.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    h.run_pass();

    let again = h.queue("items.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    h.run_pass();

    let record = h.record(&again.id);
    assert_eq!(record.status, UploadStatus::Done);
    assert_eq!(record.items_created, 0);
    let rows = h.rows(&again.id);
    assert!(rows
        .iter()
        .all(|r| r.status == RowStatus::Skipped && r.message == "SKU exists, skipped"));
    assert_eq!(h.item_count(), 2);
    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len() + 1);
}

#[test]
fn deleted_file_fails_with_no_rows() {
    let h = TestHarness::new();
    let upload = h.queue("items.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    std::fs::remove_file(upload.file_path.as_deref().unwrap()).unwrap();

    let summary = h.run_pass();
    assert_eq!(summary.failed, 1);
    let record = h.record(&upload.id);
    assert_eq!(record.status, UploadStatus::Failed);
    assert!(record.file_path.is_none());
    assert!(h.rows(&upload.id).is_empty());
    assert_eq!(h.item_count(), 0);
}

#[test]
fn update_mode_overwrites_only_non_empty_fields() {
    let h = TestHarness::new();
    h.queue(
        "first.csv",
        &csv(&[
            &["sku", "name", "primary_detail", "category"],
            &["A1", "Lamp", "Brass", "Home & Kitchen"],
        ]),
        DedupeMode::Skip,
    );
    h.run_pass();

    let update = h.queue(
        "second.csv",
        &csv(&[
            &["SKU", "Name", "Primary", "category"],
            &["A1", "", "Copper", "unknown category"],
        ]),
        DedupeMode::Update,
    );
    h.run_pass();

    let item = h.item("A1").unwrap();
    assert_eq!(item.name, "Lamp");
    assert_eq!(item.primary_detail.as_deref(), Some("Copper"));
    assert_eq!(item.category_id.as_deref(), Some("home-kitchen"));
    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len());

    let record = h.record(&update.id);
    assert_eq!(record.items_created, 1);
    assert_eq!(h.rows(&update.id)[0].status, RowStatus::Updated);
}

#[test]
fn update_mode_reassigns_existing_category() {
    let h = TestHarness::new();
    h.queue(
        "first.csv",
        &csv(&[&["sku", "name", "category"], &["B1", "Ball", "Toys & Games"]]),
        DedupeMode::Skip,
    );
    h.run_pass();
    h.queue(
        "second.csv",
        &csv(&[&["sku", "name", "category"], &["B1", "Ball", "sports & OUTDOORS"]]),
        DedupeMode::Update,
    );
    h.run_pass();

    assert_eq!(
        h.item("B1").unwrap().category_id.as_deref(),
        Some("sports-outdoors")
    );
}

#[test]
fn update_mode_creates_unknown_skus() {
    let h = TestHarness::new();
    let upload = h.queue(
        "new.csv",
        &csv(&[&["sku", "name"], &["N1", "Notebook"]]),
        DedupeMode::Update,
    );
    h.run_pass();

    assert_eq!(h.rows(&upload.id)[0].status, RowStatus::Created);
    assert!(h.item("N1").is_some());
}

#[test]
fn duplicate_mode_creates_items_sharing_a_sku() {
    let h = TestHarness::new();
    h.queue("a.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    h.run_pass();

    let dup = h.queue("b.csv", &csv(TWO_ROWS), DedupeMode::Duplicate);
    h.run_pass();

    assert_eq!(h.record(&dup.id).items_created, 2);
    assert_eq!(h.item_count(), 4);
    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len() + 1);
}

#[test]
fn auto_created_category_is_reused_in_any_case() {
    let h = TestHarness::new();
    h.queue(
        "garden.csv",
        &csv(&[
            &["sku", "name", "category"],
            &["G1", "Rake", "Hand Tools"],
            &["G2", "Trowel", "hand tools"],
            &["G3", "Shears", "HAND TOOLS"],
        ]),
        DedupeMode::Skip,
    );
    h.run_pass();

    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len() + 1);
    let category = category_repo::find_by_name_ci(&h.db, "hand tools").unwrap().unwrap();
    assert_eq!(category.name, "Hand Tools");
    for sku in ["G1", "G2", "G3"] {
        assert_eq!(h.item(sku).unwrap().category_id.as_deref(), Some(category.id.as_str()));
    }
}

#[test]
fn rows_without_category_stay_uncategorized() {
    let h = TestHarness::new();
    h.queue(
        "plain.csv",
        &csv(&[&["sku", "name", "category"], &["P1", "Pencil", ""]]),
        DedupeMode::Skip,
    );
    h.run_pass();

    assert!(h.item("P1").unwrap().category_id.is_none());
    assert_eq!(h.category_count(), DEFAULT_CATEGORIES.len());
}

#[test]
fn claimed_and_terminal_records_are_not_reprocessed() {
    let h = TestHarness::new();
    let claimed = h.queue("claimed.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    assert!(lifecycle::claim(&h.db, &claimed.id).unwrap());

    let summary = h.run_pass();
    assert_eq!(summary.processed, 0);
    assert_eq!(h.record(&claimed.id).status, UploadStatus::Processing);
    assert!(h.rows(&claimed.id).is_empty());

    let done = h.queue("done.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    h.run_pass();
    let rows_after_first = h.rows(&done.id).len();
    let summary = h.run_pass();
    assert_eq!(summary, Default::default());
    assert_eq!(h.rows(&done.id).len(), rows_after_first);
}

#[test]
fn uploads_are_processed_oldest_first() {
    let h = TestHarness::new();
    let first = h.queue(
        "first.csv",
        &csv(&[&["sku", "name"], &["O1", "First"]]),
        DedupeMode::Skip,
    );
    let second = h.queue(
        "second.csv",
        &csv(&[&["sku", "name"], &["O1", "Second"]]),
        DedupeMode::Skip,
    );

    let summary = h.run_pass();
    assert_eq!(summary.processed, 2);
    assert_eq!(h.rows(&first.id)[0].status, RowStatus::Created);
    assert_eq!(h.rows(&second.id)[0].status, RowStatus::Skipped);
    assert_eq!(h.item("O1").unwrap().name, "First");
}

#[test]
fn xlsx_first_sheet_with_gaps() {
    let h = TestHarness::new();
    let upload = h.queue(
        "Catalog.XLSX",
        &xlsx(&[
            &["sku", "name", "primary_detail", "category"],
            &["X1", "Kettle", "", "Home & Kitchen"],
            &["", "", "", ""],
            &["X2", "Atlas", "Hardcover", "books"],
        ]),
        DedupeMode::Skip,
    );
    h.run_pass();

    let record = h.record(&upload.id);
    assert_eq!(record.status, UploadStatus::Done);
    assert_eq!(record.items_created, 2);

    let rows = h.rows(&upload.id);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].raw_data,
        r#"{"sku":"X1","name":"Kettle","primary_detail":"","category":"Home & Kitchen"}"#
    );

    let kettle = h.item("X1").unwrap();
    assert!(kettle.primary_detail.is_none());
    assert_eq!(kettle.category_id.as_deref(), Some("home-kitchen"));
    assert_eq!(h.item("X2").unwrap().category_id.as_deref(), Some("books"));
}

#[test]
fn legacy_xls_workbook_is_ingested() {
    let h = TestHarness::new();
    let upload = h.queue(
        "Legacy.xls",
        include_bytes!("fixtures/items.xls"),
        DedupeMode::Skip,
    );
    h.run_pass();

    let record = h.record(&upload.id);
    assert_eq!(record.status, UploadStatus::Done);
    assert_eq!(record.items_created, 2);
    assert!(record.file_path.is_none());

    let rows = h.rows(&upload.id);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1].raw_data,
        r#"{"sku":"X2","name":"Notebook","primary_detail":"","category":"Books","qty":"12"}"#
    );

    let lamp = h.item("X1").unwrap();
    assert_eq!(lamp.category_id.as_deref(), Some("home-kitchen"));
    assert_eq!(h.item("X2").unwrap().category_id.as_deref(), Some("books"));
    assert!(h.item("wrong").is_none());
}

#[test]
fn stored_file_is_removed_after_processing() {
    let h = TestHarness::new();
    let upload = h.queue("items.csv", &csv(TWO_ROWS), DedupeMode::Skip);
    let stored = std::path::PathBuf::from(upload.file_path.as_deref().unwrap());
    assert!(stored.exists());

    h.run_pass();
    assert!(!stored.exists());
    assert_eq!(std::fs::read_dir(&h.upload_dir).unwrap().count(), 0);
}
