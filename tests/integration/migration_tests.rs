//! Schema migration and the legacy CSV import.

use checkin::storage::ImportOutcome;

use crate::fixture::TestFixture;

#[test]
fn status_on_fresh_root_reports_everything_pending() {
    let fixture = TestFixture::new();
    let status = fixture.ctx.migrator().check_status().unwrap();

    assert!(!status.database_exists);
    assert!(status.applied.is_empty());
    assert_eq!(status.pending.len(), 2);
    assert!(!status.is_current());
    assert!(!fixture.ctx.paths.database_path().exists());
}

#[test]
fn legacy_import_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.write_legacy_csv(
        "expo",
        &[
            "REG000001,Kim,Acme,010,kim@x.com,초대,N,",
            "REG000002,Lee,Beta,011,lee@x.com,초대,Y,2025-03-01 09:30:00",
            "REG000003,Park,Gamma,012,park@x.com,현장방문,N,",
        ],
    );
    fixture.write_legacy_csv("forum", &["REG000001,Choi,Delta,013,choi@x.com,초대,N,"]);

    let migrator = fixture.ctx.migrator();
    let mut db = migrator.run_migrations().unwrap();

    let first = migrator.migrate_existing_data(&mut db).unwrap();
    assert_eq!(first.total_inserted(), 4);
    assert!(first.failed().is_empty());

    let second = migrator.migrate_existing_data(&mut db).unwrap();
    assert_eq!(second.total_inserted(), 0);
    for event in &second.events {
        match &event.outcome {
            ImportOutcome::Imported { ignored, .. } => assert!(*ignored > 0),
            other => panic!("unexpected outcome for {}: {other:?}", event.event_id),
        }
    }
    drop(db);

    let status = migrator.check_status().unwrap();
    assert!(status.is_current());
    let expo = status
        .events
        .iter()
        .find(|event| event.event_id == "expo")
        .unwrap();
    assert_eq!(expo.attendees, 3);
    assert_eq!(expo.checked_in, 1);
}

#[test]
fn imported_rows_are_visible_to_the_store() {
    let fixture = TestFixture::new();
    fixture.write_legacy_csv("expo", &["REG000005,Kim,Acme,010,kim@x.com,초대,N,"]);

    let migrator = fixture.ctx.migrator();
    let mut db = migrator.run_migrations().unwrap();
    migrator.migrate_existing_data(&mut db).unwrap();
    drop(db);

    let store = fixture.ctx.open_store().unwrap();
    let rows = store.read_attendees("expo").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Kim");
    assert_eq!(store.generate_registration_number("expo"), "REG000006");
}

#[test]
fn event_directory_without_csv_is_reported() {
    let fixture = TestFixture::new();
    std::fs::create_dir_all(fixture.root.join("empty-event")).unwrap();

    let migrator = fixture.ctx.migrator();
    let mut db = migrator.run_migrations().unwrap();
    let report = migrator.migrate_existing_data(&mut db).unwrap();

    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].event_id, "empty-event");
    assert_eq!(report.events[0].outcome, ImportOutcome::NoLegacyCsv);
}

#[test]
fn rerunning_migrations_applies_nothing() {
    let fixture = TestFixture::new();
    let migrator = fixture.ctx.migrator();
    drop(migrator.run_migrations().unwrap());

    let before = migrator.check_status().unwrap();
    drop(migrator.run_migrations().unwrap());
    let after = migrator.check_status().unwrap();

    assert_eq!(before.applied, after.applied);
    assert!(after.pending.is_empty());
}
