//! Backup creation, retention and restore against a real database file.

use std::sync::Arc;

use checkin::backup::{BackupScheduler, is_backup_filename};
use checkin::storage::BackupOutcome;

use crate::fixture::{TestFixture, age_file, attendee};

fn seeded(fixture: &TestFixture, count: usize) {
    let store = fixture.ctx.open_store().unwrap();
    let rows: Vec<_> = (1..=count)
        .map(|i| {
            let mut row = attendee(
                &format!("REG{i:06}"),
                &format!("Guest number {i}"),
                &format!("guest{i}@example.com"),
            );
            row.company = "Example Corporation".to_string();
            row
        })
        .collect();
    store.write_attendees("e1", &rows).unwrap();
}

#[test]
fn backup_is_smaller_than_source_and_listed_first() {
    let fixture = TestFixture::new();
    seeded(&fixture, 1000);

    let older = fixture.backup_dir().join("attendees_backup_20200101_000000.db.gz");
    std::fs::write(&older, b"old").unwrap();
    age_file(&older, 2);

    let manager = fixture.ctx.backup_manager().unwrap();
    let created = manager.create_backup().unwrap();
    assert!(created.backup.size_bytes > 0);
    assert!(created.backup.size_bytes < created.source_bytes);

    let listed = manager.list_backups().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].filename, created.backup.filename);
    assert_eq!(listed[0].size_bytes, created.backup.size_bytes);
    assert_eq!(
        std::fs::metadata(&listed[0].path).unwrap().len(),
        listed[0].size_bytes
    );

    let history = manager.backup_history(10).unwrap();
    assert_eq!(history[0].filename, created.backup.filename);
    assert_eq!(history[0].status, BackupOutcome::Success);
}

#[test]
fn retention_keeps_files_inside_the_window() {
    let fixture = TestFixture::new();
    std::fs::create_dir_all(fixture.backup_dir()).unwrap();

    let stale = fixture.backup_dir().join("attendees_backup_20240101_000000.db.gz");
    let fresh = fixture.backup_dir().join("attendees_backup_20240201_000000.db.gz");
    std::fs::write(&stale, b"stale").unwrap();
    std::fs::write(&fresh, b"fresh").unwrap();
    age_file(&stale, 31);
    age_file(&fresh, 29);

    let report = fixture
        .ctx
        .detached_backup_manager()
        .cleanup_old_backups()
        .unwrap();

    assert_eq!(report.removed, vec!["attendees_backup_20240101_000000.db.gz".to_string()]);
    assert_eq!(report.kept, 1);
    assert!(!stale.exists());
    assert!(fresh.exists());
}

#[test]
fn cleanup_ignores_files_outside_the_naming_pattern() {
    let fixture = TestFixture::new();
    std::fs::create_dir_all(fixture.backup_dir()).unwrap();

    let foreign = fixture.backup_dir().join("notes.txt");
    std::fs::write(&foreign, b"keep me").unwrap();
    age_file(&foreign, 365);
    assert!(!is_backup_filename("notes.txt"));

    let report = fixture
        .ctx
        .detached_backup_manager()
        .cleanup_old_backups()
        .unwrap();
    assert!(report.removed.is_empty());
    assert!(foreign.exists());
}

#[test]
fn restore_brings_back_earlier_rows() {
    let fixture = TestFixture::new();
    seeded(&fixture, 3);

    let filename = {
        let manager = fixture.ctx.backup_manager().unwrap();
        manager.create_backup().unwrap().backup.filename
    };

    {
        let store = fixture.ctx.open_store().unwrap();
        store
            .add_attendee("e1", attendee("", "Late", "late@example.com"))
            .unwrap();
        assert_eq!(store.read_attendees("e1").unwrap().len(), 4);
    }

    let report = fixture
        .ctx
        .detached_backup_manager()
        .restore_backup(&filename)
        .unwrap();
    let safety = report.safety_copy.unwrap();
    assert!(safety.exists());
    assert!(!is_backup_filename(&safety.file_name().unwrap().to_string_lossy()));

    let store = fixture.ctx.open_store().unwrap();
    assert_eq!(store.read_attendees("e1").unwrap().len(), 3);
}

#[tokio::test]
async fn scheduler_runs_a_backup_on_start() {
    let fixture = TestFixture::with_config(|config| {
        config.backup.run_on_start = true;
    });
    seeded(&fixture, 10);

    let manager = Arc::new(fixture.ctx.backup_manager().unwrap());
    let scheduler = BackupScheduler::new(Arc::clone(&manager));
    assert!(scheduler.start().unwrap());

    let mut finished = None;
    for _ in 0..200 {
        if let Some(run) = manager.last_run() {
            finished = Some(run);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    scheduler.stop();

    let run = finished.expect("scheduler never ran");
    assert_eq!(run.status, BackupOutcome::Success);
    assert_eq!(manager.list_backups().unwrap().len(), 1);
}
