//! Attendee store behavior through a migrated on-disk database.

use checkin::CheckinError;
use checkin::core::AttendeePatch;

use crate::fixture::{HEADER, TestFixture, attendee};

#[test]
fn duplicate_email_in_same_event_is_rejected() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();

    store
        .add_attendee("e1", attendee("REG000001", "Kim", "a@x.com"))
        .unwrap();
    let err = store
        .add_attendee("e1", attendee("REG000002", "Lee", "a@x.com"))
        .unwrap_err();

    match err {
        CheckinError::DuplicateEmail { event_id, email } => {
            assert_eq!(event_id, "e1");
            assert_eq!(email, "a@x.com");
        }
        other => panic!("expected duplicate email, got {other:?}"),
    }
    assert_eq!(store.read_attendees("e1").unwrap().len(), 1);
}

#[test]
fn bulk_write_replaces_previous_rows() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();

    let five: Vec<_> = (1..=5)
        .map(|i| attendee(&format!("REG00000{i}"), &format!("Guest {i}"), &format!("g{i}@x.com")))
        .collect();
    let three: Vec<_> = (1..=3)
        .map(|i| attendee(&format!("REG00010{i}"), &format!("New {i}"), &format!("n{i}@x.com")))
        .collect();

    assert_eq!(store.write_attendees("e1", &five).unwrap(), 5);
    assert_eq!(store.write_attendees("e1", &three).unwrap(), 3);

    let rows = store.read_attendees("e1").unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.name.starts_with("New")));
}

#[test]
fn failed_bulk_write_keeps_previous_rows() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();
    store
        .write_attendees("e1", &[attendee("REG000001", "Kim", "kim@x.com")])
        .unwrap();

    let clashing = vec![
        attendee("REG000010", "Lee", "same@x.com"),
        attendee("REG000011", "Park", "same@x.com"),
    ];
    let err = store.write_attendees("e1", &clashing).unwrap_err();
    assert!(err.is_duplicate());

    let rows = store.read_attendees("e1").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].registration_number, "REG000001");
}

#[test]
fn uploaded_csv_parses_one_attendee() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();

    let input = format!(
        "{HEADER}\nREG000007,홍길동,Acme,010-1234-5678,hong@example.com,초대,Y,2025-03-01 09:30:00\n"
    );
    let rows = store.parse_csv(&input).unwrap();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.registration_number, "REG000007");
    assert_eq!(row.name, "홍길동");
    assert_eq!(row.company, "Acme");
    assert_eq!(row.contact, "010-1234-5678");
    assert_eq!(row.email, "hong@example.com");
    assert_eq!(row.invitation_type, "초대");
    assert!(row.checked_in);
    assert_eq!(row.checkin_time.as_deref(), Some("2025-03-01 09:30:00"));
}

#[test]
fn events_are_isolated() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();

    store
        .add_attendee("e1", attendee("REG000001", "Kim", "a@x.com"))
        .unwrap();
    store
        .add_attendee("e2", attendee("REG000001", "Kim", "a@x.com"))
        .unwrap();

    store
        .update_attendee(
            "e2",
            "REG000001",
            &AttendeePatch {
                company: Some("Beta".to_string()),
                ..AttendeePatch::default()
            },
        )
        .unwrap();

    let e1 = store.find_attendee("e1", "REG000001").unwrap().unwrap();
    let e2 = store.find_attendee("e2", "REG000001").unwrap().unwrap();
    assert_eq!(e1.record.company, "");
    assert_eq!(e2.record.company, "Beta");
    assert_eq!(store.list_events().unwrap(), vec!["e1".to_string(), "e2".to_string()]);
}

#[test]
fn store_survives_reopen() {
    let fixture = TestFixture::new();
    {
        let store = fixture.ctx.open_store().unwrap();
        store
            .add_attendee("e1", attendee("", "Kim", "a@x.com"))
            .unwrap();
        store.set_checked_in("e1", "REG000001", true).unwrap();
    }

    let store = fixture.ctx.open_store().unwrap();
    let stats = store.checkin_stats("e1").unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.checked_in, 1);
    assert_eq!(stats.not_checked_in, 0);
}

#[test]
fn deleted_attendee_frees_its_email() {
    let fixture = TestFixture::new();
    let store = fixture.ctx.open_store().unwrap();

    store
        .add_attendee("e1", attendee("REG000001", "Kim", "a@x.com"))
        .unwrap();
    store.delete_attendee("e1", "REG000001").unwrap();
    assert!(store.find_attendee("e1", "REG000001").unwrap().is_none());

    store
        .add_attendee("e1", attendee("REG000002", "Lee", "a@x.com"))
        .unwrap();
    assert!(matches!(
        store.delete_attendee("e1", "REG000001"),
        Err(CheckinError::AttendeeNotFound { .. })
    ));
}
