use std::sync::Arc;

use api_key::{ApiKeySecret, KEY_LENGTH, SECRET_LENGTH};
use chrono::{DateTime, TimeZone, Utc};
use key_manager::{
    ApiKeyFilter, ApiKeyManager, ApiKeyType, Authentication, CreateApiKey, CreateRawApiKey,
    DenyReason, FindOptions, FixedClock, ManagerConfig, SqliteApiKeyStore, UpdateApiKeyDate,
};
use tempfile::NamedTempFile;

type Manager = ApiKeyManager<SqliteApiKeyStore, Arc<FixedClock>>;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Manager over a fresh database file, with a clock pinned to `now`.
fn setup(now: DateTime<Utc>) -> (Manager, Arc<FixedClock>, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteApiKeyStore::open(file.path()).unwrap();
    let clock = Arc::new(FixedClock::new(now));
    let manager = ApiKeyManager::with_clock(ManagerConfig::new("staging"), store, clock.clone());
    (manager, clock, file)
}

fn request(name: &str, window: Option<(DateTime<Utc>, DateTime<Utc>)>) -> CreateApiKey {
    CreateApiKey {
        name: name.to_string(),
        key_type: ApiKeyType::Default,
        start_date: window.map(|(s, _)| s),
        end_date: window.map(|(_, e)| e),
    }
}

#[test]
fn test_generated_credentials_shape() {
    let (manager, _clock, _db) = setup(Utc::now());

    for _ in 0..20 {
        let created = manager.create(request("shape", None)).unwrap();
        let key = &created.record.key;
        let body = key.strip_prefix("staging_").expect("environment prefix");

        assert_eq!(body.len(), KEY_LENGTH);
        assert_eq!(body, body.to_uppercase());
        assert_eq!(created.secret.expose().len(), SECRET_LENGTH);
        assert_eq!(created.secret.expose(), created.secret.expose().to_uppercase());
    }
}

#[test]
fn test_secret_is_not_persisted() {
    let (manager, _clock, db) = setup(Utc::now());
    let created = manager.create(request("secretive", None)).unwrap();

    let raw = std::fs::read(db.path()).unwrap();
    let needle = created.secret.expose().as_bytes();
    assert!(!raw.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn test_create_roundtrip_and_reset() {
    let (manager, _clock, _db) = setup(Utc::now());
    let created = manager.create(request("roundtrip", None)).unwrap();

    let stored = manager
        .find_one_by_id(created.record.id, &FindOptions::default())
        .unwrap()
        .unwrap();
    let hash = manager.create_hash_api_key(&stored.key, created.secret.expose());
    assert!(manager.validate_hash_api_key(&hash, &stored.hash));

    let new_secret = ApiKeySecret::new("NEWSECRET");
    let reset = manager.reset(stored, &new_secret).unwrap();

    let reloaded = manager
        .find_one_by_key(&reset.key, &FindOptions::default())
        .unwrap()
        .unwrap();
    let new_hash = manager.create_hash_api_key(&reloaded.key, new_secret.expose());
    assert!(manager.validate_hash_api_key(&new_hash, &reloaded.hash));
    assert!(!manager.validate_hash_api_key(&hash, &reloaded.hash));
}

#[test]
fn test_window_is_day_aligned() {
    let (manager, _clock, _db) = setup(Utc::now());
    let created = manager
        .create(request(
            "window",
            Some((at(2024, 3, 5, 14, 22), at(2024, 3, 10, 9, 0))),
        ))
        .unwrap();

    let stored = manager
        .find_one_by_id(created.record.id, &FindOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(stored.start_date, Some(at(2024, 3, 5, 0, 0)));
    assert_eq!(
        stored.end_date,
        Some(at(2024, 3, 10, 23, 59) + chrono::Duration::milliseconds(59_999))
    );

    let updated = manager
        .update_date(
            stored,
            UpdateApiKeyDate {
                start_date: Some(at(2024, 4, 1, 23, 0)),
                end_date: Some(at(2024, 4, 2, 0, 1)),
            },
        )
        .unwrap();
    assert_eq!(updated.start_date, Some(at(2024, 4, 1, 0, 0)));
    assert_eq!(
        updated.end_date,
        Some(at(2024, 4, 2, 23, 59) + chrono::Duration::milliseconds(59_999))
    );
}

#[test]
fn test_active_key_lookup() {
    let (manager, _clock, _db) = setup(Utc::now());
    let created = manager.create(request("lookup", None)).unwrap();
    let key = created.record.key.clone();
    let options = FindOptions::default();

    assert!(manager.find_one_by_active_key(&key, &options).unwrap().is_some());

    let record = manager.inactive(created.record).unwrap();
    assert!(manager.find_one_by_active_key(&key, &options).unwrap().is_none());

    manager.active(record).unwrap();
    assert!(manager.find_one_by_active_key(&key, &options).unwrap().is_some());
}

#[test]
fn test_expiry_sweep() {
    let t = at(2024, 3, 10, 12, 0);
    let (manager, clock, _db) = setup(at(2024, 1, 1, 0, 0));
    let start = at(2024, 1, 1, 0, 0);

    let expired = manager
        .create(request("expired", Some((start, at(2024, 3, 9, 8, 0)))))
        .unwrap()
        .record;
    let later = manager
        .create(request("later", Some((start, at(2024, 3, 11, 8, 0)))))
        .unwrap()
        .record;
    let already_off = manager
        .create(request("already-off", Some((start, at(2024, 2, 1, 8, 0)))))
        .unwrap()
        .record;
    let already_off = manager.inactive(already_off).unwrap();
    let open = manager.create(request("open", None)).unwrap().record;

    clock.set(t);
    let flipped = manager
        .inactive_many_by_end_date(&FindOptions::default())
        .unwrap();
    assert_eq!(flipped, 1);

    let reload = |id| {
        manager
            .find_one_by_id(id, &FindOptions::default())
            .unwrap()
            .unwrap()
    };
    assert!(!reload(expired.id).is_active);
    assert!(reload(later.id).is_active);
    assert!(!reload(already_off.id).is_active);
    assert_eq!(
        reload(already_off.id).updated_at.timestamp_millis(),
        already_off.updated_at.timestamp_millis()
    );
    assert!(reload(open.id).is_active);

    // A second sweep finds nothing new
    assert_eq!(
        manager
            .inactive_many_by_end_date(&FindOptions::default())
            .unwrap(),
        0
    );
}

#[test]
fn test_soft_delete_and_purge() {
    let (manager, _clock, _db) = setup(Utc::now());
    let keep = manager.create(request("keep", None)).unwrap().record;
    let gone = manager.create(request("gone", None)).unwrap().record;
    let gone_id = gone.id;

    manager.delete(gone).unwrap();

    let visible = manager
        .find_all(&ApiKeyFilter::new(), &FindOptions::default())
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, keep.id);
    assert!(
        manager
            .find_one(&ApiKeyFilter::new().id(gone_id), &FindOptions::default())
            .unwrap()
            .is_none()
    );

    let raw = manager
        .find_one_by_id(gone_id, &FindOptions::with_deleted())
        .unwrap()
        .expect("soft-deleted row is still stored");
    assert!(raw.deleted);
    assert!(raw.deleted_at.is_some());

    let purged = manager
        .delete_many(&ApiKeyFilter::new().deleted(true), &FindOptions::with_deleted())
        .unwrap();
    assert_eq!(purged, 1);
    assert!(
        manager
            .find_one_by_id(gone_id, &FindOptions::with_deleted())
            .unwrap()
            .is_none()
    );
    assert_eq!(
        manager
            .get_total(&ApiKeyFilter::new(), &FindOptions::with_deleted())
            .unwrap(),
        1
    );
}

#[test]
fn test_deleted_key_stays_deleted_after_stale_writes() {
    let (manager, _clock, _db) = setup(Utc::now());
    let record = manager.create(request("svc", None)).unwrap().record;
    manager.delete(record.clone()).unwrap();

    manager.inactive(record.clone()).unwrap();
    manager.active(record.clone()).unwrap();
    manager.reset(record.clone(), &ApiKeySecret::from("NEWSECRET")).unwrap();

    assert!(
        manager
            .find_one_by_id(record.id, &FindOptions::default())
            .unwrap()
            .is_none()
    );
    assert!(
        manager
            .find_one_by_key(&record.key, &FindOptions::default())
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_duplicate_raw_key_is_store_error() {
    let (manager, _clock, _db) = setup(Utc::now());
    let raw = || CreateRawApiKey {
        name: "seed".to_string(),
        key: "staging_FIXEDKEY".to_string(),
        secret: ApiKeySecret::new("FIXEDSECRET"),
        key_type: ApiKeyType::System,
        start_date: None,
        end_date: None,
    };

    manager.create_raw(raw()).unwrap();
    let err = manager.create_raw(raw()).unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn test_authenticate_against_sqlite() {
    let (manager, clock, _db) = setup(at(2024, 3, 10, 12, 0));
    let created = manager
        .create(request(
            "auth",
            Some((at(2024, 3, 1, 0, 0), at(2024, 3, 31, 0, 0))),
        ))
        .unwrap();
    let header = format!("{}:{}", created.record.key, created.secret.expose());

    match manager.authenticate(&header).unwrap() {
        Authentication::Granted(record) => assert_eq!(record.id, created.record.id),
        Authentication::Denied(reason) => panic!("unexpected denial: {:?}", reason),
    }

    clock.set(at(2024, 4, 1, 0, 0));
    assert_eq!(
        manager.authenticate(&header).unwrap(),
        Authentication::Denied(DenyReason::Expired)
    );

    // After the sweep the key is no longer active at all
    manager
        .inactive_many_by_end_date(&FindOptions::default())
        .unwrap();
    assert_eq!(
        manager.authenticate(&header).unwrap(),
        Authentication::Denied(DenyReason::UnknownKey)
    );
}
