use serde_json::json;
use smuggler_kernel::settings::{DatabaseSettings, LoggingSettings, Settings};

#[test]
fn defaults_are_sane() {
    let db = DatabaseSettings::default();
    assert_eq!(db.alias, "default");

    let logging = LoggingSettings::default();
    assert_eq!(logging.name, "smuggler");
    assert_eq!(logging.level, "info");
    assert!(logging.directory.is_none());
    assert!(!logging.json);

    let settings = Settings::default();
    assert!(settings.routing.apps.is_empty());
    assert!(settings.store.models.is_empty());
    assert!(settings.import.fixtures.is_empty());
}

#[test]
fn settings_deserialize_with_partial_sections() {
    let raw = json!({
        "database": { "alias": "archive" },
        "routing": { "apps": { "audit": "archive" } },
        "store": { "models": [{ "name": "library.book", "required": ["title", "author"] }] },
        "import": { "fixtures": [
            { "path": "fixtures/books.json" },
            { "path": "fixtures/authors.txt", "format": "jsonl" }
        ] }
    });

    let settings: Settings = serde_json::from_value(raw).expect("settings deserialize");
    assert_eq!(settings.database.alias, "archive");
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.routing.apps.get("audit").map(String::as_str), Some("archive"));
    assert_eq!(settings.store.models[0].name, "library.book");
    assert_eq!(settings.store.models[0].required, ["title", "author"]);
    assert_eq!(settings.import.fixtures.len(), 2);
    assert!(settings.import.fixtures[0].format.is_none());
    assert_eq!(settings.import.fixtures[1].format.as_deref(), Some("jsonl"));
}

#[test]
fn deref_mut_detaches_clones() {
    let original = Settings::default();
    let mut edited = original.clone();
    edited.database.alias = "replica".to_owned();

    assert_eq!(original.database.alias, "default");
    assert_eq!(edited.database.alias, "replica");
}
