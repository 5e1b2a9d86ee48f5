use super::*;
use serde_json::json;

#[test]
fn display_prefers_artist_dash_title() {
    let t = Track::new("1").with_title("Song").with_artist("Artist");
    assert_eq!(t.display(), "Artist - Song");

    let t = Track::new("1").with_title("Song").with_artist("   ");
    assert_eq!(t.display(), "Song");

    let t = Track::new("42");
    assert_eq!(t.display(), "42");
}

#[test]
fn numeric_ids_are_accepted() {
    let t: Track = serde_json::from_value(json!({
        "id": 1234,
        "title": "Song",
        "album_id": 77,
    }))
    .unwrap();
    assert_eq!(t.id, "1234");
    assert_eq!(t.album_id.as_deref(), Some("77"));
}

#[test]
fn unknown_fields_survive_a_trip_through_json() {
    let raw = json!({
        "id": "abc",
        "title": "Song",
        "duration": 183000,
        "track": 4,
        "format": "flac",
    });

    let t: Track = serde_json::from_value(raw).unwrap();
    assert_eq!(t.duration, Some(183_000));
    assert_eq!(t.extra.get("format"), Some(&json!("flac")));

    let back = serde_json::to_value(&t).unwrap();
    assert_eq!(back["track"], json!(4));
    assert_eq!(back["format"], json!("flac"));
    assert!(back.get("artist").is_none());
}

#[test]
fn missing_id_is_rejected() {
    assert!(serde_json::from_value::<Track>(json!({ "title": "x" })).is_err());
}
