use super::*;

#[test]
fn bare_host_gets_endpoint_at_root() {
    let url = build_url("https://music.example.com", "/v1/file/").unwrap();
    assert_eq!(url.as_str(), "https://music.example.com/v1/file/");
}

#[test]
fn path_prefix_is_kept() {
    let url = build_url("https://example.com/euterpe", "/v1/file/").unwrap();
    assert_eq!(url.as_str(), "https://example.com/euterpe/v1/file/");

    let url = build_url("https://example.com/euterpe/", "/v1/search/").unwrap();
    assert_eq!(url.as_str(), "https://example.com/euterpe/v1/search/");
}

#[test]
fn empty_address_is_rejected() {
    assert!(matches!(
        build_url("  ", "/v1/file/"),
        Err(ResolveError::NoAddress)
    ));
}

#[test]
fn unparsable_address_is_rejected() {
    assert!(matches!(
        build_url("not a url", "/v1/file/"),
        Err(ResolveError::InvalidAddress { .. })
    ));
}

#[test]
fn resolves_track_ids_with_token() {
    let resolver = ServiceResolver::new("http://localhost:9996", Some("secret".into()));
    let source = resolver.resolve("42").unwrap();
    assert_eq!(source.url, "http://localhost:9996/v1/file/42");
    assert_eq!(source.token.as_deref(), Some("secret"));
}

#[test]
fn track_ids_are_percent_encoded() {
    let resolver = ServiceResolver::new("http://localhost:9996/", None);
    let source = resolver.resolve("a b/c").unwrap();
    assert_eq!(source.url, "http://localhost:9996/v1/file/a%20b%2Fc");
    assert_eq!(source.token, None);
}

#[test]
fn empty_token_and_empty_id() {
    let resolver = ServiceResolver::new("http://localhost:9996", Some(String::new()));
    assert_eq!(resolver.resolve("1").unwrap().token, None);
    assert!(matches!(
        resolver.resolve(""),
        Err(ResolveError::InvalidId(_))
    ));
}
