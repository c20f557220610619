//! API request URL construction

use url::Url;

use crate::config::{ItemSpec, RunConfig, check_identifier};
use crate::error::FetchError;

/// Build `{server}/api/release/{identifier}?archive=true&...` for one item.
///
/// The identifier must be a single path name (see [`check_identifier`]).
/// Exactly one selector is appended: `version`, else `commit`, else the item's
/// `status`, else the run's default status.
pub fn build_request_url(item: &ItemSpec, config: &RunConfig) -> Result<Url, FetchError> {
    check_identifier(&item.identifier)?;

    let mut url = Url::parse(&config.server)
        .map_err(|e| FetchError::Config(format!("Invalid server url {}: {e}", config.server)))?;

    url.path_segments_mut()
        .map_err(|()| FetchError::Config(format!("Server url {} cannot be a base", config.server)))?
        .pop_if_empty()
        .extend(["api", "release", item.identifier.as_str()]);

    {
        let mut query = url.query_pairs_mut();
        query.clear().append_pair("archive", "true");

        if let Some(version) = &item.version {
            query.append_pair("version", version);
        } else if let Some(commit) = &item.commit {
            query.append_pair("commit", commit);
        } else if let Some(status) = &item.status {
            query.append_pair("status", status);
        } else {
            query.append_pair("status", &config.default_status);
        }

        if config.debug {
            query.append_pair("debug", "true");
        }
        if let Some(token) = config.token() {
            query.append_pair("token", token);
        }
    }

    Ok(url)
}

/// Copy of `url` with the token value masked, for logging
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "token") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new("https://connect.example", "games")
    }

    fn query(url: &Url, key: &str) -> Vec<String> {
        url.query_pairs()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .collect()
    }

    #[test]
    fn default_status_when_no_selector() {
        let url = build_request_url(&ItemSpec::new("demo"), &config()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://connect.example/api/release/demo?archive=true&status=prod"
        );
    }

    #[test]
    fn item_status_overrides_default() {
        let mut cfg = config();
        cfg.default_status = "dev".into();
        let url = build_request_url(&ItemSpec::new("demo").with_status("beta"), &cfg).unwrap();
        assert_eq!(query(&url, "status"), vec!["beta"]);
    }

    #[test]
    fn version_beats_commit_and_status() {
        let item = ItemSpec::new("demo")
            .with_version("1.0.0")
            .with_commit("abc")
            .with_status("beta");
        let url = build_request_url(&item, &config()).unwrap();
        assert_eq!(query(&url, "version"), vec!["1.0.0"]);
        assert!(query(&url, "commit").is_empty());
        assert!(query(&url, "status").is_empty());
    }

    #[test]
    fn commit_beats_status() {
        let item = ItemSpec::new("demo").with_commit("abc").with_status("beta");
        let url = build_request_url(&item, &config()).unwrap();
        assert_eq!(query(&url, "commit"), vec!["abc"]);
        assert!(query(&url, "status").is_empty());
    }

    #[test]
    fn debug_and_token_flags() {
        let url = build_request_url(&ItemSpec::new("demo"), &config()).unwrap();
        assert!(query(&url, "debug").is_empty());
        assert!(query(&url, "token").is_empty());

        let mut cfg = config();
        cfg.debug = true;
        cfg.token = Some("s3cret".into());
        let url = build_request_url(&ItemSpec::new("demo"), &cfg).unwrap();
        assert_eq!(
            url.as_str(),
            "https://connect.example/api/release/demo?archive=true&status=prod&debug=true&token=s3cret"
        );

        cfg.token = Some(String::new());
        let url = build_request_url(&ItemSpec::new("demo"), &cfg).unwrap();
        assert!(query(&url, "token").is_empty());
    }

    #[test]
    fn empty_identifier_is_invalid() {
        let err = build_request_url(&ItemSpec::new(""), &config()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidItem));
    }

    #[test]
    fn rejects_identifiers_that_are_not_a_single_name() {
        for id in ["..", ".", "a/../b", "../escape", "nested/game", "back\\slash"] {
            let err = build_request_url(&ItemSpec::new(id), &config()).unwrap_err();
            assert!(
                matches!(err, FetchError::UnsafeIdentifier(ref got) if got == id),
                "{id} was accepted"
            );
        }
    }

    #[test]
    fn encodes_special_characters() {
        let item = ItemSpec::new("my game?#v2").with_version("1.0 beta&x");
        let url = build_request_url(&item, &config()).unwrap();
        assert_eq!(url.path(), "/api/release/my%20game%3F%23v2");
        assert_eq!(query(&url, "version"), vec!["1.0 beta&x"]);
    }

    #[test]
    fn dotted_bundle_ids_are_plain_names() {
        let url = build_request_url(&ItemSpec::new("com.example.game"), &config()).unwrap();
        assert_eq!(url.path(), "/api/release/com.example.game");
    }

    #[test]
    fn keeps_server_path_prefix() {
        let cfg = RunConfig::new("https://host.example/connect/", "games");
        let url = build_request_url(&ItemSpec::new("demo"), &cfg).unwrap();
        assert_eq!(url.path(), "/connect/api/release/demo");
    }

    #[test]
    fn redact_masks_token_only() {
        let mut cfg = config();
        cfg.token = Some("s3cret".into());
        let url = build_request_url(&ItemSpec::new("demo"), &cfg).unwrap();
        let shown = redact(&url);
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("status=prod"));
        assert!(shown.contains("token=***") || shown.contains("token=%2A%2A%2A"));
    }
}
