//! Locator-to-key derivation.
//!
//! A record locator has the shape
//! `<scheme>://<host>/(users|groups)/(local/)?<scopeId>/items/<localKey>` and
//! maps to the opaque alias `"<scopeId>:<localKey>"`. Anything else is not a
//! library item and yields no key.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::TypeError;

/// Base used when rendering locators for records without an explicit one.
pub const DEFAULT_LOCATOR_BASE: &str = "http://zotero.org";

static ITEM_LOCATOR: OnceLock<Regex> = OnceLock::new();

fn item_locator() -> &'static Regex {
    ITEM_LOCATOR.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/\s]+/(?:users|groups)/(?:local/)?([A-Za-z0-9_]+)/items/([A-Za-z0-9_]+)$",
        )
        .unwrap_or_else(|e| panic!("item locator pattern is valid: {e}"))
    })
}

/// Derive `"<scopeId>:<localKey>"` from a locator.
///
/// # Examples
///
/// ```
/// use aka_types::locator_key;
///
/// assert_eq!(locator_key("http://example.org/users/123/items/ABCD").unwrap(), "123:ABCD");
/// assert!(locator_key("http://example.org/users/123/ABCD").is_err());
/// ```
pub fn locator_key(locator: &str) -> Result<String, TypeError> {
    let caps = item_locator()
        .captures(locator.trim())
        .ok_or_else(|| TypeError::LocatorMismatch(locator.to_string()))?;
    Ok(format!("{}:{}", &caps[1], &caps[2]))
}

/// Like [`locator_key`], discarding the mismatch reason.
pub fn locator_to_key(locator: &str) -> Option<String> {
    locator_key(locator).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_locator() {
        assert_eq!(
            locator_to_key("http://example.org/users/123/items/ABCD").as_deref(),
            Some("123:ABCD")
        );
    }

    #[test]
    fn group_and_local_locators() {
        assert_eq!(
            locator_to_key("http://zotero.org/groups/2259720/items/X9Z2").as_deref(),
            Some("2259720:X9Z2")
        );
        assert_eq!(
            locator_to_key("http://zotero.org/users/local/abcDEF/items/K1").as_deref(),
            Some("abcDEF:K1")
        );
    }

    #[test]
    fn scheme_and_host_do_not_matter() {
        assert_eq!(
            locator_to_key("https://mirror.local:8080/users/7/items/Q").as_deref(),
            Some("7:Q")
        );
    }

    #[test]
    fn missing_items_segment_fails() {
        let err = locator_key("http://example.org/users/123/ABCD").unwrap_err();
        assert_eq!(
            err,
            TypeError::LocatorMismatch("http://example.org/users/123/ABCD".into())
        );
    }

    #[test]
    fn other_shapes_fail() {
        assert!(locator_to_key("").is_none());
        assert!(locator_to_key("123:ABCD").is_none());
        assert!(locator_to_key("http://example.org/people/1/items/A").is_none());
        assert!(locator_to_key("http://example.org/users/1/items/A/file").is_none());
        assert!(locator_to_key("http://example.org/users/1/items/").is_none());
    }

    #[test]
    fn non_ascii_keys_fail() {
        assert!(locator_to_key("http://example.org/users/12é/items/A").is_none());
        assert!(locator_to_key("http://example.org/groups/1/items/ÅBC").is_none());
        assert!(locator_to_key("http://example.org/groups/1/items/A_b9").is_some());
    }
}
