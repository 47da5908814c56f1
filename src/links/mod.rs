//! Link handling for list and detail pages
//!
//! This module builds page URLs from the configured templates and pulls the
//! record id out of a detail link's query string.

use url::form_urlencoded;
use url::Url;

/// Fills the `{page}` placeholder of a list URL template
pub fn list_page_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}

/// Fills the `{id}` placeholder of a detail URL template
///
/// The id is form-encoded so it cannot break out of its query parameter.
pub fn detail_page_url(template: &str, id: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(id.as_bytes()).collect();
    template.replace("{id}", &encoded)
}

/// Extracts the record id carried by a detail link
///
/// The href is resolved against the page it was found on, so relative links
/// work. Ids are decimal digits; anything else (no `param` query parameter,
/// an empty value, letters or signs in it, an unresolvable link) yields `None`
/// and the row is treated as having no id.
///
/// # Example
///
/// ```
/// use catalog_harvest::links::extract_record_id;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/list/3.html").unwrap();
/// let id = extract_record_id("../detail.aspx?ID=4711&x=1", &base, "ID");
/// assert_eq!(id, Some("4711".to_string()));
/// ```
pub fn extract_record_id(href: &str, base: &Url, param: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = base.join(href).ok()?;
    resolved
        .query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| is_record_id(value))
}

/// Whether `value` has the shape of a record id
pub fn is_record_id(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/list/1.html").unwrap()
    }

    #[test]
    fn test_list_page_url() {
        assert_eq!(
            list_page_url("https://example.com/list/{page}.html", 42),
            "https://example.com/list/42.html"
        );
    }

    #[test]
    fn test_detail_page_url_encodes_id() {
        assert_eq!(
            detail_page_url("https://example.com/detail?ID={id}", "123"),
            "https://example.com/detail?ID=123"
        );
        assert_eq!(
            detail_page_url("https://example.com/detail?ID={id}", "a&b"),
            "https://example.com/detail?ID=a%26b"
        );
    }

    #[test]
    fn test_extract_id_from_absolute_link() {
        let id = extract_record_id("https://other.org/d.aspx?ID=99", &base(), "ID");
        assert_eq!(id, Some("99".to_string()));
    }

    #[test]
    fn test_extract_id_from_relative_link() {
        let id = extract_record_id("detail.aspx?foo=1&ID=123", &base(), "ID");
        assert_eq!(id, Some("123".to_string()));
    }

    #[test]
    fn test_missing_param() {
        assert_eq!(extract_record_id("detail.aspx?id=123", &base(), "ID"), None);
        assert_eq!(extract_record_id("detail.aspx", &base(), "ID"), None);
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        assert_eq!(extract_record_id("detail.aspx?ID=AB12", &base(), "ID"), None);
        assert_eq!(extract_record_id("detail.aspx?ID=-5", &base(), "ID"), None);
        assert_eq!(extract_record_id("detail.aspx?ID=1%202", &base(), "ID"), None);
        assert!(is_record_id("0042"));
        assert!(!is_record_id(""));
    }

    #[test]
    fn test_empty_param_or_href() {
        assert_eq!(extract_record_id("detail.aspx?ID=", &base(), "ID"), None);
        assert_eq!(extract_record_id("   ", &base(), "ID"), None);
    }
}
