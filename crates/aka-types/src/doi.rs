//! DOI discovery for key assignment.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::TypeError;
use crate::record::Record;

static DOI: OnceLock<Regex> = OnceLock::new();
static DOI_LINE: OnceLock<Regex> = OnceLock::new();

fn doi_pattern() -> &'static Regex {
    DOI.get_or_init(|| {
        Regex::new(r"10(?:\.[0-9]{4,})?/\S*[^\s.,]").unwrap_or_else(|e| panic!("DOI pattern is valid: {e}"))
    })
}

fn doi_line_pattern() -> &'static Regex {
    DOI_LINE.get_or_init(|| {
        Regex::new(r"(?i)^(short)?doi:\s*(.+)$")
            .unwrap_or_else(|e| panic!("DOI line pattern is valid: {e}"))
    })
}

/// Extract the first bare DOI from `text`, stopping before a trailing `.` or `,`.
///
/// Short DOIs (`10/<code>`) have no registrant and are accepted.
///
/// ```
/// use aka_types::clean_doi;
///
/// assert_eq!(clean_doi("https://doi.org/10.1000/xyz123.").unwrap(), "10.1000/xyz123");
/// assert_eq!(clean_doi("https://doi.org/10/abcd").unwrap(), "10/abcd");
/// assert!(clean_doi("no doi here").is_err());
/// ```
pub fn clean_doi(text: &str) -> Result<String, TypeError> {
    let found = doi_pattern()
        .find(text)
        .ok_or_else(|| TypeError::InvalidDoi(text.to_string()))?;
    Ok(found.as_str().to_string())
}

/// DOI candidates found on a record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoiCandidates {
    pub long: Option<String>,
    pub short: Option<String>,
}

impl DoiCandidates {
    /// Collect from the DOI field, then `DOI:` and `shortDOI:` metadata lines.
    ///
    /// Metadata lines override the field; later lines override earlier ones.
    pub fn from_record(record: &Record) -> Self {
        let mut candidates = Self {
            long: record.doi.clone().filter(|d| !d.trim().is_empty()),
            short: None,
        };
        for line in record.metadata().lines() {
            let Some(caps) = doi_line_pattern().captures(line.trim()) else {
                continue;
            };
            let value = caps[2].trim().to_string();
            if caps.get(1).is_some() {
                candidates.short = Some(value);
            } else {
                candidates.long = Some(value);
            }
        }
        candidates
    }

    /// The cleaned DOI to assign as an alias: short form preferred.
    pub fn preferred(&self) -> Option<String> {
        let short = self.short.as_deref().and_then(|d| clean_doi(d).ok());
        short.or_else(|| self.long.as_deref().and_then(|d| clean_doi(d).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Library;

    #[test]
    fn clean_strips_prefixes_and_punctuation() {
        assert_eq!(clean_doi("doi:10.1234/ABC.def,").unwrap(), "10.1234/ABC.def");
        assert_eq!(clean_doi(" 10.5555/12345678 ").unwrap(), "10.5555/12345678");
    }

    #[test]
    fn clean_rejects_non_doi() {
        assert_eq!(
            clean_doi("10.12/too-short-registrant"),
            Err(TypeError::InvalidDoi("10.12/too-short-registrant".into()))
        );
    }

    #[test]
    fn candidates_from_field_and_lines() {
        let mut record = Record::regular("K", Library::user("1"))
            .with_metadata("shortDOI: 10/abc\nsomething\nDOI: 10.1000/line");
        record.doi = Some("10.1000/field".into());
        let found = DoiCandidates::from_record(&record);
        assert_eq!(found.long.as_deref(), Some("10.1000/line"));
        assert_eq!(found.short.as_deref(), Some("10/abc"));
    }

    #[test]
    fn clean_accepts_short_doi() {
        assert_eq!(clean_doi("10/abcd").unwrap(), "10/abcd");
        assert_eq!(clean_doi("https://doi.org/10/bd2t,").unwrap(), "10/bd2t");
    }

    #[test]
    fn clean_keeps_trailing_semicolon() {
        assert_eq!(clean_doi("10.1000/abc;").unwrap(), "10.1000/abc;");
        assert_eq!(clean_doi("10.1000/abc.,").unwrap(), "10.1000/abc");
    }

    #[test]
    fn preferred_is_short_doi_over_long() {
        let mut record = Record::regular("K", Library::user("1")).with_metadata("shortDOI: 10/abcd");
        record.doi = Some("10.1000/long".into());
        assert_eq!(
            DoiCandidates::from_record(&record).preferred().as_deref(),
            Some("10/abcd")
        );
    }

    #[test]
    fn preferred_falls_back_to_long_when_short_is_unclean() {
        let record = Record::regular("K", Library::user("1"))
            .with_metadata("shortDOI: n/a\ndoi: 10.1000/long");
        assert_eq!(
            DoiCandidates::from_record(&record).preferred().as_deref(),
            Some("10.1000/long")
        );
    }

    #[test]
    fn preferred_short_when_clean() {
        let candidates = DoiCandidates {
            long: Some("10.1000/long".into()),
            short: Some("https://doi.org/10.5555/s1".into()),
        };
        assert_eq!(candidates.preferred().as_deref(), Some("10.5555/s1"));
    }

    #[test]
    fn nothing_found() {
        let record = Record::regular("K", Library::user("1"));
        assert_eq!(DoiCandidates::from_record(&record), DoiCandidates::default());
        assert_eq!(DoiCandidates::default().preferred(), None);
    }
}
