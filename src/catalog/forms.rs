//! Loosely typed write requests, as they arrive from forms.
//!
//! Text fields are kept raw here. [`super::CatalogManager`] trims, validates and
//! resolves references before building the store payloads.

use crate::error::{ServiceError, ServiceResult};
use crate::reference::RawIdList;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Default)]
pub struct ArtistForm {
    pub fullname: Option<String>,
    /// Stored filename of a freshly uploaded avatar.
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SongForm {
    pub fullname: Option<String>,
    pub artist_id: Option<String>,
    pub album_id: Option<String>,
    pub thumbnail: Option<String>,
    pub file_mp3: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AlbumForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artist_id: Option<String>,
    pub song_ids: Option<RawIdList>,
    pub release_date: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub song_ids: Option<RawIdList>,
    pub thumbnail: Option<String>,
}

/// Trimmed value, `None` when absent or blank.
pub(super) fn provided(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed value; blank values are kept so that validation can reject them.
pub(super) fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_release_date(raw: &str) -> ServiceResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
        .ok_or_else(|| ServiceError::invalid("releaseDate", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn release_date_formats() {
        let date = parse_release_date("2021-06-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2021, 6, 15));
        assert_eq!(date.hour(), 0);

        let date = parse_release_date("2021-06-15T10:30:00+02:00").unwrap();
        assert_eq!(date.hour(), 8);

        assert!(parse_release_date("last summer").is_err());
        assert!(parse_release_date("2021-13-01").is_err());
    }

    #[test]
    fn provided_drops_blank_values() {
        assert_eq!(provided(Some("  x ".to_string())), Some("x".to_string()));
        assert_eq!(provided(Some("   ".to_string())), None);
        assert_eq!(provided(None), None);
        assert_eq!(trimmed(Some("  ".to_string())), Some(String::new()));
    }
}
