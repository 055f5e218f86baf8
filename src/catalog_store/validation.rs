//! Validation of catalog write payloads.
//!
//! These checks run inside the store, before anything is written, so a rejected
//! payload never leaves a partial row behind. They check shape only; existence
//! of referenced entities is the caller's concern.

use super::models::*;
use crate::error::{ServiceError, ServiceResult};
use crate::reference::is_well_formed_id;

fn require_text(field: &'static str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::EmptyField { field });
    }
    Ok(())
}

fn require_optional_text(field: &'static str, value: Option<&String>) -> ServiceResult<()> {
    match value {
        Some(value) => require_text(field, value),
        None => Ok(()),
    }
}

fn require_id(field: &'static str, value: &str) -> ServiceResult<()> {
    if !is_well_formed_id(value) {
        return Err(ServiceError::invalid(field, value));
    }
    Ok(())
}

fn require_optional_id(field: &'static str, value: Option<&String>) -> ServiceResult<()> {
    match value {
        Some(value) => require_id(field, value),
        None => Ok(()),
    }
}

fn require_ids(field: &'static str, values: &[String]) -> ServiceResult<()> {
    values.iter().try_for_each(|value| require_id(field, value))
}

pub fn validate_new_artist(artist: &NewArtist) -> ServiceResult<()> {
    require_text("fullname", &artist.fullname)
}

pub fn validate_artist_update(update: &ArtistUpdate) -> ServiceResult<()> {
    require_optional_text("fullname", update.fullname.as_ref())
}

pub fn validate_new_song(song: &NewSong) -> ServiceResult<()> {
    require_text("fullname", &song.fullname)?;
    require_optional_id("artistId", song.artist_id.as_ref())?;
    require_optional_id("albumId", song.album_id.as_ref())
}

pub fn validate_song_update(update: &SongUpdate) -> ServiceResult<()> {
    require_optional_text("fullname", update.fullname.as_ref())?;
    require_optional_id("artistId", update.artist_id.as_ref())?;
    require_optional_id("albumId", update.album_id.as_ref())
}

pub fn validate_new_album(album: &NewAlbum) -> ServiceResult<()> {
    require_text("title", &album.title)?;
    if album.artist_id.is_empty() {
        return Err(ServiceError::EmptyField { field: "artistId" });
    }
    require_id("artistId", &album.artist_id)?;
    require_ids("songIds", &album.song_ids)
}

pub fn validate_album_update(update: &AlbumUpdate) -> ServiceResult<()> {
    require_optional_text("title", update.title.as_ref())?;
    require_optional_id("artistId", update.artist_id.as_ref())?;
    match &update.song_ids {
        Some(song_ids) => require_ids("songIds", song_ids),
        None => Ok(()),
    }
}

pub fn validate_new_playlist(playlist: &NewPlaylist) -> ServiceResult<()> {
    require_text("title", &playlist.title)?;
    require_optional_id("userId", playlist.user_id.as_ref())?;
    require_ids("songIds", &playlist.song_ids)
}

pub fn validate_playlist_update(update: &PlaylistUpdate) -> ServiceResult<()> {
    require_optional_text("title", update.title.as_ref())?;
    match &update.song_ids {
        Some(song_ids) => require_ids("songIds", song_ids),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "65a1f0c2e4b0a1b2c3d4e5f6";

    #[test]
    fn test_validate_new_artist() {
        assert!(validate_new_artist(&NewArtist {
            fullname: "Son Tung".to_string(),
            avatar: None,
        })
        .is_ok());

        let result = validate_new_artist(&NewArtist {
            fullname: "   ".to_string(),
            avatar: None,
        });
        assert!(matches!(
            result,
            Err(ServiceError::EmptyField { field: "fullname" })
        ));
    }

    #[test]
    fn test_validate_new_song_references() {
        let song = NewSong {
            fullname: "Track".to_string(),
            artist_id: Some(ID.to_string()),
            ..Default::default()
        };
        assert!(validate_new_song(&song).is_ok());

        let song = NewSong {
            fullname: "Track".to_string(),
            album_id: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_new_song(&song),
            Err(ServiceError::InvalidValue {
                field: "albumId",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_new_album_requires_title_and_artist() {
        let mut album = NewAlbum {
            title: "Album".to_string(),
            artist_id: ID.to_string(),
            song_ids: vec![ID.to_string()],
            ..Default::default()
        };
        assert!(validate_new_album(&album).is_ok());

        album.title = "".to_string();
        assert!(matches!(
            validate_new_album(&album),
            Err(ServiceError::EmptyField { field: "title" })
        ));

        album.title = "Album".to_string();
        album.artist_id = String::new();
        assert!(matches!(
            validate_new_album(&album),
            Err(ServiceError::EmptyField { field: "artistId" })
        ));
    }

    #[test]
    fn test_validate_updates_only_check_provided_fields() {
        assert!(validate_album_update(&AlbumUpdate::default()).is_ok());
        assert!(validate_song_update(&SongUpdate::default()).is_ok());
        assert!(validate_playlist_update(&PlaylistUpdate::default()).is_ok());

        let update = AlbumUpdate {
            title: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(validate_album_update(&update).is_err());

        let update = PlaylistUpdate {
            song_ids: Some(vec!["bad".to_string()]),
            ..Default::default()
        };
        assert!(validate_playlist_update(&update).is_err());
    }
}
