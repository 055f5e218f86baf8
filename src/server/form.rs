//! Request extractors that report their failures as [`ServiceError`]s.
//!
//! Write endpoints accept `multipart/form-data`, url-encoded forms and JSON.
//! [`FormPayload`] flattens all of them into named text values and files.

use crate::error::{ServiceError, ServiceResult};
use crate::media::{MediaStore, UploadCategory};
use crate::reference::RawIdList;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts},
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
    files: Vec<(String, Bytes)>,
}

/// `songIds[]` and `songIds` name the same field.
fn field_name(raw: &str) -> String {
    raw.strip_suffix("[]").unwrap_or(raw).to_string()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl FormPayload {
    fn push_field(&mut self, name: &str, value: String) {
        self.fields.push((field_name(name), value));
    }

    fn from_json(value: Value) -> ServiceResult<Self> {
        let Value::Object(map) = value else {
            return Err(ServiceError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        };
        let mut payload = FormPayload::default();
        for (name, value) in map {
            match value {
                Value::Array(values) if values.is_empty() => {
                    // present but empty
                    payload.push_field(&name, String::new());
                }
                Value::Array(values) => {
                    for value in values.iter().filter_map(scalar_text) {
                        payload.push_field(&name, value);
                    }
                }
                other => {
                    if let Some(text) = scalar_text(&other) {
                        payload.push_field(&name, text);
                    }
                }
            }
        }
        Ok(payload)
    }

    async fn from_multipart(mut multipart: Multipart) -> ServiceResult<Self> {
        let mut payload = FormPayload::default();
        let bad_part = |err: axum::extract::multipart::MultipartError| {
            ServiceError::Validation(err.body_text())
        };
        while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
            let Some(name) = field.name().map(field_name) else {
                continue;
            };
            if field.file_name().is_some() {
                let bytes = field.bytes().await.map_err(bad_part)?;
                // browsers send an empty part for an untouched file input
                if !bytes.is_empty() {
                    payload.files.push((name, bytes));
                }
            } else {
                let text = field.text().await.map_err(bad_part)?;
                payload.fields.push((name, text));
            }
        }
        Ok(payload)
    }

    /// First value of a text field.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }

    /// All values of a multi-valued field, `None` when the field was not sent.
    pub fn id_list(&self, name: &str) -> Option<RawIdList> {
        let values: Vec<String> = self
            .fields
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
            .collect();
        if values.is_empty() {
            return None;
        }
        RawIdList::from_values(values)
    }

    pub fn file(&self, name: &str) -> Option<&Bytes> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, bytes)| bytes)
    }
}

/// Files stored while handling one request. Unless committed, they are
/// removed again when the guard is dropped.
pub struct Uploads<'a> {
    media: &'a dyn MediaStore,
    stored: Vec<(UploadCategory, String)>,
}

impl<'a> Uploads<'a> {
    pub fn new(media: &'a dyn MediaStore) -> Self {
        Uploads {
            media,
            stored: vec![],
        }
    }

    /// Stores the named upload of `form`, if one was sent, and returns its filename.
    pub fn store(
        &mut self,
        form: &FormPayload,
        name: &str,
        category: UploadCategory,
    ) -> ServiceResult<Option<String>> {
        let Some(bytes) = form.file(name) else {
            return Ok(None);
        };
        let filename = self.media.store(category, bytes)?;
        self.stored.push((category, filename.clone()));
        Ok(Some(filename))
    }

    /// Keeps the stored files once the write referencing them went through.
    pub fn commit(mut self) {
        self.stored.clear();
    }
}

impl Drop for Uploads<'_> {
    fn drop(&mut self) {
        for (category, filename) in self.stored.drain(..) {
            debug!("Dropping orphan upload {}/{}", category, filename);
            if let Err(err) = self.media.discard(category, &filename) {
                warn!("Cannot remove orphan upload {}/{}: {}", category, filename, err);
            }
        }
    }
}

impl<S> FromRequest<S> for FormPayload
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ServiceError::Validation(rejection.body_text()))?;
            FormPayload::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|rejection| ServiceError::Validation(rejection.body_text()))?;
            FormPayload::from_json(value)
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|rejection| ServiceError::Validation(rejection.body_text()))?;
            let mut payload = FormPayload::default();
            for (name, value) in pairs {
                payload.push_field(&name, value);
            }
            Ok(payload)
        } else {
            Ok(FormPayload::default())
        }
    }
}

/// Query string deserialisation with a JSON error body.
#[derive(Debug, Clone, Default)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(params)| QueryParams(params))
            .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
    }
}

/// JSON body deserialisation with a JSON error body.
#[derive(Debug, Clone, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_files::PNG;
    use crate::media::{FileMediaStore, UploadLimits};
    use axum::body::Body;
    use tempfile::TempDir;

    async fn extract(content_type: &str, body: impl Into<Body>) -> ServiceResult<FormPayload> {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap();
        FormPayload::from_request(request, &()).await
    }

    #[tokio::test]
    async fn json_scalars_and_arrays() {
        let payload = extract(
            "application/json",
            r#"{"title": "Blue", "songIds": ["a", "b"], "year": 1959, "thumbnail": null}"#,
        )
        .await
        .unwrap();
        assert_eq!(payload.text("title").as_deref(), Some("Blue"));
        assert_eq!(payload.text("year").as_deref(), Some("1959"));
        assert_eq!(payload.text("thumbnail"), None);
        assert_eq!(
            payload.id_list("songIds"),
            Some(RawIdList::Many(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[tokio::test]
    async fn json_empty_array_is_present() {
        let payload = extract("application/json", r#"{"songIds": []}"#)
            .await
            .unwrap();
        let ids = payload.id_list("songIds").unwrap();
        assert!(ids.is_empty());
        assert_eq!(payload.id_list("other"), None);
    }

    #[tokio::test]
    async fn json_must_be_an_object() {
        let err = extract("application/json", "[1, 2]").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = extract("application/json", "{nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn url_encoded_repeated_fields() {
        let payload = extract(
            "application/x-www-form-urlencoded",
            "title=Kind&songIds%5B%5D=a&songIds%5B%5D=b",
        )
        .await
        .unwrap();
        assert_eq!(payload.text("title").as_deref(), Some("Kind"));
        assert_eq!(
            payload.id_list("songIds"),
            Some(RawIdList::Many(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[tokio::test]
    async fn multipart_fields_and_files() {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             So What\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"songIds\"\r\n\r\n\
             one\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"thumbnail\"; filename=\"t.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"fileMp3\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             \r\n\
             --{b}--\r\n",
            b = boundary
        );
        let payload = extract(
            &format!("multipart/form-data; boundary={}", boundary),
            body,
        )
        .await
        .unwrap();
        assert_eq!(payload.text("title").as_deref(), Some("So What"));
        assert_eq!(
            payload.id_list("songIds"),
            Some(RawIdList::One("one".to_string()))
        );
        assert_eq!(
            payload.file("thumbnail").map(|b| b.as_ref()),
            Some(&b"PNGDATA"[..])
        );
        assert!(payload.file("fileMp3").is_none());
    }

    fn payload_with_files(files: &[(&str, &'static [u8])]) -> FormPayload {
        FormPayload {
            fields: vec![],
            files: files
                .iter()
                .map(|(name, bytes)| (name.to_string(), Bytes::from_static(bytes)))
                .collect(),
        }
    }

    fn stored_files(dir: &std::path::Path, category: UploadCategory) -> usize {
        std::fs::read_dir(dir.join("uploads").join(category.dir_name()))
            .unwrap()
            .count()
    }

    #[test]
    fn uncommitted_uploads_are_removed() {
        let temp_dir = TempDir::new().unwrap();
        let media = FileMediaStore::new(temp_dir.path(), UploadLimits::default()).unwrap();
        // the image is stored, then the audio gate rejects the second file
        let payload = payload_with_files(&[("thumbnail", PNG), ("fileMp3", PNG)]);

        let mut uploads = Uploads::new(&media);
        let thumbnail = uploads
            .store(&payload, "thumbnail", UploadCategory::Thumbnails)
            .unwrap();
        assert!(thumbnail.is_some());
        assert_eq!(stored_files(temp_dir.path(), UploadCategory::Thumbnails), 1);
        assert!(uploads
            .store(&payload, "fileMp3", UploadCategory::Mp3)
            .is_err());
        drop(uploads);

        assert_eq!(stored_files(temp_dir.path(), UploadCategory::Thumbnails), 0);
        assert_eq!(stored_files(temp_dir.path(), UploadCategory::Mp3), 0);
    }

    #[test]
    fn committed_uploads_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let media = FileMediaStore::new(temp_dir.path(), UploadLimits::default()).unwrap();
        let payload = payload_with_files(&[("avatar", PNG)]);

        let mut uploads = Uploads::new(&media);
        assert!(uploads
            .store(&payload, "cover", UploadCategory::Avatars)
            .unwrap()
            .is_none());
        let avatar = uploads
            .store(&payload, "avatar", UploadCategory::Avatars)
            .unwrap()
            .unwrap();
        uploads.commit();

        assert!(temp_dir
            .path()
            .join("uploads/avatars")
            .join(avatar)
            .is_file());
    }

    #[tokio::test]
    async fn bodies_without_a_known_type_are_empty() {
        let payload = extract("text/plain", "hello").await.unwrap();
        assert_eq!(payload.text("hello"), None);
    }
}
