/// Request body decoding for the page surface
///
/// Post forms usually arrive as `multipart/form-data` (they may carry an
/// image) but a plain urlencoded body is accepted too. Comment and search
/// forms are always urlencoded.
use crate::error::{AppError, FieldErrors, Result};
use crate::media::ImageUpload;
use crate::services::{ImageChange, PostInput};
use actix_multipart::Multipart;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

const URLENCODED: &str = "application/x-www-form-urlencoded";

/// Text fields of a post form sent without multipart encoding.
#[derive(Debug, Default, Deserialize)]
struct PostFields {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: String,
    #[serde(default, rename = "image-clear")]
    image_clear: Option<String>,
}

impl From<PostFields> for PostForm {
    fn from(fields: PostFields) -> Self {
        Self {
            text: fields.text,
            group: fields.group.trim().to_string(),
            image: None,
            clear_image: fields.image_clear.is_some_and(|v| !v.is_empty()),
        }
    }
}

/// Raw fields of the post create/edit form, echoed back when re-rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostForm {
    pub text: String,
    /// Group id as submitted; empty means no group
    pub group: String,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
    /// The "clear" checkbox next to an existing image
    #[serde(skip)]
    pub clear_image: bool,
}

impl PostForm {
    /// Read the form in whichever encoding the request declares.
    pub async fn from_request(
        req: &HttpRequest,
        payload: web::Payload,
        max_upload_bytes: usize,
    ) -> Result<Self> {
        if req.content_type().eq_ignore_ascii_case(URLENCODED) {
            let mut payload = payload.into_inner();
            let fields = web::Form::<PostFields>::from_request(req, &mut payload)
                .await
                .map_err(|e| malformed(e.to_string()))?;
            return Ok(fields.into_inner().into());
        }

        Self::from_multipart(Multipart::new(req.headers(), payload), max_upload_bytes).await
    }

    /// Drain a multipart payload. File bytes beyond `max_upload_bytes` are
    /// dropped; the truncated upload then fails image validation.
    pub async fn from_multipart(mut payload: Multipart, max_upload_bytes: usize) -> Result<Self> {
        let mut form = PostForm::default();

        while let Some(item) = payload.next().await {
            let mut field = item.map_err(|e| malformed(e.to_string()))?;
            let name = field.name().unwrap_or_default().to_string();
            let filename = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(str::to_string);

            let mut data = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| malformed(e.to_string()))?;
                if data.len() <= max_upload_bytes {
                    let room = max_upload_bytes + 1 - data.len();
                    data.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
            }

            match name.as_str() {
                "text" => form.text = String::from_utf8_lossy(&data).into_owned(),
                "group" => form.group = String::from_utf8_lossy(&data).trim().to_string(),
                "image-clear" => form.clear_image = !data.is_empty(),
                "image" => {
                    let unnamed = filename.as_deref().map_or(true, str::is_empty);
                    if !(data.is_empty() && unnamed) {
                        form.image = Some(ImageUpload::new(filename, data));
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Turn the submitted strings into service input.
    pub fn to_input(&self) -> std::result::Result<PostInput, FieldErrors> {
        let group_id = if self.group.is_empty() {
            None
        } else {
            match self.group.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    return Err(FieldErrors::single(
                        "group",
                        "Select a valid choice. That choice is not one of the available choices.",
                    ))
                }
            }
        };

        let image = match (&self.image, self.clear_image) {
            (Some(upload), _) => ImageChange::Replace(upload.clone()),
            (None, true) => ImageChange::Clear,
            (None, false) => ImageChange::Keep,
        };

        Ok(PostInput::new(self.text.clone(), group_id).with_image(image))
    }
}

fn malformed(detail: String) -> AppError {
    tracing::debug!(error = %detail, "Malformed form body");
    AppError::invalid("non_field_errors", "The submitted form data could not be read.")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}
