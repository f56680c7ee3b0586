//! Client for the remote Memorious API: note CRUD plus the text-generation
//! endpoint. All routes are JSON over HTTP and treated as fixed collaborators;
//! this module only does the wire plumbing and error mapping.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Note;

/// Errors from the remote API. `Status` carries the message from the server's
/// `{ "error": .. }` body when one is present.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NotesEnvelope {
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct NoteEnvelope {
    note: Note,
}

#[derive(Debug, Deserialize)]
struct DeleteEnvelope {
    success: bool,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateEnvelope {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

// ── Client ─────────────────────────────────────────────────────────────────

/// Thin reqwest wrapper over the Memorious API surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    /// Build a client for the given base URL, e.g. `http://localhost:3000/`.
    pub fn new(base: impl AsRef<str>) -> Result<Self, ApiError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base.as_ref())?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// `GET /notes/user/{userId}` — the user's full note collection.
    pub async fn fetch_notes(&self, user_id: &str) -> Result<Vec<Note>, ApiError> {
        let url = self.endpoint(&format!("notes/user/{}", user_id))?;
        let response = check(self.http.get(url).send().await?).await?;
        let envelope: NotesEnvelope = response.json().await?;
        Ok(envelope.notes)
    }

    /// `POST /notes/{userId}` — create a note, returning the server's
    /// representation with its stable id.
    pub async fn create_note(
        &self,
        user_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Note, ApiError> {
        let url = self.endpoint(&format!("notes/{}", user_id))?;
        let body = CreateBody {
            user_id,
            title,
            content,
        };
        let response = check(self.http.post(url).json(&body).send().await?).await?;
        let envelope: NoteEnvelope = response.json().await?;
        Ok(envelope.note)
    }

    /// `PUT /notes/{noteId}` — update title/content. The returned note is
    /// authoritative for any server-side fields.
    pub async fn update_note(
        &self,
        note_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Note, ApiError> {
        let url = self.endpoint(&format!("notes/{}", note_id))?;
        let body = UpdateBody { title, content };
        let response = check(self.http.put(url).json(&body).send().await?).await?;
        let envelope: NoteEnvelope = response.json().await?;
        Ok(envelope.note)
    }

    /// `DELETE /notes/{noteId}`.
    pub async fn delete_note(&self, note_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("notes/{}", note_id))?;
        let response = check(self.http.delete(url).send().await?).await?;
        let envelope: DeleteEnvelope = response.json().await?;
        if !envelope.success {
            return Err(ApiError::Status {
                status: 200,
                message: "delete not acknowledged".to_string(),
            });
        }
        Ok(())
    }

    /// `POST /gemini` — plain generated text for a composed prompt.
    pub async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = self.endpoint("gemini")?;
        let body = GenerateBody { prompt };
        let response = check(self.http.post(url).json(&body).send().await?).await?;
        let envelope: GenerateEnvelope = response.json().await?;
        Ok(envelope.response)
    }
}

/// Map a non-2xx response to `ApiError::Status`, pulling the message out of
/// the `{ "error": .. }` body when the server sent one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let client = ApiClient::new("http://127.0.0.1:3000").expect("client");
        let url = client.endpoint("notes/user/u1").expect("endpoint");
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/notes/user/u1");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }

    #[test]
    fn test_notes_envelope_decodes() {
        let json = r#"{ "notes": [ { "id": "n1", "title": "A", "content": "<p>a</p>" } ] }"#;
        let envelope: NotesEnvelope = serde_json::from_str(json).expect("decode");
        assert_eq!(envelope.notes.len(), 1);
        assert_eq!(envelope.notes[0].id, "n1");
    }

    #[test]
    fn test_create_body_uses_camel_case_user_id() {
        let body = CreateBody {
            user_id: "u1",
            title: "T",
            content: "",
        };
        let json = serde_json::to_string(&body).expect("encode");
        assert!(json.contains("\"userId\":\"u1\""));
    }

    #[test]
    fn test_error_envelope_decodes() {
        let envelope: ErrorEnvelope =
            serde_json::from_str(r#"{ "error": "Invalid request" }"#).expect("decode");
        assert_eq!(envelope.error, "Invalid request");
    }
}
