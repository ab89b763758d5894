use axum::{Extension, Json};

use crate::models::{ApiClient, WhoAmIResponse};

/// `GET /whoami` - Name of the client the API key resolved to.
///
/// The extension is only present when the route sits behind
/// [`ApiKeyAuth`](crate::middleware::ApiKeyAuth).
pub async fn whoami(client: Option<Extension<ApiClient>>) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        authenticated: client.is_some(),
        client: client.map(|Extension(c)| c.name),
    })
}
