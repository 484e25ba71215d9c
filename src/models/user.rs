use serde::{Deserialize, Serialize};

/// Identity returned by `GET /users/@me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateDisplayName<'a> {
    pub global_name: &'a str,
}

/// Error body returned by the API on a rejected request.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
