//! User and auth DTOs

use serde::{Deserialize, Serialize};

/// Access levels at or below this value belong to staff (admin, owner, manager)
pub const STAFF_LEVEL_MAX: i32 = 2;

/// Current user (`GET /auth/me`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub level: Option<i32>,
}

/// OAuth2 password form (`POST /auth/login`, form-urlencoded)
#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
    /// The API names the email field `username`
    pub username: String,
    pub password: String,
}

/// Login response data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub level: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_minimal() {
        let resp: LoginResponse = serde_json::from_str(r#"{"access_token": "t"}"#).unwrap();
        assert_eq!(resp.access_token, "t");
        assert!(resp.user_email.is_none());
    }
}
