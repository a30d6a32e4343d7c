use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::errors::{ClientError, ClientResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    LabAssistant,
    Faculty,
    CentralStoreAdmin,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Lab assistants, admins and central store admins hand out and take back
    /// items. Only `Admin` gets the date grace period and overrides.
    pub fn can_allocate(&self) -> bool {
        matches!(self, Role::Admin | Role::LabAssistant | Role::CentralStoreAdmin)
    }
}

/// Claims the lab API puts in its access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn user_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.sub.as_deref())
    }
}

/// Reads the claims of an access token without verifying its signature.
///
/// The client only uses the role to decide which controls to offer; every
/// call is still authorised by the server against the signed token.
pub fn decode_claims(token: &str) -> ClientResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::Session(format!("unreadable access token: {}", e)))
}

#[cfg(test)]
pub(crate) fn issue_test_token(role: Role) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        id: Some("user-1".into()),
        sub: None,
        email: Some("lab@example.edu".into()),
        name: None,
        role,
        exp: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"server-side-secret"),
    )
    .expect("token encodes")
}
