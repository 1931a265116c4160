use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

/// Bearer tokens expire one hour after issue.
pub const TOKEN_TTL_HOURS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: usize,
}

impl Claims {
    /// Display name for authored content: the claimed name, else the email local part.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

fn secret() -> Result<String, JwtError> {
    env::var("JWT_SECRET").map_err(|_| JwtError::from(ErrorKind::InvalidKeyFormat))
}

/// Validate a JWT and return its claims.
fn decode_jwt(token: &str) -> Result<Claims, JwtError> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn email(&self) -> &str { &self.0.email }
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return match decode_jwt(bearer.token()) {
                Ok(claims) => ready(Ok(Auth(claims))),
                Err(e) => {
                    log::debug!("rejected bearer token: {e}");
                    ready(Err(actix_web::error::ErrorUnauthorized("unauthorized access")))
                }
            };
        }
        ready(Err(actix_web::error::ErrorUnauthorized("unauthorized access")))
    }
}

/// Issue a token for `email`, valid for one hour.
pub fn create_jwt(email: &str, name: Option<&str>) -> Result<String, JwtError> {
    let secret = secret()?;
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| JwtError::from(ErrorKind::ExpiredSignature))?
        .timestamp() as usize;

    let claims = Claims {
        email: email.to_string(),
        name: name.map(str::to_string),
        exp: expiration,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}
