//! Issues and verifies the signed bearer tokens used to authenticate requests.
//!
//! Tokens are HS256 JWTs signed with a key generated when the server starts,
//! so restarting the server invalidates every token. Tokens carry no expiry
//! claim: how long a token stays usable is decided by the
//! [SessionManager](crate::auth::SessionManager) alone.

use std::{collections::HashSet, fmt::Debug};

use axum::http::HeaderMap;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    auth::identity::AuthenticatedUser,
    user::{User, get_user_by_email},
};

/// The claims embedded in each token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The subject, the user's email.
    pub sub: String,
    /// Who issued the token.
    pub iss: String,
    /// When the token was issued, in seconds since the Unix epoch.
    pub iat: i64,
    /// The user's display name at the time of issue.
    pub name: String,
    /// A random ID, so that tokens issued to the same user in the same second differ.
    pub jti: String,
}

/// Signs and verifies tokens with a process-lifetime HMAC key.
#[derive(Clone)]
pub struct TokenProvider {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

/// The length in bytes of the generated signing key.
const SECRET_LENGTH: usize = 32;

impl TokenProvider {
    /// Create a provider with a freshly generated random signing key.
    pub fn new(issuer: &str) -> Self {
        let mut secret = [0u8; SECRET_LENGTH];
        rand::thread_rng().fill_bytes(&mut secret);

        Self::from_secret(issuer, &secret)
    }

    /// Create a provider that signs with `secret`.
    pub fn from_secret(issuer: &str, secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["sub".to_owned(), "iss".to_owned()]);
        validation.set_issuer(&[issuer]);

        Self {
            issuer: issuer.to_owned(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// The issuer claim written into tokens.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a signed token for `user`.
    ///
    /// # Errors
    ///
    /// Returns [Error::TokenIssueError] if the claims could not be signed.
    pub fn issue(&self, user: &User) -> Result<String, Error> {
        let claims = Claims {
            sub: user.email.clone(),
            iss: self.issuer.clone(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            name: user.name.clone(),
            jti: format!("{:032x}", rand::random::<u128>()),
        };

        tracing::debug!("Issuing token for user {}", user.id);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| Error::TokenIssueError(error.to_string()))
    }

    /// Get the bearer token from the `Authorization` header.
    ///
    /// Returns `None` if the header is missing, is not a bearer credential, or
    /// the token is empty.
    pub fn resolve(headers: &HeaderMap) -> Option<String> {
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|Authorization(bearer)| bearer.token().trim().to_owned())
            .filter(|token| !token.is_empty())
    }

    /// Verify the signature and issuer of `token` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidToken] if the token is malformed, was signed with
    /// another key or algorithm, or names another issuer.
    pub fn parse(&self, token: &str) -> Result<Claims, Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|error| {
                tracing::debug!("Token failed validation: {error}");
                Error::InvalidToken
            })
    }

    /// Verify `token` and look up the user it was issued to.
    ///
    /// The user is read from the database on every call.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidToken] if the token does not verify, or
    /// [Error::IdentityNotFound] if the subject is no longer a registered user.
    pub fn parse_and_authenticate(
        &self,
        token: &str,
        connection: &Connection,
    ) -> Result<AuthenticatedUser, Error> {
        let claims = self.parse(token)?;

        match get_user_by_email(&claims.sub, connection) {
            Ok(user) => Ok(AuthenticatedUser::from(user)),
            Err(Error::NotFound) => {
                tracing::warn!("Token subject {} is not a registered user", claims.sub);
                Err(Error::IdentityNotFound)
            }
            Err(error) => Err(error),
        }
    }
}
