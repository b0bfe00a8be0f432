//! The identity attached to authenticated requests and the extractors for reading it.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    Error,
    user::{Role, User, UserID, UserProfile},
};

/// The user a request was authenticated as.
///
/// Built fresh from the user table on every request, so a deleted user or
/// an updated role takes effect on the next request.
///
/// Route handlers that take this as an argument reject unauthenticated
/// requests with [Error::Unauthenticated].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    /// The user's ID.
    pub id: UserID,
    /// The user's email, also the token subject.
    pub email: String,
    /// The user's display name.
    pub name: String,
    /// The user's role.
    pub role: Role,
}

impl AuthenticatedUser {
    /// Whether the user has been granted `authority`, e.g. "ROLE_ADMIN".
    pub fn has_authority(&self, authority: &str) -> bool {
        self.role.authorities().contains(&authority)
    }

    /// The public view of the user.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(Error::Unauthenticated)
    }
}

/// The bearer token of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionToken>()
            .cloned()
            .ok_or(Error::Unauthenticated)
    }
}
