//! An extractor for the IP address of the client that sent a request.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use crate::{AuthConfig, Error};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The IP address of the client.
///
/// Taken from the first entry of `X-Forwarded-For` when
/// [AuthConfig::trust_forwarded_for] is set and the header holds an address,
/// otherwise from the peer address of the connection.
///
/// The peer address needs the router to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`, or a
/// `MockConnectInfo` layer in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

impl<S> FromRequestParts<S> for ClientIp
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);

        if config.trust_forwarded_for {
            if let Some(ip) = forwarded_for(&parts.headers) {
                return Ok(ClientIp(ip));
            }
            tracing::debug!("No usable X-Forwarded-For header, using the peer address");
        }

        ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map(|ConnectInfo(address)| ClientIp(address.ip()))
            .map_err(|rejection| {
                tracing::error!("Could not get the peer address: {rejection}");
                Error::MissingClientAddress
            })
    }
}
