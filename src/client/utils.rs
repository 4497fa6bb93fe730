use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use url::Url;

use crate::client::config::ClientConfig;
use crate::client::consts::API_KEY_HEADER;
use crate::error::{Error, Result};

pub(crate) fn endpoint_url(root: &str, path: &str, query: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", root, path))
        .map_err(|e| Error::InvalidArgument(format!("invalid endpoint {}{}: {}", root, path, e)))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url)
}

/// Handshake request for a WebSocket endpoint, authenticated by header.
pub(crate) fn build_request(config: &ClientConfig, path: &str, query: &[(&str, String)]) -> Result<Request> {
    let url = endpoint_url(config.websocket_url(), path, query)?;
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    let key = config
        .api_key()
        .expose_secret()
        .parse()
        .map_err(|_| Error::InvalidArgument("API key is not a valid header value".to_string()))?;
    request.headers_mut().insert(API_KEY_HEADER, key);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_key_and_query() {
        let config = ClientConfig::builder()
            .with_api_key("secret")
            .with_websocket_url("ws://127.0.0.1:9000")
            .build();
        let request = build_request(&config, "/v0/evi/chat", &[("config_id", "a b".to_string())]).unwrap();
        assert_eq!(request.uri().path(), "/v0/evi/chat");
        assert_eq!(request.uri().query(), Some("config_id=a+b"));
        assert_eq!(request.headers()[API_KEY_HEADER], "secret");
    }

    #[test]
    fn bad_root_is_invalid_argument() {
        assert!(matches!(
            endpoint_url("not a url", "/v0", &[]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
