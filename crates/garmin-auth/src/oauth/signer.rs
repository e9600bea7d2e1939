//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::tokens::Consumer;

type HmacSha1 = Hmac<Sha1>;

/// Signs requests on behalf of a consumer and, optionally, a token.
#[derive(Debug, Clone, Copy)]
pub struct OAuth1Signer<'a> {
    consumer: &'a Consumer,
    token: Option<(&'a str, &'a str)>,
}

impl<'a> OAuth1Signer<'a> {
    /// Signer for requests made with the consumer credentials only.
    pub fn new(consumer: &'a Consumer) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    /// Sign with a token key and secret as well.
    pub fn with_token(mut self, key: &'a str, secret: &'a str) -> Self {
        self.token = Some((key, secret));
        self
    }

    /// `Authorization` header value for a request.
    ///
    /// `url` must not carry a query string; query and form parameters go
    /// in `params`.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> String {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    /// Same as [`Self::authorization_header`] with a fixed nonce and timestamp.
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth = self.oauth_params(nonce, timestamp);
        let signature = self.signature(method, url, params, &oauth);
        oauth.push(("oauth_signature", signature));
        oauth.sort_by(|a, b| a.0.cmp(b.0));

        let fields: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    /// Base64 HMAC-SHA1 signature over the signature base string.
    pub fn signature(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        oauth: &[(&'static str, String)],
    ) -> String {
        let base = signature_base_string(method, url, params, oauth);
        let key = format!(
            "{}&{}",
            encode(&self.consumer.consumer_secret),
            encode(self.token.map(|(_, secret)| secret).unwrap_or(""))
        );

        let Ok(mut mac) = HmacSha1::new_from_slice(key.as_bytes()) else {
            unreachable!("HMAC accepts keys of any length")
        };
        mac.update(base.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn oauth_params(&self, nonce: &str, timestamp: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("oauth_consumer_key", self.consumer.consumer_key.clone()),
            ("oauth_nonce", nonce.to_string()),
            ("oauth_signature_method", "HMAC-SHA1".to_string()),
            ("oauth_timestamp", timestamp.to_string()),
            ("oauth_version", "1.0".to_string()),
        ];
        if let Some((key, _)) = self.token {
            params.push(("oauth_token", key.to_string()));
        }
        params
    }
}

/// `METHOD&url&params`, each part percent-encoded.
pub fn signature_base_string(
    method: &str,
    url: &str,
    params: &[(String, String)],
    oauth: &[(&'static str, String)],
) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(oauth.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort();

    let normalized: Vec<String> = pairs.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&normalized.join("&"))
    )
}

/// RFC 3986 percent-encoding.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
