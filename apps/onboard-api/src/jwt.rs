//! HS256 access token validation
//!
//! Tokens are issued by the identity provider; this service only verifies
//! them with the shared secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the access token for browser clients
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration (Unix timestamp)
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
}

fn sign(signing_input: &str, secret: &str) -> Result<HmacSha256, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| format!("HMAC error: {}", e))?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

#[cfg(test)]
fn encode_jwt<T: Serialize>(claims: &T, secret: &str) -> Result<String, String> {
    let header = JwtHeader {
        alg: "HS256".to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_json = serde_json::to_string(&header).map_err(|e| e.to_string())?;
    let payload_json = serde_json::to_string(claims).map_err(|e| e.to_string())?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json.as_bytes()),
        URL_SAFE_NO_PAD.encode(payload_json.as_bytes())
    );
    let signature = sign(&signing_input, secret)?.finalize().into_bytes();

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

fn decode_jwt<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, String> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = parts[..] else {
        return Err("Invalid token format".to_string());
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| "Invalid signature encoding")?;
    sign(&format!("{}.{}", header_b64, payload_b64), secret)?
        .verify_slice(&signature)
        .map_err(|_| "Invalid signature")?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| "Invalid header encoding")?;
    let header: JwtHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| "Invalid header format")?;
    if header.alg != "HS256" {
        return Err("Unsupported algorithm".to_string());
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| "Invalid payload encoding")?;
    serde_json::from_slice(&payload_bytes).map_err(|_| "Invalid payload format".to_string())
}

/// Verify signature and expiry, returning the claims
pub fn validate_access_token(token: &str, secret: &str) -> Result<AccessTokenClaims, String> {
    let claims: AccessTokenClaims =
        decode_jwt(token, secret).map_err(|e| format!("Invalid access token: {}", e))?;

    let now = chrono::Utc::now().timestamp() as u64;
    if claims.exp < now {
        return Err("Access token expired".to_string());
    }
    if claims.sub.trim().is_empty() {
        return Err("Access token has no subject".to_string());
    }

    Ok(claims)
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<String> {
    auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Token from a `Cookie` header value
pub fn extract_cookie_token(cookie_header: Option<&str>) -> Option<String> {
    cookie_header?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Mint a token the way the identity provider would
#[cfg(test)]
pub fn issue_token(user_id: &str, secret: &str, ttl_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": user_id,
        "email": format!("{}@example.com", user_id),
        "iat": now,
        "exp": now + ttl_secs,
    });
    encode_jwt(&claims, secret).unwrap()
}
