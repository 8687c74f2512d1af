use josekit::{jws::RS256, jwt};

use crate::oidc::jwks::Jwk;

use super::discovery::DiscoveryClient;
use super::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
    /// Expected nonce; compared bit-for-bit with the token's claim.
    pub nonce: Option<&'a str>,
    pub now: u64,
    pub clock_skew_secs: u64,
}

/// Claims out of a signature-checked, validated ID token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerifiedIdToken {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<u64>,
}

/// Verify an ID token against the provider's published JWKS and the values
/// bound to the pending request. Any failure invalidates the whole token.
pub async fn verify_id_token(
    id_token: &str,
    discovery: &DiscoveryClient,
    opts: VerifyOptions<'_>,
) -> Result<VerifiedIdToken> {
    let kid = extract_kid(id_token)?
        .ok_or_else(|| Error::Jwt("token header carries no kid".to_string()))?;

    let jwk = discovery.key_for(&kid).await?;
    let payload = check_signature(id_token, &jwk)?;

    validate_claims(payload, opts)
}

/// Pull the kid out of the JOSE header without trusting anything else in it.
fn extract_kid(jwt: &str) -> Result<Option<String>> {
    let mut parts = jwt.split('.');
    let header = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(_), Some(_), None) => header,
        _ => return Err(Error::Jwt("not a compact JWS".to_string())),
    };

    let header_bytes = base64::decode_config(header, base64::URL_SAFE_NO_PAD)
        .map_err(|e| Error::Jwt(format!("bad header encoding: {}", e)))?;
    let header_value: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::Jwt(format!("bad header json: {}", e)))?;

    Ok(header_value
        .get("kid")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string()))
}

fn check_signature(token: &str, jwk: &Jwk) -> Result<jwt::JwtPayload> {
    if jwk.alg != "RS256" {
        return Err(Error::Jwt(format!("unsupported algorithm: {}", jwk.alg)));
    }

    let map = match serde_json::to_value(jwk)? {
        serde_json::Value::Object(map) => map,
        _ => return Err(Error::Jwt("malformed JWK".to_string())),
    };
    let key = josekit::jwk::Jwk::from_map(map)
        .map_err(|e| Error::Jwt(format!("invalid JWK: {}", e)))?;

    let verifier = RS256
        .verifier_from_jwk(&key)
        .map_err(|e| Error::Jwt(format!("bad verification key: {}", e)))?;
    let (payload, _header) = jwt::decode_with_verifier(token, &verifier)
        .map_err(|e| Error::Jwt(format!("signature verification failed: {}", e)))?;

    Ok(payload)
}

fn validate_claims(payload: jwt::JwtPayload, opts: VerifyOptions<'_>) -> Result<VerifiedIdToken> {
    let claims = payload.claims_set();

    let text = |name: &str| {
        claims
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };
    let number = |name: &str| claims.get(name).and_then(|v| v.as_u64());

    let iss = text("iss").ok_or_else(|| Error::Jwt("missing iss claim".to_string()))?;
    let sub = text("sub").ok_or_else(|| Error::Jwt("missing sub claim".to_string()))?;
    let exp = number("exp").ok_or_else(|| Error::Jwt("missing exp claim".to_string()))?;
    let iat = number("iat").ok_or_else(|| Error::Jwt("missing iat claim".to_string()))?;

    let audiences: Vec<String> = match claims.get("aud") {
        Some(serde_json::Value::String(aud)) => vec![aud.clone()],
        Some(serde_json::Value::Array(list)) => list
            .iter()
            .filter_map(|v| v.as_str())
            .map(ToString::to_string)
            .collect(),
        _ => return Err(Error::Jwt("missing aud claim".to_string())),
    };

    if iss != opts.issuer {
        return Err(Error::Validation("issuer mismatch"));
    }
    if !audiences.iter().any(|aud| aud == opts.audience) {
        return Err(Error::Validation("audience mismatch"));
    }
    if exp + opts.clock_skew_secs <= opts.now {
        return Err(Error::Validation("token expired"));
    }
    if iat > opts.now + opts.clock_skew_secs {
        return Err(Error::Validation("token issued in the future"));
    }

    let nonce = text("nonce");
    if let Some(expected) = opts.nonce {
        match nonce.as_deref() {
            Some(actual) if actual == expected => {}
            _ => return Err(Error::Validation("nonce mismatch")),
        }
    }

    Ok(VerifiedIdToken {
        iss,
        sub,
        aud: opts.audience.to_string(),
        exp,
        iat,
        nonce,
        auth_time: number("auth_time"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_kid_from_header() {
        // {"alg":"RS256","kid":"test-key"}
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6InRlc3Qta2V5In0.e30.sig";
        assert_eq!(extract_kid(token).unwrap(), Some("test-key".to_string()));
    }

    #[test]
    fn rejects_non_jws_input() {
        assert!(extract_kid("only.two").is_err());
        assert!(extract_kid("one.two.three.four").is_err());
    }
}
