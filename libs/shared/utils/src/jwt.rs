use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;
use shared_models::auth::{SessionClaims, User};

type HmacSha256 = Hmac<Sha256>;

/// Signs a session token for `user`, valid for `ttl_hours` from `issued_at`.
pub fn issue_session_token(
    user: &User,
    secret: &str,
    issued_at: DateTime<Utc>,
    ttl_hours: i64,
) -> Result<(String, DateTime<Utc>), String> {
    if secret.is_empty() {
        return Err("Session secret is not set".to_string());
    }

    let expires_at = Duration::try_hours(ttl_hours)
        .filter(|ttl| *ttl > Duration::zero())
        .and_then(|ttl| issued_at.checked_add_signed(ttl))
        .ok_or_else(|| format!("Invalid session lifetime: {} hours", ttl_hours))?;
    let claims = SessionClaims {
        sub: user.id.clone(),
        name: user.name.clone(),
        phone: user.phone.clone(),
        role: user.role,
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };

    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims_json = serde_json::to_string(&claims)
        .map_err(|e| format!("Failed to encode claims: {}", e))?;

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{}.{}", signing_input, signature_b64), expires_at))
}

pub fn validate_token(token: &str, secret: &str) -> Result<User, String> {
    if secret.is_empty() {
        return Err("Session secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: SessionClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    let now = Utc::now().timestamp();
    if claims.exp < now {
        debug!("Token expired at {} (now: {})", claims.exp, now);
        return Err("Token expired".to_string());
    }

    let user = User {
        id: claims.sub,
        name: claims.name,
        phone: claims.phone,
        role: claims.role,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::Role;

    fn patient() -> User {
        User {
            id: "p-1".to_string(),
            name: "John Doe".to_string(),
            phone: "5550001".to_string(),
            role: Role::Patient,
        }
    }

    #[test]
    fn issued_token_validates_back_to_same_user() {
        let (token, expires_at) = issue_session_token(&patient(), "secret", Utc::now(), 2).unwrap();
        assert!(expires_at > Utc::now());

        let user = validate_token(&token, "secret").unwrap();
        assert_eq!(user, patient());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = issue_session_token(&patient(), "secret", Utc::now(), 2).unwrap();
        assert_eq!(validate_token(&token, "other").unwrap_err(), "Invalid token signature");
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let (token, _) = issue_session_token(&patient(), "secret", Utc::now(), 2).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = json!({
            "sub": "doc1", "name": "x", "phone": "x", "role": "DOCTOR",
            "iat": Utc::now().timestamp(), "exp": Utc::now().timestamp() + 3600
        });
        parts[1] = URL_SAFE_NO_PAD.encode(forged.to_string());

        assert!(validate_token(&parts.join("."), "secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(5);
        let (token, _) = issue_session_token(&patient(), "secret", issued, 1).unwrap();
        assert_eq!(validate_token(&token, "secret").unwrap_err(), "Token expired");
    }

    #[test]
    fn out_of_range_lifetime_is_an_error() {
        assert!(issue_session_token(&patient(), "secret", Utc::now(), i64::MAX).is_err());
        assert!(issue_session_token(&patient(), "secret", Utc::now(), 0).is_err());
    }

    #[test]
    fn empty_secret_refuses_to_issue() {
        assert!(issue_session_token(&patient(), "", Utc::now(), 1).is_err());
        assert!(validate_token("a.b.c", "").is_err());
    }
}
