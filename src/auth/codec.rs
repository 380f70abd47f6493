/// Token signing and parsing
///
/// HS256 over a secret shared by the whole service. `parse` only returns
/// claims after the signature has been verified; expiry and type policy
/// are left to the token service so their check order stays explicit.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, ParsedToken, TokenType};
use crate::error::TokenError;

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is a policy decision, checked after the type.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token of the given type for `subject`.
    ///
    /// # Errors
    /// `TokenError::Encoding` if the claims cannot be serialized or signed.
    pub fn sign(
        &self,
        subject: Uuid,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.sign_claims(&Claims::new(subject, token_type, issued_at, expires_at))
    }

    /// Sign arbitrary claims. `sign` is the entry point for well-formed
    /// tokens; this exists for callers that already hold a `Claims` value.
    pub fn sign_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify the signature and extract the claims.
    ///
    /// # Errors
    /// - `TokenError::SignatureInvalid` if the integrity check fails
    /// - `TokenError::Malformed` if the token cannot be decoded or a
    ///   required claim is missing
    pub fn parse(&self, token: &str) -> Result<ParsedToken, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [_header, _payload, signature] = segments[..] else {
            return Err(TokenError::Malformed);
        };

        // A signature outside the base64url alphabet can never verify.
        if !signature
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(TokenError::SignatureInvalid);
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| ParsedToken::from(data.claims))
            .map_err(|e| {
                let kind = classify(e.kind());
                tracing::debug!(error = %e, classified = %kind, "Token parsing failed");
                kind
            })
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn signed(codec: &TokenCodec, token_type: TokenType) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let token = codec
            .sign(user_id, token_type, now, now + Duration::hours(1))
            .expect("Failed to sign token");
        (user_id, token)
    }

    #[test]
    fn test_sign_and_parse() {
        let codec = TokenCodec::new(SECRET);
        let (user_id, token) = signed(&codec, TokenType::Access);

        let parsed = codec.parse(&token).expect("Failed to parse token");
        assert_eq!(parsed.subject, user_id.to_string());
        assert_eq!(parsed.token_type(), Some(TokenType::Access));
        assert_eq!(parsed.expires_at - parsed.issued_at, 3600);
    }

    #[test]
    fn test_expired_token_still_parses() {
        let codec = TokenCodec::new(SECRET);
        let now = Utc::now();
        let token = codec
            .sign(Uuid::new_v4(), TokenType::Refresh, now - Duration::days(2), now - Duration::days(1))
            .unwrap();

        let parsed = codec.parse(&token).expect("expiry is not a codec concern");
        assert!(parsed.is_expired_at(now));
    }

    #[test]
    fn test_wrong_secret() {
        let (_, token) = signed(&TokenCodec::new(SECRET), TokenType::Access);
        let other = TokenCodec::new(b"another-secret-key-also-32-characters");

        assert_eq!(other.parse(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_swapped_payload() {
        let codec = TokenCodec::new(SECRET);
        let (_, victim) = signed(&codec, TokenType::Access);
        let (_, forged) = signed(&codec, TokenType::Refresh);

        let victim_parts: Vec<&str> = victim.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let spliced = format!("{}.{}.{}", victim_parts[0], forged_parts[1], victim_parts[2]);

        assert_eq!(codec.parse(&spliced), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_every_single_bit_mutation_of_signature() {
        let codec = TokenCodec::new(SECRET);
        let (_, token) = signed(&codec, TokenType::Access);
        let signature_start = token.rfind('.').unwrap() + 1;

        for index in signature_start..token.len() {
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[index] ^= 1 << bit;
                // A byte turned into '.' splits the token into four segments.
                let expected = if bytes[index] == b'.' {
                    TokenError::Malformed
                } else {
                    TokenError::SignatureInvalid
                };
                let mutated = String::from_utf8(bytes).expect("ASCII stays ASCII");

                assert_eq!(
                    codec.parse(&mutated),
                    Err(expected),
                    "mutation at byte {} bit {} was not rejected",
                    index,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_missing_subject_is_malformed() {
        #[derive(serde::Serialize)]
        struct NoSubject {
            iss: String,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now().timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoSubject { iss: "access".to_string(), iat: now, exp: now + 60 },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(TokenCodec::new(SECRET).parse(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new(SECRET);

        assert_eq!(codec.parse(""), Err(TokenError::Malformed));
        assert_eq!(codec.parse("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.parse("invalid.token.here"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_extra_segment_is_malformed() {
        let codec = TokenCodec::new(SECRET);
        let (_, token) = signed(&codec, TokenType::Access);

        assert_eq!(codec.parse(&format!("{}.x", token)), Err(TokenError::Malformed));
        assert_eq!(codec.parse(&format!("{}.", token)), Err(TokenError::Malformed));
        assert_eq!(codec.parse("a.b.c.x"), Err(TokenError::Malformed));
    }
}
