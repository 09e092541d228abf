// Copyright (C) 2025 Steno Labs Inc.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! AWS Signature Version 4 signing.
//!
//! Two flavors are needed: header signing for the task runtime's JSON API
//! and query presigning for artifact upload URLs. Both derive the same
//! scoped key; only the canonical request differs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Signing material shared by both flavors.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Access key id placed in the credential scope.
    pub access_key: String,
    /// Secret used to derive the per-day signing key.
    pub secret_key: String,
    /// Region the scope is bound to.
    pub region: String,
}

/// Headers produced by request signing, ready to attach verbatim.
#[derive(Debug)]
pub struct SignedHeaders {
    /// `X-Amz-Date` value used in the signature.
    pub amz_date: String,
    /// `Authorization` header value.
    pub authorization: String,
}

impl SigningKey {
    /// Sign a JSON POST to an AWS service endpoint.
    ///
    /// Signed headers are fixed to `content-type;host;x-amz-date;x-amz-target`,
    /// which is all the runtime API calls send.
    pub fn sign_json_post(
        &self,
        service: &str,
        host: &str,
        target: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> SignedHeaders {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();

        let canonical_headers = format!(
            "content-type:application/x-amz-json-1.1\nhost:{host}\nx-amz-date:{amz_date}\nx-amz-target:{target}\n"
        );
        let signed_headers = "content-type;host;x-amz-date;x-amz-target";
        let payload_hash = sha256_hex(payload.as_bytes());

        let canonical_request =
            format!("POST\n/\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");
        let scope = format!("{datestamp}/{}/{service}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let key = self.derive_key(&datestamp, service);
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        SignedHeaders {
            amz_date,
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.access_key
            ),
        }
    }

    /// Presign an object PUT against an S3 bucket.
    ///
    /// The content type and any metadata pairs become signed headers, so the
    /// uploader must send them back exactly as given or the signature breaks.
    /// Metadata keys are lowercased and prefixed with `x-amz-meta-`.
    pub fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        metadata: &[(String, String)],
        expires_secs: u64,
        now: DateTime<Utc>,
    ) -> String {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let datestamp = now.format("%Y%m%d").to_string();
        let host = format!("{bucket}.s3.{}.amazonaws.com", self.region);
        let scope = format!("{datestamp}/{}/s3/aws4_request", self.region);

        // Canonical headers sorted by name; x-amz-meta-* sorts after host.
        let mut header_pairs: Vec<(String, String)> = vec![
            ("content-type".to_string(), content_type.to_string()),
            ("host".to_string(), host.clone()),
        ];
        for (name, value) in metadata {
            header_pairs.push((
                format!("x-amz-meta-{}", name.to_ascii_lowercase()),
                value.trim().to_string(),
            ));
        }
        header_pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let canonical_headers: String = header_pairs
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = header_pairs
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        // Query parameters in canonical (sorted) order.
        let credential = format!("{}/{scope}", self.access_key);
        let query = format!(
            "X-Amz-Algorithm={ALGORITHM}\
             &X-Amz-Credential={}\
             &X-Amz-Date={amz_date}\
             &X-Amz-Expires={expires_secs}\
             &X-Amz-SignedHeaders={}",
            uri_encode(&credential, false),
            uri_encode(&signed_headers, false),
        );

        let canonical_uri = format!("/{}", uri_encode(key, true));
        let canonical_request = format!(
            "PUT\n{canonical_uri}\n{query}\n{canonical_headers}\n{signed_headers}\nUNSIGNED-PAYLOAD"
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = self.derive_key(&datestamp, "s3");
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        format!("https://{host}{canonical_uri}?{query}&X-Amz-Signature={signature}")
    }

    fn derive_key(&self, datestamp: &str, service: &str) -> Vec<u8> {
        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), datestamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC takes keys of any length (RFC 2104), so this never fails.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// RFC 3986 percent-encoding as SigV4 requires it. Path encoding keeps `/`
/// as a segment separator; query encoding escapes it.
fn uri_encode(input: &str, is_path: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if is_path => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> SigningKey {
        SigningKey {
            access_key: "AKIDEXAMPLE".to_string(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_uri_encode_path_keeps_slashes() {
        assert_eq!(
            uri_encode("raw_recordings/user 1/a.opus", true),
            "raw_recordings/user%201/a.opus"
        );
        assert_eq!(uri_encode("a/b", false), "a%2Fb");
    }

    #[test]
    fn test_json_post_headers_shape() {
        let signed = key().sign_json_post(
            "ecs",
            "ecs.us-east-1.amazonaws.com",
            "AmazonEC2ContainerServiceV20141113.RunTask",
            "{}",
            fixed_now(),
        );
        assert_eq!(signed.amz_date, "20250601T120000Z");
        assert!(signed.authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(signed.authorization.contains("20250601/us-east-1/ecs/aws4_request"));
        assert!(
            signed
                .authorization
                .contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target")
        );
        assert!(signed.authorization.contains("Signature="));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let a = key().sign_json_post("ecs", "ecs.us-east-1.amazonaws.com", "T", "{}", fixed_now());
        let b = key().sign_json_post("ecs", "ecs.us-east-1.amazonaws.com", "T", "{}", fixed_now());
        assert_eq!(a.authorization, b.authorization);

        let c = key().sign_json_post("ecs", "ecs.us-east-1.amazonaws.com", "T", "{1}", fixed_now());
        assert_ne!(a.authorization, c.authorization);
    }

    #[test]
    fn test_presign_put_url_shape() {
        let url = key().presign_put(
            "steno-artifacts",
            "raw_recordings/user-1/bot-1/rec.opus",
            "audio/opus",
            &[("id".to_string(), "bot-1".to_string())],
            8_000,
            fixed_now(),
        );

        assert!(url.starts_with(
            "https://steno-artifacts.s3.us-east-1.amazonaws.com/raw_recordings/user-1/bot-1/rec.opus?"
        ));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=8000"));
        assert!(url.contains("X-Amz-Date=20250601T120000Z"));
        // Metadata headers are part of the signed set.
        assert!(url.contains("content-type%3Bhost%3Bx-amz-meta-id"));

        let signature = url.rsplit("X-Amz-Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|b| b.is_ascii_hexdigit()));
    }
}
