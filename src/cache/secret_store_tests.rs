// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `secret_store.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_fixtures::{secret_with, self_signed_pem, tls_secret};

    // ========================================================================
    // Conversion
    // ========================================================================

    #[test]
    fn test_tls_secret_converts_to_protected_pfx() {
        let pfx = secret_to_pfx(&tls_secret("ns", "tls")).unwrap();
        let parsed = Pkcs12::from_der(&pfx).unwrap().parse2(PFX_PASSPHRASE).unwrap();
        assert!(parsed.pkey.is_some());
        let cert = parsed.cert.expect("leaf certificate");
        let cn = cert
            .subject_name()
            .entries()
            .next()
            .and_then(|e| e.data().as_utf8().ok())
            .map(|s| s.to_string());
        assert_eq!(cn.as_deref(), Some("hello.com"));
    }

    #[test]
    fn test_chain_is_packaged_as_ca() {
        let (leaf, key) = self_signed_pem("leaf.com");
        let (intermediate, _) = self_signed_pem("intermediate");
        let mut chain = leaf;
        chain.extend_from_slice(&intermediate);
        let secret = secret_with("ns", "chain", Some(TLS_SECRET_TYPE), Some(chain), Some(key));

        let pfx = secret_to_pfx(&secret).unwrap();
        let parsed = Pkcs12::from_der(&pfx).unwrap().parse2(PFX_PASSPHRASE).unwrap();
        assert_eq!(parsed.ca.map(|ca| ca.len()), Some(1));
    }

    #[test]
    fn test_wrong_type_is_unknown_secret_type() {
        let (cert, key) = self_signed_pem("hello.com");
        let secret = secret_with("ns", "opaque", Some("Opaque"), Some(cert), Some(key));
        let err = secret_to_pfx(&secret).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSecretType);
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let (cert, key) = self_signed_pem("hello.com");

        let no_key = secret_with("ns", "a", Some(TLS_SECRET_TYPE), Some(cert), None);
        assert_eq!(secret_to_pfx(&no_key).unwrap_err().code, ErrorCode::MalformedSecret);

        let no_cert = secret_with("ns", "b", Some(TLS_SECRET_TYPE), None, Some(key));
        assert_eq!(secret_to_pfx(&no_cert).unwrap_err().code, ErrorCode::MalformedSecret);
    }

    #[test]
    fn test_garbage_pem_is_malformed() {
        let secret = secret_with(
            "ns",
            "junk",
            Some(TLS_SECRET_TYPE),
            Some(b"not a certificate".to_vec()),
            Some(b"not a key".to_vec()),
        );
        let err = secret_to_pfx(&secret).unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedSecret);
        assert!(err.message.contains("ns/junk"));
    }

    // ========================================================================
    // Store
    // ========================================================================

    #[test]
    fn test_store_keeps_converted_certificates() {
        let store = SecretStore::new();
        store.convert_secret("ns/tls", &tls_secret("ns", "tls")).unwrap();
        assert!(store.contains("ns/tls"));
        assert!(store.get_certificate("ns/tls").is_some_and(|pfx| !pfx.is_empty()));
        assert_eq!(store.snapshot().len(), 1);

        assert!(store.delete("ns/tls"));
        assert!(!store.delete("ns/tls"));
        assert!(store.get_certificate("ns/tls").is_none());
    }

    #[test]
    fn test_failed_conversion_drops_stale_certificate() {
        let store = SecretStore::new();
        store.convert_secret("ns/tls", &tls_secret("ns", "tls")).unwrap();

        let broken = secret_with("ns", "tls", Some(TLS_SECRET_TYPE), None, None);
        assert!(store.convert_secret("ns/tls", &broken).is_err());
        assert!(!store.contains("ns/tls"));
    }
}
