//! TLS connector construction.

use std::sync::Arc;

use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// Peer certificate verification mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeerVerifyMode {
    /// Verify the server certificate against the bundled webpki roots.
    #[default]
    VerifyPeer,
    /// Accept any certificate the server presents.
    VerifyNone,
}

/// TLS settings for implicit-TLS and STARTTLS connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsOptions {
    /// Peer verification mode.
    pub verify_mode: PeerVerifyMode,
    /// Proceed even when certificate verification would fail.
    pub ignore_tls_errors: bool,
}

impl TlsOptions {
    const fn wants_verification(self) -> bool {
        matches!(self.verify_mode, PeerVerifyMode::VerifyPeer) && !self.ignore_tls_errors
    }

    /// Builds a connector honouring the configured verification policy.
    #[must_use]
    pub fn build_connector(self) -> TlsConnector {
        let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());

        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(tokio_rustls::rustls::DEFAULT_VERSIONS)
            .expect("default provider and protocol versions are consistent");

        let config = if self.wants_verification() {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            config.with_root_certificates(roots)
        } else {
            config
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification::new(
                    provider,
                )))
        };

        TlsConnector::from(Arc::new(config.with_no_client_auth()))
    }
}

mod danger {
    use std::sync::Arc;

    use tokio_rustls::rustls::DigitallySignedStruct;
    use tokio_rustls::rustls::client::danger::{
        HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
    };
    use tokio_rustls::rustls::crypto::{
        CryptoProvider, verify_tls12_signature, verify_tls13_signature,
    };
    use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};

    /// Verifier that accepts every certificate but still checks handshake
    /// signatures, for the ignore-TLS-errors override.
    #[derive(Debug)]
    pub struct NoCertificateVerification(Arc<CryptoProvider>);

    impl NoCertificateVerification {
        pub fn new(provider: Arc<CryptoProvider>) -> Self {
            Self(provider)
        }
    }

    impl ServerCertVerifier for NoCertificateVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
            verify_tls12_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
            verify_tls13_signature(
                message,
                cert,
                dss,
                &self.0.signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<tokio_rustls::rustls::SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_policy() {
        assert!(TlsOptions::default().wants_verification());
        assert!(
            !TlsOptions {
                verify_mode: PeerVerifyMode::VerifyNone,
                ignore_tls_errors: false,
            }
            .wants_verification()
        );
        assert!(
            !TlsOptions {
                verify_mode: PeerVerifyMode::VerifyPeer,
                ignore_tls_errors: true,
            }
            .wants_verification()
        );
    }

    #[test]
    fn builds_connectors_for_both_policies() {
        let _verified = TlsOptions::default().build_connector();
        let _lenient = TlsOptions {
            verify_mode: PeerVerifyMode::VerifyNone,
            ignore_tls_errors: true,
        }
        .build_connector();
    }
}
