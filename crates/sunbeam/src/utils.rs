use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::{Pem, parse_x509_pem};

static CERTIFICATE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----BEGIN CERTIFICATE-----.*?-----END CERTIFICATE-----")
        .expect("certificate pattern is valid")
});

/// Map of a JSON object literal; anything else is empty.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn decode(value: &str) -> anyhow::Result<String> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|e| anyhow::anyhow!("not valid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|_| anyhow::anyhow!("not valid text"))
}

/// PEM certificate blocks found in `pem`
pub fn certificate_blocks(pem: &str) -> Vec<&str> {
    CERTIFICATE_BLOCK.find_iter(pem).map(|m| m.as_str()).collect()
}

fn decode_pem_blocks(pem: &str) -> anyhow::Result<Vec<Pem>> {
    certificate_blocks(pem)
        .into_iter()
        .enumerate()
        .map(|(i, block)| {
            parse_x509_pem(block.as_bytes())
                .map(|(_, pem)| pem)
                .map_err(|e| anyhow::anyhow!("certificate {} is not valid PEM: {}", i + 1, e))
        })
        .collect()
}

fn parse_certificates(blocks: &[Pem]) -> anyhow::Result<Vec<X509Certificate<'_>>> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, pem)| {
            pem.parse_x509().map_err(|e| {
                anyhow::anyhow!("certificate {} is not a valid X.509 certificate: {}", i + 1, e)
            })
        })
        .collect()
}

/// A CA must be a base64 encoded PEM bundle whose certificates all parse.
pub fn validate_ca_certificate(value: &str) -> anyhow::Result<()> {
    let pem = decode(value).map_err(|e| anyhow::anyhow!("Invalid CA certificate: {}", e))?;
    let blocks =
        decode_pem_blocks(&pem).map_err(|e| anyhow::anyhow!("Invalid CA certificate: {}", e))?;
    if blocks.is_empty() {
        anyhow::bail!("Invalid CA certificate: no PEM certificate found");
    }
    parse_certificates(&blocks).map_err(|e| anyhow::anyhow!("Invalid CA certificate: {}", e))?;
    Ok(())
}

/// A CA chain lists issuers first: every certificate must be issued and
/// signed by the one before it. A chain without any certificate is accepted.
pub fn validate_ca_chain(value: &str) -> anyhow::Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }
    let pem = decode(value).map_err(|e| anyhow::anyhow!("Invalid CA chain: {}", e))?;
    let blocks = decode_pem_blocks(&pem).map_err(|e| anyhow::anyhow!("Invalid CA chain: {}", e))?;
    if blocks.is_empty() {
        tracing::debug!("Empty CA chain provided");
        return Ok(());
    }
    if blocks.len() < 2 {
        anyhow::bail!("Invalid CA chain: It must contain at least 2 certificates.");
    }

    let certificates =
        parse_certificates(&blocks).map_err(|e| anyhow::anyhow!("Invalid CA chain: {}", e))?;
    for (i, pair) in certificates.windows(2).enumerate() {
        let (issuer, cert) = (&pair[0], &pair[1]);
        if cert.issuer().as_raw() != issuer.subject().as_raw() {
            anyhow::bail!(
                "Invalid CA chain: certificate {} ({}) is not issued by certificate {} ({})",
                i + 2,
                cert.subject(),
                i + 1,
                issuer.subject()
            );
        }
        cert.verify_signature(Some(issuer.public_key())).map_err(|e| {
            anyhow::anyhow!(
                "Invalid CA chain: signature of certificate {} does not match certificate {}: {}",
                i + 2,
                i + 1,
                e
            )
        })?;
    }
    Ok(())
}
