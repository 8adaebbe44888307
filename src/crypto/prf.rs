use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The TLS 1.2 PRF (RFC 5246 §5), instantiated with HMAC-SHA256 as
/// required by the supported cipher suites.
///
/// `PRF(secret, label, seed) = P_SHA256(secret, label + seed)`
pub fn prf_tls12(
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, String> {
    let mut result = Vec::with_capacity(output_len);

    let mut input = Vec::with_capacity(label.len() + seed.len());
    input.extend_from_slice(label.as_bytes());
    input.extend_from_slice(seed);

    // A(1) = HMAC_hash(secret, label + seed)
    let mut hmac = HmacSha256::new_from_slice(secret).map_err(|e| e.to_string())?;
    hmac.update(&input);
    let mut a = hmac.finalize().into_bytes();

    while result.len() < output_len {
        // P_hash output block = HMAC_hash(secret, A(i) + label + seed)
        let mut hmac = HmacSha256::new_from_slice(secret).map_err(|e| e.to_string())?;
        hmac.update(&a);
        hmac.update(&input);
        let output = hmac.finalize().into_bytes();

        let remaining = output_len - result.len();
        let to_copy = std::cmp::min(remaining, output.len());
        result.extend_from_slice(&output[..to_copy]);

        // A(i+1) = HMAC_hash(secret, A(i))
        if result.len() < output_len {
            let mut hmac = HmacSha256::new_from_slice(secret).map_err(|e| e.to_string())?;
            hmac.update(&a);
            a = hmac.finalize().into_bytes();
        }
    }

    Ok(result)
}

/// Master secret derivation (RFC 5246 §8.1):
/// `PRF(premaster, "master secret", client_random + server_random, 48)`.
pub fn calculate_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>, String> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    prf_tls12(pre_master_secret, "master secret", &seed, 48)
}

/// Key block expansion (RFC 5246 §6.3). Note the swapped random order:
/// the seed is `server_random + client_random`.
pub fn key_expansion(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    key_material_length: usize,
) -> Result<Vec<u8>, String> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    prf_tls12(master_secret, "key expansion", &seed, key_material_length)
}

/// The 12-byte `Finished` verify data (RFC 5246 §7.4.9). The label
/// depends on which side sent the message.
pub fn verify_data(
    master_secret: &[u8],
    is_client: bool,
    handshake_hash: &[u8],
) -> Result<[u8; 12], String> {
    let label = if is_client {
        "client finished"
    } else {
        "server finished"
    };

    let out = prf_tls12(master_secret, label, handshake_hash, 12)?;

    let mut verify_data = [0u8; 12];
    verify_data.copy_from_slice(&out);
    Ok(verify_data)
}
