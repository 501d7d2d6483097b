use bitcoin::base58;
use bitcoin::hashes::{hash160, Hash};
use bitcoin::{PubkeyHash, Script, ScriptBuf, ScriptHash};

use crate::error::AppError;
use crate::network::NetworkParams;
use crate::types::ScriptType;

const HASH160_LEN: usize = 20;

/// SHA-256 → RIPEMD-160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

pub fn to_address(pubkey_hash: &[u8; 20], network: &NetworkParams) -> String {
    let mut payload = Vec::with_capacity(network.pubkey_hash_prefix.len() + HASH160_LEN);
    payload.extend_from_slice(network.pubkey_hash_prefix);
    payload.extend_from_slice(pubkey_hash);
    base58::encode_check(&payload)
}

pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(*pubkey_hash))
}

/// 受信者アドレスをデコードし、選択中のネットワークのプレフィックスと照合する
pub fn script_pubkey_for_address(
    address: &str,
    network: &NetworkParams,
) -> Result<(ScriptBuf, ScriptType), AppError> {
    let payload = base58::decode_check(address).map_err(|e| AppError::invalid_address(address, e))?;

    let (script_type, hash) = if let Some(hash) = payload.strip_prefix(network.pubkey_hash_prefix) {
        (ScriptType::P2PKH, hash)
    } else if let Some(hash) = payload.strip_prefix(network.script_hash_prefix) {
        (ScriptType::P2SH, hash)
    } else {
        return Err(AppError::AddressNetworkMismatch {
            address: address.to_string(),
            network: network.name.to_string(),
        });
    };

    let hash: [u8; HASH160_LEN] = hash.try_into().map_err(|_| AppError::InvalidAddress {
        address: address.to_string(),
        reason: format!("ハッシュ長が不正です: {} バイト", hash.len()),
    })?;

    let script = match script_type {
        ScriptType::P2PKH => p2pkh_script(&hash),
        ScriptType::P2SH => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(hash)),
    };
    Ok((script, script_type))
}

/// P2PKH / P2SH スクリプトをネットワークのアドレス表記に戻す
pub fn script_to_address(script: &Script, network: &NetworkParams) -> Option<String> {
    let bytes = script.as_bytes();
    let (prefix, hash) = if script.is_p2pkh() {
        (network.pubkey_hash_prefix, &bytes[3..23])
    } else if script.is_p2sh() {
        (network.script_hash_prefix, &bytes[2..22])
    } else {
        return None;
    };
    let mut payload = Vec::with_capacity(prefix.len() + HASH160_LEN);
    payload.extend_from_slice(prefix);
    payload.extend_from_slice(hash);
    Some(base58::encode_check(&payload))
}
