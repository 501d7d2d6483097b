use bitcoin::base58;
use bitcoin::secp256k1::rand::RngCore;
use bitcoin::secp256k1::rand::rngs::OsRng;
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};

use crate::address;
use crate::error::AppError;
use crate::network::NetworkParams;
use crate::types::GeneratedAddress;

const SECRET_KEY_LEN: usize = 32;
const WIF_COMPRESSED_SUFFIX: u8 = 0x01;

/// secp256k1 の鍵ペア。生成後は変更しない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret: SecretKey,
    compressed: bool,
}

impl KeyPair {
    pub fn new(secret: SecretKey, compressed: bool) -> Self {
        KeyPair { secret, compressed }
    }

    /// OSのCSPRNGから秘密鍵を生成する。範囲外のスカラーは引き直す
    pub fn generate(compressed: bool) -> Result<Self, AppError> {
        let mut rng = OsRng;
        let mut bytes = [0u8; SECRET_KEY_LEN];
        loop {
            rng.try_fill_bytes(&mut bytes)
                .map_err(|e| AppError::KeyGeneration(e.to_string()))?;
            match SecretKey::from_slice(&bytes) {
                Ok(secret) => return Ok(KeyPair::new(secret, compressed)),
                Err(_) => log::debug!("生成したスカラーが曲線位数の範囲外のため再試行します。"),
            }
        }
    }

    pub fn from_wif(wif: &str, network: &NetworkParams) -> Result<Self, AppError> {
        let payload = base58::decode_check(wif)
            .map_err(|e| AppError::InvalidWif(format!("base58checkのデコード失敗: {}", e)))?;

        let (version, body) = payload
            .split_first()
            .ok_or_else(|| AppError::InvalidWif("空のペイロード".to_string()))?;
        if *version != network.wif_version {
            return Err(AppError::InvalidWif(format!(
                "バージョンバイト不一致: 期待値 0x{:02x}, 実際 0x{:02x} ({})",
                network.wif_version, version, network.name
            )));
        }

        let compressed = match body.len() {
            SECRET_KEY_LEN => false,
            len if len == SECRET_KEY_LEN + 1 && body[SECRET_KEY_LEN] == WIF_COMPRESSED_SUFFIX => true,
            len => {
                return Err(AppError::InvalidWif(format!("不正なペイロード長: {} バイト", len + 1)));
            }
        };

        let secret = SecretKey::from_slice(&body[..SECRET_KEY_LEN])
            .map_err(|e| AppError::InvalidWif(format!("秘密鍵が範囲外: {}", e)))?;
        Ok(KeyPair::new(secret, compressed))
    }

    pub fn to_wif(&self, network: &NetworkParams) -> String {
        let mut payload = Vec::with_capacity(2 + SECRET_KEY_LEN);
        payload.push(network.wif_version);
        payload.extend_from_slice(&self.secret.secret_bytes());
        if self.compressed {
            payload.push(WIF_COMPRESSED_SUFFIX);
        }
        base58::encode_check(&payload)
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn public_key(&self, secp: &Secp256k1<All>) -> PublicKey {
        PublicKey::from_secret_key(secp, &self.secret)
    }

    /// 圧縮なら33バイト、非圧縮なら65バイト
    pub fn public_key_bytes(&self, secp: &Secp256k1<All>) -> Vec<u8> {
        let public_key = self.public_key(secp);
        if self.compressed {
            public_key.serialize().to_vec()
        } else {
            public_key.serialize_uncompressed().to_vec()
        }
    }

    pub fn pubkey_hash(&self, secp: &Secp256k1<All>) -> [u8; 20] {
        address::hash160(&self.public_key_bytes(secp))
    }

    pub fn address(&self, secp: &Secp256k1<All>, network: &NetworkParams) -> String {
        address::to_address(&self.pubkey_hash(secp), network)
    }
}

/// 新しい鍵を生成し、アドレスと WIF をまとめて返す
pub fn generate_address(
    network: &NetworkParams,
    compressed: bool,
    secp: &Secp256k1<All>,
) -> Result<GeneratedAddress, AppError> {
    let key = KeyPair::generate(compressed)?;
    Ok(GeneratedAddress {
        network: network.name.to_string(),
        address: key.address(secp, network),
        wif: key.to_wif(network),
        public_key: hex::encode(key.public_key_bytes(secp)),
        compressed,
    })
}
