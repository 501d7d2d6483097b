use bitcoin::script::{Builder, Instruction, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::{EcdsaSighashType, PublicKey, Script, ScriptBuf};

use crate::address::p2pkh_script;
use crate::error::AppError;
use crate::keys::KeyPair;
use crate::sighash::signature_hash;
use crate::tx::Transaction;

/// 自分の公開鍵ハッシュに対する P2PKH スクリプト (scriptCode)
pub fn script_code(key: &KeyPair, secp: &Secp256k1<All>) -> ScriptBuf {
    p2pkh_script(&key.pubkey_hash(secp))
}

pub fn sighash_message(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: u64,
    consensus_branch_id: u32,
) -> Result<Message, AppError> {
    let digest = signature_hash(
        tx,
        input_index,
        script_code,
        amount,
        EcdsaSighashType::All,
        consensus_branch_id,
    )?;
    Ok(Message::from_digest(digest))
}

/// RFC6979 の決定的ノンスで署名し、`<sig+hashtype> <pubkey>` の scriptSig を組み立てる
pub fn sign_message(
    secp: &Secp256k1<All>,
    message: &Message,
    key: &KeyPair,
    input_index: usize,
) -> Result<ScriptBuf, AppError> {
    let signature = bitcoin::ecdsa::Signature {
        signature: secp.sign_ecdsa(message, key.secret_key()),
        sighash_type: EcdsaSighashType::All,
    };
    let public_key = PublicKey {
        compressed: key.is_compressed(),
        inner: key.public_key(secp),
    };

    let sig_push = PushBytesBuf::try_from(signature.to_vec()).map_err(|_| {
        AppError::TransactionBuild(format!("署名のPushBytes変換失敗 (input {})", input_index))
    })?;
    Ok(Builder::new()
        .push_slice(sig_push)
        .push_key(&public_key)
        .into_script())
}

/// scriptSig の署名がメッセージと公開鍵に対して有効かを確認する
pub fn verify_script_sig(
    secp: &Secp256k1<All>,
    message: &Message,
    script_sig: &Script,
) -> bool {
    let pushes: Vec<&[u8]> = script_sig
        .instructions()
        .filter_map(|ins| match ins {
            Ok(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes()),
            _ => None,
        })
        .collect();
    let [sig_bytes, key_bytes] = pushes.as_slice() else {
        return false;
    };

    let Ok(signature) = bitcoin::ecdsa::Signature::from_slice(sig_bytes) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(key_bytes) else {
        return false;
    };
    signature.sighash_type == EcdsaSighashType::All
        && secp.verify_ecdsa(message, &signature.signature, &public_key.inner).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{SAPLING_TX_VERSION, SAPLING_VERSION_GROUP_ID};
    use crate::tx::{OutPoint, TxIn, TxOut};
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::SecretKey;
    use bitcoin::Txid;

    const BRANCH: u32 = 0x76B8_09BB;

    fn key(compressed: bool) -> KeyPair {
        KeyPair::new(SecretKey::from_slice(&[0x5a; 32]).unwrap(), compressed)
    }

    fn unsigned_tx() -> Transaction {
        Transaction {
            overwintered: true,
            version: SAPLING_TX_VERSION,
            version_group_id: SAPLING_VERSION_GROUP_ID,
            inputs: vec![TxIn::unsigned(OutPoint {
                txid: Txid::from_byte_array([0xab; 32]),
                vout: 0,
            })],
            outputs: vec![TxOut {
                value: 40_000,
                script_pubkey: p2pkh_script(&[1u8; 20]),
            }],
            lock_time: 0,
            expiry_height: 300,
            value_balance: 0,
        }
    }

    #[test]
    fn script_sig_pushes_signature_then_pubkey() {
        let secp = Secp256k1::new();
        for compressed in [true, false] {
            let key = key(compressed);
            let tx = unsigned_tx();
            let code = script_code(&key, &secp);
            let message = sighash_message(&tx, 0, &code, 100_000, BRANCH).unwrap();
            let script_sig = sign_message(&secp, &message, &key, 0).unwrap();

            let pushes: Vec<Vec<u8>> = script_sig
                .instructions()
                .map(|ins| match ins.unwrap() {
                    Instruction::PushBytes(bytes) => bytes.as_bytes().to_vec(),
                    Instruction::Op(op) => panic!("unexpected opcode {:?}", op),
                })
                .collect();
            assert_eq!(pushes.len(), 2);
            assert_eq!(*pushes[0].last().unwrap(), 0x01);
            assert_eq!(pushes[0][0], 0x30);
            assert_eq!(pushes[1], key.public_key_bytes(&secp));
            assert!(verify_script_sig(&secp, &message, &script_sig));
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let secp = Secp256k1::new();
        let key = key(true);
        let tx = unsigned_tx();
        let code = script_code(&key, &secp);
        let message = sighash_message(&tx, 0, &code, 100_000, BRANCH).unwrap();
        assert_eq!(
            sign_message(&secp, &message, &key, 0).unwrap(),
            sign_message(&secp, &message, &key, 0).unwrap()
        );
    }

    #[test]
    fn tampered_spent_value_invalidates_signature() {
        let secp = Secp256k1::new();
        let key = key(true);
        let tx = unsigned_tx();
        let code = script_code(&key, &secp);
        let signed_for = sighash_message(&tx, 0, &code, 100_000, BRANCH).unwrap();
        let script_sig = sign_message(&secp, &signed_for, &key, 0).unwrap();

        let tampered = sighash_message(&tx, 0, &code, 100_001, BRANCH).unwrap();
        assert!(!verify_script_sig(&secp, &tampered, &script_sig));
    }

    #[test]
    fn malformed_script_sig_does_not_verify() {
        let secp = Secp256k1::new();
        let message = Message::from_digest([7u8; 32]);
        let script_sig = ScriptBuf::from_bytes(vec![0x01, 0x02]);
        assert!(!verify_script_sig(&secp, &message, &script_sig));
    }
}
