//! 透明入力の署名ハッシュ (ZIP-243, Sapling)

use bitcoin::{EcdsaSighashType, Script};
use blake2b_simd::Params as Blake2bParams;

use crate::encoding::Encoder;
use crate::error::AppError;
use crate::tx::{Transaction, TxOut};

const SIGHASH_NONE: u32 = 0x02;
const SIGHASH_SINGLE: u32 = 0x03;
const SIGHASH_ANYONECANPAY: u32 = 0x80;

const ZCASH_PREVOUTS_HASH_PERSONALIZATION: [u8; 16] = *b"ZcashPrevoutHash";
const ZCASH_SEQUENCE_HASH_PERSONALIZATION: [u8; 16] = *b"ZcashSequencHash";
const ZCASH_OUTPUTS_HASH_PERSONALIZATION: [u8; 16] = *b"ZcashOutputsHash";
const ZCASH_SIGHASH_PERSONALIZATION_PREFIX: &[u8; 12] = b"ZcashSigHash";

/// `input_index` の入力に対する Sapling 署名ハッシュを計算する。
///
/// 使用済み金額 `amount` とブランチ ID がダイジェストに含まれるため、
/// どちらかを偽った署名はネットワークで検証に失敗する。
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    amount: u64,
    sighash_type: EcdsaSighashType,
    consensus_branch_id: u32,
) -> Result<[u8; 32], AppError> {
    if !tx.is_sapling() {
        return Err(AppError::TransactionBuild(
            "Sapling v4 以外のトランザクションの署名ハッシュは計算できません".to_string(),
        ));
    }
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        AppError::TransactionBuild(format!("入力インデックス {} が範囲外です", input_index))
    })?;
    let amount = i64::try_from(amount).map_err(|_| {
        AppError::SerializationOverflow(format!("入力 {} の金額 {}", input_index, amount))
    })?;

    let anyone_can_pay = sighash_type.to_u32() & SIGHASH_ANYONECANPAY != 0;
    let base = sighash_type.to_u32() & 0x1f;
    let single_or_none = base == SIGHASH_SINGLE || base == SIGHASH_NONE;

    let hash_prevouts = if !anyone_can_pay {
        hash_prevouts(tx)
    } else {
        [0u8; 32]
    };

    let hash_sequence = if !anyone_can_pay && !single_or_none {
        hash_sequence(tx)
    } else {
        [0u8; 32]
    };

    let hash_outputs = match base {
        SIGHASH_SINGLE => tx
            .outputs
            .get(input_index)
            .map(|output| hash_outputs(std::slice::from_ref(output)))
            .unwrap_or([0u8; 32]),
        SIGHASH_NONE => [0u8; 32],
        _ => hash_outputs(&tx.outputs),
    };

    let mut personalization = [0u8; 16];
    personalization[..12].copy_from_slice(ZCASH_SIGHASH_PERSONALIZATION_PREFIX);
    personalization[12..].copy_from_slice(&consensus_branch_id.to_le_bytes());

    let mut encoder = Encoder::new();
    encoder.write_u32_le(tx.header());
    encoder.write_u32_le(tx.version_group_id);
    encoder.write_bytes(&hash_prevouts);
    encoder.write_bytes(&hash_sequence);
    encoder.write_bytes(&hash_outputs);
    // JoinSplit / Spend / Output の各ハッシュ (透明トランザクションでは空)
    encoder.write_bytes(&[0u8; 32]);
    encoder.write_bytes(&[0u8; 32]);
    encoder.write_bytes(&[0u8; 32]);
    encoder.write_u32_le(tx.lock_time);
    encoder.write_u32_le(tx.expiry_height);
    encoder.write_i64_le(tx.value_balance);
    encoder.write_u32_le(sighash_type.to_u32());

    input.prevout.consensus_encode(&mut encoder);
    encoder.write_var_bytes(script_code.as_bytes());
    encoder.write_i64_le(amount);
    encoder.write_u32_le(input.sequence);

    Ok(blake2b_hash(personalization, &encoder.into_inner()))
}

fn blake2b_hash(personalization: [u8; 16], data: &[u8]) -> [u8; 32] {
    let hash = Blake2bParams::new()
        .hash_length(32)
        .personal(&personalization)
        .to_state()
        .update(data)
        .finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

fn hash_prevouts(tx: &Transaction) -> [u8; 32] {
    let mut encoder = Encoder::new();
    for input in &tx.inputs {
        input.prevout.consensus_encode(&mut encoder);
    }
    blake2b_hash(ZCASH_PREVOUTS_HASH_PERSONALIZATION, &encoder.into_inner())
}

fn hash_sequence(tx: &Transaction) -> [u8; 32] {
    let mut encoder = Encoder::new();
    for input in &tx.inputs {
        encoder.write_u32_le(input.sequence);
    }
    blake2b_hash(ZCASH_SEQUENCE_HASH_PERSONALIZATION, &encoder.into_inner())
}

fn hash_outputs(outputs: &[TxOut]) -> [u8; 32] {
    let mut encoder = Encoder::new();
    for output in outputs {
        output.consensus_encode(&mut encoder);
    }
    blake2b_hash(ZCASH_OUTPUTS_HASH_PERSONALIZATION, &encoder.into_inner())
}
