use bitcoin::secp256k1::{All, Secp256k1};

use crate::{
    address,
    builder::TransactionBuilder,
    error::AppError,
    keys::KeyPair,
    network::{NetworkParams, SAPLING_TX_VERSION, SAPLING_VERSION_GROUP_ID},
    tx::Transaction,
    types::{DecodedInput, DecodedOutput, DecodedTransaction, SendRequest},
};

// この金額以下のおつりは出力を作らず手数料に含める
pub const DUST_THRESHOLD_SATS: u64 = 1000;

/// おつりの計算。負になる場合は資金不足、ダスト以下なら None
pub fn compute_change(total_input: u64, amount: u64, fee: u64) -> Result<Option<u64>, AppError> {
    let required = amount
        .checked_add(fee)
        .ok_or_else(|| AppError::SerializationOverflow(format!("送金額 {} + 手数料 {}", amount, fee)))?;
    if total_input < required {
        return Err(AppError::InsufficientFunds {
            available: total_input,
            required,
            fee,
        });
    }

    let change = total_input - required;
    if change > DUST_THRESHOLD_SATS {
        Ok(Some(change))
    } else {
        if change > 0 {
            log::warn!(
                "おつり {} sats はダスト閾値 {} sats 以下のため手数料に含めます。",
                change, DUST_THRESHOLD_SATS
            );
        }
        Ok(None)
    }
}

pub fn create_and_sign_transaction(
    request: &SendRequest,
    key: &KeyPair,
    network: &NetworkParams,
    secp: &Secp256k1<All>,
) -> Result<Transaction, AppError> {
    log::info!("トランザクション構築処理を開始します。ネットワーク: {}", network.name);

    if request.utxos.is_empty() {
        return Err(AppError::InputValidation("UTXOが指定されていません".to_string()));
    }

    let (recipient_script, script_type) = address::script_pubkey_for_address(&request.recipient, network)?;
    log::debug!("受信者アドレス: {} ({:?})", request.recipient, script_type);

    let mut builder = TransactionBuilder::new();
    let mut total_input_value_sats: u64 = 0;
    for utxo in &request.utxos {
        builder.add_input(utxo.txid, utxo.vout)?;
        total_input_value_sats = total_input_value_sats
            .checked_add(utxo.value)
            .ok_or_else(|| AppError::SerializationOverflow("入力金額の合計".to_string()))?;
        log::debug!("入力追加: txid={}, vout={}, value={}", utxo.txid, utxo.vout, utxo.value);
    }

    builder.add_output(recipient_script, request.amount)?;
    log::debug!("受信者出力追加: value={}", request.amount);

    if let Some(change) = compute_change(total_input_value_sats, request.amount, request.fee)? {
        let change_script = address::p2pkh_script(&key.pubkey_hash(secp));
        log::debug!("おつり発生: {} sats, おつりアドレス: {}", change, key.address(secp, network));
        builder.add_output(change_script, change)?;
    }

    builder.set_version(SAPLING_TX_VERSION)?;
    builder.set_version_group_id(SAPLING_VERSION_GROUP_ID)?;
    builder.set_expiry_height(request.block_height)?;

    log::info!("トランザクション署名処理を開始します。");
    let amounts: Vec<u64> = request.utxos.iter().map(|utxo| utxo.value).collect();
    builder.sign_all(secp, key, &amounts, network.consensus_branch_id)?;
    log::info!("全ての入力の署名が完了しました。");

    builder.build()
}

/// --decode 用の要約
pub fn describe_transaction(tx: &Transaction, network: &NetworkParams) -> DecodedTransaction {
    DecodedTransaction {
        txid: tx.txid().to_string(),
        version: tx.version,
        overwintered: tx.overwintered,
        version_group_id: format!("{:08x}", tx.version_group_id),
        lock_time: tx.lock_time,
        expiry_height: tx.expiry_height,
        inputs: tx
            .inputs
            .iter()
            .map(|input| DecodedInput {
                txid: input.prevout.txid.to_string(),
                vout: input.prevout.vout,
                script_sig: hex::encode(input.script_sig.as_bytes()),
                sequence: input.sequence,
            })
            .collect(),
        outputs: tx
            .outputs
            .iter()
            .map(|output| DecodedOutput {
                value: output.value,
                script_pub_key: hex::encode(output.script_pubkey.as_bytes()),
                address: address::script_to_address(&output.script_pubkey, network),
            })
            .collect(),
    }
}
