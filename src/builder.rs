//! 透明トランザクションのビルダー。
//!
//! 状態は `Empty → InputsAdded → OutputsAdded → HeaderSet → Signed` の順にのみ進む。
//! ヘッダの各フィールドは一度しか設定できず、再設定はエラーになる。

use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{ScriptBuf, Txid};

use crate::error::AppError;
use crate::keys::KeyPair;
use crate::signer;
use crate::tx::{OutPoint, Transaction, TxIn, TxOut, TX_EXPIRY_HEIGHT_THRESHOLD};

/// 有効期限 = 現在のブロック高 + この値
pub const EXPIRY_DELTA: u32 = 300;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuilderState {
    Empty,
    InputsAdded,
    OutputsAdded,
    HeaderSet,
    Signed,
}

#[derive(Debug)]
pub struct TransactionBuilder {
    state: BuilderState,
    version: Option<i32>,
    version_group_id: Option<u32>,
    expiry_height: Option<u32>,
    inputs: Vec<TxIn>,
    outputs: Vec<TxOut>,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        TransactionBuilder {
            state: BuilderState::Empty,
            version: None,
            version_group_id: None,
            expiry_height: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    fn require(&self, allowed: &[BuilderState], operation: &str) -> Result<(), AppError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AppError::TransactionBuild(format!(
                "{} は状態 {:?} では実行できません",
                operation, self.state
            )))
        }
    }

    /// 入力は追加した順に署名・シリアライズされる
    pub fn add_input(&mut self, txid: Txid, vout: u32) -> Result<(), AppError> {
        self.require(&[BuilderState::Empty, BuilderState::InputsAdded], "add_input")?;
        self.inputs.push(TxIn::unsigned(OutPoint { txid, vout }));
        self.state = BuilderState::InputsAdded;
        Ok(())
    }

    pub fn add_output(&mut self, script_pubkey: ScriptBuf, value: u64) -> Result<(), AppError> {
        self.require(&[BuilderState::InputsAdded, BuilderState::OutputsAdded], "add_output")?;
        if value > i64::MAX as u64 {
            return Err(AppError::SerializationOverflow(format!("出力金額 {}", value)));
        }
        self.outputs.push(TxOut {
            value,
            script_pubkey,
        });
        self.state = BuilderState::OutputsAdded;
        Ok(())
    }

    pub fn set_version(&mut self, version: i32) -> Result<(), AppError> {
        self.require(&[BuilderState::OutputsAdded], "set_version")?;
        set_once(&mut self.version, version, "version")?;
        self.advance_header();
        Ok(())
    }

    pub fn set_version_group_id(&mut self, version_group_id: u32) -> Result<(), AppError> {
        self.require(&[BuilderState::OutputsAdded], "set_version_group_id")?;
        set_once(&mut self.version_group_id, version_group_id, "version_group_id")?;
        self.advance_header();
        Ok(())
    }

    /// ブロック高 0 も有効 (有効期限 300)
    pub fn set_expiry_height(&mut self, block_height: u32) -> Result<(), AppError> {
        self.require(&[BuilderState::OutputsAdded], "set_expiry_height")?;
        let expiry = block_height
            .checked_add(EXPIRY_DELTA)
            .filter(|expiry| *expiry < TX_EXPIRY_HEIGHT_THRESHOLD)
            .ok_or_else(|| {
                AppError::SerializationOverflow(format!("有効期限の高さ (ブロック高 {} + {})", block_height, EXPIRY_DELTA))
            })?;
        set_once(&mut self.expiry_height, expiry, "expiry_height")?;
        self.advance_header();
        Ok(())
    }

    fn advance_header(&mut self) {
        if self.version.is_some() && self.version_group_id.is_some() && self.expiry_height.is_some() {
            self.state = BuilderState::HeaderSet;
        }
    }

    /// ヘッダ確定後の未署名トランザクション
    pub fn unsigned_transaction(&self) -> Result<Transaction, AppError> {
        self.require(&[BuilderState::HeaderSet, BuilderState::Signed], "unsigned_transaction")?;
        let (Some(version), Some(version_group_id), Some(expiry_height)) =
            (self.version, self.version_group_id, self.expiry_height)
        else {
            return Err(AppError::TransactionBuild("ヘッダが未設定です".to_string()));
        };
        Ok(Transaction {
            overwintered: true,
            version,
            version_group_id,
            inputs: self
                .inputs
                .iter()
                .map(|input| TxIn::unsigned(input.prevout))
                .collect(),
            outputs: self.outputs.clone(),
            lock_time: 0,
            expiry_height,
            value_balance: 0,
        })
    }

    /// 全入力を同じ鍵で署名する。`amounts[i]` は入力 i が使用する UTXO の金額。
    ///
    /// 先に全入力の署名ハッシュを確定させてから scriptSig を書き込むため、
    /// どの入力の署名も他の入力の途中状態を参照しない。
    pub fn sign_all(
        &mut self,
        secp: &Secp256k1<All>,
        key: &KeyPair,
        amounts: &[u64],
        consensus_branch_id: u32,
    ) -> Result<(), AppError> {
        self.require(&[BuilderState::HeaderSet], "sign_all")?;
        if amounts.len() != self.inputs.len() {
            return Err(AppError::TransactionBuild(format!(
                "金額の数 ({}) と入力の数 ({}) が一致しません",
                amounts.len(),
                self.inputs.len()
            )));
        }

        let unsigned = self.unsigned_transaction()?;
        let script_code = signer::script_code(key, secp);

        let mut messages = Vec::with_capacity(amounts.len());
        for (input_index, amount) in amounts.iter().enumerate() {
            log::debug!("入力 {} の署名ハッシュを計算します (金額 {} sats)。", input_index, amount);
            messages.push(signer::sighash_message(
                &unsigned,
                input_index,
                &script_code,
                *amount,
                consensus_branch_id,
            )?);
        }

        for (input_index, message) in messages.iter().enumerate() {
            let script_sig = signer::sign_message(secp, message, key, input_index)?;
            if !signer::verify_script_sig(secp, message, &script_sig) {
                return Err(AppError::TransactionBuild(format!(
                    "入力 {} の署名検証に失敗しました",
                    input_index
                )));
            }
            self.inputs[input_index].script_sig = script_sig;
            log::debug!("入力 {} の署名適用完了。", input_index);
        }

        self.state = BuilderState::Signed;
        Ok(())
    }

    /// すべての入力が署名済みの場合のみトランザクションを返す
    pub fn build(&self) -> Result<Transaction, AppError> {
        if let Some(input_index) = self.inputs.iter().position(|input| !input.is_signed()) {
            return Err(AppError::IncompleteSignature { input_index });
        }
        self.require(&[BuilderState::Signed], "build")?;
        let mut tx = self.unsigned_transaction()?;
        tx.inputs = self.inputs.clone();
        Ok(tx)
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<(), AppError> {
    if slot.is_some() {
        return Err(AppError::TransactionBuild(format!("{} は既に設定されています", field)));
    }
    *slot = Some(value);
    Ok(())
}
