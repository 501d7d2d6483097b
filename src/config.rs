use std::fs;
use std::path::Path;
use std::str::FromStr;

use bitcoin::Txid;
use serde::Deserialize;

use crate::error::AppError;
use crate::types::Utxo;

/// 数値または数値文字列
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    /// 非負の整数値。`100000.0` や `1e5` のような整数値の浮動小数点も受け付ける
    fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrString::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_number)),
            NumberOrString::Text(s) => {
                let s = s.trim();
                s.parse().ok().or_else(|| s.parse::<f64>().ok().and_then(whole_number))
            }
        }
    }
}

fn whole_number(value: f64) -> Option<u64> {
    // 2^64 以上は u64 に収まらない
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

// 追加のフィールド (scriptPubKey など) は無視する
#[derive(Deserialize, Debug, Clone)]
pub struct UtxoInput {
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<NumberOrString>,
    #[serde(default)]
    pub satoshis: Option<NumberOrString>,
}

impl UtxoInput {
    pub fn validate(&self, index: usize) -> Result<Utxo, AppError> {
        let malformed = |reason: String| AppError::MalformedUtxoInput { index, reason };

        let txid_str = self
            .txid
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("txid がありません".to_string()))?;
        let txid = Txid::from_str(txid_str)
            .map_err(|e| malformed(format!("無効なTXID形式 ({}): {}", txid_str, e)))?;

        let vout = self
            .vout
            .as_ref()
            .and_then(NumberOrString::as_u64)
            .ok_or_else(|| malformed("vout が数値ではありません".to_string()))?;
        let vout = u32::try_from(vout)
            .map_err(|_| AppError::SerializationOverflow(format!("vout {}", vout)))?;

        let value = self
            .satoshis
            .as_ref()
            .and_then(NumberOrString::as_u64)
            .ok_or_else(|| malformed("satoshis が非負の整数ではありません".to_string()))?;
        if value > i64::MAX as u64 {
            return Err(AppError::SerializationOverflow(format!("satoshis {}", value)));
        }

        Ok(Utxo { txid, vout, value })
    }
}

pub fn parse_utxos(json: &str, file_path: Option<&Path>) -> Result<Vec<Utxo>, AppError> {
    let inputs: Vec<UtxoInput> = serde_json::from_str(json).map_err(|e| {
        log::error!("UTXOのJSONパースに失敗しました。");
        AppError::JsonParse {
            file_path: file_path.map(Path::to_path_buf),
            source: e,
        }
    })?;
    log::debug!("UTXO {} 件を読み込みました。", inputs.len());

    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| input.validate(index))
        .collect()
}

pub fn load_utxos_file(path: &Path) -> Result<Vec<Utxo>, AppError> {
    let content = fs::read_to_string(path).map_err(|e| {
        log::error!("UTXOファイルの読み込みに失敗しました: {:?}", path);
        AppError::Io(e)
    })?;
    parse_utxos(&content, Some(path))
}
