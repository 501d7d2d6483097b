use std::path::PathBuf;
use bitcoin::base58::Error as Base58Error;
use bitcoin::secp256k1::Error as SecpError;
use thiserror::Error;

use crate::encoding::DecodeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/Oエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSONパースエラー ファイル: {file_path:?}, 詳細: {source}")]
    JsonParse {
        file_path: Option<PathBuf>, // インライン指定の場合は None
        #[source]
        source: serde_json::Error,
    },

    #[error("サポートされていないネットワーク: {name} (対応: {supported})")]
    UnsupportedNetwork { name: String, supported: String },

    #[error("無効なWIF秘密鍵: {0}")]
    InvalidWif(String),

    #[error("UTXO入力が不正です (インデックス {index}): {reason}")]
    MalformedUtxoInput { index: usize, reason: String },

    #[error("無効なアドレス ({address}): {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("アドレスのネットワーク不整合: {address} は {network} のアドレスではありません")]
    AddressNetworkMismatch { address: String, network: String },

    #[error("資金不足: 利用可能な総額 {available} sats, 要求額 {required} sats (手数料 {fee} sats を含む)")]
    InsufficientFunds {
        available: u64,
        required: u64,
        fee: u64,
    },

    #[error("未署名の入力があります (入力インデックス {input_index})")]
    IncompleteSignature { input_index: usize },

    #[error("値がフィールド幅を超えています: {0}")]
    SerializationOverflow(String),

    #[error("鍵生成エラー (エントロピー取得失敗): {0}")]
    KeyGeneration(String),

    #[error("secp256k1エラー: {0}")]
    Secp256k1(#[from] SecpError),

    #[error("トランザクションのデコードに失敗: {0}")]
    Decode(#[from] DecodeError),

    #[error("入力検証エラー: {0}")]
    InputValidation(String),

    #[error("トランザクション構築エラー: {0}")]
    TransactionBuild(String),

    #[error("内部エラー: {0}")]
    Internal(String),
}

impl AppError {
    /// base58check のデコード失敗をアドレスエラーへ変換する
    pub fn invalid_address(address: &str, source: Base58Error) -> Self {
        AppError::InvalidAddress {
            address: address.to_string(),
            reason: source.to_string(),
        }
    }
}
