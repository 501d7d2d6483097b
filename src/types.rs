use bitcoin::Txid;
use serde::Serialize;

/// 出力スクリプトの種類 (受信者アドレスから判定)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScriptType {
    P2PKH,
    P2SH,
}

/// 検証済みのUTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub value: u64,
}

/// --gen-address の出力
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAddress {
    pub network: String,
    pub address: String,
    pub wif: String,
    pub public_key: String,
    pub compressed: bool,
}

/// 送金リクエスト (CLIから検証済みの値を受け取る)
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub recipient: String,
    pub amount: u64,
    pub fee: u64,
    pub utxos: Vec<Utxo>,
    pub block_height: u32,
}

/// --decode の出力
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedTransaction {
    pub txid: String,
    pub version: i32,
    pub overwintered: bool,
    pub version_group_id: String,
    pub lock_time: u32,
    pub expiry_height: u32,
    pub inputs: Vec<DecodedInput>,
    pub outputs: Vec<DecodedOutput>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedInput {
    pub txid: String,
    pub vout: u32,
    pub script_sig: String,
    pub sequence: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedOutput {
    pub value: u64,
    pub script_pub_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}
