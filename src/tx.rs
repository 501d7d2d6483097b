//! Sapling (v4) の透明トランザクションとそのワイヤ形式

use bitcoin::hashes::Hash;
use bitcoin::{ScriptBuf, Txid};

use crate::encoding::{DecodeError, Decoder, Encoder};
use crate::network::{SAPLING_TX_VERSION, SAPLING_VERSION_GROUP_ID};

pub const OVERWINTER_FLAG: u32 = 1 << 31;
pub const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;
/// これ以上の有効期限高さはコンセンサスで無効
pub const TX_EXPIRY_HEIGHT_THRESHOLD: u32 = 500_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn consensus_encode(&self, encoder: &mut Encoder) {
        // Txid は内部バイト順 (表示順の逆) のまま書き出す
        encoder.write_bytes(self.txid.as_byte_array());
        encoder.write_u32_le(self.vout);
    }

    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let txid = Txid::from_byte_array(decoder.read_fixed::<32>()?);
        let vout = decoder.read_u32_le()?;
        Ok(OutPoint { txid, vout })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: ScriptBuf,
    pub sequence: u32,
}

impl TxIn {
    pub fn unsigned(prevout: OutPoint) -> Self {
        TxIn {
            prevout,
            script_sig: ScriptBuf::new(),
            sequence: DEFAULT_SEQUENCE,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.script_sig.is_empty()
    }

    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.prevout.consensus_encode(encoder);
        encoder.write_var_bytes(self.script_sig.as_bytes());
        encoder.write_u32_le(self.sequence);
    }

    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let prevout = OutPoint::consensus_decode(decoder)?;
        let script_sig = ScriptBuf::from_bytes(decoder.read_var_bytes()?);
        let sequence = decoder.read_u32_le()?;
        Ok(TxIn {
            prevout,
            script_sig,
            sequence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    /// i64::MAX 以下であることは出力追加時に検証済み
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

impl TxOut {
    pub fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u64_le(self.value);
        encoder.write_var_bytes(self.script_pubkey.as_bytes());
    }

    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let value = decoder.read_i64_le()?;
        let value = u64::try_from(value).map_err(|_| DecodeError::InvalidData("負の出力金額"))?;
        let script_pubkey = ScriptBuf::from_bytes(decoder.read_var_bytes()?);
        Ok(TxOut {
            value,
            script_pubkey,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub overwintered: bool,
    pub version: i32,
    pub version_group_id: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry_height: u32,
    /// シールド部分を持たないので常に 0
    pub value_balance: i64,
}

impl Transaction {
    /// バージョンに overwinter フラグを立てたヘッダ値
    pub fn header(&self) -> u32 {
        let mut header = self.version as u32;
        if self.overwintered {
            header |= OVERWINTER_FLAG;
        }
        header
    }

    pub fn is_sapling(&self) -> bool {
        self.overwintered
            && self.version == SAPLING_TX_VERSION
            && self.version_group_id == SAPLING_VERSION_GROUP_ID
    }

    pub fn consensus_encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_u32_le(self.header());
        encoder.write_u32_le(self.version_group_id);

        encoder.write_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.consensus_encode(&mut encoder);
        }
        encoder.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.consensus_encode(&mut encoder);
        }

        encoder.write_u32_le(self.lock_time);
        encoder.write_u32_le(self.expiry_height);

        // Sapling の末尾: valueBalance, vShieldedSpend, vShieldedOutput, vJoinSplit
        encoder.write_i64_le(self.value_balance);
        encoder.write_varint(0);
        encoder.write_varint(0);
        encoder.write_varint(0);

        encoder.into_inner()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.consensus_encode())
    }

    pub fn txid(&self) -> Txid {
        Txid::hash(&self.consensus_encode())
    }

    pub fn consensus_decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);

        let header = decoder.read_u32_le()?;
        let overwintered = header & OVERWINTER_FLAG != 0;
        let version = (header & !OVERWINTER_FLAG) as i32;
        if !overwintered {
            return Err(DecodeError::InvalidData("overwinter 以前の形式には対応していません"));
        }
        let version_group_id = decoder.read_u32_le()?;
        if version != SAPLING_TX_VERSION || version_group_id != SAPLING_VERSION_GROUP_ID {
            return Err(DecodeError::InvalidData("Sapling v4 以外の形式には対応していません"));
        }

        let input_count = decoder.read_varint()?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TxIn::consensus_decode(&mut decoder)?);
        }
        let output_count = decoder.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TxOut::consensus_decode(&mut decoder)?);
        }

        let lock_time = decoder.read_u32_le()?;
        let expiry_height = decoder.read_u32_le()?;
        let value_balance = decoder.read_i64_le()?;

        let shielded_spends = decoder.read_varint()?;
        let shielded_outputs = decoder.read_varint()?;
        let join_splits = decoder.read_varint()?;
        if value_balance != 0 || shielded_spends != 0 || shielded_outputs != 0 || join_splits != 0 {
            return Err(DecodeError::InvalidData("シールド部分を含むトランザクションには対応していません"));
        }

        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }

        Ok(Transaction {
            overwintered,
            version,
            version_group_id,
            inputs,
            outputs,
            lock_time,
            expiry_height,
            value_balance,
        })
    }

    pub fn from_hex(raw: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(raw.trim()).map_err(|_| DecodeError::InvalidData("16進数として不正です"))?;
        Transaction::consensus_decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn sample_tx() -> Transaction {
        let txid =
            Txid::from_str("0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20").unwrap();
        Transaction {
            overwintered: true,
            version: SAPLING_TX_VERSION,
            version_group_id: SAPLING_VERSION_GROUP_ID,
            inputs: vec![TxIn::unsigned(OutPoint { txid, vout: 1 })],
            outputs: vec![TxOut {
                value: 50_000,
                script_pubkey: ScriptBuf::from_bytes(vec![0x51]),
            }],
            lock_time: 0,
            expiry_height: 300,
            value_balance: 0,
        }
    }

    #[test]
    fn header_carries_overwinter_flag() {
        assert_eq!(sample_tx().header(), 0x8000_0004);
    }

    #[test]
    fn wire_layout_matches_sapling_format() {
        let hex = sample_tx().to_hex();
        // ヘッダとバージョングループ ID
        assert!(hex.starts_with("0400008085202f89"), "{}", hex);
        // 入力数 1 + 逆順の txid
        assert_eq!(&hex[16..18], "01");
        assert_eq!(
            &hex[18..82],
            "201f1e1d1c1b1a191817161514131211100f0e0d0c0b0a090807060504030201"
        );
        // vout, 空の scriptSig, sequence
        assert_eq!(&hex[82..100], "0100000000ffffffff");
        // 出力数, 金額, scriptPubKey
        assert_eq!(&hex[100..120], "0150c300000000000001");
        assert_eq!(&hex[120..122], "51");
        // lockTime, expiryHeight, valueBalance, 空のシールド部分
        let trailer = [
            "00000000",
            "2c010000",
            "0000000000000000",
            "00",
            "00",
            "00",
        ]
        .concat();
        assert_eq!(&hex[122..], trailer);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = sample_tx().consensus_encode();
        bytes.push(0x00);
        assert_eq!(
            Transaction::consensus_decode(&bytes),
            Err(DecodeError::TrailingBytes)
        );
    }

    #[test]
    fn decode_rejects_legacy_header() {
        let mut tx = sample_tx();
        tx.overwintered = false;
        assert!(matches!(
            Transaction::consensus_decode(&tx.consensus_encode()),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn txid_is_displayed_reversed() {
        let tx = sample_tx();
        let mut digest = Txid::hash(&tx.consensus_encode()).to_byte_array();
        digest.reverse();
        assert_eq!(tx.txid().to_string(), hex::encode(digest));
    }

    fn arb_tx() -> impl Strategy<Value = Transaction> {
        let arb_input = (
            prop::array::uniform32(any::<u8>()),
            any::<u32>(),
            prop::collection::vec(any::<u8>(), 0..110),
            any::<u32>(),
        )
            .prop_map(|(hash, vout, script, sequence)| TxIn {
                prevout: OutPoint {
                    txid: Txid::from_byte_array(hash),
                    vout,
                },
                script_sig: ScriptBuf::from_bytes(script),
                sequence,
            });
        let arb_output = (0..=i64::MAX as u64, prop::collection::vec(any::<u8>(), 0..40)).prop_map(
            |(value, script)| TxOut {
                value,
                script_pubkey: ScriptBuf::from_bytes(script),
            },
        );
        (
            prop::collection::vec(arb_input, 0..4),
            prop::collection::vec(arb_output, 0..4),
            any::<u32>(),
            any::<u32>(),
        )
            .prop_map(|(inputs, outputs, lock_time, expiry_height)| Transaction {
                overwintered: true,
                version: SAPLING_TX_VERSION,
                version_group_id: SAPLING_VERSION_GROUP_ID,
                inputs,
                outputs,
                lock_time,
                expiry_height,
                value_balance: 0,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn decode_reproduces_encoded_transaction(tx in arb_tx()) {
            let decoded = Transaction::from_hex(&tx.to_hex()).unwrap();
            prop_assert_eq!(decoded, tx);
        }
    }
}
