use clap::Parser;
use std::path::PathBuf;

use crate::error::AppError;
use crate::network::{Network, NetworkParams};

pub const DEFAULT_FEE_SATS: u64 = 2000;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Zcash系チェーン向け透明トランザクション / アドレスツール", long_about = None)]
pub struct CliArgs {
    /// 使用するネットワーク (zcash, bitcoinz, litecoinz, zero, zeroclassic, zclassic, gemlink, ycash)
    #[clap(long, value_parser, default_value = "bitcoinz")]
    pub network: String,

    /// 新しいP2PKHアドレスを生成する
    #[clap(long)]
    pub gen_address: bool,

    /// WIFからアドレスを導出する
    #[clap(long)]
    pub address_from_wif: bool,

    /// 非圧縮公開鍵を使用する (--gen-address 用)
    #[clap(long)]
    pub uncompressed: bool,

    /// 送金元の秘密鍵 (WIF)
    #[clap(long)]
    pub wif: Option<String>,

    /// 受信者アドレス
    #[clap(long)]
    pub to: Option<String>,

    /// 送金額 (satoshi単位)
    #[clap(long)]
    pub amount: Option<u64>,

    /// 手数料 (satoshi単位)。0 はデフォルト値として扱う
    #[clap(long, default_value_t = DEFAULT_FEE_SATS)]
    pub fee: u64,

    /// UTXOのJSON文字列
    #[clap(long, conflicts_with = "utxos_file")]
    pub utxos: Option<String>,

    /// UTXOのJSONファイルへのパス
    #[clap(long, value_parser)]
    pub utxos_file: Option<PathBuf>,

    /// 現在のブロック高 (有効期限 = +300)
    #[clap(long, default_value_t = 0)]
    pub blockheight: u32,

    /// コンセンサスブランチIDの上書き (16進数, 例: c8e71055)
    #[clap(long)]
    pub branch_id: Option<String>,

    /// 生成されたraw transaction hexを保存するファイルへのパス
    #[clap(short, long, value_parser)]
    pub output_file: Option<PathBuf>,

    /// raw transaction hexをデコードしてJSONで表示する
    #[clap(long)]
    pub decode: Option<String>,
}

/// 実行モード。引数の組み合わせから一つに決まる
#[derive(Debug)]
pub enum Mode {
    GenerateAddress { compressed: bool },
    AddressFromWif { wif: String },
    Decode { raw_hex: String },
    Send(SendArgs),
}

#[derive(Debug)]
pub struct SendArgs {
    pub wif: String,
    pub recipient: String,
    pub amount: u64,
    pub fee: u64,
    pub utxo_source: UtxoSource,
    pub block_height: u32,
}

#[derive(Debug)]
pub enum UtxoSource {
    Inline(String),
    File(PathBuf),
}

pub fn parse_network(args: &CliArgs) -> Result<NetworkParams, AppError> {
    let params = Network::from_name(&args.network)?.params();
    match &args.branch_id {
        Some(raw) => {
            let branch_id = parse_branch_id(raw)?;
            log::info!("ブランチIDを上書きします: {:08x} → {:08x}", params.consensus_branch_id, branch_id);
            Ok(params.with_branch_id(branch_id))
        }
        None => Ok(params),
    }
}

fn parse_branch_id(raw: &str) -> Result<u32, AppError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16)
        .map_err(|e| AppError::InputValidation(format!("無効なブランチID ({}): {}", raw, e)))
}

impl CliArgs {
    pub fn mode(&self) -> Result<Mode, AppError> {
        if self.gen_address {
            return Ok(Mode::GenerateAddress {
                compressed: !self.uncompressed,
            });
        }
        if self.address_from_wif {
            let wif = self
                .wif
                .clone()
                .ok_or_else(|| AppError::InputValidation("--wif 引数がありません".to_string()))?;
            return Ok(Mode::AddressFromWif { wif });
        }
        if let Some(raw_hex) = &self.decode {
            return Ok(Mode::Decode {
                raw_hex: raw_hex.clone(),
            });
        }

        let utxo_source = match (&self.utxos, &self.utxos_file) {
            (Some(json), _) => Some(UtxoSource::Inline(json.clone())),
            (None, Some(path)) => Some(UtxoSource::File(path.clone())),
            (None, None) => None,
        };
        let fee = if self.fee == 0 {
            log::warn!("手数料 0 が指定されたため、デフォルトの {} sats を使用します。", DEFAULT_FEE_SATS);
            DEFAULT_FEE_SATS
        } else {
            self.fee
        };
        match (&self.wif, &self.to, self.amount, utxo_source) {
            (Some(wif), Some(to), Some(amount), Some(utxo_source)) if amount > 0 => Ok(Mode::Send(SendArgs {
                wif: wif.clone(),
                recipient: to.clone(),
                amount,
                fee,
                utxo_source,
                block_height: self.blockheight,
            })),
            _ => Err(AppError::InputValidation(
                "必須引数が不足しています (--wif, --to, --amount, --utxos または --utxos-file)".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let mut argv = vec!["zcash-tx-signer-cli"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_follow_original_tool() {
        let args = parse(&[]);
        assert_eq!(args.network, "bitcoinz");
        assert_eq!(args.fee, 2000);
        assert_eq!(args.blockheight, 0);
    }

    #[test]
    fn gen_address_mode() {
        let args = parse(&["--network", "zcash", "--gen-address", "--uncompressed"]);
        assert!(matches!(args.mode().unwrap(), Mode::GenerateAddress { compressed: false }));
    }

    #[test]
    fn address_from_wif_requires_wif() {
        let args = parse(&["--address-from-wif"]);
        assert!(matches!(args.mode(), Err(AppError::InputValidation(_))));
    }

    #[test]
    fn send_mode_collects_arguments() {
        let args = parse(&[
            "--wif", "K...", "--to", "t1abc", "--amount", "50000", "--utxos", "[]", "--blockheight", "7",
        ]);
        match args.mode().unwrap() {
            Mode::Send(send) => {
                assert_eq!(send.amount, 50_000);
                assert_eq!(send.fee, 2000);
                assert_eq!(send.block_height, 7);
                assert!(matches!(send.utxo_source, UtxoSource::Inline(_)));
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn send_mode_rejects_missing_or_zero_amount() {
        let args = parse(&["--wif", "K...", "--to", "t1abc", "--utxos", "[]"]);
        assert!(args.mode().is_err());
        let args = parse(&["--wif", "K...", "--to", "t1abc", "--amount", "0", "--utxos", "[]"]);
        assert!(args.mode().is_err());
    }

    #[test]
    fn zero_fee_falls_back_to_default() {
        let args = parse(&["--wif", "K...", "--to", "t1abc", "--amount", "1000", "--fee", "0", "--utxos", "[]"]);
        match args.mode().unwrap() {
            Mode::Send(send) => assert_eq!(send.fee, DEFAULT_FEE_SATS),
            other => panic!("unexpected mode {:?}", other),
        }
        let args = parse(&["--wif", "K...", "--to", "t1abc", "--amount", "1000", "--fee", "500", "--utxos", "[]"]);
        match args.mode().unwrap() {
            Mode::Send(send) => assert_eq!(send.fee, 500),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn utxo_sources_are_mutually_exclusive() {
        let argv = ["zcash-tx-signer-cli", "--utxos", "[]", "--utxos-file", "u.json"];
        assert!(CliArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn branch_id_override() {
        let args = parse(&["--network", "zcash", "--branch-id", "0xc8e71055"]);
        assert_eq!(parse_network(&args).unwrap().consensus_branch_id, 0xC8E7_1055);
        let args = parse(&["--network", "zcash", "--branch-id", "zz"]);
        assert!(parse_network(&args).is_err());
    }

    #[test]
    fn unknown_network_fails_lookup() {
        let args = parse(&["--network", "bitcoin"]);
        assert!(matches!(parse_network(&args), Err(AppError::UnsupportedNetwork { .. })));
    }
}
