use std::fs::File;
use std::io::Write;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::secp256k1::All as AllContext;
use clap::Parser;

mod address;
mod builder;
mod cli;
mod config;
mod encoding;
mod error;
mod keys;
mod network;
mod sighash;
mod signer;
mod transaction;
mod tx;
mod types;

use cli::{CliArgs, Mode, SendArgs, UtxoSource, parse_network};
use error::AppError;
use keys::KeyPair;
use network::NetworkParams;
use types::SendRequest;

fn main() -> Result<(), AppError> {
    env_logger::init();

    let args = CliArgs::parse();
    log::info!("アプリケーションを開始します。ネットワーク: {}", args.network);

    let network = parse_network(&args)?;
    log::info!(
        "指定されたネットワーク: {} (ブランチID {:08x})",
        network.name, network.consensus_branch_id
    );

    let secp: Secp256k1<AllContext> = Secp256k1::new();

    match args.mode()? {
        Mode::GenerateAddress { compressed } => {
            let generated = keys::generate_address(&network, compressed, &secp)?;
            log::info!("新しいアドレスを生成しました: {}", generated.address);
            let json = serde_json::to_string_pretty(&generated)
                .map_err(|e| AppError::Internal(format!("JSONへの変換に失敗: {}", e)))?;
            println!("{}", json);
        }
        Mode::AddressFromWif { wif } => {
            let key = KeyPair::from_wif(&wif, &network)?;
            println!("{}", key.address(&secp, &network));
        }
        Mode::Decode { raw_hex } => {
            let tx = tx::Transaction::from_hex(&raw_hex)?;
            let summary = transaction::describe_transaction(&tx, &network);
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| AppError::Internal(format!("JSONへの変換に失敗: {}", e)))?;
            println!("{}", json);
        }
        Mode::Send(send) => {
            let raw_tx = build_signed_hex(send, &network, &secp)?;
            println!("{}", raw_tx);

            if let Some(path) = &args.output_file {
                let mut output_file = File::create(path).map_err(|e| {
                    log::error!("出力ファイルの作成に失敗しました: {:?}", path);
                    AppError::Io(e)
                })?;
                output_file.write_all(raw_tx.as_bytes()).map_err(|e| {
                    log::error!("出力ファイルへの書き込みに失敗しました。");
                    AppError::Io(e)
                })?;
                log::info!("Raw transactionを {:?} に保存しました。", path);
            }
        }
    }

    log::info!("処理が正常に完了しました。");
    Ok(())
}

fn build_signed_hex(
    send: SendArgs,
    network: &NetworkParams,
    secp: &Secp256k1<AllContext>,
) -> Result<String, AppError> {
    let utxos = match &send.utxo_source {
        UtxoSource::Inline(json) => config::parse_utxos(json, None)?,
        UtxoSource::File(path) => config::load_utxos_file(path)?,
    };
    let key = KeyPair::from_wif(&send.wif, network)?;

    let request = SendRequest {
        recipient: send.recipient,
        amount: send.amount,
        fee: send.fee,
        utxos,
        block_height: send.block_height,
    };
    let signed_tx = transaction::create_and_sign_transaction(&request, &key, network, secp)?;
    log::info!("署名済みトランザクションの生成に成功しました。txid: {}", signed_tx.txid());

    let serialized_tx = signed_tx.to_hex();
    log::debug!("Raw transaction hex: {}", serialized_tx);
    Ok(serialized_tx)
}
