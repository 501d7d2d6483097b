use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Saplingトランザクションのバージョン (overwinterフラグを除く)
pub const SAPLING_TX_VERSION: i32 = 4;
/// Saplingのバージョングループ ID (全チェーン共通)
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;

/// 対応しているZcash系チェーン
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Network {
    Zcash,
    BitcoinZ,
    LitecoinZ,
    Zero,
    ZeroClassic,
    Zclassic,
    Gemlink,
    Ycash,
}

/// チェーンごとの不変パラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: &'static str,
    pub pubkey_hash_prefix: &'static [u8],
    pub script_hash_prefix: &'static [u8],
    pub wif_version: u8,
    pub consensus_branch_id: u32,
}

impl Network {
    pub const ALL: [Network; 8] = [
        Network::Zcash,
        Network::BitcoinZ,
        Network::LitecoinZ,
        Network::Zero,
        Network::ZeroClassic,
        Network::Zclassic,
        Network::Gemlink,
        Network::Ycash,
    ];

    pub fn from_name(name: &str) -> Result<Self, AppError> {
        let lowered = name.to_lowercase();
        Network::ALL
            .into_iter()
            .find(|n| n.params().name == lowered)
            .ok_or_else(|| AppError::UnsupportedNetwork {
                name: name.to_string(),
                supported: Network::supported_names(),
            })
    }

    pub fn supported_names() -> String {
        Network::ALL
            .iter()
            .map(|n| n.params().name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ブランチIDは各チェーンのSapling期の値
    pub fn params(self) -> NetworkParams {
        match self {
            Network::Zcash => NetworkParams {
                name: "zcash",
                pubkey_hash_prefix: &[0x1C, 0xB8],
                script_hash_prefix: &[0x1C, 0xBD],
                wif_version: 0x80,
                consensus_branch_id: 0x76B8_09BB,
            },
            Network::BitcoinZ => NetworkParams {
                name: "bitcoinz",
                pubkey_hash_prefix: &[0x1C, 0xB8],
                script_hash_prefix: &[0x1C, 0xBD],
                wif_version: 0x80,
                consensus_branch_id: 0x76B8_09BB,
            },
            Network::LitecoinZ => NetworkParams {
                name: "litecoinz",
                pubkey_hash_prefix: &[0x0A, 0xB3],
                script_hash_prefix: &[0x0A, 0xB8],
                wif_version: 0x80,
                consensus_branch_id: 0x76B8_09BB,
            },
            Network::Zero => NetworkParams {
                name: "zero",
                pubkey_hash_prefix: &[0x1C, 0xB8],
                script_hash_prefix: &[0x1C, 0xBD],
                wif_version: 0x80,
                consensus_branch_id: 0x7361_707A,
            },
            Network::ZeroClassic => NetworkParams {
                name: "zeroclassic",
                pubkey_hash_prefix: &[0x1C, 0xB8],
                script_hash_prefix: &[0x1C, 0xBD],
                wif_version: 0x80,
                consensus_branch_id: 0x7361_707A,
            },
            Network::Zclassic => NetworkParams {
                name: "zclassic",
                pubkey_hash_prefix: &[0x1C, 0xB8],
                script_hash_prefix: &[0x1C, 0xBD],
                wif_version: 0x80,
                consensus_branch_id: 0x930B_540D,
            },
            Network::Gemlink => NetworkParams {
                name: "gemlink",
                pubkey_hash_prefix: &[0x1C, 0x28],
                script_hash_prefix: &[0x1C, 0x2D],
                wif_version: 0x80,
                consensus_branch_id: 0x76B8_09BB,
            },
            Network::Ycash => NetworkParams {
                name: "ycash",
                pubkey_hash_prefix: &[0x1C, 0x28],
                script_hash_prefix: &[0x1C, 0x2C],
                wif_version: 0x80,
                consensus_branch_id: 0x374D_694F,
            },
        }
    }
}

impl FromStr for Network {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::from_name(s)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.params().name)
    }
}

impl NetworkParams {
    /// 指定されたブランチIDで上書きしたコピーを返す
    pub fn with_branch_id(mut self, consensus_branch_id: u32) -> Self {
        self.consensus_branch_id = consensus_branch_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Network::from_name("BitcoinZ").unwrap(), Network::BitcoinZ);
        assert_eq!("ycash".parse::<Network>().unwrap(), Network::Ycash);
    }

    #[test]
    fn unknown_network_is_rejected() {
        let err = Network::from_name("dogecoin").unwrap_err();
        assert!(matches!(err, AppError::UnsupportedNetwork { .. }));
    }

    #[test]
    fn every_network_round_trips_through_its_name() {
        for network in Network::ALL {
            assert_eq!(Network::from_name(&network.to_string()).unwrap(), network);
        }
    }

    #[test]
    fn branch_id_override_keeps_prefixes() {
        let params = Network::Zcash.params().with_branch_id(0xC8E7_1055);
        assert_eq!(params.consensus_branch_id, 0xC8E7_1055);
        assert_eq!(params.pubkey_hash_prefix, &[0x1C, 0xB8]);
    }
}
