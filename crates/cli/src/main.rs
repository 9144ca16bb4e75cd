//! # txauth CLI
//!
//! トランザクション承認コアのコマンドラインホスト。
//!
//! ## サブコマンド
//! - `validate`: トランザクション要求ファイルを検証ゲートにかける
//! - `propose`: ジョイントアカウントの署名提案を作成・送信する
//! - `respond`: 他の参加者の署名依頼に承認または拒否で回答する
//! - `cancel`: 自分が作成した署名依頼を取り消す
//! - `status`: 署名依頼の進捗を表示する（`--watch` で終端まで監視）
//! - `address` / `keygen`: アドレスの検査と鍵生成
//!
//! 接続先は環境変数（`TXAUTH_*`）から読み込み、グローバルオプションで上書きできる。

mod commands;
mod keystore;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use txauth_client::ClientConfig;
use txauth_core::SignDecision;
use txauth_types::Network;

#[derive(Parser, Debug)]
#[command(name = "txauth-cli")]
#[command(about = "Transaction authorization core CLI", long_about = None)]
struct Cli {
    /// Network override (mainnet, testnet)
    #[arg(long, global = true)]
    network: Option<Network>,

    /// algod URL override
    #[arg(long, global = true)]
    algod_url: Option<String>,

    /// Coordination service URL override
    #[arg(long, global = true)]
    coordinator_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a JSON array of proposed transactions
    Validate {
        #[arg(long)]
        transactions: PathBuf,
        #[arg(long)]
        accounts: PathBuf,
    },
    /// Propose a joint-account transaction
    Propose {
        #[arg(long)]
        accounts: PathBuf,
        #[arg(long)]
        keystore: PathBuf,
        /// Joint account address
        #[arg(long)]
        joint: String,
        /// JSON file with the transaction intent
        #[arg(long)]
        intent: PathBuf,
        /// Reuse cached chain parameters
        #[arg(long)]
        cached_params: bool,
    },
    /// Respond to a sign request
    Respond {
        #[arg(long)]
        accounts: PathBuf,
        #[arg(long)]
        keystore: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long, value_enum)]
        decision: Decision,
    },
    /// Cancel a sign request as its proposer
    Cancel {
        #[arg(long)]
        accounts: PathBuf,
        #[arg(long)]
        keystore: PathBuf,
        #[arg(long)]
        id: String,
    },
    /// Show sign request progress
    Status {
        #[arg(long)]
        id: String,
        /// Poll until the request settles
        #[arg(long)]
        watch: bool,
        /// Poll interval in seconds
        #[arg(long, default_value_t = txauth_core::DEFAULT_POLL_INTERVAL.as_secs())]
        interval: u64,
    },
    /// Check an address and print its public key
    Address { address: String },
    /// Generate a new key (base64 seed for the keystore file)
    Keygen,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Decision {
    Confirm,
    Decline,
}

impl From<Decision> for SignDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Confirm => SignDecision::Confirm,
            Decision::Decline => SignDecision::Decline,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(network) = cli.network {
        // ネットワークだけ変えた場合はalgodの既定URLも追従させる
        if cli.algod_url.is_none() && std::env::var("TXAUTH_ALGOD_URL").is_err() {
            config.algod_url = txauth_client::config::default_algod_url(network).to_string();
        }
        config.network = network;
    }
    if let Some(url) = &cli.algod_url {
        config.algod_url = url.clone();
    }
    if let Some(url) = &cli.coordinator_url {
        config.coordinator_url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(
        network = %config.network,
        algod = %config.algod_url,
        coordinator = %config.coordinator_url,
        "設定を読み込みました"
    );

    match cli.command {
        Command::Validate {
            transactions,
            accounts,
        } => {
            if !commands::validate(&config, &transactions, &accounts)? {
                return Ok(ExitCode::from(2));
            }
        }
        Command::Propose {
            accounts,
            keystore,
            joint,
            intent,
            cached_params,
        } => {
            commands::propose(&config, &accounts, &keystore, &joint, &intent, cached_params).await?;
        }
        Command::Respond {
            accounts,
            keystore,
            id,
            decision,
        } => {
            commands::respond(&config, &accounts, &keystore, &id, decision.into()).await?;
        }
        Command::Cancel {
            accounts,
            keystore,
            id,
        } => {
            commands::cancel_proposal(&config, &accounts, &keystore, &id).await?;
        }
        Command::Status {
            id,
            watch,
            interval,
        } => {
            let interval = watch.then(|| Duration::from_secs(interval.max(1)));
            commands::status(&config, &id, interval).await?;
        }
        Command::Address { address } => {
            let decoded: txauth_crypto::Address = address.parse()?;
            commands::print_json(&serde_json::json!({
                "address": decoded.encode(),
                "public_key": hex::encode(decoded.public_key()),
            }))?;
        }
        Command::Keygen => {
            let (address, seed) = keystore::generate();
            commands::print_json(&serde_json::json!({ "address": address, "seed": seed }))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
