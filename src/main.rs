use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use wallet_client::api::{HistoryQuery, TopUpRequest, TransferRequest};
use wallet_client::config::{ApiConfig, Config, LogConfig};
use wallet_client::{ApiClient, ApiError};

#[derive(Parser, Debug)]
#[command(name = "wallet-client")]
#[command(about = "Query and operate wallets from the command line")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wallet-client/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding the config file
  #[arg(long)]
  base_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List the signed-in user's wallets
  Wallets,
  /// Show one wallet's balance
  Balance { wallet_id: String },
  /// Page through transaction history
  History {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 20)]
    limit: u32,
    /// Only transactions of this type
    #[arg(long = "type")]
    kind: Option<String>,
  },
  /// Most recent transactions
  Recent {
    #[arg(long, default_value_t = 5)]
    limit: u32,
  },
  /// List saved payment methods
  PaymentMethods,
  /// List contacts
  Contacts,
  /// Top up a wallet from a payment method
  TopUp {
    #[arg(long)]
    wallet: String,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    method: String,
  },
  /// Move funds between wallets
  Transfer {
    #[arg(long)]
    from: String,
    #[arg(long)]
    to: String,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    note: Option<String>,
  },
  /// Show a payment's status, optionally waiting until it settles
  PaymentStatus {
    payment_id: String,
    #[arg(long)]
    wait: bool,
    #[arg(long, default_value_t = 2)]
    interval_secs: u64,
    #[arg(long, default_value_t = 30)]
    max_polls: usize,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override base URL if specified on command line
  let config = if let Some(base_url) = args.base_url {
    Config {
      api: ApiConfig {
        base_url,
        ..config.api
      },
      ..config
    }
  } else {
    config
  };

  // Held until exit so buffered log lines are flushed
  let _log_guard = init_tracing(&config.log)?;

  let client = ApiClient::from_config(&config.api)?;
  let output = run(&client, args.command).await.map_err(|e| match e {
    ApiError::AuthExpired => {
      eyre!("Session expired. Sign in again and export WALLET_CLIENT_SESSION.")
    }
    other => other.into(),
  })?;

  println!("{}", output);
  Ok(())
}

async fn run(client: &ApiClient, command: Command) -> Result<String, ApiError> {
  match command {
    Command::Wallets => to_json(&client.wallets().user_wallets().await?.data),
    Command::Balance { wallet_id } => to_json(&client.wallets().balance(&wallet_id).await?.data),
    Command::History { page, limit, kind } => {
      let query = HistoryQuery { page, limit, kind };
      to_json(&client.wallets().history(&query).await?.data)
    }
    Command::Recent { limit } => to_json(&client.wallets().recent_transactions(limit).await?.data),
    Command::PaymentMethods => to_json(&client.payment_methods().list().await?.data),
    Command::Contacts => to_json(&client.contacts().list().await?.data),
    Command::TopUp {
      wallet,
      amount,
      method,
    } => {
      let top_up = TopUpRequest {
        wallet_id: wallet,
        amount,
        payment_method_id: method,
      };
      to_json(&client.wallets().top_up(&top_up).await?)
    }
    Command::Transfer {
      from,
      to,
      amount,
      note,
    } => {
      let transfer = TransferRequest {
        from_wallet_id: from,
        to_wallet_id: to,
        amount,
        note,
      };
      to_json(&client.wallets().transfer(&transfer).await?)
    }
    Command::PaymentStatus {
      payment_id,
      wait,
      interval_secs,
      max_polls,
    } => {
      if wait {
        let status = client
          .payments()
          .wait_for_settlement(&payment_id, Duration::from_secs(interval_secs), max_polls)
          .await?;
        to_json(&status)
      } else {
        to_json(&client.payments().status(&payment_id).await?.data)
      }
    }
  }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
  serde_json::to_string_pretty(value).map_err(|e| ApiError::Decode {
    operation: "output",
    message: e.to_string(),
  })
}

/// Install the global subscriber; file output goes through a non-blocking writer.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_env("WALLET_CLIENT_LOG")
    .or_else(|_| EnvFilter::try_new(log.level.as_deref().unwrap_or("info")))
    .map_err(|e| eyre!("Invalid log filter: {}", e))?;

  match &log.file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(dir, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}
