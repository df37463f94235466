//! Status Command
//!
//! Queries the gateway for out-of-band transaction confirmation.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use permaweave_client::{Network, TransactionId, TxStatus};

/// Run status command
pub async fn run(network: &dyn Network, tx_id: &str) -> Result<()> {
    let id = TransactionId::from_encoded(tx_id);

    let status = network
        .status(&id)
        .await
        .context("Failed to query transaction status")?;

    match status {
        TxStatus::Pending => {
            println!(
                "{} Transaction {} is pending",
                style(symbols::INFO).cyan(),
                id
            );
        }
        TxStatus::Accepted { confirmations } => {
            println!(
                "{} Transaction {} accepted ({} confirmations)",
                style(symbols::CHECK).green(),
                id,
                confirmations
            );
        }
        TxStatus::NotFound => {
            println!(
                "{} Transaction {} not found",
                style(symbols::CROSS).red(),
                id
            );
        }
    }

    Ok(())
}
