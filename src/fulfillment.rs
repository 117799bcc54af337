//! Append-only fulfillment ledger.
//!
//! One tab-separated row per paid order, read by the shop staff:
//! order id, user id, total, delivery info, item summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::models::{format_cents, Order};

pub struct FulfillmentLedger {
    path: PathBuf,
}

impl FulfillmentLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one order. Free-text fields are flattened to keep the file
    /// one-row-per-order.
    pub async fn append(&self, order: &Order) -> Result<()> {
        let row = format!(
            "{}\t{}\t{}\t{}\t{}\n",
            order.id,
            order.user_id,
            format_cents(order.total_cents()),
            sanitize(&order.delivery_info),
            sanitize(&order.item_summary()),
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open ledger at {}", self.path.display()))?;
        file.write_all(row.as_bytes())
            .await
            .context("Failed to append to ledger")?;
        file.flush().await.context("Failed to flush ledger")?;

        info!(order_id = %order.id, "Fulfillment record appended");
        Ok(())
    }
}

fn sanitize(field: &str) -> String {
    field.replace(['\t', '\n', '\r'], " ")
}
