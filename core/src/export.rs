//! Output tables.
//!
//! RULE: Nothing here is called until the whole run has succeeded, so a
//! failed run never leaves partial tables behind.

use crate::config::OutputConfig;
use crate::engine::GeneratedDataset;
use crate::error::GenResult;
use crate::graph::TransactionGraph;
use crate::normal_model::NormalModel;
use crate::typology::AlertSubgraph;
use crate::types::{AccountId, EdgeId, Step};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// A row of one of the flat output tables.
pub trait TableRow {
    const HEADER: &'static [&'static str];

    fn fields(&self) -> Vec<String>;
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn write_table<W: Write, R: TableRow>(out: &mut W, rows: &[R]) -> GenResult<()> {
    writeln!(out, "{}", R::HEADER.join(","))?;
    for row in rows {
        let line: Vec<String> = row.fields().iter().map(|f| escape(f)).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}

// ── Accounts ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRow {
    pub account_id: AccountId,
    pub customer_id: String,
    pub init_balance: f64,
    pub country: String,
    pub account_type: String,
    pub is_sar: bool,
    pub bank_id: String,
}

impl TableRow for AccountRow {
    const HEADER: &'static [&'static str] =
        &["ACCOUNT_ID", "CUSTOMER_ID", "INIT_BALANCE", "COUNTRY", "ACCOUNT_TYPE", "IS_SAR", "BANK_ID"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.account_id.to_string(),
            self.customer_id.clone(),
            format!("{:.2}", self.init_balance),
            self.country.clone(),
            self.account_type.clone(),
            self.is_sar.to_string(),
            self.bank_id.clone(),
        ]
    }
}

pub fn account_rows(graph: &TransactionGraph) -> Vec<AccountRow> {
    graph
        .accounts()
        .iter()
        .map(|a| AccountRow {
            account_id: a.id,
            customer_id: a.customer_id(),
            init_balance: a.init_balance,
            country: a.country.clone(),
            account_type: a.business_type.clone(),
            is_sar: a.is_sar,
            bank_id: a.bank_id.clone(),
        })
        .collect()
}

// ── Transactions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: EdgeId,
    pub src: AccountId,
    pub dst: AccountId,
    pub ttype: String,
}

impl TableRow for TransactionRow {
    const HEADER: &'static [&'static str] = &["id", "src", "dst", "ttype"];

    fn fields(&self) -> Vec<String> {
        vec![self.id.to_string(), self.src.to_string(), self.dst.to_string(), self.ttype.clone()]
    }
}

/// Active edges only, in edge id order.
pub fn transaction_rows(graph: &TransactionGraph) -> Vec<TransactionRow> {
    graph
        .active_edges()
        .map(|e| TransactionRow {
            id: e.id,
            src: e.orig,
            dst: e.bene,
            ttype: e.tx_type.clone().unwrap_or_default(),
        })
        .collect()
}

// ── Alert members ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMemberRow {
    pub alert_id: u64,
    pub reason: String,
    pub account_id: AccountId,
    pub is_main: bool,
    pub is_sar: bool,
    pub model_id: u32,
    pub min_amount: f64,
    pub max_amount: f64,
    pub start_step: Step,
    pub end_step: Step,
    pub schedule_id: u32,
    pub bank_id: String,
}

impl TableRow for AlertMemberRow {
    const HEADER: &'static [&'static str] = &[
        "alertID", "reason", "accountID", "isMain", "isSAR", "modelID", "minAmount", "maxAmount",
        "startStep", "endStep", "scheduleID", "bankID",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.alert_id.to_string(),
            self.reason.clone(),
            self.account_id.to_string(),
            self.is_main.to_string(),
            self.is_sar.to_string(),
            self.model_id.to_string(),
            format!("{:.2}", self.min_amount),
            format!("{:.2}", self.max_amount),
            self.start_step.to_string(),
            self.end_step.to_string(),
            self.schedule_id.to_string(),
            self.bank_id.clone(),
        ]
    }
}

/// One row per member. Amount bounds cover the edges touching the member.
pub fn alert_member_rows(alerts: &[AlertSubgraph]) -> Vec<AlertMemberRow> {
    let mut rows = Vec::new();
    for alert in alerts {
        for (&account, bank) in &alert.members {
            let (min_amount, max_amount) = alert.amount_range(account).unwrap_or((0.0, 0.0));
            rows.push(AlertMemberRow {
                alert_id: alert.alert_id,
                reason: alert.kind.name().to_string(),
                account_id: account,
                is_main: account == alert.main,
                is_sar: alert.is_sar,
                model_id: alert.model_id,
                min_amount,
                max_amount,
                start_step: alert.start,
                end_step: alert.end,
                schedule_id: alert.schedule_id,
                bank_id: bank.clone(),
            });
        }
    }
    rows
}

// ── Normal models ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalModelRow {
    pub model_id: u64,
    pub kind: String,
    pub account_id: AccountId,
    pub is_main: bool,
    pub is_sar: bool,
    pub schedule_id: u32,
}

impl TableRow for NormalModelRow {
    const HEADER: &'static [&'static str] = &["modelID", "type", "accountID", "isMain", "isSAR", "scheduleID"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.model_id.to_string(),
            self.kind.clone(),
            self.account_id.to_string(),
            self.is_main.to_string(),
            self.is_sar.to_string(),
            self.schedule_id.to_string(),
        ]
    }
}

pub fn normal_model_rows(models: &[NormalModel]) -> Vec<NormalModelRow> {
    models
        .iter()
        .flat_map(|m| {
            m.members.iter().map(move |&account| NormalModelRow {
                model_id: m.id,
                kind: m.kind.name().to_string(),
                account_id: account,
                is_main: m.is_main(account),
                is_sar: false,
                schedule_id: m.schedule_id,
            })
        })
        .collect()
}

// ── Dataset ─────────────────────────────────────────────────────────────────

fn write_file<R: TableRow>(dir: &Path, file: &str, rows: &[R]) -> GenResult<()> {
    let path = dir.join(file);
    let mut out = std::io::BufWriter::new(std::fs::File::create(&path)?);
    write_table(&mut out, rows)?;
    out.flush()?;
    log::info!("export: wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write all four tables plus the summary JSON into `dir`.
pub fn write_dataset(dir: &Path, output: &OutputConfig, dataset: &GeneratedDataset) -> GenResult<()> {
    std::fs::create_dir_all(dir)?;
    write_file(dir, &output.accounts, &account_rows(&dataset.graph))?;
    write_file(dir, &output.transactions, &transaction_rows(&dataset.graph))?;
    write_file(dir, &output.alert_members, &alert_member_rows(&dataset.alerts))?;
    write_file(dir, &output.normal_models, &normal_model_rows(&dataset.normal_models))?;
    std::fs::write(dir.join(&output.summary), dataset.summary.to_json()?)?;
    Ok(())
}
