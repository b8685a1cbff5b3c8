//! Parameter tables consumed by the generator.
//!
//! Tables are comma separated with a header line. Lines that are empty or
//! whose first cell starts with `#` are comments. Columns are resolved by
//! header name except for the degree and transaction-type tables, which are
//! positional.

use crate::config::GeneratorConfig;
use crate::error::{GenError, GenResult};
use crate::normal_model::NormalModelKind;
use crate::types::{BankId, Step};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegreeRow {
    pub count: usize,
    pub in_degree: usize,
    pub out_degree: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountParamRow {
    pub count: usize,
    pub min_balance: f64,
    pub max_balance: f64,
    pub country: String,
    pub business_type: String,
    /// None falls back to the configured default bank.
    pub bank_id: Option<BankId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalModelParamRow {
    pub count: usize,
    pub kind: NormalModelKind,
    pub schedule_id: u32,
    pub min_accounts: usize,
    pub max_accounts: usize,
    pub min_period: Step,
    pub max_period: Step,
    pub bank_id: Option<BankId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertParamRow {
    pub count: usize,
    /// Raw typology name; unknown names are skipped by the injector.
    pub typology: String,
    pub schedule_id: u32,
    pub min_accounts: usize,
    pub max_accounts: usize,
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_period: Step,
    pub max_period: Step,
    /// None means members may come from any bank.
    pub bank_id: Option<BankId>,
    pub is_sar: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxTypeRow {
    pub ttype: String,
    pub frequency: u64,
}

// ── Table reader ────────────────────────────────────────────────────────────

struct ParamTable {
    name: &'static str,
    header: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl ParamTable {
    /// Cells are split on bare commas. Quoted fields are rejected rather
    /// than split through.
    fn parse(name: &'static str, text: &str, has_header: bool) -> GenResult<Self> {
        let mut header = Vec::new();
        let mut rows = Vec::new();
        let mut seen_header = !has_header;
        for (line_no, line) in text.lines().enumerate() {
            if line.contains('"') {
                return Err(GenError::InvalidRow {
                    table: name,
                    row: line_no + 1,
                    reason: "quoted fields are not supported".into(),
                });
            }
            let cells: Vec<String> = line.split(',').map(|c| c.trim().to_string()).collect();
            if !seen_header {
                header = cells;
                seen_header = true;
                continue;
            }
            if cells.iter().all(|c| c.is_empty()) || cells[0].starts_with('#') {
                continue;
            }
            rows.push((line_no + 1, cells));
        }
        Ok(Self { name, header, rows })
    }

    fn column(&self, column: &'static str) -> GenResult<usize> {
        self.optional_column(column)
            .ok_or(GenError::MissingColumn { table: self.name, column })
    }

    fn optional_column(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|h| h == column)
    }

    fn cell<'a>(&self, row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(String::as_str).unwrap_or("")
    }

    fn value<T: FromStr>(
        &self,
        line: usize,
        row: &[String],
        idx: usize,
        column: &'static str,
    ) -> GenResult<T> {
        let raw = self.cell(row, idx);
        raw.parse().map_err(|_| GenError::BadValue {
            table: self.name,
            row: line,
            column,
            value: raw.to_string(),
        })
    }
}

fn optional_bank(raw: &str) -> Option<BankId> {
    (!raw.is_empty()).then(|| raw.to_string())
}

fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

// ── Row parsers ─────────────────────────────────────────────────────────────

/// Positional `(count, in_degree, out_degree)` rows after a header line.
pub fn parse_degree_table(text: &str) -> GenResult<Vec<DegreeRow>> {
    let table = ParamTable::parse("degree table", text, true)?;
    table
        .rows
        .iter()
        .map(|(line, row)| {
            Ok(DegreeRow {
                count: table.value(*line, row, 0, "count")?,
                in_degree: table.value(*line, row, 1, "in_degree")?,
                out_degree: table.value(*line, row, 2, "out_degree")?,
            })
        })
        .collect()
}

pub fn parse_account_table(text: &str) -> GenResult<Vec<AccountParamRow>> {
    let table = ParamTable::parse("account table", text, true)?;
    let count = table.column("count")?;
    let min_balance = table.column("min_balance")?;
    let max_balance = table.column("max_balance")?;
    let country = table.column("country")?;
    let business = table.column("business_type")?;
    let bank = table.optional_column("bank_id");

    table
        .rows
        .iter()
        .map(|(line, row)| {
            let parsed = AccountParamRow {
                count: table.value(*line, row, count, "count")?,
                min_balance: table.value(*line, row, min_balance, "min_balance")?,
                max_balance: table.value(*line, row, max_balance, "max_balance")?,
                country: table.cell(row, country).to_string(),
                business_type: table.cell(row, business).to_string(),
                bank_id: bank.and_then(|idx| optional_bank(table.cell(row, idx))),
            };
            if parsed.min_balance > parsed.max_balance {
                return Err(GenError::InvalidRow {
                    table: table.name,
                    row: *line,
                    reason: format!(
                        "min_balance ({}) exceeds max_balance ({})",
                        parsed.min_balance, parsed.max_balance
                    ),
                });
            }
            Ok(parsed)
        })
        .collect()
}

pub fn parse_normal_model_table(text: &str) -> GenResult<Vec<NormalModelParamRow>> {
    let table = ParamTable::parse("normal model table", text, true)?;
    let count = table.column("count")?;
    let kind = table.column("type")?;
    let schedule = table.column("schedule_id")?;
    let min_accts = table.column("min_accounts")?;
    let max_accts = table.column("max_accounts")?;
    let min_period = table.column("min_period")?;
    let max_period = table.column("max_period")?;
    let bank = table.optional_column("bank_id");

    table
        .rows
        .iter()
        .map(|(line, row)| {
            let name = table.cell(row, kind);
            let kind = NormalModelKind::from_name(name)
                .ok_or_else(|| GenError::UnknownNormalModel { name: name.to_string() })?;
            Ok(NormalModelParamRow {
                count: table.value(*line, row, count, "count")?,
                kind,
                schedule_id: table.value(*line, row, schedule, "schedule_id")?,
                min_accounts: table.value(*line, row, min_accts, "min_accounts")?,
                max_accounts: table.value(*line, row, max_accts, "max_accounts")?,
                min_period: table.value(*line, row, min_period, "min_period")?,
                max_period: table.value(*line, row, max_period, "max_period")?,
                bank_id: bank.and_then(|idx| optional_bank(table.cell(row, idx))),
            })
        })
        .collect()
}

pub fn parse_alert_table(text: &str) -> GenResult<Vec<AlertParamRow>> {
    const KNOWN: [&str; 11] = [
        "count", "type", "schedule_id", "min_accounts", "max_accounts", "min_amount",
        "max_amount", "min_period", "max_period", "bank_id", "is_sar",
    ];
    let table = ParamTable::parse("alert pattern table", text, true)?;
    for name in &table.header {
        if !KNOWN.contains(&name.as_str()) {
            log::warn!("Unknown column name in alert pattern table: {name}");
        }
    }
    let count = table.column("count")?;
    let typology = table.column("type")?;
    let schedule = table.column("schedule_id")?;
    let min_accts = table.column("min_accounts")?;
    let max_accts = table.column("max_accounts")?;
    let min_amount = table.column("min_amount")?;
    let max_amount = table.column("max_amount")?;
    let min_period = table.column("min_period")?;
    let max_period = table.column("max_period")?;
    let bank = table.optional_column("bank_id");
    let sar = table.column("is_sar")?;

    table
        .rows
        .iter()
        .map(|(line, row)| {
            Ok(AlertParamRow {
                count: table.value(*line, row, count, "count")?,
                typology: table.cell(row, typology).to_string(),
                schedule_id: table.value(*line, row, schedule, "schedule_id")?,
                min_accounts: table.value(*line, row, min_accts, "min_accounts")?,
                max_accounts: table.value(*line, row, max_accts, "max_accounts")?,
                min_amount: table.value(*line, row, min_amount, "min_amount")?,
                max_amount: table.value(*line, row, max_amount, "max_amount")?,
                min_period: table.value(*line, row, min_period, "min_period")?,
                max_period: table.value(*line, row, max_period, "max_period")?,
                bank_id: bank.and_then(|idx| optional_bank(table.cell(row, idx))),
                is_sar: parse_flag(table.cell(row, sar)),
            })
        })
        .collect()
}

/// Positional `(type, frequency)` rows after a header line.
pub fn parse_tx_type_table(text: &str) -> GenResult<Vec<TxTypeRow>> {
    let table = ParamTable::parse("transaction type table", text, true)?;
    table
        .rows
        .iter()
        .map(|(line, row)| {
            Ok(TxTypeRow {
                ttype: table.cell(row, 0).to_string(),
                frequency: table.value(*line, row, 1, "frequency")?,
            })
        })
        .collect()
}

// ── Bundle ──────────────────────────────────────────────────────────────────

/// Every parameter table one generator run consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorInputs {
    pub degrees: Vec<DegreeRow>,
    pub accounts: Vec<AccountParamRow>,
    pub normal_models: Vec<NormalModelParamRow>,
    pub alert_patterns: Vec<AlertParamRow>,
    pub tx_types: Vec<TxTypeRow>,
}

impl GeneratorInputs {
    /// Load every table named in the `input` section of the config.
    pub fn load(config: &GeneratorConfig) -> anyhow::Result<Self> {
        let dir = Path::new(&config.input.directory);
        let read = |file: &str| -> anyhow::Result<String> {
            let path = dir.join(file);
            std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))
        };
        Ok(Self {
            degrees: parse_degree_table(&read(&config.input.degree)?)?,
            accounts: parse_account_table(&read(&config.input.accounts)?)?,
            normal_models: parse_normal_model_table(&read(&config.input.normal_models)?)?,
            alert_patterns: parse_alert_table(&read(&config.input.alert_patterns)?)?,
            tx_types: parse_tx_type_table(&read(&config.input.transaction_type)?)?,
        })
    }

    pub fn total_accounts(&self) -> usize {
        self.accounts.iter().map(|r| r.count).sum()
    }

    /// Small two-bank world for tests: 240 accounts, a 10-account degree
    /// tile with three hubs per tile at threshold 3.
    pub fn default_test() -> Self {
        let degrees = vec![
            DegreeRow { count: 1, in_degree: 5, out_degree: 5 },
            DegreeRow { count: 1, in_degree: 4, out_degree: 1 },
            DegreeRow { count: 1, in_degree: 1, out_degree: 4 },
            DegreeRow { count: 3, in_degree: 2, out_degree: 2 },
            DegreeRow { count: 4, in_degree: 1, out_degree: 1 },
        ];
        let accounts = vec![
            AccountParamRow {
                count: 120,
                min_balance: 1000.0,
                max_balance: 50000.0,
                country: "US".into(),
                business_type: "I".into(),
                bank_id: Some("bank_a".into()),
            },
            AccountParamRow {
                count: 120,
                min_balance: 1000.0,
                max_balance: 50000.0,
                country: "US".into(),
                business_type: "B".into(),
                bank_id: Some("bank_b".into()),
            },
        ];
        let normal = |count, kind| NormalModelParamRow {
            count,
            kind,
            schedule_id: 2,
            min_accounts: 2,
            max_accounts: 10,
            min_period: 1,
            max_period: 100,
            bank_id: None,
        };
        let normal_models = vec![
            normal(2, NormalModelKind::FanIn),
            normal(2, NormalModelKind::FanOut),
            normal(3, NormalModelKind::Forward),
            normal(6, NormalModelKind::Single),
            normal(2, NormalModelKind::Mutual),
            normal(2, NormalModelKind::Periodical),
        ];
        let alert = |count, typology: &str, min_accounts, max_accounts, is_sar| AlertParamRow {
            count,
            typology: typology.into(),
            schedule_id: 2,
            min_accounts,
            max_accounts,
            min_amount: 100.0,
            max_amount: 1000.0,
            min_period: 10,
            max_period: 20,
            bank_id: None,
            is_sar,
        };
        let alert_patterns = vec![
            alert(2, "fan_in", 3, 5, true),
            alert(2, "fan_out", 3, 5, true),
            alert(2, "cycle", 3, 5, true),
            alert(1, "bipartite", 4, 4, false),
            alert(1, "stack", 6, 6, true),
            alert(1, "random", 3, 4, true),
            alert(1, "scatter_gather", 5, 5, true),
            alert(1, "gather_scatter", 5, 5, true),
        ];
        let tx_types = vec![
            TxTypeRow { ttype: "TRANSFER".into(), frequency: 3 },
            TxTypeRow { ttype: "WIRE".into(), frequency: 1 },
        ];
        Self { degrees, accounts, normal_models, alert_patterns, tx_types }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_table_skips_header_and_comments() {
        let text = "count,in,out\n# tile\n2,1,1\n\n1,0,2\n";
        let rows = parse_degree_table(text).unwrap();
        assert_eq!(
            rows,
            vec![
                DegreeRow { count: 2, in_degree: 1, out_degree: 1 },
                DegreeRow { count: 1, in_degree: 0, out_degree: 2 },
            ]
        );
    }

    #[test]
    fn account_table_resolves_columns_by_name() {
        let text = "bank_id,count,country,business_type,max_balance,min_balance\n\
                    bank_a,10,US,I,200.5,100\n\
                    ,5,JP,B,300,300\n";
        let rows = parse_account_table(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].count, 10);
        assert_eq!(rows[0].bank_id.as_deref(), Some("bank_a"));
        assert_eq!(rows[0].max_balance, 200.5);
        assert_eq!(rows[1].bank_id, None);
        assert_eq!(rows[1].country, "JP");
    }

    #[test]
    fn missing_column_is_reported() {
        let text = "count,min_balance,max_balance,country\n1,1,2,US\n";
        let err = parse_account_table(text).unwrap_err();
        assert!(matches!(
            err,
            GenError::MissingColumn { column: "business_type", .. }
        ));
    }

    #[test]
    fn bad_value_names_row_and_column() {
        let text = "count,in,out\n1,x,1\n";
        match parse_degree_table(text).unwrap_err() {
            GenError::BadValue { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "in_degree");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quoted_fields_are_rejected() {
        let text = "bank_id,count,country,business_type,max_balance,min_balance\n\
                    bank_a,10,US,I,200.5,100\n\
                    \"bank,b\",5,JP,B,300,300\n";
        match parse_account_table(text).unwrap_err() {
            GenError::InvalidRow { table, row, .. } => {
                assert_eq!(table, "account table");
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_normal_model_type_is_fatal() {
        let text = "count,type,schedule_id,min_accounts,max_accounts,min_period,max_period,bank_id\n\
                    1,zigzag,2,2,3,1,10,\n";
        assert!(matches!(
            parse_normal_model_table(text),
            Err(GenError::UnknownNormalModel { .. })
        ));
    }

    #[test]
    fn alert_table_keeps_unknown_typology_names() {
        let text = "count,type,schedule_id,min_accounts,max_accounts,min_amount,max_amount,min_period,max_period,bank_id,is_sar\n\
                    3,fan_in,1,3,5,100,200,5,10,,True\n\
                    1,zigzag,1,3,5,100,200,5,10,bank_a,false\n";
        let rows = parse_alert_table(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_sar);
        assert_eq!(rows[0].bank_id, None);
        assert_eq!(rows[1].typology, "zigzag");
        assert!(!rows[1].is_sar);
    }
}
