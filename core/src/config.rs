use crate::error::{GenError, GenResult};
use crate::types::{BankId, Step};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MARGIN_RATIO: f64 = 0.1;
pub const DEFAULT_BANK_ID: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub simulation_name: String,
    pub total_steps: Step,
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Fallback values applied when a parameter table leaves a field empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub min_amount: Option<f64>,
    #[serde(default)]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub min_balance: Option<f64>,
    #[serde(default)]
    pub max_balance: Option<f64>,
    #[serde(default)]
    pub start_step: Option<i64>,
    #[serde(default)]
    pub end_step: Option<i64>,
    #[serde(default)]
    pub start_range: Option<i64>,
    #[serde(default)]
    pub end_range: Option<i64>,
    #[serde(default = "default_margin_ratio")]
    pub margin_ratio: f64,
    #[serde(default = "default_bank_id")]
    pub bank_id: BankId,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            min_amount: None,
            max_amount: None,
            min_balance: None,
            max_balance: None,
            start_step: None,
            end_step: None,
            start_range: None,
            end_range: None,
            margin_ratio: DEFAULT_MARGIN_RATIO,
            bank_id: DEFAULT_BANK_ID.into(),
        }
    }
}

fn default_margin_ratio() -> f64 {
    DEFAULT_MARGIN_RATIO
}

fn default_bank_id() -> BankId {
    DEFAULT_BANK_ID.into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub directory: String,
    pub accounts: String,
    pub alert_patterns: String,
    pub normal_models: String,
    pub degree: String,
    pub transaction_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub transactions: String,
    pub accounts: String,
    pub alert_members: String,
    pub normal_models: String,
    #[serde(default = "default_summary_file")]
    pub summary: String,
}

fn default_summary_file() -> String {
    "summary.json".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphGeneratorConfig {
    /// Minimum in- or out-degree for hub (main account) candidates.
    pub degree_threshold: usize,
    /// Accepted so existing config files load. Not read by any stage.
    #[serde(default)]
    pub high_risk_countries: String,
    /// Accepted so existing config files load. Not read by any stage.
    #[serde(default)]
    pub high_risk_business: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub default: DefaultsConfig,
    pub input: InputConfig,
    #[serde(rename = "temporal")]
    pub output: OutputConfig,
    pub graph_generator: GraphGeneratorConfig,
    /// Validation-only threshold for fan pattern counts (`DEGREE` env var).
    #[serde(skip)]
    pub validation_threshold: Option<usize>,
}

impl GeneratorConfig {
    /// Load from a JSON configuration file.
    /// In tests, use GeneratorConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config: GeneratorConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `RANDOM_SEED` replaces the configured seed; `DEGREE` enables
    /// fan pattern counting at the given threshold.
    pub fn apply_env_overrides(&mut self) -> GenResult<()> {
        if let Ok(seed) = std::env::var("RANDOM_SEED") {
            let seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|_| GenError::InvalidConfig(format!("RANDOM_SEED '{seed}' is not a u64")))?;
            self.general.random_seed = Some(seed);
        }
        if let Ok(degree) = std::env::var("DEGREE") {
            let degree = degree
                .trim()
                .parse::<usize>()
                .map_err(|_| GenError::InvalidConfig(format!("DEGREE '{degree}' is not an integer")))?;
            self.validation_threshold = (degree > 0).then_some(degree);
        }
        Ok(())
    }

    pub fn validate(&self) -> GenResult<()> {
        let ratio = self.default.margin_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(GenError::InvalidMarginRatio { ratio });
        }
        if self.general.total_steps == 0 {
            return Err(GenError::InvalidConfig("total_steps must be positive".into()));
        }
        if self.graph_generator.degree_threshold == 0 {
            return Err(GenError::InvalidConfig("degree_threshold must be positive".into()));
        }
        if let (Some(lo), Some(hi)) = (self.default.min_balance, self.default.max_balance) {
            if lo > hi {
                return Err(GenError::InvalidConfig(format!(
                    "default min_balance ({lo}) exceeds max_balance ({hi})"
                )));
            }
        }
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.general.random_seed.unwrap_or(0)
    }

    pub fn total_steps(&self) -> Step {
        self.general.total_steps
    }

    pub fn degree_threshold(&self) -> usize {
        self.graph_generator.degree_threshold
    }

    pub fn margin_ratio(&self) -> f64 {
        self.default.margin_ratio
    }

    /// `(step, range)` pairs for account opening and closing.
    /// A side is None unless both of its values are positive.
    pub fn account_window(&self) -> (Option<(Step, Step)>, Option<(Step, Step)>) {
        let positive = |v: Option<i64>| v.filter(|v| *v > 0).map(|v| v as Step);
        let open = positive(self.default.start_step).zip(positive(self.default.start_range));
        let close = positive(self.default.end_step).zip(positive(self.default.end_range));
        (open, close)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            general: GeneralConfig {
                simulation_name: "test".into(),
                total_steps: 100,
                random_seed: Some(0),
            },
            default: DefaultsConfig {
                min_amount: Some(100.0),
                max_amount: Some(1000.0),
                min_balance: Some(1000.0),
                max_balance: Some(50000.0),
                ..DefaultsConfig::default()
            },
            input: InputConfig {
                directory: "paramFiles/test".into(),
                accounts: "accounts.csv".into(),
                alert_patterns: "alertPatterns.csv".into(),
                normal_models: "normalModels.csv".into(),
                degree: "degree.csv".into(),
                transaction_type: "transactionType.csv".into(),
            },
            output: OutputConfig {
                directory: "tmp".into(),
                transactions: "transactions.csv".into(),
                accounts: "accounts.csv".into(),
                alert_members: "alert_members.csv".into(),
                normal_models: "normal_models.csv".into(),
                summary: default_summary_file(),
            },
            graph_generator: GraphGeneratorConfig {
                degree_threshold: 3,
                high_risk_countries: String::new(),
                high_risk_business: String::new(),
            },
            validation_threshold: None,
        }
    }
}
