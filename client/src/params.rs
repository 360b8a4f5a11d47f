use std::time::{SystemTime, UNIX_EPOCH};

pub const DEFAULT_WIDTH: u32 = 1080;
pub const DEFAULT_HEIGHT: u32 = 1920;
pub const DEFAULT_STEPS: u32 = 25;
pub const DEFAULT_CFG: f64 = 1.0;

/// Time derived seeds stay below this bound.
pub const SEED_BOUND: u64 = 100_000_000_000_000;

/// Parameters of a single text-to-image generation.
///
/// Zero (or, for `cfg`, non-positive) values mean "unset" and are replaced by
/// the defaults in [`GenerationParams::normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub seed: u64,
    pub translation: Option<TranslationCredentials>,
}

/// Credentials for the Baidu translation stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationCredentials {
    pub app_id: String,
    pub app_key: String,
}

impl TranslationCredentials {
    /// Only yields credentials when both halves are present and non-empty.
    pub fn from_parts(app_id: Option<String>, app_key: Option<String>) -> Option<Self> {
        match (app_id, app_key) {
            (Some(app_id), Some(app_key)) if !app_id.is_empty() && !app_key.is_empty() => {
                Some(Self { app_id, app_key })
            }
            _ => None,
        }
    }
}

/// Parameters with every default applied. Only [`GenerationParams::normalize`]
/// creates these.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg: f64,
    pub seed: u64,
    pub translation: Option<TranslationCredentials>,
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn normalize(self) -> NormalizedParams {
        let GenerationParams {
            prompt,
            width,
            height,
            steps,
            cfg,
            seed,
            translation,
        } = self;

        NormalizedParams {
            prompt,
            width: or_default(width, DEFAULT_WIDTH),
            height: or_default(height, DEFAULT_HEIGHT),
            steps: or_default(steps, DEFAULT_STEPS),
            cfg: if cfg.is_nan() || cfg <= 0. { DEFAULT_CFG } else { cfg },
            seed: if seed == 0 { time_seed() } else { seed },
            translation,
        }
    }
}

fn or_default(value: u32, default: u32) -> u32 {
    if value == 0 { default } else { value }
}

fn time_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    ((nanos % SEED_BOUND as u128) as u64).max(1)
}

/// Command line form of [`GenerationParams`], shared by the binaries.
#[derive(Debug, Clone, clap::Args)]
pub struct ParamArgs {
    /// Text prompt describing the image
    pub prompt: String,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    pub width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    pub height: u32,

    #[arg(long, default_value_t = DEFAULT_STEPS)]
    pub steps: u32,

    /// Guidance scale
    #[arg(long, default_value_t = DEFAULT_CFG)]
    pub cfg: f64,

    /// 0 picks a time based seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long)]
    pub translate_app_id: Option<String>,

    #[arg(long)]
    pub translate_app_key: Option<String>,
}

impl ParamArgs {
    pub fn into_params(self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt,
            width: self.width,
            height: self.height,
            steps: self.steps,
            cfg: self.cfg,
            seed: self.seed,
            translation: TranslationCredentials::from_parts(
                self.translate_app_id,
                self.translate_app_key,
            ),
        }
    }
}
