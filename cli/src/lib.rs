use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use comfy_client::{ClientConfig, GenerationParams, TranslationCredentials};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::cli::Cli;

pub mod cli;

pub const MISSING_BASE_URL_HINT: &str = indoc::indoc! {"
    No ComfyUI server configured. Pass --base-url or set `base_url` in the
    config file, e.g.

        (base_url: \"http://127.0.0.1:8188\")
"};

/// Contents of `comfy_gen.ron`. Every field is optional, command line flags win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub client_id: Option<String>,
    pub translate_app_id: Option<String>,
    pub translate_app_key: Option<String>,
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    Ok(ron::from_str(&src)?)
}

pub fn save_ron_file<T: Serialize>(path: &Path, x: &T) -> Result<()> {
    Ok(fs::write(path, ron::to_string(x)?)?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(dirs::config_local_dir()
        .ok_or(eyre!("Couldn't get config dir"))?
        .join("comfy_gen.ron"))
}

/// Loads `explicit` if given, otherwise the default config file. Only a
/// missing default file yields `None`.
pub fn load_config(explicit: Option<&Path>) -> Result<Option<Config>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path()?;
            if !path.exists() {
                return Ok(None);
            }
            path
        }
    };

    load_ron_file(&path)
        .with_context(|| format!("reading config {}", path.display()))
        .map(Some)
}

/// Merges command line arguments over the config file.
pub fn resolve(cli: Cli, cfg: Config) -> (ClientConfig, GenerationParams) {
    let Cli {
        base_url,
        client_id,
        mut params,
        ..
    } = cli;

    let translation = TranslationCredentials::from_parts(
        params.translate_app_id.take().or(cfg.translate_app_id),
        params.translate_app_key.take().or(cfg.translate_app_key),
    );

    let client_cfg = ClientConfig {
        base_url: base_url.unwrap_or(cfg.base_url),
        client_id: client_id.or(cfg.client_id),
    };

    let params = GenerationParams {
        translation,
        ..params.into_params()
    };

    (client_cfg, params)
}

/// Fetches the finished image, returns the number of bytes written.
pub async fn download_image(client: &reqwest::Client, url: &str, path: &Path) -> Result<usize> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(bytes.len())
}
