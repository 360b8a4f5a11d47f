use clap::Parser;
use color_eyre::{Result, eyre::WrapErr as _};
use comfy_client::{ComfyClient, GenerateError};
use comfy_gen::{
    Config, MISSING_BASE_URL_HINT, cli::Cli, config_path, download_image, load_config, resolve,
};
use log::info;

#[tokio::main]
pub async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let cli = Cli::parse();
    let cfg = match load_config(cli.config.as_deref())? {
        Some(cfg) => cfg,
        None => {
            info!("no config file at {}, using defaults", config_path()?.display());
            Config::default()
        }
    };

    let download = cli.download.clone();
    let (client_cfg, params) = resolve(cli, cfg);
    let url = match ComfyClient::new(client_cfg).generate(params).await {
        Err(e @ GenerateError::MissingBaseUrl) => return Err(e).wrap_err(MISSING_BASE_URL_HINT),
        res => res?,
    };
    println!("{url}");

    if let Some(path) = download {
        let n_bytes = download_image(&reqwest::Client::new(), &url, &path).await?;
        info!("Saved image to {}, {n_bytes} bytes", path.display());
    }

    Ok(())
}
