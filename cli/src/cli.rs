use std::path::PathBuf;

use comfy_client::params::ParamArgs;

/// Generate an image on a ComfyUI server and print its URL
#[derive(Debug, clap::Parser)]
pub struct Cli {
    /// ComfyUI server, e.g. http://127.0.0.1:8188
    #[arg(short, long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub client_id: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also fetch the image and write it here
    #[arg(short, long)]
    pub download: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParamArgs,
}
