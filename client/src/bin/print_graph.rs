use clap::Parser;
use color_eyre::Result;
use comfy_client::{build_job_graph, params::ParamArgs};

/// Prints the job graph that would be submitted for the given parameters
#[derive(clap::Parser)]
struct Arg {
    #[command(flatten)]
    params: ParamArgs,
}

pub fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init();
    let Arg { params } = Arg::parse();

    let graph = build_job_graph(&params.into_params().normalize());
    for (id, stage) in graph.iter() {
        log::debug!("stage {id}: {}", stage.class_type());
    }

    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}
