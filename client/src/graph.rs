use std::collections::BTreeMap;

use serde::Serialize;

use crate::params::NormalizedParams;

mod stage;
pub use stage::{Stage, StageRef, TextInput};

pub const ZERO_CONDITIONING: &str = "4";
pub const DECODE: &str = "5";
pub const SAVE_IMAGE: &str = "8";
pub const SAMPLER: &str = "15";
pub const MODEL_LOADER: &str = "17";
pub const TEXT_ENCODER_LOADER: &str = "18";
pub const DECODER_LOADER: &str = "19";
pub const LATENT_IMAGE: &str = "20";
pub const TEXT_ENCODER: &str = "21";
pub const TRANSLATE: &str = "24";

pub const FILENAME_PREFIX: &str = "comfy_ui_generated";
const SAMPLER_NAME: &str = "euler";
const SCHEDULER: &str = "beta";
const UNET_NAME: &str = r"flux\flux1-dev.safetensors";
const UNET_WEIGHT_DTYPE: &str = "fp8_e4m3fn";
const CLIP_NAME_T5: &str = r"flux\t5xxl_fp8_e4m3fn.safetensors";
const CLIP_NAME_L: &str = r"flux\clip_l.safetensors";
const VAE_NAME: &str = r"flux\ae.safetensors";
const TRANSLATE_TARGET: &str = "en";

/// The Flux text-to-image graph, keyed by stage id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobGraph(BTreeMap<&'static str, Stage>);

impl JobGraph {
    pub fn get(&self, id: &str) -> Option<&Stage> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Stage)> {
        self.0.iter().map(|(id, stage)| (*id, stage))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds the fixed text-to-image graph. With translation credentials a
/// translation stage is put in front of the text encoder, otherwise the
/// encoder reads the prompt directly.
pub fn build_job_graph(params: &NormalizedParams) -> JobGraph {
    let mut stages = BTreeMap::new();

    let text = match &params.translation {
        Some(creds) => {
            stages.insert(
                TRANSLATE,
                Stage::BaiduTranslate {
                    from_translate: "auto".into(),
                    to_translate: TRANSLATE_TARGET.into(),
                    text: params.prompt.clone(),
                    baidu_appid: creds.app_id.clone(),
                    baidu_appkey: creds.app_key.clone(),
                },
            );
            TextInput::Stage(StageRef::first(TRANSLATE))
        }
        None => TextInput::Literal(params.prompt.clone()),
    };

    stages.insert(
        TEXT_ENCODER,
        Stage::ClipTextEncode {
            text,
            clip: StageRef::first(TEXT_ENCODER_LOADER),
        },
    );
    stages.insert(
        ZERO_CONDITIONING,
        Stage::ConditioningZeroOut {
            conditioning: StageRef::first(TEXT_ENCODER),
        },
    );
    stages.insert(
        LATENT_IMAGE,
        Stage::EmptyLatentImage {
            width: params.width,
            height: params.height,
            batch_size: 1,
        },
    );
    stages.insert(
        SAMPLER,
        Stage::KSampler {
            seed: params.seed,
            steps: params.steps,
            cfg: params.cfg,
            sampler_name: SAMPLER_NAME.into(),
            scheduler: SCHEDULER.into(),
            denoise: 1.,
            model: StageRef::first(MODEL_LOADER),
            positive: StageRef::first(TEXT_ENCODER),
            negative: StageRef::first(ZERO_CONDITIONING),
            latent_image: StageRef::first(LATENT_IMAGE),
        },
    );
    stages.insert(
        DECODE,
        Stage::VaeDecode {
            samples: StageRef::first(SAMPLER),
            vae: StageRef::first(DECODER_LOADER),
        },
    );
    stages.insert(
        SAVE_IMAGE,
        Stage::SaveImage {
            filename_prefix: FILENAME_PREFIX.into(),
            images: StageRef::first(DECODE),
        },
    );

    // loaders
    stages.insert(
        MODEL_LOADER,
        Stage::UnetLoader {
            unet_name: UNET_NAME.into(),
            weight_dtype: UNET_WEIGHT_DTYPE.into(),
        },
    );
    stages.insert(
        TEXT_ENCODER_LOADER,
        Stage::DualClipLoader {
            clip_name1: CLIP_NAME_T5.into(),
            clip_name2: CLIP_NAME_L.into(),
            clip_type: "flux".into(),
            device: "default".into(),
        },
    );
    stages.insert(
        DECODER_LOADER,
        Stage::VaeLoader {
            vae_name: VAE_NAME.into(),
        },
    );

    JobGraph(stages)
}
