use serde::Serialize;
use strum::IntoStaticStr;

/// Reference to output `.1` of the stage with id `.0`. Serializes as `["21", 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageRef(pub &'static str, pub u32);

impl StageRef {
    pub const fn first(stage_id: &'static str) -> Self {
        Self(stage_id, 0)
    }
}

/// A text input is either typed in directly or produced by another stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TextInput {
    Literal(String),
    Stage(StageRef),
}

/// One node of the job graph.
///
/// Serializes as `{"class_type": "...", "inputs": {...}}`, which is the shape
/// the service expects for every node.
#[derive(Debug, Clone, PartialEq, Serialize, IntoStaticStr)]
#[serde(tag = "class_type", content = "inputs")]
pub enum Stage {
    ConditioningZeroOut {
        conditioning: StageRef,
    },

    #[serde(rename = "VAEDecode")]
    #[strum(serialize = "VAEDecode")]
    VaeDecode {
        samples: StageRef,
        vae: StageRef,
    },

    SaveImage {
        filename_prefix: String,
        images: StageRef,
    },

    KSampler {
        seed: u64,
        steps: u32,
        cfg: f64,
        sampler_name: String,
        scheduler: String,
        denoise: f64,
        model: StageRef,
        positive: StageRef,
        negative: StageRef,
        latent_image: StageRef,
    },

    #[serde(rename = "UNETLoader")]
    #[strum(serialize = "UNETLoader")]
    UnetLoader {
        unet_name: String,
        weight_dtype: String,
    },

    #[serde(rename = "DualCLIPLoader")]
    #[strum(serialize = "DualCLIPLoader")]
    DualClipLoader {
        clip_name1: String,
        clip_name2: String,
        #[serde(rename = "type")]
        clip_type: String,
        device: String,
    },

    #[serde(rename = "VAELoader")]
    #[strum(serialize = "VAELoader")]
    VaeLoader {
        vae_name: String,
    },

    EmptyLatentImage {
        width: u32,
        height: u32,
        batch_size: u32,
    },

    #[serde(rename = "CLIPTextEncode")]
    #[strum(serialize = "CLIPTextEncode")]
    ClipTextEncode {
        text: TextInput,
        clip: StageRef,
    },

    #[serde(rename = "BaiduTranslateNode")]
    #[strum(serialize = "BaiduTranslateNode")]
    BaiduTranslate {
        from_translate: String,
        to_translate: String,
        text: String,
        baidu_appid: String,
        baidu_appkey: String,
    },
}

impl Stage {
    /// Node class name as the service knows it.
    pub fn class_type(&self) -> &'static str {
        self.into()
    }
}
