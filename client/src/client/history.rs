use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};
use url::form_urlencoded;

/// Body of `GET /history/<id>`, keyed by job id.
pub type History = HashMap<String, HistoryEntry>;

// Missing and `null` fields decode to their empty value, so one odd stage
// can't hide the image of another.

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: BTreeMap<String, StageOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageRef>,
}

/// Location of a produced image on the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subfolder: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl HistoryEntry {
    /// First image of the first stage output (by stage id) that has any.
    pub fn first_image(&self) -> Option<&ImageRef> {
        self.outputs
            .values()
            .find_map(|output| output.images.first())
    }
}

impl ImageRef {
    /// `<base>/view?filename=..&subfolder=..&type=..`, `base` without trailing slash.
    pub fn view_url(&self, base: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("filename", &self.filename)
            .append_pair("subfolder", &self.subfolder)
            .append_pair("type", &self.kind)
            .finish();
        format!("{base}/view?{query}")
    }
}
