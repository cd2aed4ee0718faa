//! Prompt text for reverse-engineering a Flux prompt from an image, and the
//! JSON shape the model is asked to answer with.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = r#"
You are a professional AI painting prompt engineer, skilled at converting image content into high-quality Flux generative model prompts.
Now, based on the input image, you are asked to infer its original generated prompt (Flux Prompt).
The description must include information such as the main subject, scene, details, style, lighting, and color, while retaining the stylistic terms.
The output format must be as follows:
{
"main_subject": "<Short English sentence, such as red-haired girl in school uniform>",
"details": "<Long English sentence describing pose, scene, details, emotion, etc.>",
"style": "<Flux style keywords, such as hyper realistic, soft lighting, cinematic>",
"final_prompt": "<Combining main_subject + details + style to form a prompt that can be used directly in Flux>"
}
Notes:
1. Use concise English descriptions that conform to Stable Diffusion / Flux conventions.
2. Avoid using terms unrelated to AI painting, such as "in the image" and "photo of".
3. Do not invent non-existent elements.
4. If the image style is illustration, painting, photography, etc., be sure to include the style.
Example 1:
Image: A blonde girl reading a book in a cafe, sunlight streaming in, Japanese illustration style
Output:
{
"main_subject": "blonde girl reading book in cafe",
"details": "sunlight streaming through window, wooden furniture, soft warm colors",
"style": "anime style, Makoto Shinkai inspired, soft light",
"final_prompt": "blonde girl reading book in cafe, sunlight streaming through window, wooden furniture, soft warm colors, anime style, Makoto Shinkai inspired, soft light"
}

Example 2:
Image: A waterfall in the mountains, mist, realistic photography
Output:
{
"main_subject": "majestic waterfall in the mountains",
"details": "mist rising, lush green forest, flowing water, rocks",
"style": "ultra realistic photography, 8k, HDR",
"final_prompt": "majestic waterfall in the mountains, mist rising, lush green forest, flowing water, rocks, ultra realistic photography, 8k, HDR"
}
"#;

pub const USER_QUERY: &str =
    "According to the content of this picture, write the flux prompt word,Finally Return as json. ";

/// The structured caption. Missing or `null` fields read as empty; lists are
/// joined with `", "` and other values keep their JSON text.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FluxPrompt {
    #[serde(deserialize_with = "lenient_text")]
    pub main_subject: String,
    #[serde(deserialize_with = "lenient_text")]
    pub details: String,
    #[serde(deserialize_with = "lenient_text")]
    pub style: String,
    #[serde(deserialize_with = "lenient_text")]
    pub final_prompt: String,
}

fn value_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Array(items) => items
            .into_iter()
            .map(value_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(value_text)
}
