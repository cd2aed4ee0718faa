//! The most commonly used types, for `use wdcaption::prelude::*`.

pub use crate::captioner::{Captioner, VlmCaptioner, WdCaptioner};
pub use crate::error::{ConfigError, Result, TaggerError};
pub use crate::file::ModelHub;
pub use crate::pipeline::{categorize, TaggingPipeline, TaggingResult, Thresholds};
pub use crate::processor::{ImagePreprocessor, ImageProcessor, Layout};
pub use crate::service::{ApiResponse, TagRequest, TagService};
pub use crate::settings::Settings;
pub use crate::tagger::{Activation, Device, TaggerModel, WdModel};
pub use crate::tags::LabelTags;
pub use crate::vlm::VlmClient;
