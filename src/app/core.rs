use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tracing::{info, warn};
use wdcaption::{
    captioner::{Captioner, VlmCaptioner, WdCaptioner},
    file::ModelHub,
    pipeline::Thresholds,
    server,
    service::TagService,
    settings::{check_threshold, Settings},
    tagger::{TaggerModel, WdModel},
    vlm::VlmClient,
};

/// Initializes ONNX Runtime and builds the WD backend from settings.
fn build_wd(settings: &Settings, model: WdModel, thresholds: Thresholds) -> Result<WdCaptioner> {
    TaggerModel::init(vec![settings.wd.device()?])?;
    let hub = ModelHub::new(settings.wd.cache_dir.clone())?;

    Ok(WdCaptioner::new(
        hub,
        model,
        thresholds,
        settings.wd.layout()?,
        settings.wd.activation()?,
    ))
}

/// The VLM backend, or `None` when disabled or missing its API key.
fn build_vlm(settings: &Settings) -> Option<VlmCaptioner> {
    let vlm = &settings.vlm;
    if !vlm.enabled {
        info!("VLM backend disabled");
        return None;
    }
    let Some(api_key) = vlm.api_key() else {
        warn!("VLM API key not set; flux requests will use the WD tagger");
        return None;
    };

    let client = VlmClient::new(&vlm.base_url, &api_key, &vlm.model_name, vlm.timeout());
    info!(endpoint = client.endpoint(), model = client.model(), "VLM backend ready");
    Some(VlmCaptioner::new(client, vlm.max_side, vlm.jpeg_quality))
}

/// Runs the HTTP service.
pub async fn run_server(settings: Settings) -> Result<()> {
    let thresholds = Thresholds {
        general: settings.wd.gen_threshold,
        character: settings.wd.char_threshold,
    };
    let wd = Arc::new(build_wd(&settings, settings.wd.model()?, thresholds)?);

    if settings.wd.preload {
        wd.preload()
            .await
            .with_context(|| format!("Failed to preload WD model {}", wd.model()))?;
        info!(model = %wd.model(), "preload done");
    }

    let vlm = build_vlm(&settings).map(|v| Arc::new(v) as Arc<dyn Captioner>);
    let service = Arc::new(TagService::new(wd, vlm, settings.vlm.fallback_to_wd));

    let router = server::router(service, settings.server.body_limit_bytes());
    server::serve(&settings.server.addr(), router).await?;
    Ok(())
}

/// Tags local files with the WD tagger and prints one block per image.
pub async fn run_tag(
    settings: Settings,
    image_files: Vec<PathBuf>,
    model: Option<String>,
    gen_threshold: Option<f32>,
    char_threshold: Option<f32>,
) -> Result<()> {
    let model: WdModel = match model {
        Some(name) => name.parse()?,
        None => settings.wd.model()?,
    };
    let thresholds = Thresholds {
        general: gen_threshold.unwrap_or(settings.wd.gen_threshold),
        character: char_threshold.unwrap_or(settings.wd.char_threshold),
    };
    check_threshold("--gen-threshold", thresholds.general)?;
    check_threshold("--char-threshold", thresholds.character)?;

    let images = image_files
        .iter()
        .map(|path| image::open(path).with_context(|| format!("Failed to open {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let wd = build_wd(&settings, model, thresholds)?;
    let results = wd.tag_batch(model, images).await?;

    for (path, result) in image_files.iter().zip(results) {
        println!("{}", path.display());
        println!("  caption: {}", result.caption());
        println!("  taglist: {}", result.taglist());
        if let Some((rating, prob)) = result.top_rating() {
            println!("  rating:  {rating} ({prob:.3})");
        }
    }

    Ok(())
}
