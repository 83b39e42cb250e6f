use std::{env, fs, path::PathBuf};

use anyhow::{Context, bail};
use client::{SplitClient, normalize_rgb, preprocess::IMAGE_SIZE};
use log::info;
use machine_learning::{Device, DevicePreference, ModelSource, arch::Side};

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(image) = env::args().nth(1) else {
        bail!("usage: split-client <image.rgb>, a raw {IMAGE_SIZE}x{IMAGE_SIZE} RGB file");
    };

    let source = ModelSource {
        weights: env::var("MODEL_WEIGHTS")
            .context("missing environment variable MODEL_WEIGHTS")?
            .into(),
        split: env::var("SPLIT_CONFIG").ok().map(PathBuf::from),
        arch: env::var("ARCH_SPEC").ok().map(PathBuf::from),
    };

    let preference: DevicePreference = match env::var("DEVICE") {
        Ok(value) => value.parse().map_err(anyhow::Error::msg)?,
        Err(_) => DevicePreference::default(),
    };
    let device = Device::select(preference);
    info!("using the {device} device");

    let segment = machine_learning::load(&source, Side::Client, device)
        .with_context(|| format!("failed to load {}", source.weights.display()))?;

    let pixels = fs::read(&image).with_context(|| format!("failed to read {image}"))?;
    let input = normalize_rgb(&pixels, IMAGE_SIZE, IMAGE_SIZE)?;

    let url = env::var("SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
    let client = SplitClient::new(&url, segment);
    let response = client.infer(input).await?;

    println!("{}", response.class);
    Ok(())
}
