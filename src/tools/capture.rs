use super::{
    files, handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::exec::{run_blocking, CommandSpec};
use crate::utils::preview::Preview;
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default photo file name, e.g. `photo_1760457600000.jpg`.
pub fn generate_photo_name() -> String {
    format!("photo_{}.jpg", Utc::now().timestamp_millis())
}

/// Accepts only a bare file name and adds `.jpg` when no extension is given.
pub fn sanitize_photo_name(raw: &str) -> Result<String, ToolError> {
    let name = raw.trim();
    let bare = Path::new(name).file_name().map(|n| n.to_string_lossy().to_string());
    if bare.as_deref() != Some(name) || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(ToolError::invalid_input(format!(
            "Invalid photo filename: {}",
            name
        )));
    }
    if Path::new(name).extension().is_some() {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.jpg", name))
    }
}

pub async fn capture_photo(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let filename = match args.string("filename") {
        Some(raw) => sanitize_photo_name(&raw)?,
        None => generate_photo_name(),
    };
    let index = args.integer("camera_index").unwrap_or(0);
    let index = u32::try_from(index)
        .map_err(|_| ToolError::invalid_input(format!("Invalid camera index: {}", index)))?;
    let camera = ctx.engines.camera.require()?;

    let save_dir = ctx.config.paths.photos_dir.clone();
    std::fs::create_dir_all(&save_dir)
        .map_err(|e| ToolError::from_io(&save_dir.display().to_string(), &e))?;
    let save_path = save_dir.join(&filename);

    let spec = camera
        .command(ctx.platform, index, &save_path)
        .timeout(ctx.config.limits.capture_timeout());
    info!("📷 Capturing photo from camera {}", index);
    let output = ctx.run(spec).await?;

    if !output.success() || !save_path.is_file() {
        return Err(ToolError::execution(format!(
            "Camera not available: {}",
            output.failure_message()
        )));
    }

    Ok(payload(json!({
        "path": files::display(&save_path),
        "camera_index": index,
    })))
}

pub async fn read_screen_text(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    // Both engines are checked before anything is captured.
    let screen = ctx.engines.screen.require()?;
    ctx.engines.ocr.require()?;

    let shot = run_blocking("screenshot file", None, || {
        tempfile::Builder::new()
            .prefix("jarvis_screen_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| ToolError::execution(format!("Cannot create temporary file: {}", e)))
    })
    .await?;
    let shot_path = shot.path().to_path_buf();

    let spec = screen.command(&shot_path).timeout(ctx.config.limits.capture_timeout());
    let output = ctx.run(spec).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "Screenshot failed: {}",
            output.failure_message()
        )));
    }

    let text = ocr_image(&ctx, &shot_path).await?;
    drop(shot);

    let text = text.trim();
    if text.is_empty() {
        return Err(ToolError::not_found("No text detected on screen"));
    }

    let mut result = payload(json!({}));
    Preview::new(text, ctx.config.limits.preview_chars).write_into(&mut result, "text");
    Ok(result)
}

/// Runs Tesseract on an image and returns the recognised text.
pub(crate) async fn ocr_image(ctx: &ToolContext, image: &Path) -> Result<String, ToolError> {
    let tesseract: &PathBuf = ctx.engines.ocr.require()?;
    let spec = CommandSpec::new(tesseract.to_string_lossy())
        .arg(image.to_string_lossy())
        .arg("stdout")
        .timeout(ctx.config.limits.capture_timeout());
    let output = ctx.run(spec).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "OCR failed: {}",
            output.failure_message()
        )));
    }
    debug!("OCR produced {} chars", output.stdout.len());
    Ok(output.stdout)
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder
        .register(
            ToolDescriptor::new(
                "capture_photo",
                concat!(
                    "Capture a single photo from the camera and save it under ",
                    "Pictures/JarvisPhotos. Returns the saved path."
                ),
                handler(capture_photo),
            )
            .param(ParamSpec::optional("filename", ParamType::String, "File name for the photo"))
            .param(
                ParamSpec::optional("camera_index", ParamType::Integer, "Which camera to use")
                    .with_default(json!(0)),
            ),
        )
        .register(ToolDescriptor::new(
            "read_screen_text",
            "Take a screenshot and read the visible text on screen using OCR.",
            handler(read_screen_text),
        ));
}
