use super::{
    capture, handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::exec::{run_blocking, CommandSpec};
use crate::utils::paths;
use crate::utils::preview::{Preview, PreviewBuilder};
use glob::MatchOptions;
use serde_json::json;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "gif", "webp"];
const READ_CHUNK: usize = 64 * 1024;
const BINARY_SNIFF_BYTES: usize = 8192;

/// Expands a leading `~` and anchors relative paths at the current directory.
pub fn resolve_path(raw: &str) -> Result<PathBuf, ToolError> {
    if raw.contains('\0') {
        return Err(ToolError::invalid_input(format!("Invalid path: {}", raw.replace('\0', ""))));
    }

    let expanded = if raw == "~" {
        paths::home_dir()
    } else if let Some(rest) = raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        paths::home_dir().join(rest)
    } else {
        PathBuf::from(raw)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| ToolError::execution(format!("Cannot resolve current directory: {}", e)))?;
        Ok(cwd.join(expanded))
    }
}

pub(crate) fn display(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string()
}

/// First file under `folder` matching any `patterns`, tried in order.
/// Matches for one pattern are sorted so the pick is stable.
pub(crate) fn first_match(folder: &Path, patterns: &[&str]) -> Option<PathBuf> {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    let base = glob::Pattern::escape(&folder.to_string_lossy());

    patterns.iter().find_map(|pattern| {
        let full = format!("{}/{}", base, pattern);
        let mut hits: Vec<PathBuf> = glob::glob_with(&full, options)
            .ok()?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        hits.sort();
        hits.into_iter().next()
    })
}

fn require_dir(path: &Path, message: &str) -> Result<(), ToolError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ToolError::not_found(format!("{}: {}", message, path.display())))
    }
}

pub async fn create_folder(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let target = match args.string("path") {
        Some(raw) => resolve_path(&raw)?,
        None => ctx.config.paths.default_folder.clone(),
    };

    if target.exists() && !target.is_dir() {
        return Err(ToolError::invalid_input(format!(
            "A file already exists at {}",
            target.display()
        )));
    }

    let resolved = run_blocking("create_folder", None, move || {
        fs::create_dir_all(&target)
            .map_err(|e| ToolError::from_io(&target.display().to_string(), &e))?;
        Ok(display(&target))
    })
    .await?;

    info!("📁 Folder ready: {}", resolved);
    Ok(payload(json!({ "path": resolved })))
}

pub async fn list_folder_items(_ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let target = match args.string("path") {
        Some(raw) => resolve_path(&raw)?,
        None => std::env::current_dir()
            .map_err(|e| ToolError::execution(format!("Cannot resolve current directory: {}", e)))?,
    };
    require_dir(&target, "Invalid directory")?;

    let (path, items) = run_blocking("list_folder_items", None, move || {
        let entries = fs::read_dir(&target)
            .map_err(|e| ToolError::from_io(&target.display().to_string(), &e))?;
        let mut items: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        items.sort();
        Ok((display(&target), items))
    })
    .await?;

    Ok(payload(json!({
        "path": path,
        "count": items.len(),
        "items": items,
    })))
}

pub async fn open_file(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let target = match args.string("path") {
        Some(raw) => {
            let path = resolve_path(&raw)?;
            if !path.exists() {
                return Err(ToolError::not_found(format!("Path not found: {}", raw)));
            }
            path
        }
        None => {
            let docs = ctx.config.paths.documents_dir.clone();
            fs::create_dir_all(&docs)
                .map_err(|e| ToolError::from_io(&docs.display().to_string(), &e))?;
            docs
        }
    };

    let kind = if target.is_dir() { "directory" } else { "file" };
    let opened = display(&target);
    open_with_default(&ctx, opened.clone()).await?;
    Ok(payload(json!({ "opened": opened, "kind": kind })))
}

pub async fn open_pdf_in_folder(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let folder = match args.string("folder") {
        Some(raw) => resolve_path(&raw)?,
        None => ctx.config.paths.documents_dir.clone(),
    };
    require_dir(&folder, "Invalid folder")?;

    let search_root = folder.clone();
    let timeout = Some(ctx.config.limits.command_timeout());
    let found = run_blocking("open_pdf_in_folder", timeout, move || {
        Ok(first_match(&search_root, &["**/*.pdf"]))
    })
    .await?
    .ok_or_else(|| ToolError::not_found(format!("No PDF files found in {}", folder.display())))?;

    let opened = display(&found);
    open_with_default(&ctx, opened.clone()).await?;
    Ok(payload(json!({ "opened": opened })))
}

pub async fn read_file_text(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let raw = args.require_string("path")?;
    let path = resolve_path(&raw)?;
    if !path.is_file() {
        return Err(ToolError::not_found(format!("File not found: {}", raw)));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let limit = ctx.config.limits.preview_chars;
    let (preview, method) = if extension == "pdf" {
        let text = extract_pdf(&ctx, &path).await?;
        (Preview::new(text.trim(), limit), "pdftotext")
    } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        let text = capture::ocr_image(&ctx, &path).await?;
        (Preview::new(text.trim(), limit), "ocr")
    } else {
        let target = path.clone();
        let preview =
            run_blocking("read_file_text", None, move || read_plain_text(&target, limit)).await?;
        (preview, "plain")
    };

    if preview.total_chars == 0 {
        return Err(ToolError::not_found(format!("No text found in {}", raw)));
    }

    let mut result = payload(json!({
        "path": display(&path),
        "method": method,
    }));
    preview.write_into(&mut result, "text");
    Ok(result)
}

/// Streams a text file into a bounded preview. Only the first `limit`
/// characters are kept; the rest is counted. Invalid UTF-8 becomes U+FFFD.
fn read_plain_text(path: &Path, limit: usize) -> Result<Preview, ToolError> {
    let io_err = |e: std::io::Error| ToolError::from_io(&path.display().to_string(), &e);
    let mut file = fs::File::open(path).map_err(io_err)?;

    let mut builder = PreviewBuilder::new(limit);
    let mut buf = vec![0u8; READ_CHUNK];
    // Bytes of a UTF-8 sequence split across two reads.
    let mut carry: Vec<u8> = Vec::new();
    let mut seen = 0usize;

    loop {
        let read = file.read(&mut buf).map_err(io_err)?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        if seen < BINARY_SNIFF_BYTES {
            let sniff = &chunk[..read.min(BINARY_SNIFF_BYTES - seen)];
            if sniff.contains(&0) {
                return Err(ToolError::invalid_input(format!(
                    "{} looks like a binary file; only text, PDF and image files can be read",
                    path.display()
                )));
            }
        }
        seen += read;

        carry.extend_from_slice(chunk);
        let consumed = decode_lossy(&carry, &mut builder);
        carry.drain(..consumed);
    }

    if !carry.is_empty() {
        builder.push_str(&String::from_utf8_lossy(&carry));
    }
    Ok(builder.finish())
}

/// Feeds every complete UTF-8 sequence of `bytes` to `builder` and returns
/// how many bytes were consumed. An incomplete sequence at the end is left.
fn decode_lossy(bytes: &[u8], builder: &mut PreviewBuilder) -> usize {
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                builder.push_str(valid);
                return bytes.len();
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // valid_up_to marks a char boundary
                builder.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => {
                        builder.push_str(char::REPLACEMENT_CHARACTER.encode_utf8(&mut [0; 4]));
                        rest = &after[bad..];
                    }
                    None => return bytes.len() - after.len(),
                }
            }
        }
    }
}

async fn extract_pdf(ctx: &ToolContext, path: &Path) -> Result<String, ToolError> {
    let pdftotext = ctx.engines.pdf_text.require()?;
    let spec = CommandSpec::new(pdftotext.to_string_lossy())
        .args(["-layout", "-enc", "UTF-8"])
        .arg(path.to_string_lossy())
        .arg("-")
        .timeout(ctx.config.limits.capture_timeout());
    let output = ctx.run(spec).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "pdftotext failed: {}",
            output.failure_message()
        )));
    }
    Ok(output.stdout)
}

/// Hands `target` to the system's default handler.
pub(crate) async fn open_with_default(ctx: &ToolContext, target: String) -> Result<(), ToolError> {
    let launcher = Arc::clone(&ctx.launcher);
    info!("📂 Opening {}", target);
    run_blocking("open", None, move || launcher.open(&target)).await
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder
        .register(
            ToolDescriptor::new(
                "create_folder",
                concat!(
                    "Create a new folder. Without a path, creates NewFolder_Jarvis ",
                    "in the home directory."
                ),
                handler(create_folder),
            )
            .param(ParamSpec::optional("path", ParamType::String, "Folder to create")),
        )
        .register(
            ToolDescriptor::new(
                "list_folder_items",
                "List the items inside a folder (defaults to the current directory).",
                handler(list_folder_items),
            )
            .param(ParamSpec::optional("path", ParamType::String, "Folder to list")),
        )
        .register(
            ToolDescriptor::new(
                "open_file",
                "Open a file or folder. Without a path, opens the Documents folder.",
                handler(open_file),
            )
            .param(ParamSpec::optional("path", ParamType::String, "File or folder to open")),
        )
        .register(
            ToolDescriptor::new(
                "open_pdf_in_folder",
                concat!(
                    "Find the first PDF in a folder (searching subfolders) and open it. ",
                    "Defaults to Documents."
                ),
                handler(open_pdf_in_folder),
            )
            .param(ParamSpec::optional("folder", ParamType::String, "Folder to search")),
        )
        .register(
            ToolDescriptor::new(
                "read_file_text",
                "Read the text of a file. Supports plain text, PDF and images (via OCR).",
                handler(read_file_text),
            )
            .param(ParamSpec::required("path", ParamType::String, "File to read")),
        );
}
