use super::{
    handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Longest text handed to the speech engine in one call.
pub const MAX_SPEECH_CHARS: usize = 4000;

pub async fn speak_text(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let text = args.require_string("text")?;
    let chars = text.chars().count();
    if chars > MAX_SPEECH_CHARS {
        return Err(ToolError::invalid_input(format!(
            "Text is too long to speak ({} characters, limit {})",
            chars, MAX_SPEECH_CHARS
        )));
    }

    let engine = ctx.engines.speech.require()?;
    let spec = engine.command(&text).timeout(ctx.config.limits.speech_timeout());
    info!("🔊 Speaking {} chars via {}", chars, engine.name());

    let output = ctx.run(spec).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "Speech failed: {}",
            output.failure_message()
        )));
    }

    Ok(payload(json!({
        "spoken_chars": chars,
        "engine": engine.name(),
    })))
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder.register(
        ToolDescriptor::new(
            "speak_text",
            "Speak text aloud through the computer's speech engine.",
            handler(speak_text),
        )
        .param(ParamSpec::required("text", ParamType::String, "What to say")),
    );
}
