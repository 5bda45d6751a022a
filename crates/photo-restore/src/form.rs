//! Browser form for uploading a photo and viewing the watermarked preview

use crate::error::RestoreError;
use crate::fingerprint::encode_png;
use crate::pipeline::Processed;
use crate::preview::preview;
use crate::server::{decode_and_process, read_upload, ServerState, SharedState};
use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::response::Html;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::TimeDelta;
use image::DynamicImage;
use tracing::warn;

/// Serve the empty form
pub async fn index(State(state): State<SharedState>) -> Html<String> {
    Html(render_page(&state, ""))
}

/// Process a form submission
///
/// Failures are shown in the output area rather than as an HTTP error.
pub async fn submit(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Html<String> {
    let output = match handle_submission(&state, multipart).await {
        Ok(Some(html)) => html,
        Ok(None) => message_block("Please upload an image"),
        Err(message) => {
            warn!(error = %message, "Form submission failed");
            message_block(&format!("Error: {}", message))
        }
    };
    Html(render_page(&state, &output))
}

async fn handle_submission(
    state: &ServerState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<String>, String> {
    let multipart = multipart.map_err(|e| e.body_text())?;
    let upload = read_upload(multipart).await.map_err(|e| e.to_string())?;
    let Some(bytes) = upload.file else {
        return Ok(None);
    };

    let processed = decode_and_process(state, bytes, upload.options)
        .await
        .map_err(|e| e.to_string())?;

    let preview_png = render_preview(state, &processed)
        .await
        .map_err(|e| e.to_string())?;

    Ok(Some(result_block(state, &processed, &preview_png)))
}

async fn render_preview(state: &ServerState, processed: &Processed) -> crate::error::Result<Vec<u8>> {
    let image = processed.image.clone();
    let config = state.preview.clone();
    tokio::task::spawn_blocking(move || {
        let watermarked = DynamicImage::ImageRgb8(preview(&image, &config));
        encode_png(&watermarked)
    })
    .await
    .map_err(RestoreError::from)?
}

fn result_block(state: &ServerState, processed: &Processed, preview_png: &[u8]) -> String {
    format!(
        r#"<div class="result">
    <img src="data:image/png;base64,{preview}" alt="Preview">
    <p class="note">Free preview (watermarked, reduced size).</p>
    <p><a href="/outputs/{file}" download>Download full resolution</a></p>
    <p><a href="{payment}" target="_blank" rel="noopener">Get the HD version without watermark</a></p>
    <p><a href="{tip}" target="_blank" rel="noopener">Leave a tip</a></p>
  </div>"#,
        preview = STANDARD.encode(preview_png),
        file = escape_html(&processed.file_name()),
        payment = escape_html(&state.payment_url),
        tip = escape_html(&state.tip_url),
    )
}

fn message_block(message: &str) -> String {
    format!(r#"<p class="message">{}</p>"#, escape_html(message))
}

const SHARE_TEXT: &str = "I restored my grandparents' photo in 5 seconds, for less than a dollar!";

fn render_page(state: &ServerState, output: &str) -> String {
    let text = urlencoding::encode(SHARE_TEXT);
    let url = urlencoding::encode(&state.public_url);
    let twitter = format!("https://twitter.com/intent/tweet?text={}&url={}", text, url);
    let facebook = format!("https://www.facebook.com/sharer/sharer.php?u={}&quote={}", url, text);
    let reddit = format!("https://www.reddit.com/submit?url={}&title={}", url, text);

    PAGE_HTML
        .replace("{{payment_url}}", &escape_html(&state.payment_url))
        .replace("{{tip_url}}", &escape_html(&state.tip_url))
        .replace("{{twitter_url}}", &escape_html(&twitter))
        .replace("{{facebook_url}}", &escape_html(&facebook))
        .replace("{{reddit_url}}", &escape_html(&reddit))
        .replace("{{cache_ttl}}", &describe_ttl(state.pipeline.cache().ttl()))
        .replace("{{output}}", output)
}

/// Human-readable retention period for the footer
fn describe_ttl(ttl: TimeDelta) -> String {
    let plural = |n: i64, unit: &str| format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" });
    match (ttl.num_hours(), ttl.num_minutes()) {
        (hours, _) if hours >= 1 => plural(hours, "hour"),
        (_, minutes) if minutes >= 1 => plural(minutes, "minute"),
        _ => plural(ttl.num_seconds().max(0), "second"),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// Unchecked boxes send nothing, so each checkbox is preceded by a hidden
// "false" and the last value wins.
const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Old Photo Restoration</title>
  <style>
    body { font-family: sans-serif; max-width: 720px; margin: 0 auto; padding: 1rem; }
    form { margin-bottom: 1.5rem; }
    label { display: block; margin: 0.5rem 0; }
    .result img { max-width: 100%; }
    .note { color: #666; font-size: 0.9rem; }
    .message { font-weight: bold; }
    .price { font-size: 1.2rem; font-weight: bold; }
    .price s { color: #999; font-weight: normal; }
    .share a { margin-right: 0.75rem; }
    .footer { margin-top: 2rem; color: #666; font-size: 0.85rem; }
  </style>
</head>
<body>
  <h1>Old Photo Restoration</h1>
  <p>Upload an old photo to restore faces and add color. The preview is free;
  the full-resolution version is available after purchase.</p>

  <form method="post" action="/" enctype="multipart/form-data">
    <label>Photo <input type="file" name="file" accept="image/*"></label>
    <input type="hidden" name="restore_face" value="false">
    <label><input type="checkbox" name="restore_face" value="true" checked> Restore faces</label>
    <input type="hidden" name="colorize" value="false">
    <label><input type="checkbox" name="colorize" value="true" checked> Colorize</label>
    <button type="submit">Restore</button>
  </form>

  <div id="output">{{output}}</div>

  <div class="download">
    <p class="price"><s>$4.99</s> $0.99 <span>launch special</span></p>
    <p><a href="{{payment_url}}" target="_blank" rel="noopener">Download HD (no watermark) for $0.99</a></p>
  </div>

  <div class="share">
    <h3>Share your experience</h3>
    <a href="{{twitter_url}}" target="_blank" rel="noopener">Twitter</a>
    <a href="{{facebook_url}}" target="_blank" rel="noopener">Facebook</a>
    <a href="{{reddit_url}}" target="_blank" rel="noopener">Reddit</a>
  </div>

  <div class="footer">
    <p>Made with open-source AI models.
    <a href="{{tip_url}}" target="_blank" rel="noopener">Tip the robot, 49¢</a></p>
    <p>Photos are processed on this server and not stored permanently.
    Results are cached for {{cache_ttl}} for performance.</p>
  </div>
</body>
</html>
"#;
