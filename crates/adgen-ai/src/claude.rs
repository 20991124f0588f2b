//! Claude vision client for image selection and prompt generation.
//!
//! Two calls back the pipeline's analysis stages: one pass over all product
//! photos to pick the strongest candidates, then one call per selected image
//! to produce video prompts in the Hero/Lifestyle/Technical house style.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use adgen_models::{ImageAnalysis, ImageSelection, ProductAnalysis, SelectedImage, VideoPrompt};

use crate::error::{AiError, AiResult};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// A base64-encoded JPEG with its source file name.
#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub filename: String,
    pub base64_jpeg: String,
}

/// Anthropic Messages API client.
pub struct ClaudeClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

impl ImageSource {
    fn base64_jpeg(data: &str) -> Self {
        Self {
            source_type: "base64".to_string(),
            media_type: "image/jpeg".to_string(),
            data: data.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: String,
}

/// Selection result as the model emits it (no schema version).
#[derive(Debug, Deserialize)]
struct SelectionPayload {
    selected_images: Vec<SelectedImage>,
    #[serde(default)]
    summary: String,
}

/// Per-image analysis as the model emits it (file name supplied by caller).
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    product_analysis: ProductAnalysis,
    video_prompts: Vec<VideoPrompt>,
    #[serde(default)]
    story_summary: String,
}

impl ClaudeClient {
    /// Create a client from environment variables.
    ///
    /// Requires `ANTHROPIC_API_KEY`; `ANTHROPIC_API_URL` and
    /// `ANTHROPIC_MODEL` override the defaults.
    pub fn from_env() -> AiResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::config_error("ANTHROPIC_API_KEY not set"))?;

        Ok(Self {
            api_key,
            base_url: std::env::var("ANTHROPIC_API_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            client: Client::new(),
        })
    }

    /// Create a client against an explicit endpoint.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    /// Select the best product images for video ads.
    ///
    /// All candidate images go into one vision request; the model ranks them
    /// and returns at most `num_images` picks.
    pub async fn select_images(
        &self,
        images: &[LabeledImage],
        num_images: usize,
    ) -> AiResult<ImageSelection> {
        info!(
            "Selecting up to {} of {} candidate images",
            num_images,
            images.len()
        );

        let mut content = Vec::with_capacity(images.len() * 2 + 1);
        for (i, img) in images.iter().enumerate() {
            content.push(ContentBlock::Text {
                text: format!("Image {}: {}", i + 1, img.filename),
            });
            content.push(ContentBlock::Image {
                source: ImageSource::base64_jpeg(&img.base64_jpeg),
            });
        }
        content.push(ContentBlock::Text {
            text: selection_prompt(images, num_images),
        });

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: None,
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
        };

        let text = self.call_messages_api(&request).await?;
        let payload: SelectionPayload = serde_json::from_str(extract_json(&text))
            .map_err(|e| AiError::malformed(format!("selection JSON: {}", e)))?;

        if payload.selected_images.is_empty() {
            return Err(AiError::malformed("model selected no images"));
        }

        Ok(ImageSelection::new(payload.selected_images, payload.summary))
    }

    /// Generate video prompts for one selected image.
    pub async fn analyze_image(
        &self,
        filename: &str,
        image_b64: &str,
        num_prompts: usize,
    ) -> AiResult<ImageAnalysis> {
        info!("Generating {} prompts for {}", num_prompts, filename);

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: Some(
                "You are a video generation prompt specialist. Generate premium product \
                 advertisement video prompts with specific camera movements, professional \
                 lighting, and commercial moods. Each prompt must be 3-4 sentences following \
                 the exact structure: [Camera/shot], [Subject], [Action], [Movement], \
                 [Lighting], [Mood]."
                    .to_string(),
            ),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentBlock::Image {
                        source: ImageSource::base64_jpeg(image_b64),
                    },
                    ContentBlock::Text {
                        text: analysis_prompt(filename, num_prompts),
                    },
                ],
            }],
        };

        let text = self.call_messages_api(&request).await?;
        let payload: AnalysisPayload = serde_json::from_str(extract_json(&text))
            .map_err(|e| AiError::malformed(format!("analysis JSON for {}: {}", filename, e)))?;

        if payload.video_prompts.is_empty() {
            return Err(AiError::malformed(format!(
                "model generated no prompts for {}",
                filename
            )));
        }

        Ok(ImageAnalysis {
            image_filename: filename.to_string(),
            product_analysis: payload.product_analysis,
            video_prompts: payload.video_prompts,
            story_summary: payload.story_summary,
        })
    }

    async fn call_messages_api(&self, request: &MessagesRequest) -> AiResult<String> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("Calling {} with model {}", url, request.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| AiError::request_failed(format!("Messages API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::ApiStatus { status, body });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiError::malformed(format!("Messages API response: {}", e)))?;

        parsed
            .content
            .iter()
            .map(|b| b.text.as_str())
            .find(|t| !t.is_empty())
            .map(|t| t.to_string())
            .ok_or_else(|| AiError::malformed("no text content in Messages API response"))
    }
}

fn selection_prompt(images: &[LabeledImage], num_images: usize) -> String {
    let filenames: Vec<&str> = images.iter().map(|i| i.filename.as_str()).collect();
    format!(
        r#"Analyze these {count} product images and select the {num} best ones for creating video advertisements.

Selection criteria, in priority order:
1. Minimal or no text/labels on the product or background
2. Clear, unobstructed view of the product
3. Image quality and resolution
4. Visual appeal and composition
5. Variety of angles and contexts across the selection

The images are named, in order: {names}

Return ONLY a single JSON object with this schema:
{{
  "selected_images": [
    {{
      "filename": "exact filename from the list above",
      "reason": "Why this image was selected",
      "visual_features": "Key visual features",
      "text_presence": "none/minimal/significant",
      "suggested_use": "How to use in video ad"
    }}
  ],
  "summary": "Overall assessment focusing on text-free quality of selected images"
}}"#,
        count = images.len(),
        num = num_images,
        names = filenames.join(", "),
    )
}

fn analysis_prompt(filename: &str, num_prompts: usize) -> String {
    format!(
        r#"Analyze this product image ({filename}) and generate {num_prompts} distinct video advertisement prompts for it.

Guidelines:
- Each prompt describes a 5-second 16:9 video clip
- Use specific camera movements (dolly zoom, orbital pan, tracking shot, slow push-in)
- Use premium lighting descriptions (studio lighting, golden hour, soft ambient, rim lighting)
- Apply commercial mood keywords (premium, sophisticated, sleek, innovative, luxurious)
- Vary the prompt types: hero showcase, lifestyle focus, technical detail

Return ONLY a single JSON object with this schema:
{{
  "product_analysis": {{
    "product_identification": "what the product is",
    "key_features": ["feature 1", "feature 2"],
    "image_specific_details": "what this particular image shows",
    "visual_style": "overall visual style"
  }},
  "video_prompts": [
    {{
      "sequence": 1,
      "prompt_type": "Hero Showcase",
      "prompt": "full 3-4 sentence prompt text",
      "camera_movement": "specific movement type",
      "lighting": "specific lighting setup",
      "mood": "specific mood"
    }}
  ],
  "story_summary": "Overall commercial narrative arc for this specific image"
}}"#,
    )
}

/// Extract the JSON object from a model reply, tolerating markdown fences
/// and leading/trailing prose.
fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    let text = text.trim();

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_with_prose() {
        assert_eq!(
            extract_json("Here is the result:\n{\"a\": 1}\nLet me know!"),
            r#"{"a": 1}"#
        );
    }

    fn messages_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "content": [{"type": "text", "text": text}],
            "model": DEFAULT_MODEL,
            "role": "assistant"
        })
    }

    #[tokio::test]
    async fn test_select_images_parses_fenced_reply() {
        let server = MockServer::start().await;
        let reply = r#"```json
{
  "selected_images": [
    {"filename": "front.jpg", "reason": "clean shot", "visual_features": "full view",
     "text_presence": "none", "suggested_use": "hero shot"}
  ],
  "summary": "one strong candidate"
}
```"#;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messages_body(reply)))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("test-key", server.uri());
        let images = vec![LabeledImage {
            filename: "front.jpg".into(),
            base64_jpeg: "aGVsbG8=".into(),
        }];

        let selection = client.select_images(&images, 1).await.unwrap();
        assert_eq!(selection.selected_images.len(), 1);
        assert_eq!(selection.selected_images[0].filename, "front.jpg");
        assert_eq!(selection.summary, "one strong candidate");
    }

    #[tokio::test]
    async fn test_analyze_image_fills_filename() {
        let server = MockServer::start().await;
        let reply = r#"{
  "product_analysis": {"product_identification": "watch", "key_features": ["sapphire glass"],
                       "image_specific_details": "front view", "visual_style": "minimal"},
  "video_prompts": [
    {"sequence": 1, "prompt_type": "Hero Showcase", "prompt": "Wide shot, watch centered.",
     "camera_movement": "dolly zoom", "lighting": "studio lighting", "mood": "premium"}
  ],
  "story_summary": "premium reveal"
}"#;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messages_body(reply)))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("test-key", server.uri());
        let analysis = client.analyze_image("front.jpg", "aGVsbG8=", 1).await.unwrap();
        assert_eq!(analysis.image_filename, "front.jpg");
        assert_eq!(analysis.video_prompts[0].prompt_type, "Hero Showcase");
    }

    #[tokio::test]
    async fn test_api_error_status_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = ClaudeClient::new("test-key", server.uri());
        let err = client.analyze_image("a.jpg", "aGVsbG8=", 3).await.unwrap_err();
        assert!(matches!(err, AiError::ApiStatus { status: 429, .. }));
    }
}
