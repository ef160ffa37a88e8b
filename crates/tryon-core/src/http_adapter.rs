//! HTTP implementations of the model adapters.
//!
//! Both external models sit behind an inference service speaking JSON over
//! HTTP. Images travel as base64 PNG. The model selection string is opaque
//! here and passed through unmodified.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapter::{Evaluator, Generator};
use crate::constraint::Constraint;
use crate::error::{EvaluationFailure, GenerationFailure};
use crate::verdict::Verdict;

/// Evaluator system prompt. The response contract (the `checks` object with
/// one boolean per constraint) is what [`Verdict::parse`] expects.
const EVALUATOR_PROMPT: &str = "You are a strict quality-assurance judge for virtual try-on images. \
You receive the original person photo, the reference garment photo, and a generated candidate. \
Judge the candidate against every listed check. Respond with ONLY a JSON object of the shape \
{\"checks\": {\"<check>\": true|false, ...}, \"feedback\": \"what failed and why\", \
\"improved_instruction\": \"a corrected generation instruction\"} with one boolean per listed check.";

fn encode_png(image: &DynamicImage) -> Result<String, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        image::ImageOutputFormat::Png,
    )?;
    Ok(BASE64.encode(bytes))
}

/// Generator backed by an HTTP inference endpoint (`POST {base}/generate`).
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(
        &self,
        person: &DynamicImage,
        cloth: &DynamicImage,
        instruction: &str,
    ) -> Result<DynamicImage, GenerationFailure> {
        let body = json!({
            "model": self.model,
            "instruction": instruction,
            "person_image": encode_png(person)
                .map_err(|e| GenerationFailure::Backend(e.to_string()))?,
            "cloth_image": encode_png(cloth)
                .map_err(|e| GenerationFailure::Backend(e.to_string()))?,
        });

        debug!(model = %self.model, "calling generator endpoint");
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationFailure::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationFailure::Backend(format!(
                "generator endpoint returned {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| GenerationFailure::Backend(e.to_string()))?;
        let encoded = payload
            .get("image")
            .and_then(Value::as_str)
            .ok_or_else(|| GenerationFailure::Undecodable("missing image field".to_string()))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| GenerationFailure::Undecodable(e.to_string()))?;
        image::load_from_memory(&bytes).map_err(|e| GenerationFailure::Undecodable(e.to_string()))
    }
}

/// Evaluator backed by an HTTP inference endpoint (`POST {base}/evaluate`).
pub struct HttpEvaluator {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpEvaluator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(
        &self,
        person: &DynamicImage,
        cloth: &DynamicImage,
        candidate: &DynamicImage,
        constraints: &[Constraint],
    ) -> Result<Verdict, EvaluationFailure> {
        let checks: Vec<&str> = constraints.iter().map(Constraint::as_str).collect();
        let body = json!({
            "model": self.model,
            "prompt": EVALUATOR_PROMPT,
            "checks": checks,
            "person_image": encode_png(person)
                .map_err(|e| EvaluationFailure::Backend(e.to_string()))?,
            "cloth_image": encode_png(cloth)
                .map_err(|e| EvaluationFailure::Backend(e.to_string()))?,
            "candidate_image": encode_png(candidate)
                .map_err(|e| EvaluationFailure::Backend(e.to_string()))?,
        });

        debug!(model = %self.model, "calling evaluator endpoint");
        let response = self
            .client
            .post(format!("{}/evaluate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluationFailure::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EvaluationFailure::Backend(format!(
                "evaluator endpoint returned {}",
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| EvaluationFailure::Backend(e.to_string()))?;
        Verdict::parse(&text)
    }
}
