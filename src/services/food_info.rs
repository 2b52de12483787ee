use regex::Regex;
use std::sync::OnceLock;

use crate::models::{ErrorKind, ExtractedPayload, Failure, NutritionRecord};

/// Instruction sent along with the food photo.
pub const FOOD_INFO_PROMPT: &str = "This image is a photo of food. Tell me what food it is and \
return its nutrition information as JSON with the following fields:\n\
\n\
- food name (food_name)\n\
- estimated nutrition per 100 g (nutritionInfo)\n\
  - calories (calories)\n\
  - protein (protein)\n\
  - fat (fat)\n\
  - carbohydrates (carbohydrates)\n\
  - calcium (calcium)\n\
  - omega-3 fatty acids (omega_3)\n\
- a short description of the food (description)\n\
\n\
Wrap the whole JSON in a ```json code block. If the image is not food, reply only with \"not food\".";

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(\{.*?\})\s*```").expect("fence pattern is valid")
    })
}

/// Pull the JSON object out of a model reply, dropping the code fence and any
/// prose around it.
fn strip_fence(text: &str) -> Option<&str> {
    if let Some(caps) = fence_regex().captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }

    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}')).then_some(trimmed)
}

/// Parse a nutrition record from the text of an extracted reply.
pub fn parse(extracted: &ExtractedPayload) -> Result<NutritionRecord, Failure> {
    let text = extracted
        .text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Failure::new(ErrorKind::ParseError, "reply contains no text"))?;

    let json = strip_fence(text).ok_or_else(|| {
        Failure::new(
            ErrorKind::ParseError,
            format!("no JSON object found in reply: {}", preview(text)),
        )
    })?;

    serde_json::from_str(json).map_err(|e| {
        Failure::new(
            ErrorKind::ParseError,
            format!("reply JSON does not describe a food: {}", e),
        )
    })
}

/// Canonical caller-facing form of a record.
pub fn to_pretty_json(record: &NutritionRecord) -> Result<String, Failure> {
    serde_json::to_string_pretty(record)
        .map_err(|e| Failure::new(ErrorKind::ParseError, format!("cannot serialize record: {}", e)))
}

fn preview(text: &str) -> String {
    let cut: String = text.chars().take(80).collect();
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut
    }
}
