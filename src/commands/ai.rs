use axum::extract::Json;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::commands::expenditure::{parse_expenditure_date, CATEGORIES};
use crate::error::{CluckError, CluckResult};

const MODELS_TO_TRY: [(&str, &str); 3] = [
    ("v1", "gemini-1.5-flash"),
    ("v1beta", "gemini-1.5-flash"),
    ("v1beta", "gemini-1.5-pro-latest"),
];

pub fn get_api_key() -> CluckResult<String> {
    std::env::var("GEMINI_API_KEY")
        .map_err(|_| CluckError::Upstream("GEMINI_API_KEY is not configured".to_string()))
}

fn strip_markdown_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Submits a prompt to the generative endpoint, walking the model fallback
/// list. Returns the raw text with any markdown fences removed.
pub async fn call_generative_ai(api_key: &str, prompt: &str) -> CluckResult<String> {
    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }]
    });
    submit_to_models(api_key, body).await
}

/// Vision variant: the prompt plus one inline base64 image.
pub async fn call_generative_vision_ai(
    api_key: &str,
    prompt: &str,
    image_base64: &str,
    mime_type: &str,
) -> CluckResult<String> {
    let body = serde_json::json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": image_base64
                    }
                }
            ]
        }]
    });
    submit_to_models(api_key, body).await
}

async fn submit_to_models(api_key: &str, body: serde_json::Value) -> CluckResult<String> {
    let clean_key = api_key.trim().trim_matches(|c: char| c == '"' || c == '\'');
    let client = reqwest::Client::new();

    let mut errors = Vec::new();

    for (version, model) in MODELS_TO_TRY {
        let url = format!(
            "https://generativelanguage.googleapis.com/{}/models/{}:generateContent?key={}",
            version, model, clean_key
        );

        let resp = match client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                errors.push(format!("Network error ({}): {}", model, e));
                continue;
            }
        };

        if resp.status().is_success() {
            let json: serde_json::Value = resp.json().await.unwrap_or_default();
            if let Some(content) = json["candidates"][0]["content"]["parts"][0]["text"].as_str() {
                return Ok(strip_markdown_fences(content).to_string());
            }
            errors.push(format!("Empty response from {}", model));
        } else {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(CluckError::Upstream(
                    "AI quota exceeded; try again later".to_string(),
                ));
            }
            errors.push(format!("API error ({}): {} - {}", model, status, error_text));
        }
    }

    Err(CluckError::Upstream(format!(
        "AI model connection failed:\n{}",
        errors.join("\n")
    )))
}

fn parse_ai_json<T: serde::de::DeserializeOwned>(json_str: &str) -> CluckResult<T> {
    serde_json::from_str(json_str).map_err(|e| {
        CluckError::Upstream(format!(
            "AI response failed output validation: {}\nResponse was: {}",
            e, json_str
        ))
    })
}

// --- Feed-mix optimization ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMixRequest {
    pub consumption_patterns: String,
    pub nutrient_requirements: String,
    pub current_feed_mix: String,
    pub available_ingredients: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMixAdvice {
    pub optimized_feed_mix: String,
    pub rationale: String,
    pub estimated_cost_savings: String,
    pub expected_growth_improvement: String,
}

pub async fn optimize_feed_mix(
    Json(input): Json<FeedMixRequest>,
) -> CluckResult<Json<FeedMixAdvice>> {
    let api_key = get_api_key()?;

    let prompt = format!(
        "You are a poultry nutrition consultant. Using the farm data below, propose an optimized feed mix.\n\n\
        Feed consumption patterns:\n{}\n\n\
        Nutrient requirements:\n{}\n\n\
        Current feed mix:\n{}\n\n\
        Available ingredients:\n{}\n\n\
        Respond with ONLY a JSON object of this exact shape:\n\
        {{\n\
          \"optimizedFeedMix\": \"ingredient breakdown with percentages\",\n\
          \"rationale\": \"why this mix fits the requirements\",\n\
          \"estimatedCostSavings\": \"expected savings versus the current mix\",\n\
          \"expectedGrowthImprovement\": \"expected effect on growth or production\"\n\
        }}",
        input.consumption_patterns,
        input.nutrient_requirements,
        input.current_feed_mix,
        input.available_ingredients
    );

    let json_str = call_generative_ai(&api_key, &prompt).await?;
    let advice: FeedMixAdvice = parse_ai_json(&json_str)?;
    Ok(Json(advice))
}

// --- Health-issue prediction ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRequest {
    pub historical_data: String,
    pub real_time_sensor_readings: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPrediction {
    pub potential_health_issues: String,
    pub risk_levels: String,
    pub recommendations: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

pub async fn predict_health_issues(
    Json(input): Json<HealthRequest>,
) -> CluckResult<Json<HealthPrediction>> {
    let api_key = get_api_key()?;

    let prompt = format!(
        "You are a poultry health analyst. Based on the historical flock data and current barn sensor readings, predict likely health issues.\n\n\
        Historical data:\n{}\n\n\
        Real-time sensor readings:\n{}\n\n\
        Respond with ONLY a JSON object of this exact shape:\n\
        {{\n\
          \"potentialHealthIssues\": \"issues the flock is at risk of\",\n\
          \"riskLevels\": \"risk level per issue (low/medium/high)\",\n\
          \"recommendations\": \"concrete preventive actions\",\n\
          \"diagnosis\": \"overall assessment of the flock's condition\"\n\
        }}",
        input.historical_data, input.real_time_sensor_readings
    );

    let json_str = call_generative_ai(&api_key, &prompt).await?;
    let prediction: HealthPrediction = parse_ai_json(&json_str)?;
    Ok(Json(prediction))
}

// --- Q&A ---

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

pub async fn answer_poultry_question(
    Json(input): Json<AskRequest>,
) -> CluckResult<Json<AskResponse>> {
    if input.query.trim().is_empty() {
        return Err(CluckError::Validation("Question cannot be empty".into()));
    }
    let api_key = get_api_key()?;

    let prompt = format!(
        "You are an experienced poultry farming advisor. Answer the farmer's question practically and concisely, in plain text without markdown.\n\n\
        Question: {}",
        input.query
    );

    let answer = call_generative_ai(&api_key, &prompt).await?;
    Ok(Json(AskResponse { answer }))
}

// --- Receipt scanning ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReceiptRequest {
    pub receipt_image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReceiptScan {
    pub category: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub expenditure_date: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDraft {
    pub category: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub description: String,
    pub expenditure_date: NaiveDate,
}

/// Splits a `data:<mime>;base64,<payload>` URI and checks the payload
/// actually decodes before it is forwarded upstream.
pub fn parse_data_uri(data_uri: &str) -> CluckResult<(String, String)> {
    let rest = data_uri
        .strip_prefix("data:")
        .ok_or_else(|| CluckError::Validation("Receipt image must be a base64 data URI".into()))?;
    let (mime_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| CluckError::Validation("Receipt image must be base64 encoded".into()))?;
    if base64::engine::general_purpose::STANDARD
        .decode(payload)
        .is_err()
    {
        return Err(CluckError::Validation(
            "Receipt image payload is not valid base64".into(),
        ));
    }
    Ok((mime_type.to_string(), payload.to_string()))
}

/// The extracted total is authoritative. When the model could not split
/// out quantity and unit price, quantity falls back to 1 and the unit
/// price is back-computed from the total.
pub fn normalize_receipt(raw: RawReceiptScan, today: NaiveDate) -> CluckResult<ReceiptDraft> {
    let amount = match raw.amount {
        Some(a) if a > 0.0 => a,
        _ => {
            return Err(CluckError::Upstream(
                "Receipt scan did not yield a total amount".into(),
            ))
        }
    };

    let quantity = match raw.quantity {
        Some(q) if q > 0.0 => q,
        _ => 1.0,
    };
    let unit_price = match raw.unit_price {
        Some(p) if p > 0.0 => p,
        _ => amount / quantity,
    };

    let category = raw
        .category
        .filter(|c| CATEGORIES.contains(&c.as_str()))
        .unwrap_or_else(|| "Other".to_string());

    let expenditure_date = raw
        .expenditure_date
        .as_deref()
        .and_then(parse_expenditure_date)
        .unwrap_or(today);

    Ok(ReceiptDraft {
        category,
        quantity,
        unit_price,
        amount,
        description: raw.description.unwrap_or_default(),
        expenditure_date,
    })
}

pub async fn scan_receipt(
    Json(input): Json<ScanReceiptRequest>,
) -> CluckResult<Json<ReceiptDraft>> {
    let api_key = get_api_key()?;
    let (mime_type, payload) = parse_data_uri(&input.receipt_image)?;

    let prompt = format!(
        "Analyze this purchase receipt from a poultry farm.\n\
        Extract: category (one of: {}), quantity, unitPrice, amount (the receipt total), description, expenditureDate (YYYY-MM-DD).\n\
        Return ONLY a JSON object with keys: category, quantity, unitPrice, amount, description, expenditureDate.\n\
        Use null for anything you cannot read. The amount is the most important field.",
        CATEGORIES.join(", ")
    );

    let json_str = call_generative_vision_ai(&api_key, &prompt, &payload, &mime_type).await?;
    let raw: RawReceiptScan = parse_ai_json(&json_str)?;
    let draft = normalize_receipt(raw, chrono::Local::now().date_naive())?;
    Ok(Json(draft))
}
