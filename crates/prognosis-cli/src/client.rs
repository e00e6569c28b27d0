//! API client for communicating with the prediction service

use anyhow::{Context, Result};
use reqwest::{multipart, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// API client for the prediction service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        parse_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse_response(response).await
    }

    /// Upload a CSV file as the multipart field `file`
    pub async fn upload_csv<T: DeserializeOwned>(
        &self,
        path: &str,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let part = multipart::Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .context("Invalid content type")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send request")?;

        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| match e.detail {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, detail);
    }

    response.json().await.context("Failed to parse response")
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: i64,
    pub gender: String,
    pub diagnosis_code: String,
    pub lab_result: f64,
    pub medication: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_of_stay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comorbidity_score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanations {
    pub feature_importances: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub risk_probability: f64,
    pub risk_category: String,
    pub explanations: Explanations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<Map<String, Value>>,
}

/// Error body returned by the service; `detail` may be a string or structured
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub detail: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_health() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","model_loaded":false,"mode":"lite"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health: HealthReport = client.get("health").await.unwrap();

        mock.assert_async().await;
        assert_eq!(health.status, "ok");
        assert!(!health.model_loaded);
        assert_eq!(health.mode, "lite");
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict/batch")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"Please upload a CSV file"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .upload_csv::<BatchResponse>("predict/batch", "patients.txt", b"age\n1\n".to_vec())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("Please upload a CSV file"));
    }

    #[tokio::test]
    async fn test_post_prediction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict/single")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"risk_probability":0.5,"risk_category":"Medium",
                    "explanations":{"feature_importances":[{"feature":"age","importance":0.4}]}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let record = PatientRecord {
            age: 60,
            gender: "Female".to_string(),
            diagnosis_code: "I10".to_string(),
            lab_result: 120.0,
            medication: "Aspirin".to_string(),
            length_of_stay: None,
            comorbidity_score: None,
        };
        let result: PredictionResult = client.post("predict/single", &record).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.risk_category, "Medium");
        assert_eq!(result.explanations.feature_importances.len(), 1);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let record = PatientRecord {
            age: 60,
            gender: "Male".to_string(),
            diagnosis_code: "E11".to_string(),
            lab_result: 130.0,
            medication: "Metformin".to_string(),
            length_of_stay: None,
            comorbidity_score: Some(2),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("length_of_stay").is_none());
        assert_eq!(json["comorbidity_score"], 2);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
