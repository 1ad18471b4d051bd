// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::DemographicsSource;
use crate::adk::error::{FetchError, ReportError};
use crate::submarket::config::ArcGisSettings;
use crate::submarket::state::Record;

const PROVIDER: &str = "arcgis";

/// Variables requested from the enrichment service, in report column order
pub const DEMOGRAPHIC_VARIABLES: [&str; 25] = [
    "AGEBASE_CY",
    "POPGRW20CY",
    "POPGRWCYFY",
    "TOTHH_CY",
    "HHGRW20CY",
    "HHGRWCYFY",
    "AVGHHSZ_CY",
    "MEDHINC_CY",
    "MHIGRWCYFY",
    "AVGHINC_CY",
    "PCI_CY",
    "MEDDI_CY",
    "MEDVAL_CY",
    "AVGVAL_CY",
    "EMP_CY",
    "UNEMPRT_CY",
    "DPOP_CY",
    "DPOPWRK_CY",
    "TOTHU_CY",
    "VACANT_CY",
    "OWNER_CY",
    "RENTER_CY",
    "EDUCBASECY",
    "BACHDEG_CY",
    "GRADDEG_CY",
];

/// GeoEnrichment client. Each lookup exchanges credentials for a token first.
pub struct ArcGisClient {
    client: Client,
    token_url: String,
    enrich_url: String,
    referer: String,
    username: String,
    password: String,
}

impl ArcGisClient {
    pub fn new(settings: &ArcGisSettings) -> Result<Self, ReportError> {
        let username = crate::submarket::config::require(&settings.username, "ARCGIS_USERNAME")?;
        let password = crate::submarket::config::require(&settings.password, "ARCGIS_PASSWORD")?;
        Ok(Self {
            client: Client::new(),
            token_url: settings.token_url.clone(),
            enrich_url: settings.enrich_url.clone(),
            referer: settings.portal_url.clone(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Value, FetchError> {
        let resp = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| FetchError::transport(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FetchError::malformed(PROVIDER, e.to_string()))?;
        check_service_error(&body)?;
        Ok(body)
    }

    async fn token(&self) -> Result<String, FetchError> {
        let body = self
            .post_form(
                &self.token_url,
                &[
                    ("username", self.username.as_str()),
                    ("password", self.password.as_str()),
                    ("referer", self.referer.as_str()),
                    ("f", "json"),
                ],
            )
            .await?;

        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::malformed(PROVIDER, "no token in response"))
    }
}

/// The service reports failures as HTTP 200 with an `error` object
fn check_service_error(body: &Value) -> Result<(), FetchError> {
    match body.get("error") {
        Some(error) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown service error");
            let code = error.get("code").and_then(Value::as_i64);
            Err(FetchError::malformed(
                PROVIDER,
                match code {
                    Some(code) => format!("{} (code {})", message, code),
                    None => message.to_string(),
                },
            ))
        }
        None => Ok(()),
    }
}

fn study_areas(address: &str) -> String {
    json!([{ "address": { "text": address } }]).to_string()
}

/// `results[0].value.FeatureSet[0].features[0].attributes`
fn extract_attributes(body: &Value) -> Result<Record, FetchError> {
    body.pointer("/results/0/value/FeatureSet/0/features/0/attributes")
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| {
            FetchError::malformed(PROVIDER, "enrichment response has no feature attributes")
        })
}

#[async_trait]
impl DemographicsSource for ArcGisClient {
    async fn demographic_record(&self, address: &str) -> Result<Record, FetchError> {
        let token = self.token().await?;
        let areas = study_areas(address);
        let variables = DEMOGRAPHIC_VARIABLES.join(",");

        let body = self
            .post_form(
                &self.enrich_url,
                &[
                    ("token", token.as_str()),
                    ("studyAreas", areas.as_str()),
                    ("analysisVariables", variables.as_str()),
                    ("f", "json"),
                ],
            )
            .await?;

        extract_attributes(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_credentials() {
        let settings = ArcGisSettings::default();
        let err = ArcGisClient::new(&settings).err().unwrap();
        assert!(err.to_string().contains("ARCGIS_USERNAME"));

        let settings = ArcGisSettings {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
            ..ArcGisSettings::default()
        };
        assert!(ArcGisClient::new(&settings).is_ok());
    }

    #[test]
    fn test_extract_attributes() {
        let body = json!({
            "results": [{
                "value": {
                    "FeatureSet": [{
                        "features": [{
                            "attributes": {"TOTHH_CY": 4211, "MEDHINC_CY": 81234}
                        }]
                    }]
                }
            }]
        });
        let attributes = extract_attributes(&body).unwrap();
        assert_eq!(attributes["TOTHH_CY"], 4211);

        assert!(matches!(
            extract_attributes(&json!({"results": []})),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn test_service_error_body() {
        let body = json!({"error": {"code": 498, "message": "Invalid token."}});
        let err = check_service_error(&body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "arcgis returned an unexpected payload: Invalid token. (code 498)"
        );
        assert!(check_service_error(&json!({"token": "abc"})).is_ok());
    }

    #[test]
    fn test_study_areas_payload() {
        let payload = study_areas("123 Main St, Austin, TX 78701");
        let areas: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(areas[0]["address"]["text"], "123 Main St, Austin, TX 78701");
    }

    #[test]
    fn test_variable_list() {
        assert_eq!(DEMOGRAPHIC_VARIABLES.len(), 25);
        assert_eq!(DEMOGRAPHIC_VARIABLES[0], "AGEBASE_CY");
        assert_eq!(DEMOGRAPHIC_VARIABLES[24], "GRADDEG_CY");
    }
}
