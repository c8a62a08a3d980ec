//! Client for the NREL PVWatts v8 web service.
use super::{
    HOURS_PER_PROFILE, MONTHS_PER_YEAR, ProductionModel, ProductionOutput, ProductionRequest,
    ProductionServiceError,
};
use crate::units::Energy;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

/// Default endpoint of the PVWatts v8 JSON API
pub const PVWATTS_URL: &str = "https://developer.nrel.gov/api/pvwatts/v8.json";

/// PVWatts reports hourly AC output in Wh
const WH_PER_KWH: f64 = 1000.0;

/// A PVWatts client bound to one API key
pub struct PvWattsClient {
    client: Client,
    api_key: String,
    url: String,
}

#[derive(Deserialize)]
struct PvWattsResponse {
    #[serde(default)]
    errors: Vec<String>,
    outputs: Option<PvWattsOutputs>,
}

#[derive(Deserialize)]
struct PvWattsOutputs {
    ac_annual: Option<f64>,
    #[serde(default)]
    ac_monthly: Vec<f64>,
    #[serde(default)]
    ac: Vec<f64>,
}

impl PvWattsClient {
    /// Returns a new client for the public endpoint
    ///
    /// # Arguments
    ///
    /// * `api_key` - the NREL developer API key
    pub fn new(api_key: &str) -> Result<Self, ProductionServiceError> {
        Self::with_url(api_key, PVWATTS_URL)
    }

    /// Returns a new client for an alternative endpoint
    pub fn with_url(api_key: &str, url: &str) -> Result<Self, ProductionServiceError> {
        if api_key.trim().is_empty() {
            return Err(ProductionServiceError::MissingApiKey);
        }
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
        })
    }

    /// The query string sent for `request`
    pub fn query_params(&self, request: &ProductionRequest) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", self.api_key.clone()),
            ("format", "json".into()),
            ("timeframe", "hourly".into()),
            ("system_capacity", request.system_capacity.value().to_string()),
            ("module_type", request.module_type.code().to_string()),
            ("losses", request.total_loss_percent.to_string()),
            ("array_type", request.array_type.code().to_string()),
            ("tilt", request.tilt.to_string()),
            ("azimuth", request.azimuth.to_string()),
            ("lat", request.latitude.to_string()),
            ("lon", request.longitude.to_string()),
            ("dc_ac_ratio", "1.2".into()),
            ("gcr", "0.4".into()),
            ("inv_eff", "96".into()),
            ("radius", "0".into()),
            ("dataset", "nsrdb".into()),
            ("bifaciality", "0".into()),
            ("albedo", "0.2".into()),
            ("soiling", ["0"; MONTHS_PER_YEAR].join("|")),
        ]
    }
}

/// Decode a PVWatts JSON body into a production profile
pub fn parse_response(body: &str) -> Result<ProductionOutput, ProductionServiceError> {
    let response: PvWattsResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        return Err(ProductionServiceError::Validation(response.errors));
    }

    let outputs = response.outputs.ok_or_else(|| {
        ProductionServiceError::MalformedResponse("response has no outputs".into())
    })?;
    let annual = outputs.ac_annual.ok_or_else(|| {
        ProductionServiceError::MalformedResponse("response has no annual output".into())
    })?;
    if outputs.ac_monthly.len() != MONTHS_PER_YEAR {
        return Err(ProductionServiceError::MalformedResponse(format!(
            "expected {MONTHS_PER_YEAR} monthly values, got {}",
            outputs.ac_monthly.len()
        )));
    }
    if outputs.ac.len() != HOURS_PER_PROFILE {
        return Err(ProductionServiceError::MalformedResponse(format!(
            "expected {HOURS_PER_PROFILE} hourly values, got {}",
            outputs.ac.len()
        )));
    }

    Ok(ProductionOutput {
        annual: Energy(annual),
        monthly: outputs.ac_monthly.into_iter().map(Energy).collect(),
        hourly: outputs
            .ac
            .into_iter()
            .map(|wh| Energy(wh / WH_PER_KWH))
            .collect(),
    })
}

impl ProductionModel for PvWattsClient {
    async fn estimate(
        &self,
        request: &ProductionRequest,
    ) -> Result<ProductionOutput, ProductionServiceError> {
        debug!("Requesting production estimate from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .query(&self.query_params(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProductionServiceError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::production_request;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use serde_json::json;

    fn response_body(monthly: usize, hourly: usize) -> String {
        json!({
            "inputs": {},
            "errors": [],
            "warnings": [],
            "outputs": {
                "ac_annual": 12_000.0,
                "ac_monthly": vec![1000.0; monthly],
                "ac": vec![1500.0; hourly],
            }
        })
        .to_string()
    }

    #[rstest]
    fn test_query_params(production_request: ProductionRequest) {
        let client = PvWattsClient::new("DEMO_KEY").unwrap();
        let params = client.query_params(&production_request);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("api_key"), "DEMO_KEY");
        assert_eq!(get("system_capacity"), "19.2");
        assert_eq!(get("array_type"), "1");
        assert_eq!(get("module_type"), "0");
        assert_eq!(get("losses"), "14.08");
        assert_eq!(get("dataset"), "nsrdb");
        assert_eq!(get("soiling"), "0|0|0|0|0|0|0|0|0|0|0|0");
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            PvWattsClient::new("  "),
            Err(ProductionServiceError::MissingApiKey)
        ));
    }

    #[test]
    fn test_parse_response() {
        let output = parse_response(&response_body(MONTHS_PER_YEAR, HOURS_PER_PROFILE)).unwrap();
        assert_eq!(output.annual, Energy(12_000.0));
        assert_eq!(output.monthly.len(), MONTHS_PER_YEAR);
        assert_approx_eq!(Energy, output.hourly[0], Energy(1.5));
    }

    #[test]
    fn test_parse_validation_errors() {
        let body = json!({"errors": ["lat must be between -90 and 90"], "outputs": {}}).to_string();
        match parse_response(&body) {
            Err(ProductionServiceError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("Unexpected result: {other:?}"),
        }
    }

    #[rstest]
    #[case(response_body(11, HOURS_PER_PROFILE))]
    #[case(response_body(MONTHS_PER_YEAR, 0))]
    #[case(json!({"errors": []}).to_string())]
    #[case(json!({"errors": [], "outputs": {}}).to_string())]
    fn test_parse_malformed(#[case] body: String) {
        assert!(matches!(
            parse_response(&body),
            Err(ProductionServiceError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_response("<html>"),
            Err(ProductionServiceError::Decode(_))
        ));
    }
}
