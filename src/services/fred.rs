// src/services/fred.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::{EconomicRelease, Observation};
use crate::services::provider::{
    EconomicDataProvider, ProviderError, ProviderResult, ReleaseCalendarProvider,
};

const FRED_BASE_URL: &str = "https://api.stlouisfed.org/fred";
const PROVIDER: &str = "FRED";
const RELEASE_DATES_LIMIT: usize = 1000;
const MAX_RELEASE_PAGES: usize = 5;

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseDatesResponse {
    release_dates: Vec<RawReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct RawReleaseDate {
    release_id: u32,
    release_name: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct FredErrorBody {
    error_message: String,
}

/// FRED client serving both the series observations and the release calendar.
#[derive(Clone)]
pub struct FredClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl FredClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        FredClient {
            client,
            api_key,
            base_url: FRED_BASE_URL.to_string(),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> ProviderResult<&str> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey { provider: PROVIDER })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {} {:?}", url, query.iter().map(|(k, _)| *k).collect::<Vec<_>>());

        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }
        Ok(resp.json::<T>().await?)
    }
}

/// FRED answers a bad key with 400 and an `api_key` message rather than 401.
fn classify_error(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<FredErrorBody>(body)
        .map(|b| b.error_message)
        .unwrap_or_else(|_| body.trim().to_string());

    let key_problem = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || (status == StatusCode::BAD_REQUEST && message.contains("api_key"));
    if key_problem {
        ProviderError::Unauthorized {
            provider: PROVIDER,
            message,
        }
    } else {
        ProviderError::Http(format!("{}: {}", status, message))
    }
}

fn parse_date(raw: &str) -> ProviderResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| ProviderError::Decode(format!("bad date '{}': {}", raw, e)))
}

fn parse_observations(resp: ObservationsResponse) -> ProviderResult<Vec<Observation>> {
    resp.observations
        .into_iter()
        .map(|raw| {
            Ok(Observation {
                date: parse_date(&raw.date)?,
                // "." is FRED's marker for a missing value
                value: raw.value.trim().parse::<f64>().ok(),
            })
        })
        .collect()
}

fn parse_release_dates(resp: ReleaseDatesResponse) -> ProviderResult<Vec<EconomicRelease>> {
    resp.release_dates
        .into_iter()
        .map(|raw| {
            Ok(EconomicRelease {
                date: parse_date(&raw.date)?,
                release_name: raw.release_name,
                release_id: raw.release_id,
            })
        })
        .collect()
}

/// Offset of the page after one that returned `page_len` rows; `None` once
/// a short page shows the window is exhausted.
fn next_page_offset(offset: usize, page_len: usize) -> Option<usize> {
    (page_len >= RELEASE_DATES_LIMIT).then(|| offset + page_len)
}

#[async_trait]
impl EconomicDataProvider for FredClient {
    async fn fetch_series(&self, series_id: &str) -> ProviderResult<Vec<Observation>> {
        let key = self.api_key()?.to_string();
        info!("Fetching FRED series {}", series_id);

        let resp: ObservationsResponse = self
            .get_json(
                "series/observations",
                &[
                    ("series_id", series_id.to_string()),
                    ("api_key", key),
                    ("file_type", "json".to_string()),
                ],
            )
            .await?;
        let observations = parse_observations(resp)?;
        if observations.is_empty() {
            return Err(ProviderError::NoData(series_id.to_string()));
        }
        Ok(observations)
    }
}

#[async_trait]
impl ReleaseCalendarProvider for FredClient {
    async fn fetch_calendar_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<EconomicRelease>> {
        let key = self.api_key()?.to_string();
        info!("Fetching FRED release calendar {} .. {}", start, end);

        let mut releases = Vec::new();
        let mut offset = 0;
        for page in 0..MAX_RELEASE_PAGES {
            let resp: ReleaseDatesResponse = self
                .get_json(
                    "releases/dates",
                    &[
                        ("api_key", key.clone()),
                        ("file_type", "json".to_string()),
                        ("realtime_start", start.to_string()),
                        ("realtime_end", end.to_string()),
                        ("limit", RELEASE_DATES_LIMIT.to_string()),
                        ("offset", offset.to_string()),
                        ("sort_order", "asc".to_string()),
                        ("order_by", "release_date".to_string()),
                        ("include_release_dates_with_no_data", "true".to_string()),
                    ],
                )
                .await?;
            let rows = parse_release_dates(resp)?;
            let next = next_page_offset(offset, rows.len());
            releases.extend(rows);
            match next {
                Some(_) if page + 1 == MAX_RELEASE_PAGES => warn!(
                    "FRED release calendar {} .. {} truncated at {} rows",
                    start,
                    end,
                    releases.len()
                ),
                Some(next) => offset = next,
                None => break,
            }
        }
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_become_none() {
        let body = r#"{"observations":[
            {"realtime_start":"2024-05-01","realtime_end":"2024-05-01","date":"2024-04-29","value":"4.61"},
            {"realtime_start":"2024-05-01","realtime_end":"2024-05-01","date":"2024-04-30","value":"."}
        ]}"#;
        let resp: ObservationsResponse = serde_json::from_str(body).unwrap();
        let obs = parse_observations(resp).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].value, Some(4.61));
        assert_eq!(obs[1].value, None);
        assert_eq!(obs[1].date, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
    }

    #[test]
    fn release_dates_are_parsed() {
        let body = r#"{"realtime_start":"2024-05-01","release_dates":[
            {"release_id":10,"release_name":"Consumer Price Index","date":"2024-05-15"}
        ]}"#;
        let resp: ReleaseDatesResponse = serde_json::from_str(body).unwrap();
        let releases = parse_release_dates(resp).unwrap();

        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].release_id, 10);
        assert_eq!(releases[0].release_name, "Consumer Price Index");
    }

    #[test]
    fn full_release_pages_continue() {
        assert_eq!(next_page_offset(0, RELEASE_DATES_LIMIT), Some(1000));
        assert_eq!(next_page_offset(1000, RELEASE_DATES_LIMIT), Some(2000));
        assert_eq!(next_page_offset(1000, 12), None);
        assert_eq!(next_page_offset(0, 0), None);
    }

    #[test]
    fn bad_key_is_an_auth_error() {
        let body = r#"{"error_code":400,"error_message":"Bad Request.  The value for variable api_key is not registered."}"#;
        let err = classify_error(StatusCode::BAD_REQUEST, body);
        assert!(err.is_auth());

        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, "oops");
        assert!(!err.is_auth());
    }

    #[tokio::test]
    async fn fetch_without_key_fails_fast() {
        let fred = FredClient::new(Client::new(), None);
        let err = fred.fetch_series("DGS10").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey { .. }));
    }
}
