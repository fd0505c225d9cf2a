//! URL builders for the identity broker and the data API.
//!
//! Every URL the forwarder calls is derived here from the configured
//! roots, so tests can point the whole flow at a mock server.

use crate::brunata::pkce::PkceParams;
use crate::error::TransportError;
use crate::model::{Category, Granularity};
use chrono::{Datelike, Days, NaiveDate};
use reqwest::Url;

const API_PATH: [&str; 3] = ["online-auth-webservice", "v1", "rest"];
const DAY_WINDOW: u64 = 31;

/// Inclusive range of calendar days requested from the data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Range that holds the most recent readings for a granularity.
    ///
    /// # Format
    /// - `Day`: the 31 days ending `today`
    /// - `Month`: January 1st of `today`'s year through `today`
    pub fn ending(today: NaiveDate, granularity: Granularity) -> Self {
        let start = match granularity {
            Granularity::Day => today.checked_sub_days(Days::new(DAY_WINDOW)),
            Granularity::Month => today.with_ordinal(1),
        }
        .unwrap_or(today);
        Self { start, end: today }
    }

    fn start_param(&self) -> String {
        format!("{}T00:00:00.000Z", self.start.format("%Y-%m-%d"))
    }

    fn end_param(&self) -> String {
        format!("{}T23:59:59.999Z", self.end.format("%Y-%m-%d"))
    }
}

/// All provider URLs, derived from configuration.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    base_url: Url,
    auth_url: Url,
    policy: String,
    client_id: String,
}

impl ProviderEndpoints {
    pub fn new(
        base_url: &str,
        auth_url: &str,
        policy: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            base_url: parse_root(base_url)?,
            auth_url: parse_root(auth_url)?,
            policy: policy.into(),
            client_id: client_id.into(),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> String {
        join(&self.base_url, &["auth-response"]).to_string()
    }

    pub fn authorize_url(&self, pkce: &PkceParams) -> Url {
        let mut url = self.policy_url(&["oauth2", "v2.0", "authorize"]);
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri())
            .append_pair("scope", &format!("{} offline_access", self.client_id))
            .append_pair("response_type", "code")
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", PkceParams::METHOD);
        url
    }

    pub fn self_asserted_url(&self, trans_id: &str) -> Url {
        let mut url = self.policy_url(&["SelfAsserted"]);
        url.query_pairs_mut()
            .append_pair("tx", trans_id)
            .append_pair("p", &self.policy);
        url
    }

    pub fn confirmed_url(&self, csrf_token: &str, trans_id: &str) -> Url {
        let mut url = self.policy_url(&["api", "CombinedSigninAndSignup", "confirmed"]);
        url.query_pairs_mut()
            .append_pair("rememberMe", "false")
            .append_pair("csrf_token", csrf_token)
            .append_pair("tx", trans_id)
            .append_pair("p", &self.policy);
        url
    }

    pub fn token_url(&self) -> Url {
        self.policy_url(&["oauth2", "v2.0", "token"])
    }

    pub fn meters_url(&self, range: &DateRange) -> Url {
        let mut url = self.api_url(&["consumer", "meters"]);
        url.query_pairs_mut()
            .append_pair("startdate", &range.start_param())
            .append_pair("enddate", &range.end_param());
        url
    }

    pub fn consumption_url(
        &self,
        category: Category,
        granularity: Granularity,
        range: &DateRange,
    ) -> Url {
        let mut url = self.api_url(&["consumer", "consumption"]);
        url.query_pairs_mut()
            .append_pair("startdate", &range.start_param())
            .append_pair("enddate", &range.end_param())
            .append_pair("interval", granularity.interval())
            .append_pair("allocationunit", category.allocation_unit());
        url
    }

    fn policy_url(&self, segments: &[&str]) -> Url {
        let mut path = vec![self.policy.as_str()];
        path.extend_from_slice(segments);
        join(&self.auth_url, &path)
    }

    fn api_url(&self, segments: &[&str]) -> Url {
        let mut path = API_PATH.to_vec();
        path.extend_from_slice(segments);
        join(&self.base_url, &path)
    }
}

fn parse_root(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| TransportError::invalid_url(raw, e))?;
    if url.cannot_be_a_base() {
        return Err(TransportError::invalid_url(raw, "not a base URL"));
    }
    Ok(url)
}

fn join(root: &Url, segments: &[&str]) -> Url {
    let mut url = root.clone();
    // roots are checked by parse_root, so this always succeeds
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
