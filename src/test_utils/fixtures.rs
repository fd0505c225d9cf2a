//! Canned provider responses and fixed test instants.

use crate::model::Category;

/// Identifiers shared by fixtures and assertions.
pub mod constants {
    pub const WATER_METER_ID: &str = "12709726";
    pub const OTHER_METER_ID: &str = "12709720";
    pub const ELECTRICITY_METER_ID: &str = "12709730";
    pub const HEATING_METER_ID: &str = "12709740";

    pub const TEST_TRANS_ID: &str = "StateProperties=eyJUSUQiOiJ0ZXN0In0";
    pub const TEST_CSRF: &str = "csrf-token-1";
}

/// Fixed instants for clock injection.
pub mod dates {
    use chrono::{DateTime, Local, TimeZone};

    /// 2026-01-15 12:00 local time.
    pub fn test_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }
}

/// An authorize page shaped like the identity broker's, with the given
/// transaction id in its settings literal.
pub fn authorize_page(trans_id: &str) -> String {
    let trans_id = serde_json::to_string(trans_id).unwrap();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <title>Sign in</title>
  <script>window.dataLayer = window.dataLayer || [];</script>
  <script data-container="true" nonce="abc">
    var CONTENT = {{"button_signin":"Sign in","local_intro_username":"Sign in with your username {{0}}"}};
    var SETTINGS = {{"remoteResource":"https://online.brunata.com/b2c/signin.html","retryLimit":7,"trimSpacesInPassword":true,"api":"CombinedSigninAndSignup","csrf":"page-csrf","transId":{trans_id},"pageViewId":"8c1a","config":{{"operatingMode":"Username","enableRememberMe":"true"}},"hosts":{{"tenant":"/brunatab2cprod.onmicrosoft.com/B2C_1_signin_username","policy":"B2C_1_signin_username"}},"locale":{{"lang":"en"}},"xhrSettings":{{"retryOn":["error","timeout"]}}}};
  </script>
</head>
<body><div id="api"></div></body>
</html>"#
    )
}

/// A consumption response for one category with one meter.
///
/// | category    | meter    | 2026-01-01 | 2026-01-02 |
/// |-------------|----------|------------|------------|
/// | Water       | 12709726 | 0.0        | 1.0        |
/// | Electricity | 12709730 | 10.0       | 12.0       |
/// | Heating     | 12709740 | 3.0        | 3.5        |
/// | Other       | 12709720 | 0          | 7          |
pub fn consumption_payload(category: Category) -> String {
    let (meter_id, name, first, second, unit) = match category {
        Category::Water => (constants::WATER_METER_ID, "Cold water", "0.0", "1.0", "m3"),
        Category::Electricity => (constants::ELECTRICITY_METER_ID, "Main", "10.0", "12.0", "kWh"),
        Category::Heating => (constants::HEATING_METER_ID, "Radiator", "3.0", "3.5", "units"),
        Category::Other => (constants::OTHER_METER_ID, "Sub meter", "0", "7", "kWh"),
    };
    format!(
        r#"{{
  "{category}": {{
    "Meters": {{
      "Day": {{
        "{meter_id}": {{
          "Name": "{name}",
          "Values": {{ "2026-01-01": {first}, "2026-01-02": {second} }}
        }}
      }}
    }},
    "Units": [ {{ "allocationUnit": "{code}", "unit": "{unit}" }} ]
  }}
}}"#,
        code = category.allocation_unit(),
    )
}

/// A meter inventory with the water meter and the sub meter.
pub fn meters_payload() -> String {
    format!(
        r#"[
  {{ "meterId": {}, "meterNo": "W-1", "placement": "Kitchen", "allocationUnit": "W", "superAllocationUnit": 1 }},
  {{ "meterId": "{}", "meterNo": "O-1", "placement": "Hall", "allocationUnit": "O" }}
]"#,
        constants::WATER_METER_ID,
        constants::OTHER_METER_ID
    )
}
