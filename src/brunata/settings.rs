//! Extraction of the settings literal embedded in the authorize page.
//!
//! The identity broker renders its login page with a script that assigns
//! a JSON object to a global variable. Only that object is needed; no
//! script is ever evaluated.

use crate::error::ParseError;
use scraper::{Html, Selector};
use serde_derive::Deserialize;

/// Variable the identity broker assigns its page settings to.
pub const SETTINGS_VARIABLE: &str = "SETTINGS";

/// The fields of the settings literal the handshake depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeSettings {
    pub trans_id: String,
    /// Page-level csrf value, only used for diagnostics
    pub csrf: Option<String>,
    pub api: Option<String>,
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(rename = "transId")]
    trans_id: Option<String>,
    csrf: Option<String>,
    api: Option<String>,
}

/// Reads handshake settings out of an authorize page.
///
/// Kept behind a trait so a change in the provider's page format only
/// touches one implementation.
pub trait HandshakePageParser: Send + Sync {
    fn parse(&self, page: &str) -> Result<HandshakeSettings, ParseError>;
}

/// Scans `<script>` elements for `var <variable> = {...}`.
#[derive(Debug, Clone)]
pub struct ScriptSettingsParser {
    variable: &'static str,
}

impl Default for ScriptSettingsParser {
    fn default() -> Self {
        Self {
            variable: SETTINGS_VARIABLE,
        }
    }
}

impl HandshakePageParser for ScriptSettingsParser {
    fn parse(&self, page: &str) -> Result<HandshakeSettings, ParseError> {
        let literal = self.find_literal(page)?;
        let raw: RawSettings = serde_json::from_str(&literal)?;

        Ok(HandshakeSettings {
            trans_id: raw
                .trans_id
                .filter(|id| !id.is_empty())
                .ok_or(ParseError::MissingField("transId"))?,
            csrf: raw.csrf,
            api: raw.api,
        })
    }
}

impl ScriptSettingsParser {
    fn find_literal(&self, page: &str) -> Result<String, ParseError> {
        let document = Html::parse_document(page);
        let selector = Selector::parse("script").map_err(|_| self.not_found())?;

        let mut unbalanced = false;
        for script in document.select(&selector) {
            let text = script.text().collect::<String>();
            for start in assignment_starts(&text, self.variable) {
                match balanced_object(&text[start..]) {
                    Some(literal) => return Ok(literal.to_string()),
                    None => unbalanced = true,
                }
            }
        }

        if unbalanced {
            Err(ParseError::UnbalancedLiteral {
                variable: self.variable.to_string(),
            })
        } else {
            Err(self.not_found())
        }
    }

    fn not_found(&self) -> ParseError {
        ParseError::ScriptNotFound {
            variable: self.variable.to_string(),
        }
    }
}

/// Byte offsets of each `{` that opens an object assigned to `variable`.
fn assignment_starts<'a>(script: &'a str, variable: &'a str) -> impl Iterator<Item = usize> + 'a {
    script.match_indices(variable).filter_map(move |(index, _)| {
        let before = script[..index].chars().next_back();
        if before.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.') {
            return None;
        }
        let after = index + variable.len();
        let rest = script[after..].trim_start();
        let rest = rest.strip_prefix('=')?;
        if rest.starts_with('=') {
            return None;
        }
        let value = rest.trim_start();
        value
            .starts_with('{')
            .then(|| script.len() - value.len())
    })
}

/// The object literal at the start of `text`, up to its matching brace.
///
/// Braces inside string literals do not count.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=index]);
                }
            }
            _ => {}
        }
    }
    None
}
