use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{CredentialStore, Credentials, Token};
use crate::dashboard::PinStore;
use crate::error::{PipedashError, Result};

pub const SESSION_VERSION: &str = "1.0";

/// Portable session file: credentials and pin order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_repos: Option<Vec<u64>>,
}

/// A validated session ready to be written to the stores.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionImport {
    pub credentials: Option<Credentials>,
    pub pinned_repos: Option<Vec<u64>>,
}

pub fn export(credentials: Option<&Credentials>, pins: &PinStore) -> SessionDocument {
    SessionDocument {
        version: SESSION_VERSION.to_string(),
        export_date: Utc::now(),
        credentials: credentials.cloned(),
        pinned_repos: Some(pins.get_all()),
    }
}

/// Validates a session file.
///
/// The whole document is checked before anything is returned, so a rejected
/// file never leads to a partial import.
pub fn parse(content: &str) -> Result<SessionImport> {
    let document: Value = serde_json::from_str(content)
        .map_err(|e| PipedashError::Import(format!("not valid JSON: {e}")))?;

    let Value::Object(fields) = document else {
        return Err(PipedashError::Import(
            "expected a JSON object at the top level".into(),
        ));
    };

    match fields.get("version") {
        Some(Value::String(version)) if !version.trim().is_empty() => {}
        Some(_) => {
            return Err(PipedashError::Import(
                "\"version\" must be a non-empty string".into(),
            ))
        }
        None => return Err(PipedashError::Import("missing \"version\"".into())),
    }

    let credentials = match fields.get("credentials") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_credentials(value)?),
    };

    let pinned_repos = match fields.get("pinnedRepos") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_pins(value)?),
    };

    Ok(SessionImport {
        credentials,
        pinned_repos,
    })
}

fn parse_credentials(value: &Value) -> Result<Credentials> {
    let Value::Object(fields) = value else {
        return Err(PipedashError::Import(
            "\"credentials\" must be an object".into(),
        ));
    };

    let field = |name: &str| -> Result<String> {
        match fields.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
            _ => Err(PipedashError::Import(format!(
                "\"credentials.{name}\" must be a non-empty string"
            ))),
        }
    };

    Ok(Credentials {
        username: field("username")?,
        token: Token::from(field("token")?.as_str()),
    })
}

fn parse_pins(value: &Value) -> Result<Vec<u64>> {
    let Value::Array(items) = value else {
        return Err(PipedashError::Import("\"pinnedRepos\" must be an array".into()));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_u64().ok_or_else(|| {
                PipedashError::Import(format!(
                    "\"pinnedRepos[{index}]\" must be a project id number, got {item}"
                ))
            })
        })
        .collect()
}

/// Writes a validated session into the stores. Absent sections are left alone.
///
/// Pins are written first and restored if the credentials cannot be saved.
pub fn apply(
    session: SessionImport,
    credentials: &mut CredentialStore,
    pins: &mut PinStore,
) -> Result<()> {
    let previous_pins = pins.get_all();
    if let Some(ids) = session.pinned_repos {
        info!("Importing {} pinned projects", ids.len());
        pins.set_all(ids)?;
    }

    if let Some(creds) = session.credentials {
        if let Err(e) = credentials.save(creds) {
            warn!("Credentials import failed, restoring previous pins");
            pins.set_all(previous_pins)?;
            return Err(e);
        }
    }

    Ok(())
}
