//! Client for the Apps Script proxy in front of the spreadsheet, plus the
//! plain CSV export used for the duty schedules.
//!
//! Reads (`list`) are GET requests with `action` and `token` query
//! parameters. Writes are POSTs whose body is a JSON object sent as
//! `text/plain`, which keeps them simple requests for the script host.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::duties::{self, DutyKind, DutyRoster};
use crate::error::RemoteError;
use crate::models::{self, Member};
use crate::sheet::RawSheet;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListReply {
    members: Vec<Value>,
    attendance: RawSheet,
}

/// Canonical state as returned by the `list` action.
#[derive(Debug, Clone, Default)]
pub struct RemoteState {
    pub members: Vec<Member>,
    /// Member rows that could not be read, saved back unchanged.
    pub skipped_members: Vec<Value>,
    pub attendance: RawSheet,
}

impl RemoteState {
    /// Reads a `list` reply. A bad member row is set aside rather than
    /// failing the whole reply.
    pub fn from_reply(value: Value) -> Result<Self, RemoteError> {
        let reply: ListReply = serde_json::from_value(value)?;
        let (members, skipped_members) = models::read_members(reply.members);
        Ok(Self {
            members,
            skipped_members,
            attendance: reply.attendance,
        })
    }
}

pub struct AppsScriptClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl AppsScriptClient {
    pub fn new(url: String, token: String) -> Self {
        Self::with_client(reqwest::Client::new(), url, token)
    }

    pub fn with_client(client: reqwest::Client, url: String, token: String) -> Self {
        Self { client, url, token }
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let url = config.script_url.clone().ok_or(RemoteError::MissingUrl)?;
        Ok(Self::new(url, config.script_token.clone()))
    }

    pub async fn list(&self) -> Result<RemoteState, RemoteError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("action", "list"), ("token", self.token.as_str())])
            .send()
            .await?;
        let value = Self::read(response).await?;
        RemoteState::from_reply(value)
    }

    /// Saves the roster. `skipped` rows from the last pull are appended
    /// unchanged so the sheet keeps them.
    pub async fn save_members(&self, members: &[Member], skipped: &[Value]) -> Result<(), RemoteError> {
        self.post("saveMembers", members_payload(members, skipped)?).await?;
        tracing::info!(count = members.len(), skipped = skipped.len(), "saved members");
        Ok(())
    }

    pub async fn save_attendance(&self, sheet: &RawSheet) -> Result<(), RemoteError> {
        self.post(
            "saveAttendance",
            json!({ "headers": sheet.headers, "records": sheet.records }),
        )
        .await?;
        tracing::info!(rows = sheet.records.len(), "saved attendance");
        Ok(())
    }

    async fn post(&self, action: &str, payload: Value) -> Result<Value, RemoteError> {
        let body = request_body(action, &self.token, payload);
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn read(response: reqwest::Response) -> Result<Value, RemoteError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_reply(status, &body)
    }
}

pub fn members_payload(members: &[Member], skipped: &[Value]) -> Result<Value, RemoteError> {
    let mut rows = members
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()?;
    rows.extend(skipped.iter().cloned());
    Ok(json!({ "members": rows }))
}

/// `{action, token, ...payload}` serialised.
pub fn request_body(action: &str, token: &str, payload: Value) -> String {
    let mut body = match payload {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    body.insert("action".into(), Value::String(action.to_string()));
    body.insert("token".into(), Value::String(token.to_string()));
    Value::Object(body).to_string()
}

/// Turns a raw reply into JSON, treating a non-2xx status or a non-empty
/// `error` field as failure.
pub fn interpret_reply(status: u16, body: &str) -> Result<Value, RemoteError> {
    if !(200..300).contains(&status) {
        return Err(RemoteError::Status {
            status,
            body: body.to_string(),
        });
    }
    let value: Value = serde_json::from_str(body)?;
    match value.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(value),
        Some(Value::String(message)) if message.is_empty() => Ok(value),
        Some(Value::String(message)) => Err(RemoteError::Script(message.clone())),
        Some(other) => Err(RemoteError::Script(other.to_string())),
    }
}

pub fn export_url(sheet_id: &str, gid: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv&gid={gid}")
}

/// Reads published sheet tabs through the CSV export endpoint.
pub struct SheetExportClient {
    client: reqwest::Client,
}

impl SheetExportClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn fetch_table(&self, sheet_id: &str, gid: &str) -> Result<Vec<Vec<String>>, RemoteError> {
        let url = export_url(sheet_id, gid);
        tracing::debug!(%url, "fetching sheet export");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(duties::parse_csv(&text)?)
    }

    pub async fn fetch_duties(&self, config: &Config) -> Result<DutyRoster, RemoteError> {
        let mut roster = DutyRoster::default();
        for kind in DutyKind::ALL {
            let rows = self.fetch_table(&config.sheet_id, config.duty_gid(kind)).await?;
            tracing::info!(schedule = kind.label(), rows = rows.len(), "loaded duty schedule");
            roster.load(kind, &rows);
        }
        Ok(roster)
    }
}

impl Default for SheetExportClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_merges_action_and_token_into_payload() {
        let body = request_body("saveMembers", "secret", json!({ "members": [] }));
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["action"], "saveMembers");
        assert_eq!(value["token"], "secret");
        assert_eq!(value["members"], json!([]));
    }

    #[test]
    fn reply_errors_are_detected() {
        assert!(matches!(
            interpret_reply(500, "boom"),
            Err(RemoteError::Status { status: 500, .. })
        ));
        assert!(matches!(
            interpret_reply(200, "<html>"),
            Err(RemoteError::Payload(_))
        ));
        assert!(matches!(
            interpret_reply(200, r#"{"error":"bad token"}"#),
            Err(RemoteError::Script(message)) if message == "bad token"
        ));
        assert!(interpret_reply(200, r#"{"ok":true,"error":null}"#).is_ok());
        assert!(interpret_reply(200, r#"{"ok":true,"error":""}"#).is_ok());
    }

    #[test]
    fn list_reply_deserialises_into_state() {
        let value = interpret_reply(
            200,
            r#"{"members":[{"id":"s1","name":"서연","type":"학생"}],
                "attendance":{"headers":["memberId"],"records":[{"memberId":"s1"}]}}"#,
        )
        .unwrap();
        let state = RemoteState::from_reply(value).unwrap();
        assert_eq!(state.members.len(), 1);
        assert!(state.skipped_members.is_empty());
        assert_eq!(state.attendance.records.len(), 1);
    }

    #[test]
    fn one_bad_member_row_does_not_sink_the_list() {
        let value = interpret_reply(
            200,
            r#"{"members":[{"id":"s1","name":"서연","type":"학생"},
                           {"id":"x","name":"누구","type":""},
                           {"id":"t1","name":"김선생","type":"선생님"}]}"#,
        )
        .unwrap();
        let state = RemoteState::from_reply(value).unwrap();
        assert_eq!(state.members.len(), 2);
        assert_eq!(state.skipped_members.len(), 1);
        assert_eq!(state.skipped_members[0]["name"], "누구");
    }

    #[test]
    fn skipped_rows_are_saved_back() {
        let members = vec![Member {
            id: "s1".into(),
            name: "서연".into(),
            ..Member::default()
        }];
        let skipped = vec![json!({"id": "x", "name": "누구", "type": ""})];
        let payload = members_payload(&members, &skipped).unwrap();
        let rows = payload["members"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["type"], "학생");
        assert_eq!(rows[1], skipped[0]);
    }

    #[test]
    fn export_url_targets_csv() {
        assert_eq!(
            export_url("sheet", "42"),
            "https://docs.google.com/spreadsheets/d/sheet/export?format=csv&gid=42"
        );
    }
}
