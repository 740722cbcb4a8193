//! Readings from a JSON-RPC 2.0 API over HTTP
//!
//! The whole device state is fetched with one request on first use and every
//! identifier is then a JSON pointer into the `result` of that response.
//!
//! `walk` understands one extension to JSON pointers: `/0/fans#speed` walks
//! every element of the `/0/fans` collection and reads `speed` from each.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::{DeviceReader, ReadError, Reading};

/// The call to make
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

pub struct JsonRpcReader {
    url: Url,
    host: String,
    username: String,
    password: String,
    request: RpcRequest,
    client: Client,
    result: Option<Value>,
}

impl JsonRpcReader {
    pub fn new(
        url: &str,
        username: &str,
        password: &str,
        request: RpcRequest,
        timeout: Duration,
        insecure: bool,
    ) -> Result<JsonRpcReader, ReadError> {
        let url = Url::parse(url)
            .map_err(|e| ReadError::Parse(format!("invalid API url {}: {}", url, e)))?;
        let host = match url.host_str() {
            Some(host) => host.to_owned(),
            None => return Err(ReadError::Parse(format!("API url {} has no host", url))),
        };
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()?;
        Ok(JsonRpcReader {
            url,
            host,
            username: username.to_owned(),
            password: password.to_owned(),
            request,
            client,
            result: None,
        })
    }

    /// A reader over a response that has already been fetched
    #[cfg(test)]
    pub(crate) fn with_result(result: Value) -> JsonRpcReader {
        JsonRpcReader {
            url: Url::parse("https://device.test/command-api").unwrap(),
            host: "device.test".into(),
            username: String::new(),
            password: String::new(),
            request: RpcRequest {
                method: "runCmds".into(),
                params: Value::Null,
            },
            client: Client::new(),
            result: Some(result),
        }
    }

    fn fetch(&mut self) -> Result<&Value, ReadError> {
        if self.result.is_none() {
            let body = json!({
                "jsonrpc": "2.0",
                "method": self.request.method,
                "params": self.request.params,
                "id": concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")),
            });
            debug!("POST {} {}", self.url, self.request.method);
            let resp = self
                .client
                .post(self.url.clone())
                .basic_auth(&self.username, Some(&self.password))
                .json(&body)
                .send()?;
            let status = resp.status();
            if !status.is_success() {
                return Err(ReadError::Unreachable(format!(
                    "{} returned HTTP {}",
                    self.url, status
                )));
            }
            let mut doc: Value = resp.json()?;
            if let Some(err) = doc.get("error") {
                return Err(ReadError::Unreachable(format!("API error: {}", err)));
            }
            let result = doc
                .get_mut("result")
                .map(Value::take)
                .ok_or_else(|| ReadError::Parse("response has no result".into()))?;
            self.result = Some(result);
        }
        self.result
            .as_ref()
            .ok_or_else(|| ReadError::Parse("response has no result".into()))
    }
}

fn to_reading(id: &str, value: &Value) -> Result<Reading, ReadError> {
    match *value {
        Value::Bool(b) => Ok(Reading::Flag(b)),
        Value::Number(ref n) => n
            .as_i64()
            .map(Reading::Integer)
            .or_else(|| n.as_f64().map(Reading::Real))
            .ok_or_else(|| ReadError::Parse(format!("{}: {}", id, n))),
        Value::String(ref s) => Ok(Reading::Text(s.clone())),
        Value::Null => Err(ReadError::NotSupported(id.to_owned())),
        ref other => Err(ReadError::Parse(format!("{} is not a scalar: {}", id, other))),
    }
}

fn children(value: &Value) -> Vec<(String, &Value)> {
    match *value {
        Value::Array(ref items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| ((i + 1).to_string(), v))
            .collect(),
        Value::Object(ref map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        _ => Vec::new(),
    }
}

impl DeviceReader for JsonRpcReader {
    fn identity(&self) -> &str {
        &self.host
    }

    fn probe(&mut self) -> Result<(), ReadError> {
        self.fetch().map(|_| ())
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError> {
        let result = self.fetch()?;
        let value = result
            .pointer(id)
            .ok_or_else(|| ReadError::NotSupported(id.to_owned()))?;
        let reading = to_reading(id, value)?;
        info!("{} = {}", id, reading);
        Ok(reading)
    }

    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError> {
        let (table, field) = match id.find('#') {
            Some(pos) => (&id[..pos], Some(&id[pos + 1..])),
            None => (id, None),
        };
        let result = self.fetch()?;
        let collection = result
            .pointer(table)
            .ok_or_else(|| ReadError::NotSupported(id.to_owned()))?;
        let mut found = BTreeMap::new();
        for (key, item) in children(collection) {
            let value = match field {
                Some(field) => match item.get(field) {
                    Some(v) => v,
                    None => continue,
                },
                None => item,
            };
            if let Ok(reading) = to_reading(id, value) {
                found.insert(key, reading);
            }
        }
        if found.is_empty() {
            return Err(ReadError::NotSupported(id.to_owned()));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reader() -> JsonRpcReader {
        JsonRpcReader::with_result(json!([
            {
                "tempSensors": [
                    {"name": "TempSensor1", "currentTemperature": 41.5},
                    {"name": "TempSensor2", "currentTemperature": 38}
                ],
                "systemStatus": "temperatureOk"
            },
            {
                "memTotal": 8000000,
                "memFree": 2000000,
                "uptime": 99612.3
            }
        ]))
    }

    #[test]
    fn pointers_into_result() {
        let mut r = reader();
        assert_eq!(r.read("/1/memTotal").unwrap(), Reading::Integer(8_000_000));
        assert_eq!(r.read("/1/uptime").unwrap(), Reading::Real(99612.3));
        assert_eq!(
            r.read("/0/systemStatus").unwrap(),
            Reading::Text("temperatureOk".into())
        );
    }

    #[test]
    fn missing_pointers_are_not_supported() {
        let mut r = reader();
        match r.read("/2/powerSupplies") {
            Err(ReadError::NotSupported(_)) => {}
            other => panic!("expected NotSupported, got {:?}", other),
        }
        match r.read("/0/tempSensors") {
            Err(ReadError::Parse(_)) => {}
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn walks_a_field_of_every_element() {
        let mut r = reader();
        let temps = r.walk("/0/tempSensors#currentTemperature").unwrap();
        assert_eq!(temps.len(), 2);
        assert_eq!(temps["1"], Reading::Real(41.5));
        assert_eq!(temps["2"], Reading::Integer(38));
    }

    #[test]
    fn identity_is_the_api_host() {
        assert_eq!(reader().identity(), "device.test");
        let r = JsonRpcReader::new(
            "https://sw1.example.net:8443/command-api",
            "admin",
            "",
            RpcRequest {
                method: "runCmds".into(),
                params: Value::Null,
            },
            Duration::from_secs(1),
            false,
        )
        .unwrap();
        assert_eq!(r.identity(), "sw1.example.net");
    }

    #[test]
    fn bad_urls_are_rejected() {
        let request = RpcRequest {
            method: "runCmds".into(),
            params: Value::Null,
        };
        assert!(JsonRpcReader::new("sw1/command-api", "", "", request, Duration::from_secs(1), false).is_err());
    }

    #[test]
    fn walks_an_object() {
        let mut r = reader();
        let mem = r.walk("/1").unwrap();
        assert_eq!(mem["memFree"], Reading::Integer(2_000_000));
        assert!(r.walk("/0/tempSensors#fanSpeed").is_err());
    }
}
