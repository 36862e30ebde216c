use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use authgate::navigation::Navigator;
use authgate::request::{RequestError, RequestOptions, Response, Transport};
use authgate::token::{TokenStore, TokenStoreError};

/// In-memory token slot so tests never touch the real OS keychain.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>, TokenStoreError> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn set(&self, token: &str) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator(pub Mutex<Vec<(String, Option<Value>)>>);

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(route, _)| route.clone())
            .collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, route: &str, params: Option<&Value>) {
        self.0
            .lock()
            .unwrap()
            .push((route.to_string(), params.cloned()));
    }
}

/// Transport that answers every request with a fixed JSON body and records
/// what it was asked to send.
pub struct ScriptedTransport {
    body: Value,
    pub seen: Mutex<Vec<RequestOptions>>,
}

impl ScriptedTransport {
    pub fn returning(body: Value) -> Self {
        Self {
            body,
            seen: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: RequestOptions) -> Result<Response, RequestError> {
        self.seen.lock().unwrap().push(request);
        Ok(Response {
            status: 200,
            header: HashMap::new(),
            data: self.body.clone(),
        })
    }
}
