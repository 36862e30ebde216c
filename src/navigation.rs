use serde_json::Value;

/// Route of the login screen the app falls back to when a request cannot be
/// authenticated.
pub const LOGIN_ROUTE: &str = "/pages/login/login";

/// View-stack navigation, implemented by the embedding application. Calls are
/// fire-and-forget; the request path never waits on the navigation outcome.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, route: &str, params: Option<&Value>);
}

// Helper to standardize the login redirect both failure paths share
pub fn redirect_to_login<N: Navigator>(navigator: &N) {
    navigator.navigate_to(LOGIN_ROUTE, None);
}

#[cfg(test)]
pub struct MockNavigator(pub std::sync::Mutex<Vec<(String, Option<Value>)>>);

#[cfg(test)]
impl Default for MockNavigator {
    fn default() -> Self {
        Self(std::sync::Mutex::new(vec![]))
    }
}

#[cfg(test)]
impl Navigator for MockNavigator {
    fn navigate_to(&self, route: &str, params: Option<&Value>) {
        self.0
            .lock()
            .unwrap()
            .push((route.to_string(), params.cloned()));
    }
}
