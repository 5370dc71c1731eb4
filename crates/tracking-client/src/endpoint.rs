/// Where the client is running; native builds talk to the host machine
/// through the emulator bridge, browsers hit localhost directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeContext {
    Native,
    Browser,
}

/// Resolves the tracking endpoint: `TRACKING_SERVER_URL` wins when set,
/// otherwise a local default per runtime context.
pub fn server_url(context: RuntimeContext) -> String {
    if let Ok(url) = std::env::var("TRACKING_SERVER_URL") {
        if !url.is_empty() {
            return url;
        }
    }
    match context {
        RuntimeContext::Native => "ws://10.0.2.2:3000/tracking".to_string(),
        RuntimeContext::Browser => "ws://localhost:3000/tracking".to_string(),
    }
}
