//! The text-generation capability the phases call out to.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of one capability call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvokeResult {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
        }
    }

    pub fn into_response(self) -> Result<String, String> {
        match (self.success, self.response) {
            (true, Some(response)) => Ok(response),
            (true, None) => Err("Invocation succeeded without a response".to_string()),
            (false, _) => Err(self
                .error
                .unwrap_or_else(|| "Invocation failed".to_string())),
        }
    }
}

/// An opaque, possibly slow, possibly failing prompt → text call.
///
/// Implementations must tolerate concurrent calls; the engine issues several
/// at once during the AI filter and map phases.
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str) -> InvokeResult;
}

/// Adapts an async closure into a [`CapabilityInvoker`].
pub struct FnInvoker<F> {
    f: F,
}

impl<F> FnInvoker<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> CapabilityInvoker for FnInvoker<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = InvokeResult> + Send,
{
    async fn invoke(&self, prompt: &str) -> InvokeResult {
        (self.f)(prompt.to_string()).await
    }
}

/// Invokes once, turning failures and timeouts into an error message.
pub(crate) async fn invoke_text(
    invoker: &dyn CapabilityInvoker,
    prompt: &str,
    timeout_ms: Option<u64>,
) -> Result<String, String> {
    let result = match timeout_ms {
        Some(ms) => tokio::time::timeout(Duration::from_millis(ms), invoker.invoke(prompt))
            .await
            .map_err(|_| format!("Invocation timed out after {}ms", ms))?,
        None => invoker.invoke(prompt).await,
    };
    result.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_response() {
        assert_eq!(InvokeResult::ok("hi").into_response(), Ok("hi".to_string()));
        assert_eq!(
            InvokeResult::failed("rate limited").into_response(),
            Err("rate limited".to_string())
        );

        let empty = InvokeResult {
            success: true,
            response: None,
            error: None,
        };
        assert!(empty.into_response().is_err());
    }

    #[tokio::test]
    async fn test_fn_invoker_receives_prompt() {
        let invoker = FnInvoker::new(|prompt: String| async move {
            InvokeResult::ok(prompt.to_uppercase())
        });

        let text = invoke_text(&invoker, "ping", None).await;
        assert_eq!(text, Ok("PING".to_string()));
    }

    #[tokio::test]
    async fn test_timeout_reported_as_error() {
        let invoker = FnInvoker::new(|_prompt: String| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            InvokeResult::ok("late")
        });

        let err = invoke_text(&invoker, "ping", Some(10)).await.unwrap_err();
        assert!(err.contains("timed out"));
    }
}
