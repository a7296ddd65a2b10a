//! Chat Proxy (C9): the external chat front end this gateway serves tools
//! to. Interface-only per spec.md §2 — C9 lives outside this crate's
//! process boundary; this module exists so the rest of the gateway has a
//! concrete seam to call through rather than a bare `TODO`.
//!
//! The one behavior spec.md's Open Questions ties to C9 is whether an
//! extracted seismic image is injected into the chat model's context
//! automatically or only on explicit request (spec.md §9, first Open
//! Question). That choice is made configurable here rather than hardcoded,
//! so a deployment can pick either without touching [`crate::server`].

use serde::{Deserialize, Serialize};

/// When an extraction produces a renderable image, whether it is attached
/// to the tool response automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageDeliveryMode {
    /// Attach the image to every extraction response that produces one.
    Always,
    /// Only attach when the instruction or tool arguments explicitly ask
    /// for a visualization (matches spec.md's described default).
    OnRequest,
    /// Never attach; callers must fetch the image via a dedicated tool.
    Never,
}

impl Default for ImageDeliveryMode {
    fn default() -> Self {
        Self::OnRequest
    }
}

/// Configuration for how this gateway's tool responses are shaped for the
/// chat proxy consuming them. Resolved once from [`crate::Config`] at
/// startup.
#[derive(Debug, Clone)]
pub struct ChatProxyConfig {
    pub image_delivery: ImageDeliveryMode,
    /// Privacy notice text attached whenever an image block is included in
    /// a tool result, matching spec.md §6's `send_to_claude` requirement
    /// that image-bearing responses carry an explicit disclosure.
    pub image_privacy_notice: &'static str,
}

impl Default for ChatProxyConfig {
    fn default() -> Self {
        Self {
            image_delivery: ImageDeliveryMode::default(),
            image_privacy_notice:
                "this response includes a rendered image derived from extracted survey data",
        }
    }
}

/// Trait boundary for whatever sits on the other side of this gateway's
/// stdio transport. No implementation lives in this crate: the gateway
/// only ever talks to a chat proxy through the MCP tool-call protocol
/// itself (see [`crate::server`]); this trait exists to let a deployment
/// express proxy-specific policy (e.g. per-tenant image delivery mode)
/// without the gateway depending on any particular proxy implementation.
pub trait ChatProxy: Send + Sync {
    fn config(&self) -> &ChatProxyConfig;
}

/// The default proxy policy: whatever `ChatProxyConfig::default()` says.
pub struct DefaultChatProxy {
    config: ChatProxyConfig,
}

impl DefaultChatProxy {
    #[must_use]
    pub fn new(config: ChatProxyConfig) -> Self {
        Self { config }
    }
}

impl ChatProxy for DefaultChatProxy {
    fn config(&self) -> &ChatProxyConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_image_delivery_is_on_request() {
        assert_eq!(ChatProxyConfig::default().image_delivery, ImageDeliveryMode::OnRequest);
    }

    #[test]
    fn default_chat_proxy_exposes_its_config() {
        let proxy = DefaultChatProxy::new(ChatProxyConfig {
            image_delivery: ImageDeliveryMode::Always,
            ..Default::default()
        });
        assert_eq!(proxy.config().image_delivery, ImageDeliveryMode::Always);
    }
}
