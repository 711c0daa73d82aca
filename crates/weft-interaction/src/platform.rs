//! Ports to the chat platform's transport layer.
//!
//! The coordination engine never talks to a concrete messaging library; it
//! sees interactions and messages only through these traits. Hosts implement
//! them for their platform of choice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use weft_core::WeftError;

/// Transport-level failures surfaced by platform implementations.
///
/// Everything except [`Transport`](PlatformError::Transport) is considered
/// recoverable: the engine swallows it, logs it, and takes a fallback path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("interaction already acknowledged")]
    AlreadyAcknowledged,
    #[error("message not found")]
    NotFound,
    #[error("operation forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited,
    #[error("transport error: {0}")]
    Transport(String),
}

impl PlatformError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

impl From<PlatformError> for WeftError {
    fn from(e: PlatformError) -> Self {
        WeftError::Platform(e.to_string())
    }
}

/// A single embed in an outbound message. Theming is out of scope; this is
/// the minimal shape the engine needs to render notices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// RGB color as 0xRRGGBB.
    #[serde(default)]
    pub color: Option<u32>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// Whether the message still carries live interactive controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlsState {
    /// Controls attached and accepting interactions.
    #[default]
    Active,
    /// Controls shown but inert (timeout display).
    Disabled,
    /// Controls stripped from the message.
    Removed,
}

/// Platform-agnostic outbound message content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub controls: ControlsState,
}

impl RenderedMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn controls(mut self, controls: ControlsState) -> Self {
        self.controls = controls;
        self
    }
}

/// An inbound platform interaction (a command invocation or control click).
#[async_trait]
pub trait PlatformInteraction: Send + Sync {
    /// Unique id of this interaction.
    fn id(&self) -> u64;

    /// Stable numeric id of the acting user.
    fn user_id(&self) -> u64;

    /// Whether a response has already been sent or deferred.
    fn is_acknowledged(&self) -> bool;

    /// Defers the response to buy time before the platform timeout.
    async fn defer(&self, ephemeral: bool) -> Result<(), PlatformError>;

    /// Sends the initial response message.
    async fn send_initial(
        &self,
        message: &RenderedMessage,
        ephemeral: bool,
    ) -> Result<Arc<dyn PlatformMessage>, PlatformError>;

    /// Sends a follow-up message after the initial response.
    async fn send_followup(
        &self,
        message: &RenderedMessage,
        ephemeral: bool,
    ) -> Result<Arc<dyn PlatformMessage>, PlatformError>;

    /// Fetches the message created by the initial (or deferred) response.
    async fn fetch_response(&self) -> Result<Arc<dyn PlatformMessage>, PlatformError>;
}

/// An outbound message owned by a view instance.
#[async_trait]
pub trait PlatformMessage: Send + Sync {
    fn id(&self) -> u64;

    fn channel_id(&self) -> u64;

    async fn edit(&self, message: &RenderedMessage) -> Result<(), PlatformError>;

    async fn delete(&self) -> Result<(), PlatformError>;
}
