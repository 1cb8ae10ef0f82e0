//! Per-connection realtime session.

use tracing::{debug, warn};

use crate::dispatch::DispatchService;
use crate::hub::events::OutboundEvent;
use crate::hub::{Channel, Subscription};
use crate::models::user::{User, UserRole};
use crate::{AppError, Result};

use super::protocol::{parse_inbound, InboundMessage, LocationPayload, StatusPayload};

/// State of one connected agent or manager.
///
/// Holds the hub subscription for the user's channel; dropping the session
/// unsubscribes.
pub struct GatewaySession {
    user: User,
    dispatch: DispatchService,
    subscription: Subscription,
}

impl GatewaySession {
    /// Subscribe `user` to its channel: `agent:<id>` for agents,
    /// `managers` for managers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` if the hub is shutting down.
    pub fn open(dispatch: DispatchService, user: User) -> Result<Self> {
        let channel = match user.role {
            UserRole::Agent => Channel::agent(user.id.as_str()),
            UserRole::Manager => Channel::Managers,
        };
        let subscription = dispatch.hub().subscribe(channel)?;
        debug!(user_id = %user.id, channel = %subscription.channel(), "session opened");
        Ok(Self {
            user,
            dispatch,
            subscription,
        })
    }

    /// Connected user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Channel the session listens on.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        self.subscription.channel()
    }

    /// First message sent after subscribing.
    #[must_use]
    pub fn greeting(&self) -> OutboundEvent {
        OutboundEvent::ConnectionEstablished {
            message: format!("Connected as {}", self.user.username),
        }
    }

    /// Next hub event for this session; `None` once the hub shuts down.
    pub async fn next_event(&mut self) -> Option<OutboundEvent> {
        self.subscription.recv().await
    }

    /// Next hub event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<OutboundEvent> {
        self.subscription.try_recv()
    }

    /// Apply one inbound text frame to completion.
    ///
    /// Returns the direct reply for the sender, if any. Domain failures
    /// never end the session.
    pub async fn handle_text(&self, text: &str) -> Option<OutboundEvent> {
        match parse_inbound(text) {
            Ok(InboundMessage::Ping { timestamp }) => Some(OutboundEvent::Pong { timestamp }),
            Ok(InboundMessage::LocationUpdate(payload)) => {
                self.handle_location(payload).await;
                None
            }
            Ok(InboundMessage::StatusUpdate(payload)) => {
                self.handle_status(payload).await;
                None
            }
            Err(AppError::MalformedInput(message)) => {
                debug!(user_id = %self.user.id, %message, "rejected inbound message");
                Some(OutboundEvent::error(message))
            }
            Err(err) => Some(OutboundEvent::error(err.to_string())),
        }
    }

    async fn handle_location(&self, payload: LocationPayload) {
        if !self.user.is_agent() {
            return;
        }
        let Some(fix) = payload.fix() else {
            debug!(user_id = %self.user.id, "location update without usable coordinates");
            return;
        };

        if let Err(err) = self
            .dispatch
            .report_location(&self.user.id, fix, payload.timestamp)
            .await
        {
            warn!(user_id = %self.user.id, %err, "location update failed");
        }
    }

    async fn handle_status(&self, payload: StatusPayload) {
        if !self.user.is_agent() {
            return;
        }
        let (Some(assignment_id), Some(status)) = (payload.assignment_id(), payload.status())
        else {
            debug!(user_id = %self.user.id, "status update missing id or known status");
            return;
        };

        if let Err(err) = self
            .dispatch
            .report_status(&self.user.id, &assignment_id, status, payload.timestamp)
            .await
        {
            debug!(user_id = %self.user.id, %assignment_id, %err, "status update ignored");
        }
    }
}
