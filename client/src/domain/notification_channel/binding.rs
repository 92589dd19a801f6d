//! A transport joined to one user's notification room.

use serde_json::Value;
use tracing::debug;

use crate::domain::notification::{HIRED_EVENT, JOIN_EVENT};
use crate::domain::ports::{EventSubscription, RealtimeTransport, TransportError, TransportProtocol};
use crate::domain::UserId;

/// Open transport, its hire listener, and the user it joined for.
pub struct ChannelBinding {
    user: UserId,
    transport: Box<dyn RealtimeTransport>,
    subscription: EventSubscription,
}

impl ChannelBinding {
    /// Subscribe the hire listener on `transport`, then join `user`'s room.
    ///
    /// On failure the transport is closed before the error is returned.
    pub(super) async fn join(
        mut transport: Box<dyn RealtimeTransport>,
        user: UserId,
    ) -> Result<Self, TransportError> {
        let subscription = match transport.subscribe(HIRED_EVENT) {
            Ok(subscription) => subscription,
            Err(error) => {
                transport.close();
                return Err(error);
            }
        };
        if let Err(error) = transport
            .emit(JOIN_EVENT, Value::String(user.to_string()))
            .await
        {
            transport.unsubscribe(subscription);
            transport.close();
            return Err(error);
        }
        Ok(Self {
            user,
            transport,
            subscription,
        })
    }

    /// User whose room this binding joined.
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Protocol the transport negotiated.
    pub fn protocol(&self) -> TransportProtocol {
        self.transport.protocol()
    }

    /// Next hire payload; `None` once the transport is lost.
    pub(super) async fn next_event(&mut self) -> Option<Value> {
        self.subscription.recv().await
    }

    /// Remove the listener, then close the transport.
    pub(super) fn release(self) {
        let Self {
            user,
            mut transport,
            subscription,
        } = self;
        transport.unsubscribe(subscription);
        transport.close();
        debug!(user_id = %user, "notification channel released");
    }
}
