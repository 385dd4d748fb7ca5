#![forbid(unsafe_code)]

//! RAII unsubscribe tokens.
//!
//! A [`Subscription`] owns a cleanup closure that detaches whatever the
//! token was returned for (an observable callback, an event listener, a
//! registered command handler). The cleanup runs exactly once: on drop, or
//! earlier via [`Subscription::unsubscribe`].

/// Token representing an active subscription.
///
/// Dropping the token detaches the subscriber. Hold it for as long as the
/// subscription should stay live.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    cleanup: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription from a cleanup closure.
    pub fn new(cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { cleanup: None }
    }

    /// Bundle several subscriptions into one token.
    ///
    /// Releasing the merged token releases the children in order.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for sub in subscriptions {
                sub.unsubscribe();
            }
        })
    }

    /// Release the subscription now instead of at drop time.
    pub fn unsubscribe(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }

    /// Whether the token still holds a pending cleanup.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cleanup.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
