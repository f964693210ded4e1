use waymark_shared::{ClientMessage, Collection};

/// Client side of the subscription contract: at most one active
/// subscription per collection, a new subscribe replacing the old one,
/// and a gate that drops deliveries for collections we are no longer
/// listening to (pushes already in flight when we unsubscribed).
pub struct Mirror {
    points_active: bool,
    paths_active: bool,
}

impl Mirror {
    pub fn new() -> Self {
        Self {
            points_active: false,
            paths_active: false,
        }
    }

    fn flag(&mut self, collection: Collection) -> &mut bool {
        match collection {
            Collection::Points => &mut self.points_active,
            Collection::Paths => &mut self.paths_active,
        }
    }

    pub fn is_subscribed(&self, collection: Collection) -> bool {
        match collection {
            Collection::Points => self.points_active,
            Collection::Paths => self.paths_active,
        }
    }

    /// Messages to put on the wire for a (re)subscribe. An already
    /// active subscription is cancelled first.
    pub fn subscribe(&mut self, collection: Collection) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        let active = self.flag(collection);
        if *active {
            out.push(ClientMessage::Unsubscribe { collection });
        }
        *active = true;
        out.push(ClientMessage::Subscribe { collection });
        out
    }

    /// Idempotent: tearing down an inactive subscription sends nothing.
    pub fn unsubscribe(&mut self, collection: Collection) -> Vec<ClientMessage> {
        let active = self.flag(collection);
        if !*active {
            return Vec::new();
        }
        *active = false;
        vec![ClientMessage::Unsubscribe { collection }]
    }

    pub fn unsubscribe_all(&mut self) -> Vec<ClientMessage> {
        let mut out = self.unsubscribe(Collection::Points);
        out.extend(self.unsubscribe(Collection::Paths));
        out
    }

    /// Whether an inbound delivery for this collection should reach
    /// the engine.
    pub fn accepts(&self, collection: Collection) -> bool {
        self.is_subscribed(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_then_accepts() {
        let mut mirror = Mirror::new();
        assert!(!mirror.accepts(Collection::Points));
        let out = mirror.subscribe(Collection::Points);
        assert!(matches!(
            out.as_slice(),
            [ClientMessage::Subscribe {
                collection: Collection::Points
            }]
        ));
        assert!(mirror.accepts(Collection::Points));
        assert!(!mirror.accepts(Collection::Paths));
    }

    #[test]
    fn resubscribe_cancels_the_prior_subscription_first() {
        let mut mirror = Mirror::new();
        mirror.subscribe(Collection::Paths);
        let out = mirror.subscribe(Collection::Paths);
        assert!(matches!(
            out.as_slice(),
            [
                ClientMessage::Unsubscribe {
                    collection: Collection::Paths
                },
                ClientMessage::Subscribe {
                    collection: Collection::Paths
                }
            ]
        ));
        assert!(mirror.accepts(Collection::Paths));
    }

    #[test]
    fn teardown_is_idempotent_and_gates_deliveries() {
        let mut mirror = Mirror::new();
        mirror.subscribe(Collection::Points);
        mirror.subscribe(Collection::Paths);
        let out = mirror.unsubscribe_all();
        assert_eq!(out.len(), 2);
        assert!(!mirror.accepts(Collection::Points));
        assert!(!mirror.accepts(Collection::Paths));
        // Nothing subscribed, nothing to send.
        assert!(mirror.unsubscribe_all().is_empty());
    }
}
