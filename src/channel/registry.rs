use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::{DashMap, Entry};

use super::error::ChannelError;
use super::message::Message;
use super::traits::Event;

/// Key under which a wildcard subscription is registered on the wire-facing API.
pub const WILDCARD: &str = "*";

/// What a handler is subscribed to.
///
/// The string `"*"` always converts to [`Topic::Any`], on subscription and on dispatch alike.
/// A frame whose `type` is literally `"*"` therefore reaches the wildcard handlers twice: once
/// as its own type and once as the wildcard pass.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Messages whose `type` equals this value
    Type(String),
    /// Every successfully decoded message
    Any,
}

impl Topic {
    #[must_use]
    pub fn of<S: Into<String>>(msg_type: S) -> Self {
        Self::Type(msg_type.into())
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        if value == WILDCARD {
            Self::Any
        } else {
            Self::Type(value.to_owned())
        }
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        if value == WILDCARD {
            Self::Any
        } else {
            Self::Type(value)
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(msg_type) => f.write_str(msg_type),
            Self::Any => f.write_str(WILDCARD),
        }
    }
}

type Callback = dyn Fn(&Message) -> Result<(), ChannelError> + Send + Sync;

/// A subscriber callback with reference identity.
///
/// Clones share identity: unsubscribing any clone removes every registration made with the
/// same underlying callback. Two handlers built from identical closures are distinct.
#[derive(Clone)]
pub struct Handler {
    callback: Arc<Callback>,
}

impl Handler {
    /// Wrap a callback that receives every message routed to it.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |message: &Message| {
                f(message);
                Ok(())
            }),
        }
    }

    /// Wrap a callback that receives the message decoded as `E`.
    ///
    /// A message that does not decode as `E` counts as a handler failure: it is logged and the
    /// callback is skipped.
    pub fn typed<E, F>(f: F) -> Self
    where
        E: Event,
        F: Fn(E) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |message: &Message| {
                f(message.parse::<E>()?);
                Ok(())
            }),
        }
    }

    fn call(&self, message: &Message) -> Result<(), ChannelError> {
        (self.callback)(message)
    }

    /// Whether both handlers refer to the same callback.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Eq for Handler {}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler")
            .field(&Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Outcome of dispatching one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Dispatched {
    /// Handlers that returned normally
    pub(crate) delivered: usize,
    /// Handlers that panicked or rejected the payload
    pub(crate) failed: usize,
}

/// Ordered handler lists keyed by topic.
///
/// Lists only change through [`subscribe`](Self::subscribe) and
/// [`unsubscribe`](Self::unsubscribe); connection state never touches them.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: DashMap<Topic, Vec<Handler>>,
}

impl HandlerRegistry {
    /// Append `handler` to `topic`. Duplicates are kept and invoked once per registration.
    pub(crate) fn subscribe(&self, topic: Topic, handler: &Handler) {
        self.handlers
            .entry(topic)
            .or_default()
            .push(handler.clone());
    }

    /// Remove every registration of `handler` under `topic`.
    pub(crate) fn unsubscribe(&self, topic: &Topic, handler: &Handler) {
        if let Entry::Occupied(mut entry) = self.handlers.entry(topic.clone()) {
            entry.get_mut().retain(|registered| !registered.same_as(handler));
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    pub(crate) fn handler_count(&self, topic: &Topic) -> usize {
        self.handlers.get(topic).map_or(0, |entry| entry.len())
    }

    // Cloned out so no shard lock is held while handlers run; handlers may re-enter.
    fn snapshot(&self, topic: &Topic) -> Vec<Handler> {
        self.handlers
            .get(topic)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Decode a raw text frame and dispatch it. Undecodable frames reach nobody.
    pub(crate) fn dispatch_frame(&self, text: &str) -> Option<Dispatched> {
        match Message::decode(text) {
            Ok(message) => Some(self.dispatch(&message)),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Dropping inbound frame");
                #[cfg(not(feature = "tracing"))]
                let _ = (&text, &e);
                None
            }
        }
    }

    /// Run type-specific handlers, then wildcard handlers, each in registration order.
    pub(crate) fn dispatch(&self, message: &Message) -> Dispatched {
        let typed = self.snapshot(&Topic::from(message.msg_type()));
        let wildcard = self.snapshot(&Topic::Any);

        #[cfg(feature = "tracing")]
        tracing::trace!(
            msg_type = message.msg_type(),
            typed = typed.len(),
            wildcard = wildcard.len(),
            "Dispatching inbound message"
        );

        let mut outcome = Dispatched::default();
        for handler in typed.iter().chain(&wildcard) {
            match invoke(handler, message) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "Subscriber failed");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

fn invoke(handler: &Handler, message: &Message) -> Result<(), ChannelError> {
    catch_unwind(AssertUnwindSafe(|| handler.call(message))).unwrap_or_else(|payload| {
        Err(ChannelError::HandlerPanicked {
            msg_type: message.msg_type().to_owned(),
            reason: panic_reason(payload.as_ref()),
        })
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        (*reason).to_owned()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> Handler {
        let log = Arc::clone(log);
        Handler::new(move |message: &Message| {
            log.lock()
                .unwrap()
                .push(format!("{name}:{}", message.msg_type()));
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    const FILTER_RESULT: &str =
        r#"{"type":"apply_filters_result","status":"ok","data":{"records":[]}}"#;

    #[test]
    fn type_handlers_run_in_registration_order_then_wildcard() {
        let registry = HandlerRegistry::default();
        let log = Log::default();

        registry.subscribe("*".into(), &recorder(&log, "any"));
        registry.subscribe("apply_filters_result".into(), &recorder(&log, "first"));
        registry.subscribe("apply_filters_result".into(), &recorder(&log, "second"));

        let outcome = registry.dispatch_frame(FILTER_RESULT).unwrap();

        assert_eq!(
            entries(&log),
            [
                "first:apply_filters_result",
                "second:apply_filters_result",
                "any:apply_filters_result"
            ]
        );
        assert_eq!(outcome.delivered, 3);
        assert_eq!(outcome.failed, 0);
    }

    #[test]
    fn handlers_receive_the_full_decoded_object() {
        let registry = HandlerRegistry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let typed_seen = Arc::clone(&seen);
        registry.subscribe(
            "apply_filters_result".into(),
            &Handler::new(move |message: &Message| {
                typed_seen.lock().unwrap().push(message.clone().into_value());
            }),
        );
        let any_seen = Arc::clone(&seen);
        registry.subscribe(
            Topic::Any,
            &Handler::new(move |message: &Message| {
                any_seen.lock().unwrap().push(message.clone().into_value());
            }),
        );

        registry.dispatch_frame(FILTER_RESULT);

        let expected = json!({
            "type": "apply_filters_result",
            "status": "ok",
            "data": { "records": [] }
        });
        assert_eq!(*seen.lock().unwrap(), vec![expected.clone(), expected]);
    }

    #[test]
    fn wildcard_sees_types_without_specific_handlers() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        registry.subscribe(Topic::Any, &recorder(&log, "any"));
        registry.subscribe("get_all_result".into(), &recorder(&log, "table"));

        registry.dispatch_frame(r#"{"type":"clear_data_result","status":"ok"}"#);
        registry.dispatch_frame(r#"{"type":"get_all_result","status":"ok"}"#);

        assert_eq!(
            entries(&log),
            [
                "any:clear_data_result",
                "table:get_all_result",
                "any:get_all_result"
            ]
        );
    }

    #[test]
    fn undecodable_frames_reach_nobody() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        registry.subscribe(Topic::Any, &recorder(&log, "any"));
        registry.subscribe("error".into(), &recorder(&log, "error"));

        assert!(registry.dispatch_frame("not json").is_none());
        assert!(registry.dispatch_frame(r#"{"status":"ok"}"#).is_none());
        assert!(registry.dispatch_frame(r#""error""#).is_none());

        assert!(entries(&log).is_empty(), "no handler should run");
    }

    #[test]
    fn panicking_handler_does_not_stop_siblings() {
        let registry = HandlerRegistry::default();
        let log = Log::default();

        registry.subscribe("get_all_result".into(), &recorder(&log, "before"));
        registry.subscribe(
            "get_all_result".into(),
            &Handler::new(|_: &Message| panic!("map layer exploded")),
        );
        registry.subscribe("get_all_result".into(), &recorder(&log, "after"));
        registry.subscribe(Topic::Any, &recorder(&log, "any"));

        let outcome = registry
            .dispatch_frame(r#"{"type":"get_all_result"}"#)
            .unwrap();

        assert_eq!(
            entries(&log),
            [
                "before:get_all_result",
                "after:get_all_result",
                "any:get_all_result"
            ]
        );
        assert_eq!(outcome, Dispatched { delivered: 3, failed: 1 });

        // Later frames are unaffected.
        registry.dispatch_frame(r#"{"type":"get_all_result"}"#);
        assert_eq!(entries(&log).len(), 6);
    }

    #[test]
    fn duplicate_subscriptions_are_invoked_per_registration() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        let handler = recorder(&log, "dup");

        registry.subscribe("error".into(), &handler);
        registry.subscribe("error".into(), &handler);
        registry.dispatch_frame(r#"{"type":"error"}"#);

        assert_eq!(entries(&log), ["dup:error", "dup:error"]);
        assert_eq!(registry.handler_count(&"error".into()), 2);
    }

    #[test]
    fn unsubscribe_removes_every_occurrence() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        let removed = recorder(&log, "removed");
        let kept = recorder(&log, "kept");

        registry.subscribe("error".into(), &removed);
        registry.subscribe("error".into(), &kept);
        registry.subscribe("error".into(), &removed);
        registry.unsubscribe(&"error".into(), &removed.clone());
        registry.dispatch_frame(r#"{"type":"error"}"#);

        assert_eq!(entries(&log), ["kept:error"]);
        assert_eq!(registry.handler_count(&"error".into()), 1);
    }

    #[test]
    fn unsubscribe_missing_handler_is_noop() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        let kept = recorder(&log, "kept");
        registry.subscribe("error".into(), &kept);

        registry.unsubscribe(&"error".into(), &recorder(&log, "stranger"));
        registry.unsubscribe(&"never_registered".into(), &kept);
        registry.unsubscribe(&Topic::Any, &kept);

        assert_eq!(registry.handler_count(&"error".into()), 1);
    }

    #[test]
    fn unsubscribe_is_scoped_to_its_topic() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        let handler = recorder(&log, "shared");
        registry.subscribe("error".into(), &handler);
        registry.subscribe(Topic::Any, &handler);

        registry.unsubscribe(&"error".into(), &handler);
        registry.dispatch_frame(r#"{"type":"error"}"#);

        assert_eq!(entries(&log), ["shared:error"]);
    }

    #[test]
    fn handler_may_subscribe_while_dispatching() {
        let registry = Arc::new(HandlerRegistry::default());
        let log = Log::default();
        let late = recorder(&log, "late");

        let inner = Arc::clone(&registry);
        registry.subscribe(
            "error".into(),
            &Handler::new(move |_: &Message| inner.subscribe("error".into(), &late)),
        );

        registry.dispatch_frame(r#"{"type":"error"}"#);
        assert!(entries(&log).is_empty(), "snapshot excludes late handler");

        registry.dispatch_frame(r#"{"type":"error"}"#);
        assert_eq!(entries(&log), ["late:error"]);
    }

    #[derive(Debug, Deserialize)]
    struct Progress {
        done: u32,
    }

    impl Event for Progress {
        const TYPE: &'static str = "progress";
    }

    #[test]
    fn typed_handler_decodes_and_isolates_mismatches() {
        let registry = HandlerRegistry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Log::default();

        let sink = Arc::clone(&seen);
        registry.subscribe(
            Progress::TYPE.into(),
            &Handler::typed(move |progress: Progress| sink.lock().unwrap().push(progress.done)),
        );
        registry.subscribe(Topic::Any, &recorder(&log, "any"));

        let ok = registry
            .dispatch_frame(r#"{"type":"progress","done":3}"#)
            .unwrap();
        let bad = registry
            .dispatch_frame(r#"{"type":"progress","done":"three"}"#)
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![3]);
        assert_eq!(ok, Dispatched { delivered: 2, failed: 0 });
        assert_eq!(bad, Dispatched { delivered: 1, failed: 1 });
        assert_eq!(entries(&log), ["any:progress", "any:progress"]);
    }

    #[test]
    fn wildcard_string_maps_to_any_topic() {
        assert_eq!(Topic::from("*"), Topic::Any);
        assert_eq!(Topic::from("error".to_owned()), Topic::of("error"));
        assert_eq!(Topic::Any.to_string(), "*");
    }

    #[test]
    fn frame_typed_as_wildcard_runs_wildcard_handlers_twice() {
        let registry = HandlerRegistry::default();
        let log = Log::default();
        registry.subscribe("*".into(), &recorder(&log, "any"));
        registry.subscribe("error".into(), &recorder(&log, "error"));

        let outcome = registry.dispatch_frame(r#"{"type":"*"}"#).unwrap();

        assert_eq!(entries(&log), ["any:*", "any:*"]);
        assert_eq!(outcome, Dispatched { delivered: 2, failed: 0 });
    }

    #[test]
    fn handler_identity_follows_clones() {
        let a = Handler::new(|_: &Message| {});
        let b = Handler::new(|_: &Message| {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
