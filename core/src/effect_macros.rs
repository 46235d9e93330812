//! Declarative macros for ergonomic effect construction
//!
//! These macros reduce boilerplate when creating `Effect` variants, particularly
//! for network calls and timers.

/// Create an `Effect::Future` from an async block
///
/// # Example
///
/// ```rust,ignore
/// use storefront_core::async_effect;
///
/// async_effect! {
///     let response = client.reserve(request).await;
///     Some(HoldAction::Responded { response })
/// }
/// ```
#[macro_export]
macro_rules! async_effect {
    ($($body:tt)*) => {
        $crate::effect::Effect::Future(
            ::std::boxed::Box::pin(async move { $($body)* })
        )
    };
}

/// Create an `Effect::Delay` for scheduling delayed actions
///
/// # Example
///
/// ```rust,ignore
/// use storefront_core::delay;
/// use std::time::Duration;
///
/// delay! {
///     duration: Duration::from_secs(1),
///     action: HoldAction::Tick
/// }
/// ```
#[macro_export]
macro_rules! delay {
    (
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Delay {
            duration: $duration,
            action: ::std::boxed::Box::new($action),
        }
    };
}

/// Create an `Effect::Delay` registered under a cancellation id
///
/// # Example
///
/// ```rust,ignore
/// use storefront_core::{effect::EffectId, timer};
/// use std::time::Duration;
///
/// const EXPIRY: EffectId = EffectId::new("expiry");
///
/// timer! {
///     id: EXPIRY,
///     duration: Duration::from_secs(600),
///     action: HoldAction::Expired
/// }
/// ```
#[macro_export]
macro_rules! timer {
    (
        id: $id:expr,
        duration: $duration:expr,
        action: $action:expr
    ) => {
        $crate::effect::Effect::Cancellable {
            id: $id,
            effect: ::std::boxed::Box::new($crate::delay! {
                duration: $duration,
                action: $action
            }),
        }
    };
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests are allowed to panic on failures
mod tests {
    use crate::effect::{Effect, EffectId};
    use std::time::Duration;

    #[derive(Clone, Debug)]
    enum TestAction {
        AsyncResult { value: i32 },
        TimeoutExpired,
    }

    #[test]
    fn test_async_effect_macro() {
        let effect = async_effect! {
            Some(TestAction::AsyncResult { value: 42 })
        };

        assert!(matches!(effect, Effect::Future(_)));
    }

    #[test]
    fn test_delay_macro() {
        let effect = delay! {
            duration: Duration::from_secs(30),
            action: TestAction::TimeoutExpired
        };

        assert!(matches!(effect, Effect::Delay { .. }));
    }

    #[test]
    fn test_timer_macro_is_cancellable_delay() {
        const ID: EffectId = EffectId::new("expiry");

        let effect = timer! {
            id: ID,
            duration: Duration::from_secs(5),
            action: TestAction::TimeoutExpired
        };

        match effect {
            Effect::Cancellable { id, effect } => {
                assert_eq!(id, ID);
                assert!(matches!(*effect, Effect::Delay { .. }));
            },
            other => panic!("expected cancellable delay, got {other:?}"),
        }
    }
}
