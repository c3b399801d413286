//! Channel trait and its dynamic-dispatch companion, so the registry can
//! hold `Arc<dyn ChannelDyn>` for a fixed kind-set of implementations.

use std::pin::Pin;

use crate::crd::channel::ChannelKind;
use crate::error::Result;

use super::alert::Alert;

/// Static trait for channel implementations. Use this for type-safe code.
pub trait Channel: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> ChannelKind;

    fn send(&self, alert: &Alert) -> impl std::future::Future<Output = Result<()>> + Send;

    fn test(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Dynamic trait for runtime polymorphism: `Arc<dyn ChannelDyn>` in the
/// dispatcher's registry.
pub trait ChannelDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn kind(&self) -> ChannelKind;

    fn send<'a>(&'a self, alert: &'a Alert) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn test<'a>(&'a self) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;
}

impl<T: Channel> ChannelDyn for T {
    fn name(&self) -> &str {
        Channel::name(self)
    }

    fn kind(&self) -> ChannelKind {
        Channel::kind(self)
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Channel::send(self, alert))
    }

    fn test<'a>(&'a self) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(Channel::test(self))
    }
}
