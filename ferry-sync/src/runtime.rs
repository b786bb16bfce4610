//! The container runtime operations a transfer is built from.

use ferry_config::RegistryAuth;
use ferry_core::error::Result;

/// One item of a push's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Status or progress line.
    Progress(String),
    /// The registry or the runtime reported an error; the push did not complete.
    Failure(String),
    /// The push completed.
    Done,
}

pub type PushEvents<'a> = Box<dyn Iterator<Item = PushEvent> + 'a>;

/// Pull/tag/push/remove on the local transfer host.
///
/// Pull and push failures are reported as `FerryError::Transfer` so the
/// caller can retry them; tag and remove failures as `FerryError::Local`.
pub trait ContainerRuntime {
    fn pull(&self, reference: &str) -> Result<()>;

    fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Start pushing `reference`; the returned events end with `Done` or
    /// `Failure`. Dropping the iterator early abandons the push.
    fn push<'a>(&'a self, reference: &str, auth: &RegistryAuth) -> Result<PushEvents<'a>>;

    fn remove_image(&self, reference: &str) -> Result<()>;
}

impl<R: ContainerRuntime + ?Sized> ContainerRuntime for &R {
    fn pull(&self, reference: &str) -> Result<()> {
        (**self).pull(reference)
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        (**self).tag(source, target)
    }

    fn push<'a>(&'a self, reference: &str, auth: &RegistryAuth) -> Result<PushEvents<'a>> {
        (**self).push(reference, auth)
    }

    fn remove_image(&self, reference: &str) -> Result<()> {
        (**self).remove_image(reference)
    }
}
