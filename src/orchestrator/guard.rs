use crate::runtime::{ContainerHandle, ContainerRuntime};

/// Removes a freshly created container unless disarmed.
///
/// Held between `container_create` and a successful `container_start`, so a
/// failed start never leaves a half-made agent container behind. Only the
/// guarded container is touched; the network and sidecars stay up.
pub struct ContainerGuard<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    handle: ContainerHandle,
    armed: bool,
}

impl<'a, R: ContainerRuntime + ?Sized> ContainerGuard<'a, R> {
    pub fn new(runtime: &'a R, handle: ContainerHandle) -> Self {
        Self {
            runtime,
            handle,
            armed: true,
        }
    }

    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    /// Keep the container and hand back its handle.
    pub fn disarm(mut self) -> ContainerHandle {
        self.armed = false;
        self.handle.clone()
    }
}

impl<R: ContainerRuntime + ?Sized> Drop for ContainerGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(container = %self.handle.name, "removing container after failed start");
        if let Err(e) = self.runtime.container_remove(&self.handle) {
            tracing::warn!(container = %self.handle.name, error = %e, "cleanup failed");
        }
    }
}
