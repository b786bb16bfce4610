//! Scriptable in-memory [`ContainerRuntime`] for tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use ferry_config::RegistryAuth;
use ferry_core::error::{FerryError, Result};
use ferry_core::Interrupt;

use crate::runtime::{ContainerRuntime, PushEvent, PushEvents};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pull(String),
    Tag(String, String),
    Push(String),
    Remove(String),
}

#[derive(Default)]
pub struct FakeRuntime {
    calls: RefCell<Vec<Call>>,
    pull_failures: RefCell<HashMap<String, u32>>,
    push_failures: RefCell<HashMap<String, u32>>,
    failing_tags: RefCell<HashSet<String>>,
    failing_removals: RefCell<HashSet<String>>,
    interrupt_on_pull: RefCell<HashMap<String, Interrupt>>,
    pulled: RefCell<HashSet<String>>,
    max_pulled: Cell<usize>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` pulls of `reference` fail.
    pub fn fail_pull(&self, reference: &str, times: u32) {
        self.pull_failures.borrow_mut().insert(reference.to_string(), times);
    }

    /// The next `times` pushes of `reference` stream an error line.
    pub fn fail_push(&self, reference: &str, times: u32) {
        self.push_failures.borrow_mut().insert(reference.to_string(), times);
    }

    pub fn fail_tag(&self, source: &str) {
        self.failing_tags.borrow_mut().insert(source.to_string());
    }

    pub fn fail_remove(&self, reference: &str) {
        self.failing_removals.borrow_mut().insert(reference.to_string());
    }

    /// Raise `interrupt` while `reference` is being pulled (the pull then fails,
    /// as a CLI child receiving the same signal would).
    pub fn interrupt_on_pull(&self, reference: &str, interrupt: Interrupt) {
        self.interrupt_on_pull
            .borrow_mut()
            .insert(reference.to_string(), interrupt);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, wanted: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| wanted(call)).count()
    }

    /// Pulled images still present on the fake host.
    pub fn pulled_images(&self) -> HashSet<String> {
        self.pulled.borrow().clone()
    }

    /// Largest number of pulled images present at once.
    pub fn max_pulled(&self) -> usize {
        self.max_pulled.get()
    }

    fn take_failure(map: &RefCell<HashMap<String, u32>>, reference: &str) -> bool {
        let mut map = map.borrow_mut();
        match map.get_mut(reference) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl ContainerRuntime for FakeRuntime {
    fn pull(&self, reference: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Pull(reference.to_string()));
        if let Some(interrupt) = self.interrupt_on_pull.borrow().get(reference) {
            interrupt.trigger();
            return Err(FerryError::Transfer(format!("pull {}: signal: interrupt", reference)));
        }
        if Self::take_failure(&self.pull_failures, reference) {
            return Err(FerryError::Transfer(format!("pull {}: connection reset", reference)));
        }
        let mut pulled = self.pulled.borrow_mut();
        pulled.insert(reference.to_string());
        self.max_pulled.set(self.max_pulled.get().max(pulled.len()));
        Ok(())
    }

    fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(Call::Tag(source.to_string(), target.to_string()));
        if self.failing_tags.borrow().contains(source) {
            return Err(FerryError::Local(format!("tag {}: no such image", source)));
        }
        Ok(())
    }

    fn push<'a>(&'a self, reference: &str, _auth: &RegistryAuth) -> Result<PushEvents<'a>> {
        self.calls.borrow_mut().push(Call::Push(reference.to_string()));
        let mut events = vec![PushEvent::Progress(format!(
            "The push refers to repository [{}]",
            reference
        ))];
        if Self::take_failure(&self.push_failures, reference) {
            events.push(PushEvent::Failure(
                "received unexpected HTTP status: 502 Bad Gateway".to_string(),
            ));
            // Anything after a failure must not be treated as success.
            events.push(PushEvent::Done);
        } else {
            events.push(PushEvent::Progress("5f70bf18a086: Pushed".to_string()));
            events.push(PushEvent::Done);
        }
        Ok(Box::new(events.into_iter()))
    }

    fn remove_image(&self, reference: &str) -> Result<()> {
        self.calls.borrow_mut().push(Call::Remove(reference.to_string()));
        if self.failing_removals.borrow().contains(reference) {
            return Err(FerryError::Local(format!("remove {}: image is in use", reference)));
        }
        self.pulled.borrow_mut().remove(reference);
        Ok(())
    }
}
