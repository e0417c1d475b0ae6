//! The actor system: spawning, name registry and diagnostics.
//!
//! A [`System`] is an ordinary value. Create one per application (or per
//! test) and hand out clones; there is no process-wide instance.
//!
//! The registry maps caller-chosen names (conventionally
//! `"<feature>-<id>"`) to actors so that actors with no structural
//! relationship can find each other. It holds weak handles only: binding a
//! name never keeps an actor alive and never starts or stops it.

mod config;
mod error;
mod inspect;

pub use config::SystemConfig;
pub use error::{ConfigError, RegistryError};
pub use inspect::{Inspection, InspectionKind};

use crate::actor::cell::{ActorCell, AnyActor};
use crate::actor::{ActorError, ActorId, ActorRef, Context};
use crate::core::{Event, Machine};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

type Inspector = Arc<dyn Fn(&Inspection) + Send + Sync>;
type Registry = HashMap<String, Weak<dyn AnyActor>>;

struct SystemInner {
    config: SystemConfig,
    registry: Mutex<Registry>,
    inspector: RwLock<Option<Inspector>>,
}

/// Cheaply cloneable handle to an actor system.
#[derive(Clone)]
pub struct System {
    inner: Arc<SystemInner>,
}

impl System {
    pub fn new() -> Self {
        Self::from_valid(SystemConfig::default())
    }

    /// System with custom settings, rejected when they are invalid.
    pub fn with_config(config: SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: SystemConfig) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                config,
                registry: Mutex::new(HashMap::new()),
                inspector: RwLock::new(None),
            }),
        }
    }

    /// Install `inspector`, replacing any previous one. It is called
    /// synchronously, from whichever thread is processing, for every
    /// [`Inspection`] of every actor of this system.
    pub fn with_inspector<F>(self, inspector: F) -> Self
    where
        F: Fn(&Inspection) + Send + Sync + 'static,
    {
        *self.inner.inspector.write() = Some(Arc::new(inspector));
        self
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Create an actor without starting it.
    pub fn create<C, E>(&self, machine: impl Into<Arc<Machine<C, E>>>, context: C) -> ActorRef<C, E>
    where
        C: Context,
        E: Event,
    {
        let actor = ActorRef::new(self.clone(), machine.into(), context, None);
        debug!(actor = %actor.id(), machine = actor.machine().id(), "Actor created");
        actor
    }

    /// Create and start an actor.
    ///
    /// A failing entry action at start is reported here and the handle is
    /// lost; use [`create`](System::create) and
    /// [`ActorRef::start`] to keep it.
    pub fn spawn<C, E>(
        &self,
        machine: impl Into<Arc<Machine<C, E>>>,
        context: C,
    ) -> Result<ActorRef<C, E>, ActorError>
    where
        C: Context,
        E: Event,
    {
        let actor = self.create(machine, context);
        actor.start()?;
        Ok(actor)
    }

    /// Bind `name` to `actor`.
    ///
    /// Fails when the name is bound to another actor that is neither done
    /// nor stopped nor dropped. Re-binding the same actor is allowed.
    pub fn register<C, E>(&self, actor: &ActorRef<C, E>, name: impl Into<String>) -> Result<(), RegistryError>
    where
        C: Context,
        E: Event,
    {
        let name = name.into();
        let mut registry = self.inner.registry.lock();
        prune(&mut registry);
        let occupied = registry
            .get(&name)
            .and_then(Weak::upgrade)
            .is_some_and(|existing| existing.id() != actor.id() && existing.is_reachable());
        if occupied {
            return Err(RegistryError::Collision { name });
        }
        bind(&mut registry, actor, name);
        Ok(())
    }

    /// Bind `name` to `actor`, replacing whatever it was bound to.
    pub fn register_replacing<C, E>(&self, actor: &ActorRef<C, E>, name: impl Into<String>)
    where
        C: Context,
        E: Event,
    {
        let mut registry = self.inner.registry.lock();
        prune(&mut registry);
        bind(&mut registry, actor, name.into());
    }

    /// Look up `name`, expecting an actor of machine type `Machine<C, E>`.
    ///
    /// `None` when the name is unbound, the actor was dropped, or its
    /// types differ from the expected ones. A binding whose actor was
    /// dropped is removed.
    pub fn get<C, E>(&self, name: &str) -> Option<ActorRef<C, E>>
    where
        C: Context,
        E: Event,
    {
        let mut registry = self.inner.registry.lock();
        let handle = registry.get(name)?.upgrade();
        let Some(handle) = handle else {
            registry.remove(name);
            debug!(name, "Binding of a dropped actor removed");
            return None;
        };
        drop(registry);
        let cell = handle.into_any().downcast::<ActorCell<C, E>>().ok()?;
        Some(ActorRef { cell })
    }

    /// Remove the binding for `name`. Returns whether one existed.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.inner.registry.lock().remove(name).is_some();
        if removed {
            debug!(name, "Actor unregistered");
        }
        removed
    }

    pub(crate) fn inspect<F>(&self, actor: ActorId, kind: F)
    where
        F: FnOnce() -> InspectionKind,
    {
        let inspector = self.inner.inspector.read().clone();
        if let Some(inspector) = inspector {
            inspector(&Inspection {
                actor,
                at: Utc::now(),
                kind: kind(),
            });
        }
    }
}

/// Forget bindings whose actor was dropped.
fn prune(registry: &mut Registry) {
    registry.retain(|_, handle| handle.strong_count() > 0);
}

fn bind<C: Context, E: Event>(registry: &mut Registry, actor: &ActorRef<C, E>, name: String) {
    debug!(actor = %actor.id(), name = %name, "Actor registered");
    let strong: Arc<dyn AnyActor> = actor.cell.clone();
    registry.insert(name, Arc::downgrade(&strong));
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("config", &self.inner.config)
            .field("registered", &self.inner.registry.lock().len())
            .finish()
    }
}
