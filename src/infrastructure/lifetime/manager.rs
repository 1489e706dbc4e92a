//! 生命周期管理器
//!
//! Participants are visited strictly one after another, in the order they
//! were registered, for startup and for shutdown alike. Each family has its
//! own async lock so a second pass waits for the one in flight; the two
//! families do not block each other.

use super::capability::{ClientLifetime, LogonLifetime, Progress};
use crate::config::LifetimeConfig;
use crate::errors::ContainerError;
use crate::infrastructure::container::{Component, Declarations, ServiceRegistry};
use crate::logging::OperationTimer;
use parking_lot::Mutex;
use std::any::type_name;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

type Resolve<L> = fn(&ServiceRegistry) -> Result<Arc<L>, ContainerError>;

enum Participant<L: ?Sized> {
    /// Handed to the manager directly.
    Direct {
        type_name: &'static str,
        component: Arc<L>,
    },
    /// Lives in the registry and is looked up on every pass, so registering it
    /// never forces construction.
    Registered {
        type_name: &'static str,
        resolve: Resolve<L>,
    },
}

impl<L: ?Sized> Clone for Participant<L> {
    fn clone(&self) -> Self {
        match self {
            Participant::Direct {
                type_name,
                component,
            } => Participant::Direct {
                type_name: *type_name,
                component: Arc::clone(component),
            },
            Participant::Registered { type_name, resolve } => Participant::Registered {
                type_name: *type_name,
                resolve: *resolve,
            },
        }
    }
}

impl<L: ?Sized> Participant<L> {
    fn type_name(&self) -> &'static str {
        match self {
            Participant::Direct { type_name, .. } | Participant::Registered { type_name, .. } => *type_name,
        }
    }

    fn resolve(&self, registry: &ServiceRegistry) -> Result<Arc<L>, ContainerError> {
        match self {
            Participant::Direct { component, .. } => Ok(Arc::clone(component)),
            Participant::Registered { resolve, .. } => resolve(registry),
        }
    }
}

fn resolve_client<T: Component>(registry: &ServiceRegistry) -> Result<Arc<dyn ClientLifetime>, ContainerError> {
    let component = registry.get::<T>()?;
    let upcast = Declarations::<T>::of()
        .client()
        .ok_or(ContainerError::InvalidParticipant {
            type_name: type_name::<T>(),
            capability: "ClientLifetime",
        })?;
    Ok(upcast(component))
}

fn resolve_logon<T: Component>(registry: &ServiceRegistry) -> Result<Arc<dyn LogonLifetime>, ContainerError> {
    let component = registry.get::<T>()?;
    let upcast = Declarations::<T>::of()
        .logon()
        .ok_or(ContainerError::InvalidParticipant {
            type_name: type_name::<T>(),
            capability: "LogonLifetime",
        })?;
    Ok(upcast(component))
}

/// Tracks lifecycle participants and drives the client and logon passes.
pub struct LifetimeManager {
    client: Mutex<Vec<Participant<dyn ClientLifetime>>>,
    logon: Mutex<Vec<Participant<dyn LogonLifetime>>>,
    client_gate: AsyncMutex<()>,
    logon_gate: AsyncMutex<()>,
    /// Only written while `client_gate` is held.
    client_started: AtomicBool,
    slow_participant: Option<Duration>,
}

impl LifetimeManager {
    pub fn new() -> Self {
        Self::with_config(&LifetimeConfig::default())
    }

    pub fn with_config(config: &LifetimeConfig) -> Self {
        Self {
            client: Mutex::new(Vec::new()),
            logon: Mutex::new(Vec::new()),
            client_gate: AsyncMutex::new(()),
            logon_gate: AsyncMutex::new(()),
            client_started: AtomicBool::new(false),
            slow_participant: config.slow_participant_threshold(),
        }
    }

    /// Appends `component` to the client list. Registering the same component
    /// again appends it again.
    pub fn register_for_client_lifetime<T: ClientLifetime + 'static>(&self, component: Arc<T>) {
        self.push_client(type_name::<T>(), component);
    }

    /// Same as [`register_for_client_lifetime`](Self::register_for_client_lifetime)
    /// for a participant already erased to a trait object.
    pub fn register_for_client_lifetime_dyn(&self, component: Arc<dyn ClientLifetime>) {
        self.push_client(type_name::<dyn ClientLifetime>(), component);
    }

    /// Appends `component` to the logon list, duplicates included.
    pub fn register_for_logon_lifetime<T: LogonLifetime + 'static>(&self, component: Arc<T>) {
        self.push_logon(type_name::<T>(), component);
    }

    pub fn register_for_logon_lifetime_dyn(&self, component: Arc<dyn LogonLifetime>) {
        self.push_logon(type_name::<dyn LogonLifetime>(), component);
    }

    fn push_client(&self, type_name: &'static str, component: Arc<dyn ClientLifetime>) {
        self.client.lock().push(Participant::Direct { type_name, component });
        debug!(component = type_name, family = "client", "Registered lifetime participant");
    }

    fn push_logon(&self, type_name: &'static str, component: Arc<dyn LogonLifetime>) {
        self.logon.lock().push(Participant::Direct { type_name, component });
        debug!(component = type_name, family = "logon", "Registered lifetime participant");
    }

    /// Appends a registry-backed participant to every list whose capability
    /// `T` declares. Types declaring neither are ignored.
    pub fn register_container_type<T: Component>(&self) {
        let declarations = Declarations::<T>::of();
        if declarations.client().is_some() {
            self.client.lock().push(Participant::Registered {
                type_name: type_name::<T>(),
                resolve: resolve_client::<T>,
            });
            debug!(component = type_name::<T>(), family = "client", "Registered container participant");
        }
        if declarations.logon().is_some() {
            self.logon.lock().push(Participant::Registered {
                type_name: type_name::<T>(),
                resolve: resolve_logon::<T>,
            });
            debug!(component = type_name::<T>(), family = "logon", "Registered container participant");
        }
    }

    pub fn client_participants(&self) -> usize {
        self.client.lock().len()
    }

    pub fn logon_participants(&self) -> usize {
        self.logon.lock().len()
    }

    /// True between a completed startup and the next shutdown.
    pub fn client_started(&self) -> bool {
        self.client_started.load(Ordering::SeqCst)
    }

    /// Starts every client participant in registration order. A failing
    /// participant ends the pass; the ones already started stay started and
    /// the started flag is left unset.
    pub async fn run_client_startup(&self, registry: &ServiceRegistry, progress: &Progress) -> Result<(), ContainerError> {
        let _gate = self.client_gate.lock().await;
        let participants = self.client.lock().clone();
        let timer = OperationTimer::new("client_startup").with_metadata("participants", &participants.len().to_string());
        info!(family = "client", participants = participants.len(), "Running client startup");

        for participant in &participants {
            let component = participant.resolve(registry)?;
            self.observe(participant.type_name(), "run_startup", component.run_startup(progress))
                .await?;
        }

        self.client_started.store(true, Ordering::SeqCst);
        timer.finish();
        Ok(())
    }

    /// Shuts client participants down in registration order (not reversed).
    /// Does nothing unless a startup has completed since the last shutdown.
    pub async fn run_client_shutdown(&self, registry: &ServiceRegistry, progress: &Progress) -> Result<(), ContainerError> {
        let _gate = self.client_gate.lock().await;
        if !self.client_started.swap(false, Ordering::SeqCst) {
            debug!(family = "client", "Client shutdown skipped, startup has not completed");
            return Ok(());
        }

        let participants = self.client.lock().clone();
        let timer = OperationTimer::new("client_shutdown").with_metadata("participants", &participants.len().to_string());
        info!(family = "client", participants = participants.len(), "Running client shutdown");

        for participant in &participants {
            let component = participant.resolve(registry)?;
            self.observe(participant.type_name(), "run_shutdown", component.run_shutdown(progress))
                .await?;
        }

        timer.finish();
        Ok(())
    }

    pub async fn run_logon(&self, registry: &ServiceRegistry, progress: &Progress) -> Result<(), ContainerError> {
        let _gate = self.logon_gate.lock().await;
        let participants = self.logon.lock().clone();
        let timer = OperationTimer::new("logon").with_metadata("participants", &participants.len().to_string());
        info!(family = "logon", participants = participants.len(), "Running logon");

        for participant in &participants {
            let component = participant.resolve(registry)?;
            self.observe(participant.type_name(), "run_logon", component.run_logon(progress))
                .await?;
        }

        timer.finish();
        Ok(())
    }

    /// Logoff has no guard: it runs even without a prior logon.
    pub async fn run_logoff(&self, registry: &ServiceRegistry, progress: &Progress) -> Result<(), ContainerError> {
        let _gate = self.logon_gate.lock().await;
        let participants = self.logon.lock().clone();
        let timer = OperationTimer::new("logoff").with_metadata("participants", &participants.len().to_string());
        info!(family = "logon", participants = participants.len(), "Running logoff");

        for participant in &participants {
            let component = participant.resolve(registry)?;
            self.observe(participant.type_name(), "run_logoff", component.run_logoff(progress))
                .await?;
        }

        timer.finish();
        Ok(())
    }

    async fn observe<F>(&self, component: &'static str, callback: &'static str, call: F) -> Result<(), ContainerError>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        debug!(component, callback, "Invoking lifetime participant");
        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        if let Some(threshold) = self.slow_participant {
            if elapsed >= threshold {
                warn!(
                    component,
                    callback,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Slow lifetime participant"
                );
            }
        }

        result.map_err(ContainerError::from)
    }
}

impl Default for LifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter {
        startups: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    #[async_trait]
    impl ClientLifetime for Counter {
        async fn run_startup(&self, _progress: &Progress) -> anyhow::Result<()> {
            self.startups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn run_shutdown(&self, _progress: &Progress) -> anyhow::Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Inert;
    impl Component for Inert {}

    fn progress() -> Progress {
        Progress::indeterminate("Test", "")
    }

    #[tokio::test]
    async fn test_duplicate_direct_registration_runs_twice() {
        let registry = ServiceRegistry::new();
        let manager = LifetimeManager::new();
        let counter = Arc::new(Counter::default());

        manager.register_for_client_lifetime(Arc::clone(&counter));
        manager.register_for_client_lifetime(Arc::clone(&counter));
        assert_eq!(manager.client_participants(), 2);

        manager.run_client_startup(&registry, &progress()).await.unwrap();
        assert_eq!(counter.startups.load(Ordering::SeqCst), 2);
        assert!(manager.client_started());
    }

    #[tokio::test]
    async fn test_shutdown_before_startup_is_noop() {
        let registry = ServiceRegistry::new();
        let manager = LifetimeManager::new();
        let counter = Arc::new(Counter::default());
        manager.register_for_client_lifetime(Arc::clone(&counter));

        manager.run_client_shutdown(&registry, &progress()).await.unwrap();
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 0);

        manager.run_client_startup(&registry, &progress()).await.unwrap();
        manager.run_client_shutdown(&registry, &progress()).await.unwrap();
        manager.run_client_shutdown(&registry, &progress()).await.unwrap();
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!manager.client_started());
    }

    #[tokio::test]
    async fn test_trait_object_participants_are_accepted() {
        let registry = ServiceRegistry::new();
        let manager = LifetimeManager::new();
        let counter = Arc::new(Counter::default());
        let erased: Arc<dyn ClientLifetime> = counter.clone();

        manager.register_for_client_lifetime_dyn(Arc::clone(&erased));
        manager.register_for_client_lifetime(Arc::clone(&counter));
        assert_eq!(manager.client_participants(), 2);

        manager.run_client_startup(&registry, &progress()).await.unwrap();
        manager.run_client_shutdown(&registry, &progress()).await.unwrap();
        assert_eq!(counter.startups.load(Ordering::SeqCst), 2);
        assert_eq!(counter.shutdowns.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_container_type_without_capability_is_ignored() {
        let manager = LifetimeManager::new();
        manager.register_container_type::<Inert>();
        assert_eq!(manager.client_participants(), 0);
        assert_eq!(manager.logon_participants(), 0);
    }

    #[tokio::test]
    async fn test_participant_without_capability_is_invalid() {
        let registry = ServiceRegistry::new();
        registry.register_instance(Inert).unwrap();

        let manager = LifetimeManager::new();
        manager.client.lock().push(Participant::Registered {
            type_name: type_name::<Inert>(),
            resolve: resolve_client::<Inert>,
        });

        let result = manager.run_client_startup(&registry, &progress()).await;
        assert!(matches!(
            result,
            Err(ContainerError::InvalidParticipant {
                capability: "ClientLifetime",
                ..
            })
        ));
        assert!(!manager.client_started());
    }

    #[tokio::test]
    async fn test_unregistered_participant_is_reported() {
        let registry = ServiceRegistry::new();
        let manager = LifetimeManager::new();
        manager.client.lock().push(Participant::Registered {
            type_name: type_name::<Inert>(),
            resolve: resolve_client::<Inert>,
        });

        let result = manager.run_client_startup(&registry, &progress()).await;
        assert!(matches!(result, Err(ContainerError::NotRegistered { .. })));
    }
}
