#![allow(dead_code)]

use async_trait::async_trait;
use futures::future::{self, FutureExt};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tokio::sync::oneshot;
use viewshell_core::{
    Event, EventBus, EventTarget, FetchError, FetchFuture, ModuleDescriptor, ModuleExports,
    ModuleFetcher, ModuleRegistry, SubscriptionScope, View, ViewConstructor, ViewContext,
    ViewError, ViewExport,
};

type FetchResult = Result<ModuleExports, FetchError>;

/// Fetcher whose completions are driven by the test.
///
/// Locators configured with `serve` complete immediately; every other fetch
/// stays pending until `release` is called for its locator.
#[derive(Default)]
pub struct ScriptedFetcher {
    served: RefCell<BTreeMap<String, FetchResult>>,
    pending: RefCell<BTreeMap<String, Vec<oneshot::Sender<FetchResult>>>>,
    fetches: RefCell<BTreeMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn serve(&self, locator: &str, result: FetchResult) {
        self.served.borrow_mut().insert(locator.to_string(), result);
    }

    /// Completes every pending fetch of `locator`; returns how many.
    pub fn release(&self, locator: &str, result: FetchResult) -> usize {
        let senders = self
            .pending
            .borrow_mut()
            .remove(locator)
            .unwrap_or_default();
        let released = senders.len();
        for sender in senders {
            let _ = sender.send(result.clone());
        }
        released
    }

    pub fn fetch_count(&self, locator: &str) -> usize {
        self.fetches.borrow().get(locator).copied().unwrap_or(0)
    }

    pub fn pending_count(&self, locator: &str) -> usize {
        self.pending.borrow().get(locator).map_or(0, Vec::len)
    }
}

impl ModuleFetcher for ScriptedFetcher {
    fn fetch(&self, resource_locator: &str) -> FetchFuture {
        *self
            .fetches
            .borrow_mut()
            .entry(resource_locator.to_string())
            .or_default() += 1;

        if let Some(result) = self.served.borrow().get(resource_locator) {
            return future::ready(result.clone()).boxed_local();
        }

        let (sender, receiver) = oneshot::channel();
        self.pending
            .borrow_mut()
            .entry(resource_locator.to_string())
            .or_default()
            .push(sender);
        let locator = resource_locator.to_string();
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(FetchError::new(format!("fetch of {locator} dropped"))))
        }
        .boxed_local()
    }
}

pub fn registry(entries: &[(&str, &str, &str)]) -> ModuleRegistry {
    ModuleRegistry::from_descriptors(entries.iter().map(|(id, locator, export)| {
        ModuleDescriptor::new(*id, *locator, *export)
    }))
    .expect("fixture registry should be valid")
}

pub fn exports(export_name: &str, constructor: ViewExport) -> ModuleExports {
    ModuleExports::new().with(export_name, constructor)
}

/// Ordered record of constructor and teardown hooks.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.borrow().iter().any(|value| value == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|value| value == entry)
    }

    /// Asserts that no constructor started while another view was alive.
    pub fn assert_teardown_before_construct(&self) {
        let mut alive: Vec<String> = Vec::new();
        for entry in self.entries() {
            let (hook, name) = entry
                .rsplit_once(':')
                .expect("journal entries are hook:name");
            match hook {
                "construct:start" => assert!(
                    alive.is_empty(),
                    "constructor of {name} started while {alive:?} alive; journal: {:?}",
                    self.entries()
                ),
                "construct:end" => alive.push(name.to_string()),
                "teardown:end" => alive.retain(|value| value != name),
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownBehavior {
    Clean,
    Suspend,
    Fail,
    Panic,
}

pub enum ConstructBehavior {
    Build(TeardownBehavior),
    Fail,
    Panic,
    /// Builds a clean view once the paired sender fires.
    WaitFor(RefCell<Option<oneshot::Receiver<()>>>),
}

/// View that journals its teardown and owns a scope on the shell event bus.
pub struct RecordingView {
    pub name: String,
    pub route: String,
    pub refreshes: Rc<Cell<usize>>,
    journal: Journal,
    teardown: TeardownBehavior,
    scope: SubscriptionScope,
}

#[async_trait(?Send)]
impl View for RecordingView {
    async fn teardown(&mut self) -> Result<(), ViewError> {
        self.journal.record(format!("teardown:start:{}", self.name));
        if self.teardown == TeardownBehavior::Suspend {
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
        }
        self.scope.revoke_all();
        self.journal.record(format!("teardown:end:{}", self.name));
        match self.teardown {
            TeardownBehavior::Fail => Err(ViewError::new(format!("{} refused to stop", self.name))),
            TeardownBehavior::Panic => panic!("boom in {}", self.name),
            TeardownBehavior::Clean | TeardownBehavior::Suspend => Ok(()),
        }
    }
}

pub struct RecordingConstructor {
    name: String,
    journal: Journal,
    behavior: ConstructBehavior,
    built: Cell<usize>,
}

impl RecordingConstructor {
    pub fn new(name: &str, journal: &Journal, behavior: ConstructBehavior) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            journal: journal.clone(),
            behavior,
            built: Cell::new(0),
        })
    }

    pub fn clean(name: &str, journal: &Journal) -> Rc<Self> {
        Self::new(
            name,
            journal,
            ConstructBehavior::Build(TeardownBehavior::Clean),
        )
    }

    /// Constructor that waits for the returned sender before building.
    pub fn gated(name: &str, journal: &Journal) -> (Rc<Self>, oneshot::Sender<()>) {
        let (sender, receiver) = oneshot::channel();
        let constructor = Self::new(
            name,
            journal,
            ConstructBehavior::WaitFor(RefCell::new(Some(receiver))),
        );
        (constructor, sender)
    }

    pub fn built(&self) -> usize {
        self.built.get()
    }

    fn build(&self, context: ViewContext, teardown: TeardownBehavior) -> Box<dyn View> {
        let refreshes = Rc::new(Cell::new(0));
        let scope = SubscriptionScope::new(self.name.as_str());
        let counter = Rc::clone(&refreshes);
        let target: Rc<dyn EventTarget> = context.events.clone();
        scope.register(target, "refresh", move |_event: &Event| {
            counter.set(counter.get() + 1);
        });
        self.built.set(self.built.get() + 1);
        self.journal.record(format!("construct:end:{}", self.name));
        Box::new(RecordingView {
            name: self.name.clone(),
            route: context.navigation.route.clone(),
            refreshes,
            journal: self.journal.clone(),
            teardown,
            scope,
        })
    }
}

#[async_trait(?Send)]
impl ViewConstructor for RecordingConstructor {
    async fn construct(&self, context: ViewContext) -> Result<Box<dyn View>, ViewError> {
        self.journal.record(format!("construct:start:{}", self.name));
        tokio::task::yield_now().await;
        match &self.behavior {
            ConstructBehavior::Build(teardown) => Ok(self.build(context, *teardown)),
            ConstructBehavior::Fail => Err(ViewError::new(format!("{} has no data", self.name))),
            ConstructBehavior::Panic => panic!("constructor of {} exploded", self.name),
            ConstructBehavior::WaitFor(gate) => {
                let receiver = gate.borrow_mut().take();
                if let Some(receiver) = receiver {
                    let _ = receiver.await;
                }
                Ok(self.build(context, TeardownBehavior::Clean))
            }
        }
    }
}

pub fn shell_events() -> Rc<EventBus> {
    Rc::new(EventBus::new())
}
