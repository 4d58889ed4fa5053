use crate::broker::Broker;
use crate::cache::SampledValueCache;
use crate::database::Store;
use crate::dispatcher::Dispatcher;
use crate::registry::TopicRegistry;
use std::sync::Arc;

// État partagé, cloné dans chaque handler et chaque transport.
// Une seule instance de registre et de cache par processus.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub registry: Arc<TopicRegistry>,
    pub temperature: SampledValueCache,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, temperature: SampledValueCache) -> Self {
        let registry = Arc::new(TopicRegistry::new());
        let broker = Arc::new(Broker::new(store, Dispatcher::new(registry.clone())));
        Self {
            broker,
            registry,
            temperature,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.broker.store()
    }
}
