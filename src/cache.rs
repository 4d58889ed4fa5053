// Cache partagé de la dernière mesure valide du capteur.
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

// Une mesure et l'instant où elle a été prise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledValue {
    pub value: f64,
    pub sampled_at: DateTime<Utc>,
}

// Un seul écrivain (le sampler), un nombre quelconque de lecteurs.
// Le `RwLock` garantit qu'un lecteur ne voit jamais une mesure à moitié écrite.
// La fraîcheur n'est pas suivie ici : on sert la dernière valeur connue.
#[derive(Debug, Clone, Default)]
pub struct SampledValueCache {
    latest: Arc<RwLock<Option<SampledValue>>>,
}

impl SampledValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, value: f64) {
        let sample = SampledValue {
            value,
            sampled_at: Utc::now(),
        };
        *self.latest.write().await = Some(sample);
    }

    pub async fn get(&self) -> Option<f64> {
        self.latest.read().await.map(|s| s.value)
    }

    pub async fn latest(&self) -> Option<SampledValue> {
        *self.latest.read().await
    }
}
