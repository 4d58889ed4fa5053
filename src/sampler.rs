// Boucle d'échantillonnage du capteur de température.
// Tâche de fond unique, démarrée une fois au lancement, arrêtée seulement avec le processus.
use crate::cache::SampledValueCache;
use crate::error::SampleError;
use crate::sensor::Sensor;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Politique de retry d'un cycle d'échantillonnage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    // Nombre de tentatives par cycle.
    pub max_attempts: u32,
    // Attente entre deux tentatives, le temps que le capteur se stabilise.
    pub attempt_delay: Duration,
    // Attente entre deux cycles, quel que soit le résultat.
    pub cycle_interval: Duration,
    // Durée max d'une lecture. Doit rester <= `attempt_delay`.
    pub attempt_timeout: Duration,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_delay: Duration::from_secs(2),
            cycle_interval: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(2),
        }
    }
}

pub struct Sampler {
    sensor: Arc<dyn Sensor>,
    cache: SampledValueCache,
    policy: SamplingPolicy,
}

impl Sampler {
    pub fn new(sensor: Arc<dyn Sensor>, cache: SampledValueCache, policy: SamplingPolicy) -> Self {
        Self {
            sensor,
            cache,
            policy,
        }
    }

    // Lance la boucle en arrière-plan.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    // Ne retourne jamais : les échecs de lecture sont toujours récupérés localement.
    pub async fn run(self) {
        info!(
            "Sampling loop started ({} attempts, every {:?})",
            self.policy.max_attempts, self.policy.cycle_interval
        );
        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.policy.cycle_interval).await;
        }
    }

    // Un cycle : au plus `max_attempts` lectures, la première réussie est arrondie et stockée.
    // Si toutes échouent, le cache garde sa valeur précédente.
    pub async fn run_cycle(&self) -> Option<f64> {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            match self.sample_once().await {
                Ok(value) => {
                    let value = round_one_decimal(value);
                    self.cache.set(value).await;
                    debug!("Temperature sampled: {} (attempt {})", value, attempt);
                    return Some(value);
                }
                Err(e) => {
                    debug!("Sensor attempt {}/{} failed: {}", attempt, attempts, e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.attempt_delay).await;
            }
        }

        warn!("Sampling cycle skipped: {} attempts failed", attempts);
        None
    }

    async fn sample_once(&self) -> Result<f64, SampleError> {
        match tokio::time::timeout(self.policy.attempt_timeout, self.sensor.sample()).await {
            Ok(result) => result,
            Err(_) => Err(SampleError::Timeout),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    // Capteur factice qui rejoue un script, puis échoue indéfiniment.
    struct ScriptedSensor {
        script: Mutex<VecDeque<Option<f64>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSensor {
        fn new(script: &[Option<f64>]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sensor for ScriptedSensor {
        async fn sample(&self) -> Result<f64, SampleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front().flatten() {
                Some(v) => Ok(v),
                None => Err(SampleError::Parse("checksum mismatch".into())),
            }
        }
    }

    struct HungSensor;

    #[async_trait]
    impl Sensor for HungSensor {
        async fn sample(&self) -> Result<f64, SampleError> {
            std::future::pending().await
        }
    }

    fn sampler(sensor: Arc<dyn Sensor>, cache: &SampledValueCache) -> Sampler {
        Sampler::new(sensor, cache.clone(), SamplingPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures() {
        let cache = SampledValueCache::new();
        let sensor = ScriptedSensor::new(&[None, None, Some(22.3)]);
        let start = Instant::now();

        let value = sampler(sensor.clone(), &cache).run_cycle().await;

        assert_eq!(value, Some(22.3));
        assert_eq!(cache.get().await, Some(22.3));
        assert_eq!(sensor.calls(), 3);
        // deux attentes de 2s entre les trois tentatives
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_cycle_keeps_previous_value() {
        let cache = SampledValueCache::new();
        cache.set(19.8).await;
        let sensor = ScriptedSensor::new(&[None, None, None, Some(30.0)]);

        let value = sampler(sensor.clone(), &cache).run_cycle().await;

        assert_eq!(value, None);
        assert_eq!(cache.get().await, Some(19.8));
        // la quatrième valeur n'est pas consommée dans ce cycle
        assert_eq!(sensor.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_cycle_on_startup_leaves_cache_empty() {
        let cache = SampledValueCache::new();
        let sensor = ScriptedSensor::new(&[]);
        assert_eq!(sampler(sensor, &cache).run_cycle().await, None);
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_stops_the_cycle() {
        let cache = SampledValueCache::new();
        let sensor = ScriptedSensor::new(&[Some(20.04), Some(25.0)]);
        let start = Instant::now();

        assert_eq!(sampler(sensor.clone(), &cache).run_cycle().await, Some(20.0));
        assert_eq!(sensor.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_reads_time_out() {
        let cache = SampledValueCache::new();
        let start = Instant::now();

        assert_eq!(sampler(Arc::new(HungSensor), &cache).run_cycle().await, None);
        // 3 timeouts de 2s + 2 attentes de 2s
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_failed_cycles() {
        let cache = SampledValueCache::new();
        let sensor = ScriptedSensor::new(&[None, None, None, Some(23.46)]);
        let handle = sampler(sensor.clone(), &cache).spawn();

        tokio::time::timeout(Duration::from_secs(60), async {
            while cache.get().await.is_none() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
        .await
        .expect("the second cycle should fill the cache");

        assert_eq!(cache.get().await, Some(23.5));
        assert!(!handle.is_finished());
        handle.abort();
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_one_decimal(22.34), 22.3);
        assert_eq!(round_one_decimal(22.36), 22.4);
        assert_eq!(round_one_decimal(-3.04), -3.0);
    }
}
