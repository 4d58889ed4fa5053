// Capacité d'échantillonnage : le sampler ne dépend que du trait `Sensor`.
use crate::error::SampleError;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait Sensor: Send + Sync {
    // Une lecture, en degrés Celsius. Peut échouer de manière transitoire.
    async fn sample(&self) -> Result<f64, SampleError>;
}

// Capteur exposé par le noyau via sysfs/IIO, par exemple le pilote dht11 :
// `/sys/bus/iio/devices/iio:device0/in_temp_input` contient des millidegrés.
// Le pilote renvoie EIO quand la trame du DHT11 est corrompue, d'où les retries.
#[derive(Debug, Clone)]
pub struct SysfsSensor {
    path: PathBuf,
}

impl SysfsSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Sensor for SysfsSensor {
    async fn sample(&self) -> Result<f64, SampleError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_millidegrees(&raw)
    }
}

fn parse_millidegrees(raw: &str) -> Result<f64, SampleError> {
    let trimmed = raw.trim();
    let millis: f64 = trimmed
        .parse()
        .map_err(|_| SampleError::Parse(trimmed.to_string()))?;
    let celsius = millis / 1000.0;
    if !celsius.is_finite() {
        return Err(SampleError::NotFinite);
    }
    Ok(celsius)
}
