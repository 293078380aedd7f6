//! Reference-to-display currency conversion.
//!
//! The pricing engine works in the reference currency only. Conversion happens
//! at display time through a converter that owns its rate cache and reads time
//! from an injected [`Clock`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::ApplicationError;

pub const REFERENCE_CURRENCY: &str = "USD";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        match self.now.lock() {
            Ok(mut now) => *now += by,
            Err(poisoned) => *poisoned.into_inner() += by,
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Display-currency units per one reference unit.
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self) -> Result<ExchangeRate, ApplicationError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RateSnapshot {
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
    pub is_fallback: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrencySettings {
    pub display_currency: String,
    pub fallback_rate: Decimal,
    pub cache_ttl: Duration,
    /// Decimal places kept for display amounts.
    pub display_scale: u32,
}

impl Default for CurrencySettings {
    fn default() -> Self {
        Self {
            display_currency: "UZS".to_owned(),
            fallback_rate: Decimal::from(12_650),
            cache_ttl: Duration::seconds(300),
            display_scale: 0,
        }
    }
}

pub struct CurrencyConverter<S, C> {
    source: S,
    clock: C,
    settings: CurrencySettings,
    cache: Mutex<Option<RateSnapshot>>,
}

impl<S, C> CurrencyConverter<S, C>
where
    S: RateSource,
    C: Clock,
{
    pub fn new(source: S, clock: C, settings: CurrencySettings) -> Self {
        Self { source, clock, settings, cache: Mutex::new(None) }
    }

    pub fn settings(&self) -> &CurrencySettings {
        &self.settings
    }

    /// Cached rate while younger than the TTL; otherwise refetches, falling back
    /// to the configured constant on failure. Fallback values are never cached.
    pub async fn current_rate(&self) -> RateSnapshot {
        let now = self.clock.now();
        if let Some(cached) = self.cached() {
            if now - cached.fetched_at < self.settings.cache_ttl {
                debug!(event_name = "currency.rate_cache_hit", rate = %cached.rate, "rate served from cache");
                return cached;
            }
        }

        match self.source.fetch_rate().await {
            Ok(fetched) => {
                let snapshot = RateSnapshot {
                    rate: fetched.rate,
                    fetched_at: now,
                    is_fallback: false,
                    error: None,
                };
                self.store(snapshot.clone());
                snapshot
            }
            Err(error) => {
                warn!(
                    event_name = "currency.rate_fallback",
                    fallback_rate = %self.settings.fallback_rate,
                    error = %error,
                    "exchange rate fetch failed, using fallback rate"
                );
                RateSnapshot {
                    rate: self.settings.fallback_rate,
                    fetched_at: now,
                    is_fallback: true,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    pub fn invalidate(&self) {
        match self.cache.lock() {
            Ok(mut cache) => *cache = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn to_display(&self, reference_amount: Decimal, snapshot: &RateSnapshot) -> Decimal {
        (reference_amount * snapshot.rate).round_dp_with_strategy(
            self.settings.display_scale,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    pub fn to_reference(&self, display_amount: Decimal, snapshot: &RateSnapshot) -> Decimal {
        if snapshot.rate.is_zero() {
            return Decimal::ZERO;
        }
        (display_amount / snapshot.rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    fn cached(&self) -> Option<RateSnapshot> {
        match self.cache.lock() {
            Ok(cache) => cache.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, snapshot: RateSnapshot) {
        match self.cache.lock() {
            Ok(mut cache) => *cache = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::{
        CurrencyConverter, CurrencySettings, ExchangeRate, ManualClock, RateSource,
    };
    use crate::errors::ApplicationError;

    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<rust_decimal::Decimal, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<rust_decimal::Decimal, String>>) -> Self {
            Self { responses: Mutex::new(responses.into()), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl RateSource for ScriptedSource {
        async fn fetch_rate(&self) -> Result<ExchangeRate, ApplicationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err("exhausted".to_owned()));
            next.map(|rate| ExchangeRate { rate, updated_at: Utc::now() })
                .map_err(ApplicationError::Currency)
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid date"))
    }

    #[tokio::test]
    async fn rate_is_cached_for_five_minutes() {
        let clock = clock();
        let converter = CurrencyConverter::new(
            ScriptedSource::new(vec![Ok(dec!(12700)), Ok(dec!(12800))]),
            clock.clone(),
            CurrencySettings::default(),
        );

        assert_eq!(converter.current_rate().await.rate, dec!(12700));
        clock.advance(Duration::seconds(299));
        assert_eq!(converter.current_rate().await.rate, dec!(12700));
        assert_eq!(converter.source.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::seconds(1));
        assert_eq!(converter.current_rate().await.rate, dec!(12800));
        assert_eq!(converter.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_failure_uses_fallback_and_retries_next_time() {
        let clock = clock();
        let converter = CurrencyConverter::new(
            ScriptedSource::new(vec![Err("timeout".to_owned()), Ok(dec!(12900))]),
            clock,
            CurrencySettings::default(),
        );

        let fallback = converter.current_rate().await;
        assert!(fallback.is_fallback);
        assert_eq!(fallback.rate, dec!(12650));
        assert!(fallback.error.as_deref().is_some_and(|error| error.contains("timeout")));

        let fresh = converter.current_rate().await;
        assert!(!fresh.is_fallback);
        assert_eq!(fresh.rate, dec!(12900));
    }

    #[tokio::test]
    async fn conversion_rounds_to_display_and_reference_scales() {
        let converter = CurrencyConverter::new(
            ScriptedSource::new(vec![Ok(dec!(12650.5))]),
            clock(),
            CurrencySettings::default(),
        );
        let snapshot = converter.current_rate().await;

        assert_eq!(converter.to_display(dec!(118.5), &snapshot), dec!(1499084));
        assert_eq!(converter.to_reference(dec!(1499084), &snapshot), dec!(118.50));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let converter = CurrencyConverter::new(
            ScriptedSource::new(vec![Ok(dec!(12700)), Ok(dec!(12750))]),
            clock(),
            CurrencySettings::default(),
        );
        converter.current_rate().await;
        converter.invalidate();
        assert_eq!(converter.current_rate().await.rate, dec!(12750));
    }
}
