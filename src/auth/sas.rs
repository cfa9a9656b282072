//! Refreshable SAS state: collapses concurrent refresh attempts into one (§4.1, §5, §8).

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::{ClientOptions, SasProducer};
use crate::date::parse_sas_datetime;
use crate::error::{Error, Result};

struct Inner {
    current: Option<String>,
    next_refresh_at_ms: i64,
}

/// Holds the most recently produced SAS and the instant after which the
/// next use must trigger a refresh. The `tokio::sync::Mutex` around the
/// whole check-and-refresh section is what collapses concurrent refreshes:
/// the second caller to reach `lock()` observes the first caller's refresh
/// already applied and does not call the producer again.
pub struct SasState {
    inner: Mutex<Inner>,
}

impl SasState {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { current: None, next_refresh_at_ms: i64::MIN }) }
    }

    /// Returns a SAS query string valid for immediate use, refreshing first
    /// if necessary.
    pub async fn resolve(&self, producer: &dyn SasProducer, options: &ClientOptions) -> Result<String> {
        let mut guard = self.inner.lock().await;
        let now_ms = Utc::now().timestamp_millis();

        if guard.current.is_none() || now_ms > guard.next_refresh_at_ms {
            match self.refresh(producer, options).await {
                Ok(sas) => {
                    guard.current = Some(sas.clone());
                    guard.next_refresh_at_ms = Self::next_refresh_at(&sas, options)?;
                    return Ok(sas);
                }
                Err(err) => {
                    if let Some(handler) = &options.on_sas_refresh_error {
                        handler(err.clone());
                    }
                    // A stale SAS is better than none if we have one; otherwise propagate.
                    return match &guard.current {
                        Some(sas) => Ok(sas.clone()),
                        None => Err(err),
                    };
                }
            }
        }

        Ok(guard.current.clone().expect("current SAS present once refreshed"))
    }

    async fn refresh(&self, producer: &dyn SasProducer, _options: &ClientOptions) -> Result<String> {
        producer.produce().await
    }

    /// `se` minus `minSASAuthExpiry`; fails loudly if the producer handed
    /// back a SAS that is already within the refresh window (§3, §4.1).
    fn next_refresh_at(sas: &str, options: &ClientOptions) -> Result<i64> {
        let se = sas_field(sas, "se").ok_or_else(|| Error::sas_refresh("producer response has no se field"))?;
        let expiry = parse_sas_datetime(&se).ok_or_else(|| Error::sas_refresh("se field is not a valid SAS datetime"))?;
        let next_refresh_at_ms = expiry.timestamp_millis() - options.min_sas_auth_expiry_ms;
        let now_ms = Utc::now().timestamp_millis();
        if now_ms > next_refresh_at_ms {
            return Err(Error::sas_refresh("producer returned a SAS that is already within minSASAuthExpiry"));
        }
        Ok(next_refresh_at_ms)
    }
}

impl Default for SasState {
    fn default() -> Self {
        Self::new()
    }
}

fn sas_field<'a>(sas: &'a str, name: &str) -> Option<String> {
    sas.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            percent_encoding::percent_decode_str(value).decode_utf8().ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientOptions, Credentials};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProducer {
        calls: AtomicUsize,
        sas: String,
    }

    #[async_trait]
    impl SasProducer for CountingProducer {
        async fn produce(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.sas.clone())
        }
    }

    fn far_future_sas() -> String {
        let expiry = Utc::now() + chrono::Duration::hours(1);
        format!("sv=2014-02-14&se={}&sig=abc", crate::date::format_sas_datetime(&expiry))
    }

    #[tokio::test]
    async fn refresh_runs_once_then_reuses_cached_value() {
        let options = ClientOptions::builder(Credentials::SharedKey { account: "jungle".into(), key: vec![1] })
            .build()
            .unwrap();
        let producer = Arc::new(CountingProducer { calls: AtomicUsize::new(0), sas: far_future_sas() });
        let state = SasState::new();

        let first = state.resolve(producer.as_ref(), &options).await.unwrap();
        let second = state.resolve(producer.as_ref(), &options).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn too_short_sas_fails_refresh() {
        let options = ClientOptions::builder(Credentials::SharedKey { account: "jungle".into(), key: vec![1] })
            .min_sas_auth_expiry_ms(900_000)
            .build()
            .unwrap();
        let near_expiry = Utc::now() + chrono::Duration::seconds(1);
        let sas = format!("sv=2014-02-14&se={}&sig=abc", crate::date::format_sas_datetime(&near_expiry));
        let producer = Arc::new(CountingProducer { calls: AtomicUsize::new(0), sas });
        let state = SasState::new();

        let result = state.resolve(producer.as_ref(), &options).await;
        assert!(result.is_err());
    }
}
