use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use homebuyer::rates::{LoanDataSink, LocationKey, Notice, NoticeLevel, Notifier, RateBundle};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Loan fields shared with the rest of the application. Rates are pushed in
/// after every successful acquisition and cleared when the chain is exhausted.
#[derive(Default, Clone)]
pub(crate) struct SharedLoanData {
    current: Arc<Mutex<Option<(LocationKey, RateBundle)>>>,
}

impl SharedLoanData {
    pub(crate) fn snapshot(&self) -> Option<(LocationKey, RateBundle)> {
        self.current.lock().expect("loan data mutex poisoned").clone()
    }
}

impl LoanDataSink for SharedLoanData {
    fn apply(&self, location: &LocationKey, bundle: &RateBundle) {
        let mut guard = self.current.lock().expect("loan data mutex poisoned");
        *guard = Some((location.clone(), bundle.clone()));
    }

    fn clear(&self) {
        let mut guard = self.current.lock().expect("loan data mutex poisoned");
        *guard = None;
    }
}

/// Surfaces notices in the service log.
#[derive(Default, Clone, Copy)]
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(message = %notice.message, "rate notice"),
            NoticeLevel::Error => warn!(message = %notice.message, "rate notice"),
        }
    }
}

/// Parse an `id=value` compensating factor selection.
pub(crate) fn parse_factor(raw: &str) -> Result<(String, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected factor as id=value, got '{raw}'"))?;
    let id = id.trim();
    let value = value.trim();
    if id.is_empty() || value.is_empty() {
        return Err(format!("expected factor as id=value, got '{raw}'"));
    }
    Ok((id.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use homebuyer::rates::RateSourceKind;

    #[test]
    fn parse_factor_splits_on_first_equals() {
        assert_eq!(
            parse_factor("cash_reserves=6+ months"),
            Ok(("cash_reserves".to_string(), "6+ months".to_string()))
        );
        assert!(parse_factor("cash_reserves").is_err());
        assert!(parse_factor("=none").is_err());
    }

    #[test]
    fn shared_loan_data_tracks_latest_bundle() {
        let shared = SharedLoanData::default();
        let location = LocationKey::from_parts(Some("OR"), Some("Multnomah"), None)
            .expect("complete location");
        let bundle = RateBundle {
            conventional_rate: Some(6.7),
            fha_rate: None,
            property_tax_rate: None,
            property_insurance_rate: None,
            upfront_mip: None,
            ongoing_mip: None,
            source: RateSourceKind::ScrapedIndex,
            fetched_at: Utc::now(),
            rate_date: None,
        };

        shared.apply(&location, &bundle);
        assert_eq!(shared.snapshot().map(|(key, _)| key), Some(location));

        shared.clear();
        assert!(shared.snapshot().is_none());
    }
}
