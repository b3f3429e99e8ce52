//! The bank counter model.
//!
//! Customers arrive with exponential gaps (mean 60 s) and are served by a
//! single teller with exponential service (mean 48 s), giving a utilisation
//! of 0.8.  A customer who has waited 10 minutes gives up and leaves through
//! the `gave_up` exit.

use qn_core::StationId;
use qn_eval::{Distribution, TimeSource};
use qn_resource::{Alternative, ResourceGroup};
use qn_station::{Dispose, NetworkBuilder, Process, Source};

pub const MEAN_INTERARRIVAL_SECS: f64 = 60.0;
pub const MEAN_SERVICE_SECS:      f64 = 48.0;
pub const PATIENCE_SECS:          f64 = 600.0;

/// Returns `(builder, counter)`.
pub fn build_network() -> (NetworkBuilder, StationId) {
    let mut b = NetworkBuilder::new();
    let customer = b.client_type("customer");
    let teller = b.resource_group(ResourceGroup::new("teller", 1));

    let arrivals = b.add(Source::new(
        "arrivals",
        customer,
        TimeSource::Distribution(Distribution::Exponential { mean: MEAN_INTERARRIVAL_SECS }),
    ));
    let counter = b.add(
        Process::new("counter")
            .service(TimeSource::Distribution(Distribution::Exponential { mean: MEAN_SERVICE_SECS }))
            .tolerance(TimeSource::fixed(PATIENCE_SECS))
            .alternative(Alternative::new().need(teller, 1)),
    );
    let served = b.add(Dispose::new("served"));
    let gave_up = b.add(Dispose::new("gave_up"));

    b.connect(arrivals, counter).connect(counter, served);
    b.connect_cancel(counter, gave_up);
    (b, counter)
}
