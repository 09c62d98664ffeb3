// Lock metrics
// Recorded through the `metrics` facade; installing an exporter is up to the application

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Register metric descriptions. Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(
        "latchkey_acquire_total",
        "Total number of lock acquisition attempts"
    );
    describe_counter!("latchkey_release_total", "Total number of lock releases");
    describe_counter!("latchkey_extend_total", "Total number of lock extensions");
    describe_counter!(
        "latchkey_ttl_repair_total",
        "Total number of TTLs installed on keys that had none"
    );
    describe_counter!(
        "latchkey_lock_lost_total",
        "Total number of guarded locks lost before release"
    );
    describe_gauge!("latchkey_held_guards", "Number of live lock guards");

    tracing::info!("Lock metrics initialized");
}

pub(crate) fn record_acquire(outcome: &'static str) {
    counter!("latchkey_acquire_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_release(mode: &'static str, outcome: &'static str) {
    counter!("latchkey_release_total", "mode" => mode, "outcome" => outcome).increment(1);
}

pub(crate) fn record_extend(outcome: &'static str) {
    counter!("latchkey_extend_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_ttl_repair(source: &'static str) {
    counter!("latchkey_ttl_repair_total", "source" => source).increment(1);
}

pub(crate) fn record_lock_lost() {
    counter!("latchkey_lock_lost_total").increment(1);
}

pub(crate) fn guard_opened() {
    gauge!("latchkey_held_guards").increment(1.0);
}

pub(crate) fn guard_closed() {
    gauge!("latchkey_held_guards").decrement(1.0);
}

/// Label for a boolean store result
pub(crate) fn outcome_label(applied: bool, yes: &'static str, no: &'static str) -> &'static str {
    if applied { yes } else { no }
}
