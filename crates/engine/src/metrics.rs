// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! OpenTelemetry instruments for a single component.

use opentelemetry::metrics::Counter;
use opentelemetry::KeyValue;

#[derive(Clone)]
pub(crate) struct ComponentMetrics {
    labels: [KeyValue; 1],
    queued: Counter<u64>,
    completed: Counter<u64>,
    discarded: Counter<u64>,
    failed: Counter<u64>,
    flushes: Counter<u64>,
    transitions: Counter<u64>,
}

impl ComponentMetrics {
    pub(crate) fn new(component: &str) -> Self {
        let meter = opentelemetry::global::meter("codeckit_engine");
        let queued = meter
            .u64_counter("component.work.queued")
            .with_description("Work items admitted by queue()")
            .build();
        let completed = meter
            .u64_counter("component.work.completed")
            .with_description("Work items delivered to the listener")
            .build();
        let discarded = meter
            .u64_counter("component.work.discarded")
            .with_description("Work items dropped by stop, reset or release")
            .build();
        let failed = meter
            .u64_counter("component.work.failed")
            .with_description("Work items delivered with an error status")
            .build();
        let flushes = meter
            .u64_counter("component.flushes")
            .with_description("Completed flush() calls")
            .build();
        let transitions = meter
            .u64_counter("component.lifecycle.transitions")
            .with_description("Lifecycle state changes")
            .build();

        Self {
            labels: [KeyValue::new("component", component.to_string())],
            queued,
            completed,
            discarded,
            failed,
            flushes,
            transitions,
        }
    }

    pub(crate) fn record_queued(&self, count: usize) {
        self.queued.add(count as u64, &self.labels);
    }

    pub(crate) fn record_completed(&self, count: usize) {
        self.completed.add(count as u64, &self.labels);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.add(1, &self.labels);
    }

    pub(crate) fn record_discarded(&self, count: usize) {
        if count > 0 {
            self.discarded.add(count as u64, &self.labels);
        }
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.add(1, &self.labels);
    }

    pub(crate) fn record_transition(&self, to: &'static str) {
        self.transitions.add(1, &[self.labels[0].clone(), KeyValue::new("state", to)]);
    }
}
