//! Client code for precache.
//!
//! This crate provides the network fetch capability and the cache worker
//! that sits between a page's resource requests and the storage regions.

pub mod fetch;
pub mod worker;

pub use fetch::{CacheMode, FetchClient, FetchConfig, FetchResponse, Fetcher, Method, ResourceRequest};

pub use worker::{
    ActivationOutcome, ActivationPath, ActivationReport, CacheNames, CacheStatus, CacheWorker, ControlMessage,
    DetachedHost, InstallReport, Interception, LifecycleHost, MessageOutcome, PrefetchReport, ResponseSource,
    WorkerConfig, WorkerState,
};
