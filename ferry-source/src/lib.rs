//! # Ferry Tag Sources
//!
//! Normalizes the tag APIs of the supported upstream registries into one
//! newest-first list of [`TagRecord`]s.
//!
//! | Registry kind | Upstream | Pagination |
//! |---|---|---|
//! | manifest-indexed | `k8s.gcr.io`, `registry.k8s.io` | single `tags/list` response |
//! | page-numbered | `quay.io` | `page=N`, 100 tags per page |
//! | arch-filtered | Docker Hub | `page=N`, one record per matching image |

pub mod adapters;
pub mod fetch;
pub mod record;
pub mod timestamp;

pub use adapters::{SourceOptions, TagSource};
pub use fetch::{HttpFetcher, JsonFetcher};
pub use record::{TagRecord, UNKNOWN_DIGEST};
