//! Network surface: the read-only REST API over the index store.

pub mod rest;
