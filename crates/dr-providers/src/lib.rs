//! dr-providers: Reasoning model provider implementations for deep-reason
//!
//! This crate provides implementations of the `ReasoningProvider` trait for
//! streaming reasoning endpoints.

pub mod deepseek;

pub use deepseek::DeepSeekProvider;
