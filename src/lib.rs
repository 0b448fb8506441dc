//! # Quizroom
//!
//! This library provides the coordination engine behind live classroom
//! quizzes. A presenter creates a session, adds multiple choice questions
//! and opens them one at a time; participants join with a short code and a
//! display name, answer the live question, and receive results and a final
//! leaderboard. Transport is left to the embedding application: every
//! broadcast goes through the [`tunnel::Tunnel`] trait.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)]
use derive_where::derive_where;
use serde::Serialize;

pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod join_artifact;
pub mod leaderboard;
mod names;
pub mod question;
pub mod question_set;
pub mod registry;
pub mod results;
pub mod scoring;
pub mod session_code;
pub mod tunnel;
pub mod watcher;

pub use error::{Error, Result};
pub use registry::Registry;

/// The head of a longer list, together with the full length
///
/// Leaderboards sent to participants list only the top entries but still
/// say how many participants took part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[derive_where(Default)]
pub struct TruncatedVec<T> {
    exact_count: usize,
    items: Vec<T>,
}

impl<T> TruncatedVec<T> {
    /// Keeps the first `limit` entries of `list`
    ///
    /// `exact_count` is the length of the whole list, which the caller
    /// usually already knows.
    pub fn new<I: IntoIterator<Item = T>>(list: I, limit: usize, exact_count: usize) -> Self {
        Self {
            exact_count,
            items: list.into_iter().take(limit).collect(),
        }
    }

    /// Length of the whole list
    pub fn exact_count(&self) -> usize {
        self.exact_count
    }

    /// The kept entries
    pub fn items(&self) -> &[T] {
        &self.items
    }
}
