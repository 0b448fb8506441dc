//! Configuration constants for the quiz engine
//!
//! This module contains the limits and defaults used throughout the engine
//! to keep session, question and participant data within sane boundaries.

/// Session configuration constants
pub mod session {
    /// Number of characters in a session code
    pub const CODE_LENGTH: usize = 6;
    /// Title used when the presenter leaves it blank
    pub const DEFAULT_TITLE: &str = "New Quiz";
    /// Presenter name used when the presenter leaves it blank
    pub const DEFAULT_PRESENTER_NAME: &str = "Presenter";
    /// Maximum length of a session title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of participants allowed in a single session
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
    /// Maximum number of questions in a single session
    pub const MAX_QUESTION_COUNT: usize = 100;
}

/// Question configuration constants
pub mod question {
    /// Minimum length of a question prompt
    pub const MIN_PROMPT_LENGTH: usize = 1;
    /// Maximum length of a question prompt
    pub const MAX_PROMPT_LENGTH: usize = 500;
    /// Minimum number of non-empty options required
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of options for a question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of a single option
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Time limit in seconds applied when none is given
    pub const DEFAULT_TIME_LIMIT: u32 = 30;
    /// Minimum time limit in seconds
    pub const MIN_TIME_LIMIT: u32 = 1;
    /// Maximum time limit in seconds
    pub const MAX_TIME_LIMIT: u32 = 600;
}

/// Participant name configuration constants
pub mod names {
    /// Maximum length of a display name in characters
    pub const MAX_LENGTH: usize = 30;
}

/// Leaderboard configuration constants
pub mod leaderboard {
    /// Number of entries shown on the shared leaderboard
    pub const DEFAULT_TOP_N: usize = 3;
    /// Maximum number of entries a leaderboard request may ask for
    pub const MAX_TOP_N: usize = 50;
}

/// Scoring configuration constants
pub mod scoring {
    /// Points for a correct answer within the first half of the time limit
    pub const FAST_POINTS: u64 = 2;
    /// Points for any other correct answer
    pub const BASE_POINTS: u64 = 1;
}
