#![forbid(unsafe_code)]

pub mod app_services;
pub mod context;
pub mod error;
pub mod feed_service;
pub mod feedback_service;
pub mod leaderboard_service;
pub mod profile_service;
pub mod progress_service;
pub mod schedule_service;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use context::SessionContext;
pub use error::{
    AppServicesError, FeedServiceError, FeedbackServiceError, LeaderboardServiceError,
    ProfileServiceError, ProgressServiceError, ScheduleServiceError,
};
pub use feed_service::{FeedInputs, FeedService, FeedUpdate, FeedWatcher, trigger_for};
pub use feedback_service::FeedbackService;
pub use leaderboard_service::LeaderboardService;
pub use profile_service::ProfileService;
pub use progress_service::{ProgressService, QuizOutcome};
pub use schedule_service::ScheduleService;
