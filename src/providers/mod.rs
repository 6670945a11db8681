pub mod google_analytics;
pub mod vanguard;
