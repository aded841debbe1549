//! Interval and category types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Operational category assigned to every interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Productive,
    Available,
    Maintenance,
    IdleEngine,
    Washing,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 5] = [
        Category::Productive,
        Category::Available,
        Category::Maintenance,
        Category::IdleEngine,
        Category::Washing,
    ];

    /// Short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            Category::Productive => "PROD",
            Category::Available => "AVAIL",
            Category::Maintenance => "MAINT",
            Category::IdleEngine => "IDLE",
            Category::Washing => "WASH",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Productive => write!(f, "Productive"),
            Category::Available => write!(f, "Available"),
            Category::Maintenance => write!(f, "Maintenance"),
            Category::IdleEngine => write!(f, "Idle Engine"),
            Category::Washing => write!(f, "Washing"),
        }
    }
}

/// Time span between two temporally adjacent records of one machine.
///
/// Classification inputs (`category`, `operation_code`, `engine_on`,
/// `elevator_on`) come from the later record, the one closing the span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub machine_id: u32,
    /// Timestamp of the earlier record
    pub start_time: Option<NaiveDateTime>,
    /// Always within `[0, outlier_threshold_hours]`
    pub duration_hours: f64,
    pub category: Category,
    pub operation_code: String,
    pub engine_on: bool,
    pub elevator_on: bool,
    /// The raw delta exceeded the outlier threshold and was zeroed
    pub gap_suppressed: bool,
}
