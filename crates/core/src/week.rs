use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::curriculum::MalformedCurriculum;

/// Progress of a single curriculum week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    Pending,
    InProgress,
    Completed,
}

impl WeekStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStatus::Pending => "pending",
            WeekStatus::InProgress => "in_progress",
            WeekStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for WeekStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown week status '{0}'")]
pub struct UnknownWeekStatus(pub String);

impl FromStr for WeekStatus {
    type Err = UnknownWeekStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WeekStatus::Pending),
            "in_progress" => Ok(WeekStatus::InProgress),
            "completed" => Ok(WeekStatus::Completed),
            other => Err(UnknownWeekStatus(other.to_string())),
        }
    }
}

/// A week as submitted for persistence, before the store assigns status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWeek {
    pub week_number: u32,
    pub title: String,
    pub objectives: Vec<String>,
    pub concepts: Vec<String>,
    pub prerequisites: Vec<u32>,
    pub topic_for_learning: String,
}

/// A persisted week of a curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Week {
    pub curriculum_id: i64,
    pub week_number: u32,
    pub title: String,
    pub objectives: Vec<String>,
    pub concepts: Vec<String>,
    pub prerequisites: Vec<u32>,
    pub topic_for_learning: String,
    pub status: WeekStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Week {
    pub fn is_completed(&self) -> bool {
        self.status == WeekStatus::Completed
    }
}

/// Returns the prerequisite week numbers of `week` that are not completed,
/// in the order the week lists them.
///
/// A prerequisite that does not exist in `all_weeks` counts as not completed.
pub fn incomplete_prerequisites(week: &Week, all_weeks: &[Week]) -> Vec<u32> {
    week.prerequisites
        .iter()
        .copied()
        .filter(|number| {
            !all_weeks
                .iter()
                .any(|w| w.week_number == *number && w.is_completed())
        })
        .collect()
}

/// A week is locked iff it has at least one prerequisite that is not completed.
pub fn is_locked(week: &Week, all_weeks: &[Week]) -> bool {
    !incomplete_prerequisites(week, all_weeks).is_empty()
}

/// Checks the structural invariants of a full week set.
///
/// Week numbers must be exactly `1..=weeks.len()`, week 1 must have no
/// prerequisites, and every prerequisite must point to a strictly lower week
/// without repeats. Together these make the prerequisite relation acyclic.
pub fn validate_week_set(weeks: &[NewWeek]) -> Result<(), MalformedCurriculum> {
    if weeks.is_empty() {
        return Err(MalformedCurriculum::NoWeeks);
    }

    let mut seen = HashSet::with_capacity(weeks.len());
    for week in weeks {
        if week.week_number == 0 {
            return Err(MalformedCurriculum::InvalidWeekNumber(0));
        }
        if !seen.insert(week.week_number) {
            return Err(MalformedCurriculum::DuplicateWeek(week.week_number));
        }
    }

    let total = weeks.len() as u32;
    if let Some(missing) = (1..=total).find(|n| !seen.contains(n)) {
        return Err(MalformedCurriculum::MissingWeek {
            missing,
            total_weeks: total,
        });
    }

    for week in weeks {
        if week.week_number == 1 && !week.prerequisites.is_empty() {
            return Err(MalformedCurriculum::FirstWeekHasPrerequisites);
        }
        let mut listed = HashSet::with_capacity(week.prerequisites.len());
        for &prerequisite in &week.prerequisites {
            if prerequisite == 0 || prerequisite >= week.week_number {
                return Err(MalformedCurriculum::ForwardReference {
                    week: week.week_number,
                    prerequisite: i64::from(prerequisite),
                });
            }
            if !listed.insert(prerequisite) {
                return Err(MalformedCurriculum::DuplicatePrerequisite {
                    week: week.week_number,
                    prerequisite,
                });
            }
        }
    }

    Ok(())
}
