use chrono::{DateTime, Utc};

use crate::actors::ActorError;

/// Tracks the next firing time of a cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    next: DateTime<Utc>,
}

impl CronSchedule {
    pub fn new(expression: &str, now: DateTime<Utc>) -> Result<Self, ActorError> {
        Ok(Self {
            expression: expression.to_string(),
            next: next_after(expression, now)?,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next(&self) -> DateTime<Utc> {
        self.next
    }

    /// Returns true once per firing time reached by `now` and moves to the following one.
    /// Firings missed while nobody polled collapse into a single one.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<bool, ActorError> {
        if now < self.next {
            return Ok(false);
        }

        self.next = next_after(&self.expression, now.max(self.next))?;
        Ok(true)
    }
}

fn next_after(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ActorError> {
    cron_parser::parse(expression, &now).map_err(|error| ActorError {
        message: format!("Invalid cron `{}`: {:?}", expression, error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hourly_schedule() {
        let start = Utc.with_ymd_and_hms(2020, 4, 7, 10, 15, 0).unwrap();
        let mut schedule = CronSchedule::new("0 * * * *", start).unwrap();

        assert_eq!(schedule.next(), Utc.with_ymd_and_hms(2020, 4, 7, 11, 0, 0).unwrap());
        assert!(!schedule
            .tick(Utc.with_ymd_and_hms(2020, 4, 7, 10, 59, 59).unwrap())
            .unwrap());
        assert!(schedule
            .tick(Utc.with_ymd_and_hms(2020, 4, 7, 11, 0, 0).unwrap())
            .unwrap());
        assert_eq!(schedule.next(), Utc.with_ymd_and_hms(2020, 4, 7, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_missed_firings_collapse() {
        let start = Utc.with_ymd_and_hms(2020, 4, 7, 10, 15, 0).unwrap();
        let mut schedule = CronSchedule::new("0 * * * *", start).unwrap();

        assert!(schedule
            .tick(Utc.with_ymd_and_hms(2020, 4, 7, 14, 30, 0).unwrap())
            .unwrap());
        assert_eq!(schedule.next(), Utc.with_ymd_and_hms(2020, 4, 7, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid_expression() {
        assert!(CronSchedule::new("every hour", Utc::now()).is_err());
    }
}
