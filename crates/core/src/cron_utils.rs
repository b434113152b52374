use chrono::{DateTime, Duration, TimeZone, Timelike};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

use crate::{SchedulerError, SchedulerResult};

/// 五段式CRON表达式（分 时 日 月 周）
///
/// 底层 `cron` crate 需要秒字段，解析时统一补 `0` 秒，
/// 因此所有匹配都以分钟为粒度。`@hourly` 这类宏原样交给 `cron` 解析。
///
/// 星期字段按标准CRON编号：0和7为周日，1为周一。`cron` crate 以1为周日，
/// 数字形式的星期在解析前会被换算。
#[derive(Debug, Clone)]
pub struct CronExpression {
    expr: String,
    schedule: Schedule,
}

impl CronExpression {
    /// 解析五段式表达式
    pub fn parse(expr: &str) -> SchedulerResult<Self> {
        let trimmed = expr.trim();
        let normalized = if trimmed.starts_with('@') {
            trimmed.to_string()
        } else {
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 5 {
                return Err(SchedulerError::InvalidCron {
                    expr: expr.to_string(),
                    message: format!("需要5个字段，实际为{}个", fields.len()),
                });
            }
            let day_of_week =
                normalize_day_of_week(fields[4]).map_err(|message| SchedulerError::InvalidCron {
                    expr: expr.to_string(),
                    message,
                })?;
            format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], day_of_week
            )
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            expr: trimmed.to_string(),
            schedule,
        })
    }

    /// 验证CRON表达式是否有效
    pub fn is_valid(expr: &str) -> bool {
        Self::parse(expr).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// 检查给定时间所在的分钟是否命中表达式
    pub fn matches<Z: TimeZone>(&self, at: &DateTime<Z>) -> bool {
        let Some(minute) = at
            .clone()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
        else {
            return false;
        };

        let check_from = minute.clone() - Duration::seconds(1);
        let hit = self
            .schedule
            .after(&check_from)
            .next()
            .is_some_and(|next| next == minute);

        if hit {
            debug!("CRON表达式 {} 命中当前分钟", self.expr);
        }
        hit
    }

    /// 获取下一次执行时间
    pub fn next_after<Z: TimeZone>(&self, from: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.schedule.after(from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming<Z: TimeZone>(&self, from: &DateTime<Z>, count: usize) -> Vec<DateTime<Z>> {
        self.schedule.after(from).take(count).collect()
    }
}

/// 把标准编号（0-7，0和7为周日）的星期字段换算成 `cron` crate 的编号（1-7，1为周日）
///
/// 范围和步长先按标准编号展开成具体的星期，再逐个换算。含星期名称的字段原样保留。
fn normalize_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" || field.chars().any(|c| c.is_ascii_alphabetic()) {
        return Ok(field.to_string());
    }

    let parse_day = |value: &str| -> Result<u32, String> {
        match value.parse::<u32>() {
            Ok(day) if day <= 7 => Ok(day),
            _ => Err(format!("星期取值必须在0-7之间: {value}")),
        }
    };

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => (base, Some(step)),
                _ => return Err(format!("无效的星期步长: {item}")),
            },
            None => (item, None),
        };

        let (start, end) = if base == "*" {
            (0, 6)
        } else if let Some((start, end)) = base.split_once('-') {
            (parse_day(start)?, parse_day(end)?)
        } else {
            let day = parse_day(base)?;
            // `5/2` 表示从5开始到周末
            (day, if step.is_some() { 7 } else { day })
        };
        if start > end {
            return Err(format!("无效的星期范围: {item}"));
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days.insert(day % 7 + 1);
        }
    }

    Ok(days
        .iter()
        .map(|day| day.to_string())
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use chrono_tz::Europe::Paris;

    #[test]
    fn test_parse_five_fields() {
        assert!(CronExpression::parse("* * * * *").is_ok());
        assert!(CronExpression::parse("*/5 * * * *").is_ok());
        assert!(CronExpression::parse("0 2 * * *").is_ok());
        assert!(CronExpression::parse("@hourly").is_ok());
        assert!(CronExpression::parse("0 0 0 * * *").is_err());
        assert!(CronExpression::parse("invalid").is_err());
        assert!(CronExpression::parse("").is_err());
        assert!(CronExpression::parse("61 * * * *").is_err());
    }

    #[test]
    fn test_matches_current_minute() {
        let every_minute = CronExpression::parse("* * * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 45).unwrap();
        assert!(every_minute.matches(&at));

        let half_past = CronExpression::parse("30 12 * * *").unwrap();
        assert!(half_past.matches(&at));

        let quarter = CronExpression::parse("15 12 * * *").unwrap();
        assert!(!quarter.matches(&at));
    }

    #[test]
    fn test_matches_in_timezone() {
        // 12:30 UTC 在巴黎冬令时为 13:30
        let expr = CronExpression::parse("30 13 * * *").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

        assert!(!expr.matches(&at));
        assert!(expr.matches(&at.with_timezone(&Paris)));
    }

    #[test]
    fn test_day_of_week_uses_standard_numbering() {
        // 2024-01-01 是周一，2024-01-05 是周五，2024-01-07 是周日
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let friday = Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap();
        let sunday = Utc.with_ymd_and_hms(2024, 1, 7, 9, 0, 0).unwrap();

        let on_monday = CronExpression::parse("0 9 * * 1").unwrap();
        assert!(on_monday.matches(&monday));
        assert!(!on_monday.matches(&sunday));

        for expr in ["0 9 * * 0", "0 9 * * 7"] {
            let on_sunday = CronExpression::parse(expr).unwrap();
            assert!(on_sunday.matches(&sunday), "{expr}");
            assert!(!on_sunday.matches(&monday), "{expr}");
        }

        let weekdays = CronExpression::parse("0 9 * * 1-5").unwrap();
        assert!(weekdays.matches(&monday));
        assert!(weekdays.matches(&friday));
        assert!(!weekdays.matches(&sunday));

        let weekend = CronExpression::parse("0 9 * * 5-7").unwrap();
        assert!(weekend.matches(&friday));
        assert!(weekend.matches(&sunday));
        assert!(!weekend.matches(&monday));

        let listed = CronExpression::parse("0 9 * * 0,1").unwrap();
        assert!(listed.matches(&sunday));
        assert!(listed.matches(&monday));
        assert!(!listed.matches(&friday));

        // 周日、周二、周四、周六
        let every_other = CronExpression::parse("0 9 * * */2").unwrap();
        assert!(every_other.matches(&sunday));
        assert!(!every_other.matches(&monday));

        let named = CronExpression::parse("0 9 * * MON").unwrap();
        assert!(named.matches(&monday));
        assert!(!named.matches(&sunday));
    }

    #[test]
    fn test_day_of_week_out_of_range() {
        assert!(CronExpression::parse("0 9 * * 8").is_err());
        assert!(CronExpression::parse("0 9 * * 5-1").is_err());
        assert!(CronExpression::parse("0 9 * * */0").is_err());
        assert!(CronExpression::parse("* * * * 0").is_ok());
    }

    #[test]
    fn test_next_and_upcoming() {
        let expr = CronExpression::parse("0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

        let next = expr.next_after(&now).unwrap();
        assert_eq!(next.hour(), 13);
        assert_eq!(next.minute(), 0);

        let upcoming = expr.upcoming(&now, 3);
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[2].hour(), 15);
    }
}
