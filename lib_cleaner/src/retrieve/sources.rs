use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Shanghai;

use crate::configs::SourceSettings;

/// Splits a comma separated URL list, dropping blanks.
pub fn split_source_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Mirror URLs for "today" and "yesterday" on the UTC+8 calendar, newest first.
///
/// The mirrors publish one file per day, and today's file may not exist
/// yet early in the day.
pub fn dated_mirror_urls(prefix: &str, suffix: &str, now: DateTime<Utc>) -> Vec<String> {
    let today: NaiveDate = now.with_timezone(&Shanghai).date_naive();
    let mut days = vec![today];
    if let Some(yesterday) = today.pred_opt() {
        days.push(yesterday);
    }
    days.into_iter()
        .map(|d| format!("{}{}{}", prefix, d.format("%Y%m%d"), suffix))
        .collect()
}

/// Configured URLs, or the dated mirrors when none are configured.
pub fn resolve_source_urls(settings: &SourceSettings, now: DateTime<Utc>) -> Vec<String> {
    if settings.urls.is_empty() {
        dated_mirror_urls(&settings.mirror_prefix, &settings.mirror_suffix, now)
    } else {
        settings.urls.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mirrors_follow_the_utc8_calendar() {
        // 2024-03-01 17:30 UTC is already 2024-03-02 in UTC+8.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 17, 30, 0).unwrap();
        let urls = dated_mirror_urls("https://m/clash", ".yml", now);
        assert_eq!(
            urls,
            vec![
                "https://m/clash20240302.yml".to_string(),
                "https://m/clash20240301.yml".to_string(),
            ]
        );
    }

    #[test]
    fn explicit_urls_win_over_mirrors() {
        let settings = SourceSettings {
            urls: split_source_list(" https://a/sub , ,https://b/sub"),
            ..SourceSettings::default()
        };
        let urls = resolve_source_urls(&settings, Utc::now());
        assert_eq!(urls, vec!["https://a/sub", "https://b/sub"]);
    }
}
