//! Site-wide metadata records: `[meta]` and `[profile]` in `folio.toml`.
//!
//! [`SiteMeta`] feeds the page head (title, description, theme colors);
//! [`SiteProfile`] describes the author and how dates are shown on posts.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Head metadata for every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteMeta {
    pub title: String,
    pub description: String,
    pub lang: String,
    pub og_locale: String,
    pub github_url: String,
    pub theme_color_light: String,
    pub theme_color_dark: String,
}

impl Default for SiteMeta {
    fn default() -> Self {
        Self {
            title: "Damo's Blog".into(),
            description: "A software developer blog".into(),
            lang: "en-US".into(),
            og_locale: "en_US".into(),
            github_url: "https://github.com/Lautarodamore/blog".into(),
            theme_color_light: "#fafafa".into(),
            theme_color_dark: "#1d1f21".into(),
        }
    }
}

/// Author profile and date display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteProfile {
    pub author: String,
    pub title: String,
    pub description: String,
    pub lang: String,
    pub og_locale: String,
    pub date: DateFormat,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            author: "ldamore".into(),
            title: "Damo Blog".into(),
            description: "A software developer blog".into(),
            lang: "en-US".into(),
            og_locale: "en-US".into(),
            date: DateFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateFormat {
    /// One locale or a preference list; the first entry is used. Unset means `en-US`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
    pub options: DateOptions,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            locale: Some(Locale::One("en-US".into())),
            options: DateOptions {
                day: Some(NumericStyle::Numeric),
                month: Some(MonthStyle::Short),
                year: Some(NumericStyle::Numeric),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locale {
    One(String),
    Many(Vec<String>),
}

impl Locale {
    pub fn primary(&self) -> Option<&str> {
        match self {
            Locale::One(tag) => Some(tag),
            Locale::Many(tags) => tags.first().map(String::as_str),
        }
    }
}

/// Which date parts to show and how. An empty set means numeric day, month and year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<NumericStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<MonthStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<NumericStyle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericStyle {
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "2-digit")]
    TwoDigit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthStyle {
    #[serde(rename = "numeric")]
    Numeric,
    #[serde(rename = "2-digit")]
    TwoDigit,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "narrow")]
    Narrow,
}

impl SiteProfile {
    /// Format a post date the way the blog shows it.
    ///
    /// Month names are English. `en-US` (and bare `en`) put the month first:
    /// `Apr 1, 2023`, `4/1/2023`. Other locales put the day first:
    /// `1 Apr 2023`, `1/4/2023`.
    pub fn format_date(&self, date: NaiveDate) -> String {
        let locale = self
            .date
            .locale
            .as_ref()
            .and_then(Locale::primary)
            .unwrap_or("en-US");
        let month_first = is_month_first(locale);

        let mut options = self.date.options.clone();
        if options == DateOptions::default() {
            options = DateOptions {
                day: Some(NumericStyle::Numeric),
                month: Some(MonthStyle::Numeric),
                year: Some(NumericStyle::Numeric),
            };
        }

        let day = options.day.map(|style| numeric(date.day(), style));
        let year = options.year.map(|style| match style {
            NumericStyle::Numeric => date.year().to_string(),
            NumericStyle::TwoDigit => format!("{:02}", date.year().rem_euclid(100)),
        });

        match options.month {
            Some(style @ (MonthStyle::Short | MonthStyle::Long | MonthStyle::Narrow)) => {
                let month = month_name(date, style);
                if month_first {
                    let head = match day {
                        Some(day) => format!("{month} {day}"),
                        None => month,
                    };
                    match year {
                        Some(year) if options.day.is_some() => format!("{head}, {year}"),
                        Some(year) => format!("{head} {year}"),
                        None => head,
                    }
                } else {
                    [day, Some(month), year]
                        .into_iter()
                        .flatten()
                        .collect::<Vec<_>>()
                        .join(" ")
                }
            }
            numeric_month => {
                let month = numeric_month.map(|style| match style {
                    MonthStyle::TwoDigit => numeric(date.month(), NumericStyle::TwoDigit),
                    _ => numeric(date.month(), NumericStyle::Numeric),
                });
                let parts = if month_first {
                    [month, day, year]
                } else {
                    [day, month, year]
                };
                parts.into_iter().flatten().collect::<Vec<_>>().join("/")
            }
        }
    }

    /// Format an ISO date or datetime string; `None` if it does not parse.
    pub fn format_date_str(&self, raw: &str) -> Option<String> {
        let date = crate::schema::coerce_date(&serde_json::Value::String(raw.to_string()))?;
        Some(self.format_date(date.date_naive()))
    }
}

fn is_month_first(locale: &str) -> bool {
    let normalized = locale.replace('_', "-").to_ascii_lowercase();
    normalized == "en" || normalized == "en-us" || normalized.starts_with("en-us-")
}

fn numeric(value: u32, style: NumericStyle) -> String {
    match style {
        NumericStyle::Numeric => value.to_string(),
        NumericStyle::TwoDigit => format!("{value:02}"),
    }
}

fn month_name(date: NaiveDate, style: MonthStyle) -> String {
    let long = date.format("%B").to_string();
    match style {
        MonthStyle::Long => long,
        MonthStyle::Narrow => long.chars().take(1).collect(),
        _ => date.format("%b").to_string(),
    }
}

/// `#rgb` or `#rrggbb`.
pub(crate) fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn april_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 4, 1).unwrap()
    }

    fn profile(locale: Option<Locale>, options: DateOptions) -> SiteProfile {
        SiteProfile {
            date: DateFormat { locale, options },
            ..SiteProfile::default()
        }
    }

    #[test]
    fn default_profile_formats_us_short() {
        assert_eq!(SiteProfile::default().format_date(april_first()), "Apr 1, 2023");
    }

    #[test]
    fn non_us_locale_puts_day_first() {
        let p = profile(
            Some(Locale::One("en-GB".into())),
            DateFormat::default().options,
        );
        assert_eq!(p.format_date(april_first()), "1 Apr 2023");
    }

    #[test]
    fn locale_list_uses_first_entry() {
        let p = profile(
            Some(Locale::Many(vec!["de-DE".into(), "en-US".into()])),
            DateFormat::default().options,
        );
        assert_eq!(p.format_date(april_first()), "1 Apr 2023");
    }

    #[test]
    fn unset_locale_defaults_to_us() {
        let p = profile(None, DateFormat::default().options);
        assert_eq!(p.format_date(april_first()), "Apr 1, 2023");
    }

    #[test]
    fn long_month_and_two_digit_day() {
        let p = profile(
            None,
            DateOptions {
                day: Some(NumericStyle::TwoDigit),
                month: Some(MonthStyle::Long),
                year: Some(NumericStyle::Numeric),
            },
        );
        assert_eq!(p.format_date(april_first()), "April 01, 2023");
    }

    #[test]
    fn month_and_year_only() {
        let p = profile(
            None,
            DateOptions {
                day: None,
                month: Some(MonthStyle::Short),
                year: Some(NumericStyle::Numeric),
            },
        );
        assert_eq!(p.format_date(april_first()), "Apr 2023");
    }

    #[test]
    fn empty_options_are_numeric() {
        let p = profile(None, DateOptions::default());
        assert_eq!(p.format_date(april_first()), "4/1/2023");
        let p = profile(Some(Locale::One("fr-FR".into())), DateOptions::default());
        assert_eq!(p.format_date(april_first()), "1/4/2023");
    }

    #[test]
    fn two_digit_numeric_parts() {
        let p = profile(
            None,
            DateOptions {
                day: Some(NumericStyle::TwoDigit),
                month: Some(MonthStyle::TwoDigit),
                year: Some(NumericStyle::TwoDigit),
            },
        );
        assert_eq!(p.format_date(april_first()), "04/01/23");
    }

    #[test]
    fn format_date_str_accepts_iso_strings() {
        let p = SiteProfile::default();
        assert_eq!(p.format_date_str("2023-04-01").as_deref(), Some("Apr 1, 2023"));
        assert_eq!(
            p.format_date_str("2023-04-01T10:00:00.000Z").as_deref(),
            Some("Apr 1, 2023")
        );
        assert_eq!(p.format_date_str("yesterday"), None);
    }

    #[test]
    fn date_format_deserializes_from_toml() {
        let format: DateFormat = toml::from_str(
            r#"
            locale = ["en-GB", "en-US"]
            [options]
            day = "2-digit"
            month = "long"
            "#,
        )
        .unwrap();
        assert_eq!(
            format.locale.as_ref().and_then(Locale::primary),
            Some("en-GB")
        );
        assert_eq!(format.options.day, Some(NumericStyle::TwoDigit));
        assert_eq!(format.options.year, None);
    }

    #[test]
    fn hex_colors() {
        assert!(is_hex_color("#fafafa"));
        assert!(is_hex_color("#FFF"));
        assert!(!is_hex_color("fafafa"));
        assert!(!is_hex_color("#ggg"));
        assert!(!is_hex_color("#abcd"));
    }
}
