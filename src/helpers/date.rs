//! Date helper functions

use chrono::{DateTime, FixedOffset, Locale, TimeZone};
use chrono_tz::Tz;

use crate::config::SiteConfig;

/// Locale- and timezone-aware formatter for publication dates
#[derive(Debug, Clone)]
pub struct DateFormatter {
    format: String,
    locale: Locale,
    timezone: Tz,
}

impl DateFormatter {
    /// Create a formatter from a Moment.js format, a BCP 47 language tag
    /// (`pt-BR`) and an IANA timezone name (empty means UTC)
    pub fn new(format: &str, language: &str, timezone: &str) -> Self {
        Self {
            format: moment_to_chrono_format(format),
            locale: parse_locale(language),
            timezone: parse_timezone(timezone),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(&config.date_format, &config.language, &config.timezone)
    }

    /// Format a publication date; a missing date renders as an empty string
    pub fn format(&self, date: Option<&DateTime<FixedOffset>>) -> String {
        match date {
            Some(date) => date
                .with_timezone(&self.timezone)
                .format_localized(&self.format, self.locale)
                .to_string(),
            None => String::new(),
        }
    }

    /// Machine-readable value for a `<time datetime>` attribute
    pub fn datetime_attr(&self, date: Option<&DateTime<FixedOffset>>) -> String {
        date.map(|d| date_xml(&d.with_timezone(&self.timezone)))
            .unwrap_or_default()
    }
}

impl Default for DateFormatter {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}

/// Map a language tag like `pt-BR` or `en` to a chrono locale
fn parse_locale(language: &str) -> Locale {
    let normalized = language.trim().replace('-', "_");
    if let Ok(locale) = Locale::try_from(normalized.as_str()) {
        return locale;
    }
    let fallback = match normalized.split('_').next().unwrap_or("") {
        "pt" => Locale::pt_BR,
        "es" => Locale::es_ES,
        "fr" => Locale::fr_FR,
        "de" => Locale::de_DE,
        "it" => Locale::it_IT,
        _ => Locale::en_US,
    };
    tracing::debug!("Unknown locale {:?}, using {:?}", language, fallback);
    fallback
}

fn parse_timezone(timezone: &str) -> Tz {
    if timezone.trim().is_empty() {
        return Tz::UTC;
    }
    match timezone.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("Unknown timezone {:?}, using UTC", timezone);
            Tz::UTC
        }
    }
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Z: TimeZone>(date: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Convert Moment.js format to chrono format
fn moment_to_chrono_format(format: &str) -> String {
    // Longest tokens first within each family
    let replacements = [
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DDDD", "%j"),
        ("DD", "%d"),
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("dddd", "%A"),
        ("ddd", "%a"),
        ("ZZ", "%z"),
        ("SSS", "%3f"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}
