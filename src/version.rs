//! Filename-encoded versions of call exports.
//!
//! Exports are named `<callNumber>_<YYYYMMDDHHMMSS><suffix>.<ext>`, where the
//! suffix is a sub-second sequence written by the CAD system. Several exports
//! of the same call can arrive; the newest one carries the largest
//! `timestamp_ordinal`.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedFilename {
    pub filename: String,
    pub call_number: String,
    pub year: String,
    pub month: String,
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
    pub suffix: String,
    pub timestamp: String,
    pub timestamp_ordinal: u64,
}

pub struct VersionResolver {
    pattern: Regex,
}

impl VersionResolver {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"^([0-9]+)_([0-9]{14})([0-9]+)$")
            .context("failed to compile export filename regex")?;
        Ok(Self { pattern })
    }

    /// Returns `None` for any name that is not exactly a versioned export.
    pub fn parse(&self, filename: &str) -> Option<VersionedFilename> {
        let stem = Path::new(filename).file_stem()?.to_str()?;
        let captures = self.pattern.captures(stem)?;

        let call_number = captures.get(1)?.as_str();
        let stamp = captures.get(2)?.as_str();
        let suffix = captures.get(3)?.as_str();

        let year = &stamp[0..4];
        let month = &stamp[4..6];
        let day = &stamp[6..8];
        let hour = &stamp[8..10];
        let minute = &stamp[10..12];
        let second = &stamp[12..14];

        // Range checks only; 2026-02-31 passes.
        let in_range = |value: &str, low: u32, high: u32| {
            value
                .parse::<u32>()
                .map(|number| (low..=high).contains(&number))
                .unwrap_or(false)
        };
        if !(in_range(month, 1, 12)
            && in_range(day, 1, 31)
            && in_range(hour, 0, 23)
            && in_range(minute, 0, 59)
            && in_range(second, 0, 59))
        {
            return None;
        }

        let timestamp_ordinal = timestamp_ordinal(stamp, suffix)?;

        Some(VersionedFilename {
            filename: filename.to_string(),
            call_number: call_number.to_string(),
            year: year.to_string(),
            month: month.to_string(),
            day: day.to_string(),
            hour: hour.to_string(),
            minute: minute.to_string(),
            second: second.to_string(),
            suffix: suffix.to_string(),
            timestamp: format!("{year}-{month}-{day}T{hour}:{minute}:{second}"),
            timestamp_ordinal,
        })
    }

    /// Groups parseable names by call number, newest first within each group.
    pub fn group_by_call_number<S: AsRef<str>>(
        &self,
        filenames: &[S],
    ) -> BTreeMap<String, Vec<VersionedFilename>> {
        let mut groups: BTreeMap<String, Vec<VersionedFilename>> = BTreeMap::new();

        for filename in filenames {
            if let Some(parsed) = self.parse(filename.as_ref()) {
                groups
                    .entry(parsed.call_number.clone())
                    .or_default()
                    .push(parsed);
            }
        }

        for versions in groups.values_mut() {
            versions.sort_by(|a, b| {
                b.timestamp_ordinal
                    .cmp(&a.timestamp_ordinal)
                    .then_with(|| b.filename.cmp(&a.filename))
            });
        }

        groups
    }

    pub fn latest_files<S: AsRef<str>>(&self, filenames: &[S]) -> Vec<String> {
        let mut latest = self
            .group_by_call_number(filenames)
            .into_values()
            .filter_map(|versions| versions.into_iter().next())
            .map(|version| version.filename)
            .collect::<Vec<_>>();
        latest.sort();
        latest
    }

    /// Older versions of each call, i.e. everything but the newest file.
    pub fn files_to_skip<S: AsRef<str>>(&self, filenames: &[S]) -> Vec<String> {
        let mut skip = self
            .group_by_call_number(filenames)
            .into_values()
            .flat_map(|versions| versions.into_iter().skip(1))
            .map(|version| version.filename)
            .collect::<Vec<_>>();
        skip.sort();
        skip
    }
}

fn timestamp_ordinal(stamp: &str, suffix: &str) -> Option<u64> {
    stamp
        .bytes()
        .chain(suffix.bytes())
        .try_fold(0_u64, |acc, digit| {
            acc.checked_mul(10)?
                .checked_add(u64::from(digit - b'0'))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> VersionResolver {
        VersionResolver::new().expect("export filename regex should compile")
    }

    #[test]
    fn parse_extracts_every_component() {
        let parsed = resolver()
            .parse("591_2026012705492672.xml")
            .expect("well-formed export name should parse");

        assert_eq!(parsed.call_number, "591");
        assert_eq!(parsed.year, "2026");
        assert_eq!(parsed.month, "01");
        assert_eq!(parsed.day, "27");
        assert_eq!(parsed.hour, "05");
        assert_eq!(parsed.minute, "49");
        assert_eq!(parsed.second, "26");
        assert_eq!(parsed.suffix, "72");
        assert_eq!(parsed.timestamp, "2026-01-27T05:49:26");
        assert_eq!(parsed.timestamp_ordinal, 2026012705492672);
    }

    #[test]
    fn parse_rejects_names_with_stray_punctuation() {
        let resolver = resolver();
        assert!(resolver.parse("591~broken.xml").is_none());
        assert!(resolver.parse("591-2026012705492672.xml").is_none());
        assert!(resolver.parse("591_2026012705492672x.xml").is_none());
        assert!(resolver.parse("591_20260127054926.xml").is_none());
        assert!(resolver.parse("_2026012705492672.xml").is_none());
    }

    #[test]
    fn parse_rejects_non_ascii_digits() {
        let resolver = resolver();
        assert!(resolver.parse("1_२०२६०१२७०५४९२६७२.xml").is_none());
        assert!(resolver.parse("१_2026012705492672.xml").is_none());
        assert!(resolver.parse("1_2026012705492672٣.xml").is_none());
    }

    #[test]
    fn parse_applies_range_checks_without_calendar_rules() {
        let resolver = resolver();
        assert!(resolver.parse("1_2026133105492601.xml").is_none());
        assert!(resolver.parse("1_2026010005492601.xml").is_none());
        assert!(resolver.parse("1_2026013205492601.xml").is_none());
        assert!(resolver.parse("1_2026013124000001.xml").is_none());
        assert!(resolver.parse("1_2026013123600001.xml").is_none());
        assert!(resolver.parse("1_2026013123596001.xml").is_none());

        // April has 30 days, but only the 1..=31 range is enforced.
        assert!(resolver.parse("1_2026043123595901.xml").is_some());
    }

    #[test]
    fn parse_rejects_ordinals_that_overflow() {
        let resolver = resolver();
        assert!(resolver.parse("1_2026012705492699999.xml").is_some());
        assert!(resolver.parse("1_20260127054926999999.xml").is_none());
    }

    #[test]
    fn latest_and_skip_partition_each_call_group() {
        let files = vec![
            "591_2026012705492672.xml",
            "591_2026012705500110.xml",
            "591_2026012705492671.xml",
            "600_2026012706000001.xml",
            "591~broken.xml",
        ];
        let resolver = resolver();

        let groups = resolver.group_by_call_number(&files);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["591"].len(), 3);
        assert_eq!(groups["591"][0].filename, "591_2026012705500110.xml");

        assert_eq!(
            resolver.latest_files(&files),
            vec!["591_2026012705500110.xml", "600_2026012706000001.xml"]
        );
        assert_eq!(
            resolver.files_to_skip(&files),
            vec!["591_2026012705492671.xml", "591_2026012705492672.xml"]
        );
    }
}
