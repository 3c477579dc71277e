use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::envelope::{EnvelopeDetail, RequestEnvelope};

pub const SEVERE_EMERGENCY_KEYWORDS: &[&str] = &["medical", "fire", "police", "accident", "crime"];

pub const DOCUMENT_TYPE_TIERS: &[(&[&str], u32)] = &[
    (
        &["medical", "emergency", "death", "funeral", "hospital", "accident"],
        30,
    ),
    (&["employment", "business", "scholarship", "education"], 15),
    (&["indigency", "clearance", "certificate", "residency"], 5),
];

pub const PURPOSE_TIERS: &[(&[&str], u32)] = &[
    (
        &[
            "emergency",
            "urgent",
            "asap",
            "immediately",
            "hospital",
            "medical",
            "death",
            "funeral",
            "accident",
        ],
        40,
    ),
    (
        &[
            "employment",
            "job",
            "work",
            "business",
            "scholarship",
            "education",
            "deadline",
        ],
        25,
    ),
    (&["government", "official", "requirement", "application"], 10),
];

/// Priority bucket shown to admins, ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBucket {
    Urgent,
    High,
    Medium,
    Low,
}

impl PriorityBucket {
    pub const fn from_score(score: u32) -> Self {
        match score {
            80.. => PriorityBucket::Urgent,
            60..=79 => PriorityBucket::High,
            30..=59 => PriorityBucket::Medium,
            _ => PriorityBucket::Low,
        }
    }

    /// Sort rank; urgent sorts first.
    pub const fn rank(self) -> u8 {
        match self {
            PriorityBucket::Urgent => 0,
            PriorityBucket::High => 1,
            PriorityBucket::Medium => 2,
            PriorityBucket::Low => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PriorityBucket::Urgent => "urgent",
            PriorityBucket::High => "high",
            PriorityBucket::Medium => "medium",
            PriorityBucket::Low => "low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "urgent" => Some(Self::Urgent),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Heuristic priority score. Pure; never fails.
pub fn score(envelope: &RequestEnvelope, now: DateTime<Utc>) -> u32 {
    let base = match &envelope.detail {
        EnvelopeDetail::Sos { emergency_type } => {
            50 + if contains_any(emergency_type, SEVERE_EMERGENCY_KEYWORDS) {
                30
            } else {
                0
            }
        }
        EnvelopeDetail::Document {
            document_type_name,
            purpose,
            ..
        } => {
            20 + tier_bonus(document_type_name, DOCUMENT_TYPE_TIERS)
                + purpose
                    .as_deref()
                    .map_or(0, |purpose| tier_bonus(purpose, PURPOSE_TIERS))
        }
        EnvelopeDetail::Relocation { .. } => 15,
        EnvelopeDetail::Item { .. } => 10,
    };

    base + age_bonus(&envelope.created_at, now)
}

pub fn bucket(envelope: &RequestEnvelope, now: DateTime<Utc>) -> PriorityBucket {
    PriorityBucket::from_score(score(envelope, now))
}

/// Whole days between `created_at` and `now` mapped to the age bonus.
pub fn age_bonus(created_at: &str, now: DateTime<Utc>) -> u32 {
    let Some(created) = parse_timestamp(created_at) else {
        return 0;
    };
    match (now - created).num_days() {
        days if days >= 7 => 20,
        days if days >= 3 => 10,
        days if days >= 1 => 5,
        _ => 0,
    }
}

/// Accepts RFC 3339 and naive ISO-8601 timestamps; naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn tier_bonus(text: &str, tiers: &[(&[&str], u32)]) -> u32 {
    tiers
        .iter()
        .find(|(keywords, _)| contains_any(text, keywords))
        .map_or(0, |(_, bonus)| *bonus)
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::workflows::triage::envelope::{RequestKind, RequestRef};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn envelope(kind: RequestKind, detail: EnvelopeDetail, created_at: String) -> RequestEnvelope {
        RequestEnvelope {
            id: "1".to_string(),
            kind,
            requester_name: "Ana Reyes".to_string(),
            status: "pending".to_string(),
            created_at,
            processed_at: None,
            description: String::new(),
            raw_ref: RequestRef {
                kind,
                id: "1".to_string(),
            },
            detail,
        }
    }

    fn document(type_name: &str, purpose: Option<&str>, age: Duration) -> RequestEnvelope {
        envelope(
            RequestKind::Document,
            EnvelopeDetail::Document {
                document_type_name: type_name.to_string(),
                purpose: purpose.map(str::to_string),
                quantity: 1,
            },
            (now() - age).to_rfc3339(),
        )
    }

    fn sos(emergency_type: &str, age: Duration) -> RequestEnvelope {
        envelope(
            RequestKind::Sos,
            EnvelopeDetail::Sos {
                emergency_type: emergency_type.to_string(),
            },
            (now() - age).to_rfc3339(),
        )
    }

    #[test]
    fn fresh_fire_emergency_is_urgent() {
        let fire = sos("fire", Duration::zero());
        assert_eq!(score(&fire, now()), 80);
        assert_eq!(bucket(&fire, now()), PriorityBucket::Urgent);
    }

    #[test]
    fn plain_clearance_request_is_low() {
        let clearance = document("Barangay Clearance", Some("personal records"), Duration::zero());
        assert_eq!(score(&clearance, now()), 25);
        assert_eq!(bucket(&clearance, now()), PriorityBucket::Low);
    }

    #[test]
    fn type_and_purpose_tiers_add_independently() {
        let request = document(
            "Certificate of Employment",
            Some("Hospital admission"),
            Duration::zero(),
        );
        // base 20 + employment 15 + hospital 40
        assert_eq!(score(&request, now()), 75);
        assert_eq!(bucket(&request, now()), PriorityBucket::High);
    }

    #[test]
    fn first_matching_tier_wins_within_a_list() {
        // "medical certificate" hits the high tier before the low tier.
        let request = document("Medical Certificate", None, Duration::zero());
        assert_eq!(score(&request, now()), 50);
    }

    #[test]
    fn age_bonus_steps_at_one_three_and_seven_days() {
        let relocation = |age: Duration| {
            envelope(
                RequestKind::Relocation,
                EnvelopeDetail::Relocation {
                    from_barangay: "A".to_string(),
                    to_barangay: "B".to_string(),
                },
                (now() - age).to_rfc3339(),
            )
        };
        assert_eq!(score(&relocation(Duration::hours(23)), now()), 15);
        assert_eq!(score(&relocation(Duration::days(1)), now()), 20);
        assert_eq!(score(&relocation(Duration::days(3)), now()), 25);
        assert_eq!(score(&relocation(Duration::days(7)), now()), 35);
    }

    #[test]
    fn unparsable_timestamp_skips_age_bonus() {
        let item = envelope(
            RequestKind::Item,
            EnvelopeDetail::Item {
                item_title: "Folding tent".to_string(),
            },
            "last tuesday".to_string(),
        );
        assert_eq!(score(&item, now()), 10);
    }

    #[test]
    fn naive_iso_timestamps_are_read_as_utc() {
        let parsed = parse_timestamp("2025-03-01T08:00:00.123456").expect("parses");
        assert_eq!(parsed.timestamp(), 1_740_816_000);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(PriorityBucket::from_score(29), PriorityBucket::Low);
        assert_eq!(PriorityBucket::from_score(30), PriorityBucket::Medium);
        assert_eq!(PriorityBucket::from_score(59), PriorityBucket::Medium);
        assert_eq!(PriorityBucket::from_score(60), PriorityBucket::High);
        assert_eq!(PriorityBucket::from_score(80), PriorityBucket::Urgent);
    }
}
