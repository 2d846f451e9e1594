use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiativeStatus {
    Ongoing,
    Completed,
}

impl InitiativeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitiativeStatus::Ongoing => "Ongoing",
            InitiativeStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for InitiativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InitiativeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ongoing" => Ok(InitiativeStatus::Ongoing),
            "Completed" => Ok(InitiativeStatus::Completed),
            other => Err(format!("unknown status '{}', expected 'Ongoing' or 'Completed'", other)),
        }
    }
}

/// A community environmental initiative as stored and returned by the API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Initiative {
    pub id: Uuid,
    pub title: String,
    /// Lower-cased title, the lookup key for delete and like/unlike.
    #[serde(skip)]
    pub title_key: String,
    pub initiative_type: String,
    pub description: String,
    /// Inline `data:` URL, or empty.
    pub image: String,
    pub tags: Vec<String>,
    pub location: String,
    pub organization: String,
    pub contact_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InitiativeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /posts`, as produced by the submission form.
///
/// Server-controlled fields (`id`, `likes`, `createdAt`) are not part of
/// the payload and are ignored if a client sends them.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewInitiative {
    pub title: String,
    pub initiative_type: String,
    pub description: String,
    pub image: String,
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    pub location: String,
    pub organization: String,
    pub contact_email: String,
    #[serde(deserialize_with = "deserialize_status")]
    pub status: Option<InitiativeStatus>,
    pub donation_link: Option<String>,
    pub username: Option<String>,
}

impl NewInitiative {
    /// Builds the record to persist. The donation link only survives for
    /// ongoing initiatives; blank optionals collapse to `None`. `created_at`
    /// is kept at millisecond precision, the resolution stores persist.
    pub fn into_initiative(self, id: Uuid, created_at: DateTime<Utc>) -> Initiative {
        let donation_link = match self.status {
            Some(InitiativeStatus::Ongoing) => non_blank(self.donation_link),
            _ => None,
        };

        Initiative {
            id,
            title_key: title_key(&self.title),
            title: self.title,
            initiative_type: self.initiative_type,
            description: self.description,
            image: self.image,
            tags: normalize_tags(self.tags),
            location: self.location,
            organization: self.organization,
            contact_email: self.contact_email,
            status: self.status,
            donation_link,
            username: non_blank(self.username),
            likes: 0,
            created_at: created_at.trunc_subsecs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeDirection {
    Like,
    Unlike,
}

impl LikeDirection {
    pub fn delta(&self) -> i64 {
        match self {
            LikeDirection::Like => 1,
            LikeDirection::Unlike => -1,
        }
    }
}

/// Case-insensitive addressing key for a title.
pub fn title_key(title: &str) -> String {
    title.to_lowercase()
}

/// Splits user-entered comma-separated tags, trimming each and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Accepts either a JSON array or the raw comma-separated form input.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsInput {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<TagsInput>::deserialize(deserializer)? {
        Some(TagsInput::List(tags)) => normalize_tags(tags),
        Some(TagsInput::Csv(raw)) => parse_tags(&raw),
        None => Vec::new(),
    })
}

// The form's "Select Status" option submits an empty string.
fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<InitiativeStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_separated_tags_are_trimmed_and_filtered() {
        assert_eq!(parse_tags("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn payload_accepts_tags_as_string_or_array() {
        let from_csv: NewInitiative =
            serde_json::from_value(serde_json::json!({ "title": "x", "tags": "a, b ,,c" })).unwrap();
        let from_list: NewInitiative =
            serde_json::from_value(serde_json::json!({ "title": "x", "tags": [" a", "", "b ", "c"] })).unwrap();
        assert_eq!(from_csv.tags, vec!["a", "b", "c"]);
        assert_eq!(from_list.tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_status_means_unset() {
        let payload: NewInitiative =
            serde_json::from_value(serde_json::json!({ "title": "x", "status": "" })).unwrap();
        assert_eq!(payload.status, None);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_value::<NewInitiative>(serde_json::json!({ "title": "x", "status": "Paused" }));
        assert!(result.is_err());
    }

    #[test]
    fn donation_link_dropped_unless_ongoing() {
        let payload = NewInitiative {
            title: "River Cleanup".into(),
            status: Some(InitiativeStatus::Completed),
            donation_link: Some("http://x".into()),
            ..Default::default()
        };
        let initiative = payload.into_initiative(Uuid::new_v4(), Utc::now());
        assert_eq!(initiative.donation_link, None);
        assert_eq!(initiative.title_key, "river cleanup");
        assert_eq!(initiative.likes, 0);
    }

    #[test]
    fn serialized_record_uses_camel_case_and_hides_title_key() {
        let payload = NewInitiative {
            title: "Tree Planting".into(),
            initiative_type: "Reforestation".into(),
            contact_email: "bob@example.org".into(),
            status: Some(InitiativeStatus::Ongoing),
            donation_link: Some("http://x".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(payload.into_initiative(Uuid::new_v4(), Utc::now())).unwrap();
        assert_eq!(value["initiativeType"], "Reforestation");
        assert_eq!(value["contactEmail"], "bob@example.org");
        assert_eq!(value["donationLink"], "http://x");
        assert_eq!(value["status"], "Ongoing");
        assert!(value.get("titleKey").is_none());
        assert!(value.get("username").is_none());
    }
}
