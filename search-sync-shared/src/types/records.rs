//! Concrete record kinds stored locally and projected into the search index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::attributes::{AttributeValue, SearchAttributes};
use crate::types::searchable::SearchableRecord;

/// Base URL for public record pages.
const WEB_BASE_URL: &str = "https://www.thebluealliance.com";

/// An FRC team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    /// Store key, e.g. `frc254`.
    pub key: String,
    pub team_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Full sponsor name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_prov: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rookie_year: Option<u32>,
}

impl Team {
    /// Create a team with only a number and nickname set.
    pub fn new(team_number: u32, nickname: impl Into<String>) -> Self {
        Self {
            key: format!("frc{}", team_number),
            team_number,
            nickname: Some(nickname.into()),
            name: None,
            city: None,
            state_prov: None,
            country: None,
            rookie_year: None,
        }
    }

    /// "City, State, Country" with missing parts skipped.
    pub fn location(&self) -> Option<String> {
        join_location(&[&self.city, &self.state_prov, &self.country])
    }
}

impl SearchableRecord for Team {
    fn search_key(&self) -> &str {
        &self.key
    }

    fn search_attributes(&self) -> SearchAttributes {
        let mut attributes = SearchAttributes::new();
        let title = match &self.nickname {
            Some(nickname) => format!("{} - {}", self.team_number, nickname),
            None => format!("Team {}", self.team_number),
        };
        attributes.insert("title".to_string(), AttributeValue::Text(title));
        attributes.insert("team_number".to_string(), self.team_number.into());
        attributes.insert(
            "keywords".to_string(),
            AttributeValue::List(
                [
                    Some(self.team_number.to_string()),
                    self.nickname.clone(),
                    self.city.clone(),
                ]
                .into_iter()
                .flatten()
                .collect(),
            ),
        );
        if let Some(name) = &self.name {
            attributes.insert("description".to_string(), name.as_str().into());
        }
        if let Some(location) = self.location() {
            attributes.insert("location".to_string(), location.into());
        }
        if let Some(rookie_year) = self.rookie_year {
            attributes.insert("rookie_year".to_string(), rookie_year.into());
        }
        attributes
    }

    fn canonical_url(&self) -> String {
        format!("{}/team/{}", WEB_BASE_URL, self.team_number)
    }
}

/// An FRC event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Store key, e.g. `2020casj`.
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub event_code: String,
    pub year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_prov: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Event {
    /// Create an event from its year, code and display name.
    pub fn new(year: u32, event_code: impl Into<String>, name: impl Into<String>) -> Self {
        let event_code = event_code.into();
        Self {
            key: format!("{}{}", year, event_code),
            name: name.into(),
            short_name: None,
            event_code,
            year,
            city: None,
            state_prov: None,
            country: None,
            start_date: None,
            end_date: None,
        }
    }

    /// Short name when present, otherwise the full name.
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }
}

impl SearchableRecord for Event {
    fn search_key(&self) -> &str {
        &self.key
    }

    fn search_attributes(&self) -> SearchAttributes {
        let mut attributes = SearchAttributes::new();
        attributes.insert(
            "title".to_string(),
            format!("{} {}", self.year, self.display_name()).into(),
        );
        attributes.insert("description".to_string(), self.name.as_str().into());
        attributes.insert("year".to_string(), self.year.into());
        attributes.insert(
            "keywords".to_string(),
            AttributeValue::List(vec![
                self.key.clone(),
                self.event_code.clone(),
                self.year.to_string(),
            ]),
        );
        if let Some(location) = join_location(&[&self.city, &self.state_prov, &self.country]) {
            attributes.insert("location".to_string(), location.into());
        }
        if let Some(start_date) = self.start_date {
            attributes.insert("start_date".to_string(), start_date.into());
        }
        if let Some(end_date) = self.end_date {
            attributes.insert("end_date".to_string(), end_date.into());
        }
        attributes
    }

    fn canonical_url(&self) -> String {
        format!("{}/event/{}", WEB_BASE_URL, self.key)
    }
}

/// Any record kind held by the local store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Team(Team),
    Event(Event),
}

impl SearchableRecord for Record {
    fn search_key(&self) -> &str {
        match self {
            Self::Team(team) => team.search_key(),
            Self::Event(event) => event.search_key(),
        }
    }

    fn search_attributes(&self) -> SearchAttributes {
        match self {
            Self::Team(team) => team.search_attributes(),
            Self::Event(event) => event.search_attributes(),
        }
    }

    fn canonical_url(&self) -> String {
        match self {
            Self::Team(team) => team.canonical_url(),
            Self::Event(event) => event.canonical_url(),
        }
    }
}

impl From<Team> for Record {
    fn from(team: Team) -> Self {
        Self::Team(team)
    }
}

impl From<Event> for Record {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

fn join_location(parts: &[&Option<String>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.as_deref())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
