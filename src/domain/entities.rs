//! Domain entities held by the repositories.

use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

const MAX_TITLE_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub city: String,
    pub organizer_id: Uuid,
    pub starts_at: OffsetDateTime,
    pub venue_id: Option<Uuid>,
    pub featured: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated input for creating or replacing an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub category: String,
    pub city: String,
    pub organizer_id: Uuid,
    pub starts_at: OffsetDateTime,
    pub venue_id: Option<Uuid>,
    pub featured: bool,
}

impl EventDraft {
    /// Trim text fields and check required ones.
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        self.title = required("title", &self.title)?;
        self.category = required("category", &self.category)?;
        self.city = required("city", &self.city)?;
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::validation(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueRecord {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub sports: Vec<String>,
    pub owner_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VenueDraft {
    pub name: String,
    pub city: String,
    pub sports: Vec<String>,
    pub owner_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

impl VenueDraft {
    pub fn normalized(mut self) -> Result<Self, DomainError> {
        self.name = required("name", &self.name)?;
        self.city = required("city", &self.city)?;
        self.sports = self
            .sports
            .iter()
            .map(|sport| sport.trim().to_string())
            .filter(|sport| !sport.is_empty())
            .collect();
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(DomainError::validation("latitude", "must be within [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(DomainError::validation(
                "longitude",
                "must be within [-180, 180]",
            ));
        }
        Ok(self)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn event_draft() -> EventDraft {
        EventDraft {
            title: "  Sunday league ".to_string(),
            category: "Football".to_string(),
            city: "Lisbon".to_string(),
            organizer_id: Uuid::nil(),
            starts_at: datetime!(2026-05-01 10:00 UTC),
            venue_id: None,
            featured: false,
        }
    }

    #[test]
    fn event_draft_trims_fields() {
        let draft = event_draft().normalized().expect("valid draft");
        assert_eq!(draft.title, "Sunday league");
    }

    #[test]
    fn event_draft_rejects_blank_category() {
        let draft = EventDraft {
            category: "   ".to_string(),
            ..event_draft()
        };
        let err = draft.normalized().expect_err("blank category");
        assert!(matches!(err, DomainError::Validation { field: "category", .. }));
    }

    #[test]
    fn venue_draft_checks_coordinates() {
        let draft = VenueDraft {
            name: "Arena".to_string(),
            city: "Porto".to_string(),
            sports: vec![" padel ".to_string(), "".to_string()],
            owner_id: Uuid::nil(),
            latitude: 41.15,
            longitude: -8.61,
        };
        let normalized = draft.clone().normalized().expect("valid venue");
        assert_eq!(normalized.sports, vec!["padel".to_string()]);

        let invalid = VenueDraft {
            latitude: 123.0,
            ..draft
        };
        assert!(invalid.normalized().is_err());
    }
}
