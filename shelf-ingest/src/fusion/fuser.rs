// Field Fuser - Precedence rules for applying a selected candidate
//
// Each fusion step takes an immutable snapshot and returns a new record plus
// the corrections and conflicts it produced:
// - Text fields fill when empty. Title and author may be overwritten, and
//   only by an authoritative source. Everything else is fill-only.
// - Dates fill when absent. Disagreement is governed by `DatePolicy`.
// - Location name fills when empty and resolves coordinates alongside.
// - Author and category lists fill only when the record's list is empty.
// - Provenance always records the contributing source.

use crate::fusion::{
    location::resolve_location, Candidate, ConflictReport, CorrectionLog, RecordField, Tier,
};
use shelf_common::config::DatePolicy;
use shelf_common::BookRecord;
use std::collections::HashMap;
use tracing::debug;

/// Record plus the trust tier that established each date
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingRecord {
    record: BookRecord,
    date_tiers: HashMap<RecordField, Tier>,
}

impl WorkingRecord {
    /// Dates already on the seed are treated as corroborating evidence
    pub fn new(seed: BookRecord) -> Self {
        let mut date_tiers = HashMap::new();
        if seed.original_date.is_some() {
            date_tiers.insert(RecordField::OriginalDate, Tier::Corroborating);
        }
        if seed.release_date.is_some() {
            date_tiers.insert(RecordField::ReleaseDate, Tier::Corroborating);
        }
        Self { record: seed, date_tiers }
    }

    pub fn record(&self) -> &BookRecord {
        &self.record
    }

    pub fn into_record(self) -> BookRecord {
        self.record
    }

    /// Tier of the source that set a date field, if the date is known
    pub fn date_tier(&self, field: RecordField) -> Option<Tier> {
        self.date_tiers.get(&field).copied()
    }
}

/// Result of applying one candidate
#[derive(Debug, Clone)]
pub struct FusionStep {
    pub record: WorkingRecord,
    pub corrections: CorrectionLog,
    pub conflicts: Vec<ConflictReport>,
}

/// Applies selected candidates under the precedence rules
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldFuser {
    date_policy: DatePolicy,
}

impl FieldFuser {
    pub fn new(date_policy: DatePolicy) -> Self {
        Self { date_policy }
    }

    pub fn date_policy(&self) -> DatePolicy {
        self.date_policy
    }

    /// Apply `candidate` from a source registered as `provenance` with `tier`
    pub fn fuse(
        &self,
        current: &WorkingRecord,
        candidate: &Candidate,
        tier: Tier,
        provenance: &str,
    ) -> FusionStep {
        let mut step = StepBuilder {
            next: current.clone(),
            corrections: CorrectionLog::new(),
            conflicts: Vec::new(),
            source: provenance,
            tier,
            date_policy: self.date_policy,
        };

        let fields = &candidate.fields;
        step.fuse_text(RecordField::Title, fields.title.as_deref());
        step.fuse_text(RecordField::Author, fields.author.as_deref());
        step.fuse_text(RecordField::Publisher, fields.publisher.as_deref());
        step.fuse_text(RecordField::Description, fields.description.as_deref());
        step.fuse_text(RecordField::Isbn, fields.isbn.as_deref());
        step.fuse_text(RecordField::OriginalLanguage, fields.original_language.as_deref());
        step.fuse_text(RecordField::EditionLanguage, fields.edition_language.as_deref());

        step.fuse_date(RecordField::OriginalDate, fields.original_date);
        step.fuse_date(RecordField::ReleaseDate, fields.release_date);

        step.fuse_location(fields.location_name.as_deref());

        step.fuse_list(RecordField::Authors, fields.authors.as_deref());
        step.fuse_list(RecordField::Categories, fields.categories.as_deref());

        step.tag_provenance();

        debug!(
            source = provenance,
            %tier,
            corrections = step.corrections.len(),
            conflicts = step.conflicts.len(),
            "Fused candidate"
        );

        FusionStep {
            record: step.next,
            corrections: step.corrections,
            conflicts: step.conflicts,
        }
    }
}

struct StepBuilder<'a> {
    next: WorkingRecord,
    corrections: CorrectionLog,
    conflicts: Vec<ConflictReport>,
    source: &'a str,
    tier: Tier,
    date_policy: DatePolicy,
}

impl StepBuilder<'_> {
    fn text(&self, field: RecordField) -> &str {
        let record = &self.next.record;
        match field {
            RecordField::Title => record.title(),
            RecordField::Author => record.author(),
            RecordField::Publisher => &record.publisher,
            RecordField::Description => &record.description,
            RecordField::Isbn => &record.isbn,
            RecordField::OriginalLocationName => &record.original_location_name,
            RecordField::OriginalLanguage => &record.original_language,
            RecordField::EditionLanguage => &record.edition_language,
            _ => "",
        }
    }

    fn set_text(&mut self, field: RecordField, value: &str) {
        let record = &mut self.next.record;
        let value = value.to_string();
        match field {
            RecordField::Title => record.set_title(value),
            RecordField::Author => record.set_author(value),
            RecordField::Publisher => record.publisher = value,
            RecordField::Description => record.description = value,
            RecordField::Isbn => record.isbn = value,
            RecordField::OriginalLocationName => record.original_location_name = value,
            RecordField::OriginalLanguage => record.original_language = value,
            RecordField::EditionLanguage => record.edition_language = value,
            _ => {}
        }
    }

    fn conflict(&mut self, field: RecordField, current: String, proposed: String) {
        debug!(source = self.source, %field, %current, %proposed, "Conflicting value kept out");
        self.conflicts
            .push(ConflictReport::new(field, self.source, current, proposed));
    }

    fn fuse_text(&mut self, field: RecordField, proposed: Option<&str>) {
        let Some(proposed) = proposed.filter(|p| !p.is_empty()) else {
            return;
        };
        let current = self.text(field).to_string();

        if current.is_empty() {
            self.set_text(field, proposed);
            self.corrections.record(field, "", proposed);
        } else if current != proposed {
            if field.is_overwritable() && self.tier == Tier::Authoritative {
                self.set_text(field, proposed);
                self.corrections.record(field, &current, proposed);
            } else if field != RecordField::Description {
                // Descriptions differ between any two sources; not worth reporting
                self.conflict(field, current, proposed.to_string());
            }
        }
    }

    fn date(&self, field: RecordField) -> Option<i32> {
        match field {
            RecordField::OriginalDate => self.next.record.original_date,
            RecordField::ReleaseDate => self.next.record.release_date,
            _ => None,
        }
    }

    fn set_date(&mut self, field: RecordField, year: i32) {
        match field {
            RecordField::OriginalDate => self.next.record.original_date = Some(year),
            RecordField::ReleaseDate => self.next.record.release_date = Some(year),
            _ => return,
        }
        self.next.date_tiers.insert(field, self.tier);
    }

    fn fuse_date(&mut self, field: RecordField, proposed: Option<i32>) {
        let Some(proposed) = proposed else {
            return;
        };

        match self.date(field) {
            None => {
                self.set_date(field, proposed);
                self.corrections.record(field, "", &proposed.to_string());
            }
            Some(current) if current == proposed => {
                // Authoritative confirmation protects the date from later override
                if self.tier == Tier::Authoritative {
                    self.next.date_tiers.insert(field, Tier::Authoritative);
                }
            }
            Some(current) => {
                let established_by = self.next.date_tier(field).unwrap_or(Tier::Corroborating);
                let may_override = self.date_policy == DatePolicy::TrustedOverride
                    && self.tier == Tier::Authoritative
                    && established_by == Tier::Corroborating;

                if may_override {
                    self.set_date(field, proposed);
                    self.corrections
                        .record(field, &current.to_string(), &proposed.to_string());
                } else {
                    self.conflict(field, current.to_string(), proposed.to_string());
                }
            }
        }
    }

    fn fuse_location(&mut self, proposed: Option<&str>) {
        let Some(proposed) = proposed.filter(|p| !p.is_empty()) else {
            return;
        };
        let field = RecordField::OriginalLocationName;
        let current = self.text(field).to_string();

        if current.is_empty() {
            let (latitude, longitude) = resolve_location(proposed);
            let record = &mut self.next.record;
            record.original_location_name = proposed.to_string();
            record.original_location_latitude = latitude;
            record.original_location_longitude = longitude;
            self.corrections.record(field, "", proposed);
        } else if !current.eq_ignore_ascii_case(proposed) {
            self.conflict(field, current, proposed.to_string());
        }
    }

    fn fuse_list(&mut self, field: RecordField, proposed: Option<&[String]>) {
        let Some(proposed) = proposed.filter(|p| !p.is_empty()) else {
            return;
        };
        let record = &mut self.next.record;
        let list = match field {
            RecordField::Authors => &mut record.authors,
            RecordField::Categories => &mut record.categories,
            _ => return,
        };

        if list.is_empty() {
            *list = proposed.to_vec();
            self.corrections.record(field, "[]", &proposed.join(", "));
        }
    }

    fn tag_provenance(&mut self) {
        let data_source = &mut self.next.record.data_source;
        if data_source.split('+').any(|s| s == self.source) {
            return;
        }
        if !data_source.is_empty() {
            data_source.push('+');
        }
        data_source.push_str(self.source);
    }
}
