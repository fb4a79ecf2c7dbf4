//! Canonical tender schema: the closed field set, candidate values, the
//! finalized record and its evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel for a field confidently absent from the document.
pub const NOT_AVAILABLE: &str = "N/A";

/// Every field of the canonical record, in persisted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    TenderId,
    Category,
    Title,
    Location,
    IssuingAuthority,
    PublicationDate,
    SubmissionDeadline,
    BidOpeningDate,
    BidOpeningTime,
    TenderValue,
    Emd,
    TenderFee,
    PerformanceGuarantee,
    ContractDuration,
    ContactEmails,
    ContactPhones,
    ScopeOfWork,
    EligibilitySummary,
    RequiredDocuments,
    ExclusionCriteria,
    DisqualificationCriteria,
    TechnicalDocuments,
    Deliverables,
    Projects,
    BiddingScope,
    ShortSummary,
}

/// How a field's value is normalized and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identifier,
    Category,
    Text,
    Organization,
    Date,
    Time,
    Money,
    Duration,
    Narrative,
    Emails,
    Phones,
    List,
}

impl Field {
    pub const ALL: [Field; 26] = [
        Field::TenderId,
        Field::Category,
        Field::Title,
        Field::Location,
        Field::IssuingAuthority,
        Field::PublicationDate,
        Field::SubmissionDeadline,
        Field::BidOpeningDate,
        Field::BidOpeningTime,
        Field::TenderValue,
        Field::Emd,
        Field::TenderFee,
        Field::PerformanceGuarantee,
        Field::ContractDuration,
        Field::ContactEmails,
        Field::ContactPhones,
        Field::ScopeOfWork,
        Field::EligibilitySummary,
        Field::RequiredDocuments,
        Field::ExclusionCriteria,
        Field::DisqualificationCriteria,
        Field::TechnicalDocuments,
        Field::Deliverables,
        Field::Projects,
        Field::BiddingScope,
        Field::ShortSummary,
    ];

    /// The persisted JSON key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TenderId => "tender_id",
            Self::Category => "category",
            Self::Title => "title",
            Self::Location => "location",
            Self::IssuingAuthority => "issuing_authority",
            Self::PublicationDate => "publication_date",
            Self::SubmissionDeadline => "submission_deadline",
            Self::BidOpeningDate => "bid_opening_date",
            Self::BidOpeningTime => "bid_opening_time",
            Self::TenderValue => "tender_value",
            Self::Emd => "emd",
            Self::TenderFee => "tender_fee",
            Self::PerformanceGuarantee => "performance_guarantee",
            Self::ContractDuration => "contract_duration",
            Self::ContactEmails => "contact_emails",
            Self::ContactPhones => "contact_phones",
            Self::ScopeOfWork => "scope_of_work",
            Self::EligibilitySummary => "eligibility_summary",
            Self::RequiredDocuments => "required_documents",
            Self::ExclusionCriteria => "exclusion_criteria",
            Self::DisqualificationCriteria => "disqualification_criteria",
            Self::TechnicalDocuments => "technical_documents",
            Self::Deliverables => "deliverables",
            Self::Projects => "projects",
            Self::BiddingScope => "bidding_scope",
            Self::ShortSummary => "short_summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::TenderId => FieldKind::Identifier,
            Self::Category => FieldKind::Category,
            Self::Title | Self::Location => FieldKind::Text,
            Self::IssuingAuthority => FieldKind::Organization,
            Self::PublicationDate | Self::SubmissionDeadline | Self::BidOpeningDate => {
                FieldKind::Date
            }
            Self::BidOpeningTime => FieldKind::Time,
            Self::TenderValue | Self::Emd | Self::TenderFee | Self::PerformanceGuarantee => {
                FieldKind::Money
            }
            Self::ContractDuration => FieldKind::Duration,
            Self::ContactEmails => FieldKind::Emails,
            Self::ContactPhones => FieldKind::Phones,
            Self::Projects => FieldKind::List,
            Self::ScopeOfWork
            | Self::EligibilitySummary
            | Self::RequiredDocuments
            | Self::ExclusionCriteria
            | Self::DisqualificationCriteria
            | Self::TechnicalDocuments
            | Self::Deliverables
            | Self::BiddingScope
            | Self::ShortSummary => FieldKind::Narrative,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self.kind(),
            FieldKind::Emails | FieldKind::Phones | FieldKind::List
        )
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// True for "", "N/A", "NA", "NONE" (any case) and empty lists.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Self::Text(s) => is_blank(s),
            Self::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::List(_) => None,
        }
    }

    /// Items of a list value, or a string value split on `,`, `;` and newlines.
    pub fn to_items(&self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .iter()
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty())
                .collect(),
            Self::Text(s) => s
                .split([',', ';', '\n'])
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty() && !is_blank(i))
                .collect(),
        }
    }
}

/// Whether a scalar is unresolved or the "N/A" sentinel.
pub fn is_blank(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || ["N/A", "NA", "NONE", "NULL"].contains(&t.to_uppercase().as_str())
}

/// Field → value mapping used while a run is in progress.
pub type FieldMap = BTreeMap<Field, FieldValue>;

/// Where a candidate value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Pattern,
    Generative,
}

/// One source's candidate for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCandidate {
    pub field: Field,
    pub value: FieldValue,
    pub source: CandidateSource,
}

/// All candidates produced by one source during a run.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSet {
    pub source: CandidateSource,
    pub values: FieldMap,
}

impl CandidateSet {
    pub fn new(source: CandidateSource) -> Self {
        Self {
            source,
            values: FieldMap::new(),
        }
    }

    pub fn from_map(source: CandidateSource, values: FieldMap) -> Self {
        Self { source, values }
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn text(&self, field: Field) -> &str {
        self.get(field).and_then(|v| v.as_text()).unwrap_or("")
    }

    pub fn insert(&mut self, field: Field, value: FieldValue) {
        self.values.insert(field, value);
    }

    /// Whether the field holds a non-empty value.
    pub fn has(&self, field: Field) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty_value())
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.is_empty_value())
    }

    pub fn candidates(&self) -> impl Iterator<Item = FieldCandidate> + '_ {
        self.values.iter().map(|(field, value)| FieldCandidate {
            field: *field,
            value: value.clone(),
            source: self.source,
        })
    }
}

/// The schema-fixed output of one pipeline run.
///
/// Serializes to a JSON object with exactly the 26 schema keys, in schema
/// order. Construct with [`CanonicalRecord::from_fields`], which enforces
/// presence of every key, the "N/A" sentinel and list de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanonicalRecord {
    pub tender_id: String,
    pub category: String,
    pub title: String,
    pub location: String,
    pub issuing_authority: String,
    pub publication_date: String,
    pub submission_deadline: String,
    pub bid_opening_date: String,
    pub bid_opening_time: String,
    pub tender_value: String,
    pub emd: String,
    pub tender_fee: String,
    pub performance_guarantee: String,
    pub contract_duration: String,
    pub contact_emails: Vec<String>,
    pub contact_phones: Vec<String>,
    pub scope_of_work: String,
    pub eligibility_summary: String,
    pub required_documents: String,
    pub exclusion_criteria: String,
    pub disqualification_criteria: String,
    pub technical_documents: String,
    pub deliverables: String,
    pub projects: Vec<String>,
    pub bidding_scope: String,
    pub short_summary: String,
}

impl Default for CanonicalRecord {
    fn default() -> Self {
        Self::from_fields(&FieldMap::new())
    }
}

impl CanonicalRecord {
    /// Build a record from a field map. Absent or blank scalars become "N/A";
    /// list values drop empties and duplicates, keeping first-seen order.
    pub fn from_fields(fields: &FieldMap) -> Self {
        let scalar = |f: Field| -> String {
            match fields.get(&f) {
                Some(FieldValue::Text(s)) if !is_blank(s) => s.trim().to_string(),
                _ => NOT_AVAILABLE.to_string(),
            }
        };
        let list = |f: Field| -> Vec<String> {
            let mut out: Vec<String> = Vec::new();
            if let Some(v) = fields.get(&f) {
                for item in v.to_items() {
                    if !out.contains(&item) {
                        out.push(item);
                    }
                }
            }
            out
        };

        Self {
            tender_id: scalar(Field::TenderId),
            category: scalar(Field::Category),
            title: scalar(Field::Title),
            location: scalar(Field::Location),
            issuing_authority: scalar(Field::IssuingAuthority),
            publication_date: scalar(Field::PublicationDate),
            submission_deadline: scalar(Field::SubmissionDeadline),
            bid_opening_date: scalar(Field::BidOpeningDate),
            bid_opening_time: scalar(Field::BidOpeningTime),
            tender_value: scalar(Field::TenderValue),
            emd: scalar(Field::Emd),
            tender_fee: scalar(Field::TenderFee),
            performance_guarantee: scalar(Field::PerformanceGuarantee),
            contract_duration: scalar(Field::ContractDuration),
            contact_emails: list(Field::ContactEmails),
            contact_phones: list(Field::ContactPhones),
            scope_of_work: scalar(Field::ScopeOfWork),
            eligibility_summary: scalar(Field::EligibilitySummary),
            required_documents: scalar(Field::RequiredDocuments),
            exclusion_criteria: scalar(Field::ExclusionCriteria),
            disqualification_criteria: scalar(Field::DisqualificationCriteria),
            technical_documents: scalar(Field::TechnicalDocuments),
            deliverables: scalar(Field::Deliverables),
            projects: list(Field::Projects),
            bidding_scope: scalar(Field::BiddingScope),
            short_summary: scalar(Field::ShortSummary),
        }
    }

    /// Scalar value of a field, `None` for list fields.
    pub fn text(&self, field: Field) -> Option<&str> {
        let v = match field {
            Field::TenderId => &self.tender_id,
            Field::Category => &self.category,
            Field::Title => &self.title,
            Field::Location => &self.location,
            Field::IssuingAuthority => &self.issuing_authority,
            Field::PublicationDate => &self.publication_date,
            Field::SubmissionDeadline => &self.submission_deadline,
            Field::BidOpeningDate => &self.bid_opening_date,
            Field::BidOpeningTime => &self.bid_opening_time,
            Field::TenderValue => &self.tender_value,
            Field::Emd => &self.emd,
            Field::TenderFee => &self.tender_fee,
            Field::PerformanceGuarantee => &self.performance_guarantee,
            Field::ContractDuration => &self.contract_duration,
            Field::ScopeOfWork => &self.scope_of_work,
            Field::EligibilitySummary => &self.eligibility_summary,
            Field::RequiredDocuments => &self.required_documents,
            Field::ExclusionCriteria => &self.exclusion_criteria,
            Field::DisqualificationCriteria => &self.disqualification_criteria,
            Field::TechnicalDocuments => &self.technical_documents,
            Field::Deliverables => &self.deliverables,
            Field::BiddingScope => &self.bidding_scope,
            Field::ShortSummary => &self.short_summary,
            Field::ContactEmails | Field::ContactPhones | Field::Projects => return None,
        };
        Some(v)
    }

    /// List value of a field, `None` for scalar fields.
    pub fn list(&self, field: Field) -> Option<&[String]> {
        match field {
            Field::ContactEmails => Some(&self.contact_emails),
            Field::ContactPhones => Some(&self.contact_phones),
            Field::Projects => Some(&self.projects),
            _ => None,
        }
    }

    /// Whether a scalar field holds something other than the sentinel.
    pub fn is_present(&self, field: Field) -> bool {
        match self.text(field) {
            Some(v) => !is_blank(v),
            None => self.list(field).is_some_and(|l| !l.is_empty()),
        }
    }
}

/// Bid/no-bid recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "PURSUE")]
    Pursue,
    #[serde(rename = "REVIEW")]
    Review,
    #[serde(rename = "DO NOT PURSUE")]
    DoNotPursue,
}

impl Recommendation {
    /// Lenient parse of model output ("Do not pursue", "do_not_pursue", ...).
    pub fn parse(s: &str) -> Option<Self> {
        let norm: String = s
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        let norm = norm.split_whitespace().collect::<Vec<_>>().join(" ");
        if norm.starts_with("DO NOT PURSUE") || norm.starts_with("DON'T PURSUE") {
            Some(Self::DoNotPursue)
        } else if norm.starts_with("PURSUE") {
            Some(Self::Pursue)
        } else if norm.starts_with("REVIEW") {
            Some(Self::Review)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pursue => write!(f, "PURSUE"),
            Self::Review => write!(f, "REVIEW"),
            Self::DoNotPursue => write!(f, "DO NOT PURSUE"),
        }
    }
}

/// Bid evaluation attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// 1–10.
    pub priority_score: u8,
    pub recommendation: Recommendation,
    pub key_risks: String,
}
