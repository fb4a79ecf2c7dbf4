//! Field groups: which fields share a context window, and what to ask the
//! retrieval index for each.

use serde::{Deserialize, Serialize};

use tendersift_core::{Field, RagSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldGroup {
    /// Identifiers, dates, money, contacts.
    Core,
    /// Scope, eligibility, exclusions and document lists.
    Content,
    /// Narrative summary.
    Summary,
}

const CORE_FIELDS: &[Field] = &[
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
];

const CONTENT_FIELDS: &[Field] = &[
    Field::ScopeOfWork,
    Field::EligibilitySummary,
    Field::RequiredDocuments,
    Field::ExclusionCriteria,
    Field::DisqualificationCriteria,
    Field::TechnicalDocuments,
    Field::Deliverables,
    Field::Projects,
    Field::BiddingScope,
];

const SUMMARY_FIELDS: &[Field] = &[Field::ShortSummary];

const CORE_QUERIES: &[&str] = &[
    "Tender Reference Number NIT No Tender ID",
    "Name of Work title of the tender",
    "issuing authority department office address",
    "date of publication of tender notice",
    "last date and time for submission of bids",
    "bid opening date and time",
    "estimated cost tender value",
    "EMD Earnest Money Deposit",
    "tender fee cost of tender document",
    "performance guarantee security deposit",
    "contract period completion time",
    "contact email phone",
];

const CONTENT_QUERIES: &[&str] = &[
    "Scope of Work",
    "eligibility criteria qualification requirements",
    "documents required to be submitted",
    "exclusion criteria",
    "disqualification rejection of bids",
    "technical bid documents specifications",
    "deliverables",
    "projects works packages",
    "bidding scope",
];

const SUMMARY_QUERIES: &[&str] = &[
    "invites bids for",
    "Scope of Work brief description",
    "eligibility",
    "submission deadline",
];

impl FieldGroup {
    pub const ALL: [FieldGroup; 3] = [FieldGroup::Core, FieldGroup::Content, FieldGroup::Summary];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Content => "content",
            Self::Summary => "summary",
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            Self::Core => CORE_FIELDS,
            Self::Content => CONTENT_FIELDS,
            Self::Summary => SUMMARY_FIELDS,
        }
    }

    pub fn queries(&self) -> &'static [&'static str] {
        match self {
            Self::Core => CORE_QUERIES,
            Self::Content => CONTENT_QUERIES,
            Self::Summary => SUMMARY_QUERIES,
        }
    }

    /// Hits requested per query.
    pub fn top_k(&self, settings: &RagSettings) -> usize {
        match self {
            Self::Summary => settings.summary_top_k,
            Self::Core | Self::Content => settings.top_k,
        }
    }

    pub fn of(field: Field) -> Self {
        Self::ALL
            .into_iter()
            .find(|g| g.fields().contains(&field))
            .unwrap_or(Self::Core)
    }
}

impl std::fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
