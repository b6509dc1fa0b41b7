//! Deterministic procedural status classification
//!
//! A pure rule set over the latest recorded action text and the
//! structured laws list. Rules are evaluated in strict priority order
//! so that later-stage statuses always win over earlier ones.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{BillStatus, LawReference};

fn house_passage_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"passed(?:\s+the)?\s+house").expect("static regex is valid"))
}

fn senate_passage_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"passed(?:\s+the)?\s+senate").expect("static regex is valid"))
}

/// Classify a bill's procedural status.
///
/// `latest_action` is the most recent action text from the API,
/// `has_actions` reflects the bill's action count, and `laws` carries
/// any enacted-law references. Bills with no recorded actions are
/// always `Introduced` no matter what else the record says.
pub fn classify(
    latest_action: Option<&str>,
    has_actions: bool,
    laws: &[LawReference],
) -> BillStatus {
    if !has_actions {
        return BillStatus::Introduced;
    }

    let text = latest_action.unwrap_or_default().to_lowercase();

    if !laws.is_empty() || text.contains("became public law") || text.contains("signed by president")
    {
        return BillStatus::SignedIntoLaw;
    }

    if text.contains("veto overridden") {
        return BillStatus::VetoOverridden;
    }

    if text.contains("vetoed by president") || text.contains("vetoed by the president") {
        return BillStatus::Vetoed;
    }

    if text.contains("presented to president") || text.contains("sent to president") {
        return BillStatus::PresentedToPresident;
    }

    let passed_house = house_passage_regex().is_match(&text);
    let passed_senate = senate_passage_regex().is_match(&text);
    if passed_house && passed_senate {
        return BillStatus::PassedBothChambers;
    }
    if passed_house || passed_senate {
        return BillStatus::PassedChamber;
    }

    if text.contains("reported") || text.contains("ordered to be reported") {
        return BillStatus::ReportedByCommittee;
    }

    if text.contains("referred to") {
        return BillStatus::ReferredToCommittee;
    }

    if text.contains("failed") || text.contains("rejected") || text.contains("withdrawn") {
        return BillStatus::Failed;
    }

    BillStatus::Introduced
}

/// Pull a committee name out of a referral action, e.g.
/// "Referred to the Committee on the Judiciary." yields
/// "Committee on the Judiciary".
pub fn committee_from_action(action: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)referred to (?:the )?((?:select |permanent select )?committee on [^.,;]+)")
            .expect("static regex is valid")
    });

    re.captures(action)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn law() -> LawReference {
        LawReference {
            law_type: "Public Law".to_string(),
            number: "118-5".to_string(),
        }
    }

    #[test]
    fn test_no_actions_always_introduced() {
        // The guard beats even an enacted-law reference
        assert_eq!(
            classify(Some("Became Public Law No: 118-5."), false, &[law()]),
            BillStatus::Introduced
        );
        assert_eq!(classify(None, false, &[]), BillStatus::Introduced);
    }

    #[test]
    fn test_laws_list_means_signed() {
        assert_eq!(
            classify(Some("Referred to committee."), true, &[law()]),
            BillStatus::SignedIntoLaw
        );
    }

    #[test]
    fn test_signed_by_text() {
        assert_eq!(
            classify(Some("Became Public Law No: 118-5."), true, &[]),
            BillStatus::SignedIntoLaw
        );
        assert_eq!(
            classify(Some("Signed by President."), true, &[]),
            BillStatus::SignedIntoLaw
        );
    }

    #[test]
    fn test_veto_ladder() {
        assert_eq!(
            classify(Some("Veto overridden by two-thirds vote."), true, &[]),
            BillStatus::VetoOverridden
        );
        assert_eq!(
            classify(Some("Vetoed by President."), true, &[]),
            BillStatus::Vetoed
        );
        assert_eq!(
            classify(Some("Vetoed by the President."), true, &[]),
            BillStatus::Vetoed
        );
        assert_eq!(
            classify(Some("Presented to President."), true, &[]),
            BillStatus::PresentedToPresident
        );
        assert_eq!(
            classify(Some("Sent to President of the United States."), true, &[]),
            BillStatus::PresentedToPresident
        );
    }

    #[test]
    fn test_both_chambers_beats_single() {
        assert_eq!(
            classify(
                Some("Passed House, passed Senate without amendment."),
                true,
                &[]
            ),
            BillStatus::PassedBothChambers
        );
        assert_eq!(
            classify(Some("Passed the House by voice vote."), true, &[]),
            BillStatus::PassedChamber
        );
        assert_eq!(
            classify(Some("Passed Senate with an amendment."), true, &[]),
            BillStatus::PassedChamber
        );
    }

    #[test]
    fn test_committee_stages() {
        assert_eq!(
            classify(
                Some("Ordered to be Reported by the Yeas and Nays: 33 - 24."),
                true,
                &[]
            ),
            BillStatus::ReportedByCommittee
        );
        assert_eq!(
            classify(
                Some("Reported by the Committee on Armed Services."),
                true,
                &[]
            ),
            BillStatus::ReportedByCommittee
        );
        assert_eq!(
            classify(
                Some("Referred to the Committee on the Judiciary."),
                true,
                &[]
            ),
            BillStatus::ReferredToCommittee
        );
    }

    #[test]
    fn test_failed_and_default() {
        assert_eq!(
            classify(Some("Failed of passage in Senate."), true, &[]),
            BillStatus::Failed
        );
        assert_eq!(
            classify(Some("Motion rejected."), true, &[]),
            BillStatus::Failed
        );
        assert_eq!(
            classify(Some("Amendment withdrawn by sponsor."), true, &[]),
            BillStatus::Failed
        );
        assert_eq!(
            classify(Some("Sponsor introductory remarks on measure."), true, &[]),
            BillStatus::Introduced
        );
        assert_eq!(classify(None, true, &[]), BillStatus::Introduced);
    }

    #[test]
    fn test_reported_beats_referred_and_failed() {
        // "reported" appears earlier in the ladder than "referred to"
        assert_eq!(
            classify(
                Some("Reported to Senate, referred to calendar."),
                true,
                &[]
            ),
            BillStatus::ReportedByCommittee
        );
    }

    #[test]
    fn test_committee_extraction() {
        assert_eq!(
            committee_from_action("Referred to the Committee on the Judiciary."),
            Some("Committee on the Judiciary".to_string())
        );
        assert_eq!(
            committee_from_action(
                "Referred to the Committee on Energy and Commerce, and in addition to the \
                 Committee on Ways and Means."
            ),
            Some("Committee on Energy and Commerce".to_string())
        );
        assert_eq!(
            committee_from_action("Referred to the Select Committee on Intelligence."),
            Some("Select Committee on Intelligence".to_string())
        );
        assert_eq!(committee_from_action("Passed House."), None);
    }
}
