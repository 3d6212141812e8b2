/// Property-based tests using proptest
/// These tests generate random inputs to verify invariants hold across many cases
use proptest::prelude::*;
use urolaser_leads::models::{LeadFormData, UtmParams, UTM_KEYS};
use urolaser_leads::submission::lead_fingerprint;
use urolaser_leads::validation::{is_valid_email, is_valid_phone, Validate};

fn utm_params() -> impl Strategy<Value = UtmParams> {
    let value = proptest::option::of("[a-z0-9_]{1,12}");
    (
        value.clone(),
        value.clone(),
        value.clone(),
        value.clone(),
        value,
    )
        .prop_map(
            |(utm_source, utm_medium, utm_campaign, utm_term, utm_content)| UtmParams {
                utm_source,
                utm_medium,
                utm_campaign,
                utm_term,
                utm_content,
            },
        )
}

proptest! {
    /// Validators must never panic on arbitrary input
    #[test]
    fn test_validators_never_panic(s in "\\PC*") {
        let _ = is_valid_email(&s);
        let _ = is_valid_phone(&s);
        let _ = LeadFormData { name: s.clone(), email: s.clone(), whatsapp: s }.validate();
    }

    /// Any local@domain.tld without whitespace or extra @ is accepted
    #[test]
    fn test_well_formed_emails_accepted(
        local in "[a-zA-Z0-9._%+-]{1,20}",
        domain in "[a-zA-Z0-9-]{1,20}",
        tld in "[a-z]{1,6}",
    ) {
        let email = format!("{}@{}.{}", local, domain, tld);
        prop_assert!(is_valid_email(&email), "rejected {}", email);
    }

    /// Strings without an @ are rejected
    #[test]
    fn test_emails_without_at_rejected(s in "[a-z0-9.]{0,30}") {
        prop_assert!(!is_valid_email(&s));
    }

    /// Domains without a dot are rejected
    #[test]
    fn test_emails_without_domain_dot_rejected(
        local in "[a-z0-9]{1,10}",
        domain in "[a-z0-9]{1,10}",
    ) {
        let email = format!("{}@{}", local, domain);
        prop_assert!(!is_valid_email(&email));
    }

    /// Any non-empty mix of digits and formatting characters is a valid phone
    #[test]
    fn test_formatted_phones_accepted(phone in "[0-9 ()+-]{1,20}") {
        prop_assert!(is_valid_phone(&phone));
    }

    /// A phone containing a letter is rejected
    #[test]
    fn test_phones_with_letters_rejected(
        prefix in "[0-9]{0,8}",
        letter in "[a-zA-Z]",
        suffix in "[0-9]{0,8}",
    ) {
        let phone = format!("{}{}{}", prefix, letter, suffix);
        prop_assert!(!is_valid_phone(&phone));
    }

    /// Blanking any subset of required fields reports exactly that subset
    #[test]
    fn test_blank_fields_reported_exactly(
        blank_name in any::<bool>(),
        blank_email in any::<bool>(),
        blank_whatsapp in any::<bool>(),
        padding in " {0,3}",
    ) {
        let pick = |blank: bool, value: &str| {
            if blank { padding.clone() } else { value.to_string() }
        };
        let form = LeadFormData {
            name: pick(blank_name, "Ana"),
            email: pick(blank_email, "ana@x.com"),
            whatsapp: pick(blank_whatsapp, "11999999999"),
        };

        let errors = form.validate();
        let mut expected = vec![];
        if blank_email { expected.push("email"); }
        if blank_name { expected.push("name"); }
        if blank_whatsapp { expected.push("whatsapp"); }

        let keys: Vec<&str> = errors.keys().copied().collect();
        prop_assert_eq!(keys, expected);
        prop_assert_eq!(form.is_submittable(), !blank_name && !blank_email && !blank_whatsapp);
    }

    /// Newer values win, older values fill the gaps
    #[test]
    fn test_utm_merge_precedence(older in utm_params(), newer in utm_params()) {
        let merged = older.clone().merge(newer.clone());

        for key in UTM_KEYS {
            let expected = newer.get(key).or(older.get(key));
            prop_assert_eq!(merged.get(key), expected);
        }
    }

    /// Merging the same params twice changes nothing
    #[test]
    fn test_utm_merge_idempotent(older in utm_params(), newer in utm_params()) {
        let once = older.merge(newer.clone());
        let twice = once.clone().merge(newer);
        prop_assert_eq!(once, twice);
    }

    /// Params survive a trip through their own query-string form
    #[test]
    fn test_utm_query_extraction(params in utm_params()) {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.to_map())
            .finish();
        prop_assert_eq!(UtmParams::from_query(&query), params);
    }

    /// The fingerprint ignores email case and phone formatting
    #[test]
    fn test_fingerprint_normalization(
        local in "[a-z]{1,10}",
        digits in "[0-9]{10,11}",
    ) {
        let email = format!("{}@x.com", local);
        let formatted = format!("({}) {}", &digits[..2], &digits[2..]);

        prop_assert_eq!(
            lead_fingerprint(&email.to_uppercase(), &formatted),
            lead_fingerprint(&email, &digits)
        );
    }
}
