//! Property-based tests for draft address lists and headers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mailwright_mime::{Draft, Error};
use proptest::prelude::*;

/// Strategy to generate valid domain names
fn domain_strategy() -> impl Strategy<Value = String> {
    let regex = prop::string::string_regex("[a-z]{3,10}\\.[a-z]{2,5}")
        .expect("domain regex should be valid");
    regex.prop_map(|s| s.to_lowercase())
}

/// Strategy to generate dot-string local parts
fn email_local_strategy() -> impl Strategy<Value = String> {
    let atom_regex =
        prop::string::string_regex("[a-z0-9+_-]{1,10}").expect("atom regex should be valid");
    prop::collection::vec(atom_regex, 1..=3).prop_map(|atoms| atoms.join("."))
}

fn email_strategy() -> impl Strategy<Value = String> {
    (email_local_strategy(), domain_strategy())
        .prop_map(|(local, domain)| format!("{local}@{domain}"))
}

/// Strings that can never be a bare address: no `@`, or whitespace inside.
fn invalid_email_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z0-9.]{0,20}").expect("regex should be valid"),
        (email_local_strategy(), domain_strategy())
            .prop_map(|(local, domain)| format!("{local} x@{domain}")),
        (email_local_strategy(), domain_strategy())
            .prop_map(|(local, domain)| format!("{local}@@{domain}")),
    ]
}

proptest! {
    #[test]
    fn valid_addresses_append_exactly_one(email in email_strategy(), kind in 0u8..3) {
        let mut draft = Draft::new();
        let list = match kind {
            0 => draft.add_to([email.as_str()]).unwrap().to(),
            1 => draft.add_cc([email.as_str()]).unwrap().cc(),
            _ => draft.add_bcc([email.as_str()]).unwrap().bcc(),
        };
        prop_assert_eq!(list.len(), 1);
        prop_assert_eq!(list[0].email(), email.as_str());
    }

    #[test]
    fn invalid_addresses_leave_lists_unchanged(
        existing in email_strategy(),
        bad in invalid_email_strategy(),
    ) {
        let mut draft = Draft::new();
        draft.add_to([existing.as_str()]).unwrap();
        draft.add_cc([existing.as_str()]).unwrap();
        draft.add_bcc([existing.as_str()]).unwrap();

        let to = draft.add_to([existing.as_str(), bad.as_str()]).map(|_| ());
        let cc = draft.add_cc([bad.as_str()]).map(|_| ());
        let bcc = draft.add_bcc([bad.as_str(), existing.as_str()]).map(|_| ());

        prop_assert!(matches!(to, Err(Error::InvalidAddress(_))));
        prop_assert!(matches!(cc, Err(Error::InvalidAddress(_))));
        prop_assert!(matches!(bcc, Err(Error::InvalidAddress(_))));
        prop_assert_eq!(draft.to().len(), 1);
        prop_assert_eq!(draft.cc().len(), 1);
        prop_assert_eq!(draft.bcc().len(), 1);
    }

    #[test]
    fn plain_text_body_survives_build(body in "[ -~]{0,200}") {
        let mut draft = Draft::new();
        draft
            .set_from("sender@example.com").unwrap()
            .add_to(["recipient@example.com"]).unwrap()
            .set_msg(body.as_str()).unwrap();
        let message = draft.build().unwrap();
        prop_assert_eq!(message.content(), body.as_str());
    }

    #[test]
    fn any_text_body_survives_build(body in "[a-zé€ \r\n.]{0,120}") {
        let mut draft = Draft::new();
        draft
            .set_from("sender@example.com").unwrap()
            .add_to(["recipient@example.com"]).unwrap()
            .set_msg(body.as_str()).unwrap();
        let message = draft.build().unwrap();
        prop_assert_eq!(message.content(), body.as_str());
        prop_assert!(message.raw_body().is_ascii());
    }

    #[test]
    fn last_header_write_wins(values in prop::collection::vec("[a-zA-Z0-9]{1,12}", 1..6)) {
        let mut draft = Draft::new();
        for value in &values {
            draft.add_header("X-Custom-Header", value.as_str()).unwrap();
        }
        prop_assert_eq!(draft.headers().len(), 1);
        prop_assert_eq!(draft.headers().get("x-custom-header"), values.last().map(String::as_str));
    }
}
