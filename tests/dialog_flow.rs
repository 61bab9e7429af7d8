//! Dialog lifecycle against the simulated bank.

mod common;

use chrono::NaiveDate;
use common::{auth, MockBank, DIALOG_ID, SYNC_DIALOG_ID, SYSTEM_ID};
use fints_client::segments::{MessageHeader, SepaAccountsRequest, StatementRequest, StatementResponse};
use fints_client::{
    fetch_pages, Authenticator, DialogState, Error, Headers, SegmentBody, SepaAccount,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn account() -> SepaAccount {
    SepaAccount {
        is_sepa: true,
        iban: "DE02100200300000123456".into(),
        bic: "BANKDEFFXXX".into(),
        account_number: "123456".into(),
        sub_account: None,
        country_code: "280".into(),
        blz: "10020030".into(),
    }
}

fn statement_request(touchdown: Option<String>) -> SegmentBody {
    StatementRequest::new(
        account(),
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
    )
    .with_touchdown(touchdown)
    .into()
}

#[tokio::test]
async fn test_sync_closes_bank_dialog_and_init_opens_new_one() {
    let bank = Arc::new(MockBank::new());
    let auth = auth();
    let mut dialog = auth.create_dialog(bank.clone());

    dialog.sync(&auth).await.unwrap();
    assert_eq!(dialog.system_id(), SYSTEM_ID);
    assert_eq!(dialog.dialog_id(), "0");

    dialog.init(&auth).await.unwrap();
    assert_eq!(dialog.state(), DialogState::Open);
    assert_eq!(dialog.dialog_id(), DIALOG_ID);
    assert_eq!(dialog.negotiated_version("HKSPA"), Some(3));
    assert_eq!(dialog.negotiated_version("HKKAZ"), Some(7));

    let ends = bank.received("HKEND");
    assert_eq!(ends.len(), 1);

    let headers: Vec<(String, u32)> = bank
        .requests()
        .iter()
        .filter_map(|request| request[0].typed::<MessageHeader>().cloned())
        .map(|header| (header.dialog_id, header.message_number))
        .collect();
    assert_eq!(
        headers,
        vec![
            ("0".to_string(), 1),
            (SYNC_DIALOG_ID.to_string(), 2),
            ("0".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_segment_numbers_strictly_increase() {
    let bank = Arc::new(MockBank::new().with_pages(&[":20:A\n", ":25:B\n"]));
    let auth = auth();
    let mut dialog = auth.create_dialog(bank.clone());
    dialog.sync(&auth).await.unwrap();
    dialog.init(&auth).await.unwrap();

    for _ in 0..2 {
        let mut request = auth.create_request(vec![SepaAccountsRequest::default().into()]);
        dialog.send(&mut request).await.unwrap();
    }
    fetch_pages(&mut dialog, &auth, "HKKAZ", statement_request)
        .await
        .unwrap();
    dialog.end(&auth).await.unwrap();

    // HNHBK, HNSHK and the envelope keep their fixed numbers
    let numbers: Vec<u32> = bank
        .requests()
        .iter()
        .flatten()
        .filter(|segment| !matches!(segment.kind(), "HNHBK" | "HNSHK" | "HNVSK"))
        .map(|segment| segment.number())
        .collect();
    assert!(numbers.len() > 10);
    assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", numbers);
    assert_eq!(numbers[0], 3);
}

#[tokio::test]
async fn test_send_after_end_fails() {
    let bank = Arc::new(MockBank::new());
    let auth = auth();
    let mut dialog = auth.create_dialog(bank.clone());
    dialog.sync(&auth).await.unwrap();
    dialog.init(&auth).await.unwrap();
    dialog.end(&auth).await.unwrap();
    let sent = bank.requests().len();

    let mut request = auth.create_request(vec![SepaAccountsRequest::default().into()]);
    let result = dialog.send(&mut request).await;
    assert!(matches!(
        result,
        Err(Error::InvalidDialogState {
            operation: "send",
            state: DialogState::Closed
        })
    ));
    assert_eq!(bank.requests().len(), sent);
    assert!(dialog.end(&auth).await.is_err());
}

#[tokio::test]
async fn test_pagination_follows_touchdowns() {
    let bank = Arc::new(MockBank::new().with_pages(&["first|", "second|", "third"]));
    let auth = auth();
    let mut dialog = auth.create_dialog(bank.clone());
    dialog.sync(&auth).await.unwrap();
    dialog.init(&auth).await.unwrap();

    let responses = fetch_pages(&mut dialog, &auth, "HKKAZ", statement_request)
        .await
        .unwrap();
    assert_eq!(responses.len(), 3);

    let payload: String = responses
        .iter()
        .flat_map(|response| response.find_all::<StatementResponse>())
        .map(|page| page.booked.as_str())
        .collect();
    assert_eq!(payload, "first|second|third");

    let tokens: Vec<Option<String>> = bank
        .received("HKKAZ")
        .iter()
        .map(|segment| {
            segment
                .raw_groups()
                .and_then(|groups| groups.get(5))
                .and_then(|group| group.first())
                .map(|element| element.as_str().to_string())
        })
        .collect();
    assert_eq!(
        tokens,
        vec![None, Some("T1".to_string()), Some("T2".to_string())]
    );
}

#[tokio::test]
async fn test_unknown_segments_are_kept() {
    let bank = Arc::new(MockBank::new().with_extra_segment("HIXYZ"));
    let auth = auth();
    let mut dialog = auth.create_dialog(bank);
    dialog.sync(&auth).await.unwrap();
    dialog.init(&auth).await.unwrap();

    let mut request = auth.create_request(vec![SepaAccountsRequest::default().into()]);
    let response = dialog.send(&mut request).await.unwrap();

    let unknown = response.find_segment("HIXYZ").unwrap();
    let groups = unknown.raw_groups().unwrap();
    assert_eq!(groups[0][0].as_str(), "opaque");
    assert_eq!(groups[0][1].as_str(), "data");
    assert!(response.find_segment("HISPA").is_ok());
}

#[tokio::test]
async fn test_headers_reach_the_transport() {
    let bank = Arc::new(MockBank::new());
    let headers = Headers::new().with("Proxy-Authorization", "Basic c2VjcmV0");
    let auth = auth().with_headers(headers.clone());
    let mut dialog = auth.create_dialog(bank.clone());
    dialog.sync(&auth).await.unwrap();
    dialog.init(&auth).await.unwrap();
    dialog.end(&auth).await.unwrap();

    let seen = bank.headers();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|received| *received == headers));
}
