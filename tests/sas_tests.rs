//! SAS query-string generation for Queue and Table resources (§4.6, §9).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;

use fast_azure_storage::sas_gen::{
    generate_queue_sas, generate_table_sas, QueuePermissions, SasOptions, TablePermissions,
};

const DEV_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

#[test]
fn queue_sas_carries_permissions_expiry_and_one_signature() {
    let key = BASE64.decode(DEV_KEY).unwrap();
    let expiry = Utc::now() + chrono::Duration::hours(2);
    let options = SasOptions {
        version: "2014-02-14".into(),
        start: None,
        expiry,
        access_policy: Some("readers".into()),
    };

    let sas = generate_queue_sas(
        "jungle",
        &key,
        "orders",
        QueuePermissions { read: true, process: true, ..Default::default() },
        &options,
    )
    .unwrap();

    assert!(sas.contains("sp=rp"));
    assert!(sas.contains("si=readers"));
    assert_eq!(sas.matches("sig=").count(), 1);
    assert_eq!(sas.matches("se=").count(), 1, "the known se/si typo must not resurface");
}

#[test]
fn table_sas_lowercases_account_and_table_in_the_signed_resource() {
    let key = BASE64.decode(DEV_KEY).unwrap();
    let expiry = Utc::now() + chrono::Duration::hours(1);
    let options = SasOptions { version: "2014-02-14".into(), start: None, expiry, access_policy: None };

    let sas = generate_table_sas(
        "Jungle",
        &key,
        "Orders",
        TablePermissions { read: true, add: true, ..Default::default() },
        &options,
        Some("2024-01-01"),
        None,
        Some("2024-12-31"),
        None,
    )
    .unwrap();

    assert!(sas.contains("tn=Orders"));
    assert!(sas.contains("sp=ra"));
    assert!(sas.contains("spk=2024-01-01"));
    assert!(sas.contains("epk=2024-12-31"));
}

#[test]
fn two_sas_for_the_same_inputs_are_identical() {
    let key = BASE64.decode(DEV_KEY).unwrap();
    let expiry = Utc::now() + chrono::Duration::hours(1);
    let options = SasOptions { version: "2014-02-14".into(), start: None, expiry, access_policy: None };
    let perms = QueuePermissions { read: true, ..Default::default() };

    let a = generate_queue_sas("jungle", &key, "orders", perms, &options).unwrap();
    let b = generate_queue_sas("jungle", &key, "orders", perms, &options).unwrap();
    assert_eq!(a, b);
}
